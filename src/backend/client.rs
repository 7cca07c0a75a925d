//! REST client for the hosted backend-as-a-service.
//!
//! Uses reqwest against the platform's standard endpoints:
//! - `/rest/v1/{table}` and `/rest/v1/rpc/{fn}` for data
//! - `/auth/v1/token` and `/auth/v1/logout` for sessions
//! - `/storage/v1/object/...` for contract files
//!
//! Every request carries the project `apikey` header. The bearer token is the
//! signed-in user's access token when there is a session, otherwise the key.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::RwLock;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use super::query::Query;
use super::{BackendError, DataSource};
use crate::types::BackendConfig;

const REQUEST_TIMEOUT_SECS: u64 = 20;

/// Refresh the access token when it expires within this many seconds.
const REFRESH_MARGIN_SECS: i64 = 60;

/// A signed-in user session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix seconds.
    pub expires_at: i64,
    pub user_id: String,
    pub email: Option<String>,
}

impl Session {
    pub fn needs_refresh(&self, now: i64) -> bool {
        self.expires_at - now <= REFRESH_MARGIN_SECS
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    user: TokenUser,
}

#[derive(Deserialize)]
struct TokenUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

impl TokenResponse {
    fn into_session(self) -> Session {
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: Utc::now().timestamp() + self.expires_in,
            user_id: self.user.id,
            email: self.user.email,
        }
    }
}

/// Where sessions survive restarts. Called on every sign-in, refresh and
/// sign-out so the stored refresh token never lags the one in memory.
pub trait SessionStore: Send + Sync {
    fn save(&self, session: &Session);
    fn clear(&self);
}

pub struct BackendClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: String,
    session: RwLock<Option<Session>>,
    store: Option<Arc<dyn SessionStore>>,
    /// Refresh tokens are single-use; only one refresh may be in flight.
    refresh_lock: tokio::sync::Mutex<()>,
}

impl BackendClient {
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        if config.url.trim().is_empty() {
            return Err(BackendError::NotConfigured("backend.url is empty".to_string()));
        }
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| BackendError::NotConfigured("backend.apiKey is missing".to_string()))?;

        // Trailing slash so `join` appends instead of replacing the last segment.
        let mut base = config.url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)
            .map_err(|e| BackendError::NotConfigured(format!("invalid backend.url: {}", e)))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| BackendError::Network(e.to_string()))?;

        Ok(Self {
            http,
            base_url,
            api_key,
            session: RwLock::new(None),
            store: None,
            refresh_lock: tokio::sync::Mutex::new(()),
        })
    }

    pub fn with_session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn session(&self) -> Option<Session> {
        self.session.read().clone()
    }

    /// Install a session restored from the local store.
    pub fn restore_session(&self, session: Option<Session>) {
        *self.session.write() = session;
    }

    pub(crate) fn endpoint(&self, path: &str) -> Result<Url, BackendError> {
        self.base_url
            .join(path)
            .map_err(|e| BackendError::NotConfigured(format!("bad endpoint {}: {}", path, e)))
    }

    pub(crate) fn table_url(&self, table: &str, query: &Query) -> Result<Url, BackendError> {
        let mut url = self.endpoint(&format!("rest/v1/{}", table))?;
        {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in query.to_pairs() {
                pairs.append_pair(&k, &v);
            }
        }
        Ok(url)
    }

    async fn bearer(&self) -> String {
        match self.session() {
            Some(session) if !session.needs_refresh(Utc::now().timestamp()) => {
                return session.access_token
            }
            None => return self.api_key.clone(),
            Some(_) => {}
        }

        let _refreshing = self.refresh_lock.lock().await;
        // Whoever held the lock before us may already have rotated the token.
        let Some(session) = self.session() else {
            return self.api_key.clone();
        };
        if !session.needs_refresh(Utc::now().timestamp()) {
            return session.access_token;
        }
        match self.refresh_session(&session.refresh_token).await {
            Ok(fresh) => fresh.access_token,
            Err(e) => {
                log::warn!("Session refresh failed, falling back to project key: {}", e);
                self.drop_session(&session.refresh_token);
                self.api_key.clone()
            }
        }
    }

    /// Forget the session in memory and in the store, unless a sign-in
    /// replaced it while the failed refresh was in flight.
    fn drop_session(&self, refresh_token: &str) {
        {
            let mut current = self.session.write();
            if current.as_ref().map(|s| s.refresh_token.as_str()) != Some(refresh_token) {
                return;
            }
            *current = None;
        }
        if let Some(store) = &self.store {
            store.clear();
        }
    }

    async fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let token = self.bearer().await;
        self.http
            .request(method, url)
            .header("apikey", &self.api_key)
            .bearer_auth(token)
    }

    async fn check(resp: Response) -> Result<Response, BackendError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(BackendError::Unauthorized);
        }
        let message = resp.text().await.unwrap_or_default();
        Err(BackendError::Http {
            status: status.as_u16(),
            message,
        })
    }

    // -----------------------------------------------------------------------
    // Auth
    // -----------------------------------------------------------------------

    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, BackendError> {
        let mut url = self.endpoint("auth/v1/token")?;
        url.query_pairs_mut().append_pair("grant_type", "password");
        let body = serde_json::json!({ "email": email, "password": password });
        let session = self.token_request(url, body).await?;
        log::info!("Signed in as {}", session.email.as_deref().unwrap_or(&session.user_id));
        Ok(session)
    }

    pub async fn refresh_session(&self, refresh_token: &str) -> Result<Session, BackendError> {
        let mut url = self.endpoint("auth/v1/token")?;
        url.query_pairs_mut().append_pair("grant_type", "refresh_token");
        let body = serde_json::json!({ "refresh_token": refresh_token });
        self.token_request(url, body).await
    }

    async fn token_request(&self, url: Url, body: Value) -> Result<Session, BackendError> {
        let resp = self
            .http
            .post(url)
            .header("apikey", &self.api_key)
            .json(&body)
            .send()
            .await?;
        let resp = Self::check(resp).await?;
        let token: TokenResponse = resp.json().await?;
        let session = token.into_session();
        *self.session.write() = Some(session.clone());
        if let Some(store) = &self.store {
            store.save(&session);
        }
        Ok(session)
    }

    pub async fn sign_out(&self) -> Result<(), BackendError> {
        let taken = self.session.write().take();
        if let Some(store) = &self.store {
            store.clear();
        }
        let Some(session) = taken else {
            return Ok(());
        };
        let url = self.endpoint("auth/v1/logout")?;
        let resp = self
            .http
            .post(url)
            .header("apikey", &self.api_key)
            .bearer_auth(&session.access_token)
            .send()
            .await?;
        // The local session is gone either way; a rejected logout only means
        // the token was already invalid upstream.
        if let Err(e) = Self::check(resp).await {
            log::warn!("Remote sign-out failed: {}", e);
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Storage
    // -----------------------------------------------------------------------

    /// Build `storage/v1/{area}/{bucket}/{path}` and check the joined URL
    /// still points inside the bucket. `Url::join` resolves `..` segments, so
    /// the check runs on the final URL rather than on the inputs.
    pub(crate) fn storage_url(&self, area: &str, bucket: &str, path: &str) -> Result<Url, BackendError> {
        let invalid = || BackendError::InvalidObjectPath(format!("{}/{}", bucket, path));
        if bucket.is_empty() || bucket.contains(['/', '\\', '?', '#', '%']) || bucket.starts_with('.') {
            return Err(invalid());
        }
        let url = self.endpoint(&format!("storage/v1/{}/{}/{}", area, bucket, path))?;
        let prefix = format!("{}storage/v1/{}/{}/", self.base_url.path(), area, bucket);
        if url.query().is_some() || url.fragment().is_some() || !url.path().starts_with(&prefix) {
            log::warn!("Rejected storage path escaping bucket {}: {}", bucket, url.path());
            return Err(invalid());
        }
        Ok(url)
    }

    /// Upload (or replace) an object. Returns the object key.
    pub async fn upload_object(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, BackendError> {
        let url = self.storage_url("object", bucket, path)?;
        let resp = self
            .request(Method::POST, url)
            .await
            .header("content-type", content_type)
            .header("x-upsert", "true")
            .body(bytes)
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(format!("{}/{}", bucket, path))
    }

    /// Create a time-limited download URL for an object.
    pub async fn create_signed_url(
        &self,
        bucket: &str,
        path: &str,
        expires_in_secs: u64,
    ) -> Result<String, BackendError> {
        #[derive(Deserialize)]
        struct Signed {
            #[serde(rename = "signedURL", alias = "signedUrl")]
            signed_url: String,
        }

        let url = self.storage_url("object/sign", bucket, path)?;
        let resp = self
            .request(Method::POST, url)
            .await
            .json(&serde_json::json!({ "expiresIn": expires_in_secs }))
            .send()
            .await?;
        let signed: Signed = Self::check(resp).await?.json().await?;
        let relative = signed.signed_url.trim_start_matches('/');
        Ok(self.endpoint(&format!("storage/v1/{}", relative))?.to_string())
    }
}

#[async_trait::async_trait]
impl DataSource for BackendClient {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>, BackendError> {
        let url = self.table_url(table, query)?;
        log::debug!("select {}", url);
        let resp = self.request(Method::GET, url).await.send().await?;
        let rows: Vec<Value> = Self::check(resp).await?.json().await?;
        Ok(rows)
    }

    async fn insert(&self, table: &str, rows: Vec<Value>) -> Result<(), BackendError> {
        if rows.is_empty() {
            return Ok(());
        }
        let url = self.table_url(table, &Query::new())?;
        let resp = self
            .request(Method::POST, url)
            .await
            .header("Prefer", "return=minimal")
            .json(&rows)
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }

    async fn update(&self, table: &str, query: &Query, patch: Value) -> Result<(), BackendError> {
        if query.filters.is_empty() {
            // An unfiltered PATCH would rewrite the whole table.
            return Err(BackendError::Parse(format!(
                "refusing unfiltered update on {}",
                table
            )));
        }
        let url = self.table_url(table, query)?;
        let resp = self
            .request(Method::PATCH, url)
            .await
            .header("Prefer", "return=minimal")
            .json(&patch)
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }

    async fn rpc(&self, function: &str, args: Value) -> Result<Value, BackendError> {
        let url = self.endpoint(&format!("rest/v1/rpc/{}", function))?;
        let resp = self
            .request(Method::POST, url)
            .await
            .json(&args)
            .send()
            .await?;
        let text = Self::check(resp).await?.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| BackendError::Parse(e.to_string()))
    }
}
