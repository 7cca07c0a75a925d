use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::Notify;

use crate::assistant::provider::{HttpInferenceProvider, InferenceProvider};
use crate::backend::{BackendClient, DataSource, Session, SessionStore, Unconfigured};
use crate::db::{DbError, LocalDb};
use crate::types::{Config, PriorityWeights};

/// Local-store flag holding weights saved from the settings screen.
pub const WEIGHTS_FLAG: &str = "settings.priority_weights";

/// The local store, shared with the backend client's session persistence.
pub type SharedDb = Arc<Mutex<Option<LocalDb>>>;

/// Application state shared by the HTTP handlers and the background poller.
pub struct AppState {
    pub config: RwLock<Config>,
    pub db: SharedDb,
    /// Table/RPC access; the REST client, or a stand-in when unconfigured.
    pub backend: Arc<dyn DataSource>,
    /// Auth and storage need the concrete client.
    pub client: Option<Arc<BackendClient>>,
    pub provider: Arc<dyn InferenceProvider>,
    /// Wakes the follow-up poller for an immediate sweep.
    pub follow_up_wake: Notify,
    /// Held for a whole follow-up sync so the poller and the sync endpoint
    /// never emit the same reminder twice.
    pub sweep_lock: tokio::sync::Mutex<()>,
}

/// Persists client sessions into the `auth_session` table.
pub struct DbSessionStore(pub SharedDb);

impl SessionStore for DbSessionStore {
    fn save(&self, session: &Session) {
        if let Some(Err(e)) = self.0.lock().as_ref().map(|db| db.save_session(session)) {
            log::warn!("Failed to persist session: {}", e);
        }
    }

    fn clear(&self) {
        if let Some(Err(e)) = self.0.lock().as_ref().map(|db| db.clear_session()) {
            log::warn!("Failed to clear stored session: {}", e);
        }
    }
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let db = match LocalDb::open() {
            Ok(db) => Some(db),
            Err(e) => {
                log::warn!("Failed to open local database: {e}. Session and flag persistence disabled.");
                None
            }
        };

        let db: SharedDb = Arc::new(Mutex::new(db));

        let (backend, client): (Arc<dyn DataSource>, Option<Arc<BackendClient>>) =
            match BackendClient::new(&config.backend) {
                Ok(client) => {
                    let client = Arc::new(
                        client.with_session_store(Arc::new(DbSessionStore(db.clone()))),
                    );
                    let stored = db.lock().as_ref().and_then(|db| db.load_session().ok().flatten());
                    if let Some(session) = stored {
                        log::info!("Restored session for user {}", session.user_id);
                        client.restore_session(Some(session));
                    }
                    let backend: Arc<dyn DataSource> = client.clone();
                    (backend, Some(client))
                }
                Err(e) => {
                    log::warn!("Backend unavailable: {}. Data endpoints will return empty lists.", e);
                    let backend: Arc<dyn DataSource> = Arc::new(Unconfigured(e.to_string()));
                    (backend, None)
                }
            };

        let provider: Arc<dyn InferenceProvider> =
            Arc::from(HttpInferenceProvider::from_config(&config.ai));

        Self::assemble(config, db, backend, client, provider)
    }

    pub fn assemble(
        mut config: Config,
        db: SharedDb,
        backend: Arc<dyn DataSource>,
        client: Option<Arc<BackendClient>>,
        provider: Arc<dyn InferenceProvider>,
    ) -> Self {
        if let Some(weights) = db.lock().as_ref().and_then(load_saved_weights) {
            config.pipeline.weights = weights;
        }
        Self {
            config: RwLock::new(config),
            db,
            backend,
            client,
            provider,
            follow_up_wake: Notify::new(),
            sweep_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Snapshot of the current config.
    pub fn config(&self) -> Config {
        self.config.read().clone()
    }

    /// Run `f` against the local store. `None` when the store failed to open.
    pub fn with_db<T>(&self, f: impl FnOnce(&LocalDb) -> Result<T, DbError>) -> Option<Result<T, DbError>> {
        let guard = self.db.lock();
        guard.as_ref().map(f)
    }

    /// Replace the priority weights in memory and persist them to the local store.
    pub fn set_weights(&self, weights: PriorityWeights) -> Result<PriorityWeights, DbError> {
        let weights = weights.clamped();
        if let Some(result) = self.with_db(|db| {
            let json = serde_json::to_string(&weights).unwrap_or_default();
            db.set_flag(WEIGHTS_FLAG, &json)
        }) {
            result?;
        }
        self.config.write().pipeline.weights = weights;
        log::info!("Priority weights updated: {:?}", weights);
        Ok(weights)
    }
}

fn load_saved_weights(db: &LocalDb) -> Option<PriorityWeights> {
    let flag = db.get_flag(WEIGHTS_FLAG).ok().flatten()?;
    match serde_json::from_str::<PriorityWeights>(&flag.value) {
        Ok(weights) => Some(weights.clamped()),
        Err(e) => {
            log::warn!("Ignoring saved priority weights: {}", e);
            None
        }
    }
}

/// Config path: `PLANNERDESK_CONFIG` or `~/.plannerdesk/config.json`.
pub fn config_path() -> Result<PathBuf, String> {
    if let Ok(path) = std::env::var("PLANNERDESK_CONFIG") {
        if !path.trim().is_empty() {
            return Ok(PathBuf::from(path));
        }
    }
    let home = dirs::home_dir().ok_or("Could not find home directory")?;
    Ok(home.join(".plannerdesk").join("config.json"))
}

/// Load configuration from disk, then apply environment overrides.
///
/// A missing file is not an error: defaults are used.
pub fn load_config() -> Result<Config, String> {
    let config_path = config_path()?;

    let config = if config_path.exists() {
        let content = fs::read_to_string(&config_path)
            .map_err(|e| format!("Failed to read config: {}", e))?;
        parse_config(&content)?
    } else {
        log::info!(
            "No config file at {}, using defaults",
            config_path.display()
        );
        Config::default()
    };

    Ok(apply_env_overrides(config, |key| std::env::var(key).ok()))
}

pub fn parse_config(content: &str) -> Result<Config, String> {
    serde_json::from_str(content).map_err(|e| format!("Failed to parse config: {}", e))
}

/// Secrets and deployment knobs usually come from the environment.
pub fn apply_env_overrides(mut config: Config, env: impl Fn(&str) -> Option<String>) -> Config {
    let set = |key: &str| env(key).filter(|v| !v.trim().is_empty());

    if let Some(url) = set("PLANNERDESK_BACKEND_URL") {
        config.backend.url = url;
    }
    if let Some(key) = set("PLANNERDESK_BACKEND_KEY") {
        config.backend.api_key = Some(key);
    }
    if let Some(key) = set("PLANNERDESK_AI_KEY") {
        config.ai.api_key = Some(key);
    }
    if let Some(port) = set("PLANNERDESK_PORT") {
        match port.trim().parse::<u16>() {
            Ok(port) => config.server.port = port,
            Err(_) => log::warn!("Ignoring invalid PLANNERDESK_PORT '{}'", port),
        }
    }
    config
}

#[cfg(test)]
pub mod test_utils {
    use super::*;
    use crate::assistant::provider::DisabledProvider;

    /// State over the given backend with a throwaway local store.
    pub fn test_state(
        backend: Arc<dyn DataSource>,
        provider: Option<Arc<dyn InferenceProvider>>,
    ) -> Arc<AppState> {
        Arc::new(AppState::assemble(
            Config::default(),
            Arc::new(Mutex::new(Some(crate::db::test_utils::test_db()))),
            backend,
            None,
            provider.unwrap_or_else(|| Arc::new(DisabledProvider) as Arc<dyn InferenceProvider>),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn env_overrides_secrets_and_port() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("PLANNERDESK_BACKEND_URL", "https://proj.example.co"),
            ("PLANNERDESK_BACKEND_KEY", "anon-key"),
            ("PLANNERDESK_AI_KEY", "sk-1"),
            ("PLANNERDESK_PORT", "9000"),
        ]);
        let config = apply_env_overrides(Config::default(), |k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.backend.url, "https://proj.example.co");
        assert_eq!(config.backend.api_key.as_deref(), Some("anon-key"));
        assert_eq!(config.ai.api_key.as_deref(), Some("sk-1"));
        assert_eq!(config.server.port, 9000);
    }

    #[test]
    fn bad_port_and_blank_values_are_ignored() {
        let env: HashMap<&str, &str> =
            HashMap::from([("PLANNERDESK_PORT", "nope"), ("PLANNERDESK_AI_KEY", "  ")]);
        let config = apply_env_overrides(Config::default(), |k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.server.port, 8787);
        assert!(config.ai.api_key.is_none());
    }

    #[test]
    fn parse_config_reads_camel_case() {
        let config = parse_config(
            r#"{ "backend": { "url": "https://x.example.co" },
                 "pipeline": { "weights": { "stage": 10 }, "priorityLimit": 5 },
                 "currencySymbol": "R$" }"#,
        )
        .unwrap();
        assert_eq!(config.pipeline.priority_limit, 5);
        assert_eq!(config.pipeline.weights.stage, 10.0);
        assert_eq!(config.pipeline.weights.overdue_follow_up, 30.0);
        assert_eq!(config.currency_symbol, "R$");
        assert_eq!(config.backend.contracts_bucket, "contracts");
        assert!(parse_config("{ not json").is_err());
    }

    #[test]
    fn saved_weights_survive_restart() {
        let state = test_utils::test_state(Arc::new(Unconfigured("test".into())), None);
        let saved = state
            .set_weights(PriorityWeights {
                stage: -5.0,
                overdue_follow_up: 40.0,
                upcoming_event: 10.0,
                stale_interaction: 5.0,
            })
            .unwrap();
        assert_eq!(saved.stage, 0.0);
        assert_eq!(state.config().pipeline.weights, saved);

        let db = state.db.lock().take().unwrap();
        let restarted = AppState::assemble(
            Config::default(),
            Arc::new(Mutex::new(Some(db))),
            Arc::new(Unconfigured("test".into())),
            None,
            Arc::new(crate::assistant::provider::DisabledProvider),
        );
        assert_eq!(restarted.config().pipeline.weights, saved);
    }

    #[test]
    fn db_session_store_writes_through() {
        let db: SharedDb = Arc::new(Mutex::new(Some(crate::db::test_utils::test_db())));
        let store = DbSessionStore(db.clone());
        let session = Session {
            access_token: "A2".to_string(),
            refresh_token: "R3".to_string(),
            expires_at: 4_000_000_000,
            user_id: "u1".to_string(),
            email: Some("planner@example.com".to_string()),
        };

        store.save(&session);
        let loaded = db.lock().as_ref().unwrap().load_session().unwrap();
        assert_eq!(loaded, Some(session));

        store.clear();
        assert!(db.lock().as_ref().unwrap().load_session().unwrap().is_none());

        // A missing store is tolerated.
        let detached = DbSessionStore(Arc::new(Mutex::new(None)));
        detached.clear();
    }
}
