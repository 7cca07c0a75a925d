//! Access to the hosted backend-as-a-service.
//!
//! Everything the dashboard stores lives in the backend's relational tables.
//! Services talk to it through the `DataSource` trait so the same code runs
//! against the REST client in production and an in-memory table set in tests.

pub mod client;
#[cfg(test)]
pub mod memory;
pub mod query;

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

pub use client::{BackendClient, Session, SessionStore};
pub use query::Query;

/// Errors from backend calls.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Backend is not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Not authorized for this request")]
    Unauthorized,

    #[error("Backend error {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Failed to parse backend response: {0}")]
    Parse(String),

    #[error("Storage path outside its bucket: {0}")]
    InvalidObjectPath(String),
}

impl BackendError {
    /// Returns true if the same call could succeed a moment later.
    pub fn is_retryable(&self) -> bool {
        match self {
            BackendError::Network(_) => true,
            BackendError::Http { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            BackendError::Parse(err.to_string())
        } else {
            BackendError::Network(err.to_string())
        }
    }
}

/// Generic table/RPC access, the only surface services depend on.
#[async_trait::async_trait]
pub trait DataSource: Send + Sync {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>, BackendError>;

    async fn insert(&self, table: &str, rows: Vec<Value>) -> Result<(), BackendError>;

    async fn update(&self, table: &str, query: &Query, patch: Value) -> Result<(), BackendError>;

    async fn rpc(&self, function: &str, args: Value) -> Result<Value, BackendError>;
}

/// Stand-in used when no backend is configured. Every call fails with the
/// reason, so list screens render empty and writes report it.
pub struct Unconfigured(pub String);

#[async_trait::async_trait]
impl DataSource for Unconfigured {
    async fn select(&self, _table: &str, _query: &Query) -> Result<Vec<Value>, BackendError> {
        Err(BackendError::NotConfigured(self.0.clone()))
    }

    async fn insert(&self, _table: &str, _rows: Vec<Value>) -> Result<(), BackendError> {
        Err(BackendError::NotConfigured(self.0.clone()))
    }

    async fn update(&self, _table: &str, _query: &Query, _patch: Value) -> Result<(), BackendError> {
        Err(BackendError::NotConfigured(self.0.clone()))
    }

    async fn rpc(&self, _function: &str, _args: Value) -> Result<Value, BackendError> {
        Err(BackendError::NotConfigured(self.0.clone()))
    }
}

/// Select and deserialize rows. Rows that don't match `T` are skipped with a
/// warning so one malformed record doesn't blank a whole screen.
pub async fn select_rows<T: DeserializeOwned>(
    source: &dyn DataSource,
    table: &str,
    query: &Query,
) -> Result<Vec<T>, BackendError> {
    let raw = source.select(table, query).await?;
    let total = raw.len();
    let rows: Vec<T> = raw
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<T>(value) {
            Ok(row) => Some(row),
            Err(e) => {
                log::warn!("Skipping malformed {} row: {}", table, e);
                None
            }
        })
        .collect();
    if rows.len() < total {
        log::debug!("{}: kept {} of {} rows", table, rows.len(), total);
    }
    Ok(rows)
}

/// Like `select_rows`, but a failed query degrades to an empty list.
///
/// List screens render empty instead of erroring; the failure is logged.
pub async fn select_or_empty<T: DeserializeOwned>(
    source: &dyn DataSource,
    table: &str,
    query: &Query,
) -> Vec<T> {
    match select_rows(source, table, query).await {
        Ok(rows) => rows,
        Err(e) => {
            log::warn!("Query on {} failed, rendering empty list: {}", table, e);
            Vec::new()
        }
    }
}
