//! Shared type definitions for the local store.

use serde::Serialize;
use thiserror::Error;

/// Errors specific to local store operations.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Failed to create database directory: {0}")]
    CreateDir(std::io::Error),

    #[error("Schema migration failed: {0}")]
    Migration(String),
}

/// A row from `kv_flags`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DbFlag {
    pub key: String,
    pub value: String,
    pub updated_at: String,
}

/// Aggregate over `assistant_log`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantStats {
    pub total: i64,
    pub model_answers: i64,
    pub fallback_answers: i64,
    pub avg_latency_ms: Option<f64>,
}
