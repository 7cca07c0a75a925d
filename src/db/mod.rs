//! SQLite-based local state.
//!
//! The database lives at `~/.plannerdesk/plannerdesk.db`. It replaces the
//! browser's local key-value storage (session and consent flags) and keeps the
//! bookkeeping the follow-up sweep and the assistant need between restarts.
//! Business data is never stored here; it belongs to the hosted backend.

use std::path::PathBuf;

use rusqlite::{params, Connection, OptionalExtension};

use crate::backend::Session;

pub mod types;
pub use types::*;

/// Dedup window for emitted follow-ups.
pub const FOLLOW_UP_DEDUP_DAYS: i64 = 7;

pub struct LocalDb {
    conn: Connection,
}

impl LocalDb {
    /// Borrow the underlying connection for ad-hoc queries.
    pub fn conn_ref(&self) -> &Connection {
        &self.conn
    }

    /// Open (or create) the database at `~/.plannerdesk/plannerdesk.db` and apply the schema.
    pub fn open() -> Result<Self, DbError> {
        let path = Self::db_path()?;
        Self::open_at(path)
    }

    /// Open a database at an explicit path. Useful for testing.
    pub fn open_at(path: PathBuf) -> Result<Self, DbError> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(DbError::CreateDir)?;
            }
        }

        let conn = Connection::open(&path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        crate::migrations::run_migrations(&conn).map_err(DbError::Migration)?;

        Ok(Self { conn })
    }

    fn db_path() -> Result<PathBuf, DbError> {
        let home = dirs::home_dir().ok_or(DbError::HomeDirNotFound)?;
        Ok(home.join(".plannerdesk").join("plannerdesk.db"))
    }

    // -------------------------------------------------------------------------
    // Flags (session / consent / UI toggles)
    // -------------------------------------------------------------------------

    pub fn get_flag(&self, key: &str) -> Result<Option<DbFlag>, DbError> {
        let flag = self
            .conn
            .query_row(
                "SELECT key, value, updated_at FROM kv_flags WHERE key = ?1",
                params![key],
                |row| {
                    Ok(DbFlag {
                        key: row.get(0)?,
                        value: row.get(1)?,
                        updated_at: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(flag)
    }

    pub fn set_flag(&self, key: &str, value: &str) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO kv_flags (key, value, updated_at) VALUES (?1, ?2, datetime('now'))
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value],
        )?;
        Ok(())
    }

    /// Returns true if a flag was removed.
    pub fn remove_flag(&self, key: &str) -> Result<bool, DbError> {
        let n = self
            .conn
            .execute("DELETE FROM kv_flags WHERE key = ?1", params![key])?;
        Ok(n > 0)
    }

    // -------------------------------------------------------------------------
    // Auth session
    // -------------------------------------------------------------------------

    pub fn save_session(&self, session: &Session) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO auth_session (id, access_token, refresh_token, expires_at, user_id, email, saved_at)
             VALUES (1, ?1, ?2, ?3, ?4, ?5, datetime('now'))
             ON CONFLICT(id) DO UPDATE SET
                 access_token = excluded.access_token,
                 refresh_token = excluded.refresh_token,
                 expires_at = excluded.expires_at,
                 user_id = excluded.user_id,
                 email = excluded.email,
                 saved_at = excluded.saved_at",
            params![
                session.access_token,
                session.refresh_token,
                session.expires_at,
                session.user_id,
                session.email,
            ],
        )?;
        Ok(())
    }

    pub fn load_session(&self) -> Result<Option<Session>, DbError> {
        let session = self
            .conn
            .query_row(
                "SELECT access_token, refresh_token, expires_at, user_id, email
                 FROM auth_session WHERE id = 1",
                [],
                |row| {
                    Ok(Session {
                        access_token: row.get(0)?,
                        refresh_token: row.get(1)?,
                        expires_at: row.get(2)?,
                        user_id: row.get(3)?,
                        email: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(session)
    }

    pub fn clear_session(&self) -> Result<(), DbError> {
        self.conn.execute("DELETE FROM auth_session", [])?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Follow-up dedup
    // -------------------------------------------------------------------------

    /// Check if this fingerprint was emitted within the dedup window.
    pub fn is_recently_emitted(&self, fingerprint: &str) -> bool {
        self.conn
            .query_row(
                "SELECT 1 FROM follow_up_emissions
                 WHERE fingerprint = ?1
                   AND created_at >= datetime('now', ?2)",
                params![fingerprint, format!("-{} days", FOLLOW_UP_DEDUP_DAYS)],
                |_| Ok(()),
            )
            .is_ok()
    }

    pub fn record_follow_up(
        &self,
        fingerprint: &str,
        lead_id: &str,
        kind: &str,
        due_date: &str,
    ) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO follow_up_emissions (fingerprint, lead_id, kind, due_date, created_at)
             VALUES (?1, ?2, ?3, ?4, datetime('now'))
             ON CONFLICT(fingerprint) DO UPDATE SET created_at = excluded.created_at",
            params![fingerprint, lead_id, kind, due_date],
        )?;
        Ok(())
    }

    /// Drop emissions older than the dedup window. Returns rows removed.
    pub fn prune_follow_up_emissions(&self) -> Result<usize, DbError> {
        let n = self.conn.execute(
            "DELETE FROM follow_up_emissions WHERE created_at < datetime('now', ?1)",
            params![format!("-{} days", FOLLOW_UP_DEDUP_DAYS)],
        )?;
        Ok(n)
    }

    // -------------------------------------------------------------------------
    // Assistant log
    // -------------------------------------------------------------------------

    pub fn log_assistant_answer(
        &self,
        bucket: &str,
        source: &str,
        fallback_reason: Option<&str>,
        latency_ms: u64,
    ) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO assistant_log (id, bucket, source, fallback_reason, latency_ms)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                format!("al-{}", uuid::Uuid::new_v4()),
                bucket,
                source,
                fallback_reason,
                latency_ms as i64,
            ],
        )?;
        Ok(())
    }

    pub fn assistant_stats(&self) -> Result<AssistantStats, DbError> {
        let stats = self.conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(CASE WHEN source = 'model' THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN source = 'fallback' THEN 1 ELSE 0 END), 0),
                    AVG(latency_ms)
             FROM assistant_log",
            [],
            |row| {
                Ok(AssistantStats {
                    total: row.get(0)?,
                    model_answers: row.get(1)?,
                    fallback_answers: row.get(2)?,
                    avg_latency_ms: row.get(3)?,
                })
            },
        )?;
        Ok(stats)
    }
}


#[cfg(test)]
mod tests {
    use super::test_utils::test_db;
    use super::*;

    #[test]
    fn flags_round_trip_and_overwrite() {
        let db = test_db();
        assert!(db.get_flag("consent.analytics").unwrap().is_none());

        db.set_flag("consent.analytics", "granted").unwrap();
        db.set_flag("consent.analytics", "denied").unwrap();
        let flag = db.get_flag("consent.analytics").unwrap().expect("flag");
        assert_eq!(flag.value, "denied");

        assert!(db.remove_flag("consent.analytics").unwrap());
        assert!(!db.remove_flag("consent.analytics").unwrap());
    }

    #[test]
    fn session_is_single_row() {
        let db = test_db();
        assert!(db.load_session().unwrap().is_none());

        let mut session = Session {
            access_token: "a1".to_string(),
            refresh_token: "r1".to_string(),
            expires_at: 1_900_000_000,
            user_id: "u1".to_string(),
            email: Some("planner@example.com".to_string()),
        };
        db.save_session(&session).unwrap();
        session.access_token = "a2".to_string();
        db.save_session(&session).unwrap();

        assert_eq!(db.load_session().unwrap(), Some(session));
        db.clear_session().unwrap();
        assert!(db.load_session().unwrap().is_none());
    }

    #[test]
    fn follow_up_dedup_window() {
        let db = test_db();
        assert!(!db.is_recently_emitted("fp1"));
        db.record_follow_up("fp1", "l1", "stage_cadence", "2026-03-06")
            .unwrap();
        assert!(db.is_recently_emitted("fp1"));

        db.conn_ref()
            .execute(
                "UPDATE follow_up_emissions SET created_at = datetime('now', '-8 days')
                 WHERE fingerprint = 'fp1'",
                [],
            )
            .unwrap();
        assert!(!db.is_recently_emitted("fp1"));
        assert_eq!(db.prune_follow_up_emissions().unwrap(), 1);
    }

    #[test]
    fn assistant_stats_split_by_source() {
        let db = test_db();
        assert_eq!(db.assistant_stats().unwrap().total, 0);
        assert!(db.assistant_stats().unwrap().avg_latency_ms.is_none());

        db.log_assistant_answer("finance", "model", None, 100).unwrap();
        db.log_assistant_answer("generic", "fallback", Some("timeout"), 300)
            .unwrap();
        let stats = db.assistant_stats().unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.model_answers, 1);
        assert_eq!(stats.fallback_answers, 1);
        assert_eq!(stats.avg_latency_ms, Some(200.0));
    }
}
