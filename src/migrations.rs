//! Local store schema upgrades.
//!
//! Schema steps live under `migrations/` and are compiled in. The store is
//! stamped with every step it has taken; opening it applies whatever this
//! build knows that the store hasn't seen yet, each step in its own
//! transaction.

use std::path::PathBuf;

use rusqlite::Connection;

/// One schema step: stamp number and the SQL that gets there.
type Step = (i32, &'static str);

const STEPS: &[Step] = &[(1, include_str!("migrations/001_baseline.sql"))];

fn latest_known() -> i32 {
    STEPS.iter().map(|(stamp, _)| *stamp).max().unwrap_or(0)
}

/// Highest stamp recorded in the store, creating the stamp table on first open.
fn stamped_version(conn: &Connection) -> Result<i32, String> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )
    .map_err(|e| format!("Cannot prepare schema stamps: {}", e))?;
    conn.query_row("SELECT IFNULL(MAX(version), 0) FROM schema_version", [], |row| row.get(0))
        .map_err(|e| format!("Cannot read schema stamp: {}", e))
}

/// Copy a file-backed store to `<file>.v<from>.bak` before it is upgraded.
/// Returns the copy's path, or `None` when there is nothing worth keeping.
fn snapshot_before_upgrade(conn: &Connection, from: i32) -> Result<Option<PathBuf>, String> {
    let Some(file) = conn.path().filter(|p| !p.is_empty()) else {
        return Ok(None);
    };
    if from == 0 {
        return Ok(None);
    }

    let target = PathBuf::from(format!("{}.v{}.bak", file, from));
    let mut copy = Connection::open(&target)
        .map_err(|e| format!("Cannot create {}: {}", target.display(), e))?;
    rusqlite::backup::Backup::new(conn, &mut copy)
        .and_then(|backup| backup.step(-1).map(|_| ()))
        .map_err(|e| format!("Snapshot before upgrade failed: {}", e))?;

    log::info!("Local store v{} saved to {}", from, target.display());
    Ok(Some(target))
}

/// Bring the store up to the newest schema this build knows.
///
/// Returns how many steps ran. A store stamped past `latest_known()` was
/// written by a newer release and is left untouched.
pub fn run_migrations(conn: &Connection) -> Result<usize, String> {
    let from = stamped_version(conn)?;
    let latest = latest_known();
    if from > latest {
        return Err(format!(
            "Local store is at schema v{} but this plannerdesk build stops at v{}; upgrade plannerdesk",
            from, latest
        ));
    }

    let todo: Vec<&Step> = STEPS.iter().filter(|(stamp, _)| *stamp > from).collect();
    if todo.is_empty() {
        return Ok(0);
    }
    snapshot_before_upgrade(conn, from)?;

    for (stamp, sql) in &todo {
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| format!("Cannot start schema v{}: {}", stamp, e))?;
        tx.execute_batch(sql)
            .map_err(|e| format!("Schema v{} failed: {}", stamp, e))?;
        tx.execute("INSERT INTO schema_version (version) VALUES (?1)", [stamp])
            .map_err(|e| format!("Cannot stamp schema v{}: {}", stamp, e))?;
        tx.commit()
            .map_err(|e| format!("Cannot commit schema v{}: {}", stamp, e))?;
        log::info!("Local store upgraded to schema v{}", stamp);
    }

    Ok(todo.len())
}
