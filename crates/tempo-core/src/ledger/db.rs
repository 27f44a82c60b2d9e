//! SQLite-backed ledger implementation.
//!
//! Handles connection, migrations, and timestamp helpers. Job CRUD lives in
//! `jobs`, day-task persistence in `tasks`.

use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};
use tokio::sync::Mutex;

/// Percent-encode a path for use in a sqlite:// URI so spaces and special chars don't break parsing.
fn path_to_sqlite_uri(path: &Path) -> String {
    let s = path.to_string_lossy();
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '%' => out.push_str("%25"),
            ' ' => out.push_str("%20"),
            '#' => out.push_str("%23"),
            '?' => out.push_str("%3F"),
            '&' => out.push_str("%26"),
            c => out.push(c),
        }
    }
    format!("sqlite://{}", out)
}

/// Handle to the job ledger.
///
/// The database file is stored under the XDG state directory:
/// `~/.local/state/tempo/ledger.db`. Writes are serialized through one lock
/// so concurrent workers never interleave multi-statement updates.
#[derive(Clone)]
pub struct Ledger {
    pub(crate) pool: Pool<Sqlite>,
    pub(crate) writer: Arc<Mutex<()>>,
}

impl Ledger {
    /// Open (or create) the default ledger and run migrations.
    pub async fn open_default() -> Result<Self> {
        let xdg_dirs = xdg::BaseDirectories::with_prefix("tempo")?;
        let db_path = xdg_dirs.place_state_file("ledger.db")?;
        Self::open_at(db_path).await
    }

    /// Open (or create) the ledger at a specific path. Creates parent dirs if needed.
    pub async fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let uri = path_to_sqlite_uri(path) + "?mode=rwc";
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect(&uri)
            .await
            .with_context(|| format!("failed to open ledger at {}", path.display()))?;
        let ledger = Self::from_pool(pool);
        ledger.migrate().await?;
        Ok(ledger)
    }

    fn from_pool(pool: Pool<Sqlite>) -> Self {
        Ledger {
            pool,
            writer: Arc::new(Mutex::new(())),
        }
    }

    async fn migrate(&self) -> Result<()> {
        // - `region_json`, `selection_json`, `auth_json` hold the immutable job
        //   parameters as JSON.
        // - `not_before` is unix millis; NULL means claimable now.
        // - `artifacts_json` lists cache-relative paths of a Done day.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                region_json TEXT NOT NULL,
                selection_json TEXT NOT NULL,
                start_date TEXT NOT NULL,
                end_date TEXT NOT NULL,
                hours_json TEXT NOT NULL,
                weekdays INTEGER NOT NULL,
                workers INTEGER NOT NULL,
                auth_json TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                fatal_error TEXT
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS day_tasks (
                job_id INTEGER NOT NULL REFERENCES jobs(id) ON DELETE CASCADE,
                date TEXT NOT NULL,
                status TEXT NOT NULL,
                attempts INTEGER NOT NULL DEFAULT 0,
                last_error TEXT,
                artifacts_json TEXT NOT NULL DEFAULT '[]',
                not_before INTEGER,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (job_id, date)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Current time as Unix seconds (for DB timestamps).
pub(crate) fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[cfg(test)]
/// Open an in-memory ledger for tests (no disk I/O).
pub(crate) async fn open_memory() -> Result<Ledger> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    let ledger = Ledger::from_pool(pool);
    ledger.migrate().await?;
    Ok(ledger)
}
