pub mod leads;
pub mod managers;

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// Thread-safe SQLite store for managers and leads.
#[derive(Clone)]
pub struct LeadStore {
    conn: Arc<Mutex<Connection>>,
}

impl LeadStore {
    /// Open or create the SQLite database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;

        // WAL for better concurrent read performance; journal_mode always
        // returns the resulting mode, so use query_row.
        let _: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;

        Self::run_migrations(&conn)?;

        info!("Lead store initialized at: {}", path.display());
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Self::run_migrations(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub(crate) fn connection(&self) -> Arc<Mutex<Connection>> {
        self.conn.clone()
    }

    fn run_migrations(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS managers (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                telegram_id INTEGER,
                group_chat_id INTEGER,
                active INTEGER NOT NULL DEFAULT 1
            );

            CREATE INDEX IF NOT EXISTS idx_managers_active
                ON managers(active, name);

            CREATE TABLE IF NOT EXISTS leads (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL,
                source TEXT NOT NULL,
                name TEXT NOT NULL,
                phone TEXT,
                telegram TEXT,
                whatsapp TEXT,
                messenger_max TEXT,
                vk TEXT,
                email TEXT,
                weight_kg REAL,
                height_cm REAL,
                bmi REAL,
                lead_type TEXT NOT NULL,
                manager_id TEXT REFERENCES managers(id),
                status TEXT NOT NULL,
                comment TEXT,
                created_by INTEGER NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_leads_manager
                ON leads(manager_id, created_at);
            ",
        )
        .context("Failed to run migrations")?;

        Ok(())
    }
}
