// Credential persistence backed by a SQLite key-value table
//
// One row per integration key ("hubspot:credential", "xero:credential"),
// value is the JSON-serialized Credential. A save is a single UPSERT, so
// callers never observe a partial write.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{Connection, OptionalExtension};

use super::types::Credential;
use crate::error::{Result, SyncError};

/// Durable store for one credential per integration
pub struct CredentialStore {
    conn: Mutex<Connection>,
    key: String,
}

impl CredentialStore {
    /// Open (and create if needed) the credential database at `path`
    pub fn open(path: &Path, integration: &str) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SyncError::Storage(format!("create {}: {}", parent.display(), e)))?;
        }
        let conn = Connection::open(path)?;
        Self::with_connection(conn, integration)
    }

    /// In-memory store, used by tests and ephemeral sessions
    pub fn open_in_memory(integration: &str) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn, integration)
    }

    fn with_connection(conn: Connection, integration: &str) -> Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS sync_credentials (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
            key: format!("{}:credential", integration),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| SyncError::Storage("credential store lock poisoned".to_string()))
    }

    /// Read the persisted credential.
    ///
    /// Fails soft: a missing row, unreadable database or corrupt JSON value
    /// all yield `None` rather than an error, so a damaged store behaves
    /// like a never-configured one.
    pub fn load(&self) -> Option<Credential> {
        let conn = match self.lock() {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!("Credential store unavailable: {}", e);
                return None;
            }
        };

        let value: Option<String> = match conn
            .query_row(
                "SELECT value FROM sync_credentials WHERE key = ?1",
                [&self.key],
                |row| row.get(0),
            )
            .optional()
        {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key = %self.key, "Credential read failed: {}", e);
                return None;
            }
        };

        let value = value?;
        match serde_json::from_str(&value) {
            Ok(cred) => Some(cred),
            Err(e) => {
                tracing::warn!(key = %self.key, "Stored credential is corrupt: {}", e);
                None
            }
        }
    }

    /// Overwrite the persisted credential in one statement
    pub fn save(&self, credential: &Credential) -> Result<()> {
        let value = serde_json::to_string(credential)
            .map_err(|e| SyncError::Storage(format!("serialize credential: {}", e)))?;

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO sync_credentials (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            [&self.key, &value],
        )?;
        Ok(())
    }

    /// Remove the persisted credential (disconnect path)
    pub fn delete(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM sync_credentials WHERE key = ?1", [&self.key])?;
        Ok(())
    }

    /// True iff a credential exists AND its expiry is strictly in the future.
    ///
    /// Narrow by design: a stored credential with an expired access token but
    /// a valid refresh token reports `false` here even though a refresh may
    /// still succeed. Callers must not treat `false` as "needs
    /// re-authentication" without attempting a refresh first.
    pub fn is_configured(&self) -> bool {
        self.load().map(|c| c.is_fresh()).unwrap_or(false)
    }
}
