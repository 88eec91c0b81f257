//! SQLite-backed publication table for directory endpoints.

use crate::config::RegistryConfig;
use crate::directory::DirectoryLookup;
use crate::endpoint::EndpointDescriptor;
use crate::{LocatorError, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Same-host registry of published directory endpoints.
///
/// One row per directory name. Uses WAL mode so the publishing process and
/// any number of looking-up processes can share the file, and
/// `Arc<Mutex<Connection>>` for thread safety within a process. Clones share
/// the connection.
///
/// As a [`DirectoryLookup`], a registry answers for the name it is bound to
/// (see [`with_name`](Self::with_name)).
#[derive(Clone)]
pub struct RegistryLookup {
    conn: Arc<Mutex<Connection>>,
    name: String,
}

impl RegistryLookup {
    /// Open the registry at the default platform location.
    ///
    /// Creates the database and parent directories if they don't exist.
    pub fn open() -> Result<Self> {
        let db_path = crate::platform::registry_db_path()?;
        Self::open_at(&db_path)
    }

    /// Open the registry at a specific path.
    pub fn open_at(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| LocatorError::Io {
                    message: format!(
                        "Failed to create registry directory: {}",
                        parent.display()
                    ),
                    path: Some(parent.to_path_buf()),
                    source: Some(e),
                })?;
            }
        }

        let conn = Connection::open(db_path)?;
        Self::configure_connection(&conn)?;
        Self::ensure_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            name: RegistryConfig::DEFAULT_DIRECTORY_NAME.to_string(),
        })
    }

    /// Bind lookups to another directory name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn configure_connection(conn: &Connection) -> Result<()> {
        conn.execute_batch(&format!(
            "PRAGMA journal_mode=WAL;\n\
             PRAGMA busy_timeout={};\n\
             PRAGMA synchronous=NORMAL;",
            RegistryConfig::BUSY_TIMEOUT_MS,
        ))?;
        Ok(())
    }

    fn ensure_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS directories (
                name TEXT PRIMARY KEY,
                pid INTEGER NOT NULL,
                address TEXT NOT NULL,
                interface TEXT NOT NULL,
                published_at TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    fn lock_conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| LocatorError::Database {
            message: "Failed to acquire registry connection lock".to_string(),
            source: None,
        })
    }

    /// Publish (or replace) the descriptor stored under `descriptor.name`.
    pub fn publish(&self, descriptor: &EndpointDescriptor) -> Result<()> {
        if descriptor.address.is_empty() {
            return Err(LocatorError::Descriptor {
                message: format!("descriptor '{}' has an empty address", descriptor.name),
                source: None,
            });
        }

        let conn = self.lock_conn()?;
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO directories (name, pid, address, interface, published_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(name) DO UPDATE SET
                 pid=excluded.pid,
                 address=excluded.address,
                 interface=excluded.interface,
                 published_at=excluded.published_at",
            params![
                descriptor.name,
                descriptor.pid,
                descriptor.address,
                descriptor.interface,
                now
            ],
        )?;

        debug!(
            "Published directory '{}': PID {} at {}",
            descriptor.name, descriptor.pid, descriptor.address
        );
        Ok(())
    }

    /// Remove the descriptor published under `name`.
    pub fn withdraw(&self, name: &str) -> Result<bool> {
        let conn = self.lock_conn()?;
        let rows = conn.execute("DELETE FROM directories WHERE name = ?1", params![name])?;
        if rows > 0 {
            debug!("Withdrew directory '{}'", name);
        }
        Ok(rows > 0)
    }

    pub fn get(&self, name: &str) -> Result<Option<EndpointDescriptor>> {
        let conn = self.lock_conn()?;
        let result = conn
            .query_row(
                "SELECT name, pid, address, interface, published_at
                 FROM directories WHERE name = ?1",
                params![name],
                |row| {
                    Ok(EndpointDescriptor {
                        name: row.get(0)?,
                        pid: row.get(1)?,
                        address: row.get(2)?,
                        interface: row.get(3)?,
                        published_at: Some(row.get(4)?),
                    })
                },
            )
            .optional()?;
        Ok(result)
    }

    /// Every published descriptor, ordered by name.
    pub fn list(&self) -> Result<Vec<EndpointDescriptor>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            "SELECT name, pid, address, interface, published_at
             FROM directories ORDER BY name",
        )?;
        let entries = stmt
            .query_map([], |row| {
                Ok(EndpointDescriptor {
                    name: row.get(0)?,
                    pid: row.get(1)?,
                    address: row.get(2)?,
                    interface: row.get(3)?,
                    published_at: Some(row.get(4)?),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Remove descriptors whose publishing process is no longer running.
    pub fn cleanup_stale(&self) -> Result<usize> {
        let conn = self.lock_conn()?;

        let mut stmt = conn.prepare("SELECT name, pid FROM directories")?;
        let entries: Vec<(String, u32)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        drop(stmt);

        let mut removed = 0;
        for (name, pid) in &entries {
            if !crate::platform::is_process_alive(*pid) {
                conn.execute("DELETE FROM directories WHERE name = ?1", params![name])?;
                removed += 1;
                debug!("Cleaned up stale directory '{}': PID {} (dead)", name, pid);
            }
        }

        Ok(removed)
    }
}

impl DirectoryLookup for RegistryLookup {
    fn locate(&self) -> Result<Vec<u8>> {
        let descriptor = self
            .get(&self.name)?
            .ok_or_else(|| LocatorError::DirectoryUnavailable {
                message: format!("no directory published as '{}'", self.name),
            })?;

        if !crate::platform::is_process_alive(descriptor.pid) {
            return Err(LocatorError::DirectoryUnavailable {
                message: format!(
                    "directory '{}' was published by PID {}, which is not running",
                    descriptor.name, descriptor.pid
                ),
            });
        }

        descriptor.to_bytes()
    }
}

impl std::fmt::Debug for RegistryLookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryLookup")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
