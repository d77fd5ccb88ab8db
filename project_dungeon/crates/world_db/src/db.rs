use std::path::Path;

use parking_lot::Mutex;
use rusqlite::Connection;

use crate::error::WorldDbError;
use crate::schema;

/// Database handle implementing `WorldStore`, `PlayerStore` and `MobStore`.
///
/// One connection behind a mutex: every store call is a single short
/// statement run under the lock.
pub struct WorldDb {
    pub(crate) conn: Mutex<Connection>,
}

impl WorldDb {
    /// Open (or create) a database at the given file path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, WorldDbError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        schema::create_tables(&conn)?;
        tracing::info!(path = %path.display(), "world database opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing).
    pub fn open_memory() -> Result<Self, WorldDbError> {
        let conn = Connection::open_in_memory()?;
        schema::create_tables(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}
