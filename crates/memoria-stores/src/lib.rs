pub mod cache;
pub mod db;
pub mod error;
pub mod profile;
pub mod relational;
pub mod timeseries;
pub mod types;
pub mod vector;

pub use error::StoreError;

use std::sync::Mutex;

use rusqlite::Connection;

/// Handle to the single SQLite-backed database that plays the role of C3–C6.
/// Each store module takes a `&Connection`/`&mut Connection` directly;
/// `Stores` exists so callers holding one `Arc<Stores>` can reach every
/// table group through one lock, mirroring the reference stack's
/// single-`Mutex<Connection>` manager pattern.
pub struct Stores {
    conn: Mutex<Connection>,
}

impl Stores {
    pub fn open(path: &str) -> rusqlite::Result<Self> {
        let conn = Connection::open(path)?;
        db::init_db(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> rusqlite::Result<Self> {
        let conn = Connection::open_in_memory()?;
        db::init_db(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T, StoreError>) -> Result<T, StoreError> {
        let conn = self.conn.lock().expect("stores mutex poisoned");
        f(&conn)
    }

    pub fn with_conn_mut<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut conn = self.conn.lock().expect("stores mutex poisoned");
        f(&mut conn)
    }
}
