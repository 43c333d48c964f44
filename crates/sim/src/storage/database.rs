//! Low-level database operations and schema management.

pub use crate::errors::DatabaseError;
use log::warn;
use rusqlite::{Connection, Transaction};
use std::path::Path;

/// Database connection wrapper with schema management.
#[derive(Debug)]
pub struct Database {
    conn: Connection,
    db_path: String,
}

impl Database {
    /// Open (or create) a database at the specified path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DatabaseError> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        let conn =
            Connection::open(&path_str).map_err(|e| DatabaseError::Connection(e.to_string()))?;

        // Performance pragmas for faster bulk inserts
        conn.execute_batch(
            "PRAGMA synchronous = NORMAL;
             PRAGMA journal_mode = WAL;
             PRAGMA temp_store = MEMORY;
             PRAGMA cache_size = -64000;
             PRAGMA busy_timeout = 5000;",
        )
        .map_err(|e| DatabaseError::Initialization(e.to_string()))?;

        let mut db = Self {
            conn,
            db_path: path_str,
        };

        db.initialize_schema()?;
        Ok(db)
    }

    /// Open a database that must already exist.
    pub fn open_existing(path: impl AsRef<Path>) -> Result<Self, DatabaseError> {
        if !path.as_ref().exists() {
            return Err(DatabaseError::NotFound(format!(
                "database file {}",
                path.as_ref().display()
            )));
        }
        Self::open(path)
    }

    /// Initialize database schema.
    fn initialize_schema(&mut self) -> Result<(), DatabaseError> {
        self.conn
            .execute_batch(
                "-- One row per run; the full configuration is kept as JSON
                CREATE TABLE IF NOT EXISTS runs (
                    start_time TEXT PRIMARY KEY,
                    simulation_name TEXT NOT NULL,
                    config_json TEXT NOT NULL,
                    revived_from TEXT,
                    revived_generation INTEGER,
                    created_at TEXT NOT NULL
                );

                -- Completion marker of a checkpoint, written last
                CREATE TABLE IF NOT EXISTS checkpoints (
                    start_time TEXT NOT NULL,
                    generation INTEGER NOT NULL,
                    rng_state BLOB NOT NULL,
                    next_identity INTEGER NOT NULL,
                    populations TEXT NOT NULL,
                    organism_count INTEGER NOT NULL,
                    created_at TEXT NOT NULL,
                    PRIMARY KEY (start_time, generation)
                );

                -- ONE ROW PER ORGANISM
                CREATE TABLE IF NOT EXISTS organisms (
                    start_time TEXT NOT NULL,
                    generation INTEGER NOT NULL,
                    population TEXT NOT NULL,
                    position INTEGER NOT NULL,
                    identity INTEGER NOT NULL,
                    -- NULL for NaN; the data blob holds the exact value
                    fitness REAL,
                    x INTEGER NOT NULL,
                    y INTEGER NOT NULL,
                    z INTEGER NOT NULL,
                    data BLOB NOT NULL,
                    PRIMARY KEY (start_time, generation, population, position)
                );

                CREATE TABLE IF NOT EXISTS world (
                    start_time TEXT NOT NULL,
                    generation INTEGER NOT NULL,
                    snapshot TEXT NOT NULL,
                    pending_fossils BLOB,
                    PRIMARY KEY (start_time, generation)
                );

                -- Buried fossils; the same organism may be archived repeatedly
                CREATE TABLE IF NOT EXISTS fossils (
                    start_time TEXT NOT NULL,
                    generation INTEGER NOT NULL,
                    identity INTEGER NOT NULL,
                    population TEXT NOT NULL,
                    fitness REAL,
                    data BLOB NOT NULL
                );

                -- Indices
                CREATE INDEX IF NOT EXISTS idx_organisms_run_gen ON organisms(start_time, generation);
                CREATE INDEX IF NOT EXISTS idx_fossils_run ON fossils(start_time);",
            )
            .map_err(|e| DatabaseError::Initialization(e.to_string()))?;

        Ok(())
    }

    /// Begin a transaction for batched operations.
    pub fn transaction(&mut self) -> Result<Transaction<'_>, DatabaseError> {
        self.conn
            .transaction()
            .map_err(|e| DatabaseError::Transaction(e.to_string()))
    }

    /// Get reference to underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Get database path.
    pub fn path(&self) -> &str {
        &self.db_path
    }

    /// Close the database. WAL files are folded back and removed when no
    /// other connection holds the file.
    pub fn close(self) -> Result<(), DatabaseError> {
        let exclusive = match self.conn.execute_batch(
            "PRAGMA wal_checkpoint(TRUNCATE);
             PRAGMA journal_mode = DELETE;",
        ) {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to checkpoint WAL for {}: {e}", self.db_path);
                false
            }
        };

        self.conn
            .close()
            .map_err(|(_conn, e)| DatabaseError::Close(e.to_string()))?;

        if exclusive {
            for suffix in &["-wal", "-shm"] {
                let fname = format!("{}{}", self.db_path, suffix);
                if let Err(e) = std::fs::remove_file(&fname) {
                    if e.kind() != std::io::ErrorKind::NotFound {
                        warn!("Failed to remove {fname}: {e}");
                    }
                }
            }
        }

        Ok(())
    }

    /// Get database statistics.
    pub fn stats(&self) -> Result<DatabaseStats, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .map_err(|e| DatabaseError::Query(e.to_string()))?;

        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| DatabaseError::Query(e.to_string()))?;

        let mut tables = Vec::new();
        for row in rows {
            tables.push(row.map_err(|e| DatabaseError::Query(e.to_string()))?);
        }

        let count = |table: &str| -> Result<usize, DatabaseError> {
            self.conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                    row.get::<_, i64>(0)
                })
                .map(|n| n as usize)
                .map_err(|e| DatabaseError::Query(e.to_string()))
        };

        Ok(DatabaseStats {
            run_records: count("runs")?,
            checkpoint_records: count("checkpoints")?,
            organism_records: count("organisms")?,
            fossil_records: count("fossils")?,
            tables,
        })
    }
}

/// Database statistics.
#[derive(Debug, Clone)]
pub struct DatabaseStats {
    pub run_records: usize,
    pub checkpoint_records: usize,
    pub organism_records: usize,
    pub fossil_records: usize,
    pub tables: Vec<String>,
}
