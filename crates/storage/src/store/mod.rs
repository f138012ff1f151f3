#![forbid(unsafe_code)]

mod error;
mod unit_store;

pub use error::StoreError;
pub use unit_store::UnitStore;

use rusqlite::{Connection, OptionalExtension, params};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use sz_core::{ProjectConfig, Unit};

const SCHEMA_VERSION: i64 = 1;
const DB_FILE_NAME: &str = "syzygy.db";

#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
    storage_dir: PathBuf,
}

impl SqliteStore {
    pub fn open(storage_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let storage_dir = storage_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&storage_dir)?;

        let db_path = storage_dir.join(DB_FILE_NAME);
        let conn = Connection::open(db_path)?;
        conn.busy_timeout(Duration::from_secs(5))?;

        preflight_gate(&conn)?;
        install_schema(&conn)?;

        Ok(Self { conn, storage_dir })
    }
}

impl UnitStore for SqliteStore {
    fn get_unit(&self, project_key: &str, unit_id: &str) -> Result<Unit, StoreError> {
        let doc = self
            .conn
            .query_row(
                "SELECT doc_json FROM units WHERE project_key=?1 AND unit_id=?2",
                params![project_key, unit_id],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        let Some(doc) = doc else {
            return Err(StoreError::UnknownUnit {
                project_key: project_key.to_string(),
                unit_id: unit_id.to_string(),
            });
        };
        Ok(serde_json::from_str(&doc)?)
    }

    fn save_unit(&mut self, project_key: &str, unit: &Unit) -> Result<(), StoreError> {
        if unit.unit_id.trim().is_empty() {
            return Err(StoreError::InvalidInput("unit_id must not be empty"));
        }
        let doc = serde_json::to_string(unit)?;
        self.conn.execute(
            "INSERT INTO units(project_key, unit_id, doc_json, created_at_ms, updated_at_ms) \
             VALUES (?1, ?2, ?3, ?4, ?5) \
             ON CONFLICT(project_key, unit_id) DO UPDATE SET \
               doc_json=excluded.doc_json, updated_at_ms=excluded.updated_at_ms",
            params![
                project_key,
                unit.unit_id,
                doc,
                ts_ms(unit.created_at),
                ts_ms(unit.updated_at),
            ],
        )?;
        Ok(())
    }

    fn list_unit_ids(&self, project_key: &str) -> Result<Vec<String>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT unit_id FROM units WHERE project_key=?1 ORDER BY unit_id ASC")?;
        let mut rows = stmt.query(params![project_key])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(row.get::<_, String>(0)?);
        }
        Ok(out)
    }

    fn load_project_config(
        &self,
        project_key: &str,
    ) -> Result<Option<ProjectConfig>, StoreError> {
        let doc = self
            .conn
            .query_row(
                "SELECT config_json FROM projects WHERE project_key=?1",
                params![project_key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        match doc {
            Some(doc) => Ok(Some(serde_json::from_str(&doc)?)),
            None => Ok(None),
        }
    }

    fn save_project_config(&mut self, config: &ProjectConfig) -> Result<(), StoreError> {
        if config.project_key.trim().is_empty() {
            return Err(StoreError::InvalidInput("project_key must not be empty"));
        }
        let doc = serde_json::to_string(config)?;
        self.conn.execute(
            "INSERT INTO projects(project_key, config_json, updated_at_ms) VALUES (?1, ?2, ?3) \
             ON CONFLICT(project_key) DO UPDATE SET \
               config_json=excluded.config_json, updated_at_ms=excluded.updated_at_ms",
            params![config.project_key, doc, now_ms()],
        )?;
        Ok(())
    }

    fn base_dir(&self) -> &Path {
        &self.storage_dir
    }
}

fn preflight_gate(conn: &Connection) -> Result<(), StoreError> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
    )?;
    let mut rows = stmt.query([])?;
    let mut tables = BTreeSet::new();
    while let Some(row) = rows.next()? {
        tables.insert(row.get::<_, String>(0)?);
    }

    if tables.is_empty() {
        return Ok(());
    }

    let required: BTreeSet<&str> = ["store_state", "projects", "units"].into_iter().collect();

    if tables
        .iter()
        .any(|table| !required.contains(table.as_str()))
    {
        return Err(StoreError::InvalidInput(
            "RESET_REQUIRED: unsupported tables detected",
        ));
    }

    for table in required {
        if !tables.contains(table) {
            return Err(StoreError::InvalidInput(
                "RESET_REQUIRED: required table is missing",
            ));
        }
    }

    let version = conn
        .query_row(
            "SELECT schema_version FROM store_state WHERE singleton=1",
            [],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;

    match version {
        Some(v) if v == SCHEMA_VERSION => Ok(()),
        Some(_) => Err(StoreError::InvalidInput(
            "RESET_REQUIRED: schema version mismatch",
        )),
        None => Err(StoreError::InvalidInput(
            "RESET_REQUIRED: schema state row is missing",
        )),
    }
}

fn install_schema(conn: &Connection) -> Result<(), StoreError> {
    let now_ms = now_ms();

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS store_state (
          singleton INTEGER PRIMARY KEY CHECK(singleton = 1),
          schema_version INTEGER NOT NULL,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS projects (
          project_key TEXT PRIMARY KEY,
          config_json TEXT NOT NULL,
          updated_at_ms INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS units (
          project_key TEXT NOT NULL,
          unit_id TEXT NOT NULL,
          doc_json TEXT NOT NULL,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL,
          PRIMARY KEY(project_key, unit_id)
        );

        CREATE INDEX IF NOT EXISTS idx_units_project_updated
          ON units(project_key, updated_at_ms);
        "#,
    )?;

    conn.execute(
        "INSERT INTO store_state(singleton, schema_version, created_at_ms, updated_at_ms) \
         VALUES (1, ?1, ?2, ?2) \
         ON CONFLICT(singleton) DO UPDATE SET schema_version=excluded.schema_version, updated_at_ms=excluded.updated_at_ms",
        params![SCHEMA_VERSION, now_ms],
    )?;

    Ok(())
}

fn ts_ms(ts: time::OffsetDateTime) -> i64 {
    let ms = ts.unix_timestamp_nanos() / 1_000_000;
    i64::try_from(ms).unwrap_or(i64::MAX)
}

fn now_ms() -> i64 {
    ts_ms(time::OffsetDateTime::now_utc())
}
