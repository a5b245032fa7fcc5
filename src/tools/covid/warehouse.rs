use crate::error::{Error, Result};
use crate::utils::files::ensure_directory;
use chrono::NaiveDate;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;

/// One day's figures, keyed by `date`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CovidRecord {
    pub date: NaiveDate,
    pub ni_confirmed: i64,
    pub ni_dead: Option<i64>,
    pub ie_confirmed: i64,
    pub ie_dead: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub sql_type: &'static str,
    pub required: bool,
    pub description: &'static str,
}

pub const SCHEMA: [Column; 5] = [
    Column {
        name: "Date",
        sql_type: "DATE",
        required: true,
        description: "Date",
    },
    Column {
        name: "NI_Confirmed",
        sql_type: "INTEGER",
        required: false,
        description: "NI Confirmed Cases",
    },
    Column {
        name: "NI_Dead",
        sql_type: "INTEGER",
        required: false,
        description: "NI Confirmed Dead",
    },
    Column {
        name: "IE_Confirmed",
        sql_type: "INTEGER",
        required: false,
        description: "IE Confirmed Cases",
    },
    Column {
        name: "IE_Dead",
        sql_type: "INTEGER",
        required: false,
        description: "IE Confirmed Dead",
    },
];

/// A schema-bearing tabular store holding one dataset with one table.
///
/// Existence checks return `Ok(false)` only when the thing is absent; a
/// failed check is an `Err`.
pub trait Warehouse {
    fn dataset_exists(&self) -> Result<bool>;
    fn create_dataset(&self) -> Result<()>;
    fn table_exists(&self) -> Result<bool>;
    fn create_table(&self) -> Result<()>;
    fn record_exists(&self, date: NaiveDate) -> Result<bool>;
    /// Insert the record unless its date is already present. Returns whether a row was written.
    fn insert_record(&self, record: &CovidRecord) -> Result<bool>;
}

/// SQLite-backed warehouse: one database file per `project.dataset`
pub struct SqliteWarehouse {
    root: PathBuf,
    project: String,
    dataset: String,
    table: String,
    location: String,
}

impl SqliteWarehouse {
    pub fn new(
        root: impl Into<PathBuf>,
        project: &str,
        dataset: &str,
        table: &str,
        location: &str,
    ) -> Self {
        Self {
            root: root.into(),
            project: project.to_string(),
            dataset: dataset.to_string(),
            table: table.to_string(),
            location: location.to_string(),
        }
    }

    pub fn from_config(config: &crate::config::WarehouseConfig) -> Self {
        Self::new(
            config.root.clone(),
            &config.project,
            &config.dataset,
            &config.table,
            &config.location,
        )
    }

    pub fn dataset_id(&self) -> String {
        format!("{}.{}", self.project, self.dataset)
    }

    pub fn table_id(&self) -> String {
        format!("{}.{}", self.dataset_id(), self.table)
    }

    pub fn dataset_path(&self) -> PathBuf {
        self.root.join(format!("{}.sqlite", self.dataset_id()))
    }

    fn connect(&self) -> Result<Connection> {
        if !self.dataset_exists()? {
            return Err(Error::NotFound(format!("dataset {}", self.dataset_id())));
        }
        Ok(Connection::open_with_flags(
            self.dataset_path(),
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?)
    }

    fn connect_table(&self) -> Result<Connection> {
        let conn = self.connect()?;
        if !table_present(&conn, &self.table)? {
            return Err(Error::NotFound(format!("table {}", self.table_id())));
        }
        Ok(conn)
    }

    /// Location recorded when the dataset was created
    pub fn location(&self) -> Result<Option<String>> {
        let conn = self.connect()?;
        Ok(conn
            .query_row(
                "SELECT value FROM _dataset_meta WHERE key = 'location'",
                [],
                |row| row.get(0),
            )
            .optional()?)
    }

    /// Columns as `(name, declared type, not null)`, in table order
    pub fn columns(&self) -> Result<Vec<(String, String, bool)>> {
        let conn = self.connect_table()?;
        let mut stmt = conn.prepare(&format!("PRAGMA table_info(\"{}\")", self.table))?;
        let columns = stmt
            .query_map([], |row| Ok((row.get(1)?, row.get(2)?, row.get(3)?)))?
            .collect::<rusqlite::Result<Vec<(String, String, bool)>>>()?;
        Ok(columns)
    }

    pub fn row_count(&self) -> Result<i64> {
        let conn = self.connect_table()?;
        Ok(conn.query_row(
            &format!("SELECT COUNT(*) FROM \"{}\"", self.table),
            [],
            |row| row.get(0),
        )?)
    }
}

fn table_present(conn: &Connection, table: &str) -> Result<bool> {
    let found: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        params![table],
        |row| row.get(0),
    )?;
    Ok(found > 0)
}

fn path_exists(path: &Path) -> Result<bool> {
    match fs::metadata(path) {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(Error::io(format!("failed to check {}", path.display()), e)),
    }
}

impl Warehouse for SqliteWarehouse {
    fn dataset_exists(&self) -> Result<bool> {
        path_exists(&self.dataset_path())
    }

    fn create_dataset(&self) -> Result<()> {
        ensure_directory(&self.root)?;
        let conn = Connection::open(self.dataset_path())?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS _dataset_meta (key TEXT PRIMARY KEY, value TEXT NOT NULL);",
        )?;
        conn.execute(
            "INSERT OR IGNORE INTO _dataset_meta (key, value) VALUES ('location', ?1)",
            params![self.location],
        )?;
        info!(
            action = "create",
            component = "warehouse",
            dataset = %self.dataset_id(),
            location = %self.location,
            "Created dataset"
        );
        Ok(())
    }

    fn table_exists(&self) -> Result<bool> {
        if !self.dataset_exists()? {
            return Ok(false);
        }
        table_present(&self.connect()?, &self.table)
    }

    fn create_table(&self) -> Result<()> {
        let conn = self.connect()?;
        let columns: Vec<String> = SCHEMA
            .iter()
            .map(|column| {
                let mut def = format!("{} {}", column.name, column.sql_type);
                if column.required {
                    def.push_str(" NOT NULL PRIMARY KEY");
                }
                def
            })
            .collect();

        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS \"{}\" ({});",
            self.table,
            columns.join(", ")
        ))?;
        info!(action = "create", component = "warehouse", table = %self.table_id(), "Created table");
        Ok(())
    }

    fn record_exists(&self, date: NaiveDate) -> Result<bool> {
        let conn = self.connect_table()?;
        let exists: bool = conn.query_row(
            &format!(
                "SELECT EXISTS(SELECT 1 FROM \"{}\" WHERE Date = ?1)",
                self.table
            ),
            params![date],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn insert_record(&self, record: &CovidRecord) -> Result<bool> {
        let conn = self.connect_table()?;
        // The date key makes a concurrent duplicate insert a no-op
        let changed = conn.execute(
            &format!(
                "INSERT OR IGNORE INTO \"{}\" (Date, NI_Confirmed, NI_Dead, IE_Confirmed, IE_Dead) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                self.table
            ),
            params![
                record.date,
                record.ni_confirmed,
                record.ni_dead,
                record.ie_confirmed,
                record.ie_dead
            ],
        )?;
        Ok(changed == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn warehouse(root: &Path) -> SqliteWarehouse {
        SqliteWarehouse::new(root, "test-project", "collector", "daily", "EU")
    }

    fn record(day: u32) -> CovidRecord {
        CovidRecord {
            date: NaiveDate::from_ymd_opt(2020, 3, day).unwrap(),
            ni_confirmed: 20,
            ni_dead: None,
            ie_confirmed: 43,
            ie_dead: Some(1),
        }
    }

    #[test]
    fn absent_dataset_and_table_report_false() {
        let dir = tempfile::tempdir().unwrap();
        let wh = warehouse(dir.path());
        assert!(!wh.dataset_exists().unwrap());
        assert!(!wh.table_exists().unwrap());
    }

    #[test]
    fn creating_dataset_records_location() {
        let dir = tempfile::tempdir().unwrap();
        let wh = warehouse(dir.path());
        wh.create_dataset().unwrap();
        assert!(wh.dataset_exists().unwrap());
        assert!(!wh.table_exists().unwrap());
        assert_eq!(wh.location().unwrap().as_deref(), Some("EU"));
        assert_eq!(wh.dataset_path(), dir.path().join("test-project.collector.sqlite"));
    }

    #[test]
    fn table_matches_schema() {
        let dir = tempfile::tempdir().unwrap();
        let wh = warehouse(dir.path());
        wh.create_dataset().unwrap();
        wh.create_table().unwrap();

        let columns = wh.columns().unwrap();
        assert_eq!(columns.len(), SCHEMA.len());
        for ((name, sql_type, not_null), expected) in columns.iter().zip(SCHEMA.iter()) {
            assert_eq!(name, expected.name);
            assert_eq!(sql_type, expected.sql_type);
            assert_eq!(*not_null, expected.required);
        }
    }

    #[test]
    fn operations_on_missing_table_are_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let wh = warehouse(dir.path());
        let err = wh.create_table().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        wh.create_dataset().unwrap();
        let err = wh.record_exists(record(12).date).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn second_insert_for_same_date_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let wh = warehouse(dir.path());
        wh.create_dataset().unwrap();
        wh.create_table().unwrap();

        assert!(!wh.record_exists(record(12).date).unwrap());
        assert!(wh.insert_record(&record(12)).unwrap());
        assert!(wh.record_exists(record(12).date).unwrap());
        assert!(!wh.insert_record(&record(12)).unwrap());
        assert_eq!(wh.row_count().unwrap(), 1);

        assert!(wh.insert_record(&record(13)).unwrap());
        assert_eq!(wh.row_count().unwrap(), 2);
    }
}
