use crate::schema::Row;
use crate::sink::{SinkError, UpsertStore};
use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, Result, params, params_from_iter};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Local SQLite store: upsert target and run log.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Running,
    Done,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Done => "done",
            RunStatus::Failed => "failed",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "done" => RunStatus::Done,
            "failed" => RunStatus::Failed,
            _ => RunStatus::Running,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub id: String,
    pub profile: String,
    pub start_url: String,
    pub start_time: i64,
    pub end_time: Option<i64>,
    pub status: RunStatus,
    pub records: i64,
}

fn current_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

impl SqliteStore {
    pub fn exists(path: &Path) -> bool {
        path.exists()
    }

    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            ",
        )?;
        Self::with_connection(conn, path.display().to_string())
    }

    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?, ":memory:".to_string())
    }

    fn with_connection(conn: Connection, label: String) -> Result<Self> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS crawl_runs (
                id TEXT PRIMARY KEY,
                profile TEXT NOT NULL,
                start_url TEXT NOT NULL,
                start_time INTEGER NOT NULL,
                end_time INTEGER,
                status TEXT NOT NULL CHECK(status IN ('running', 'done', 'failed')),
                records INTEGER NOT NULL DEFAULT 0
            );
            CREATE INDEX IF NOT EXISTS idx_crawl_runs_start ON crawl_runs(start_time);
            ",
        )?;
        Ok(SqliteStore {
            conn: Mutex::new(conn),
            label,
        })
    }

    fn lock(&self) -> std::result::Result<MutexGuard<'_, Connection>, SinkError> {
        self.conn
            .lock()
            .map_err(|_| SinkError::Unavailable("sqlite connection lock poisoned".to_string()))
    }

    // Run log
    pub fn start_run(&self, profile: &str, start_url: &str) -> std::result::Result<String, SinkError> {
        let run_id = uuid::Uuid::new_v4().to_string();
        self.lock()?.execute(
            "INSERT INTO crawl_runs (id, profile, start_url, start_time, status) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![&run_id, profile, start_url, current_timestamp(), RunStatus::Running.as_str()],
        )?;
        Ok(run_id)
    }

    pub fn finish_run(
        &self,
        run_id: &str,
        status: RunStatus,
        records: usize,
    ) -> std::result::Result<(), SinkError> {
        self.lock()?.execute(
            "UPDATE crawl_runs SET status = ?1, end_time = ?2, records = ?3 WHERE id = ?4",
            params![status.as_str(), current_timestamp(), records as i64, run_id],
        )?;
        Ok(())
    }

    pub fn get_run(&self, run_id: &str) -> std::result::Result<Option<RunSummary>, SinkError> {
        let conn = self.lock()?;
        let run = conn
            .query_row(
                "SELECT id, profile, start_url, start_time, end_time, status, records FROM crawl_runs WHERE id = ?1",
                [run_id],
                |row| {
                    Ok(RunSummary {
                        id: row.get(0)?,
                        profile: row.get(1)?,
                        start_url: row.get(2)?,
                        start_time: row.get(3)?,
                        end_time: row.get(4)?,
                        status: RunStatus::parse(&row.get::<_, String>(5)?),
                        records: row.get(6)?,
                    })
                },
            )
            .optional()?;
        Ok(run)
    }

    // Brand tables
    pub fn count_rows(&self, table: &str) -> std::result::Result<i64, SinkError> {
        let conn = self.lock()?;
        let count = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", quote_ident(table)),
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Values of `column` keyed by id, ordered by id.
    pub fn column_values(
        &self,
        table: &str,
        id_column: &str,
        column: &str,
    ) -> std::result::Result<Vec<(String, String)>, SinkError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {id}, {col} FROM {table} ORDER BY {id}",
            id = quote_ident(id_column),
            col = quote_ident(column),
            table = quote_ident(table),
        ))?;
        let values = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>>>()?;
        Ok(values)
    }

    fn ensure_table(conn: &Connection, table: &str, id_column: &str, columns: &[&str]) -> Result<()> {
        let mut definition = format!("{} TEXT PRIMARY KEY", quote_ident(id_column));
        for column in columns {
            definition.push_str(&format!(", {} TEXT NOT NULL DEFAULT ''", quote_ident(column)));
        }
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {} ({});",
            quote_ident(table),
            definition
        ))
    }

    fn upsert_rows(&self, table: &str, rows: &[Row], conflict_key: &str) -> std::result::Result<(), SinkError> {
        let Some(first) = rows.first() else {
            return Ok(());
        };
        let columns: Vec<&str> = first
            .keys()
            .map(String::as_str)
            .filter(|c| *c != conflict_key)
            .collect();

        let mut conn = self.lock()?;
        Self::ensure_table(&conn, table, conflict_key, &columns)?;

        let mut all_columns = vec![conflict_key];
        all_columns.extend(columns.iter().copied());
        let placeholders: Vec<String> = (1..=all_columns.len()).map(|i| format!("?{}", i)).collect();
        let updates: Vec<String> = columns
            .iter()
            .map(|c| format!("{col} = excluded.{col}", col = quote_ident(c)))
            .collect();
        let update_clause = if updates.is_empty() {
            "NOTHING".to_string()
        } else {
            format!("UPDATE SET {}", updates.join(", "))
        };
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT({}) DO {}",
            quote_ident(table),
            all_columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", "),
            placeholders.join(", "),
            quote_ident(conflict_key),
            update_clause,
        );

        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(&sql)?;
            for row in rows {
                let values = all_columns
                    .iter()
                    .map(|c| row.get(*c).map(cell).unwrap_or_default());
                stmt.execute(params_from_iter(values))?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

#[async_trait]
impl UpsertStore for SqliteStore {
    async fn upsert_batch(
        &self,
        table: &str,
        rows: Vec<Row>,
        conflict_key: &str,
    ) -> std::result::Result<Vec<Row>, SinkError> {
        self.upsert_rows(table, &rows, conflict_key)?;
        Ok(rows)
    }

    fn describe(&self) -> String {
        format!("sqlite {}", self.label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident_escapes_quotes() {
        assert_eq!(quote_ident("brands"), "\"brands\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_cell_renders_values() {
        assert_eq!(cell(&Value::String("x".into())), "x");
        assert_eq!(cell(&Value::Null), "");
        assert_eq!(cell(&serde_json::json!(3)), "3");
    }

    #[test]
    fn test_run_log_lifecycle() {
        let store = SqliteStore::in_memory().unwrap();
        let id = store.start_run("t1", "https://example.com").unwrap();

        let run = store.get_run(&id).unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Running);
        assert_eq!(run.end_time, None);

        store.finish_run(&id, RunStatus::Done, 42).unwrap();
        let run = store.get_run(&id).unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Done);
        assert_eq!(run.records, 42);
        assert!(run.end_time.is_some());
    }

    #[test]
    fn test_unknown_run() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(store.get_run("nope").unwrap().is_none());
    }
}
