//! SQLite-backed query executor for the votes database

use super::{QueryError, QueryExecutor, Row};
use async_trait::async_trait;
use rusqlite::types::ValueRef;
use rusqlite::{Batch, Connection, OpenFlags};
use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Runs read-only queries against a SQLite database
pub struct SqliteQueryExecutor {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteQueryExecutor {
    /// Open the votes database read-only
    pub fn open(path: &Path, busy_timeout: Duration) -> Result<Self, QueryError> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(busy_timeout)?;

        tracing::info!(path = %path.display(), "Opened votes database");
        Ok(Self::from_connection(conn))
    }

    /// Wrap an existing connection
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }
}

#[async_trait]
impl QueryExecutor for SqliteQueryExecutor {
    async fn run(&self, query: &str) -> Result<Vec<Row>, QueryError> {
        let query = query.trim().trim_end_matches(';').trim().to_string();
        if query.is_empty() {
            return Err(QueryError::Empty);
        }

        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|_| QueryError::Unavailable {
                message: "connection lock poisoned".into(),
            })?;
            run_blocking(&conn, &query)
        })
        .await
        .map_err(|e| QueryError::Unavailable {
            message: format!("query task failed: {}", e),
        })?
    }
}

fn run_blocking(conn: &Connection, query: &str) -> Result<Vec<Row>, QueryError> {
    let mut batch = Batch::new(conn, query);
    let mut stmt = batch.next()?.ok_or(QueryError::Empty)?;
    if batch.next()?.is_some() {
        return Err(QueryError::MultipleStatements {
            query: query.to_string(),
        });
    }
    if !stmt.readonly() {
        return Err(QueryError::NotReadOnly {
            query: query.to_string(),
        });
    }

    let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();

    let mut rows = stmt.query([])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut record = Row::new();
        for (idx, name) in columns.iter().enumerate() {
            record.insert(name.clone(), to_json(row.get_ref(idx)?));
        }
        out.push(record);
    }

    Ok(out)
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Value::String(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}
