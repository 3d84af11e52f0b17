//! SQLite checkpoint store

use super::schema::init_schema;
use super::{Checkpoint, CheckpointError, CheckpointKind, CheckpointStore, ThreadSummary};
use crate::workflow::ConversationState;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Append-only checkpoint history in a single SQLite file
pub struct SqliteCheckpointStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCheckpointStore {
    /// Open or create the checkpoint database
    pub fn open(path: &Path) -> Result<Self, CheckpointError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        init_schema(&conn)?;

        tracing::debug!(path = %path.display(), "Opened checkpoint store");
        Ok(Self::from_connection(conn))
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, CheckpointError> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Run blocking database work off the async runtime
    async fn call<F, T>(&self, f: F) -> Result<T, CheckpointError>
    where
        F: FnOnce(&mut Connection) -> Result<T, CheckpointError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| CheckpointError::unavailable("connection lock poisoned"))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| CheckpointError::unavailable(format!("checkpoint task failed: {}", e)))?
    }
}

fn decode_state(thread_id: &str, seq: i64, text: &str) -> Result<ConversationState, CheckpointError> {
    serde_json::from_str(text).map_err(|e| CheckpointError::Corrupt {
        thread_id: thread_id.to_string(),
        seq,
        message: e.to_string(),
    })
}

fn parse_timestamp(thread_id: &str, seq: i64, text: &str) -> Result<DateTime<Utc>, CheckpointError> {
    DateTime::parse_from_rfc3339(text)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| CheckpointError::Corrupt {
            thread_id: thread_id.to_string(),
            seq,
            message: format!("bad timestamp '{}': {}", text, e),
        })
}

#[async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    async fn load(&self, thread_id: &str) -> Result<ConversationState, CheckpointError> {
        let thread = thread_id.to_string();
        self.call(move |conn| {
            let latest: Option<(i64, String)> = conn
                .query_row(
                    "SELECT seq, state FROM checkpoints WHERE thread_id = ?1 ORDER BY seq DESC LIMIT 1",
                    [&thread],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            match latest {
                Some((seq, text)) => decode_state(&thread, seq, &text),
                None => Ok(ConversationState::default()),
            }
        })
        .await
    }

    async fn save(
        &self,
        thread_id: &str,
        state: &ConversationState,
        kind: CheckpointKind,
    ) -> Result<i64, CheckpointError> {
        let thread = thread_id.to_string();
        let encoded = serde_json::to_string(state)?;
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);

        self.call(move |conn| {
            let tx = conn.transaction()?;
            let seq: i64 = tx.query_row(
                "SELECT COALESCE(MAX(seq), 0) + 1 FROM checkpoints WHERE thread_id = ?1",
                [&thread],
                |row| row.get(0),
            )?;
            tx.execute(
                "INSERT INTO checkpoints (thread_id, seq, kind, state, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                (&thread, seq, kind.as_str(), &encoded, &now),
            )?;
            tx.commit()?;
            Ok(seq)
        })
        .await
    }

    async fn history(&self, thread_id: &str) -> Result<Vec<Checkpoint>, CheckpointError> {
        let thread = thread_id.to_string();
        self.call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT seq, kind, state, created_at FROM checkpoints
                 WHERE thread_id = ?1
                 ORDER BY seq DESC",
            )?;
            let raw = stmt
                .query_map([&thread], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                })?
                .collect::<Result<Vec<_>, _>>()?;

            raw.into_iter()
                .map(|(seq, kind, state, created_at)| {
                    let kind = CheckpointKind::parse(&kind).ok_or_else(|| {
                        CheckpointError::Corrupt {
                            thread_id: thread.clone(),
                            seq,
                            message: format!("unknown kind '{}'", kind),
                        }
                    })?;
                    Ok(Checkpoint {
                        thread_id: thread.clone(),
                        seq,
                        kind,
                        state: decode_state(&thread, seq, &state)?,
                        created_at: parse_timestamp(&thread, seq, &created_at)?,
                    })
                })
                .collect()
        })
        .await
    }

    async fn exists(&self, thread_id: &str) -> Result<bool, CheckpointError> {
        let thread = thread_id.to_string();
        self.call(move |conn| {
            let found: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM checkpoints WHERE thread_id = ?1)",
                [&thread],
                |row| row.get(0),
            )?;
            Ok(found)
        })
        .await
    }

    async fn list_threads(&self) -> Result<Vec<ThreadSummary>, CheckpointError> {
        self.call(|conn| {
            let mut stmt = conn.prepare(
                "SELECT thread_id, COUNT(*), SUM(kind = 'turn'), MIN(created_at), MAX(created_at)
                 FROM checkpoints
                 GROUP BY thread_id
                 ORDER BY MAX(id) DESC",
            )?;
            let raw = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                })?
                .collect::<Result<Vec<_>, _>>()?;

            raw.into_iter()
                .map(|(thread_id, checkpoints, turns, first, last)| {
                    Ok(ThreadSummary {
                        created_at: parse_timestamp(&thread_id, 0, &first)?,
                        updated_at: parse_timestamp(&thread_id, 0, &last)?,
                        checkpoints: checkpoints.max(0) as usize,
                        turns: turns.max(0) as usize,
                        thread_id,
                    })
                })
                .collect()
        })
        .await
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<usize, CheckpointError> {
        let thread = thread_id.to_string();
        let removed = self
            .call(move |conn| {
                Ok(conn.execute("DELETE FROM checkpoints WHERE thread_id = ?1", [&thread])?)
            })
            .await?;

        tracing::info!(thread_id, removed, "Deleted thread checkpoints");
        Ok(removed)
    }
}
