//! Database schema for the checkpoint store

use rusqlite::Connection;

pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS checkpoints (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            thread_id TEXT NOT NULL,
            seq INTEGER NOT NULL,
            kind TEXT NOT NULL CHECK (kind IN ('step', 'turn')),
            state TEXT NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE(thread_id, seq)
        );

        CREATE INDEX IF NOT EXISTS idx_checkpoints_thread ON checkpoints(thread_id, seq DESC);
        CREATE INDEX IF NOT EXISTS idx_checkpoints_created ON checkpoints(created_at);
        "#,
    )
}
