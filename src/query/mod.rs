//! Relational query adapter
//!
//! Steps hand generated query text to a `QueryExecutor` and get back flat
//! rows. An empty row set is a valid outcome, not an error.

mod sqlite;

pub use sqlite::SqliteQueryExecutor;

use async_trait::async_trait;
use thiserror::Error;

/// One result row: column name to value, in column order
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Errors raised while running a query
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("query is empty")]
    Empty,

    #[error("query holds more than one statement: {query}")]
    MultipleStatements { query: String },

    #[error("query is not read-only: {query}")]
    NotReadOnly { query: String },

    #[error("query executor unavailable: {message}")]
    Unavailable { message: String },
}

/// Executes query text and returns ordered rows
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn run(&self, query: &str) -> Result<Vec<Row>, QueryError>;
}
