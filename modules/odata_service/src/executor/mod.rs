//! Execution of CQN queries.
//!
//! The HTTP layer only ever talks to a [`QueryExecutor`]; the in-memory
//! [`MemoryStore`] is the implementation shipped with the server.

mod eval;
mod memory;

use async_trait::async_trait;
use cqn::{DataValue, Query};
use thiserror::Error;

pub use eval::{compare_values, matches};
pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("no table for entity '{0}'")]
    UnknownEntity(String),

    #[error("'{entity}' already has a row with key {key}")]
    Conflict { entity: String, key: String },

    #[error("invalid data for '{entity}': {reason}")]
    InvalidData { entity: String, reason: String },

    #[error("cannot evaluate expression: {0}")]
    Unsupported(String),

    #[error("failed to read seed data from {path}")]
    Seed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed seed data in {path}: {reason}")]
    SeedFormat { path: String, reason: String },
}

impl ExecError {
    pub fn invalid_data(entity: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidData {
            entity: entity.into(),
            reason: reason.into(),
        }
    }
}

/// What a query produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecResult {
    /// Selected, inserted or updated rows.
    Rows(Vec<DataValue>),
    /// Result of a `count(*)` select.
    Count(u64),
    /// Rows removed by a delete.
    Affected(u64),
}

impl ExecResult {
    pub fn into_rows(self) -> Vec<DataValue> {
        match self {
            ExecResult::Rows(rows) => rows,
            ExecResult::Count(_) | ExecResult::Affected(_) => Vec::new(),
        }
    }
}

#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, query: &Query) -> Result<ExecResult, ExecError>;
}
