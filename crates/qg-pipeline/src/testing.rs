//! In-memory reference [`Executor`] and [`CacheProvider`] implementations,
//! useful for exercising the pipeline without a real database or cache
//! backend (unit tests, local development).

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use qg_errors::{ConnectionError, ConnectionErrorCode, ExecutionError, ExecutionErrorCode};
use serde_json::Value;

use crate::cache::CacheProvider;
use crate::executor::Executor;

/// An executor that always answers with a fixed set of rows, regardless
/// of the SQL it's handed. Useful for asserting on what the pipeline
/// *sent* rather than how a real backend would respond.
pub struct FixedExecutor {
    database: String,
    rows: Vec<Value>,
    calls: Mutex<Vec<(String, Vec<Value>)>>,
}

impl FixedExecutor {
    pub fn new(database: impl Into<String>, rows: Vec<Value>) -> Self {
        FixedExecutor {
            database: database.into(),
            rows,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every `(sql, params)` pair this executor was asked to run, in order.
    pub fn calls(&self) -> Vec<(String, Vec<Value>)> {
        self.calls.lock().expect("calls lock poisoned").clone()
    }
}

#[async_trait]
impl Executor for FixedExecutor {
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<Vec<Value>, ExecutionError> {
        self.calls
            .lock()
            .expect("calls lock poisoned")
            .push((sql.to_string(), params.to_vec()));
        Ok(self.rows.clone())
    }

    async fn ping(&self) -> Result<(), ConnectionError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), ConnectionError> {
        Ok(())
    }
}

/// An executor that always fails, for exercising pipeline error handling.
pub struct FailingExecutor {
    pub database: String,
}

#[async_trait]
impl Executor for FailingExecutor {
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<Vec<Value>, ExecutionError> {
        Err(ExecutionError::new(ExecutionErrorCode::QueryFailed {
            database: self.database.clone(),
            dialect: "unknown".to_string(),
            sql: sql.to_string(),
            params: params.to_vec(),
            cause: "simulated backend failure".to_string(),
        }))
    }

    async fn ping(&self) -> Result<(), ConnectionError> {
        Err(ConnectionError::new(ConnectionErrorCode::ConnectionFailed {
            url: None,
            timeout_ms: None,
        }))
    }

    async fn close(&self) -> Result<(), ConnectionError> {
        Ok(())
    }
}

/// A cache backed by a plain in-memory map, pre-seeded by the caller.
pub struct InMemoryCache {
    entries: HashMap<String, Value>,
}

impl InMemoryCache {
    pub fn new(entries: HashMap<String, Value>) -> Self {
        InMemoryCache { entries }
    }
}

#[async_trait]
impl CacheProvider for InMemoryCache {
    async fn get_many(&self, keys: &[String]) -> Result<HashMap<String, Value>, ConnectionError> {
        Ok(keys
            .iter()
            .filter_map(|k| self.entries.get(k).map(|v| (k.clone(), v.clone())))
            .collect())
    }

    async fn ping(&self) -> Result<(), ConnectionError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), ConnectionError> {
        Ok(())
    }
}
