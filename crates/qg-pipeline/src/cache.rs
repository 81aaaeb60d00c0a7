use std::collections::HashMap;

use async_trait::async_trait;
use qg_errors::ConnectionError;
use serde_json::Value;

/// §6 `CacheProvider` contract. Keys are the rendered `keyPattern` strings
/// from a `Cache`'s entries (§4.1); a miss is simply absent from the
/// returned map, never an error.
#[async_trait]
pub trait CacheProvider: Send + Sync {
    async fn get_many(&self, keys: &[String]) -> Result<HashMap<String, Value>, ConnectionError>;

    async fn ping(&self) -> Result<(), ConnectionError>;

    async fn close(&self) -> Result<(), ConnectionError>;
}
