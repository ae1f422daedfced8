//! In-memory storage backend
//!
//! Keeps serialized contexts for the lifetime of the process. Suited to
//! tests and single-process hosts.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;
use stepflow_core::{FlowError, Storage};

/// [`Storage`] backed by a map behind a read/write lock.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: RwLock<HashMap<String, Value>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored values.
    pub fn len(&self) -> Result<usize, FlowError> {
        let guard = self
            .values
            .read()
            .map_err(|e| FlowError::Storage(format!("lock poisoned: {}", e)))?;
        Ok(guard.len())
    }

    pub fn is_empty(&self) -> Result<bool, FlowError> {
        Ok(self.len()? == 0)
    }
}

impl Storage for MemoryStorage {
    fn has(&self, key: &str) -> Result<bool, FlowError> {
        let guard = self
            .values
            .read()
            .map_err(|e| FlowError::Storage(format!("lock poisoned: {}", e)))?;
        Ok(guard.contains_key(key))
    }

    fn load(&self, key: &str) -> Result<Option<Value>, FlowError> {
        let guard = self
            .values
            .read()
            .map_err(|e| FlowError::Storage(format!("lock poisoned: {}", e)))?;
        Ok(guard.get(key).cloned())
    }

    fn save(&self, key: &str, value: Value) -> Result<(), FlowError> {
        let mut guard = self
            .values
            .write()
            .map_err(|e| FlowError::Storage(format!("lock poisoned: {}", e)))?;
        guard.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), FlowError> {
        let mut guard = self
            .values
            .write()
            .map_err(|e| FlowError::Storage(format!("lock poisoned: {}", e)))?;
        guard.remove(key);
        Ok(())
    }
}
