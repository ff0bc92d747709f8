use anyhow::{anyhow, bail};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::StateStore;

/// In-process store, used when no storage directory is configured and in tests
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    values: Mutex<HashMap<String, Value>>,
    fail_writes: AtomicBool,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write or removal fail
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> anyhow::Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("store is read-only");
        }
        Ok(())
    }
}

impl StateStore for MemoryStateStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<Value>> {
        let values = self
            .values
            .lock()
            .map_err(|e| anyhow!("lock poisoned: {}", e))?;
        Ok(values.get(key).cloned())
    }

    fn set_many(&self, entries: &[(String, Value)]) -> anyhow::Result<()> {
        self.check_writable()?;
        let mut values = self
            .values
            .lock()
            .map_err(|e| anyhow!("lock poisoned: {}", e))?;
        for (key, value) in entries {
            values.insert(key.clone(), value.clone());
        }
        Ok(())
    }

    fn remove(&self, keys: &[String]) -> anyhow::Result<()> {
        self.check_writable()?;
        let mut values = self
            .values
            .lock()
            .map_err(|e| anyhow!("lock poisoned: {}", e))?;
        for key in keys {
            values.remove(key);
        }
        Ok(())
    }
}
