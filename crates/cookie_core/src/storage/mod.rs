//! Key-value persistence collaborator.
//!
//! The ledger, the account and the cookie jar each own one or two keys and
//! read them back through [`load_or_default`], so an absent key always means
//! "empty list" or "zero balance".

use crate::error::AppError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

pub mod json_store;

pub use json_store::JsonFileStore;

pub const ACTIVE_TASKS_KEY: &str = "active_tasks";
pub const COMPLETED_TASKS_KEY: &str = "completed_tasks";
pub const POINTS_KEY: &str = "points";
pub const PURCHASED_COOKIES_KEY: &str = "purchased_cookies";

pub trait KeyValueStore: fmt::Debug {
    fn get(&self, key: &str) -> Result<Option<Value>, AppError>;

    fn set(&mut self, key: &str, value: Value) -> Result<(), AppError>;
}

/// Store shared between the components of one application root.
pub type StoreHandle = Rc<RefCell<dyn KeyValueStore>>;

pub fn shared<S: KeyValueStore + 'static>(store: S) -> StoreHandle {
    Rc::new(RefCell::new(store))
}

pub fn load_or_default<T>(store: &StoreHandle, key: &str) -> Result<T, AppError>
where
    T: DeserializeOwned + Default,
{
    match store.borrow().get(key)? {
        Some(value) => serde_json::from_value(value)
            .map_err(|err| AppError::invalid_data(format!("{key}: {err}"))),
        None => Ok(T::default()),
    }
}

pub fn save<T: Serialize>(store: &StoreHandle, key: &str, value: &T) -> Result<(), AppError> {
    let value = serde_json::to_value(value)
        .map_err(|err| AppError::invalid_data(format!("{key}: {err}")))?;
    store.borrow_mut().set(key, value)
}

/// In-process store used by tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: HashMap<String, Value>,
    fail_writes: bool,
    failing_key: Option<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `set` fail with `PersistenceUnavailable`.
    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    /// Makes writes to `key` alone fail; `None` clears it.
    pub fn set_failing_key(&mut self, key: Option<&str>) {
        self.failing_key = key.map(str::to_string);
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>, AppError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), AppError> {
        if self.fail_writes || self.failing_key.as_deref() == Some(key) {
            return Err(AppError::persistence(format!("store rejected write to {key}")));
        }
        self.entries.insert(key.to_string(), value);
        Ok(())
    }
}
