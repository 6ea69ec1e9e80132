use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::Value;

use chatflow_core::domain::product::Product;
use chatflow_core::domain::record::Record;
use chatflow_core::ports::{AppendLog, ProductCatalog, RecordStore, StoreError};

#[derive(Default)]
pub struct InMemoryRecordStore {
    records: RwLock<HashMap<String, Record>>,
}

impl InMemoryRecordStore {
    pub fn insert(&self, key: impl Into<String>, record: Record) {
        write(&self.records).insert(key.into(), record);
    }

    pub fn with(self, key: impl Into<String>, record: Record) -> Self {
        self.insert(key, record);
        self
    }
}

impl RecordStore for InMemoryRecordStore {
    fn get(&self, key: &str) -> Result<Option<Record>, StoreError> {
        Ok(read(&self.records).get(key).cloned())
    }
}

#[derive(Default)]
pub struct InMemoryProductCatalog {
    products: RwLock<Vec<Product>>,
}

impl InMemoryProductCatalog {
    pub fn new(products: Vec<Product>) -> Self {
        Self { products: RwLock::new(products) }
    }
}

impl ProductCatalog for InMemoryProductCatalog {
    fn products(&self) -> Result<Vec<Product>, StoreError> {
        Ok(read(&self.products).clone())
    }
}

#[derive(Default)]
pub struct InMemoryAppendLog {
    entries: RwLock<Vec<Value>>,
    fail_with: Option<String>,
}

impl InMemoryAppendLog {
    /// A log whose every append fails with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self { entries: RwLock::default(), fail_with: Some(message.into()) }
    }

    pub fn entries(&self) -> Vec<Value> {
        read(&self.entries).clone()
    }
}

impl AppendLog for InMemoryAppendLog {
    fn append(&self, entry: &Value) -> Result<(), StoreError> {
        if let Some(message) = &self.fail_with {
            return Err(StoreError::Unavailable(message.clone()));
        }
        write(&self.entries).push(entry.clone());
        Ok(())
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}
