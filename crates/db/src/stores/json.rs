use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use chatflow_core::domain::product::Product;
use chatflow_core::domain::record::Record;
use chatflow_core::ports::{ProductCatalog, RecordStore, StoreError};

pub const MEMBERSHIP_LIST_FIELD: &str = "userMemberList";
pub const MEMBERSHIP_KEY_FIELD: &str = "phone";

/// How records are laid out inside a JSON document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordLayout {
    /// Top-level object whose keys are the lookup keys.
    Keyed,
    /// Top-level object holding an array under `list_field`; each element is
    /// matched on its `key_field`.
    List { list_field: String, key_field: String },
}

/// Read-only JSON record store. The file is re-read on every lookup so edits
/// are picked up without a restart.
#[derive(Clone, Debug)]
pub struct JsonRecordStore {
    path: PathBuf,
    layout: RecordLayout,
}

impl JsonRecordStore {
    pub fn new(path: impl Into<PathBuf>, layout: RecordLayout) -> Self {
        Self { path: path.into(), layout }
    }

    /// Orders keyed by phone number (or order number).
    pub fn orders(path: impl Into<PathBuf>) -> Self {
        Self::new(path, RecordLayout::Keyed)
    }

    /// Membership entries listed under `userMemberList`, matched on `phone`.
    pub fn membership(path: impl Into<PathBuf>) -> Self {
        Self::new(
            path,
            RecordLayout::List {
                list_field: MEMBERSHIP_LIST_FIELD.to_string(),
                key_field: MEMBERSHIP_KEY_FIELD.to_string(),
            },
        )
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parses the whole document and reports how many records it holds.
    pub fn record_count(&self) -> Result<usize, StoreError> {
        let document = read_document(&self.path)?;
        match &self.layout {
            RecordLayout::Keyed => Ok(self.as_object(&document)?.len()),
            RecordLayout::List { list_field, .. } => Ok(self.list(&document, list_field)?.len()),
        }
    }

    fn as_object<'a>(&self, document: &'a Value) -> Result<&'a Record, StoreError> {
        document.as_object().ok_or_else(|| StoreError::Malformed {
            path: self.path.clone(),
            message: "top-level value must be an object".to_string(),
        })
    }

    fn list<'a>(&self, document: &'a Value, list_field: &str) -> Result<&'a [Value], StoreError> {
        self.as_object(document)?
            .get(list_field)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .ok_or_else(|| StoreError::Malformed {
                path: self.path.clone(),
                message: format!("`{list_field}` must be an array"),
            })
    }
}

impl RecordStore for JsonRecordStore {
    fn get(&self, key: &str) -> Result<Option<Record>, StoreError> {
        let document = read_document(&self.path)?;
        let found = match &self.layout {
            RecordLayout::Keyed => self.as_object(&document)?.get(key).and_then(Value::as_object),
            RecordLayout::List { list_field, key_field } => self
                .list(&document, list_field)?
                .iter()
                .filter_map(Value::as_object)
                .find(|entry| entry.get(key_field).and_then(Value::as_str) == Some(key)),
        };

        if found.is_none() {
            tracing::debug!(
                event_name = "store.record_not_found",
                path = %self.path.display(),
                "no record for lookup key"
            );
        }
        Ok(found.cloned())
    }
}

/// Product catalog stored as a JSON array of products.
#[derive(Clone, Debug)]
pub struct JsonProductCatalog {
    path: PathBuf,
}

impl JsonProductCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ProductCatalog for JsonProductCatalog {
    fn products(&self) -> Result<Vec<Product>, StoreError> {
        let raw = read_raw(&self.path)?;
        serde_json::from_str::<Vec<Product>>(&raw).map_err(|error| StoreError::Malformed {
            path: self.path.clone(),
            message: error.to_string(),
        })
    }
}

fn read_raw(path: &Path) -> Result<String, StoreError> {
    fs::read_to_string(path).map_err(|source| StoreError::Io { path: path.to_path_buf(), source })
}

fn read_document(path: &Path) -> Result<Value, StoreError> {
    let raw = read_raw(path)?;
    serde_json::from_str(&raw).map_err(|error| StoreError::Malformed {
        path: path.to_path_buf(),
        message: error.to_string(),
    })
}
