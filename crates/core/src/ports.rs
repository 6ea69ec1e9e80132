//! Capabilities the engine consumes but does not implement: intent
//! classification, slot extraction, record stores and interactive input.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

use crate::domain::product::Product;
use crate::domain::record::Record;
use crate::rules::ExtractorKind;
use crate::session::ChatHistory;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ClassifierError {
    #[error("intent classifier unavailable: {0}")]
    Unavailable(String),
}

pub trait IntentClassifier: Send + Sync {
    /// Picks one label from `candidates` (label to description), or `None`.
    /// An empty candidate set must yield `Ok(None)`.
    fn classify(
        &self,
        utterance: &str,
        candidates: &BTreeMap<String, String>,
    ) -> Result<Option<String>, ClassifierError>;
}

pub trait SlotExtractor: Send + Sync {
    fn extract(&self, history: &ChatHistory) -> Option<String>;
}

/// Extractor per slot type.
#[derive(Clone, Default)]
pub struct ExtractorSet {
    extractors: HashMap<ExtractorKind, Arc<dyn SlotExtractor>>,
}

impl ExtractorSet {
    pub fn with(mut self, kind: ExtractorKind, extractor: impl SlotExtractor + 'static) -> Self {
        self.extractors.insert(kind, Arc::new(extractor));
        self
    }

    pub fn get(&self, kind: ExtractorKind) -> Option<&dyn SlotExtractor> {
        self.extractors.get(&kind).map(|extractor| extractor.as_ref())
    }

    pub fn len(&self) -> usize {
        self.extractors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extractors.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record store I/O failed for `{path}`: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("record store `{path}` is malformed: {message}")]
    Malformed { path: PathBuf, message: String },
    #[error("record store unavailable: {0}")]
    Unavailable(String),
}

pub trait RecordStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Record>, StoreError>;
}

pub trait AppendLog: Send + Sync {
    fn append(&self, entry: &Value) -> Result<(), StoreError>;
}

pub trait ProductCatalog: Send + Sync {
    fn products(&self) -> Result<Vec<Product>, StoreError>;
}

pub trait Recommender: Send + Sync {
    fn recommend(&self, preference: &str, products: &[Product]) -> Option<Product>;
}

/// Stores consulted by lookup, recommend and recording actions.
#[derive(Clone)]
pub struct RecordStores {
    pub orders: Arc<dyn RecordStore>,
    pub membership: Arc<dyn RecordStore>,
    pub products: Arc<dyn ProductCatalog>,
    pub complaints: Arc<dyn AppendLog>,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("no input received within {0:?}")]
    TimedOut(Duration),
    #[error("input stream closed")]
    Closed,
    #[error("input read failed: {0}")]
    Io(String),
}

/// Interactive channel used by collection actions to ask the user directly.
pub trait Prompter {
    fn ask(&mut self, prompt: &str) -> Result<String, InputError>;
}
