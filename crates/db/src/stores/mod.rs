pub mod json;
pub mod jsonl;
pub mod memory;

pub use json::{JsonProductCatalog, JsonRecordStore, RecordLayout};
pub use jsonl::JsonlAppendLog;
pub use memory::{InMemoryAppendLog, InMemoryProductCatalog, InMemoryRecordStore};
