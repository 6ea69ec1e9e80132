//! File-backed record stores: JSON lookups for orders and membership, the
//! JSON product catalog and the JSON Lines complaint log.

pub mod connection;
pub mod stores;

pub use connection::{check_data_files, open_record_stores, DataFileStatus};
pub use stores::{
    InMemoryAppendLog, InMemoryProductCatalog, InMemoryRecordStore, JsonProductCatalog,
    JsonRecordStore, JsonlAppendLog, RecordLayout,
};
