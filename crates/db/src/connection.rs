use std::path::PathBuf;
use std::sync::Arc;

use chatflow_core::config::DataConfig;
use chatflow_core::ports::{ProductCatalog, RecordStores, StoreError};

use crate::stores::{JsonProductCatalog, JsonRecordStore, JsonlAppendLog};

/// File-backed stores for every data file named in `[data]`. Files are
/// opened lazily on each access, so this never fails.
pub fn open_record_stores(data: &DataConfig) -> RecordStores {
    RecordStores {
        orders: Arc::new(JsonRecordStore::orders(&data.orders_path)),
        membership: Arc::new(JsonRecordStore::membership(&data.membership_path)),
        products: Arc::new(JsonProductCatalog::new(&data.products_path)),
        complaints: Arc::new(JsonlAppendLog::new(&data.complaints_path)),
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataFileStatus {
    pub name: &'static str,
    pub path: PathBuf,
    pub records: Option<usize>,
    pub error: Option<String>,
}

impl DataFileStatus {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    fn from_result(name: &'static str, path: PathBuf, result: Result<usize, StoreError>) -> Self {
        match result {
            Ok(records) => Self { name, path, records: Some(records), error: None },
            Err(error) => Self { name, path, records: None, error: Some(error.to_string()) },
        }
    }
}

/// Parses each readable data file once. The complaint log only needs to be
/// readable if it already exists.
pub fn check_data_files(data: &DataConfig) -> Vec<DataFileStatus> {
    let orders = JsonRecordStore::orders(&data.orders_path);
    let membership = JsonRecordStore::membership(&data.membership_path);
    let products = JsonProductCatalog::new(&data.products_path);
    let complaints = JsonlAppendLog::new(&data.complaints_path);

    vec![
        DataFileStatus::from_result("orders", data.orders_path.clone(), orders.record_count()),
        DataFileStatus::from_result(
            "membership",
            data.membership_path.clone(),
            membership.record_count(),
        ),
        DataFileStatus::from_result(
            "products",
            data.products_path.clone(),
            products.products().map(|products| products.len()),
        ),
        DataFileStatus::from_result(
            "complaints",
            data.complaints_path.clone(),
            complaints.entries().map(|entries| entries.len()),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chatflow_core::config::DataConfig;
    use chatflow_core::ports::{AppendLog, RecordStore};
    use serde_json::json;
    use tempfile::TempDir;

    use super::{check_data_files, open_record_stores};

    #[test]
    fn opened_stores_read_and_append_configured_files() {
        let dir = TempDir::new().expect("tempdir");
        let data = DataConfig::under(dir.path());
        fs::write(&data.orders_path, r#"{"13812345678": {"order_status": "已发货"}}"#)
            .expect("write orders");

        let stores = open_record_stores(&data);
        let order = stores.orders.get("13812345678").expect("read").expect("present");
        assert_eq!(order["order_status"], "已发货");

        stores.complaints.append(&json!({"raw_input": "太慢"})).expect("append");
        assert!(data.complaints_path.exists());
    }

    #[test]
    fn check_reports_each_file() {
        let dir = TempDir::new().expect("tempdir");
        let data = DataConfig::under(dir.path());
        fs::write(&data.orders_path, r#"{"a": {}, "b": {}}"#).expect("write orders");
        fs::write(&data.membership_path, r#"{"userMemberList": []}"#).expect("write membership");
        fs::write(&data.products_path, "not json").expect("write products");

        let statuses = check_data_files(&data);

        assert_eq!(statuses.len(), 4);
        assert_eq!(statuses[0].records, Some(2));
        assert_eq!(statuses[1].records, Some(0));
        assert!(!statuses[2].is_ok());
        assert!(statuses[3].is_ok(), "absent complaint log is fine");
    }
}
