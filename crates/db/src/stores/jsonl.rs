use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::Value;

use chatflow_core::ports::{AppendLog, StoreError};

/// Append-only JSON Lines log. Parent directories are created on first write.
#[derive(Clone, Debug)]
pub struct JsonlAppendLog {
    path: PathBuf,
}

impl JsonlAppendLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every entry written so far, oldest first. A missing file is empty.
    pub fn entries(&self) -> Result<Vec<Value>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&self.path).map_err(|source| self.io(source))?;
        raw.lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                serde_json::from_str(line).map_err(|error| StoreError::Malformed {
                    path: self.path.clone(),
                    message: error.to_string(),
                })
            })
            .collect()
    }

    fn io(&self, source: std::io::Error) -> StoreError {
        StoreError::Io { path: self.path.clone(), source }
    }
}

impl AppendLog for JsonlAppendLog {
    fn append(&self, entry: &Value) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| self.io(source))?;
        }

        let mut line = serde_json::to_string(entry)
            .map_err(|error| StoreError::Unavailable(error.to_string()))?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| self.io(source))?;
        file.write_all(line.as_bytes()).map_err(|source| self.io(source))?;

        tracing::debug!(
            event_name = "store.appended",
            path = %self.path.display(),
            "append log entry written"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chatflow_core::ports::{AppendLog, StoreError};
    use serde_json::json;
    use tempfile::TempDir;

    use super::JsonlAppendLog;

    #[test]
    fn appends_one_line_per_entry_and_creates_directories() {
        let dir = TempDir::new().expect("tempdir");
        let log = JsonlAppendLog::new(dir.path().join("nested/complaints.jsonl"));
        assert!(log.entries().expect("empty").is_empty());

        log.append(&json!({"raw_input": "快递太慢", "summary": "用户投诉：快递太慢"}))
            .expect("first append");
        log.append(&json!({"raw_input": "客服态度差"})).expect("second append");

        let raw = fs::read_to_string(log.path()).expect("read log");
        assert_eq!(raw.lines().count(), 2);
        let entries = log.entries().expect("entries");
        assert_eq!(entries[0]["raw_input"], "快递太慢");
        assert_eq!(entries[1]["raw_input"], "客服态度差");
    }

    #[test]
    fn unwritable_target_reports_io_error() {
        let dir = TempDir::new().expect("tempdir");
        let log = JsonlAppendLog::new(dir.path());

        let error = log.append(&json!({"raw_input": "x"})).expect_err("directory is not a file");
        assert!(matches!(error, StoreError::Io { .. }));
    }
}
