use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::SessionId;

/// One line of the append-only complaint log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplaintEntry {
    pub recorded_at: DateTime<Utc>,
    pub session_id: SessionId,
    pub raw_input: String,
    pub summary: String,
}

impl ComplaintEntry {
    pub fn new(
        session_id: SessionId,
        raw_input: impl Into<String>,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            recorded_at: Utc::now(),
            session_id,
            raw_input: raw_input.into(),
            summary: summary.into(),
        }
    }
}
