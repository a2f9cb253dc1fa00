use crate::core::{Code, Status};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One message of the batch write response stream.
///
/// A message reports the status shared by the groups at `indexes`, which
/// refer to positions in the request. On success it also carries the commit
/// timestamp of those groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchWriteResponse {
    pub indexes: Vec<usize>,
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_timestamp: Option<DateTime<Utc>>,
}

impl BatchWriteResponse {
    pub fn committed(indexes: Vec<usize>, commit_timestamp: DateTime<Utc>) -> Self {
        Self {
            indexes,
            status: Status::ok(),
            commit_timestamp: Some(commit_timestamp),
        }
    }

    pub fn failed(indexes: Vec<usize>, code: Code, message: impl Into<String>) -> Self {
        Self {
            indexes,
            status: Status::new(code, message),
            commit_timestamp: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_ok()
    }

    pub fn covers(&self, group_index: usize) -> bool {
        self.indexes.contains(&group_index)
    }
}
