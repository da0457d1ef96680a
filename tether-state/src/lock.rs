//! Lock information sent to the remote lock endpoint

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Information about a state lock
///
/// Serialized with the field names HTTP state servers expect (`ID`,
/// `Operation`, `Info`, `Who`, `Version`, `Created`, `Path`). Every field is
/// optional on input, since a server reporting a competing lock may only
/// echo part of the record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct LockInfo {
    /// Unique identifier for this lock
    #[serde(rename = "ID")]
    pub id: String,
    /// The operation being performed (e.g., "init", "apply")
    pub operation: String,
    /// Free-form metadata supplied by the requester
    pub info: String,
    /// Who acquired the lock (username@hostname)
    pub who: String,
    /// Version of the tool that requested the lock
    pub version: String,
    /// When the lock was requested
    pub created: DateTime<Utc>,
    /// The resource being locked
    pub path: String,
}

impl LockInfo {
    /// Create a new lock request for an operation
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            operation: operation.into(),
            info: String::new(),
            who: get_lock_owner(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            created: Utc::now(),
            path: String::new(),
        }
    }

    /// Attach free-form metadata
    pub fn with_info(mut self, info: impl Into<String>) -> Self {
        self.info = info.into();
        self
    }

    /// Record the resource this lock applies to
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// One-line description of the holder, used in conflict messages
    pub fn summary(&self) -> String {
        let who = if self.who.is_empty() {
            "unknown"
        } else {
            &self.who
        };
        if self.operation.is_empty() {
            format!("{} (lock ID: {})", who, self.id)
        } else {
            format!(
                "{} (lock ID: {}, operation: {})",
                who, self.id, self.operation
            )
        }
    }
}

/// Get the lock owner string (username@hostname)
fn get_lock_owner() -> String {
    let username = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());

    let hostname = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());

    format!("{}@{}", username, hostname)
}
