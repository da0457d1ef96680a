//! State backend traits and error types

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::init::read_or_init;
use crate::lock::LockInfo;
use crate::state::{RemoteState, StatePayload};

/// Errors that can occur when interacting with a state backend
#[derive(Debug, Error)]
pub enum BackendError {
    /// The state is locked by another process
    #[error("State is already locked at {url}{}", holder_suffix(.holder))]
    Locked {
        url: String,
        holder: Option<Box<LockInfo>>,
    },

    /// The lock ID presented on unlock is not the one currently held
    #[error("Lock ID mismatch at {url}: {lock_id} does not match the held lock{}", held_suffix(.held))]
    LockMismatch {
        url: String,
        lock_id: String,
        held: Option<String>,
    },

    /// Empty state name, or an operation not allowed for the default state
    #[error("Invalid state name: {0}")]
    InvalidName(String),

    /// The backend type is not supported
    #[error("Unsupported backend type: {0}")]
    UnsupportedBackend(String),

    /// Configuration error
    #[error("Backend configuration error: {0}")]
    Configuration(String),

    /// Connection, TLS or timeout failure
    #[error("HTTP {operation} of {url} failed: {message}")]
    Transport {
        operation: &'static str,
        url: String,
        message: String,
    },

    /// The endpoint answered with a status the operation does not accept
    #[error("HTTP {operation} of {url} returned unexpected status {status}")]
    UnexpectedStatus {
        operation: &'static str,
        url: String,
        status: u16,
    },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The state was written but releasing the lock failed
    #[error(
        "Error unlocking http state. Lock ID: {lock_id}\n\nError: {source}\n\n\
         You may have to force-unlock this state in order to use it again."
    )]
    Unlock {
        lock_id: String,
        source: Box<BackendError>,
    },

    /// Writing under a lock failed; carries the unlock outcome as well
    #[error(
        "Failed to write state during {operation} (lock ID: {lock_id}): {write}; {}",
        unlock_outcome(.unlock)
    )]
    LockedWrite {
        operation: String,
        lock_id: String,
        write: Box<BackendError>,
        unlock: Option<Box<BackendError>>,
    },
}

fn holder_suffix(holder: &Option<Box<LockInfo>>) -> String {
    match holder {
        Some(info) => format!(" by {}", info.summary()),
        None => String::new(),
    }
}

fn held_suffix(held: &Option<String>) -> String {
    match held {
        Some(id) => format!(" ({})", id),
        None => String::new(),
    }
}

fn unlock_outcome(unlock: &Option<Box<BackendError>>) -> String {
    match unlock {
        None => "the lock was released".to_string(),
        Some(err) => format!(
            "additionally the lock could not be released ({}); \
             you may have to force-unlock this state",
            err
        ),
    }
}

impl BackendError {
    /// Create a Locked error for a lock resource
    pub fn locked(url: impl Into<String>, holder: Option<LockInfo>) -> Self {
        Self::Locked {
            url: url.into(),
            holder: holder.map(Box::new),
        }
    }

    /// Create an unsupported backend error
    pub fn unsupported_backend(backend_type: impl Into<String>) -> Self {
        Self::UnsupportedBackend(backend_type.into())
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create an invalid name error
    pub fn invalid_name(message: impl Into<String>) -> Self {
        Self::InvalidName(message.into())
    }

    pub fn transport(operation: &'static str, url: &str, err: impl std::fmt::Display) -> Self {
        Self::Transport {
            operation,
            url: url.to_string(),
            message: err.to_string(),
        }
    }

    pub fn unexpected_status(operation: &'static str, url: &str, status: u16) -> Self {
        Self::UnexpectedStatus {
            operation,
            url: url.to_string(),
            status,
        }
    }

    /// Wrap an unlock failure that followed a successful write
    pub fn unlock(lock_id: impl Into<String>, source: BackendError) -> Self {
        Self::Unlock {
            lock_id: lock_id.into(),
            source: Box::new(source),
        }
    }

    /// Whether this error reports a lock held by someone else
    pub fn is_locked(&self) -> bool {
        matches!(self, Self::Locked { .. })
    }
}

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Client for the document and lock resources of one named state
///
/// Implementations perform exactly one remote round trip per call and never
/// retry.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Read the state document
    ///
    /// Returns `None` if no document exists (first-time use)
    async fn get(&self) -> BackendResult<Option<StatePayload>>;

    /// Write the state document
    async fn put(&self, data: &[u8]) -> BackendResult<()>;

    /// Delete the state document
    async fn delete(&self) -> BackendResult<()>;

    /// Acquire the lock, returning the lock ID to hand back to `unlock`
    ///
    /// Fails with [`BackendError::Locked`] if another holder has it
    async fn lock(&self, info: &LockInfo) -> BackendResult<String>;

    /// Release the lock identified by `lock_id`
    async fn unlock(&self, lock_id: &str) -> BackendResult<()>;
}

#[async_trait]
impl<C: RemoteClient + ?Sized> RemoteClient for Box<C> {
    async fn get(&self) -> BackendResult<Option<StatePayload>> {
        (**self).get().await
    }

    async fn put(&self, data: &[u8]) -> BackendResult<()> {
        (**self).put(data).await
    }

    async fn delete(&self) -> BackendResult<()> {
        (**self).delete().await
    }

    async fn lock(&self, info: &LockInfo) -> BackendResult<String> {
        (**self).lock(info).await
    }

    async fn unlock(&self, lock_id: &str) -> BackendResult<()> {
        (**self).unlock(lock_id).await
    }
}

/// Trait for multi-state backends
///
/// A backend manages any number of named states under one address and
/// hands out a [`RemoteClient`] scoped to each.
#[async_trait]
pub trait StateBackend: Send + Sync {
    /// List all named states, sorted, always including the default state
    async fn list_states(&self) -> BackendResult<Vec<String>>;

    /// Delete a named state; the default state can't be deleted
    async fn delete_state(&self, name: &str) -> BackendResult<()>;

    /// Build a client scoped to one named state
    fn client(&self, name: &str) -> BackendResult<Box<dyn RemoteClient>>;

    /// Read a named state, creating an empty document under lock if none exists
    async fn state(&self, name: &str) -> BackendResult<RemoteState<Box<dyn RemoteClient>>> {
        let client = self.client(name)?;
        read_or_init(name, client).await
    }
}

/// Configuration for a state backend
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Backend type (e.g., "http")
    pub backend_type: String,
    /// Backend-specific attributes
    pub attributes: HashMap<String, serde_json::Value>,
}

impl BackendConfig {
    pub fn new(backend_type: impl Into<String>) -> Self {
        Self {
            backend_type: backend_type.into(),
            attributes: HashMap::new(),
        }
    }

    /// Parse attributes from a JSON object
    pub fn from_json(backend_type: impl Into<String>, json: &str) -> BackendResult<Self> {
        let attributes: HashMap<String, serde_json::Value> = serde_json::from_str(json)
            .map_err(|e| {
                BackendError::configuration(format!("Invalid backend configuration: {}", e))
            })?;
        Ok(Self {
            backend_type: backend_type.into(),
            attributes,
        })
    }

    /// Set an attribute, replacing any previous value
    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Get a string attribute value
    pub fn get_string(&self, key: &str) -> Option<&str> {
        match self.attributes.get(key) {
            Some(serde_json::Value::String(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Get a non-empty string attribute value
    pub fn get_non_empty(&self, key: &str) -> Option<&str> {
        self.get_string(key).filter(|s| !s.is_empty())
    }

    /// Get a boolean attribute value
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.attributes.get(key) {
            Some(serde_json::Value::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    /// Get a boolean attribute with a default value
    pub fn get_bool_or(&self, key: &str, default: bool) -> bool {
        self.get_bool(key).unwrap_or(default)
    }

    /// Get an unsigned integer attribute value
    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.attributes.get(key).and_then(serde_json::Value::as_u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_backend_error_locked() {
        let mut lock = LockInfo::new("apply");
        lock.who = "bob@ci".to_string();
        let error = BackendError::locked("http://example.com/prod.lock", Some(lock.clone()));

        assert!(error.is_locked());
        match &error {
            BackendError::Locked { url, holder } => {
                assert_eq!(url, "http://example.com/prod.lock");
                assert_eq!(holder.as_deref(), Some(&lock));
            }
            _ => panic!("Expected Locked error"),
        }
        assert!(error.to_string().contains("bob@ci"));
        assert!(error.to_string().contains(&lock.id));
    }

    #[test]
    fn test_backend_error_display() {
        let error = BackendError::unsupported_backend("azure");
        assert_eq!(error.to_string(), "Unsupported backend type: azure");

        let error = BackendError::unexpected_status("read", "http://example.com/a.state", 500);
        assert_eq!(
            error.to_string(),
            "HTTP read of http://example.com/a.state returned unexpected status 500"
        );

        let error = BackendError::LockMismatch {
            url: "http://example.com/a.lock".to_string(),
            lock_id: "mine".to_string(),
            held: Some("theirs".to_string()),
        };
        let expected = concat!(
            "Lock ID mismatch at http://example.com/a.lock: ",
            "mine does not match the held lock (theirs)"
        );
        assert_eq!(error.to_string(), expected);
    }

    #[test]
    fn test_unlock_error_mentions_force_unlock() {
        let cause = BackendError::unexpected_status("unlock", "http://example.com/a.lock", 500);
        let error = BackendError::unlock("lock-1", cause);
        let message = error.to_string();
        assert!(message.contains("Lock ID: lock-1"));
        assert!(message.contains("returned unexpected status 500"));
        assert!(message.contains("force-unlock"));
    }

    #[test]
    fn test_locked_write_reports_both_failures() {
        let error = BackendError::LockedWrite {
            operation: "init".to_string(),
            lock_id: "lock-1".to_string(),
            write: Box::new(BackendError::unexpected_status(
                "write",
                "http://example.com/a.state",
                507,
            )),
            unlock: Some(Box::new(BackendError::unexpected_status(
                "unlock",
                "http://example.com/a.lock",
                500,
            ))),
        };
        let message = error.to_string();
        assert!(message.contains("status 507"));
        assert!(message.contains("status 500"));
        assert!(message.contains("lock-1"));
    }

    #[test]
    fn test_backend_config_getters() {
        let config = BackendConfig::new("http")
            .with_attribute("address", json!("http://localhost:8080"))
            .with_attribute("skip_cert_verification", json!(true))
            .with_attribute("timeout_seconds", json!(3))
            .with_attribute("username", json!(""));

        assert_eq!(config.get_string("address"), Some("http://localhost:8080"));
        assert_eq!(config.get_bool("skip_cert_verification"), Some(true));
        assert!(!config.get_bool_or("mutual_tls_authentication", false));
        assert_eq!(config.get_u64("timeout_seconds"), Some(3));
        assert_eq!(config.get_string("username"), Some(""));
        assert_eq!(config.get_non_empty("username"), None);
        // Wrong type reads as absent
        assert_eq!(config.get_bool("address"), None);
    }

    #[test]
    fn test_backend_config_from_json() {
        let config = BackendConfig::from_json(
            "http",
            r#"{"address": "https://state.example.com", "lock_method": "PUT"}"#,
        )
        .unwrap();
        assert_eq!(config.backend_type, "http");
        assert_eq!(config.get_string("lock_method"), Some("PUT"));

        let result = BackendConfig::from_json("http", "[1, 2]");
        assert!(matches!(result, Err(BackendError::Configuration(_))));
    }
}
