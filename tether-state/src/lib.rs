//! Tether State
//!
//! This crate stores infrastructure state documents on any HTTP endpoint
//! and coordinates writers through lock/unlock requests sent with
//! configurable HTTP verbs.
//!
//! # Overview
//!
//! The state management system consists of:
//!
//! - **RemoteClient**: get/put/delete/lock/unlock against one named state
//! - **StateBackend**: listing and deleting named states, plus the
//!   read-or-initialize flow that returns a [`RemoteState`]
//! - **HttpBackend**: the HTTP implementation of both
//! - **LockInfo**: the lock record sent to the lock endpoint
//!
//! The state document itself is opaque bytes. A state that has no document
//! yet gets an empty one, written between a lock and an unlock.
//!
//! # Example
//!
//! ```ignore
//! use tether_state::{create_backend, BackendConfig, LockInfo};
//! use serde_json::json;
//!
//! let config = BackendConfig::new("http")
//!     .with_attribute("address", json!("https://state.example.com/infra"))
//!     .with_attribute("username", json!("ops"))
//!     .with_attribute("password", json!("secret"));
//!
//! let backend = create_backend(&config)?;
//!
//! // Every listing includes "default"
//! let names = backend.list_states().await?;
//!
//! // Reads prod.state, creating it under lock if missing
//! let mut state = backend.state("prod").await?;
//!
//! let lock_id = state.lock(&LockInfo::new("apply")).await?;
//! state.persist(new_document).await?;
//! state.unlock(&lock_id).await?;
//! ```

pub mod backend;
pub mod backends;
pub mod catalog;
pub mod client;
pub mod config;
pub mod init;
pub mod lock;
pub mod paths;
pub mod state;
pub mod transport;

// Re-export main types for convenience
pub use backend::{BackendConfig, BackendError, BackendResult, RemoteClient, StateBackend};
pub use backends::{HttpBackend, create_backend};
pub use catalog::DEFAULT_STATE_NAME;
pub use client::HttpClient;
pub use config::{Credentials, HttpBackendConfig, MethodConfig, TlsMode};
pub use init::{read_or_init, write_locked};
pub use lock::LockInfo;
pub use state::{EmptyState, RemoteState, StatePayload};
