//! State documents and the handle returned for a named state

use serde::{Deserialize, Serialize};

use crate::backend::{BackendError, BackendResult, RemoteClient};
use crate::lock::LockInfo;

/// An opaque state document as stored by the remote endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatePayload {
    data: Vec<u8>,
}

impl StatePayload {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self { data: data.into() }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// The document written when a named state is initialized
///
/// Only the envelope is modelled; resources and outputs stay empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmptyState {
    /// State format version
    pub version: u32,
    /// Monotonically increasing number for each state modification
    pub serial: u64,
    /// Unique identifier for this state lineage
    pub lineage: String,
    /// Version of the tool that created the document
    pub tool_version: String,
    pub outputs: serde_json::Map<String, serde_json::Value>,
    pub resources: Vec<serde_json::Value>,
}

impl EmptyState {
    /// State format version written for new documents
    pub const FORMAT_VERSION: u32 = 4;

    /// Create a new empty state with a fresh lineage
    pub fn new() -> Self {
        Self {
            version: Self::FORMAT_VERSION,
            serial: 0,
            lineage: uuid::Uuid::new_v4().to_string(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            outputs: serde_json::Map::new(),
            resources: Vec::new(),
        }
    }

    /// Serialize into a payload ready to be written
    pub fn to_payload(&self) -> BackendResult<StatePayload> {
        let data = serde_json::to_vec_pretty(self).map_err(|e| {
            BackendError::Serialization(format!("Failed to serialize empty state: {}", e))
        })?;
        Ok(StatePayload::new(data))
    }
}

impl Default for EmptyState {
    fn default() -> Self {
        Self::new()
    }
}

/// A named state together with the client that reaches it
///
/// Returned by the read-or-initialize flow; always holds a document.
pub struct RemoteState<C> {
    name: String,
    client: C,
    document: StatePayload,
}

impl<C: RemoteClient> RemoteState<C> {
    pub fn new(name: impl Into<String>, client: C, document: StatePayload) -> Self {
        Self {
            name: name.into(),
            client,
            document,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The most recently read or written document
    pub fn document(&self) -> &StatePayload {
        &self.document
    }

    pub fn into_document(self) -> StatePayload {
        self.document
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Re-read the document from the remote endpoint
    ///
    /// Returns `false` when the remote no longer has a document, in which
    /// case the last known document is kept.
    pub async fn refresh(&mut self) -> BackendResult<bool> {
        match self.client.get().await? {
            Some(document) => {
                self.document = document;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Write a new document and remember it as current
    pub async fn persist(&mut self, document: StatePayload) -> BackendResult<()> {
        self.client.put(document.as_bytes()).await?;
        self.document = document;
        Ok(())
    }

    pub async fn lock(&self, info: &LockInfo) -> BackendResult<String> {
        self.client.lock(info).await
    }

    pub async fn unlock(&self, lock_id: &str) -> BackendResult<()> {
        self.client.unlock(lock_id).await
    }
}
