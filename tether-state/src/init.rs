//! Read-or-initialize protocol for named states
//!
//! A named state that has no document yet gets an empty one, written while
//! holding the state's lock:
//!
//! ```text
//! NoState --found--> Ready
//!    |
//!    +--absent--> Locking --err--> Failed
//!                    |
//!                    v
//!               Initializing --(always)--> Unlocking --> Ready | Failed
//! ```
//!
//! Exclusivity of the initial write is only as strong as the remote lock.

use std::fmt;

use log::{debug, info, warn};

use crate::backend::{BackendError, BackendResult, RemoteClient};
use crate::lock::LockInfo;
use crate::state::{EmptyState, RemoteState, StatePayload};

/// Lock operation label used while creating the initial document
pub const INIT_OPERATION: &str = "init";

/// Phases of the read-or-initialize protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitPhase {
    NoState,
    Locking,
    Initializing,
    Unlocking,
    Ready,
    Failed,
}

impl fmt::Display for InitPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            InitPhase::NoState => "no-state",
            InitPhase::Locking => "locking",
            InitPhase::Initializing => "initializing",
            InitPhase::Unlocking => "unlocking",
            InitPhase::Ready => "ready",
            InitPhase::Failed => "failed",
        };
        f.write_str(label)
    }
}

fn enter(name: &str, phase: InitPhase) {
    debug!("state {}: {}", name, phase);
}

/// Read a named state, creating an empty document under lock if it has none
///
/// An existing document is returned after a single read; no lock is taken.
pub async fn read_or_init<C: RemoteClient>(
    name: impl Into<String>,
    client: C,
) -> BackendResult<RemoteState<C>> {
    let name = name.into();

    enter(&name, InitPhase::NoState);
    if let Some(document) = client.get().await? {
        enter(&name, InitPhase::Ready);
        return Ok(RemoteState::new(name, client, document));
    }

    let empty = EmptyState::new().to_payload()?;
    match write_locked(&name, &client, INIT_OPERATION, empty).await {
        Ok(document) => {
            info!("state {}: initialized empty state", name);
            enter(&name, InitPhase::Ready);
            Ok(RemoteState::new(name, client, document))
        }
        Err(err) => {
            enter(&name, InitPhase::Failed);
            Err(err)
        }
    }
}

/// Write `payload` while holding the state's lock
///
/// The lock is released whether or not the write succeeds. A failed write
/// is reported together with the unlock outcome; a failed unlock after a
/// successful write is reported on its own.
pub async fn write_locked<C: RemoteClient + ?Sized>(
    name: &str,
    client: &C,
    operation: &str,
    payload: StatePayload,
) -> BackendResult<StatePayload> {
    enter(name, InitPhase::Locking);
    let lock_info = LockInfo::new(operation);
    let lock_id = client.lock(&lock_info).await?;

    enter(name, InitPhase::Initializing);
    let written = client.put(payload.as_bytes()).await;

    enter(name, InitPhase::Unlocking);
    let unlocked = client.unlock(&lock_id).await;
    if let Err(err) = &unlocked {
        warn!("state {}: failed to release lock {}: {}", name, lock_id, err);
    }

    match (written, unlocked) {
        (Ok(()), Ok(())) => Ok(payload),
        (Ok(()), Err(unlock_err)) => Err(BackendError::unlock(lock_id, unlock_err)),
        (Err(write_err), unlocked) => Err(BackendError::LockedWrite {
            operation: operation.to_string(),
            lock_id,
            write: Box::new(write_err),
            unlock: unlocked.err().map(Box::new),
        }),
    }
}
