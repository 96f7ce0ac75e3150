//! Transfer and repository listeners.
//!
//! Listeners are read-only observers; the engine never alters its behavior
//! based on what a listener does, with the single exception of a transfer
//! listener requesting cancellation through its return value.

use std::sync::Arc;

use aether_util::errors::AetherError;

use crate::artifact::Artifact;
use crate::repository::RemoteRepository;

/// What happened to a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    Initiated,
    Started,
    Progressed,
    Corrupted,
    Succeeded,
    Failed,
}

/// What the transfer was for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferRequestKind {
    Get,
    GetExistence,
    Put,
}

/// The remote resource a transfer moves.
#[derive(Debug, Clone)]
pub struct TransferResource {
    pub repository_url: String,
    pub resource_name: String,
    /// Total size in bytes, when the remote side announced one.
    pub content_length: Option<u64>,
}

/// One step in the lifecycle of a transfer. Per transfer, events arrive in
/// the order `INITIATED ( STARTED PROGRESSED* CORRUPTED? )* ( SUCCEEDED |
/// FAILED )`.
pub struct TransferEvent<'a> {
    pub kind: TransferKind,
    pub request_kind: TransferRequestKind,
    pub resource: &'a TransferResource,
    /// Bytes transferred so far, including the current data frame.
    pub transferred: u64,
    /// The bytes of the current frame; only meaningful for `Progressed` and
    /// only valid for the duration of the callback.
    pub data: Option<&'a [u8]>,
    pub error: Option<&'a AetherError>,
}

/// Observer for transfer progress. All methods default to no-ops; returning
/// `false` from `transfer_progressed` requests cancellation of the
/// transfer.
#[allow(unused_variables)]
pub trait TransferListener: Send + Sync {
    fn transfer_initiated(&self, event: &TransferEvent<'_>) {}
    fn transfer_started(&self, event: &TransferEvent<'_>) {}
    fn transfer_progressed(&self, event: &TransferEvent<'_>) -> bool {
        true
    }
    fn transfer_corrupted(&self, event: &TransferEvent<'_>) {}
    fn transfer_succeeded(&self, event: &TransferEvent<'_>) {}
    fn transfer_failed(&self, event: &TransferEvent<'_>) {}
}

/// Dispatch an event to the listener method matching its kind. Returns
/// `false` when a progress callback asked for cancellation.
pub fn dispatch_transfer(listener: &dyn TransferListener, event: &TransferEvent<'_>) -> bool {
    match event.kind {
        TransferKind::Initiated => listener.transfer_initiated(event),
        TransferKind::Started => listener.transfer_started(event),
        TransferKind::Progressed => return listener.transfer_progressed(event),
        TransferKind::Corrupted => listener.transfer_corrupted(event),
        TransferKind::Succeeded => listener.transfer_succeeded(event),
        TransferKind::Failed => listener.transfer_failed(event),
    }
    true
}

/// Fans transfer events out to several listeners. Cancellation wins: one
/// listener asking to stop stops the transfer.
#[derive(Default)]
pub struct ChainedTransferListener {
    listeners: Vec<Arc<dyn TransferListener>>,
}

impl ChainedTransferListener {
    pub fn new(listeners: Vec<Arc<dyn TransferListener>>) -> Self {
        Self { listeners }
    }

    pub fn push(&mut self, listener: Arc<dyn TransferListener>) {
        self.listeners.push(listener);
    }
}

impl TransferListener for ChainedTransferListener {
    fn transfer_initiated(&self, event: &TransferEvent<'_>) {
        for listener in &self.listeners {
            listener.transfer_initiated(event);
        }
    }

    fn transfer_started(&self, event: &TransferEvent<'_>) {
        for listener in &self.listeners {
            listener.transfer_started(event);
        }
    }

    fn transfer_progressed(&self, event: &TransferEvent<'_>) -> bool {
        let mut keep_going = true;
        for listener in &self.listeners {
            keep_going &= listener.transfer_progressed(event);
        }
        keep_going
    }

    fn transfer_corrupted(&self, event: &TransferEvent<'_>) {
        for listener in &self.listeners {
            listener.transfer_corrupted(event);
        }
    }

    fn transfer_succeeded(&self, event: &TransferEvent<'_>) {
        for listener in &self.listeners {
            listener.transfer_succeeded(event);
        }
    }

    fn transfer_failed(&self, event: &TransferEvent<'_>) {
        for listener in &self.listeners {
            listener.transfer_failed(event);
        }
    }
}

/// Observer for coarse repository lifecycle events emitted by the collector
/// and its sources. All methods default to no-ops.
#[allow(unused_variables)]
pub trait RepositoryListener: Send + Sync {
    fn artifact_resolving(&self, artifact: &Artifact) {}
    fn artifact_resolved(&self, artifact: &Artifact, repository: Option<&RemoteRepository>) {}
    fn artifact_descriptor_missing(&self, artifact: &Artifact) {}
    fn artifact_descriptor_invalid(&self, artifact: &Artifact, error: &AetherError) {}
    fn version_range_failed(&self, artifact: &Artifact, error: &AetherError) {}
    fn metadata_invalid(&self, resource: &str, error: &AetherError) {}
}

/// Fans repository events out to several listeners.
#[derive(Default)]
pub struct ChainedRepositoryListener {
    listeners: Vec<Arc<dyn RepositoryListener>>,
}

impl ChainedRepositoryListener {
    pub fn new(listeners: Vec<Arc<dyn RepositoryListener>>) -> Self {
        Self { listeners }
    }
}

impl RepositoryListener for ChainedRepositoryListener {
    fn artifact_resolving(&self, artifact: &Artifact) {
        for listener in &self.listeners {
            listener.artifact_resolving(artifact);
        }
    }

    fn artifact_resolved(&self, artifact: &Artifact, repository: Option<&RemoteRepository>) {
        for listener in &self.listeners {
            listener.artifact_resolved(artifact, repository);
        }
    }

    fn artifact_descriptor_missing(&self, artifact: &Artifact) {
        for listener in &self.listeners {
            listener.artifact_descriptor_missing(artifact);
        }
    }

    fn artifact_descriptor_invalid(&self, artifact: &Artifact, error: &AetherError) {
        for listener in &self.listeners {
            listener.artifact_descriptor_invalid(artifact, error);
        }
    }

    fn version_range_failed(&self, artifact: &Artifact, error: &AetherError) {
        for listener in &self.listeners {
            listener.version_range_failed(artifact, error);
        }
    }

    fn metadata_invalid(&self, resource: &str, error: &AetherError) {
        for listener in &self.listeners {
            listener.metadata_invalid(resource, error);
        }
    }
}
