//! Remote control-plane client abstraction
//!
//! The engine never talks to a network itself; it drives an implementation
//! of [`RemoteClient`] handed in per run. Transport, auth, and retry
//! plumbing live behind this trait.

use crate::error::RemoteError;
use crate::node::ResourceIdentity;
use crate::state::ResourceState;
use async_trait::async_trait;

/// One synchronous-once-awaited operation per call; retries are the
/// client's concern, not the engine's.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Read the current representation. `Err(RemoteError::NotFound)` is the
    /// expected outcome for a resource that does not exist yet.
    async fn read(
        &self,
        identity: &ResourceIdentity,
    ) -> std::result::Result<ResourceState, RemoteError>;

    /// Create the resource from a rendered spec and return its new
    /// representation.
    async fn create(
        &self,
        identity: &ResourceIdentity,
        spec: &serde_json::Value,
    ) -> std::result::Result<ResourceState, RemoteError>;

    /// Update the resource in place and return its new representation.
    async fn update(
        &self,
        identity: &ResourceIdentity,
        spec: &serde_json::Value,
    ) -> std::result::Result<ResourceState, RemoteError>;
}
