// Copyright (c) 2025 - Cowboy AI, Inc.
//! Remote Control-Plane Clients
//!
//! The reconciler only talks to the remote through these two traits, so any
//! transport can be injected at construction time.
//!
//! # Contract
//!
//! ```text
//! get(id)                   → (Distribution, token) | NotFound | Transient
//! create(config, tags)      → (Distribution, token)
//! update(id, token, config) → (Distribution, new token) | VersionConflict | PreconditionFailed | ResourceBusy
//! delete(id, token)         → () | VersionConflict | PreconditionFailed | ResourceBusy | NotFound
//! apply_tag_diff(id, old, new) → ()            (no version token)
//! ```
//!
//! The remote is reliable but slow and only eventually consistent: two
//! successive reads may return different tokens with no caller-initiated
//! change in between.
//!
//! # Implementations
//!
//! - [`memory::InMemoryDistributionApi`] - simulated remote with deployment
//!   lag and fault injection
//! - `http::HttpDistributionClient` - JSON control-plane client (feature `http`)

use async_trait::async_trait;

use crate::domain::{DistributionConfig, DistributionId, Tags, VersionToken, VersionedDistribution};
use crate::errors::RemoteError;

#[cfg(feature = "http")]
pub mod http;
pub mod memory;

#[cfg(feature = "http")]
pub use http::{HttpClientConfig, HttpDistributionClient};
pub use memory::{ApiCall, Fault, InMemoryDistributionApi, RecordedCall};

/// Result of one remote call
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Distribution CRUD against the remote control plane
#[async_trait]
pub trait DistributionClient: Send + Sync {
    /// Read the distribution and its current version token
    async fn get(&self, id: &DistributionId) -> RemoteResult<VersionedDistribution>;

    /// Create a distribution with its initial tags
    async fn create(
        &self,
        config: &DistributionConfig,
        tags: &Tags,
    ) -> RemoteResult<VersionedDistribution>;

    /// Replace the full configuration document, guarded by `version`
    async fn update(
        &self,
        id: &DistributionId,
        version: &VersionToken,
        config: &DistributionConfig,
    ) -> RemoteResult<VersionedDistribution>;

    /// Delete the distribution, guarded by `version`
    async fn delete(&self, id: &DistributionId, version: &VersionToken) -> RemoteResult<()>;
}

/// Tag management, independent of the distribution's version token
#[async_trait]
pub trait TaggingClient: Send + Sync {
    async fn apply_tag_diff(
        &self,
        id: &DistributionId,
        old_tags: &Tags,
        new_tags: &Tags,
    ) -> RemoteResult<()>;
}
