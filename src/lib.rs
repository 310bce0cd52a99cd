// Copyright (c) 2025 - Cowboy AI, Inc.
//! Lifecycle reconciler for eventually-consistent CDN distributions
//!
//! Manages one remote distribution at a time through a control plane that
//! requires a version token (ETag) on every write, takes minutes to deploy a
//! change, and refuses to delete a distribution that is still enabled.
//!
//! # Layout
//!
//! - [`domain`] - distribution, desired and tracked state value objects
//! - [`client`] - the remote contracts plus in-memory and HTTP implementations
//! - [`waiter`] - cancellable polling until a change is deployed
//! - [`retry`] - bounded retries with a freshly read version token
//! - [`state_machine`] - lifecycle and delete protocol state machines
//! - [`reconciler`] - create, update, delete, read, refresh and import
//! - [`config`] - timing budgets
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use cdn_reconciler::{
//!     DesiredState, DistributionConfig, DistributionReconciler, InMemoryDistributionApi,
//!     ReconcilerConfig, TrackedState,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> cdn_reconciler::ReconcileResult<()> {
//! let api = Arc::new(InMemoryDistributionApi::new());
//! let reconciler = DistributionReconciler::new(api.clone(), api, ReconcilerConfig::default());
//! let cancel = CancellationToken::new();
//!
//! let mut tracked = TrackedState::new();
//! let desired = DesiredState::new(DistributionConfig::enabled()).with_tag("team", "edge");
//! reconciler.create(&desired, &mut tracked, &cancel).await?;
//! reconciler.delete(&desired, &mut tracked, &cancel).await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod domain;
pub mod errors;
pub mod reconciler;
pub mod retry;
pub mod state_machine;
pub mod waiter;

// Re-export commonly used types
#[cfg(feature = "http")]
pub use client::{HttpClientConfig, HttpDistributionClient};
pub use client::{DistributionClient, InMemoryDistributionApi, RemoteResult, TaggingClient};
pub use config::ReconcilerConfig;
pub use domain::{
    DesiredState, Distribution, DistributionConfig, DistributionId, DistributionStatus, TagDiff,
    Tags, TrackedState, UpdatePlan, VersionToken, VersionedDistribution,
};
pub use errors::{ReconcileError, ReconcileResult, RemoteError};
pub use reconciler::{DeleteReport, DistributionReconciler};
pub use retry::{Backoff, RetrySettings, VersionConflictRetrier};
pub use state_machine::{DeleteOutcome, DeletePhase, LifecycleState};
pub use waiter::{DeploymentWaiter, WaitSettings};
