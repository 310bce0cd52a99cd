// Copyright (c) 2025 - Cowboy AI, Inc.
//! Distribution Domain Models
//!
//! Value objects for the remote distribution resource and for the caller's
//! side of reconciliation.
//!
//! # Remote Resource
//!
//! - [`Distribution`] - the remote object (id, status, configuration)
//! - [`VersionToken`] - optimistic-concurrency token (ETag)
//! - [`VersionedDistribution`] - a body paired with the token it was read at
//!
//! # Caller Side
//!
//! - [`DesiredState`] - what the caller wants
//! - [`TrackedState`] - what the caller last knew, including the assigned id
//! - [`UpdatePlan`] - pure diff between the two

pub mod desired;
pub mod distribution;
pub mod tags;
pub mod tracked;

pub use desired::{DesiredState, UpdatePlan};
pub use distribution::{
    Distribution, DistributionConfig, DistributionId, DistributionStatus, VersionToken,
    VersionedDistribution,
};
pub use tags::{TagDiff, Tags};
pub use tracked::TrackedState;
