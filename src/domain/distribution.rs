// Copyright (c) 2025 - Cowboy AI, Inc.
//! Distribution Value Objects
//!
//! The remote distribution resource as the reconciler sees it. Everything the
//! reconciler does not need to reason about (origins, cache behaviors,
//! certificates, tenant parameters) lives in [`DistributionConfig::settings`]
//! and is passed through untouched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier assigned by the remote system
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DistributionId(String);

impl DistributionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DistributionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DistributionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for DistributionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Version token (ETag) identifying one revision of a distribution
///
/// A token is only valid until the next successful mutation by any actor.
/// Every mutating call must present the token most recently observed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionToken(String);

impl VersionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Propagation status reported by the remote system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DistributionStatus {
    /// A change has been accepted and is still propagating
    InProgress,

    /// The latest change has reached the serving infrastructure
    Deployed,
}

impl DistributionStatus {
    pub fn is_deployed(&self) -> bool {
        matches!(self, DistributionStatus::Deployed)
    }
}

impl fmt::Display for DistributionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistributionStatus::InProgress => f.write_str("InProgress"),
            DistributionStatus::Deployed => f.write_str("Deployed"),
        }
    }
}

/// Complete configuration document of a distribution
///
/// The remote API only accepts whole documents on update, never diffs.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DistributionConfig {
    /// Whether the distribution serves traffic
    pub enabled: bool,

    /// Idempotency token fixed at creation time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caller_reference: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    /// Opaque payload: origins, behaviors, certificates, tenant parameters
    #[serde(default)]
    pub settings: serde_json::Map<String, serde_json::Value>,
}

impl DistributionConfig {
    /// Create an enabled configuration with no settings
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    /// Builder-style setter for a single opaque setting
    pub fn with_setting(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.settings.insert(key.into(), value);
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Lay the caller-controlled fields of `desired` over this document
    ///
    /// `caller_reference` belongs to the server copy and is never replaced.
    /// Settings absent from `desired` keep their server-side values.
    pub fn overlay(&mut self, desired: &DistributionConfig) {
        self.enabled = desired.enabled;
        self.comment = desired.comment.clone();
        for (key, value) in &desired.settings {
            self.settings.insert(key.clone(), value.clone());
        }
    }

    /// Return a copy of this document with `desired` overlaid
    pub fn overlaid(&self, desired: &DistributionConfig) -> Self {
        let mut merged = self.clone();
        merged.overlay(desired);
        merged
    }

    /// True when overlaying `desired` would change this document
    pub fn differs_from(&self, desired: &DistributionConfig) -> bool {
        self.overlaid(desired) != *self
    }
}

/// The remote distribution object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Distribution {
    pub id: DistributionId,
    pub status: DistributionStatus,
    pub config: DistributionConfig,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
}

impl Distribution {
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Deployed and serving no traffic, the only state the remote will delete
    pub fn is_deletable(&self) -> bool {
        self.status.is_deployed() && !self.config.enabled
    }
}

/// A distribution body paired with the version token it was read at
#[derive(Debug, Clone, PartialEq)]
pub struct VersionedDistribution {
    pub distribution: Distribution,
    pub version: VersionToken,
}

impl VersionedDistribution {
    pub fn new(distribution: Distribution, version: VersionToken) -> Self {
        Self {
            distribution,
            version,
        }
    }

    pub fn id(&self) -> &DistributionId {
        &self.distribution.id
    }

    pub fn status(&self) -> DistributionStatus {
        self.distribution.status
    }
}
