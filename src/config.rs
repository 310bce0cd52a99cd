// Copyright (c) 2025 - Cowboy AI, Inc.
//! Reconciler Configuration
//!
//! Timing budgets for waits and retries. Every field is in whole seconds so
//! the same document can come from a file, from JSON or from the
//! environment.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{ReconcileError, ReconcileResult};
use crate::retry::{Backoff, RetrySettings};
use crate::waiter::WaitSettings;

/// Prefix of every environment variable read by [`ReconcilerConfig::from_env`]
pub const ENV_PREFIX: &str = "CDN_RECONCILER_";

/// Budgets used by [`crate::DistributionReconciler`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    /// How long to wait for a change to deploy
    pub deployment_timeout_secs: u64,

    /// Pause between status reads
    pub poll_interval_secs: u64,

    /// How long to wait for a deleted distribution to stop being readable
    pub deletion_timeout_secs: u64,

    /// Budget for retrying stale version tokens
    pub version_conflict_timeout_secs: u64,

    /// First backoff delay after a version conflict
    pub version_conflict_backoff_secs: u64,

    /// Upper bound of the conflict backoff
    pub version_conflict_max_backoff_secs: u64,

    /// Budget for retrying a delete the remote still considers enabled
    pub disable_propagation_timeout_secs: u64,

    /// Budget for retrying a certificate the remote cannot see yet
    pub certificate_propagation_timeout_secs: u64,

    /// Delay between attempts for the two propagation retries
    pub propagation_retry_interval_secs: u64,

    /// Poll until a deleted distribution reads as not found
    pub wait_for_deletion: bool,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            deployment_timeout_secs: 90 * 60,
            poll_interval_secs: 15,
            deletion_timeout_secs: 90 * 60,
            version_conflict_timeout_secs: 60,
            version_conflict_backoff_secs: 1,
            version_conflict_max_backoff_secs: 8,
            disable_propagation_timeout_secs: 3 * 60,
            certificate_propagation_timeout_secs: 60,
            propagation_retry_interval_secs: 5,
            wait_for_deletion: true,
        }
    }
}

impl ReconcilerConfig {
    /// Load from `CDN_RECONCILER_*` variables, falling back to defaults
    ///
    /// Variable names are the upper-cased field names, e.g.
    /// `CDN_RECONCILER_POLL_INTERVAL_SECS`.
    pub fn from_env() -> ReconcileResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> ReconcileResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let secs = |field: &str, default: u64| -> ReconcileResult<u64> {
            let name = format!("{}{}", ENV_PREFIX, field.to_uppercase());
            match lookup(&name) {
                Some(raw) => raw.trim().parse().map_err(|_| {
                    ReconcileError::Configuration(format!(
                        "{} must be a whole number of seconds, got {:?}",
                        name, raw
                    ))
                }),
                None => Ok(default),
            }
        };

        let wait_name = format!("{}WAIT_FOR_DELETION", ENV_PREFIX);
        let wait_for_deletion = match lookup(&wait_name) {
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                _ => {
                    return Err(ReconcileError::Configuration(format!(
                        "{} must be true or false, got {:?}",
                        wait_name, raw
                    )))
                }
            },
            None => defaults.wait_for_deletion,
        };

        let config = Self {
            deployment_timeout_secs: secs(
                "deployment_timeout_secs",
                defaults.deployment_timeout_secs,
            )?,
            poll_interval_secs: secs("poll_interval_secs", defaults.poll_interval_secs)?,
            deletion_timeout_secs: secs("deletion_timeout_secs", defaults.deletion_timeout_secs)?,
            version_conflict_timeout_secs: secs(
                "version_conflict_timeout_secs",
                defaults.version_conflict_timeout_secs,
            )?,
            version_conflict_backoff_secs: secs(
                "version_conflict_backoff_secs",
                defaults.version_conflict_backoff_secs,
            )?,
            version_conflict_max_backoff_secs: secs(
                "version_conflict_max_backoff_secs",
                defaults.version_conflict_max_backoff_secs,
            )?,
            disable_propagation_timeout_secs: secs(
                "disable_propagation_timeout_secs",
                defaults.disable_propagation_timeout_secs,
            )?,
            certificate_propagation_timeout_secs: secs(
                "certificate_propagation_timeout_secs",
                defaults.certificate_propagation_timeout_secs,
            )?,
            propagation_retry_interval_secs: secs(
                "propagation_retry_interval_secs",
                defaults.propagation_retry_interval_secs,
            )?,
            wait_for_deletion,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject budgets that would make polling spin
    pub fn validate(&self) -> ReconcileResult<()> {
        if self.poll_interval_secs == 0 {
            return Err(ReconcileError::Configuration(
                "poll interval must be at least one second".to_string(),
            ));
        }
        if self.version_conflict_max_backoff_secs < self.version_conflict_backoff_secs {
            return Err(ReconcileError::Configuration(
                "maximum conflict backoff is below the initial backoff".to_string(),
            ));
        }
        Ok(())
    }

    pub fn deployment_wait(&self) -> WaitSettings {
        WaitSettings::new(
            Duration::from_secs(self.deployment_timeout_secs),
            Duration::from_secs(self.poll_interval_secs),
        )
    }

    pub fn deletion_wait(&self) -> WaitSettings {
        WaitSettings::new(
            Duration::from_secs(self.deletion_timeout_secs),
            Duration::from_secs(self.poll_interval_secs),
        )
    }

    pub fn version_conflict_retry(&self) -> RetrySettings {
        RetrySettings::new(
            Duration::from_secs(self.version_conflict_timeout_secs),
            Backoff::Exponential {
                initial: Duration::from_secs(self.version_conflict_backoff_secs),
                max: Duration::from_secs(self.version_conflict_max_backoff_secs),
            },
        )
    }

    pub fn disable_propagation_retry(&self) -> RetrySettings {
        RetrySettings::new(
            Duration::from_secs(self.disable_propagation_timeout_secs),
            Backoff::Fixed(Duration::from_secs(self.propagation_retry_interval_secs)),
        )
    }

    pub fn certificate_propagation_retry(&self) -> RetrySettings {
        RetrySettings::new(
            Duration::from_secs(self.certificate_propagation_timeout_secs),
            Backoff::Fixed(Duration::from_secs(self.propagation_retry_interval_secs)),
        )
    }
}
