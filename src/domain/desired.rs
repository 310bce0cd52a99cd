// Copyright (c) 2025 - Cowboy AI, Inc.
//! Desired State and Update Planning
//!
//! Pure comparison between what the caller asks for and what was last
//! observed. No I/O happens here.

use serde::{Deserialize, Serialize};

use super::distribution::DistributionConfig;
use super::tags::{TagDiff, Tags};
use super::tracked::TrackedState;

fn default_true() -> bool {
    true
}

/// Caller-supplied target for one distribution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesiredState {
    /// Desired configuration, including the `enabled` flag
    pub config: DistributionConfig,

    #[serde(default)]
    pub tags: Tags,

    /// Block until the remote reports the change as deployed
    #[serde(default = "default_true")]
    pub wait_for_deployment: bool,

    /// On delete, disable the distribution but leave it in place
    #[serde(default)]
    pub retain_on_delete: bool,
}

impl DesiredState {
    pub fn new(config: DistributionConfig) -> Self {
        Self {
            config,
            tags: Tags::new(),
            wait_for_deployment: true,
            retain_on_delete: false,
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn without_waiting(mut self) -> Self {
        self.wait_for_deployment = false;
        self
    }

    pub fn retained_on_delete(mut self) -> Self {
        self.retain_on_delete = true;
        self
    }
}

/// What an update has to do, derived from observed and desired state
#[derive(Debug, Clone, PartialEq)]
pub struct UpdatePlan {
    /// The configuration document must be rewritten (tags excluded)
    pub config_changed: bool,

    /// Tag changes to push through the tagging collaborator
    pub tag_diff: Option<TagDiff>,
}

impl UpdatePlan {
    /// Compare the last observed state against the desired state
    ///
    /// Without an observed configuration the document is assumed to differ.
    pub fn between(observed: &TrackedState, desired: &DesiredState) -> Self {
        let config_changed = match &observed.config {
            Some(config) => config.differs_from(&desired.config),
            None => true,
        };

        let diff = TagDiff::between(&observed.tags, &desired.tags);
        let tag_diff = if diff.is_empty() { None } else { Some(diff) };

        Self {
            config_changed,
            tag_diff,
        }
    }

    pub fn is_noop(&self) -> bool {
        !self.config_changed && self.tag_diff.is_none()
    }

    pub fn tags_changed(&self) -> bool {
        self.tag_diff.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DistributionId, DistributionStatus, VersionToken};
    use serde_json::json;

    fn observed() -> TrackedState {
        let mut state = TrackedState::default();
        state.id = Some(DistributionId::new("E1"));
        state.version = Some(VersionToken::new("v1"));
        state.status = Some(DistributionStatus::Deployed);
        state.config = Some(
            DistributionConfig::enabled()
                .with_setting("origins", json!(["a.example.com"]))
                .with_setting("http_version", json!("http2")),
        );
        state.tags.insert("env".to_string(), "dev".to_string());
        state
    }

    #[test]
    fn test_tag_only_change() {
        let desired = DesiredState::new(
            DistributionConfig::enabled().with_setting("origins", json!(["a.example.com"])),
        )
        .with_tag("env", "prod");

        let plan = UpdatePlan::between(&observed(), &desired);

        assert!(!plan.config_changed);
        assert!(plan.tags_changed());
    }

    #[test]
    fn test_config_only_change() {
        let desired = DesiredState::new(
            DistributionConfig::enabled().with_setting("origins", json!(["b.example.com"])),
        )
        .with_tag("env", "dev");

        let plan = UpdatePlan::between(&observed(), &desired);

        assert!(plan.config_changed);
        assert!(!plan.tags_changed());
    }

    #[test]
    fn test_enabled_flag_is_a_config_change() {
        let mut config =
            DistributionConfig::enabled().with_setting("origins", json!(["a.example.com"]));
        config.enabled = false;
        let desired = DesiredState::new(config).with_tag("env", "dev");

        assert!(UpdatePlan::between(&observed(), &desired).config_changed);
    }

    #[test]
    fn test_unobserved_config_counts_as_changed() {
        let desired = DesiredState::new(DistributionConfig::enabled());
        let plan = UpdatePlan::between(&TrackedState::default(), &desired);
        assert!(plan.config_changed);
        assert!(!plan.is_noop());
    }

    #[test]
    fn test_desired_state_defaults_from_json() {
        let desired: DesiredState =
            serde_json::from_value(json!({ "config": { "enabled": true } })).unwrap();
        assert!(desired.wait_for_deployment);
        assert!(!desired.retain_on_delete);
        assert!(desired.tags.is_empty());
    }
}
