// Copyright (c) 2025 - Cowboy AI, Inc.
//! In-Memory Control Plane
//!
//! A simulated remote that behaves like the real one where it matters to
//! the reconciler:
//!
//! - every successful mutation issues a new version token
//! - mutations with a stale token fail with `PreconditionFailed`
//! - a mutated distribution reads as `InProgress` for a configurable number
//!   of reads before it reads as `Deployed`
//! - deleting an enabled or deploying distribution fails with `ResourceBusy`
//!
//! Faults can be queued per call type to script conflicts, disappearances
//! and arbitrary errors. Every call is recorded for later inspection.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::debug;

use super::{DistributionClient, RemoteResult, TaggingClient};
use crate::domain::{
    Distribution, DistributionConfig, DistributionId, DistributionStatus, TagDiff, Tags,
    VersionToken, VersionedDistribution,
};
use crate::errors::RemoteError;

/// Remote operation kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiCall {
    Get,
    Create,
    Update,
    Delete,
    TagDiff,
}

/// Scripted misbehaviour, consumed by the next call of its kind
#[derive(Debug, Clone)]
pub enum Fault {
    /// Fail the call with this error
    Fail(RemoteError),

    /// Another actor writes the distribution right before the call lands
    ConcurrentWrite,

    /// The distribution disappears right before the call lands
    Vanish,

    /// Let the call through untouched, to place later faults
    Pass,
}

/// One call as the remote received it
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub call: ApiCall,
    pub id: Option<DistributionId>,
    pub version: Option<VersionToken>,

    /// `enabled` flag of a submitted configuration
    pub enabled: Option<bool>,
}

#[derive(Debug)]
struct StoredDistribution {
    distribution: Distribution,
    version: VersionToken,
    reads_until_deployed: u32,
    tags: Tags,
}

impl StoredDistribution {
    fn versioned(&self) -> VersionedDistribution {
        VersionedDistribution::new(self.distribution.clone(), self.version.clone())
    }

    fn is_deploying(&self) -> bool {
        self.reads_until_deployed > 0 || self.distribution.status == DistributionStatus::InProgress
    }
}

#[derive(Debug, Default)]
struct ApiState {
    distributions: HashMap<DistributionId, StoredDistribution>,
    sequence: u64,
    faults: HashMap<ApiCall, VecDeque<Fault>>,
    calls: Vec<RecordedCall>,
}

impl ApiState {
    fn next_sequence(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }

    fn next_version(&mut self) -> VersionToken {
        let n = self.next_sequence();
        VersionToken::new(format!("ETAG{:04}", n))
    }

    fn record(
        &mut self,
        call: ApiCall,
        id: Option<&DistributionId>,
        version: Option<&VersionToken>,
        enabled: Option<bool>,
    ) {
        self.calls.push(RecordedCall {
            call,
            id: id.cloned(),
            version: version.cloned(),
            enabled,
        });
    }

    /// Apply the next queued fault for `call`, if any
    fn inject(
        &mut self,
        call: ApiCall,
        id: Option<&DistributionId>,
        deploy_reads: u32,
    ) -> RemoteResult<()> {
        let fault = match self.faults.get_mut(&call).and_then(VecDeque::pop_front) {
            Some(fault) => fault,
            None => return Ok(()),
        };

        debug!(?call, ?fault, "injecting fault");
        match (fault, id) {
            (Fault::Fail(err), _) => Err(err),
            (Fault::Pass, _) => Ok(()),
            (Fault::ConcurrentWrite, Some(id)) => {
                let version = self.next_version();
                if let Some(stored) = self.distributions.get_mut(id) {
                    stored.version = version;
                    stored.distribution.status = DistributionStatus::InProgress;
                    stored.reads_until_deployed = deploy_reads;
                }
                Ok(())
            }
            (Fault::Vanish, Some(id)) => {
                self.distributions.remove(id);
                Ok(())
            }
            (_, None) => Ok(()),
        }
    }

    fn stored_mut(&mut self, id: &DistributionId) -> RemoteResult<&mut StoredDistribution> {
        self.distributions
            .get_mut(id)
            .ok_or_else(|| RemoteError::NotFound(format!("NoSuchDistribution: {}", id)))
    }
}

fn stale_token(id: &DistributionId) -> RemoteError {
    RemoteError::PreconditionFailed(format!(
        "If-Match version is not current for distribution {}",
        id
    ))
}

/// Simulated control plane
#[derive(Debug, Clone, Default)]
pub struct InMemoryDistributionApi {
    state: Arc<Mutex<ApiState>>,

    /// Reads that observe `InProgress` after each mutation
    deploy_reads: u32,
}

impl InMemoryDistributionApi {
    /// A remote where changes deploy by the first read
    pub fn new() -> Self {
        Self::default()
    }

    /// Changes read as `InProgress` for `reads` reads before `Deployed`
    pub fn with_deploy_reads(mut self, reads: u32) -> Self {
        self.deploy_reads = reads;
        self
    }

    /// Queue a fault for the next call of kind `call`
    pub async fn inject(&self, call: ApiCall, fault: Fault) {
        self.inject_times(call, fault, 1).await;
    }

    /// Queue the same fault for the next `times` calls of kind `call`
    pub async fn inject_times(&self, call: ApiCall, fault: Fault, times: usize) {
        let mut state = self.state.lock().await;
        let queue = state.faults.entry(call).or_default();
        for _ in 0..times {
            queue.push_back(fault.clone());
        }
    }

    /// Insert an existing distribution, as if created by someone else
    pub async fn seed(
        &self,
        config: DistributionConfig,
        status: DistributionStatus,
    ) -> VersionedDistribution {
        let mut state = self.state.lock().await;
        let id = DistributionId::new(format!("E{:06}", state.next_sequence()));
        let version = state.next_version();
        let stored = StoredDistribution {
            distribution: Distribution {
                domain_name: Some(format!("{}.cdn.example.net", id.as_str().to_lowercase())),
                id: id.clone(),
                status,
                config,
                last_modified: Some(Utc::now()),
            },
            version,
            reads_until_deployed: 0,
            tags: Tags::new(),
        };
        let versioned = stored.versioned();
        state.distributions.insert(id, stored);
        versioned
    }

    /// Modify a distribution out of band, as a console user would
    pub async fn external_update<F>(&self, id: &DistributionId, change: F) -> Option<VersionToken>
    where
        F: FnOnce(&mut DistributionConfig),
    {
        let mut state = self.state.lock().await;
        let version = state.next_version();
        let deploy_reads = self.deploy_reads;
        let stored = state.distributions.get_mut(id)?;
        change(&mut stored.distribution.config);
        stored.version = version.clone();
        stored.distribution.status = DistributionStatus::InProgress;
        stored.reads_until_deployed = deploy_reads;
        Some(version)
    }

    /// Current server-side copy without advancing deployment
    pub async fn snapshot(&self, id: &DistributionId) -> Option<VersionedDistribution> {
        let state = self.state.lock().await;
        state.distributions.get(id).map(StoredDistribution::versioned)
    }

    pub async fn contains(&self, id: &DistributionId) -> bool {
        self.state.lock().await.distributions.contains_key(id)
    }

    pub async fn tags(&self, id: &DistributionId) -> Option<Tags> {
        let state = self.state.lock().await;
        state.distributions.get(id).map(|stored| stored.tags.clone())
    }

    /// Every call received so far, in order
    pub async fn calls(&self) -> Vec<RecordedCall> {
        self.state.lock().await.calls.clone()
    }

    /// Calls of one kind, in order
    pub async fn calls_of(&self, call: ApiCall) -> Vec<RecordedCall> {
        let state = self.state.lock().await;
        state
            .calls
            .iter()
            .filter(|recorded| recorded.call == call)
            .cloned()
            .collect()
    }

    pub async fn count(&self, call: ApiCall) -> usize {
        let state = self.state.lock().await;
        state.calls.iter().filter(|recorded| recorded.call == call).count()
    }
}

#[async_trait]
impl DistributionClient for InMemoryDistributionApi {
    async fn get(&self, id: &DistributionId) -> RemoteResult<VersionedDistribution> {
        let mut state = self.state.lock().await;
        state.record(ApiCall::Get, Some(id), None, None);
        state.inject(ApiCall::Get, Some(id), self.deploy_reads)?;

        let stored = state.stored_mut(id)?;
        if stored.reads_until_deployed > 0 {
            stored.reads_until_deployed -= 1;
            stored.distribution.status = DistributionStatus::InProgress;
        } else {
            stored.distribution.status = DistributionStatus::Deployed;
        }
        Ok(stored.versioned())
    }

    async fn create(
        &self,
        config: &DistributionConfig,
        tags: &Tags,
    ) -> RemoteResult<VersionedDistribution> {
        let mut state = self.state.lock().await;
        state.record(ApiCall::Create, None, None, Some(config.enabled));
        state.inject(ApiCall::Create, None, self.deploy_reads)?;

        let id = DistributionId::new(format!("E{:06}", state.next_sequence()));
        let version = state.next_version();
        let stored = StoredDistribution {
            distribution: Distribution {
                domain_name: Some(format!("{}.cdn.example.net", id.as_str().to_lowercase())),
                id: id.clone(),
                status: DistributionStatus::InProgress,
                config: config.clone(),
                last_modified: Some(Utc::now()),
            },
            version,
            reads_until_deployed: self.deploy_reads,
            tags: tags.clone(),
        };
        let versioned = stored.versioned();
        state.distributions.insert(id, stored);
        Ok(versioned)
    }

    async fn update(
        &self,
        id: &DistributionId,
        version: &VersionToken,
        config: &DistributionConfig,
    ) -> RemoteResult<VersionedDistribution> {
        let mut state = self.state.lock().await;
        state.record(ApiCall::Update, Some(id), Some(version), Some(config.enabled));
        state.inject(ApiCall::Update, Some(id), self.deploy_reads)?;

        let next_version = state.next_version();
        let deploy_reads = self.deploy_reads;
        let stored = state.stored_mut(id)?;
        if stored.version != *version {
            return Err(stale_token(id));
        }

        let caller_reference = stored.distribution.config.caller_reference.clone();
        stored.distribution.config = config.clone();
        stored.distribution.config.caller_reference = caller_reference;
        stored.distribution.status = DistributionStatus::InProgress;
        stored.distribution.last_modified = Some(Utc::now());
        stored.reads_until_deployed = deploy_reads;
        stored.version = next_version;
        Ok(stored.versioned())
    }

    async fn delete(&self, id: &DistributionId, version: &VersionToken) -> RemoteResult<()> {
        let mut state = self.state.lock().await;
        state.record(ApiCall::Delete, Some(id), Some(version), None);
        state.inject(ApiCall::Delete, Some(id), self.deploy_reads)?;

        let stored = state.stored_mut(id)?;
        if stored.version != *version {
            return Err(stale_token(id));
        }
        if stored.distribution.config.enabled || stored.is_deploying() {
            return Err(RemoteError::ResourceBusy(format!(
                "DistributionNotDisabled: {}",
                id
            )));
        }

        state.distributions.remove(id);
        Ok(())
    }
}

#[async_trait]
impl TaggingClient for InMemoryDistributionApi {
    async fn apply_tag_diff(
        &self,
        id: &DistributionId,
        old_tags: &Tags,
        new_tags: &Tags,
    ) -> RemoteResult<()> {
        let mut state = self.state.lock().await;
        state.record(ApiCall::TagDiff, Some(id), None, None);
        state.inject(ApiCall::TagDiff, Some(id), self.deploy_reads)?;

        let stored = state.stored_mut(id)?;
        TagDiff::between(old_tags, new_tags).apply(&mut stored.tags);
        Ok(())
    }
}
