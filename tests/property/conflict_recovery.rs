// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests for Version Conflict Recovery
//!
//! However many writers race the reconciler (within the retry budget), the
//! update lands exactly once and every attempt carries a token it just read.

use std::sync::Arc;

use cdn_reconciler::client::{ApiCall, Fault, InMemoryDistributionApi};
use cdn_reconciler::{
    DesiredState, DistributionConfig, DistributionReconciler, DistributionStatus,
    ReconcilerConfig,
};
use proptest::prelude::*;
use tokio_util::sync::CancellationToken;

fn paused_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .expect("test runtime")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Property: N conflicting writers cost exactly N extra attempts
    #[test]
    fn prop_conflicts_converge(conflicts in 0usize..8, deploy_reads in 0u32..4) {
        let (updates, distinct, landed) = paused_runtime().block_on(async {
            let api = Arc::new(InMemoryDistributionApi::new().with_deploy_reads(deploy_reads));
            let seeded = api
                .seed(DistributionConfig::enabled(), DistributionStatus::Deployed)
                .await;
            let reconciler =
                DistributionReconciler::new(api.clone(), api.clone(), ReconcilerConfig::default());
            let cancel = CancellationToken::new();
            let mut tracked = reconciler.import(seeded.id(), &cancel).await.unwrap();

            api.inject_times(ApiCall::Update, Fault::ConcurrentWrite, conflicts)
                .await;
            let desired = DesiredState::new(DistributionConfig::enabled().with_comment("landed"));
            let updated = reconciler.update(&desired, &mut tracked, &cancel).await.unwrap();

            let calls = api.calls_of(ApiCall::Update).await;
            let mut versions: Vec<_> = calls.iter().map(|c| c.version.clone()).collect();
            versions.dedup();
            (
                calls.len(),
                versions.len(),
                updated.distribution.config.comment,
            )
        });

        prop_assert_eq!(updates, conflicts + 1);
        prop_assert_eq!(distinct, conflicts + 1);
        prop_assert_eq!(landed.as_deref(), Some("landed"));
    }
}
