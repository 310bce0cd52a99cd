// Copyright (c) 2025 - Cowboy AI, Inc.
//! Test Fixtures for cdn-reconciler
//!
//! Shared construction of the simulated remote, reconcilers and desired
//! states. Time-dependent tests run on tokio's paused clock, so the default
//! production budgets are used unchanged.

#![allow(dead_code)]

use std::sync::Arc;

use serde_json::json;

use cdn_reconciler::{
    DesiredState, DistributionConfig, DistributionReconciler, InMemoryDistributionApi,
    ReconcilerConfig,
};

/// Route reconciler logs to the test output; safe to call from every test
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("cdn_reconciler=debug")),
        )
        .with_test_writer()
        .try_init();
}

/// A simulated remote whose changes read as `InProgress` for `deploy_reads` reads
pub fn remote(deploy_reads: u32) -> Arc<InMemoryDistributionApi> {
    init_tracing();
    Arc::new(InMemoryDistributionApi::new().with_deploy_reads(deploy_reads))
}

pub fn reconciler(api: &Arc<InMemoryDistributionApi>) -> DistributionReconciler {
    DistributionReconciler::new(api.clone(), api.clone(), ReconcilerConfig::default())
}

pub fn reconciler_with(
    api: &Arc<InMemoryDistributionApi>,
    config: ReconcilerConfig,
) -> DistributionReconciler {
    DistributionReconciler::new(api.clone(), api.clone(), config)
}

/// An enabled distribution with a single origin and one tag
pub fn website() -> DesiredState {
    DesiredState::new(
        DistributionConfig::enabled()
            .with_comment("static website")
            .with_setting("origins", json!([{ "domain_name": "assets.example.com" }]))
            .with_setting("default_root_object", json!("index.html")),
    )
    .with_tag("team", "web")
}
