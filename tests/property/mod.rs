// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests Module
//!
//! Properties of the delete protocol and of conflict recovery that must hold
//! for every event sequence and every number of concurrent writers.

mod conflict_recovery;
mod delete_protocol;
