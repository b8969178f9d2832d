// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test doubles and database fixtures shared across the workspace's test
//! suites. Not part of the production dependency graph.

use std::sync::Once;

mod blobs;
mod bus;
mod db;
mod provider;

pub use blobs::MemoryBlobStore;
pub use bus::CapturingBus;
pub use db::{seed_tenant, test_database};
pub use provider::{provider_message, MockProvider, MockProviderFactory};

static TRACING: Once = Once::new();

/// Install a test tracing subscriber honoring `RUST_LOG`. Safe to call from
/// every test; only the first call installs.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}
