// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fan-out channel trait for pushing events to subscribed front-ends.

use async_trait::async_trait;

use crate::error::CourierError;
use crate::types::FanoutEvent;

/// Per-tenant, at-most-once event fan-out.
///
/// Publishing is best-effort: business operations must never fail because a
/// publish failed. Call sites catch and log errors rather than propagating
/// them; the trait returns `Result` only so implementations can report
/// transport problems for logging.
#[async_trait]
pub trait FanoutChannel: Send + Sync {
    async fn publish(&self, tenant_id: &str, event: FanoutEvent) -> Result<(), CourierError>;
}
