// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event sink trait connecting the session registry to message handling.
//!
//! The registry owns the per-tenant event pumps; the messaging layer owns
//! what happens to a message. This trait is the seam between the two, so the
//! session crate never depends on the messaging crate.

use std::sync::Arc;

use async_trait::async_trait;

use crate::traits::provider::ProviderConnection;
use crate::types::ProviderMessage;

/// Receives normalized provider events from a tenant's event pump.
///
/// Sink methods are infallible at this boundary: implementations log their
/// own failures. A sink failure must never tear down the event pump.
#[async_trait]
pub trait ProviderEventSink: Send + Sync {
    /// A message arrived on the live event stream.
    async fn on_message(
        &self,
        tenant_id: &str,
        conn: Arc<dyn ProviderConnection>,
        message: ProviderMessage,
    );

    /// A delivery-state acknowledgment arrived for a previously sent message.
    async fn on_ack(&self, tenant_id: &str, provider_message_id: &str, code: i32);

    /// The tenant's session authenticated; used to kick off a full resync.
    async fn on_authenticated(&self, tenant_id: &str, conn: Arc<dyn ProviderConnection>);
}
