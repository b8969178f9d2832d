// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider connection traits for the external messaging session.
//!
//! The provider is an opaque dependency: it authenticates an account via a
//! QR pairing challenge, emits lifecycle and traffic events, and exposes a
//! send operation. One connection handle exists per tenant, owned by the
//! session registry.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::CourierError;
use crate::types::{
    ProviderConversation, ProviderEvent, ProviderMedia, ProviderMessage, ProviderReceipt,
    ProviderState,
};

/// A live connection to the external messaging provider for one tenant.
///
/// Implementations must be safe to share behind `Arc`: sends, fetches, and
/// event subscriptions may interleave freely. Event delivery is best-effort;
/// consumers that lag a `broadcast` channel may miss events, which the bulk
/// resync pass exists to cover.
#[async_trait]
pub trait ProviderConnection: Send + Sync {
    /// Current liveness of the handle.
    fn state(&self) -> ProviderState;

    /// The pairing QR artifact, if one is currently available for scanning.
    async fn qr_code(&self) -> Option<String>;

    /// Send a message to a provider-normalized address.
    async fn send(&self, address: &str, body: &str) -> Result<ProviderReceipt, CourierError>;

    /// Enumerate all provider-side conversations for this account.
    async fn conversations(&self) -> Result<Vec<ProviderConversation>, CourierError>;

    /// Fetch up to `limit` most-recent messages of one conversation.
    async fn recent_messages(
        &self,
        address: &str,
        limit: usize,
    ) -> Result<Vec<ProviderMessage>, CourierError>;

    /// Fetch the media binary attached to a message.
    async fn fetch_media(&self, provider_message_id: &str)
        -> Result<ProviderMedia, CourierError>;

    /// Log the account out of the provider, invalidating the pairing.
    async fn logout(&self) -> Result<(), CourierError>;

    /// Tear down the handle. After this call the connection is `Dead`.
    async fn destroy(&self) -> Result<(), CourierError>;

    /// Subscribe to lifecycle and traffic events from this connection.
    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent>;
}

/// Creates provider connections for tenants.
///
/// `open` returns a handle that is already connecting in the background;
/// callers observe progress through the handle's event stream.
#[async_trait]
pub trait ProviderFactory: Send + Sync {
    async fn open(&self, tenant_id: &str) -> Result<Arc<dyn ProviderConnection>, CourierError>;
}
