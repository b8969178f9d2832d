// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process event fan-out.
//!
//! [`BroadcastBus`] keeps one tokio broadcast channel per tenant and pushes
//! [`FanoutEvent`]s to whoever is subscribed. Publishing with no subscribers
//! is a no-op; slow subscribers that fall behind the channel capacity lose
//! the oldest events rather than blocking publishers.

use async_trait::async_trait;
use courier_core::traits::FanoutChannel;
use courier_core::types::FanoutEvent;
use courier_core::CourierError;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::debug;

const CHANNEL_CAPACITY: usize = 256;

/// Per-tenant broadcast fan-out backed by [`tokio::sync::broadcast`].
#[derive(Default)]
pub struct BroadcastBus {
    channels: DashMap<String, broadcast::Sender<FanoutEvent>>,
}

impl BroadcastBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to a tenant's event stream. Creates the channel on first
    /// use; events published before the first subscriber are dropped.
    pub fn subscribe(&self, tenant_id: &str) -> broadcast::Receiver<FanoutEvent> {
        self.channels
            .entry(tenant_id.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Number of live subscribers for a tenant.
    pub fn subscriber_count(&self, tenant_id: &str) -> usize {
        self.channels
            .get(tenant_id)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl FanoutChannel for BroadcastBus {
    async fn publish(&self, tenant_id: &str, event: FanoutEvent) -> Result<(), CourierError> {
        let Some(tx) = self.channels.get(tenant_id) else {
            debug!(tenant_id, "fan-out event dropped, no channel");
            return Ok(());
        };
        // send only errors when there are no receivers, which is fine.
        let delivered = tx.send(event).unwrap_or(0);
        debug!(tenant_id, delivered, "fan-out event published");
        Ok(())
    }
}
