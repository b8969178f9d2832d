// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Live event handling: inbound messages, delivery acks, and the
//! post-authentication resync.
//!
//! Installed into the session registry as the [`ProviderEventSink`]. Every
//! method is infallible at the boundary; failures are logged here so one
//! bad message can never stall a tenant's event pump.

use std::sync::Arc;

use async_trait::async_trait;
use courier_core::traits::{FanoutChannel, ProviderConnection, ProviderEventSink};
use courier_core::types::{EventMessage, FanoutEvent, MessageType, ProviderMessage};
use tracing::{debug, error, info, warn};

use crate::reconcile::Reconciler;
use crate::store::{MessageStore, PersistOutcome};

pub struct InboundHandler {
    store: Arc<MessageStore>,
    reconciler: Arc<Reconciler>,
    bus: Arc<dyn FanoutChannel>,
    auto_reply: String,
}

impl InboundHandler {
    pub fn new(
        store: Arc<MessageStore>,
        reconciler: Arc<Reconciler>,
        bus: Arc<dyn FanoutChannel>,
        auto_reply: String,
    ) -> Self {
        Self {
            store,
            reconciler,
            bus,
            auto_reply,
        }
    }

    /// Audit trail for the typed dispatch; each kind gets its own line so
    /// traffic shape is visible in the logs.
    fn audit(tenant_id: &str, msg: &ProviderMessage) {
        match msg.kind {
            MessageType::Chat => {
                info!(tenant_id, from = %msg.from, "text message received");
            }
            MessageType::Image
            | MessageType::Video
            | MessageType::Audio
            | MessageType::Document
            | MessageType::Sticker => {
                info!(tenant_id, from = %msg.from, kind = %msg.kind, "media message received");
            }
            MessageType::Location => {
                info!(tenant_id, from = %msg.from, "location message received");
            }
            MessageType::Notification => {}
        }
    }

    async fn send_auto_reply(
        &self,
        tenant_id: &str,
        conn: &Arc<dyn ProviderConnection>,
        msg: &ProviderMessage,
    ) {
        if let Err(e) = conn.send(&msg.chat, &self.auto_reply).await {
            warn!(tenant_id, to = %msg.chat, error = %e, "auto-reply send failed");
            return;
        }
        let event = FanoutEvent::AutoReply {
            to: msg.chat.clone(),
            body: self.auto_reply.clone(),
            in_reply_to: msg.id.clone(),
        };
        if let Err(e) = self.bus.publish(tenant_id, event).await {
            warn!(tenant_id, error = %e, "auto_reply fan-out failed");
        }
    }
}

#[async_trait]
impl ProviderEventSink for InboundHandler {
    async fn on_message(
        &self,
        tenant_id: &str,
        conn: Arc<dyn ProviderConnection>,
        message: ProviderMessage,
    ) {
        if message.kind.is_notification() {
            debug!(tenant_id, provider_message_id = %message.id, "notification dropped");
            return;
        }
        if message.body.is_empty() && !message.has_media {
            debug!(tenant_id, provider_message_id = %message.id, "empty message dropped");
            return;
        }

        let outcome = match self.store.persist_inbound(tenant_id, &conn, &message).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(tenant_id, provider_message_id = %message.id, error = %e,
                    "failed to persist inbound message");
                return;
            }
        };
        let PersistOutcome::Stored {
            message: stored,
            media_url,
        } = outcome
        else {
            // Already stored, already replied to, already announced.
            return;
        };

        Self::audit(tenant_id, &message);

        if !message.from_me {
            self.send_auto_reply(tenant_id, &conn, &message).await;
        }

        let event = FanoutEvent::MessageReceived {
            message: EventMessage::from(&stored),
            media_url,
        };
        if let Err(e) = self.bus.publish(tenant_id, event).await {
            warn!(tenant_id, error = %e, "message_received fan-out failed");
        }

        if let Err(e) = self.store.trim_retention(tenant_id).await {
            warn!(tenant_id, error = %e, "retention trim failed");
        }
    }

    async fn on_ack(&self, tenant_id: &str, provider_message_id: &str, code: i32) {
        if let Err(e) = self.store.apply_ack(tenant_id, provider_message_id, code).await {
            error!(tenant_id, provider_message_id, code, error = %e, "failed to apply ack");
        }
    }

    async fn on_authenticated(&self, tenant_id: &str, conn: Arc<dyn ProviderConnection>) {
        match self.reconciler.reconcile(tenant_id, &conn).await {
            Ok(report) if report.ran => {
                info!(tenant_id, inserted = report.inserted, "post-auth resync complete");
            }
            Ok(_) => debug!(tenant_id, "post-auth resync skipped by cooldown"),
            Err(e) => error!(tenant_id, error = %e, "post-auth resync failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::traits::BlobStore;
    use courier_storage::queries::messages;
    use courier_storage::Database;
    use courier_test_utils::{
        provider_message, seed_tenant, test_database, CapturingBus, MemoryBlobStore, MockProvider,
    };

    const AUTO_REPLY: &str = "Thanks, we got your message.";

    async fn handler() -> (InboundHandler, Arc<CapturingBus>, Database, tempfile::TempDir) {
        let (db, dir) = test_database().await;
        seed_tenant(&db, "t1", 0).await;
        let blobs: Arc<dyn BlobStore> = Arc::new(MemoryBlobStore::new());
        let store = Arc::new(MessageStore::new(db.clone(), blobs, 20));
        let reconciler = Arc::new(Reconciler::new(db.clone(), Arc::clone(&store), 300, 50));
        let bus = Arc::new(CapturingBus::new());
        let handler = InboundHandler::new(
            store,
            reconciler,
            Arc::clone(&bus) as Arc<dyn FanoutChannel>,
            AUTO_REPLY.to_string(),
        );
        (handler, bus, db, dir)
    }

    #[tokio::test]
    async fn inbound_message_is_stored_replied_to_and_announced() {
        let (handler, bus, db, _dir) = handler().await;
        let provider = MockProvider::ready();
        let msg = provider_message("MSG1", "919876543210@c.us", "hello", 1_700_000_000);

        handler
            .on_message("t1", Arc::clone(&provider) as Arc<dyn ProviderConnection>, msg)
            .await;

        assert!(messages::exists(&db, "t1", "MSG1").await.unwrap());
        assert_eq!(
            provider.sent_messages(),
            vec![("919876543210@c.us".to_string(), AUTO_REPLY.to_string())]
        );

        let events = bus.events_for("t1");
        assert!(events
            .iter()
            .any(|e| matches!(e, FanoutEvent::AutoReply { in_reply_to, .. } if in_reply_to == "MSG1")));
        assert!(events
            .iter()
            .any(|e| matches!(e, FanoutEvent::MessageReceived { .. })));
    }

    #[tokio::test]
    async fn duplicate_delivery_is_fully_silent() {
        let (handler, bus, db, _dir) = handler().await;
        let provider = MockProvider::ready();
        let msg = provider_message("MSG1", "919876543210@c.us", "hello", 1_700_000_000);

        let conn = Arc::clone(&provider) as Arc<dyn ProviderConnection>;
        handler.on_message("t1", Arc::clone(&conn), msg.clone()).await;
        handler.on_message("t1", conn, msg).await;

        assert_eq!(messages::count_for_tenant(&db, "t1").await.unwrap(), 1);
        assert_eq!(provider.sent_messages().len(), 1);
        let received = bus
            .events_for("t1")
            .into_iter()
            .filter(|e| matches!(e, FanoutEvent::MessageReceived { .. }))
            .count();
        assert_eq!(received, 1);
    }

    #[tokio::test]
    async fn own_messages_get_no_auto_reply() {
        let (handler, bus, db, _dir) = handler().await;
        let provider = MockProvider::ready();
        let mut msg = provider_message("MSG2", "919876543210@c.us", "from my phone", 1_700_000_000);
        msg.from_me = true;

        handler
            .on_message("t1", Arc::clone(&provider) as Arc<dyn ProviderConnection>, msg)
            .await;

        assert!(messages::exists(&db, "t1", "MSG2").await.unwrap());
        assert!(provider.sent_messages().is_empty());
        assert!(!bus
            .events_for("t1")
            .iter()
            .any(|e| matches!(e, FanoutEvent::AutoReply { .. })));
    }

    #[tokio::test]
    async fn notifications_and_empty_bodies_are_dropped() {
        let (handler, _bus, db, _dir) = handler().await;
        let provider = MockProvider::ready();
        let conn = Arc::clone(&provider) as Arc<dyn ProviderConnection>;

        let mut notification =
            provider_message("N1", "919876543210@c.us", "joined", 1_700_000_000);
        notification.kind = MessageType::Notification;
        handler.on_message("t1", Arc::clone(&conn), notification).await;

        let empty = provider_message("E1", "919876543210@c.us", "", 1_700_000_001);
        handler.on_message("t1", conn, empty).await;

        assert_eq!(messages::count_for_tenant(&db, "t1").await.unwrap(), 0);
        assert!(provider.sent_messages().is_empty());
    }

    #[tokio::test]
    async fn ack_events_advance_stored_status() {
        let (handler, _bus, db, _dir) = handler().await;
        let provider = MockProvider::ready();
        let mut msg = provider_message("OUT1", "919876543210@c.us", "hi", 1_700_000_000);
        msg.from_me = true;
        handler
            .on_message("t1", Arc::clone(&provider) as Arc<dyn ProviderConnection>, msg)
            .await;

        handler.on_ack("t1", "OUT1", 3).await;
        let row = messages::get_by_provider_id(&db, "t1", "OUT1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.status, courier_core::types::DeliveryStatus::Read);

        // Never-seen id: nothing to assert beyond "does not blow up".
        handler.on_ack("t1", "UNKNOWN", 2).await;
    }
}
