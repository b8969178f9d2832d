// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tenant message persistence.
//!
//! All writes funnel through the dedup insert: the same provider message
//! can be observed on the live event stream and again during a resync
//! sweep, and exactly one row must come out the other side. A UNIQUE index
//! on `(tenant_id, provider_message_id)` backs this up at the schema level.

use std::sync::Arc;

use courier_core::traits::{BlobStore, ProviderConnection};
use courier_core::types::{
    epoch_to_iso, now_iso, Attachment, DeliveryStatus, MessageDirection, ProviderMessage,
    ProviderReceipt, StoredMessage,
};
use courier_core::CourierError;
use courier_storage::blobs::attachment_key;
use courier_storage::queries::{attachments, messages};
use courier_storage::Database;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Result of persisting an observed provider message.
#[derive(Debug, Clone)]
pub enum PersistOutcome {
    Stored {
        message: StoredMessage,
        media_url: Option<String>,
    },
    /// The message was already stored; nothing was written.
    Skipped,
}

pub struct MessageStore {
    db: Database,
    blobs: Arc<dyn BlobStore>,
    retention: usize,
}

impl MessageStore {
    pub fn new(db: Database, blobs: Arc<dyn BlobStore>, retention: usize) -> Self {
        Self {
            db,
            blobs,
            retention,
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn blobs(&self) -> &Arc<dyn BlobStore> {
        &self.blobs
    }

    /// Persist a message observed on the live event stream, fetching and
    /// storing its media binary when it carries one.
    ///
    /// Media fetch failures degrade to a bare message row; the text is
    /// worth keeping even when the binary is gone.
    pub async fn persist_inbound(
        &self,
        tenant_id: &str,
        conn: &Arc<dyn ProviderConnection>,
        msg: &ProviderMessage,
    ) -> Result<PersistOutcome, CourierError> {
        // Skip the media fetch for messages we already hold. The insert
        // below still dedups; this only avoids redundant provider traffic.
        if messages::exists(&self.db, tenant_id, &msg.id).await? {
            debug!(tenant_id, provider_message_id = %msg.id, "duplicate message skipped");
            return Ok(PersistOutcome::Skipped);
        }

        let mut attachment_id = None;
        let mut media_url = None;
        if msg.has_media && msg.kind.is_media() {
            match self.store_media(tenant_id, conn, &msg.id).await {
                Ok((id, url)) => {
                    attachment_id = Some(id);
                    media_url = Some(url);
                }
                Err(e) => {
                    warn!(tenant_id, provider_message_id = %msg.id, error = %e,
                        "media fetch failed, storing message without attachment");
                }
            }
        }

        let row = self.row_from_provider(tenant_id, msg, attachment_id);
        match messages::insert_unique(&self.db, &row).await? {
            messages::InsertOutcome::Inserted => Ok(PersistOutcome::Stored {
                message: row,
                media_url,
            }),
            messages::InsertOutcome::Skipped => Ok(PersistOutcome::Skipped),
        }
    }

    /// Persist a message observed during a resync sweep. Backfill never
    /// refetches media; the live path already stored it if it was going to.
    pub async fn persist_backfill(
        &self,
        tenant_id: &str,
        msg: &ProviderMessage,
    ) -> Result<PersistOutcome, CourierError> {
        let row = self.row_from_provider(tenant_id, msg, None);
        match messages::insert_unique(&self.db, &row).await? {
            messages::InsertOutcome::Inserted => Ok(PersistOutcome::Stored {
                message: row,
                media_url: None,
            }),
            messages::InsertOutcome::Skipped => Ok(PersistOutcome::Skipped),
        }
    }

    /// Persist a message this service just sent, keyed by the provider's
    /// receipt so a racing resync cannot duplicate it.
    pub async fn persist_outbound(
        &self,
        tenant_id: &str,
        receipt: &ProviderReceipt,
        from_addr: &str,
        to_addr: &str,
        body: &str,
    ) -> Result<StoredMessage, CourierError> {
        let row = StoredMessage {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            direction: MessageDirection::Outbound,
            from_addr: from_addr.to_string(),
            to_addr: to_addr.to_string(),
            body: body.to_string(),
            message_type: courier_core::types::MessageType::Chat,
            provider_message_id: receipt.id.clone(),
            status: DeliveryStatus::Sent,
            attachment_id: None,
            created_at: now_iso(),
        };
        match messages::insert_unique(&self.db, &row).await? {
            messages::InsertOutcome::Inserted => Ok(row),
            messages::InsertOutcome::Skipped => {
                // A resync sweep got there first; the stored row wins.
                messages::get_by_provider_id(&self.db, tenant_id, &receipt.id)
                    .await?
                    .ok_or_else(|| CourierError::NotFound {
                        what: "message",
                        id: receipt.id.clone(),
                    })
            }
        }
    }

    /// Enforce the retention cap, deleting everything but the newest
    /// messages, their orphaned attachments, and the blobs behind them.
    pub async fn trim_retention(&self, tenant_id: &str) -> Result<usize, CourierError> {
        let (deleted, orphaned_keys) =
            messages::trim_to_recent(&self.db, tenant_id, self.retention).await?;
        for key in &orphaned_keys {
            if let Err(e) = self.blobs.delete(key).await {
                warn!(tenant_id, key, error = %e, "orphaned blob delete failed");
            }
        }
        if deleted > 0 {
            info!(tenant_id, deleted, blobs = orphaned_keys.len(), "retention trim");
        }
        Ok(deleted)
    }

    /// Apply a provider delivery acknowledgment.
    ///
    /// Unknown ack codes and unmatched message ids are no-ops: acks can
    /// outlive their message past a retention trim or a disconnect purge.
    pub async fn apply_ack(
        &self,
        tenant_id: &str,
        provider_message_id: &str,
        code: i32,
    ) -> Result<bool, CourierError> {
        let Some(status) = DeliveryStatus::from_ack_code(code) else {
            warn!(tenant_id, provider_message_id, code, "unknown ack code ignored");
            return Ok(false);
        };
        let updated =
            messages::update_status_monotonic(&self.db, tenant_id, provider_message_id, status)
                .await?;
        if updated {
            debug!(tenant_id, provider_message_id, status = %status, "delivery status advanced");
        }
        Ok(updated)
    }

    /// Resolve the media URL for a stored message, if it has an attachment.
    pub async fn media_url(&self, message: &StoredMessage) -> Result<Option<String>, CourierError> {
        let Some(attachment_id) = &message.attachment_id else {
            return Ok(None);
        };
        let attachment = attachments::get(&self.db, attachment_id).await?;
        Ok(attachment.map(|a| self.blobs.url_for(&a.storage_key)))
    }

    async fn store_media(
        &self,
        tenant_id: &str,
        conn: &Arc<dyn ProviderConnection>,
        provider_message_id: &str,
    ) -> Result<(String, String), CourierError> {
        let media = conn.fetch_media(provider_message_id).await?;
        let attachment_id = Uuid::new_v4().to_string();
        let key = attachment_key(tenant_id, &attachment_id, &media.file_name);
        let url = self.blobs.put(&key, &media.bytes).await?;
        let attachment = Attachment {
            id: attachment_id.clone(),
            tenant_id: tenant_id.to_string(),
            file_name: media.file_name,
            mime_type: media.mime_type,
            size_bytes: media.bytes.len() as i64,
            storage_key: key,
            created_at: now_iso(),
        };
        attachments::insert(&self.db, &attachment).await?;
        Ok((attachment_id, url))
    }

    fn row_from_provider(
        &self,
        tenant_id: &str,
        msg: &ProviderMessage,
        attachment_id: Option<String>,
    ) -> StoredMessage {
        let (direction, status) = if msg.from_me {
            (MessageDirection::Outbound, DeliveryStatus::Sent)
        } else {
            (MessageDirection::Inbound, DeliveryStatus::Delivered)
        };
        StoredMessage {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            direction,
            from_addr: msg.from.clone(),
            to_addr: msg.to.clone(),
            body: msg.body.clone(),
            message_type: msg.kind,
            provider_message_id: msg.id.clone(),
            status,
            attachment_id,
            created_at: epoch_to_iso(msg.timestamp),
        }
    }
}
