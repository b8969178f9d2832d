// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation read models, derived entirely from stored messages.

use std::sync::Arc;

use courier_core::types::StoredMessage;
use courier_core::CourierError;
use courier_storage::queries::{conversations, messages, sessions};
use courier_storage::Database;

use crate::store::MessageStore;

/// One conversation in the tenant's list, most recent first.
#[derive(Debug, Clone)]
pub struct ConversationSummary {
    pub counterpart: String,
    pub message_count: i64,
    pub last_activity: String,
    pub latest: StoredMessage,
    pub latest_media_url: Option<String>,
}

/// Tenant-level inbox digest.
#[derive(Debug, Clone)]
pub struct InboxSummary {
    pub total_messages: i64,
    pub conversation_count: i64,
    pub recent: Vec<StoredMessage>,
}

/// How many messages the inbox digest carries.
const INBOX_RECENT_LIMIT: usize = 10;

pub struct ConversationReads {
    db: Database,
    store: Arc<MessageStore>,
}

impl ConversationReads {
    pub fn new(db: Database, store: Arc<MessageStore>) -> Self {
        Self { db, store }
    }

    async fn me_number(&self, tenant_id: &str) -> Result<String, CourierError> {
        Ok(sessions::get_for_tenant(&self.db, tenant_id)
            .await?
            .and_then(|s| s.me_number)
            .unwrap_or_default())
    }

    /// All conversations, grouped by counterpart address and sorted by last
    /// activity. The tenant's own number never appears as a counterpart.
    pub async fn conversations(
        &self,
        tenant_id: &str,
    ) -> Result<Vec<ConversationSummary>, CourierError> {
        let me = self.me_number(tenant_id).await?;
        let rows = conversations::overview(&self.db, tenant_id, &me).await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let latest_media_url = self.store.media_url(&row.latest).await?;
            out.push(ConversationSummary {
                counterpart: row.counterpart,
                message_count: row.message_count,
                last_activity: row.last_activity,
                latest: row.latest,
                latest_media_url,
            });
        }
        Ok(out)
    }

    /// One conversation's messages, oldest first. `limit`/`offset` page
    /// backwards from the newest message, so page zero is the latest chunk.
    pub async fn conversation_thread(
        &self,
        tenant_id: &str,
        address: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<StoredMessage>, CourierError> {
        let mut page =
            messages::page_for_counterpart(&self.db, tenant_id, address, limit, offset).await?;
        page.reverse();
        Ok(page)
    }

    pub async fn inbox_summary(&self, tenant_id: &str) -> Result<InboxSummary, CourierError> {
        let me = self.me_number(tenant_id).await?;
        Ok(InboxSummary {
            total_messages: messages::count_for_tenant(&self.db, tenant_id).await?,
            conversation_count: conversations::distinct_count(&self.db, tenant_id, &me).await?,
            recent: messages::recent(&self.db, tenant_id, INBOX_RECENT_LIMIT).await?,
        })
    }
}
