// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bulk reconciliation against the provider's message history.
//!
//! The live event stream is lossy (pump lag, process restarts, missed
//! events during pairing), so every authenticated session is periodically
//! swept: enumerate its conversations, pull a recent window of each, and
//! push everything through the dedup insert. The pass is idempotent; a
//! second run over the same history inserts nothing.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use courier_core::traits::ProviderConnection;
use courier_core::CourierError;
use courier_session::SessionRegistry;
use courier_storage::queries::sync_log;
use courier_storage::Database;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::store::{MessageStore, PersistOutcome};

/// What a reconciliation pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// False when the cooldown guard skipped the pass.
    pub ran: bool,
    pub conversations: usize,
    pub inserted: usize,
    pub skipped: usize,
}

pub struct Reconciler {
    db: Database,
    store: Arc<MessageStore>,
    cooldown_secs: i64,
    fetch_window: usize,
}

impl Reconciler {
    pub fn new(
        db: Database,
        store: Arc<MessageStore>,
        cooldown_secs: i64,
        fetch_window: usize,
    ) -> Self {
        Self {
            db,
            store,
            cooldown_secs,
            fetch_window,
        }
    }

    /// Sweep the tenant's provider history into the store.
    ///
    /// The cooldown guard is best-effort rate limiting, not a lock: two
    /// passes racing past it stay correct because every insert dedups.
    pub async fn reconcile(
        &self,
        tenant_id: &str,
        conn: &Arc<dyn ProviderConnection>,
    ) -> Result<ReconcileReport, CourierError> {
        if self.within_cooldown(tenant_id).await? {
            debug!(tenant_id, "reconcile skipped, within cooldown");
            return Ok(ReconcileReport::default());
        }
        sync_log::record_start(&self.db, tenant_id).await?;

        let mut report = ReconcileReport {
            ran: true,
            ..Default::default()
        };
        let conversations = conn.conversations().await?;
        report.conversations = conversations.len();
        for conversation in conversations {
            let address = conversation.address;
            let messages = match conn.recent_messages(&address, self.fetch_window).await {
                Ok(messages) => messages,
                Err(e) => {
                    warn!(tenant_id, address, error = %e, "conversation fetch failed, skipping");
                    continue;
                }
            };
            for message in &messages {
                match self.store.persist_backfill(tenant_id, message).await? {
                    PersistOutcome::Stored { .. } => report.inserted += 1,
                    PersistOutcome::Skipped => report.skipped += 1,
                }
            }
        }
        self.store.trim_retention(tenant_id).await?;
        info!(
            tenant_id,
            conversations = report.conversations,
            inserted = report.inserted,
            skipped = report.skipped,
            "reconcile complete"
        );
        Ok(report)
    }

    async fn within_cooldown(&self, tenant_id: &str) -> Result<bool, CourierError> {
        let Some(last) = sync_log::last_started_at(&self.db, tenant_id).await? else {
            return Ok(false);
        };
        // Timestamps are sortable ISO text, so the comparison stays textual.
        let cutoff = (Utc::now() - chrono::Duration::seconds(self.cooldown_secs))
            .format("%Y-%m-%dT%H:%M:%S%.3fZ")
            .to_string();
        Ok(last > cutoff)
    }
}

/// Periodic sweep over every live session.
pub fn spawn_sweeper(
    registry: Arc<SessionRegistry>,
    reconciler: Arc<Reconciler>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick fires immediately; skip it so a fresh boot does
        // not race the recovery resync.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            for (tenant_id, conn) in registry.active_handles() {
                if let Err(e) = reconciler.reconcile(&tenant_id, &conn).await {
                    warn!(tenant_id, error = %e, "sweep reconcile failed");
                }
            }
        }
    })
}
