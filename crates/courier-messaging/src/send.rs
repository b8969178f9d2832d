// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credit-gated outbound send pipeline.
//!
//! Every send is: healthy handle, affordability check, address
//! normalization, provider send with bounded retry, then debit + persist +
//! trim + fan-out. Failures before the provider send leave no trace; a
//! failed provider send costs nothing and stores nothing.

use std::sync::Arc;
use std::time::Duration;

use courier_core::traits::{FanoutChannel, ProviderConnection};
use courier_core::types::{EventMessage, FanoutEvent, ProviderReceipt, StoredMessage};
use courier_core::CourierError;
use courier_ledger::CreditLedger;
use courier_session::SessionRegistry;
use courier_storage::queries::sessions;
use tracing::{info, warn};

use crate::address::to_provider_address;
use crate::reconcile::Reconciler;
use crate::store::MessageStore;

/// Classified provider send failure.
///
/// Only `ChatUnavailable` is transient enough to retry: the provider
/// sometimes reports a conversation as missing while its own sync is still
/// settling. Everything else surfaces immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendFailureKind {
    ChatUnavailable,
    SessionExpired,
    RecipientNotFound,
    Other,
}

impl SendFailureKind {
    pub fn classify(err: &CourierError) -> Self {
        let CourierError::Provider { message, .. } = err else {
            return Self::Other;
        };
        let lowered = message.to_lowercase();
        if lowered.contains("chat not found") || lowered.contains("chat unavailable") {
            Self::ChatUnavailable
        } else if lowered.contains("session closed") || lowered.contains("session expired") {
            Self::SessionExpired
        } else if lowered.contains("not registered") || lowered.contains("recipient not found") {
            Self::RecipientNotFound
        } else {
            Self::Other
        }
    }

    pub fn is_retryable(self) -> bool {
        self == Self::ChatUnavailable
    }
}

/// Per-recipient outcome of a bulk send.
#[derive(Debug, Clone)]
pub struct BulkRecipientResult {
    pub to: String,
    pub provider_message_id: Option<String>,
    pub error: Option<String>,
}

impl BulkRecipientResult {
    pub fn succeeded(&self) -> bool {
        self.provider_message_id.is_some()
    }
}

/// Aggregate outcome of a bulk send.
#[derive(Debug, Clone)]
pub struct BulkSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub success_rate: f64,
    pub credits_used: i64,
    pub credits_remaining: i64,
}

#[derive(Debug, Clone)]
pub struct BulkReport {
    pub results: Vec<BulkRecipientResult>,
    pub summary: BulkSummary,
}

pub struct SendPipeline {
    registry: Arc<SessionRegistry>,
    store: Arc<MessageStore>,
    ledger: CreditLedger,
    reconciler: Arc<Reconciler>,
    bus: Arc<dyn FanoutChannel>,
    default_country_code: String,
    send_attempts: u32,
    bulk_delay: Duration,
}

impl SendPipeline {
    pub fn new(
        registry: Arc<SessionRegistry>,
        store: Arc<MessageStore>,
        ledger: CreditLedger,
        reconciler: Arc<Reconciler>,
        bus: Arc<dyn FanoutChannel>,
        config: &courier_config::ProviderConfig,
    ) -> Self {
        Self {
            registry,
            store,
            ledger,
            reconciler,
            bus,
            default_country_code: config.default_country_code.clone(),
            send_attempts: config.send_attempts,
            bulk_delay: Duration::from_millis(config.bulk_delay_ms),
        }
    }

    pub(crate) fn store(&self) -> &Arc<MessageStore> {
        &self.store
    }

    /// Send one message, charging one credit on success.
    pub async fn send_one(
        &self,
        tenant_id: &str,
        to: &str,
        body: &str,
    ) -> Result<StoredMessage, CourierError> {
        let conn = self.registry.ensure_healthy(tenant_id).await?;
        if let Err(e) = self.reconciler.reconcile(tenant_id, &conn).await {
            warn!(tenant_id, error = %e, "pre-send reconcile failed");
        }

        let available = self.ledger.balance(tenant_id).await?;
        if available < 1 {
            return Err(CourierError::InsufficientCredits {
                required: 1,
                available,
            });
        }

        let address = to_provider_address(to, &self.default_country_code)?;
        let receipt = self.send_with_retry(tenant_id, &conn, &address, body).await?;

        let stored = self.finish_send(tenant_id, &receipt, &address, body).await?;
        if let Err(e) = self
            .ledger
            .debit(tenant_id, 1, Some("message send"))
            .await
        {
            // The provider already accepted the message; the row stays.
            warn!(tenant_id, error = %e, "post-send debit failed");
        }
        self.store.trim_retention(tenant_id).await?;
        info!(tenant_id, to = %address, provider_message_id = %receipt.id, "message sent");
        Ok(stored)
    }

    /// Send the same body to many recipients.
    ///
    /// Affordability is all-or-nothing up front: a batch the balance cannot
    /// fully cover is rejected before any send. Individual recipients then
    /// succeed or fail independently, and one DECREMENT entry covers the
    /// batch's successes.
    pub async fn send_bulk(
        &self,
        tenant_id: &str,
        addresses: &[String],
        body: &str,
    ) -> Result<BulkReport, CourierError> {
        let conn = self.registry.ensure_healthy(tenant_id).await?;
        if let Err(e) = self.reconciler.reconcile(tenant_id, &conn).await {
            warn!(tenant_id, error = %e, "pre-send reconcile failed");
        }

        let required = addresses.len() as i64;
        let available = self.ledger.balance(tenant_id).await?;
        if available < required {
            return Err(CourierError::InsufficientCredits {
                required,
                available,
            });
        }

        let mut results = Vec::with_capacity(addresses.len());
        for (i, raw) in addresses.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.bulk_delay).await;
            }
            results.push(self.send_bulk_recipient(tenant_id, &conn, raw, body).await);
        }

        let successful = results.iter().filter(|r| r.succeeded()).count();
        if successful > 0 {
            let description = format!("bulk send: {successful} of {} recipients", addresses.len());
            if let Err(e) = self
                .ledger
                .debit(tenant_id, successful as i64, Some(description.as_str()))
                .await
            {
                warn!(tenant_id, error = %e, "post-batch debit failed");
            }
        }
        self.store.trim_retention(tenant_id).await?;

        let summary = BulkSummary {
            total: addresses.len(),
            successful,
            failed: addresses.len() - successful,
            success_rate: if addresses.is_empty() {
                0.0
            } else {
                successful as f64 / addresses.len() as f64
            },
            credits_used: successful as i64,
            credits_remaining: self.ledger.balance(tenant_id).await?,
        };
        info!(
            tenant_id,
            total = summary.total,
            successful = summary.successful,
            failed = summary.failed,
            "bulk send complete"
        );
        Ok(BulkReport { results, summary })
    }

    async fn send_bulk_recipient(
        &self,
        tenant_id: &str,
        conn: &Arc<dyn ProviderConnection>,
        raw: &str,
        body: &str,
    ) -> BulkRecipientResult {
        let address = match to_provider_address(raw, &self.default_country_code) {
            Ok(address) => address,
            Err(e) => {
                return BulkRecipientResult {
                    to: raw.to_string(),
                    provider_message_id: None,
                    error: Some(e.to_string()),
                };
            }
        };
        match self.send_with_retry(tenant_id, conn, &address, body).await {
            Ok(receipt) => {
                let provider_message_id = receipt.id.clone();
                if let Err(e) = self.finish_send(tenant_id, &receipt, &address, body).await {
                    warn!(tenant_id, to = %address, error = %e, "sent message failed to persist");
                }
                BulkRecipientResult {
                    to: address,
                    provider_message_id: Some(provider_message_id),
                    error: None,
                }
            }
            Err(e) => BulkRecipientResult {
                to: address,
                provider_message_id: None,
                error: Some(e.to_string()),
            },
        }
    }

    async fn send_with_retry(
        &self,
        tenant_id: &str,
        conn: &Arc<dyn ProviderConnection>,
        address: &str,
        body: &str,
    ) -> Result<ProviderReceipt, CourierError> {
        let mut attempt = 1;
        loop {
            match conn.send(address, body).await {
                Ok(receipt) => return Ok(receipt),
                Err(e) => {
                    let kind = SendFailureKind::classify(&e);
                    if kind.is_retryable() && attempt < self.send_attempts {
                        warn!(
                            tenant_id,
                            to = %address,
                            attempt,
                            error = %e,
                            "send failed, retrying"
                        );
                        tokio::time::sleep(Duration::from_secs(attempt as u64)).await;
                        attempt += 1;
                        continue;
                    }
                    warn!(tenant_id, to = %address, ?kind, error = %e, "send failed");
                    return Err(e);
                }
            }
        }
    }

    /// Persist the accepted send and fan out `message_sent`. The debit is
    /// the caller's job, which differs between single and bulk sends.
    async fn finish_send(
        &self,
        tenant_id: &str,
        receipt: &ProviderReceipt,
        address: &str,
        body: &str,
    ) -> Result<StoredMessage, CourierError> {
        let from_addr = sessions::get_for_tenant(self.store.database(), tenant_id)
            .await?
            .and_then(|s| s.me_number)
            .unwrap_or_default();
        let stored = self
            .store
            .persist_outbound(tenant_id, receipt, &from_addr, address, body)
            .await?;
        let event = FanoutEvent::MessageSent {
            message: EventMessage::from(&stored),
        };
        if let Err(e) = self.bus.publish(tenant_id, event).await {
            warn!(tenant_id, error = %e, "message_sent fan-out failed");
        }
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider_err(message: &str) -> CourierError {
        CourierError::Provider {
            message: message.to_string(),
            source: None,
        }
    }

    #[test]
    fn classification_by_provider_message() {
        assert_eq!(
            SendFailureKind::classify(&provider_err("Chat not found for 123@c.us")),
            SendFailureKind::ChatUnavailable
        );
        assert_eq!(
            SendFailureKind::classify(&provider_err("Session closed by remote")),
            SendFailureKind::SessionExpired
        );
        assert_eq!(
            SendFailureKind::classify(&provider_err("number not registered on the network")),
            SendFailureKind::RecipientNotFound
        );
        assert_eq!(
            SendFailureKind::classify(&provider_err("boom")),
            SendFailureKind::Other
        );
        assert_eq!(
            SendFailureKind::classify(&CourierError::Internal("x".into())),
            SendFailureKind::Other
        );
    }

    #[test]
    fn only_chat_unavailable_retries() {
        assert!(SendFailureKind::ChatUnavailable.is_retryable());
        assert!(!SendFailureKind::SessionExpired.is_retryable());
        assert!(!SendFailureKind::RecipientNotFound.is_retryable());
        assert!(!SendFailureKind::Other.is_retryable());
    }
}
