// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credit ledger service over the storage layer.

use courier_core::CourierError;
use courier_storage::models::LedgerEntry;
use courier_storage::queries::{ledger, tenants};
use courier_storage::Database;
use tracing::info;

/// One page of ledger history with the total count for pagination.
#[derive(Debug, Clone)]
pub struct LedgerPage {
    pub entries: Vec<LedgerEntry>,
    pub total: i64,
}

/// Atomic balance tracking with an append-only transaction log.
#[derive(Clone)]
pub struct CreditLedger {
    db: Database,
}

impl CreditLedger {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Add credits to a tenant. `amount` must be positive; there is no
    /// upper bound.
    pub async fn credit(
        &self,
        tenant_id: &str,
        amount: i64,
        description: Option<&str>,
    ) -> Result<LedgerEntry, CourierError> {
        if amount <= 0 {
            return Err(CourierError::Internal(format!(
                "credit amount must be positive, got {amount}"
            )));
        }
        let entry = ledger::credit(&self.db, tenant_id, amount, description).await?;
        info!(tenant_id, amount, "credits added");
        Ok(entry)
    }

    /// Debit credits from a tenant, failing with `InsufficientCredits` when
    /// the balance cannot cover the amount.
    ///
    /// The check and decrement are one atomic conditional UPDATE, so two
    /// concurrent sends cannot both pass a stale balance check. A rejection
    /// is definitive; it is never retried.
    pub async fn debit(
        &self,
        tenant_id: &str,
        amount: i64,
        description: Option<&str>,
    ) -> Result<LedgerEntry, CourierError> {
        if amount <= 0 {
            return Err(CourierError::Internal(format!(
                "debit amount must be positive, got {amount}"
            )));
        }
        let entry = ledger::debit_if_affordable(&self.db, tenant_id, amount, description).await?;
        info!(tenant_id, amount, "credits debited");
        Ok(entry)
    }

    /// The tenant's live credit balance.
    pub async fn balance(&self, tenant_id: &str) -> Result<i64, CourierError> {
        tenants::credits(&self.db, tenant_id).await
    }

    /// Ledger entries newest-first with the total count for pagination.
    pub async fn history(
        &self,
        tenant_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<LedgerPage, CourierError> {
        let (entries, total) = ledger::entries_page(&self.db, tenant_id, limit, offset).await?;
        Ok(LedgerPage { entries, total })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::types::LedgerKind;
    use courier_storage::queries::tenants::create_tenant;
    use tempfile::tempdir;

    async fn setup() -> (CreditLedger, Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("test.db").to_str().unwrap())
            .await
            .unwrap();
        create_tenant(&db, "t1", "Tenant One", 0).await.unwrap();
        (CreditLedger::new(db.clone()), db, dir)
    }

    #[tokio::test]
    async fn credit_then_debit_sequence() {
        let (ledger, _db, _dir) = setup().await;

        ledger.credit("t1", 10, Some("top-up")).await.unwrap();
        assert_eq!(ledger.balance("t1").await.unwrap(), 10);

        ledger.debit("t1", 4, Some("bulk send: 4 sent")).await.unwrap();
        assert_eq!(ledger.balance("t1").await.unwrap(), 6);

        let page = ledger.history("t1", 10, 0).await.unwrap();
        assert_eq!(page.total, 2);
        // Newest first: the debit precedes the credit in the page.
        assert_eq!(page.entries[0].kind, LedgerKind::Decrement);
        assert_eq!(page.entries[1].kind, LedgerKind::Increment);
    }

    #[tokio::test]
    async fn non_positive_amounts_are_rejected() {
        let (ledger, _db, _dir) = setup().await;
        assert!(ledger.credit("t1", 0, None).await.is_err());
        assert!(ledger.credit("t1", -3, None).await.is_err());
        assert!(ledger.debit("t1", 0, None).await.is_err());
    }

    #[tokio::test]
    async fn overdraw_reports_required_and_available() {
        let (ledger, _db, _dir) = setup().await;
        ledger.credit("t1", 2, None).await.unwrap();

        let err = ledger.debit("t1", 3, None).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "insufficient credits: required 3, available 2"
        );
        assert_eq!(ledger.balance("t1").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn history_paginates_newest_first() {
        let (ledger, _db, _dir) = setup().await;
        for i in 1..=5 {
            ledger.credit("t1", i, None).await.unwrap();
        }
        let page = ledger.history("t1", 2, 0).await.unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.entries.len(), 2);
        assert_eq!(page.entries[0].amount, 5);

        let last = ledger.history("t1", 2, 4).await.unwrap();
        assert_eq!(last.entries.len(), 1);
        assert_eq!(last.entries[0].amount, 1);
    }
}
