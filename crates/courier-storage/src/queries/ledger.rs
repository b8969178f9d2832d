// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credit ledger operations.
//!
//! The live `tenants.credits` counter and the append-only `credit_ledger`
//! log are always written in one transaction, so the balance equals the sum
//! of ledger entries at all times. The debit is a single conditional UPDATE
//! checked by rows-affected: two concurrent debits can never both pass a
//! stale balance check, and the CHECK constraint backstops non-negativity.

use std::str::FromStr;

use courier_core::types::{now_iso, LedgerKind};
use courier_core::CourierError;
use rusqlite::params;

use crate::database::Database;
use crate::models::LedgerEntry;

fn entry_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<LedgerEntry> {
    let kind: String = row.get(3)?;
    Ok(LedgerEntry {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        amount: row.get(2)?,
        kind: LedgerKind::from_str(&kind).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?,
        description: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn new_entry(tenant_id: &str, amount: i64, kind: LedgerKind, description: Option<&str>) -> LedgerEntry {
    LedgerEntry {
        id: uuid::Uuid::new_v4().to_string(),
        tenant_id: tenant_id.to_string(),
        amount,
        kind,
        description: description.map(str::to_string),
        created_at: now_iso(),
    }
}

/// Outcome of a conditional debit, resolved to errors by the caller.
enum DebitAttempt {
    Debited,
    Insufficient { available: i64 },
    NoTenant,
}

/// Add credits: balance bump plus INCREMENT entry, one transaction.
pub async fn credit(
    db: &Database,
    tenant_id: &str,
    amount: i64,
    description: Option<&str>,
) -> Result<LedgerEntry, CourierError> {
    let entry = new_entry(tenant_id, amount, LedgerKind::Increment, description);
    let result = entry.clone();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let updated = tx.execute(
                "UPDATE tenants SET credits = credits + ?1 WHERE id = ?2",
                params![entry.amount, entry.tenant_id],
            )?;
            if updated == 0 {
                // No row to credit; roll back by dropping the transaction.
                return Ok(None);
            }
            tx.execute(
                "INSERT INTO credit_ledger (id, tenant_id, amount, kind, description, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    entry.id,
                    entry.tenant_id,
                    entry.amount,
                    entry.kind.to_string(),
                    entry.description,
                    entry.created_at,
                ],
            )?;
            tx.commit()?;
            Ok(Some(()))
        })
        .await
        .map_err(crate::database::map_tr_err)?
        .ok_or_else(|| CourierError::NotFound {
            what: "tenant",
            id: tenant_id.to_string(),
        })?;
    Ok(result)
}

/// Debit credits only if the balance covers the amount.
///
/// The balance check and decrement are one atomic
/// `UPDATE ... WHERE credits >= amount`; a zero rows-affected result is a
/// definitive `InsufficientCredits` rejection, not a transient error.
pub async fn debit_if_affordable(
    db: &Database,
    tenant_id: &str,
    amount: i64,
    description: Option<&str>,
) -> Result<LedgerEntry, CourierError> {
    let entry = new_entry(tenant_id, amount, LedgerKind::Decrement, description);
    let result = entry.clone();
    let attempt = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let updated = tx.execute(
                "UPDATE tenants SET credits = credits - ?1 \
                 WHERE id = ?2 AND credits >= ?1",
                params![entry.amount, entry.tenant_id],
            )?;
            if updated == 0 {
                let balance = tx.query_row(
                    "SELECT credits FROM tenants WHERE id = ?1",
                    params![entry.tenant_id],
                    |row| row.get::<_, i64>(0),
                );
                return match balance {
                    Ok(available) => Ok(DebitAttempt::Insufficient { available }),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(DebitAttempt::NoTenant),
                    Err(e) => Err(e),
                };
            }
            tx.execute(
                "INSERT INTO credit_ledger (id, tenant_id, amount, kind, description, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    entry.id,
                    entry.tenant_id,
                    entry.amount,
                    entry.kind.to_string(),
                    entry.description,
                    entry.created_at,
                ],
            )?;
            tx.commit()?;
            Ok(DebitAttempt::Debited)
        })
        .await
        .map_err(crate::database::map_tr_err)?;

    match attempt {
        DebitAttempt::Debited => Ok(result),
        DebitAttempt::Insufficient { available } => Err(CourierError::InsufficientCredits {
            required: amount,
            available,
        }),
        DebitAttempt::NoTenant => Err(CourierError::NotFound {
            what: "tenant",
            id: tenant_id.to_string(),
        }),
    }
}

/// One page of ledger entries, newest first, plus the total entry count.
pub async fn entries_page(
    db: &Database,
    tenant_id: &str,
    limit: usize,
    offset: usize,
) -> Result<(Vec<LedgerEntry>, i64), CourierError> {
    let tenant_id = tenant_id.to_string();
    let limit = limit as i64;
    let offset = offset as i64;
    db.connection()
        .call(move |conn| {
            let total: i64 = conn.query_row(
                "SELECT COUNT(*) FROM credit_ledger WHERE tenant_id = ?1",
                params![tenant_id],
                |row| row.get(0),
            )?;
            let mut stmt = conn.prepare(
                "SELECT id, tenant_id, amount, kind, description, created_at \
                 FROM credit_ledger WHERE tenant_id = ?1 \
                 ORDER BY created_at DESC, id DESC LIMIT ?2 OFFSET ?3",
            )?;
            let rows = stmt.query_map(params![tenant_id, limit, offset], entry_from_row)?;
            let mut entries = Vec::new();
            for row in rows {
                entries.push(row?);
            }
            Ok((entries, total))
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Signed sum of all ledger entries for a tenant (INCREMENT minus DECREMENT).
///
/// Must always equal the live `tenants.credits` counter.
pub async fn sum_entries(db: &Database, tenant_id: &str) -> Result<i64, CourierError> {
    let tenant_id = tenant_id.to_string();
    db.connection()
        .call(move |conn| {
            let sum: i64 = conn.query_row(
                "SELECT COALESCE(SUM(CASE kind WHEN 'INCREMENT' THEN amount ELSE -amount END), 0) \
                 FROM credit_ledger WHERE tenant_id = ?1",
                params![tenant_id],
                |row| row.get(0),
            )?;
            Ok(sum)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::tenants::{create_tenant, credits};
    use tempfile::tempdir;

    async fn setup_db(opening: i64) -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        create_tenant(&db, "t1", "Tenant One", opening).await.unwrap();
        (db, dir)
    }

    #[tokio::test]
    async fn credit_bumps_balance_and_appends_entry() {
        let (db, _dir) = setup_db(0).await;
        credit(&db, "t1", 10, Some("signup bonus")).await.unwrap();
        credit(&db, "t1", 5, None).await.unwrap();

        assert_eq!(credits(&db, "t1").await.unwrap(), 15);
        assert_eq!(sum_entries(&db, "t1").await.unwrap(), 15);

        let (entries, total) = entries_page(&db, "t1", 10, 0).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.kind == LedgerKind::Increment));
    }

    #[tokio::test]
    async fn debit_within_balance_succeeds() {
        let (db, _dir) = setup_db(3).await;
        let entry = debit_if_affordable(&db, "t1", 2, Some("bulk send"))
            .await
            .unwrap();
        assert_eq!(entry.kind, LedgerKind::Decrement);
        assert_eq!(credits(&db, "t1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn overdraw_is_rejected_not_clamped() {
        let (db, _dir) = setup_db(1).await;
        let err = debit_if_affordable(&db, "t1", 2, None).await.unwrap_err();
        match err {
            CourierError::InsufficientCredits { required, available } => {
                assert_eq!(required, 2);
                assert_eq!(available, 1);
            }
            other => panic!("expected InsufficientCredits, got {other}"),
        }
        // Balance untouched, no DECREMENT entry written.
        assert_eq!(credits(&db, "t1").await.unwrap(), 1);
        let (_, total) = entries_page(&db, "t1", 10, 0).await.unwrap();
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn debit_unknown_tenant_is_not_found() {
        let (db, _dir) = setup_db(0).await;
        assert!(matches!(
            debit_if_affordable(&db, "ghost", 1, None).await,
            Err(CourierError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn concurrent_debits_never_drive_balance_negative() {
        let (db, _dir) = setup_db(0).await;
        credit(&db, "t1", 5, None).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..10 {
            let db = db.clone();
            handles.push(tokio::spawn(async move {
                debit_if_affordable(&db, "t1", 1, None).await.is_ok()
            }));
        }
        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap() {
                successes += 1;
            }
        }

        assert_eq!(successes, 5, "exactly the affordable debits succeed");
        assert_eq!(credits(&db, "t1").await.unwrap(), 0);
        assert_eq!(sum_entries(&db, "t1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn balance_always_equals_ledger_sum() {
        let (db, _dir) = setup_db(0).await;
        credit(&db, "t1", 7, None).await.unwrap();
        debit_if_affordable(&db, "t1", 3, None).await.unwrap();
        credit(&db, "t1", 1, None).await.unwrap();
        let _ = debit_if_affordable(&db, "t1", 100, None).await;

        let balance = credits(&db, "t1").await.unwrap();
        assert_eq!(balance, 5);
        assert_eq!(sum_entries(&db, "t1").await.unwrap(), balance);
    }
}
