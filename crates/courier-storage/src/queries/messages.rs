// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message row operations: dedup-checked insert, monotonic status updates,
//! retention trimming, and thread pagination.
//!
//! The same provider message can be observed via the live event stream, a
//! resync sweep, and a send confirmation; `insert_unique` makes all three
//! paths collapse into one row through the (tenant_id, provider_message_id)
//! unique index.

use std::str::FromStr;

use courier_core::types::{DeliveryStatus, MessageDirection, MessageType};
use courier_core::CourierError;
use rusqlite::params;

use crate::database::Database;
use crate::models::StoredMessage;

/// Canonical message column list; `message_from_row` expects this order.
pub(crate) const MESSAGE_COLUMNS: &str = "id, tenant_id, direction, from_addr, to_addr, body, \
     message_type, provider_message_id, status, attachment_id, created_at";

pub(crate) fn message_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredMessage> {
    fn parse_col<T: FromStr>(value: String, idx: usize) -> rusqlite::Result<T>
    where
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        T::from_str(&value).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                idx,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
    }

    let direction: String = row.get(2)?;
    let message_type: String = row.get(6)?;
    let status: String = row.get(8)?;
    Ok(StoredMessage {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        direction: parse_col::<MessageDirection>(direction, 2)?,
        from_addr: row.get(3)?,
        to_addr: row.get(4)?,
        body: row.get(5)?,
        message_type: parse_col::<MessageType>(message_type, 6)?,
        provider_message_id: row.get(7)?,
        status: parse_col::<DeliveryStatus>(status, 8)?,
        attachment_id: row.get(9)?,
        created_at: row.get(10)?,
    })
}

/// Result of a dedup-checked insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// A row with this (tenant, provider message id) already existed.
    Skipped,
}

/// Insert a message unless its dedup key is already present.
///
/// Uses `INSERT OR IGNORE` against the unique index so concurrent writers
/// racing past any application-level pre-check still produce exactly one row.
pub async fn insert_unique(
    db: &Database,
    msg: &StoredMessage,
) -> Result<InsertOutcome, CourierError> {
    let msg = msg.clone();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "INSERT OR IGNORE INTO messages \
                 (id, tenant_id, direction, from_addr, to_addr, body, message_type, \
                  provider_message_id, status, attachment_id, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    msg.id,
                    msg.tenant_id,
                    msg.direction.to_string(),
                    msg.from_addr,
                    msg.to_addr,
                    msg.body,
                    msg.message_type.to_string(),
                    msg.provider_message_id,
                    msg.status.to_string(),
                    msg.attachment_id,
                    msg.created_at,
                ],
            )?;
            Ok(if changed == 0 {
                InsertOutcome::Skipped
            } else {
                InsertOutcome::Inserted
            })
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Fast dedup pre-check, used to skip media fetching for known messages.
pub async fn exists(
    db: &Database,
    tenant_id: &str,
    provider_message_id: &str,
) -> Result<bool, CourierError> {
    let tenant_id = tenant_id.to_string();
    let provider_message_id = provider_message_id.to_string();
    db.connection()
        .call(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM messages \
                 WHERE tenant_id = ?1 AND provider_message_id = ?2",
                params![tenant_id, provider_message_id],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Look up a message by its provider-assigned id.
pub async fn get_by_provider_id(
    db: &Database,
    tenant_id: &str,
    provider_message_id: &str,
) -> Result<Option<StoredMessage>, CourierError> {
    let tenant_id = tenant_id.to_string();
    let provider_message_id = provider_message_id.to_string();
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(
                &format!(
                    "SELECT {MESSAGE_COLUMNS} FROM messages \
                     WHERE tenant_id = ?1 AND provider_message_id = ?2"
                ),
                params![tenant_id, provider_message_id],
                message_from_row,
            );
            match result {
                Ok(msg) => Ok(Some(msg)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Render the rank of a status expression as a SQL CASE, taking the
/// per-status values from [`DeliveryStatus::rank`] so the ordering has a
/// single definition.
fn rank_case(expr: &str) -> String {
    let arms: String = [
        DeliveryStatus::Pending,
        DeliveryStatus::Sent,
        DeliveryStatus::Delivered,
        DeliveryStatus::Read,
        DeliveryStatus::Failed,
    ]
    .iter()
    .map(|status| format!("WHEN '{status}' THEN {} ", status.rank()))
    .collect();
    format!("CASE {expr} {arms}END")
}

/// Apply an acknowledgment status if it advances the delivery state.
///
/// The rank guard keeps status monotonic under out-of-order acks: a
/// late-arriving SENT never downgrades a DELIVERED/READ row, and FAILED is
/// terminal. Unmatched provider ids are a silent no-op. Returns whether a
/// row was updated.
pub async fn update_status_monotonic(
    db: &Database,
    tenant_id: &str,
    provider_message_id: &str,
    status: DeliveryStatus,
) -> Result<bool, CourierError> {
    let tenant_id = tenant_id.to_string();
    let provider_message_id = provider_message_id.to_string();
    let new_status = status.to_string();
    let sql = format!(
        "UPDATE messages SET status = ?3 \
         WHERE tenant_id = ?1 AND provider_message_id = ?2 \
           AND status <> '{failed}' \
           AND {old_rank} < {new_rank}",
        failed = DeliveryStatus::Failed,
        old_rank = rank_case("status"),
        new_rank = rank_case("?3"),
    );
    db.connection()
        .call(move |conn| {
            let changed =
                conn.execute(&sql, params![tenant_id, provider_message_id, new_status])?;
            Ok(changed > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Delete all but the `keep` most-recent messages for a tenant.
///
/// A hard, lossy cap: trimmed history is not recoverable. Attachment rows
/// orphaned by the trim are removed in the same transaction. Returns the
/// number of messages deleted and the storage keys of the removed
/// attachments, so the caller can delete the blobs behind them.
pub async fn trim_to_recent(
    db: &Database,
    tenant_id: &str,
    keep: usize,
) -> Result<(usize, Vec<String>), CourierError> {
    let tenant_id = tenant_id.to_string();
    let keep = keep as i64;
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let deleted = tx.execute(
                "DELETE FROM messages WHERE tenant_id = ?1 AND id NOT IN \
                 (SELECT id FROM messages WHERE tenant_id = ?1 \
                  ORDER BY created_at DESC, id DESC LIMIT ?2)",
                params![tenant_id, keep],
            )?;
            let mut orphaned_keys = Vec::new();
            if deleted > 0 {
                let mut stmt = tx.prepare(
                    "SELECT storage_key FROM attachments WHERE tenant_id = ?1 AND id NOT IN \
                     (SELECT attachment_id FROM messages \
                      WHERE tenant_id = ?1 AND attachment_id IS NOT NULL)",
                )?;
                let keys = stmt.query_map(params![tenant_id], |row| row.get::<_, String>(0))?;
                for key in keys {
                    orphaned_keys.push(key?);
                }
                drop(stmt);
                tx.execute(
                    "DELETE FROM attachments WHERE tenant_id = ?1 AND id NOT IN \
                     (SELECT attachment_id FROM messages \
                      WHERE tenant_id = ?1 AND attachment_id IS NOT NULL)",
                    params![tenant_id],
                )?;
            }
            tx.commit()?;
            Ok((deleted, orphaned_keys))
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Total stored messages for a tenant.
pub async fn count_for_tenant(db: &Database, tenant_id: &str) -> Result<i64, CourierError> {
    let tenant_id = tenant_id.to_string();
    db.connection()
        .call(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM messages WHERE tenant_id = ?1",
                params![tenant_id],
                |row| row.get(0),
            )?;
            Ok(count)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Most recent messages for a tenant, newest first.
pub async fn recent(
    db: &Database,
    tenant_id: &str,
    limit: usize,
) -> Result<Vec<StoredMessage>, CourierError> {
    let tenant_id = tenant_id.to_string();
    let limit = limit as i64;
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages WHERE tenant_id = ?1 \
                 ORDER BY created_at DESC, id DESC LIMIT ?2"
            ))?;
            let rows = stmt.query_map(params![tenant_id, limit], message_from_row)?;
            let mut messages = Vec::new();
            for row in rows {
                messages.push(row?);
            }
            Ok(messages)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// One page of a conversation with `address`, newest first.
///
/// Callers wanting chronological display order reverse the page.
pub async fn page_for_counterpart(
    db: &Database,
    tenant_id: &str,
    address: &str,
    limit: usize,
    offset: usize,
) -> Result<Vec<StoredMessage>, CourierError> {
    let tenant_id = tenant_id.to_string();
    let address = address.to_string();
    let limit = limit as i64;
    let offset = offset as i64;
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages \
                 WHERE tenant_id = ?1 AND (from_addr = ?2 OR to_addr = ?2) \
                 ORDER BY created_at DESC, id DESC LIMIT ?3 OFFSET ?4"
            ))?;
            let rows =
                stmt.query_map(params![tenant_id, address, limit, offset], message_from_row)?;
            let mut messages = Vec::new();
            for row in rows {
                messages.push(row?);
            }
            Ok(messages)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Delete every message (and attachment) for a tenant. Used by disconnect:
/// message history is not retained across a disconnect. Returns the storage
/// keys of the deleted attachments for blob cleanup.
pub async fn delete_all_for_tenant(
    db: &Database,
    tenant_id: &str,
) -> Result<Vec<String>, CourierError> {
    let tenant_id = tenant_id.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let mut stmt = tx.prepare(
                "SELECT storage_key FROM attachments WHERE tenant_id = ?1",
            )?;
            let keys = stmt.query_map(params![tenant_id], |row| row.get::<_, String>(0))?;
            let mut purged_keys = Vec::new();
            for key in keys {
                purged_keys.push(key?);
            }
            drop(stmt);
            tx.execute("DELETE FROM messages WHERE tenant_id = ?1", params![tenant_id])?;
            tx.execute(
                "DELETE FROM attachments WHERE tenant_id = ?1",
                params![tenant_id],
            )?;
            tx.commit()?;
            Ok(purged_keys)
        })
        .await
        .map_err(crate::database::map_tr_err)
}
