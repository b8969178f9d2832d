// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reconciliation log, backing the per-tenant sync cooldown guard.
//!
//! The guard is best-effort rate limiting, not a lock: concurrent
//! reconciliations racing past it are still safe because every write goes
//! through the dedup check.

use courier_core::CourierError;
use rusqlite::params;

use crate::database::Database;

/// Record the start of a reconciliation pass.
pub async fn record_start(db: &Database, tenant_id: &str) -> Result<(), CourierError> {
    let tenant_id = tenant_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO sync_log (tenant_id) VALUES (?1)",
                params![tenant_id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Timestamp of the tenant's most recent reconciliation, if any.
pub async fn last_started_at(
    db: &Database,
    tenant_id: &str,
) -> Result<Option<String>, CourierError> {
    let tenant_id = tenant_id.to_string();
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(
                "SELECT started_at FROM sync_log WHERE tenant_id = ?1 \
                 ORDER BY started_at DESC, id DESC LIMIT 1",
                params![tenant_id],
                |row| row.get::<_, String>(0),
            );
            match result {
                Ok(ts) => Ok(Some(ts)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}
