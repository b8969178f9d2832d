// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tenant record operations.

use courier_core::CourierError;
use rusqlite::params;

use crate::database::Database;
use crate::models::TenantRecord;

fn tenant_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TenantRecord> {
    Ok(TenantRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        credits: row.get(2)?,
        created_at: row.get(3)?,
    })
}

/// Create a tenant with an opening credit balance.
pub async fn create_tenant(
    db: &Database,
    id: &str,
    name: &str,
    credits: i64,
) -> Result<(), CourierError> {
    let id = id.to_string();
    let name = name.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO tenants (id, name, credits) VALUES (?1, ?2, ?3)",
                params![id, name, credits],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get a tenant by id.
pub async fn get_tenant(db: &Database, id: &str) -> Result<Option<TenantRecord>, CourierError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(
                "SELECT id, name, credits, created_at FROM tenants WHERE id = ?1",
                params![id],
                tenant_from_row,
            );
            match result {
                Ok(tenant) => Ok(Some(tenant)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// The tenant's live credit balance. Missing tenants are `NotFound`.
pub async fn credits(db: &Database, id: &str) -> Result<i64, CourierError> {
    match get_tenant(db, id).await? {
        Some(tenant) => Ok(tenant.credits),
        None => Err(CourierError::NotFound {
            what: "tenant",
            id: id.to_string(),
        }),
    }
}
