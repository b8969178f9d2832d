// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message template operations.

use courier_core::types::now_iso;
use courier_core::CourierError;
use rusqlite::params;

use crate::database::Database;
use crate::models::TemplateRecord;

fn template_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TemplateRecord> {
    Ok(TemplateRecord {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        name: row.get(2)?,
        body: row.get(3)?,
        created_at: row.get(4)?,
    })
}

/// Create or replace a tenant's template by name.
pub async fn upsert(
    db: &Database,
    tenant_id: &str,
    name: &str,
    body: &str,
) -> Result<(), CourierError> {
    let tenant_id = tenant_id.to_string();
    let name = name.to_string();
    let body = body.to_string();
    let id = uuid::Uuid::new_v4().to_string();
    let created_at = now_iso();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO templates (id, tenant_id, name, body, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5) \
                 ON CONFLICT (tenant_id, name) DO UPDATE SET body = excluded.body",
                params![id, tenant_id, name, body, created_at],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Look up a tenant's template by name.
pub async fn get(
    db: &Database,
    tenant_id: &str,
    name: &str,
) -> Result<Option<TemplateRecord>, CourierError> {
    let tenant_id = tenant_id.to_string();
    let name = name.to_string();
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(
                "SELECT id, tenant_id, name, body, created_at \
                 FROM templates WHERE tenant_id = ?1 AND name = ?2",
                params![tenant_id, name],
                template_from_row,
            );
            match result {
                Ok(template) => Ok(Some(template)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}
