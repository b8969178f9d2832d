// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session row operations.
//!
//! One row per tenant by design; the upsert keeps it that way without a
//! schema-level uniqueness guarantee.

use std::str::FromStr;

use courier_core::types::SessionStatus;
use courier_core::CourierError;
use rusqlite::params;

use crate::database::Database;
use crate::models::SessionRecord;

fn session_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionRecord> {
    let status: String = row.get(2)?;
    Ok(SessionRecord {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        status: SessionStatus::from_str(&status).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
        })?,
        me_number: row.get(3)?,
        metadata: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

/// Set the tenant's session status, creating the row on first use.
pub async fn upsert_status(
    db: &Database,
    tenant_id: &str,
    status: SessionStatus,
) -> Result<(), CourierError> {
    let tenant_id = tenant_id.to_string();
    let status = status.to_string();
    let id = uuid::Uuid::new_v4().to_string();
    db.connection()
        .call(move |conn| {
            let updated = conn.execute(
                "UPDATE sessions SET status = ?1,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE tenant_id = ?2",
                params![status, tenant_id],
            )?;
            if updated == 0 {
                conn.execute(
                    "INSERT INTO sessions (id, tenant_id, status) VALUES (?1, ?2, ?3)",
                    params![id, tenant_id, status],
                )?;
            }
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Capture the tenant's own provider address after authentication.
pub async fn set_me_number(
    db: &Database,
    tenant_id: &str,
    me_number: &str,
) -> Result<(), CourierError> {
    let tenant_id = tenant_id.to_string();
    let me_number = me_number.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE sessions SET me_number = ?1,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE tenant_id = ?2",
                params![me_number, tenant_id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get the tenant's session row, if any.
pub async fn get_for_tenant(
    db: &Database,
    tenant_id: &str,
) -> Result<Option<SessionRecord>, CourierError> {
    let tenant_id = tenant_id.to_string();
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(
                "SELECT id, tenant_id, status, me_number, metadata, created_at, updated_at
                 FROM sessions WHERE tenant_id = ?1",
                params![tenant_id],
                session_from_row,
            );
            match result {
                Ok(session) => Ok(Some(session)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// List sessions in a given status (startup recovery scans for `active`).
pub async fn list_by_status(
    db: &Database,
    status: SessionStatus,
) -> Result<Vec<SessionRecord>, CourierError> {
    let status = status.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, tenant_id, status, me_number, metadata, created_at, updated_at
                 FROM sessions WHERE status = ?1 ORDER BY created_at ASC",
            )?;
            let rows = stmt.query_map(params![status], session_from_row)?;
            let mut sessions = Vec::new();
            for row in rows {
                sessions.push(row?);
            }
            Ok(sessions)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Delete all session rows for a tenant (explicit disconnect).
pub async fn delete_for_tenant(db: &Database, tenant_id: &str) -> Result<(), CourierError> {
    let tenant_id = tenant_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute("DELETE FROM sessions WHERE tenant_id = ?1", params![tenant_id])?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::tenants::create_tenant;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        create_tenant(&db, "t1", "Tenant One", 0).await.unwrap();
        (db, dir)
    }

    #[tokio::test]
    async fn upsert_creates_then_updates_single_row() {
        let (db, _dir) = setup_db().await;

        upsert_status(&db, "t1", SessionStatus::Pending).await.unwrap();
        upsert_status(&db, "t1", SessionStatus::Active).await.unwrap();

        let session = get_for_tenant(&db, "t1").await.unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Active);

        // Still exactly one row.
        let count: i64 = db
            .connection()
            .call(|conn| {
                conn.query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))
            })
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn me_number_is_captured() {
        let (db, _dir) = setup_db().await;
        upsert_status(&db, "t1", SessionStatus::Active).await.unwrap();
        set_me_number(&db, "t1", "919900112233").await.unwrap();

        let session = get_for_tenant(&db, "t1").await.unwrap().unwrap();
        assert_eq!(session.me_number.as_deref(), Some("919900112233"));
    }

    #[tokio::test]
    async fn list_by_status_finds_active_sessions() {
        let (db, _dir) = setup_db().await;
        create_tenant(&db, "t2", "Tenant Two", 0).await.unwrap();

        upsert_status(&db, "t1", SessionStatus::Active).await.unwrap();
        upsert_status(&db, "t2", SessionStatus::Failed).await.unwrap();

        let active = list_by_status(&db, SessionStatus::Active).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].tenant_id, "t1");
    }

    #[tokio::test]
    async fn delete_removes_the_row() {
        let (db, _dir) = setup_db().await;
        upsert_status(&db, "t1", SessionStatus::Active).await.unwrap();
        delete_for_tenant(&db, "t1").await.unwrap();
        assert!(get_for_tenant(&db, "t1").await.unwrap().is_none());
    }
}
