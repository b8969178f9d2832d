// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Attachment metadata operations.

use courier_core::CourierError;
use rusqlite::params;

use crate::database::Database;
use crate::models::Attachment;

fn attachment_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Attachment> {
    Ok(Attachment {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        file_name: row.get(2)?,
        mime_type: row.get(3)?,
        size_bytes: row.get(4)?,
        storage_key: row.get(5)?,
        created_at: row.get(6)?,
    })
}

/// Insert attachment metadata. The blob itself lives in the blob store
/// under `storage_key`.
pub async fn insert(db: &Database, attachment: &Attachment) -> Result<(), CourierError> {
    let attachment = attachment.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO attachments \
                 (id, tenant_id, file_name, mime_type, size_bytes, storage_key, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    attachment.id,
                    attachment.tenant_id,
                    attachment.file_name,
                    attachment.mime_type,
                    attachment.size_bytes,
                    attachment.storage_key,
                    attachment.created_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get attachment metadata by id.
pub async fn get(db: &Database, id: &str) -> Result<Option<Attachment>, CourierError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(
                "SELECT id, tenant_id, file_name, mime_type, size_bytes, storage_key, created_at \
                 FROM attachments WHERE id = ?1",
                params![id],
                attachment_from_row,
            );
            match result {
                Ok(attachment) => Ok(Some(attachment)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::tenants::create_tenant;
    use courier_core::types::now_iso;
    use tempfile::tempdir;

    #[tokio::test]
    async fn insert_and_get_roundtrips() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("test.db").to_str().unwrap())
            .await
            .unwrap();
        create_tenant(&db, "t1", "Tenant One", 0).await.unwrap();

        let attachment = Attachment {
            id: "att-1".to_string(),
            tenant_id: "t1".to_string(),
            file_name: "invoice.pdf".to_string(),
            mime_type: "application/pdf".to_string(),
            size_bytes: 1024,
            storage_key: "t1/att-1/invoice.pdf".to_string(),
            created_at: now_iso(),
        };
        insert(&db, &attachment).await.unwrap();

        let fetched = get(&db, "att-1").await.unwrap().unwrap();
        assert_eq!(fetched.mime_type, "application/pdf");
        assert_eq!(fetched.size_bytes, 1024);
        assert!(get(&db, "att-missing").await.unwrap().is_none());
    }
}
