// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation-level aggregate queries.
//!
//! Messages are grouped by counterpart address: the `to` address for
//! outbound rows, the `from` address for inbound rows, excluding the
//! tenant's own provider address. These are derived reads over the messages
//! table; no independent state is kept.

use courier_core::CourierError;
use rusqlite::params;

use crate::database::Database;
use crate::models::StoredMessage;
use crate::queries::messages::{message_from_row, MESSAGE_COLUMNS};

/// One conversation in the tenant's conversation list.
#[derive(Debug, Clone)]
pub struct ConversationRow {
    pub counterpart: String,
    pub message_count: i64,
    /// Timestamp of the most recent message.
    pub last_activity: String,
    pub latest: StoredMessage,
}

/// All conversations for a tenant, most recently active first.
pub async fn overview(
    db: &Database,
    tenant_id: &str,
    me_number: &str,
) -> Result<Vec<ConversationRow>, CourierError> {
    let tenant_id = tenant_id.to_string();
    let me_number = me_number.to_string();
    db.connection()
        .call(move |conn| {
            let sql = format!(
                "WITH tagged AS ( \
                   SELECT {MESSAGE_COLUMNS}, \
                          CASE direction WHEN 'OUTBOUND' THEN to_addr ELSE from_addr END \
                              AS counterpart \
                   FROM messages WHERE tenant_id = ?1 \
                 ), ranked AS ( \
                   SELECT *, \
                          ROW_NUMBER() OVER (PARTITION BY counterpart \
                                             ORDER BY created_at DESC, id DESC) AS rn, \
                          COUNT(*) OVER (PARTITION BY counterpart) AS message_count, \
                          MAX(created_at) OVER (PARTITION BY counterpart) AS last_activity \
                   FROM tagged \
                 ) \
                 SELECT {MESSAGE_COLUMNS}, counterpart, message_count, last_activity \
                 FROM ranked WHERE rn = 1 AND counterpart <> ?2 \
                 ORDER BY last_activity DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![tenant_id, me_number], |row| {
                Ok(ConversationRow {
                    latest: message_from_row(row)?,
                    counterpart: row.get(11)?,
                    message_count: row.get(12)?,
                    last_activity: row.get(13)?,
                })
            })?;
            let mut conversations = Vec::new();
            for row in rows {
                conversations.push(row?);
            }
            Ok(conversations)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Number of distinct conversations for a tenant.
pub async fn distinct_count(
    db: &Database,
    tenant_id: &str,
    me_number: &str,
) -> Result<i64, CourierError> {
    let tenant_id = tenant_id.to_string();
    let me_number = me_number.to_string();
    db.connection()
        .call(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(DISTINCT CASE direction \
                     WHEN 'OUTBOUND' THEN to_addr ELSE from_addr END) \
                 FROM messages WHERE tenant_id = ?1 \
                   AND (CASE direction WHEN 'OUTBOUND' THEN to_addr ELSE from_addr END) <> ?2",
                params![tenant_id, me_number],
                |row| row.get(0),
            )?;
            Ok(count)
        })
        .await
        .map_err(crate::database::map_tr_err)
}
