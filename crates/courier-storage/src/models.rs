// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage record types.
//!
//! Message, attachment, and ledger entry types are canonical in
//! `courier-core::types` (they cross trait boundaries) and re-exported here;
//! the tenant/session/template records are storage-local.

use serde::{Deserialize, Serialize};

pub use courier_core::types::{Attachment, LedgerEntry, StoredMessage};
use courier_core::types::SessionStatus;

/// A registered business account with its live credit balance.
///
/// `credits` is mutated only by the ledger queries, which always write the
/// matching ledger entry in the same transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantRecord {
    pub id: String,
    pub name: String,
    pub credits: i64,
    pub created_at: String,
}

/// One provider session row for a tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub tenant_id: String,
    pub status: SessionStatus,
    /// The tenant's own provider-assigned address, captured on authentication.
    pub me_number: Option<String>,
    /// Opaque provider-specific metadata blob (JSON).
    pub metadata: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A stored message template with `{{variable}}` placeholders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateRecord {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub body: String,
    pub created_at: String,
}
