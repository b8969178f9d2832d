// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules. All functions accept `&Database` and run on the
//! single tokio-rusqlite background thread.

pub mod attachments;
pub mod conversations;
pub mod ledger;
pub mod messages;
pub mod sessions;
pub mod sync_log;
pub mod templates;
pub mod tenants;
