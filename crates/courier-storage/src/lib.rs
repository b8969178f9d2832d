// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Courier messaging backend.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a
//! single-writer concurrency model via `tokio-rusqlite`, typed query modules
//! for tenants, sessions, messages, the credit ledger, attachments,
//! templates and the sync log, plus a filesystem blob store for media.

pub mod blobs;
pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;

pub use blobs::FsBlobStore;
pub use database::Database;
pub use models::*;
