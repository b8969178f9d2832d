// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Blob store trait for media attachment binaries.

use async_trait::async_trait;

use crate::error::CourierError;

/// Keyed binary storage for message attachments.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes under `key`, returning a resolvable URL.
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<String, CourierError>;

    /// Delete the blob stored under `key`. Missing keys are not an error.
    async fn delete(&self, key: &str) -> Result<(), CourierError>;

    /// The URL a stored key resolves to, without touching the backend.
    fn url_for(&self, key: &str) -> String;
}
