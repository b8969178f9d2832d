// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Courier messaging backend.

use thiserror::Error;

/// The primary error type used across all Courier services.
///
/// Precondition rejections (`InsufficientCredits`, `NotConnected`,
/// `TemplateVariables`, ...) are definitive business answers and are never
/// retried. `Provider` errors carry the classified failure from the external
/// messaging session and may be retried by the send pipeline.
#[derive(Debug, Error)]
pub enum CourierError {
    /// Configuration errors (invalid TOML, missing required fields).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Messaging provider errors (send failure, fetch failure, session loss).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The tenant's balance cannot cover the requested send.
    #[error("insufficient credits: required {required}, available {available}")]
    InsufficientCredits { required: i64, available: i64 },

    /// No live, authenticated provider session exists for the tenant.
    #[error("session not connected for tenant {tenant_id}")]
    NotConnected { tenant_id: String },

    /// The tenant already has a live, authenticated session.
    #[error("session already connected for tenant {tenant_id}")]
    AlreadyConnected { tenant_id: String },

    /// The pairing artifact did not become available within the wait window.
    #[error("timed out waiting for pairing QR after {duration:?}")]
    QrTimeout { duration: std::time::Duration },

    /// A template was rendered without all of its required variables.
    #[error("missing template variables: {}", missing.join(", "))]
    TemplateVariables { missing: Vec<String> },

    /// The destination address is not usable after normalization.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// A referenced record does not exist.
    #[error("{what} not found: {id}")]
    NotFound { what: &'static str, id: String },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CourierError {
    /// True for errors that are definitive business rejections: retrying the
    /// same call cannot succeed and no side effects were performed.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            CourierError::InsufficientCredits { .. }
                | CourierError::NotConnected { .. }
                | CourierError::AlreadyConnected { .. }
                | CourierError::TemplateVariables { .. }
                | CourierError::InvalidAddress(_)
                | CourierError::NotFound { .. }
        )
    }
}
