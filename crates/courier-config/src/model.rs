// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Courier messaging backend.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Courier configuration.
///
/// Loaded from TOML with environment variable overrides. All sections are
/// optional and default to the documented operational constants.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CourierConfig {
    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Provider connection and send pipeline settings.
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Bulk resynchronization and retention settings.
    #[serde(default)]
    pub sync: SyncConfig,
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Directory for media attachment blobs.
    #[serde(default = "default_media_dir")]
    pub media_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            media_dir: default_media_dir(),
        }
    }
}

fn default_database_path() -> String {
    "courier.db".to_string()
}

fn default_media_dir() -> String {
    "media".to_string()
}

/// Provider connection and send pipeline configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Country code prepended to bare national numbers. The inference is a
    /// fixed-default heuristic, not an E.164 parser.
    #[serde(default = "default_country_code")]
    pub default_country_code: String,

    /// Seconds `connect` waits for a pairing QR before returning a timeout.
    #[serde(default = "default_qr_wait_secs")]
    pub qr_wait_secs: u64,

    /// Maximum provider send attempts per message.
    #[serde(default = "default_send_attempts")]
    pub send_attempts: u32,

    /// Delay between recipients in a bulk send, milliseconds.
    #[serde(default = "default_bulk_delay_ms")]
    pub bulk_delay_ms: u64,

    /// Fixed acknowledgment auto-reply sent for inbound messages.
    #[serde(default = "default_auto_reply")]
    pub auto_reply: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            default_country_code: default_country_code(),
            qr_wait_secs: default_qr_wait_secs(),
            send_attempts: default_send_attempts(),
            bulk_delay_ms: default_bulk_delay_ms(),
            auto_reply: default_auto_reply(),
        }
    }
}

fn default_country_code() -> String {
    "91".to_string()
}

fn default_qr_wait_secs() -> u64 {
    30
}

fn default_send_attempts() -> u32 {
    3
}

fn default_bulk_delay_ms() -> u64 {
    300
}

fn default_auto_reply() -> String {
    "Thanks for your message! We'll get back to you shortly.".to_string()
}

/// Bulk resynchronization and retention configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    /// Minimum seconds between reconciliation passes per tenant.
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: i64,

    /// Interval of the background sweep over all healthy sessions, seconds.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Messages retained per tenant after each send/sync batch. This is a
    /// hard, lossy cap: older history is not recoverable.
    #[serde(default = "default_retention")]
    pub retention: usize,

    /// Messages fetched per conversation during a reconcile pass.
    #[serde(default = "default_fetch_window")]
    pub fetch_window: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: default_cooldown_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            retention: default_retention(),
            fetch_window: default_fetch_window(),
        }
    }
}

fn default_cooldown_secs() -> i64 {
    300
}

fn default_sweep_interval_secs() -> u64 {
    600
}

fn default_retention() -> usize {
    20
}

fn default_fetch_window() -> usize {
    50
}
