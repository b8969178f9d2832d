// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the Courier messaging backend.
//!
//! Layered loading via Figment: compiled defaults, a `courier.toml` file,
//! and `COURIER_*` environment variable overrides.

pub mod loader;
pub mod model;

pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::{CourierConfig, ProviderConfig, StorageConfig, SyncConfig};
