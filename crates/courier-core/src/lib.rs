// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Courier messaging backend.
//!
//! This crate provides the foundational trait definitions, error types, and
//! domain types used throughout the Courier workspace: the message lifecycle
//! types, the opaque provider connection boundary, the fan-out and blob
//! store collaborator traits, and the event sink seam between the session
//! registry and the messaging layer.

pub mod error;
pub mod traits;
pub mod types;

pub use error::CourierError;
pub use traits::{
    BlobStore, FanoutChannel, ProviderConnection, ProviderEventSink, ProviderFactory,
};
pub use types::{
    DeliveryStatus, FanoutEvent, LedgerKind, MessageDirection, MessageType, ProviderEvent,
    ProviderMessage, ProviderReceipt, ProviderState, SessionStatus, StoredMessage,
};
