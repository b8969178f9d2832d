// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator trait definitions for the Courier core.
//!
//! All traits use `#[async_trait]` for dynamic dispatch compatibility.

pub mod blobs;
pub mod fanout;
pub mod provider;
pub mod sink;

pub use blobs::BlobStore;
pub use fanout::FanoutChannel;
pub use provider::{ProviderConnection, ProviderFactory};
pub use sink::ProviderEventSink;
