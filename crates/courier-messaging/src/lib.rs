// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message pipeline for the Courier messaging backend: the tenant message
//! store, the bulk reconciler, the credit-gated send pipeline, live inbound
//! handling, and the conversation read models.

pub mod address;
pub mod inbound;
pub mod reads;
pub mod reconcile;
pub mod send;
pub mod store;
pub mod template;

pub use address::to_provider_address;
pub use inbound::InboundHandler;
pub use reads::{ConversationReads, ConversationSummary, InboxSummary};
pub use reconcile::{spawn_sweeper, ReconcileReport, Reconciler};
pub use send::{BulkRecipientResult, BulkReport, BulkSummary, SendFailureKind, SendPipeline};
pub use store::{MessageStore, PersistOutcome};
pub use template::{render, TemplateBulkResult, TemplateSendResult};
