// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared across the Courier workspace.
//!
//! Persisted enums use strum `Display`/`EnumString` so the stored text form
//! is the single source of truth; timestamps are ISO 8601 millisecond UTC
//! strings throughout, matching the SQLite `strftime` default columns.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Direction of a stored message relative to the tenant.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageDirection {
    Inbound,
    Outbound,
}

/// Content type of a message as reported by the provider.
///
/// `Notification` covers provider-internal housekeeping messages (encryption
/// notices, group events) which are never persisted.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Chat,
    Image,
    Video,
    Audio,
    Document,
    Sticker,
    Location,
    Notification,
}

impl MessageType {
    /// Types whose payload includes a binary the provider must be asked for.
    pub fn is_media(&self) -> bool {
        matches!(
            self,
            MessageType::Image
                | MessageType::Video
                | MessageType::Audio
                | MessageType::Document
                | MessageType::Sticker
        )
    }

    pub fn is_notification(&self) -> bool {
        matches!(self, MessageType::Notification)
    }
}

/// Delivery state of a message, driven by provider acknowledgment events.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Delivered,
    Read,
    Failed,
}

impl DeliveryStatus {
    /// Monotonic ordering used when applying acknowledgments: a status is
    /// only overwritten by one with a strictly higher rank, and `Failed` is
    /// terminal. A late-arriving "sent" ack can therefore never downgrade an
    /// already-"read" message.
    pub fn rank(&self) -> i64 {
        match self {
            DeliveryStatus::Pending => 0,
            DeliveryStatus::Sent => 1,
            DeliveryStatus::Delivered => 2,
            DeliveryStatus::Read => 3,
            DeliveryStatus::Failed => 4,
        }
    }

    /// Map a provider numeric acknowledgment code to a delivery status.
    ///
    /// Negative codes are provider-side errors; 4 ("played") collapses into
    /// `Read`. Unknown codes return `None` and are ignored by callers.
    pub fn from_ack_code(code: i32) -> Option<DeliveryStatus> {
        match code {
            c if c < 0 => Some(DeliveryStatus::Failed),
            0 => Some(DeliveryStatus::Pending),
            1 => Some(DeliveryStatus::Sent),
            2 => Some(DeliveryStatus::Delivered),
            3 | 4 => Some(DeliveryStatus::Read),
            _ => None,
        }
    }
}

/// Lifecycle state of a tenant's provider session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Pending,
    Active,
    Failed,
    Disconnected,
}

/// Kind of a credit ledger entry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum LedgerKind {
    Increment,
    Decrement,
}

/// A message as persisted in the store.
///
/// Immutable once written except for `status`, which is advanced by
/// acknowledgment events matched on `provider_message_id` (the per-tenant
/// dedup key).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    /// Store-assigned identifier (UUID v4).
    pub id: String,
    pub tenant_id: String,
    pub direction: MessageDirection,
    pub from_addr: String,
    pub to_addr: String,
    pub body: String,
    pub message_type: MessageType,
    /// Provider-assigned message id, unique within a tenant.
    pub provider_message_id: String,
    pub status: DeliveryStatus,
    pub attachment_id: Option<String>,
    /// ISO 8601 timestamp.
    pub created_at: String,
}

/// Metadata for a stored media binary, referenced by at most one message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub id: String,
    pub tenant_id: String,
    pub file_name: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub storage_key: String,
    pub created_at: String,
}

/// A single append-only credit ledger entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: String,
    pub tenant_id: String,
    /// Positive magnitude; `kind` carries the sign.
    pub amount: i64,
    pub kind: LedgerKind,
    pub description: Option<String>,
    pub created_at: String,
}

// --- Provider boundary types ---

/// Confirmation returned by a successful provider send.
#[derive(Debug, Clone)]
pub struct ProviderReceipt {
    /// Provider-assigned message id.
    pub id: String,
    /// Provider-reported send time, epoch seconds.
    pub timestamp: i64,
}

/// One provider-side conversation, identified by the counterpart address.
#[derive(Debug, Clone)]
pub struct ProviderConversation {
    pub address: String,
}

/// A message as observed from the provider, via the live event stream or a
/// bulk resync sweep. The same message may be observed through both paths.
#[derive(Debug, Clone)]
pub struct ProviderMessage {
    pub id: String,
    /// Address of the conversation this message belongs to.
    pub chat: String,
    pub from: String,
    pub to: String,
    pub body: String,
    pub kind: MessageType,
    /// Set when the tenant's own account authored the message.
    pub from_me: bool,
    /// Epoch seconds.
    pub timestamp: i64,
    pub has_media: bool,
}

/// A media binary fetched from the provider.
#[derive(Debug, Clone)]
pub struct ProviderMedia {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Liveness of a provider connection handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderState {
    /// Initializing or waiting for pairing.
    Connecting,
    /// Authenticated and able to send.
    Ready,
    /// Unusable; must be discarded and reinitialized.
    Dead,
}

/// Lifecycle and traffic events emitted by a provider connection.
#[derive(Debug, Clone)]
pub enum ProviderEvent {
    /// A pairing QR artifact is available for scanning.
    QrReady(String),
    /// The account authenticated; `me_number` is the tenant's own address.
    Authenticated { me_number: String },
    AuthFailed(String),
    Disconnected(String),
    Message(ProviderMessage),
    Ack {
        provider_message_id: String,
        code: i32,
    },
}

// --- Fan-out event payloads ---

/// Message fields carried by fan-out events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMessage {
    pub id: String,
    pub provider_message_id: String,
    pub from: String,
    pub to: String,
    pub body: String,
    pub timestamp: String,
    pub message_type: MessageType,
    pub direction: MessageDirection,
}

impl From<&StoredMessage> for EventMessage {
    fn from(m: &StoredMessage) -> Self {
        Self {
            id: m.id.clone(),
            provider_message_id: m.provider_message_id.clone(),
            from: m.from_addr.clone(),
            to: m.to_addr.clone(),
            body: m.body.clone(),
            timestamp: m.created_at.clone(),
            message_type: m.message_type,
            direction: m.direction,
        }
    }
}

/// Events published on the per-tenant fan-out channel.
///
/// The serialized `type` tags are the externally observed wire names and
/// must not change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FanoutEvent {
    #[serde(rename = "message_received")]
    MessageReceived {
        #[serde(flatten)]
        message: EventMessage,
        media_url: Option<String>,
    },
    #[serde(rename = "message_sent")]
    MessageSent {
        #[serde(flatten)]
        message: EventMessage,
    },
    #[serde(rename = "whatsapp_status")]
    SessionStatus {
        status: SessionStatus,
        me_number: Option<String>,
        qr: Option<String>,
        reason: Option<String>,
    },
    #[serde(rename = "auto_reply")]
    AutoReply {
        to: String,
        body: String,
        in_reply_to: String,
    },
}

/// Format an epoch-seconds provider timestamp as a store timestamp.
pub fn epoch_to_iso(epoch_secs: i64) -> String {
    chrono::DateTime::from_timestamp(epoch_secs, 0)
        .unwrap_or_default()
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}

/// Current time as a store timestamp.
pub fn now_iso() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}
