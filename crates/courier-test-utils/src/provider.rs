// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scriptable in-memory provider connection.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use courier_core::traits::{ProviderConnection, ProviderFactory};
use courier_core::types::{
    MessageType, ProviderConversation, ProviderEvent, ProviderMedia, ProviderMessage,
    ProviderReceipt, ProviderState,
};
use courier_core::CourierError;
use tokio::sync::broadcast;

/// A provider connection whose every behavior is scripted by the test.
///
/// Sends succeed with generated receipts unless failures have been queued
/// with [`MockProvider::push_send_failure`]; each queued failure is consumed
/// by exactly one send attempt.
pub struct MockProvider {
    state: Mutex<ProviderState>,
    qr: Mutex<Option<String>>,
    send_failures: Mutex<VecDeque<CourierError>>,
    sent: Mutex<Vec<(String, String)>>,
    conversations: Mutex<Vec<ProviderConversation>>,
    recent: Mutex<HashMap<String, Vec<ProviderMessage>>>,
    media: Mutex<HashMap<String, ProviderMedia>>,
    events: broadcast::Sender<ProviderEvent>,
    next_receipt: AtomicU64,
    destroyed: AtomicBool,
}

impl MockProvider {
    fn with_state(state: ProviderState) -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        Arc::new(Self {
            state: Mutex::new(state),
            qr: Mutex::new(None),
            send_failures: Mutex::new(VecDeque::new()),
            sent: Mutex::new(Vec::new()),
            conversations: Mutex::new(Vec::new()),
            recent: Mutex::new(HashMap::new()),
            media: Mutex::new(HashMap::new()),
            events,
            next_receipt: AtomicU64::new(1),
            destroyed: AtomicBool::new(false),
        })
    }

    /// An authenticated connection that accepts sends.
    pub fn ready() -> Arc<Self> {
        Self::with_state(ProviderState::Ready)
    }

    /// A connection still working through the pairing handshake.
    pub fn connecting() -> Arc<Self> {
        Self::with_state(ProviderState::Connecting)
    }

    pub fn set_state(&self, state: ProviderState) {
        *self.state.lock().unwrap() = state;
    }

    pub fn set_qr(&self, qr: &str) {
        *self.qr.lock().unwrap() = Some(qr.to_string());
    }

    /// Queue an error for the next send attempt. Queue more than one to
    /// fail several consecutive attempts.
    pub fn push_send_failure(&self, err: CourierError) {
        self.send_failures.lock().unwrap().push_back(err);
    }

    /// Every `(address, body)` pair that reached the provider.
    pub fn sent_messages(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn set_conversations(&self, addresses: &[&str]) {
        *self.conversations.lock().unwrap() = addresses
            .iter()
            .map(|a| ProviderConversation {
                address: a.to_string(),
            })
            .collect();
    }

    pub fn set_recent_messages(&self, address: &str, messages: Vec<ProviderMessage>) {
        self.recent
            .lock()
            .unwrap()
            .insert(address.to_string(), messages);
    }

    pub fn set_media(&self, provider_message_id: &str, media: ProviderMedia) {
        self.media
            .lock()
            .unwrap()
            .insert(provider_message_id.to_string(), media);
    }

    /// Push an event into the connection's stream, driving any pump that
    /// subscribed. Dropped silently when nobody is listening.
    pub fn emit(&self, event: ProviderEvent) {
        let _ = self.events.send(event);
    }

    pub fn was_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }
}

/// A plain inbound chat message observed at `timestamp`.
pub fn provider_message(id: &str, chat: &str, body: &str, timestamp: i64) -> ProviderMessage {
    ProviderMessage {
        id: id.to_string(),
        chat: chat.to_string(),
        from: chat.to_string(),
        to: "me".to_string(),
        body: body.to_string(),
        kind: MessageType::Chat,
        from_me: false,
        timestamp,
        has_media: false,
    }
}

#[async_trait]
impl ProviderConnection for MockProvider {
    fn state(&self) -> ProviderState {
        *self.state.lock().unwrap()
    }

    async fn qr_code(&self) -> Option<String> {
        self.qr.lock().unwrap().clone()
    }

    async fn send(&self, address: &str, body: &str) -> Result<ProviderReceipt, CourierError> {
        if let Some(err) = self.send_failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        self.sent
            .lock()
            .unwrap()
            .push((address.to_string(), body.to_string()));
        let n = self.next_receipt.fetch_add(1, Ordering::SeqCst);
        Ok(ProviderReceipt {
            id: format!("mock-receipt-{n}"),
            timestamp: 1_700_000_000 + n as i64,
        })
    }

    async fn conversations(&self) -> Result<Vec<ProviderConversation>, CourierError> {
        Ok(self.conversations.lock().unwrap().clone())
    }

    async fn recent_messages(
        &self,
        address: &str,
        limit: usize,
    ) -> Result<Vec<ProviderMessage>, CourierError> {
        let recent = self.recent.lock().unwrap();
        let mut messages = recent.get(address).cloned().unwrap_or_default();
        messages.truncate(limit);
        Ok(messages)
    }

    async fn fetch_media(
        &self,
        provider_message_id: &str,
    ) -> Result<ProviderMedia, CourierError> {
        self.media
            .lock()
            .unwrap()
            .get(provider_message_id)
            .cloned()
            .ok_or_else(|| CourierError::NotFound {
                what: "media",
                id: provider_message_id.to_string(),
            })
    }

    async fn logout(&self) -> Result<(), CourierError> {
        self.set_state(ProviderState::Dead);
        Ok(())
    }

    async fn destroy(&self) -> Result<(), CourierError> {
        self.set_state(ProviderState::Dead);
        self.destroyed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events.subscribe()
    }
}

/// Hands out scripted connections per tenant; unscripted tenants get a
/// fresh ready connection.
#[derive(Default)]
pub struct MockProviderFactory {
    scripted: Mutex<HashMap<String, VecDeque<Arc<MockProvider>>>>,
    opened: Mutex<Vec<String>>,
}

impl MockProviderFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the connection the next `open` for `tenant_id` will return.
    /// Multiple calls queue connections in order.
    pub fn script(&self, tenant_id: &str, provider: Arc<MockProvider>) {
        self.scripted
            .lock()
            .unwrap()
            .entry(tenant_id.to_string())
            .or_default()
            .push_back(provider);
    }

    /// Tenants passed to `open`, in call order.
    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProviderFactory for MockProviderFactory {
    async fn open(&self, tenant_id: &str) -> Result<Arc<dyn ProviderConnection>, CourierError> {
        self.opened.lock().unwrap().push(tenant_id.to_string());
        let scripted = self
            .scripted
            .lock()
            .unwrap()
            .get_mut(tenant_id)
            .and_then(VecDeque::pop_front);
        Ok(scripted.unwrap_or_else(MockProvider::ready))
    }
}
