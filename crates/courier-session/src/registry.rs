// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tenant session registry.
//!
//! One provider connection handle exists per tenant. The registry owns the
//! handle cache, drives lifecycle state into the database, runs a background
//! event pump per handle, and recovers sessions after a restart. Message and
//! ack traffic is delegated to the [`ProviderEventSink`] installed by the
//! messaging layer.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use courier_core::traits::{
    BlobStore, FanoutChannel, ProviderConnection, ProviderEventSink, ProviderFactory,
};
use courier_core::types::{FanoutEvent, ProviderEvent, ProviderState, SessionStatus};
use courier_core::CourierError;
use courier_storage::queries::{messages, sessions};
use courier_storage::Database;
use dashmap::DashMap;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

/// How long recovery waits before kicking the post-reconnect resync, giving
/// the provider handle time to finish authenticating.
const RECOVERY_RESYNC_DELAY: Duration = Duration::from_secs(10);

/// Result of a connect call that did not time out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// A pairing QR artifact is ready for the tenant to scan.
    QrCode(String),
    /// The session authenticated without needing a fresh pairing.
    Authenticated,
}

pub struct SessionRegistry {
    db: Database,
    factory: Arc<dyn ProviderFactory>,
    bus: Arc<dyn FanoutChannel>,
    blobs: Arc<dyn BlobStore>,
    qr_wait_secs: u64,
    handles: DashMap<String, Arc<dyn ProviderConnection>>,
    sink: OnceLock<Arc<dyn ProviderEventSink>>,
}

impl SessionRegistry {
    pub fn new(
        db: Database,
        factory: Arc<dyn ProviderFactory>,
        bus: Arc<dyn FanoutChannel>,
        blobs: Arc<dyn BlobStore>,
        qr_wait_secs: u64,
    ) -> Self {
        Self {
            db,
            factory,
            bus,
            blobs,
            qr_wait_secs,
            handles: DashMap::new(),
            sink: OnceLock::new(),
        }
    }

    /// Install the event sink. Must be called once, before any connection is
    /// opened; later calls are ignored.
    pub fn set_sink(&self, sink: Arc<dyn ProviderEventSink>) {
        if self.sink.set(sink).is_err() {
            warn!("event sink already installed, ignoring");
        }
    }

    /// Open a provider session for the tenant and wait for a pairing QR.
    ///
    /// Polls the new handle once a second for up to the configured wait
    /// window. On timeout the handle keeps connecting in the background; a
    /// later connect attempt or `ensure_healthy` picks it up.
    pub async fn connect(self: &Arc<Self>, tenant_id: &str) -> Result<ConnectOutcome, CourierError> {
        if let Some(handle) = self.handles.get(tenant_id) {
            if handle.state() == ProviderState::Ready {
                return Err(CourierError::AlreadyConnected {
                    tenant_id: tenant_id.to_string(),
                });
            }
        }
        // A stale non-ready handle is replaced wholesale.
        if let Some((_, old)) = self.handles.remove(tenant_id) {
            if let Err(e) = old.destroy().await {
                warn!(tenant_id, error = %e, "failed to destroy stale handle");
            }
        }

        let conn = self.factory.open(tenant_id).await?;
        sessions::upsert_status(&self.db, tenant_id, SessionStatus::Pending).await?;
        self.handles.insert(tenant_id.to_string(), Arc::clone(&conn));
        self.spawn_pump(tenant_id.to_string(), Arc::clone(&conn));
        info!(tenant_id, "provider session opening");

        for _ in 0..self.qr_wait_secs {
            if conn.state() == ProviderState::Ready {
                return Ok(ConnectOutcome::Authenticated);
            }
            if let Some(qr) = conn.qr_code().await {
                return Ok(ConnectOutcome::QrCode(qr));
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        warn!(tenant_id, "pairing QR did not arrive in time");
        Err(CourierError::QrTimeout {
            duration: Duration::from_secs(self.qr_wait_secs),
        })
    }

    /// Tear down the tenant's session and purge its stored traffic: session
    /// rows, messages, attachments, and their media blobs all go.
    pub async fn disconnect(&self, tenant_id: &str) -> Result<(), CourierError> {
        if let Some((_, handle)) = self.handles.remove(tenant_id) {
            if let Err(e) = handle.logout().await {
                warn!(tenant_id, error = %e, "provider logout failed");
            }
            if let Err(e) = handle.destroy().await {
                warn!(tenant_id, error = %e, "provider teardown failed");
            }
        }
        sessions::delete_for_tenant(&self.db, tenant_id).await?;
        let purged_keys = messages::delete_all_for_tenant(&self.db, tenant_id).await?;
        for key in &purged_keys {
            if let Err(e) = self.blobs.delete(key).await {
                warn!(tenant_id, key, error = %e, "purged blob delete failed");
            }
        }
        info!(tenant_id, blobs = purged_keys.len(), "session disconnected and traffic purged");
        Ok(())
    }

    /// Return a live, authenticated handle for the tenant, replacing a
    /// non-ready or missing one. Called before every send.
    ///
    /// A handle that is still pairing, disconnected, or dead is destroyed
    /// and reopened; if the fresh handle is not immediately authenticated
    /// it keeps connecting in the background and the caller gets
    /// `NotConnected`.
    pub async fn ensure_healthy(
        self: &Arc<Self>,
        tenant_id: &str,
    ) -> Result<Arc<dyn ProviderConnection>, CourierError> {
        if let Some(handle) = self.handles.get(tenant_id) {
            if handle.state() == ProviderState::Ready {
                return Ok(Arc::clone(&handle));
            }
        }
        let conn = self.reopen(tenant_id).await?;
        if conn.state() != ProviderState::Ready {
            return Err(CourierError::NotConnected {
                tenant_id: tenant_id.to_string(),
            });
        }
        Ok(conn)
    }

    /// Replace the tenant's handle with a freshly opened one, whatever
    /// state it comes up in. The new handle's pump is already running.
    async fn reopen(
        self: &Arc<Self>,
        tenant_id: &str,
    ) -> Result<Arc<dyn ProviderConnection>, CourierError> {
        if let Some((_, stale)) = self.handles.remove(tenant_id) {
            warn!(tenant_id, state = ?stale.state(), "replacing unhealthy provider handle");
            if let Err(e) = stale.destroy().await {
                warn!(tenant_id, error = %e, "failed to destroy unhealthy handle");
            }
        }
        let conn = self.factory.open(tenant_id).await?;
        self.handles.insert(tenant_id.to_string(), Arc::clone(&conn));
        self.spawn_pump(tenant_id.to_string(), Arc::clone(&conn));
        Ok(conn)
    }

    /// Reconnect every tenant whose persisted session was active when the
    /// process last stopped, then schedule a delayed full resync for each.
    ///
    /// Unlike the pre-send health check, recovery tolerates handles that
    /// are still authenticating; the event pump activates them when the
    /// provider catches up.
    pub async fn recover(self: &Arc<Self>) -> Result<usize, CourierError> {
        let active = sessions::list_by_status(&self.db, SessionStatus::Active).await?;
        let mut recovered = 0;
        for session in active {
            let tenant_id = session.tenant_id;
            match self.reopen(&tenant_id).await {
                Ok(conn) => {
                    recovered += 1;
                    let registry = Arc::clone(self);
                    let tenant = tenant_id.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(RECOVERY_RESYNC_DELAY).await;
                        if let Some(sink) = registry.sink.get() {
                            sink.on_authenticated(&tenant, conn).await;
                        }
                    });
                    info!(tenant_id, "session recovered");
                }
                Err(e) => {
                    error!(tenant_id, error = %e, "session recovery failed");
                    sessions::upsert_status(&self.db, &tenant_id, SessionStatus::Failed).await?;
                }
            }
        }
        Ok(recovered)
    }

    /// Snapshot of tenants with a live, authenticated handle.
    pub fn active_handles(&self) -> Vec<(String, Arc<dyn ProviderConnection>)> {
        self.handles
            .iter()
            .filter(|entry| entry.value().state() == ProviderState::Ready)
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect()
    }

    fn spawn_pump(self: &Arc<Self>, tenant_id: String, conn: Arc<dyn ProviderConnection>) {
        let registry = Arc::clone(self);
        let mut rx = conn.subscribe();
        tokio::spawn(async move {
            loop {
                // A replaced handle is destroyed but its implementation may
                // keep the broadcast sender alive, so Closed alone is not a
                // reliable exit signal.
                if conn.state() == ProviderState::Dead {
                    debug!(tenant_id, "handle destroyed, pump exiting");
                    break;
                }
                match rx.recv().await {
                    Ok(event) => {
                        if conn.state() == ProviderState::Dead {
                            debug!(tenant_id, "handle destroyed, pump exiting");
                            break;
                        }
                        registry.handle_event(&tenant_id, &conn, event).await;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(tenant_id, skipped, "event pump lagged, resync will cover");
                    }
                    Err(RecvError::Closed) => {
                        debug!(tenant_id, "event stream closed, pump exiting");
                        break;
                    }
                }
            }
        });
    }

    async fn handle_event(
        self: &Arc<Self>,
        tenant_id: &str,
        conn: &Arc<dyn ProviderConnection>,
        event: ProviderEvent,
    ) {
        match event {
            ProviderEvent::QrReady(qr) => {
                self.publish_status(tenant_id, SessionStatus::Pending, None, Some(qr), None)
                    .await;
            }
            ProviderEvent::Authenticated { me_number } => {
                info!(tenant_id, "session authenticated");
                if let Err(e) =
                    sessions::upsert_status(&self.db, tenant_id, SessionStatus::Active).await
                {
                    error!(tenant_id, error = %e, "failed to persist active session");
                }
                if let Err(e) = sessions::set_me_number(&self.db, tenant_id, &me_number).await {
                    error!(tenant_id, error = %e, "failed to persist me_number");
                }
                self.publish_status(
                    tenant_id,
                    SessionStatus::Active,
                    Some(me_number),
                    None,
                    None,
                )
                .await;
                if let Some(sink) = self.sink.get() {
                    let sink = Arc::clone(sink);
                    let tenant = tenant_id.to_string();
                    let conn = Arc::clone(conn);
                    tokio::spawn(async move {
                        sink.on_authenticated(&tenant, conn).await;
                    });
                }
            }
            ProviderEvent::AuthFailed(reason) => {
                warn!(tenant_id, reason, "session authentication failed");
                if let Err(e) =
                    sessions::upsert_status(&self.db, tenant_id, SessionStatus::Failed).await
                {
                    error!(tenant_id, error = %e, "failed to persist failed session");
                }
                self.publish_status(tenant_id, SessionStatus::Failed, None, None, Some(reason))
                    .await;
            }
            ProviderEvent::Disconnected(reason) => {
                warn!(tenant_id, reason, "session disconnected by provider");
                if let Err(e) =
                    sessions::upsert_status(&self.db, tenant_id, SessionStatus::Disconnected).await
                {
                    error!(tenant_id, error = %e, "failed to persist disconnected session");
                }
                self.publish_status(
                    tenant_id,
                    SessionStatus::Disconnected,
                    None,
                    None,
                    Some(reason),
                )
                .await;
            }
            ProviderEvent::Message(message) => {
                if let Some(sink) = self.sink.get() {
                    sink.on_message(tenant_id, Arc::clone(conn), message).await;
                } else {
                    warn!(tenant_id, "message dropped, no sink installed");
                }
            }
            ProviderEvent::Ack {
                provider_message_id,
                code,
            } => {
                if let Some(sink) = self.sink.get() {
                    sink.on_ack(tenant_id, &provider_message_id, code).await;
                }
            }
        }
    }

    async fn publish_status(
        &self,
        tenant_id: &str,
        status: SessionStatus,
        me_number: Option<String>,
        qr: Option<String>,
        reason: Option<String>,
    ) {
        let event = FanoutEvent::SessionStatus {
            status,
            me_number,
            qr,
            reason,
        };
        if let Err(e) = self.bus.publish(tenant_id, event).await {
            warn!(tenant_id, error = %e, "session status fan-out failed");
        }
    }
}
