// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end pipeline tests over the fully wired stack: registry, store,
//! ledger, reconciler, inbound handler, and send pipeline, with a scripted
//! provider and a capturing fan-out bus.

use std::sync::Arc;

use courier_config::ProviderConfig;
use courier_core::traits::{BlobStore, FanoutChannel, ProviderEventSink, ProviderFactory};
use courier_core::types::{
    DeliveryStatus, FanoutEvent, MessageDirection, ProviderEvent, SessionStatus,
};
use courier_core::CourierError;
use courier_ledger::CreditLedger;
use courier_messaging::reconcile::Reconciler;
use courier_messaging::{InboundHandler, MessageStore, SendPipeline};
use courier_session::SessionRegistry;
use courier_storage::queries::{messages, sessions};
use courier_storage::Database;
use courier_test_utils::{
    provider_message, seed_tenant, test_database, CapturingBus, MemoryBlobStore, MockProvider,
    MockProviderFactory,
};

const AUTO_REPLY: &str = "Thanks, we got your message.";

struct App {
    db: Database,
    registry: Arc<SessionRegistry>,
    pipeline: SendPipeline,
    ledger: CreditLedger,
    reconciler: Arc<Reconciler>,
    factory: Arc<MockProviderFactory>,
    bus: Arc<CapturingBus>,
    _dir: tempfile::TempDir,
}

async fn app() -> App {
    courier_test_utils::init_tracing();
    let (db, dir) = test_database().await;
    seed_tenant(&db, "t1", 0).await;

    let factory = Arc::new(MockProviderFactory::new());
    let bus = Arc::new(CapturingBus::new());
    let blobs: Arc<dyn BlobStore> = Arc::new(MemoryBlobStore::new());

    let registry = Arc::new(SessionRegistry::new(
        db.clone(),
        Arc::clone(&factory) as Arc<dyn ProviderFactory>,
        Arc::clone(&bus) as Arc<dyn FanoutChannel>,
        Arc::clone(&blobs),
        5,
    ));
    let store = Arc::new(MessageStore::new(db.clone(), blobs, 20));
    let ledger = CreditLedger::new(db.clone());
    // Zero cooldown so every test pass reconciles when asked to.
    let reconciler = Arc::new(Reconciler::new(db.clone(), Arc::clone(&store), 0, 50));
    let handler = Arc::new(InboundHandler::new(
        Arc::clone(&store),
        Arc::clone(&reconciler),
        Arc::clone(&bus) as Arc<dyn FanoutChannel>,
        AUTO_REPLY.to_string(),
    ));
    registry.set_sink(handler as Arc<dyn ProviderEventSink>);

    let config = ProviderConfig {
        default_country_code: "91".to_string(),
        qr_wait_secs: 5,
        send_attempts: 3,
        bulk_delay_ms: 0,
        auto_reply: AUTO_REPLY.to_string(),
    };
    let pipeline = SendPipeline::new(
        Arc::clone(&registry),
        Arc::clone(&store),
        ledger.clone(),
        Arc::clone(&reconciler),
        Arc::clone(&bus) as Arc<dyn FanoutChannel>,
        &config,
    );

    App {
        db,
        registry,
        pipeline,
        ledger,
        reconciler,
        factory,
        bus,
        _dir: dir,
    }
}

async fn connected_provider(app: &App) -> Arc<MockProvider> {
    let provider = MockProvider::ready();
    app.factory.script("t1", Arc::clone(&provider));
    app.registry.connect("t1").await.unwrap();
    sessions::set_me_number(&app.db, "t1", "me@c.us").await.unwrap();
    provider
}

#[tokio::test]
async fn send_with_exactly_one_credit_succeeds_and_drains_the_balance() {
    let app = app().await;
    let provider = connected_provider(&app).await;
    app.ledger.credit("t1", 1, None).await.unwrap();

    let stored = app.pipeline.send_one("t1", "9876543210", "hello").await.unwrap();

    assert_eq!(stored.direction, MessageDirection::Outbound);
    assert_eq!(stored.status, DeliveryStatus::Sent);
    assert_eq!(stored.to_addr, "919876543210@c.us");
    assert_eq!(app.ledger.balance("t1").await.unwrap(), 0);
    assert_eq!(
        provider.sent_messages(),
        vec![("919876543210@c.us".to_string(), "hello".to_string())]
    );
    assert!(app
        .bus
        .events_for("t1")
        .iter()
        .any(|e| matches!(e, FanoutEvent::MessageSent { .. })));

    let page = app.ledger.history("t1", 10, 0).await.unwrap();
    assert_eq!(page.total, 2); // the credit and the debit
}

#[tokio::test]
async fn send_with_zero_balance_is_rejected_before_the_provider() {
    let app = app().await;
    let provider = connected_provider(&app).await;

    let err = app.pipeline.send_one("t1", "9876543210", "hello").await.unwrap_err();
    assert!(matches!(
        err,
        CourierError::InsufficientCredits {
            required: 1,
            available: 0
        }
    ));
    assert!(provider.sent_messages().is_empty());
    assert_eq!(messages::count_for_tenant(&app.db, "t1").await.unwrap(), 0);
    assert_eq!(app.ledger.history("t1", 10, 0).await.unwrap().total, 0);
}

#[tokio::test]
async fn live_event_then_reconcile_stores_one_row() {
    let app = app().await;
    let provider = connected_provider(&app).await;

    // MSG1 arrives on the live stream...
    let msg = provider_message("MSG1", "919876543210@c.us", "hi there", 1_700_000_000);
    provider.emit(ProviderEvent::Message(msg.clone()));
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert!(messages::exists(&app.db, "t1", "MSG1").await.unwrap());

    // ...and again in the provider's history during the next sweep.
    provider.set_conversations(&["919876543210@c.us"]);
    provider.set_recent_messages("919876543210@c.us", vec![msg]);
    let handles = app.registry.active_handles();
    let (_, conn) = handles.first().expect("live handle");
    let report = app.reconciler.reconcile("t1", conn).await.unwrap();

    assert!(report.ran);
    assert_eq!(report.inserted, 0);
    assert_eq!(report.skipped, 1);
    assert_eq!(messages::count_for_tenant(&app.db, "t1").await.unwrap(), 1);
}

#[tokio::test]
async fn delivery_ack_advances_status_and_unknown_ids_are_ignored() {
    let app = app().await;
    let provider = connected_provider(&app).await;
    app.ledger.credit("t1", 1, None).await.unwrap();
    let stored = app.pipeline.send_one("t1", "9876543210", "hello").await.unwrap();

    provider.emit(ProviderEvent::Ack {
        provider_message_id: stored.provider_message_id.clone(),
        code: 2,
    });
    provider.emit(ProviderEvent::Ack {
        provider_message_id: "never-seen".to_string(),
        code: 2,
    });
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    let row = messages::get_by_provider_id(&app.db, "t1", &stored.provider_message_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.status, DeliveryStatus::Delivered);
    assert_eq!(messages::count_for_tenant(&app.db, "t1").await.unwrap(), 1);
}

#[tokio::test]
async fn bulk_send_needs_the_full_batch_to_be_affordable() {
    let app = app().await;
    let provider = connected_provider(&app).await;
    app.ledger.credit("t1", 2, None).await.unwrap();

    let addresses: Vec<String> = ["9876543210", "9876543211", "9876543212"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let err = app.pipeline.send_bulk("t1", &addresses, "promo").await.unwrap_err();

    assert!(matches!(
        err,
        CourierError::InsufficientCredits {
            required: 3,
            available: 2
        }
    ));
    assert!(provider.sent_messages().is_empty());
    assert_eq!(app.ledger.balance("t1").await.unwrap(), 2);
    // Only the seeding credit is on the ledger.
    assert_eq!(app.ledger.history("t1", 10, 0).await.unwrap().total, 1);
}

#[tokio::test]
async fn bulk_send_charges_only_for_successes() {
    let app = app().await;
    let provider = connected_provider(&app).await;
    app.ledger.credit("t1", 3, None).await.unwrap();
    // The second recipient fails with a non-retryable error.
    provider.push_send_failure(CourierError::Provider {
        message: "number not registered".to_string(),
        source: None,
    });

    let addresses: Vec<String> = ["9876543210", "9876543211", "9876543212"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    // The scripted failure hits the first send in line.
    let report = app.pipeline.send_bulk("t1", &addresses, "promo").await.unwrap();

    assert_eq!(report.summary.total, 3);
    assert_eq!(report.summary.successful, 2);
    assert_eq!(report.summary.failed, 1);
    assert_eq!(report.summary.credits_used, 2);
    assert_eq!(report.summary.credits_remaining, 1);
    assert!(!report.results[0].succeeded());
    assert!(report.results[1].succeeded());
    assert!(report.results[2].succeeded());
    assert_eq!(app.ledger.balance("t1").await.unwrap(), 1);
    assert_eq!(messages::count_for_tenant(&app.db, "t1").await.unwrap(), 2);
}

#[tokio::test(start_paused = true)]
async fn chat_unavailable_failures_are_retried() {
    let app = app().await;
    let provider = connected_provider(&app).await;
    app.ledger.credit("t1", 1, None).await.unwrap();
    provider.push_send_failure(CourierError::Provider {
        message: "Chat not found".to_string(),
        source: None,
    });
    provider.push_send_failure(CourierError::Provider {
        message: "Chat not found".to_string(),
        source: None,
    });

    let stored = app.pipeline.send_one("t1", "9876543210", "hello").await.unwrap();
    assert_eq!(stored.status, DeliveryStatus::Sent);
    assert_eq!(provider.sent_messages().len(), 1);
    assert_eq!(app.ledger.balance("t1").await.unwrap(), 0);
}

#[tokio::test]
async fn non_retryable_failures_cost_and_store_nothing() {
    let app = app().await;
    let provider = connected_provider(&app).await;
    app.ledger.credit("t1", 1, None).await.unwrap();
    provider.push_send_failure(CourierError::Provider {
        message: "Session closed".to_string(),
        source: None,
    });

    let err = app.pipeline.send_one("t1", "9876543210", "hello").await.unwrap_err();
    assert!(matches!(err, CourierError::Provider { .. }));
    assert_eq!(app.ledger.balance("t1").await.unwrap(), 1);
    assert_eq!(messages::count_for_tenant(&app.db, "t1").await.unwrap(), 0);
    assert!(!app
        .bus
        .events_for("t1")
        .iter()
        .any(|e| matches!(e, FanoutEvent::MessageSent { .. })));
}

#[tokio::test]
async fn sends_keep_the_retention_cap() {
    let app = app().await;
    connected_provider(&app).await;
    app.ledger.credit("t1", 30, None).await.unwrap();

    for i in 0..25 {
        app.pipeline
            .send_one("t1", "9876543210", &format!("msg {i}"))
            .await
            .unwrap();
    }
    assert!(messages::count_for_tenant(&app.db, "t1").await.unwrap() <= 20);
    assert_eq!(app.ledger.balance("t1").await.unwrap(), 5);
}

#[tokio::test]
async fn disconnect_purges_and_the_session_row_goes_away() {
    let app = app().await;
    let provider = connected_provider(&app).await;

    let msg = provider_message("MSG1", "919876543210@c.us", "hi", 1_700_000_000);
    provider.emit(ProviderEvent::Message(msg));
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    app.registry.disconnect("t1").await.unwrap();
    assert!(sessions::get_for_tenant(&app.db, "t1").await.unwrap().is_none());
    assert_eq!(messages::count_for_tenant(&app.db, "t1").await.unwrap(), 0);

    let err = app.pipeline.send_one("t1", "9876543210", "hello").await.unwrap_err();
    // A fresh handle is opened on demand, so the failure is the zero
    // balance, not a missing session.
    assert!(matches!(err, CourierError::InsufficientCredits { .. }));
}

#[tokio::test]
async fn send_through_a_pairing_session_is_rejected_uncharged() {
    let app = app().await;
    app.ledger.credit("t1", 1, None).await.unwrap();

    let pairing = MockProvider::connecting();
    pairing.set_qr("QR");
    app.factory.script("t1", Arc::clone(&pairing));
    app.registry.connect("t1").await.unwrap();
    // The on-demand replacement is still waiting for its own pairing.
    app.factory.script("t1", MockProvider::connecting());

    let err = app.pipeline.send_one("t1", "9876543210", "hello").await.unwrap_err();
    assert!(matches!(err, CourierError::NotConnected { .. }));
    assert!(pairing.sent_messages().is_empty());
    assert_eq!(app.ledger.balance("t1").await.unwrap(), 1);
    assert_eq!(messages::count_for_tenant(&app.db, "t1").await.unwrap(), 0);
}

#[tokio::test]
async fn message_sent_fan_out_reaches_a_live_subscriber() {
    courier_test_utils::init_tracing();
    let (db, _dir) = test_database().await;
    seed_tenant(&db, "t1", 1).await;

    let factory = Arc::new(MockProviderFactory::new());
    let bus = Arc::new(courier_bus::BroadcastBus::new());
    let blobs: Arc<dyn BlobStore> = Arc::new(MemoryBlobStore::new());
    let registry = Arc::new(SessionRegistry::new(
        db.clone(),
        Arc::clone(&factory) as Arc<dyn ProviderFactory>,
        Arc::clone(&bus) as Arc<dyn FanoutChannel>,
        Arc::clone(&blobs),
        5,
    ));
    let store = Arc::new(MessageStore::new(db.clone(), blobs, 20));
    let ledger = CreditLedger::new(db.clone());
    let reconciler = Arc::new(Reconciler::new(db.clone(), Arc::clone(&store), 0, 50));
    let config = ProviderConfig {
        default_country_code: "91".to_string(),
        qr_wait_secs: 5,
        send_attempts: 3,
        bulk_delay_ms: 0,
        auto_reply: AUTO_REPLY.to_string(),
    };
    let pipeline = SendPipeline::new(
        Arc::clone(&registry),
        Arc::clone(&store),
        ledger,
        reconciler,
        Arc::clone(&bus) as Arc<dyn FanoutChannel>,
        &config,
    );

    let mut rx = bus.subscribe("t1");
    factory.script("t1", MockProvider::ready());
    registry.connect("t1").await.unwrap();
    pipeline.send_one("t1", "9876543210", "hello").await.unwrap();

    let event = tokio::time::timeout(std::time::Duration::from_secs(5), rx.recv())
        .await
        .expect("fan-out event within the window")
        .unwrap();
    let FanoutEvent::MessageSent { message } = event else {
        panic!("expected message_sent, got {event:?}");
    };
    assert_eq!(message.to, "919876543210@c.us");
    assert_eq!(message.body, "hello");
}

#[tokio::test]
async fn authenticated_event_triggers_the_resync() {
    let app = app().await;
    let provider = MockProvider::connecting();
    provider.set_qr("QR");
    provider.set_conversations(&["919876543210@c.us"]);
    provider.set_recent_messages(
        "919876543210@c.us",
        vec![provider_message("H1", "919876543210@c.us", "old", 1_700_000_000)],
    );
    app.factory.script("t1", Arc::clone(&provider));
    app.registry.connect("t1").await.unwrap();

    provider.set_state(courier_core::types::ProviderState::Ready);
    provider.emit(ProviderEvent::Authenticated {
        me_number: "me@c.us".to_string(),
    });
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    assert!(messages::exists(&app.db, "t1", "H1").await.unwrap());
    let session = sessions::get_for_tenant(&app.db, "t1").await.unwrap().unwrap();
    assert_eq!(session.status, SessionStatus::Active);
}
