//! Signal lifecycle tests
//!
//! These tests drive the controller end to end against in-memory doubles:
//! 1. Single active signal per owner (busy path, concurrent requests)
//! 2. Delayed resolution after 90s, stats and registry updates
//! 3. Best-effort resolution when rendering/delivery fails
//! 4. Daily digest drain
//!
//! Timers run on tokio's paused clock, so the 90s delays complete instantly.
//!
//! Run with: cargo test --test signal_lifecycle_tests

use async_trait::async_trait;
use aviator_signal_bot::digest::deliver_digest;
use aviator_signal_bot::lifecycle::{RequestOutcome, SignalController, SignalState, BUSY_TEXT, ISSUED_CAPTION};
use aviator_signal_bot::registry::SignalRegistry;
use aviator_signal_bot::render::{ImageRenderer, RenderError, TextColor};
use aviator_signal_bot::stats::StatsStore;
use aviator_signal_bot::transport::{ChatTransport, MessageHandle, OwnerId, TransportError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

// ============================================================================
// TEST DOUBLES
// ============================================================================

#[derive(Default)]
struct RecordingTransport {
    next_id: AtomicI64,
    fail: AtomicBool,
    texts: Mutex<Vec<(OwnerId, String, MessageHandle)>>,
    photos: Mutex<Vec<(OwnerId, String, MessageHandle)>>,
    deleted: Mutex<Vec<(OwnerId, MessageHandle)>>,
}

impl RecordingTransport {
    fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    fn check(&self, method: &'static str) -> Result<MessageHandle, TransportError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(TransportError::Api {
                method,
                description: "transport down".to_string(),
            });
        }
        Ok(MessageHandle(self.next_id.fetch_add(1, Ordering::SeqCst) + 100))
    }

    fn photo_captions(&self, owner: OwnerId) -> Vec<String> {
        self.photos
            .lock()
            .iter()
            .filter(|(o, _, _)| *o == owner)
            .map(|(_, caption, _)| caption.clone())
            .collect()
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn send_text(&self, owner: OwnerId, text: &str) -> Result<MessageHandle, TransportError> {
        let handle = self.check("sendMessage")?;
        self.texts.lock().push((owner, text.to_string(), handle));
        Ok(handle)
    }

    async fn send_photo(&self, owner: OwnerId, image: Vec<u8>, caption: &str) -> Result<MessageHandle, TransportError> {
        assert!(!image.is_empty());
        let handle = self.check("sendPhoto")?;
        self.photos.lock().push((owner, caption.to_string(), handle));
        Ok(handle)
    }

    async fn delete_message(&self, owner: OwnerId, message: MessageHandle) -> Result<(), TransportError> {
        self.check("deleteMessage")?;
        self.deleted.lock().push((owner, message));
        Ok(())
    }
}

#[derive(Default)]
struct StubRenderer {
    fail: AtomicBool,
}

impl ImageRenderer for StubRenderer {
    fn render(&self, text: &str, _color: TextColor) -> Result<Vec<u8>, RenderError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(RenderError::Worker("renderer down".to_string()));
        }
        Ok(text.as_bytes().to_vec())
    }
}

struct Harness {
    controller: Arc<SignalController>,
    registry: Arc<SignalRegistry>,
    stats: Arc<StatsStore>,
    transport: Arc<RecordingTransport>,
    renderer: Arc<StubRenderer>,
}

fn harness() -> Harness {
    let registry = Arc::new(SignalRegistry::new());
    let stats = Arc::new(StatsStore::new());
    let transport = Arc::new(RecordingTransport::default());
    let renderer = Arc::new(StubRenderer::default());
    let controller = Arc::new(SignalController::new(
        registry.clone(),
        stats.clone(),
        transport.clone(),
        renderer.clone(),
    ));
    Harness {
        controller,
        registry,
        stats,
        transport,
        renderer,
    }
}

const A: OwnerId = OwnerId(1001);
const B: OwnerId = OwnerId(2002);

// ============================================================================
// SINGLE ACTIVE SIGNAL
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_busy_until_resolution() {
    let h = harness();

    let RequestOutcome::Issued(issued) = h.controller.handle_request(A, None).await else {
        panic!("first request should issue a signal");
    };
    assert!(h.registry.is_active(A));
    assert_eq!(h.controller.state(A), SignalState::Pending);

    let second = h.controller.handle_request(A, None).await;
    assert!(matches!(second, RequestOutcome::Busy { warning: Some(_), .. }));
    assert_eq!(h.registry.active_count(), 1);

    let report = issued.resolution.await.unwrap();
    assert!(!h.registry.is_active(A));
    assert_eq!(h.controller.state(A), SignalState::Idle);

    let stats = h.stats.get(A).unwrap();
    assert_eq!(stats.total(), 1);
    if report.is_win {
        assert_eq!(stats.wins, 1);
    } else {
        assert_eq!(stats.losses, 1);
    }
}

#[tokio::test(start_paused = true)]
async fn test_busy_warning_deleted_after_delay() {
    let h = harness();
    let _first = h.controller.handle_request(A, None).await;

    let RequestOutcome::Busy { warning: Some(warning), cleanup: Some(cleanup) } =
        h.controller.handle_request(A, None).await
    else {
        panic!("second request should be rejected with a warning");
    };

    let texts = h.transport.texts.lock().clone();
    assert_eq!(texts, vec![(A, BUSY_TEXT.to_string(), warning)]);

    let start = Instant::now();
    cleanup.await.unwrap();
    assert!(start.elapsed() >= Duration::from_secs(90));
    assert!(h.transport.deleted.lock().contains(&(A, warning)));
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_requests_same_owner_issue_once() {
    let h = harness();

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let controller = h.controller.clone();
            tokio::spawn(async move { controller.handle_request(A, None).await })
        })
        .collect();

    let mut issued = Vec::new();
    let mut busy = 0;
    for handle in handles {
        match handle.await.unwrap() {
            RequestOutcome::Issued(signal) => issued.push(signal),
            RequestOutcome::Busy { .. } => busy += 1,
            RequestOutcome::Failed => panic!("no failure expected"),
        }
    }
    assert_eq!(issued.len(), 1);
    assert_eq!(busy, 9);

    for signal in issued {
        signal.resolution.await.unwrap();
    }
    assert_eq!(h.stats.get(A).unwrap().total(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_owner_can_request_again_after_resolution() {
    let h = harness();

    for round in 1..=3u64 {
        let RequestOutcome::Issued(issued) = h.controller.handle_request(A, None).await else {
            panic!("round {} should issue", round);
        };
        issued.resolution.await.unwrap();
        assert_eq!(h.stats.get(A).unwrap().total(), round);
    }
}

// ============================================================================
// RESOLUTION
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_resolution_fires_after_ninety_seconds() {
    let h = harness();
    let start = Instant::now();

    let RequestOutcome::Issued(issued) = h.controller.handle_request(A, None).await else {
        panic!("expected issued signal");
    };
    assert!(issued.signal.odds.scale() == 2);

    tokio::time::sleep(Duration::from_secs(89)).await;
    assert!(h.registry.is_active(A), "must still be pending before 90s");
    assert!(h.stats.get(A).is_none());

    issued.resolution.await.unwrap();
    assert!(start.elapsed() >= Duration::from_secs(90));
    assert!(!h.registry.is_active(A));
}

#[tokio::test(start_paused = true)]
async fn test_resolution_cleans_up_and_sends_result() {
    let h = harness();
    let request = MessageHandle(7);

    let RequestOutcome::Issued(issued) = h.controller.handle_request(A, Some(request)).await else {
        panic!("expected issued signal");
    };
    let report = issued.resolution.await.unwrap();

    assert!(report.result_delivered);
    assert_eq!(report.messages_deleted, 2);
    let deleted = h.transport.deleted.lock().clone();
    assert_eq!(deleted, vec![(A, issued.issued_message), (A, request)]);

    let captions = h.transport.photo_captions(A);
    assert_eq!(captions.len(), 2);
    assert_eq!(captions[0], ISSUED_CAPTION);

    let expected_head = if report.is_win { "🎉 WIN!✅" } else { "❌ LOSE!" };
    assert!(captions[1].starts_with(expected_head));
    assert!(captions[1].contains(&format!("{}x", issued.signal.odds)));
    assert!(captions[1].ends_with("users placed their bets on this signal."));
}

#[tokio::test(start_paused = true)]
async fn test_two_owners_resolve_independently() {
    let h = harness();

    let (a, b) = tokio::join!(
        h.controller.handle_request(A, None),
        h.controller.handle_request(B, None)
    );
    let (RequestOutcome::Issued(a), RequestOutcome::Issued(b)) = (a, b) else {
        panic!("both owners should get a signal");
    };
    assert_eq!(h.registry.active_count(), 2);

    let report_a = a.resolution.await.unwrap();
    let report_b = b.resolution.await.unwrap();

    assert_eq!(report_a.owner, A);
    assert_eq!(report_b.owner, B);
    assert_eq!(h.stats.get(A).unwrap().total(), 1);
    assert_eq!(h.stats.get(B).unwrap().total(), 1);
    assert_eq!(h.stats.get(A).unwrap().wins == 1, a.signal.is_win);
    assert_eq!(h.stats.get(B).unwrap().wins == 1, b.signal.is_win);
    assert_eq!(h.registry.active_count(), 0);
}

// ============================================================================
// BEST-EFFORT FAILURE HANDLING
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_transport_failure_still_records_and_releases() {
    let h = harness();

    let RequestOutcome::Issued(issued) = h.controller.handle_request(A, None).await else {
        panic!("expected issued signal");
    };
    h.transport.set_failing(true);

    let report = issued.resolution.await.unwrap();
    assert!(!report.result_delivered);
    assert_eq!(report.messages_deleted, 0);
    assert_eq!(report.stats.total(), 1);
    assert_eq!(h.stats.get(A).unwrap().total(), 1);
    assert!(!h.registry.is_active(A));
}

#[tokio::test(start_paused = true)]
async fn test_render_failure_still_records_and_releases() {
    let h = harness();

    let RequestOutcome::Issued(issued) = h.controller.handle_request(A, None).await else {
        panic!("expected issued signal");
    };
    h.renderer.fail.store(true, Ordering::SeqCst);

    let report = issued.resolution.await.unwrap();
    assert!(!report.result_delivered);
    assert_eq!(report.messages_deleted, 1);
    assert_eq!(h.stats.get(A).unwrap().total(), 1);
    assert!(!h.registry.is_active(A));
    assert_eq!(h.transport.photo_captions(A).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_issue_failure_leaves_owner_idle() {
    let h = harness();
    h.renderer.fail.store(true, Ordering::SeqCst);

    let outcome = h.controller.handle_request(A, None).await;
    assert!(matches!(outcome, RequestOutcome::Failed));
    assert!(!h.registry.is_active(A));
    assert!(h.stats.is_empty());

    h.renderer.fail.store(false, Ordering::SeqCst);
    assert!(matches!(
        h.controller.handle_request(A, None).await,
        RequestOutcome::Issued(_)
    ));
}

#[tokio::test(start_paused = true)]
async fn test_busy_warning_send_failure_is_swallowed() {
    let h = harness();
    let _first = h.controller.handle_request(A, None).await;
    h.transport.set_failing(true);

    let outcome = h.controller.handle_request(A, None).await;
    assert!(matches!(outcome, RequestOutcome::Busy { warning: None, cleanup: None }));
    assert!(h.registry.is_active(A));
}

// ============================================================================
// DAILY DIGEST
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_digest_drains_store() {
    let h = harness();

    for owner in [A, B] {
        let RequestOutcome::Issued(issued) = h.controller.handle_request(owner, None).await else {
            panic!("expected issued signal");
        };
        issued.resolution.await.unwrap();
    }

    let sent = deliver_digest(&h.stats, h.transport.as_ref()).await;
    assert_eq!(sent, 2);
    assert!(h.stats.is_empty());

    let texts = h.transport.texts.lock().clone();
    assert_eq!(texts.len(), 2);
    assert_eq!(texts[0].0, A);
    assert_eq!(texts[1].0, B);
    assert!(texts.iter().all(|(_, text, _)| text.starts_with("📊 Daily Stats:")));

    let again = deliver_digest(&h.stats, h.transport.as_ref()).await;
    assert_eq!(again, 0);
    assert_eq!(h.transport.texts.lock().len(), 2);
}

#[tokio::test]
async fn test_digest_send_failure_still_clears() {
    let h = harness();
    h.stats.record(A, true);
    h.stats.record(B, false);
    h.transport.set_failing(true);

    let sent = deliver_digest(&h.stats, h.transport.as_ref()).await;
    assert_eq!(sent, 0);
    assert!(h.stats.is_empty());
}
