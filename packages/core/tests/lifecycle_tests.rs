//! Comprehensive tests for the ephemeral message lifecycle
//!
//! This test suite covers:
//! - Optimistic send pipeline (confirm / rollback)
//! - View-and-Destroy protocol (atomicity, idempotency, propagation)
//! - Realtime reconciliation (no duplicate display, delete propagation)
//! - Countdown scheduler (TTL-driven local removal)
//! - Scoped resource release (subscriptions and countdowns)

use std::cell::Cell;
use std::rc::Rc;

use vanish_core::protocol::backend::{ChangeFeed, MessageBackend};
use vanish_core::{
    Clock, Conversation, ManualClock, MemoryBackend, Message, MessageDraft, MessagePayload,
    MessengerApi, MessengerBackend, SendState, Subscription, VanishError, ViewOutcome,
};

/// Backend wrapper that can fail the next durable write, for rollback tests
struct FlakyBackend {
    inner: Rc<MemoryBackend>,
    fail_next_save: Cell<bool>,
}

impl FlakyBackend {
    fn new(inner: Rc<MemoryBackend>) -> Self {
        Self {
            inner,
            fail_next_save: Cell::new(false),
        }
    }

    fn fail_next(&self) {
        self.fail_next_save.set(true);
    }
}

impl MessageBackend for FlakyBackend {
    fn save_message(&self, draft: MessageDraft) -> vanish_core::Result<Message> {
        if self.fail_next_save.take() {
            return Err(VanishError::NetworkError(
                "simulated connection reset".to_string(),
            ));
        }
        self.inner.save_message(draft)
    }

    fn mark_viewed(
        &self,
        message_id: &str,
        viewer_id: &str,
    ) -> vanish_core::Result<ViewOutcome> {
        self.inner.mark_viewed(message_id, viewer_id)
    }

    fn mark_read(&self, message_id: &str, reader_id: &str) -> vanish_core::Result<()> {
        self.inner.mark_read(message_id, reader_id)
    }

    fn load_conversation(
        &self,
        conversation_id: &str,
        limit: usize,
        offset: usize,
    ) -> vanish_core::Result<Vec<Message>> {
        self.inner.load_conversation(conversation_id, limit, offset)
    }

    fn get_conversation(&self, conversation_id: &str) -> vanish_core::Result<Conversation> {
        self.inner.get_conversation(conversation_id)
    }
}

impl ChangeFeed for FlakyBackend {
    fn subscribe(&self, conversation_id: &str) -> vanish_core::Result<Subscription> {
        self.inner.subscribe(conversation_id)
    }
}

fn shared_world() -> (Rc<ManualClock>, Rc<MemoryBackend>) {
    vanish_core::utils::logging::init();
    let clock = Rc::new(ManualClock::new(1_000_000));
    let backend = Rc::new(MemoryBackend::new(clock.clone()));
    backend.register_conversation(Conversation::direct("c1", "alice", "bob"));
    backend.register_conversation(Conversation::group(
        "g1",
        ["alice".to_string(), "bob".to_string(), "carol".to_string()],
    ));
    (clock, backend)
}

fn client(
    backend: &Rc<MemoryBackend>,
    clock: &Rc<ManualClock>,
    user_id: &str,
) -> MessengerApi {
    MessengerApi::new(
        backend.clone() as Rc<dyn MessengerBackend>,
        clock.clone() as Rc<dyn Clock>,
        user_id,
    )
}

/// E2E scenario A: ephemeral text lives through confirm and dies by TTL,
/// locally only (the row on the backend outlives the local countdown)
#[test]
fn test_ephemeral_send_confirm_and_ttl_expiry() {
    let (clock, backend) = shared_world();
    let mut alice = client(&backend, &clock, "alice");
    alice.open_conversation("c1").unwrap();

    let id = alice
        .conversation_mut("c1")
        .unwrap()
        .send_text_with_ttl("hello", 60)
        .unwrap();

    let conv = alice.conversation("c1").unwrap();
    assert_eq!(conv.message_count(), 1);
    let views = conv.messages();
    assert_eq!(views[0].message.id, id);
    assert_eq!(views[0].message.send_state, SendState::Sent);
    assert_eq!(views[0].seconds_left, Some(60));

    // nobody views it; simulated clock advances past the deadline
    clock.advance_secs(60);
    let expired = alice.tick();
    assert_eq!(expired, vec![id.clone()]);
    assert_eq!(alice.conversation("c1").unwrap().message_count(), 0);

    // TTL cleanup is the backend's responsibility, not the client's
    assert!(backend.row(&id).is_some());
    assert_eq!(backend.sweep_expired(), 1);
    assert!(backend.row(&id).is_none());
}

/// E2E scenario B: the viewer deletes locally right away; the redundant
/// delete event that follows is a harmless no-op
#[test]
fn test_view_then_redundant_delete_event() {
    let (clock, backend) = shared_world();
    let mut alice = client(&backend, &clock, "alice");
    let mut bob = client(&backend, &clock, "bob");
    alice.open_conversation("c1").unwrap();
    bob.open_conversation("c1").unwrap();

    let id = alice.send_message("c1", "see this once", true).unwrap();
    bob.tick();
    assert_eq!(bob.conversation("c1").unwrap().message_count(), 1);

    let outcome = bob.view_message("c1", &id).unwrap();
    assert_eq!(outcome, ViewOutcome::Deleted);
    assert_eq!(bob.conversation("c1").unwrap().message_count(), 0);

    // the delete event is still queued for bob; applying it must not error
    bob.tick();
    assert_eq!(bob.conversation("c1").unwrap().message_count(), 0);

    // ...and it is the only removal signal for the sender
    assert_eq!(alice.conversation("c1").unwrap().message_count(), 1);
    alice.tick();
    assert_eq!(alice.conversation("c1").unwrap().message_count(), 0);
}

/// E2E scenario C: two recipients race to view the same group message;
/// exactly one wins, both converge on an empty store
#[test]
fn test_concurrent_viewers_first_wins() {
    let (clock, backend) = shared_world();
    let mut alice = client(&backend, &clock, "alice");
    let mut bob = client(&backend, &clock, "bob");
    let mut carol = client(&backend, &clock, "carol");
    alice.open_conversation("g1").unwrap();
    bob.open_conversation("g1").unwrap();
    carol.open_conversation("g1").unwrap();

    let id = alice.send_message("g1", "group secret", true).unwrap();
    bob.tick();
    carol.tick();

    let first = bob.view_message("g1", &id).unwrap();
    let second = carol.view_message("g1", &id).unwrap();
    assert_eq!(first, ViewOutcome::Deleted);
    assert_eq!(second, ViewOutcome::AlreadyGone);

    // exactly one durable view record, one delete
    assert_eq!(backend.view_log().len(), 1);
    assert_eq!(backend.view_log()[0].viewer_id, "bob");

    bob.tick();
    carol.tick();
    assert_eq!(bob.conversation("g1").unwrap().message_count(), 0);
    assert_eq!(carol.conversation("g1").unwrap().message_count(), 0);
}

/// E2E scenario D / P4: failed durable write rolls the ghost entry back
/// and hands the text back to the compose field
#[test]
fn test_failed_send_rolls_back_and_restores_draft() {
    let clock = Rc::new(ManualClock::new(1_000_000));
    let memory = Rc::new(MemoryBackend::new(clock.clone()));
    memory.register_conversation(Conversation::direct("c1", "alice", "bob"));
    let flaky = Rc::new(FlakyBackend::new(memory.clone()));

    let mut alice = MessengerApi::new(
        flaky.clone() as Rc<dyn MessengerBackend>,
        clock.clone() as Rc<dyn Clock>,
        "alice",
    );
    alice.open_conversation("c1").unwrap();

    flaky.fail_next();
    let err = alice.send_message("c1", "hello", true).unwrap_err();
    assert!(matches!(err, VanishError::NetworkError(_)));

    let conv = alice.conversation_mut("c1").unwrap();
    assert_eq!(conv.message_count(), 0);
    assert_eq!(conv.active_countdowns(), 0);
    assert_eq!(
        conv.ui_state_mut().take_restored_draft(),
        Some("hello".to_string())
    );
    assert!(conv.ui_state().error_message.is_some());

    // the next send goes through normally
    let id = alice.send_message("c1", "hello", true).unwrap();
    assert!(memory.row(&id).is_some());
}

/// P2: the atomic view op deletes exactly once across repeated invocations
#[test]
fn test_view_idempotency_under_retry() {
    let (clock, backend) = shared_world();
    let mut alice = client(&backend, &clock, "alice");
    let mut bob = client(&backend, &clock, "bob");
    alice.open_conversation("c1").unwrap();
    bob.open_conversation("c1").unwrap();

    let id = alice.send_message("c1", "once", true).unwrap();
    bob.tick();

    assert_eq!(bob.view_message("c1", &id).unwrap(), ViewOutcome::Deleted);
    // a stray duplicate tap: locally gone, treated as already-gone, no error
    assert_eq!(
        bob.view_message("c1", &id).unwrap(),
        ViewOutcome::AlreadyGone
    );
    // a retry straight against the backend is a safe no-op too
    assert_eq!(
        backend.mark_viewed(&id, "bob").unwrap(),
        ViewOutcome::AlreadyGone
    );
    assert_eq!(backend.view_log().len(), 1);
}

/// P3: no duplicate display when the realtime insert for an own message
/// arrives around the send confirmation
#[test]
fn test_no_duplicate_display_after_confirm() {
    let (clock, backend) = shared_world();
    let mut alice = client(&backend, &clock, "alice");
    alice.open_conversation("c1").unwrap();

    let id = alice.send_message("c1", "hello", false).unwrap();
    // the subscription delivered the insert event for alice's own row
    alice.tick();

    let conv = alice.conversation("c1").unwrap();
    assert_eq!(conv.message_count(), 1);
    assert_eq!(conv.messages()[0].message.id, id);
    assert_eq!(conv.unread_count(), 0);
}

/// P5: teardown leaves zero countdowns and zero subscriptions behind
#[test]
fn test_teardown_releases_all_scoped_resources() {
    let (clock, backend) = shared_world();
    let mut alice = client(&backend, &clock, "alice");
    alice.open_conversation("c1").unwrap();
    alice.send_message("c1", "fleeting", true).unwrap();

    assert_eq!(backend.subscriber_count(), 1);
    assert_eq!(
        alice.conversation("c1").unwrap().active_countdowns(),
        1
    );

    assert!(alice.close_conversation("c1"));
    assert_eq!(backend.subscriber_count(), 0);
    assert_eq!(alice.open_count(), 0);
}

/// Delivery bookkeeping travels as an update event: the sender sees the
/// read receipt, which is independent from ephemeral viewing
#[test]
fn test_read_receipt_propagates_to_sender() {
    let (clock, backend) = shared_world();
    let mut alice = client(&backend, &clock, "alice");
    let mut bob = client(&backend, &clock, "bob");
    alice.open_conversation("c1").unwrap();
    bob.open_conversation("c1").unwrap();

    let id = alice.send_message("c1", "plain text", false).unwrap();

    // bob receives the insert and acknowledges delivery
    bob.tick();
    let bob_conv = bob.conversation("c1").unwrap();
    assert_eq!(bob_conv.unread_count(), 1);

    // alice picks up the update event with isRead = true
    alice.tick();
    let alice_conv = alice.conversation("c1").unwrap();
    let view = alice_conv
        .messages()
        .into_iter()
        .find(|v| v.message.id == id)
        .unwrap();
    assert!(view.message.is_read);
    // a read receipt never consumes an ephemeral-capable row
    assert!(backend.row(&id).is_some());
}

/// History load skips rows that expired while the screen was closed,
/// and tracks countdowns for the rows still alive
#[test]
fn test_history_load_hides_expired_rows() {
    let (clock, backend) = shared_world();
    let mut alice = client(&backend, &clock, "alice");
    alice.open_conversation("c1").unwrap();
    alice.send_message("c1", "durable", false).unwrap();
    let short_lived = alice
        .conversation_mut("c1")
        .unwrap()
        .send_text_with_ttl("short", 30)
        .unwrap();
    let long_lived = alice
        .conversation_mut("c1")
        .unwrap()
        .send_text_with_ttl("long", 600)
        .unwrap();
    alice.close_conversation("c1");

    clock.advance_secs(60);

    let mut bob = client(&backend, &clock, "bob");
    bob.open_conversation("c1").unwrap();
    let conv = bob.conversation("c1").unwrap();

    let ids: Vec<&str> = conv.messages().iter().map(|v| v.message.id.as_str()).collect();
    assert!(!ids.contains(&short_lived.as_str()));
    assert!(ids.contains(&long_lived.as_str()));
    assert_eq!(conv.message_count(), 2);
    assert_eq!(conv.active_countdowns(), 1);

    // the survivor shows the remaining, not the original, TTL
    let view = conv
        .messages()
        .into_iter()
        .find(|v| v.message.id == long_lived)
        .unwrap();
    assert_eq!(view.seconds_left, Some(540));
}

/// A view attempt that loses the race against the TTL deadline converges
/// to absence everywhere without a durable view record
#[test]
fn test_view_racing_ttl_deadline() {
    let (clock, backend) = shared_world();
    let mut alice = client(&backend, &clock, "alice");
    let mut bob = client(&backend, &clock, "bob");
    alice.open_conversation("c1").unwrap();
    bob.open_conversation("c1").unwrap();

    let id = alice
        .conversation_mut("c1")
        .unwrap()
        .send_text_with_ttl("about to vanish", 30)
        .unwrap();
    bob.tick();

    // bob taps just after the deadline, before his local tick fired
    clock.advance_ms(30_000);
    let outcome = bob.view_message("c1", &id).unwrap();
    assert_eq!(outcome, ViewOutcome::AlreadyGone);
    assert!(backend.view_log().is_empty());

    bob.tick();
    alice.tick();
    assert_eq!(bob.conversation("c1").unwrap().message_count(), 0);
    assert_eq!(alice.conversation("c1").unwrap().message_count(), 0);
}

/// Media rows ride the same optimistic pipeline: confirm with the default
/// TTL countdown, fan-out with the URL intact, view-and-destroy consumption
#[test]
fn test_ephemeral_media_lifecycle() {
    let (clock, backend) = shared_world();
    let mut alice = client(&backend, &clock, "alice");
    let mut bob = client(&backend, &clock, "bob");
    alice.open_conversation("c1").unwrap();
    bob.open_conversation("c1").unwrap();

    let id = alice
        .send_media(
            "c1",
            MessagePayload::Image {
                media_url: "https://cdn.example/v.jpg".to_string(),
            },
            true,
        )
        .unwrap();

    let alice_conv = alice.conversation("c1").unwrap();
    let sent = alice_conv
        .messages()
        .into_iter()
        .find(|v| v.message.id == id)
        .unwrap();
    assert_eq!(sent.message.send_state, SendState::Sent);
    // no explicit TTL requested, the server default (60s) applies
    assert_eq!(sent.seconds_left, Some(60));

    bob.tick();
    let conv = bob.conversation("c1").unwrap();
    let view = conv
        .messages()
        .into_iter()
        .find(|v| v.message.id == id)
        .unwrap();
    assert_eq!(
        view.message.payload.media_url(),
        Some("https://cdn.example/v.jpg")
    );
    assert_eq!(conv.active_countdowns(), 1);

    assert_eq!(bob.view_message("c1", &id).unwrap(), ViewOutcome::Deleted);
    assert_eq!(bob.conversation("c1").unwrap().message_count(), 0);
    assert!(backend.row(&id).is_none());
}

/// Group fan-out: every active participant's feed carries the insert,
/// and the receiver field stays empty
#[test]
fn test_group_send_fans_out() {
    let (clock, backend) = shared_world();
    let mut alice = client(&backend, &clock, "alice");
    let mut bob = client(&backend, &clock, "bob");
    let mut carol = client(&backend, &clock, "carol");
    alice.open_conversation("g1").unwrap();
    bob.open_conversation("g1").unwrap();
    carol.open_conversation("g1").unwrap();

    let id = alice.send_message("g1", "hi all", false).unwrap();
    bob.tick();
    carol.tick();

    for api in [&bob, &carol] {
        let conv = api.conversation("g1").unwrap();
        let view = conv
            .messages()
            .into_iter()
            .find(|v| v.message.id == id)
            .unwrap();
        assert_eq!(view.message.receiver_id, None);
    }
}
