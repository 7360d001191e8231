//! End-to-end session tests over an in-process transport: a user bound
//! to a real `Connection` whose outbound frames are decoded back with a
//! mirrored client-side cipher.

use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

use fieldlink_net::{
    Connection, ConnectionConfig, ConnectionId, FRAME_HEADER_LEN, Socket,
    parse_header,
};
use fieldlink_packet::{Packet, Point, SendOp};
use fieldlink_session::{
    Character, ConversationOutcome, Dialog, Field, FieldObject, FieldUser,
    GameInfo, GameSession, ScriptAnswer, SessionError, TemporaryStatKind,
};
use fieldlink_tick::Updateable;
use futures_util::future::BoxFuture;
use tokio::sync::mpsc;

struct Harness {
    user: Arc<FieldUser>,
    rx: mpsc::Receiver<Vec<u8>>,
    client: Connection,
}

impl Harness {
    /// Pops the next outbound frame and decodes it client-side.
    async fn next_packet(&mut self) -> Packet {
        let frame = self.rx.recv().await.expect("outbound frame");
        let header: [u8; FRAME_HEADER_LEN] =
            frame[..FRAME_HEADER_LEN].try_into().unwrap();
        let (tag, len) = parse_header(header);
        assert_eq!(len, frame.len() - FRAME_HEADER_LEN);
        self.client
            .decode_frame(tag, frame[FRAME_HEADER_LEN..].to_vec())
            .await
            .expect("client-side decode")
    }

    fn assert_no_pending(&mut self) {
        assert!(self.rx.try_recv().is_err(), "unexpected outbound frame");
    }
}

fn config(send_seed: u32, recv_seed: u32, depth: usize) -> ConnectionConfig {
    ConnectionConfig {
        send_seed,
        recv_seed,
        read_only: false,
        send_queue_depth: depth,
    }
}

fn character() -> Character {
    Character {
        id: 1001,
        name: "Test".into(),
        gender: 0,
        skin: 0,
        face: 20_000,
        hair: 30_000,
        level: 50,
        job: 100,
        strength: 12,
        dexterity: 8,
        intelligence: 5,
        luck: 4,
        hp: 250,
        max_hp: 300,
        mp: 100,
        max_mp: 120,
        money: 5_000,
        field_id: 104_000_000,
        field_portal: 0,
        equipped_cash: Vec::new(),
        couple_records: Vec::new(),
        friend_records: Vec::new(),
    }
}

fn harness_with_depth(depth: usize) -> Harness {
    let (tx, rx) = mpsc::channel(depth);
    let conn = Arc::new(Connection::new(
        ConnectionId::new(1),
        tx,
        &config(11, 22, depth),
    ));
    let (client_tx, _client_rx) = mpsc::channel(1);
    let client = Connection::new(
        ConnectionId::new(2),
        client_tx,
        &config(22, 11, 1),
    );
    let user = Arc::new(FieldUser::new(
        conn,
        GameInfo {
            zone_id: 1,
            world_id: 0,
        },
        character(),
    ));
    Harness { user, rx, client }
}

fn harness() -> Harness {
    harness_with_depth(32)
}

// ---------------------------------------------------------------------------
// Conversations
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_conversation_say_completes_and_resyncs() {
    let mut h = harness();

    let handle = h
        .user
        .start_conversation(9_000, |mut speaker| async move {
            speaker.say("hello").await
        })
        .unwrap();

    let p = h.next_packet().await;
    assert_eq!(p.opcode_raw(), SendOp::ScriptMessage as u16);
    let mut r = p.reader();
    assert_eq!(r.read_u8().unwrap(), 0); // say
    assert_eq!(r.read_i32().unwrap(), 9_000); // npc template
    assert_eq!(r.read_string().unwrap(), "hello");

    h.user.on_script_answer(ScriptAnswer::Proceed);
    assert_eq!(handle.outcome().await, ConversationOutcome::Completed);

    // Cleanup re-enables the client with an exclusive-ack resync.
    let p = h.next_packet().await;
    assert_eq!(p.opcode_raw(), SendOp::StatChanged as u16);
    assert!(p.reader().read_bool().unwrap());
}

#[tokio::test]
async fn test_second_conversation_while_active_is_refused() {
    let mut h = harness();

    let handle = h
        .user
        .start_conversation(1, |mut speaker| async move {
            speaker.say("waiting").await
        })
        .unwrap();
    let _ = h.next_packet().await;

    let err = h
        .user
        .start_conversation(2, |_speaker| async move {
            Ok::<(), SessionError>(())
        })
        .unwrap_err();
    assert!(matches!(err, SessionError::ConversationAlreadyActive));

    h.user.cancel_conversation();
    assert_eq!(handle.outcome().await, ConversationOutcome::Cancelled);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_starts_admit_exactly_one_conversation() {
    let h = harness();

    let start = |npc: i32| {
        let user = Arc::clone(&h.user);
        tokio::spawn(async move {
            user.start_conversation(npc, |mut speaker| async move {
                speaker.say("race").await
            })
            .map(|_| ())
        })
    };

    let (a, b) = tokio::join!(start(1), start(2));
    let results = [a.unwrap(), b.unwrap()];

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results.iter().any(|r| matches!(
        r,
        Err(SessionError::ConversationAlreadyActive)
    )));

    h.user.cancel_conversation();
}

#[tokio::test]
async fn test_cancel_frees_slot_for_next_conversation() {
    let mut h = harness();

    let handle = h
        .user
        .start_conversation(1, |mut speaker| async move {
            speaker.say("first").await
        })
        .unwrap();
    let _ = h.next_packet().await; // the say step

    h.user.cancel_conversation();
    assert_eq!(handle.outcome().await, ConversationOutcome::Cancelled);
    let p = h.next_packet().await; // cancellation still resyncs
    assert_eq!(p.opcode_raw(), SendOp::StatChanged as u16);

    // Slot is free again once the outcome has resolved.
    let handle = h
        .user
        .start_conversation(2, |_speaker| async move {
            Ok::<(), SessionError>(())
        })
        .unwrap();
    assert_eq!(handle.outcome().await, ConversationOutcome::Completed);
}

#[tokio::test]
async fn test_end_chat_answer_cancels_conversation() {
    let mut h = harness();

    let handle = h
        .user
        .start_conversation(1, |mut speaker| async move {
            speaker.ask_yes_no("stay?").await.map(|_| ())
        })
        .unwrap();
    let _ = h.next_packet().await;

    h.user.on_script_answer(ScriptAnswer::EndChat);
    assert_eq!(handle.outcome().await, ConversationOutcome::Cancelled);
}

#[tokio::test]
async fn test_prompt_returns_script_value() {
    let mut h = harness();

    let user = Arc::clone(&h.user);
    let prompt = tokio::spawn(async move {
        user.prompt(7, |mut speaker| async move {
            speaker.ask_yes_no("proceed?").await
        })
        .await
    });

    let p = h.next_packet().await;
    let mut r = p.reader();
    assert_eq!(r.read_u8().unwrap(), 1); // ask-yes-no
    assert_eq!(r.read_i32().unwrap(), 7);
    assert_eq!(r.read_string().unwrap(), "proceed?");

    h.user.on_script_answer(ScriptAnswer::YesNo(true));
    assert!(prompt.await.unwrap().unwrap());
}

#[tokio::test]
async fn test_wrong_answer_shape_faults_script() {
    let mut h = harness();

    let handle = h
        .user
        .start_conversation(1, |mut speaker| async move {
            speaker.ask_menu("pick").await.map(|_| ())
        })
        .unwrap();
    let _ = h.next_packet().await;

    h.user.on_script_answer(ScriptAnswer::Text("not a pick".into()));
    assert_eq!(handle.outcome().await, ConversationOutcome::Faulted);

    // Faulted conversations still resync on the way out.
    let p = h.next_packet().await;
    assert_eq!(p.opcode_raw(), SendOp::StatChanged as u16);
}

// ---------------------------------------------------------------------------
// Dialogs
// ---------------------------------------------------------------------------

struct TestDialog {
    accept: bool,
}

impl Dialog for TestDialog {
    fn enter<'a>(
        &'a self,
        _user: &'a FieldUser,
    ) -> BoxFuture<'a, Result<bool, SessionError>> {
        Box::pin(async move { Ok(self.accept) })
    }
}

#[tokio::test]
async fn test_dialog_slot_is_single_occupancy() {
    let h = harness();
    let dialog = Arc::new(TestDialog { accept: true });

    // Close succeeds even with nothing open.
    assert!(h.user.interact(dialog.clone(), true).await.unwrap());
    assert!(!h.user.has_dialog());

    assert!(h.user.interact(dialog.clone(), false).await.unwrap());
    assert!(h.user.has_dialog());

    // Second open is refused while the first is up.
    assert!(!h.user.interact(dialog.clone(), false).await.unwrap());

    // Closing frees the slot for the next open.
    assert!(h.user.interact(dialog.clone(), true).await.unwrap());
    assert!(!h.user.has_dialog());
    assert!(h.user.interact(dialog, false).await.unwrap());
}

#[tokio::test]
async fn test_declined_dialog_leaves_slot_free() {
    let h = harness();

    let declining = Arc::new(TestDialog { accept: false });
    assert!(!h.user.interact(declining, false).await.unwrap());
    assert!(!h.user.has_dialog());

    let accepting = Arc::new(TestDialog { accept: true });
    assert!(h.user.interact(accepting, false).await.unwrap());
}

// ---------------------------------------------------------------------------
// Temporary stats
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_temporary_stat_set_batch_is_one_packet() {
    let mut h = harness();
    let expire = UNIX_EPOCH + Duration::from_secs(1_000);

    h.user
        .modify_temporary_stat(|m| {
            m.set(TemporaryStatKind::Attack, 10, Some(expire));
            m.set(TemporaryStatKind::Speed, 40, Some(expire));
        })
        .await
        .unwrap();

    let p = h.next_packet().await;
    assert_eq!(p.opcode_raw(), SendOp::TemporaryStatSet as u16);
    let mut r = p.reader();
    assert_eq!(
        r.read_i32().unwrap() as u32,
        TemporaryStatKind::Attack.bit() | TemporaryStatKind::Speed.bit()
    );
    // Values follow mask-bit order.
    assert_eq!(r.read_i16().unwrap(), 10);
    assert_eq!(r.read_i16().unwrap(), 40);
    h.assert_no_pending();
}

#[tokio::test]
async fn test_expiry_fires_once_per_second_boundary_with_one_reset() {
    let mut h = harness();
    let expire = UNIX_EPOCH + Duration::from_secs(1_000);

    h.user
        .modify_temporary_stat(|m| {
            m.set(TemporaryStatKind::Attack, 10, Some(expire));
            m.set(TemporaryStatKind::Speed, 40, Some(expire));
        })
        .await
        .unwrap();
    let _ = h.next_packet().await; // set batch

    // One second early: nothing lapses.
    h.user.on_update(expire - Duration::from_secs(1)).await;
    h.assert_no_pending();

    // One second late: both entries lapse in a single reset batch.
    h.user.on_update(expire + Duration::from_secs(1)).await;
    let p = h.next_packet().await;
    assert_eq!(p.opcode_raw(), SendOp::TemporaryStatReset as u16);
    assert_eq!(
        p.reader().read_i32().unwrap() as u32,
        TemporaryStatKind::Attack.bit() | TemporaryStatKind::Speed.bit()
    );
    h.assert_no_pending();

    // Lapsed entries stay gone.
    h.user.on_update(expire + Duration::from_secs(2)).await;
    h.assert_no_pending();
}

// ---------------------------------------------------------------------------
// Field packets
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_enter_field_packet_decodes_field_by_field() {
    let h = harness();
    let field = Arc::new(Field::new(104_000_000, "Fields/104000000"));
    h.user.place_in(&field, Point::new(100, 200));
    h.user.set_foothold(3);

    let p = h.user.enter_field_packet();
    assert_eq!(p.opcode_raw(), SendOp::UserEnterField as u16);

    let mut r = p.reader();
    assert_eq!(r.read_i32().unwrap(), h.user.object_id());
    assert_eq!(r.read_u8().unwrap(), 50); // level
    assert_eq!(r.read_string().unwrap(), "Test");
    assert_eq!(r.read_string().unwrap(), ""); // guild name
    assert_eq!(r.read_i16().unwrap(), 0); // guild mark bg
    assert_eq!(r.read_u8().unwrap(), 0); // bg color
    assert_eq!(r.read_i16().unwrap(), 0); // guild mark
    assert_eq!(r.read_u8().unwrap(), 0); // mark color
    assert_eq!(r.read_i32().unwrap(), 0); // temporary stat mask
    assert_eq!(r.read_i16().unwrap(), 100); // job
    assert_eq!(r.read_u8().unwrap(), 0); // gender
    assert_eq!(r.read_u8().unwrap(), 0); // skin
    assert_eq!(r.read_i32().unwrap(), 20_000); // face
    assert_eq!(r.read_i32().unwrap(), 30_000); // hair
    assert_eq!(r.read_u8().unwrap(), 0); // cash equip count
    for _ in 0..6 {
        assert_eq!(r.read_i32().unwrap(), 0);
    }
    assert_eq!(r.read_point().unwrap(), Point::new(100, 200));
    assert_eq!(r.read_u8().unwrap(), 0); // move action
    assert_eq!(r.read_i16().unwrap(), 3); // foothold
    assert_eq!(r.read_u8().unwrap(), 0);
    assert_eq!(r.read_u8().unwrap(), 0);
    for _ in 0..3 {
        assert_eq!(r.read_i32().unwrap(), 0);
    }
    assert_eq!(r.read_u8().unwrap(), 0);
    assert!(!r.read_bool().unwrap());
    assert!(!r.read_bool().unwrap()); // couple record
    assert!(!r.read_bool().unwrap()); // friend record
    assert!(!r.read_bool().unwrap()); // marriage marker
    assert_eq!(r.read_u8().unwrap(), 0);
    assert_eq!(r.read_u8().unwrap(), 0);
    assert_eq!(r.read_i32().unwrap(), 0);
    assert_eq!(r.remaining(), 0);
}

#[tokio::test]
async fn test_leave_field_packet_carries_object_id() {
    let h = harness();
    let field = Arc::new(Field::new(104_000_000, "Fields/104000000"));
    h.user.place_in(&field, Point::default());

    let p = h.user.leave_field_packet();
    assert_eq!(p.opcode_raw(), SendOp::UserLeaveField as u16);
    assert_eq!(p.reader().read_i32().unwrap(), h.user.object_id());
}

#[tokio::test]
async fn test_set_field_first_entry_then_revisit() {
    let h = harness();

    let p = h.user.set_field_packet();
    let mut r = p.reader();
    r.read_i16().unwrap(); // client option
    assert_eq!(r.read_i32().unwrap(), 1); // zone
    assert_eq!(r.read_i32().unwrap(), 0); // world
    assert!(r.read_bool().unwrap()); // notifier
    assert!(r.read_bool().unwrap()); // first entry
    r.read_i16().unwrap(); // notifier loops
    for _ in 0..3 {
        assert_eq!(r.read_i32().unwrap(), 0);
    }
    assert_eq!(r.read_i32().unwrap(), 1001); // data block starts with id
    assert_eq!(r.read_string().unwrap(), "Test");

    let p = h.user.set_field_packet();
    let mut r = p.reader();
    r.read_i16().unwrap();
    r.read_i32().unwrap();
    r.read_i32().unwrap();
    assert!(r.read_bool().unwrap());
    assert!(!r.read_bool().unwrap()); // revisit form
    r.read_i16().unwrap();
    assert_eq!(r.read_u8().unwrap(), 0);
    assert_eq!(r.read_i32().unwrap(), 104_000_000); // field id
    assert_eq!(r.read_u8().unwrap(), 0); // portal
    assert_eq!(r.read_i32().unwrap(), 250); // hp
    assert!(!r.read_bool().unwrap()); // chase
    assert_eq!(r.read_i64().unwrap(), 0); // trailing reserved
    assert_eq!(r.remaining(), 0);
}

// ---------------------------------------------------------------------------
// Backpressure
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_saturated_connection_drops_messages_without_error() {
    let h = harness_with_depth(1);

    h.user.message("one").await.unwrap(); // fills the queue
    let seq = h.user.connection().seq_send().await;

    h.user.message("two").await.unwrap(); // dropped, no error
    assert_eq!(h.user.connection().seq_send().await, seq);
}

// ---------------------------------------------------------------------------
// Session socket
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_chat_packet_echoes_as_system_message() {
    let mut h = harness();
    let session = GameSession::new(Arc::clone(h.user.connection()));
    session.bind_user(Arc::clone(&h.user));

    let chat = Packet::from_bytes(vec![0x31, 0x00, 2, 0, b'h', b'i']).unwrap();
    session.on_packet(chat).await.unwrap();

    let p = h.next_packet().await;
    assert_eq!(p.opcode_raw(), SendOp::Message as u16);
    let mut r = p.reader();
    assert_eq!(r.read_u8().unwrap(), 4); // system message kind
    assert_eq!(r.read_string().unwrap(), "hi");
}

#[tokio::test]
async fn test_close_dialog_request_drops_open_dialog() {
    let h = harness();
    let session = GameSession::new(Arc::clone(h.user.connection()));
    session.bind_user(Arc::clone(&h.user));

    let dialog = Arc::new(TestDialog { accept: true });
    assert!(h.user.interact(dialog, false).await.unwrap());

    let close = Packet::from_bytes(vec![0x45, 0x00]).unwrap();
    session.on_packet(close).await.unwrap();
    assert!(!h.user.has_dialog());
}

#[tokio::test]
async fn test_gameplay_packet_before_user_bind_is_error() {
    let h = harness();
    let session = GameSession::new(Arc::clone(h.user.connection()));

    let chat = Packet::from_bytes(vec![0x31, 0x00, 0, 0]).unwrap();
    assert!(matches!(
        session.on_packet(chat).await,
        Err(SessionError::NoUser)
    ));
}

#[tokio::test]
async fn test_disconnect_cancels_conversation_and_dialog() {
    let mut h = harness();
    let session = GameSession::new(Arc::clone(h.user.connection()));
    session.bind_user(Arc::clone(&h.user));

    let handle = h
        .user
        .start_conversation(1, |mut speaker| async move {
            speaker.say("hi").await
        })
        .unwrap();
    let _ = h.next_packet().await;
    let dialog = Arc::new(TestDialog { accept: true });
    assert!(h.user.interact(dialog, false).await.unwrap());

    session.on_disconnect().await;

    assert_eq!(handle.outcome().await, ConversationOutcome::Cancelled);
    assert!(!h.user.has_dialog());
}
