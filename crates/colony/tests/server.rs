//! Integration tests for the Colony server: full sessions over real TCP.

use std::collections::VecDeque;
use std::time::Duration;

use colony::prelude::*;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

const TIMEOUT: Duration = Duration::from_secs(2);

// =========================================================================
// Helpers
// =========================================================================

type ServerHandle = JoinHandle<Result<ShutdownRequest, ColonyError>>;

fn builder() -> ColonyServerBuilder {
    ColonyServerBuilder::new()
        .bind("127.0.0.1:0")
        .unknown_case(UnknownCasePolicy::Log)
        .welcome("ColonyBot", "hello there")
}

/// Starts a server with the given store and returns its address and task.
async fn start_with(builder: ColonyServerBuilder, store: MemoryAccountStore) -> (String, ServerHandle) {
    let server = builder
        .build(store, SilentPresence)
        .await
        .expect("server should build");
    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();
    let handle = tokio::spawn(server.run());
    (addr, handle)
}

async fn start(builder: ColonyServerBuilder) -> (String, ServerHandle) {
    start_with(builder, MemoryAccountStore::new()).await
}

/// A raw protocol client that splits the stream on null bytes.
struct TestClient {
    stream: TcpStream,
    buffer: Vec<u8>,
    frames: VecDeque<String>,
}

impl TestClient {
    async fn connect(addr: &str) -> Self {
        let stream = TcpStream::connect(addr).await.expect("should connect");
        Self {
            stream,
            buffer: Vec::new(),
            frames: VecDeque::new(),
        }
    }

    async fn send(&mut self, frame: &str) {
        let mut data = frame.as_bytes().to_vec();
        data.push(0);
        self.send_raw(&data).await;
    }

    async fn send_raw(&mut self, data: &[u8]) {
        self.stream.write_all(data).await.expect("write should succeed");
    }

    /// Next frame, or `None` once the server closed the connection.
    async fn try_recv(&mut self) -> Option<String> {
        loop {
            if let Some(frame) = self.frames.pop_front() {
                return Some(frame);
            }
            let mut chunk = [0u8; 4096];
            let n = tokio::time::timeout(TIMEOUT, self.stream.read(&mut chunk))
                .await
                .expect("timed out waiting for the server")
                .expect("read should succeed");
            if n == 0 {
                return None;
            }
            self.buffer.extend_from_slice(&chunk[..n]);
            while let Some(pos) = self.buffer.iter().position(|b| *b == 0) {
                let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
                self.frames
                    .push_back(String::from_utf8_lossy(&raw[..pos]).into_owned());
            }
        }
    }

    async fn recv(&mut self) -> String {
        self.try_recv().await.expect("connection closed unexpectedly")
    }

    /// Skips frames until one contains `needle`.
    async fn recv_containing(&mut self, needle: &str) -> String {
        loop {
            let frame = self.recv().await;
            if frame.contains(needle) {
                return frame;
            }
        }
    }

    /// Every frame up to and including the first one containing `needle`.
    async fn recv_through(&mut self, needle: &str) -> Vec<String> {
        let mut seen = Vec::new();
        loop {
            let frame = self.recv().await;
            let done = frame.contains(needle);
            seen.push(frame);
            if done {
                return seen;
            }
        }
    }

    /// Version check, login, and first join. Returns the session id.
    async fn enter_lobby(&mut self, nick: &str) -> u32 {
        self.send(&ver_chk(0)).await;
        self.recv_containing("apiOK").await;
        self.send(&login(nick)).await;
        let ok = self.recv_containing("logOK").await;
        self.send(JOIN_LOBBY).await;
        self.recv_containing("joinOK").await;
        attr(&ok, "id").parse().expect("numeric id")
    }
}

/// Extracts the first ` name='value'` attribute from a frame.
fn attr(frame: &str, name: &str) -> String {
    let key = format!(" {name}='");
    let start = frame.find(&key).expect("attribute present") + key.len();
    let len = frame[start..].find('\'').expect("closing quote");
    frame[start..start + len].to_string()
}

fn ver_chk(version: i64) -> String {
    format!("<msg t='sys'><body action='verChk' r='0'><ver v='{version}'/></body></msg>")
}

fn login(nick: &str) -> String {
    format!(
        "<msg t='sys'><body action='login' r='0'><login z='colony'><nick><![CDATA[{nick}]]></nick><pword><![CDATA[]]></pword></login></body></msg>"
    )
}

fn pub_msg(text: &str) -> String {
    format!("<msg t='sys'><body action='pubMsg' r='1'><txt><![CDATA[{text}]]></txt></body></msg>")
}

/// An envelope whose body is a data-object payload.
fn payload(action: &str, data_obj: &str) -> String {
    format!("<msg t='sys'><body action='{action}' r='1'><![CDATA[{data_obj}]]></body></msg>")
}

fn vars(action: &str, vars: &str) -> String {
    format!("<msg t='sys'><body action='{action}' r='1'><vars>{vars}</vars></body></msg>")
}

/// The `dataObj` envelope the server sends for `payload` as coming from `user`.
fn data_obj_frame(room: &str, user: u32, payload: &str) -> String {
    format!(
        "<msg t='sys'><body action='dataObj' r='{room}'><user id='{user}' /><dataObj><![CDATA[{payload}]]></dataObj></body></msg>"
    )
}

const JOIN_LOBBY: &str =
    "<msg t='sys'><body action='joinRoom' r='-1'><room id='1' pwd='' spec='0' leave='0' old='-1'/></body></msg>";

const POLICY_REQUEST: &str = "<policy-file-request/>";

fn policy(addr: &str) -> String {
    let port = addr.rsplit(':').next().unwrap();
    format!(
        "<cross-domain-policy><allow-access-from domain='*' to-ports='{port}' /></cross-domain-policy>"
    )
}

// =========================================================================
// Framing and handshake
// =========================================================================

#[tokio::test]
async fn test_policy_request_answered_and_connection_stays_open() {
    let (addr, _server) = start(builder()).await;
    let mut client = TestClient::connect(&addr).await;

    client.send(POLICY_REQUEST).await;
    assert_eq!(client.recv().await, policy(&addr));

    client.send(&ver_chk(0)).await;
    assert_eq!(client.recv().await, policy(&addr));
    assert_eq!(
        client.recv().await,
        "<msg t='sys'><body action='apiOK' r='0'></body></msg>"
    );
}

#[tokio::test]
async fn test_batched_frames_are_processed_in_order() {
    let (addr, _server) = start(builder()).await;
    let mut client = TestClient::connect(&addr).await;

    let batch = format!("{}\0{POLICY_REQUEST}\0\0", ver_chk(0));
    client.send_raw(batch.as_bytes()).await;

    assert_eq!(client.recv().await, policy(&addr));
    assert!(client.recv().await.contains("action='apiOK'"));
    assert_eq!(client.recv().await, policy(&addr));
}

#[tokio::test]
async fn test_malformed_and_unknown_messages_keep_connection_open() {
    let (addr, _server) = start(builder()).await;
    let mut client = TestClient::connect(&addr).await;

    client.send("<msg t='sys'><body").await;
    client
        .send("<msg t='sys'><body action='dance' r='0'></body></msg>")
        .await;
    client.send(JOIN_LOBBY).await;
    client.send(&ver_chk(0)).await;

    // The first reply is to the version check: nothing above was answered.
    assert_eq!(client.recv().await, policy(&addr));
    assert!(client.recv().await.contains("action='apiOK'"));
}

// =========================================================================
// Login
// =========================================================================

#[tokio::test]
async fn test_empty_nick_logs_in_as_guest() {
    let (addr, _server) = start(builder()).await;
    let mut client = TestClient::connect(&addr).await;
    client.send(&ver_chk(0)).await;
    client.recv_containing("apiOK").await;

    client.send(&login("")).await;

    let ok = client.recv_containing("logOK").await;
    let id = attr(&ok, "id");
    assert_eq!(attr(&ok, "n"), format!("guest_{id}"));
    assert_eq!(attr(&ok, "mod"), "0");
}

#[tokio::test]
async fn test_login_adopts_stored_account_id() {
    let store = MemoryAccountStore::new();
    store.add_user("zed").await.unwrap();
    store.add_user("amy").await.unwrap();
    let (addr, _server) = start_with(builder(), store).await;
    let mut client = TestClient::connect(&addr).await;
    client.send(&ver_chk(0)).await;
    client.recv_containing("apiOK").await;

    client.send(&login("amy")).await;

    let ok = client.recv_containing("logOK").await;
    assert_eq!(attr(&ok, "id"), "2");
}

#[tokio::test]
async fn test_moderator_names_match_case_insensitively() {
    let (addr, _server) = start(builder().moderators(["Alice"])).await;
    let mut client = TestClient::connect(&addr).await;
    client.send(&ver_chk(0)).await;
    client.recv_containing("apiOK").await;

    client.send(&login("ALICE")).await;

    let ok = client.recv_containing("logOK").await;
    assert_eq!(attr(&ok, "mod"), "1");
}

#[tokio::test]
async fn test_version_mismatch_warns_then_closes() {
    let (addr, _server) = start(builder().game_version(165).version_grace(Duration::ZERO)).await;
    let mut client = TestClient::connect(&addr).await;
    client.send(&ver_chk(1)).await;
    client.recv_containing("apiOK").await;

    client.send(&login("carol")).await;

    assert!(client.recv().await.contains("action='logOK'"));
    let warning = client.recv().await;
    assert!(warning.contains("action='dmnMsg'"));
    assert!(warning.contains("You do not have the Latest Version of the Game!"));
    assert_eq!(client.try_recv().await, None);
}

// =========================================================================
// Rooms and chat
// =========================================================================

#[tokio::test]
async fn test_first_join_lands_in_lobby_with_welcome() {
    let (addr, _server) = start(builder()).await;
    let mut client = TestClient::connect(&addr).await;
    client.send(&ver_chk(0)).await;
    client.send(&login("alice")).await;

    client
        .send("<msg t='sys'><body action='joinRoom' r='-1'><room id='7'/></body></msg>")
        .await;

    let joined = client.recv_containing("joinOK").await;
    assert_eq!(attr(&joined, "r"), "1");
    let welcome = client.recv_containing("prvMsg").await;
    assert!(welcome.contains("<user id='-1' />"));
    assert!(welcome.contains("ColonyBot!!&amp;&amp;!!<br><font size='20' color='#008000'>hello there</font>"));
}

#[tokio::test]
async fn test_showrooms_from_non_moderator_reaches_whole_room() {
    let (addr, _server) = start(builder()).await;
    let mut alice = TestClient::connect(&addr).await;
    let mut bob = TestClient::connect(&addr).await;
    alice.enter_lobby("alice").await;
    bob.enter_lobby("bob").await;

    alice.send(&pub_msg("/showrooms")).await;

    for client in [&mut alice, &mut bob] {
        let listing = client.recv_containing("MLX_6_Lobby (1): [").await;
        assert!(listing.contains("action='pubMsg'"));
        assert!(listing.contains("('alice', "));
        assert!(listing.contains("('bob', "));
        let chat = client.recv_containing("action='pubMsg'").await;
        assert!(chat.contains("<![CDATA[/showrooms]]>"));
    }
}

#[tokio::test]
async fn test_private_message_reaches_only_target() {
    let (addr, _server) = start(builder()).await;
    let mut alice = TestClient::connect(&addr).await;
    let mut bob = TestClient::connect(&addr).await;
    alice.enter_lobby("alice").await;
    let bob_id = bob.enter_lobby("bob").await;

    alice
        .send(&format!(
            "<msg t='sys'><body action='prvMsg' r='1'><txt rcp='{bob_id}'><![CDATA[bob!hi bob]]></txt></body></msg>"
        ))
        .await;

    let msg = bob.recv_containing("alice!!").await;
    assert!(msg.contains("action='prvMsg'"));
    assert!(msg.contains("<![CDATA[alice!!&amp;&amp;!!hi bob]]>"));
}

#[tokio::test]
async fn test_disconnect_notifies_remaining_members() {
    let (addr, _server) = start(builder()).await;
    let mut alice = TestClient::connect(&addr).await;
    let mut bob = TestClient::connect(&addr).await;
    alice.enter_lobby("alice").await;
    let bob_id = bob.enter_lobby("bob").await;

    drop(bob);

    let gone = alice.recv_containing("action='userGone'").await;
    assert_eq!(attr(&gone, "id"), bob_id.to_string());
    let count = alice.recv_containing("action='uCount'").await;
    assert_eq!(attr(&count, "u"), "1");
}

#[tokio::test]
async fn test_create_room_announces_and_moves_creator() {
    let (addr, _server) = start(builder()).await;
    let mut alice = TestClient::connect(&addr).await;
    let mut bob = TestClient::connect(&addr).await;
    alice.enter_lobby("alice").await;
    bob.enter_lobby("bob").await;

    alice
        .send("<msg t='sys'><body action='createRoom' r='1'><room tmp='1' gam='1' spec='0' exit='1'><name><![CDATA[duel]]></name></room></body></msg>")
        .await;

    let added = bob.recv_containing("action='roomAdd'").await;
    let room = attr(&added, "id");
    assert!(added.contains("<name><![CDATA[duel]]></name>"));
    let joined = alice.recv_containing("action='joinOK'").await;
    assert_eq!(attr(&joined, "r"), room);
    assert!(joined.contains("<var n='randomFactor' t='n'>"));
    bob.recv_containing("action='userGone'").await;
}

#[tokio::test]
async fn test_relay_order_reaches_room() {
    let (addr, _server) = start(builder()).await;
    let mut alice = TestClient::connect(&addr).await;
    let mut bob = TestClient::connect(&addr).await;
    alice.enter_lobby("alice").await;
    bob.enter_lobby("bob").await;

    alice
        .send("<msg t='sys'><body action='xtReq' r='1'><![CDATA[<dataObj><var n='cmd' t='s'>m</var><obj t='o' o='sub'><var n='pos' t='n'>2</var><var n='cmd' t='n'>2</var><obj t='o' o='sub'><var n='tar' t='n'>17</var><var n='px' t='n'>40</var><var n='py' t='n'>55</var></obj></obj></dataObj>]]></body></msg>")
        .await;

    for client in [&mut alice, &mut bob] {
        let record = client.recv_containing("%xt%").await;
        assert_eq!(record, "%xt%5%1%%2%2%17%40%55%");
    }
}

// =========================================================================
// Supervision
// =========================================================================

#[tokio::test]
async fn test_moderator_restart_warns_everyone_and_stops_server() {
    let (addr, server) = start(
        builder()
            .moderators(["Alice"])
            .restart_delay(Duration::ZERO),
    )
    .await;
    let mut alice = TestClient::connect(&addr).await;
    let mut bob = TestClient::connect(&addr).await;
    alice.enter_lobby("alice").await;
    bob.enter_lobby("bob").await;

    alice.send(&pub_msg("/restart")).await;

    let warning = bob.recv_containing("action='dmnMsg'").await;
    assert!(warning.contains("Server is about to restart in 0s."));
    let outcome = tokio::time::timeout(TIMEOUT, server)
        .await
        .expect("server should stop")
        .expect("server task should not panic")
        .expect("server should stop cleanly");
    assert_eq!(outcome, ShutdownRequest::Restart);
    assert_eq!(outcome.exit_code(), 42);
}

#[tokio::test]
async fn test_restart_from_non_moderator_is_just_chat() {
    let (addr, server) = start(builder().restart_delay(Duration::ZERO)).await;
    let mut alice = TestClient::connect(&addr).await;
    alice.enter_lobby("alice").await;

    alice.send(&pub_msg("/restart")).await;

    let chat = alice.recv_containing("action='pubMsg'").await;
    assert!(chat.contains("/restart"));
    assert!(!server.is_finished());
}

// =========================================================================
// Data objects
// =========================================================================

#[tokio::test]
async fn test_income_update_reaches_everyone_but_sender() {
    let (addr, _server) = start(builder()).await;
    let mut alice = TestClient::connect(&addr).await;
    let mut bob = TestClient::connect(&addr).await;
    let alice_id = alice.enter_lobby("alice").await;
    bob.enter_lobby("bob").await;

    alice
        .send(&payload(
            "asObj",
            "<dataObj><var n='id' t='s'>updateIncome</var><obj t='o' o='sub'><var n='pos' t='n'>2</var><var n='race' t='n'>1</var><var n='gold' t='n'>500</var></obj></dataObj>",
        ))
        .await;
    alice.send(&pub_msg("sync")).await;

    let update = bob.recv_containing("action='dataObj'").await;
    assert_eq!(
        update,
        data_obj_frame(
            "1",
            alice_id,
            "<dataObj><var n='id' t='s'>updateIncome</var><obj t='o' o='sub'><var n='pos' t='n'>2</var><var n='race' t='n'>1</var></obj></dataObj>"
        )
    );
    let seen = alice.recv_through("<![CDATA[sync]]>").await;
    assert!(seen.iter().all(|f| !f.contains("action='dataObj'")));
}

#[tokio::test]
async fn test_lobby_chat_object_reaches_others() {
    let (addr, _server) = start(builder()).await;
    let mut alice = TestClient::connect(&addr).await;
    let mut bob = TestClient::connect(&addr).await;
    let alice_id = alice.enter_lobby("alice").await;
    bob.enter_lobby("bob").await;

    alice
        .send(&payload(
            "asObj",
            "<dataObj><var n='id' t='s'>sendChat</var><obj t='o' o='sub'><var n='msg' t='s'>gl hf</var></obj></dataObj>",
        ))
        .await;

    let chat = bob.recv_containing("action='dataObj'").await;
    assert_eq!(
        chat,
        data_obj_frame(
            "1",
            alice_id,
            "<dataObj><obj t='o' o='sub'><var n='msg' t='s'>gl hf</var></obj><var n='id' t='s'>sendChat</var></dataObj>"
        )
    );
}

#[tokio::test]
async fn test_game_objects_are_rebuilt_and_broadcast() {
    let (addr, _server) = start(builder()).await;
    let mut alice = TestClient::connect(&addr).await;
    let mut bob = TestClient::connect(&addr).await;
    let alice_id = alice.enter_lobby("alice").await;
    let bob_id = bob.enter_lobby("bob").await;

    alice
        .send(&payload(
            "asObjG",
            &format!(
                "<dataObj><var n='id' t='s'>updateTeamDisplay</var><var n='_$$_' t='n'>{bob_id}</var><obj t='o' o='sub'><obj t='a' o='array'><var n='0' t='s'>1</var><var n='1' t='s'>2</var></obj></obj></dataObj>"
            ),
        ))
        .await;
    alice
        .send(&payload(
            "asObjG",
            "<dataObj><var n='id' t='s'>beginGame</var><obj t='o' o='sub'><var n='seed' t='s'>MapX</var><obj t='a' o='raceArray'><var n='0' t='n'>1</var><var n='1' t='n'>3</var></obj></obj></dataObj>",
        ))
        .await;
    alice
        .send(&payload(
            "asObjG",
            "<dataObj><var n='id' t='s'>killUnit</var><obj t='o' o='sub'><var n='unit' t='n'>14</var></obj></dataObj>",
        ))
        .await;
    alice
        .send(&payload(
            "asObjG",
            "<dataObj><var n='id' t='s'>orderUnit</var><obj t='o' o='sub'><var n='uid' t='n'>9</var><obj t='a' o='ord'><var n='0' t='n'>100</var><var n='1' t='n'>200</var></obj></obj></dataObj>",
        ))
        .await;

    let expected = [
        data_obj_frame(
            "1",
            bob_id,
            "<dataObj><var n='id' t='s'>updateTeamDisplay</var><obj t='o' o='sub'><obj t='a' o='array'><var n='0' t='s'>1</var><var n='1' t='s'>2</var></obj></obj></dataObj>",
        ),
        data_obj_frame(
            "1",
            alice_id,
            "<dataObj><var n='id' t='s'>beginGame</var><obj t='o' o='sub'><var n='randName' t='s'>MapX</var><obj t='a' o='raceArray'><var n='0' t='s'>1</var><var n='1' t='s'>3</var></obj></obj></dataObj>",
        ),
        data_obj_frame(
            "1",
            alice_id,
            "<dataObj><var n='id' t='s'>killUnit</var><obj t='a' o='sub'><var n='unit' t='n'>14</var></obj></dataObj>",
        ),
        data_obj_frame(
            "1",
            alice_id,
            "<dataObj><var n='id' t='s'>orderUnit</var><obj t='a' o='sub'><var n='id' t='n'>9</var><obj t='a' o='orderArray'><var n='0' t='n'>100</var><var n='1' t='n'>200</var></obj></obj></dataObj>",
        ),
    ];
    for client in [&mut alice, &mut bob] {
        for frame in &expected {
            assert_eq!(&client.recv_containing("action='dataObj'").await, frame);
        }
    }
}

#[tokio::test]
async fn test_kick_notifies_target_and_room() {
    let (addr, _server) = start(builder()).await;
    let mut alice = TestClient::connect(&addr).await;
    let mut bob = TestClient::connect(&addr).await;
    alice.enter_lobby("alice").await;
    let bob_id = bob.enter_lobby("bob").await;

    alice
        .send(&payload(
            "asObjG",
            &format!(
                "<dataObj><var n='id' t='s'>getKicked</var><var n='_$$_' t='n'>{bob_id}</var><obj t='a' o='sub'></obj></dataObj>"
            ),
        ))
        .await;

    let notice = bob.recv_containing("action='dataObj'").await;
    assert_eq!(
        notice,
        data_obj_frame(
            "1",
            bob_id,
            "<dataObj><obj t='a' o='sub'></obj><var n='id' t='s'>getKicked</var></dataObj>"
        )
    );
    for client in [&mut alice, &mut bob] {
        let gone = client.recv_containing("action='userGone'").await;
        assert_eq!(attr(&gone, "id"), bob_id.to_string());
    }
}

#[tokio::test]
async fn test_ally_chat_reaches_only_ally_and_team_chat_is_dropped() {
    let (addr, _server) = start(builder()).await;
    let mut alice = TestClient::connect(&addr).await;
    let mut bob = TestClient::connect(&addr).await;
    let mut carol = TestClient::connect(&addr).await;
    alice.enter_lobby("alice").await;
    let bob_id = bob.enter_lobby("bob").await;
    carol.enter_lobby("carol").await;

    alice
        .send(&payload(
            "asObjG",
            &format!(
                "<dataObj><var n='id' t='s'>sendChat</var><var n='_$$_' t='n'>{bob_id}</var><obj t='o' o='sub'><var n='msg' t='s'>push mid</var></obj></dataObj>"
            ),
        ))
        .await;
    alice
        .send(&payload(
            "asObjG",
            "<dataObj><var n='id' t='s'>sendTeamChat</var><obj t='o' o='sub'><var n='msg' t='s'>team</var></obj></dataObj>",
        ))
        .await;
    alice.send(&pub_msg("sync")).await;

    let chat = bob.recv_containing("action='dataObj'").await;
    assert_eq!(
        chat,
        data_obj_frame(
            "1",
            bob_id,
            "<dataObj><obj t='o' o='sub'><var n='msg' t='s'>push mid</var></obj><var n='id' t='s'>sendChat</var></dataObj>"
        )
    );
    for client in [&mut alice, &mut bob, &mut carol] {
        let seen = client.recv_through("<![CDATA[sync]]>").await;
        assert!(seen.iter().all(|f| !f.contains("action='dataObj'")));
    }
}

#[tokio::test]
async fn test_unknown_game_object_is_dropped_under_log_policy() {
    let (addr, _server) = start(builder()).await;
    let mut alice = TestClient::connect(&addr).await;
    alice.enter_lobby("alice").await;

    alice
        .send(&payload("asObjG", "<dataObj><var n='id' t='s'>dropNuke</var></dataObj>"))
        .await;
    alice.send(&pub_msg("still here")).await;

    let chat = alice.recv_containing("action='pubMsg'").await;
    assert!(chat.contains("<![CDATA[still here]]>"));
}

#[tokio::test]
async fn test_unknown_game_object_under_panic_policy_still_cleans_up() {
    let (addr, _server) = start(builder().unknown_case(UnknownCasePolicy::Panic)).await;
    let mut alice = TestClient::connect(&addr).await;
    let mut bob = TestClient::connect(&addr).await;
    let alice_id = alice.enter_lobby("alice").await;
    bob.enter_lobby("bob").await;

    alice
        .send(&payload("asObjG", "<dataObj><var n='id' t='s'>dropNuke</var></dataObj>"))
        .await;

    let gone = bob.recv_containing("action='userGone'").await;
    assert_eq!(attr(&gone, "id"), alice_id.to_string());
    let count = bob.recv_containing("action='uCount'").await;
    assert_eq!(attr(&count, "u"), "1");
}

// =========================================================================
// Relay
// =========================================================================

#[tokio::test]
async fn test_building_and_unit_orders_are_relayed() {
    let (addr, _server) = start(builder()).await;
    let mut alice = TestClient::connect(&addr).await;
    let mut bob = TestClient::connect(&addr).await;
    alice.enter_lobby("alice").await;
    bob.enter_lobby("bob").await;

    let orders = [
        (
            "<dataObj><var n='cmd' t='s'>m</var><obj t='o' o='sub'><var n='pos' t='n'>1</var><var n='cmd' t='n'>0</var><var n='option' t='s'>q</var><obj t='o' o='a'><var n='building' t='s'>barracks</var></obj><obj t='o' o='b'><var n='cancelOrder' t='n'>0</var><var n='auto' t='n'>1</var></obj></obj></dataObj>",
            "%xt%5%1%q%1%0%barracks%0%1%",
        ),
        (
            "<dataObj><var n='cmd' t='s'>m</var><obj t='o' o='sub'><var n='pos' t='n'>3</var><var n='cmd' t='n'>1</var><obj t='o' o='sub'><var n='setId' t='s'>u7</var><obj t='a' o='random'><var n='0' t='n'>4</var><var n='1' t='n'>5</var><var n='2' t='n'>6</var></obj></obj></obj></dataObj>",
            "%xt%5%1%%3%1%u7%4%5%6%",
        ),
        (
            "<dataObj><var n='cmd' t='s'>m</var><obj t='o' o='sub'><var n='pos' t='n'>3</var><var n='cmd' t='n'>1</var><obj t='o' o='sub'><var n='setId' t='s'>u8</var><obj t='a' o='random'><var n='0' t='n'>4</var></obj></obj></obj></dataObj>",
            "%xt%5%1%%3%1%u8%4%0%",
        ),
    ];
    for (request, _) in &orders {
        alice.send(&payload("xtReq", request)).await;
    }

    for client in [&mut alice, &mut bob] {
        for (_, record) in &orders {
            assert_eq!(&client.recv_containing("%xt%").await, record);
        }
    }
}

// =========================================================================
// User and room variables
// =========================================================================

#[tokio::test]
async fn test_user_vars_are_echoed_and_unknown_names_rejected() {
    let (addr, _server) = start(builder()).await;
    let mut alice = TestClient::connect(&addr).await;
    let mut bob = TestClient::connect(&addr).await;
    let alice_id = alice.enter_lobby("alice").await;
    bob.enter_lobby("bob").await;

    alice
        .send(&vars(
            "setUvars",
            "<var n='rank' t='n'><![CDATA[9]]></var><var n='hat' t='s'><![CDATA[red]]></var>",
        ))
        .await;
    alice
        .send(&vars(
            "setUvars",
            "<var n='rank' t='n'><![CDATA[7]]></var><var n='race' t='n'><![CDATA[2]]></var>",
        ))
        .await;

    let expected = format!(
        "<msg t='sys'><body action='uVarsUpdate' r='1'><user id='{alice_id}' /><vars><var n='rank' t='n'><![CDATA[7]]></var><var n='race' t='n'><![CDATA[2]]></var></vars></body></msg>"
    );
    for client in [&mut alice, &mut bob] {
        assert_eq!(client.recv_containing("action='uVarsUpdate'").await, expected);
    }

    let mut carol = TestClient::connect(&addr).await;
    carol.enter_lobby("carol").await;
    let entry = carol
        .recv_containing(&format!("<u i='{alice_id}' m='0' s='0'"))
        .await;
    assert!(entry.contains("<var n='rank' t='n'><![CDATA[7]]></var>"));
}

#[tokio::test]
async fn test_room_vars_reach_next_joiner_of_game_room() {
    let (addr, _server) = start(builder()).await;
    let mut alice = TestClient::connect(&addr).await;
    let mut bob = TestClient::connect(&addr).await;
    let alice_id = alice.enter_lobby("alice").await;
    bob.enter_lobby("bob").await;

    alice
        .send("<msg t='sys'><body action='createRoom' r='1'><room tmp='1' gam='1' spec='0' exit='1'><name><![CDATA[duel]]></name></room></body></msg>")
        .await;
    let joined = alice.recv_containing("action='joinOK'").await;
    let room = attr(&joined, "r");
    alice
        .send(&vars(
            "setRvars",
            &format!(
                "<var n='gs' t='n'><![CDATA[2]]></var><var n='roomLeader' t='n'><![CDATA[{alice_id}]]></var><var n='randomFactor' t='n'><![CDATA[77]]></var>"
            ),
        ))
        .await;
    let echo = alice.recv_containing("action='rVarsUpdate'").await;
    assert_eq!(attr(&echo, "r"), room);

    bob.send(&format!(
        "<msg t='sys'><body action='joinRoom' r='1'><room id='{room}' pwd='' spec='0' leave='1' old='1'/></body></msg>"
    ))
    .await;

    let bob_joined = bob.recv_containing("action='joinOK'").await;
    assert!(bob_joined.contains(&format!(
        "<var n='gs' t='n'><![CDATA[2]]></var><var n='randomFactor' t='n'><![CDATA[77]]></var><var n='roomLeader' t='n'><![CDATA[{alice_id}]]></var>"
    )));
}

// =========================================================================
// Buddies
// =========================================================================

#[tokio::test]
async fn test_buddy_list_and_presence_notices() {
    let (addr, _server) = start(builder()).await;
    let mut bob = TestClient::connect(&addr).await;
    let mut alice = TestClient::connect(&addr).await;
    let bob_id = bob.enter_lobby("bob").await;
    let alice_id = alice.enter_lobby("alice").await;

    alice
        .send("<msg t='sys'><body action='addB' r='-1'><n><![CDATA[bob]]></n></body></msg>")
        .await;
    assert_eq!(
        alice.recv_containing("action='bAdd'").await,
        "<msg t='sys'><body action='bAdd' r='-1'><b s='1' i='0'><n><![CDATA[bob]]></n></b></body></msg>"
    );
    alice
        .send("<msg t='sys'><body action='loadB' r='-1'></body></msg>")
        .await;
    let list = alice.recv_containing("action='bList'").await;
    assert!(list.contains(&format!("<b s='1' i='{bob_id}'><n><![CDATA[bob]]></n></b>")));

    drop(alice);
    let offline = bob.recv_containing("action='bUpd'").await;
    assert!(offline.contains(&format!("<b s='0' i='{alice_id}'><n><![CDATA[alice]]></n></b>")));

    let mut alice = TestClient::connect(&addr).await;
    assert_eq!(alice.enter_lobby("alice").await, alice_id);
    let online = bob.recv_containing("action='bUpd'").await;
    assert!(online.contains(&format!("<b s='1' i='{alice_id}'><n><![CDATA[alice]]></n></b>")));
}

#[tokio::test]
async fn test_unknown_buddy_is_not_added() {
    let (addr, _server) = start(builder()).await;
    let mut alice = TestClient::connect(&addr).await;
    alice.enter_lobby("alice").await;

    alice
        .send("<msg t='sys'><body action='addB' r='-1'><n><![CDATA[nobody]]></n></body></msg>")
        .await;
    alice
        .send("<msg t='sys'><body action='loadB' r='-1'></body></msg>")
        .await;

    let seen = alice.recv_through("action='bList'").await;
    assert!(seen.iter().all(|f| !f.contains("action='bAdd'")));
    assert!(seen.last().unwrap().contains("<bList></bList>"));
}

// =========================================================================
// Configuration
// =========================================================================

#[tokio::test]
async fn test_server_built_from_toml_config() {
    let config = ServerConfig::from_toml(
        r#"
        [connection]
        address = "127.0.0.1"
        port = 0

        [admin]
        moderators = ["Root"]

        [welcome]
        message = "from file"

        [server]
        unknown_case = "log"
        "#,
    )
    .expect("config should parse");
    let (addr, _server) = start(ColonyServerBuilder::from_config(&config)).await;
    let mut client = TestClient::connect(&addr).await;
    client.send(&ver_chk(0)).await;
    client.send(&login("root")).await;

    let ok = client.recv_containing("action='logOK'").await;
    assert_eq!(attr(&ok, "mod"), "1");
    client.send(JOIN_LOBBY).await;
    let welcome = client.recv_containing("action='prvMsg'").await;
    assert!(welcome.contains("ColonyBot!!&amp;&amp;!!<br><font size='20' color='#008000'>from file</font>"));
}
