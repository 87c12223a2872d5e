use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tlt_server::config::ServerConfig;
use tlt_server::state::AppState;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

/// Spin up a test server on a random port, return its address and state.
async fn start_server() -> (SocketAddr, Arc<AppState>) {
    let config = ServerConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
    };
    let (listener, state) = tlt_server::build_server(&config).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let serve_state = state.clone();
    tokio::spawn(async move {
        tlt_server::serve(listener, serve_state).await.unwrap();
    });

    (addr, state)
}

struct Client {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl Client {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, writer) = stream.into_split();
        Self {
            lines: BufReader::new(read_half).lines(),
            writer,
        }
    }

    async fn send(&mut self, line: &str) {
        self.send_raw(format!("{}\n", line).as_bytes()).await;
    }

    async fn send_raw(&mut self, bytes: &[u8]) {
        self.writer.write_all(bytes).await.unwrap();
    }

    /// Next line, or `None` once the server closed the connection.
    async fn recv(&mut self) -> Option<String> {
        tokio::time::timeout(Duration::from_secs(5), self.lines.next_line())
            .await
            .expect("timed out waiting for a line")
            .unwrap()
    }

    async fn expect(&mut self, expected: &[&str]) {
        for want in expected {
            let got = self.recv().await;
            assert_eq!(got.as_deref(), Some(*want));
        }
    }

    async fn expect_closed(&mut self) {
        assert_eq!(self.recv().await, None);
    }

    /// Assert that nothing arrives for a short while.
    async fn expect_silence(&mut self) {
        let res = tokio::time::timeout(Duration::from_millis(150), self.lines.next_line()).await;
        assert!(res.is_err(), "unexpected line: {:?}", res);
    }
}

/// Connect Alice (X) and Bob (O) and consume their start sequences.
async fn pair(addr: SocketAddr) -> (Client, Client) {
    let mut alice = Client::connect(addr).await;
    alice.send("CONNECT Alice").await;
    alice.expect(&["WAITING"]).await;

    let mut bob = Client::connect(addr).await;
    bob.send("CONNECT Bob").await;

    alice
        .expect(&["WELCOME X Bob", "BOARD .........", "TURN X"])
        .await;
    bob.expect(&["WELCOME O Alice", "BOARD .........", "TURN X"])
        .await;
    (alice, bob)
}

/// Play a list of moves, alternating X and O, consuming every resulting line.
async fn play(alice: &mut Client, bob: &mut Client, moves: &[(u8, u8)]) {
    for (i, (r, c)) in moves.iter().enumerate() {
        let (mover, other) = if i % 2 == 0 {
            (&mut *alice, &mut *bob)
        } else {
            (&mut *bob, &mut *alice)
        };
        mover.send(&format!("MOVE {} {}", r, c)).await;
        // Eviction, board, turn, confirmation: skip until the confirmation.
        loop {
            let line = mover.recv().await.unwrap();
            if line.starts_with("VALID_MOVE") {
                break;
            }
        }
        loop {
            let line = other.recv().await.unwrap();
            if line.starts_with("TURN") {
                break;
            }
        }
    }
}

async fn wait_for_empty_registry(state: &AppState) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !state.registry.is_empty() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "match was never retired"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

// ── Tests ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_pairing_assigns_symbols_in_arrival_order() {
    let (addr, state) = start_server().await;
    let (_alice, _bob) = pair(addr).await;
    assert_eq!(state.registry.len(), 1);
}

#[tokio::test]
async fn test_accepted_move() {
    let (addr, _state) = start_server().await;
    let (mut alice, mut bob) = pair(addr).await;

    alice.send("MOVE 0 0").await;
    alice
        .expect(&["BOARD X........", "TURN O", "VALID_MOVE 0 0 X"])
        .await;
    bob.expect(&["BOARD X........", "TURN O"]).await;
    bob.expect_silence().await;
}

#[tokio::test]
async fn test_wrong_turn_only_reaches_mover() {
    let (addr, _state) = start_server().await;
    let (mut alice, mut bob) = pair(addr).await;

    alice.send("MOVE 0 0").await;
    alice
        .expect(&["BOARD X........", "TURN O", "VALID_MOVE 0 0 X"])
        .await;
    bob.expect(&["BOARD X........", "TURN O"]).await;

    alice.send("MOVE 1 1").await;
    alice.expect(&["ERROR Not your turn"]).await;
    bob.expect_silence().await;

    // Board unchanged.
    alice.send("BOARD?").await;
    alice.expect(&["BOARD X........"]).await;
    bob.expect(&["BOARD X........"]).await;
}

#[tokio::test]
async fn test_rule_violations() {
    let (addr, _state) = start_server().await;
    let (mut alice, mut bob) = pair(addr).await;

    alice.send("MOVE 3 0").await;
    alice.expect(&["ERROR Invalid coordinates"]).await;
    alice.send("MOVE -1 2").await;
    alice.expect(&["ERROR Invalid coordinates"]).await;

    play(&mut alice, &mut bob, &[(1, 1)]).await;
    bob.send("MOVE 1 1").await;
    bob.expect(&["ERROR Cell already occupied"]).await;
}

#[tokio::test]
async fn test_protocol_errors_keep_connection_open() {
    let (addr, _state) = start_server().await;
    let (mut alice, _bob) = pair(addr).await;

    alice.send("MOVE a b").await;
    alice.expect(&["ERROR Invalid move format"]).await;
    alice.send("MOVE 1").await;
    alice.expect(&["ERROR Invalid MOVE command format"]).await;
    alice.send("DANCE").await;
    alice.expect(&["ERROR Unknown command"]).await;
    alice.send("").await;
    alice.send("PING").await;
    alice.expect(&["PONG"]).await;
}

#[tokio::test]
async fn test_invalid_utf8_is_a_protocol_error() {
    let (addr, state) = start_server().await;
    let (mut alice, mut bob) = pair(addr).await;

    bob.send_raw(b"MOVE \xff 1\n").await;
    bob.expect(&["ERROR Invalid move format"]).await;
    alice.expect_silence().await;

    bob.send_raw(b"\xfe\xff\n").await;
    bob.expect(&["ERROR Unknown command"]).await;

    // Still paired and playing.
    alice.send("MOVE 0 0").await;
    alice
        .expect(&["BOARD X........", "TURN O", "VALID_MOVE 0 0 X"])
        .await;
    bob.expect(&["BOARD X........", "TURN O"]).await;
    assert_eq!(state.registry.len(), 1);
}

#[tokio::test]
async fn test_overlong_line_is_rejected_without_closing() {
    let (addr, _state) = start_server().await;
    let (mut alice, mut bob) = pair(addr).await;

    let junk = vec![b'A'; tlt_server::codec::MAX_LINE_LEN * 4];
    bob.send_raw(&junk).await;
    bob.send_raw(b"\n").await;
    bob.expect(&["ERROR Line too long"]).await;
    alice.expect_silence().await;

    bob.send("PING").await;
    bob.expect(&["PONG"]).await;
}

#[tokio::test]
async fn test_invalid_utf8_handshake_is_rejected() {
    let (addr, _state) = start_server().await;

    let mut client = Client::connect(addr).await;
    client.send_raw(b"\xffCONNECT Alice\n").await;
    client.expect(&["ERROR Invalid connection message"]).await;
    client.expect_closed().await;
}

#[tokio::test]
async fn test_fourth_mark_evicts_oldest() {
    let (addr, _state) = start_server().await;
    let (mut alice, mut bob) = pair(addr).await;

    play(
        &mut alice,
        &mut bob,
        &[(0, 0), (2, 0), (0, 1), (1, 1), (1, 0), (1, 2)],
    )
    .await;

    alice.send("MOVE 2 2").await;
    alice
        .expect(&[
            "REMOVE 0 0",
            "BOARD .X.XOOO.X",
            "TURN O",
            "VALID_MOVE 2 2 X",
        ])
        .await;
    bob.expect(&["REMOVE 0 0", "BOARD .X.XOOO.X", "TURN O"])
        .await;
}

#[tokio::test]
async fn test_win_broadcasts_winner_and_game_over() {
    let (addr, state) = start_server().await;
    let (mut alice, mut bob) = pair(addr).await;

    play(&mut alice, &mut bob, &[(0, 0), (1, 0), (0, 1), (1, 1)]).await;

    alice.send("MOVE 0 2").await;
    alice
        .expect(&["BOARD XXXOO....", "WINNER X", "GAME_OVER"])
        .await;
    bob.expect(&["BOARD XXXOO....", "WINNER X", "GAME_OVER"])
        .await;
    alice.expect_silence().await;

    bob.send("MOVE 2 2").await;
    bob.expect(&["ERROR Game already finished"]).await;

    drop(alice);
    drop(bob);
    wait_for_empty_registry(&state).await;
}

#[tokio::test]
async fn test_disconnect_notifies_opponent_once() {
    let (addr, state) = start_server().await;
    let (mut alice, mut bob) = pair(addr).await;

    play(&mut alice, &mut bob, &[(0, 0)]).await;
    drop(bob);

    alice
        .expect(&["OPPONENT_DISCONNECTED", "GAME_OVER"])
        .await;
    alice.send("MOVE 1 1").await;
    alice.expect(&["ERROR Game already finished"]).await;
    alice.expect_silence().await;

    drop(alice);
    wait_for_empty_registry(&state).await;
}

#[tokio::test]
async fn test_quit_closes_quitter_and_notifies_opponent() {
    let (addr, _state) = start_server().await;
    let (mut alice, mut bob) = pair(addr).await;

    bob.send("QUIT").await;
    bob.expect_closed().await;
    alice
        .expect(&["OPPONENT_DISCONNECTED", "GAME_OVER"])
        .await;
}

#[tokio::test]
async fn test_invalid_handshake_is_rejected() {
    let (addr, state) = start_server().await;

    let mut client = Client::connect(addr).await;
    client.send("MOVE 0 0").await;
    client.expect(&["ERROR Invalid connection message"]).await;
    client.expect_closed().await;

    assert_eq!(state.matchmaker.waiting_conn(), None);
}

#[tokio::test]
async fn test_empty_username_becomes_guest() {
    let (addr, _state) = start_server().await;

    let mut alice = Client::connect(addr).await;
    alice.send("CONNECT Alice").await;
    alice.expect(&["WAITING"]).await;

    let mut guest = Client::connect(addr).await;
    guest.send("CONNECT").await;
    let welcome = guest.recv().await.unwrap();
    assert_eq!(welcome, "WELCOME O Alice");

    let welcome = alice.recv().await.unwrap();
    assert!(welcome.starts_with("WELCOME X Guest_"), "{}", welcome);
}

#[tokio::test]
async fn test_waiting_player_commands() {
    let (addr, _state) = start_server().await;

    let mut alice = Client::connect(addr).await;
    alice.send("CONNECT Alice").await;
    alice.expect(&["WAITING"]).await;

    alice.send("PING").await;
    alice.expect(&["PONG"]).await;
    alice.send("MOVE 0 0").await;
    alice.expect(&["ERROR Waiting for opponent"]).await;
}

#[tokio::test]
async fn test_departed_waiter_is_not_paired() {
    let (addr, state) = start_server().await;

    let mut ghost = Client::connect(addr).await;
    ghost.send("CONNECT Ghost").await;
    ghost.expect(&["WAITING"]).await;
    drop(ghost);

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while state.matchmaker.waiting_conn().is_some() {
        assert!(tokio::time::Instant::now() < deadline);
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let (_carol, _dave) = pair(addr).await;
    assert_eq!(state.registry.len(), 1);
}

#[tokio::test]
async fn test_matches_are_independent() {
    let (addr, state) = start_server().await;
    let (mut a1, mut b1) = pair(addr).await;
    let (mut a2, mut b2) = pair(addr).await;
    assert_eq!(state.registry.len(), 2);

    a1.send("MOVE 1 1").await;
    a1.expect(&["BOARD ....X....", "TURN O", "VALID_MOVE 1 1 X"])
        .await;
    b1.expect(&["BOARD ....X....", "TURN O"]).await;
    a2.expect_silence().await;
    b2.expect_silence().await;

    a2.send("MOVE 1 1").await;
    a2.expect(&["BOARD ....X....", "TURN O", "VALID_MOVE 1 1 X"])
        .await;
}
