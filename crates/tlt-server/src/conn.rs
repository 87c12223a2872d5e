use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;
use tokio_util::codec::FramedRead;
use tracing::{debug, info, warn};

use tlt_core::protocol::username_or_guest;
use tlt_core::{ClientCommand, Outcome, ProtocolError, ServerMessage, Symbol};

use crate::codec::{Inbound, LineCodec};
use crate::matchmaker::Pairing;
use crate::session::Match;
use crate::state::{AppState, ConnId, Outbound, Participant};

/// Where a connection stands after its handshake.
enum Phase {
    Waiting,
    Playing { game: Arc<Match>, symbol: Symbol },
}

/// What the read loop does after handling one line.
enum Flow {
    Continue,
    Quit,
}

/// Top-level connection handler -- spawned per accepted socket.
pub async fn handle_connection(state: Arc<AppState>, stream: TcpStream, peer: SocketAddr) {
    let conn_id = state.next_conn_id();
    let open = state.connection_count.fetch_add(1, Ordering::Relaxed) + 1;
    info!(conn = conn_id, %peer, open, "connection accepted");

    let (read_half, mut writer) = stream.into_split();
    let mut lines = FramedRead::new(read_half, LineCodec::new());

    if let Some(username) = handshake(conn_id, &mut lines, &mut writer).await {
        run_session(&state, conn_id, username, lines, writer).await;
    }

    let open = state.connection_count.fetch_sub(1, Ordering::Relaxed) - 1;
    info!(conn = conn_id, open, "connection closed");
}

/// Read the first line and extract the username. `None` closes the socket.
async fn handshake(
    conn_id: ConnId,
    lines: &mut FramedRead<OwnedReadHalf, LineCodec>,
    writer: &mut OwnedWriteHalf,
) -> Option<String> {
    let line = match lines.next().await {
        Some(Ok(Inbound::Line(line))) => Some(line),
        Some(Ok(Inbound::TooLong)) => None,
        None => {
            debug!(conn = conn_id, "closed before handshake");
            return None;
        }
        Some(Err(e)) => {
            warn!(conn = conn_id, error = %e, "read failed before handshake");
            return None;
        }
    };
    debug!(conn = conn_id, ?line, "handshake line");

    let command = line.as_deref().map(ClientCommand::parse);
    match command {
        Some(Ok(Some(ClientCommand::Connect { username }))) => Some(username_or_guest(&username)),
        _ => {
            let reply = ServerMessage::error(ProtocolError::InvalidHandshake);
            let _ = write_line(writer, &reply).await;
            info!(conn = conn_id, ?line, "rejected handshake");
            None
        }
    }
}

async fn write_line(writer: &mut OwnedWriteHalf, msg: &ServerMessage) -> std::io::Result<()> {
    let mut line = msg.to_string();
    line.push('\n');
    writer.write_all(line.as_bytes()).await
}

async fn run_session(
    state: &Arc<AppState>,
    conn_id: ConnId,
    username: String,
    mut lines: FramedRead<OwnedReadHalf, LineCodec>,
    mut writer: OwnedWriteHalf,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<Outbound>();
    let me = Participant::new(conn_id, username, tx);
    info!(conn = conn_id, user = %me.username, "player connected");

    let mut phase = match state.matchmaker.offer(me.clone(), &state.registry) {
        Pairing::Waiting => Phase::Waiting,
        Pairing::Paired(game) => Phase::Playing {
            game,
            symbol: Symbol::O,
        },
    };
    let mut exit = Outcome::Disconnected;

    loop {
        tokio::select! {
            // Drain queued output (including a pairing notice) before reading more input.
            biased;

            // Outbound: write queued lines, in order, to this socket only.
            Some(out) = rx.recv() => match out {
                Outbound::Line(msg) => {
                    debug!(conn = conn_id, %msg, "send");
                    if let Err(e) = write_line(&mut writer, &msg).await {
                        warn!(conn = conn_id, error = %e, "write failed");
                        break;
                    }
                }
                Outbound::Paired(game) => {
                    phase = Phase::Playing { game, symbol: Symbol::X };
                }
            },
            // Inbound: one command per line.
            line = lines.next() => match line {
                Some(Ok(Inbound::Line(line))) => {
                    debug!(conn = conn_id, %line, "recv");
                    if let Flow::Quit = handle_line(&me, &phase, &line) {
                        exit = Outcome::Quit;
                        break;
                    }
                }
                Some(Ok(Inbound::TooLong)) => {
                    debug!(conn = conn_id, "dropped overlong line");
                    me.send(ServerMessage::error(ProtocolError::LineTooLong));
                }
                None => break,
                Some(Err(e)) => {
                    warn!(conn = conn_id, error = %e, "read failed");
                    break;
                }
            },
        }
    }

    me.mark_disconnected();

    // A parked connection may have been paired after its last loop turn; the
    // pairing notice is then already queued.
    if let Phase::Waiting = phase {
        if !state.matchmaker.withdraw(conn_id) {
            while let Ok(out) = rx.try_recv() {
                if let Outbound::Paired(game) = out {
                    phase = Phase::Playing {
                        game,
                        symbol: Symbol::X,
                    };
                }
            }
        }
    }

    if let Phase::Playing { game, symbol } = phase {
        match exit {
            Outcome::Quit => game.quit(symbol),
            _ => game.disconnect(symbol),
        };
        state.registry.release(&game);
    }
}

fn handle_line(me: &Participant, phase: &Phase, line: &str) -> Flow {
    let cmd = match ClientCommand::parse(line) {
        Ok(Some(cmd)) => cmd,
        Ok(None) => return Flow::Continue,
        Err(e) => {
            me.send(ServerMessage::error(e));
            return Flow::Continue;
        }
    };

    match (phase, cmd) {
        (_, ClientCommand::Ping) => me.send(ServerMessage::Pong),
        (_, ClientCommand::Quit) => return Flow::Quit,
        (_, ClientCommand::Connect { .. }) => {
            me.send(ServerMessage::error(ProtocolError::UnknownCommand))
        }
        (Phase::Waiting, ClientCommand::Move { .. } | ClientCommand::BoardQuery) => {
            me.send(ServerMessage::error(ProtocolError::NotPaired))
        }
        (Phase::Playing { game, .. }, ClientCommand::BoardQuery) => game.broadcast_board(),
        (Phase::Playing { game, symbol }, ClientCommand::Move { row, col }) => {
            match game.attempt_move(*symbol, row, col) {
                Ok(reply) => debug!(conn = me.conn_id, match_id = game.id(), ?reply, "move accepted"),
                Err(e) => {
                    debug!(conn = me.conn_id, match_id = game.id(), row, col, reason = %e, "move rejected");
                    me.send(ServerMessage::error(e));
                }
            }
        }
    }
    Flow::Continue
}
