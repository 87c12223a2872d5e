use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use tokio::sync::mpsc;

use tlt_core::ServerMessage;

use crate::matchmaker::Matchmaker;
use crate::registry::Registry;
use crate::session::Match;

pub type ConnId = u64;

/// What a connection task pulls off its outbound queue.
#[derive(Debug)]
pub enum Outbound {
    /// A line to write to the socket.
    Line(ServerMessage),
    /// The matchmaker paired this parked connection into a match.
    Paired(Arc<Match>),
}

/// Handle to push messages to one connected player.
///
/// Every send goes through the connection's single outbound queue, which its
/// task drains in order, so lines to one socket never interleave.
#[derive(Debug, Clone)]
pub struct Participant {
    pub conn_id: ConnId,
    pub username: String,
    tx: mpsc::UnboundedSender<Outbound>,
    connected: Arc<AtomicBool>,
}

impl Participant {
    pub fn new(conn_id: ConnId, username: String, tx: mpsc::UnboundedSender<Outbound>) -> Self {
        Self {
            conn_id,
            username,
            tx,
            connected: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Queue a line for this player. Dropped silently once disconnected.
    pub fn send(&self, msg: ServerMessage) {
        if self.is_connected() {
            let _ = self.tx.send(Outbound::Line(msg));
        }
    }

    pub(crate) fn notify_paired(&self, game: Arc<Match>) {
        let _ = self.tx.send(Outbound::Paired(game));
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire) && !self.tx.is_closed()
    }

    pub fn mark_disconnected(&self) {
        self.connected.store(false, Ordering::Release);
    }
}

/// Shared application state.
pub struct AppState {
    pub matchmaker: Matchmaker,
    pub registry: Registry,
    pub connection_count: AtomicU32,
    next_conn_id: AtomicU64,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        Self {
            matchmaker: Matchmaker::new(),
            registry: Registry::new(),
            connection_count: AtomicU32::new(0),
            next_conn_id: AtomicU64::new(1),
        }
    }

    pub fn next_conn_id(&self) -> ConnId {
        self.next_conn_id.fetch_add(1, Ordering::Relaxed)
    }
}
