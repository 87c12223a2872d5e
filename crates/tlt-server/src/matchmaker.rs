use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::info;

use tlt_core::ServerMessage;

use crate::registry::Registry;
use crate::session::Match;
use crate::state::{ConnId, Participant};

pub enum Pairing {
    /// Parked in the waiting slot.
    Waiting,
    /// Paired as O into this match, which has already been started.
    Paired(Arc<Match>),
}

/// Single-slot pairing queue: the first arrival waits, the second one plays.
#[derive(Debug)]
pub struct Matchmaker {
    waiting: Mutex<Option<Participant>>,
    next_match_id: AtomicU64,
}

impl Default for Matchmaker {
    fn default() -> Self {
        Self::new()
    }
}

impl Matchmaker {
    pub fn new() -> Self {
        Self {
            waiting: Mutex::new(None),
            next_match_id: AtomicU64::new(1),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<Participant>> {
        self.waiting.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Park `participant` or pair it with whoever is waiting.
    ///
    /// The whole check-and-store or check-and-pair runs under the slot lock,
    /// including registering the new match, telling the parked connection
    /// about it, and sending the start sequence.
    pub fn offer(&self, participant: Participant, registry: &Registry) -> Pairing {
        let mut slot = self.slot();
        match slot.take() {
            None => {
                info!(conn = participant.conn_id, user = %participant.username, "waiting for opponent");
                participant.send(ServerMessage::Waiting);
                *slot = Some(participant);
                Pairing::Waiting
            }
            Some(waiting) => {
                let id = self.next_match_id.fetch_add(1, Ordering::Relaxed);
                let game = Arc::new(Match::new(id, waiting.clone(), participant));
                registry.insert(game.clone());
                waiting.notify_paired(game.clone());
                game.start();
                Pairing::Paired(game)
            }
        }
    }

    /// Drop `conn_id` from the slot if it is still waiting there. Returns
    /// `false` if it was already paired (or never parked).
    pub fn withdraw(&self, conn_id: ConnId) -> bool {
        let mut slot = self.slot();
        match slot.as_ref() {
            Some(p) if p.conn_id == conn_id => {
                info!(conn = conn_id, user = %p.username, "left the waiting slot");
                *slot = None;
                true
            }
            _ => false,
        }
    }

    pub fn waiting_conn(&self) -> Option<ConnId> {
        self.slot().as_ref().map(|p| p.conn_id)
    }
}
