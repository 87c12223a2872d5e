use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use tlt_core::{
    Board, GameState, MoveError, MoveRecord, NextTurn, Outcome, ServerMessage, Symbol,
};

use crate::state::{ConnId, Participant};

pub type MatchId = u64;

/// Result of an accepted move, for the mover's connection to relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveReply {
    Accepted(MoveRecord),
    Winner(Symbol),
}

/// One two-player game from pairing to its terminal outcome.
///
/// All game state lives behind a single lock. Broadcasts caused by a mutation
/// are queued while that lock is held, so both players see every match's
/// events in the order they were applied.
#[derive(Debug)]
pub struct Match {
    id: MatchId,
    x: Participant,
    o: Participant,
    state: Mutex<GameState>,
    open_loops: AtomicUsize,
}

impl Match {
    pub fn new(id: MatchId, x: Participant, o: Participant) -> Self {
        Self {
            id,
            x,
            o,
            state: Mutex::new(GameState::new()),
            open_loops: AtomicUsize::new(2),
        }
    }

    pub fn id(&self) -> MatchId {
        self.id
    }

    fn lock(&self) -> MutexGuard<'_, GameState> {
        // Nothing panics while holding the lock, but a poisoned state is
        // still consistent: every mutation is applied in one step.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn participant(&self, symbol: Symbol) -> &Participant {
        match symbol {
            Symbol::X => &self.x,
            Symbol::O => &self.o,
        }
    }

    pub fn symbol_of(&self, conn_id: ConnId) -> Option<Symbol> {
        if self.x.conn_id == conn_id {
            Some(Symbol::X)
        } else if self.o.conn_id == conn_id {
            Some(Symbol::O)
        } else {
            None
        }
    }

    fn broadcast(&self, msg: ServerMessage) {
        self.x.send(msg.clone());
        self.o.send(msg);
    }

    /// Welcome both players and send the opening board and turn.
    pub fn start(&self) {
        let state = self.lock();
        self.x.send(ServerMessage::Welcome {
            symbol: Symbol::X,
            opponent: self.o.username.clone(),
        });
        self.o.send(ServerMessage::Welcome {
            symbol: Symbol::O,
            opponent: self.x.username.clone(),
        });
        self.broadcast(ServerMessage::Board(*state.board()));
        self.send_turn(&state);
        info!(
            match_id = self.id,
            x = %self.x.username,
            o = %self.o.username,
            "match started"
        );
    }

    /// Validate and apply a move for `symbol`, broadcasting its effects.
    ///
    /// Eviction (if any), the new board, and then either the next turn plus the
    /// mover's confirmation or the winner and game over are queued in that
    /// order before the lock is released.
    pub fn attempt_move(
        &self,
        symbol: Symbol,
        row: i32,
        col: i32,
    ) -> Result<MoveReply, MoveError> {
        let mut state = self.lock();
        let outcome = state.attempt_move(symbol, row, col)?;

        if let Some(evicted) = outcome.evicted {
            debug!(match_id = self.id, %symbol, %evicted, "evicted oldest mark");
            self.broadcast(ServerMessage::Remove(evicted));
        }
        self.broadcast(ServerMessage::Board(outcome.board));

        let reply = match outcome.next {
            NextTurn::Turn(_) => {
                self.send_turn(&state);
                self.participant(symbol).send(ServerMessage::ValidMove {
                    position: outcome.placed.position,
                    symbol,
                });
                MoveReply::Accepted(outcome.placed)
            }
            NextTurn::Winner(winner) => {
                self.broadcast(ServerMessage::Winner(winner));
                self.broadcast(ServerMessage::GameOver);
                info!(match_id = self.id, %winner, "match won");
                MoveReply::Winner(winner)
            }
        };
        debug!(match_id = self.id, status = %state.status_line(), "move applied");
        Ok(reply)
    }

    /// The player on `symbol` left. No-op if the match already ended.
    pub fn disconnect(&self, symbol: Symbol) -> bool {
        self.leave(symbol, Outcome::Disconnected)
    }

    /// The player on `symbol` quit. No-op if the match already ended.
    pub fn quit(&self, symbol: Symbol) -> bool {
        self.leave(symbol, Outcome::Quit)
    }

    fn leave(&self, symbol: Symbol, outcome: Outcome) -> bool {
        let mut state = self.lock();
        if !state.finish(outcome) {
            return false;
        }
        let opponent = self.participant(symbol.other());
        opponent.send(ServerMessage::OpponentDisconnected);
        opponent.send(ServerMessage::GameOver);
        info!(
            match_id = self.id,
            leaver = %self.participant(symbol).username,
            ?outcome,
            "match ended early"
        );
        true
    }

    pub fn snapshot_board(&self) -> Board {
        *self.lock().board()
    }

    pub fn broadcast_board(&self) {
        let state = self.lock();
        self.broadcast(ServerMessage::Board(*state.board()));
    }

    pub fn broadcast_turn(&self) {
        let state = self.lock();
        self.send_turn(&state);
    }

    fn send_turn(&self, state: &GameState) {
        self.broadcast(ServerMessage::Turn(state.current_turn()));
    }

    pub fn is_finished(&self) -> bool {
        self.lock().is_finished()
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.lock().outcome()
    }

    /// Record that one bound command loop has exited. Returns `true` for the
    /// last one, after which the match can be retired.
    pub fn loop_exited(&self) -> bool {
        self.open_loops.fetch_sub(1, Ordering::AcqRel) == 1
    }
}
