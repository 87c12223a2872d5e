//! The match state machine, free of any I/O.
//!
//! A [`GameState`] only changes through [`GameState::attempt_move`] and
//! [`GameState::finish`]. Callers that share a state between tasks are
//! expected to hold one lock across a whole call, so a move is validated and
//! applied against the same snapshot.

use serde::{Deserialize, Serialize};

use crate::board::{Board, Position, Symbol};
use crate::history::{MatchHistory, MoveRecord};

/// Most marks one symbol may hold at once. Placing another evicts the oldest.
pub const MAX_MARKS: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Won(Symbol),
    Disconnected,
    Quit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    InProgress,
    Finished(Outcome),
}

/// Why a move was refused. The display text is what goes on the wire after
/// `ERROR `.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MoveError {
    #[error("Game already finished")]
    GameFinished,
    #[error("Invalid coordinates")]
    OutOfRange,
    #[error("Not your turn")]
    WrongTurn,
    #[error("Cell already occupied")]
    CellOccupied,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NextTurn {
    /// Play continues with this symbol.
    Turn(Symbol),
    /// The mover completed a line; the match is over.
    Winner(Symbol),
}

/// Everything an accepted move changed, in the order it happened.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MoveOutcome {
    pub evicted: Option<Position>,
    pub placed: MoveRecord,
    pub board: Board,
    pub next: NextTurn,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameState {
    board: Board,
    history: MatchHistory,
    current_turn: Symbol,
    status: Status,
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

impl GameState {
    pub fn new() -> Self {
        Self {
            board: Board::new(),
            history: MatchHistory::new(),
            current_turn: Symbol::X,
            status: Status::InProgress,
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn history(&self) -> &MatchHistory {
        &self.history
    }

    pub fn current_turn(&self) -> Symbol {
        self.current_turn
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.status, Status::Finished(_))
    }

    pub fn outcome(&self) -> Option<Outcome> {
        match self.status {
            Status::Finished(outcome) => Some(outcome),
            Status::InProgress => None,
        }
    }

    /// Validate and apply one placement for `symbol`.
    ///
    /// Checks run in a fixed order: finished, range, turn, occupancy. A
    /// rejected move leaves the state untouched.
    pub fn attempt_move(
        &mut self,
        symbol: Symbol,
        row: i32,
        col: i32,
    ) -> Result<MoveOutcome, MoveError> {
        if self.is_finished() {
            return Err(MoveError::GameFinished);
        }
        let pos = Position::new(row, col).ok_or(MoveError::OutOfRange)?;
        if symbol != self.current_turn {
            return Err(MoveError::WrongTurn);
        }
        if !self.board.get(pos).is_empty() {
            return Err(MoveError::CellOccupied);
        }

        let evicted = if self.history.live_count(symbol) >= MAX_MARKS {
            self.history.evict_oldest(symbol).map(|oldest| {
                self.board.clear(oldest.position);
                oldest.position
            })
        } else {
            None
        };

        self.board.set(pos, symbol);
        let placed = self.history.record(pos, symbol);

        let next = if self.board.wins_through(pos, symbol) {
            self.status = Status::Finished(Outcome::Won(symbol));
            NextTurn::Winner(symbol)
        } else {
            self.current_turn = symbol.other();
            NextTurn::Turn(self.current_turn)
        };

        Ok(MoveOutcome {
            evicted,
            placed,
            board: self.board,
            next,
        })
    }

    /// End the match with `outcome`. Returns `false` if it had already ended,
    /// in which case nothing changes.
    pub fn finish(&mut self, outcome: Outcome) -> bool {
        if self.is_finished() {
            return false;
        }
        self.status = Status::Finished(outcome);
        true
    }

    /// One-line summary for logs.
    pub fn status_line(&self) -> String {
        format!(
            "turn={} x_marks={} o_marks={} live_moves={}",
            self.current_turn,
            self.board.count(Symbol::X),
            self.board.count(Symbol::O),
            self.history.len()
        )
    }
}
