pub mod board;
pub mod game;
pub mod history;
pub mod protocol;

pub use board::{Board, Cell, Position, Symbol};
pub use game::{GameState, MoveError, MoveOutcome, NextTurn, Outcome, Status};
pub use history::{MatchHistory, MoveRecord};
pub use protocol::{ClientCommand, ProtocolError, ServerMessage};
