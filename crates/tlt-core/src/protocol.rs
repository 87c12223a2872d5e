//! Line protocol spoken between players and the server.
//!
//! Every message is one line of space-separated fields; the first field names
//! the message. Incoming lines are parsed once into [`ClientCommand`] and
//! outgoing ones are rendered from [`ServerMessage`] through `Display`.

use std::fmt;
use std::str::FromStr;

use crate::board::{Board, Position, Symbol};

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    /// Handshake. An empty name is allowed here; see [`username_or_guest`].
    Connect { username: String },
    Move { row: i32, col: i32 },
    BoardQuery,
    Quit,
    Ping,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("Invalid move format")]
    InvalidMoveFormat,
    #[error("Invalid MOVE command format")]
    InvalidMoveArity,
    #[error("Unknown command")]
    UnknownCommand,
    #[error("Invalid connection message")]
    InvalidHandshake,
    #[error("Waiting for opponent")]
    NotPaired,
    #[error("Line too long")]
    LineTooLong,
}

impl ClientCommand {
    /// Parse one incoming line. Blank lines yield `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<ClientCommand>, ProtocolError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let (name, rest) = match line.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (line, ""),
        };

        let cmd = match name {
            "CONNECT" => ClientCommand::Connect {
                username: rest.to_string(),
            },
            "MOVE" => {
                let fields: Vec<&str> = rest.split_whitespace().collect();
                let [row, col] = fields.as_slice() else {
                    return Err(ProtocolError::InvalidMoveArity);
                };
                let row = row.parse().map_err(|_| ProtocolError::InvalidMoveFormat)?;
                let col = col.parse().map_err(|_| ProtocolError::InvalidMoveFormat)?;
                ClientCommand::Move { row, col }
            }
            "BOARD?" if rest.is_empty() => ClientCommand::BoardQuery,
            "QUIT" if rest.is_empty() => ClientCommand::Quit,
            "PING" if rest.is_empty() => ClientCommand::Ping,
            _ => return Err(ProtocolError::UnknownCommand),
        };
        Ok(Some(cmd))
    }
}

impl fmt::Display for ClientCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientCommand::Connect { username } => write!(f, "CONNECT {}", username),
            ClientCommand::Move { row, col } => write!(f, "MOVE {} {}", row, col),
            ClientCommand::BoardQuery => write!(f, "BOARD?"),
            ClientCommand::Quit => write!(f, "QUIT"),
            ClientCommand::Ping => write!(f, "PING"),
        }
    }
}

/// Use `name` if it has any content, otherwise a random `Guest_NNNN`.
pub fn username_or_guest(name: &str) -> String {
    use rand::RngExt;
    let name = name.trim();
    if !name.is_empty() {
        return name.to_string();
    }
    let mut rng = rand::rng();
    format!("Guest_{:04}", rng.random_range(0..10_000u32))
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    Welcome { symbol: Symbol, opponent: String },
    Waiting,
    Board(Board),
    Turn(Symbol),
    /// Sent only to the player whose move was accepted.
    ValidMove { position: Position, symbol: Symbol },
    Remove(Position),
    Winner(Symbol),
    GameOver,
    OpponentDisconnected,
    Error(String),
    Pong,
}

impl ServerMessage {
    pub fn error(reason: impl fmt::Display) -> Self {
        ServerMessage::Error(reason.to_string())
    }
}

impl fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerMessage::Welcome { symbol, opponent } => {
                write!(f, "WELCOME {} {}", symbol, opponent)
            }
            ServerMessage::Waiting => write!(f, "WAITING"),
            ServerMessage::Board(board) => write!(f, "BOARD {}", board),
            ServerMessage::Turn(symbol) => write!(f, "TURN {}", symbol),
            ServerMessage::ValidMove { position, symbol } => {
                write!(f, "VALID_MOVE {} {}", position, symbol)
            }
            ServerMessage::Remove(position) => write!(f, "REMOVE {}", position),
            ServerMessage::Winner(symbol) => write!(f, "WINNER {}", symbol),
            ServerMessage::GameOver => write!(f, "GAME_OVER"),
            ServerMessage::OpponentDisconnected => write!(f, "OPPONENT_DISCONNECTED"),
            ServerMessage::Error(reason) => write!(f, "ERROR {}", reason),
            ServerMessage::Pong => write!(f, "PONG"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unrecognized server message: {0}")]
pub struct ServerMessageParseError(pub String);

fn parse_symbol(field: Option<&str>) -> Option<Symbol> {
    field?.parse().ok()
}

fn parse_position(row: Option<&str>, col: Option<&str>) -> Option<Position> {
    Position::new(row?.parse().ok()?, col?.parse().ok()?)
}

impl FromStr for ServerMessage {
    type Err = ServerMessageParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let fail = || ServerMessageParseError(line.to_string());
        let (name, rest) = match line.split_once(' ') {
            Some((name, rest)) => (name, rest),
            None => (line, ""),
        };
        let mut fields = rest.split_whitespace();

        let msg = match name {
            "WELCOME" => {
                let (symbol, opponent) = rest.split_once(' ').ok_or_else(fail)?;
                ServerMessage::Welcome {
                    symbol: symbol.parse().map_err(|_| fail())?,
                    opponent: opponent.to_string(),
                }
            }
            "WAITING" => ServerMessage::Waiting,
            "BOARD" => ServerMessage::Board(rest.trim().parse().map_err(|_| fail())?),
            "TURN" => ServerMessage::Turn(parse_symbol(fields.next()).ok_or_else(fail)?),
            "VALID_MOVE" => {
                let position = parse_position(fields.next(), fields.next()).ok_or_else(fail)?;
                let symbol = parse_symbol(fields.next()).ok_or_else(fail)?;
                ServerMessage::ValidMove { position, symbol }
            }
            "REMOVE" => {
                ServerMessage::Remove(parse_position(fields.next(), fields.next()).ok_or_else(fail)?)
            }
            "WINNER" => ServerMessage::Winner(parse_symbol(fields.next()).ok_or_else(fail)?),
            "GAME_OVER" => ServerMessage::GameOver,
            "OPPONENT_DISCONNECTED" => ServerMessage::OpponentDisconnected,
            "ERROR" => ServerMessage::Error(rest.to_string()),
            "PONG" => ServerMessage::Pong,
            _ => return Err(fail()),
        };
        Ok(msg)
    }
}
