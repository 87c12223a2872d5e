//! Console rendering of what the server tells us.

use tlt_core::{Board, Position, ServerMessage, Symbol, board::SIZE};

pub const HELP: &str = "Commands: MOVE <row> <col> (0-2), BOARD?, PING, QUIT";

/// Client-side view of one match.
#[derive(Debug, Default)]
pub struct View {
    pub me: Option<Symbol>,
    pub opponent: Option<String>,
    pub board: Board,
    pub finished: bool,
}

impl View {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one server message into the view and return the text to print.
    pub fn apply(&mut self, msg: &ServerMessage) -> Vec<String> {
        match msg {
            ServerMessage::Welcome { symbol, opponent } => {
                self.me = Some(*symbol);
                self.opponent = Some(opponent.clone());
                vec![format!("You are {} playing against {}.", symbol, opponent)]
            }
            ServerMessage::Waiting => vec!["Waiting for an opponent...".to_string()],
            ServerMessage::Board(board) => {
                self.board = *board;
                render_board(board).lines().map(str::to_string).collect()
            }
            ServerMessage::Turn(symbol) if Some(*symbol) == self.me => {
                vec![format!("Your turn. {}", HELP)]
            }
            ServerMessage::Turn(symbol) => vec![format!("Waiting for {} to move.", symbol)],
            ServerMessage::ValidMove { .. } => vec!["Move accepted.".to_string()],
            ServerMessage::Remove(pos) => vec![format!("Oldest mark removed at {}.", describe(*pos))],
            ServerMessage::Winner(symbol) if Some(*symbol) == self.me => {
                vec!["You won!".to_string()]
            }
            ServerMessage::Winner(symbol) => vec![format!("You lost, {} won.", symbol)],
            ServerMessage::OpponentDisconnected => vec!["Your opponent left.".to_string()],
            ServerMessage::GameOver => {
                self.finished = true;
                vec!["Game over.".to_string()]
            }
            ServerMessage::Error(reason) => vec![format!("Error: {}", reason)],
            ServerMessage::Pong => vec!["pong".to_string()],
        }
    }
}

fn describe(pos: Position) -> String {
    format!("({}, {})", pos.row(), pos.col())
}

/// Grid with row and column labels, empty cells blank.
pub fn render_board(board: &Board) -> String {
    let sep = "   +---+---+---+";
    let mut out = String::new();
    out.push_str(sep);
    out.push('\n');
    for row in 0..SIZE {
        out.push_str(&format!(" {} |", row));
        for col in 0..SIZE {
            let c = Position::new(row as i32, col as i32)
                .map(|pos| board.get(pos).as_char())
                .filter(|c| *c != '.')
                .unwrap_or(' ');
            out.push_str(&format!(" {} |", c));
        }
        out.push('\n');
        out.push_str(sep);
        out.push('\n');
    }
    out.push_str("     0   1   2");
    out
}
