use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Side length of the grid.
pub const SIZE: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Symbol {
    X,
    O,
}

impl Symbol {
    pub fn other(self) -> Symbol {
        match self {
            Symbol::X => Symbol::O,
            Symbol::O => Symbol::X,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Symbol::X => 'X',
            Symbol::O => 'O',
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

impl FromStr for Symbol {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "X" => Ok(Symbol::X),
            "O" => Ok(Symbol::O),
            _ => Err(()),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cell {
    #[default]
    Empty,
    Taken(Symbol),
}

impl Cell {
    pub fn symbol(&self) -> Option<Symbol> {
        match self {
            Cell::Taken(s) => Some(*s),
            Cell::Empty => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    pub fn as_char(&self) -> char {
        match self {
            Cell::Empty => '.',
            Cell::Taken(s) => s.as_char(),
        }
    }
}

/// A cell address, always inside the grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    row: usize,
    col: usize,
}

impl Position {
    /// Returns `None` when either coordinate falls outside `0..3`.
    pub fn new(row: i32, col: i32) -> Option<Position> {
        let in_range = |v: i32| (0..SIZE as i32).contains(&v);
        if in_range(row) && in_range(col) {
            Some(Position {
                row: row as usize,
                col: col as usize,
            })
        } else {
            None
        }
    }

    pub fn row(&self) -> usize {
        self.row
    }

    pub fn col(&self) -> usize {
        self.col
    }

    /// All nine positions in row-major order.
    pub fn all() -> impl Iterator<Item = Position> {
        (0..SIZE).flat_map(|row| (0..SIZE).map(move |col| Position { row, col }))
    }

    fn on_main_diagonal(&self) -> bool {
        self.row == self.col
    }

    fn on_anti_diagonal(&self) -> bool {
        self.row + self.col == SIZE - 1
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.row, self.col)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    cells: [[Cell; SIZE]; SIZE],
}

impl Board {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, pos: Position) -> Cell {
        self.cells[pos.row][pos.col]
    }

    pub fn set(&mut self, pos: Position, symbol: Symbol) {
        self.cells[pos.row][pos.col] = Cell::Taken(symbol);
    }

    pub fn clear(&mut self, pos: Position) {
        self.cells[pos.row][pos.col] = Cell::Empty;
    }

    /// Number of cells currently holding `symbol`.
    pub fn count(&self, symbol: Symbol) -> usize {
        self.cells
            .iter()
            .flatten()
            .filter(|cell| cell.symbol() == Some(symbol))
            .count()
    }

    pub fn is_full(&self) -> bool {
        self.cells.iter().flatten().all(|cell| !cell.is_empty())
    }

    /// Whether `symbol` owns a whole canonical line passing through `pos`.
    ///
    /// Only the row and column of `pos` are always checked; the main diagonal
    /// is checked when `row == col` and the anti-diagonal when
    /// `row + col == 2`. Lines elsewhere on the board are ignored, so this is
    /// meant to be called right after placing a mark at `pos`.
    pub fn wins_through(&self, pos: Position, symbol: Symbol) -> bool {
        let owns = |row: usize, col: usize| self.cells[row][col] == Cell::Taken(symbol);

        let row_win = (0..SIZE).all(|c| owns(pos.row, c));
        let col_win = (0..SIZE).all(|r| owns(r, pos.col));
        let main_win = pos.on_main_diagonal() && (0..SIZE).all(|i| owns(i, i));
        let anti_win = pos.on_anti_diagonal() && (0..SIZE).all(|i| owns(i, SIZE - 1 - i));

        row_win || col_win || main_win || anti_win
    }
}

/// Row-major, nine characters, `.` for empty.
impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for cell in self.cells.iter().flatten() {
            write!(f, "{}", cell.as_char())?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid board encoding")]
pub struct BoardParseError;

impl FromStr for Board {
    type Err = BoardParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let chars: Vec<char> = s.chars().collect();
        if chars.len() != SIZE * SIZE {
            return Err(BoardParseError);
        }

        let mut board = Board::new();
        for (pos, ch) in Position::all().zip(chars) {
            match ch {
                '.' => {}
                'X' => board.set(pos, Symbol::X),
                'O' => board.set(pos, Symbol::O),
                _ => return Err(BoardParseError),
            }
        }
        Ok(board)
    }
}
