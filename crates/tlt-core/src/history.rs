use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::board::{Position, Symbol};

/// A mark that is still on the board.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRecord {
    pub position: Position,
    pub symbol: Symbol,
    pub seq: u64,
}

/// Live marks in placement order. Evicted records are dropped, so every entry
/// here has a matching cell on the board.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MatchHistory {
    records: VecDeque<MoveRecord>,
    next_seq: u64,
}

impl Default for MatchHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchHistory {
    pub fn new() -> Self {
        Self {
            records: VecDeque::new(),
            next_seq: 1,
        }
    }

    /// Append a record with the next sequence number.
    pub fn record(&mut self, position: Position, symbol: Symbol) -> MoveRecord {
        let record = MoveRecord {
            position,
            symbol,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.records.push_back(record);
        record
    }

    /// Remove and return the oldest live record for `symbol`.
    ///
    /// Records are appended in sequence order, so the first match is the
    /// smallest surviving sequence number for that symbol.
    pub fn evict_oldest(&mut self, symbol: Symbol) -> Option<MoveRecord> {
        let idx = self.records.iter().position(|r| r.symbol == symbol)?;
        self.records.remove(idx)
    }

    pub fn live_count(&self, symbol: Symbol) -> usize {
        self.records.iter().filter(|r| r.symbol == symbol).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MoveRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
