use std::sync::Arc;

use dashmap::DashMap;
use tracing::info;

use crate::session::{Match, MatchId};

/// Live matches, keyed by id.
#[derive(Debug, Default)]
pub struct Registry {
    matches: DashMap<MatchId, Arc<Match>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, game: Arc<Match>) {
        self.matches.insert(game.id(), game);
    }

    pub fn get(&self, id: MatchId) -> Option<Arc<Match>> {
        self.matches.get(&id).map(|entry| entry.value().clone())
    }

    pub fn remove(&self, id: MatchId) -> Option<Arc<Match>> {
        let removed = self.matches.remove(&id).map(|(_, game)| game);
        if removed.is_some() {
            info!(match_id = id, live = self.matches.len(), "match retired");
        }
        removed
    }

    /// Called when one of a match's command loops exits; retires the match
    /// once both have.
    pub fn release(&self, game: &Match) {
        if game.loop_exited() {
            self.remove(game.id());
        }
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }
}
