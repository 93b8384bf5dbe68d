use screeps::*;
use std::collections::HashSet;

/// Same-tick movement bookkeeping for one planning call. Tiles an agent is
/// leaving are `vacating`; tiles an agent will end on are `claimed`.
#[derive(Clone, Debug, Default)]
pub struct IntentLedger {
    vacating: HashSet<Position>,
    claimed: HashSet<Position>,
}

/// Snapshot used to undo speculative intents.
#[derive(Clone, Debug)]
pub struct LedgerCheckpoint {
    vacating: HashSet<Position>,
    claimed: HashSet<Position>,
}

impl IntentLedger {
    pub fn new() -> IntentLedger {
        IntentLedger::default()
    }

    pub fn is_vacating(&self, pos: Position) -> bool {
        self.vacating.contains(&pos)
    }

    pub fn is_claimed(&self, pos: Position) -> bool {
        self.claimed.contains(&pos)
    }

    /// Claim a destination tile. Fails if someone already claimed it.
    pub fn claim(&mut self, pos: Position) -> bool {
        self.claimed.insert(pos)
    }

    pub fn release(&mut self, pos: Position) {
        self.claimed.remove(&pos);
    }

    pub fn vacate(&mut self, pos: Position) {
        self.vacating.insert(pos);
    }

    pub fn unvacate(&mut self, pos: Position) {
        self.vacating.remove(&pos);
    }

    /// Record a move from `from` to `to`. Staying in place claims the current tile.
    pub fn commit_move(&mut self, from: Position, to: Position) -> bool {
        if from != to {
            self.vacate(from);
        }

        self.claim(to)
    }

    pub fn vacating_tiles(&self) -> impl Iterator<Item = Position> + '_ {
        self.vacating.iter().copied()
    }

    pub fn checkpoint(&self) -> LedgerCheckpoint {
        LedgerCheckpoint {
            vacating: self.vacating.clone(),
            claimed: self.claimed.clone(),
        }
    }

    pub fn rollback(&mut self, checkpoint: LedgerCheckpoint) {
        self.vacating = checkpoint.vacating;
        self.claimed = checkpoint.claimed;
    }
}
