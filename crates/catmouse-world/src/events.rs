//! Events emitted for presentation layers.

use catmouse_core::{AnimalId, PopulationStats, Position, Species, Victory};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SimEvent {
    /// Placed during initial stocking
    Spawned {
        id: AnimalId,
        species: Species,
        at: Position,
    },
    /// Newborn from the breeding pass
    Born {
        id: AnimalId,
        parent: AnimalId,
        species: Species,
        at: Position,
    },
    Moved {
        id: AnimalId,
        from: Position,
        to: Position,
    },
    Blocked {
        id: AnimalId,
        at: Position,
    },
    Ate {
        predator: AnimalId,
        victim: AnimalId,
        at: Position,
    },
    Starved {
        id: AnimalId,
        species: Species,
        at: Position,
    },
    RoundStarted {
        round: u64,
    },
    RoundFinished {
        stats: PopulationStats,
    },
    GameOver {
        victory: Victory,
        round: u64,
    },
}

impl SimEvent {
    /// The animal whose turn produced this event, if it is a turn event
    pub fn actor(&self) -> Option<AnimalId> {
        match self {
            SimEvent::Moved { id, .. } | SimEvent::Blocked { id, .. } => Some(*id),
            SimEvent::Ate { predator, .. } => Some(*predator),
            _ => None,
        }
    }
}
