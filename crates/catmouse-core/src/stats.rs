//! Population statistics tracking.

use crate::{EpisodeId, Victory};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Population changes observed during one round
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PopulationStats {
    pub round: u64,
    /// Living cats once the round resolved
    pub cats: usize,
    /// Living mice once the round resolved
    pub mice: usize,
    pub born: u32,
    pub eaten: u32,
    pub starved: u32,
    /// Turns that ended without the animal moving
    pub blocked_turns: u32,
}

impl PopulationStats {
    pub fn new(round: u64) -> Self {
        Self {
            round,
            ..Default::default()
        }
    }

    /// Net population change across the round
    pub fn net_change(&self) -> i64 {
        self.born as i64 - self.eaten as i64 - self.starved as i64
    }
}

/// Aggregated statistics over a whole episode
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EpisodeStats {
    pub rounds_played: u64,
    pub total_born: u64,
    pub total_eaten: u64,
    pub total_starved: u64,
    pub peak_cats: usize,
    pub peak_mice: usize,
    pub history: Vec<PopulationStats>,
}

impl EpisodeStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the peaks with the stocked population
    pub fn record_initial(&mut self, cats: usize, mice: usize) {
        self.peak_cats = self.peak_cats.max(cats);
        self.peak_mice = self.peak_mice.max(mice);
    }

    /// Fold a resolved round into the totals
    pub fn record_round(&mut self, round: PopulationStats) {
        self.rounds_played += 1;
        self.total_born += round.born as u64;
        self.total_eaten += round.eaten as u64;
        self.total_starved += round.starved as u64;
        self.peak_cats = self.peak_cats.max(round.cats);
        self.peak_mice = self.peak_mice.max(round.mice);
        self.history.push(round);
    }

    pub fn last_round(&self) -> Option<&PopulationStats> {
        self.history.last()
    }
}

/// Final report of an episode, printed by the runner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeSummary {
    pub episode_id: EpisodeId,
    pub seed: u64,
    pub map_size: i32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: Option<Victory>,
    pub final_cats: usize,
    pub final_mice: usize,
    pub stats: EpisodeStats,
}
