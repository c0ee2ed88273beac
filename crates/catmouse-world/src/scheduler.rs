//! Round scheduler: owns the grid and the population and plays rounds.

use crate::animal::{Animal, AnimalData, TurnOutcome, TurnPlan, TurnReport};
use crate::events::SimEvent;
use crate::grid::Grid;
use crate::timer::{ArmedRestart, RestartTimer, TimerTicket};
use catmouse_core::{
    AnimalId, EpisodeId, EpisodeStats, PopulationStats, Position, Result, SimulationConfig, Species,
    Victory,
};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, event, info, instrument, trace, warn, Level};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulerState {
    Idle,
    RoundRunning,
    Resolving,
    Finished(Victory),
}

pub struct RoundScheduler {
    episode_id: EpisodeId,
    config: SimulationConfig,
    grid: Grid,
    animals: HashMap<AnimalId, Animal>,
    cats: Vec<AnimalId>,
    mice: Vec<AnimalId>,
    // Owed offspring, resolved after all turns
    breed_queue: Vec<AnimalId>,
    // Starved this round, removed after breeding
    starve_queue: Vec<AnimalId>,
    cat_index: usize,
    mouse_index: usize,
    round: u64,
    state: SchedulerState,
    auto_advance: bool,
    timer: RestartTimer,
    rng: ChaCha8Rng,
    next_id: u64,
    events: Vec<SimEvent>,
    round_stats: PopulationStats,
    stats: EpisodeStats,
}

impl RoundScheduler {
    /// Build the grid, stock cats then mice on random empty tiles and arm the
    /// first round.
    pub fn new(config: SimulationConfig) -> Result<Self> {
        let mut scheduler = Self::empty(config)?;

        scheduler.stock(Species::Cat, scheduler.config.num_cats);
        scheduler.stock(Species::Mouse, scheduler.config.num_mice);
        scheduler.stats.record_initial(scheduler.cats.len(), scheduler.mice.len());

        info!(
            event = "episode_started",
            episode_id = %scheduler.episode_id,
            seed = scheduler.config.seed,
            map_size = scheduler.grid.size(),
            cats = scheduler.cats.len(),
            mice = scheduler.mice.len(),
            "Episode set up"
        );

        scheduler.on_round_finished();
        Ok(scheduler)
    }

    /// Build a scheduler with animals at fixed positions instead of random
    /// stocking. Placements are spawned in order.
    pub fn with_layout(config: SimulationConfig, placements: &[(Species, Position)]) -> Result<Self> {
        let mut scheduler = Self::empty(config)?;

        for &(species, pos) in placements {
            scheduler.spawn_animal(species, pos, None)?;
        }
        scheduler.stats.record_initial(scheduler.cats.len(), scheduler.mice.len());

        scheduler.on_round_finished();
        Ok(scheduler)
    }

    fn empty(config: SimulationConfig) -> Result<Self> {
        config.validate()?;

        let map_size = config.world.clamped_map_size();
        if map_size != config.world.map_size {
            warn!(
                requested = config.world.map_size,
                map_size, "Map size clamped to supported range"
            );
        }

        Ok(Self {
            episode_id: EpisodeId::new(),
            grid: Grid::new(map_size),
            animals: HashMap::new(),
            cats: Vec::new(),
            mice: Vec::new(),
            breed_queue: Vec::new(),
            starve_queue: Vec::new(),
            cat_index: 0,
            mouse_index: 0,
            round: 0,
            state: SchedulerState::Idle,
            auto_advance: config.auto_advance,
            timer: RestartTimer::new(),
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            next_id: 0,
            events: Vec::new(),
            round_stats: PopulationStats::default(),
            stats: EpisodeStats::new(),
            config,
        })
    }

    /// Play one full round.
    ///
    /// No-op while a round is running or once the episode is over. An empty
    /// roster ends the episode here, before any turn is taken.
    #[instrument(skip(self), fields(episode_id = %self.episode_id, round = self.round + 1))]
    pub fn start_next_round(&mut self) -> SchedulerState {
        match self.state {
            SchedulerState::Idle => {}
            other => return other,
        }

        // A manual start supersedes any pending restart
        self.timer.disarm();

        if self.cats.is_empty() {
            return self.finish(Victory::MiceWin);
        }
        if self.mice.is_empty() {
            return self.finish(Victory::CatsWin);
        }

        self.round += 1;
        self.state = SchedulerState::RoundRunning;
        self.cat_index = 0;
        self.mouse_index = 0;
        self.round_stats = PopulationStats::new(self.round);
        self.events.push(SimEvent::RoundStarted { round: self.round });

        debug!(
            round = self.round,
            cats = self.cats.len(),
            mice = self.mice.len(),
            "Round started"
        );

        while let Some(id) = self.next_turn() {
            if let Some(report) = self.execute_turn(id) {
                self.on_turn_finished(report);
            }
        }

        self.state = SchedulerState::Resolving;
        self.resolve_breeding();
        self.resolve_starvation();
        self.complete_round();
        self.on_round_finished();

        self.state
    }

    /// Fire a restart armed earlier. Stale tickets are ignored.
    pub fn fire_restart(&mut self, ticket: TimerTicket) -> bool {
        if !self.timer.take_if_current(ticket) {
            trace!(?ticket, "Ignoring stale restart");
            return false;
        }
        self.start_next_round();
        true
    }

    /// Cancel any pending restart
    pub fn teardown(&mut self) {
        if self.timer.disarm() {
            debug!("Pending restart cancelled");
        }
    }

    /// Next animal owed a turn: cats by index, then mice by index, each index
    /// checked against the roster as it is now.
    fn next_turn(&mut self) -> Option<AnimalId> {
        if self.cat_index < self.cats.len() {
            let id = self.cats[self.cat_index];
            self.cat_index += 1;
            return Some(id);
        }

        if self.mouse_index < self.mice.len() {
            let id = self.mice[self.mouse_index];
            self.mouse_index += 1;
            return Some(id);
        }

        None
    }

    fn execute_turn(&mut self, id: AnimalId) -> Option<TurnReport> {
        let plan = match self.animals.get_mut(&id) {
            Some(animal) => animal.begin_turn(&mut self.grid, &mut self.rng),
            None => {
                warn!(animal_id = %id, "Rostered animal missing, skipping turn");
                return None;
            }
        };

        if let TurnPlan::Eat { victim, .. } = plan {
            self.on_kill_requested(victim, id);
        }

        let animal = self.animals.get_mut(&id)?;
        let report = animal.finish_turn(&mut self.grid);
        animal.end_turn();
        Some(report)
    }

    fn on_turn_finished(&mut self, report: TurnReport) {
        if !report.success {
            self.round_stats.blocked_turns += 1;
        }

        match report.outcome {
            TurnOutcome::Moved { from, to } => {
                self.events.push(SimEvent::Moved {
                    id: report.animal,
                    from,
                    to,
                });
            }
            TurnOutcome::Blocked => {
                if let Some(animal) = self.animals.get(&report.animal) {
                    self.events.push(SimEvent::Blocked {
                        id: report.animal,
                        at: animal.position(),
                    });
                }
            }
            // Recorded when the kill happened
            TurnOutcome::Ate { .. } => {}
        }

        if report.starved {
            self.on_starved(report.animal);
        }
        if report.bred {
            self.on_bred(report.animal);
        }
    }

    /// Immediate removal of an eaten animal, so it cannot act later this round
    fn on_kill_requested(&mut self, victim: AnimalId, predator: AnimalId) {
        let Some(animal) = self.animals.remove(&victim) else {
            warn!(animal_id = %victim, "Kill requested for unknown animal");
            return;
        };

        self.remove_from_roster(victim, animal.species());
        self.breed_queue.retain(|&queued| queued != victim);
        self.release_tile(&animal);

        self.round_stats.eaten += 1;
        self.events.push(SimEvent::Ate {
            predator,
            victim,
            at: animal.position(),
        });

        debug!(
            event = "animal_eaten",
            predator = %predator,
            victim = %victim,
            position_x = animal.position().x,
            position_y = animal.position().y,
            round = self.round,
            "Animal eaten"
        );

        event!(
            Level::DEBUG,
            counter_name = "animals_eaten",
            counter_value = 1,
            species = %animal.species(),
            "Kill metric"
        );
    }

    fn on_starved(&mut self, id: AnimalId) {
        if !self.starve_queue.contains(&id) {
            self.starve_queue.push(id);
        }
    }

    fn on_bred(&mut self, id: AnimalId) {
        if !self.breed_queue.contains(&id) {
            self.breed_queue.push(id);
        }
    }

    /// Spawn owed offspring next to each queued parent.
    ///
    /// Parents keep whatever they could not place this round.
    fn resolve_breeding(&mut self) {
        let mut i = 0;
        while i < self.breed_queue.len() {
            let id = self.breed_queue[i];
            let Some(parent) = self.animals.get_mut(&id) else {
                self.breed_queue.remove(i);
                continue;
            };

            let mut pending = parent.pending_breeds();
            if pending == 0 {
                parent.set_pending_breeds(0);
                self.breed_queue.remove(i);
                continue;
            }

            let species = parent.species();
            let mut candidates = self.grid.adjacent_empty_tiles(parent.position());
            let owed = pending;

            while !candidates.is_empty() && pending > 0 {
                let tile = candidates.remove(self.rng.gen_range(0..candidates.len()));
                match self.spawn_animal(species, tile.position, Some(id)) {
                    Ok(_) => pending -= 1,
                    Err(e) => warn!(parent = %id, error = %e, "Offspring spawn failed"),
                }
            }

            if let Some(parent) = self.animals.get_mut(&id) {
                parent.set_pending_breeds(pending);
            }

            if pending < owed {
                trace!(parent = %id, born = owed - pending, still_owed = pending, "Parent bred");
            }

            if pending == 0 {
                self.breed_queue.remove(i);
            } else {
                event!(
                    Level::DEBUG,
                    counter_name = "breeding_deferred",
                    counter_value = pending,
                    parent = %id,
                    "No room for all offspring"
                );
                i += 1;
            }
        }
    }

    /// Remove everything that starved this round, each entry exactly once
    fn resolve_starvation(&mut self) {
        for id in std::mem::take(&mut self.starve_queue) {
            // Already eaten
            let Some(animal) = self.animals.remove(&id) else {
                continue;
            };

            self.remove_from_roster(id, animal.species());
            self.breed_queue.retain(|&queued| queued != id);
            self.release_tile(&animal);

            self.round_stats.starved += 1;
            self.events.push(SimEvent::Starved {
                id,
                species: animal.species(),
                at: animal.position(),
            });

            debug!(
                event = "animal_starved",
                animal_id = %id,
                species = %animal.species(),
                turns_taken = animal.turns_taken(),
                round = self.round,
                "Animal starved"
            );

            event!(
                Level::DEBUG,
                counter_name = "animals_starved",
                counter_value = 1,
                species = %animal.species(),
                "Starvation metric"
            );
        }
    }

    fn complete_round(&mut self) {
        self.round_stats.cats = self.cats.len();
        self.round_stats.mice = self.mice.len();
        let stats = self.round_stats.clone();

        self.emit_population_metrics(&stats);
        self.events.push(SimEvent::RoundFinished {
            stats: stats.clone(),
        });
        self.stats.record_round(stats);
    }

    /// Back to idle, arming the next round if auto-advance is on
    fn on_round_finished(&mut self) {
        self.state = SchedulerState::Idle;
        self.timer.disarm();

        if self.auto_advance {
            let delay = Duration::from_millis(self.config.round_delay_ms);
            let ticket = self.timer.arm(delay);
            trace!(?ticket, delay_ms = self.config.round_delay_ms, "Next round armed");
        }
    }

    fn finish(&mut self, victory: Victory) -> SchedulerState {
        self.state = SchedulerState::Finished(victory);
        self.events.push(SimEvent::GameOver {
            victory,
            round: self.round,
        });

        info!(
            event = "episode_finished",
            episode_id = %self.episode_id,
            outcome = %victory,
            rounds_played = self.stats.rounds_played,
            total_born = self.stats.total_born,
            total_eaten = self.stats.total_eaten,
            total_starved = self.stats.total_starved,
            peak_cats = self.stats.peak_cats,
            peak_mice = self.stats.peak_mice,
            "🏁 Episode complete"
        );

        self.state
    }

    fn emit_population_metrics(&self, stats: &PopulationStats) {
        debug!(
            event = "population_metrics",
            round = stats.round,
            cats = stats.cats,
            mice = stats.mice,
            born = stats.born,
            eaten = stats.eaten,
            starved = stats.starved,
            blocked_turns = stats.blocked_turns,
            net_change = stats.net_change(),
            "Round resolved"
        );

        event!(
            Level::INFO,
            gauge_name = "cats_alive",
            gauge_value = stats.cats,
            round = stats.round,
            "Cat population gauge"
        );

        event!(
            Level::INFO,
            gauge_name = "mice_alive",
            gauge_value = stats.mice,
            round = stats.round,
            "Mouse population gauge"
        );
    }

    /// Stock up to `count` animals on random empty tiles, stopping when the
    /// grid is full
    fn stock(&mut self, species: Species, count: usize) {
        for placed in 0..count {
            let Some(pos) = self.grid.random_empty_tile(&mut self.rng) else {
                warn!(
                    species = %species,
                    requested = count,
                    placed,
                    "Grid full, stocking stopped early"
                );
                return;
            };

            if let Err(e) = self.spawn_animal(species, pos, None) {
                warn!(species = %species, error = %e, "Stocking spawn failed");
                return;
            }
        }
    }

    /// Put a new animal on an empty tile and roster it
    fn spawn_animal(&mut self, species: Species, pos: Position, parent: Option<AnimalId>) -> Result<AnimalId> {
        let id = AnimalId(self.next_id);
        let animal = Animal::new(id, species, pos, self.config.species(species).clone(), self.round);
        self.grid.place(animal.occupant(), pos)?;
        self.next_id += 1;

        self.animals.insert(id, animal);
        match species {
            Species::Cat => self.cats.push(id),
            Species::Mouse => self.mice.push(id),
        }

        match parent {
            Some(parent) => {
                self.round_stats.born += 1;
                self.events.push(SimEvent::Born {
                    id,
                    parent,
                    species,
                    at: pos,
                });
                event!(
                    Level::DEBUG,
                    counter_name = "animals_born",
                    counter_value = 1,
                    species = %species,
                    "Birth metric"
                );
            }
            None => self.events.push(SimEvent::Spawned { id, species, at: pos }),
        }

        Ok(id)
    }

    fn remove_from_roster(&mut self, id: AnimalId, species: Species) {
        let (roster, index) = match species {
            Species::Cat => (&mut self.cats, &mut self.cat_index),
            Species::Mouse => (&mut self.mice, &mut self.mouse_index),
        };

        if let Some(at) = roster.iter().position(|&rostered| rostered == id) {
            roster.remove(at);
            // Keep the cursor on the same next animal
            if at < *index {
                *index -= 1;
            }
        }
    }

    fn release_tile(&mut self, animal: &Animal) {
        let pos = animal.position();
        if self.grid.occupant_at(pos).map(|o| o.id) == Some(animal.id()) {
            self.grid.clear(pos);
        }
    }

    pub fn set_auto_advance(&mut self, enabled: bool) {
        self.auto_advance = enabled;
        if !enabled {
            self.timer.disarm();
        } else if self.state == SchedulerState::Idle && !self.timer.is_armed() {
            self.timer.arm(Duration::from_millis(self.config.round_delay_ms));
        }
    }

    pub fn auto_advance(&self) -> bool {
        self.auto_advance
    }

    pub fn pending_restart(&self) -> Option<ArmedRestart> {
        self.timer.armed()
    }

    pub fn current_round(&self) -> u64 {
        self.round
    }

    pub fn alive_cats(&self) -> usize {
        self.cats.len()
    }

    pub fn alive_mice(&self) -> usize {
        self.mice.len()
    }

    pub fn is_round_ongoing(&self) -> bool {
        matches!(self.state, SchedulerState::RoundRunning | SchedulerState::Resolving)
    }

    pub fn victory(&self) -> Option<Victory> {
        match self.state {
            SchedulerState::Finished(victory) => Some(victory),
            _ => None,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn episode_id(&self) -> EpisodeId {
        self.episode_id
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn animal(&self, id: AnimalId) -> Option<&Animal> {
        self.animals.get(&id)
    }

    pub fn cats(&self) -> &[AnimalId] {
        &self.cats
    }

    pub fn mice(&self) -> &[AnimalId] {
        &self.mice
    }

    pub fn stats(&self) -> &EpisodeStats {
        &self.stats
    }

    /// Take all events buffered since the last call
    pub fn drain_events(&mut self) -> Vec<SimEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn snapshot(&self) -> WorldSnapshot {
        let animals = self
            .cats
            .iter()
            .chain(self.mice.iter())
            .filter_map(|id| self.animals.get(id))
            .map(AnimalData::from)
            .collect();

        WorldSnapshot {
            episode_id: self.episode_id,
            round: self.round,
            state: self.state,
            map_size: self.grid.size(),
            animals,
        }
    }
}

/// Serializable view of the population at a point in time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub episode_id: EpisodeId,
    pub round: u64,
    pub state: SchedulerState,
    pub map_size: i32,
    pub animals: Vec<AnimalData>,
}
