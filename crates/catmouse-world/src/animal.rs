//! Animal state and the per-turn state machine.
//!
//! A turn runs in two halves so the scheduler can resolve a kill in between:
//! [`Animal::begin_turn`] decides between eating and moving and vacates or
//! reserves tiles on the grid, and [`Animal::finish_turn`] lands the animal,
//! updates its counters and produces the [`TurnReport`].

use crate::grid::Grid;
use catmouse_core::{AnimalId, Occupant, Position, Species, SpeciesConfig};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

/// Where an animal is within its turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnPhase {
    Idle,
    Deciding,
    Moving,
    TurnComplete,
}

/// Decision taken by [`Animal::begin_turn`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPlan {
    /// Own tile vacated; the victim on `target` must be killed before finishing
    Eat { victim: AnimalId, target: Position },
    /// Destination already reserved on the grid
    Move { from: Position, to: Position },
    /// Nowhere to go
    Stay,
}

/// How a finished turn went
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnOutcome {
    Ate { victim: AnimalId, at: Position },
    Moved { from: Position, to: Position },
    Blocked,
}

/// Everything the scheduler needs to know once a turn completes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnReport {
    pub animal: AnimalId,
    pub outcome: TurnOutcome,
    pub success: bool,
    /// Starve counter had reached the threshold this turn
    pub starved: bool,
    /// At least one offspring is owed
    pub bred: bool,
}

/// A cat or a mouse
#[derive(Debug, Clone)]
pub struct Animal {
    id: AnimalId,
    species: Species,
    position: Position,
    policy: SpeciesConfig,
    phase: TurnPhase,
    starve_counter: u8,
    breed_counter: u8,
    pending_breeds: u32,
    turns_taken: u64,
    born_round: u64,
    eat_target: Option<(AnimalId, Position)>,
    move_target: Option<Position>,
}

impl Animal {
    pub fn new(id: AnimalId, species: Species, position: Position, policy: SpeciesConfig, born_round: u64) -> Self {
        Self {
            id,
            species,
            position,
            policy,
            phase: TurnPhase::Idle,
            starve_counter: 0,
            breed_counter: 0,
            pending_breeds: 0,
            turns_taken: 0,
            born_round,
            eat_target: None,
            move_target: None,
        }
    }

    pub fn id(&self) -> AnimalId {
        self.id
    }

    pub fn species(&self) -> Species {
        self.species
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    pub fn starve_counter(&self) -> u8 {
        self.starve_counter
    }

    pub fn breed_counter(&self) -> u8 {
        self.breed_counter
    }

    pub fn pending_breeds(&self) -> u32 {
        self.pending_breeds
    }

    pub fn set_pending_breeds(&mut self, pending: u32) {
        self.pending_breeds = pending;
    }

    pub fn turns_taken(&self) -> u64 {
        self.turns_taken
    }

    pub fn born_round(&self) -> u64 {
        self.born_round
    }

    pub fn occupant(&self) -> Occupant {
        Occupant {
            id: self.id,
            species: self.species,
        }
    }

    /// Decide the turn and apply the grid side of it
    pub fn begin_turn<R: Rng + ?Sized>(&mut self, grid: &mut Grid, rng: &mut R) -> TurnPlan {
        self.phase = TurnPhase::Deciding;
        self.eat_target = None;
        self.move_target = None;

        if self.policy.can_eat {
            if let Some(prey) = self.random_eat_target(grid, rng) {
                grid.clear(self.position);
                self.eat_target = Some((prey.id, prey.position));
                self.phase = TurnPhase::Moving;
                return TurnPlan::Eat {
                    victim: prey.id,
                    target: prey.position,
                };
            }
        }

        let empty = grid.adjacent_empty_tiles(self.position);
        if empty.is_empty() {
            return TurnPlan::Stay;
        }

        let to = empty[rng.gen_range(0..empty.len())].position;
        let from = self.position;
        grid.clear(from);
        if let Err(e) = grid.place(self.occupant(), to) {
            warn!(animal_id = %self.id, error = %e, "Reserved tile was taken, staying put");
            self.restore(grid, from);
            return TurnPlan::Stay;
        }

        self.move_target = Some(to);
        self.phase = TurnPhase::Moving;
        TurnPlan::Move { from, to }
    }

    /// Land on the destination, run the starve and breed checks and report.
    ///
    /// For an eat-turn the victim must already be gone from the target tile.
    pub fn finish_turn(&mut self, grid: &mut Grid) -> TurnReport {
        let from = self.position;
        let mut outcome = TurnOutcome::Blocked;

        if let Some((victim, target)) = self.eat_target.take() {
            match grid.place(self.occupant(), target) {
                Ok(()) => {
                    self.starve_counter = 0;
                    self.position = target;
                    outcome = TurnOutcome::Ate { victim, at: target };
                }
                Err(e) => {
                    warn!(animal_id = %self.id, error = %e, "Eat target still occupied, turn failed");
                    self.restore(grid, from);
                }
            }
        } else if let Some(to) = self.move_target.take() {
            self.position = to;
            outcome = TurnOutcome::Moved { from, to };
        }

        let ate = matches!(outcome, TurnOutcome::Ate { .. });
        let mut starved = false;
        if !ate && self.policy.can_starve {
            // Evaluated on the pre-increment value
            starved = self.try_starve();
            self.starve_counter = self.starve_counter.saturating_add(1);
        }

        let bred = self.policy.can_breed && self.try_breed();

        self.turns_taken += 1;
        self.phase = TurnPhase::TurnComplete;

        trace!(
            animal_id = %self.id,
            species = %self.species,
            ?outcome,
            starve_counter = self.starve_counter,
            breed_counter = self.breed_counter,
            pending_breeds = self.pending_breeds,
            "Turn finished"
        );

        TurnReport {
            animal: self.id,
            outcome,
            success: outcome != TurnOutcome::Blocked,
            starved,
            bred,
        }
    }

    /// Back to idle once the scheduler has consumed the report
    pub fn end_turn(&mut self) {
        self.phase = TurnPhase::Idle;
    }

    /// Advance the breed counter; true while any offspring is owed
    pub fn try_breed(&mut self) -> bool {
        if self.breed_counter >= self.policy.breed_threshold {
            self.pending_breeds += 1;
            self.breed_counter = 0;
        } else {
            self.breed_counter = self.breed_counter.saturating_add(1);
        }

        self.pending_breeds > 0
    }

    pub fn try_starve(&self) -> bool {
        self.starve_counter >= self.policy.starvation_threshold
    }

    /// Uniform pick among adjacent tiles holding the edible species
    fn random_eat_target<R: Rng + ?Sized>(&self, grid: &Grid, rng: &mut R) -> Option<Prey> {
        let edible = self.policy.edible?;
        let candidates: Vec<Prey> = grid
            .adjacent_tiles(self.position)
            .into_iter()
            .filter_map(|tile| {
                tile.occupant()
                    .filter(|o| o.species == edible)
                    .map(|o| Prey {
                        id: o.id,
                        position: tile.position,
                    })
            })
            .collect();

        candidates.choose(rng).copied()
    }

    fn restore(&mut self, grid: &mut Grid, at: Position) {
        if let Err(e) = grid.place(self.occupant(), at) {
            warn!(animal_id = %self.id, error = %e, "Could not return to original tile");
        }
        self.position = at;
        self.eat_target = None;
        self.move_target = None;
    }
}

#[derive(Debug, Clone, Copy)]
struct Prey {
    id: AnimalId,
    position: Position,
}

/// Serializable animal data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimalData {
    pub id: AnimalId,
    pub species: Species,
    pub position: Position,
    pub starve_counter: u8,
    pub breed_counter: u8,
    pub pending_breeds: u32,
    pub turns_taken: u64,
    pub born_round: u64,
}

impl From<&Animal> for AnimalData {
    fn from(animal: &Animal) -> Self {
        Self {
            id: animal.id,
            species: animal.species,
            position: animal.position,
            starve_counter: animal.starve_counter,
            breed_counter: animal.breed_counter,
            pending_breeds: animal.pending_breeds,
            turns_taken: animal.turns_taken,
            born_round: animal.born_round,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn spawn(grid: &mut Grid, id: u64, species: Species, policy: SpeciesConfig, pos: Position) -> Animal {
        let animal = Animal::new(AnimalId(id), species, pos, policy, 0);
        grid.place(animal.occupant(), pos).unwrap();
        animal
    }

    fn quiet(species: Species) -> SpeciesConfig {
        SpeciesConfig {
            can_eat: false,
            can_starve: false,
            can_breed: false,
            ..match species {
                Species::Cat => SpeciesConfig::cat(),
                Species::Mouse => SpeciesConfig::mouse(),
            }
        }
    }

    /// Runs a whole turn, standing in for the scheduler's kill handling
    fn run_turn(animal: &mut Animal, grid: &mut Grid, rng: &mut ChaCha8Rng) -> TurnReport {
        if let TurnPlan::Eat { target, .. } = animal.begin_turn(grid, rng) {
            grid.clear(target);
        }
        let report = animal.finish_turn(grid);
        animal.end_turn();
        report
    }

    #[test]
    fn test_animal_creation() {
        let animal = Animal::new(AnimalId(1), Species::Cat, Position::new(2, 3), SpeciesConfig::cat(), 4);
        assert_eq!(animal.species(), Species::Cat);
        assert_eq!(animal.position(), Position::new(2, 3));
        assert_eq!(animal.phase(), TurnPhase::Idle);
        assert_eq!(animal.starve_counter(), 0);
        assert_eq!(animal.pending_breeds(), 0);
        assert_eq!(animal.born_round(), 4);
    }

    #[test]
    fn test_eat_takes_precedence_over_move() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut grid = Grid::new(8);
        let mut cat = spawn(&mut grid, 1, Species::Cat, SpeciesConfig::cat(), Position::new(3, 3));
        spawn(&mut grid, 2, Species::Mouse, quiet(Species::Mouse), Position::new(4, 3));

        let plan = cat.begin_turn(&mut grid, &mut rng);
        assert_eq!(
            plan,
            TurnPlan::Eat {
                victim: AnimalId(2),
                target: Position::new(4, 3)
            }
        );
        assert_eq!(cat.phase(), TurnPhase::Moving);
        // Own tile is vacated before the position changes
        assert!(grid.is_empty_at(Position::new(3, 3)));
        assert_eq!(cat.position(), Position::new(3, 3));

        grid.clear(Position::new(4, 3));
        let report = cat.finish_turn(&mut grid);
        assert_eq!(
            report.outcome,
            TurnOutcome::Ate {
                victim: AnimalId(2),
                at: Position::new(4, 3)
            }
        );
        assert!(report.success);
        assert_eq!(cat.position(), Position::new(4, 3));
        assert_eq!(grid.occupant_at(Position::new(4, 3)), Some(cat.occupant()));
        assert_eq!(cat.phase(), TurnPhase::TurnComplete);
    }

    #[test]
    fn test_eat_choice_is_random_among_candidates() {
        let mut seen = std::collections::HashSet::new();
        for seed in 0..64 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let mut grid = Grid::new(5);
            let mut cat = spawn(&mut grid, 1, Species::Cat, SpeciesConfig::cat(), Position::new(2, 2));
            for (i, pos) in [Position::new(2, 3), Position::new(2, 1), Position::new(1, 2), Position::new(3, 2)]
                .into_iter()
                .enumerate()
            {
                spawn(&mut grid, 10 + i as u64, Species::Mouse, quiet(Species::Mouse), pos);
            }

            if let TurnPlan::Eat { victim, .. } = cat.begin_turn(&mut grid, &mut rng) {
                seen.insert(victim);
            }
        }
        assert_eq!(seen.len(), 4);
    }

    #[test]
    fn test_move_choice_is_uniform() {
        let mut rng = ChaCha8Rng::seed_from_u64(23);
        let mut grid = Grid::new(3);
        let centre = Position::new(1, 1);
        let mut mouse = spawn(&mut grid, 1, Species::Mouse, quiet(Species::Mouse), centre);
        // North is blocked, leaving three candidates
        spawn(&mut grid, 2, Species::Mouse, quiet(Species::Mouse), Position::new(1, 2));

        let draws = 30_000;
        let mut counts: std::collections::HashMap<Position, usize> = std::collections::HashMap::new();
        for _ in 0..draws {
            let TurnPlan::Move { to, .. } = mouse.begin_turn(&mut grid, &mut rng) else {
                panic!("expected a move");
            };
            *counts.entry(to).or_default() += 1;

            // Undo the reservation so every draw starts from the centre
            grid.clear(to);
            grid.place(mouse.occupant(), centre).unwrap();
            mouse.end_turn();
        }

        assert_eq!(counts.len(), 3);
        assert!(!counts.contains_key(&Position::new(1, 2)));
        let expected = draws as f64 / 3.0;
        for (pos, count) in counts {
            let deviation = (count as f64 - expected).abs() / expected;
            assert!(deviation < 0.05, "{} chosen {} times, expected about {}", pos, count, expected);
        }
    }

    #[test]
    fn test_cat_ignores_other_cats() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut grid = Grid::new(3);
        let mut cat = spawn(&mut grid, 1, Species::Cat, SpeciesConfig::cat(), Position::new(0, 0));
        spawn(&mut grid, 2, Species::Cat, SpeciesConfig::cat(), Position::new(1, 0));

        let plan = cat.begin_turn(&mut grid, &mut rng);
        assert_eq!(
            plan,
            TurnPlan::Move {
                from: Position::new(0, 0),
                to: Position::new(0, 1)
            }
        );
    }

    #[test]
    fn test_move_reserves_destination_first() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut grid = Grid::new(8);
        let mut mouse = spawn(&mut grid, 1, Species::Mouse, quiet(Species::Mouse), Position::new(4, 4));

        let plan = mouse.begin_turn(&mut grid, &mut rng);
        let TurnPlan::Move { from, to } = plan else {
            panic!("expected a move, got {:?}", plan);
        };
        assert_eq!(from, Position::new(4, 4));
        assert_eq!(to.manhattan_distance(&from), 1);
        assert_eq!(grid.occupant_at(to), Some(mouse.occupant()));
        assert!(grid.is_empty_at(from));
        assert_eq!(mouse.position(), from);

        let report = mouse.finish_turn(&mut grid);
        assert_eq!(report.outcome, TurnOutcome::Moved { from, to });
        assert_eq!(mouse.position(), to);
    }

    #[test]
    fn test_boxed_in_animal_stays() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let mut grid = Grid::new(2);
        let mut mouse = spawn(&mut grid, 1, Species::Mouse, quiet(Species::Mouse), Position::new(0, 0));
        spawn(&mut grid, 2, Species::Mouse, quiet(Species::Mouse), Position::new(1, 0));
        spawn(&mut grid, 3, Species::Mouse, quiet(Species::Mouse), Position::new(0, 1));

        let report = run_turn(&mut mouse, &mut grid, &mut rng);
        assert_eq!(report.outcome, TurnOutcome::Blocked);
        assert!(!report.success);
        assert_eq!(mouse.position(), Position::new(0, 0));
        assert_eq!(grid.occupant_at(Position::new(0, 0)), Some(mouse.occupant()));
    }

    #[test]
    fn test_starvation_threshold() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut grid = Grid::new(8);
        let policy = SpeciesConfig {
            can_breed: false,
            starvation_threshold: 3,
            ..SpeciesConfig::cat()
        };
        let mut cat = spawn(&mut grid, 1, Species::Cat, policy, Position::new(4, 4));

        let mut observed = Vec::new();
        let mut starved_on = Vec::new();
        for turn in 1..=5 {
            observed.push(cat.starve_counter());
            if run_turn(&mut cat, &mut grid, &mut rng).starved {
                starved_on.push(turn);
            }
        }

        assert_eq!(observed, vec![0, 1, 2, 3, 4]);
        // Fourth non-eating turn is the first to starve; the counter keeps
        // climbing until the scheduler removes the animal.
        assert_eq!(starved_on, vec![4, 5]);
    }

    #[test]
    fn test_eating_resets_starve_counter() {
        let mut rng = ChaCha8Rng::seed_from_u64(13);
        let mut grid = Grid::new(8);
        let mut cat = spawn(&mut grid, 1, Species::Cat, SpeciesConfig::cat(), Position::new(0, 0));

        run_turn(&mut cat, &mut grid, &mut rng);
        run_turn(&mut cat, &mut grid, &mut rng);
        assert_eq!(cat.starve_counter(), 2);

        let prey_at = grid.adjacent_empty_tiles(cat.position())[0].position;
        spawn(&mut grid, 2, Species::Mouse, quiet(Species::Mouse), prey_at);
        let report = run_turn(&mut cat, &mut grid, &mut rng);

        assert!(matches!(report.outcome, TurnOutcome::Ate { .. }));
        assert!(!report.starved);
        assert_eq!(cat.starve_counter(), 0);
    }

    #[test]
    fn test_breeding_accumulation() {
        let policy = SpeciesConfig {
            breed_threshold: 2,
            ..SpeciesConfig::mouse()
        };
        let mut mouse = Animal::new(AnimalId(1), Species::Mouse, Position::new(0, 0), policy, 0);

        assert!(!mouse.try_breed());
        assert_eq!(mouse.breed_counter(), 1);
        assert!(!mouse.try_breed());
        assert_eq!(mouse.breed_counter(), 2);

        assert!(mouse.try_breed());
        assert_eq!(mouse.breed_counter(), 0);
        assert_eq!(mouse.pending_breeds(), 1);

        // Still owed, so every turn reports until the offspring is spawned
        assert!(mouse.try_breed());
        assert!(mouse.try_breed());
        assert!(mouse.try_breed());
        assert_eq!(mouse.pending_breeds(), 2);
    }

    #[test]
    fn test_turn_reports_breeding() {
        let mut rng = ChaCha8Rng::seed_from_u64(17);
        let mut grid = Grid::new(8);
        let policy = SpeciesConfig {
            breed_threshold: 1,
            ..SpeciesConfig::mouse()
        };
        let mut mouse = spawn(&mut grid, 1, Species::Mouse, policy, Position::new(4, 4));

        assert!(!run_turn(&mut mouse, &mut grid, &mut rng).bred);
        assert!(run_turn(&mut mouse, &mut grid, &mut rng).bred);
        assert_eq!(mouse.pending_breeds(), 1);
        assert_eq!(mouse.turns_taken(), 2);
        assert_eq!(mouse.phase(), TurnPhase::Idle);
    }

    #[test]
    fn test_animal_data() {
        let animal = Animal::new(AnimalId(3), Species::Mouse, Position::new(1, 1), SpeciesConfig::mouse(), 2);
        let data = AnimalData::from(&animal);
        assert_eq!(data.id, AnimalId(3));
        assert_eq!(data.position, Position::new(1, 1));

        let json = serde_json::to_string(&data).unwrap();
        let back: AnimalData = serde_json::from_str(&json).unwrap();
        assert_eq!(back, data);
    }
}
