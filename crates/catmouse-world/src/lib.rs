//! Grid world and round scheduling for the cat and mouse simulation.
//!
//! The [`RoundScheduler`] owns the [`Grid`] and every [`Animal`]. Each round
//! gives all cats a turn, then all mice, then resolves breeding and
//! starvation before checking for a winner on the next start.

pub mod grid;
pub mod animal;
pub mod scheduler;
pub mod timer;
pub mod events;

pub use grid::{Grid, Tile};
pub use animal::{Animal, AnimalData, TurnOutcome, TurnPhase, TurnPlan, TurnReport};
pub use scheduler::{RoundScheduler, SchedulerState, WorldSnapshot};
pub use timer::{ArmedRestart, RestartTimer, TimerTicket};
pub use events::SimEvent;
