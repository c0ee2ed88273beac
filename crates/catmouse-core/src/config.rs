//! Configuration types for the simulation.

use crate::{Error, Result, Species};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Smallest supported side length of the square map
pub const MIN_MAP_SIZE: i32 = 2;
/// Largest supported side length of the square map
pub const MAX_MAP_SIZE: i32 = 999;

/// World configuration parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldConfig {
    /// Side length of the square grid, clamped on use
    pub map_size: i32,
}

impl WorldConfig {
    pub fn clamped_map_size(&self) -> i32 {
        self.map_size.clamp(MIN_MAP_SIZE, MAX_MAP_SIZE)
    }
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self { map_size: 8 }
    }
}

/// Behaviour policy for one species.
///
/// Cats and mice share a single animal type; everything that tells them apart
/// lives here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeciesConfig {
    /// Hunts adjacent animals of the `edible` species
    pub can_eat: bool,
    /// Dies after too many turns without eating
    pub can_starve: bool,
    /// Accumulates offspring over time
    pub can_breed: bool,
    /// Non-eating turns tolerated before starving
    pub starvation_threshold: u8,
    /// Turns between owed offspring
    pub breed_threshold: u8,
    /// The species this one eats, if any
    pub edible: Option<Species>,
}

impl SpeciesConfig {
    pub fn cat() -> Self {
        Self {
            can_eat: true,
            can_starve: true,
            can_breed: true,
            starvation_threshold: 3,
            breed_threshold: 8,
            edible: Some(Species::Mouse),
        }
    }

    pub fn mouse() -> Self {
        Self {
            can_eat: false,
            can_starve: false,
            can_breed: true,
            starvation_threshold: 3,
            breed_threshold: 3,
            edible: None,
        }
    }

    fn validate(&self, species: Species) -> Result<()> {
        if self.can_eat {
            match self.edible {
                None => {
                    return Err(Error::InvalidConfig(format!(
                        "{} can eat but has no edible species",
                        species
                    )))
                }
                Some(prey) if prey == species => {
                    return Err(Error::InvalidConfig(format!("{} cannot eat its own species", species)))
                }
                Some(_) => {}
            }
        }

        if self.can_starve && self.starvation_threshold == 0 {
            return Err(Error::InvalidConfig(format!(
                "{} starvation threshold must be at least 1",
                species
            )));
        }

        if self.can_breed && self.breed_threshold == 0 {
            return Err(Error::InvalidConfig(format!(
                "{} breed threshold must be at least 1",
                species
            )));
        }

        Ok(())
    }
}

/// Full configuration of one episode
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Random seed for reproducibility
    pub seed: u64,
    /// Cats stocked at setup
    pub num_cats: usize,
    /// Mice stocked at setup
    pub num_mice: usize,
    /// Delay between the end of one round and the start of the next
    pub round_delay_ms: u64,
    /// Arm the restart timer whenever a round finishes
    pub auto_advance: bool,
    /// Stop driving rounds after this many (runner only)
    pub max_rounds: Option<u64>,
    /// World configuration
    pub world: WorldConfig,
    pub cat: SpeciesConfig,
    pub mouse: SpeciesConfig,
}

impl SimulationConfig {
    pub fn species(&self, species: Species) -> &SpeciesConfig {
        match species {
            Species::Cat => &self.cat,
            Species::Mouse => &self.mouse,
        }
    }

    /// Reject configurations the simulation cannot start with
    pub fn validate(&self) -> Result<()> {
        for species in Species::all() {
            self.species(species).validate(species)?;
        }
        Ok(())
    }

    /// Load a configuration from a JSON file and validate it
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading simulation config from {:?}", path);

        let contents = std::fs::read_to_string(path)?;
        let config: SimulationConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            num_cats: 3,
            num_mice: 50,
            round_delay_ms: 1000,
            auto_advance: true,
            max_rounds: None,
            world: WorldConfig::default(),
            cat: SpeciesConfig::cat(),
            mouse: SpeciesConfig::mouse(),
        }
    }
}

/// Runner process configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// JSON file holding a `SimulationConfig`
    pub config_path: Option<String>,
    /// Emit logs as JSON lines instead of human-readable text
    pub log_json: bool,
}

impl RunnerConfig {
    /// Read `CATMOUSE_CONFIG` and `CATMOUSE_LOG_JSON`
    pub fn from_env() -> Self {
        let config_path = std::env::var("CATMOUSE_CONFIG").ok().filter(|s| !s.is_empty());
        let log_json = std::env::var("CATMOUSE_LOG_JSON")
            .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Self {
            config_path,
            log_json,
        }
    }

    /// The simulation config named by this runner config, or the default one
    pub fn load_simulation_config(&self) -> Result<SimulationConfig> {
        match &self.config_path {
            Some(path) => SimulationConfig::from_json_file(path),
            None => Ok(SimulationConfig::default()),
        }
    }
}
