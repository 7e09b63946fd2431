//! Built-in simulations and the name-keyed registry that constructs them.

pub mod cart_pole;
pub mod catch;
pub mod frozen_lake;
pub mod time_limit;

pub use cart_pole::CartPole;
pub use catch::Catch;
pub use frozen_lake::FrozenLake;
pub use time_limit::{TimeLimit, TRUNCATED_KEY};

use crate::error::HandleError;
use crate::simulation::Simulation;

/// Broad category of a registered simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvFamily {
    /// Discrete grid worlds with an explicit transition model
    GridWorld,

    /// Classic control tasks with vector observations
    Control,

    /// Pixel-observation games
    Visual,
}

/// Registration record for one simulation id.
#[derive(Debug, Clone, Copy)]
pub struct EnvSpec {
    pub id: &'static str,
    pub family: EnvFamily,
    pub max_episode_steps: u32,

    /// Builds a bare (unwrapped) instance from a seed
    entry: fn(u64) -> Box<dyn Simulation>,
}

impl EnvSpec {
    /// Builds a seeded instance wrapped in its time limit.
    pub fn build(&self, seed: u64) -> Box<dyn Simulation> {
        Box::new(TimeLimit::new((self.entry)(seed), self.max_episode_steps))
    }
}

fn frozen_lake_4x4(seed: u64) -> Box<dyn Simulation> {
    Box::new(FrozenLake::four_by_four(seed))
}

fn frozen_lake_8x8(seed: u64) -> Box<dyn Simulation> {
    Box::new(FrozenLake::eight_by_eight(seed))
}

fn cart_pole_v0(seed: u64) -> Box<dyn Simulation> {
    Box::new(CartPole::new("CartPole-v0", seed))
}

fn cart_pole_v1(seed: u64) -> Box<dyn Simulation> {
    Box::new(CartPole::new("CartPole-v1", seed))
}

fn catch_v0(seed: u64) -> Box<dyn Simulation> {
    Box::new(Catch::new("Catch-v0", seed))
}

static REGISTRY: [EnvSpec; 5] = [
    EnvSpec {
        id: "FrozenLake-v0",
        family: EnvFamily::GridWorld,
        max_episode_steps: 100,
        entry: frozen_lake_4x4,
    },
    EnvSpec {
        id: "FrozenLake8x8-v0",
        family: EnvFamily::GridWorld,
        max_episode_steps: 200,
        entry: frozen_lake_8x8,
    },
    EnvSpec {
        id: "CartPole-v0",
        family: EnvFamily::Control,
        max_episode_steps: 200,
        entry: cart_pole_v0,
    },
    EnvSpec {
        id: "CartPole-v1",
        family: EnvFamily::Control,
        max_episode_steps: 500,
        entry: cart_pole_v1,
    },
    EnvSpec {
        id: "Catch-v0",
        family: EnvFamily::Visual,
        max_episode_steps: 1000,
        entry: catch_v0,
    },
];

/// Returns every registered simulation id.
pub fn ids() -> Vec<&'static str> {
    REGISTRY.iter().map(|spec| spec.id).collect()
}

/// Looks up the registration record for `id` (exact match).
pub fn spec(id: &str) -> Option<&'static EnvSpec> {
    REGISTRY.iter().find(|spec| spec.id == id)
}

/// Constructs a seeded, time-limited instance of `id`.
pub fn make(id: &str, seed: u64) -> Result<Box<dyn Simulation>, HandleError> {
    spec(id)
        .map(|spec| spec.build(seed))
        .ok_or_else(|| HandleError::Construction(format!("No registered env with id: {}", id)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_id_builds() {
        for id in ids() {
            let env = make(id, 0).unwrap();
            assert_eq!(env.id(), id);
        }
    }

    #[test]
    fn test_unknown_id() {
        let err = make("NoSuchEnv-v9", 0).err().unwrap();
        assert!(matches!(err, HandleError::Construction(_)));
        assert!(err.to_string().contains("NoSuchEnv-v9"));
    }

    #[test]
    fn test_spec_lookup() {
        let frozen = spec("FrozenLake8x8-v0").unwrap();
        assert_eq!(frozen.family, EnvFamily::GridWorld);
        assert_eq!(frozen.max_episode_steps, 200);

        assert_eq!(spec("CartPole-v1").unwrap().max_episode_steps, 500);
        assert!(spec("cartpole-v1").is_none());
    }

    #[test]
    fn test_only_grid_worlds_expose_model() {
        for id in ids() {
            let env = make(id, 0).unwrap();
            let family = spec(id).unwrap().family;
            assert_eq!(env.transition_model().is_some(), family == EnvFamily::GridWorld);
        }
    }
}
