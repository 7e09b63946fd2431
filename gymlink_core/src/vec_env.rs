//! Vectorized simulation: N independent copies stepped in lockstep.
//!
//! Construction, reset and step fan out across the rayon pool when the
//! `parallel` feature is enabled; results are always gathered in
//! instance-index order. Finished instances are reset automatically
//! inside `step`, so every returned observation is a live one.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::envs;
use crate::error::{HandleError, SimulationError};
use crate::simulation::{
    check_action, InfoMap, RenderFrame, Simulation, StepOutcome, TransitionTable,
};
use crate::spaces::Space;
use gymlink_env::{ActionPayload, Observation};
use serde_json::Value;

/// Info key holding the last observation of an auto-reset instance.
pub const TERMINAL_OBSERVATION_KEY: &str = "terminal_observation";

/// Per-instance results of one vectorized step, in index order.
#[derive(Debug, Clone, PartialEq)]
pub struct VecStep {
    pub observations: Vec<Observation>,
    pub rewards: Vec<f64>,
    pub dones: Vec<bool>,
    pub infos: Vec<InfoMap>,
}

/// A batch of identically configured simulation instances.
pub struct VecSimulation {
    id: String,
    instances: Vec<Box<dyn Simulation>>,
}

impl VecSimulation {
    /// Builds `copies` instances of `id`, seeding instance `i` with `seed + i`.
    pub fn build(id: &str, copies: usize, seed: u64) -> Result<Self, HandleError> {
        let spec = envs::spec(id)
            .ok_or_else(|| HandleError::Construction(format!("No registered env with id: {}", id)))?;
        if copies == 0 {
            return Err(HandleError::Configuration(
                "a vectorized env needs at least one copy".to_string(),
            ));
        }

        #[cfg(feature = "parallel")]
        let instances = (0..copies)
            .into_par_iter()
            .map(|index| spec.build(seed.wrapping_add(index as u64)))
            .collect();

        #[cfg(not(feature = "parallel"))]
        let instances = (0..copies)
            .map(|index| spec.build(seed.wrapping_add(index as u64)))
            .collect();

        Ok(Self {
            id: id.to_string(),
            instances,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn action_space(&self) -> &Space {
        self.instances[0].action_space()
    }

    pub fn observation_space(&self) -> &Space {
        self.instances[0].observation_space()
    }

    /// Resets every instance.
    pub fn reset(&mut self) -> Result<Vec<Observation>, SimulationError> {
        for_each_instance(&mut self.instances, |_, env| env.reset())
            .into_iter()
            .collect()
    }

    /// Steps instance `i` with `actions[i]`.
    ///
    /// The whole batch is checked before any instance moves, so a rejected
    /// batch leaves every instance where it was.
    pub fn step(&mut self, actions: &[ActionPayload]) -> Result<VecStep, SimulationError> {
        if actions.len() != self.instances.len() {
            return Err(SimulationError::BatchMismatch {
                expected: self.instances.len(),
                got: actions.len(),
            });
        }
        let space = self.action_space();
        for action in actions {
            check_action(space, action)?;
        }

        let outcomes = for_each_instance(
            &mut self.instances,
            |index, env| -> Result<StepOutcome, SimulationError> {
                let mut outcome = env.step(&actions[index])?;
                if outcome.done {
                    let terminal = std::mem::replace(&mut outcome.observation, env.reset()?);
                    outcome.info.insert(
                        TERMINAL_OBSERVATION_KEY.to_string(),
                        serde_json::to_value(terminal).unwrap_or(Value::Null),
                    );
                }
                Ok(outcome)
            },
        )
        .into_iter()
        .collect::<Result<Vec<_>, SimulationError>>()?;

        let mut step = VecStep {
            observations: Vec::with_capacity(outcomes.len()),
            rewards: Vec::with_capacity(outcomes.len()),
            dones: Vec::with_capacity(outcomes.len()),
            infos: Vec::with_capacity(outcomes.len()),
        };
        for outcome in outcomes {
            step.observations.push(outcome.observation);
            step.rewards.push(outcome.reward);
            step.dones.push(outcome.done);
            step.infos.push(outcome.info);
        }
        Ok(step)
    }

    /// Renders every instance that supports rendering, tagged by index.
    pub fn render(&self) -> Vec<(usize, RenderFrame)> {
        self.instances
            .iter()
            .enumerate()
            .filter_map(|(index, env)| env.render().map(|frame| (index, frame)))
            .collect()
    }

    /// Transition model of the first instance (all copies share one).
    pub fn transition_model(&self) -> Option<&TransitionTable> {
        self.instances.first().and_then(|env| env.transition_model())
    }

    pub fn close(&mut self) {
        for env in self.instances.iter_mut() {
            env.close();
        }
    }
}

/// Applies `f` to every instance, in parallel when enabled, preserving order.
fn for_each_instance<R, F>(instances: &mut [Box<dyn Simulation>], f: F) -> Vec<R>
where
    F: Fn(usize, &mut Box<dyn Simulation>) -> R + Sync + Send,
    R: Send,
{
    #[cfg(feature = "parallel")]
    {
        instances
            .par_iter_mut()
            .enumerate()
            .map(|(index, env)| f(index, env))
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    {
        instances
            .iter_mut()
            .enumerate()
            .map(|(index, env)| f(index, env))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn discrete(actions: &[i64]) -> Vec<ActionPayload> {
        actions.iter().map(|&a| ActionPayload::Discrete(a)).collect()
    }

    #[test]
    fn test_build_and_spaces() {
        let vec_env = VecSimulation::build("CartPole-v1", 3, 7).unwrap();
        assert_eq!(vec_env.len(), 3);
        assert_eq!(vec_env.id(), "CartPole-v1");
        assert_eq!(vec_env.action_space(), &Space::discrete(2));
    }

    #[test]
    fn test_build_unknown_id() {
        assert!(matches!(
            VecSimulation::build("Pong-v99", 2, 0),
            Err(HandleError::Construction(_))
        ));
    }

    #[test]
    fn test_seeds_follow_index() {
        let mut vec_env = VecSimulation::build("CartPole-v1", 3, 10).unwrap();
        let batch = vec_env.reset().unwrap();

        for (index, observation) in batch.iter().enumerate() {
            let mut single = envs::make("CartPole-v1", 10 + index as u64).unwrap();
            assert_eq!(&single.reset().unwrap(), observation);
        }
        assert_ne!(batch[0], batch[1]);
    }

    #[test]
    fn test_batch_size_checked() {
        let mut vec_env = VecSimulation::build("Catch-v0", 2, 0).unwrap();
        vec_env.reset().unwrap();

        let err = vec_env.step(&discrete(&[1])).unwrap_err();
        assert!(matches!(err, SimulationError::BatchMismatch { expected: 2, got: 1 }));
    }

    #[test]
    fn test_rejected_batch_moves_no_instance() {
        let mut vec_env = VecSimulation::build("CartPole-v1", 2, 21).unwrap();
        let mut fresh = VecSimulation::build("CartPole-v1", 2, 21).unwrap();
        vec_env.reset().unwrap();
        fresh.reset().unwrap();

        let err = vec_env.step(&discrete(&[1, 7])).unwrap_err();
        assert!(matches!(err, SimulationError::InvalidAction { .. }));

        let after = vec_env.step(&discrete(&[1, 1])).unwrap();
        let expected = fresh.step(&discrete(&[1, 1])).unwrap();
        assert_eq!(after, expected);
    }

    #[test]
    fn test_auto_reset_on_done() {
        let mut vec_env = VecSimulation::build("Catch-v0", 2, 3).unwrap();
        vec_env.reset().unwrap();

        let mut last = None;
        for _ in 0..9 {
            last = Some(vec_env.step(&discrete(&[1, 1])).unwrap());
        }
        let last = last.unwrap();

        assert_eq!(last.dones, vec![true, true]);
        for (observation, info) in last.observations.iter().zip(&last.infos) {
            assert!(info.contains_key(TERMINAL_OBSERVATION_KEY));
            // The returned frame is a fresh one: ball back on the top row.
            match observation {
                Observation::Continuous(pixels) => {
                    assert_eq!(pixels[..10].iter().filter(|&&p| p == 1.0).count(), 1)
                }
                other => panic!("unexpected observation {:?}", other),
            }
        }

        // Instances keep running after the automatic reset.
        assert!(vec_env.step(&discrete(&[1, 1])).is_ok());
    }

    #[test]
    fn test_transition_model_from_first_instance() {
        let lakes = VecSimulation::build("FrozenLake-v0", 2, 0).unwrap();
        assert_eq!(lakes.transition_model().map(|t| t.n_states()), Some(16));

        let poles = VecSimulation::build("CartPole-v0", 2, 0).unwrap();
        assert!(poles.transition_model().is_none());
    }
}
