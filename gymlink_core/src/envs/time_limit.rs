//! Episode step budget wrapper.

use crate::error::SimulationError;
use crate::simulation::{RenderFrame, Simulation, StepOutcome, TransitionTable};
use crate::spaces::Space;
use gymlink_env::{ActionPayload, Observation};

/// Info key set when an episode is cut off by the step budget.
pub const TRUNCATED_KEY: &str = "TimeLimit.truncated";

/// Ends episodes after `max_episode_steps` and rejects `step` before
/// the first `reset`.
pub struct TimeLimit {
    inner: Box<dyn Simulation>,
    max_episode_steps: u32,

    /// Steps in the current episode (`None` until the first reset)
    elapsed_steps: Option<u32>,
}

impl TimeLimit {
    pub fn new(inner: Box<dyn Simulation>, max_episode_steps: u32) -> Self {
        Self {
            inner,
            max_episode_steps,
            elapsed_steps: None,
        }
    }
}

impl Simulation for TimeLimit {
    fn id(&self) -> &str {
        self.inner.id()
    }

    fn action_space(&self) -> &Space {
        self.inner.action_space()
    }

    fn observation_space(&self) -> &Space {
        self.inner.observation_space()
    }

    fn reset(&mut self) -> Result<Observation, SimulationError> {
        self.elapsed_steps = Some(0);
        self.inner.reset()
    }

    fn step(&mut self, action: &ActionPayload) -> Result<StepOutcome, SimulationError> {
        let elapsed = self.elapsed_steps.ok_or(SimulationError::ResetRequired)?;

        let mut outcome = self.inner.step(action)?;
        let elapsed = elapsed + 1;
        self.elapsed_steps = Some(elapsed);

        if elapsed >= self.max_episode_steps {
            outcome.info.insert(TRUNCATED_KEY.to_string(), (!outcome.done).into());
            outcome.done = true;
        }
        Ok(outcome)
    }

    fn render(&self) -> Option<RenderFrame> {
        self.inner.render()
    }

    fn transition_model(&self) -> Option<&TransitionTable> {
        self.inner.transition_model()
    }

    fn close(&mut self) {
        self.inner.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envs::frozen_lake::{FrozenLake, MAP_4X4};

    /// Non-slippery lake walking left along the top wall never terminates.
    fn wall_walker(limit: u32) -> TimeLimit {
        TimeLimit::new(Box::new(FrozenLake::new("Walker", &MAP_4X4, false, 0)), limit)
    }

    #[test]
    fn test_step_requires_reset() {
        let mut env = wall_walker(3);
        assert!(matches!(
            env.step(&ActionPayload::Discrete(0)),
            Err(SimulationError::ResetRequired)
        ));
    }

    #[test]
    fn test_truncates_at_limit() {
        let mut env = wall_walker(3);
        env.reset().unwrap();

        for _ in 0..2 {
            let outcome = env.step(&ActionPayload::Discrete(0)).unwrap();
            assert!(!outcome.done);
            assert!(!outcome.info.contains_key(TRUNCATED_KEY));
        }

        let last = env.step(&ActionPayload::Discrete(0)).unwrap();
        assert!(last.done);
        assert_eq!(last.info[TRUNCATED_KEY], true);
    }

    #[test]
    fn test_reset_restarts_budget() {
        let mut env = wall_walker(2);
        env.reset().unwrap();
        env.step(&ActionPayload::Discrete(0)).unwrap();
        env.step(&ActionPayload::Discrete(0)).unwrap();

        env.reset().unwrap();
        assert!(!env.step(&ActionPayload::Discrete(0)).unwrap().done);
    }

    #[test]
    fn test_forwards_transition_model() {
        let env = wall_walker(10);
        assert!(env.transition_model().is_some());
        assert_eq!(env.id(), "Walker");
    }
}
