//! The simulation interface consumed by the environment handle.
//!
//! A `Simulation` is one stateful environment instance: it resets, steps,
//! describes its spaces and optionally renders itself or exposes an
//! explicit transition model. Built-in implementations live in
//! [`crate::envs`]; the handle never depends on a concrete type.

use crate::error::SimulationError;
use crate::spaces::Space;
use gymlink_env::{ActionPayload, Observation};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Free-form diagnostic data returned with every step.
pub type InfoMap = Map<String, Value>;

/// Result of advancing one instance by one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub observation: Observation,
    pub reward: f64,
    pub done: bool,
    pub info: InfoMap,
}

impl StepOutcome {
    pub fn new(observation: Observation, reward: f64, done: bool) -> Self {
        Self {
            observation,
            reward,
            done,
            info: InfoMap::new(),
        }
    }

    /// Adds an entry to the info map.
    pub fn with_info(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.info.insert(key.to_string(), value.into());
        self
    }
}

/// A rendered view of the current state.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderFrame {
    /// Terminal-friendly text
    Text(String),

    /// Grayscale image, row-major
    Pixels {
        width: usize,
        height: usize,
        data: Vec<u8>,
    },
}

/// One possible outcome of taking an action in a state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub prob: f64,
    pub next_state: u64,
    pub reward: f64,
    pub done: bool,
}

/// Full outcome distribution `P[state][action]` of a discrete environment.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionTable {
    n_states: usize,
    n_actions: usize,
    outcomes: Vec<Vec<Vec<Transition>>>,
}

impl TransitionTable {
    /// Creates a table from `outcomes[state][action]`.
    pub fn new(outcomes: Vec<Vec<Vec<Transition>>>) -> Self {
        let n_states = outcomes.len();
        let n_actions = outcomes.first().map(|row| row.len()).unwrap_or(0);
        Self {
            n_states,
            n_actions,
            outcomes,
        }
    }

    pub fn n_states(&self) -> usize {
        self.n_states
    }

    pub fn n_actions(&self) -> usize {
        self.n_actions
    }

    /// Looks up the outcome distribution for `(state, action)`.
    pub fn outcomes(&self, state: u64, action: u64) -> Result<&[Transition], SimulationError> {
        self.outcomes
            .get(state as usize)
            .and_then(|row| row.get(action as usize))
            .map(|list| list.as_slice())
            .ok_or(SimulationError::StateOutOfRange { state, action })
    }
}

/// A single stateful simulation instance.
pub trait Simulation: Send {
    /// Registered identifier (e.g. `"FrozenLake-v0"`).
    fn id(&self) -> &str;

    fn action_space(&self) -> &Space;

    fn observation_space(&self) -> &Space;

    /// Returns the instance to its initial state.
    fn reset(&mut self) -> Result<Observation, SimulationError>;

    /// Advances the instance by one tick.
    fn step(&mut self, action: &ActionPayload) -> Result<StepOutcome, SimulationError>;

    /// Renders the current state, if the simulation supports it.
    fn render(&self) -> Option<RenderFrame> {
        None
    }

    /// Explicit transition model, for model-based environments only.
    fn transition_model(&self) -> Option<&TransitionTable> {
        None
    }

    /// Releases any resources held by the instance.
    fn close(&mut self) {}
}

/// Validates a discrete action against `space`.
pub(crate) fn discrete_action(space: &Space, action: &ActionPayload) -> Result<u64, SimulationError> {
    match action.as_discrete() {
        Some(value) if space.contains_discrete(value) => Ok(value as u64),
        _ => Err(invalid_action(space, action)),
    }
}

/// Rejects `action` unless it lies in `space`.
pub(crate) fn check_action(space: &Space, action: &ActionPayload) -> Result<(), SimulationError> {
    if space.contains_action(action) {
        Ok(())
    } else {
        Err(invalid_action(space, action))
    }
}

fn invalid_action(space: &Space, action: &ActionPayload) -> SimulationError {
    SimulationError::InvalidAction {
        action: serde_json::to_string(action).unwrap_or_else(|_| format!("{:?}", action)),
        space: space.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_state_table() -> TransitionTable {
        let stay = Transition { prob: 1.0, next_state: 0, reward: 0.0, done: false };
        let go = Transition { prob: 1.0, next_state: 1, reward: 1.0, done: true };
        TransitionTable::new(vec![vec![vec![stay], vec![go]], vec![vec![stay], vec![stay]]])
    }

    #[test]
    fn test_transition_table_lookup() {
        let table = two_state_table();
        assert_eq!(table.n_states(), 2);
        assert_eq!(table.n_actions(), 2);

        let outcomes = table.outcomes(0, 1).unwrap();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].next_state, 1);
        assert!(outcomes[0].done);
    }

    #[test]
    fn test_transition_table_out_of_range() {
        let table = two_state_table();
        assert!(matches!(
            table.outcomes(5, 0),
            Err(SimulationError::StateOutOfRange { state: 5, action: 0 })
        ));
        assert!(table.outcomes(0, 9).is_err());
    }

    #[test]
    fn test_discrete_action_validation() {
        let space = Space::discrete(4);
        assert_eq!(discrete_action(&space, &ActionPayload::Discrete(2)).unwrap(), 2);
        assert_eq!(discrete_action(&space, &ActionPayload::Continuous(1.0)).unwrap(), 1);

        let err = discrete_action(&space, &ActionPayload::Discrete(7)).unwrap_err();
        assert!(err.to_string().contains("Discrete(4)"));
    }

    #[test]
    fn test_step_outcome_info() {
        let outcome = StepOutcome::new(Observation::Discrete(3), 0.0, false).with_info("prob", 0.5);
        assert_eq!(outcome.info["prob"], 0.5);
    }
}
