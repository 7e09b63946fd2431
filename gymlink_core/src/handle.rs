//! Environment handle: owns at most one live simulation.
//!
//! The handle is the only component that touches simulations. It holds
//! an optional instance (single or vectorized) and turns each lifecycle
//! operation into a typed result or a `HandleError`; it never panics on
//! request content.
//!
//! # Lifecycle
//!
//! ```text
//!            make(name, n)              make(name', n')
//!  [empty] ---------------> [live] ----------------------> [live']
//!     ^                        |      (old instance closed first)
//!     +------- close() --------+
//! ```

use crate::config::DEFAULT_MAX_COPIES;
use crate::envs;
use crate::error::HandleError;
use crate::render::{ConsoleSink, FrameSink};
use crate::simulation::{InfoMap, Simulation};
use crate::spaces::Space;
use crate::vec_env::VecSimulation;
use gymlink_env::{ActionPayload, Done, Observation, Reward};
use serde_json::{json, Value};
use tracing::{debug, info};

/// Info key carrying the raw reward(s) of a step.
pub const REWARD_KEY: &str = "reward";

/// Info key carrying per-instance info maps of a vectorized step.
pub const INSTANCES_KEY: &str = "instances";

/// Operations a server variant exposes on top of the common set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// `dynamics` requests are answered from the transition model
    pub dynamics: bool,

    /// `make` honours `env_name` / `num_envs` request parameters
    pub make_overrides: bool,
}

impl Capabilities {
    pub const fn new(dynamics: bool, make_overrides: bool) -> Self {
        Self {
            dynamics,
            make_overrides,
        }
    }
}

/// Space descriptors of the live instance.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvInfo {
    pub action_space: Space,
    pub observation_space: Space,
}

/// Result of one `step` across the live instance(s).
#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    pub observation: Observation,
    pub reward: Reward,
    pub done: Done,

    /// Always contains `"reward"`
    pub info: InfoMap,
}

impl StepResult {
    /// The raw reward entry of `info`, echoed to the driver.
    pub fn info_reward(&self) -> Value {
        self.info.get(REWARD_KEY).cloned().unwrap_or(Value::Null)
    }
}

/// Outcome distribution of one `(state, action)` pair as parallel columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DynamicsResult {
    pub prob: Vec<f64>,
    pub next_state: Vec<u64>,
    pub reward: Vec<f64>,
    pub done: Vec<bool>,
}

impl DynamicsResult {
    pub fn len(&self) -> usize {
        self.prob.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prob.is_empty()
    }
}

enum Instance {
    Single(Box<dyn Simulation>),
    Vectorized(VecSimulation),
}

impl Instance {
    fn id(&self) -> &str {
        match self {
            Instance::Single(env) => env.id(),
            Instance::Vectorized(envs) => envs.id(),
        }
    }

    fn count(&self) -> usize {
        match self {
            Instance::Single(_) => 1,
            Instance::Vectorized(envs) => envs.len(),
        }
    }

    fn close(&mut self) {
        match self {
            Instance::Single(env) => env.close(),
            Instance::Vectorized(envs) => envs.close(),
        }
    }
}

/// Owner of the server's simulation instance.
pub struct EnvironmentHandle {
    /// `None` until the first successful `make`
    instance: Option<Instance>,

    capabilities: Capabilities,

    /// Base seed; vectorized copy `i` uses `seed + i`
    seed: u64,

    /// Largest `copies` accepted by `make`
    max_copies: i64,

    /// Destination of rendered frames
    sink: Box<dyn FrameSink>,
}

impl EnvironmentHandle {
    pub fn new(capabilities: Capabilities, seed: u64) -> Self {
        Self {
            instance: None,
            capabilities,
            seed,
            max_copies: DEFAULT_MAX_COPIES,
            sink: Box::new(ConsoleSink::new()),
        }
    }

    /// Caps the number of copies a `make` may request.
    pub fn with_max_copies(mut self, max_copies: i64) -> Self {
        self.max_copies = max_copies;
        self
    }

    /// Replaces the render destination.
    pub fn with_frame_sink(mut self, sink: Box<dyn FrameSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn is_initialized(&self) -> bool {
        self.instance.is_some()
    }

    /// Number of live simulation instances (0 when empty).
    pub fn instance_count(&self) -> usize {
        self.instance.as_ref().map(Instance::count).unwrap_or(0)
    }

    /// Id of the live simulation, if any.
    pub fn env_id(&self) -> Option<&str> {
        self.instance.as_ref().map(Instance::id)
    }

    /// Creates `copies` instances of `name`, closing any live instance first.
    ///
    /// One copy yields a plain instance; more yield a vectorized batch.
    /// A rejected `copies` leaves the live instance untouched.
    pub fn make(&mut self, name: &str, copies: i64) -> Result<(), HandleError> {
        if copies < 1 || copies > self.max_copies {
            return Err(HandleError::Configuration(format!(
                "copies must be between 1 and {}, got {}",
                self.max_copies, copies
            )));
        }
        self.close();

        info!("Making {} {}s", copies, name);
        let instance = if copies == 1 {
            Instance::Single(envs::make(name, self.seed)?)
        } else {
            Instance::Vectorized(VecSimulation::build(name, copies as usize, self.seed)?)
        };
        self.instance = Some(instance);
        Ok(())
    }

    /// Describes the live instance's spaces.
    pub fn info(&self) -> Result<EnvInfo, HandleError> {
        let (action_space, observation_space) = match self.live()? {
            Instance::Single(env) => (env.action_space(), env.observation_space()),
            Instance::Vectorized(envs) => (envs.action_space(), envs.observation_space()),
        };
        Ok(EnvInfo {
            action_space: action_space.clone(),
            observation_space: observation_space.clone(),
        })
    }

    /// Resets every live instance and returns the initial observation.
    pub fn reset(&mut self) -> Result<Observation, HandleError> {
        info!("Resetting env");
        let observation = match self.live_mut()? {
            Instance::Single(env) => env.reset()?,
            Instance::Vectorized(envs) => Observation::Batch(envs.reset()?),
        };
        Ok(observation)
    }

    /// Advances every live instance by one tick.
    ///
    /// Vectorized handles expect one action per instance. `render` only
    /// feeds the frame sink; it never changes the result.
    pub fn step(&mut self, action: &ActionPayload, render: bool) -> Result<StepResult, HandleError> {
        let instance = self.instance.as_mut().ok_or(HandleError::Uninitialized)?;
        debug!("Stepping in env {} action {:?}", instance.id(), action);

        let result = match instance {
            Instance::Single(env) => {
                let outcome = env.step(action)?;
                if render {
                    if let Some(frame) = env.render() {
                        self.sink.present(0, &frame);
                    }
                }

                let mut info = outcome.info;
                info.entry(REWARD_KEY.to_string())
                    .or_insert_with(|| json!(outcome.reward));
                StepResult {
                    observation: outcome.observation,
                    reward: Reward::Single(outcome.reward),
                    done: Done::Single(outcome.done),
                    info,
                }
            }
            Instance::Vectorized(envs) => {
                let actions = match action {
                    ActionPayload::Batch(items) => items.clone(),
                    leaf => vec![leaf.clone()],
                };
                let step = envs.step(&actions)?;
                if render {
                    for (index, frame) in envs.render() {
                        self.sink.present(index, &frame);
                    }
                }

                let mut info = InfoMap::new();
                let per_instance: Vec<Value> = step.rewards.iter().map(|r| json!([r])).collect();
                info.insert(REWARD_KEY.to_string(), Value::Array(per_instance));
                info.insert(
                    INSTANCES_KEY.to_string(),
                    Value::Array(step.infos.into_iter().map(Value::Object).collect()),
                );
                StepResult {
                    observation: Observation::Batch(step.observations),
                    reward: Reward::Batch(step.rewards),
                    done: Done::Batch(step.dones),
                    info,
                }
            }
        };
        Ok(result)
    }

    /// Outcome distribution of taking `action` in `state`.
    pub fn dynamics(&self, state: u64, action: u64) -> Result<DynamicsResult, HandleError> {
        let instance = self.live()?;
        if !self.capabilities.dynamics {
            return Err(HandleError::UnsupportedOperation(
                "dynamics is not exposed by this server".to_string(),
            ));
        }

        let model = match instance {
            Instance::Single(env) => env.transition_model(),
            Instance::Vectorized(envs) => envs.transition_model(),
        }
        .ok_or_else(|| {
            HandleError::UnsupportedOperation(format!("{} has no transition model", instance.id()))
        })?;

        let mut result = DynamicsResult::default();
        for transition in model.outcomes(state, action)? {
            result.prob.push(transition.prob);
            result.next_state.push(transition.next_state);
            result.reward.push(transition.reward);
            result.done.push(transition.done);
        }
        Ok(result)
    }

    /// Releases the live instance, if any. Safe to call repeatedly.
    pub fn close(&mut self) {
        if let Some(mut instance) = self.instance.take() {
            debug!("Closing {} ({} instances)", instance.id(), instance.count());
            instance.close();
        }
    }

    fn live(&self) -> Result<&Instance, HandleError> {
        self.instance.as_ref().ok_or(HandleError::Uninitialized)
    }

    fn live_mut(&mut self) -> Result<&mut Instance, HandleError> {
        self.instance.as_mut().ok_or(HandleError::Uninitialized)
    }
}

impl Drop for EnvironmentHandle {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::RecordingSink;
    use approx::assert_relative_eq;

    fn grid_handle() -> EnvironmentHandle {
        EnvironmentHandle::new(Capabilities::new(true, false), 0)
    }

    #[test]
    fn test_empty_handle_errors() {
        let mut handle = grid_handle();
        assert!(!handle.is_initialized());
        assert_eq!(handle.instance_count(), 0);

        assert!(matches!(handle.info(), Err(HandleError::Uninitialized)));
        assert!(matches!(handle.reset(), Err(HandleError::Uninitialized)));
        assert!(matches!(
            handle.step(&ActionPayload::Discrete(0), false),
            Err(HandleError::Uninitialized)
        ));
        assert!(matches!(handle.dynamics(0, 0), Err(HandleError::Uninitialized)));
    }

    #[test]
    fn test_make_rejects_bad_copies() {
        let mut handle = grid_handle();
        assert!(matches!(
            handle.make("FrozenLake-v0", 0),
            Err(HandleError::Configuration(_))
        ));
        assert!(matches!(
            handle.make("FrozenLake-v0", -3),
            Err(HandleError::Configuration(_))
        ));
        assert!(matches!(
            handle.make("CartPole-v1", 100_000_000),
            Err(HandleError::Configuration(_))
        ));
        assert!(!handle.is_initialized());

        let mut capped = grid_handle().with_max_copies(2);
        capped.make("CartPole-v1", 2).unwrap();
        assert!(matches!(
            capped.make("CartPole-v1", 3),
            Err(HandleError::Configuration(_))
        ));
        // The live batch survives the rejected request.
        assert_eq!(capped.instance_count(), 2);
        assert_eq!(capped.env_id(), Some("CartPole-v1"));
    }

    #[test]
    fn test_make_unknown_name() {
        let mut handle = grid_handle();
        assert!(matches!(
            handle.make("NoSuchEnv-v0", 1),
            Err(HandleError::Construction(_))
        ));
    }

    #[test]
    fn test_make_close_make() {
        let mut handle = grid_handle();
        handle.make("FrozenLake-v0", 1).unwrap();
        assert_eq!(handle.instance_count(), 1);

        handle.close();
        handle.close();
        assert!(!handle.is_initialized());

        handle.make("FrozenLake-v0", 3).unwrap();
        assert_eq!(handle.instance_count(), 3);

        // Remaking replaces the old instance.
        handle.make("CartPole-v0", 2).unwrap();
        assert_eq!(handle.instance_count(), 2);
        assert_eq!(handle.env_id(), Some("CartPole-v0"));
    }

    #[test]
    fn test_info_reports_spaces() {
        let mut handle = grid_handle();
        handle.make("FrozenLake-v0", 1).unwrap();

        let info = handle.info().unwrap();
        assert_eq!(info.action_space, Space::discrete(4));
        assert_eq!(info.observation_space, Space::discrete(16));
    }

    #[test]
    fn test_reset_matches_space() {
        let mut handle = grid_handle();
        handle.make("FrozenLake-v0", 1).unwrap();

        let observation = handle.reset().unwrap();
        assert_eq!(observation, Observation::Discrete(0));
        assert!(handle.info().unwrap().observation_space.contains(&observation));
    }

    #[test]
    fn test_step_single_reports_reward_info() {
        let mut handle = EnvironmentHandle::new(Capabilities::new(false, true), 4);
        handle.make("CartPole-v1", 1).unwrap();
        handle.reset().unwrap();

        let result = handle.step(&ActionPayload::Discrete(1), false).unwrap();
        assert_eq!(result.reward, Reward::Single(1.0));
        assert_eq!(result.done, Done::Single(false));
        assert_eq!(result.info_reward(), json!(1.0));
    }

    #[test]
    fn test_step_vectorized() {
        let mut handle = EnvironmentHandle::new(Capabilities::default(), 0);
        handle.make("CartPole-v0", 2).unwrap();

        match handle.reset().unwrap() {
            Observation::Batch(items) => assert_eq!(items.len(), 2),
            other => panic!("unexpected observation {:?}", other),
        }

        let actions = ActionPayload::Batch(vec![ActionPayload::Discrete(0), ActionPayload::Discrete(1)]);
        let result = handle.step(&actions, false).unwrap();
        assert_eq!(result.reward, Reward::Batch(vec![1.0, 1.0]));
        assert_eq!(result.done, Done::Batch(vec![false, false]));
        assert_eq!(result.info_reward(), json!([[1.0], [1.0]]));

        // A single action cannot drive two instances.
        assert!(matches!(
            handle.step(&ActionPayload::Discrete(0), false),
            Err(HandleError::Simulation(_))
        ));
    }

    #[test]
    fn test_rejected_batch_leaves_instances_in_place() {
        let batch = |actions: &[i64]| {
            ActionPayload::Batch(actions.iter().map(|&a| ActionPayload::Discrete(a)).collect())
        };
        let mut handle = EnvironmentHandle::new(Capabilities::new(false, true), 11);
        let mut fresh = EnvironmentHandle::new(Capabilities::new(false, true), 11);
        for h in [&mut handle, &mut fresh] {
            h.make("CartPole-v1", 2).unwrap();
            h.reset().unwrap();
        }

        assert!(matches!(
            handle.step(&batch(&[1, 7]), false),
            Err(HandleError::Simulation(_))
        ));
        assert_eq!(
            handle.step(&batch(&[1, 1]), false).unwrap(),
            fresh.step(&batch(&[1, 1]), false).unwrap()
        );
    }

    #[test]
    fn test_step_before_reset_is_simulation_error() {
        let mut handle = grid_handle();
        handle.make("FrozenLake-v0", 1).unwrap();

        let err = handle.step(&ActionPayload::Discrete(0), false).unwrap_err();
        assert!(matches!(err, HandleError::Simulation(_)));
    }

    #[test]
    fn test_dynamics_probabilities() {
        let mut handle = grid_handle();
        handle.make("FrozenLake-v0", 1).unwrap();

        let result = handle.dynamics(0, 1).unwrap();
        assert_eq!(result.len(), 3);
        assert_eq!(result.next_state.len(), 3);
        assert_eq!(result.reward.len(), 3);
        assert_eq!(result.done.len(), 3);
        assert_relative_eq!(result.prob.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_dynamics_requires_capability_and_model() {
        let mut without = EnvironmentHandle::new(Capabilities::new(false, true), 0);
        without.make("FrozenLake-v0", 1).unwrap();
        assert!(matches!(
            without.dynamics(0, 0),
            Err(HandleError::UnsupportedOperation(_))
        ));

        let mut modelless = grid_handle();
        modelless.make("CartPole-v0", 1).unwrap();
        assert!(matches!(
            modelless.dynamics(0, 0),
            Err(HandleError::UnsupportedOperation(_))
        ));
    }

    #[test]
    fn test_dynamics_out_of_range() {
        let mut handle = grid_handle();
        handle.make("FrozenLake-v0", 1).unwrap();
        assert!(matches!(handle.dynamics(99, 0), Err(HandleError::Simulation(_))));
    }

    #[test]
    fn test_render_does_not_change_results() {
        let run = |render: bool| {
            let sink = RecordingSink::new();
            let mut handle = EnvironmentHandle::new(Capabilities::default(), 9)
                .with_frame_sink(Box::new(sink.clone()));
            handle.make("FrozenLake-v0", 1).unwrap();
            handle.reset().unwrap();

            let results: Vec<StepResult> = [1, 2, 2, 1]
                .iter()
                .map(|&a| handle.step(&ActionPayload::Discrete(a), render))
                .take_while(|r| r.is_ok())
                .map(|r| r.unwrap())
                .collect();
            (results, sink.len())
        };

        let (plain, plain_frames) = run(false);
        let (rendered, rendered_frames) = run(true);
        assert_eq!(plain, rendered);
        assert_eq!(plain_frames, 0);
        assert_eq!(rendered_frames, rendered.len());
    }
}
