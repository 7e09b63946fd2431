//! Wire messages exchanged between the driver and the environment server.
//!
//! Every message is a JSON document. Requests are `{method, param}` maps;
//! responses are flat objects whose layout depends on the method. Each
//! response carries `has_error` / `error_msg` so the driver can tell
//! success from failure without exceptions crossing the boundary.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Methods a driver may invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Info,
    Make,
    Reset,
    Step,
    Dynamics,
}

impl Method {
    /// Returns all methods in dispatch-table order.
    pub fn all() -> [Method; 5] {
        [
            Method::Info,
            Method::Make,
            Method::Reset,
            Method::Step,
            Method::Dynamics,
        ]
    }

    /// Returns the wire name of the method.
    pub fn name(&self) -> &'static str {
        match self {
            Method::Info => "info",
            Method::Make => "make",
            Method::Reset => "reset",
            Method::Step => "step",
            Method::Dynamics => "dynamics",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(Method::Info),
            "make" => Ok(Method::Make),
            "reset" => Ok(Method::Reset),
            "step" => Ok(Method::Step),
            "dynamics" => Ok(Method::Dynamics),
            _ => Err(format!("Unknown method: {}", s)),
        }
    }
}

/// A request as it arrives on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Method name, decoded lazily so unknown names can still be answered
    pub method: String,

    /// Method-specific parameters (`null` or missing means "none")
    #[serde(default)]
    pub param: Value,
}

impl Request {
    /// Decodes the method name.
    pub fn method(&self) -> Result<Method, String> {
        self.method.parse()
    }

    /// Decodes the parameters into a typed struct.
    ///
    /// A `null` parameter block is treated as an empty map so that
    /// structs made of optional fields decode successfully.
    pub fn params<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        match &self.param {
            Value::Null => serde_json::from_value(Value::Object(Default::default())),
            other => serde_json::from_value(other.clone()),
        }
    }
}

/// Parameters of a `make` request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MakeParams {
    /// Overrides the configured environment name
    #[serde(default)]
    pub env_name: Option<String>,

    /// Overrides the configured number of copies
    #[serde(default)]
    pub num_envs: Option<i64>,
}

/// Parameters of a `step` request.
///
/// Single-instance drivers send `action`, batched drivers `actions`;
/// either key is accepted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepParams {
    #[serde(default)]
    pub action: Option<ActionPayload>,

    #[serde(default)]
    pub actions: Option<ActionPayload>,

    /// Render the environment after stepping
    #[serde(default)]
    pub render: bool,
}

impl StepParams {
    /// Returns the supplied action payload, preferring `actions`.
    pub fn payload(&self) -> Option<&ActionPayload> {
        self.actions.as_ref().or(self.action.as_ref())
    }
}

/// Parameters of a `dynamics` request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DynamicsParams {
    pub state: u64,
    pub action: u64,
}

/// An action as sent by the driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionPayload {
    /// Integer action (discrete spaces)
    Discrete(i64),

    /// Real-valued scalar action
    Continuous(f64),

    /// One entry per instance, or a continuous action vector
    Batch(Vec<ActionPayload>),
}

impl ActionPayload {
    /// Flattens nested batches into a list of leaves.
    pub fn leaves(&self) -> Vec<ActionPayload> {
        match self {
            ActionPayload::Batch(items) => items.iter().flat_map(|a| a.leaves()).collect(),
            leaf => vec![leaf.clone()],
        }
    }

    /// Returns the integer value of a discrete leaf.
    ///
    /// Real values with no fractional part are accepted as well, since
    /// numeric drivers often send every number as a double.
    pub fn as_discrete(&self) -> Option<i64> {
        match self {
            ActionPayload::Discrete(v) => Some(*v),
            ActionPayload::Continuous(v) if v.fract() == 0.0 => Some(*v as i64),
            ActionPayload::Batch(items) if items.len() == 1 => items[0].as_discrete(),
            _ => None,
        }
    }
}

/// An observation as returned to the driver.
///
/// Discrete observations are plain integers. Box observations (vectors,
/// pixel frames) are flattened in row-major order; their shape is
/// reported by `info`. Vectorized handles return one entry per instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Observation {
    Discrete(u64),
    Continuous(Vec<f64>),
    Batch(Vec<Observation>),
}

impl Observation {
    /// Placeholder observation sent alongside errors.
    pub fn empty() -> Self {
        Observation::Continuous(Vec::new())
    }

    /// Number of scalar values carried by this observation.
    pub fn scalar_len(&self) -> usize {
        match self {
            Observation::Discrete(_) => 1,
            Observation::Continuous(values) => values.len(),
            Observation::Batch(items) => items.iter().map(Observation::scalar_len).sum(),
        }
    }
}

/// Reward for a single instance or for a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reward {
    Single(f64),
    Batch(Vec<f64>),
}

/// Episode-termination flag(s).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Done {
    Single(bool),
    Batch(Vec<bool>),
}

/// Space cardinality (discrete) or shape (box).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SpaceSize {
    Count(u64),
    Shape(Vec<usize>),
}

/// Reply to `info`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfoMessage {
    pub action_space_type: String,
    pub action_space_size: SpaceSize,
    pub observation_space_type: String,
    pub observation_space_size: SpaceSize,
    pub has_error: bool,
    pub error_msg: String,
}

impl InfoMessage {
    pub fn new(
        action_space_type: impl Into<String>,
        action_space_size: SpaceSize,
        observation_space_type: impl Into<String>,
        observation_space_size: SpaceSize,
    ) -> Self {
        Self {
            action_space_type: action_space_type.into(),
            action_space_size,
            observation_space_type: observation_space_type.into(),
            observation_space_size,
            has_error: false,
            error_msg: String::new(),
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            action_space_type: String::new(),
            action_space_size: SpaceSize::Count(0),
            observation_space_type: String::new(),
            observation_space_size: SpaceSize::Count(0),
            has_error: true,
            error_msg: msg.into(),
        }
    }
}

/// Reply to `make`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MakeMessage {
    /// `"OK"` or `"Error <message>"`
    pub result: String,
    pub has_error: bool,
    pub error_msg: String,
}

impl MakeMessage {
    pub fn ok() -> Self {
        Self {
            result: "OK".to_string(),
            has_error: false,
            error_msg: String::new(),
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        Self {
            result: format!("Error {}", msg),
            has_error: true,
            error_msg: msg,
        }
    }
}

/// Reply to `reset`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResetMessage {
    pub observation: Observation,
    pub result: String,
    pub has_error: bool,
    pub error_msg: String,
}

impl ResetMessage {
    pub fn ok(observation: Observation) -> Self {
        Self {
            observation,
            result: "OK".to_string(),
            has_error: false,
            error_msg: String::new(),
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        Self {
            observation: Observation::empty(),
            result: format!("Error {}", msg),
            has_error: true,
            error_msg: msg,
        }
    }
}

/// Reply to `step`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepMessage {
    pub observation: Observation,
    pub reward: Reward,
    pub done: Done,

    /// Raw `info["reward"]` of the step, echoed unmodified
    pub info_reward: Value,

    pub has_error: bool,
    pub error_msg: String,
}

impl StepMessage {
    pub fn new(observation: Observation, reward: Reward, done: Done, info_reward: Value) -> Self {
        Self {
            observation,
            reward,
            done,
            info_reward,
            has_error: false,
            error_msg: String::new(),
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            observation: Observation::empty(),
            reward: Reward::Single(0.0),
            done: Done::Single(false),
            info_reward: Value::Null,
            has_error: true,
            error_msg: msg.into(),
        }
    }
}

/// Reply to `dynamics`: parallel sequences, one entry per outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicsMessage {
    pub prob: Vec<f64>,
    pub next_state: Vec<u64>,
    pub reward: Vec<f64>,
    pub done: Vec<bool>,
    pub has_error: bool,
    pub error_msg: String,
}

impl DynamicsMessage {
    pub fn new(prob: Vec<f64>, next_state: Vec<u64>, reward: Vec<f64>, done: Vec<bool>) -> Self {
        Self {
            prob,
            next_state,
            reward,
            done,
            has_error: false,
            error_msg: String::new(),
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            prob: Vec::new(),
            next_state: Vec::new(),
            reward: Vec::new(),
            done: Vec::new(),
            has_error: true,
            error_msg: msg.into(),
        }
    }
}

/// Reply to a request that could not be routed to any method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorMessage {
    /// Method name as received (empty if the request was undecodable)
    pub method: String,
    pub has_error: bool,
    pub error_msg: String,
}

impl ErrorMessage {
    pub fn new(method: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            has_error: true,
            error_msg: msg.into(),
        }
    }
}

/// Any reply the server can send.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    Info(InfoMessage),
    Make(MakeMessage),
    Reset(ResetMessage),
    Step(StepMessage),
    Dynamics(DynamicsMessage),
    Error(ErrorMessage),
}

impl Response {
    /// Returns true if the envelope reports a failure.
    pub fn has_error(&self) -> bool {
        match self {
            Response::Info(m) => m.has_error,
            Response::Make(m) => m.has_error,
            Response::Reset(m) => m.has_error,
            Response::Step(m) => m.has_error,
            Response::Dynamics(m) => m.has_error,
            Response::Error(m) => m.has_error,
        }
    }

    /// Returns the error text, empty on success.
    pub fn error_msg(&self) -> &str {
        match self {
            Response::Info(m) => &m.error_msg,
            Response::Make(m) => &m.error_msg,
            Response::Reset(m) => &m.error_msg,
            Response::Step(m) => &m.error_msg,
            Response::Dynamics(m) => &m.error_msg,
            Response::Error(m) => &m.error_msg,
        }
    }

    /// Short name of the envelope kind (for logging).
    pub fn kind(&self) -> &'static str {
        match self {
            Response::Info(_) => "info",
            Response::Make(_) => "make",
            Response::Reset(_) => "reset",
            Response::Step(_) => "step",
            Response::Dynamics(_) => "dynamics",
            Response::Error(_) => "error",
        }
    }
}
