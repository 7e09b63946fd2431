//! gymlink Core - Reinforcement-Learning Environments over RPC
//!
//! This library serves stateful simulations to a remote driver process:
//! 1. **Simulations**: a `Simulation` trait plus a registry of built-in
//!    grid-world, control and pixel environments
//! 2. **Environment Handle**: lifecycle of one (possibly vectorized) instance
//! 3. **Server Loop**: receive, dispatch, reply; every request error becomes
//!    an error envelope, only interrupts and transport failures end the loop

pub mod config;
pub mod envs;
pub mod error;
pub mod factory;
pub mod handle;
pub mod render;
pub mod server;
pub mod simulation;
pub mod spaces;
pub mod vec_env;
pub mod zmq_transport;

// Re-export key types for convenience
pub use config::{EnvConfig, ServerConfig};
pub use error::{ConfigError, HandleError, RequestError, ServerError, SimulationError};
pub use factory::{ServerFactory, ServerKind};
pub use handle::{Capabilities, DynamicsResult, EnvInfo, EnvironmentHandle, StepResult};
pub use render::{ConsoleSink, FrameSink, RecordingSink};
pub use server::{GymServer, ServerState, ShutdownSignal};
pub use simulation::{RenderFrame, Simulation, StepOutcome, Transition, TransitionTable};
pub use spaces::Space;
pub use vec_env::VecSimulation;
pub use zmq_transport::{tcp_endpoint, ZmqTransport, DEFAULT_PORT};
