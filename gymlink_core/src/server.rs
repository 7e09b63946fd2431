//! The request/response loop.
//!
//! One generic loop serves every variant; variants differ only in the
//! `Capabilities` their handle is built with.
//!
//! # Request Flow
//!
//! ```text
//! Transport            GymServer                 EnvironmentHandle
//!     |                    |                            |
//!     |-- bytes ---------->| decode {method, param}     |
//!     |                    |-- make/reset/step/... ---->|
//!     |                    |<-- Ok(result) / Err(e) ----|
//!     |<-- envelope -------| (errors become envelopes)  |
//! ```
//!
//! Request content never ends the loop. Only a triggered
//! [`ShutdownSignal`] or a fatal transport error does.

use crate::config::ServerConfig;
use crate::error::{RequestError, ServerError};
use crate::factory::ServerKind;
use crate::handle::EnvironmentHandle;
use crate::render::FrameSink;
use gymlink_env::{
    DynamicsMessage, DynamicsParams, ErrorMessage, InfoMessage, MakeMessage, MakeParams, Method,
    Request, ResetMessage, Response, StepMessage, StepParams, Transport,
};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Lifecycle of a server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ServerState {
    #[default]
    Uninitialized,

    /// Built, not yet serving
    Idle,

    /// Waiting for the next request
    AwaitingRequest,

    /// Handling a request
    Dispatching,

    /// Loop ended; handle closed
    ShuttingDown,
}

/// Cross-thread interrupt flag, checked between requests.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal(Arc<AtomicBool>);

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// An environment server: configuration, handle and loop state.
pub struct GymServer {
    kind: ServerKind,
    config: ServerConfig,
    handle: EnvironmentHandle,
    state: ServerState,

    /// Replies sent since `serve` started
    requests_served: u64,
}

impl GymServer {
    pub fn new(kind: ServerKind, config: ServerConfig) -> Self {
        let handle = EnvironmentHandle::new(kind.capabilities(), config.env.seed)
            .with_max_copies(config.env.max_copies);
        info!("Created gym server {}", config.env.name);
        Self {
            kind,
            config,
            handle,
            state: ServerState::Idle,
            requests_served: 0,
        }
    }

    /// Routes rendered frames to `sink` instead of the console.
    pub fn with_frame_sink(mut self, sink: Box<dyn FrameSink>) -> Self {
        self.handle = self.handle.with_frame_sink(sink);
        self
    }

    pub fn kind(&self) -> ServerKind {
        self.kind
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn handle(&self) -> &EnvironmentHandle {
        &self.handle
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    pub fn requests_served(&self) -> u64 {
        self.requests_served
    }

    /// Sends the handshake, then answers requests until `shutdown` is
    /// triggered or the transport fails.
    pub fn serve<T: Transport>(
        &mut self,
        transport: &mut T,
        shutdown: &ShutdownSignal,
    ) -> Result<(), ServerError> {
        if let Err(e) = transport.send_handshake() {
            error!("Handshake to {} failed: {}", transport.endpoint(), e);
            self.shut_down();
            return Err(e.into());
        }
        info!(
            "{} server for {} listening on {}",
            self.kind,
            self.config.env.name,
            transport.endpoint()
        );

        self.state = ServerState::AwaitingRequest;
        while !shutdown.is_triggered() {
            let bytes = match transport.receive() {
                Ok(Some(bytes)) => bytes,
                Ok(None) => continue,
                Err(e) => {
                    error!("Receive failed: {}", e);
                    self.shut_down();
                    return Err(e.into());
                }
            };

            self.state = ServerState::Dispatching;
            let response = self.handle_message(&bytes);
            match transport.send_json(&response) {
                Ok(()) => self.requests_served += 1,
                Err(e) if !e.is_fatal() => warn!("Dropped {} reply: {}", response.kind(), e),
                Err(e) => {
                    error!("Send failed: {}", e);
                    self.shut_down();
                    return Err(e.into());
                }
            }
            self.state = ServerState::AwaitingRequest;
        }

        info!("Interrupt received");
        self.shut_down();
        Ok(())
    }

    /// Decodes one raw request and produces its reply.
    pub fn handle_message(&mut self, bytes: &[u8]) -> Response {
        let raw: Value = match serde_json::from_slice(bytes) {
            Ok(raw) => raw,
            Err(e) => return reject("", RequestError::Malformed(e.to_string())),
        };
        let method = raw
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        match serde_json::from_value::<Request>(raw) {
            Ok(request) => self.dispatch(&request),
            Err(e) => reject(&method, RequestError::Malformed(e.to_string())),
        }
    }

    /// Routes a decoded request to its handler.
    pub fn dispatch(&mut self, request: &Request) -> Response {
        let method = match request.method() {
            Ok(method) => method,
            Err(_) => {
                return reject(
                    &request.method,
                    RequestError::UnknownMethod(request.method.clone()),
                )
            }
        };
        debug!("Dispatching {}", method);

        match method {
            Method::Info => Response::Info(self.on_info()),
            Method::Make => Response::Make(self.on_make(request)),
            Method::Reset => Response::Reset(self.on_reset()),
            Method::Step => Response::Step(self.on_step(request)),
            Method::Dynamics => Response::Dynamics(self.on_dynamics(request)),
        }
    }

    fn on_info(&self) -> InfoMessage {
        match self.handle.info() {
            Ok(info) => InfoMessage::new(
                info.action_space.type_name(),
                info.action_space.size(),
                info.observation_space.type_name(),
                info.observation_space.size(),
            ),
            Err(e) => InfoMessage::error(report(Method::Info, e)),
        }
    }

    fn on_make(&mut self, request: &Request) -> MakeMessage {
        let params: MakeParams = match request.params() {
            Ok(params) => params,
            Err(e) => return MakeMessage::error(invalid_params(Method::Make, e)),
        };

        let (name, copies) = if self.handle.capabilities().make_overrides {
            (
                params.env_name.unwrap_or_else(|| self.config.env.name.clone()),
                params.num_envs.unwrap_or(self.config.env.copies),
            )
        } else {
            (self.config.env.name.clone(), self.config.env.copies)
        };

        match self.handle.make(&name, copies) {
            Ok(()) => MakeMessage::ok(),
            Err(e) => MakeMessage::error(report(Method::Make, e)),
        }
    }

    fn on_reset(&mut self) -> ResetMessage {
        match self.handle.reset() {
            Ok(observation) => ResetMessage::ok(observation),
            Err(e) => ResetMessage::error(report(Method::Reset, e)),
        }
    }

    fn on_step(&mut self, request: &Request) -> StepMessage {
        let params: StepParams = match request.params() {
            Ok(params) => params,
            Err(e) => return StepMessage::error(invalid_params(Method::Step, e)),
        };
        let Some(action) = params.payload() else {
            return StepMessage::error(invalid_params(Method::Step, "missing action"));
        };

        match self.handle.step(action, params.render) {
            Ok(result) => {
                let info_reward = result.info_reward();
                StepMessage::new(result.observation, result.reward, result.done, info_reward)
            }
            Err(e) => StepMessage::error(report(Method::Step, e)),
        }
    }

    fn on_dynamics(&self, request: &Request) -> DynamicsMessage {
        let params: DynamicsParams = match request.params() {
            Ok(params) => params,
            Err(e) => return DynamicsMessage::error(invalid_params(Method::Dynamics, e)),
        };

        match self.handle.dynamics(params.state, params.action) {
            Ok(d) => DynamicsMessage::new(d.prob, d.next_state, d.reward, d.done),
            Err(e) => DynamicsMessage::error(report(Method::Dynamics, e)),
        }
    }

    fn shut_down(&mut self) {
        self.state = ServerState::ShuttingDown;
        self.handle.close();
        info!("Server stopped after {} requests", self.requests_served);
    }
}

/// Logs a recoverable per-request failure and returns its message.
fn report(method: Method, err: impl std::fmt::Display) -> String {
    warn!("{} failed: {}", method, err);
    err.to_string()
}

fn invalid_params(method: Method, err: impl std::fmt::Display) -> String {
    report(
        method,
        RequestError::InvalidParams {
            method,
            message: err.to_string(),
        },
    )
}

fn reject(method: &str, err: RequestError) -> Response {
    warn!("Rejected request: {}", err);
    Response::Error(ErrorMessage::new(method, err.to_string()))
}
