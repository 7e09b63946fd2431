//! Cart-pole balancing task.
//!
//! A pole is attached by an unactuated joint to a cart moving along a
//! frictionless track. The agent pushes the cart left (0) or right (1)
//! with a fixed force; reward is 1 for every step the pole stays upright.
//! The episode ends when the pole tilts past 12 degrees or the cart
//! leaves the track.

use crate::error::SimulationError;
use crate::simulation::{discrete_action, RenderFrame, Simulation, StepOutcome};
use crate::spaces::Space;
use gymlink_env::{ActionPayload, Observation};
use nalgebra::Vector4;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::warn;

const GRAVITY: f64 = 9.8;
const MASS_CART: f64 = 1.0;
const MASS_POLE: f64 = 0.1;
const TOTAL_MASS: f64 = MASS_CART + MASS_POLE;
/// Half the pole's length
const LENGTH: f64 = 0.5;
const POLE_MASS_LENGTH: f64 = MASS_POLE * LENGTH;
const FORCE_MAG: f64 = 10.0;
/// Seconds between state updates
const TAU: f64 = 0.02;

/// Angle at which the episode fails (12 degrees)
pub const THETA_THRESHOLD_RADIANS: f64 = 12.0 * 2.0 * std::f64::consts::PI / 360.0;
/// Cart position at which the episode fails
pub const X_THRESHOLD: f64 = 2.4;

/// A cart-pole instance.
pub struct CartPole {
    id: String,
    action_space: Space,
    observation_space: Space,

    /// [x, x_dot, theta, theta_dot]
    state: Option<Vector4<f64>>,

    /// Steps taken since the episode ended (`None` while running)
    steps_beyond_done: Option<u32>,

    rng: ChaCha8Rng,
}

impl CartPole {
    pub fn new(id: &str, seed: u64) -> Self {
        let high = vec![
            X_THRESHOLD * 2.0,
            f32::MAX as f64,
            THETA_THRESHOLD_RADIANS * 2.0,
            f32::MAX as f64,
        ];
        let low = high.iter().map(|h| -h).collect();

        Self {
            id: id.to_string(),
            action_space: Space::discrete(2),
            observation_space: Space::bounded(low, high, vec![4]),
            state: None,
            steps_beyond_done: None,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Current physical state, if the episode has been reset.
    pub fn physical_state(&self) -> Option<Vector4<f64>> {
        self.state
    }

    fn observation(state: &Vector4<f64>) -> Observation {
        Observation::Continuous(state.iter().copied().collect())
    }

    /// Euler integration of the cart-pole equations of motion.
    fn integrate(state: &Vector4<f64>, push_right: bool) -> Vector4<f64> {
        let (x, x_dot, theta, theta_dot) = (state[0], state[1], state[2], state[3]);
        let force = if push_right { FORCE_MAG } else { -FORCE_MAG };
        let costheta = theta.cos();
        let sintheta = theta.sin();

        let temp = (force + POLE_MASS_LENGTH * theta_dot * theta_dot * sintheta) / TOTAL_MASS;
        let thetaacc = (GRAVITY * sintheta - costheta * temp)
            / (LENGTH * (4.0 / 3.0 - MASS_POLE * costheta * costheta / TOTAL_MASS));
        let xacc = temp - POLE_MASS_LENGTH * thetaacc * costheta / TOTAL_MASS;

        Vector4::new(
            x + TAU * x_dot,
            x_dot + TAU * xacc,
            theta + TAU * theta_dot,
            theta_dot + TAU * thetaacc,
        )
    }

    fn is_terminal(state: &Vector4<f64>) -> bool {
        state[0] < -X_THRESHOLD
            || state[0] > X_THRESHOLD
            || state[2] < -THETA_THRESHOLD_RADIANS
            || state[2] > THETA_THRESHOLD_RADIANS
    }
}

impl Simulation for CartPole {
    fn id(&self) -> &str {
        &self.id
    }

    fn action_space(&self) -> &Space {
        &self.action_space
    }

    fn observation_space(&self) -> &Space {
        &self.observation_space
    }

    fn reset(&mut self) -> Result<Observation, SimulationError> {
        let rng = &mut self.rng;
        let state: Vector4<f64> = Vector4::from_fn(|_, _| rng.gen_range(-0.05..0.05));
        self.state = Some(state);
        self.steps_beyond_done = None;
        Ok(Self::observation(&state))
    }

    fn step(&mut self, action: &ActionPayload) -> Result<StepOutcome, SimulationError> {
        let a = discrete_action(&self.action_space, action)?;
        let current = self.state.ok_or(SimulationError::ResetRequired)?;

        let next = Self::integrate(&current, a == 1);
        self.state = Some(next);
        let done = Self::is_terminal(&next);

        let reward = match (done, self.steps_beyond_done) {
            (false, _) => 1.0,
            (true, None) => {
                // Pole just fell
                self.steps_beyond_done = Some(0);
                1.0
            }
            (true, Some(steps)) => {
                if steps == 0 {
                    warn!(
                        "{}: step() called after the episode ended; call reset() first",
                        self.id
                    );
                }
                self.steps_beyond_done = Some(steps + 1);
                0.0
            }
        };

        Ok(StepOutcome::new(Self::observation(&next), reward, done))
    }

    fn render(&self) -> Option<RenderFrame> {
        let state = self.state?;
        const WIDTH: usize = 41;

        let world_width = X_THRESHOLD * 2.0;
        let fraction = ((state[0] + X_THRESHOLD) / world_width).clamp(0.0, 1.0);
        let cart = (fraction * (WIDTH - 1) as f64).round() as usize;

        let tilt = state[2] / THETA_THRESHOLD_RADIANS;
        let pole = if tilt < -0.33 {
            '\\'
        } else if tilt > 0.33 {
            '/'
        } else {
            '|'
        };

        let mut pole_row = vec![' '; WIDTH];
        pole_row[cart] = pole;
        let mut cart_row = vec!['-'; WIDTH];
        cart_row[cart] = '#';

        let text = format!(
            "{}\n{}\nx={:+.3} theta={:+.3}\n",
            pole_row.into_iter().collect::<String>(),
            cart_row.into_iter().collect::<String>(),
            state[0],
            state[2]
        );
        Some(RenderFrame::Text(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_reset_within_bounds() {
        let mut env = CartPole::new("CartPole-v1", 1);
        let obs = env.reset().unwrap();

        match &obs {
            Observation::Continuous(values) => {
                assert_eq!(values.len(), 4);
                assert!(values.iter().all(|v| v.abs() <= 0.05));
            }
            other => panic!("unexpected observation {:?}", other),
        }
        assert!(env.observation_space().contains(&obs));
    }

    #[test]
    fn test_step_before_reset() {
        let mut env = CartPole::new("CartPole-v1", 1);
        assert!(matches!(
            env.step(&ActionPayload::Discrete(0)),
            Err(SimulationError::ResetRequired)
        ));
    }

    #[test]
    fn test_push_direction() {
        let start = Vector4::zeros();
        let right = CartPole::integrate(&start, true);
        let left = CartPole::integrate(&start, false);

        // Velocity responds immediately, position one tick later.
        assert!(right[1] > 0.0);
        assert!(left[1] < 0.0);
        assert_relative_eq!(right[0], 0.0);
        // The pole falls opposite to the push.
        assert!(right[3] < 0.0);
    }

    #[test]
    fn test_episode_terminates() {
        let mut env = CartPole::new("CartPole-v1", 5);
        env.reset().unwrap();

        let mut steps = 0;
        loop {
            let outcome = env.step(&ActionPayload::Discrete(1)).unwrap();
            steps += 1;
            assert_eq!(outcome.reward, 1.0);
            if outcome.done {
                break;
            }
            assert!(steps < 500, "always pushing right must topple the pole");
        }

        // Stepping past the end yields zero reward.
        let after = env.step(&ActionPayload::Discrete(1)).unwrap();
        assert!(after.done);
        assert_eq!(after.reward, 0.0);
    }

    #[test]
    fn test_render_frame() {
        let mut env = CartPole::new("CartPole-v0", 2);
        assert!(env.render().is_none());

        env.reset().unwrap();
        match env.render() {
            Some(RenderFrame::Text(text)) => assert!(text.contains('#')),
            other => panic!("unexpected frame {:?}", other),
        }
    }
}
