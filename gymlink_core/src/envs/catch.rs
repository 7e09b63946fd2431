//! Catch: a small Atari-style pixel game.
//!
//! A ball falls one row per tick from a random column at the top of a
//! 10x10 screen; the agent moves a three-pixel paddle along the bottom
//! row. Observations are single-channel frames laid out channel-first
//! (`[1, height, width]`), values in `[0, 1]`.

use crate::error::SimulationError;
use crate::simulation::{discrete_action, RenderFrame, Simulation, StepOutcome};
use crate::spaces::Space;
use gymlink_env::{ActionPayload, Observation};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

pub const WIDTH: usize = 10;
pub const HEIGHT: usize = 10;

/// A Catch instance.
pub struct Catch {
    id: String,
    action_space: Space,
    observation_space: Space,

    /// (row, col) of the ball
    ball: (usize, usize),

    /// Column of the paddle's centre
    paddle: usize,

    /// True between reset and the ball landing
    running: bool,

    rng: ChaCha8Rng,
}

impl Catch {
    pub fn new(id: &str, seed: u64) -> Self {
        Self {
            id: id.to_string(),
            // left, stay, right
            action_space: Space::discrete(3),
            observation_space: Space::uniform(0.0, 1.0, vec![1, HEIGHT, WIDTH]),
            ball: (0, 0),
            paddle: WIDTH / 2,
            running: false,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    fn frame(&self) -> Vec<f64> {
        let mut pixels = vec![0.0; HEIGHT * WIDTH];
        pixels[self.ball.0 * WIDTH + self.ball.1] = 1.0;
        for col in self.paddle - 1..=self.paddle + 1 {
            pixels[(HEIGHT - 1) * WIDTH + col] = 1.0;
        }
        pixels
    }
}

impl Simulation for Catch {
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
        self.ball = (0, self.rng.gen_range(0..WIDTH));
        self.paddle = WIDTH / 2;
        self.running = true;
        Ok(Observation::Continuous(self.frame()))
    }

    fn step(&mut self, action: &ActionPayload) -> Result<StepOutcome, SimulationError> {
        let a = discrete_action(&self.action_space, action)?;
        if !self.running {
            return Err(SimulationError::ResetRequired);
        }

        self.paddle = match a {
            0 => self.paddle.saturating_sub(1).max(1),
            2 => (self.paddle + 1).min(WIDTH - 2),
            _ => self.paddle,
        };
        self.ball.0 += 1;

        let landed = self.ball.0 == HEIGHT - 1;
        let reward = if !landed {
            0.0
        } else if self.ball.1.abs_diff(self.paddle) <= 1 {
            1.0
        } else {
            -1.0
        };
        if landed {
            self.running = false;
        }

        Ok(StepOutcome::new(Observation::Continuous(self.frame()), reward, landed)
            .with_info("ale.lives", if landed { 0 } else { 1 }))
    }

    fn render(&self) -> Option<RenderFrame> {
        let data = self
            .frame()
            .into_iter()
            .map(|v| (v * 255.0) as u8)
            .collect();
        Some(RenderFrame::Pixels {
            width: WIDTH,
            height: HEIGHT,
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_episode(env: &mut Catch, action: i64) -> (usize, f64) {
        env.reset().unwrap();
        let mut steps = 0;
        loop {
            let outcome = env.step(&ActionPayload::Discrete(action)).unwrap();
            steps += 1;
            if outcome.done {
                return (steps, outcome.reward);
            }
        }
    }

    #[test]
    fn test_frame_shape() {
        let mut env = Catch::new("Catch-v0", 0);
        let obs = env.reset().unwrap();

        assert_eq!(obs.scalar_len(), HEIGHT * WIDTH);
        assert!(env.observation_space().contains(&obs));
    }

    #[test]
    fn test_episode_length() {
        let mut env = Catch::new("Catch-v0", 3);
        let (steps, reward) = run_episode(&mut env, 1);

        assert_eq!(steps, HEIGHT - 1);
        assert!(reward == 1.0 || reward == -1.0);
    }

    #[test]
    fn test_tracking_policy_always_catches() {
        let mut env = Catch::new("Catch-v0", 11);
        for _ in 0..20 {
            env.reset().unwrap();
            loop {
                let action = match env.ball.1.cmp(&env.paddle) {
                    std::cmp::Ordering::Less => 0,
                    std::cmp::Ordering::Equal => 1,
                    std::cmp::Ordering::Greater => 2,
                };
                let outcome = env.step(&ActionPayload::Discrete(action)).unwrap();
                if outcome.done {
                    assert_eq!(outcome.reward, 1.0);
                    break;
                }
            }
        }
    }

    #[test]
    fn test_step_after_landing_requires_reset() {
        let mut env = Catch::new("Catch-v0", 0);
        run_episode(&mut env, 1);

        assert!(matches!(
            env.step(&ActionPayload::Discrete(1)),
            Err(SimulationError::ResetRequired)
        ));
    }

    #[test]
    fn test_render_pixels() {
        let mut env = Catch::new("Catch-v0", 0);
        env.reset().unwrap();

        match env.render() {
            Some(RenderFrame::Pixels { width, height, data }) => {
                assert_eq!((width, height), (WIDTH, HEIGHT));
                assert_eq!(data.iter().filter(|&&p| p == 255).count(), 4);
            }
            other => panic!("unexpected frame {:?}", other),
        }
    }
}
