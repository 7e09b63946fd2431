//! FrozenLake grid world with an explicit transition model.
//!
//! The agent walks from `S` to `G` across frozen tiles `F` while avoiding
//! holes `H`. On slippery ice the intended move succeeds with probability
//! 1/3; otherwise the agent slides perpendicular to it. Reaching `G`
//! yields reward 1, every other transition 0. Holes and the goal are
//! absorbing.

use crate::error::SimulationError;
use crate::simulation::{
    discrete_action, RenderFrame, Simulation, StepOutcome, Transition, TransitionTable,
};
use crate::spaces::Space;
use gymlink_env::{ActionPayload, Observation};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// 4x4 map used by `FrozenLake-v0`.
pub const MAP_4X4: [&str; 4] = ["SFFF", "FHFH", "FFFH", "HFFG"];

/// 8x8 map used by `FrozenLake8x8-v0`.
pub const MAP_8X8: [&str; 8] = [
    "SFFFFFFF",
    "FFFFFFFF",
    "FFFHFFFF",
    "FFFFFHFF",
    "FFFHFFFF",
    "FHHFFFHF",
    "FHFFHFHF",
    "FFFHFFFG",
];

/// Number of moves available in every cell.
pub const N_ACTIONS: usize = 4;

/// Moves in action-index order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Move {
    Left = 0,
    Down = 1,
    Right = 2,
    Up = 3,
}

impl Move {
    fn from_index(index: usize) -> Self {
        match index % N_ACTIONS {
            0 => Move::Left,
            1 => Move::Down,
            2 => Move::Right,
            _ => Move::Up,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Move::Left => "Left",
            Move::Down => "Down",
            Move::Right => "Right",
            Move::Up => "Up",
        }
    }
}

/// A FrozenLake instance.
pub struct FrozenLake {
    id: String,
    desc: Vec<Vec<u8>>,
    nrow: usize,
    ncol: usize,

    /// Initial state distribution (uniform over `S` tiles)
    isd: Vec<f64>,
    model: TransitionTable,

    action_space: Space,
    observation_space: Space,

    state: u64,
    last_action: Option<Move>,
    rng: ChaCha8Rng,
}

impl FrozenLake {
    /// Creates a lake from map rows.
    pub fn new(id: &str, map: &[&str], slippery: bool, seed: u64) -> Self {
        let desc: Vec<Vec<u8>> = map.iter().map(|row| row.as_bytes().to_vec()).collect();
        let nrow = desc.len();
        let ncol = desc.first().map(|row| row.len()).unwrap_or(0);
        let n_states = nrow * ncol;

        let starts = desc.iter().flatten().filter(|&&c| c == b'S').count().max(1);
        let isd = desc
            .iter()
            .flatten()
            .map(|&c| if c == b'S' { 1.0 / starts as f64 } else { 0.0 })
            .collect();

        let model = Self::build_model(&desc, nrow, ncol, slippery);

        let mut lake = Self {
            id: id.to_string(),
            desc,
            nrow,
            ncol,
            isd,
            model,
            action_space: Space::discrete(N_ACTIONS as u64),
            observation_space: Space::discrete(n_states as u64),
            state: 0,
            last_action: None,
            rng: ChaCha8Rng::seed_from_u64(seed),
        };
        lake.state = lake.sample_initial_state();
        lake
    }

    /// Standard slippery 4x4 lake.
    pub fn four_by_four(seed: u64) -> Self {
        Self::new("FrozenLake-v0", &MAP_4X4, true, seed)
    }

    /// Standard slippery 8x8 lake.
    pub fn eight_by_eight(seed: u64) -> Self {
        Self::new("FrozenLake8x8-v0", &MAP_8X8, true, seed)
    }

    /// Current agent position.
    pub fn state(&self) -> u64 {
        self.state
    }

    fn build_model(desc: &[Vec<u8>], nrow: usize, ncol: usize, slippery: bool) -> TransitionTable {
        let to_s = |row: usize, col: usize| (row * ncol + col) as u64;
        let inc = |row: usize, col: usize, mv: Move| -> (usize, usize) {
            match mv {
                Move::Left => (row, col.saturating_sub(1)),
                Move::Down => ((row + 1).min(nrow - 1), col),
                Move::Right => (row, (col + 1).min(ncol - 1)),
                Move::Up => (row.saturating_sub(1), col),
            }
        };

        let mut outcomes = Vec::with_capacity(nrow * ncol);
        for row in 0..nrow {
            for col in 0..ncol {
                let s = to_s(row, col);
                let letter = desc[row][col];
                let mut per_action = Vec::with_capacity(N_ACTIONS);

                for a in 0..N_ACTIONS {
                    let mut list = Vec::new();
                    if letter == b'G' || letter == b'H' {
                        list.push(Transition { prob: 1.0, next_state: s, reward: 0.0, done: true });
                    } else {
                        let moves: Vec<Move> = if slippery {
                            vec![
                                Move::from_index(a + N_ACTIONS - 1),
                                Move::from_index(a),
                                Move::from_index(a + 1),
                            ]
                        } else {
                            vec![Move::from_index(a)]
                        };
                        let prob = 1.0 / moves.len() as f64;

                        for mv in moves {
                            let (new_row, new_col) = inc(row, col, mv);
                            let new_letter = desc[new_row][new_col];
                            list.push(Transition {
                                prob,
                                next_state: to_s(new_row, new_col),
                                reward: if new_letter == b'G' { 1.0 } else { 0.0 },
                                done: new_letter == b'G' || new_letter == b'H',
                            });
                        }
                    }
                    per_action.push(list);
                }
                outcomes.push(per_action);
            }
        }

        TransitionTable::new(outcomes)
    }

    fn sample_initial_state(&mut self) -> u64 {
        let weights: Vec<f64> = self.isd.clone();
        categorical_sample(&weights, &mut self.rng) as u64
    }
}

/// Draws an index with probability proportional to `weights`.
fn categorical_sample(weights: &[f64], rng: &mut ChaCha8Rng) -> usize {
    let u: f64 = rng.gen();
    let mut cumulative = 0.0;
    for (i, w) in weights.iter().enumerate() {
        cumulative += w;
        if cumulative > u {
            return i;
        }
    }
    weights.len().saturating_sub(1)
}

impl Simulation for FrozenLake {
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
        self.state = self.sample_initial_state();
        self.last_action = None;
        Ok(Observation::Discrete(self.state))
    }

    fn step(&mut self, action: &ActionPayload) -> Result<StepOutcome, SimulationError> {
        let a = discrete_action(&self.action_space, action)?;
        let outcomes = self.model.outcomes(self.state, a)?;
        let weights: Vec<f64> = outcomes.iter().map(|t| t.prob).collect();
        let chosen = outcomes[categorical_sample(&weights, &mut self.rng)];

        self.state = chosen.next_state;
        self.last_action = Some(Move::from_index(a as usize));

        Ok(StepOutcome::new(Observation::Discrete(chosen.next_state), chosen.reward, chosen.done)
            .with_info("prob", chosen.prob))
    }

    fn render(&self) -> Option<RenderFrame> {
        let row = (self.state as usize / self.ncol).min(self.nrow.saturating_sub(1));
        let col = self.state as usize % self.ncol;

        let mut out = String::new();
        if let Some(mv) = self.last_action {
            out.push_str(&format!("  ({})\n", mv.name()));
        }
        for (r, line) in self.desc.iter().enumerate() {
            for (c, &cell) in line.iter().enumerate() {
                if r == row && c == col {
                    out.push('[');
                    out.push(cell as char);
                    out.push(']');
                } else {
                    out.push(' ');
                    out.push(cell as char);
                    out.push(' ');
                }
            }
            out.push('\n');
        }
        Some(RenderFrame::Text(out))
    }

    fn transition_model(&self) -> Option<&TransitionTable> {
        Some(&self.model)
    }
}
