//! Action and observation space descriptors.

use gymlink_env::{ActionPayload, Observation, SpaceSize};
use serde::{Deserialize, Serialize};

/// Shape and bounds of an action or observation space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Space {
    /// Integers in `0..n`
    Discrete { n: u64 },

    /// Real-valued tensor with per-element bounds (row-major)
    Box {
        low: Vec<f64>,
        high: Vec<f64>,
        shape: Vec<usize>,
    },
}

impl Space {
    /// Creates a discrete space with `n` elements.
    pub fn discrete(n: u64) -> Self {
        Space::Discrete { n }
    }

    /// Creates a box space with explicit per-element bounds.
    pub fn bounded(low: Vec<f64>, high: Vec<f64>, shape: Vec<usize>) -> Self {
        debug_assert_eq!(low.len(), high.len());
        debug_assert_eq!(low.len(), shape.iter().product::<usize>());
        Space::Box { low, high, shape }
    }

    /// Creates a box space where every element shares the same bounds.
    pub fn uniform(low: f64, high: f64, shape: Vec<usize>) -> Self {
        let len = shape.iter().product();
        Space::Box {
            low: vec![low; len],
            high: vec![high; len],
            shape,
        }
    }

    /// Returns the type tag reported to drivers.
    pub fn type_name(&self) -> &'static str {
        match self {
            Space::Discrete { .. } => "Discrete",
            Space::Box { .. } => "Box",
        }
    }

    /// Returns `n` for discrete spaces, the shape for boxes.
    pub fn size(&self) -> SpaceSize {
        match self {
            Space::Discrete { n } => SpaceSize::Count(*n),
            Space::Box { shape, .. } => SpaceSize::Shape(shape.clone()),
        }
    }

    /// Number of scalars in one flattened sample.
    pub fn flat_dim(&self) -> usize {
        match self {
            Space::Discrete { .. } => 1,
            Space::Box { shape, .. } => shape.iter().product(),
        }
    }

    /// Returns true if `value` is a valid discrete element.
    pub fn contains_discrete(&self, value: i64) -> bool {
        match self {
            Space::Discrete { n } => value >= 0 && (value as u64) < *n,
            Space::Box { .. } => false,
        }
    }

    /// Returns true if a single (unbatched) action is valid in this space.
    pub fn contains_action(&self, action: &ActionPayload) -> bool {
        match self {
            Space::Discrete { .. } => action
                .as_discrete()
                .map_or(false, |value| self.contains_discrete(value)),
            Space::Box { low, high, .. } => {
                let values: Option<Vec<f64>> = action
                    .leaves()
                    .iter()
                    .map(|leaf| match leaf {
                        ActionPayload::Discrete(v) => Some(*v as f64),
                        ActionPayload::Continuous(v) => Some(*v),
                        ActionPayload::Batch(_) => None,
                    })
                    .collect();
                values.map_or(false, |values| {
                    values.len() == low.len()
                        && values
                            .iter()
                            .zip(low.iter().zip(high.iter()))
                            .all(|(v, (lo, hi))| v >= lo && v <= hi)
                })
            }
        }
    }

    /// Returns true if a single (unbatched) observation lies in this space.
    pub fn contains(&self, observation: &Observation) -> bool {
        match (self, observation) {
            (Space::Discrete { n }, Observation::Discrete(v)) => v < n,
            (Space::Box { low, high, .. }, Observation::Continuous(values)) => {
                values.len() == low.len()
                    && values
                        .iter()
                        .zip(low.iter().zip(high.iter()))
                        .all(|(v, (lo, hi))| v >= lo && v <= hi)
            }
            _ => false,
        }
    }
}

impl std::fmt::Display for Space {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Space::Discrete { n } => write!(f, "Discrete({})", n),
            Space::Box { shape, .. } => write!(f, "Box({:?})", shape),
        }
    }
}
