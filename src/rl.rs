use std::cmp::Reverse;
use std::collections::HashMap;

use log::debug;
use ordered_float::OrderedFloat;
use rand::prelude::*;
use rand::rngs::StdRng;

use crate::config::AgentConfig;
use crate::environment::{Action, Coord, Grid};
use crate::error::{Error, Result};
use crate::policy::{DetPolicy, Policy};

/// Estimated value of taking an action from a position. Pairs never written
/// read as 0.0.
#[derive(Debug, Clone, Default)]
pub struct QTable {
    values: HashMap<(Coord, Action), f64>,
}

impl QTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, pos: Coord, action: Action) -> f64 {
        self.values.get(&(pos, action)).copied().unwrap_or(0.0)
    }

    pub fn set(&mut self, pos: Coord, action: Action, value: f64) {
        self.values.insert((pos, action), value);
    }

    /// Best value over all four actions, legal or not.
    pub fn max_value(&self, pos: Coord) -> f64 {
        Action::ALL
            .iter()
            .map(|a| self.get(pos, *a))
            .fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Tabular Q-learning with ε-greedy selection restricted to legal moves.
pub struct QLearningAgent {
    q_table: QTable,
    learning_rate: f64,
    discount: f64,
    exploration_rate: f64,
    exploration_decay_rate: f64,
    rng: StdRng,
}

impl QLearningAgent {
    pub fn new(config: &AgentConfig) -> Result<Self> {
        config.validate()?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            q_table: QTable::new(),
            learning_rate: config.learning_rate,
            discount: config.discount,
            exploration_rate: config.exploration_rate,
            exploration_decay_rate: config.exploration_decay_rate,
            rng,
        })
    }

    pub fn q_table(&self) -> &QTable {
        &self.q_table
    }

    pub fn q_value(&self, pos: Coord, action: Action) -> f64 {
        self.q_table.get(pos, action)
    }

    pub fn exploration_rate(&self) -> f64 {
        self.exploration_rate
    }

    pub fn set_exploration_rate(&mut self, rate: f64) -> Result<()> {
        if !(0.0..=1.0).contains(&rate) {
            return Err(Error::InvalidConfiguration {
                message: format!("exploration_rate must be in [0, 1], got {}", rate),
            });
        }
        self.exploration_rate = rate;
        Ok(())
    }

    /// Shrinks ε by the decay rate, never below `min`.
    pub fn decay_exploration(&mut self, min: f64) -> f64 {
        let decayed = self.exploration_rate * (1.0 - self.exploration_decay_rate);
        self.exploration_rate = decayed.max(min).min(self.exploration_rate);
        self.exploration_rate
    }

    /// Picks an action from `position`. Ties between the best legal actions
    /// are broken uniformly at random.
    pub fn act(&mut self, grid: &Grid, position: Coord) -> Result<Action> {
        grid.tile(position)?;
        let legal = grid.legal_actions(position);
        if legal.is_empty() {
            return Err(Error::NoLegalAction { position });
        }

        if self.rng.gen::<f64>() < self.exploration_rate {
            return legal
                .choose(&mut self.rng)
                .copied()
                .ok_or(Error::NoLegalAction { position });
        }

        let mut options: Vec<(Action, f64)> = legal
            .into_iter()
            .map(|a| (a, self.q_table.get(position, a)))
            .collect();
        // shuffle first, the sort is stable
        options.shuffle(&mut self.rng);
        options.sort_by_key(|(_, value)| Reverse(OrderedFloat(*value)));

        Ok(options[0].0)
    }

    /// One-step Q-learning update. Returns the absolute TD error.
    ///
    /// The lookahead takes the maximum over every action from `next`, including
    /// moves that would be illegal there.
    pub fn update(&mut self, position: Coord, action: Action, next: Coord, reward: f64) -> f64 {
        let optimal_future_value = self.q_table.max_value(next);
        let current = self.q_table.get(position, action);
        let target = reward + self.discount * optimal_future_value;
        let updated = (1.0 - self.learning_rate) * current + self.learning_rate * target;
        self.q_table.set(position, action, updated);
        (target - current).abs()
    }

    /// Greedy action per reachable cell, ties going to the first action in
    /// `Action::ALL` order.
    pub fn greedy_policy(&self, grid: &Grid) -> DetPolicy {
        let mut policy = DetPolicy::new();
        for pos in grid.coords() {
            if !grid.is_valid_tile(pos) {
                continue;
            }
            let best = grid.legal_actions(pos).into_iter().fold(None, |best: Option<Action>, a| {
                match best {
                    Some(b) if self.q_table.get(pos, b) >= self.q_table.get(pos, a) => Some(b),
                    _ => Some(a),
                }
            });
            if let Some(action) = best {
                policy.policy.insert(pos, action);
            }
        }
        debug!("extracted greedy policy over {} cells", policy.policy.len());
        policy
    }
}

impl Policy for QLearningAgent {
    fn choose(&mut self, grid: &Grid) -> Result<Action> {
        self.act(grid, grid.position())
    }
}
