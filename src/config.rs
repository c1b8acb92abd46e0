//! Hyperparameters for the agent and the training loop.

use crate::error::{Error, Result};

/// Q-learning hyperparameters.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    /// Number of actions. Always 4 for the grid.
    pub num_actions: usize,
    /// Step size α.
    pub learning_rate: f64,
    /// Discount factor γ.
    pub discount: f64,
    /// Probability ε of picking a random legal action.
    pub exploration_rate: f64,
    /// Fraction of ε removed after each episode by the training loop.
    pub exploration_decay_rate: f64,
    /// Seed for the agent's random number generator. `None` draws from entropy.
    pub seed: Option<u64>,
}

impl AgentConfig {
    pub fn validate(&self) -> Result<()> {
        if self.num_actions != 4 {
            return Err(Error::InvalidConfiguration {
                message: format!("num_actions must be 4, got {}", self.num_actions),
            });
        }
        check_unit("learning_rate", self.learning_rate)?;
        check_unit("discount", self.discount)?;
        check_unit("exploration_rate", self.exploration_rate)?;
        check_unit("exploration_decay_rate", self.exploration_decay_rate)?;
        Ok(())
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            num_actions: 4,
            learning_rate: 0.1,
            discount: 0.9,
            exploration_rate: 1.0,
            exploration_decay_rate: 0.001,
            seed: None,
        }
    }
}

/// Episode loop settings.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingConfig {
    pub episodes: usize,
    /// Episodes longer than this are cut off. `None` runs until a terminal tile.
    pub max_steps: Option<usize>,
    /// Lower bound for the decayed exploration rate.
    pub min_exploration_rate: f64,
    /// Log a progress line every this many episodes. 0 disables it.
    pub log_every: usize,
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<()> {
        check_unit("min_exploration_rate", self.min_exploration_rate)?;
        if self.max_steps == Some(0) {
            return Err(Error::InvalidConfiguration {
                message: "max_steps must be positive".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            episodes: 5_000,
            max_steps: Some(1_000),
            min_exploration_rate: 0.01,
            log_every: 500,
        }
    }
}

fn check_unit(name: &str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(Error::InvalidConfiguration {
            message: format!("{} must be in [0, 1], got {}", name, value),
        })
    }
}
