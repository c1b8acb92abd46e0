//! Grid world simulation and a tabular Q-learning agent that learns to walk it.
//!
//! The grid owns the tiles and the player, the agent owns its Q-table, and the
//! training loop in [`training`] drives one through the other.

pub mod agent;
pub mod config;
pub mod environment;
pub mod error;
pub mod policy;
pub mod rl;
pub mod training;

pub use error::{Error, Result};
