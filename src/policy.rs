use std::collections::HashMap;

use log::trace;
use rand::prelude::*;
use rand::rngs::StdRng;

use crate::environment::{Action, Coord, Grid};
use crate::error::{Error, Result};

/// Result of playing one episode to the end (or to the step limit).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rollout {
    pub steps: usize,
    pub score: f64,
    pub won: bool,
    pub truncated: bool,
}

pub trait Policy {
    fn choose(&mut self, grid: &Grid) -> Result<Action>;

    /// Plays from the grid's current state until a terminal tile is reached
    /// or `max_steps` moves have been made. Nothing is learned.
    fn solve(&mut self, grid: &mut Grid, max_steps: Option<usize>) -> Result<Rollout> {
        let mut steps = 0;
        let mut won = false;
        while !grid.is_game_over() {
            if max_steps.map_or(false, |max| steps >= max) {
                return Ok(Rollout {
                    steps,
                    score: grid.score(),
                    won: false,
                    truncated: true,
                });
            }
            let action = self.choose(grid)?;
            let t = grid.r#move(action)?;
            trace!("{:?} => {:?} {}", action, t.entered, t.to);
            won = t.entered.is_win();
            steps += 1;
        }
        Ok(Rollout {
            steps,
            score: grid.score(),
            won,
            truncated: false,
        })
    }
}

/// Uniformly random legal moves.
pub struct RandomPolicy {
    rng: StdRng,
}

impl RandomPolicy {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }
}

impl Policy for RandomPolicy {
    fn choose(&mut self, grid: &Grid) -> Result<Action> {
        let position = grid.position();
        if grid.legal_actions(position).is_empty() {
            return Err(Error::NoLegalAction { position });
        }
        loop {
            let action: Action = self.rng.gen();
            if grid.is_valid_tile(position.shift(action)) {
                return Ok(action);
            }
        }
    }
}

/// Deterministic policy: one fixed action per cell.
#[derive(Debug, Clone, Default)]
pub struct DetPolicy {
    pub policy: HashMap<Coord, Action>,
}

impl DetPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, pos: Coord) -> Option<Action> {
        self.policy.get(&pos).copied()
    }
}

impl Policy for DetPolicy {
    fn choose(&mut self, grid: &Grid) -> Result<Action> {
        let position = grid.position();
        self.get(position).ok_or(Error::MissingPolicyEntry { position })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::{Layout, Placement};

    fn corridor() -> Grid {
        Grid::new(
            Layout::new(4, 1, Coord::new(0, 0))
                .with(Placement::reward(1, 0, 2.0))
                .with(Placement::terminal(3, 0, 10.0)),
        )
        .unwrap()
    }

    #[test]
    fn det_policy_walks_to_the_goal() {
        let mut grid = corridor();
        let mut policy = DetPolicy::new();
        for x in 0..3 {
            policy.policy.insert(Coord::new(x, 0), Action::West);
        }
        let rollout = policy.solve(&mut grid, None).unwrap();
        assert_eq!(rollout.steps, 3);
        assert!(rollout.won);
        assert!(!rollout.truncated);
        assert!((rollout.score - (2.0 + 10.0 - 0.3)).abs() < 1e-9);
    }

    #[test]
    fn det_policy_without_entry_fails() {
        let mut grid = corridor();
        let mut policy = DetPolicy::new();
        assert!(matches!(policy.solve(&mut grid, None), Err(Error::MissingPolicyEntry { .. })));
    }

    #[test]
    fn step_limit_truncates() {
        let mut grid = corridor();
        let mut policy = DetPolicy::new();
        policy.policy.insert(Coord::new(0, 0), Action::West);
        policy.policy.insert(Coord::new(1, 0), Action::East);
        let rollout = policy.solve(&mut grid, Some(5)).unwrap();
        assert!(rollout.truncated);
        assert!(!rollout.won);
        assert_eq!(rollout.steps, 5);
    }

    #[test]
    fn random_policy_only_picks_legal_moves() {
        let mut grid = corridor();
        let mut policy = RandomPolicy::new(Some(3));
        let rollout = policy.solve(&mut grid, None).unwrap();
        assert!(rollout.won);
        assert!(rollout.steps >= 3);
    }
}
