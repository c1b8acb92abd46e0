//! Episode loop tying the grid and the learning agent together.

use std::path::Path;

use csv::Writer;
use log::{debug, info};

use crate::config::TrainingConfig;
use crate::environment::Grid;
use crate::error::Result;
use crate::policy::{Policy, Rollout};
use crate::rl::QLearningAgent;

#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeStats {
    pub episode: usize,
    pub steps: usize,
    pub score: f64,
    pub won: bool,
    pub truncated: bool,
    /// Exploration rate the episode was played with.
    pub exploration_rate: f64,
    pub max_td_error: f64,
}

#[derive(Debug, Clone, Default)]
pub struct TrainingReport {
    pub episodes: Vec<EpisodeStats>,
}

impl TrainingReport {
    pub fn win_rate(&self) -> f64 {
        if self.episodes.is_empty() {
            return 0.0;
        }
        self.episodes.iter().filter(|e| e.won).count() as f64 / self.episodes.len() as f64
    }

    /// Mean score of the last `n` episodes.
    pub fn recent_mean_score(&self, n: usize) -> f64 {
        let tail = &self.episodes[self.episodes.len().saturating_sub(n)..];
        if tail.is_empty() {
            return 0.0;
        }
        tail.iter().map(|e| e.score).sum::<f64>() / tail.len() as f64
    }

    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut wtr = Writer::from_path(path)?;
        wtr.write_record([
            "episode",
            "steps",
            "score",
            "won",
            "truncated",
            "exploration_rate",
            "max_td_error",
        ])?;
        for e in &self.episodes {
            wtr.write_record(&[
                e.episode.to_string(),
                e.steps.to_string(),
                e.score.to_string(),
                e.won.to_string(),
                e.truncated.to_string(),
                e.exploration_rate.to_string(),
                e.max_td_error.to_string(),
            ])?;
        }
        wtr.flush()?;
        Ok(())
    }
}

/// Plays a single learning episode from a freshly reset grid.
pub fn run_episode(
    grid: &mut Grid,
    agent: &mut QLearningAgent,
    episode: usize,
    max_steps: Option<usize>,
) -> Result<EpisodeStats> {
    grid.reset()?;
    let exploration_rate = agent.exploration_rate();
    let mut steps = 0;
    let mut won = false;
    let mut truncated = false;
    let mut max_td_error: f64 = 0.0;

    while !grid.is_game_over() {
        if max_steps.map_or(false, |max| steps >= max) {
            truncated = true;
            break;
        }
        let s = grid.position();
        let a = agent.act(grid, s)?;
        let t = grid.r#move(a)?;
        let td_error = agent.update(s, a, t.to, t.reward);
        max_td_error = max_td_error.max(td_error);
        won = t.entered.is_win();
        steps += 1;
    }

    Ok(EpisodeStats {
        episode,
        steps,
        score: grid.score(),
        won,
        truncated,
        exploration_rate,
        max_td_error,
    })
}

/// Trains `agent` for `config.episodes` episodes. The Q-table is the only
/// state carried from one episode to the next.
pub fn train(
    grid: &mut Grid,
    agent: &mut QLearningAgent,
    config: &TrainingConfig,
) -> Result<TrainingReport> {
    config.validate()?;
    let mut report = TrainingReport::default();

    for episode in 0..config.episodes {
        let stats = run_episode(grid, agent, episode, config.max_steps)?;
        debug!(
            "episode {}: {} steps, score {:.2}, won {}",
            episode, stats.steps, stats.score, stats.won
        );
        report.episodes.push(stats);
        agent.decay_exploration(config.min_exploration_rate);

        if config.log_every > 0 && (episode + 1) % config.log_every == 0 {
            info!(
                "episode {}/{}: mean score {:.2} over last {}, epsilon {:.4}, {} q-values",
                episode + 1,
                config.episodes,
                report.recent_mean_score(config.log_every),
                config.log_every,
                agent.exploration_rate(),
                agent.q_table().len()
            );
        }
    }
    Ok(report)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub rollouts: Vec<Rollout>,
}

impl Evaluation {
    pub fn mean_score(&self) -> f64 {
        if self.rollouts.is_empty() {
            return 0.0;
        }
        self.rollouts.iter().map(|r| r.score).sum::<f64>() / self.rollouts.len() as f64
    }

    pub fn win_rate(&self) -> f64 {
        if self.rollouts.is_empty() {
            return 0.0;
        }
        self.rollouts.iter().filter(|r| r.won).count() as f64 / self.rollouts.len() as f64
    }
}

/// Runs `policy` for a number of episodes without learning.
pub fn evaluate<P: Policy + ?Sized>(
    grid: &mut Grid,
    policy: &mut P,
    episodes: usize,
    max_steps: Option<usize>,
) -> Result<Evaluation> {
    let mut rollouts = Vec::with_capacity(episodes);
    for _ in 0..episodes {
        grid.reset()?;
        rollouts.push(policy.solve(grid, max_steps)?);
    }
    let evaluation = Evaluation { rollouts };
    info!(
        "evaluated {} episodes: mean score {:.2}, win rate {:.2}",
        episodes,
        evaluation.mean_score(),
        evaluation.win_rate()
    );
    Ok(evaluation)
}
