use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use log::info;

use gridworld::config::{AgentConfig, TrainingConfig};
use gridworld::environment::{Action, Coord, Grid, Layout, Tile};
use gridworld::policy::{DetPolicy, RandomPolicy};
use gridworld::rl::QLearningAgent;
use gridworld::training::{evaluate, train};

#[derive(Parser)]
#[command(name = "gridworld")]
#[command(version, about = "Train a Q-learning agent on a grid world", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train an agent on the default layout and evaluate its greedy policy
    Train(TrainArgs),

    /// Play random legal moves as a baseline
    Baseline(BaselineArgs),

    /// Print the default layout
    Show,
}

#[derive(Args)]
struct TrainArgs {
    #[arg(long, default_value_t = 5_000)]
    episodes: usize,

    #[arg(long, default_value_t = 0.1)]
    learning_rate: f64,

    #[arg(long, default_value_t = 0.9)]
    discount: f64,

    #[arg(long, default_value_t = 1.0)]
    exploration_rate: f64,

    #[arg(long, default_value_t = 0.001)]
    exploration_decay_rate: f64,

    #[arg(long, default_value_t = 0.01)]
    min_exploration_rate: f64,

    /// Cut episodes off after this many steps (0 = no limit)
    #[arg(long, default_value_t = 1_000)]
    max_steps: usize,

    #[arg(long)]
    seed: Option<u64>,

    /// Write per-episode statistics to this CSV file
    #[arg(long)]
    csv: Option<PathBuf>,

    #[arg(long, default_value_t = 100)]
    eval_episodes: usize,

    #[arg(long, default_value_t = 500)]
    log_every: usize,
}

#[derive(Args)]
struct BaselineArgs {
    #[arg(long, default_value_t = 100)]
    episodes: usize,

    #[arg(long, default_value_t = 1_000)]
    max_steps: usize,

    #[arg(long)]
    seed: Option<u64>,
}

fn step_limit(max_steps: usize) -> Option<usize> {
    if max_steps == 0 { None } else { Some(max_steps) }
}

fn arrow(action: Action) -> char {
    match action {
        Action::North => '^',
        Action::South => 'v',
        Action::East => '<',
        Action::West => '>',
    }
}

fn render_policy(grid: &Grid, policy: &DetPolicy) -> String {
    let (size_x, size_y) = grid.size();
    let mut out = String::new();
    for y in (0..size_y as i32).rev() {
        for x in 0..size_x as i32 {
            let pos = Coord::new(x, y);
            let c = match grid.tile(pos) {
                Ok(Tile::Empty) | Ok(Tile::Player) => policy.get(pos).map_or('.', arrow),
                Ok(tile) => tile.symbol(),
                Err(_) => '?',
            };
            out.push(c);
        }
        out.push('\n');
    }
    out
}

fn run_train(args: TrainArgs) -> Result<()> {
    let mut grid = Grid::new(Layout::default())?;
    let mut agent = QLearningAgent::new(&AgentConfig {
        num_actions: Action::ALL.len(),
        learning_rate: args.learning_rate,
        discount: args.discount,
        exploration_rate: args.exploration_rate,
        exploration_decay_rate: args.exploration_decay_rate,
        seed: args.seed,
    })?;
    let config = TrainingConfig {
        episodes: args.episodes,
        max_steps: step_limit(args.max_steps),
        min_exploration_rate: args.min_exploration_rate,
        log_every: args.log_every,
    };

    let report = train(&mut grid, &mut agent, &config)?;
    info!(
        "trained {} episodes, win rate {:.3}, {} q-values",
        report.episodes.len(),
        report.win_rate(),
        agent.q_table().len()
    );
    if let Some(path) = &args.csv {
        report.write_csv(path)?;
        info!("wrote episode statistics to {}", path.display());
    }

    grid.reset()?;
    let mut policy = agent.greedy_policy(&grid);
    print!("{}", render_policy(&grid, &policy));
    let evaluation = evaluate(&mut grid, &mut policy, args.eval_episodes, config.max_steps)?;
    println!(
        "greedy policy: mean score {:.2}, win rate {:.2}",
        evaluation.mean_score(),
        evaluation.win_rate()
    );
    Ok(())
}

fn run_baseline(args: BaselineArgs) -> Result<()> {
    let mut grid = Grid::new(Layout::default())?;
    let mut policy = RandomPolicy::new(args.seed);
    let evaluation = evaluate(&mut grid, &mut policy, args.episodes, step_limit(args.max_steps))?;
    println!(
        "random policy: mean score {:.2}, win rate {:.2}",
        evaluation.mean_score(),
        evaluation.win_rate()
    );
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Train(args) => run_train(args),
        Commands::Baseline(args) => run_baseline(args),
        Commands::Show => {
            print!("{}", Grid::new(Layout::default())?);
            Ok(())
        }
    }
}
