use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng as _;

mod engine;
mod q_agent;
mod q_table;
mod remote_agent;
mod server;
mod trainer;
mod transport;
mod ui;

use engine::Game;
use q_agent::QLearningAgent;
use remote_agent::RemoteAgent;
use trainer::TrainerConfig;

#[derive(Parser)]
#[command(name = "lanecross")]
#[command(about = "Scrolling road-crossing testbed with a tabular Q-learning agent")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct TrainArgs {
    #[arg(long, default_value_t = 1000)]
    episodes: u64,
    #[arg(long, default_value_t = 1)]
    seed: u64,
    /// Milliseconds between training ticks (0 = full speed)
    #[arg(long, default_value_t = 0)]
    tick_ms: u64,
    #[arg(long, default_value_t = 1000)]
    max_steps: u64,
    /// Print an ASCII frame after every step
    #[arg(long)]
    render: bool,
    /// Append per-episode stats to this file
    #[arg(long)]
    log: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Train the local tabular agent
    Train(TrainArgs),
    /// Train against a remote inference service
    TrainRemote {
        #[command(flatten)]
        args: TrainArgs,
        /// Service to train against; when omitted one is hosted in-process
        #[arg(long)]
        url: Option<String>,
        #[arg(long, default_value_t = 5000)]
        port: u16,
        #[arg(long, default_value = "model.json")]
        model: PathBuf,
    },
    /// Run the inference service only
    Serve {
        #[arg(long, default_value_t = 5000)]
        port: u16,
        #[arg(long, default_value = "model.json")]
        model: PathBuf,
    },
}

impl TrainArgs {
    fn trainer_config(&self) -> TrainerConfig {
        TrainerConfig {
            episodes: self.episodes,
            tick_interval: Duration::from_millis(self.tick_ms),
            max_steps_per_episode: self.max_steps,
            render: self.render,
            log_path: self.log.clone(),
            ..TrainerConfig::default()
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Train(args) => {
            let mut game = Game::new_with_seed(args.seed);
            let mut agent = QLearningAgent::new(StdRng::seed_from_u64(args.seed));
            trainer::train(&mut game, &mut agent, &args.trainer_config())
        }
        Commands::TrainRemote {
            args,
            url,
            port,
            model,
        } => {
            let url = match url {
                Some(url) => url,
                None => {
                    thread::spawn(move || server::run_http_server(port, model));
                    thread::sleep(Duration::from_millis(200));
                    format!("http://127.0.0.1:{port}")
                }
            };
            let mut game = Game::new_with_seed(args.seed);
            let mut agent = RemoteAgent::new(&url, StdRng::seed_from_u64(args.seed))?;
            trainer::train(&mut game, &mut agent, &args.trainer_config())
        }
        Commands::Serve { port, model } => {
            server::run_http_server(port, model);
            Ok(())
        }
    }
}
