use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::Result;

use crate::engine::Game;
use crate::q_agent::Agent;
use crate::ui;

const ROLLING_WINDOW: usize = 50;

pub(crate) struct TrainerConfig {
    pub(crate) episodes: u64,
    /// Pause between training ticks; zero runs headless at full speed.
    pub(crate) tick_interval: Duration,
    /// World frames driven per training tick (the original animated at
    /// roughly six frames per 100ms agent step).
    pub(crate) frames_per_step: u32,
    /// Truncates episodes the agent survives indefinitely.
    pub(crate) max_steps_per_episode: u64,
    pub(crate) render: bool,
    pub(crate) log_path: Option<PathBuf>,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        TrainerConfig {
            episodes: 1000,
            tick_interval: Duration::ZERO,
            frames_per_step: 6,
            max_steps_per_episode: 1000,
            render: false,
            log_path: None,
        }
    }
}

/// Runs the cooperative training loop: one (state, action, step, next
/// state, learn) cycle per tick, world frames in between, episode reset
/// and the exploration nudge at episode boundaries.
pub(crate) fn train(game: &mut Game, agent: &mut dyn Agent, config: &TrainerConfig) -> Result<()> {
    let mut log = match &config.log_path {
        Some(path) => Some(OpenOptions::new().create(true).append(true).open(path)?),
        None => None,
    };

    let mut episode_scores: Vec<u64> = Vec::new();
    let mut episode_rewards: Vec<f64> = Vec::new();

    for _ in 0..config.episodes {
        let mut total_reward = 0.0;
        let mut steps = 0u64;

        while !game.is_game_over && steps < config.max_steps_per_episode {
            for _ in 0..config.frames_per_step {
                game.update();
            }

            let state = game.get_state();
            let action = agent.get_action(&state);
            let reward = game.move_player(action);
            let next_state = game.get_state();
            agent.learn(&state, action, reward, &next_state, game.is_game_over);

            total_reward += reward;
            steps += 1;

            if config.render {
                println!("{}", ui::render(game));
            }
            if !config.tick_interval.is_zero() {
                thread::sleep(config.tick_interval);
            }
        }

        episode_scores.push(game.score);
        episode_rewards.push(total_reward);
        let avg_score =
            episode_scores.iter().sum::<u64>() as f64 / episode_scores.len() as f64;
        let last_scores: Vec<u64> = episode_scores
            .iter()
            .rev()
            .take(ROLLING_WINDOW)
            .copied()
            .collect();
        let last_avg_score = last_scores.iter().sum::<u64>() as f64 / last_scores.len() as f64;

        let line = format!(
            "Episode: {} (eps: {:.3}), steps: {}, reward: {:.1}, score: {}, max score: {}, avg score: {:.1}, last {} avg: {:.1}",
            game.episode,
            agent.epsilon(),
            steps,
            total_reward,
            game.score,
            game.max_score,
            avg_score,
            ROLLING_WINDOW,
            last_avg_score,
        );
        println!("{line}");
        if let Some(file) = log.as_mut() {
            writeln!(file, "{line}")?;
        }

        game.reset();
        agent.begin_episode();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::q_agent::QLearningAgent;
    use rand::rngs::StdRng;
    use rand::SeedableRng as _;

    #[test]
    fn training_advances_episodes_and_leaves_a_playable_game() {
        let mut game = Game::new_with_seed(7);
        let mut agent = QLearningAgent::new(StdRng::seed_from_u64(7));
        let config = TrainerConfig {
            episodes: 2,
            frames_per_step: 2,
            max_steps_per_episode: 40,
            ..TrainerConfig::default()
        };

        train(&mut game, &mut agent, &config).expect("training run");

        assert_eq!(game.episode, 3, "one reset per completed episode");
        assert!(!game.is_game_over);
        assert!(agent.epsilon() <= 1.0);
    }

    #[test]
    fn episode_log_is_appended_to_the_configured_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("episodes.log");

        let mut game = Game::new_with_seed(8);
        let mut agent = QLearningAgent::new(StdRng::seed_from_u64(8));
        let config = TrainerConfig {
            episodes: 2,
            frames_per_step: 1,
            max_steps_per_episode: 10,
            log_path: Some(path.clone()),
            ..TrainerConfig::default()
        };

        train(&mut game, &mut agent, &config).expect("training run");

        let contents = std::fs::read_to_string(&path).expect("log file");
        assert_eq!(contents.lines().count(), 2);
        assert!(contents.starts_with("Episode: 1"));
    }
}
