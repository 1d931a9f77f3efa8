use anyhow::Result;
use rand::Rng;

use crate::engine::{Action, Snapshot};
use crate::q_agent::{Agent, EPSILON_DECAY, EPSILON_MIN, EPSILON_START};
use crate::transport::{InferenceApiClient, TrainRequest};

// At the nominal 10 steps per second this is roughly the original's
// save-every-five-minutes cadence.
const SAVE_EVERY_STEPS: u64 = 3000;

/// Agent variant that delegates greedy action choice and learning to an
/// external inference service. Keeps a local uniform epsilon-greedy gate;
/// any transport failure degrades to a random action or a no-op so the
/// training loop never stalls on the network.
pub(crate) struct RemoteAgent<R: Rng> {
    api: InferenceApiClient,
    rng: R,
    epsilon: f64,
    episode_steps: u64,
    steps_since_save: u64,
}

impl<R: Rng> RemoteAgent<R> {
    pub(crate) fn new(base_url: &str, rng: R) -> Result<Self> {
        let api = InferenceApiClient::new(base_url)?;
        if let Err(err) = api.load_model() {
            eprintln!("no saved model loaded: {err}");
        }
        Ok(RemoteAgent {
            api,
            rng,
            epsilon: EPSILON_START,
            episode_steps: 0,
            steps_since_save: 0,
        })
    }

    fn random_action(&mut self) -> Action {
        Action::ALL[self.rng.gen_range(0..Action::ALL.len())]
    }
}

impl<R: Rng> Agent for RemoteAgent<R> {
    fn get_action(&mut self, state: &Snapshot) -> Action {
        if self.rng.gen::<f64>() < self.epsilon {
            return self.random_action();
        }

        match self.api.predict(state) {
            Ok(index) => match Action::from_index(index) {
                Some(action) => action,
                None => {
                    eprintln!("service returned unknown action index {index}");
                    self.random_action()
                }
            },
            Err(err) => {
                eprintln!("prediction failed, falling back to random: {err}");
                self.random_action()
            }
        }
    }

    fn learn(
        &mut self,
        state: &Snapshot,
        action: Action,
        reward: f64,
        next_state: &Snapshot,
        episode_end: bool,
    ) {
        self.epsilon = (self.epsilon * EPSILON_DECAY).max(EPSILON_MIN);
        self.episode_steps += 1;

        let request = TrainRequest {
            state: state.clone(),
            action: action.index(),
            reward,
            next_state: next_state.clone(),
            episode_end,
        };
        if let Err(err) = self.api.train(&request) {
            eprintln!("training call failed, skipping transition: {err}");
        }

        self.steps_since_save += 1;
        if self.steps_since_save >= SAVE_EVERY_STEPS {
            self.steps_since_save = 0;
            if let Err(err) = self.api.save_model() {
                eprintln!("model save failed: {err}");
            }
        }

        if episode_end {
            println!(
                "episode finished after {} steps, epsilon {:.3}",
                self.episode_steps, self.epsilon
            );
            self.episode_steps = 0;
        }
    }

    fn begin_episode(&mut self) {
        self.episode_steps = 0;
    }

    fn epsilon(&self) -> f64 {
        self.epsilon
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng as _;

    fn snapshot() -> Snapshot {
        Snapshot {
            player_x: 6,
            player_y: 7,
            world_offset: 0,
            nearest_cars: vec![None, None, None],
            nearest_roads: vec![],
        }
    }

    // Port 9 is unassigned on localhost, so every call fails fast. The agent
    // must keep producing actions and swallowing learn calls regardless.
    fn unreachable_agent() -> RemoteAgent<StdRng> {
        RemoteAgent::new("http://127.0.0.1:9", StdRng::seed_from_u64(42)).expect("client build")
    }

    #[test]
    fn unreachable_service_degrades_to_random_actions() {
        let mut agent = unreachable_agent();
        agent.epsilon = 0.0; // force the delegation path
        let action = agent.get_action(&snapshot());
        assert!(Action::ALL.contains(&action));
    }

    #[test]
    fn unreachable_service_makes_learning_a_no_op() {
        let mut agent = unreachable_agent();
        let s = snapshot();
        agent.learn(&s, Action::Right, 10.0, &s, false);
        agent.learn(&s, Action::Up, 1.0, &s, true);
        assert_eq!(agent.episode_steps, 0, "episode end resets the step count");
    }

    #[test]
    fn epsilon_decays_per_learn_call_with_the_shared_floor() {
        let mut agent = unreachable_agent();
        let s = snapshot();
        let before = agent.epsilon();
        agent.learn(&s, Action::Right, 10.0, &s, false);
        assert!((agent.epsilon() - before * EPSILON_DECAY).abs() < 1e-12);

        agent.epsilon = EPSILON_MIN;
        agent.learn(&s, Action::Right, 10.0, &s, false);
        assert_eq!(agent.epsilon(), EPSILON_MIN);
    }
}
