use rand::Rng;

use crate::engine::{Action, Snapshot};
use crate::q_table::QTable;

pub(crate) const EPSILON_START: f64 = 1.0;
pub(crate) const EPSILON_MIN: f64 = 0.01;
pub(crate) const EPSILON_DECAY: f64 = 0.995;
pub(crate) const EPISODE_EPSILON_NUDGE: f64 = 0.1;
const STALL_EPSILON_BOOST: f64 = 0.1;
const STALL_BOOST_THRESHOLD: u32 = 3;
const STALL_FORCE_THRESHOLD: u32 = 5;
const EXPLORE_RIGHT_BIAS: f64 = 0.6;
const RIGHT_LEARN_BONUS: f64 = 0.1;
const LANE_KEY_WINDOW: i64 = 3;

/// Action selection and learning over environment snapshots. Implemented by
/// the local tabular agent and the remote-inference variant; the trainer
/// only talks to this trait.
pub(crate) trait Agent {
    fn get_action(&mut self, state: &Snapshot) -> Action;

    fn learn(
        &mut self,
        state: &Snapshot,
        action: Action,
        reward: f64,
        next_state: &Snapshot,
        episode_end: bool,
    );

    /// Called by the trainer right after an environment reset.
    fn begin_episode(&mut self);

    fn epsilon(&self) -> f64;
}

/// Discretized state signature. Player position, then the occupied
/// nearest-car slots (absent slots omitted so different car counts hash
/// apart), then only the lanes within three columns of the player - the
/// learner wants broad car awareness but only local lane detail.
pub(crate) fn state_key(state: &Snapshot) -> String {
    let player = format!("{},{}", state.player_x, state.player_y);

    let cars = state
        .nearest_cars
        .iter()
        .flatten()
        .map(|car| format!("{},{},{}", car.x, car.y, car.direction.as_str()))
        .collect::<Vec<_>>()
        .join("|");

    let roads = state
        .nearest_roads
        .iter()
        .filter(|road| (road.x - state.player_x as i64).abs() <= LANE_KEY_WINDOW)
        .map(|road| format!("{},{}", road.x, road.direction.as_str()))
        .collect::<Vec<_>>()
        .join("|");

    format!("{player}|{cars}|{roads}")
}

/// Epsilon-greedy tabular Q-learning agent with an anti-stagnation bias.
/// The random source is injected so tests can drive the decision paths
/// deterministically.
pub(crate) struct QLearningAgent<R: Rng> {
    rng: R,
    table: QTable,
    epsilon: f64,
    last_player_pos: Option<(usize, usize)>,
    stalled_steps: u32,
}

impl<R: Rng> QLearningAgent<R> {
    pub(crate) fn new(rng: R) -> Self {
        QLearningAgent {
            rng,
            table: QTable::new(),
            epsilon: EPSILON_START,
            last_player_pos: None,
            stalled_steps: 0,
        }
    }

    fn best_action(&mut self, state: &Snapshot) -> Action {
        let key = state_key(state);
        let best = self.table.best_actions(&key);
        if best.contains(&Action::Right) {
            return Action::Right;
        }
        best[self.rng.gen_range(0..best.len())]
    }

    fn track_stagnation(&mut self, state: &Snapshot) {
        if let Some(last) = self.last_player_pos {
            if last == (state.player_x, state.player_y) {
                self.stalled_steps += 1;
                if self.stalled_steps > STALL_BOOST_THRESHOLD {
                    self.epsilon = (self.epsilon + STALL_EPSILON_BOOST).min(1.0);
                    self.stalled_steps = 0;
                }
            } else {
                self.stalled_steps = 0;
            }
        }
        self.last_player_pos = Some((state.player_x, state.player_y));
    }
}

impl<R: Rng> Agent for QLearningAgent<R> {
    fn get_action(&mut self, state: &Snapshot) -> Action {
        self.track_stagnation(state);

        if self.stalled_steps > STALL_FORCE_THRESHOLD {
            return Action::Right;
        }

        if self.rng.gen::<f64>() < self.epsilon {
            if self.rng.gen::<f64>() < EXPLORE_RIGHT_BIAS {
                return Action::Right;
            }
            return Action::ALL[self.rng.gen_range(0..Action::ALL.len())];
        }

        self.best_action(state)
    }

    fn learn(
        &mut self,
        state: &Snapshot,
        action: Action,
        reward: f64,
        next_state: &Snapshot,
        _episode_end: bool,
    ) {
        let key = state_key(state);
        let next_key = state_key(next_state);

        let mut reward = reward;
        if action == Action::Right {
            reward += RIGHT_LEARN_BONUS;
        }

        self.table.update(&key, action, reward, &next_key);
        self.epsilon = (self.epsilon * EPSILON_DECAY).max(EPSILON_MIN);
    }

    fn begin_episode(&mut self) {
        self.stalled_steps = 0;
        self.last_player_pos = None;
        self.epsilon = (self.epsilon + EPISODE_EPSILON_NUDGE).min(1.0);
    }

    fn epsilon(&self) -> f64 {
        self.epsilon
    }
}
