use std::time::{Duration, Instant};

use rand::{rngs::StdRng, Rng, SeedableRng as _};
use serde::{Deserialize, Serialize};

pub(crate) const GRID_HEIGHT: usize = 15;
pub(crate) const VIEWPORT_WIDTH: usize = 20;
const LANE_SPACING: u64 = 3;
const LANE_LOOKAHEAD: u64 = 5;
const LANE_KEEP_BEHIND: u64 = 2;
const NEAREST_CARS: usize = 3;
const HITBOX_FRACTION: f64 = 0.8;
const SPAWN_INTERVAL_FRAMES: u64 = 15;
const SPAWN_PROBABILITY: f64 = 0.8;
const CAR_SPEED_FACTOR: f64 = 1.2;
const SCORE_PER_ADVANCE: u64 = 10;
const SCORE_DECAY_PERIOD: Duration = Duration::from_secs(1);
pub(crate) const COLLISION_PENALTY: f64 = -100.0;
const ADVANCE_REWARD: f64 = 10.0;
const VERTICAL_REWARD: f64 = 1.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Action {
    Up,
    Down,
    Right,
}

impl Action {
    pub(crate) const ALL: [Action; 3] = [Action::Up, Action::Down, Action::Right];

    pub(crate) fn index(self) -> usize {
        match self {
            Action::Up => 0,
            Action::Down => 1,
            Action::Right => 2,
        }
    }

    pub(crate) fn from_index(index: usize) -> Option<Action> {
        Action::ALL.get(index).copied()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Direction {
    Up,
    Down,
}

impl Direction {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }
}

/// Road column scrolling cars in one direction. `x` is an absolute world
/// column; it never changes for the lifetime of the lane.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Lane {
    pub(crate) x: u64,
    pub(crate) direction: Direction,
    pub(crate) speed: f64,
}

/// A car keeps the column of the lane that spawned it and moves along the
/// row axis by `speed` per frame.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Car {
    pub(crate) x: u64,
    pub(crate) y: f64,
    pub(crate) direction: Direction,
    pub(crate) speed: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct CarView {
    pub(crate) x: i64,
    pub(crate) y: f64,
    pub(crate) direction: Direction,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct LaneView {
    pub(crate) x: i64,
    pub(crate) direction: Direction,
}

/// Read-only state snapshot handed to agents and renderers. Car and lane
/// columns are relative to `world_offset` (screen columns). `nearest_cars`
/// always has exactly three slots, missing ones filled with `None`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Snapshot {
    pub(crate) player_x: usize,
    pub(crate) player_y: usize,
    pub(crate) world_offset: u64,
    pub(crate) nearest_cars: Vec<Option<CarView>>,
    pub(crate) nearest_roads: Vec<LaneView>,
}

#[derive(Clone, Copy, Debug)]
struct HitBox {
    left: f64,
    right: f64,
    top: f64,
    bottom: f64,
}

impl HitBox {
    /// Square hitbox centered in the unit cell at (x, y), shrunk to
    /// `HITBOX_FRACTION` of the cell so edge-touching never collides.
    fn centered(x: f64, y: f64) -> Self {
        let inset = (1.0 - HITBOX_FRACTION) / 2.0;
        HitBox {
            left: x + inset,
            right: x + inset + HITBOX_FRACTION,
            top: y + inset,
            bottom: y + inset + HITBOX_FRACTION,
        }
    }

    /// AABB intersection, strict on all four edges.
    fn overlaps(&self, other: &HitBox) -> bool {
        self.left < other.right
            && self.right > other.left
            && self.top < other.bottom
            && self.bottom > other.top
    }
}

pub(crate) struct Game {
    rng: StdRng,
    pub(crate) player_x: usize,
    pub(crate) player_y: usize,
    pub(crate) world_offset: u64,
    pub(crate) lanes: Vec<Lane>,
    pub(crate) cars: Vec<Car>,
    pub(crate) score: u64,
    pub(crate) max_score: u64,
    pub(crate) episode: u64,
    pub(crate) is_game_over: bool,
    frame_count: u64,
    last_score_decay: Instant,
}

impl Game {
    pub(crate) fn new_with_seed(seed: u64) -> Self {
        let mut game = Game {
            rng: StdRng::seed_from_u64(seed),
            player_x: VIEWPORT_WIDTH / 3,
            player_y: GRID_HEIGHT / 2,
            world_offset: 0,
            lanes: Vec::new(),
            cars: Vec::new(),
            score: 0,
            max_score: 0,
            episode: 1,
            is_game_over: false,
            frame_count: 0,
            last_score_decay: Instant::now(),
        };
        game.generate_initial_lanes();
        game
    }

    pub(crate) fn reset(&mut self) {
        self.player_x = VIEWPORT_WIDTH / 3;
        self.player_y = GRID_HEIGHT / 2;
        self.world_offset = 0;
        self.score = 0;
        self.cars.clear();
        self.is_game_over = false;
        self.episode += 1;
        self.last_score_decay = Instant::now();
        self.generate_initial_lanes();
    }

    fn new_lane(&mut self, x: u64) -> Lane {
        Lane {
            x,
            direction: if self.rng.gen_bool(0.5) {
                Direction::Up
            } else {
                Direction::Down
            },
            speed: 0.1 + self.rng.gen::<f64>() * 0.1,
        }
    }

    fn generate_initial_lanes(&mut self) {
        self.lanes.clear();
        for x in 1..(VIEWPORT_WIDTH as u64 + 2 * LANE_LOOKAHEAD) {
            if x % LANE_SPACING == 0 {
                let lane = self.new_lane(x);
                self.lanes.push(lane);
            }
        }
    }

    /// Generates lanes up to the lookahead frontier and evicts lanes that
    /// fell behind the visible window. Idempotent while `world_offset` is
    /// unchanged.
    pub(crate) fn extend_lanes(&mut self) {
        let max_x = self.lanes.iter().map(|l| l.x).max().unwrap_or(0);
        let target = self.world_offset + VIEWPORT_WIDTH as u64 + LANE_LOOKAHEAD;
        for x in (max_x + 1)..=target {
            if x % LANE_SPACING == 0 {
                let lane = self.new_lane(x);
                self.lanes.push(lane);
            }
        }
        let offset = self.world_offset;
        self.lanes.retain(|l| l.x + LANE_KEEP_BEHIND >= offset);
    }

    /// Spawns at most one car on a uniformly chosen visible lane. The car
    /// enters from the row edge opposite its direction of travel.
    pub(crate) fn spawn_car(&mut self) {
        let visible: Vec<usize> = self
            .lanes
            .iter()
            .enumerate()
            .filter(|(_, l)| {
                l.x >= self.world_offset && l.x < self.world_offset + VIEWPORT_WIDTH as u64
            })
            .map(|(i, _)| i)
            .collect();

        if visible.is_empty() || !self.rng.gen_bool(SPAWN_PROBABILITY) {
            return;
        }

        let pick = self.rng.gen_range(0..visible.len());
        let lane = &self.lanes[visible[pick]];
        let (x, direction, speed) = (lane.x, lane.direction, lane.speed * CAR_SPEED_FACTOR);
        let y = match direction {
            Direction::Down => -1.0,
            Direction::Up => GRID_HEIGHT as f64,
        };
        self.cars.push(Car { x, y, direction, speed });
    }

    fn update_cars(&mut self) {
        for car in &mut self.cars {
            match car.direction {
                Direction::Down => car.y += car.speed,
                Direction::Up => car.y -= car.speed,
            }
        }
        let offset = self.world_offset;
        self.cars.retain(|car| {
            let in_rows = match car.direction {
                Direction::Down => car.y <= GRID_HEIGHT as f64,
                Direction::Up => car.y >= -1.0,
            };
            let in_cols = car.x + 1 >= offset && car.x < offset + VIEWPORT_WIDTH as u64 + 1;
            in_rows && in_cols
        });
    }

    fn check_collision(&self) -> bool {
        let player = HitBox::centered(
            (self.world_offset + self.player_x as u64) as f64,
            self.player_y as f64,
        );
        self.cars
            .iter()
            .any(|car| player.overlaps(&HitBox::centered(car.x as f64, car.y)))
    }

    fn end_episode(&mut self) {
        self.is_game_over = true;
        if self.score > self.max_score {
            self.max_score = self.score;
        }
    }

    /// Applies one action and returns its reward. Collision overrides the
    /// progress reward with `COLLISION_PENALTY` and ends the episode. The
    /// orchestrator is expected to `reset` before calling this again after
    /// a game over.
    pub(crate) fn move_player(&mut self, action: Action) -> f64 {
        match action {
            Action::Up => {
                if self.player_y > 0 {
                    self.player_y -= 1;
                }
            }
            Action::Down => {
                if self.player_y < GRID_HEIGHT - 1 {
                    self.player_y += 1;
                }
            }
            Action::Right => {
                self.world_offset += 1;
                self.extend_lanes();
                self.score += SCORE_PER_ADVANCE;
            }
        }

        if self.check_collision() {
            self.end_episode();
            return COLLISION_PENALTY;
        }

        match action {
            Action::Right => ADVANCE_REWARD,
            _ => VERTICAL_REWARD,
        }
    }

    /// One frame of world time: real-time score decay, car spawning on the
    /// frame cadence, car movement and culling. Does nothing after a game
    /// over.
    pub(crate) fn update(&mut self) {
        if self.is_game_over {
            return;
        }

        let now = Instant::now();
        if now.duration_since(self.last_score_decay) >= SCORE_DECAY_PERIOD {
            self.score = self.score.saturating_sub(1);
            self.last_score_decay = now;
        }

        self.frame_count += 1;
        if self.frame_count % SPAWN_INTERVAL_FRAMES == 0 {
            self.spawn_car();
        }
        self.update_cars();
    }

    pub(crate) fn get_state(&self) -> Snapshot {
        let offset = self.world_offset as i64;
        let player_world_x = offset + self.player_x as i64;

        let mut visible: Vec<&Car> = self
            .cars
            .iter()
            .filter(|car| (car.x as i64 - player_world_x).abs() <= VIEWPORT_WIDTH as i64)
            .collect();
        visible.sort_by_key(|car| (car.x as i64 - player_world_x).abs());

        let nearest_cars = (0..NEAREST_CARS)
            .map(|i| {
                visible.get(i).map(|car| CarView {
                    x: car.x as i64 - offset,
                    y: car.y,
                    direction: car.direction,
                })
            })
            .collect();

        let nearest_roads = self
            .lanes
            .iter()
            .filter(|lane| (lane.x as i64 - player_world_x).abs() <= VIEWPORT_WIDTH as i64)
            .map(|lane| LaneView {
                x: lane.x as i64 - offset,
                direction: lane.direction,
            })
            .collect();

        Snapshot {
            player_x: self.player_x,
            player_y: self.player_y,
            world_offset: self.world_offset,
            nearest_cars,
            nearest_roads,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn car_at(x: u64, y: f64) -> Car {
        Car {
            x,
            y,
            direction: Direction::Down,
            speed: 0.12,
        }
    }

    #[test]
    fn advancing_right_scrolls_by_one_per_action() {
        let mut game = Game::new_with_seed(1);
        for i in 1..=50u64 {
            game.move_player(Action::Right);
            assert_eq!(game.world_offset, i);
        }
        game.move_player(Action::Up);
        game.move_player(Action::Down);
        assert_eq!(game.world_offset, 50);
    }

    #[test]
    fn lane_extension_is_idempotent_without_scroll() {
        let mut game = Game::new_with_seed(2);
        game.world_offset = 7;
        game.extend_lanes();
        let once = game.lanes.clone();
        game.extend_lanes();
        assert_eq!(once, game.lanes);
    }

    #[test]
    fn visible_window_is_fully_laned_after_scrolling() {
        let mut game = Game::new_with_seed(3);
        for _ in 0..100 {
            game.move_player(Action::Right);
        }
        for col in game.world_offset..game.world_offset + VIEWPORT_WIDTH as u64 {
            if col % LANE_SPACING == 0 {
                assert!(
                    game.lanes.iter().any(|l| l.x == col),
                    "missing lane at visible column {col}"
                );
            }
        }
        assert!(game
            .lanes
            .iter()
            .all(|l| l.x + LANE_KEEP_BEHIND >= game.world_offset));
    }

    #[test]
    fn spawned_cars_inherit_lane_column_direction_and_speed() {
        let mut game = Game::new_with_seed(4);
        for _ in 0..50 {
            game.spawn_car();
        }
        assert!(!game.cars.is_empty());
        for car in &game.cars {
            assert_eq!(car.x % LANE_SPACING, 0);
            let lane = game
                .lanes
                .iter()
                .find(|l| l.x == car.x)
                .expect("car on unknown lane");
            assert_eq!(car.direction, lane.direction);
            assert!((car.speed - lane.speed * CAR_SPEED_FACTOR).abs() < 1e-12);
            match car.direction {
                Direction::Down => assert_eq!(car.y, -1.0),
                Direction::Up => assert_eq!(car.y, GRID_HEIGHT as f64),
            }
        }
    }

    #[test]
    fn cars_are_culled_outside_row_and_column_windows() {
        let mut game = Game::new_with_seed(5);
        game.cars.push(Car {
            x: 3,
            y: GRID_HEIGHT as f64 - 0.05,
            direction: Direction::Down,
            speed: 0.2,
        });
        game.update_cars();
        assert!(game.cars.is_empty(), "car past the bottom row must go");

        game.cars.push(car_at(3, 5.0));
        game.world_offset = 30;
        game.update_cars();
        assert!(game.cars.is_empty(), "car behind the window must go");
    }

    #[test]
    fn collision_is_order_independent() {
        let mut game = Game::new_with_seed(6);
        let overlapping = car_at(game.world_offset + game.player_x as u64, game.player_y as f64);
        let distant = car_at(game.world_offset + game.player_x as u64 + 5, 0.0);

        game.cars = vec![overlapping.clone(), distant.clone()];
        assert!(game.check_collision());
        game.cars = vec![distant, overlapping];
        assert!(game.check_collision());
    }

    #[test]
    fn touching_hitbox_edges_do_not_collide() {
        let a = HitBox {
            left: 0.1,
            right: 0.9,
            top: 0.1,
            bottom: 0.9,
        };
        let b = HitBox {
            left: 0.9,
            right: 1.7,
            top: 0.1,
            bottom: 0.9,
        };
        assert!(!a.overlaps(&b));
        assert!(!b.overlaps(&a));

        let c = HitBox {
            left: 0.8,
            right: 1.6,
            top: 0.1,
            bottom: 0.9,
        };
        assert!(a.overlaps(&c));
        assert!(c.overlaps(&a));
    }

    #[test]
    fn advancing_into_empty_world_rewards_progress() {
        let mut game = Game::new_with_seed(7);
        assert_eq!(game.player_x, VIEWPORT_WIDTH / 3);
        assert_eq!(game.player_y, GRID_HEIGHT / 2);
        assert_eq!(game.world_offset, 0);
        assert_eq!(game.score, 0);

        let reward = game.move_player(Action::Right);
        assert_eq!(reward, ADVANCE_REWARD);
        assert!(reward > 0.0 && reward > COLLISION_PENALTY);
        assert!(!game.is_game_over);
        assert_eq!(game.score, SCORE_PER_ADVANCE);
    }

    #[test]
    fn overlapping_car_ends_the_episode() {
        let mut game = Game::new_with_seed(8);
        game.player_y = 0;
        game.cars.push(car_at(game.world_offset + game.player_x as u64, 0.0));

        // Up is clamped at the top row, so the player stays in the cell.
        let reward = game.move_player(Action::Up);
        assert_eq!(reward, COLLISION_PENALTY);
        assert!(game.is_game_over);
    }

    #[test]
    fn vertical_moves_clamp_and_reward_one() {
        let mut game = Game::new_with_seed(9);
        game.player_y = 0;
        assert_eq!(game.move_player(Action::Up), VERTICAL_REWARD);
        assert_eq!(game.player_y, 0);

        game.player_y = GRID_HEIGHT - 1;
        assert_eq!(game.move_player(Action::Down), VERTICAL_REWARD);
        assert_eq!(game.player_y, GRID_HEIGHT - 1);
    }

    #[test]
    fn reset_after_collision_restores_the_episode() {
        let mut game = Game::new_with_seed(10);
        game.max_score = 1000;
        game.score = 50;
        game.player_y = 0;
        game.cars.push(car_at(game.world_offset + game.player_x as u64, 0.0));
        game.move_player(Action::Up);
        assert!(game.is_game_over);

        let episode = game.episode;
        game.reset();
        assert_eq!(game.score, 0);
        assert!(!game.is_game_over);
        assert_eq!(game.episode, episode + 1);
        assert_eq!(game.max_score, 1000);
        assert_eq!(game.player_x, VIEWPORT_WIDTH / 3);
        assert_eq!(game.player_y, GRID_HEIGHT / 2);
        assert_eq!(game.world_offset, 0);
        assert!(game.cars.is_empty());
    }

    #[test]
    fn score_decays_once_per_elapsed_second() {
        let mut game = Game::new_with_seed(11);
        game.score = 10;
        game.last_score_decay = Instant::now() - Duration::from_secs(2);
        game.update();
        assert_eq!(game.score, 9);
        game.update();
        assert_eq!(game.score, 9, "decay must re-arm after firing");

        game.score = 0;
        game.last_score_decay = Instant::now() - Duration::from_secs(2);
        game.update();
        assert_eq!(game.score, 0, "score is floored at zero");
    }

    #[test]
    fn snapshot_reports_three_nearest_cars_sorted_by_distance() {
        let mut game = Game::new_with_seed(12);
        let px = game.player_x as u64;
        game.cars = vec![
            car_at(px + 4, 1.0),
            car_at(px, 2.0),
            car_at(px + 8, 3.0),
            car_at(px + 1, 4.0),
        ];

        let snapshot = game.get_state();
        assert_eq!(snapshot.nearest_cars.len(), 3);
        let xs: Vec<i64> = snapshot
            .nearest_cars
            .iter()
            .map(|c| c.as_ref().expect("three cars available").x)
            .collect();
        assert_eq!(xs, vec![px as i64, px as i64 + 1, px as i64 + 4]);

        game.cars.truncate(2);
        let snapshot = game.get_state();
        assert!(snapshot.nearest_cars[2].is_none(), "missing slots are explicit");
    }

    #[test]
    fn snapshot_reports_lanes_relative_to_the_viewport() {
        let mut game = Game::new_with_seed(13);
        for _ in 0..10 {
            game.move_player(Action::Right);
        }
        let snapshot = game.get_state();
        assert!(!snapshot.nearest_roads.is_empty());
        for road in &snapshot.nearest_roads {
            let world_x = road.x + game.world_offset as i64;
            assert!(game
                .lanes
                .iter()
                .any(|l| l.x as i64 == world_x && l.direction == road.direction));
        }
    }
}
