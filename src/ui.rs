use crate::engine::{Direction, Game, GRID_HEIGHT, VIEWPORT_WIDTH};

/// Read-only ASCII view of the current viewport: lane columns as ':',
/// cars as 'v'/'^', the player as 'P'. Never touches game state.
pub(crate) fn render(game: &Game) -> String {
    let mut grid = vec![[b'.'; VIEWPORT_WIDTH]; GRID_HEIGHT];

    for lane in &game.lanes {
        if lane.x < game.world_offset {
            continue;
        }
        let col = (lane.x - game.world_offset) as usize;
        if col < VIEWPORT_WIDTH {
            for row in grid.iter_mut() {
                row[col] = b':';
            }
        }
    }

    for car in &game.cars {
        if car.x < game.world_offset {
            continue;
        }
        let col = (car.x - game.world_offset) as usize;
        let row = car.y.floor();
        if col < VIEWPORT_WIDTH && row >= 0.0 && row < GRID_HEIGHT as f64 {
            grid[row as usize][col] = match car.direction {
                Direction::Down => b'v',
                Direction::Up => b'^',
            };
        }
    }

    grid[game.player_y][game.player_x] = b'P';

    let mut out = format!(
        "score: {}  max: {}  episode: {}  offset: {}\n",
        game.score, game.max_score, game.episode, game.world_offset
    );
    for row in &grid {
        out.push_str(std::str::from_utf8(row).expect("ascii grid"));
        out.push('\n');
    }
    out
}
