use std::fmt;

use log::trace;
use ndarray::Array2;
use rand::{
    distributions::{Distribution, Standard},
    Rng,
};

use crate::agent::Player;
use crate::error::{Error, Result};

/// Cost charged on every successful move, on top of any tile bonus.
pub const STEP_COST: f64 = 0.1;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Coord {
    pub x: i32,
    pub y: i32,
}

impl Coord {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Neighbour in the direction of `action`. Saturates at the `i32` limits,
    /// which always lie off the grid.
    pub fn shift(self, action: Action) -> Coord {
        let (dx, dy) = action.into_vector();
        Coord::new(self.x.saturating_add(dx), self.y.saturating_add(dy))
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Action {
    North,
    South,
    East,
    West,
}

impl Action {
    pub const ALL: [Action; 4] = [Action::North, Action::South, Action::East, Action::West];

    /// Unit step for this action. East and West are mirrored with respect to
    /// the compass: East walks towards smaller `x`.
    pub fn into_vector(self) -> (i32, i32) {
        match self {
            Action::North => ( 0,  1),
            Action::South => ( 0, -1),
            Action::East  => (-1,  0),
            Action::West  => ( 1,  0),
        }
    }
}

impl Distribution<Action> for Standard {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Action {
        match rng.gen_range(0..4) {
            0 => Action::North,
            1 => Action::South,
            2 => Action::East,
            _ => Action::West,
        }
    }
}

/// Contents of a single cell.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub enum Tile {
    #[default]
    Empty,
    Obstacle,
    Reward(f64),
    /// Ends the episode. Positive values are wins, the rest are losses.
    Terminal(f64),
    Player,
}

impl Tile {
    /// Score bonus collected when the player enters this tile.
    pub fn bonus(&self) -> f64 {
        match self {
            Tile::Reward(value) | Tile::Terminal(value) => *value,
            Tile::Empty | Tile::Obstacle | Tile::Player => 0.0,
        }
    }

    pub fn is_win(&self) -> bool {
        matches!(self, Tile::Terminal(value) if *value > 0.0)
    }

    pub fn is_loss(&self) -> bool {
        matches!(self, Tile::Terminal(value) if *value <= 0.0)
    }

    pub fn symbol(&self) -> char {
        match self {
            Tile::Empty => '.',
            Tile::Obstacle => '#',
            Tile::Reward(_) => 'r',
            Tile::Terminal(_) if self.is_win() => 'W',
            Tile::Terminal(_) => 'L',
            Tile::Player => 'P',
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Placement {
    pub coord: Coord,
    pub tile: Tile,
}

impl Placement {
    pub fn obstacle(x: i32, y: i32) -> Self {
        Self { coord: Coord::new(x, y), tile: Tile::Obstacle }
    }

    pub fn reward(x: i32, y: i32, value: f64) -> Self {
        Self { coord: Coord::new(x, y), tile: Tile::Reward(value) }
    }

    pub fn terminal(x: i32, y: i32, value: f64) -> Self {
        Self { coord: Coord::new(x, y), tile: Tile::Terminal(value) }
    }
}

/// Fixed initial arrangement of a grid, regenerated on every reset.
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    pub size_x: usize,
    pub size_y: usize,
    pub start: Coord,
    pub placements: Vec<Placement>,
}

impl Layout {
    pub fn new(size_x: usize, size_y: usize, start: Coord) -> Self {
        Self {
            size_x,
            size_y,
            start,
            placements: Vec::new(),
        }
    }

    pub fn with(mut self, placement: Placement) -> Self {
        self.placements.push(placement);
        self
    }

    fn contains(&self, coord: Coord) -> bool {
        coord.x >= 0
            && coord.y >= 0
            && (coord.x as usize) < self.size_x
            && (coord.y as usize) < self.size_y
    }

    fn validate(&self) -> Result<()> {
        if self.size_x == 0 || self.size_y == 0 {
            return Err(Error::InvalidLayout {
                message: format!("grid size {}x{} must be positive", self.size_x, self.size_y),
            });
        }
        if self.size_x > i32::MAX as usize || self.size_y > i32::MAX as usize {
            return Err(Error::InvalidLayout {
                message: format!("grid size {}x{} is too large", self.size_x, self.size_y),
            });
        }
        if !self.contains(self.start) {
            return Err(Error::InvalidLayout {
                message: format!("start {} is outside the grid", self.start),
            });
        }
        for (i, placement) in self.placements.iter().enumerate() {
            if !self.contains(placement.coord) {
                return Err(Error::InvalidLayout {
                    message: format!("placement at {} is outside the grid", placement.coord),
                });
            }
            if placement.coord == self.start {
                return Err(Error::InvalidLayout {
                    message: format!("placement at {} overlaps the start", placement.coord),
                });
            }
            if matches!(placement.tile, Tile::Empty | Tile::Player) {
                return Err(Error::InvalidLayout {
                    message: format!("placement at {} must be an obstacle, reward or terminal", placement.coord),
                });
            }
            if self.placements[..i].iter().any(|p| p.coord == placement.coord) {
                return Err(Error::InvalidLayout {
                    message: format!("duplicate placement at {}", placement.coord),
                });
            }
        }
        Ok(())
    }
}

impl Default for Layout {
    fn default() -> Self {
        Layout::new(10, 10, Coord::new(0, 0))
            .with(Placement::obstacle(2, 3))
            .with(Placement::obstacle(3, 3))
            .with(Placement::obstacle(4, 3))
            .with(Placement::obstacle(6, 6))
            .with(Placement::obstacle(6, 7))
            .with(Placement::obstacle(7, 6))
            .with(Placement::reward(8, 1, 5.0))
            .with(Placement::reward(1, 8, 5.0))
            .with(Placement::reward(5, 5, 10.0))
            .with(Placement::terminal(9, 9, 100.0))
            .with(Placement::terminal(4, 4, -100.0))
            .with(Placement::terminal(7, 2, -100.0))
    }
}

/// Outcome of a single successful move.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Transition {
    pub from: Coord,
    pub action: Action,
    pub to: Coord,
    /// What the target cell held before the player stepped on it.
    pub entered: Tile,
    /// Score change produced by this move, step cost included.
    pub reward: f64,
    pub game_over: bool,
}

pub struct Grid {
    tiles: Array2<Tile>,
    layout: Layout,
    player: Player,
    game_over: bool,
}

impl Grid {
    pub fn new(layout: Layout) -> Result<Self> {
        layout.validate()?;
        let mut grid = Self {
            tiles: Array2::default((layout.size_x, layout.size_y)),
            player: Player::new(layout.start),
            layout,
            game_over: false,
        };
        grid.reset()?;

        let start = grid.layout.start;
        if grid.legal_actions(start).is_empty() {
            return Err(Error::InvalidLayout {
                message: format!("start {} has no legal move", start),
            });
        }
        Ok(grid)
    }

    pub fn size(&self) -> (usize, usize) {
        (self.layout.size_x, self.layout.size_y)
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn position(&self) -> Coord {
        self.player.pos
    }

    pub fn score(&self) -> f64 {
        self.player.score
    }

    pub fn is_game_over(&self) -> bool {
        self.game_over
    }

    fn index(&self, coord: Coord) -> Result<[usize; 2]> {
        if self.layout.contains(coord) {
            Ok([coord.x as usize, coord.y as usize])
        } else {
            Err(Error::OutOfBounds {
                coord,
                size_x: self.layout.size_x,
                size_y: self.layout.size_y,
            })
        }
    }

    pub fn tile(&self, coord: Coord) -> Result<Tile> {
        Ok(self.tiles[self.index(coord)?])
    }

    pub fn is_obstacle(&self, coord: Coord) -> Result<bool> {
        Ok(matches!(self.tile(coord)?, Tile::Obstacle))
    }

    pub fn is_reward(&self, coord: Coord) -> Result<bool> {
        Ok(matches!(self.tile(coord)?, Tile::Reward(_)))
    }

    pub fn is_terminal(&self, coord: Coord) -> Result<bool> {
        Ok(matches!(self.tile(coord)?, Tile::Terminal(_)))
    }

    /// False when `coord` is off the grid or holds an obstacle.
    pub fn is_valid_tile(&self, coord: Coord) -> bool {
        match self.tile(coord) {
            Ok(tile) => tile != Tile::Obstacle,
            Err(_) => false,
        }
    }

    pub fn legal_actions(&self, coord: Coord) -> Vec<Action> {
        Action::ALL
            .iter()
            .copied()
            .filter(|a| self.is_valid_tile(coord.shift(*a)))
            .collect()
    }

    /// Moves the player one step. The grid is left untouched when the move is
    /// rejected.
    pub fn r#move(&mut self, action: Action) -> Result<Transition> {
        if self.game_over {
            return Err(Error::GameOver);
        }
        let from = self.player.pos;
        let target = from.shift(action);
        if !self.is_valid_tile(target) {
            return Err(Error::InvalidMove { from, action, target });
        }
        let from_idx = self.index(from)?;
        let target_idx = self.index(target)?;

        let entered = self.tiles[target_idx];
        let mut reward = entered.bonus();
        if let Tile::Terminal(_) = entered {
            self.game_over = true;
        }

        self.tiles[from_idx] = Tile::Empty;
        self.tiles[target_idx] = Tile::Player;
        reward -= STEP_COST;
        self.player.advance(target, action, reward);

        trace!("{:?}: {} -> {} ({:?}) reward {}", action, from, target, entered, reward);

        Ok(Transition {
            from,
            action,
            to: target,
            entered,
            reward,
            game_over: self.game_over,
        })
    }

    pub fn reset(&mut self) -> Result<()> {
        let start = self.layout.start;
        self.reset_with_start(start)
    }

    /// Restores the configured layout and puts the player on `start`.
    pub fn reset_with_start(&mut self, start: Coord) -> Result<()> {
        let start_idx = self.index(start)?;
        if self.layout.placements.iter().any(|p| p.coord == start && p.tile == Tile::Obstacle) {
            return Err(Error::InvalidLayout {
                message: format!("start {} is an obstacle", start),
            });
        }

        self.tiles.fill(Tile::Empty);
        for placement in &self.layout.placements {
            let idx = self.index(placement.coord)?;
            self.tiles[idx] = placement.tile;
        }
        self.tiles[start_idx] = Tile::Player;
        self.player = Player::new(start);
        self.game_over = false;
        Ok(())
    }

    pub fn coords(&self) -> GridIter {
        GridIter::new(self.layout.size_x, self.layout.size_y)
    }
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for y in (0..self.layout.size_y).rev() {
            for x in 0..self.layout.size_x {
                write!(f, "{}", self.tiles[[x, y]].symbol())?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Walks every coordinate, `x` outer and `y` inner.
pub struct GridIter {
    currx: usize,
    curry: usize,
    size_x: usize,
    size_y: usize,
}

impl GridIter {
    fn new(size_x: usize, size_y: usize) -> GridIter {
        GridIter {
            currx: 0,
            curry: 0,
            size_x,
            size_y,
        }
    }
}

impl Iterator for GridIter {
    type Item = Coord;

    fn next(&mut self) -> Option<Coord> {
        if self.currx >= self.size_x || self.size_y == 0 {
            return None;
        }
        let coord = Coord::new(self.currx as i32, self.curry as i32);
        self.curry += 1;
        if self.curry == self.size_y {
            self.curry = 0;
            self.currx += 1;
        }
        Some(coord)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{} != {}", a, b);
    }

    fn open_grid(start: Coord, placements: &[Placement]) -> Grid {
        let mut layout = Layout::new(10, 10, start);
        layout.placements.extend_from_slice(placements);
        Grid::new(layout).unwrap()
    }

    #[test]
    fn obstacle_blocks_only_its_own_tile() {
        let grid = open_grid(Coord::new(0, 0), &[Placement::obstacle(2, 3)]);
        assert!(!grid.is_valid_tile(Coord::new(2, 3)));
        assert!(grid.is_valid_tile(Coord::new(2, 4)));
    }

    #[test]
    fn validity_matches_classification_everywhere() {
        let grid = Grid::new(Layout::default()).unwrap();
        for coord in grid.coords() {
            assert_eq!(grid.is_valid_tile(coord), !grid.is_obstacle(coord).unwrap());
        }
        assert_eq!(grid.coords().count(), 100);
    }

    #[test]
    fn off_grid_is_invalid_and_classification_fails() {
        let grid = Grid::new(Layout::default()).unwrap();
        for coord in [Coord::new(-1, 0), Coord::new(0, -1), Coord::new(10, 0), Coord::new(0, 10)] {
            assert!(!grid.is_valid_tile(coord));
            assert!(matches!(grid.is_obstacle(coord), Err(Error::OutOfBounds { .. })));
            assert!(matches!(grid.is_reward(coord), Err(Error::OutOfBounds { .. })));
            assert!(matches!(grid.is_terminal(coord), Err(Error::OutOfBounds { .. })));
        }
    }

    #[test]
    fn east_and_west_are_mirrored() {
        let c = Coord::new(5, 5);
        assert_eq!(c.shift(Action::North), Coord::new(5, 6));
        assert_eq!(c.shift(Action::South), Coord::new(5, 4));
        assert_eq!(c.shift(Action::East), Coord::new(4, 5));
        assert_eq!(c.shift(Action::West), Coord::new(6, 5));
    }

    #[test]
    fn shift_saturates_at_the_limits() {
        assert_eq!(Coord::new(i32::MAX, 0).shift(Action::West), Coord::new(i32::MAX, 0));
        assert_eq!(Coord::new(0, i32::MIN).shift(Action::South), Coord::new(0, i32::MIN));
        let grid = Grid::new(Layout::default()).unwrap();
        assert!(!grid.is_valid_tile(Coord::new(i32::MAX, 0).shift(Action::West)));
    }

    #[test]
    fn reward_is_collected_once() {
        let mut grid = open_grid(Coord::new(8, 0), &[Placement::reward(8, 1, 5.0)]);
        let t = grid.r#move(Action::North).unwrap();
        assert_eq!(t.to, Coord::new(8, 1));
        assert_close(t.reward, 4.9);
        assert!(!grid.is_reward(Coord::new(8, 1)).unwrap());
        assert_eq!(grid.tile(Coord::new(8, 1)).unwrap(), Tile::Player);
        assert_eq!(grid.tile(Coord::new(8, 0)).unwrap(), Tile::Empty);

        let back = grid.r#move(Action::South).unwrap();
        assert_close(back.reward, -STEP_COST);
        let again = grid.r#move(Action::North).unwrap();
        assert_close(again.reward, -STEP_COST);
        assert_close(grid.score(), 4.9 - 0.2);
    }

    #[test]
    fn terminal_ends_the_episode() {
        let mut grid = open_grid(Coord::new(3, 3), &[Placement::terminal(3, 4, -20.0)]);
        let t = grid.r#move(Action::North).unwrap();
        assert_close(t.reward, -20.1);
        assert_close(grid.score(), -20.1);
        assert!(t.game_over);
        assert!(grid.is_game_over());
        assert!(!grid.is_terminal(Coord::new(3, 4)).unwrap());
        assert!(matches!(grid.r#move(Action::South), Err(Error::GameOver)));
        assert_eq!(grid.position(), Coord::new(3, 4));
    }

    #[test]
    fn rejected_move_leaves_grid_untouched() {
        let mut grid = open_grid(Coord::new(0, 0), &[Placement::obstacle(0, 1)]);
        assert!(matches!(grid.r#move(Action::North), Err(Error::InvalidMove { .. })));
        assert!(matches!(grid.r#move(Action::South), Err(Error::InvalidMove { .. })));
        assert!(matches!(grid.r#move(Action::East), Err(Error::InvalidMove { .. })));
        assert_eq!(grid.position(), Coord::new(0, 0));
        assert_eq!(grid.score(), 0.0);
        assert_eq!(grid.tile(Coord::new(0, 0)).unwrap(), Tile::Player);
        assert_eq!(grid.legal_actions(Coord::new(0, 0)), vec![Action::West]);
    }

    #[test]
    fn move_is_deterministic() {
        let layout = Layout::default();
        let mut a = Grid::new(layout.clone()).unwrap();
        let mut b = Grid::new(layout).unwrap();
        for action in [Action::North, Action::West, Action::West, Action::South] {
            assert_eq!(a.r#move(action).unwrap(), b.r#move(action).unwrap());
        }
    }

    #[test]
    fn exactly_one_player_cell() {
        let mut grid = Grid::new(Layout::default()).unwrap();
        for action in [Action::North, Action::North, Action::West, Action::South] {
            grid.r#move(action).unwrap();
            let players = grid
                .coords()
                .filter(|c| grid.tile(*c).unwrap() == Tile::Player)
                .count();
            assert_eq!(players, 1);
        }
    }

    #[test]
    fn reset_restores_layout() {
        let mut grid = open_grid(
            Coord::new(8, 0),
            &[Placement::reward(8, 1, 5.0), Placement::terminal(8, 2, 100.0), Placement::obstacle(2, 3)],
        );
        grid.r#move(Action::North).unwrap();
        grid.r#move(Action::North).unwrap();
        assert!(grid.is_game_over());

        grid.reset().unwrap();
        assert!(!grid.is_game_over());
        assert_eq!(grid.position(), Coord::new(8, 0));
        assert_eq!(grid.score(), 0.0);
        assert!(grid.is_reward(Coord::new(8, 1)).unwrap());
        assert!(grid.is_terminal(Coord::new(8, 2)).unwrap());
        assert!(grid.is_obstacle(Coord::new(2, 3)).unwrap());
    }

    #[test]
    fn reset_with_start_rejects_obstacles() {
        let mut grid = open_grid(Coord::new(0, 0), &[Placement::obstacle(2, 3)]);
        assert!(grid.reset_with_start(Coord::new(2, 3)).is_err());
        assert!(grid.reset_with_start(Coord::new(20, 3)).is_err());
        grid.reset_with_start(Coord::new(5, 5)).unwrap();
        assert_eq!(grid.position(), Coord::new(5, 5));
        assert_eq!(grid.tile(Coord::new(0, 0)).unwrap(), Tile::Empty);
    }

    #[test]
    fn layout_validation() {
        let start = Coord::new(0, 0);
        assert!(Grid::new(Layout::new(0, 4, start)).is_err());
        assert!(Grid::new(Layout::new(4, 4, Coord::new(4, 0))).is_err());
        assert!(Grid::new(Layout::new(4, 4, start).with(Placement::obstacle(0, 0))).is_err());
        assert!(Grid::new(Layout::new(4, 4, start).with(Placement::obstacle(9, 0))).is_err());
        assert!(Grid::new(
            Layout::new(4, 4, start)
                .with(Placement::obstacle(1, 1))
                .with(Placement::reward(1, 1, 1.0))
        )
        .is_err());
        // boxed in
        assert!(matches!(
            Grid::new(
                Layout::new(4, 4, start)
                    .with(Placement::obstacle(1, 0))
                    .with(Placement::obstacle(0, 1))
            ),
            Err(Error::InvalidLayout { .. })
        ));
    }

    #[test]
    fn win_and_loss_terminals() {
        assert!(Tile::Terminal(100.0).is_win());
        assert!(Tile::Terminal(-100.0).is_loss());
        assert!(!Tile::Reward(5.0).is_win());
        assert_eq!(Tile::Reward(5.0).bonus(), 5.0);
        assert_eq!(Tile::Obstacle.bonus(), 0.0);
    }

    #[test]
    fn display_puts_highest_row_first() {
        let grid = Grid::new(
            Layout::new(3, 2, Coord::new(0, 0))
                .with(Placement::obstacle(1, 0))
                .with(Placement::terminal(2, 1, 1.0)),
        )
        .unwrap();
        assert_eq!(grid.to_string(), "..W\nP#.\n");
    }
}
