use crate::environment::{Action, Coord};

/// Where the player stands and what it has collected so far in the current
/// episode.
#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub pos: Coord,
    pub score: f64,
    /// Last direction moved. Only meaningful to whoever draws the player.
    pub facing: Action,
}

impl Player {
    pub fn new(start: Coord) -> Self {
        Self {
            pos: start,
            score: 0.0,
            facing: Action::West,
        }
    }

    pub(crate) fn advance(&mut self, to: Coord, action: Action, reward: f64) {
        self.pos = to;
        self.facing = action;
        self.score += reward;
    }
}
