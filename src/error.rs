use thiserror::Error;

use crate::environment::{Action, Coord};

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("coordinate {coord} is outside the {size_x}x{size_y} grid")]
    OutOfBounds {
        coord: Coord,
        size_x: usize,
        size_y: usize,
    },

    #[error("invalid move {action:?} from {from}: target {target} is blocked or off the grid")]
    InvalidMove {
        from: Coord,
        action: Action,
        target: Coord,
    },

    #[error("episode is over, reset the grid before moving")]
    GameOver,

    #[error("no legal action from {position}")]
    NoLegalAction { position: Coord },

    #[error("policy has no action for {position}")]
    MissingPolicyEntry { position: Coord },

    #[error("invalid layout: {message}")]
    InvalidLayout { message: String },

    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
