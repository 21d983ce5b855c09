//! Opportunity movement across a pipeline's stages and the board view.

pub mod board;
pub mod transition;

pub use board::{Board, BoardColumn, BoardFilter, build_board};
pub use transition::{MoveRequest, Transition, TransitionError, move_opportunity, set_archived};
