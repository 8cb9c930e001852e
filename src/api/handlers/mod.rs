//! Request handlers for the scoring API.

mod batch;
mod generate;
mod health;
mod predict;

pub use batch::*;
pub use generate::*;
pub use health::*;
pub use predict::*;
