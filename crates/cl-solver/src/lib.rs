pub mod algorithm;
pub mod config;
pub mod errors;
pub mod events;
pub mod judge;
pub mod market;
pub mod pool;
pub mod schedule;
pub mod scoreboard;
pub mod solver;
pub mod stopper;

#[cfg(test)]
mod testing;

pub use algorithm::*;
pub use config::*;
pub use errors::*;
pub use events::*;
pub use judge::*;
pub use market::*;
pub use pool::*;
pub use schedule::*;
pub use scoreboard::*;
pub use solver::*;
pub use stopper::*;
