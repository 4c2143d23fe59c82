pub mod grid;
pub mod perturbation;
pub mod random;

#[cfg(test)]
mod testing;

pub use grid::*;
pub use perturbation::*;
pub use random::*;
