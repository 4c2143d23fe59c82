pub mod errors;
pub mod hint;
pub mod objective;
pub mod problem;
pub mod trial;
pub mod variable;

pub use errors::*;
pub use hint::*;
pub use objective::*;
pub use problem::*;
pub use trial::*;
pub use variable::*;
