pub mod distribution;
pub mod pool;
pub mod token;

pub use distribution::*;
pub use pool::*;
pub use token::*;
