pub mod config;
pub mod contracts;
pub mod errors;
pub mod models;
pub mod providers;
pub mod services;
pub mod utils;

#[cfg(test)]
mod testing;

pub use errors::{FundingError, Result, TxFailure};
