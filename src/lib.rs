pub mod config;
pub mod engines;
pub mod error;
pub mod hyperparams;
pub mod models;

pub use error::{PbtError, Result};
