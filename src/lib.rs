pub mod clock;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod events;
pub mod paths;
pub mod progress;
pub mod services;
pub mod session;
pub mod srs;

#[cfg(test)]
pub mod testing;

pub use error::{Error, Result};
