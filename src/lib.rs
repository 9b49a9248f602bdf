//! Semantic call-graph engine over normalized front-end records.

pub mod cli;
pub mod config;
pub mod core;
pub mod error;

pub use config::Config;
pub use error::{DigestError, Result};
