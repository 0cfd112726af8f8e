//! Shared configuration, errors, and domain types for the Xodiac client.

pub mod config;
pub mod error;
pub mod types;

pub use config::XodiacConfig;
pub use error::{Result, XodiacError};
pub use types::*;
