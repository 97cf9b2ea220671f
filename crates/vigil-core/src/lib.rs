//! # vigil-core
//!
//! Core errors and utilities shared by the Vigil crates.
//!
//! - [`VigilError`] - error type for channel, logger, config and cluster failures
//! - [`logging`] - tracing setup
//! - [`paths`] - per-user file locations under `~/.vigil/`

pub mod error;
pub mod logging;
pub mod paths;

pub use error::{Result, VigilError};
pub use logging::{LogGuard, init_logging};
