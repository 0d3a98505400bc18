//! Shared configuration, error handling and telemetry for Gigboard
//!
//! This crate provides common functionality used across the workspace:
//! - Configuration management following 12-factor principles
//! - The error taxonomy shared by the messaging core
//! - State machine errors
//! - tracing subscriber setup

pub mod config;
pub mod error;
pub mod state;
pub mod telemetry;

pub use config::Config;
pub use error::{Error, Result};
pub use state::StateError;
