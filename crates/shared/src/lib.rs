//! Shared configuration and telemetry setup for Sprout.
//!
//! This crate provides what every Sprout binary needs before it touches the
//! database:
//! - Layered configuration (files, then `SPROUT__*` environment variables)
//! - Tracing subscriber installation

pub mod config;
pub mod telemetry;

pub use config::{AppConfig, DatabaseConfig, LogFormat, LoggingConfig, PathsConfig};
