//! Shared types and configuration for Tally.
//!
//! This crate provides common types used across all other crates:
//! - Session tokens for tracking background sync and import runs
//! - Configuration management

pub mod config;
pub mod types;

pub use config::AppConfig;
pub use types::SessionToken;
