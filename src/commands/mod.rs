//! Command implementations for the CLI
//!
//! This module contains the implementation of all CLI commands:
//! - start: Start the pricing engine server
//! - config: Configuration display and validation

pub mod config;
pub mod start;
