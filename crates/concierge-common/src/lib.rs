//! Concierge Common - Shared utilities and types
//!
//! This crate provides the error taxonomy, agent configuration, constants
//! and utility functions used across all Concierge components.

pub mod config;
pub mod constants;
pub mod error;
pub mod utils;

// Re-export commonly used items
pub use config::{AgentConfig, AgentConfigBuilder, HistoryPolicy, KnowledgeBaseConfig};
pub use constants::*;
pub use error::{ConciergeError, Result};
pub use utils::*;
