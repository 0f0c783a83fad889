//! Customer-service agent and its prompt and streaming helpers

pub mod customer_service;
pub mod prompt;
pub mod streaming;

pub use customer_service::CustomerServiceAgent;
pub use prompt::build_system_prompt;
pub use streaming::{StreamFragment, chunk_text};
