//! Concierge Core - message-handling pipeline for a customer-service responder
//!
//! This crate provides:
//! - A static knowledge base with keyword lookup, exposed to the model as a tool
//! - Per-conversation context: use-case, tone preferences and history
//! - Task construction and structured-output validation
//! - The customer-service agent and per-session agent store

pub mod agents;
pub mod context;
pub mod knowledge;
pub mod llm;
pub mod sessions;
pub mod task;
pub mod tools;

// Re-export key types for convenience
pub use agents::{CustomerServiceAgent, StreamFragment};
pub use context::{CustomerContext, HistoryEntry, ToneBook};
pub use knowledge::{DocumentFormat, FactTable, KnowledgeBase, KnowledgeQueryResult};
pub use llm::{AiService, InternalChatMessage, LLMService, ModelTurn, ToolCall};
pub use sessions::SessionStore;
pub use task::{OutputSchema, StructuredOutput, Task, TaskBuilder, extract_structured_output};
pub use tools::{AiTool, QueryKnowledgeBaseTool, ToolRegistry, ToolSpec};
