//! Common constants used across Concierge

/// Default model identifier
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Default API endpoint base
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Default sampling temperature
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

/// Maximum number of model turns spent on tool calls for one message
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 10;

/// Approximate size of one streamed response fragment, in characters
pub const DEFAULT_STREAM_CHUNK_CHARS: usize = 24;

/// Use-case applied when none is configured
pub const DEFAULT_USE_CASE: &str = "support";

/// Session used by callers that do not name one
pub const DEFAULT_SESSION_ID: &str = "default";

/// Name under which the knowledge base is offered to the model
pub const KNOWLEDGE_BASE_TOOL: &str = "query_knowledge_base";

/// Built-in use-cases and their tone descriptions
pub mod tones {
    pub const SUPPORT: (&str, &str) = ("support", "professional and helpful");
    pub const SALES: (&str, &str) = ("sales", "enthusiastic and persuasive");
    pub const THERAPY: (&str, &str) = ("therapy", "empathetic and understanding");
}

/// Default timeout values in seconds
pub mod timeouts {
    pub const DEFAULT_LLM_TIMEOUT: u64 = 120;
}

/// Session store defaults
pub mod sessions {
    pub const DEFAULT_MAX_SESSIONS: usize = 1024;
    pub const DEFAULT_IDLE_TTL_SECS: i64 = 60 * 60;
}
