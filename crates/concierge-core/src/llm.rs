//! LLM service for the customer-service agent
//!
//! [`AiService`] is the seam between the agent and a language model: it takes
//! the conversation so far plus the available tools and returns one
//! [`ModelTurn`], either final text or a batch of tool calls. [`LLMService`]
//! implements it on top of `genai`; tests script it with mocks.

use crate::tools::ToolSpec;
use anyhow::{Error, anyhow};
use async_trait::async_trait;
use concierge_common::{AgentConfig, DEFAULT_API_BASE, truncate_string};
use genai::Client as GenaiClient;
use genai::chat::{
    ChatMessage as GenaiChatMessage, ChatOptions, ChatRequest, ContentPart, MessageContent, Tool,
    ToolCall as GenaiToolCall, ToolResponse as GenaiToolResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

/// Internal representation of a chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InternalChatMessage {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        content: String,
    },
    /// The assistant turn that requested tools
    ToolCalls {
        calls: Vec<ToolCall>,
    },
    /// The result of one requested tool, answering `call_id`
    Tool {
        tool_name: String,
        content: String,
        call_id: String,
    },
}

impl InternalChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::System {
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant {
            content: content.into(),
        }
    }

    pub fn tool_calls(calls: Vec<ToolCall>) -> Self {
        Self::ToolCalls { calls }
    }

    pub fn tool(
        tool_name: impl Into<String>,
        content: impl Into<String>,
        call_id: impl Into<String>,
    ) -> Self {
        Self::Tool {
            tool_name: tool_name.into(),
            content: content.into(),
            call_id: call_id.into(),
        }
    }

    pub fn to_genai(&self) -> GenaiChatMessage {
        match self {
            InternalChatMessage::System { content } => GenaiChatMessage::system(content),
            InternalChatMessage::User { content } => GenaiChatMessage::user(content),
            InternalChatMessage::Assistant { content } => GenaiChatMessage::assistant(content),
            InternalChatMessage::ToolCalls { calls } => {
                GenaiChatMessage::from(calls.iter().map(GenaiToolCall::from).collect::<Vec<_>>())
            }
            InternalChatMessage::Tool {
                content, call_id, ..
            } => GenaiChatMessage::from(GenaiToolResponse::new(call_id.clone(), content.clone())),
        }
    }
}

/// A tool call requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Name of the tool to call
    pub tool_name: String,

    /// Arguments for the tool call as JSON
    pub tool_args: Value,

    /// Call ID for this tool call
    pub call_id: String,
}

impl From<GenaiToolCall> for ToolCall {
    fn from(call: GenaiToolCall) -> Self {
        Self {
            tool_name: call.fn_name,
            tool_args: call.fn_arguments,
            call_id: call.call_id,
        }
    }
}

impl From<&ToolCall> for GenaiToolCall {
    fn from(call: &ToolCall) -> Self {
        Self {
            call_id: call.call_id.clone(),
            fn_name: call.tool_name.clone(),
            fn_arguments: call.tool_args.clone(),
        }
    }
}

/// One reply from the model
#[derive(Debug, Clone, PartialEq)]
pub enum ModelTurn {
    /// Final text answer
    Text(String),
    /// The model wants these tools run before it answers
    ToolCalls(Vec<ToolCall>),
}

/// A trait for AI services that can generate responses
#[async_trait]
pub trait AiService: Send + Sync {
    /// Generate the next turn of a conversation
    async fn generate_response(
        &self,
        messages: &[InternalChatMessage],
        tools: &[ToolSpec],
    ) -> anyhow::Result<ModelTurn>;
}

/// `genai`-backed model client
pub struct LLMService {
    /// Model identifier handed to `genai`
    model: String,

    /// Underlying client for the LLM
    client: GenaiClient,

    /// Log prompts and replies at info level
    verbose: bool,
}

impl LLMService {
    /// Create a service from the agent configuration
    ///
    /// The endpoint and credential are only overridden when they differ from
    /// what `genai` resolves from the model name and environment on its own.
    pub fn from_config(config: &AgentConfig) -> Result<Self, Error> {
        let options = ChatOptions {
            temperature: Some(config.temperature()),
            max_tokens: config.max_tokens(),
            capture_usage: Some(true),
            ..Default::default()
        };
        let mut builder = GenaiClient::builder().with_chat_options(options);

        if config.has_credential() || config.api_base() != DEFAULT_API_BASE {
            let endpoint = with_trailing_slash(config.api_base());
            let api_key = config.api_key().to_string();
            builder = builder.with_service_target_resolver_fn(move |mut t: genai::ServiceTarget| {
                t.endpoint = genai::resolver::Endpoint::from_owned(endpoint.clone());
                if !api_key.is_empty() {
                    t.auth = genai::resolver::AuthData::from_single(api_key.clone());
                }
                Ok(t)
            });
        }

        if config.cache() {
            debug!("Response caching requested; model replies are not cached by this service");
        }

        Ok(Self {
            model: config.model_name().to_string(),
            client: builder.build(),
            verbose: config.verbose(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn genai_tools(tools: &[ToolSpec]) -> Vec<Tool> {
        tools
            .iter()
            .map(|tool| {
                Tool::new(tool.name.clone())
                    .with_description(tool.description.clone())
                    .with_schema(tool.schema.clone())
            })
            .collect()
    }

    fn trace(&self, label: &str, text: &str) {
        if self.verbose {
            info!("{}: {}", label, text);
        } else {
            debug!("{}: {}", label, truncate_string(text, 500));
        }
    }
}

#[async_trait]
impl AiService for LLMService {
    async fn generate_response(
        &self,
        messages: &[InternalChatMessage],
        tools: &[ToolSpec],
    ) -> anyhow::Result<ModelTurn> {
        debug!(
            "Generating response for {} messages with {} tools",
            messages.len(),
            tools.len()
        );
        if let Some(InternalChatMessage::User { content }) = messages
            .iter()
            .rev()
            .find(|m| matches!(m, InternalChatMessage::User { .. }))
        {
            self.trace("Prompt", content);
        }

        let genai_messages: Vec<GenaiChatMessage> =
            messages.iter().map(|msg| msg.to_genai()).collect();
        let mut chat_req = ChatRequest::new(genai_messages);
        if !tools.is_empty() {
            chat_req = chat_req.with_tools(Self::genai_tools(tools));
        }

        let response = self
            .client
            .exec_chat(&self.model, chat_req, None)
            .await
            .map_err(|e| anyhow!("GenAI API error: {}", e))?;

        let turn = turn_from_contents(response.content)?;
        match &turn {
            ModelTurn::Text(text) => self.trace("Reply", text),
            ModelTurn::ToolCalls(calls) => {
                for call in calls {
                    debug!(
                        "Model requested tool '{}' (id '{}') with {}",
                        call.tool_name, call.call_id, call.tool_args
                    );
                }
            }
        }
        Ok(turn)
    }
}

/// Map the content items of one model reply to a turn
///
/// Providers may send a text preamble alongside tool calls; any tool call
/// makes the turn a tool turn and the preamble is dropped.
fn turn_from_contents(contents: Vec<MessageContent>) -> anyhow::Result<ModelTurn> {
    if contents.is_empty() {
        return Err(anyhow!("No content in chat response"));
    }

    let mut calls = Vec::new();
    let mut text = String::new();
    let mut responses = 0;
    for content in contents {
        match content {
            MessageContent::Text(part) => text.push_str(&part),
            MessageContent::Parts(parts) => {
                for part in parts {
                    if let ContentPart::Text(part) = part {
                        text.push_str(&part);
                    }
                }
            }
            MessageContent::ToolCalls(batch) => {
                calls.extend(batch.into_iter().map(ToolCall::from));
            }
            MessageContent::ToolResponses(batch) => responses += batch.len(),
        }
    }

    if !calls.is_empty() {
        return Ok(ModelTurn::ToolCalls(calls));
    }
    if !text.is_empty() {
        return Ok(ModelTurn::Text(text));
    }
    if responses > 0 {
        return Err(anyhow!(
            "Unexpected tool responses ({}) in model reply",
            responses
        ));
    }
    Err(anyhow!("Model reply contains no text parts"))
}

fn with_trailing_slash(endpoint: &str) -> String {
    if endpoint.ends_with('/') {
        endpoint.to_string()
    } else {
        format!("{}/", endpoint)
    }
}
