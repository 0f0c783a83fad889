//! Customer-service agent
//!
//! Pipeline per message: record it in the history, build the task, run the
//! model with the knowledge-base tool until it answers, then extract and
//! validate the structured reply.

use crate::agents::prompt::build_system_prompt;
use crate::agents::streaming::{StreamFragment, fragment_stream};
use crate::context::{CustomerContext, HistoryEntry};
use crate::llm::{AiService, InternalChatMessage, ModelTurn, ToolCall};
use crate::task::{OutputSchema, StructuredOutput, Task, TaskBuilder, extract_structured_output};
use crate::tools::{AiTool, QueryKnowledgeBaseTool, ToolRegistry};
use concierge_common::{AgentConfig, ConciergeError, Result, truncate_string};
use futures::StreamExt;
use futures::stream::BoxStream;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Answers customer messages for one conversation
pub struct CustomerServiceAgent {
    config: Arc<AgentConfig>,
    context: RwLock<CustomerContext>,
    llm: Arc<dyn AiService>,
    tools: ToolRegistry,
    task_builder: TaskBuilder,
    system_prompt: String,
}

impl CustomerServiceAgent {
    /// Create an agent over an existing context
    ///
    /// The context's knowledge base is offered to the model as the
    /// `query_knowledge_base` tool, and the configured retention policy
    /// replaces the context's own.
    pub fn new(
        config: Arc<AgentConfig>,
        context: CustomerContext,
        llm: Arc<dyn AiService>,
    ) -> Result<Self> {
        let context = context.with_retention(config.history());

        let mut tools = ToolRegistry::new();
        tools
            .register(Arc::new(QueryKnowledgeBaseTool::new(
                context.knowledge_base().clone(),
            )))
            .map_err(|e| ConciergeError::Configuration(e.to_string()))?;

        let system_prompt =
            build_system_prompt(context.use_case(), &tools, &OutputSchema::customer_service());
        let task_builder = TaskBuilder::new().with_history(config.include_history_in_prompt());

        debug!(
            "Created customer service agent for use-case {} with model {}",
            context.use_case(),
            config.model_name()
        );

        Ok(Self {
            config,
            context: RwLock::new(context),
            llm,
            tools,
            task_builder,
            system_prompt,
        })
    }

    /// Offer an additional tool to the model
    pub fn register_tool(&mut self, tool: Arc<dyn AiTool>) -> Result<()> {
        self.tools
            .register(tool)
            .map_err(|e| ConciergeError::Configuration(e.to_string()))?;
        self.system_prompt = build_system_prompt(
            self.context.get_mut().use_case(),
            &self.tools,
            &OutputSchema::customer_service(),
        );
        Ok(())
    }

    /// Handle one customer message and return the validated reply
    ///
    /// The message is recorded before the model runs, so it stays in the
    /// history even when the call fails.
    pub async fn handle_message(&self, message: &str) -> Result<StructuredOutput> {
        let started = Instant::now();

        let task = {
            let mut context = self.context.write().await;
            context.record(message);
            self.task_builder.build(message, &context)?
        };
        debug!("Built task for message: {}", truncate_string(message, 80));

        let reply = self.run_model(&task).await?;
        let output = extract_structured_output(&reply, &task.expected_output)?;

        info!(
            intent = %output.intent,
            sentiment = %output.sentiment,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Handled customer message"
        );
        Ok(output)
    }

    /// Handle a message and deliver the reply in fragments
    ///
    /// Runs the whole pipeline first; any failure is returned before a single
    /// fragment is produced.
    pub async fn handle_message_stream(
        &self,
        message: &str,
    ) -> Result<BoxStream<'static, StreamFragment>> {
        let output = self.handle_message(message).await?;
        Ok(fragment_stream(output, self.config.stream_chunk_chars()).boxed())
    }

    /// Snapshot of the conversation history
    pub async fn history(&self) -> Vec<HistoryEntry> {
        self.context.read().await.history().to_vec()
    }

    pub async fn use_case(&self) -> String {
        self.context.read().await.use_case().to_string()
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    async fn run_model(&self, task: &Task) -> Result<String> {
        match self.config.model_timeout() {
            Some(limit) => tokio::time::timeout(limit, self.tool_loop(task))
                .await
                .map_err(|_| {
                    ConciergeError::ModelInvocation(format!(
                        "model did not answer within {}s",
                        limit.as_secs_f64()
                    ))
                })?,
            None => self.tool_loop(task).await,
        }
    }

    async fn tool_loop(&self, task: &Task) -> Result<String> {
        let specs = self.tools.specs();
        let mut messages = vec![
            InternalChatMessage::system(self.system_prompt.clone()),
            InternalChatMessage::user(task.instruction.clone()),
        ];
        let max_rounds = self.config.max_tool_rounds();
        let mut rounds = 0;

        loop {
            let turn = self
                .llm
                .generate_response(&messages, &specs)
                .await
                .map_err(|e| ConciergeError::ModelInvocation(e.to_string()))?;

            let calls = match turn {
                ModelTurn::Text(text) => return Ok(text),
                ModelTurn::ToolCalls(calls) if calls.is_empty() => {
                    return Err(ConciergeError::ModelInvocation(
                        "model returned an empty tool call batch".to_string(),
                    ));
                }
                ModelTurn::ToolCalls(calls) => calls,
            };

            rounds += 1;
            if rounds > max_rounds {
                return Err(ConciergeError::ModelInvocation(format!(
                    "model kept calling tools after {} rounds",
                    max_rounds
                )));
            }
            debug!("Tool round {} with {} calls", rounds, calls.len());

            messages.push(InternalChatMessage::tool_calls(calls.clone()));
            for call in &calls {
                let content = self.execute_tool(call).await?;
                messages.push(InternalChatMessage::tool(
                    call.tool_name.clone(),
                    content,
                    call.call_id.clone(),
                ));
            }
        }
    }

    async fn execute_tool(&self, call: &ToolCall) -> Result<String> {
        let Some(tool) = self.tools.find(&call.tool_name) else {
            warn!("Model requested unknown tool '{}'", call.tool_name);
            return Ok(format!(
                "Tool '{}' not found. Available tools: {}",
                call.tool_name,
                self.tools.list_tools().join(", ")
            ));
        };

        let started = Instant::now();
        let result = tool.execute(call.tool_args.clone()).await.map_err(|e| {
            ConciergeError::ToolExecution(format!("{} failed: {}", call.tool_name, e))
        })?;
        info!(
            tool = %call.tool_name,
            call_id = %call.call_id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Tool call completed"
        );

        Ok(result.to_string())
    }
}
