//! Task construction and structured output handling
//!
//! A [`Task`] is the instruction sent to the model for one customer message,
//! paired with the [`OutputSchema`] its final answer must satisfy. The model
//! answers in text; [`extract_structured_output`] pulls the JSON object out of
//! that text and validates it into a [`StructuredOutput`].

use crate::context::{CustomerContext, HistoryEntry};
use concierge_common::{ConciergeError, Result, to_iso8601, truncate_string};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::fmt::Write as _;

/// The reply contract: every field is required and non-empty
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredOutput {
    /// Response to the customer query
    pub response: String,
    /// Intention of the customer query
    pub intent: String,
    /// Sentiment of the customer query
    pub sentiment: String,
}

/// One required string field of the expected output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputField {
    pub name: &'static str,
    pub description: &'static str,
}

/// Shape the model's final answer must have
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputSchema {
    pub title: &'static str,
    pub fields: Vec<OutputField>,
}

impl OutputSchema {
    /// Schema of [`StructuredOutput`]
    pub fn customer_service() -> Self {
        Self {
            title: "CustomerServiceOutput",
            fields: vec![
                OutputField {
                    name: "response",
                    description: "Response to customer query",
                },
                OutputField {
                    name: "intent",
                    description: "Intention of customer query, be specific",
                },
                OutputField {
                    name: "sentiment",
                    description: "Sentiment of customer query",
                },
            ],
        }
    }

    /// JSON schema sent to the model
    pub fn json_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .fields
            .iter()
            .map(|field| {
                (
                    field.name.to_string(),
                    json!({ "type": "string", "description": field.description }),
                )
            })
            .collect();
        let required: Vec<&str> = self.fields.iter().map(|f| f.name).collect();

        json!({
            "title": self.title,
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Check a value against the schema and convert it
    ///
    /// Every field must be present, a string, and not blank.
    pub fn validate(&self, value: &Value) -> Result<StructuredOutput> {
        let object = value.as_object().ok_or_else(|| {
            ConciergeError::OutputValidation(format!(
                "expected a JSON object, got {}",
                json_type(value)
            ))
        })?;

        for field in &self.fields {
            match object.get(field.name) {
                None | Some(Value::Null) => {
                    return Err(ConciergeError::OutputValidation(format!(
                        "missing required field `{}`",
                        field.name
                    )));
                }
                Some(Value::String(text)) if text.trim().is_empty() => {
                    return Err(ConciergeError::OutputValidation(format!(
                        "field `{}` must not be empty",
                        field.name
                    )));
                }
                Some(Value::String(_)) => {}
                Some(other) => {
                    return Err(ConciergeError::OutputValidation(format!(
                        "field `{}` must be a string, got {}",
                        field.name,
                        json_type(other)
                    )));
                }
            }
        }

        serde_json::from_value(value.clone())
            .map_err(|e| ConciergeError::OutputValidation(e.to_string()))
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Pull the JSON object out of a model reply and validate it
///
/// Accepts a bare object, an object inside a fenced code block, or an object
/// surrounded by prose.
pub fn extract_structured_output(text: &str, schema: &OutputSchema) -> Result<StructuredOutput> {
    let mut first_error = None;
    for (start, _) in text.match_indices('{') {
        let mut values = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
        match values.next() {
            Some(Ok(value)) if value.is_object() => return schema.validate(&value),
            Some(Err(e)) if first_error.is_none() => first_error = Some(e),
            _ => {}
        }
    }

    Err(ConciergeError::OutputValidation(match first_error {
        Some(e) => format!("model reply is not valid JSON: {}", e),
        None => format!(
            "model reply contains no JSON object: {}",
            truncate_string(text.trim(), 200)
        ),
    }))
}

/// Instruction for one customer message
#[derive(Debug, Clone)]
pub struct Task {
    /// Natural-language instruction for the model
    pub instruction: String,
    /// What the final answer must look like
    pub expected_output: OutputSchema,
    /// The customer message this task answers
    pub message: String,
}

impl Task {
    pub const EXPECTED_OUTPUT: &'static str =
        "A detailed response to the customer message, sentiment and customer intention";
}

/// Composes task instructions from the conversation context
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskBuilder {
    include_history: bool,
}

impl TaskBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// List earlier customer messages in the instruction
    pub fn with_history(mut self, include_history: bool) -> Self {
        self.include_history = include_history;
        self
    }

    /// Build the task for a message
    ///
    /// Fails with a configuration error when the context's use-case has no
    /// tone preference.
    pub fn build(&self, message: &str, context: &CustomerContext) -> Result<Task> {
        let use_case = context.use_case();
        let tone = context.tone()?;

        let mut instruction = format!(
            r#"Analyze and respond to this customer message: "{message}"

Steps:
1. Assess customer sentiment and emotional state:
   - Identify positive, negative or neutral tone
   - Detect the urgency level
   - Note strong emotions such as frustration or satisfaction

2. Determine customer intent and needs:
   - Classify the primary purpose (question, complaint, request, feedback, ...)
   - Identify the specific topics or products mentioned
   - Note implicit needs or concerns

3. Search the knowledge base for relevant information:
   - Find matching FAQs and policies
   - Gather product or service details
   - Check for special cases or exceptions

4. Craft a personalized response that:
   - Addresses the primary concern first
   - Uses empathetic language matching their emotional state
   - Keeps a tone appropriate for {use_case}
   - Weaves in relevant knowledge base information naturally
   - Offers clear next steps or solutions
   - Ends with reassurance or a call to action

Current use case: {use_case}
Preferred tone: {tone}
Response guidelines:
- Be concise but thorough
- Use positive, solution-focused language
- Show understanding before offering solutions
- Include specific details from the knowledge base
"#
        );

        let _ = writeln!(instruction, "\nExpected output: {}", Task::EXPECTED_OUTPUT);

        if self.include_history {
            let earlier = earlier_messages(context.history(), message);
            if !earlier.is_empty() {
                instruction.push_str("\nEarlier messages from this customer (oldest first):\n");
                for entry in earlier {
                    let _ = writeln!(
                        instruction,
                        "- [{}] {}",
                        to_iso8601(&entry.timestamp),
                        entry.message
                    );
                }
            }
        }

        Ok(Task {
            instruction,
            expected_output: OutputSchema::customer_service(),
            message: message.to_string(),
        })
    }
}

/// History without the entry recorded for the current message
fn earlier_messages<'a>(history: &'a [HistoryEntry], message: &str) -> &'a [HistoryEntry] {
    match history.split_last() {
        Some((last, rest)) if last.message == message => rest,
        _ => history,
    }
}
