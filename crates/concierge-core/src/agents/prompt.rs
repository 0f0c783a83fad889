//! System prompt for the customer-service agent.

use crate::task::OutputSchema;
use crate::tools::ToolRegistry;

/// Build the system prompt: role, goal, backstory, tools and output contract.
pub fn build_system_prompt(use_case: &str, tools: &ToolRegistry, schema: &OutputSchema) -> String {
    let tool_descriptions = tools
        .specs()
        .iter()
        .map(|t| format!("- **{}**: {}", t.name, t.description))
        .collect::<Vec<_>>()
        .join("\n");

    let output_fields = schema
        .fields
        .iter()
        .map(|f| format!("- `{}`: {}", f.name, f.description))
        .collect::<Vec<_>>()
        .join("\n");

    let json_schema = serde_json::to_string_pretty(&schema.json_schema()).unwrap_or_default();

    format!(
        r#"You are a Customer Service Specialist.

## Goal

As an empathetic customer service agent, you:
1. Carefully analyze each customer message to understand their true emotions, needs and intentions through tone, word choice and context
2. Identify the key issues or questions they are trying to communicate
3. Provide clear, helpful responses that directly address their needs while matching their emotional state
4. Maintain a supportive and understanding tone throughout the conversation
5. Verify that their concerns have been fully resolved

## Background

You are an expert {use_case} specialist with years of experience in customer psychology and communication. You read between the lines to understand what customers really need, and you adapt your communication style so they feel heard and supported while their issue gets resolved.

## Tools

{tool_descriptions}

Use the knowledge base whenever the customer mentions a product, a policy, shipping, returns or anything else it may cover. Never invent facts the knowledge base does not contain.

## Output

Your final answer must be a single JSON object and nothing else, with these string fields (all required, none empty):
{output_fields}

JSON schema:
{json_schema}"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::KnowledgeBase;
    use crate::tools::QueryKnowledgeBaseTool;
    use std::sync::Arc;

    #[test]
    fn test_prompt_mentions_use_case_tools_and_fields() {
        let mut tools = ToolRegistry::new();
        tools
            .register(Arc::new(QueryKnowledgeBaseTool::new(Arc::new(KnowledgeBase::sample()))))
            .unwrap();

        let prompt = build_system_prompt("sales", &tools, &OutputSchema::customer_service());
        assert!(prompt.contains("expert sales specialist"));
        assert!(prompt.contains("**query_knowledge_base**"));
        for field in ["`response`", "`intent`", "`sentiment`"] {
            assert!(prompt.contains(field));
        }
        assert!(prompt.contains("\"required\""));
    }
}
