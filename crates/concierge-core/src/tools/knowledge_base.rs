use crate::knowledge::KnowledgeBase;
use crate::tools::AiTool;
use anyhow::{Error, anyhow};
use async_trait::async_trait;
use concierge_common::KNOWLEDGE_BASE_TOOL;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::debug;

/// Tool exposing knowledge base lookups to the model.
pub struct QueryKnowledgeBaseTool {
    pub knowledge_base: Arc<KnowledgeBase>,
}

impl QueryKnowledgeBaseTool {
    pub fn new(knowledge_base: Arc<KnowledgeBase>) -> Self {
        Self { knowledge_base }
    }
}

#[async_trait]
impl AiTool for QueryKnowledgeBaseTool {
    fn name(&self) -> &str {
        KNOWLEDGE_BASE_TOOL
    }

    fn description(&self) -> &str {
        "Query knowledge base for relevant information. Returns every category (FAQs, policies, products, ...) with a keyword mentioned in the query, including all of that category's facts."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Free text mentioning the topics to look up, e.g. 'return policy for shipping damage'"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: Value) -> Result<Value, Error> {
        let query = params
            .get("query")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow!("Missing 'query' parameter"))?;

        let result = self.knowledge_base.query(query);
        debug!(
            "Knowledge base query '{}' matched {} categories",
            query,
            result.results.len()
        );
        Ok(serde_json::to_value(result)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool() -> QueryKnowledgeBaseTool {
        QueryKnowledgeBaseTool::new(Arc::new(KnowledgeBase::sample()))
    }

    #[tokio::test]
    async fn test_query_returns_matching_categories() {
        let result = tool()
            .execute(json!({"query": "What's your SHIPPING time?"}))
            .await
            .unwrap();

        assert_eq!(result["query"], "What's your SHIPPING time?");
        let results = result["results"].as_object().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(
            results["faqs"]["return"],
            "Our return policy allows returns within 30 days of purchase."
        );
        assert_eq!(
            results["faqs"]["shipping"],
            "We ship worldwide with delivery times of 3-5 business days."
        );
    }

    #[tokio::test]
    async fn test_query_without_match() {
        let result = tool()
            .execute(json!({"query": "what is the weather"}))
            .await
            .unwrap();
        assert_eq!(result["results"], json!({}));
    }

    #[tokio::test]
    async fn test_parameter_validation() {
        assert!(tool().execute(json!({})).await.is_err());
        assert!(tool().execute(json!({"query": 42})).await.is_err());
    }

    #[test]
    fn test_tool_metadata() {
        let tool = tool();
        assert_eq!(tool.name(), "query_knowledge_base");
        assert!(!tool.description().is_empty());

        let schema = tool.schema();
        assert_eq!(schema["type"], "object");
        assert!(schema["properties"]["query"].is_object());
        assert!(schema["required"].as_array().unwrap().contains(&json!("query")));
    }
}
