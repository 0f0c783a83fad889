//! Configuration types for Concierge agents
//!
//! An [`AgentConfig`] is validated once, when it is built, and is read-only
//! afterwards: fields are private and there are no setters. Use
//! [`AgentConfig::builder`] for custom settings, [`AgentConfig::default_config`]
//! for the defaults, or [`AgentConfig::from_env`] to read them from the process
//! environment:
//!
//! - `CONCIERGE_MODEL` - model identifier. Defaults to `gpt-4o-mini`.
//! - `OPENAI_API_KEY` - credential for the model endpoint.
//! - `OPENAI_API_BASE` - endpoint base URL. Defaults to `https://api.openai.com/v1`.
//! - `CONCIERGE_TEMPERATURE` - sampling temperature in `[0, 1]`. Defaults to `0.7`.
//! - `CONCIERGE_MAX_TOKENS` - optional cap on output length.
//! - `CONCIERGE_VERBOSE` - log full prompts and replies. Defaults to `false`.
//! - `CONCIERGE_CACHE` - caching hint passed to the model client. Defaults to `true`.
//! - `CONCIERGE_KNOWLEDGE_BASE` - path to a JSON/YAML knowledge base file.
//! - `CONCIERGE_HISTORY_MAX_ENTRIES` / `CONCIERGE_HISTORY_MAX_AGE_SECS` - history retention.
//! - `CONCIERGE_INCLUDE_HISTORY` - embed earlier messages in the task instruction.
//! - `CONCIERGE_MAX_TOOL_ROUNDS` - tool-call turns allowed per message. Defaults to `10`.
//! - `CONCIERGE_MODEL_TIMEOUT_SECS` - timeout around one model exchange. Defaults to `120`.

use crate::constants::{
    DEFAULT_API_BASE, DEFAULT_MAX_TOOL_ROUNDS, DEFAULT_MODEL, DEFAULT_STREAM_CHUNK_CHARS,
    DEFAULT_TEMPERATURE, timeouts,
};
use crate::error::{ConciergeError, Result};
use crate::utils::parse_bool;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// Where the knowledge base is loaded from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeBaseConfig {
    /// JSON (`.json`) or YAML (`.yaml`, `.yml`) document mapping category -> keyword -> fact
    pub path: PathBuf,
}

impl KnowledgeBaseConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

/// Retention policy for conversation history
///
/// The default keeps every entry for the lifetime of the context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryPolicy {
    /// Keep at most this many entries, evicting the oldest first
    pub max_entries: Option<usize>,
    /// Evict entries older than this
    pub max_age: Option<Duration>,
}

impl HistoryPolicy {
    /// Keep every entry
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn is_unbounded(&self) -> bool {
        self.max_entries.is_none() && self.max_age.is_none()
    }
}

/// Settings for one customer-service agent
#[derive(Clone)]
pub struct AgentConfig {
    model_name: String,
    api_key: String,
    api_base: String,
    temperature: f64,
    max_tokens: Option<u32>,
    verbose: bool,
    cache: bool,
    knowledge_base: Option<KnowledgeBaseConfig>,
    history: HistoryPolicy,
    include_history_in_prompt: bool,
    max_tool_rounds: usize,
    model_timeout: Option<Duration>,
    stream_chunk_chars: usize,
}

impl AgentConfig {
    /// Default agent configuration
    pub fn default_config() -> Self {
        AgentConfig {
            model_name: DEFAULT_MODEL.to_string(),
            api_key: String::new(),
            api_base: DEFAULT_API_BASE.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: None,
            verbose: false,
            cache: true,
            knowledge_base: None,
            history: HistoryPolicy::unbounded(),
            include_history_in_prompt: false,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            model_timeout: Some(Duration::from_secs(timeouts::DEFAULT_LLM_TIMEOUT)),
            stream_chunk_chars: DEFAULT_STREAM_CHUNK_CHARS,
        }
    }

    /// Start from the defaults and override selected settings
    pub fn builder() -> AgentConfigBuilder {
        AgentConfigBuilder {
            config: Self::default_config(),
        }
    }

    /// Builder seeded with this configuration, for overriding a few fields
    pub fn to_builder(&self) -> AgentConfigBuilder {
        AgentConfigBuilder {
            config: self.clone(),
        }
    }

    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns `ConciergeError::Configuration` naming the variable when a value
    /// cannot be parsed or fails validation.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = Self::builder();

        if let Some(model) = lookup("CONCIERGE_MODEL") {
            builder = builder.model_name(model);
        }
        if let Some(key) = lookup("OPENAI_API_KEY") {
            builder = builder.api_key(key);
        }
        if let Some(base) = lookup("OPENAI_API_BASE") {
            builder = builder.api_base(base);
        }
        if let Some(temperature) = parse_var::<f64, _>(&lookup, "CONCIERGE_TEMPERATURE")? {
            builder = builder.temperature(temperature);
        }
        if let Some(max_tokens) = parse_var::<u32, _>(&lookup, "CONCIERGE_MAX_TOKENS")? {
            builder = builder.max_tokens(Some(max_tokens));
        }
        if let Some(verbose) = bool_var(&lookup, "CONCIERGE_VERBOSE")? {
            builder = builder.verbose(verbose);
        }
        if let Some(cache) = bool_var(&lookup, "CONCIERGE_CACHE")? {
            builder = builder.cache(cache);
        }
        if let Some(path) = lookup("CONCIERGE_KNOWLEDGE_BASE") {
            builder = builder.knowledge_base(Some(KnowledgeBaseConfig::new(path)));
        }

        let mut history = HistoryPolicy::unbounded();
        history.max_entries = parse_var::<usize, _>(&lookup, "CONCIERGE_HISTORY_MAX_ENTRIES")?;
        history.max_age = parse_var::<u64, _>(&lookup, "CONCIERGE_HISTORY_MAX_AGE_SECS")?
            .map(Duration::from_secs);
        builder = builder.history(history);

        if let Some(include) = bool_var(&lookup, "CONCIERGE_INCLUDE_HISTORY")? {
            builder = builder.include_history_in_prompt(include);
        }
        if let Some(rounds) = parse_var::<usize, _>(&lookup, "CONCIERGE_MAX_TOOL_ROUNDS")? {
            builder = builder.max_tool_rounds(rounds);
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "CONCIERGE_MODEL_TIMEOUT_SECS")? {
            builder = builder.model_timeout(Some(Duration::from_secs(secs)));
        }

        let config = builder.build()?;
        debug!("Loaded agent configuration: {:?}", config);
        Ok(config)
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Whether a credential was supplied
    pub fn has_credential(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn max_tokens(&self) -> Option<u32> {
        self.max_tokens
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// Caching hint for the model client; nothing in the pipeline caches
    pub fn cache(&self) -> bool {
        self.cache
    }

    pub fn knowledge_base(&self) -> Option<&KnowledgeBaseConfig> {
        self.knowledge_base.as_ref()
    }

    pub fn history(&self) -> HistoryPolicy {
        self.history
    }

    pub fn include_history_in_prompt(&self) -> bool {
        self.include_history_in_prompt
    }

    pub fn max_tool_rounds(&self) -> usize {
        self.max_tool_rounds
    }

    pub fn model_timeout(&self) -> Option<Duration> {
        self.model_timeout
    }

    pub fn stream_chunk_chars(&self) -> usize {
        self.stream_chunk_chars
    }

    fn validate(&self) -> Result<()> {
        if self.model_name.trim().is_empty() {
            return Err(ConciergeError::invalid_field("model_name", "must not be empty"));
        }
        if !self.temperature.is_finite() || !(0.0..=1.0).contains(&self.temperature) {
            return Err(ConciergeError::invalid_field(
                "temperature",
                format!("{} is outside [0, 1]", self.temperature),
            ));
        }
        if self.max_tokens == Some(0) {
            return Err(ConciergeError::invalid_field("max_tokens", "must be positive"));
        }
        if self.history.max_entries == Some(0) {
            return Err(ConciergeError::invalid_field(
                "history.max_entries",
                "must be positive",
            ));
        }
        if self.max_tool_rounds == 0 {
            return Err(ConciergeError::invalid_field("max_tool_rounds", "must be positive"));
        }
        if self.model_timeout == Some(Duration::ZERO) {
            return Err(ConciergeError::invalid_field("model_timeout", "must be positive"));
        }
        if self.stream_chunk_chars == 0 {
            return Err(ConciergeError::invalid_field(
                "stream_chunk_chars",
                "must be positive",
            ));
        }
        Ok(())
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

impl fmt::Debug for AgentConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentConfig")
            .field("model_name", &self.model_name)
            .field("api_key", &if self.has_credential() { "<redacted>" } else { "<unset>" })
            .field("api_base", &self.api_base)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("verbose", &self.verbose)
            .field("cache", &self.cache)
            .field("knowledge_base", &self.knowledge_base)
            .field("history", &self.history)
            .field("include_history_in_prompt", &self.include_history_in_prompt)
            .field("max_tool_rounds", &self.max_tool_rounds)
            .field("model_timeout", &self.model_timeout)
            .field("stream_chunk_chars", &self.stream_chunk_chars)
            .finish()
    }
}

/// Builder for [`AgentConfig`]; validation happens in [`AgentConfigBuilder::build`]
#[derive(Debug, Clone)]
pub struct AgentConfigBuilder {
    config: AgentConfig,
}

impl AgentConfigBuilder {
    pub fn model_name(mut self, model_name: impl Into<String>) -> Self {
        self.config.model_name = model_name.into();
        self
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.config.api_key = api_key.into();
        self
    }

    pub fn api_base(mut self, api_base: impl Into<String>) -> Self {
        self.config.api_base = api_base.into();
        self
    }

    pub fn temperature(mut self, temperature: f64) -> Self {
        self.config.temperature = temperature;
        self
    }

    pub fn max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.config.max_tokens = max_tokens;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.config.verbose = verbose;
        self
    }

    pub fn cache(mut self, cache: bool) -> Self {
        self.config.cache = cache;
        self
    }

    pub fn knowledge_base(mut self, knowledge_base: Option<KnowledgeBaseConfig>) -> Self {
        self.config.knowledge_base = knowledge_base;
        self
    }

    pub fn history(mut self, history: HistoryPolicy) -> Self {
        self.config.history = history;
        self
    }

    pub fn include_history_in_prompt(mut self, include: bool) -> Self {
        self.config.include_history_in_prompt = include;
        self
    }

    pub fn max_tool_rounds(mut self, rounds: usize) -> Self {
        self.config.max_tool_rounds = rounds;
        self
    }

    pub fn model_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.model_timeout = timeout;
        self
    }

    pub fn stream_chunk_chars(mut self, chars: usize) -> Self {
        self.config.stream_chunk_chars = chars;
        self
    }

    /// Validate and freeze the configuration
    pub fn build(self) -> Result<AgentConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| ConciergeError::invalid_field(key, e))
        })
        .transpose()
}

fn bool_var<F>(lookup: &F, key: &str) -> Result<Option<bool>>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| parse_bool(&raw).map_err(|e| ConciergeError::invalid_field(key, e)))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = AgentConfig::default_config();
        assert_eq!(config.model_name(), "gpt-4o-mini");
        assert_eq!(config.temperature(), 0.7);
        assert!(!config.verbose());
        assert!(config.cache());
        assert!(config.max_tokens().is_none());
        assert!(config.knowledge_base().is_none());
        assert!(config.history().is_unbounded());
        assert!(!config.has_credential());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_temperature_bounds_are_inclusive() {
        for temperature in [0.0, 0.25, 0.5, 0.7, 1.0] {
            let config = AgentConfig::builder().temperature(temperature).build();
            assert!(config.is_ok(), "temperature {} should be accepted", temperature);
        }
    }

    #[test]
    fn test_temperature_out_of_range_is_rejected() {
        for temperature in [-0.01, 1.01, 2.0, f64::NAN, f64::INFINITY] {
            let err = AgentConfig::builder()
                .temperature(temperature)
                .build()
                .unwrap_err();
            assert!(matches!(err, ConciergeError::Configuration(_)));
            assert!(err.to_string().contains("temperature"));
        }
    }

    #[test]
    fn test_other_invalid_fields() {
        let cases = [
            (AgentConfig::builder().model_name("  "), "model_name"),
            (AgentConfig::builder().max_tokens(Some(0)), "max_tokens"),
            (AgentConfig::builder().max_tool_rounds(0), "max_tool_rounds"),
            (AgentConfig::builder().stream_chunk_chars(0), "stream_chunk_chars"),
            (
                AgentConfig::builder().model_timeout(Some(Duration::ZERO)),
                "model_timeout",
            ),
            (
                AgentConfig::builder().history(HistoryPolicy {
                    max_entries: Some(0),
                    max_age: None,
                }),
                "history.max_entries",
            ),
        ];

        for (builder, field) in cases {
            let err = builder.build().unwrap_err();
            assert!(err.to_string().contains(field), "{} not named in {}", field, err);
        }
    }

    #[test]
    fn test_debug_redacts_credential() {
        let config = AgentConfig::builder().api_key("sk-secret").build().unwrap();
        let printed = format!("{:?}", config);
        assert!(!printed.contains("sk-secret"));
        assert!(printed.contains("<redacted>"));
    }

    #[test]
    fn test_to_builder_keeps_other_fields() {
        let base = AgentConfig::builder()
            .api_key("sk-secret")
            .max_tool_rounds(3)
            .build()
            .unwrap();
        let config = base.to_builder().temperature(0.2).build().unwrap();
        assert_eq!(config.temperature(), 0.2);
        assert_eq!(config.api_key(), "sk-secret");
        assert_eq!(config.max_tool_rounds(), 3);

        assert!(base.to_builder().temperature(1.5).build().is_err());
    }

    #[test]
    fn test_from_lookup_with_nothing_set_matches_defaults() {
        let config = AgentConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.model_name(), DEFAULT_MODEL);
        assert_eq!(config.api_base(), DEFAULT_API_BASE);
        assert_eq!(config.max_tool_rounds(), DEFAULT_MAX_TOOL_ROUNDS);
    }

    #[test]
    fn test_from_lookup_reads_every_setting() {
        let config = AgentConfig::from_lookup(lookup_from(&[
            ("CONCIERGE_MODEL", "deepseek-chat"),
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_API_BASE", "http://localhost:8080/v1"),
            ("CONCIERGE_TEMPERATURE", "0"),
            ("CONCIERGE_MAX_TOKENS", "512"),
            ("CONCIERGE_VERBOSE", "yes"),
            ("CONCIERGE_CACHE", "off"),
            ("CONCIERGE_KNOWLEDGE_BASE", "kb.yaml"),
            ("CONCIERGE_HISTORY_MAX_ENTRIES", "50"),
            ("CONCIERGE_HISTORY_MAX_AGE_SECS", "3600"),
            ("CONCIERGE_INCLUDE_HISTORY", "true"),
            ("CONCIERGE_MAX_TOOL_ROUNDS", "3"),
            ("CONCIERGE_MODEL_TIMEOUT_SECS", "30"),
        ]))
        .unwrap();

        assert_eq!(config.model_name(), "deepseek-chat");
        assert!(config.has_credential());
        assert_eq!(config.api_base(), "http://localhost:8080/v1");
        assert_eq!(config.temperature(), 0.0);
        assert_eq!(config.max_tokens(), Some(512));
        assert!(config.verbose());
        assert!(!config.cache());
        assert_eq!(
            config.knowledge_base(),
            Some(&KnowledgeBaseConfig::new("kb.yaml"))
        );
        assert_eq!(config.history().max_entries, Some(50));
        assert_eq!(config.history().max_age, Some(Duration::from_secs(3600)));
        assert!(config.include_history_in_prompt());
        assert_eq!(config.max_tool_rounds(), 3);
        assert_eq!(config.model_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_from_lookup_names_bad_variable() {
        let err = AgentConfig::from_lookup(lookup_from(&[("CONCIERGE_MAX_TOKENS", "lots")]))
            .unwrap_err();
        assert!(err.to_string().contains("CONCIERGE_MAX_TOKENS"));

        let err = AgentConfig::from_lookup(lookup_from(&[("CONCIERGE_VERBOSE", "sometimes")]))
            .unwrap_err();
        assert!(err.to_string().contains("CONCIERGE_VERBOSE"));

        let err = AgentConfig::from_lookup(lookup_from(&[("CONCIERGE_TEMPERATURE", "1.5")]))
            .unwrap_err();
        assert!(err.to_string().contains("temperature"));
    }
}
