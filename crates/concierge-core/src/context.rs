//! Per-conversation state: use-case, tone preferences, history, knowledge base

use crate::knowledge::KnowledgeBase;
use chrono::{DateTime, Utc};
use concierge_common::{ConciergeError, HistoryPolicy, Result, tones};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Tone description per use-case
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToneBook {
    tones: BTreeMap<String, String>,
}

impl ToneBook {
    /// A tone book without any use-case
    pub fn empty() -> Self {
        Self {
            tones: BTreeMap::new(),
        }
    }

    /// Register (or replace) the tone for a use-case
    pub fn with_tone(mut self, use_case: impl Into<String>, tone: impl Into<String>) -> Self {
        self.tones.insert(use_case.into(), tone.into());
        self
    }

    /// Tone for a use-case
    ///
    /// Unregistered use-cases are an error rather than a silent fallback.
    pub fn tone_for(&self, use_case: &str) -> Result<&str> {
        self.tones.get(use_case).map(String::as_str).ok_or_else(|| {
            ConciergeError::Configuration(format!(
                "no tone preference registered for use-case '{}' (known: {})",
                use_case,
                self.use_cases().collect::<Vec<_>>().join(", ")
            ))
        })
    }

    pub fn use_cases(&self) -> impl Iterator<Item = &str> {
        self.tones.keys().map(String::as_str)
    }
}

impl Default for ToneBook {
    fn default() -> Self {
        Self::empty()
            .with_tone(tones::SUPPORT.0, tones::SUPPORT.1)
            .with_tone(tones::SALES.0, tones::SALES.1)
            .with_tone(tones::THERAPY.0, tones::THERAPY.1)
    }
}

/// One customer message as recorded in the history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub message: String,
    /// Serialized as an RFC 3339 timestamp
    pub timestamp: DateTime<Utc>,
}

/// Conversation state owned by one agent
#[derive(Debug, Clone)]
pub struct CustomerContext {
    use_case: String,
    history: Vec<HistoryEntry>,
    tone_preferences: ToneBook,
    knowledge_base: Arc<KnowledgeBase>,
    retention: HistoryPolicy,
}

impl CustomerContext {
    /// Create a context with the default tone book and unbounded history
    pub fn new(use_case: impl Into<String>, knowledge_base: Arc<KnowledgeBase>) -> Result<Self> {
        Self::with_tones(use_case, knowledge_base, ToneBook::default())
    }

    /// Create a context with a custom tone book
    ///
    /// Fails when the tone book has no entry for the use-case.
    pub fn with_tones(
        use_case: impl Into<String>,
        knowledge_base: Arc<KnowledgeBase>,
        tone_preferences: ToneBook,
    ) -> Result<Self> {
        let use_case = use_case.into();
        tone_preferences.tone_for(&use_case)?;

        Ok(Self {
            use_case,
            history: Vec::new(),
            tone_preferences,
            knowledge_base,
            retention: HistoryPolicy::unbounded(),
        })
    }

    /// Apply a retention policy to the history
    pub fn with_retention(mut self, retention: HistoryPolicy) -> Self {
        self.retention = retention;
        self
    }

    /// Append a message to the history, stamped with the current time
    pub fn record(&mut self, message: impl Into<String>) -> &HistoryEntry {
        self.record_at(message, Utc::now())
    }

    /// Append a message with an explicit timestamp
    pub fn record_at(
        &mut self,
        message: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> &HistoryEntry {
        self.history.push(HistoryEntry {
            message: message.into(),
            timestamp,
        });
        self.apply_retention(timestamp);
        // the entry just pushed is never evicted: max_entries >= 1 and its age is zero
        &self.history[self.history.len() - 1]
    }

    fn apply_retention(&mut self, now: DateTime<Utc>) {
        if self.retention.is_unbounded() {
            return;
        }
        let before = self.history.len();

        // an age reaching past the earliest representable time evicts nothing
        let cutoff = self
            .retention
            .max_age
            .and_then(|max_age| chrono::Duration::from_std(max_age).ok())
            .and_then(|max_age| now.checked_sub_signed(max_age));
        if let Some(cutoff) = cutoff {
            self.history.retain(|entry| entry.timestamp >= cutoff);
        }
        if let Some(max_entries) = self.retention.max_entries {
            let max_entries = max_entries.max(1);
            if self.history.len() > max_entries {
                let excess = self.history.len() - max_entries;
                self.history.drain(..excess);
            }
        }

        let evicted = before - self.history.len();
        if evicted > 0 {
            debug!("Evicted {} history entries for use-case {}", evicted, self.use_case);
        }
    }

    pub fn use_case(&self) -> &str {
        &self.use_case
    }

    /// Tone preference of the current use-case
    pub fn tone(&self) -> Result<&str> {
        self.tone_preferences.tone_for(&self.use_case)
    }

    pub fn tone_preferences(&self) -> &ToneBook {
        &self.tone_preferences
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn knowledge_base(&self) -> &Arc<KnowledgeBase> {
        &self.knowledge_base
    }

    pub fn retention(&self) -> HistoryPolicy {
        self.retention
    }
}
