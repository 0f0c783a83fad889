//! Per-session agents
//!
//! Every session id gets its own [`CustomerServiceAgent`] and therefore its own
//! history. Agents share the configuration, model client and knowledge base.
//! The store is bounded: the least recently used session is dropped when the
//! cap is reached, and [`SessionStore::evict_idle`] drops sessions that have
//! been quiet for longer than the idle TTL.

use crate::agents::CustomerServiceAgent;
use crate::context::{CustomerContext, ToneBook};
use crate::knowledge::KnowledgeBase;
use crate::llm::AiService;
use chrono::{DateTime, Duration, Utc};
use concierge_common::{AgentConfig, ConciergeError, DEFAULT_SESSION_ID, Result, sessions};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

struct SessionEntry {
    agent: Arc<CustomerServiceAgent>,
    last_used: DateTime<Utc>,
}

/// Session id -> agent, created on first use
pub struct SessionStore {
    config: Arc<AgentConfig>,
    llm: Arc<dyn AiService>,
    knowledge_base: Arc<KnowledgeBase>,
    tones: ToneBook,
    use_case: String,
    max_sessions: usize,
    idle_ttl: Duration,
    sessions: Mutex<HashMap<String, SessionEntry>>,
}

impl SessionStore {
    /// Create a store with the default tone book and limits
    ///
    /// Fails when the use-case has no tone preference.
    pub fn new(
        config: Arc<AgentConfig>,
        llm: Arc<dyn AiService>,
        knowledge_base: Arc<KnowledgeBase>,
        use_case: impl Into<String>,
    ) -> Result<Self> {
        Self::with_tones(config, llm, knowledge_base, use_case, ToneBook::default())
    }

    pub fn with_tones(
        config: Arc<AgentConfig>,
        llm: Arc<dyn AiService>,
        knowledge_base: Arc<KnowledgeBase>,
        use_case: impl Into<String>,
        tones: ToneBook,
    ) -> Result<Self> {
        let use_case = use_case.into();
        tones.tone_for(&use_case)?;

        Ok(Self {
            config,
            llm,
            knowledge_base,
            tones,
            use_case,
            max_sessions: sessions::DEFAULT_MAX_SESSIONS,
            idle_ttl: Duration::seconds(sessions::DEFAULT_IDLE_TTL_SECS),
            sessions: Mutex::new(HashMap::new()),
        })
    }

    /// Override the session cap and idle TTL
    pub fn with_limits(mut self, max_sessions: usize, idle_ttl: Duration) -> Result<Self> {
        if max_sessions == 0 {
            return Err(ConciergeError::invalid_field("max_sessions", "must be at least 1"));
        }
        if idle_ttl <= Duration::zero() {
            return Err(ConciergeError::invalid_field("idle_ttl", "must be positive"));
        }
        self.max_sessions = max_sessions;
        self.idle_ttl = idle_ttl;
        Ok(self)
    }

    /// Agent for a session, created on first use
    ///
    /// A blank id maps to the default session.
    pub async fn agent(&self, session_id: &str) -> Result<Arc<CustomerServiceAgent>> {
        self.agent_at(session_id, Utc::now()).await
    }

    /// Same as [`SessionStore::agent`] with an explicit clock reading
    pub async fn agent_at(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Arc<CustomerServiceAgent>> {
        let session_id = normalize(session_id);
        let mut sessions = self.sessions.lock().await;

        if let Some(entry) = sessions.get_mut(session_id) {
            entry.last_used = now;
            return Ok(entry.agent.clone());
        }

        if sessions.len() >= self.max_sessions {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(id, _)| id.clone());
            if let Some(oldest) = oldest {
                sessions.remove(&oldest);
                info!("Session cap reached, dropped least recently used session {}", oldest);
            }
        }

        let context = CustomerContext::with_tones(
            self.use_case.clone(),
            self.knowledge_base.clone(),
            self.tones.clone(),
        )?;
        let agent = Arc::new(CustomerServiceAgent::new(
            self.config.clone(),
            context,
            self.llm.clone(),
        )?);
        sessions.insert(
            session_id.to_string(),
            SessionEntry {
                agent: agent.clone(),
                last_used: now,
            },
        );
        debug!("Created session {} ({} active)", session_id, sessions.len());

        Ok(agent)
    }

    /// Drop sessions idle for longer than the TTL; returns how many were dropped
    pub async fn evict_idle(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now - self.idle_ttl;
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, entry| entry.last_used >= cutoff);

        let evicted = before - sessions.len();
        if evicted > 0 {
            info!("Evicted {} idle sessions", evicted);
        }
        evicted
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }

    pub async fn contains(&self, session_id: &str) -> bool {
        self.sessions.lock().await.contains_key(normalize(session_id))
    }

    pub fn use_case(&self) -> &str {
        &self.use_case
    }

    pub fn idle_ttl(&self) -> Duration {
        self.idle_ttl
    }
}

fn normalize(session_id: &str) -> &str {
    let trimmed = session_id.trim();
    if trimmed.is_empty() {
        DEFAULT_SESSION_ID
    } else {
        trimmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{InternalChatMessage, ModelTurn};
    use crate::tools::ToolSpec;
    use async_trait::async_trait;

    struct FixedService;

    #[async_trait]
    impl AiService for FixedService {
        async fn generate_response(
            &self,
            _messages: &[InternalChatMessage],
            _tools: &[ToolSpec],
        ) -> anyhow::Result<ModelTurn> {
            Ok(ModelTurn::Text(
                r#"{"response": "Happy to help!", "intent": "greeting", "sentiment": "positive"}"#
                    .to_string(),
            ))
        }
    }

    fn store() -> SessionStore {
        SessionStore::new(
            Arc::new(AgentConfig::default_config()),
            Arc::new(FixedService),
            Arc::new(KnowledgeBase::sample()),
            "support",
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_sessions_have_separate_histories() {
        let store = store();
        let alice = store.agent("alice").await.unwrap();
        let bob = store.agent("bob").await.unwrap();

        alice.handle_message("hi").await.unwrap();
        alice.handle_message("where is my parcel?").await.unwrap();
        bob.handle_message("hello").await.unwrap();

        assert_eq!(alice.history().await.len(), 2);
        assert_eq!(bob.history().await.len(), 1);

        // the same id returns the same agent
        let again = store.agent("alice").await.unwrap();
        assert!(Arc::ptr_eq(&alice, &again));
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_blank_id_uses_default_session() {
        let store = store();
        let blank = store.agent("  ").await.unwrap();
        let default = store.agent(DEFAULT_SESSION_ID).await.unwrap();
        assert!(Arc::ptr_eq(&blank, &default));
        assert!(store.contains("").await);
    }

    #[tokio::test]
    async fn test_unknown_use_case_is_rejected() {
        let result = SessionStore::new(
            Arc::new(AgentConfig::default_config()),
            Arc::new(FixedService),
            Arc::new(KnowledgeBase::sample()),
            "billing",
        );
        assert!(matches!(result, Err(ConciergeError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_cap_drops_least_recently_used() {
        let store = store().with_limits(2, Duration::hours(1)).unwrap();
        let t0 = Utc::now();

        store.agent_at("a", t0).await.unwrap();
        store.agent_at("b", t0 + Duration::seconds(1)).await.unwrap();
        // touching "a" makes "b" the least recently used
        store.agent_at("a", t0 + Duration::seconds(2)).await.unwrap();
        store.agent_at("c", t0 + Duration::seconds(3)).await.unwrap();

        assert_eq!(store.len().await, 2);
        assert!(store.contains("a").await);
        assert!(!store.contains("b").await);
        assert!(store.contains("c").await);
    }

    #[tokio::test]
    async fn test_evict_idle() {
        let store = store().with_limits(10, Duration::minutes(30)).unwrap();
        let t0 = Utc::now();

        store.agent_at("quiet", t0).await.unwrap();
        store.agent_at("busy", t0 + Duration::minutes(20)).await.unwrap();

        assert_eq!(store.evict_idle(t0 + Duration::minutes(40)).await, 1);
        assert!(!store.contains("quiet").await);
        assert!(store.contains("busy").await);
    }

    #[test]
    fn test_limits_are_validated() {
        assert!(store().with_limits(0, Duration::hours(1)).is_err());
        assert!(store().with_limits(1, Duration::zero()).is_err());
    }
}
