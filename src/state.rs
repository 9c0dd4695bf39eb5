//! Application state: the completion client, prompts/limits, and the session registry.
//!
//! This module owns:
//!   - the completion client (OpenAI-compatible, or `Unconfigured` without a key)
//!   - the prompts and limits (from TOML or defaults)
//!   - one isolated `SessionState` per session id
//!
//! Sessions never share mutable state. Each one sits behind its own mutex, so
//! operations on a session run one at a time while other sessions proceed.

use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::completion::{CompletionClient, OpenAI, Unconfigured};
use crate::config::{apply_limit_overrides, load_service_config_from_env, Limits, Prompts};
use crate::error::SessionError;
use crate::session::SessionState;

pub type SharedSession = Arc<Mutex<SessionState>>;

/// A registered session plus the last time any request looked it up.
struct SessionSlot {
    session: SharedSession,
    touched: Instant,
}

impl SessionSlot {
    fn new() -> Self {
        Self { session: SharedSession::default(), touched: Instant::now() }
    }
}

#[derive(Clone)]
pub struct AppState {
    sessions: Arc<RwLock<HashMap<String, SessionSlot>>>,
    pub completion: Arc<dyn CompletionClient>,
    pub prompts: Prompts,
    pub limits: Limits,
}

impl AppState {
    /// Build state from env: load config, init the completion client.
    #[instrument(level = "info", skip_all)]
    pub fn from_env() -> Self {
        let cfg = load_service_config_from_env().unwrap_or_default();
        let mut limits = cfg.limits;
        apply_limit_overrides(&mut limits, |key| std::env::var(key).ok());

        let completion: Arc<dyn CompletionClient> = match OpenAI::from_env() {
            Some(oa) => {
                info!(target: "smartdoc", base_url = %oa.base_url, model = %oa.model, "Completion model enabled.");
                Arc::new(oa)
            }
            None => {
                info!(target: "smartdoc", "Completion model disabled (no OPENAI_API_KEY). Model-backed calls will fail.");
                Arc::new(Unconfigured)
            }
        };

        Self::new(completion, cfg.prompts, limits)
    }

    pub fn new(completion: Arc<dyn CompletionClient>, prompts: Prompts, limits: Limits) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            completion,
            prompts,
            limits,
        }
    }

    fn idle_ttl(&self) -> Duration {
        Duration::from_secs(self.limits.session_idle_secs)
    }

    /// Register a fresh, empty session and return its id.
    ///
    /// Idle sessions are swept first; if the registry is still at `max_sessions`,
    /// the least recently used sessions are evicted to make room.
    #[instrument(level = "debug", skip(self))]
    pub async fn create_session(&self) -> String {
        let id = Uuid::new_v4().to_string();
        let mut sessions = self.sessions.write().await;

        let swept = evict_idle(&mut sessions, Instant::now(), self.idle_ttl());
        let mut evicted = 0;
        while sessions.len() >= self.limits.max_sessions.max(1) {
            let oldest = sessions.iter().min_by_key(|(_, slot)| slot.touched).map(|(k, _)| k.clone());
            match oldest {
                Some(k) => {
                    sessions.remove(&k);
                    evicted += 1;
                }
                None => break,
            }
        }

        sessions.insert(id.clone(), SessionSlot::new());
        info!(target: "session", %id, live = sessions.len(), swept, evicted, "Session created");
        id
    }

    /// Look up a session and mark it as used.
    #[instrument(level = "debug", skip(self))]
    pub async fn session(&self, id: &str) -> Result<SharedSession, SessionError> {
        let mut sessions = self.sessions.write().await;
        let slot = sessions.get_mut(id).ok_or_else(|| SessionError::UnknownSession(id.to_string()))?;
        slot.touched = Instant::now();
        Ok(slot.session.clone())
    }

    /// Forget a session. Returns false if it did not exist.
    #[instrument(level = "debug", skip(self))]
    pub async fn drop_session(&self, id: &str) -> bool {
        let removed = self.sessions.write().await.remove(id).is_some();
        if removed {
            info!(target: "session", %id, "Session dropped");
        }
        removed
    }

    /// Remove every session idle for longer than `session_idle_secs`.
    pub async fn sweep_idle(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let swept = evict_idle(&mut sessions, Instant::now(), self.idle_ttl());
        if swept > 0 {
            info!(target: "session", swept, live = sessions.len(), "Idle sessions swept");
        }
        swept
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

fn evict_idle(sessions: &mut HashMap<String, SessionSlot>, now: Instant, ttl: Duration) -> usize {
    let before = sessions.len();
    sessions.retain(|_, slot| now.duration_since(slot.touched) < ttl);
    before - sessions.len()
}
