//! Application state shared across all request handlers.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use lru::LruCache;
use tokio::sync::Mutex;

use crate::chat::{ChatError, ChatId, ConversationController};
use crate::config::{AppConfig, ConfigError};
use crate::dispatch::{ChatMode, Dispatcher};
use crate::preferences::PreferenceStore;

/// One live chat session and when it was last used.
struct SessionEntry {
    controller: Arc<ConversationController>,
    last_active: Instant,
}

impl SessionEntry {
    fn new(controller: Arc<ConversationController>) -> Self {
        Self {
            controller,
            last_active: Instant::now(),
        }
    }

    fn touch(&mut self) {
        self.last_active = Instant::now();
    }

    /// Idle sessions with a dispatch still in flight are kept.
    fn is_idle(&self, now: Instant, timeout: Duration) -> bool {
        !self.controller.is_loading() && now.duration_since(self.last_active) >= timeout
    }
}

/// Shared application state.
pub struct AppState {
    /// Service configuration.
    pub config: AppConfig,
    /// Outbound dispatcher shared by every session.
    pub dispatcher: Arc<Dispatcher>,
    /// Persisted dark-mode preference.
    pub preferences: Mutex<PreferenceStore>,
    sessions: Mutex<LruCache<ChatId, SessionEntry>>,
}

impl AppState {
    /// Create a new application state from configuration.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built or the preference file is unreadable.
    pub fn new(config: AppConfig) -> Result<Arc<Self>, Box<dyn std::error::Error + Send + Sync>> {
        let dispatcher = Dispatcher::from_config(&config)
            .map_err(|e| format!("Failed to create dispatcher: {e}"))?;
        let preferences = PreferenceStore::open(config.prefs_path.clone())
            .map_err(|e| format!("Failed to open preferences: {e}"))?;

        Self::with_parts(config, dispatcher, preferences).map_err(Into::into)
    }

    /// Assemble state from already-built parts.
    ///
    /// # Errors
    /// Returns an error if `config.max_sessions` is zero.
    pub fn with_parts(
        config: AppConfig,
        dispatcher: Dispatcher,
        preferences: PreferenceStore,
    ) -> Result<Arc<Self>, ConfigError> {
        let capacity = NonZeroUsize::new(config.max_sessions)
            .ok_or_else(|| ConfigError::Invalid("max sessions must be > 0".to_string()))?;

        Ok(Arc::new(Self {
            config,
            dispatcher: Arc::new(dispatcher),
            preferences: Mutex::new(preferences),
            sessions: Mutex::new(LruCache::new(capacity)),
        }))
    }

    /// Start a new conversation in `mode`.
    ///
    /// Idle sessions are swept first. When the cap is reached the least
    /// recently used session is dropped.
    pub async fn create_session(&self, mode: ChatMode) -> (ChatId, Arc<ConversationController>) {
        let id = ChatId::new();
        let controller = Arc::new(ConversationController::new(
            mode,
            Arc::clone(&self.dispatcher),
        ));

        let mut sessions = self.sessions.lock().await;
        let swept = evict_idle(&mut sessions, self.config.session_idle_timeout);
        if let Some((evicted, _)) = sessions.push(id, SessionEntry::new(Arc::clone(&controller))) {
            tracing::info!(%evicted, "session cap reached, dropped least recently used session");
        }
        let live = sessions.len();
        drop(sessions);

        tracing::info!(%id, %mode, swept, live, "chat session created");
        (id, controller)
    }

    /// Look up a conversation by its string identifier and mark it active.
    ///
    /// # Errors
    /// Returns [`ChatError::UnknownSession`] if the id is malformed, unknown or evicted.
    pub async fn session(
        &self,
        id: &str,
    ) -> Result<(ChatId, Arc<ConversationController>), ChatError> {
        let parsed: ChatId = id
            .parse()
            .map_err(|_| ChatError::UnknownSession(id.to_string()))?;

        let mut sessions = self.sessions.lock().await;
        let controller = sessions.get_mut(&parsed).map(|entry| {
            entry.touch();
            Arc::clone(&entry.controller)
        });
        drop(sessions);

        controller
            .map(|controller| (parsed, controller))
            .ok_or_else(|| ChatError::UnknownSession(id.to_string()))
    }

    /// Number of sessions currently held.
    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

/// Drop every idle session, returning how many were removed.
fn evict_idle(sessions: &mut LruCache<ChatId, SessionEntry>, timeout: Duration) -> usize {
    let now = Instant::now();
    let idle: Vec<ChatId> = sessions
        .iter()
        .filter(|(_, entry)| entry.is_idle(now, timeout))
        .map(|(id, _)| *id)
        .collect();

    for id in &idle {
        sessions.pop(id);
    }
    idle.len()
}
