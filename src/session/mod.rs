//! Per-conversation sessions
//!
//! A session is created on the first utterance for an id and dropped after
//! `timeout` of inactivity. Each session sits behind its own lock, so turns
//! of one conversation are serialized while different conversations run in
//! parallel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::catalog::PriceFilter;
use crate::conversation::Conversation;
use crate::dialogue::{DialogueState, Stage};
use crate::nlp::{Intent, Sentiment};

const SENTIMENT_WINDOW: usize = 5;

/// What the user has shown interest in so far
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationContext {
    pub preferred_categories: Vec<String>,
    pub preferred_authors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_price: Option<PriceFilter>,
    /// Category or author of the last browsing turn
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_intent: Option<Intent>,
    /// Most recent sentiments, oldest first
    pub sentiments: VecDeque<Sentiment>,
}

impl ConversationContext {
    pub fn record_turn(&mut self, intent: Intent, sentiment: Sentiment) {
        self.last_intent = Some(intent);
        if self.sentiments.len() == SENTIMENT_WINDOW {
            self.sentiments.pop_front();
        }
        self.sentiments.push_back(sentiment);
    }

    pub fn prefer_category(&mut self, category: &str) {
        push_unique(&mut self.preferred_categories, category);
        self.current_topic = Some(category.to_string());
    }

    pub fn prefer_author(&mut self, author: &str) {
        push_unique(&mut self.preferred_authors, author);
        self.current_topic = Some(author.to_string());
    }

    pub fn prefer_price(&mut self, filter: PriceFilter) {
        self.preferred_price = Some(filter);
    }

    pub fn last_sentiment(&self) -> Option<Sentiment> {
        self.sentiments.back().copied()
    }
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|v| v.eq_ignore_ascii_case(value)) {
        list.push(value.to_string());
    }
}

#[derive(Debug)]
pub struct Session {
    pub id: String,
    pub state: DialogueState,
    pub history: Conversation,
    pub context: ConversationContext,
    pub turns: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    last_seen: Instant,
}

impl Session {
    pub fn new(id: impl Into<String>, history_limit: usize) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            state: DialogueState::Idle,
            history: Conversation::new(history_limit),
            context: ConversationContext::default(),
            turns: 0,
            created_at: now,
            updated_at: now,
            last_seen: Instant::now(),
        }
    }

    /// Mark activity.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
        self.last_seen = Instant::now();
    }

    pub fn is_expired(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() >= timeout
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            session_id: self.id.clone(),
            stage: self.state.stage(),
            state: self.state.clone(),
            message_count: self.history.len(),
            context: self.context.clone(),
            turns: self.turns,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Snapshot returned by the sessions endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub stage: Stage,
    /// Dialogue state including the order draft
    pub state: DialogueState,
    pub message_count: usize,
    pub context: ConversationContext,
    pub turns: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    pub active_sessions: usize,
    /// Sessions with an order in progress
    pub ordering_sessions: usize,
    pub total_created: u64,
    pub total_expired: u64,
}

pub type SessionHandle = Arc<Mutex<Session>>;

pub struct SessionManager {
    sessions: Mutex<HashMap<String, SessionHandle>>,
    timeout: Duration,
    history_limit: usize,
    created: AtomicU64,
    expired: AtomicU64,
}

impl SessionManager {
    pub fn new(timeout: Duration, history_limit: usize) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            timeout,
            history_limit,
            created: AtomicU64::new(0),
            expired: AtomicU64::new(0),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Fetch the session for `id`, starting a fresh one when it doesn't exist
    /// or has expired.
    pub async fn get_or_create(&self, id: &str) -> SessionHandle {
        let mut sessions = self.sessions.lock().await;

        if let Some(handle) = sessions.get(id) {
            // A session busy with a turn is in use, not expired.
            let expired = handle
                .try_lock()
                .map(|s| s.is_expired(self.timeout))
                .unwrap_or(false);
            if !expired {
                return Arc::clone(handle);
            }
            self.expired.fetch_add(1, Ordering::Relaxed);
            tracing::info!(session_id = %id, "session expired, starting over");
        }

        let handle = Arc::new(Mutex::new(Session::new(id, self.history_limit)));
        sessions.insert(id.to_string(), Arc::clone(&handle));
        self.created.fetch_add(1, Ordering::Relaxed);
        tracing::info!(session_id = %id, "session created");
        handle
    }

    /// Current session for `id`, without creating one.
    pub async fn get(&self, id: &str) -> Option<SessionHandle> {
        self.sessions.lock().await.get(id).cloned()
    }

    pub async fn info(&self, id: &str) -> Option<SessionInfo> {
        let handle = self.get(id).await?;
        let session = handle.lock().await;
        Some(session.info())
    }

    pub async fn remove(&self, id: &str) -> bool {
        let removed = self.sessions.lock().await.remove(id).is_some();
        if removed {
            tracing::info!(session_id = %id, "session removed");
        }
        removed
    }

    /// Drop every expired, idle-locked session. Returns how many went.
    pub async fn purge_expired(&self) -> usize {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();

        sessions.retain(|_, handle| {
            handle
                .try_lock()
                .map(|s| !s.is_expired(self.timeout))
                .unwrap_or(true)
        });

        let purged = before - sessions.len();
        if purged > 0 {
            self.expired.fetch_add(purged as u64, Ordering::Relaxed);
            tracing::debug!(purged, remaining = sessions.len(), "expired sessions purged");
        }
        purged
    }

    pub async fn stats(&self) -> SessionStats {
        let handles: Vec<SessionHandle> = self.sessions.lock().await.values().cloned().collect();

        let mut ordering_sessions = 0;
        for handle in &handles {
            if !handle.lock().await.state.is_idle() {
                ordering_sessions += 1;
            }
        }

        SessionStats {
            active_sessions: handles.len(),
            ordering_sessions,
            total_created: self.created.load(Ordering::Relaxed),
            total_expired: self.expired.load(Ordering::Relaxed),
        }
    }

    /// Run `purge_expired` every `interval` until the task is aborted.
    pub fn spawn_cleanup(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick fires immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                self.purge_expired().await;
            }
        })
    }
}
