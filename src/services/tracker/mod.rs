// ============================================
// Interaction Tracker
// ============================================
//
// Client-session tracking for one rendered post view:
// - Mount fires exactly one click event (latched across re-renders)
// - A passive scroll observer keeps a running maximum depth
// - Unmount computes read time + max scroll and issues exactly one update
//
// All submits are fire-and-forget with a bounded timeout. Failures are
// logged and swallowed: personalization is a soft feature and must never
// block or break rendering. In-flight writes can be aborted on teardown.

use crate::models::InteractionEvent;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Transport error: {0}")]
    TransportError(String),
}

pub type Result<T> = std::result::Result<T, TrackerError>;

const DEFAULT_SUBMIT_TIMEOUT: Duration = Duration::from_millis(3000);

/// Client-side key/value persistence for the session id. Injected rather
/// than read from an ambient global.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
}

pub const SESSION_ID_KEY: &str = "feed_session_id";

/// Read the persisted session id, or generate and persist a fresh one.
/// This id correlates the click event with the later read-time/scroll
/// update when there is no authenticated user id.
pub fn get_or_create_session_id(store: &dyn SessionStore) -> String {
    if let Some(session_id) = store.get(SESSION_ID_KEY) {
        return session_id;
    }
    let session_id = Uuid::new_v4().to_string();
    store.set(SESSION_ID_KEY, &session_id);
    session_id
}

/// In-memory session store for tests and non-browser embedding.
#[derive(Default)]
pub struct InMemorySessionStore {
    values: DashMap<String, String>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for InMemorySessionStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).map(|entry| entry.value().clone())
    }

    fn set(&self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
    }
}

/// Transport boundary for interaction events (the external profile store's
/// ingest endpoint).
#[async_trait]
pub trait InteractionSink: Send + Sync {
    async fn submit(&self, event: InteractionEvent) -> Result<()>;
}

/// Sink that records submitted events, for tests.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<InteractionEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<InteractionEvent> {
        self.events.lock().expect("sink lock poisoned").clone()
    }
}

#[async_trait]
impl InteractionSink for RecordingSink {
    async fn submit(&self, event: InteractionEvent) -> Result<()> {
        self.events.lock().expect("sink lock poisoned").push(event);
        Ok(())
    }
}

/// Tracker lifecycle state for one rendered post view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewState {
    Idle,
    Tracked,
    Updating,
}

/// Per-rendered-post view tracker.
///
/// State machine: `Idle -> Tracked` on mount, `Tracked -> Updating -> Idle`
/// on unmount. Both transitions are latched so repeated renders or repeated
/// unmount calls cannot double-submit.
pub struct ViewTracker {
    post_id: Uuid,
    user_id: Option<Uuid>,
    session_id: String,
    sink: Arc<dyn InteractionSink>,
    submit_timeout: Duration,
    state: ViewState,
    mounted_at: Option<DateTime<Utc>>,
    max_scroll_depth: u8,
    has_tracked_click: bool,
    in_flight: Vec<JoinHandle<()>>,
}

impl ViewTracker {
    pub fn new(
        post_id: Uuid,
        user_id: Option<Uuid>,
        session_id: String,
        sink: Arc<dyn InteractionSink>,
    ) -> Self {
        Self {
            post_id,
            user_id,
            session_id,
            sink,
            submit_timeout: DEFAULT_SUBMIT_TIMEOUT,
            state: ViewState::Idle,
            mounted_at: None,
            max_scroll_depth: 0,
            has_tracked_click: false,
            in_flight: Vec::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.submit_timeout = timeout;
        self
    }

    pub fn state(&self) -> ViewState {
        self.state
    }

    pub fn max_scroll_depth(&self) -> u8 {
        self.max_scroll_depth
    }

    /// The post view became visible. Fires the click event exactly once per
    /// tracker, no matter how many times the component re-renders.
    pub fn on_mount(&mut self, now: DateTime<Utc>) {
        if self.has_tracked_click {
            return;
        }
        self.has_tracked_click = true;
        self.mounted_at = Some(now);
        self.state = ViewState::Tracked;

        let event = InteractionEvent {
            user_id: self.user_id,
            post_id: self.post_id,
            session_id: self.session_id.clone(),
            clicked: true,
            read_time_seconds: 0,
            scroll_depth_percent: 0,
        };
        self.submit_detached(event, "click");
    }

    /// Passive scroll observation; keeps the running maximum. Never reset
    /// while this instance stays mounted.
    pub fn observe_scroll(&mut self, depth_percent: u8) {
        let depth = depth_percent.min(100);
        if depth > self.max_scroll_depth {
            self.max_scroll_depth = depth;
        }
    }

    /// The post view is going away. Computes read time and max scroll depth
    /// and issues exactly one profile update, then returns to idle.
    pub fn on_unmount(&mut self, now: DateTime<Utc>) {
        if self.state != ViewState::Tracked {
            return;
        }
        self.state = ViewState::Updating;

        let read_time_seconds = self
            .mounted_at
            .map(|mounted| (now - mounted).num_seconds().max(0) as u32)
            .unwrap_or(0);

        let event = InteractionEvent {
            user_id: self.user_id,
            post_id: self.post_id,
            session_id: self.session_id.clone(),
            clicked: false,
            read_time_seconds,
            scroll_depth_percent: self.max_scroll_depth,
        };
        self.submit_detached(event, "view_update");
        self.state = ViewState::Idle;
    }

    /// Fire-and-forget submit with a bounded timeout. Failures are logged
    /// and swallowed; nothing here is surfaced to the viewer.
    fn submit_detached(&mut self, event: InteractionEvent, kind: &'static str) {
        let sink = Arc::clone(&self.sink);
        let timeout = self.submit_timeout;
        let post_id = event.post_id;

        let handle = tokio::spawn(async move {
            match tokio::time::timeout(timeout, sink.submit(event)).await {
                Ok(Ok(())) => {
                    debug!(kind = kind, post_id = %post_id, "Interaction submitted")
                }
                Ok(Err(e)) => {
                    warn!(kind = kind, post_id = %post_id, error = %e, "Interaction submit failed")
                }
                Err(_) => {
                    warn!(kind = kind, post_id = %post_id, "Interaction submit timed out")
                }
            }
        });
        self.in_flight.push(handle);
    }

    /// Await all in-flight submits (graceful teardown, tests).
    pub async fn flush(&mut self) {
        for handle in self.in_flight.drain(..) {
            let _ = handle.await;
        }
    }

    /// Abort in-flight submits without blocking (navigation teardown).
    pub fn abort_in_flight(&mut self) {
        for handle in self.in_flight.drain(..) {
            handle.abort();
        }
    }
}

impl Drop for ViewTracker {
    fn drop(&mut self) {
        // Detached tasks keep running to completion; dropping the tracker
        // must not cancel a write already on the wire.
        self.in_flight.clear();
    }
}
