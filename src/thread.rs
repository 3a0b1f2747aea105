//! Thread controller
//!
//! Owns one active conversation's message list and the streaming-send
//! protocol: append the user's message optimistically, open a cancellable
//! stream to the backend, drain it as opaque bytes, then reconcile with the
//! authoritative message list from the session store. Content
//! interpretation belongs to the rendering layer, which observes the same
//! message list through its own subscription.

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use futures::stream::Stream;
use serde::Serialize;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::config::EngineConfig;
use crate::envelope::CopilotEnvelope;
use crate::error::{CopilotError, EnglishLocale, Localize, Notice, Notify};
use crate::ids::{ConnectionId, SessionId, TabId};
use crate::lifecycle::report;
use crate::store::SessionStore;
use crate::types::{ChatMessage, ChatMode};

// ============================================================================
// Identity
// ============================================================================

/// What the controller is currently bound to. A copilot tab with no session
/// yet is a synthetic identity of its own; the real session id arrives with
/// the first send.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum ThreadIdentity {
    #[default]
    Unbound,
    Session(SessionId),
    CopilotTab(TabId),
}

impl ThreadIdentity {
    pub fn session_id(&self) -> Option<&SessionId> {
        match self {
            ThreadIdentity::Session(id) => Some(id),
            _ => None,
        }
    }

    pub fn tab_id(&self) -> Option<&TabId> {
        match self {
            ThreadIdentity::CopilotTab(tab) => Some(tab),
            _ => None,
        }
    }
}

impl std::fmt::Display for ThreadIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ThreadIdentity::Unbound => f.write_str("unbound"),
            ThreadIdentity::Session(id) => write!(f, "{id}"),
            ThreadIdentity::CopilotTab(tab) => write!(f, "copilot:{tab}"),
        }
    }
}

// ============================================================================
// Transport
// ============================================================================

/// Body of a `POST /chat` request.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<SessionId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tab_id: Option<TabId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<ConnectionId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub web_search: bool,
    pub messages: Vec<ChatMessage>,
}

pub type BoxedByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, CopilotError>> + Send>>;

/// An open assistant reply stream. `session_id` carries the server-assigned
/// id from the `x-chat-id` header for a freshly created copilot session.
pub struct ChatStream {
    pub session_id: Option<SessionId>,
    pub body: BoxedByteStream,
}

/// The thread controller's own I/O boundary, separate from the session
/// store.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn open(
        &self,
        request: &ChatRequest,
        cancel: CancellationToken,
    ) -> Result<ChatStream, CopilotError>;
}

/// Production transport over the backend chat endpoint.
pub struct HttpChatTransport {
    client: reqwest::Client,
    base_url: String,
    locale: Arc<dyn Localize>,
}

impl HttpChatTransport {
    pub fn new(config: &EngineConfig) -> Self {
        Self::with_locale(config, Arc::new(EnglishLocale))
    }

    pub fn with_locale(config: &EngineConfig, locale: Arc<dyn Localize>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            locale,
        }
    }
}

#[async_trait]
impl ChatTransport for HttpChatTransport {
    #[instrument(level = "debug", skip(self, request, cancel), fields(id = %request.id))]
    async fn open(
        &self,
        request: &ChatRequest,
        cancel: CancellationToken,
    ) -> Result<ChatStream, CopilotError> {
        let send = self
            .client
            .post(format!("{}/chat", self.base_url))
            .json(request)
            .send();
        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(CopilotError::Cancelled),
            response = send => response.map_err(|e| CopilotError::Transport(e.to_string()))?,
        };

        if !response.status().is_success() {
            let fallback = self.locale.text(Notice::RequestFailed);
            let body = response.text().await.unwrap_or_default();
            let message = if body.trim().is_empty() { fallback } else { body };
            return Err(CopilotError::Transport(message));
        }

        let session_id = response
            .headers()
            .get("x-chat-id")
            .and_then(|v| v.to_str().ok())
            .map(SessionId::from);

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| CopilotError::Transport(e.to_string())));

        Ok(ChatStream {
            session_id,
            body: Box::pin(body),
        })
    }
}

// ============================================================================
// Controller
// ============================================================================

/// Ambient context carried alongside a send.
#[derive(Clone, Debug, Default)]
pub struct SendOptions {
    /// Current context envelope; in copilot mode it drives the request's
    /// database/table fields and tab binding.
    pub envelope: Option<CopilotEnvelope>,
    /// Ambient active database (used outside copilot mode)
    pub database: Option<String>,
    /// Ambient active table (used outside copilot mode)
    pub table: Option<String>,
    pub connection_id: Option<ConnectionId>,
    pub model: Option<String>,
    pub web_search: bool,
}

/// Observable state of the thread.
#[derive(Clone, Debug, Default)]
pub struct ThreadState {
    pub identity: ThreadIdentity,
    pub messages: Vec<ChatMessage>,
    pub input: String,
    pub streaming: bool,
}

type SettledCallback = Box<dyn Fn() + Send + Sync>;

/// Drives one active conversation thread.
pub struct ThreadController {
    mode: ChatMode,
    transport: Arc<dyn ChatTransport>,
    store: Arc<dyn SessionStore>,
    notifier: Arc<dyn Notify>,
    locale: Arc<dyn Localize>,
    default_model: Option<String>,
    state: Mutex<ThreadState>,
    cancel: Mutex<Option<CancellationToken>>,
    on_settled: Mutex<Option<SettledCallback>>,
}

impl ThreadController {
    pub fn new(
        mode: ChatMode,
        transport: Arc<dyn ChatTransport>,
        store: Arc<dyn SessionStore>,
        notifier: Arc<dyn Notify>,
        locale: Arc<dyn Localize>,
    ) -> Self {
        Self {
            mode,
            transport,
            store,
            notifier,
            locale,
            default_model: None,
            state: Mutex::new(ThreadState::default()),
            cancel: Mutex::new(None),
            on_settled: Mutex::new(None),
        }
    }

    /// Configured fallback model, used when a send carries no override.
    pub fn with_default_model(mut self, model: Option<String>) -> Self {
        self.default_model = model;
        self
    }

    /// Register the activity callback, fired exactly once per transition
    /// from streaming back to settled (never on every state tick). Hosts
    /// use it to refresh session ordering/titles after activity.
    pub fn set_on_settled(&self, callback: impl Fn() + Send + Sync + 'static) {
        *self.on_settled.lock().expect("callback lock poisoned") = Some(Box::new(callback));
    }

    fn lock(&self) -> MutexGuard<'_, ThreadState> {
        self.state.lock().expect("thread state poisoned")
    }

    pub fn snapshot(&self) -> ThreadState {
        self.lock().clone()
    }

    pub fn set_input(&self, input: impl Into<String>) {
        self.lock().input = input.into();
    }

    /// Bind the controller to an identity with its initial message list.
    ///
    /// An identity change cancels any in-flight request, clears the
    /// streaming flag and the input buffer, and replaces the messages
    /// wholesale. Rebinding the same identity only replaces messages; the
    /// user's in-progress draft survives a background reload.
    pub fn bind(&self, identity: ThreadIdentity, initial_messages: Vec<ChatMessage>) {
        let mut state = self.lock();
        if state.identity != identity {
            if let Some(token) = self.cancel.lock().expect("cancel lock poisoned").take() {
                token.cancel();
            }
            debug!(from = %state.identity, to = %identity, "thread rebound");
            state.identity = identity;
            state.streaming = false;
            state.input.clear();
        }
        state.messages = initial_messages;
    }

    /// Abort the in-flight request, if any. The optimistic message is left
    /// in place so the user can resume; cancellation is never an error.
    pub fn stop(&self) {
        if let Some(token) = self.cancel.lock().expect("cancel lock poisoned").take() {
            token.cancel();
        }
        let identity = self.lock().identity.clone();
        if self.settle(&identity) {
            self.fire_settled();
        }
    }

    /// Send the current input.
    ///
    /// A no-op when unbound, when the trimmed input is empty, or when a
    /// send is already streaming. Returns the server-assigned session id
    /// when the backend created a copilot session for this send.
    pub async fn send(&self, options: SendOptions) -> Result<Option<SessionId>, CopilotError> {
        let (identity, optimistic_id, request) = {
            let mut state = self.lock();
            if state.identity == ThreadIdentity::Unbound {
                return Ok(None);
            }
            let text = state.input.trim().to_string();
            if text.is_empty() || state.streaming {
                return Ok(None);
            }
            let user = ChatMessage::user(&text);
            let optimistic_id = user.id.clone();
            state.messages.push(user);
            state.input.clear();
            state.streaming = true;
            let identity = state.identity.clone();
            let request = self.build_request(&identity, state.messages.clone(), &options);
            (identity, optimistic_id, request)
        };

        let token = CancellationToken::new();
        *self.cancel.lock().expect("cancel lock poisoned") = Some(token.clone());

        let outcome = self.run_exchange(&request, token).await;
        let settled = self.settle(&identity);

        let result = match outcome {
            Ok(assigned) => {
                self.reload_authoritative(&identity, assigned.as_ref()).await;
                Ok(assigned)
            }
            Err(e) if e.is_cancelled() => {
                // Expected termination: keep the optimistic message, say nothing
                Ok(None)
            }
            Err(e) => {
                {
                    // Remove the optimistic message by id: a same-identity
                    // rebind may have replaced the list wholesale, and the
                    // last entry is not necessarily ours
                    let mut state = self.lock();
                    if let Some(at) = state.messages.iter().position(|m| m.id == optimistic_id) {
                        state.messages.remove(at);
                    }
                }
                report(self.notifier.as_ref(), self.locale.as_ref(), &e);
                Err(e)
            }
        };

        if settled {
            self.fire_settled();
        }
        result
    }

    /// Open the stream and drain it to exhaustion. The bytes themselves are
    /// opaque to the controller.
    async fn run_exchange(
        &self,
        request: &ChatRequest,
        cancel: CancellationToken,
    ) -> Result<Option<SessionId>, CopilotError> {
        let ChatStream {
            session_id,
            mut body,
        } = self.transport.open(request, cancel.clone()).await?;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Err(CopilotError::Cancelled),
                chunk = body.next() => match chunk {
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e),
                    None => break,
                },
            }
        }

        Ok(session_id)
    }

    /// Replace the local (optimistic) list with the server's authoritative
    /// order, but only if the identity has not moved on.
    async fn reload_authoritative(&self, identity: &ThreadIdentity, assigned: Option<&SessionId>) {
        let reload_id = assigned
            .cloned()
            .or_else(|| identity.session_id().cloned());
        let Some(id) = reload_id else {
            return;
        };
        match self.store.session_detail(&id).await {
            Ok(detail) => {
                let mut state = self.lock();
                if &state.identity == identity {
                    state.messages = detail.messages;
                }
            }
            Err(e) => {
                warn!(session = %id, error = %e, "post-stream reload failed, keeping local list");
                report(self.notifier.as_ref(), self.locale.as_ref(), &e);
            }
        }
    }

    /// Flip the streaming flag back to settled; returns whether this call
    /// performed the transition (the falling edge is fired at most once).
    fn settle(&self, identity: &ThreadIdentity) -> bool {
        let mut state = self.lock();
        if &state.identity == identity && state.streaming {
            state.streaming = false;
            true
        } else {
            false
        }
    }

    fn fire_settled(&self) {
        if let Some(callback) = self.on_settled.lock().expect("callback lock poisoned").as_ref() {
            callback();
        }
    }

    fn build_request(
        &self,
        identity: &ThreadIdentity,
        messages: Vec<ChatMessage>,
        options: &SendOptions,
    ) -> ChatRequest {
        let (database, table) = match (self.mode, options.envelope.as_ref()) {
            (ChatMode::Copilot, Some(envelope)) => (
                envelope.request_database().map(str::to_string),
                envelope.request_table().map(str::to_string),
            ),
            _ => (options.database.clone(), options.table.clone()),
        };
        let tab_id = match self.mode {
            ChatMode::Copilot => identity
                .tab_id()
                .cloned()
                .or_else(|| options.envelope.as_ref().and_then(|e| e.tab_id().cloned())),
            ChatMode::Global => None,
        };

        ChatRequest {
            id: uuid::Uuid::new_v4().to_string(),
            chat_id: identity.session_id().cloned(),
            tab_id,
            connection_id: options.connection_id.clone(),
            database,
            table,
            model: options.model.clone().or_else(|| self.default_model.clone()),
            web_search: options.web_search,
            messages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{EnvelopeBuilder, EnvelopeMeta, SqlDraftInput};
    use crate::error::EnglishLocale;
    use crate::error::test_support::RecordingNotifier;
    use crate::lifecycle::test_support::{MockStore, message, session};
    use futures::stream;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct MockTransport {
        fail_open: AtomicBool,
        chunk_error: AtomicBool,
        hang: AtomicBool,
        // Parks the body until released, then fails it
        error_gate: Mutex<Option<tokio::sync::oneshot::Receiver<()>>>,
        assigned: Mutex<Option<SessionId>>,
        requests: Mutex<Vec<ChatRequest>>,
        open_calls: AtomicUsize,
    }

    #[async_trait]
    impl ChatTransport for MockTransport {
        async fn open(
            &self,
            request: &ChatRequest,
            _cancel: CancellationToken,
        ) -> Result<ChatStream, CopilotError> {
            self.open_calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(request.clone());
            if self.fail_open.load(Ordering::SeqCst) {
                return Err(CopilotError::Transport("send failed".to_string()));
            }
            if let Some(gate) = self.error_gate.lock().unwrap().take() {
                let body: BoxedByteStream = Box::pin(stream::once(async move {
                    let _ = gate.await;
                    Err::<Bytes, _>(CopilotError::Transport("stream broke".to_string()))
                }));
                return Ok(ChatStream {
                    session_id: self.assigned.lock().unwrap().clone(),
                    body,
                });
            }
            let body: BoxedByteStream = if self.hang.load(Ordering::SeqCst) {
                Box::pin(stream::pending())
            } else if self.chunk_error.load(Ordering::SeqCst) {
                Box::pin(stream::iter(vec![
                    Ok(Bytes::from_static(b"partial ")),
                    Err(CopilotError::Transport("stream broke".to_string())),
                ]))
            } else {
                Box::pin(stream::iter(vec![
                    Ok(Bytes::from_static(b"chunk one ")),
                    Ok(Bytes::from_static(b"chunk two")),
                ]))
            };
            Ok(ChatStream {
                session_id: self.assigned.lock().unwrap().clone(),
                body,
            })
        }
    }

    struct Fixture {
        controller: Arc<ThreadController>,
        transport: Arc<MockTransport>,
        store: Arc<MockStore>,
        notifier: Arc<RecordingNotifier>,
        settled: Arc<AtomicUsize>,
    }

    fn fixture(mode: ChatMode) -> Fixture {
        let transport = Arc::new(MockTransport::default());
        let store = Arc::new(MockStore::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let controller = Arc::new(ThreadController::new(
            mode,
            transport.clone(),
            store.clone(),
            notifier.clone(),
            Arc::new(EnglishLocale),
        ));
        let settled = Arc::new(AtomicUsize::new(0));
        {
            let settled = settled.clone();
            controller.set_on_settled(move || {
                settled.fetch_add(1, Ordering::SeqCst);
            });
        }
        Fixture {
            controller,
            transport,
            store,
            notifier,
            settled,
        }
    }

    fn bind_session(f: &Fixture, id: &str, server_messages: Vec<ChatMessage>) {
        f.store.sessions.lock().unwrap().push(session(id, None));
        f.store
            .messages
            .lock()
            .unwrap()
            .insert(SessionId::from_string(id), server_messages);
        f.controller
            .bind(ThreadIdentity::Session(SessionId::from_string(id)), vec![]);
    }

    #[tokio::test]
    async fn test_send_unbound_is_noop() {
        let f = fixture(ChatMode::Global);
        f.controller.set_input("hello");

        let result = f.controller.send(SendOptions::default()).await.unwrap();

        assert_eq!(result, None);
        assert_eq!(f.transport.open_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_send_blank_input_is_noop() {
        let f = fixture(ChatMode::Global);
        bind_session(&f, "s1", vec![]);
        f.controller.set_input("   \n ");

        f.controller.send(SendOptions::default()).await.unwrap();

        let state = f.controller.snapshot();
        assert!(state.messages.is_empty());
        assert!(!state.streaming);
        assert_eq!(f.transport.open_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_send_reconciles_with_server_order() {
        let f = fixture(ChatMode::Global);
        bind_session(
            &f,
            "s1",
            vec![message("question"), message("streamed answer")],
        );
        f.controller.set_input("question");

        let assigned = f.controller.send(SendOptions::default()).await.unwrap();

        assert_eq!(assigned, None);
        let state = f.controller.snapshot();
        // Authoritative server list replaced the optimistic one
        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.messages[1].get_text(), "streamed answer");
        assert!(!state.streaming);
        assert!(state.input.is_empty());
        assert_eq!(f.settled.load(Ordering::SeqCst), 1);
        assert!(f.notifier.taken().is_empty());
    }

    #[tokio::test]
    async fn test_send_while_streaming_is_noop() {
        let f = fixture(ChatMode::Global);
        bind_session(&f, "s1", vec![]);
        f.transport.hang.store(true, Ordering::SeqCst);
        f.controller.set_input("first");

        let pending = {
            let controller = f.controller.clone();
            tokio::spawn(async move { controller.send(SendOptions::default()).await })
        };
        while !f.controller.snapshot().streaming {
            tokio::task::yield_now().await;
        }

        f.controller.set_input("second");
        f.controller.send(SendOptions::default()).await.unwrap();
        assert_eq!(f.transport.open_calls.load(Ordering::SeqCst), 1);

        f.controller.stop();
        pending.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_failure_rolls_back_exactly_one() {
        let f = fixture(ChatMode::Global);
        bind_session(&f, "s1", vec![]);
        f.controller
            .bind(
                ThreadIdentity::Session(SessionId::from_string("s1")),
                vec![message("old reply")],
            );
        f.transport.fail_open.store(true, Ordering::SeqCst);
        f.controller.set_input("doomed");

        let before = f.controller.snapshot().messages.len();
        let err = f.controller.send(SendOptions::default()).await.unwrap_err();

        assert!(matches!(err, CopilotError::Transport(_)));
        let state = f.controller.snapshot();
        assert_eq!(state.messages.len(), before);
        assert!(!state.streaming);
        assert_eq!(f.notifier.taken(), vec!["send failed".to_string()]);
        assert_eq!(f.settled.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rollback_never_removes_messages_from_a_mid_stream_rebind() {
        let f = fixture(ChatMode::Global);
        bind_session(&f, "s1", vec![]);
        let (release, gate) = tokio::sync::oneshot::channel();
        *f.transport.error_gate.lock().unwrap() = Some(gate);
        f.controller.set_input("doomed");

        let pending = {
            let controller = f.controller.clone();
            tokio::spawn(async move { controller.send(SendOptions::default()).await })
        };
        while !f.controller.snapshot().streaming {
            tokio::task::yield_now().await;
        }

        // Background reconciliation replaces the list under the same
        // identity while the stream is still open; the optimistic message
        // is gone from the local list
        f.controller.bind(
            ThreadIdentity::Session(SessionId::from_string("s1")),
            vec![message("server one"), message("server two")],
        );

        release.send(()).unwrap();
        assert!(pending.await.unwrap().is_err());

        // Rollback is keyed on the optimistic message's id, so the
        // persisted server messages survive untouched
        let texts: Vec<String> = f
            .controller
            .snapshot()
            .messages
            .iter()
            .map(|m| m.get_text())
            .collect();
        assert_eq!(texts, vec!["server one", "server two"]);
    }

    #[tokio::test]
    async fn test_mid_stream_failure_also_rolls_back() {
        let f = fixture(ChatMode::Global);
        bind_session(&f, "s1", vec![]);
        f.transport.chunk_error.store(true, Ordering::SeqCst);
        f.controller.set_input("doomed");

        assert!(f.controller.send(SendOptions::default()).await.is_err());
        assert!(f.controller.snapshot().messages.is_empty());
    }

    #[tokio::test]
    async fn test_stop_is_silent_and_keeps_optimistic_message() {
        let f = fixture(ChatMode::Global);
        bind_session(&f, "s1", vec![]);
        f.transport.hang.store(true, Ordering::SeqCst);
        f.controller.set_input("keep me");

        let pending = {
            let controller = f.controller.clone();
            tokio::spawn(async move { controller.send(SendOptions::default()).await })
        };
        while !f.controller.snapshot().streaming {
            tokio::task::yield_now().await;
        }

        f.controller.stop();
        let result = pending.await.unwrap().unwrap();

        assert_eq!(result, None);
        let state = f.controller.snapshot();
        assert_eq!(state.messages.len(), 1);
        assert_eq!(state.messages[0].get_text(), "keep me");
        assert!(!state.streaming);
        assert!(f.notifier.taken().is_empty());
        // stop() fired the falling edge; the send epilogue must not re-fire
        assert_eq!(f.settled.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rebind_resets_draft_only_on_identity_change() {
        let f = fixture(ChatMode::Global);
        bind_session(&f, "s1", vec![]);
        f.controller.set_input("draft in progress");

        // Background reload of the same identity: draft survives
        f.controller.bind(
            ThreadIdentity::Session(SessionId::from_string("s1")),
            vec![message("reloaded")],
        );
        let state = f.controller.snapshot();
        assert_eq!(state.input, "draft in progress");
        assert_eq!(state.messages.len(), 1);

        // Identity change: everything resets
        f.controller.bind(
            ThreadIdentity::Session(SessionId::from_string("s2")),
            vec![],
        );
        let state = f.controller.snapshot();
        assert!(state.input.is_empty());
        assert!(state.messages.is_empty());
    }

    #[tokio::test]
    async fn test_copilot_first_send_returns_assigned_session() {
        let f = fixture(ChatMode::Copilot);
        let tab = TabId::from("tab-1");
        f.controller
            .bind(ThreadIdentity::CopilotTab(tab.clone()), vec![]);
        *f.transport.assigned.lock().unwrap() = Some(SessionId::from_string("fresh"));
        f.store
            .by_tab
            .lock()
            .unwrap()
            .insert(tab, session("fresh", None));
        f.store.messages.lock().unwrap().insert(
            SessionId::from_string("fresh"),
            vec![message("hi"), message("hello there")],
        );
        f.controller.set_input("hi");

        let assigned = f.controller.send(SendOptions::default()).await.unwrap();

        assert_eq!(assigned, Some(SessionId::from_string("fresh")));
        // Reload used the assigned id even though the identity is still the tab
        assert_eq!(f.controller.snapshot().messages.len(), 2);
    }

    #[tokio::test]
    async fn test_copilot_request_derives_context_from_envelope() {
        let f = fixture(ChatMode::Copilot);
        let tab = TabId::from("tab-9");
        f.controller
            .bind(ThreadIdentity::CopilotTab(tab.clone()), vec![]);
        f.controller.set_input("what does this query do?");

        let builder = EnvelopeBuilder::default();
        let envelope = builder.build_sql_envelope(SqlDraftInput {
            editor_text: "SELECT * FROM orders",
            baseline_database: Some("shop"),
            dialect: Some("clickhouse"),
            meta: Some(EnvelopeMeta {
                tab_id: Some(tab.clone()),
                ..Default::default()
            }),
            ..Default::default()
        });

        f.controller
            .send(SendOptions {
                envelope: Some(envelope),
                database: Some("ambient-ignored".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        let requests = f.transport.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].database.as_deref(), Some("shop"));
        assert_eq!(requests[0].table, None);
        assert_eq!(requests[0].tab_id, Some(tab));
        assert_eq!(requests[0].chat_id, None);
        assert_eq!(requests[0].messages.len(), 1);
    }

    #[tokio::test]
    async fn test_configured_model_used_when_send_carries_none() {
        let transport = Arc::new(MockTransport::default());
        let store = Arc::new(MockStore::default());
        store.sessions.lock().unwrap().push(session("s1", None));
        let controller = ThreadController::new(
            ChatMode::Global,
            transport.clone(),
            store.clone(),
            Arc::new(RecordingNotifier::default()),
            Arc::new(EnglishLocale),
        )
        .with_default_model(Some("claude-sonnet".into()));
        controller.bind(ThreadIdentity::Session(SessionId::from_string("s1")), vec![]);

        controller.set_input("hello");
        controller.send(SendOptions::default()).await.unwrap();

        controller.set_input("again");
        controller
            .send(SendOptions {
                model: Some("gpt-x".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        let requests = transport.requests.lock().unwrap();
        assert_eq!(requests[0].model.as_deref(), Some("claude-sonnet"));
        // An explicit override wins over the configured fallback
        assert_eq!(requests[1].model.as_deref(), Some("gpt-x"));
    }

    #[tokio::test]
    async fn test_global_request_uses_ambient_context() {
        let f = fixture(ChatMode::Global);
        bind_session(&f, "s1", vec![]);
        f.controller.set_input("hello");

        f.controller
            .send(SendOptions {
                database: Some("ambient".into()),
                table: Some("orders".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        let requests = f.transport.requests.lock().unwrap();
        assert_eq!(requests[0].database.as_deref(), Some("ambient"));
        assert_eq!(requests[0].table.as_deref(), Some("orders"));
        assert_eq!(requests[0].tab_id, None);
        assert_eq!(
            requests[0].chat_id,
            Some(SessionId::from_string("s1"))
        );
    }
}
