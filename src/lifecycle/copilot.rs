//! Copilot-mode session lifecycle
//!
//! No session list: at most one session exists, keyed by the active tab id.
//! The session is resolved from the tab on observation and created lazily
//! by the backend on the first send, never here. Create/rename/delete do
//! not exist on this type; the controller surfaces them as unsupported.

use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

use super::{LifecycleState, SessionLifecycle, report};
use crate::envelope::CopilotEnvelope;
use crate::error::{CopilotError, Localize, Notice, Notify};
use crate::ids::{SessionId, TabId};
use crate::store::SessionStore;

pub struct CopilotSessionLifecycle {
    store: Arc<dyn SessionStore>,
    notifier: Arc<dyn Notify>,
    locale: Arc<dyn Localize>,
    state: Mutex<LifecycleState>,
}

impl CopilotSessionLifecycle {
    pub fn new(
        store: Arc<dyn SessionStore>,
        notifier: Arc<dyn Notify>,
        locale: Arc<dyn Localize>,
    ) -> Self {
        Self {
            store,
            notifier,
            locale,
            state: Mutex::new(LifecycleState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LifecycleState> {
        self.state.lock().expect("lifecycle state poisoned")
    }

    fn fail(&self, error: CopilotError) -> CopilotError {
        report(self.notifier.as_ref(), self.locale.as_ref(), &error);
        error
    }

    /// Raised by the controller for create/rename/delete attempts; notified
    /// here so the rejection is user-visible exactly once.
    pub(crate) fn unsupported_operation(&self) -> CopilotError {
        self.fail(CopilotError::Validation(Notice::UnsupportedInCopilot))
    }

    /// Feed the current envelope in; resolution is keyed on the tab id in
    /// its metadata.
    pub async fn observe_envelope(
        &self,
        envelope: Option<&CopilotEnvelope>,
    ) -> Result<(), CopilotError> {
        self.observe_tab(envelope.and_then(|e| e.tab_id().cloned()))
            .await
    }

    /// React to the active tab. No tab is a valid steady state (cleared,
    /// not loading). A tab change resets all session state before resolving
    /// so a stale session is never shown under the new tab's identity; an
    /// unchanged tab that already has a selection is skipped entirely.
    pub async fn observe_tab(&self, tab: Option<TabId>) -> Result<(), CopilotError> {
        let Some(tab) = tab else {
            let mut state = self.lock();
            *state = LifecycleState::default();
            return Ok(());
        };

        {
            let mut state = self.lock();
            if state.tab.as_ref() == Some(&tab) {
                if state.selected.is_some() {
                    return Ok(());
                }
            } else {
                *state = LifecycleState {
                    tab: Some(tab.clone()),
                    ..LifecycleState::default()
                };
            }
        }

        self.resolve(tab).await
    }

    /// Look up the session bound to `tab`. Not finding one is not an error;
    /// the session is created lazily on the first message.
    async fn resolve(&self, tab: TabId) -> Result<(), CopilotError> {
        {
            let mut state = self.lock();
            state.loading_sessions = true;
        }

        let result = self.store.copilot_session_by_tab(&tab).await;

        let session_id = {
            let mut state = self.lock();
            if state.tab.as_ref() != Some(&tab) {
                // The tab moved on while we were looking; this result
                // belongs to an identity that no longer exists
                debug!(tab = %tab, "discarding resolution for a superseded tab");
                return Ok(());
            }
            state.loading_sessions = false;
            match result {
                Err(e) => {
                    drop(state);
                    return Err(self.fail(e));
                }
                Ok(None) => return Ok(()),
                Ok(Some(session)) => {
                    let id = session.id.clone();
                    state.selected = Some(id.clone());
                    state.sessions = vec![session];
                    id
                }
            }
        };

        self.fetch_detail(tab, session_id).await
    }

    /// Fetch the bound session's history, applying the result only if both
    /// the tab and the selection are still current when it resolves.
    async fn fetch_detail(&self, tab: TabId, id: SessionId) -> Result<(), CopilotError> {
        {
            let mut state = self.lock();
            state.loading_messages = true;
        }

        let result = self.store.session_detail(&id).await;

        let mut state = self.lock();
        if state.tab.as_ref() != Some(&tab) || state.selected.as_ref() != Some(&id) {
            debug!(session = %id, "discarding detail for a superseded copilot binding");
            return Ok(());
        }
        state.loading_messages = false;
        match result {
            Ok(detail) => {
                state.sessions = vec![detail.session];
                state.initial_messages = detail.messages;
                Ok(())
            }
            Err(e) => {
                state.initial_messages.clear();
                drop(state);
                Err(self.fail(e))
            }
        }
    }

    /// Bind a server-assigned session id for the current tab (announced via
    /// `x-chat-id` on a first send) and load its history.
    pub async fn adopt_session(&self, id: SessionId) -> Result<(), CopilotError> {
        let tab = {
            let mut state = self.lock();
            let Some(tab) = state.tab.clone() else {
                return Ok(());
            };
            state.selected = Some(id.clone());
            tab
        };
        self.fetch_detail(tab, id).await
    }
}

#[async_trait]
impl SessionLifecycle for CopilotSessionLifecycle {
    fn snapshot(&self) -> LifecycleState {
        self.lock().clone()
    }

    /// Re-runs tab resolution, not a list fetch.
    async fn refresh(&self) -> Result<(), CopilotError> {
        let tab = self.lock().tab.clone();
        match tab {
            Some(tab) => self.resolve(tab).await,
            None => Ok(()),
        }
    }
}
