//! Global-mode session lifecycle
//!
//! Many sessions per user, user-named, list-visible. All mutations follow
//! the optimistic-update/rollback discipline: the local list is rewritten
//! first, the store call follows, and a failure restores the pre-edit
//! snapshot before the error is reported.

use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

use super::{LifecycleState, RenameEdit, SelectPreference, SessionLifecycle, report};
use crate::error::{CopilotError, Localize, Notice, Notify};
use crate::ids::SessionId;
use crate::store::SessionStore;
use crate::types::ChatMode;

pub struct GlobalSessionLifecycle {
    store: Arc<dyn SessionStore>,
    notifier: Arc<dyn Notify>,
    locale: Arc<dyn Localize>,
    state: Mutex<LifecycleState>,
}

impl GlobalSessionLifecycle {
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

    /// Report and return an error in one step so every failure is notified
    /// exactly once, at the point it is raised.
    fn fail(&self, error: CopilotError) -> CopilotError {
        report(self.notifier.as_ref(), self.locale.as_ref(), &error);
        error
    }

    /// Fetch the session list and reconcile selection.
    ///
    /// A failed refresh never clears a good list. A refresh that raced an
    /// optimistic rename/delete (the edit epoch moved while the fetch was
    /// in flight) is discarded: the local edit and its eventual
    /// reconciliation win over stale server data.
    pub(crate) async fn refresh_preferring(
        &self,
        preference: SelectPreference,
    ) -> Result<(), CopilotError> {
        let observed_epoch = {
            let mut state = self.lock();
            state.loading_sessions = true;
            state.edit_epoch
        };

        let result = self.store.list_sessions(ChatMode::Global).await;

        let target = {
            let mut state = self.lock();
            state.loading_sessions = false;
            let list = match result {
                Ok(list) => list,
                Err(e) => {
                    drop(state);
                    return Err(self.fail(e));
                }
            };
            if state.edit_epoch != observed_epoch {
                debug!("discarding stale session list refresh");
                return Ok(());
            }
            state.sessions = list;
            if state.sessions.is_empty() {
                state.selected = None;
                state.initial_messages.clear();
                return Ok(());
            }
            let preferred = match &preference {
                SelectPreference::Keep => state.selected.clone(),
                SelectPreference::Prefer(id) => Some(id.clone()),
                SelectPreference::Clear => None,
            };
            let target = preferred
                .filter(|id| state.sessions.iter().any(|s| &s.id == id))
                .unwrap_or_else(|| state.sessions[0].id.clone());
            if state.selected.as_ref() == Some(&target) {
                // Selection unchanged; the existing message list stands
                return Ok(());
            }
            state.selected = Some(target.clone());
            target
        };

        self.fetch_detail(target).await
    }

    /// Fetch one session's detail and message history, applying the result
    /// only if `id` is still the selected session when the fetch resolves.
    async fn fetch_detail(&self, id: SessionId) -> Result<(), CopilotError> {
        {
            let mut state = self.lock();
            state.loading_messages = true;
        }

        let result = self.store.session_detail(&id).await;

        let mut state = self.lock();
        if state.selected.as_ref() != Some(&id) {
            if state.selected.is_none() {
                // Selection was cleared outright; no newer fetch exists to
                // own the loading flag
                state.loading_messages = false;
            }
            debug!(session = %id, "discarding detail for a superseded selection");
            return Ok(());
        }
        state.loading_messages = false;
        match result {
            Ok(detail) => {
                match state.sessions.iter_mut().find(|s| s.id == detail.session.id) {
                    Some(existing) => *existing = detail.session,
                    None => state.sessions.insert(0, detail.session),
                }
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

    /// Select a session and load its history. Selecting the already
    /// selected session is a no-op.
    pub async fn select(&self, id: SessionId) -> Result<(), CopilotError> {
        {
            let mut state = self.lock();
            if state.selected.as_ref() == Some(&id) {
                return Ok(());
            }
            state.selected = Some(id.clone());
        }
        self.fetch_detail(id).await
    }

    /// Create a new session and select it. A create already in flight makes
    /// this an idempotent no-op, not an error.
    pub async fn create(&self) -> Result<(), CopilotError> {
        {
            let mut state = self.lock();
            if state.creating_session {
                return Ok(());
            }
            state.creating_session = true;
        }

        let result = self.store.create_global().await;
        self.lock().creating_session = false;

        match result {
            Ok(session) => {
                self.refresh_preferring(SelectPreference::Prefer(session.id))
                    .await
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Start an inline rename, seeding the edit buffer with the trimmed
    /// title or the default placeholder.
    pub fn begin_rename(&self, id: SessionId) -> Result<(), CopilotError> {
        let mut state = self.lock();
        let Some(session) = state.sessions.iter().find(|s| s.id == id) else {
            drop(state);
            return Err(self.fail(CopilotError::NotFound(id.into_string())));
        };
        let seed = session
            .display_title()
            .map(str::to_string)
            .unwrap_or_else(|| self.locale.text(Notice::DefaultSessionTitle));
        state.editing = Some(RenameEdit {
            session_id: id,
            value: seed,
            submitted: false,
        });
        Ok(())
    }

    pub fn set_rename_value(&self, value: impl Into<String>) {
        if let Some(edit) = self.lock().editing.as_mut() {
            edit.value = value.into();
        }
    }

    pub fn cancel_rename(&self) {
        self.lock().editing = None;
    }

    /// Submit the pending rename. An empty trimmed value is rejected before
    /// any network call; the optimistic title rewrite is rolled back on
    /// store failure.
    pub async fn submit_rename(&self) -> Result<(), CopilotError> {
        let (id, title, snapshot) = {
            let mut state = self.lock();
            let Some(edit) = state.editing.as_mut() else {
                return Ok(());
            };
            if edit.submitted {
                return Ok(());
            }
            let title = edit.value.trim().to_string();
            if title.is_empty() {
                drop(state);
                return Err(self.fail(CopilotError::Validation(Notice::TitleRequired)));
            }
            edit.submitted = true;
            let id = edit.session_id.clone();
            let snapshot = state.sessions.clone();
            if let Some(session) = state.sessions.iter_mut().find(|s| s.id == id) {
                session.title = Some(title.clone());
            }
            state.edit_epoch += 1;
            state.rename_submitting = Some(id.clone());
            (id, title, snapshot)
        };

        let result = self.store.rename_session(&id, &title).await;

        match result {
            Ok(()) => {
                {
                    let mut state = self.lock();
                    state.rename_submitting = None;
                    state.editing = None;
                }
                self.refresh_preferring(SelectPreference::Keep).await
            }
            Err(e) => {
                {
                    let mut state = self.lock();
                    state.sessions = snapshot;
                    state.edit_epoch += 1;
                    state.rename_submitting = None;
                    if let Some(edit) = state.editing.as_mut() {
                        edit.submitted = false;
                    }
                }
                Err(self.fail(e))
            }
        }
    }

    /// Mark a session for deletion. A session absent from the local list is
    /// a not-found error, not a silent no-op.
    pub fn request_delete(&self, id: SessionId) -> Result<(), CopilotError> {
        let mut state = self.lock();
        if !state.sessions.iter().any(|s| s.id == id) {
            drop(state);
            return Err(self.fail(CopilotError::NotFound(id.into_string())));
        }
        state.delete_target = Some(id);
        Ok(())
    }

    /// Dismiss the delete dialog. Returns false while a delete is in flight
    /// unless `force` is set.
    pub fn dismiss_delete(&self, force: bool) -> bool {
        let mut state = self.lock();
        if state.deleting && !force {
            return false;
        }
        state.delete_target = None;
        true
    }

    /// Delete the confirmed target: remove it locally, clear selection and
    /// messages if it was selected, then reconcile against the server list.
    pub async fn confirm_delete(&self) -> Result<(), CopilotError> {
        let (id, was_selected, snapshot) = {
            let mut state = self.lock();
            let Some(id) = state.delete_target.clone() else {
                return Ok(());
            };
            state.deleting = true;
            let snapshot = (
                state.sessions.clone(),
                state.selected.clone(),
                state.initial_messages.clone(),
            );
            let was_selected = state.selected.as_ref() == Some(&id);
            state.sessions.retain(|s| s.id != id);
            if was_selected {
                state.selected = None;
                state.initial_messages.clear();
            }
            state.edit_epoch += 1;
            (id, was_selected, snapshot)
        };

        let result = self.store.delete_session(&id).await;

        match result {
            Ok(()) => {
                {
                    let mut state = self.lock();
                    state.deleting = false;
                    state.delete_target = None;
                }
                let preference = if was_selected {
                    SelectPreference::Clear
                } else {
                    SelectPreference::Keep
                };
                self.refresh_preferring(preference).await
            }
            Err(e) => {
                {
                    let mut state = self.lock();
                    state.sessions = snapshot.0;
                    state.selected = snapshot.1;
                    state.initial_messages = snapshot.2;
                    state.edit_epoch += 1;
                    state.deleting = false;
                }
                Err(self.fail(e))
            }
        }
    }
}

#[async_trait]
impl SessionLifecycle for GlobalSessionLifecycle {
    fn snapshot(&self) -> LifecycleState {
        self.lock().clone()
    }

    async fn refresh(&self) -> Result<(), CopilotError> {
        self.refresh_preferring(SelectPreference::Keep).await
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::error::EnglishLocale;
    use crate::error::test_support::RecordingNotifier;
    use std::sync::atomic::Ordering;
    use tokio::sync::oneshot;

    struct Fixture {
        lifecycle: GlobalSessionLifecycle,
        store: Arc<MockStore>,
        notifier: Arc<RecordingNotifier>,
    }

    fn fixture(sessions: Vec<crate::types::ChatSession>) -> Fixture {
        let store = Arc::new(MockStore::with_sessions(sessions));
        let notifier = Arc::new(RecordingNotifier::default());
        let lifecycle = GlobalSessionLifecycle::new(
            store.clone(),
            notifier.clone(),
            Arc::new(EnglishLocale),
        );
        Fixture {
            lifecycle,
            store,
            notifier,
        }
    }

    #[tokio::test]
    async fn test_refresh_selects_first_and_loads_messages() {
        let f = fixture(vec![session("a", Some("A")), session("b", Some("B"))]);
        f.store.messages.lock().unwrap().insert(
            SessionId::from_string("a"),
            vec![message("hello")],
        );

        f.lifecycle.refresh().await.unwrap();

        let state = f.lifecycle.snapshot();
        assert_eq!(state.sessions.len(), 2);
        assert_eq!(state.selected, Some(SessionId::from_string("a")));
        assert_eq!(state.initial_messages.len(), 1);
        assert!(!state.loading_sessions);
        assert!(!state.loading_messages);
    }

    #[tokio::test]
    async fn test_refresh_keeps_existing_selection() {
        let f = fixture(vec![session("a", None), session("b", None)]);
        f.lifecycle.refresh().await.unwrap();
        f.lifecycle.select(SessionId::from_string("b")).await.unwrap();

        f.lifecycle.refresh().await.unwrap();

        assert_eq!(
            f.lifecycle.snapshot().selected,
            Some(SessionId::from_string("b"))
        );
    }

    #[tokio::test]
    async fn test_refresh_empty_list_clears_selection() {
        let f = fixture(vec![session("a", None)]);
        f.lifecycle.refresh().await.unwrap();
        assert!(f.lifecycle.snapshot().selected.is_some());

        f.store.sessions.lock().unwrap().clear();
        f.lifecycle.refresh().await.unwrap();

        let state = f.lifecycle.snapshot();
        assert_eq!(state.selected, None);
        assert!(state.initial_messages.is_empty());
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_list() {
        let f = fixture(vec![session("a", Some("A"))]);
        f.lifecycle.refresh().await.unwrap();

        f.store.fail_list.store(true, Ordering::SeqCst);
        let err = f.lifecycle.refresh().await.unwrap_err();

        assert!(matches!(err, CopilotError::Transport(_)));
        let state = f.lifecycle.snapshot();
        assert_eq!(state.sessions.len(), 1);
        assert!(!state.loading_sessions);
        assert_eq!(f.notifier.taken().len(), 1);
    }

    #[tokio::test]
    async fn test_detail_failure_clears_messages_but_keeps_selection() {
        let f = fixture(vec![session("a", None)]);
        f.lifecycle.refresh().await.unwrap();

        f.store.fail_detail.store(true, Ordering::SeqCst);
        let err = f
            .lifecycle
            .select(SessionId::from_string("a"))
            .await
            .err();
        // Selecting the same id is a no-op, so force a real re-selection
        assert!(err.is_none());
        f.store.sessions.lock().unwrap().push(session("b", None));
        f.lifecycle.refresh().await.unwrap();
        let err = f
            .lifecycle
            .select(SessionId::from_string("b"))
            .await
            .unwrap_err();

        assert!(matches!(err, CopilotError::Transport(_)));
        let state = f.lifecycle.snapshot();
        assert_eq!(state.selected, Some(SessionId::from_string("b")));
        assert!(state.initial_messages.is_empty());
    }

    #[tokio::test]
    async fn test_late_detail_after_cleared_selection_releases_loading_flag() {
        let f = fixture(vec![session("a", None)]);

        // Park the detail fetch of the first refresh after it selects "a"
        let (release, gate) = oneshot::channel();
        *f.store.detail_gate.lock().unwrap() = Some(gate);
        let lifecycle = Arc::new(f.lifecycle);
        let parked = {
            let lifecycle = lifecycle.clone();
            tokio::spawn(async move { lifecycle.refresh().await })
        };
        while f.store.detail_calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        // The server list empties and a second refresh clears the selection
        f.store.sessions.lock().unwrap().clear();
        lifecycle.refresh().await.unwrap();
        assert_eq!(lifecycle.snapshot().selected, None);

        // The parked detail resolves against a cleared selection: discarded,
        // and no fetch is left owning the loading flag
        release.send(()).unwrap();
        parked.await.unwrap().unwrap();
        let state = lifecycle.snapshot();
        assert_eq!(state.selected, None);
        assert!(!state.loading_messages);
    }

    #[tokio::test]
    async fn test_create_selects_new_session() {
        let f = fixture(vec![session("a", None)]);
        f.lifecycle.refresh().await.unwrap();

        f.lifecycle.create().await.unwrap();

        let state = f.lifecycle.snapshot();
        assert!(!state.creating_session);
        let selected = state.selected.unwrap();
        assert!(selected.as_str().starts_with("created-"));
    }

    #[tokio::test]
    async fn test_create_while_in_flight_is_noop() {
        let f = fixture(vec![]);
        let (release, gate) = oneshot::channel();
        *f.store.create_gate.lock().unwrap() = Some(gate);

        let lifecycle = Arc::new(f.lifecycle);
        let first = {
            let lifecycle = lifecycle.clone();
            tokio::spawn(async move { lifecycle.create().await })
        };
        // Wait until the first create has parked inside the store
        while f.store.create_calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        lifecycle.create().await.unwrap();
        assert_eq!(f.store.create_calls.load(Ordering::SeqCst), 1);

        release.send(()).unwrap();
        first.await.unwrap().unwrap();
        assert_eq!(f.store.create_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_create_failure_leaves_list_untouched() {
        let f = fixture(vec![session("a", None)]);
        f.lifecycle.refresh().await.unwrap();
        f.store.fail_create.store(true, Ordering::SeqCst);

        assert!(f.lifecycle.create().await.is_err());

        let state = f.lifecycle.snapshot();
        assert_eq!(state.sessions.len(), 1);
        assert!(!state.creating_session);
        assert_eq!(f.notifier.taken().len(), 1);
    }

    #[tokio::test]
    async fn test_begin_rename_seeds_buffer() {
        let f = fixture(vec![session("a", Some("  Orders  ")), session("b", None)]);
        f.lifecycle.refresh().await.unwrap();

        f.lifecycle.begin_rename(SessionId::from_string("a")).unwrap();
        let edit = f.lifecycle.snapshot().editing.unwrap();
        assert_eq!(edit.value, "Orders");

        f.lifecycle.begin_rename(SessionId::from_string("b")).unwrap();
        let edit = f.lifecycle.snapshot().editing.unwrap();
        assert_eq!(edit.value, "New chat");
    }

    #[tokio::test]
    async fn test_rename_empty_title_rejected_before_network() {
        let f = fixture(vec![session("a", Some("A"))]);
        f.lifecycle.refresh().await.unwrap();
        f.lifecycle.begin_rename(SessionId::from_string("a")).unwrap();
        f.lifecycle.set_rename_value("   ");

        let err = f.lifecycle.submit_rename().await.unwrap_err();

        assert!(matches!(
            err,
            CopilotError::Validation(Notice::TitleRequired)
        ));
        assert_eq!(f.store.rename_calls.load(Ordering::SeqCst), 0);
        let state = f.lifecycle.snapshot();
        assert_eq!(state.sessions[0].title.as_deref(), Some("A"));
        // The edit stays open for correction
        assert!(state.editing.is_some());
    }

    #[tokio::test]
    async fn test_rename_success_keeps_selection() {
        let f = fixture(vec![session("a", Some("A")), session("b", Some("B"))]);
        f.lifecycle.refresh().await.unwrap();
        f.lifecycle.select(SessionId::from_string("b")).await.unwrap();
        f.lifecycle.begin_rename(SessionId::from_string("b")).unwrap();
        f.lifecycle.set_rename_value("Renamed");

        f.lifecycle.submit_rename().await.unwrap();

        let state = f.lifecycle.snapshot();
        assert_eq!(state.selected, Some(SessionId::from_string("b")));
        let renamed = state
            .sessions
            .iter()
            .find(|s| s.id == SessionId::from_string("b"))
            .unwrap();
        assert_eq!(renamed.title.as_deref(), Some("Renamed"));
        assert!(state.editing.is_none());
        assert!(state.rename_submitting.is_none());
    }

    #[tokio::test]
    async fn test_rename_failure_rolls_back() {
        let f = fixture(vec![session("a", Some("Original"))]);
        f.lifecycle.refresh().await.unwrap();
        f.lifecycle.begin_rename(SessionId::from_string("a")).unwrap();
        f.lifecycle.set_rename_value("Changed");
        f.store.fail_rename.store(true, Ordering::SeqCst);

        assert!(f.lifecycle.submit_rename().await.is_err());

        let state = f.lifecycle.snapshot();
        assert_eq!(state.sessions[0].title.as_deref(), Some("Original"));
        assert_eq!(f.notifier.taken().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_submit_guard() {
        let f = fixture(vec![session("a", Some("A"))]);
        f.lifecycle.refresh().await.unwrap();
        f.lifecycle.begin_rename(SessionId::from_string("a")).unwrap();
        f.lifecycle.set_rename_value("Renamed");

        let (release, gate) = oneshot::channel();
        *f.store.rename_gate.lock().unwrap() = Some(gate);

        let lifecycle = Arc::new(f.lifecycle);
        let first = {
            let lifecycle = lifecycle.clone();
            tokio::spawn(async move { lifecycle.submit_rename().await })
        };
        while f.store.rename_calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        // Second submit while the first is in flight: guarded no-op
        lifecycle.submit_rename().await.unwrap();
        assert_eq!(f.store.rename_calls.load(Ordering::SeqCst), 1);

        release.send(()).unwrap();
        first.await.unwrap().unwrap();
        assert_eq!(f.store.rename_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stale_list_refresh_discarded_after_rename() {
        let f = fixture(vec![session("a", Some("Old"))]);
        f.lifecycle.refresh().await.unwrap();

        // Park a second refresh inside the store while it still sees "Old"
        let (release, gate) = oneshot::channel();
        *f.store.list_gate.lock().unwrap() = Some(gate);
        let lifecycle = Arc::new(f.lifecycle);
        let stale_calls = f.store.list_calls.load(Ordering::SeqCst);
        let stale = {
            let lifecycle = lifecycle.clone();
            tokio::spawn(async move { lifecycle.refresh().await })
        };
        while f.store.list_calls.load(Ordering::SeqCst) == stale_calls {
            tokio::task::yield_now().await;
        }

        // Rename lands while the stale refresh is parked
        lifecycle.begin_rename(SessionId::from_string("a")).unwrap();
        lifecycle.set_rename_value("New");
        lifecycle.submit_rename().await.unwrap();
        assert_eq!(
            lifecycle.snapshot().sessions[0].title.as_deref(),
            Some("New")
        );

        // The parked refresh resolves with pre-rename data and is discarded
        release.send(()).unwrap();
        stale.await.unwrap().unwrap();
        assert_eq!(
            lifecycle.snapshot().sessions[0].title.as_deref(),
            Some("New")
        );
    }

    #[tokio::test]
    async fn test_delete_unknown_session_is_not_found() {
        let f = fixture(vec![session("a", None)]);
        f.lifecycle.refresh().await.unwrap();

        let err = f
            .lifecycle
            .request_delete(SessionId::from_string("ghost"))
            .unwrap_err();

        assert!(matches!(err, CopilotError::NotFound(_)));
        assert_eq!(f.notifier.taken(), vec!["Session not found".to_string()]);
    }

    #[tokio::test]
    async fn test_delete_selected_clears_and_does_not_reselect() {
        let f = fixture(vec![session("a", None), session("b", None)]);
        f.lifecycle.refresh().await.unwrap();
        assert_eq!(
            f.lifecycle.snapshot().selected,
            Some(SessionId::from_string("a"))
        );

        f.lifecycle.request_delete(SessionId::from_string("a")).unwrap();
        f.lifecycle.confirm_delete().await.unwrap();

        let state = f.lifecycle.snapshot();
        assert!(!state.sessions.iter().any(|s| s.id == SessionId::from_string("a")));
        // Ended up on the first remaining session, never the deleted id
        assert_eq!(state.selected, Some(SessionId::from_string("b")));
        assert!(!state.deleting);
        assert!(state.delete_target.is_none());
    }

    #[tokio::test]
    async fn test_delete_unselected_keeps_selection() {
        let f = fixture(vec![session("a", None), session("b", None)]);
        f.lifecycle.refresh().await.unwrap();

        f.lifecycle.request_delete(SessionId::from_string("b")).unwrap();
        f.lifecycle.confirm_delete().await.unwrap();

        assert_eq!(
            f.lifecycle.snapshot().selected,
            Some(SessionId::from_string("a"))
        );
    }

    #[tokio::test]
    async fn test_delete_failure_rolls_back() {
        let f = fixture(vec![session("a", None), session("b", None)]);
        f.lifecycle.refresh().await.unwrap();
        f.store.fail_delete.store(true, Ordering::SeqCst);

        f.lifecycle.request_delete(SessionId::from_string("a")).unwrap();
        assert!(f.lifecycle.confirm_delete().await.is_err());

        let state = f.lifecycle.snapshot();
        assert_eq!(state.sessions.len(), 2);
        assert_eq!(state.selected, Some(SessionId::from_string("a")));
        assert!(!state.deleting);
    }

    #[tokio::test]
    async fn test_delete_in_flight_blocks_dismiss() {
        let f = fixture(vec![session("a", None)]);
        f.lifecycle.refresh().await.unwrap();
        f.lifecycle.request_delete(SessionId::from_string("a")).unwrap();

        let (release, gate) = oneshot::channel();
        *f.store.delete_gate.lock().unwrap() = Some(gate);
        let lifecycle = Arc::new(f.lifecycle);
        let pending = {
            let lifecycle = lifecycle.clone();
            tokio::spawn(async move { lifecycle.confirm_delete().await })
        };
        while f.store.delete_calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        assert!(!lifecycle.dismiss_delete(false));
        assert!(lifecycle.dismiss_delete(true));

        release.send(()).unwrap();
        pending.await.unwrap().unwrap();
    }
}
