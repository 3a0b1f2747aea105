//! HTTP implementation of the session store client
//!
//! Every backend response is wrapped in `{code, message?, data?}`; a
//! non-2xx status or a non-zero code is a failure carrying the body's
//! message, with a localized fallback when the body has none.

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::instrument;

use super::{SessionDetail, SessionStore};
use crate::config::EngineConfig;
use crate::envelope::CopilotEnvelope;
use crate::error::{CopilotError, EnglishLocale, Localize, Notice};
use crate::ids::{SessionId, TabId};
use crate::types::{ChatMessage, ChatMode, ChatSession};

/// Common response envelope used by every session endpoint.
#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: Option<String>,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct SessionsData {
    sessions: Vec<ChatSession>,
}

#[derive(Debug, Deserialize)]
struct SessionData {
    session: ChatSession,
}

#[derive(Debug, Deserialize)]
struct MaybeSessionData {
    #[serde(default)]
    session: Option<ChatSession>,
}

#[derive(Debug, Deserialize)]
struct DetailData {
    session: ChatSession,
    messages: Vec<ChatMessage>,
}

/// Decode a response body against the API envelope.
///
/// Separated from the transport so the status/code/message policy is
/// directly testable without a live server.
fn parse_envelope<T: DeserializeOwned>(
    ok_status: bool,
    body: &str,
    fallback: &str,
) -> Result<Option<T>, CopilotError> {
    if !ok_status {
        let message = serde_json::from_str::<ApiEnvelope<serde_json::Value>>(body)
            .ok()
            .and_then(|e| e.message)
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| fallback.to_string());
        return Err(CopilotError::Transport(message));
    }
    let envelope: ApiEnvelope<T> = serde_json::from_str(body)
        .map_err(|e| CopilotError::Transport(format!("malformed response: {e}")))?;
    if envelope.code != 0 {
        let message = envelope
            .message
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| fallback.to_string());
        return Err(CopilotError::Transport(message));
    }
    Ok(envelope.data)
}

/// Session store over the backend HTTP API.
pub struct HttpSessionStore {
    client: reqwest::Client,
    base_url: String,
    locale: Arc<dyn Localize>,
}

impl HttpSessionStore {
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

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn fallback(&self) -> String {
        self.locale.text(Notice::RequestFailed)
    }

    async fn decode<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, CopilotError> {
        let ok = response.status().is_success();
        let body = response
            .text()
            .await
            .map_err(|e| CopilotError::Transport(e.to_string()))?;
        parse_envelope::<T>(ok, &body, &self.fallback())?
            .ok_or_else(|| CopilotError::Transport("response carried no data".to_string()))
    }

    /// Like `decode` but for endpoints whose success payload is `{}`.
    async fn decode_unit(&self, response: reqwest::Response) -> Result<(), CopilotError> {
        let ok = response.status().is_success();
        let body = response
            .text()
            .await
            .map_err(|e| CopilotError::Transport(e.to_string()))?;
        parse_envelope::<serde_json::Value>(ok, &body, &self.fallback())?;
        Ok(())
    }
}

#[async_trait]
impl SessionStore for HttpSessionStore {
    #[instrument(level = "debug", skip(self))]
    async fn list_sessions(&self, mode: ChatMode) -> Result<Vec<ChatSession>, CopilotError> {
        let response = self
            .client
            .get(self.url(&format!("/sessions?type={mode}")))
            .send()
            .await
            .map_err(|e| CopilotError::Transport(e.to_string()))?;
        Ok(self.decode::<SessionsData>(response).await?.sessions)
    }

    #[instrument(level = "debug", skip(self))]
    async fn session_detail(&self, id: &SessionId) -> Result<SessionDetail, CopilotError> {
        let response = self
            .client
            .get(self.url(&format!("/session/{id}")))
            .send()
            .await
            .map_err(|e| CopilotError::Transport(e.to_string()))?;
        let data = self.decode::<DetailData>(response).await?;
        Ok(SessionDetail {
            session: data.session,
            messages: data.messages,
        })
    }

    #[instrument(level = "debug", skip(self))]
    async fn create_global(&self) -> Result<ChatSession, CopilotError> {
        let response = self
            .client
            .post(self.url("/sessions"))
            .json(&serde_json::json!({ "type": "global" }))
            .send()
            .await
            .map_err(|e| CopilotError::Transport(e.to_string()))?;
        Ok(self.decode::<SessionData>(response).await?.session)
    }

    #[instrument(level = "debug", skip(self, title))]
    async fn rename_session(&self, id: &SessionId, title: &str) -> Result<(), CopilotError> {
        let response = self
            .client
            .patch(self.url(&format!("/session/{id}")))
            .json(&serde_json::json!({ "title": title }))
            .send()
            .await
            .map_err(|e| CopilotError::Transport(e.to_string()))?;
        self.decode_unit(response).await
    }

    #[instrument(level = "debug", skip(self))]
    async fn delete_session(&self, id: &SessionId) -> Result<(), CopilotError> {
        let response = self
            .client
            .delete(self.url(&format!("/session/{id}")))
            .send()
            .await
            .map_err(|e| CopilotError::Transport(e.to_string()))?;
        self.decode_unit(response).await
    }

    #[instrument(level = "debug", skip(self))]
    async fn copilot_session_by_tab(
        &self,
        tab: &TabId,
    ) -> Result<Option<ChatSession>, CopilotError> {
        let response = self
            .client
            .get(self.url(&format!("/session/copilot?tabId={tab}")))
            .send()
            .await
            .map_err(|e| CopilotError::Transport(e.to_string()))?;
        Ok(self.decode::<MaybeSessionData>(response).await?.session)
    }

    #[instrument(level = "debug", skip(self, envelope))]
    async fn get_or_create_copilot(
        &self,
        envelope: &CopilotEnvelope,
    ) -> Result<ChatSession, CopilotError> {
        let response = self
            .client
            .post(self.url("/session/copilot"))
            .json(&serde_json::json!({ "envelope": envelope }))
            .send()
            .await
            .map_err(|e| CopilotError::Transport(e.to_string()))?;
        Ok(self.decode::<SessionData>(response).await?.session)
    }
}
