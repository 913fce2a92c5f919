use crate::config::InferenceConfig;
use crate::llm::{ChatRequest, LlmClient};
use crate::prompt::PromptRenderer;
use crate::stream::StreamEvent;
use chrono::{Local, NaiveDate};
use parley_core::{ParleyError, ParleyResult};
use parley_session::ChatSession;
use tracing::{info, warn};

/// How a single user turn ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The assistant reply, already recorded in both transcripts.
    Completed { content: String },
    /// A user-facing notice (`"Error: …"`). Nothing was recorded for the
    /// assistant.
    Failed { notice: String },
}

impl TurnOutcome {
    /// True for [`TurnOutcome::Completed`].
    pub fn is_completed(&self) -> bool {
        matches!(self, TurnOutcome::Completed { .. })
    }
}

/// Runs one conversation turn against the model.
pub struct MessageDispatcher {
    llm: LlmClient,
    prompts: PromptRenderer,
}

impl MessageDispatcher {
    /// Dispatcher sending through `llm` with prompts from `prompts`.
    pub fn new(llm: LlmClient, prompts: PromptRenderer) -> Self {
        Self { llm, prompts }
    }

    /// The prompt renderer in use.
    pub fn prompts(&self) -> &PromptRenderer {
        &self.prompts
    }

    /// Request for the session's current state, with the prompt dated `today`.
    pub fn build_request(&self, session: &ChatSession, today: NaiveDate) -> ParleyResult<ChatRequest> {
        let settings = &session.settings;
        let system = self
            .prompts
            .system_prompt(settings.model, &settings.style, today)?;
        let params = InferenceConfig::from(settings);
        Ok(ChatRequest::for_session(session, system, params))
    }

    /// Sends `text` as the next user turn.
    ///
    /// Pending file context is injected first and the user entry is recorded
    /// before the request goes out, so it stays in the transcripts even when
    /// the turn fails. `on_event` sees text and thinking fragments in arrival
    /// order; the final text comes back in the outcome.
    pub async fn send_message<F>(
        &self,
        session: &mut ChatSession,
        text: &str,
        mut on_event: F,
    ) -> TurnOutcome
    where
        F: FnMut(&StreamEvent) + Send,
    {
        if session.inject_file_context() {
            info!(
                session_id = %session.id,
                files = session.file_context().len(),
                "Injected uploaded file context"
            );
        }
        session.append_user(text);

        info!(
            session_id = %session.id,
            model = session.settings.model.api_id(),
            style = session.settings.style.name(),
            entries = session.full().len(),
            "Dispatching turn"
        );

        match self.stream_turn(session, &mut on_event).await {
            Ok(content) => {
                session.append_assistant(content.as_str());
                info!(
                    session_id = %session.id,
                    chars = content.len(),
                    "Turn completed"
                );
                TurnOutcome::Completed { content }
            }
            Err(e) => {
                warn!(session_id = %session.id, error = %e, "Turn failed");
                TurnOutcome::Failed {
                    notice: format!("Error: {e}"),
                }
            }
        }
    }

    async fn stream_turn<F>(&self, session: &ChatSession, on_event: &mut F) -> ParleyResult<String>
    where
        F: FnMut(&StreamEvent) + Send,
    {
        let request = self.build_request(session, Local::now().date_naive())?;
        let (mut rx, handle) = self.llm.chat_stream(&request).await?;

        while let Some(event) = rx.recv().await {
            if matches!(
                event,
                StreamEvent::TextDelta { .. } | StreamEvent::ThinkingDelta { .. }
            ) {
                on_event(&event);
            }
        }

        let completion = handle
            .await
            .map_err(|e| ParleyError::Stream(format!("Stream task failed: {e}")))??;
        Ok(completion.text)
    }
}
