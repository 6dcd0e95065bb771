use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{error, info, warn};

use courierbot_core::dialog::{classify, DialogEngine, Keyboard, StepOutcome};
use courierbot_core::domain::CompletedReport;
use courierbot_core::errors::SubmissionError;
use courierbot_core::task::{builder::build_task_request, TaskGateway, TaskId, TaskRouting};
use courierbot_db::{RepositoryError, SessionRepository};

use crate::runner::MessageHandler;
use crate::update::{InboundMessage, Reply};

/// Drives one user's dialog per inbound message: load the session, apply
/// the state machine, persist the result, and on completion build and
/// submit the task. Faults never escape this boundary; the worst case is a
/// generic error reply to the one user involved.
pub struct ReportService<G> {
    store: Arc<dyn SessionRepository>,
    gateway: G,
    routing: TaskRouting,
    engine: DialogEngine,
}

impl<G> ReportService<G>
where
    G: TaskGateway,
{
    pub fn new(store: Arc<dyn SessionRepository>, gateway: G, routing: TaskRouting) -> Self {
        Self { store, gateway, routing, engine: DialogEngine }
    }

    pub async fn handle(&self, message: &InboundMessage) -> Reply {
        match self.process(message).await {
            Ok(reply) => reply,
            Err(error) => {
                error!(
                    user_id = message.user_id,
                    update_id = message.update_id,
                    error = %error,
                    "message handling failed"
                );
                Reply::with_keyboard(
                    message.chat_id,
                    SubmissionError::Store(error.to_string()).user_message(),
                    Keyboard::MainMenu,
                )
            }
        }
    }

    async fn process(&self, message: &InboundMessage) -> Result<Reply, RepositoryError> {
        let input = classify(&message.text);
        let session = self.store.get(message.user_id).await?;

        match self.engine.apply(session, input) {
            StepOutcome::Advance { session, prompt } => {
                self.store.put(message.user_id, &session).await?;
                Ok(Reply::from_prompt(message.chat_id, prompt))
            }
            StepOutcome::Reprompt { prompt } | StepOutcome::Ignored { prompt } => {
                Ok(Reply::from_prompt(message.chat_id, prompt))
            }
            StepOutcome::Cancelled { prompt } => {
                self.store.delete(message.user_id).await?;
                Ok(Reply::from_prompt(message.chat_id, prompt))
            }
            StepOutcome::Completed { report } => {
                // Clear before the outbound call so a half-finished
                // submission can never leave the user stuck mid-dialog.
                self.store.delete(message.user_id).await?;
                let text = self.submit(message.user_id, report).await;
                Ok(Reply::with_keyboard(message.chat_id, text, Keyboard::MainMenu))
            }
        }
    }

    /// One attempt, no in-dialog retry; every failure path maps to a
    /// user-safe message with the reason logged.
    async fn submit(&self, user_id: i64, report: CompletedReport) -> String {
        let kind = report.kind;
        match self.try_submit(report).await {
            Ok(task_id) => {
                info!(user_id, kind = kind.as_str(), task_id = task_id.0, "task created");
                format!("✅ Task created! ID: {}", task_id.0)
            }
            Err(error) => {
                warn!(user_id, kind = kind.as_str(), error = %error, "task submission failed");
                error.user_message().to_owned()
            }
        }
    }

    async fn try_submit(&self, report: CompletedReport) -> Result<TaskId, SubmissionError> {
        let request = build_task_request(&report, Utc::now(), &self.routing)?;
        Ok(self.gateway.create_task(&request).await?)
    }
}

#[async_trait]
impl<G> MessageHandler for ReportService<G>
where
    G: TaskGateway,
{
    async fn handle_message(&self, message: &InboundMessage) -> Reply {
        self.handle(message).await
    }
}
