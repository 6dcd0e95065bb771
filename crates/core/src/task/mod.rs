//! Task request types and the outbound gateway seam.
//!
//! The builder (`builder`) turns a completed dialog into a [`TaskRequest`];
//! the [`TaskGateway`] trait is implemented by the Bitrix HTTP client in the
//! server crate and by scripted fakes in tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::ReportKind;

pub mod builder;

/// Wire format Bitrix expects for the `fields[DEADLINE]` form field.
pub const DEADLINE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Identifier of the created task, as reported by the remote system.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TaskId(pub i64);

/// Classified result of one outbound attempt. Single attempt per user
/// submission at this layer; transport-level 5xx retries live inside the
/// gateway implementation.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TaskError {
    #[error("task request timed out")]
    Timeout,
    #[error("could not reach the task service: {0}")]
    Connection(String),
    #[error("task service rejected the request: {0}")]
    Api(String),
    #[error("task service returned an unrecognized response body")]
    MalformedResponse,
}

/// Ephemeral payload for one task-creation call. Built fresh from a
/// completed session and discarded after the call; never persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaskRequest {
    pub kind: ReportKind,
    pub title: String,
    pub description: String,
    pub responsible_id: i64,
    pub deadline: DateTime<Utc>,
    pub project_id: i64,
}

impl TaskRequest {
    pub fn deadline_field(&self) -> String {
        self.deadline.format(DEADLINE_FORMAT).to_string()
    }
}

#[async_trait]
pub trait TaskGateway: Send + Sync {
    async fn create_task(&self, request: &TaskRequest) -> Result<TaskId, TaskError>;
}

/// Static routing configuration: which project receives each report kind
/// and who is responsible. A missing project id is a configuration failure
/// for that kind only, surfaced by the builder before anything is sent.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TaskRouting {
    pub responsible_id: i64,
    pub refusal_project_id: Option<i64>,
    pub claim_project_id: Option<i64>,
    pub info_project_id: Option<i64>,
}

impl TaskRouting {
    pub fn project_id(&self, kind: ReportKind) -> Option<i64> {
        match kind {
            ReportKind::Refusal => self.refusal_project_id,
            ReportKind::Claim => self.claim_project_id,
            ReportKind::Info => self.info_project_id,
        }
    }
}
