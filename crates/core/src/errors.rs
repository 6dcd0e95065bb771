use thiserror::Error;

use crate::task::{builder::BuildError, TaskError};

/// Everything that can go wrong between a completed dialog and the reply
/// reporting its outcome. The user always sees a generic, user-safe
/// message; the underlying reason is logged at the submission boundary.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SubmissionError {
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error(transparent)]
    Task(#[from] TaskError),
    #[error("session store failure: {0}")]
    Store(String),
}

impl SubmissionError {
    pub fn user_message(&self) -> &'static str {
        match self {
            // A config hole the driver cannot fix by re-answering; do not
            // trap them in a retry loop.
            Self::Build(_) => "❌ The report could not be submitted. Please contact dispatch.",
            Self::Task(_) => "❌ The report could not be submitted. Please try again later.",
            Self::Store(_) => "❌ An internal error occurred. Please try again.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::SubmissionError;
    use crate::domain::ReportKind;
    use crate::task::{builder::BuildError, TaskError};

    #[test]
    fn configuration_failure_has_a_user_safe_message_without_detail() {
        let error = SubmissionError::from(BuildError::MissingProjectId(ReportKind::Claim));
        assert!(!error.user_message().contains("project id"));
    }

    #[test]
    fn api_detail_is_never_leaked_to_the_user() {
        let error = SubmissionError::from(TaskError::Api("PORTAL_DELETED".to_owned()));
        assert!(!error.user_message().contains("PORTAL_DELETED"));
        assert!(error.to_string().contains("PORTAL_DELETED"), "detail stays in the log line");
    }

    #[test]
    fn malformed_response_reads_like_any_other_remote_failure() {
        assert_eq!(
            SubmissionError::from(TaskError::MalformedResponse).user_message(),
            SubmissionError::from(TaskError::Timeout).user_message()
        );
    }
}
