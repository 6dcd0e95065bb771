//! Domain core for the driver report bot.
//!
//! Pure, transport-free building blocks:
//! - `domain` — report kinds, sessions, line items
//! - `dialog` — the per-user conversation state machine
//! - `task` — task request builder and the outbound gateway seam
//! - `config` — layered application configuration
//! - `errors` — submission error taxonomy with user-safe messages

pub mod config;
pub mod dialog;
pub mod domain;
pub mod errors;
pub mod task;

pub use dialog::{classify, DialogEngine, DialogInput, Keyboard, Prompt, StepOutcome};
pub use domain::{ClaimType, CompletedReport, DialogState, LineItem, ReportKind, Session};
pub use errors::SubmissionError;
pub use task::{
    builder::{build_task_request, BuildError},
    TaskError, TaskGateway, TaskId, TaskRequest, TaskRouting,
};
