use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::domain::{CompletedReport, ReportKind};
use crate::task::{TaskRequest, TaskRouting};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("no project id configured for {} reports", .0.as_str())]
    MissingProjectId(ReportKind),
}

/// Map a completed dialog onto a task request. Pure: `submitted_at` is an
/// input rather than being sampled here, so identical inputs yield
/// byte-identical requests.
pub fn build_task_request(
    report: &CompletedReport,
    submitted_at: DateTime<Utc>,
    routing: &TaskRouting,
) -> Result<TaskRequest, BuildError> {
    let project_id =
        routing.project_id(report.kind).ok_or(BuildError::MissingProjectId(report.kind))?;

    // The selected claim type overrides the title for every claim.
    let title = match (report.kind, report.claim_type) {
        (ReportKind::Claim, Some(claim_type)) => format!("Claim {}", claim_type.label()),
        _ => report.kind.default_title().to_owned(),
    };

    Ok(TaskRequest {
        kind: report.kind,
        title,
        description: compose_description(report),
        responsible_id: routing.responsible_id,
        deadline: submitted_at + Duration::days(report.kind.deadline_days()),
        project_id,
    })
}

/// Description blocks in fixed order: client code, route, then for goods
/// reports the enumerated items and document number, then the comment.
fn compose_description(report: &CompletedReport) -> String {
    use std::fmt::Write as _;

    let mut description = String::new();
    let _ = writeln!(description, "Client: {}", report.client_code);
    let _ = writeln!(description, "Route: {}", report.route);

    if report.kind.collects_goods() {
        description.push_str("\nItems:\n");
        for (index, item) in report.items.iter().enumerate() {
            let _ = writeln!(description, "{}. Article: {}", index + 1, item.article);
            let _ = writeln!(description, "   Quantity: {}", item.quantity);
        }
        let _ = writeln!(
            description,
            "\nDocument: {}",
            report.document_number.as_deref().unwrap_or("")
        );
    }

    let _ = write!(description, "Comment: {}", report.comment);
    description
}
