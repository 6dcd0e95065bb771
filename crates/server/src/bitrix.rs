use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, warn};

use courierbot_core::config::BitrixConfig;
use courierbot_core::task::{TaskError, TaskGateway, TaskId, TaskRequest};

/// REST client for the Bitrix24 task API. One webhook URL, one method:
/// `tasks.task.add`, form-encoded the way the portal expects it.
pub struct BitrixClient {
    http: reqwest::Client,
    webhook_url: String,
    max_retries: u32,
}

impl BitrixClient {
    pub fn new(config: &BitrixConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self { http, webhook_url: config.webhook_url.clone(), max_retries: config.max_retries })
    }

    fn endpoint(&self) -> String {
        format!("{}tasks.task.add", self.webhook_url)
    }

    fn form_fields(request: &TaskRequest) -> Vec<(&'static str, String)> {
        vec![
            ("fields[TITLE]", request.title.clone()),
            ("fields[DESCRIPTION]", request.description.clone()),
            ("fields[RESPONSIBLE_ID]", request.responsible_id.to_string()),
            ("fields[DEADLINE]", request.deadline_field()),
            ("fields[GROUP_ID]", request.project_id.to_string()),
        ]
    }

    async fn post_once(&self, request: &TaskRequest) -> Result<TaskId, Attempt> {
        let response = self
            .http
            .post(self.endpoint())
            .form(&Self::form_fields(request))
            .send()
            .await
            .map_err(|err| Attempt::retryable(map_request_error(err)))?;

        let status = response.status();
        // Gateways in front of the portal answer 5xx with HTML pages, so
        // the body may not be JSON at all; the status is judged first.
        let body: Option<Value> = response.json().await.ok();
        classify_attempt(status, body.as_ref())
    }
}

#[derive(Debug, PartialEq, Eq)]
struct Attempt {
    error: TaskError,
    retryable: bool,
}

impl Attempt {
    fn retryable(error: TaskError) -> Self {
        Self { error, retryable: true }
    }

    fn fatal(error: TaskError) -> Self {
        Self { error, retryable: false }
    }
}

#[async_trait]
impl TaskGateway for BitrixClient {
    async fn create_task(&self, request: &TaskRequest) -> Result<TaskId, TaskError> {
        let mut last_error = TaskError::MalformedResponse;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_millis(250 * u64::from(attempt))).await;
            }
            match self.post_once(request).await {
                Ok(task_id) => {
                    debug!(task_id = task_id.0, attempt, "bitrix task created");
                    return Ok(task_id);
                }
                Err(attempt_error) if attempt_error.retryable => {
                    warn!(attempt, error = %attempt_error.error, "bitrix request failed, will retry");
                    last_error = attempt_error.error;
                }
                Err(attempt_error) => return Err(attempt_error.error),
            }
        }
        Err(last_error)
    }
}

fn map_request_error(error: reqwest::Error) -> TaskError {
    if error.is_timeout() {
        TaskError::Timeout
    } else {
        TaskError::Connection(error.to_string())
    }
}

/// Maps a Bitrix response to a task id or a classified failed attempt.
/// Non-2xx is always `Api` (the body, JSON or not, only contributes
/// detail text) and server errors stay retryable; `MalformedResponse` is
/// reserved for a 2xx body missing the `result.task.id` success marker.
fn classify_attempt(status: StatusCode, body: Option<&Value>) -> Result<TaskId, Attempt> {
    if !status.is_success() {
        let detail = body.and_then(api_error_text).unwrap_or_else(|| {
            format!("request rejected with HTTP {}", status.as_u16())
        });
        let error = TaskError::Api(detail);
        return Err(if status.is_server_error() {
            // Worth another attempt; anything the portal rejected
            // outright will fail the same way again.
            Attempt::retryable(error)
        } else {
            Attempt::fatal(error)
        });
    }

    let Some(body) = body else {
        return Err(Attempt::fatal(TaskError::MalformedResponse));
    };
    if let Some(message) = api_error_text(body) {
        return Err(Attempt::fatal(TaskError::Api(message)));
    }
    match parse_task_id(body) {
        Some(id) => Ok(TaskId(id)),
        None => Err(Attempt::fatal(TaskError::MalformedResponse)),
    }
}

fn api_error_text(body: &Value) -> Option<String> {
    let description = body.get("error_description").and_then(Value::as_str);
    let code = body.get("error").and_then(Value::as_str);
    match (description, code) {
        (Some(text), _) if !text.is_empty() => Some(text.to_owned()),
        (_, Some(code)) => Some(code.to_owned()),
        _ => None,
    }
}

/// The portal returns the id as a JSON number on some deployments and as
/// a numeric string on others.
fn parse_task_id(body: &Value) -> Option<i64> {
    let id = body.get("result")?.get("task")?.get("id")?;
    match id {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use reqwest::StatusCode;
    use serde_json::json;

    use courierbot_core::domain::ReportKind;
    use courierbot_core::task::{TaskError, TaskId, TaskRequest};

    use super::{classify_attempt, Attempt, BitrixClient};

    #[test]
    fn numeric_task_id_is_accepted() {
        let body = json!({"result": {"task": {"id": 4211}}});
        assert_eq!(classify_attempt(StatusCode::OK, Some(&body)), Ok(TaskId(4211)));
    }

    #[test]
    fn string_task_id_is_accepted() {
        let body = json!({"result": {"task": {"id": "4211"}}});
        assert_eq!(classify_attempt(StatusCode::OK, Some(&body)), Ok(TaskId(4211)));
    }

    #[test]
    fn error_body_on_success_status_is_a_fatal_failure() {
        let body = json!({"error": "ERROR_TASK_ADD", "error_description": "Access denied"});
        assert_eq!(
            classify_attempt(StatusCode::OK, Some(&body)),
            Err(Attempt::fatal(TaskError::Api("Access denied".to_owned())))
        );
    }

    #[test]
    fn rejection_without_description_falls_back_to_the_code() {
        let body = json!({"error": "QUERY_LIMIT_EXCEEDED"});
        assert_eq!(
            classify_attempt(StatusCode::BAD_REQUEST, Some(&body)),
            Err(Attempt::fatal(TaskError::Api("QUERY_LIMIT_EXCEEDED".to_owned())))
        );
    }

    #[test]
    fn server_error_with_a_non_json_body_stays_a_retryable_api_failure() {
        // Proxy error pages are HTML, so no parsed body reaches us.
        assert_eq!(
            classify_attempt(StatusCode::BAD_GATEWAY, None),
            Err(Attempt::retryable(TaskError::Api(
                "request rejected with HTTP 502".to_owned()
            )))
        );
    }

    #[test]
    fn server_error_with_json_detail_is_retryable_with_that_detail() {
        let body = json!({"error_description": "Temporary portal maintenance"});
        assert_eq!(
            classify_attempt(StatusCode::INTERNAL_SERVER_ERROR, Some(&body)),
            Err(Attempt::retryable(TaskError::Api(
                "Temporary portal maintenance".to_owned()
            )))
        );
    }

    #[test]
    fn client_rejection_without_any_detail_names_the_status_and_is_fatal() {
        let body = json!({});
        assert_eq!(
            classify_attempt(StatusCode::FORBIDDEN, Some(&body)),
            Err(Attempt::fatal(TaskError::Api("request rejected with HTTP 403".to_owned())))
        );
    }

    #[test]
    fn malformed_response_is_reserved_for_success_statuses() {
        let body = json!({"result": {"task": {}}});
        assert_eq!(
            classify_attempt(StatusCode::OK, Some(&body)),
            Err(Attempt::fatal(TaskError::MalformedResponse))
        );
        assert_eq!(
            classify_attempt(StatusCode::OK, None),
            Err(Attempt::fatal(TaskError::MalformedResponse))
        );
    }

    #[test]
    fn form_fields_carry_the_portal_field_names() {
        let request = TaskRequest {
            kind: ReportKind::Refusal,
            title: "Delivery refusal".to_owned(),
            description: "Client: 12345\nRoute: Moscow-3\nComment: ok".to_owned(),
            responsible_id: 17,
            deadline: Utc.with_ymd_and_hms(2026, 3, 17, 9, 30, 0).single().expect("valid date"),
            project_id: 101,
        };

        let fields = BitrixClient::form_fields(&request);
        let keys: Vec<&str> = fields.iter().map(|(k, _)| *k).collect();
        assert_eq!(
            keys,
            vec![
                "fields[TITLE]",
                "fields[DESCRIPTION]",
                "fields[RESPONSIBLE_ID]",
                "fields[DEADLINE]",
                "fields[GROUP_ID]",
            ]
        );
        assert_eq!(fields[3].1, "2026-03-17 09:30:00");
        assert_eq!(fields[4].1, "101");
    }
}
