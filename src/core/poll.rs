//! Poll-until-terminal state machine.
//!
//! Image kinds and video report progress in different vocabularies:
//!
//! | kind  | in progress            | success               | failure |
//! |-------|------------------------|-----------------------|---------|
//! | image | `20`                   | anything but 20 or 30 | `30`    |
//! | video | `PENDING`, `RUNNING`   | `SUCCESS`             | `FAILED`|
//!
//! The loop waits a fixed interval before every status query and has no
//! deadline of its own: it ends on a terminal status, on the first failed
//! query, or when the caller's cancellation token fires.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use super::credentials::Credential;
use super::http::{RequestParts, Transport};
use super::models::{Job, JobKind, JobStatus};
use crate::error::{GenError, Result};

/// Default delay between status queries.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

pub const HISTORY_BY_IDS_PATH: &str = "/mweb/v1/get_history_by_ids";
pub const TASK_STATUS_PATH: &str = "/mweb/v1/get_task_status";

const IMAGE_IN_PROGRESS: i64 = 20;
const IMAGE_FAILED: i64 = 30;

/// Image fail code for a content-policy rejection.
pub const CONTENT_FILTERED_FAIL_CODE: &str = "2038";

/// One decoded status observation.
#[derive(Debug, Clone, PartialEq)]
enum Observation {
    InProgress(JobStatus),
    Succeeded(Value),
    Failed(Option<String>),
    Unrecognised(String),
}

/// Polls a submitted job until it reaches a terminal status.
#[derive(Clone)]
pub struct PollLoop {
    transport: Arc<dyn Transport>,
    interval: Duration,
    assistant_id: u32,
}

impl PollLoop {
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, interval: Duration, assistant_id: u32) -> Self {
        Self {
            transport,
            interval,
            assistant_id,
        }
    }

    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Poll `job` to completion and return its terminal success record.
    ///
    /// `hint` is the status hint produced alongside the submission.
    ///
    /// # Errors
    /// - [`GenError::Cancelled`] once `cancel` fires; no further queries are issued.
    /// - [`GenError::RecordMissing`] or any transport error from a status query.
    /// - [`GenError::ContentFiltered`] / [`GenError::GenerationFailed`] on a
    ///   failed job.
    /// - [`GenError::ResultMissing`] for an unrecognised video status.
    pub async fn run(
        &self,
        mut job: Job,
        hint: &Value,
        credential: &Credential,
        cancel: &CancellationToken,
    ) -> Result<Value> {
        let mut attempt: u32 = 0;
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(self.cancelled(&job, attempt)),
                () = tokio::time::sleep(self.interval) => {}
            }

            let data = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(self.cancelled(&job, attempt)),
                result = self.query(&job, hint, credential) => result?,
            };
            attempt += 1;

            match decode(&job, data)? {
                Observation::InProgress(status) => {
                    if !job.advance(status) {
                        tracing::debug!(
                            job_id = %job.id,
                            reported = ?status,
                            current = ?job.status(),
                            "Ignoring status regression"
                        );
                    }
                    tracing::debug!(job_id = %job.id, attempt, status = ?job.status(), "Job still in progress");
                }
                Observation::Succeeded(record) => {
                    job.advance(JobStatus::Succeeded);
                    tracing::info!(kind = %job.kind, job_id = %job.id, attempts = attempt, "Job succeeded");
                    return Ok(record);
                }
                Observation::Failed(fail_code) => {
                    job.advance(JobStatus::Failed);
                    tracing::warn!(
                        kind = %job.kind,
                        job_id = %job.id,
                        fail_code = fail_code.as_deref().unwrap_or("-"),
                        "Job failed"
                    );
                    return Err(failure(job.kind, fail_code));
                }
                Observation::Unrecognised(status) => {
                    tracing::warn!(job_id = %job.id, status = %status, "Unrecognised video status");
                    return Err(GenError::ResultMissing { job_id: job.id });
                }
            }
        }
    }

    fn cancelled(&self, job: &Job, attempts: u32) -> GenError {
        tracing::info!(job_id = %job.id, attempts, interval_ms = self.interval.as_millis(), "Polling cancelled");
        GenError::Cancelled
    }

    async fn query(&self, job: &Job, hint: &Value, credential: &Credential) -> Result<Value> {
        if job.kind.is_image_like() {
            let body = json!({
                "history_ids": [job.id],
                "image_info": hint,
                "http_common_info": { "aid": self.assistant_id },
            });
            self.transport
                .call(
                    Method::POST,
                    HISTORY_BY_IDS_PATH,
                    credential,
                    RequestParts::new().json(body),
                )
                .await
        } else {
            let common_info = match hint {
                Value::String(s) => s.clone(),
                Value::Null => json!({ "aid": self.assistant_id }).to_string(),
                other => other.to_string(),
            };
            self.transport
                .call(
                    Method::GET,
                    TASK_STATUS_PATH,
                    credential,
                    RequestParts::new()
                        .param("task_id", job.id.clone())
                        .param("http_common_info", common_info),
                )
                .await
        }
    }
}

fn decode(job: &Job, data: Value) -> Result<Observation> {
    match job.kind {
        JobKind::Image | JobKind::ReferenceImageEdit => decode_image(&job.id, data),
        JobKind::Video => decode_video(&job.id, data),
    }
}

fn decode_image(job_id: &str, mut data: Value) -> Result<Observation> {
    let record = match data.get_mut(job_id) {
        Some(record) if !record.is_null() => record.take(),
        _ => {
            return Err(GenError::RecordMissing {
                job_id: job_id.to_string(),
            });
        }
    };

    let status = record.get("status").and_then(as_code);
    Ok(match status {
        Some(IMAGE_IN_PROGRESS) => Observation::InProgress(JobStatus::Running),
        Some(IMAGE_FAILED) => Observation::Failed(fail_code(&record)),
        _ => Observation::Succeeded(record),
    })
}

fn decode_video(job_id: &str, data: Value) -> Result<Observation> {
    let Some(status) = data.get("status").and_then(Value::as_str) else {
        return Err(GenError::RecordMissing {
            job_id: job_id.to_string(),
        });
    };
    Ok(match status {
        "PENDING" => Observation::InProgress(JobStatus::Pending),
        "RUNNING" => Observation::InProgress(JobStatus::Running),
        "SUCCESS" => Observation::Succeeded(data),
        "FAILED" => Observation::Failed(fail_code(&data)),
        other => Observation::Unrecognised(other.to_string()),
    })
}

fn as_code(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn fail_code(record: &Value) -> Option<String> {
    match record.get("fail_code")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn failure(kind: JobKind, fail_code: Option<String>) -> GenError {
    match fail_code {
        Some(code) if kind.is_image_like() && code == CONTENT_FILTERED_FAIL_CODE => {
            GenError::ContentFiltered { fail_code: code }
        }
        fail_code => GenError::GenerationFailed {
            kind: kind.label().to_string(),
            fail_code,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::test_utils::ScriptedTransport;

    const FAST: Duration = Duration::from_millis(1);

    fn image_job() -> Job {
        Job::new(JobKind::Image, "h1".into())
    }

    fn video_job() -> Job {
        Job::new(JobKind::Video, "t1".into())
    }

    fn image_status(status: i64, fail_code: &str) -> Value {
        json!({"h1": {"status": status, "fail_code": fail_code, "item_list": []}})
    }

    async fn run(
        transport: Arc<ScriptedTransport>,
        job: Job,
        cancel: &CancellationToken,
    ) -> Result<Value> {
        PollLoop::new(transport, FAST, 513_695)
            .run(job, &Value::Null, &Credential::new("t"), cancel)
            .await
    }

    #[test]
    fn image_failure_codes() {
        assert!(matches!(
            failure(JobKind::Image, Some("2038".into())),
            GenError::ContentFiltered { .. }
        ));
        assert!(matches!(
            failure(JobKind::ReferenceImageEdit, Some("9999".into())),
            GenError::GenerationFailed { .. }
        ));
        assert!(matches!(
            failure(JobKind::Video, Some("2038".into())),
            GenError::GenerationFailed { .. }
        ));
    }

    #[test]
    fn numeric_fail_code_is_normalised() {
        assert_eq!(fail_code(&json!({"fail_code": 2038})).as_deref(), Some("2038"));
        assert_eq!(fail_code(&json!({"fail_code": ""})), None);
        assert_eq!(fail_code(&json!({})), None);
    }

    #[test]
    fn image_status_other_than_20_or_30_is_success() {
        let obs = decode_image("h1", image_status(50, "")).unwrap();
        assert!(matches!(obs, Observation::Succeeded(_)));
        let obs = decode_image("h1", json!({"h1": {"status": "20"}})).unwrap();
        assert_eq!(obs, Observation::InProgress(JobStatus::Running));
    }

    #[tokio::test]
    async fn image_filtered_after_progress() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_ok(HISTORY_BY_IDS_PATH, image_status(20, ""));
        transport.push_ok(HISTORY_BY_IDS_PATH, image_status(20, ""));
        transport.push_ok(HISTORY_BY_IDS_PATH, image_status(30, "2038"));

        let err = run(transport.clone(), image_job(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ContentFiltered);
        assert_eq!(transport.calls_to(HISTORY_BY_IDS_PATH), 3);
    }

    #[tokio::test]
    async fn image_other_fail_code_is_generation_failure() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_ok(HISTORY_BY_IDS_PATH, image_status(20, ""));
        transport.push_ok(HISTORY_BY_IDS_PATH, image_status(20, ""));
        transport.push_ok(HISTORY_BY_IDS_PATH, image_status(30, "9999"));

        let err = run(transport, image_job(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::GenerationFailed);
    }

    #[tokio::test]
    async fn image_query_sends_hint_and_id() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_ok(HISTORY_BY_IDS_PATH, image_status(50, ""));
        let hint = json!({"format": "webp"});
        PollLoop::new(transport.clone(), FAST, 7)
            .run(image_job(), &hint, &Credential::new("t"), &CancellationToken::new())
            .await
            .unwrap();

        let body = transport.calls()[0].parts.json_body().cloned().unwrap();
        assert_eq!(body["history_ids"], json!(["h1"]));
        assert_eq!(body["image_info"], hint);
        assert_eq!(body["http_common_info"]["aid"], 7);
    }

    #[tokio::test]
    async fn missing_record_is_fatal_without_retry() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_ok(HISTORY_BY_IDS_PATH, json!({"other": {}}));

        let err = run(transport.clone(), image_job(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, GenError::RecordMissing { .. }));
        assert_eq!(transport.calls_to(HISTORY_BY_IDS_PATH), 1);
    }

    #[tokio::test]
    async fn video_progresses_to_success() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_ok(TASK_STATUS_PATH, json!({"status": "PENDING"}));
        transport.push_ok(TASK_STATUS_PATH, json!({"status": "RUNNING"}));
        transport.push_ok(
            TASK_STATUS_PATH,
            json!({"status": "SUCCESS", "result": {"video_url": "https://v/1.mp4"}}),
        );

        let record = run(transport.clone(), video_job(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(record["result"]["video_url"], "https://v/1.mp4");

        let call = &transport.calls()[0];
        assert_eq!(call.method, Method::GET);
        assert_eq!(call.parts.param_value("task_id"), Some("t1"));
        assert_eq!(
            call.parts.param_value("http_common_info"),
            Some(r#"{"aid":513695}"#)
        );
    }

    #[tokio::test]
    async fn video_regression_is_ignored() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_ok(TASK_STATUS_PATH, json!({"status": "RUNNING"}));
        transport.push_ok(TASK_STATUS_PATH, json!({"status": "PENDING"}));
        transport.push_ok(TASK_STATUS_PATH, json!({"status": "FAILED"}));

        let err = run(transport, video_job(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::GenerationFailed);
    }

    #[tokio::test]
    async fn unknown_video_status_is_result_missing() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_ok(TASK_STATUS_PATH, json!({"status": "ARCHIVED"}));

        let err = run(transport, video_job(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResultMissing);
    }

    #[tokio::test]
    async fn video_response_without_status_is_missing_record() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_ok(TASK_STATUS_PATH, json!({}));

        let err = run(transport, video_job(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Upstream);
    }

    #[tokio::test]
    async fn cancelled_token_stops_before_querying() {
        let transport = Arc::new(ScriptedTransport::new());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = PollLoop::new(transport.clone(), Duration::from_secs(60), 1)
            .run(video_job(), &Value::Null, &Credential::new("t"), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, GenError::Cancelled));
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn cancellation_interrupts_a_long_wait() {
        let transport = Arc::new(ScriptedTransport::new());
        for _ in 0..3 {
            transport.push_ok(TASK_STATUS_PATH, json!({"status": "RUNNING"}));
        }
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let err = PollLoop::new(transport, Duration::from_secs(30), 1)
            .run(video_job(), &Value::Null, &Credential::new("t"), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, GenError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
