//! Job submission.

use std::sync::Arc;

use serde_json::Value;

use super::builder::Submission;
use super::credentials::Credential;
use super::http::Transport;
use super::models::{Job, JobKind};
use crate::error::{GenError, Result};

/// Sends built submissions and extracts the service-assigned job id.
#[derive(Clone)]
pub struct JobSubmitter {
    transport: Arc<dyn Transport>,
}

impl JobSubmitter {
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Submit once. No retry.
    ///
    /// # Errors
    /// Transport failures propagate; a response without the kind's job id
    /// field fails with [`GenError::MissingField`].
    pub async fn submit(&self, submission: &Submission, credential: &Credential) -> Result<Job> {
        tracing::debug!(
            kind = %submission.kind,
            path = submission.path,
            payload = %submission.body,
            "Submitting job"
        );

        let data = self
            .transport
            .call(
                submission.method.clone(),
                submission.path,
                credential,
                submission.request_parts(),
            )
            .await?;

        let field = job_id_field(submission.kind);
        let id = extract_id(&data, field)
            .ok_or_else(|| GenError::missing_field(format!("submit {}", submission.kind), field))?;

        tracing::info!(kind = %submission.kind, job_id = %id, "Job accepted");
        Ok(Job::new(submission.kind, id))
    }
}

/// Dotted path of the job id in a submission response.
#[must_use]
pub const fn job_id_field(kind: JobKind) -> &'static str {
    match kind {
        JobKind::Image | JobKind::ReferenceImageEdit => "aigc_data.history_record_id",
        JobKind::Video => "aigc_data.task_id",
    }
}

fn extract_id(data: &Value, dotted: &str) -> Option<String> {
    let value = dotted
        .split('.')
        .try_fold(data, |node, key| node.get(key))?;
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
