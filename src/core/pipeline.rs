//! Generation orchestration pipeline.
//!
//! Composes the stages of one generation call:
//! credential selection → credit gate → payload build → submit → poll →
//! result extraction. Every stage failure aborts the call; only "still in
//! progress" is retried, by the poll cadence.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::builder::{IdSource, JobBuilder};
use super::catalog::ModelCatalog;
use super::credentials::{Credential, CredentialPool};
use super::credit::CreditGate;
use super::extract;
use super::http::{DEFAULT_ASSISTANT_ID, Transport};
use super::models::{
    GenerationOutput, ImageParams, JobRequest, ReferenceParams, VideoParams,
};
use super::poll::{DEFAULT_POLL_INTERVAL, PollLoop};
use super::submit::JobSubmitter;
use crate::error::{GenError, Result};

/// Runs generation jobs against the service.
///
/// Holds no per-call state: concurrent calls on one orchestrator are
/// independent.
#[derive(Clone)]
pub struct Orchestrator {
    builder: JobBuilder,
    credit: CreditGate,
    submitter: JobSubmitter,
    poller: PollLoop,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("builder", &self.builder)
            .field("poll_interval", &self.poller.interval())
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Orchestrator using the default assistant id and random identifiers.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, catalog: ModelCatalog, poll_interval: Duration) -> Self {
        Self::with_assistant_id(transport, catalog, poll_interval, DEFAULT_ASSISTANT_ID)
    }

    #[must_use]
    pub fn with_assistant_id(
        transport: Arc<dyn Transport>,
        catalog: ModelCatalog,
        poll_interval: Duration,
        assistant_id: u32,
    ) -> Self {
        Self {
            builder: JobBuilder::new(catalog, assistant_id),
            credit: CreditGate::new(Arc::clone(&transport)),
            submitter: JobSubmitter::new(Arc::clone(&transport)),
            poller: PollLoop::new(transport, poll_interval, assistant_id),
        }
    }

    /// Orchestrator with the default catalog and poll interval.
    #[must_use]
    pub fn with_defaults(transport: Arc<dyn Transport>) -> Self {
        Self::new(transport, ModelCatalog::default(), DEFAULT_POLL_INTERVAL)
    }

    /// Replace the identifier source used for payload construction.
    #[must_use]
    pub fn with_id_source(mut self, ids: Arc<dyn IdSource>) -> Self {
        self.builder = self.builder.with_id_source(ids);
        self
    }

    #[must_use]
    pub const fn builder(&self) -> &JobBuilder {
        &self.builder
    }

    /// Run one request to completion.
    ///
    /// # Errors
    /// Fails with the first error of any stage; see [`GenError`]. Returns
    /// [`GenError::Cancelled`] as soon as `cancel` fires.
    pub async fn orchestrate(
        &self,
        request: &JobRequest,
        pool: &CredentialPool,
        cancel: &CancellationToken,
    ) -> Result<GenerationOutput> {
        let credential = pool.select()?;
        let span = tracing::info_span!(
            "orchestrate",
            kind = %request.kind(),
            credential = %credential.fingerprint()
        );

        async {
            let start = Instant::now();
            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => Err(GenError::Cancelled),
                result = self.run(request, credential, cancel) => result,
            };
            let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
            match &result {
                Ok(output) => tracing::info!(duration_ms, results = output.urls().len(), "Generation complete"),
                Err(e) => tracing::warn!(duration_ms, code = e.error_code(), error = %e, "Generation failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run(
        &self,
        request: &JobRequest,
        credential: &Credential,
        cancel: &CancellationToken,
    ) -> Result<GenerationOutput> {
        self.credit.ensure_credit(credential).await?;
        let submission = self.builder.build(request)?;
        let job = self.submitter.submit(&submission, credential).await?;
        let job_id = job.id.clone();
        let record = self
            .poller
            .run(job, &submission.status_hint, credential, cancel)
            .await?;
        extract::extract(request.kind(), &job_id, &record)
    }

    /// Text-to-image generation.
    ///
    /// # Errors
    /// See [`Orchestrator::orchestrate`].
    pub async fn generate_images(
        &self,
        model: Option<String>,
        prompt: &str,
        params: ImageParams,
        pool: &CredentialPool,
        cancel: &CancellationToken,
    ) -> Result<Vec<Option<String>>> {
        let request = JobRequest::image(model, prompt, params);
        self.orchestrate(&request, pool, cancel)
            .await
            .map(into_images)
    }

    /// Reference-image edit.
    ///
    /// # Errors
    /// See [`Orchestrator::orchestrate`].
    pub async fn generate_reference_images(
        &self,
        model: Option<String>,
        prompt: &str,
        params: ReferenceParams,
        pool: &CredentialPool,
        cancel: &CancellationToken,
    ) -> Result<Vec<Option<String>>> {
        let request = JobRequest::reference(model, prompt, params);
        self.orchestrate(&request, pool, cancel)
            .await
            .map(into_images)
    }

    /// Image-to-video generation.
    ///
    /// # Errors
    /// See [`Orchestrator::orchestrate`].
    pub async fn generate_video(
        &self,
        model: Option<String>,
        prompt: &str,
        params: VideoParams,
        pool: &CredentialPool,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let request = JobRequest::video(model, prompt, params);
        match self.orchestrate(&request, pool, cancel).await? {
            GenerationOutput::Video(url) => Ok(url),
            GenerationOutput::Images(_) => Err(GenError::Other(anyhow::anyhow!(
                "video request produced image output"
            ))),
        }
    }
}

fn into_images(output: GenerationOutput) -> Vec<Option<String>> {
    match output {
        GenerationOutput::Images(urls) => urls,
        GenerationOutput::Video(url) => vec![Some(url)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::builder::DRAFT_GENERATE_PATH;
    use crate::core::credit::{CREDIT_RECEIVE_PATH, USER_CREDIT_PATH};
    use crate::core::poll::HISTORY_BY_IDS_PATH;
    use crate::error::ErrorKind;
    use crate::test_utils::{ScriptedTransport, SequentialIds};
    use serde_json::json;

    fn orchestrator(transport: &Arc<ScriptedTransport>) -> Orchestrator {
        Orchestrator::new(
            transport.clone(),
            ModelCatalog::default(),
            Duration::from_millis(1),
        )
        .with_id_source(Arc::new(SequentialIds::new()))
    }

    fn pool() -> CredentialPool {
        CredentialPool::from_tokens(["tok-a", "tok-b"])
    }

    #[tokio::test]
    async fn empty_pool_fails_before_any_call() {
        let transport = Arc::new(ScriptedTransport::new());
        let err = orchestrator(&transport)
            .generate_images(
                None,
                "p",
                ImageParams::default(),
                &CredentialPool::default(),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn image_flow_returns_urls_in_order() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_ok(USER_CREDIT_PATH, json!({"credit": {"gift_credit": 3}}));
        transport.push_ok(
            DRAFT_GENERATE_PATH,
            json!({"aigc_data": {"history_record_id": "h1"}}),
        );
        transport.push_ok(HISTORY_BY_IDS_PATH, json!({"h1": {"status": 20}}));
        transport.push_ok(
            HISTORY_BY_IDS_PATH,
            json!({"h1": {"status": 50, "item_list": [
                {"image": {"large_images": [{"image_url": "A"}]}},
                {"common_attr": {"cover_url": "B"}},
                {}
            ]}}),
        );

        let urls = orchestrator(&transport)
            .generate_images(None, "p", ImageParams::default(), &pool(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(urls, vec![Some("A".into()), Some("B".into()), None]);
        assert_eq!(transport.calls_to(CREDIT_RECEIVE_PATH), 0);
        assert_eq!(
            transport.targets(),
            vec![
                USER_CREDIT_PATH,
                DRAFT_GENERATE_PATH,
                HISTORY_BY_IDS_PATH,
                HISTORY_BY_IDS_PATH
            ]
        );
    }

    #[tokio::test]
    async fn replenish_failure_aborts_before_submission() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_ok(USER_CREDIT_PATH, json!({"credit": {}}));
        transport.push_err(CREDIT_RECEIVE_PATH, GenError::HttpStatus {
            operation: "POST credit_receive".into(),
            status: 500,
        });

        let err = orchestrator(&transport)
            .generate_images(None, "p", ImageParams::default(), &pool(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Upstream);
        assert_eq!(transport.calls_to(DRAFT_GENERATE_PATH), 0);
    }

    #[tokio::test]
    async fn missing_history_id_fails_before_polling() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_ok(USER_CREDIT_PATH, json!({"credit": {"vip_credit": 1}}));
        transport.push_ok(DRAFT_GENERATE_PATH, json!({"aigc_data": {}}));

        let err = orchestrator(&transport)
            .generate_images(None, "p", ImageParams::default(), &pool(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, GenError::MissingField { .. }));
        assert_eq!(transport.calls_to(HISTORY_BY_IDS_PATH), 0);
    }

    #[tokio::test]
    async fn cancelled_before_start_is_reported() {
        let transport = Arc::new(ScriptedTransport::new());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = orchestrator(&transport)
            .generate_images(None, "p", ImageParams::default(), &pool(), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, GenError::Cancelled));
    }
}
