//! Shared state for command execution.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::core::credentials::CredentialPool;
use crate::core::http::{HttpTransport, Transport};
use crate::core::pipeline::Orchestrator;
use crate::error::{GenError, Result};
use crate::storage::ResolvedConfig;
use crate::upload::{ImageFile, Uploader};

/// Everything a command needs: resolved settings, the credential pool, a
/// transport, and the cancellation token tied to Ctrl-C.
#[derive(Clone)]
pub struct CommandContext {
    pub config: ResolvedConfig,
    pub pool: CredentialPool,
    pub transport: Arc<dyn Transport>,
    pub cancel: CancellationToken,
}

impl std::fmt::Debug for CommandContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandContext")
            .field("endpoint", &self.config.endpoint)
            .field("accounts", &self.pool.len())
            .finish_non_exhaustive()
    }
}

impl CommandContext {
    /// Build a context backed by [`HttpTransport`].
    ///
    /// # Errors
    /// Fails with [`GenError::EmptyCredentialPool`] when no token is configured,
    /// or if the HTTP client cannot be built.
    pub fn new(config: ResolvedConfig, cancel: CancellationToken) -> Result<Self> {
        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(config.endpoint.clone())?);
        Self::with_transport(config, transport, cancel)
    }

    /// Build a context over an arbitrary transport.
    ///
    /// # Errors
    /// Fails with [`GenError::EmptyCredentialPool`] when no token is configured.
    pub fn with_transport(
        config: ResolvedConfig,
        transport: Arc<dyn Transport>,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let pool = CredentialPool::from_tokens(&config.tokens);
        if pool.is_empty() {
            return Err(GenError::EmptyCredentialPool);
        }
        tracing::debug!(
            accounts = pool.len(),
            source = %config.sources.tokens,
            "Credential pool ready"
        );
        Ok(Self {
            config,
            pool,
            transport,
            cancel,
        })
    }

    #[must_use]
    pub fn orchestrator(&self) -> Orchestrator {
        Orchestrator::with_assistant_id(
            Arc::clone(&self.transport),
            self.config.catalog.clone(),
            self.config.poll_interval,
            self.config.endpoint.assistant_id,
        )
    }

    #[must_use]
    pub fn uploader(&self) -> Uploader {
        Uploader::new(Arc::clone(&self.transport))
    }

    /// Upload `file` with a pooled credential, honouring cancellation.
    ///
    /// # Errors
    /// Propagates validation and upload failures, or [`GenError::Cancelled`].
    pub async fn upload(&self, file: &ImageFile) -> Result<String> {
        let credential = self.pool.select()?;
        let uploader = self.uploader();
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(GenError::Cancelled),
            result = uploader.upload_image(file, credential) => result,
        }
    }
}
