//! Credential pool and per-call credential selection.
//!
//! A pool is the caller-supplied set of account session tokens. Each
//! orchestration call draws one credential uniformly at random; nothing is
//! remembered between calls.

use std::fmt;

use rand::seq::IndexedRandom;
use sha2::{Digest, Sha256};

use crate::error::{GenError, Result};

/// Opaque account session token.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Credential(String);

impl Credential {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for the transport only.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Short stable fingerprint safe to put in logs.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.0.as_bytes());
        hex::encode(&digest[..4])
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential({})", self.fingerprint())
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cred:{}", self.fingerprint())
    }
}

/// Read-only set of credentials supplied per call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialPool {
    credentials: Vec<Credential>,
}

impl CredentialPool {
    #[must_use]
    pub fn new(credentials: Vec<Credential>) -> Self {
        Self { credentials }
    }

    /// Build a pool from raw token strings, skipping blanks.
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new(
            tokens
                .into_iter()
                .map(|t| t.as_ref().trim().to_string())
                .filter(|t| !t.is_empty())
                .map(Credential)
                .collect(),
        )
    }

    /// Parse an `Authorization` header value of the form
    /// `Bearer token1,token2,...`.
    #[must_use]
    pub fn from_authorization(header: &str) -> Self {
        let header = header.trim();
        let tokens = header
            .strip_prefix("Bearer")
            .or_else(|| header.strip_prefix("bearer"))
            .unwrap_or(header);
        Self::from_tokens(tokens.split(','))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Credential> {
        self.credentials.iter()
    }

    /// Pick one credential uniformly at random.
    ///
    /// # Errors
    /// Returns [`GenError::EmptyCredentialPool`] when the pool has no members.
    pub fn select(&self) -> Result<&Credential> {
        let chosen = self
            .credentials
            .choose(&mut rand::rng())
            .ok_or(GenError::EmptyCredentialPool)?;
        tracing::debug!(
            credential = %chosen.fingerprint(),
            pool_size = self.credentials.len(),
            "Selected credential"
        );
        Ok(chosen)
    }
}
