//! Test utilities for genflow.
//!
//! Provides a scripted [`Transport`], a deterministic [`IdSource`], response
//! factories, and assertion macros for use across all test modules.
//!
//! # Usage
//!
//! ```rust,ignore
//! use genflow::test_utils::*;
//!
//! let transport = Arc::new(ScriptedTransport::new());
//! transport.push_ok("/commerce/v1/benefits/user_credit", make_test_credit_response(10));
//! let dir = TestDir::new();
//! dir.create_file("config.toml", "[general]\ntimeout_seconds = 30");
//! ```

use std::collections::{HashMap, VecDeque};
use std::fs;
use std::io::{self, Write as IoWrite};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use clap::Parser;
use reqwest::Method;
use serde_json::{Value, json};

use crate::cli::args::Cli;
use crate::core::builder::{IdSource, SEED_RANGE};
use crate::core::credentials::Credential;
use crate::core::http::{RequestParts, Transport};
use crate::error::{GenError, Result};
use crate::storage::{Config, ResolvedConfig};

// =============================================================================
// Scripted Transport
// =============================================================================

/// A call observed by [`ScriptedTransport`].
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: Method,
    pub target: String,
    pub credential: Credential,
    pub parts: RequestParts,
}

/// In-memory [`Transport`] that replays queued responses per target and
/// records every call.
///
/// A call to a target with no queued response fails with an upstream error.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    responses: Mutex<HashMap<String, VecDeque<Result<Value>>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful (already unwrapped) response for `target`.
    pub fn push_ok(&self, target: &str, data: Value) {
        self.push(target, Ok(data));
    }

    /// Queue a failure for `target`.
    pub fn push_err(&self, target: &str, err: GenError) {
        self.push(target, Err(err));
    }

    fn push(&self, target: &str, response: Result<Value>) {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(target.to_string())
            .or_default()
            .push_back(response);
    }

    /// All calls so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Targets of all calls so far, in order.
    #[must_use]
    pub fn targets(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.target).collect()
    }

    /// Number of calls made to `target`.
    #[must_use]
    pub fn calls_to(&self, target: &str) -> usize {
        self.calls().iter().filter(|c| c.target == target).count()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn call(
        &self,
        method: Method,
        target: &str,
        credential: &Credential,
        parts: RequestParts,
    ) -> Result<Value> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedCall {
                method: method.clone(),
                target: target.to_string(),
                credential: credential.clone(),
                parts,
            });

        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(target)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| {
                Err(GenError::upstream(
                    format!("{method} {target}"),
                    "no scripted response",
                ))
            })
    }
}

// =============================================================================
// Deterministic Identifiers
// =============================================================================

/// [`IdSource`] producing `id-0001`, `id-0002`, … and seeds counting up from
/// the start of the seed range.
#[derive(Debug, Default)]
pub struct SequentialIds {
    next_id: AtomicU64,
    next_seed: AtomicU64,
}

impl SequentialIds {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdSource for SequentialIds {
    fn node_id(&self) -> String {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        format!("id-{n:04}")
    }

    fn seed(&self) -> u64 {
        SEED_RANGE.start + self.next_seed.fetch_add(1, Ordering::Relaxed)
    }
}

// =============================================================================
// Response Factories
// =============================================================================

/// Unwrapped balance response with the whole balance in the gift bucket.
#[must_use]
pub fn make_test_credit_response(gift: i64) -> Value {
    json!({"credit": {"gift_credit": gift, "purchase_credit": 0, "vip_credit": 0}})
}

/// Unwrapped image history response for `history_id`.
///
/// Each entry of `items` is a full-resolution URL; `None` yields an item with
/// no URL at all.
#[must_use]
pub fn make_test_image_history(history_id: &str, status: i64, items: &[Option<&str>]) -> Value {
    let item_list: Vec<Value> = items
        .iter()
        .map(|url| match url {
            Some(url) => json!({"image": {"large_images": [{"image_url": url}]}}),
            None => json!({}),
        })
        .collect();
    json!({ history_id: {"status": status, "fail_code": "", "item_list": item_list} })
}

/// Wrap `data` in the service's success envelope.
#[must_use]
pub fn make_test_envelope(data: Value) -> Value {
    json!({"ret": "0", "errmsg": "success", "data": data})
}

/// Sample config TOML content.
#[must_use]
pub fn make_test_config_toml() -> String {
    r#"[general]
timeout_seconds = 15
poll_interval_ms = 250

[service]
base_url = "http://127.0.0.1:1"

[models.image]
default = "jimeng-2.0"

[models.video.entries]
"jimeng-video-3.0" = 3
"#
    .to_string()
}

/// Resolved configuration with built-in defaults and the given tokens, as if
/// passed through `--token`.
///
/// # Panics
///
/// Panics if the default configuration fails to resolve.
#[must_use]
pub fn make_test_resolved_config(tokens: &[&str]) -> ResolvedConfig {
    let cli = Cli::try_parse_from(["genflow", "credit"]).expect("Failed to parse test CLI");
    let mut resolved = ResolvedConfig::resolve_from(&cli, &Config::default(), |_| None)
        .expect("Failed to resolve test config");
    resolved.tokens = tokens.iter().map(|t| (*t).to_string()).collect();
    resolved
}

// =============================================================================
// Temporary Directories
// =============================================================================

/// Isolated temporary directory removed on drop.
///
/// # Examples
///
/// ```rust,ignore
/// use genflow::test_utils::TestDir;
///
/// let dir = TestDir::new();
/// dir.create_file("config.toml", "[general]\ntimeout_seconds = 30");
/// assert!(dir.file_exists("config.toml"));
/// ```
pub struct TestDir {
    inner: tempfile::TempDir,
}

impl TestDir {
    /// Create a new isolated temporary directory.
    ///
    /// # Panics
    ///
    /// Panics if the temporary directory cannot be created.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: tempfile::tempdir().expect("Failed to create temp directory"),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.inner.path()
    }

    /// Create a file with the given content, creating parent directories as needed.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be created or written.
    pub fn create_file(&self, name: &str, content: &str) {
        self.create_binary_file(name, content.as_bytes());
    }

    /// Create a file with raw bytes.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be created or written.
    pub fn create_binary_file(&self, name: &str, content: &[u8]) {
        let path = self.inner.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        let mut file = fs::File::create(&path).expect("Failed to create test file");
        file.write_all(content).expect("Failed to write test file");
    }

    /// Read a file from the temporary directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn read_file(&self, name: &str) -> io::Result<String> {
        fs::read_to_string(self.inner.path().join(name))
    }

    #[must_use]
    pub fn file_exists(&self, name: &str) -> bool {
        self.inner.path().join(name).exists()
    }

    #[must_use]
    pub fn file_path(&self, name: &str) -> PathBuf {
        self.inner.path().join(name)
    }
}

impl Default for TestDir {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Assertion Macros
// =============================================================================

/// Assert that a string contains a substring.
///
/// # Examples
///
/// ```rust,ignore
/// use genflow::assert_contains;
///
/// assert_contains!("Hello, world!", "world");
/// ```
#[macro_export]
macro_rules! assert_contains {
    ($haystack:expr, $needle:expr) => {
        let haystack = $haystack;
        let needle = $needle;
        assert!(
            haystack.contains(needle),
            "Expected string to contain {:?}\n\nActual string:\n{:?}",
            needle,
            haystack
        );
    };
}

/// Assert that a string does NOT contain a substring.
#[macro_export]
macro_rules! assert_not_contains {
    ($haystack:expr, $needle:expr) => {
        let haystack = $haystack;
        let needle = $needle;
        assert!(
            !haystack.contains(needle),
            "Expected string NOT to contain {:?}\n\nActual string:\n{:?}",
            needle,
            haystack
        );
    };
}

/// Assert that a string is valid JSON and matches the expected value.
#[macro_export]
macro_rules! assert_json_eq {
    ($json:expr, $expected:expr) => {
        let parsed: serde_json::Value = serde_json::from_str($json).expect("Invalid JSON");
        let expected: serde_json::Value = $expected;
        assert_eq!(
            parsed,
            expected,
            "JSON mismatch\n\nExpected:\n{}\n\nActual:\n{}",
            serde_json::to_string_pretty(&expected).unwrap(),
            serde_json::to_string_pretty(&parsed).unwrap()
        );
    };
}
