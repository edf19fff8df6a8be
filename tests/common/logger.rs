//! Structured test logging.
#![allow(dead_code)]
//!
//! Each integration test creates a `TestLogger`, marks its phases, and
//! finishes with `finish_ok`. Output goes to stderr (shown by
//! `cargo test -- --nocapture`) and is appended to a log file for CI.
//!
//! # Environment Variables
//!
//! - `GENFLOW_TEST_LOG_LEVEL` - trace, debug, info, warn, error (default: info)
//! - `GENFLOW_TEST_LOG_FILE` - output file (default: test-results.log)
//! - `GENFLOW_TEST_LOG_JSON` - "1" or "true" for JSON lines

use std::env;
use std::fmt::Display;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Some(Self::Trace),
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warn),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Trace => "TRACE",
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Serialize)]
struct LogEntry<'a> {
    timestamp: DateTime<Utc>,
    level: LogLevel,
    test: &'a str,
    phase: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<serde_json::Value>,
}

struct Settings {
    min_level: LogLevel,
    json: bool,
    file: Mutex<Option<File>>,
}

fn settings() -> &'static Settings {
    static SETTINGS: OnceLock<Settings> = OnceLock::new();
    SETTINGS.get_or_init(|| {
        let min_level = env::var("GENFLOW_TEST_LOG_LEVEL")
            .ok()
            .and_then(|s| LogLevel::parse(&s))
            .unwrap_or(LogLevel::Info);
        let json = env::var("GENFLOW_TEST_LOG_JSON")
            .is_ok_and(|v| v == "1" || v.eq_ignore_ascii_case("true"));
        let path = env::var("GENFLOW_TEST_LOG_FILE")
            .map_or_else(|_| PathBuf::from("test-results.log"), PathBuf::from);
        let file = OpenOptions::new().create(true).append(true).open(path).ok();
        Settings {
            min_level,
            json,
            file: Mutex::new(file),
        }
    })
}

/// Per-test logger with phase and duration tracking.
pub struct TestLogger {
    test_name: String,
    start: Instant,
    phase: Mutex<String>,
}

impl TestLogger {
    #[must_use]
    pub fn new(test_name: &str) -> Self {
        let logger = Self {
            test_name: test_name.to_string(),
            start: Instant::now(),
            phase: Mutex::new("init".to_string()),
        };
        logger.info("Test starting");
        logger
    }

    /// Common phases: setup, orchestrate, verify.
    pub fn phase(&self, phase: &str) {
        if let Ok(mut current) = self.phase.lock() {
            *current = phase.to_string();
        }
        self.debug(&format!("Phase: {phase}"));
    }

    pub fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message, None, None);
    }

    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message, None, None);
    }

    pub fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, message, None, None);
    }

    pub fn with_context(&self, level: LogLevel, message: &str, context: serde_json::Value) {
        self.log(level, message, None, Some(context));
    }

    /// Record an orchestration outcome.
    pub fn outcome<T: std::fmt::Debug, E: Display>(&self, result: &Result<T, E>) {
        match result {
            Ok(value) => self.info(&format!("Outcome: ok {value:?}")),
            Err(e) => self.info(&format!("Outcome: error {e}")),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.start.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    pub fn finish_ok(&self) {
        let duration_ms = self.elapsed_ms();
        self.log(
            LogLevel::Info,
            &format!("Test passed (duration: {duration_ms}ms)"),
            Some(duration_ms),
            None,
        );
    }

    fn log(
        &self,
        level: LogLevel,
        message: &str,
        duration_ms: Option<u64>,
        context: Option<serde_json::Value>,
    ) {
        let settings = settings();
        if level < settings.min_level {
            return;
        }
        let phase = self
            .phase
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default();
        let timestamp = Utc::now();

        let line = if settings.json {
            let entry = LogEntry {
                timestamp,
                level,
                test: &self.test_name,
                phase: &phase,
                message,
                duration_ms,
                context,
            };
            match serde_json::to_string(&entry) {
                Ok(json) => json,
                Err(_) => return,
            }
        } else {
            let ts = timestamp.format("%Y-%m-%dT%H:%M:%S%.3fZ");
            let mut line = format!("[{ts}] [{level}] [{}:{phase}] {message}", self.test_name);
            if let Some(context) = context {
                line.push(' ');
                line.push_str(&context.to_string());
            }
            line
        };

        eprintln!("{line}");
        if let Ok(mut guard) = settings.file.lock()
            && let Some(file) = guard.as_mut()
        {
            let _ = writeln!(file, "{line}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_parsing() {
        assert_eq!(LogLevel::parse("DEBUG"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::parse("warning"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("loud"), None);
        assert!(LogLevel::Trace < LogLevel::Error);
    }

    #[test]
    fn entry_serialization() {
        let entry = LogEntry {
            timestamp: Utc::now(),
            level: LogLevel::Info,
            test: "t",
            phase: "orchestrate",
            message: "m",
            duration_ms: Some(42),
            context: None,
        };
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"level\":\"INFO\""));
        assert!(json.contains("\"phase\":\"orchestrate\""));
        assert!(json.contains("\"duration_ms\":42"));
    }
}
