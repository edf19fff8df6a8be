//! Output rendering for human and robot modes.

pub mod error;
pub mod human;
pub mod robot;

use crate::cli::args::OutputFormat;
use crate::core::models::{CreditBalance, GenerationOutput};
use crate::error::Result;

/// Balance of one pooled account, identified by fingerprint.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountCredit {
    pub fingerprint: String,
    pub balance: CreditBalance,
}

/// Render generated URLs.
///
/// # Errors
/// Fails only if JSON serialization fails.
pub fn render_generation(
    output: &GenerationOutput,
    created: i64,
    format: OutputFormat,
    pretty: bool,
) -> Result<String> {
    match format {
        OutputFormat::Human => Ok(human::render_generation(output)),
        OutputFormat::Json => robot::render_generation_json(output, created, pretty),
    }
}

/// Render per-account credit balances.
///
/// # Errors
/// Fails only if JSON serialization fails.
pub fn render_credit(accounts: &[AccountCredit], format: OutputFormat, pretty: bool) -> Result<String> {
    match format {
        OutputFormat::Human => Ok(human::render_credit(accounts)),
        OutputFormat::Json => robot::render_credit_json(accounts, pretty),
    }
}

/// Render an uploaded image reference.
///
/// # Errors
/// Fails only if JSON serialization fails.
pub fn render_upload(url: &str, format: OutputFormat, pretty: bool) -> Result<String> {
    match format {
        OutputFormat::Human => Ok(url.to_string()),
        OutputFormat::Json => robot::render_upload_json(url, pretty),
    }
}
