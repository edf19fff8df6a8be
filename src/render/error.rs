//! Error rendering for genflow.
//!
//! Human mode prints a single `error[CODE]: message` line; JSON mode emits a
//! structured object for machine consumption.

use crate::cli::args::OutputFormat;
use crate::error::GenError;

/// Render an error for stderr.
#[must_use]
pub fn render_error(error: &GenError, format: OutputFormat, pretty: bool) -> String {
    match format {
        OutputFormat::Human => render_simple(error),
        OutputFormat::Json => render_error_json(error, pretty),
    }
}

/// Render error as structured JSON.
#[must_use]
pub fn render_error_json(error: &GenError, pretty: bool) -> String {
    let body = ErrorJson::from_error(error);
    let rendered = if pretty {
        serde_json::to_string_pretty(&body)
    } else {
        serde_json::to_string(&body)
    };
    rendered.unwrap_or_else(|_| render_simple(error))
}

fn render_simple(error: &GenError) -> String {
    format!("error[{}]: {error}", error.error_code())
}

/// JSON representation of an error.
#[derive(serde::Serialize)]
struct ErrorJson {
    error_code: &'static str,
    kind: &'static str,
    message: String,
    exit_code: i32,
}

impl ErrorJson {
    fn from_error(error: &GenError) -> Self {
        Self {
            error_code: error.error_code(),
            kind: error.kind().description(),
            message: error.to_string(),
            exit_code: error.exit_code().into(),
        }
    }
}
