//! genflow - generation orchestration engine
//!
//! CLI entry point.

#![forbid(unsafe_code)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

use clap::Parser;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;

use genflow::cli::{self, Cli, CommandContext};
use genflow::core::logging::{self, LogSettings};
use genflow::render::error::render_error;
use genflow::storage::{Config, ResolvedConfig};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // The config file feeds the log level, so it is read before logging starts.
    let file_config = Config::load_effective();
    let general = file_config
        .as_ref()
        .map(|config| config.general.clone())
        .unwrap_or_default();
    logging::init(&LogSettings::resolve(&cli, &general, |key| {
        std::env::var(key).ok()
    }));

    let mut format = cli.effective_format();
    let mut pretty = cli.pretty;

    let resolved = file_config.and_then(|config| {
        ResolvedConfig::resolve_from(&cli, &config, |key| std::env::var(key).ok())
    });
    let result = match resolved {
        Ok(config) => {
            format = config.format;
            pretty = config.pretty;
            run(&cli, config).await
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!(code = e.error_code(), "{e}");
            eprintln!("{}", render_error(&e, format, pretty));
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

async fn run(cli: &Cli, config: ResolvedConfig) -> genflow::Result<()> {
    let Some(command) = &cli.command else {
        print_quickstart();
        return Ok(());
    };

    let cancel = CancellationToken::new();
    let ctx = CommandContext::new(config, cancel.clone())?;

    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, cancelling");
            signal_cancel.cancel();
        }
    });

    cli::dispatch(command, &ctx).await
}

/// Print quickstart help when no command is given.
fn print_quickstart() {
    println!(
        r#"genflow - generate images and videos through a hosted generation service

USAGE:
    genflow [OPTIONS] <COMMAND>

COMMANDS:
    image    Generate images from a text prompt
    edit     Generate images guided by a reference image
    video    Generate a video from a first-frame image
    credit   Show the credit balance of every configured account
    upload   Upload an image and print its reference

QUICK START:
    export GENFLOW_TOKENS=<session-token>[,<another>]
    genflow image "a lighthouse at dusk"
    genflow edit "make it snow" --file photo.png
    genflow video "waves rolling in" --image <reference>
    genflow credit

ROBOT MODE:
    genflow image "a cat" --json      # {{"created": ..., "data": [{{"url": ...}}]}}

For more help: genflow --help
"#
    );
}
