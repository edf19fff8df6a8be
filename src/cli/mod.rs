//! CLI argument parsing and command dispatch.

pub mod args;
pub mod context;
pub mod credit;
pub mod generate;
pub mod upload;

pub use args::{Cli, Commands, OutputFormat};
pub use context::CommandContext;

use crate::error::Result;

/// Dispatch a parsed command.
///
/// # Errors
/// Whatever the command returns.
pub async fn dispatch(command: &Commands, ctx: &CommandContext) -> Result<()> {
    match command {
        Commands::Image(args) => generate::execute_image(args, ctx).await,
        Commands::Edit(args) => generate::execute_edit(args, ctx).await,
        Commands::Video(args) => generate::execute_video(args, ctx).await,
        Commands::Credit => credit::execute(ctx).await,
        Commands::Upload(args) => upload::execute(args, ctx).await,
    }
}
