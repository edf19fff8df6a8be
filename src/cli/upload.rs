//! `upload` command.

use crate::cli::args::UploadArgs;
use crate::cli::context::CommandContext;
use crate::error::Result;
use crate::render;
use crate::upload::ImageFile;

/// Upload a local image and print its reference.
///
/// # Errors
/// File validation or upload failures.
pub async fn execute(args: &UploadArgs, ctx: &CommandContext) -> Result<()> {
    let file = ImageFile::from_path(&args.file)?;
    let url = ctx.upload(&file).await?;
    println!(
        "{}",
        render::render_upload(&url, ctx.config.format, ctx.config.pretty)?
    );
    Ok(())
}
