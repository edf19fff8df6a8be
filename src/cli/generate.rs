//! Generation commands: `image`, `edit`, `video`.

use chrono::Utc;

use crate::cli::args::{EditArgs, ImageArgs, ImageSourceArgs, VideoArgs, validate_sample_strength};
use crate::cli::context::CommandContext;
use crate::core::models::{GenerationOutput, ImageParams, JobRequest, ReferenceParams, VideoParams};
use crate::error::{GenError, Result};
use crate::render;
use crate::upload::ImageFile;

/// Execute the `image` command.
///
/// # Errors
/// Argument validation failures, or any orchestration error.
pub async fn execute_image(args: &ImageArgs, ctx: &CommandContext) -> Result<()> {
    let params = ImageParams {
        geometry: args.geometry.geometry()?,
        sample_strength: validate_sample_strength(args.sample_strength)?,
        negative_prompt: args.negative_prompt.clone(),
    };
    let request = JobRequest::image(args.model.clone(), &args.prompt, params);
    run(&request, ctx).await
}

/// Execute the `edit` command.
///
/// # Errors
/// Argument validation failures, upload failures, or any orchestration error.
pub async fn execute_edit(args: &EditArgs, ctx: &CommandContext) -> Result<()> {
    let geometry = args.geometry.geometry()?;
    let sample_strength = validate_sample_strength(args.sample_strength)?;
    let image_uri = resolve_source(&args.source, ctx).await?;
    let params = ReferenceParams {
        image_uri,
        geometry,
        sample_strength,
    };
    let request = JobRequest::reference(args.model.clone(), &args.prompt, params);
    run(&request, ctx).await
}

/// Execute the `video` command.
///
/// # Errors
/// Argument validation failures, upload failures, or any orchestration error.
pub async fn execute_video(args: &VideoArgs, ctx: &CommandContext) -> Result<()> {
    let geometry = args.geometry.geometry()?;
    if args.fps == 0 {
        return Err(GenError::InvalidArgument {
            name: "fps".to_string(),
            message: "must be greater than 0".to_string(),
        });
    }
    if args.duration_ms == 0 {
        return Err(GenError::InvalidArgument {
            name: "duration-ms".to_string(),
            message: "must be greater than 0".to_string(),
        });
    }
    let image_uri = resolve_source(&args.source, ctx).await?;
    let params = VideoParams {
        image_uri,
        geometry,
        fps: args.fps,
        duration_ms: args.duration_ms,
        seed: args.seed,
    };
    let request = JobRequest::video(args.model.clone(), &args.prompt, params);
    run(&request, ctx).await
}

async fn run(request: &JobRequest, ctx: &CommandContext) -> Result<()> {
    let output = ctx
        .orchestrator()
        .orchestrate(request, &ctx.pool, &ctx.cancel)
        .await?;
    print_output(&output, ctx)
}

fn print_output(output: &GenerationOutput, ctx: &CommandContext) -> Result<()> {
    let rendered = render::render_generation(
        output,
        Utc::now().timestamp(),
        ctx.config.format,
        ctx.config.pretty,
    )?;
    println!("{rendered}");
    Ok(())
}

/// An explicit reference is used as-is; a local file is uploaded first.
async fn resolve_source(source: &ImageSourceArgs, ctx: &CommandContext) -> Result<String> {
    match (&source.image, &source.file) {
        (Some(uri), _) if !uri.trim().is_empty() => Ok(uri.trim().to_string()),
        (_, Some(path)) => {
            let file = ImageFile::from_path(path)?;
            let url = ctx.upload(&file).await?;
            tracing::debug!(file = %path.display(), "Using uploaded image as source");
            Ok(url)
        }
        _ => Err(GenError::InvalidArgument {
            name: "image".to_string(),
            message: "an image reference or --file is required".to_string(),
        }),
    }
}
