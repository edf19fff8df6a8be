//! Core data models for generation requests and their outcomes.
//!
//! A [`JobRequest`] is immutable once constructed; its fields are only
//! reachable through accessors.

use serde::{Deserialize, Serialize};

/// Default output width/height in pixels.
pub const DEFAULT_DIMENSION: u32 = 1024;
/// Default sample strength for image and reference jobs.
pub const DEFAULT_SAMPLE_STRENGTH: f64 = 0.5;
/// Default video frame rate.
pub const DEFAULT_FPS: u32 = 24;
/// Default video duration in milliseconds.
pub const DEFAULT_DURATION_MS: u32 = 5000;

// =============================================================================
// Job Kind
// =============================================================================

/// The kinds of generation job the service accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobKind {
    /// Text-to-image generation.
    Image,
    /// Image generation guided by an uploaded reference image.
    ReferenceImageEdit,
    /// Image-to-video generation.
    Video,
}

impl JobKind {
    /// All job kinds.
    pub const ALL: &'static [Self] = &[Self::Image, Self::ReferenceImageEdit, Self::Video];

    /// Short label used in logs and error messages.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::ReferenceImageEdit => "reference-image",
            Self::Video => "video",
        }
    }

    /// Whether this kind follows the image status vocabulary.
    #[must_use]
    pub const fn is_image_like(self) -> bool {
        matches!(self, Self::Image | Self::ReferenceImageEdit)
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// =============================================================================
// Kind-specific Parameters
// =============================================================================

/// Output geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geometry {
    pub width: u32,
    pub height: u32,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            width: DEFAULT_DIMENSION,
            height: DEFAULT_DIMENSION,
        }
    }
}

/// Parameters for text-to-image jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageParams {
    pub geometry: Geometry,
    pub sample_strength: f64,
    pub negative_prompt: String,
}

impl Default for ImageParams {
    fn default() -> Self {
        Self {
            geometry: Geometry::default(),
            sample_strength: DEFAULT_SAMPLE_STRENGTH,
            negative_prompt: String::new(),
        }
    }
}

/// Parameters for reference-image edit jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceParams {
    /// Opaque image reference produced by the upload subsystem.
    pub image_uri: String,
    pub geometry: Geometry,
    pub sample_strength: f64,
}

impl ReferenceParams {
    /// Reference parameters with default geometry and strength.
    #[must_use]
    pub fn new(image_uri: impl Into<String>) -> Self {
        Self {
            image_uri: image_uri.into(),
            geometry: Geometry::default(),
            sample_strength: DEFAULT_SAMPLE_STRENGTH,
        }
    }
}

/// Parameters for image-to-video jobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoParams {
    /// Opaque first-frame image reference produced by the upload subsystem.
    pub image_uri: String,
    pub geometry: Geometry,
    pub fps: u32,
    pub duration_ms: u32,
    /// Drawn by the builder's identifier source when absent.
    pub seed: Option<u64>,
}

impl VideoParams {
    /// Video parameters with default geometry, fps, and duration.
    #[must_use]
    pub fn new(image_uri: impl Into<String>) -> Self {
        Self {
            image_uri: image_uri.into(),
            geometry: Geometry::default(),
            fps: DEFAULT_FPS,
            duration_ms: DEFAULT_DURATION_MS,
            seed: None,
        }
    }
}

/// Kind-specific portion of a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum JobParams {
    Image(ImageParams),
    ReferenceImageEdit(ReferenceParams),
    Video(VideoParams),
}

// =============================================================================
// Job Request
// =============================================================================

/// A caller's generation request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobRequest {
    model: Option<String>,
    prompt: String,
    params: JobParams,
}

impl JobRequest {
    /// Build a request from its parts.
    #[must_use]
    pub fn new(model: Option<String>, prompt: impl Into<String>, params: JobParams) -> Self {
        Self {
            model,
            prompt: prompt.into(),
            params,
        }
    }

    /// Text-to-image request.
    #[must_use]
    pub fn image(model: Option<String>, prompt: impl Into<String>, params: ImageParams) -> Self {
        Self::new(model, prompt, JobParams::Image(params))
    }

    /// Reference-image edit request.
    #[must_use]
    pub fn reference(
        model: Option<String>,
        prompt: impl Into<String>,
        params: ReferenceParams,
    ) -> Self {
        Self::new(model, prompt, JobParams::ReferenceImageEdit(params))
    }

    /// Image-to-video request.
    #[must_use]
    pub fn video(model: Option<String>, prompt: impl Into<String>, params: VideoParams) -> Self {
        Self::new(model, prompt, JobParams::Video(params))
    }

    #[must_use]
    pub const fn kind(&self) -> JobKind {
        match self.params {
            JobParams::Image(_) => JobKind::Image,
            JobParams::ReferenceImageEdit(_) => JobKind::ReferenceImageEdit,
            JobParams::Video(_) => JobKind::Video,
        }
    }

    /// The caller's model name, if one was given.
    #[must_use]
    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub const fn params(&self) -> &JobParams {
        &self.params
    }

    /// Output geometry regardless of kind.
    #[must_use]
    pub const fn geometry(&self) -> Geometry {
        match &self.params {
            JobParams::Image(p) => p.geometry,
            JobParams::ReferenceImageEdit(p) => p.geometry,
            JobParams::Video(p) => p.geometry,
        }
    }
}

// =============================================================================
// Credit Balance
// =============================================================================

/// Live usage balance for one credential.
///
/// The service reports buckets as JSON numbers that may be fractional.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditBalance {
    pub gift: f64,
    pub purchase: f64,
    pub vip: f64,
}

impl CreditBalance {
    /// Sum of all credit buckets.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.gift + self.purchase + self.vip
    }

    /// Whether the account needs replenishing before it can submit.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.total() <= 0.0
    }
}

// =============================================================================
// Job Status
// =============================================================================

/// Normalised status of a submitted job. Ordered so that later phases compare
/// greater than earlier ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// A job accepted by the service and tracked until a terminal status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub kind: JobKind,
    /// History record id (image kinds) or task id (video).
    pub id: String,
    status: JobStatus,
}

impl Job {
    #[must_use]
    pub const fn new(kind: JobKind, id: String) -> Self {
        Self {
            kind,
            id,
            status: JobStatus::Pending,
        }
    }

    #[must_use]
    pub const fn status(&self) -> JobStatus {
        self.status
    }

    /// Move the job forward. Returns `false` and leaves the status untouched
    /// when `next` would be a regression or the job is already terminal.
    pub fn advance(&mut self, next: JobStatus) -> bool {
        if self.status.is_terminal() || next < self.status {
            return false;
        }
        self.status = next;
        true
    }
}

// =============================================================================
// Generation Output
// =============================================================================

/// Final result of an orchestration call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum GenerationOutput {
    /// One entry per result item; `None` where the item carried no URL.
    Images(Vec<Option<String>>),
    Video(String),
}

impl GenerationOutput {
    /// URLs in output order, `None` preserved.
    #[must_use]
    pub fn urls(&self) -> Vec<Option<&str>> {
        match self {
            Self::Images(items) => items.iter().map(Option::as_deref).collect(),
            Self::Video(url) => vec![Some(url.as_str())],
        }
    }
}
