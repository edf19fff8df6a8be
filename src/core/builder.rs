//! Submission payload construction.
//!
//! [`JobBuilder`] turns a [`JobRequest`] into the service's submission call:
//! a deeply nested draft (image kinds) or task description (video) in which
//! every structural node carries its own fresh identifier. Identifiers and
//! seeds come from an injectable [`IdSource`] so payloads are reproducible in
//! tests.
//!
//! The builder also produces the status hint that the poll loop sends with
//! each status query.

use std::fmt::Write as _;
use std::ops::Range;
use std::sync::Arc;

use reqwest::Method;
use serde::Serialize;
use serde_json::{Value, json};

use super::catalog::{ModelCatalog, ProviderModel};
use super::http::RequestParts;
use super::models::{ImageParams, JobKind, JobParams, JobRequest, ReferenceParams, VideoParams};
use crate::error::{GenError, Result};

/// Draft schema versions understood by the service.
const DRAFT_MIN_VERSION: &str = "3.0.2";
const REFERENCE_DRAFT_VERSION: &str = "3.1.1";

/// Submission endpoints.
pub const DRAFT_GENERATE_PATH: &str = "/mweb/v1/aigc_draft/generate";
pub const VIDEO_GENERATE_PATH: &str = "/mweb/v1/generate_video";

const VIDEO_MODEL_REQ_KEY: &str = "dreamina_ic_generate_video_model_vgfm_lite";

/// Range random seeds are drawn from.
pub const SEED_RANGE: Range<u64> = 2_500_000_000..2_600_000_000;

// =============================================================================
// Identifier Source
// =============================================================================

/// Source of per-node identifiers and default seeds.
pub trait IdSource: Send + Sync {
    /// A fresh identifier, unique within a submission.
    fn node_id(&self) -> String;
    /// A seed from [`SEED_RANGE`].
    fn seed(&self) -> u64;
}

/// Production source: UUID v4 identifiers and uniformly random seeds.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIds;

impl IdSource for RandomIds {
    fn node_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }

    fn seed(&self) -> u64 {
        use rand::Rng;
        rand::rng().random_range(SEED_RANGE)
    }
}

// =============================================================================
// Submission
// =============================================================================

/// A fully built submission, ready for the submitter.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub kind: JobKind,
    /// Effective caller-facing model name after table lookup.
    pub model_name: String,
    pub model: ProviderModel,
    pub method: Method,
    pub path: &'static str,
    pub params: Vec<(String, String)>,
    pub body: Value,
    /// Geometry/format block (image kinds) or common-info parameter (video)
    /// sent with every status query.
    pub status_hint: Value,
}

impl Submission {
    /// Request parts for the submission call.
    #[must_use]
    pub fn request_parts(&self) -> RequestParts {
        RequestParts {
            params: self.params.clone(),
            headers: Vec::new(),
            body: super::http::Body::Json(self.body.clone()),
        }
    }
}

// =============================================================================
// Job Builder
// =============================================================================

/// Builds submission payloads from requests.
#[derive(Clone)]
pub struct JobBuilder {
    catalog: ModelCatalog,
    assistant_id: u32,
    ids: Arc<dyn IdSource>,
}

impl std::fmt::Debug for JobBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobBuilder")
            .field("catalog", &self.catalog)
            .field("assistant_id", &self.assistant_id)
            .finish_non_exhaustive()
    }
}

impl JobBuilder {
    /// Builder with random identifiers.
    #[must_use]
    pub fn new(catalog: ModelCatalog, assistant_id: u32) -> Self {
        Self {
            catalog,
            assistant_id,
            ids: Arc::new(RandomIds),
        }
    }

    /// Replace the identifier source.
    #[must_use]
    pub fn with_id_source(mut self, ids: Arc<dyn IdSource>) -> Self {
        self.ids = ids;
        self
    }

    #[must_use]
    pub const fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    /// Build the submission for `request`.
    ///
    /// Unknown model names resolve to the kind's default model.
    ///
    /// # Errors
    /// Returns a configuration error if the resolved table entry has the wrong
    /// shape for the job kind, or JSON encoding of a nested block fails.
    pub fn build(&self, request: &JobRequest) -> Result<Submission> {
        let kind = request.kind();
        let (model_name, model) = self.catalog.table(kind).resolve(request.model())?;

        tracing::info!(
            kind = %kind,
            requested = request.model().unwrap_or("<default>"),
            model = model_name,
            provider_model = %model,
            width = request.geometry().width,
            height = request.geometry().height,
            "Building submission"
        );

        let mut submission = match (request.params(), model) {
            (JobParams::Image(params), ProviderModel::Key(key)) => {
                self.build_image(request.prompt(), key, params)?
            }
            (JobParams::ReferenceImageEdit(params), ProviderModel::Key(key)) => {
                self.build_reference(request.prompt(), key, params)?
            }
            (JobParams::Video(params), ProviderModel::Mode(mode)) => {
                self.build_video(request.prompt(), *mode, params)?
            }
            (_, other) => {
                return Err(GenError::Config(format!(
                    "model '{model_name}' maps to '{other}', which is not a {kind} model"
                )));
            }
        };
        submission.model_name = model_name.to_string();
        submission.model = model.clone();
        Ok(submission)
    }

    fn id(&self) -> String {
        self.ids.node_id()
    }

    fn common_info(&self) -> Value {
        json!({ "aid": self.assistant_id })
    }

    /// Tracking parameter for draft submissions. The service expects the JSON
    /// already percent-encoded; the transport then encodes the query as usual.
    fn babi_param(feature_key: &str, entrance_detail: &str) -> Result<(String, String)> {
        let json = serde_json::to_string(&BabiParam {
            scenario: "image_video_generation",
            feature_key,
            feature_entrance: "to_image",
            feature_entrance_detail: entrance_detail,
        })?;
        Ok(("babi_param".to_string(), encode_uri_component(&json)))
    }

    fn build_image(&self, prompt: &str, model: &str, params: &ImageParams) -> Result<Submission> {
        let component_id = self.id();
        let draft = json!({
            "type": "draft",
            "id": self.id(),
            "min_version": DRAFT_MIN_VERSION,
            "min_features": [],
            "is_from_tsn": true,
            "version": DRAFT_MIN_VERSION,
            "main_component_id": component_id,
            "component_list": [{
                "type": "image_base_component",
                "id": component_id,
                "min_version": DRAFT_MIN_VERSION,
                "generate_type": "generate",
                "aigc_mode": "workbench",
                "abilities": {
                    "type": "",
                    "id": self.id(),
                    "generate": {
                        "type": "",
                        "id": self.id(),
                        "core_param": {
                            "type": "",
                            "id": self.id(),
                            "model": model,
                            "prompt": prompt,
                            "negative_prompt": params.negative_prompt,
                            "seed": self.ids.seed(),
                            "sample_strength": params.sample_strength,
                            "image_ratio": 1,
                            "large_image_info": {
                                "type": "",
                                "id": self.id(),
                                "height": params.geometry.height,
                                "width": params.geometry.width,
                            },
                        },
                        "history_option": {
                            "type": "",
                            "id": self.id(),
                        },
                    },
                },
            }],
        });

        let metrics_extra = serde_json::to_string(&json!({
            "templateId": "",
            "generateCount": 1,
            "promptSource": "custom",
            "templateSource": "",
            "lastRequestId": "",
            "originRequestId": "",
        }))?;

        let body = json!({
            "extend": { "root_model": model, "template_id": "" },
            "submit_id": self.id(),
            "metrics_extra": metrics_extra,
            "draft_content": serde_json::to_string(&draft)?,
            "http_common_info": self.common_info(),
        });

        Ok(Submission {
            kind: JobKind::Image,
            model_name: String::new(),
            model: ProviderModel::Key(model.to_string()),
            method: Method::POST,
            path: DRAFT_GENERATE_PATH,
            params: vec![Self::babi_param(
                "aigc_to_image",
                &format!("to_image-{model}"),
            )?],
            body,
            status_hint: image_info_hint(),
        })
    }

    fn build_reference(
        &self,
        prompt: &str,
        model: &str,
        params: &ReferenceParams,
    ) -> Result<Submission> {
        let component_id = self.id();
        let uri = params.image_uri.as_str();
        let draft = json!({
            "type": "draft",
            "id": self.id(),
            "min_version": DRAFT_MIN_VERSION,
            "min_features": [],
            "is_from_tsn": true,
            "version": REFERENCE_DRAFT_VERSION,
            "main_component_id": component_id,
            "component_list": [{
                "type": "image_base_component",
                "id": component_id,
                "min_version": DRAFT_MIN_VERSION,
                "generate_type": "blend",
                "aigc_mode": "workbench",
                "abilities": {
                    "type": "",
                    "id": self.id(),
                    "blend": {
                        "type": "",
                        "id": self.id(),
                        "core_param": {
                            "type": "",
                            "id": self.id(),
                            "model": model,
                            "prompt": format!("##{prompt}"),
                            "sample_strength": params.sample_strength,
                            "image_ratio": 1,
                            "large_image_info": {
                                "type": "",
                                "id": self.id(),
                                "height": params.geometry.height,
                                "width": params.geometry.width,
                            },
                        },
                        "ability_list": [{
                            "type": "",
                            "id": self.id(),
                            "name": "byte_edit",
                            "image_uri_list": [uri],
                            "image_list": [{
                                "type": "image",
                                "id": self.id(),
                                "source_from": "upload",
                                "platform_type": 1,
                                "name": "",
                                "image_uri": uri,
                                "width": 0,
                                "height": 0,
                                "format": "",
                                "uri": uri,
                            }],
                            "strength": params.sample_strength,
                        }],
                        "history_option": {
                            "type": "",
                            "id": self.id(),
                        },
                        "prompt_placeholder_info_list": [{
                            "type": "",
                            "id": self.id(),
                            "ability_index": 0,
                        }],
                        "postedit_param": {
                            "type": "",
                            "id": self.id(),
                            "generate_type": 0,
                        },
                    },
                },
            }],
        });

        let body = json!({
            "extend": { "root_model": model, "template_id": "" },
            "submit_id": self.id(),
            "draft_content": serde_json::to_string(&draft)?,
            "http_common_info": self.common_info(),
        });

        Ok(Submission {
            kind: JobKind::ReferenceImageEdit,
            model_name: String::new(),
            model: ProviderModel::Key(model.to_string()),
            method: Method::POST,
            path: DRAFT_GENERATE_PATH,
            params: vec![Self::babi_param(
                "to_image_referenceimage_generate",
                "to_image-referenceimage-byte_edit",
            )?],
            body,
            status_hint: image_info_hint(),
        })
    }

    fn build_video(&self, prompt: &str, mode: u32, params: &VideoParams) -> Result<Submission> {
        let seed = params.seed.unwrap_or_else(|| self.ids.seed());
        let task_extra = serde_json::to_string(&json!({
            "promptSource": "custom",
            "originSubmitId": self.id(),
            "isDefaultSeed": 1,
            "originTemplateId": "",
            "imageNameMapping": {},
            "isUseAiGenPrompt": false,
            "batchNumber": 1,
        }))?;

        let body = json!({
            "submit_id": self.id(),
            "task_extra": task_extra,
            "http_common_info": self.common_info(),
            "input": {
                "seed": seed,
                "video_gen_inputs": [{
                    "prompt": prompt,
                    "first_frame_image": {
                        "width": params.geometry.width,
                        "height": params.geometry.height,
                        "image_uri": params.image_uri,
                        "format": "jpeg",
                        "aigc_image": { "item_id": self.id() },
                    },
                    "fps": params.fps,
                    "duration_ms": params.duration_ms,
                    "video_mode": mode,
                    "template_id": "",
                }],
                "priority": 0,
                "model_req_key": VIDEO_MODEL_REQ_KEY,
            },
            "mode": "workbench",
            "history_option": {},
            "commerce_info": {
                "resource_id": "generate_video",
                "resource_id_type": "str",
                "resource_sub_type": "aigc",
                "benefit_type": "basic_video_operation_vgfm_lite",
            },
            "client_trace_data": {},
        });

        Ok(Submission {
            kind: JobKind::Video,
            model_name: String::new(),
            model: ProviderModel::Mode(mode),
            method: Method::POST,
            path: VIDEO_GENERATE_PATH,
            params: vec![Self::babi_param("image_to_video", "to_image-image_to_video")?],
            body,
            status_hint: Value::String(serde_json::to_string(&self.common_info())?),
        })
    }
}

/// Result geometry/format requested when querying image history records.
fn image_info_hint() -> Value {
    json!({
        "width": 2048,
        "height": 2048,
        "format": "webp",
        "image_scene_list": [
            { "scene": "normal", "width": 2400, "height": 2400, "uniq_key": "2400", "format": "webp" },
            { "scene": "normal", "width": 1080, "height": 1080, "uniq_key": "1080", "format": "webp" },
        ],
    })
}

#[derive(Serialize)]
struct BabiParam<'a> {
    scenario: &'a str,
    feature_key: &'a str,
    feature_entrance: &'a str,
    feature_entrance_detail: &'a str,
}

/// Percent-encode everything except `A-Z a-z 0-9 - _ . ! ~ * ' ( )`.
fn encode_uri_component(input: &str) -> String {
    let mut out = String::with_capacity(input.len() * 3);
    for byte in input.bytes() {
        if byte.is_ascii_alphanumeric() || b"-_.!~*'()".contains(&byte) {
            out.push(char::from(byte));
        } else {
            let _ = write!(out, "%{byte:02X}");
        }
    }
    out
}
