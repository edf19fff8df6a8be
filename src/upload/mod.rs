//! Image upload to the service's object store.
//!
//! Produces the opaque image reference that edit and video jobs consume.
//! The flow is three calls: fetch temporary store credentials, apply for an
//! upload slot with a SigV4-signed request, then post the bytes to the slot.

pub mod signing;

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use reqwest::Method;
use serde_json::Value;

use crate::core::credentials::Credential;
use crate::core::http::{RequestParts, Transport};
use crate::error::{GenError, Result};
use signing::{Scope, SignableRequest, SigningCredentials};

/// Largest accepted upload.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

pub const UPLOAD_TOKEN_PATH: &str = "/mweb/v1/get_upload_token";
pub const DEFAULT_STORE_URL: &str = "https://imagex.bytedanceapi.com";

const STORE_REGION: &str = "cn-north-1";
const STORE_SERVICE: &str = "imagex";
const STORE_API_VERSION: &str = "2018-08-01";
const STORE_SERVICE_ID: &str = "tb4s082cfz";
const DEFAULT_FILENAME: &str = "upload.png";

/// Image formats the store accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageMime {
    Jpeg,
    Png,
    Gif,
    Webp,
}

impl ImageMime {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
            Self::Webp => "image/webp",
        }
    }

    /// Guess from a file name's extension.
    #[must_use]
    pub fn from_filename(name: &str) -> Option<Self> {
        let ext = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "gif" => Some(Self::Gif),
            "webp" => Some(Self::Webp),
            _ => None,
        }
    }

    /// Guess from the leading magic bytes.
    #[must_use]
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(Self::Jpeg)
        } else if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(Self::Png)
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            Some(Self::Gif)
        } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Some(Self::Webp)
        } else {
            None
        }
    }
}

/// A validated image ready for upload.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageFile {
    name: String,
    mime: ImageMime,
    bytes: Vec<u8>,
}

impl std::fmt::Debug for ImageFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageFile")
            .field("name", &self.name)
            .field("mime", &self.mime)
            .field("size", &self.bytes.len())
            .finish()
    }
}

impl ImageFile {
    /// Validate in-memory image bytes.
    ///
    /// # Errors
    /// Returns [`GenError::InvalidArgument`] for empty or oversized content, or
    /// a format other than jpeg, png, gif, or webp.
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Result<Self> {
        let mut name = name.into();
        if name.trim().is_empty() {
            name = DEFAULT_FILENAME.to_string();
        }
        if bytes.is_empty() {
            return Err(invalid_file(format!("{name} is empty")));
        }
        if bytes.len() > MAX_UPLOAD_BYTES {
            return Err(invalid_file(format!(
                "{name} is {} bytes; the limit is {MAX_UPLOAD_BYTES}",
                bytes.len()
            )));
        }
        let mime = ImageMime::from_filename(&name)
            .or_else(|| ImageMime::sniff(&bytes))
            .ok_or_else(|| {
                invalid_file(format!("{name} is not a jpeg, png, gif, or webp image"))
            })?;
        Ok(Self { name, mime, bytes })
    }

    /// Read and validate an image from disk.
    ///
    /// # Errors
    /// Returns an I/O error if the file cannot be read, else as [`Self::new`].
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(DEFAULT_FILENAME)
            .to_string();
        Self::new(name, bytes)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn mime(&self) -> ImageMime {
        self.mime
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

fn invalid_file(message: String) -> GenError {
    GenError::InvalidArgument {
        name: "file".to_string(),
        message,
    }
}

/// Uploads images through a [`Transport`].
#[derive(Clone)]
pub struct Uploader {
    transport: Arc<dyn Transport>,
    store_url: String,
    upload_scheme: String,
}

impl std::fmt::Debug for Uploader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Uploader")
            .field("store_url", &self.store_url)
            .finish_non_exhaustive()
    }
}

/// An upload slot granted by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
struct UploadSlot {
    host: String,
    store_uri: String,
    auth: String,
}

impl Uploader {
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            store_url: DEFAULT_STORE_URL.to_string(),
            upload_scheme: "https".to_string(),
        }
    }

    /// Point slot negotiation and byte upload at another store.
    #[must_use]
    pub fn with_store(mut self, store_url: impl Into<String>, upload_scheme: impl Into<String>) -> Self {
        self.store_url = store_url.into();
        self.upload_scheme = upload_scheme.into();
        self
    }

    /// Upload `file` and return its reference URL.
    ///
    /// # Errors
    /// Any failed call, or a response missing the session token, store info,
    /// or final URL, is an upstream error.
    pub async fn upload_image(&self, file: &ImageFile, credential: &Credential) -> Result<String> {
        tracing::info!(
            file = %file.name,
            size = file.len(),
            mime = file.mime.as_str(),
            credential = %credential.fingerprint(),
            "Uploading image"
        );

        let store_credentials = self.fetch_store_credentials(credential).await?;
        let slot = self
            .apply_for_slot(&store_credentials, file.len(), credential)
            .await?;
        let url = self.post_bytes(&slot, file, credential).await?;

        tracing::info!(file = %file.name, "Image uploaded");
        Ok(url)
    }

    async fn fetch_store_credentials(&self, credential: &Credential) -> Result<SigningCredentials> {
        let operation = "get upload token";
        let data = self
            .transport
            .call(Method::POST, UPLOAD_TOKEN_PATH, credential, RequestParts::new())
            .await?;

        let field = |name: &str| -> Result<String> {
            data.get(name)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .ok_or_else(|| GenError::missing_field(operation, name))
        };
        Ok(SigningCredentials {
            session_token: field("session_token")?,
            access_key_id: field("access_key_id")?,
            secret_access_key: field("secret_access_key")?,
        })
    }

    async fn apply_for_slot(
        &self,
        store_credentials: &SigningCredentials,
        size: usize,
        credential: &Credential,
    ) -> Result<UploadSlot> {
        let operation = "apply image upload";
        let amz_date = signing::amz_date(Utc::now());
        let query = vec![
            ("Action".to_string(), "ApplyImageUpload".to_string()),
            ("Version".to_string(), STORE_API_VERSION.to_string()),
            ("ServiceId".to_string(), STORE_SERVICE_ID.to_string()),
            ("FileSize".to_string(), size.to_string()),
        ];
        let headers = vec![
            ("x-amz-date".to_string(), amz_date.clone()),
            (
                "x-amz-security-token".to_string(),
                store_credentials.session_token.clone(),
            ),
        ];
        let authorization = signing::authorization_header(
            Scope {
                region: STORE_REGION,
                service: STORE_SERVICE,
            },
            store_credentials,
            &SignableRequest {
                method: "GET",
                host: None,
                path: "/",
                query: &query,
                headers: &headers,
                payload: b"",
            },
            &amz_date,
        );

        let parts = RequestParts {
            params: query,
            headers,
            ..RequestParts::default()
        }
        .header("Authorization", authorization);

        let data = self
            .transport
            .call(Method::GET, &self.store_url, credential, parts)
            .await?;
        parse_slot(operation, &data)
    }

    async fn post_bytes(&self, slot: &UploadSlot, file: &ImageFile, credential: &Credential) -> Result<String> {
        let target = format!(
            "{}://{}/upload/v1/{}",
            self.upload_scheme, slot.host, slot.store_uri
        );
        let parts = RequestParts::new()
            .header("Content-Type", "application/octet-stream")
            .header(
                "Content-Disposition",
                format!("attachment; filename=\"{}\"", file.name),
            )
            .header("Authorization", slot.auth.as_str())
            .bytes(file.bytes.clone());

        let data = self
            .transport
            .call(Method::POST, &target, credential, parts)
            .await?;
        data.pointer("/aigc_data/url")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .ok_or_else(|| GenError::missing_field("upload image", "aigc_data.url"))
    }
}

fn parse_slot(operation: &str, data: &Value) -> Result<UploadSlot> {
    let address = data
        .pointer("/Result/UploadAddress")
        .ok_or_else(|| GenError::missing_field(operation, "Result.UploadAddress"))?;
    let text = |pointer: &str, field: &str| -> Result<String> {
        address
            .pointer(pointer)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .ok_or_else(|| GenError::missing_field(operation, field))
    };
    Ok(UploadSlot {
        store_uri: text("/StoreInfos/0/StoreUri", "StoreInfos[0].StoreUri")?,
        auth: text("/StoreInfos/0/Auth", "StoreInfos[0].Auth")?,
        host: text("/UploadHosts/0", "UploadHosts[0]")?,
    })
}
