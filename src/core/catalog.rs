//! Per-kind model tables.
//!
//! Maps caller-facing model names to the identifiers the service expects.
//! Tables are plain values built once (from the built-in defaults, optionally
//! overlaid by the config file) and handed to the job builder.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::models::JobKind;
use crate::error::{GenError, Result};

/// Service-side model identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProviderModel {
    /// Draft-style model key (image kinds).
    Key(String),
    /// Numeric video mode (video kind).
    Mode(u32),
}

impl std::fmt::Display for ProviderModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Key(key) => f.write_str(key),
            Self::Mode(mode) => write!(f, "{mode}"),
        }
    }
}

/// Model lookup table for one job kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelTable {
    /// Name used when the caller's name is not in `entries`.
    pub default: String,
    pub entries: BTreeMap<String, ProviderModel>,
}

impl ModelTable {
    /// Build a table from `(name, model)` pairs.
    pub fn new<I>(default: &str, entries: I) -> Self
    where
        I: IntoIterator<Item = (&'static str, ProviderModel)>,
    {
        Self {
            default: default.to_string(),
            entries: entries
                .into_iter()
                .map(|(name, model)| (name.to_string(), model))
                .collect(),
        }
    }

    /// Resolve a caller's model name. Unknown or absent names fall back to the
    /// table's default rather than failing.
    ///
    /// Returns the effective caller-facing name and the provider model.
    ///
    /// # Errors
    /// Only a table whose default is not one of its entries fails.
    pub fn resolve<'a>(&'a self, requested: Option<&'a str>) -> Result<(&'a str, &'a ProviderModel)> {
        if let Some(name) = requested {
            if let Some(model) = self.entries.get(name) {
                return Ok((name, model));
            }
            tracing::debug!(requested = name, default = %self.default, "Unknown model, using default");
        }
        let model = self.entries.get(&self.default).ok_or_else(|| {
            GenError::Config(format!(
                "default model '{}' is not in its model table",
                self.default
            ))
        })?;
        Ok((self.default.as_str(), model))
    }

    /// Check that the default names an entry.
    ///
    /// # Errors
    /// Returns a configuration error otherwise.
    pub fn validate(&self, kind: JobKind) -> Result<()> {
        if self.entries.contains_key(&self.default) {
            Ok(())
        } else {
            Err(GenError::Config(format!(
                "default {kind} model '{}' is not in the {kind} model table",
                self.default
            )))
        }
    }

    /// Overlay entries and default from another table.
    pub fn merge(&mut self, overlay: ModelTableOverride) {
        self.entries.extend(overlay.entries);
        if let Some(default) = overlay.default {
            self.default = default;
        }
    }
}

/// Partial table as found in the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelTableOverride {
    pub default: Option<String>,
    pub entries: BTreeMap<String, ProviderModel>,
}

/// The three per-kind tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelCatalog {
    pub image: ModelTable,
    pub reference: ModelTable,
    pub video: ModelTable,
}

impl ModelCatalog {
    /// Validated catalog.
    ///
    /// # Errors
    /// Returns a configuration error if any table's default is not one of its entries.
    pub fn new(image: ModelTable, reference: ModelTable, video: ModelTable) -> Result<Self> {
        let catalog = Self {
            image,
            reference,
            video,
        };
        for &kind in JobKind::ALL {
            catalog.table(kind).validate(kind)?;
        }
        Ok(catalog)
    }

    #[must_use]
    pub const fn table(&self, kind: JobKind) -> &ModelTable {
        match kind {
            JobKind::Image => &self.image,
            JobKind::ReferenceImageEdit => &self.reference,
            JobKind::Video => &self.video,
        }
    }
}

impl Default for ModelCatalog {
    fn default() -> Self {
        let key = |s: &str| ProviderModel::Key(s.to_string());
        Self {
            image: ModelTable::new(
                "jimeng-2.1",
                [
                    ("jimeng-2.1", key("high_aes_general_v21_L:general_v2.1_L")),
                    ("jimeng-2.0-pro", key("high_aes_general_v20_L:general_v2.0_L")),
                    ("jimeng-2.0", key("high_aes_general_v20:general_v2.0")),
                    ("jimeng-1.4", key("high_aes_general_v14:general_v1.4")),
                    ("jimeng-xl-pro", key("text2img_xl_sft")),
                ],
            ),
            reference: ModelTable::new(
                "jimeng-image-2.0-pro",
                [(
                    "jimeng-image-2.0-pro",
                    key("high_aes_general_v20_L:general_v2.0_L"),
                )],
            ),
            video: ModelTable::new("jimeng-video-s2.0", [("jimeng-video-s2.0", ProviderModel::Mode(2))]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_is_valid() {
        let catalog = ModelCatalog::default();
        for &kind in JobKind::ALL {
            catalog.table(kind).validate(kind).unwrap();
        }
    }

    #[test]
    fn known_name_resolves() {
        let catalog = ModelCatalog::default();
        let (name, model) = catalog.image.resolve(Some("jimeng-xl-pro")).unwrap();
        assert_eq!(name, "jimeng-xl-pro");
        assert_eq!(model, &ProviderModel::Key("text2img_xl_sft".into()));
    }

    #[test]
    fn unknown_name_falls_back_to_default() {
        let catalog = ModelCatalog::default();
        for &kind in JobKind::ALL {
            let table = catalog.table(kind);
            let (name, model) = table.resolve(Some("no-such-model")).unwrap();
            assert_eq!(name, table.default);
            assert_eq!(model, &table.entries[&table.default]);
        }
        let (_, model) = catalog.video.resolve(Some("gpt-video")).unwrap();
        assert_eq!(model, &ProviderModel::Mode(2));
    }

    #[test]
    fn missing_name_uses_default() {
        let catalog = ModelCatalog::default();
        let (name, _) = catalog.reference.resolve(None).unwrap();
        assert_eq!(name, "jimeng-image-2.0-pro");
    }

    #[test]
    fn invalid_default_is_rejected() {
        let bad = ModelTable::new("missing", [("present", ProviderModel::Mode(1))]);
        let defaults = ModelCatalog::default();
        assert!(bad.resolve(Some("present")).is_ok());
        assert!(bad.resolve(Some("other")).is_err());
        let err = ModelCatalog::new(bad, defaults.reference, defaults.video).unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn merge_overlays_entries_and_default() {
        let mut table = ModelCatalog::default().video;
        let overlay: ModelTableOverride = toml::from_str(
            r#"
            default = "jimeng-video-3.0"
            [entries]
            "jimeng-video-3.0" = 3
            "#,
        )
        .unwrap();
        table.merge(overlay);
        table.validate(JobKind::Video).unwrap();
        assert_eq!(table.resolve(None).unwrap().1, &ProviderModel::Mode(3));
        assert!(table.entries.contains_key("jimeng-video-s2.0"));
    }
}
