//! Manually populated feature sets from uploaded `GeoJSON` documents.
//!
//! Uploaded feature sets have no backing collection, so refresh runs never touch them.

use serde::Serialize;
use serde_json::Value;
use tracing::{info, instrument};

use crate::catalog::{
    CatalogStore, FeatureSetId, LayerId, ManualFeatureSet, NewStyle, Paint, StyleId,
};
use crate::sync::convert_features;

mod error;
pub use error::{UploadError, UploadResult};

/// Suffixes tried after the bare name, `name_1` through `name_999`.
pub const MAX_NAME_SUFFIX: u32 = 999;

/// Result of a successful upload.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct UploadReport {
    /// Name given to the new layer, style and feature set.
    pub layer_name: String,
    /// New layer.
    pub layer_id: LayerId,
    /// New style.
    pub style_id: StyleId,
    /// New feature set.
    pub feature_set_id: FeatureSetId,
    /// Features stored.
    pub saved: u64,
    /// Features without geometry, dropped.
    pub skipped_null: u64,
    /// Features that could not be converted, dropped.
    pub rejected: u64,
}

/// Stores uploaded feature collections.
pub struct FeatureUploader<'a> {
    store: &'a dyn CatalogStore,
}

impl<'a> FeatureUploader<'a> {
    /// Uploader writing into `store`.
    #[must_use]
    pub fn new(store: &'a dyn CatalogStore) -> Self {
        Self { store }
    }

    /// Store `document` as a new layer with a single manual feature set.
    ///
    /// The layer is named `name`, or `name_N` with the lowest free `N` if that is taken.
    #[instrument(skip(self, document))]
    pub async fn upload(&self, name: &str, document: &Value) -> UploadResult<UploadReport> {
        let Some(Value::Array(raw)) = document.get("features") else {
            return Err(UploadError::MissingFeatures);
        };

        let taken = self.store.layer_names(name).await?;
        let layer_name = unique_layer_name(name, &taken)?;
        let converted = convert_features(raw.clone());

        let created = self
            .store
            .create_manual_feature_set(&ManualFeatureSet {
                layer_name: layer_name.clone(),
                style: default_style(&layer_name),
                feature_set_name: layer_name.clone(),
                features: converted.features,
            })
            .await?;
        info!(
            "Uploaded {} features into layer {layer_name} ({} without geometry, {} rejected)",
            created.features, converted.skipped, converted.rejected
        );

        Ok(UploadReport {
            layer_name,
            layer_id: created.layer_id,
            style_id: created.style_id,
            feature_set_id: created.feature_set_id,
            saved: created.features,
            skipped_null: converted.skipped,
            rejected: converted.rejected,
        })
    }
}

fn default_style(name: &str) -> NewStyle {
    NewStyle {
        name: name.to_string(),
        popup_properties: Default::default(),
        paint: Paint::default(),
        colormap: None,
    }
}

/// The first of `name`, `name_1` .. `name_999` that is not in `taken`.
pub fn unique_layer_name(name: &str, taken: &[String]) -> UploadResult<String> {
    let is_free = |candidate: &str| !taken.iter().any(|t| t == candidate);
    if is_free(name) {
        return Ok(name.to_string());
    }
    (1..=MAX_NAME_SUFFIX)
        .map(|i| format!("{name}_{i}"))
        .find(|candidate| is_free(candidate))
        .ok_or_else(|| UploadError::NoFreeLayerName(name.to_string(), MAX_NAME_SUFFIX))
}
