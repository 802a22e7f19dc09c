//! One function per CLI subcommand. All of them work against any [`CatalogStore`].

use std::path::Path;

use geosync_core::catalog::{CatalogPolicies, CatalogStore, ensure_presets};
use geosync_core::remote::FeatureSource;
use geosync_core::sync::{
    CatalogConfig, CatalogSynchronizer, FeatureRefresher, RefreshOptions, RefreshReport,
    SyncReport,
};
use geosync_core::upload::{FeatureUploader, UploadReport};
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{GeosyncError, GeosyncResult};

mod export;
pub use export::export_feature_set;

/// Create missing tables and the preset layers and styles.
pub async fn init(store: &dyn CatalogStore) -> GeosyncResult<()> {
    store.initialize().await?;
    let presets = ensure_presets(store).await?;
    info!("Catalog is ready with {} preset layers", presets.len());
    Ok(())
}

/// Result of the `sync` subcommand, printed as JSON.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SyncOutput {
    pub sync: SyncReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh: Option<RefreshReport>,
}

/// Mirror `catalog`, then refresh features unless `refresh` is `None`.
pub async fn sync(
    store: &dyn CatalogStore,
    source: &dyn FeatureSource,
    catalog: &CatalogConfig,
    policies: CatalogPolicies,
    refresh: Option<RefreshOptions>,
    cancel: CancellationToken,
) -> GeosyncResult<SyncOutput> {
    let sync = CatalogSynchronizer::new(store, source)
        .with_policies(policies)
        .synchronize(catalog)
        .await;
    let refresh = match refresh {
        Some(options) => Some(self::refresh(store, source, options, cancel).await?),
        None => None,
    };
    Ok(SyncOutput { sync, refresh })
}

/// Replace the features of every API-backed feature set.
pub async fn refresh(
    store: &dyn CatalogStore,
    source: &dyn FeatureSource,
    options: RefreshOptions,
    cancel: CancellationToken,
) -> GeosyncResult<RefreshReport> {
    Ok(FeatureRefresher::new(store, source)
        .with_options(options)
        .with_cancellation(cancel)
        .refresh()
        .await?)
}

/// Store a `GeoJSON` file as a new layer, named after the file unless `name` is given.
pub async fn upload(
    store: &dyn CatalogStore,
    file: &Path,
    name: Option<&str>,
) -> GeosyncResult<UploadReport> {
    let name = match name {
        Some(name) => name.to_string(),
        None => file
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| GeosyncError::NoLayerName(file.into()))?
            .to_string(),
    };
    let contents = tokio::fs::read(file)
        .await
        .map_err(|e| GeosyncError::InputReadError(e, file.into()))?;
    let document: Value = serde_json::from_slice(&contents)
        .map_err(|e| GeosyncError::InputParseError(e, file.into()))?;

    let report = FeatureUploader::new(store).upload(&name, &document).await?;
    info!(
        "Uploaded {} features from {} as layer {} (feature set {}), {} without geometry and {} invalid features were dropped",
        report.saved,
        file.display(),
        report.layer_name,
        report.feature_set_id,
        report.skipped_null,
        report.rejected,
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use geosync_core::catalog::MemoryCatalog;

    use super::*;

    fn geojson_file(prefix: &str, contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .prefix(prefix)
            .suffix(".geojson")
            .tempfile()
            .unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn init_is_repeatable() {
        let store = MemoryCatalog::new();
        init(&store).await.unwrap();
        init(&store).await.unwrap();
        let counts = store.counts().await.unwrap();
        assert_eq!((counts.layers, counts.styles), (2, 2));
    }

    #[tokio::test]
    async fn upload_names_layer_after_file() {
        let store = MemoryCatalog::new();
        let file = geojson_file(
            "shelters",
            r#"{"type":"FeatureCollection","features":[
                {"type":"Feature","geometry":{"type":"Point","coordinates":[9.9,53.5]},"properties":{"beds":40}},
                {"type":"Feature","geometry":null,"properties":{}}
            ]}"#,
        );
        let stem = file.path().file_stem().unwrap().to_str().unwrap().to_string();

        let report = upload(&store, file.path(), None).await.unwrap();
        assert_eq!(report.layer_name, stem);
        assert_eq!((report.saved, report.skipped_null), (1, 1));

        let renamed = upload(&store, file.path(), Some("shelters")).await.unwrap();
        assert_eq!(renamed.layer_name, "shelters");
        let again = upload(&store, file.path(), Some("shelters")).await.unwrap();
        assert_eq!(again.layer_name, "shelters_1");
    }

    #[tokio::test]
    async fn upload_rejects_invalid_json() {
        let store = MemoryCatalog::new();
        let file = geojson_file("broken", "{\"features\": [");
        let err = upload(&store, file.path(), None).await.unwrap_err();
        assert!(matches!(err, GeosyncError::InputParseError(..)));

        let err = upload(&store, Path::new("/nonexistent/a.geojson"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, GeosyncError::InputReadError(..)));
    }
}
