use std::process;
use std::time::Duration;

use serde_json::Value;
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument as _, debug, info, info_span, instrument, warn};

use crate::catalog::{CatalogStore, Collection, FeatureSet, NewFeature};
use crate::geometry::feature_from_geojson;
use crate::remote::FeatureSource;
use crate::sync::{FeatureSetRefresh, RefreshOutcome, RefreshReport, SyncError, SyncResult};

/// Name of the lease serializing refresh runs.
pub const REFRESH_LEASE: &str = "feature-refresh";

/// Lease duration used when none is configured.
pub const DEFAULT_LEASE_TTL: Duration = Duration::from_secs(15 * 60);

/// Settings of a refresh run.
#[derive(Clone, Debug)]
pub struct RefreshOptions {
    /// Hold the [`REFRESH_LEASE`] for at most this long while running.
    /// `None` runs without a lease.
    pub lease_ttl: Option<Duration>,
}

impl Default for RefreshOptions {
    fn default() -> Self {
        Self {
            lease_ttl: Some(DEFAULT_LEASE_TTL),
        }
    }
}

/// Replaces the features of every API-backed feature set with a fresh copy from its remote.
///
/// All API-backed sets are emptied first, then each is fetched and filled in turn.
/// A set whose fetch fails stays empty until the next successful run; the others are
/// unaffected. Manually populated sets are never touched.
pub struct FeatureRefresher<'a> {
    store: &'a dyn CatalogStore,
    source: &'a dyn FeatureSource,
    options: RefreshOptions,
    cancel: CancellationToken,
}

/// Features of one items page, ready to store.
#[derive(Debug, Default)]
pub(crate) struct ConvertedFeatures {
    pub features: Vec<NewFeature>,
    pub skipped: u64,
    pub rejected: u64,
}

/// Convert raw `GeoJSON` features, dropping those without geometry and rejecting invalid ones.
pub(crate) fn convert_features(raw: Vec<Value>) -> ConvertedFeatures {
    let mut result = ConvertedFeatures::default();
    for (idx, value) in raw.into_iter().enumerate() {
        let feature = match serde_json::from_value::<geojson::Feature>(value) {
            Ok(feature) => feature,
            Err(e) => {
                warn!("Rejecting feature #{idx}: {e}");
                result.rejected += 1;
                continue;
            }
        };
        match feature_from_geojson(&feature) {
            Ok(Some(feature)) => result.features.push(feature),
            Ok(None) => result.skipped += 1,
            Err(e) => {
                warn!("Rejecting feature #{idx}: {e}");
                result.rejected += 1;
            }
        }
    }
    result
}

impl<'a> FeatureRefresher<'a> {
    /// Refresher with default options and no cancellation.
    #[must_use]
    pub fn new(store: &'a dyn CatalogStore, source: &'a dyn FeatureSource) -> Self {
        Self {
            store,
            source,
            options: RefreshOptions::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Use the given options.
    #[must_use]
    pub fn with_options(mut self, options: RefreshOptions) -> Self {
        self.options = options;
        self
    }

    /// Stop before the next feature set once `cancel` fires.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run one refresh cycle over the whole catalog.
    ///
    /// Fails only if the lease is held elsewhere or the feature sets cannot be listed.
    #[instrument(skip_all)]
    pub async fn refresh(&self) -> SyncResult<RefreshReport> {
        let Some(ttl) = self.options.lease_ttl else {
            return self.refresh_all().await;
        };
        let holder = format!(
            "{}@{}",
            process::id(),
            OffsetDateTime::now_utc().unix_timestamp_nanos()
        );
        if !self
            .store
            .try_acquire_lease(REFRESH_LEASE, &holder, ttl)
            .await?
        {
            return Err(SyncError::RefreshInProgress(REFRESH_LEASE));
        }
        let result = self.refresh_all().await;
        if let Err(e) = self.store.release_lease(REFRESH_LEASE, &holder).await {
            warn!("Unable to release the {REFRESH_LEASE} lease, it will expire on its own: {e}");
        }
        result
    }

    async fn refresh_all(&self) -> SyncResult<RefreshReport> {
        let targets: Vec<(FeatureSet, Collection)> = self
            .store
            .feature_sets()
            .await?
            .into_iter()
            .filter_map(|s| s.collection.map(|c| (s.feature_set, c)))
            .collect();
        info!("Refreshing {} API-backed feature sets", targets.len());

        // Empty every API-backed set before fetching anything.
        let mut entries = Vec::with_capacity(targets.len());
        for (feature_set, collection) in &targets {
            let (deleted, outcome) = match self.store.delete_features(feature_set.id).await {
                Ok(deleted) => (deleted, None),
                Err(e) => {
                    warn!("Unable to clear feature set {}: {e}", feature_set.id);
                    (0, Some(RefreshOutcome::Failed { reason: e.to_string() }))
                }
            };
            entries.push(FeatureSetRefresh {
                feature_set_id: feature_set.id,
                name: feature_set.name.clone(),
                collection: collection.identifier.clone(),
                deleted,
                outcome: outcome.unwrap_or(RefreshOutcome::Cancelled),
            });
        }

        for ((feature_set, collection), entry) in targets.iter().zip(&mut entries) {
            if matches!(entry.outcome, RefreshOutcome::Failed { .. }) {
                continue;
            }
            if self.cancel.is_cancelled() {
                debug!("Refresh cancelled before feature set {}", feature_set.id);
                continue;
            }
            let span = info_span!(
                "feature_set",
                id = %feature_set.id,
                collection = %collection.identifier
            );
            entry.outcome = self
                .refresh_one(feature_set, collection)
                .instrument(span)
                .await;
        }

        let report = RefreshReport {
            feature_sets: entries,
        };
        info!(
            "Saved {} features into {} feature sets ({} failed, {} cancelled)",
            report.features_saved(),
            report.refreshed(),
            report.failed(),
            report.cancelled(),
        );
        Ok(report)
    }

    async fn refresh_one(
        &self,
        feature_set: &FeatureSet,
        collection: &Collection,
    ) -> RefreshOutcome {
        let Some(items_url) = &collection.items_url else {
            warn!("Collection {} has no items endpoint", collection.identifier);
            return RefreshOutcome::Failed {
                reason: "collection has no JSON items endpoint".to_string(),
            };
        };
        let page = match self.source.items(items_url, collection.entries).await {
            Ok(page) => page,
            Err(e) => {
                warn!("Unable to fetch items of {}: {e}", collection.identifier);
                return RefreshOutcome::Failed {
                    reason: e.to_string(),
                };
            }
        };
        let reported = page.number_matched.or(page.total_features);
        if let (Some(expected), Some(reported)) = (collection.entries, reported)
            && reported > expected
        {
            warn!(
                "Collection {} now reports {reported} items but only {expected} are requested",
                collection.identifier
            );
        }

        let converted = convert_features(page.features);
        match self
            .store
            .insert_features(feature_set.id, &converted.features)
            .await
        {
            Ok(saved) => {
                debug!(
                    "Saved {saved} features into {} ({} without geometry, {} rejected)",
                    feature_set.name, converted.skipped, converted.rejected
                );
                RefreshOutcome::Refreshed {
                    saved,
                    skipped_null: converted.skipped,
                    rejected: converted.rejected,
                }
            }
            Err(e) => {
                warn!("Unable to store features of {}: {e}", feature_set.name);
                RefreshOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use insta::assert_yaml_snapshot;
    use reqwest::StatusCode;
    use serde_json::json;

    use super::*;
    use crate::catalog::{Feature, FeatureSetId, ManualFeatureSet, MemoryCatalog, NewStyle, Paint};
    use crate::geometry::{Geometry, Shape};
    use crate::sync::testing::{FakeSource, items_url, null_geometry, point, remote_collection};
    use crate::sync::{CatalogConfig, CatalogSynchronizer, CollectionConfig, DatasetConfig};

    const API: &str = "https://ogc.example.org/city";

    async fn catalog(store: &MemoryCatalog, source: &FakeSource) {
        let config = CatalogConfig {
            datasets: vec![DatasetConfig {
                url: API.to_string(),
                collections: BTreeMap::from([
                    ("a".to_string(), CollectionConfig::default()),
                    ("b".to_string(), CollectionConfig::default()),
                ]),
                ..DatasetConfig::default()
            }],
        };
        let report = CatalogSynchronizer::new(store, source)
            .synchronize(&config)
            .await;
        assert_eq!(report.collections_mirrored(), 2);
    }

    fn source() -> FakeSource {
        FakeSource::default().with_api(
            API,
            "City",
            vec![
                remote_collection(API, "a", "Collection A", 2),
                remote_collection(API, "b", "Collection B", 3),
            ],
        )
    }

    fn three_points() -> Vec<Value> {
        vec![
            point(24.93, 60.16, json!({"name": "one", "timestamp": 1_700_000_000})),
            point(24.94, 60.17, json!({"name": "two"})),
            point(24.95, 60.18, json!({"name": "three", "level": 3})),
        ]
    }

    async fn set_ids(store: &MemoryCatalog) -> (FeatureSetId, FeatureSetId) {
        let sets = store.feature_sets().await.unwrap();
        (sets[0].feature_set.id, sets[1].feature_set.id)
    }

    fn names(features: &[Feature]) -> Vec<String> {
        features
            .iter()
            .map(|f| f.properties["name"].as_str().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn failing_collection_is_isolated() {
        let store = MemoryCatalog::new();
        let source = source()
            .with_failing_items(&items_url(API, "a"), StatusCode::INTERNAL_SERVER_ERROR)
            .with_items(&items_url(API, "b"), three_points());
        catalog(&store, &source).await;
        let (a, b) = set_ids(&store).await;

        let report = FeatureRefresher::new(&store, &source)
            .refresh()
            .await
            .unwrap();
        assert_yaml_snapshot!(report, @r"
        feature_sets:
          - feature_set_id: 5
            name: Collection A
            collection: a
            deleted: 0
            status: failed
            reason: https://ogc.example.org/city/collections/a/items?f=json responded with HTTP 500 Internal Server Error
          - feature_set_id: 8
            name: Collection B
            collection: b
            deleted: 0
            status: refreshed
            saved: 3
            skipped_null: 0
            rejected: 0
        ");

        assert!(store.features(a).await.unwrap().is_empty());
        let features = store.features(b).await.unwrap();
        assert_eq!(names(&features), vec!["one", "two", "three"]);
        assert_eq!(
            features[0].geometry,
            Geometry::wgs84(Shape::Point([24.93, 60.16]))
        );
        assert!(features[0].timestamp.is_some());
        assert_eq!(features[2].properties["level"], json!(3));
    }

    #[tokio::test]
    async fn requests_are_sized_to_entry_count() {
        let store = MemoryCatalog::new();
        let source = source()
            .with_items(&items_url(API, "a"), vec![])
            .with_items(&items_url(API, "b"), three_points());
        catalog(&store, &source).await;
        FeatureRefresher::new(&store, &source)
            .refresh()
            .await
            .unwrap();
        assert_eq!(
            *source.requests.lock().unwrap(),
            vec![(items_url(API, "a"), Some(2)), (items_url(API, "b"), Some(3))]
        );
    }

    #[tokio::test]
    async fn refresh_is_idempotent_on_stable_data() {
        let store = MemoryCatalog::new();
        let source = source()
            .with_items(&items_url(API, "a"), vec![point(1.0, 2.0, json!({"name": "solo"}))])
            .with_items(&items_url(API, "b"), three_points());
        catalog(&store, &source).await;
        let (a, b) = set_ids(&store).await;
        let refresher = FeatureRefresher::new(&store, &source);

        refresher.refresh().await.unwrap();
        let first = (store.features(a).await.unwrap(), store.features(b).await.unwrap());
        let report = refresher.refresh().await.unwrap();
        let second = (store.features(a).await.unwrap(), store.features(b).await.unwrap());

        assert_eq!(report.features_saved(), 4);
        assert_eq!(report.feature_sets[1].deleted, 3);
        for (before, after) in [(&first.0, &second.0), (&first.1, &second.1)] {
            assert_eq!(before.len(), after.len());
            for (x, y) in before.iter().zip(after.iter()) {
                assert_ne!(x.id, y.id);
                assert_eq!(x.geometry, y.geometry);
                assert_eq!(x.properties, y.properties);
                assert_eq!(x.timestamp, y.timestamp);
            }
        }
    }

    #[tokio::test]
    async fn manual_feature_sets_are_untouched() {
        let store = MemoryCatalog::new();
        let source = source()
            .with_items(&items_url(API, "a"), vec![])
            .with_items(&items_url(API, "b"), vec![]);
        catalog(&store, &source).await;
        let manual = store
            .create_manual_feature_set(&ManualFeatureSet {
                layer_name: "Uploaded".to_string(),
                style: NewStyle {
                    name: "Uploaded".to_string(),
                    popup_properties: BTreeMap::new(),
                    paint: Paint::default(),
                    colormap: None,
                },
                feature_set_name: "Uploaded".to_string(),
                features: convert_features(vec![
                    point(0.0, 0.0, json!({"name": "m1"})),
                    point(1.0, 1.0, json!({"name": "m2"})),
                ])
                .features,
            })
            .await
            .unwrap();
        let before = store.features(manual.feature_set_id).await.unwrap();

        let report = FeatureRefresher::new(&store, &source)
            .refresh()
            .await
            .unwrap();
        assert_eq!(report.feature_sets.len(), 2);
        assert!(
            report
                .feature_sets
                .iter()
                .all(|r| r.feature_set_id != manual.feature_set_id)
        );
        assert_eq!(store.features(manual.feature_set_id).await.unwrap(), before);
        assert_eq!(before.len(), 2);
    }

    #[tokio::test]
    async fn null_and_invalid_features_are_not_stored() {
        let store = MemoryCatalog::new();
        let source = source()
            .with_items(
                &items_url(API, "a"),
                vec![
                    null_geometry(json!({"name": "nowhere"})),
                    point(5.0, 5.0, json!({"name": "kept"})),
                    json!({"type": "Feature", "geometry": {"type": "Point", "coordinates": [1.0]}, "properties": {}}),
                    json!({"not": "a feature"}),
                ],
            )
            .with_items(&items_url(API, "b"), vec![]);
        catalog(&store, &source).await;
        let (a, _) = set_ids(&store).await;

        let report = FeatureRefresher::new(&store, &source)
            .refresh()
            .await
            .unwrap();
        assert_eq!(
            report.feature_sets[0].outcome,
            RefreshOutcome::Refreshed {
                saved: 1,
                skipped_null: 1,
                rejected: 2
            }
        );
        assert_eq!(names(&store.features(a).await.unwrap()), vec!["kept"]);
    }

    #[tokio::test]
    async fn collection_without_items_link_fails_alone() {
        let store = MemoryCatalog::new();
        let mut a = remote_collection(API, "a", "Collection A", 2);
        a.links.retain(|l| l.rel != "items");
        let source = FakeSource::default()
            .with_api(API, "City", vec![a, remote_collection(API, "b", "Collection B", 3)])
            .with_items(&items_url(API, "b"), three_points());
        catalog(&store, &source).await;

        let report = FeatureRefresher::new(&store, &source)
            .refresh()
            .await
            .unwrap();
        assert_eq!(report.failed(), 1);
        assert_eq!(report.refreshed(), 1);
        assert_eq!(report.features_saved(), 3);
    }

    #[tokio::test]
    async fn cancelled_refresh_stops_between_feature_sets() {
        let store = MemoryCatalog::new();
        let source = source()
            .with_items(&items_url(API, "a"), vec![point(1.0, 2.0, json!({"name": "x"}))])
            .with_items(&items_url(API, "b"), three_points());
        catalog(&store, &source).await;
        FeatureRefresher::new(&store, &source)
            .refresh()
            .await
            .unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let report = FeatureRefresher::new(&store, &source)
            .with_cancellation(cancel)
            .refresh()
            .await
            .unwrap();
        assert_eq!(report.cancelled(), 2);
        assert_eq!(report.features_saved(), 0);
        // sets were emptied before the cancellation was observed
        assert_eq!(store.counts().await.unwrap().features, 0);
        assert_eq!(source.requests.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn held_lease_blocks_refresh() {
        let store = MemoryCatalog::new();
        let source = source();
        catalog(&store, &source).await;
        assert!(
            store
                .try_acquire_lease(REFRESH_LEASE, "someone-else", Duration::from_secs(60))
                .await
                .unwrap()
        );

        let err = FeatureRefresher::new(&store, &source)
            .refresh()
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::RefreshInProgress(REFRESH_LEASE)));

        // without a lease the run proceeds
        let report = FeatureRefresher::new(&store, &source)
            .with_options(RefreshOptions { lease_ttl: None })
            .refresh()
            .await
            .unwrap();
        assert_eq!(report.feature_sets.len(), 2);
    }

    #[tokio::test]
    async fn lease_is_released_after_run() {
        let store = MemoryCatalog::new();
        let source = source();
        catalog(&store, &source).await;
        FeatureRefresher::new(&store, &source)
            .refresh()
            .await
            .unwrap();
        assert!(
            store
                .try_acquire_lease(REFRESH_LEASE, "next", Duration::from_secs(60))
                .await
                .unwrap()
        );
    }
}
