use tracing::{Instrument as _, debug, info, info_span, instrument, warn};

use crate::catalog::{
    CatalogPolicies, CatalogStore, CollectionMirror, DatasetId, NewCollection, NewDataset,
};
use crate::remote::{FeatureSource, RemoteCollection};
use crate::sync::{
    CatalogConfig, CollectionConfig, CollectionOutcome, CollectionReport, DatasetConfig,
    DatasetReport, SyncReport,
};

/// Creates catalog entries for every configured remote collection.
///
/// Datasets are processed one after the other. A dataset whose landing page or
/// collection list cannot be fetched is reported as failed and the next one is processed.
/// Each collection is written as its own unit of work.
pub struct CatalogSynchronizer<'a> {
    store: &'a dyn CatalogStore,
    source: &'a dyn FeatureSource,
    policies: CatalogPolicies,
}

impl<'a> CatalogSynchronizer<'a> {
    /// Synchronizer with the default insert policies.
    #[must_use]
    pub fn new(store: &'a dyn CatalogStore, source: &'a dyn FeatureSource) -> Self {
        Self {
            store,
            source,
            policies: CatalogPolicies::default(),
        }
    }

    /// Use the given insert policies.
    #[must_use]
    pub fn with_policies(mut self, policies: CatalogPolicies) -> Self {
        self.policies = policies;
        self
    }

    /// Mirror the catalog entries of every configured dataset.
    #[instrument(skip_all, fields(datasets = config.datasets.len()))]
    pub async fn synchronize(&self, config: &CatalogConfig) -> SyncReport {
        let mut report = SyncReport::default();
        for dataset in &config.datasets {
            let span = info_span!("dataset", url = %dataset.url);
            let result = self.sync_dataset(dataset).instrument(span).await;
            report.datasets.push(result);
        }
        info!(
            "Synchronized {} datasets ({} failed), mirrored {} collections ({} failed)",
            report.datasets_processed(),
            report.datasets_failed(),
            report.collections_mirrored(),
            report.collections_failed(),
        );
        report
    }

    async fn sync_dataset(&self, cfg: &DatasetConfig) -> DatasetReport {
        let mut report = DatasetReport::new(&cfg.url);

        let root = match self.source.root(&cfg.url).await {
            Ok(root) => root,
            Err(e) => {
                warn!("Skipping dataset {}: {e}", cfg.url);
                report.error = Some(e.to_string());
                return report;
            }
        };
        let name = cfg.dataset_name(&root);
        report.name = Some(name.clone());

        let dataset = NewDataset {
            name: name.clone(),
            description: cfg.dataset_description(&root),
            url: cfg.url.clone(),
            collections: cfg.collections.keys().cloned().collect(),
        };
        let dataset_id = match self.store.create_dataset(&dataset, self.policies.dataset).await {
            Ok(id) => id,
            Err(e) => {
                warn!("Unable to store dataset {name}: {e}");
                report.error = Some(e.to_string());
                return report;
            }
        };
        report.dataset_id = Some(dataset_id);

        let remote = match self.source.collections(&cfg.url, &root).await {
            Ok(remote) => remote,
            Err(e) => {
                warn!("Unable to list collections of {name}: {e}");
                report.error = Some(e.to_string());
                return report;
            }
        };

        for collection in &remote {
            let Some(collection_cfg) = cfg.collections.get(&collection.id) else {
                debug!("Collection {} of {name} is not configured, skipping", collection.id);
                continue;
            };
            let mirror = plan_collection(dataset_id, &name, collection, collection_cfg);
            let outcome = self.sync_collection(&mirror).await;
            report.collections.push(CollectionReport {
                identifier: collection.id.clone(),
                outcome,
            });
        }

        report.missing = cfg
            .collections
            .keys()
            .filter(|id| !remote.iter().any(|c| &c.id == *id))
            .cloned()
            .collect();
        for id in &report.missing {
            warn!("Collection {id} is configured for {name} but the remote does not have it");
        }
        report
    }

    async fn sync_collection(&self, mirror: &CollectionMirror) -> CollectionOutcome {
        let identifier = &mirror.collection.identifier;
        match self.store.mirror_collection(mirror, &self.policies).await {
            Ok(written) if written.reused => {
                info!("Collection {identifier} already mirrored as feature set {}", written.feature_set_id);
                CollectionOutcome::Reused {
                    feature_set_id: written.feature_set_id,
                }
            }
            Ok(written) => {
                if mirror.collection.items_url.is_none() {
                    warn!("Collection {identifier} has no JSON items link; it will not be refreshed");
                }
                info!(
                    "Mirrored collection {identifier} as feature set {} in layer {:?}",
                    written.feature_set_id, mirror.layer_name
                );
                CollectionOutcome::Mirrored {
                    feature_set_id: written.feature_set_id,
                    layer_created: written.layer_created,
                    has_items_url: mirror.collection.items_url.is_some(),
                }
            }
            Err(e) => {
                warn!("Unable to store collection {identifier}: {e}");
                CollectionOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}

/// Everything written for one configured remote collection.
fn plan_collection(
    dataset_id: DatasetId,
    dataset_name: &str,
    remote: &RemoteCollection,
    cfg: &CollectionConfig,
) -> CollectionMirror {
    let name = cfg.collection_name(remote);
    CollectionMirror {
        dataset_id,
        layer_name: cfg.layer_name(dataset_name),
        style: cfg.new_style(remote),
        collection: NewCollection {
            identifier: remote.id.clone(),
            name: name.clone(),
            items_url: remote.items_url().map(ToString::to_string),
            collection_url: remote.self_url().map(ToString::to_string),
            entries: remote.item_count,
        },
        feature_set_name: name,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use insta::assert_yaml_snapshot;

    use super::*;
    use crate::catalog::{ColorRamp, InsertPolicy, MemoryCatalog};
    use crate::sync::StyleConfig;
    use crate::sync::testing::{FakeSource, link, remote_collection};

    const FLOOD: &str = "https://ogc.example.org/flood";
    const ROADS: &str = "https://ogc.example.org/roads";

    fn dataset(url: &str, collections: &[(&str, CollectionConfig)]) -> DatasetConfig {
        DatasetConfig {
            url: url.to_string(),
            collections: collections
                .iter()
                .map(|(id, c)| ((*id).to_string(), c.clone()))
                .collect(),
            ..DatasetConfig::default()
        }
    }

    fn flood_source() -> FakeSource {
        FakeSource::default().with_api(
            FLOOD,
            "Flood risk",
            vec![
                remote_collection(FLOOD, "zones", "Flood zones", 12),
                remote_collection(FLOOD, "pumps", "Pumping stations", 3),
                remote_collection(FLOOD, "unwanted", "Not configured", 99),
            ],
        )
    }

    #[tokio::test]
    async fn mirrors_configured_collections_only() {
        let store = MemoryCatalog::new();
        let source = flood_source();
        let config = CatalogConfig {
            datasets: vec![dataset(
                FLOOD,
                &[
                    ("zones", CollectionConfig::default()),
                    (
                        "pumps",
                        CollectionConfig {
                            layer: Some("Infrastructure".to_string()),
                            ..CollectionConfig::default()
                        },
                    ),
                    ("gone", CollectionConfig::default()),
                ],
            )],
        };

        let report = CatalogSynchronizer::new(&store, &source)
            .synchronize(&config)
            .await;
        assert_yaml_snapshot!(report, @r"
        datasets:
          - url: https://ogc.example.org/flood
            name: Flood risk
            dataset_id: 1
            collections:
              - identifier: zones
                status: mirrored
                feature_set_id: 5
                layer_created: true
                has_items_url: true
              - identifier: pumps
                status: mirrored
                feature_set_id: 9
                layer_created: true
                has_items_url: true
            missing:
              - gone
        ");

        let sets = store.feature_sets().await.unwrap();
        assert_eq!(sets.len(), 2);
        let zones = sets[0].collection.as_ref().unwrap();
        assert_eq!(zones.identifier, "zones");
        assert_eq!(zones.name, "Flood zones");
        assert_eq!(zones.entries, Some(12));
        assert_eq!(
            zones.items_url.as_deref(),
            Some("https://ogc.example.org/flood/collections/zones/items?f=json")
        );
        assert_eq!(
            zones.collection_url.as_deref(),
            Some("https://ogc.example.org/flood/collections/zones")
        );
        assert_eq!(sets[0].feature_set.name, "Flood zones");
        assert!(sets.iter().all(|s| s.feature_set.is_api_backed()));

        let layers = store.layer_names("").await.unwrap();
        assert_eq!(layers, vec!["Flood risk", "Infrastructure"]);
        let counts = store.counts().await.unwrap();
        assert_eq!(counts.datasets, 1);
        assert_eq!(counts.collections, 2);
        assert_eq!(counts.styles, 2);
        assert_eq!(counts.colormaps, 0);
    }

    #[tokio::test]
    async fn layers_are_shared_by_name() {
        let store = MemoryCatalog::new();
        let source = flood_source();
        let water = CollectionConfig {
            layer: Some("Water".to_string()),
            ..CollectionConfig::default()
        };
        let config = CatalogConfig {
            datasets: vec![dataset(FLOOD, &[("zones", water.clone()), ("pumps", water)])],
        };
        let report = CatalogSynchronizer::new(&store, &source)
            .synchronize(&config)
            .await;
        assert_eq!(report.collections_mirrored(), 2);
        assert_eq!(store.layer_names("").await.unwrap(), vec!["Water"]);

        let sets = store.feature_sets().await.unwrap();
        assert_eq!(sets[0].feature_set.layer_id, sets[1].feature_set.layer_id);
        assert_ne!(sets[0].feature_set.style_id, sets[1].feature_set.style_id);
    }

    #[tokio::test]
    async fn style_overrides_and_colormap_are_stored() {
        let store = MemoryCatalog::new();
        let source = flood_source();
        let zones = CollectionConfig {
            name: Some("Zones".to_string()),
            popup_properties: BTreeMap::from([("Depth".to_string(), "depth_m".to_string())]),
            style: StyleConfig {
                area_color: Some("#0000ff".to_string()),
                fill_opacity: Some(0.5),
                ..StyleConfig::default()
            },
            colormap: Some(ColorRamp {
                property: "depth_m".to_string(),
                min_color: "#ffffff".to_string(),
                max_color: "#0000ff".to_string(),
                min_value: 0.0,
                max_value: 4.0,
            }),
            ..CollectionConfig::default()
        };
        let config = CatalogConfig {
            datasets: vec![dataset(FLOOD, &[("zones", zones)])],
        };
        CatalogSynchronizer::new(&store, &source)
            .synchronize(&config)
            .await;

        let sets = store.feature_sets().await.unwrap();
        assert_eq!(sets[0].feature_set.name, "Zones");
        let style = store
            .style(sets[0].feature_set.style_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(style.name, "Flood zones");
        assert_eq!(style.paint.area_color, "#0000ff");
        assert_eq!(style.paint.border_color, "#3388ff");
        assert_eq!(style.popup_properties["Depth"], "depth_m");
        assert_eq!(style.colormap.unwrap().ramp.property, "depth_m");
        assert_eq!(store.counts().await.unwrap().colormaps, 1);
    }

    #[tokio::test]
    async fn missing_links_give_null_urls() {
        let store = MemoryCatalog::new();
        let mut html_only = remote_collection(FLOOD, "zones", "Flood zones", 4);
        html_only.links = vec![link("items", Some("text/html"), "https://x.org/items.html")];
        let source = FakeSource::default().with_api(FLOOD, "Flood risk", vec![html_only]);
        let config = CatalogConfig {
            datasets: vec![dataset(FLOOD, &[("zones", CollectionConfig::default())])],
        };
        let report = CatalogSynchronizer::new(&store, &source)
            .synchronize(&config)
            .await;
        assert!(matches!(
            report.datasets[0].collections[0].outcome,
            CollectionOutcome::Mirrored {
                has_items_url: false,
                ..
            }
        ));
        let sets = store.feature_sets().await.unwrap();
        let collection = sets[0].collection.as_ref().unwrap();
        assert_eq!(collection.items_url, None);
        assert_eq!(collection.collection_url, None);
    }

    #[tokio::test]
    async fn failing_dataset_does_not_stop_others() {
        let store = MemoryCatalog::new();
        let source = FakeSource::default()
            .with_broken_collections(ROADS, "Roads")
            .with_api(
                FLOOD,
                "Flood risk",
                vec![remote_collection(FLOOD, "zones", "Flood zones", 1)],
            );
        let config = CatalogConfig {
            datasets: vec![
                dataset("https://down.example.org", &[("x", CollectionConfig::default())]),
                dataset(ROADS, &[("roads", CollectionConfig::default())]),
                dataset(FLOOD, &[("zones", CollectionConfig::default())]),
            ],
        };
        let report = CatalogSynchronizer::new(&store, &source)
            .synchronize(&config)
            .await;

        assert_eq!(report.datasets_processed(), 1);
        assert_eq!(report.datasets_failed(), 2);
        assert_eq!(report.collections_mirrored(), 1);

        let down = &report.datasets[0];
        assert_eq!(down.dataset_id, None);
        assert!(down.error.as_ref().unwrap().contains("503"));

        // the dataset row exists, but none of its collections
        let roads = &report.datasets[1];
        assert!(roads.dataset_id.is_some());
        assert!(roads.collections.is_empty());

        let counts = store.counts().await.unwrap();
        assert_eq!(counts.datasets, 2);
        assert_eq!(counts.collections, 1);
    }

    #[tokio::test]
    async fn reruns_follow_insert_policies() {
        let source = flood_source();
        let config = CatalogConfig {
            datasets: vec![dataset(FLOOD, &[("zones", CollectionConfig::default())])],
        };

        let store = MemoryCatalog::new();
        let sync = CatalogSynchronizer::new(&store, &source);
        sync.synchronize(&config).await;
        sync.synchronize(&config).await;
        let counts = store.counts().await.unwrap();
        assert_eq!((counts.datasets, counts.feature_sets, counts.layers), (2, 2, 1));

        let store = MemoryCatalog::new();
        let sync = CatalogSynchronizer::new(&store, &source).with_policies(CatalogPolicies {
            dataset: InsertPolicy::GetOrCreate,
            collection: InsertPolicy::GetOrCreate,
            layer: InsertPolicy::GetOrCreate,
        });
        sync.synchronize(&config).await;
        let second = sync.synchronize(&config).await;
        assert!(matches!(
            second.datasets[0].collections[0].outcome,
            CollectionOutcome::Reused { .. }
        ));
        let counts = store.counts().await.unwrap();
        assert_eq!((counts.datasets, counts.feature_sets, counts.layers), (1, 1, 1));
    }
}
