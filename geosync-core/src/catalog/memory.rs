use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::catalog::{
    CatalogCounts, CatalogError, CatalogPolicies, CatalogResult, CatalogStore, Collection,
    CollectionMirror, Colormap, ColormapId, CollectionId, CreatedFeatureSet, Dataset, DatasetId,
    Feature, FeatureId, FeatureSet, FeatureSetId, FeatureSetSource, InsertPolicy, Layer, LayerId,
    ManualFeatureSet, MirroredCollection, NewDataset, NewFeature, NewStyle, Style, StyleId,
};

/// Catalog kept in process memory.
///
/// Behaves like the `PostgreSQL` store, including insert policies and leases,
/// but nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    last_id: i32,
    datasets: Vec<Dataset>,
    collections: Vec<Collection>,
    layers: Vec<Layer>,
    colormaps: Vec<Colormap>,
    styles: Vec<Style>,
    feature_sets: Vec<FeatureSet>,
    features: Vec<Feature>,
    leases: HashMap<String, Lease>,
}

#[derive(Debug)]
struct Lease {
    holder: String,
    expires_at: Instant,
}

impl MemoryCatalog {
    /// An empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> CatalogResult<MutexGuard<'_, State>> {
        self.state.lock().map_err(|_| CatalogError::Poisoned)
    }
}

impl State {
    fn next_id(&mut self) -> i32 {
        self.last_id += 1;
        self.last_id
    }

    fn layer_by_name(&self, name: &str) -> Option<LayerId> {
        self.layers.iter().find(|l| l.name == name).map(|l| l.id)
    }

    fn insert_layer(&mut self, name: &str) -> LayerId {
        let id = LayerId(self.next_id());
        self.layers.push(Layer {
            id,
            name: name.to_string(),
        });
        id
    }

    fn insert_style(&mut self, style: &NewStyle) -> (StyleId, Option<ColormapId>) {
        let colormap = style.colormap.as_ref().map(|ramp| Colormap {
            id: ColormapId(self.next_id()),
            ramp: ramp.clone(),
        });
        let colormap_id = colormap.as_ref().map(|c| c.id);
        if let Some(colormap) = &colormap {
            self.colormaps.push(colormap.clone());
        }
        let id = StyleId(self.next_id());
        self.styles.push(Style {
            id,
            name: style.name.clone(),
            popup_properties: style.popup_properties.clone(),
            paint: style.paint.clone(),
            colormap,
        });
        (id, colormap_id)
    }

    fn insert_feature_set(
        &mut self,
        name: &str,
        layer_id: LayerId,
        style_id: StyleId,
        collection_id: Option<CollectionId>,
    ) -> FeatureSetId {
        let id = FeatureSetId(self.next_id());
        self.feature_sets.push(FeatureSet {
            id,
            name: name.to_string(),
            layer_id,
            style_id,
            collection_id,
        });
        id
    }

    fn insert_features(&mut self, feature_set_id: FeatureSetId, features: &[NewFeature]) -> u64 {
        for feature in features {
            let id = FeatureId(self.next_id());
            self.features.push(Feature {
                id,
                feature_set_id,
                geometry: feature.geometry.clone(),
                properties: feature.properties.clone(),
                timestamp: feature.timestamp,
            });
        }
        features.len() as u64
    }

    fn existing_mirror(&self, mirror: &CollectionMirror) -> Option<MirroredCollection> {
        let collection = self.collections.iter().find(|c| {
            c.dataset_id == mirror.dataset_id && c.identifier == mirror.collection.identifier
        })?;
        let feature_set = self
            .feature_sets
            .iter()
            .find(|fs| fs.collection_id == Some(collection.id))?;
        let colormap_id = self
            .styles
            .iter()
            .find(|s| s.id == feature_set.style_id)
            .and_then(|s| s.colormap.as_ref().map(|c| c.id));
        Some(MirroredCollection {
            layer_id: feature_set.layer_id,
            layer_created: false,
            style_id: feature_set.style_id,
            colormap_id,
            collection_id: collection.id,
            feature_set_id: feature_set.id,
            reused: true,
        })
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalog {
    async fn initialize(&self) -> CatalogResult<()> {
        Ok(())
    }

    async fn create_dataset(
        &self,
        dataset: &NewDataset,
        policy: InsertPolicy,
    ) -> CatalogResult<DatasetId> {
        let mut state = self.lock()?;
        if policy == InsertPolicy::GetOrCreate
            && let Some(existing) = state.datasets.iter().find(|d| d.name == dataset.name)
        {
            return Ok(existing.id);
        }
        let id = DatasetId(state.next_id());
        state.datasets.push(Dataset {
            id,
            name: dataset.name.clone(),
            description: dataset.description.clone(),
            url: dataset.url.clone(),
            collections: dataset.collections.clone(),
        });
        Ok(id)
    }

    async fn mirror_collection(
        &self,
        mirror: &CollectionMirror,
        policies: &CatalogPolicies,
    ) -> CatalogResult<MirroredCollection> {
        let mut state = self.lock()?;
        if !state.datasets.iter().any(|d| d.id == mirror.dataset_id) {
            return Err(CatalogError::UnknownDataset(mirror.dataset_id));
        }
        if policies.collection == InsertPolicy::GetOrCreate
            && let Some(existing) = state.existing_mirror(mirror)
        {
            return Ok(existing);
        }

        let (layer_id, layer_created) = match policies.layer {
            InsertPolicy::GetOrCreate => match state.layer_by_name(&mirror.layer_name) {
                Some(id) => (id, false),
                None => (state.insert_layer(&mirror.layer_name), true),
            },
            InsertPolicy::AlwaysInsert => (state.insert_layer(&mirror.layer_name), true),
        };
        let (style_id, colormap_id) = state.insert_style(&mirror.style);

        let collection_id = CollectionId(state.next_id());
        let new = &mirror.collection;
        state.collections.push(Collection {
            id: collection_id,
            dataset_id: mirror.dataset_id,
            identifier: new.identifier.clone(),
            name: new.name.clone(),
            items_url: new.items_url.clone(),
            collection_url: new.collection_url.clone(),
            entries: new.entries,
        });
        let feature_set_id = state.insert_feature_set(
            &mirror.feature_set_name,
            layer_id,
            style_id,
            Some(collection_id),
        );

        Ok(MirroredCollection {
            layer_id,
            layer_created,
            style_id,
            colormap_id,
            collection_id,
            feature_set_id,
            reused: false,
        })
    }

    async fn feature_sets(&self) -> CatalogResult<Vec<FeatureSetSource>> {
        let state = self.lock()?;
        Ok(state
            .feature_sets
            .iter()
            .map(|fs| FeatureSetSource {
                feature_set: fs.clone(),
                collection: fs
                    .collection_id
                    .and_then(|id| state.collections.iter().find(|c| c.id == id).cloned()),
            })
            .collect())
    }

    async fn delete_features(&self, feature_set: FeatureSetId) -> CatalogResult<u64> {
        let mut state = self.lock()?;
        let before = state.features.len();
        state.features.retain(|f| f.feature_set_id != feature_set);
        Ok((before - state.features.len()) as u64)
    }

    async fn insert_features(
        &self,
        feature_set: FeatureSetId,
        features: &[NewFeature],
    ) -> CatalogResult<u64> {
        let mut state = self.lock()?;
        if !state.feature_sets.iter().any(|fs| fs.id == feature_set) {
            return Err(CatalogError::UnknownFeatureSet(feature_set));
        }
        Ok(state.insert_features(feature_set, features))
    }

    async fn features(&self, feature_set: FeatureSetId) -> CatalogResult<Vec<Feature>> {
        let state = self.lock()?;
        Ok(state
            .features
            .iter()
            .filter(|f| f.feature_set_id == feature_set)
            .cloned()
            .collect())
    }

    async fn style(&self, id: StyleId) -> CatalogResult<Option<Style>> {
        let state = self.lock()?;
        Ok(state.styles.iter().find(|s| s.id == id).cloned())
    }

    async fn layer_names(&self, prefix: &str) -> CatalogResult<Vec<String>> {
        let state = self.lock()?;
        Ok(state
            .layers
            .iter()
            .filter(|l| l.name.starts_with(prefix))
            .map(|l| l.name.clone())
            .collect())
    }

    async fn ensure_layer(&self, name: &str) -> CatalogResult<LayerId> {
        let mut state = self.lock()?;
        Ok(match state.layer_by_name(name) {
            Some(id) => id,
            None => state.insert_layer(name),
        })
    }

    async fn ensure_style(&self, style: &NewStyle) -> CatalogResult<StyleId> {
        let mut state = self.lock()?;
        if let Some(existing) = state.styles.iter().find(|s| s.name == style.name) {
            return Ok(existing.id);
        }
        Ok(state.insert_style(style).0)
    }

    async fn create_manual_feature_set(
        &self,
        manual: &ManualFeatureSet,
    ) -> CatalogResult<CreatedFeatureSet> {
        let mut state = self.lock()?;
        if state.layer_by_name(&manual.layer_name).is_some() {
            return Err(CatalogError::DuplicateName(
                "layer",
                manual.layer_name.clone(),
            ));
        }
        let layer_id = state.insert_layer(&manual.layer_name);
        let (style_id, _) = state.insert_style(&manual.style);
        let feature_set_id =
            state.insert_feature_set(&manual.feature_set_name, layer_id, style_id, None);
        let features = state.insert_features(feature_set_id, &manual.features);
        Ok(CreatedFeatureSet {
            layer_id,
            style_id,
            feature_set_id,
            features,
        })
    }

    async fn try_acquire_lease(
        &self,
        name: &str,
        holder: &str,
        ttl: Duration,
    ) -> CatalogResult<bool> {
        let mut state = self.lock()?;
        let now = Instant::now();
        if let Some(lease) = state.leases.get(name)
            && lease.holder != holder
            && lease.expires_at > now
        {
            return Ok(false);
        }
        state.leases.insert(
            name.to_string(),
            Lease {
                holder: holder.to_string(),
                expires_at: now + ttl,
            },
        );
        Ok(true)
    }

    async fn release_lease(&self, name: &str, holder: &str) -> CatalogResult<()> {
        let mut state = self.lock()?;
        if state.leases.get(name).is_some_and(|l| l.holder == holder) {
            state.leases.remove(name);
        }
        Ok(())
    }

    async fn counts(&self) -> CatalogResult<CatalogCounts> {
        let state = self.lock()?;
        Ok(CatalogCounts {
            datasets: state.datasets.len() as u64,
            collections: state.collections.len() as u64,
            layers: state.layers.len() as u64,
            styles: state.styles.len() as u64,
            colormaps: state.colormaps.len() as u64,
            feature_sets: state.feature_sets.len() as u64,
            features: state.features.len() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::catalog::{ColorRamp, NewCollection, Paint};

    fn paint() -> Paint {
        Paint {
            border_color: "#3388ff".to_string(),
            area_color: "#2277ee".to_string(),
            marker_icon: "circle".to_string(),
            marker_color: "black".to_string(),
            line_weight: 3.0,
            stroke: true,
            opacity: 1.0,
            line_cap: "round".to_string(),
            line_join: "round".to_string(),
            dash_array: None,
            dash_offset: None,
            fill: true,
            fill_opacity: 0.2,
            fill_rule: "evenodd".to_string(),
        }
    }

    fn mirror(dataset_id: DatasetId, identifier: &str, layer: &str) -> CollectionMirror {
        CollectionMirror {
            dataset_id,
            layer_name: layer.to_string(),
            style: NewStyle {
                name: identifier.to_string(),
                popup_properties: BTreeMap::new(),
                paint: paint(),
                colormap: Some(ColorRamp {
                    property: "depth".to_string(),
                    min_color: "#000000".to_string(),
                    max_color: "#ffffff".to_string(),
                    min_value: 0.0,
                    max_value: 10.0,
                }),
            },
            collection: NewCollection {
                identifier: identifier.to_string(),
                name: identifier.to_string(),
                items_url: None,
                collection_url: None,
                entries: Some(3),
            },
            feature_set_name: identifier.to_string(),
        }
    }

    async fn dataset(store: &MemoryCatalog, policy: InsertPolicy) -> DatasetId {
        let new = NewDataset {
            name: "Floods".to_string(),
            description: None,
            url: "https://example.org/ogc".to_string(),
            collections: vec!["rivers".to_string()],
        };
        store.create_dataset(&new, policy).await.unwrap()
    }

    #[tokio::test]
    async fn default_policies_duplicate_everything_but_layers() {
        let store = MemoryCatalog::new();
        let policies = CatalogPolicies::default();
        for _ in 0..2 {
            let ds = dataset(&store, policies.dataset).await;
            store
                .mirror_collection(&mirror(ds, "rivers", "Water"), &policies)
                .await
                .unwrap();
        }
        let counts = store.counts().await.unwrap();
        assert_eq!(counts.datasets, 2);
        assert_eq!(counts.collections, 2);
        assert_eq!(counts.feature_sets, 2);
        assert_eq!(counts.styles, 2);
        assert_eq!(counts.colormaps, 2);
        assert_eq!(counts.layers, 1);
    }

    #[tokio::test]
    async fn get_or_create_reuses_existing_rows() {
        let store = MemoryCatalog::new();
        let policies = CatalogPolicies {
            dataset: InsertPolicy::GetOrCreate,
            collection: InsertPolicy::GetOrCreate,
            layer: InsertPolicy::GetOrCreate,
        };
        let ds = dataset(&store, policies.dataset).await;
        let first = store
            .mirror_collection(&mirror(ds, "rivers", "Water"), &policies)
            .await
            .unwrap();
        assert!(!first.reused);
        assert!(first.colormap_id.is_some());

        let again = dataset(&store, policies.dataset).await;
        assert_eq!(again, ds);
        let second = store
            .mirror_collection(&mirror(again, "rivers", "Water"), &policies)
            .await
            .unwrap();
        assert!(second.reused);
        assert_eq!(second.feature_set_id, first.feature_set_id);
        assert_eq!(second.colormap_id, first.colormap_id);
        assert_eq!(store.counts().await.unwrap().styles, 1);
    }

    #[tokio::test]
    async fn mirror_requires_dataset() {
        let store = MemoryCatalog::new();
        let err = store
            .mirror_collection(&mirror(DatasetId(42), "x", "x"), &CatalogPolicies::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::UnknownDataset(DatasetId(42))));
    }

    #[tokio::test]
    async fn lease_is_exclusive_until_released_or_expired() {
        let store = MemoryCatalog::new();
        let ttl = Duration::from_secs(60);
        assert!(store.try_acquire_lease("refresh", "a", ttl).await.unwrap());
        assert!(!store.try_acquire_lease("refresh", "b", ttl).await.unwrap());
        // re-entrant for the same holder
        assert!(store.try_acquire_lease("refresh", "a", ttl).await.unwrap());

        store.release_lease("refresh", "b").await.unwrap();
        assert!(!store.try_acquire_lease("refresh", "b", ttl).await.unwrap());
        store.release_lease("refresh", "a").await.unwrap();
        assert!(store.try_acquire_lease("refresh", "b", ttl).await.unwrap());

        assert!(
            store
                .try_acquire_lease("expiring", "a", Duration::ZERO)
                .await
                .unwrap()
        );
        assert!(store.try_acquire_lease("expiring", "b", ttl).await.unwrap());
    }
}
