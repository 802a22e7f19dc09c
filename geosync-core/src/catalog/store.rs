use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::catalog::{
    CatalogCounts, CatalogResult, ColormapId, CollectionId, DatasetId, Feature, FeatureSetId,
    FeatureSetSource, LayerId, NewCollection, NewDataset, NewFeature, NewStyle, Style, StyleId,
};

/// How an entity is written when a row with the same natural key may already exist.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertPolicy {
    /// Insert a new row unconditionally. Re-runs create duplicates.
    #[default]
    AlwaysInsert,
    /// Reuse the existing row with the same natural key, insert otherwise.
    GetOrCreate,
}

/// Insert policy per entity type.
///
/// Natural keys are the dataset name, the `(dataset, identifier)` pair for collections
/// and the layer name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CatalogPolicies {
    /// Policy for datasets.
    pub dataset: InsertPolicy,
    /// Policy for collections and everything created along with them.
    pub collection: InsertPolicy,
    /// Policy for layers.
    pub layer: InsertPolicy,
}

impl Default for CatalogPolicies {
    fn default() -> Self {
        Self {
            dataset: InsertPolicy::AlwaysInsert,
            collection: InsertPolicy::AlwaysInsert,
            layer: InsertPolicy::GetOrCreate,
        }
    }
}

/// Everything written for one mirrored remote collection.
#[derive(Clone, Debug, PartialEq)]
pub struct CollectionMirror {
    /// Owning dataset.
    pub dataset_id: DatasetId,
    /// Layer the feature set is grouped into.
    pub layer_name: String,
    /// Style (and optional colormap) of the feature set.
    pub style: NewStyle,
    /// The collection row.
    pub collection: NewCollection,
    /// Name of the feature set mirroring the collection.
    pub feature_set_name: String,
}

/// Keys of the rows backing a mirrored collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirroredCollection {
    /// Layer used.
    pub layer_id: LayerId,
    /// `true` if the layer was created by this write.
    pub layer_created: bool,
    /// Style used.
    pub style_id: StyleId,
    /// Colormap used, if any.
    pub colormap_id: Option<ColormapId>,
    /// Collection row.
    pub collection_id: CollectionId,
    /// Feature set mirroring the collection.
    pub feature_set_id: FeatureSetId,
    /// `true` if an existing collection was reused and nothing else was written.
    pub reused: bool,
}

/// A manually populated feature set, created together with its layer and style.
#[derive(Clone, Debug, PartialEq)]
pub struct ManualFeatureSet {
    /// Name of the new layer. Must not be taken.
    pub layer_name: String,
    /// Style of the feature set.
    pub style: NewStyle,
    /// Name of the feature set.
    pub feature_set_name: String,
    /// Features to store.
    pub features: Vec<NewFeature>,
}

/// Keys of a created [`ManualFeatureSet`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedFeatureSet {
    /// New layer.
    pub layer_id: LayerId,
    /// New style.
    pub style_id: StyleId,
    /// New feature set.
    pub feature_set_id: FeatureSetId,
    /// Number of features stored.
    pub features: u64,
}

/// Persistence of the catalog entity graph.
///
/// Every method is its own unit of work: it either commits completely or not at all.
/// A crash between two calls leaves the prefix of completed calls in place.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Create whatever schema the store needs. Safe to call on an initialized store.
    async fn initialize(&self) -> CatalogResult<()>;

    /// Insert a dataset, or reuse the one with the same name under [`InsertPolicy::GetOrCreate`].
    async fn create_dataset(
        &self,
        dataset: &NewDataset,
        policy: InsertPolicy,
    ) -> CatalogResult<DatasetId>;

    /// Write the layer, colormap, style, collection and feature set of a mirrored collection.
    async fn mirror_collection(
        &self,
        mirror: &CollectionMirror,
        policies: &CatalogPolicies,
    ) -> CatalogResult<MirroredCollection>;

    /// All feature sets in id order, each with its backing collection.
    async fn feature_sets(&self) -> CatalogResult<Vec<FeatureSetSource>>;

    /// Delete every feature of a feature set, returning how many were removed.
    async fn delete_features(&self, feature_set: FeatureSetId) -> CatalogResult<u64>;

    /// Attach features to a feature set, returning how many were stored.
    async fn insert_features(
        &self,
        feature_set: FeatureSetId,
        features: &[NewFeature],
    ) -> CatalogResult<u64>;

    /// Features of a feature set in id order.
    async fn features(&self, feature_set: FeatureSetId) -> CatalogResult<Vec<Feature>>;

    /// A style with its colormap.
    async fn style(&self, id: StyleId) -> CatalogResult<Option<Style>>;

    /// Names of all layers starting with `prefix`.
    async fn layer_names(&self, prefix: &str) -> CatalogResult<Vec<String>>;

    /// Find a layer by name, creating it if missing.
    async fn ensure_layer(&self, name: &str) -> CatalogResult<LayerId>;

    /// Find a style by name, creating it if missing.
    async fn ensure_style(&self, style: &NewStyle) -> CatalogResult<StyleId>;

    /// Create a layer, style and manual feature set, then store its features.
    async fn create_manual_feature_set(
        &self,
        manual: &ManualFeatureSet,
    ) -> CatalogResult<CreatedFeatureSet>;

    /// Take the named lease for `ttl` unless another holder has an unexpired one.
    async fn try_acquire_lease(&self, name: &str, holder: &str, ttl: Duration)
    -> CatalogResult<bool>;

    /// Give up a lease taken by `holder`. Leases held by others are left alone.
    async fn release_lease(&self, name: &str, holder: &str) -> CatalogResult<()>;

    /// Row counts per entity.
    async fn counts(&self) -> CatalogResult<CatalogCounts>;
}
