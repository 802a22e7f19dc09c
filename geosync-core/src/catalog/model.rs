//! Entities of the mirrored catalog.
//!
//! `New*` records carry everything needed to insert a row; the matching entity adds its
//! surrogate key. Styles and colormaps are immutable once created.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;

use crate::geometry::{Geometry, GeometryType};

/// Property bag of a feature, copied verbatim from the source.
pub type Properties = Map<String, Value>;

macro_rules! catalog_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

catalog_id!(
    /// Surrogate key of a [`Dataset`].
    DatasetId
);
catalog_id!(
    /// Surrogate key of a [`Collection`].
    CollectionId
);
catalog_id!(
    /// Surrogate key of a [`Layer`].
    LayerId
);
catalog_id!(
    /// Surrogate key of a [`Style`].
    StyleId
);
catalog_id!(
    /// Surrogate key of a [`Colormap`].
    ColormapId
);
catalog_id!(
    /// Surrogate key of a [`FeatureSet`].
    FeatureSetId
);
catalog_id!(
    /// Surrogate key of a [`Feature`].
    FeatureId
);

/// A remote OGC API root that collections are mirrored from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewDataset {
    /// Display name.
    pub name: String,
    /// Free-form description, usually taken from the remote root document.
    pub description: Option<String>,
    /// Root URL of the remote API.
    pub url: String,
    /// Remote identifiers of the collections configured for mirroring.
    pub collections: Vec<String>,
}

/// A stored [`NewDataset`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    /// Surrogate key.
    pub id: DatasetId,
    /// Display name.
    pub name: String,
    /// Free-form description.
    pub description: Option<String>,
    /// Root URL of the remote API.
    pub url: String,
    /// Remote identifiers of the collections configured for mirroring.
    pub collections: Vec<String>,
}

/// A remote collection as recorded in the catalog.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewCollection {
    /// Remote collection id.
    pub identifier: String,
    /// Display name.
    pub name: String,
    /// Items endpoint, if the remote advertised a JSON one.
    pub items_url: Option<String>,
    /// Collection endpoint (`rel=self`).
    pub collection_url: Option<String>,
    /// Item count reported by the remote. Sizes the items request.
    pub entries: Option<u64>,
}

/// A stored [`NewCollection`], owned by one dataset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    /// Surrogate key.
    pub id: CollectionId,
    /// Owning dataset.
    pub dataset_id: DatasetId,
    /// Remote collection id.
    pub identifier: String,
    /// Display name.
    pub name: String,
    /// Items endpoint.
    pub items_url: Option<String>,
    /// Collection endpoint.
    pub collection_url: Option<String>,
    /// Item count reported by the remote.
    pub entries: Option<u64>,
}

/// A named group of feature sets, toggled together in the UI.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layer {
    /// Surrogate key.
    pub id: LayerId,
    /// Unique display name.
    pub name: String,
}

/// A linear two-color ramp over a numeric feature property.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColorRamp {
    /// Feature property the ramp is driven by.
    pub property: String,
    /// Color at `min_value`.
    pub min_color: String,
    /// Color at `max_value`.
    pub max_color: String,
    /// Lower end of the domain.
    pub min_value: f64,
    /// Upper end of the domain.
    pub max_value: f64,
}

/// A stored [`ColorRamp`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Colormap {
    /// Surrogate key.
    pub id: ColormapId,
    /// The ramp definition.
    #[serde(flatten)]
    pub ramp: ColorRamp,
}

/// Static visual attributes of a style.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Paint {
    /// Stroke color of paths.
    pub border_color: String,
    /// Fill color of areas.
    pub area_color: String,
    /// Icon name for point markers.
    pub marker_icon: String,
    /// Color name for point markers.
    pub marker_color: String,
    /// Stroke width in pixels.
    pub line_weight: f64,
    /// Whether paths are stroked.
    pub stroke: bool,
    /// Stroke opacity.
    pub opacity: f64,
    /// Shape at the end of open paths.
    pub line_cap: String,
    /// Shape at path corners.
    pub line_join: String,
    /// Stroke dash pattern.
    pub dash_array: Option<String>,
    /// Offset into the dash pattern.
    pub dash_offset: Option<String>,
    /// Whether areas are filled.
    pub fill: bool,
    /// Fill opacity.
    pub fill_opacity: f64,
    /// How the inside of a shape is determined.
    pub fill_rule: String,
}

/// A style to be inserted, optionally with its own colormap.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewStyle {
    /// Display name.
    pub name: String,
    /// Popup label to feature property key.
    pub popup_properties: BTreeMap<String, String>,
    /// Static visual attributes.
    pub paint: Paint,
    /// Data-driven color ramp overriding the static colors.
    pub colormap: Option<ColorRamp>,
}

/// A stored style with its colormap resolved.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Style {
    /// Surrogate key.
    pub id: StyleId,
    /// Display name.
    pub name: String,
    /// Popup label to feature property key.
    pub popup_properties: BTreeMap<String, String>,
    /// Static visual attributes.
    pub paint: Paint,
    /// Data-driven color ramp.
    pub colormap: Option<Colormap>,
}

/// The local grouping that features are stored in.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSet {
    /// Surrogate key.
    pub id: FeatureSetId,
    /// Display name.
    pub name: String,
    /// Layer the set is toggled with.
    pub layer_id: LayerId,
    /// Style used to render the set.
    pub style_id: StyleId,
    /// Remote collection backing the set. `None` for manually populated sets.
    pub collection_id: Option<CollectionId>,
}

impl FeatureSet {
    /// API-backed sets are owned by the refresher; manual sets are never touched by it.
    #[must_use]
    pub fn is_api_backed(&self) -> bool {
        self.collection_id.is_some()
    }
}

/// A feature set together with the collection it mirrors, if any.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureSetSource {
    /// The feature set.
    pub feature_set: FeatureSet,
    /// Its backing collection.
    pub collection: Option<Collection>,
}

/// A converted feature not yet attached to a feature set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewFeature {
    /// Geometry in `WGS 84`.
    pub geometry: Geometry,
    /// Properties copied from the source.
    pub properties: Properties,
    /// Instant taken from the `timestamp` property.
    #[serde(with = "time::serde::rfc3339::option")]
    pub timestamp: Option<OffsetDateTime>,
}

impl NewFeature {
    /// Kind of the geometry. Derived from the geometry so the two always agree.
    #[must_use]
    pub fn geometry_type(&self) -> GeometryType {
        self.geometry.geometry_type()
    }
}

/// A stored feature.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    /// Surrogate key.
    pub id: FeatureId,
    /// Owning feature set.
    pub feature_set_id: FeatureSetId,
    /// Geometry in `WGS 84`.
    pub geometry: Geometry,
    /// Properties copied from the source.
    pub properties: Properties,
    /// Instant taken from the `timestamp` property.
    #[serde(with = "time::serde::rfc3339::option")]
    pub timestamp: Option<OffsetDateTime>,
}

impl Feature {
    /// Kind of the geometry.
    #[must_use]
    pub fn geometry_type(&self) -> GeometryType {
        self.geometry.geometry_type()
    }
}

/// Row counts per entity, used for run summaries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogCounts {
    /// Number of datasets.
    pub datasets: u64,
    /// Number of collections.
    pub collections: u64,
    /// Number of layers.
    pub layers: u64,
    /// Number of styles.
    pub styles: u64,
    /// Number of colormaps.
    pub colormaps: u64,
    /// Number of feature sets.
    pub feature_sets: u64,
    /// Number of features.
    pub features: u64,
}
