//! The persisted entity graph: datasets, collections, layers, styles, colormaps,
//! feature sets and features.

mod error;
pub use error::{CatalogError, CatalogResult};

mod model;
pub use model::*;

mod store;
pub use store::{
    CatalogPolicies, CatalogStore, CollectionMirror, CreatedFeatureSet, InsertPolicy,
    ManualFeatureSet, MirroredCollection,
};

mod memory;
pub use memory::MemoryCatalog;

mod presets;
pub use presets::{Preset, ensure_presets};

/// `PostgreSQL`/`PostGIS` backed store.
#[cfg(feature = "postgres")]
pub mod postgres;
