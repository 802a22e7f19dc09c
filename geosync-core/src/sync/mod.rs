//! Mirroring remote OGC API catalogs into the local catalog, and keeping their features fresh.
//!
//! [`CatalogSynchronizer`] writes the dataset, collection, layer, style and feature set rows
//! described by a [`CatalogConfig`]. [`FeatureRefresher`] then replaces the features of every
//! API-backed feature set with the current remote content.

mod config;
pub use config::{
    CatalogConfig, CollectionConfig, DatasetConfig, STYLE_DEFAULTS, StyleConfig, StyleDefaults,
    UnrecognizedValues,
};

mod error;
pub use error::{SyncError, SyncResult};

mod report;
pub use report::{
    CollectionOutcome, CollectionReport, DatasetReport, FeatureSetRefresh, RefreshOutcome,
    RefreshReport, SyncReport,
};

mod synchronizer;
pub use synchronizer::CatalogSynchronizer;

mod refresher;
pub(crate) use refresher::convert_features;
pub use refresher::{DEFAULT_LEASE_TTL, FeatureRefresher, REFRESH_LEASE, RefreshOptions};

#[cfg(test)]
pub(crate) mod testing;
