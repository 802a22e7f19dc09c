//! Structured results of synchronization and refresh runs.

use serde::Serialize;

use crate::catalog::{DatasetId, FeatureSetId};

/// Result of a catalog synchronization run.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SyncReport {
    /// One entry per configured dataset, in configuration order.
    pub datasets: Vec<DatasetReport>,
}

impl SyncReport {
    /// Datasets whose collections could be listed.
    #[must_use]
    pub fn datasets_processed(&self) -> usize {
        self.datasets.iter().filter(|d| d.error.is_none()).count()
    }

    /// Datasets that failed before their collections could be processed.
    #[must_use]
    pub fn datasets_failed(&self) -> usize {
        self.datasets.len() - self.datasets_processed()
    }

    /// Collections written or reused.
    #[must_use]
    pub fn collections_mirrored(&self) -> usize {
        self.collections()
            .filter(|c| !matches!(c.outcome, CollectionOutcome::Failed { .. }))
            .count()
    }

    /// Collections that could not be written.
    #[must_use]
    pub fn collections_failed(&self) -> usize {
        self.collections()
            .filter(|c| matches!(c.outcome, CollectionOutcome::Failed { .. }))
            .count()
    }

    fn collections(&self) -> impl Iterator<Item = &CollectionReport> {
        self.datasets.iter().flat_map(|d| d.collections.iter())
    }
}

/// Result for one configured dataset.
#[serde_with::skip_serializing_none]
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DatasetReport {
    /// Landing page URL.
    pub url: String,
    /// Resolved dataset name, once the landing page was read.
    pub name: Option<String>,
    /// Dataset row, once written.
    pub dataset_id: Option<DatasetId>,
    /// Why processing stopped early.
    pub error: Option<String>,
    /// Configured collections found remotely, in remote order.
    pub collections: Vec<CollectionReport>,
    /// Configured collections the remote does not have.
    pub missing: Vec<String>,
}

impl DatasetReport {
    pub(crate) fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            name: None,
            dataset_id: None,
            error: None,
            collections: Vec::new(),
            missing: Vec::new(),
        }
    }
}

/// Result for one mirrored collection.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CollectionReport {
    /// Remote collection id.
    pub identifier: String,
    /// What happened.
    #[serde(flatten)]
    pub outcome: CollectionOutcome,
}

/// What happened to a collection during synchronization.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CollectionOutcome {
    /// New rows were written.
    Mirrored {
        /// The new feature set.
        feature_set_id: FeatureSetId,
        /// Whether a new layer was created for it.
        layer_created: bool,
        /// Whether the remote advertised a JSON items endpoint.
        has_items_url: bool,
    },
    /// An existing collection was found and left as is.
    Reused {
        /// The existing feature set.
        feature_set_id: FeatureSetId,
    },
    /// Nothing was written.
    Failed {
        /// Error message.
        reason: String,
    },
}

/// Result of a feature refresh run.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RefreshReport {
    /// One entry per API-backed feature set, in id order.
    pub feature_sets: Vec<FeatureSetRefresh>,
}

impl RefreshReport {
    /// Features stored across all feature sets.
    #[must_use]
    pub fn features_saved(&self) -> u64 {
        self.feature_sets
            .iter()
            .map(|r| match r.outcome {
                RefreshOutcome::Refreshed { saved, .. } => saved,
                _ => 0,
            })
            .sum()
    }

    /// Feature sets refreshed successfully.
    #[must_use]
    pub fn refreshed(&self) -> usize {
        self.count(|o| matches!(o, RefreshOutcome::Refreshed { .. }))
    }

    /// Feature sets whose refresh failed. They are left empty.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, RefreshOutcome::Failed { .. }))
    }

    /// Feature sets skipped because the run was cancelled.
    #[must_use]
    pub fn cancelled(&self) -> usize {
        self.count(|o| matches!(o, RefreshOutcome::Cancelled))
    }

    fn count(&self, pred: impl Fn(&RefreshOutcome) -> bool) -> usize {
        self.feature_sets.iter().filter(|r| pred(&r.outcome)).count()
    }
}

/// Result for one API-backed feature set.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FeatureSetRefresh {
    /// The feature set.
    pub feature_set_id: FeatureSetId,
    /// Its name.
    pub name: String,
    /// Remote id of the backing collection.
    pub collection: String,
    /// Features removed before fetching.
    pub deleted: u64,
    /// What happened.
    #[serde(flatten)]
    pub outcome: RefreshOutcome,
}

/// What happened to a feature set during refresh.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RefreshOutcome {
    /// Features were fetched and stored.
    Refreshed {
        /// Features stored.
        saved: u64,
        /// Features without geometry, dropped.
        skipped_null: u64,
        /// Features that could not be converted, dropped.
        rejected: u64,
    },
    /// The collection could not be fetched or stored.
    Failed {
        /// Error message.
        reason: String,
    },
    /// The run was cancelled before this feature set was fetched.
    Cancelled,
}
