//! Declarative description of what to mirror, and the style defaults applied to it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::catalog::{ColorRamp, NewStyle, Paint};
use crate::remote::{RemoteCollection, RootDocument};

/// Keys present in a configuration section but not understood by it.
pub type UnrecognizedValues = BTreeMap<String, serde_json::Value>;

/// Default value of every styling attribute.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StyleDefaults {
    /// Default of [`Paint::border_color`].
    pub border_color: &'static str,
    /// Default of [`Paint::area_color`].
    pub area_color: &'static str,
    /// Default of [`Paint::marker_icon`].
    pub marker_icon: &'static str,
    /// Default of [`Paint::marker_color`].
    pub marker_color: &'static str,
    /// Default of [`Paint::line_weight`].
    pub line_weight: f64,
    /// Default of [`Paint::stroke`].
    pub stroke: bool,
    /// Default of [`Paint::opacity`].
    pub opacity: f64,
    /// Default of [`Paint::line_cap`].
    pub line_cap: &'static str,
    /// Default of [`Paint::line_join`].
    pub line_join: &'static str,
    /// Default of [`Paint::dash_array`].
    pub dash_array: Option<&'static str>,
    /// Default of [`Paint::dash_offset`].
    pub dash_offset: Option<&'static str>,
    /// Default of [`Paint::fill`].
    pub fill: bool,
    /// Default of [`Paint::fill_opacity`].
    pub fill_opacity: f64,
    /// Default of [`Paint::fill_rule`].
    pub fill_rule: &'static str,
}

/// The single source of styling defaults.
pub const STYLE_DEFAULTS: StyleDefaults = StyleDefaults {
    border_color: "#3388ff",
    area_color: "#2277ee",
    marker_icon: "circle",
    marker_color: "black",
    line_weight: 3.0,
    stroke: true,
    opacity: 1.0,
    line_cap: "round",
    line_join: "round",
    dash_array: None,
    dash_offset: None,
    fill: true,
    fill_opacity: 0.2,
    fill_rule: "evenodd",
};

impl Default for Paint {
    fn default() -> Self {
        StyleConfig::default().resolve()
    }
}

/// Mirroring configuration: one entry per remote API.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Remote APIs to mirror.
    #[serde(default)]
    pub datasets: Vec<DatasetConfig>,
}

impl CatalogConfig {
    /// Dotted paths of every key that was not understood.
    #[must_use]
    pub fn unrecognized_keys(&self) -> Vec<String> {
        let mut keys = Vec::new();
        for (idx, dataset) in self.datasets.iter().enumerate() {
            let prefix = format!("datasets[{idx}].");
            push_keys(&mut keys, &prefix, &dataset.unrecognized);
            for (id, collection) in &dataset.collections {
                let prefix = format!("{prefix}collections.{id}.");
                push_keys(&mut keys, &prefix, &collection.unrecognized);
                push_keys(&mut keys, &format!("{prefix}style."), &collection.style.unrecognized);
            }
        }
        keys
    }
}

fn push_keys(keys: &mut Vec<String>, prefix: &str, values: &UnrecognizedValues) {
    keys.extend(values.keys().map(|k| format!("{prefix}{k}")));
}

/// One remote API and the collections to mirror from it.
#[serde_with::skip_serializing_none]
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Landing page URL.
    pub url: String,
    /// Overrides the remote title.
    pub name: Option<String>,
    /// Overrides the remote description.
    pub description: Option<String>,
    /// Collections to mirror, keyed by remote id. Other remote collections are ignored.
    #[serde(default)]
    pub collections: BTreeMap<String, CollectionConfig>,
    /// Keys not understood here, reported as warnings.
    #[serde(flatten, skip_serializing)]
    pub unrecognized: UnrecognizedValues,
}

impl DatasetConfig {
    /// Configured name, else the remote title, else the URL.
    #[must_use]
    pub fn dataset_name(&self, root: &RootDocument) -> String {
        self.name
            .clone()
            .or_else(|| root.title.clone())
            .unwrap_or_else(|| self.url.clone())
    }

    /// Configured description, else the remote one.
    #[must_use]
    pub fn dataset_description(&self, root: &RootDocument) -> Option<String> {
        self.description
            .clone()
            .or_else(|| root.description.clone())
    }
}

/// How a single remote collection is mirrored.
#[serde_with::skip_serializing_none]
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// Overrides the remote title as collection and feature set name.
    pub name: Option<String>,
    /// Layer to group the feature set into. Defaults to the dataset name.
    pub layer: Option<String>,
    /// Popup label to feature property key.
    #[serde(default)]
    pub popup_properties: BTreeMap<String, String>,
    /// Style overrides.
    #[serde(default)]
    pub style: StyleConfig,
    /// Data-driven color ramp.
    pub colormap: Option<ColorRamp>,
    /// Keys not understood here, reported as warnings.
    #[serde(flatten, skip_serializing)]
    pub unrecognized: UnrecognizedValues,
}

impl CollectionConfig {
    /// Configured name, else the remote title, else the remote id.
    #[must_use]
    pub fn collection_name(&self, remote: &RemoteCollection) -> String {
        self.name
            .clone()
            .or_else(|| remote.title.clone())
            .unwrap_or_else(|| remote.id.clone())
    }

    /// Configured layer, else the dataset name.
    #[must_use]
    pub fn layer_name(&self, dataset_name: &str) -> String {
        self.layer
            .clone()
            .unwrap_or_else(|| dataset_name.to_string())
    }

    /// The style to create, named after the remote title when there is one.
    #[must_use]
    pub fn new_style(&self, remote: &RemoteCollection) -> NewStyle {
        NewStyle {
            name: remote
                .title
                .clone()
                .unwrap_or_else(|| self.collection_name(remote)),
            popup_properties: self.popup_properties.clone(),
            paint: self.style.resolve(),
            colormap: self.colormap.clone(),
        }
    }
}

/// Style overrides. Every attribute left out takes its value from [`STYLE_DEFAULTS`].
///
/// Fields mirror those of [`Paint`].
#[allow(missing_docs)]
#[serde_with::skip_serializing_none]
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StyleConfig {
    pub border_color: Option<String>,
    pub area_color: Option<String>,
    pub marker_icon: Option<String>,
    pub marker_color: Option<String>,
    pub line_weight: Option<f64>,
    pub stroke: Option<bool>,
    pub opacity: Option<f64>,
    pub line_cap: Option<String>,
    pub line_join: Option<String>,
    pub dash_array: Option<String>,
    pub dash_offset: Option<String>,
    pub fill: Option<bool>,
    pub fill_opacity: Option<f64>,
    pub fill_rule: Option<String>,
    /// Keys not understood here, reported as warnings.
    #[serde(flatten, skip_serializing)]
    pub unrecognized: UnrecognizedValues,
}

impl StyleConfig {
    /// Apply the overrides on top of [`STYLE_DEFAULTS`].
    #[must_use]
    pub fn resolve(&self) -> Paint {
        let d = &STYLE_DEFAULTS;
        let text = |v: &Option<String>, default: &str| v.clone().unwrap_or_else(|| default.to_string());
        Paint {
            border_color: text(&self.border_color, d.border_color),
            area_color: text(&self.area_color, d.area_color),
            marker_icon: text(&self.marker_icon, d.marker_icon),
            marker_color: text(&self.marker_color, d.marker_color),
            line_weight: self.line_weight.unwrap_or(d.line_weight),
            stroke: self.stroke.unwrap_or(d.stroke),
            opacity: self.opacity.unwrap_or(d.opacity),
            line_cap: text(&self.line_cap, d.line_cap),
            line_join: text(&self.line_join, d.line_join),
            dash_array: self
                .dash_array
                .clone()
                .or_else(|| d.dash_array.map(ToString::to_string)),
            dash_offset: self
                .dash_offset
                .clone()
                .or_else(|| d.dash_offset.map(ToString::to_string)),
            fill: self.fill.unwrap_or(d.fill),
            fill_opacity: self.fill_opacity.unwrap_or(d.fill_opacity),
            fill_rule: text(&self.fill_rule, d.fill_rule),
        }
    }
}
