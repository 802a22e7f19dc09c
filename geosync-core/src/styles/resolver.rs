use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::catalog::{ColorRamp, Feature, Properties, Style};
use crate::styles::{Rgb, StyleResult};

/// What happens to property values outside of a colormap's domain.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColormapMode {
    /// Continue the ramp past both boundary colors.
    #[default]
    Extrapolate,
    /// Use the boundary color.
    Clamp,
}

/// Path style handed to the map renderer.
#[serde_with::skip_serializing_none]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleDescriptor {
    /// Stroke color, replaced by the colormap color.
    pub color: String,
    /// Static stroke color.
    pub border_color: String,
    /// Static fill color.
    pub area_color: String,
    /// Fill color, replaced by the colormap color.
    pub fill_color: String,
    /// Stroke width in pixels.
    pub weight: f64,
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
    /// Fill rule.
    pub fill_rule: String,
}

/// How a single feature is drawn.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Presentation {
    /// Point-like geometries get an icon marker.
    Marker {
        /// Icon name.
        icon: String,
        /// Marker color name.
        color: String,
    },
    /// Everything else is drawn as a path.
    Path {
        /// Resolved path style.
        style: StyleDescriptor,
    },
}

/// Popup content of a feature: a title and label/value rows ordered by label.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Popup {
    /// Feature set name.
    pub title: String,
    /// Label and stringified property value.
    pub entries: Vec<(String, String)>,
}

/// Turns stored styles into renderer descriptors.
///
/// Resolution is a pure function of the style and the feature's properties.
#[derive(Clone, Copy, Debug, Default)]
pub struct StyleResolver {
    mode: ColormapMode,
}

impl StyleResolver {
    /// Resolver handling out-of-domain values as `mode` says.
    #[must_use]
    pub fn new(mode: ColormapMode) -> Self {
        Self { mode }
    }

    /// The static part of a style, ignoring any colormap.
    #[must_use]
    pub fn base(style: &Style) -> StyleDescriptor {
        let paint = &style.paint;
        StyleDescriptor {
            color: paint.border_color.clone(),
            border_color: paint.border_color.clone(),
            area_color: paint.area_color.clone(),
            fill_color: paint.area_color.clone(),
            weight: paint.line_weight,
            stroke: paint.stroke,
            opacity: paint.opacity,
            line_cap: paint.line_cap.clone(),
            line_join: paint.line_join.clone(),
            dash_array: paint.dash_array.clone(),
            dash_offset: paint.dash_offset.clone(),
            fill: paint.fill,
            fill_opacity: paint.fill_opacity,
            fill_rule: paint.fill_rule.clone(),
        }
    }

    /// The descriptor for a feature with the given properties.
    ///
    /// With a colormap, `color` and `fillColor` are replaced by the ramp color for the
    /// mapped property. Missing or non-numeric values count as the ramp minimum.
    pub fn resolve(&self, style: &Style, properties: &Properties) -> StyleResult<StyleDescriptor> {
        let mut descriptor = Self::base(style);
        if let Some(colormap) = &style.colormap {
            let color = self.ramp_color(&colormap.ramp, properties)?;
            descriptor.color.clone_from(&color);
            descriptor.fill_color = color;
        }
        Ok(descriptor)
    }

    /// Marker or path, depending on the feature's geometry.
    pub fn presentation(&self, style: &Style, feature: &Feature) -> StyleResult<Presentation> {
        if feature.geometry.geometry_type().is_puntal() {
            return Ok(Presentation::Marker {
                icon: style.paint.marker_icon.clone(),
                color: style.paint.marker_color.clone(),
            });
        }
        Ok(Presentation::Path {
            style: self.resolve(style, &feature.properties)?,
        })
    }

    /// Ramp color for the mapped property in `properties`, as `#rrggbb`.
    pub fn ramp_color(&self, ramp: &ColorRamp, properties: &Properties) -> StyleResult<String> {
        let min: Rgb = ramp.min_color.parse()?;
        let max: Rgb = ramp.max_color.parse()?;
        let span = ramp.max_value - ramp.min_value;
        if span == 0.0 || !span.is_finite() {
            return Ok(min.to_hex());
        }
        let value = properties
            .get(&ramp.property)
            .and_then(Value::as_f64)
            .unwrap_or(ramp.min_value);
        let mut t = (value - ramp.min_value) / span;
        if self.mode == ColormapMode::Clamp {
            t = t.clamp(0.0, 1.0);
        }
        Ok(min.lerp(max, t).to_hex())
    }
}

/// Popup rows for a feature, one per configured label.
#[must_use]
pub fn popup(feature_set_name: &str, style: &Style, properties: &Properties) -> Popup {
    Popup {
        title: feature_set_name.to_string(),
        entries: style
            .popup_properties
            .iter()
            .map(|(label, key)| {
                let value = match properties.get(key) {
                    None | Some(Value::Null) => String::new(),
                    Some(Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                };
                (label.clone(), value)
            })
            .collect(),
    }
}
