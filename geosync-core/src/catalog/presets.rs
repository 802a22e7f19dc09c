use std::collections::BTreeMap;

use enum_display::EnumDisplay;
use tracing::debug;

use crate::catalog::{CatalogResult, CatalogStore, LayerId, NewStyle, Paint, StyleId};

/// Built-in layer and style pairs every catalog carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumDisplay)]
pub enum Preset {
    /// Observed events.
    Events,
    /// Forecast events.
    Predictions,
}

impl Preset {
    /// All presets, in creation order.
    pub const ALL: [Self; 2] = [Self::Events, Self::Predictions];

    /// Name shared by the preset layer and style.
    #[must_use]
    pub fn name(self) -> String {
        self.to_string()
    }

    /// The preset style.
    #[must_use]
    pub fn style(self) -> NewStyle {
        let base = Paint::default();
        let paint = match self {
            Self::Events => Paint {
                border_color: "#ee4433".to_string(),
                area_color: "#ee2211".to_string(),
                marker_color: "red".to_string(),
                line_weight: 3.0,
                opacity: 1.0,
                fill_opacity: 0.3,
                ..base
            },
            Self::Predictions => Paint {
                border_color: "#3388ff".to_string(),
                area_color: "#2277ee".to_string(),
                marker_color: "lightred".to_string(),
                line_weight: 2.0,
                opacity: 0.8,
                fill_opacity: 0.2,
                ..base
            },
        };
        NewStyle {
            name: self.name(),
            popup_properties: BTreeMap::from([
                ("Type".to_string(), "event_type".to_string()),
                ("Time".to_string(), "time".to_string()),
                ("Timestamp".to_string(), "timestamp".to_string()),
            ]),
            paint,
            colormap: None,
        }
    }
}

/// Create the preset layers and styles that do not exist yet.
pub async fn ensure_presets(store: &dyn CatalogStore) -> CatalogResult<Vec<(LayerId, StyleId)>> {
    let mut ids = Vec::with_capacity(Preset::ALL.len());
    for preset in Preset::ALL {
        let layer = store.ensure_layer(&preset.name()).await?;
        let style = store.ensure_style(&preset.style()).await?;
        debug!("Preset {preset} uses layer {layer} and style {style}");
        ids.push((layer, style));
    }
    Ok(ids)
}
