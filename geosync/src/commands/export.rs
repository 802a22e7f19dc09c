use geojson::feature::Id;
use geojson::{FeatureCollection, JsonObject};
use geosync_core::catalog::{CatalogStore, Feature, FeatureSetId, Style};
use geosync_core::styles::{StyleResolver, popup};
use serde::Serialize;
use serde_json::Value;

use crate::{GeosyncError, GeosyncResult};

/// A feature set as a `GeoJSON` FeatureCollection.
///
/// Every feature carries its original properties, plus a `style` member with the
/// marker or path descriptor and a `popup` member with its popup rows.
pub async fn export_feature_set(
    store: &dyn CatalogStore,
    id: FeatureSetId,
    resolver: StyleResolver,
) -> GeosyncResult<FeatureCollection> {
    let feature_set = store
        .feature_sets()
        .await?
        .into_iter()
        .map(|s| s.feature_set)
        .find(|s| s.id == id)
        .ok_or(GeosyncError::FeatureSetNotFound(id))?;
    let style = store
        .style(feature_set.style_id)
        .await?
        .ok_or(GeosyncError::StyleNotFound(id, feature_set.style_id))?;

    let features = store
        .features(id)
        .await?
        .iter()
        .map(|f| export_feature(resolver, &feature_set.name, &style, f))
        .collect::<GeosyncResult<Vec<_>>>()?;

    let mut members = JsonObject::new();
    members.insert("name".to_string(), Value::from(feature_set.name));
    Ok(FeatureCollection {
        bbox: None,
        features,
        foreign_members: Some(members),
    })
}

fn export_feature(
    resolver: StyleResolver,
    feature_set_name: &str,
    style: &Style,
    feature: &Feature,
) -> GeosyncResult<geojson::Feature> {
    let mut members = JsonObject::new();
    members.insert(
        "style".to_string(),
        to_value(&resolver.presentation(style, feature)?)?,
    );
    members.insert(
        "popup".to_string(),
        to_value(&popup(feature_set_name, style, &feature.properties))?,
    );
    Ok(geojson::Feature {
        bbox: None,
        geometry: Some(feature.geometry.to_geojson()),
        id: Some(Id::Number(feature.id.0.into())),
        properties: Some(feature.properties.clone()),
        foreign_members: Some(members),
    })
}

fn to_value(value: &impl Serialize) -> GeosyncResult<Value> {
    serde_json::to_value(value).map_err(GeosyncError::OutputError)
}
