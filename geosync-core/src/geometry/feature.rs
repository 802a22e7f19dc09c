use serde_json::Value;
use time::OffsetDateTime;

use crate::catalog::NewFeature;
use crate::geometry::{Geometry, GeometryError, GeometryResult};

/// Property holding the Unix epoch of a feature, in seconds.
pub const TIMESTAMP_PROPERTY: &str = "timestamp";

/// Convert a `GeoJSON` feature into a detached [`NewFeature`].
///
/// Features without geometry yield `Ok(None)`: they are dropped, not rejected.
/// Properties are copied verbatim. A numeric `timestamp` property becomes a UTC instant.
pub fn feature_from_geojson(feature: &geojson::Feature) -> GeometryResult<Option<NewFeature>> {
    let Some(geometry) = &feature.geometry else {
        return Ok(None);
    };
    let geometry = Geometry::from_geojson(geometry)?;
    let properties = feature.properties.clone().unwrap_or_default();
    let timestamp = match properties.get(TIMESTAMP_PROPERTY) {
        None | Some(Value::Null) => None,
        Some(value) => Some(timestamp_from_value(value)?),
    };
    Ok(Some(NewFeature {
        geometry,
        properties,
        timestamp,
    }))
}

/// Interpret a JSON number (or numeric string) as seconds since the Unix epoch.
pub fn timestamp_from_value(value: &Value) -> GeometryResult<OffsetDateTime> {
    let invalid = || GeometryError::InvalidTimestamp(value.clone());
    let nanos = match value {
        Value::Number(n) => {
            if let Some(secs) = n.as_i64() {
                i128::from(secs) * 1_000_000_000
            } else {
                seconds_to_nanos(n.as_f64().ok_or_else(invalid)?).ok_or_else(invalid)?
            }
        }
        Value::String(s) => {
            seconds_to_nanos(s.trim().parse::<f64>().map_err(|_| invalid())?).ok_or_else(invalid)?
        }
        _ => return Err(invalid()),
    };
    OffsetDateTime::from_unix_timestamp_nanos(nanos).map_err(|_| invalid())
}

#[expect(clippy::cast_possible_truncation)]
fn seconds_to_nanos(secs: f64) -> Option<i128> {
    let nanos = (secs * 1e9).round();
    // roughly the range OffsetDateTime accepts; keeps the cast below exact enough
    (nanos.is_finite() && nanos.abs() < 1e30).then_some(nanos as i128)
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use rstest::rstest;
    use serde_json::json;
    use time::macros::datetime;

    use super::*;
    use crate::geometry::GeometryType;

    fn parse(json: &str) -> geojson::Feature {
        json.parse().unwrap()
    }

    #[test]
    fn null_geometry_is_dropped() {
        let feature = parse(r#"{"type":"Feature","geometry":null,"properties":{"a":1}}"#);
        assert_eq!(feature_from_geojson(&feature).unwrap(), None);
    }

    #[test]
    fn properties_are_copied_verbatim() {
        let feature = parse(indoc! {r#"
            {
              "type": "Feature",
              "geometry": {"type": "Point", "coordinates": [24.94, 60.17]},
              "properties": {"name": "Pump 7", "depth": 3.5, "tags": ["a", "b"], "meta": {"x": null}}
            }
        "#});
        let converted = feature_from_geojson(&feature).unwrap().unwrap();
        assert_eq!(converted.geometry_type(), GeometryType::Point);
        assert_eq!(
            Value::Object(converted.properties),
            json!({"name": "Pump 7", "depth": 3.5, "tags": ["a", "b"], "meta": {"x": null}})
        );
        assert_eq!(converted.timestamp, None);
    }

    #[test]
    fn missing_properties_become_empty() {
        let feature = parse(
            r#"{"type":"Feature","geometry":{"type":"Point","coordinates":[1,2]},"properties":null}"#,
        );
        let converted = feature_from_geojson(&feature).unwrap().unwrap();
        assert!(converted.properties.is_empty());
    }

    #[rstest]
    #[case::integer(json!(1_700_000_000), datetime!(2023-11-14 22:13:20 UTC))]
    #[case::fraction(json!(1_700_000_000.5), datetime!(2023-11-14 22:13:20.5 UTC))]
    #[case::string(json!("1700000000"), datetime!(2023-11-14 22:13:20 UTC))]
    #[case::epoch(json!(0), datetime!(1970-01-01 0:00 UTC))]
    fn timestamp_is_unix_epoch(#[case] value: Value, #[case] expected: OffsetDateTime) {
        assert_eq!(timestamp_from_value(&value).unwrap(), expected);
    }

    #[rstest]
    #[case::text(json!("yesterday"))]
    #[case::boolean(json!(true))]
    #[case::huge(json!(1e300))]
    fn bad_timestamp_is_rejected(#[case] value: Value) {
        assert!(matches!(
            timestamp_from_value(&value),
            Err(GeometryError::InvalidTimestamp(_))
        ));
    }

    #[test]
    fn timestamp_property_is_extracted() {
        let feature = parse(
            r#"{"type":"Feature","geometry":{"type":"Point","coordinates":[1,2]},"properties":{"timestamp":86400}}"#,
        );
        let converted = feature_from_geojson(&feature).unwrap().unwrap();
        assert_eq!(converted.timestamp, Some(datetime!(1970-01-02 0:00 UTC)));
        assert_eq!(converted.properties["timestamp"], json!(86400));
    }
}
