//! Typed geometries tagged with their spatial reference system.
//!
//! [`Geometry`] is what gets stored for every feature. It is built from a `GeoJSON`
//! geometry with [`Geometry::from_geojson`] and converted back with [`Geometry::to_geojson`].
//! Only the six simple feature kinds are supported; `GeometryCollection` is rejected.

mod error;
pub use error::{GeometryError, GeometryResult};

mod feature;
pub use feature::{TIMESTAMP_PROPERTY, feature_from_geojson, timestamp_from_value};

use enum_display::EnumDisplay;
use serde::{Deserialize, Serialize};

/// `WGS 84`, the only reference system `GeoJSON` coordinates may use.
pub const WGS84_SRID: i32 = 4326;

/// A single `[x, y]` coordinate. Any ordinate beyond the second is dropped.
pub type Position = [f64; 2];

/// Tag identifying the kind of a stored geometry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, EnumDisplay)]
pub enum GeometryType {
    /// A single position.
    Point,
    /// Several positions.
    MultiPoint,
    /// A path of two or more positions.
    LineString,
    /// Several paths.
    MultiLineString,
    /// An exterior ring followed by optional interior rings.
    Polygon,
    /// Several polygons.
    MultiPolygon,
}

impl GeometryType {
    /// Parse the tag as stored in the catalog.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Point" => Some(Self::Point),
            "MultiPoint" => Some(Self::MultiPoint),
            "LineString" => Some(Self::LineString),
            "MultiLineString" => Some(Self::MultiLineString),
            "Polygon" => Some(Self::Polygon),
            "MultiPolygon" => Some(Self::MultiPolygon),
            _ => None,
        }
    }

    /// Point-like geometries are rendered as markers rather than paths.
    #[must_use]
    pub fn is_puntal(self) -> bool {
        matches!(self, Self::Point | Self::MultiPoint)
    }
}

/// Coordinates of a geometry, shaped by its kind.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Shape {
    /// See [`GeometryType::Point`].
    Point(Position),
    /// See [`GeometryType::MultiPoint`].
    MultiPoint(Vec<Position>),
    /// See [`GeometryType::LineString`].
    LineString(Vec<Position>),
    /// See [`GeometryType::MultiLineString`].
    MultiLineString(Vec<Vec<Position>>),
    /// See [`GeometryType::Polygon`]. Every ring is closed.
    Polygon(Vec<Vec<Position>>),
    /// See [`GeometryType::MultiPolygon`]. Every ring is closed.
    MultiPolygon(Vec<Vec<Vec<Position>>>),
}

impl Shape {
    /// The tag matching this shape.
    #[must_use]
    pub fn geometry_type(&self) -> GeometryType {
        match self {
            Self::Point(_) => GeometryType::Point,
            Self::MultiPoint(_) => GeometryType::MultiPoint,
            Self::LineString(_) => GeometryType::LineString,
            Self::MultiLineString(_) => GeometryType::MultiLineString,
            Self::Polygon(_) => GeometryType::Polygon,
            Self::MultiPolygon(_) => GeometryType::MultiPolygon,
        }
    }
}

/// A shape together with the SRID its coordinates are expressed in.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    /// Spatial reference identifier, [`WGS84_SRID`] for everything read from `GeoJSON`.
    pub srid: i32,
    /// The coordinates.
    pub shape: Shape,
}

impl Geometry {
    /// Wrap a shape expressed in [`WGS84_SRID`] coordinates.
    #[must_use]
    pub fn wgs84(shape: Shape) -> Self {
        Self {
            srid: WGS84_SRID,
            shape,
        }
    }

    /// The tag matching this geometry.
    #[must_use]
    pub fn geometry_type(&self) -> GeometryType {
        self.shape.geometry_type()
    }

    /// Convert a `GeoJSON` geometry into a [`WGS84_SRID`] geometry.
    ///
    /// Unclosed polygon rings are closed by repeating their first position.
    pub fn from_geojson(geometry: &geojson::Geometry) -> GeometryResult<Self> {
        let shape = match &geometry.value {
            geojson::Value::Point(pos) => Shape::Point(position(pos)?),
            geojson::Value::MultiPoint(points) => Shape::MultiPoint(positions(points)?),
            geojson::Value::LineString(line) => Shape::LineString(line_string(line)?),
            geojson::Value::MultiLineString(lines) => Shape::MultiLineString(
                lines
                    .iter()
                    .map(|l| line_string(l))
                    .collect::<GeometryResult<_>>()?,
            ),
            geojson::Value::Polygon(rings) => Shape::Polygon(polygon(rings)?),
            geojson::Value::MultiPolygon(polygons) => Shape::MultiPolygon(
                polygons
                    .iter()
                    .map(|p| polygon(p))
                    .collect::<GeometryResult<_>>()?,
            ),
            geojson::Value::GeometryCollection(_) => {
                return Err(GeometryError::UnsupportedType("GeometryCollection"));
            }
        };
        Ok(Self::wgs84(shape))
    }

    /// Convert back into a `GeoJSON` geometry.
    #[must_use]
    pub fn to_geojson(&self) -> geojson::Geometry {
        let value = match &self.shape {
            Shape::Point(pos) => geojson::Value::Point(pos.to_vec()),
            Shape::MultiPoint(points) => geojson::Value::MultiPoint(path_to_geojson(points)),
            Shape::LineString(line) => geojson::Value::LineString(path_to_geojson(line)),
            Shape::MultiLineString(lines) => {
                geojson::Value::MultiLineString(lines.iter().map(|l| path_to_geojson(l)).collect())
            }
            Shape::Polygon(rings) => {
                geojson::Value::Polygon(rings.iter().map(|r| path_to_geojson(r)).collect())
            }
            Shape::MultiPolygon(polygons) => geojson::Value::MultiPolygon(
                polygons
                    .iter()
                    .map(|p| p.iter().map(|r| path_to_geojson(r)).collect())
                    .collect(),
            ),
        };
        geojson::Geometry::new(value)
    }
}

fn position(pos: &[f64]) -> GeometryResult<Position> {
    match pos {
        [x, y, ..] => Ok([*x, *y]),
        _ => Err(GeometryError::InvalidPosition(pos.len())),
    }
}

fn positions(path: &[Vec<f64>]) -> GeometryResult<Vec<Position>> {
    path.iter().map(|p| position(p)).collect()
}

fn line_string(path: &[Vec<f64>]) -> GeometryResult<Vec<Position>> {
    let line = positions(path)?;
    if line.len() < 2 {
        return Err(GeometryError::TooFewPositions("LineString", 2, line.len()));
    }
    Ok(line)
}

fn ring(path: &[Vec<f64>]) -> GeometryResult<Vec<Position>> {
    let mut ring = positions(path)?;
    if let (Some(first), Some(last)) = (ring.first().copied(), ring.last())
        && first != *last
    {
        ring.push(first);
    }
    if ring.len() < 4 {
        return Err(GeometryError::TooFewPositions("Polygon ring", 4, ring.len()));
    }
    Ok(ring)
}

fn polygon(rings: &[Vec<Vec<f64>>]) -> GeometryResult<Vec<Vec<Position>>> {
    rings.iter().map(|r| ring(r)).collect()
}

fn path_to_geojson(path: &[Position]) -> Vec<Vec<f64>> {
    path.iter().map(|p| p.to_vec()).collect()
}
