use postgis::ewkb;
use postgres::types::ToSql;

use crate::catalog::{CatalogError, CatalogResult};
use crate::geometry::{Geometry, Position, Shape, WGS84_SRID};

/// A geometry ready to be bound as a query parameter.
pub type GeometryParam = Box<dyn ToSql + Send + Sync>;

fn point(pos: &Position, srid: Option<i32>) -> ewkb::Point {
    ewkb::Point {
        x: pos[0],
        y: pos[1],
        srid,
    }
}

fn line(path: &[Position]) -> ewkb::LineString {
    ewkb::LineString {
        points: path.iter().map(|p| point(p, None)).collect(),
        srid: None,
    }
}

fn polygon(rings: &[Vec<Position>]) -> ewkb::Polygon {
    ewkb::Polygon {
        rings: rings.iter().map(|r| line(r)).collect(),
        srid: None,
    }
}

/// Encode a geometry as EWKB carrying its SRID.
pub fn to_ewkb(geometry: &Geometry) -> GeometryParam {
    let srid = Some(geometry.srid);
    match &geometry.shape {
        Shape::Point(pos) => Box::new(point(pos, srid)),
        Shape::MultiPoint(points) => Box::new(ewkb::MultiPoint {
            points: points.iter().map(|p| point(p, None)).collect(),
            srid,
        }),
        Shape::LineString(path) => Box::new(ewkb::LineString { srid, ..line(path) }),
        Shape::MultiLineString(lines) => Box::new(ewkb::MultiLineString {
            lines: lines.iter().map(|l| line(l)).collect(),
            srid,
        }),
        Shape::Polygon(rings) => Box::new(ewkb::Polygon {
            srid,
            ..polygon(rings)
        }),
        Shape::MultiPolygon(polygons) => Box::new(ewkb::MultiPolygon {
            polygons: polygons.iter().map(|p| polygon(p)).collect(),
            srid,
        }),
    }
}

fn path(points: &[ewkb::Point]) -> Vec<Position> {
    points.iter().map(|p| [p.x, p.y]).collect()
}

fn rings(polygon: &ewkb::Polygon) -> Vec<Vec<Position>> {
    polygon.rings.iter().map(|r| path(&r.points)).collect()
}

/// Decode a stored geometry of the feature with the given id.
pub fn from_ewkb(geometry: &ewkb::Geometry, feature_id: i32) -> CatalogResult<Geometry> {
    let (srid, shape) = match geometry {
        ewkb::GeometryT::Point(p) => (p.srid, Shape::Point([p.x, p.y])),
        ewkb::GeometryT::MultiPoint(m) => (m.srid, Shape::MultiPoint(path(&m.points))),
        ewkb::GeometryT::LineString(l) => (l.srid, Shape::LineString(path(&l.points))),
        ewkb::GeometryT::MultiLineString(m) => (
            m.srid,
            Shape::MultiLineString(m.lines.iter().map(|l| path(&l.points)).collect()),
        ),
        ewkb::GeometryT::Polygon(p) => (p.srid, Shape::Polygon(rings(p))),
        ewkb::GeometryT::MultiPolygon(m) => (
            m.srid,
            Shape::MultiPolygon(m.polygons.iter().map(rings).collect()),
        ),
        ewkb::GeometryT::GeometryCollection(_) => {
            return Err(CatalogError::CorruptGeometry(feature_id));
        }
    };
    Ok(Geometry {
        srid: srid.unwrap_or(WGS84_SRID),
        shape,
    })
}
