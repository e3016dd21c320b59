//! Planar geometry used for zone boundaries and alert footprints.
//!
//! Coordinates follow the GeoJSON convention: a point serialises as
//! `[lon, lat]`, a polygon as an array of rings where the first ring is
//! the outer perimeter and the rest are holes. Containment is evaluated
//! in Rust with an even-odd ray cast; the store keeps rings as JSON so
//! no spatial database extension is required.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ─── Point ───────────────────────────────────────────────────────────────────

/// A longitude/latitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Point {
  pub lon: f64,
  pub lat: f64,
}

impl Point {
  pub fn new(lon: f64, lat: f64) -> Self { Self { lon, lat } }
}

impl From<[f64; 2]> for Point {
  fn from([lon, lat]: [f64; 2]) -> Self { Self { lon, lat } }
}

impl From<Point> for [f64; 2] {
  fn from(p: Point) -> Self { [p.lon, p.lat] }
}

// ─── Ring ────────────────────────────────────────────────────────────────────

/// A closed sequence of points. The closing edge from the last point back
/// to the first is implicit; an explicitly repeated first point is
/// harmless.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ring(pub Vec<Point>);

impl Ring {
  /// Even-odd ray cast. Points exactly on an edge may land on either
  /// side; zone boundaries are far coarser than that ambiguity.
  pub fn contains(&self, point: Point) -> bool {
    let pts = &self.0;
    if pts.len() < 3 {
      return false;
    }

    let mut inside = false;
    let mut j = pts.len() - 1;
    for i in 0..pts.len() {
      let (a, b) = (pts[i], pts[j]);
      if (a.lat > point.lat) != (b.lat > point.lat)
        && point.lon
          < (b.lon - a.lon) * (point.lat - a.lat) / (b.lat - a.lat) + a.lon
      {
        inside = !inside;
      }
      j = i;
    }
    inside
  }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

// ─── Polygon ─────────────────────────────────────────────────────────────────

/// An outer perimeter with zero or more holes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Ring>", into = "Vec<Ring>")]
pub struct Polygon {
  pub perimeter: Ring,
  pub holes:     Vec<Ring>,
}

impl Polygon {
  pub fn new(perimeter: Ring, holes: Vec<Ring>) -> Self {
    Self { perimeter, holes }
  }

  /// True when the point is inside the perimeter and outside every hole.
  pub fn contains(&self, point: Point) -> bool {
    self.perimeter.contains(point)
      && !self.holes.iter().any(|h| h.contains(point))
  }
}

impl TryFrom<Vec<Ring>> for Polygon {
  type Error = Error;

  fn try_from(mut rings: Vec<Ring>) -> Result<Self> {
    if rings.is_empty() {
      return Err(Error::EmptyPolygon);
    }
    let perimeter = rings.remove(0);
    if perimeter.0.len() < 3 {
      return Err(Error::DegenerateRing(perimeter.0.len()));
    }
    Ok(Self { perimeter, holes: rings })
  }
}

impl From<Polygon> for Vec<Ring> {
  fn from(p: Polygon) -> Self {
    let mut rings = vec![p.perimeter];
    rings.extend(p.holes);
    rings
  }
}

// ─── MultiPolygon ────────────────────────────────────────────────────────────

/// An ordered list of polygons; a zone boundary may be disjoint (e.g.
/// a coastal county and its islands).
pub type MultiPolygon = Vec<Polygon>;

/// True when any member polygon contains the point.
pub fn multi_contains(mp: &MultiPolygon, point: Point) -> bool {
  mp.iter().any(|p| p.contains(point))
}

// ─── Tests ───────────────────────────────────────────────────────────────────
