//! GeoJSON envelope types for the NWS API.
//!
//! Every NWS resource arrives as a GeoJSON `Feature` (or a collection of
//! them) whose `properties` member carries the resource itself. The
//! envelope is deserialised generically over the property type and then
//! converted into the domain types.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use squall_core::{
  alert::{Alert, AlertBundle, MessageType},
  geometry::{MultiPolygon, Polygon},
  remote::RemoteError,
  zone::Zone,
};

#[derive(Debug, Deserialize)]
pub(crate) struct FeatureCollection<P> {
  #[serde(default = "Vec::new")]
  pub features: Vec<Feature<P>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Feature<P> {
  pub id:         String,
  #[serde(default)]
  pub geometry:   Option<Geo>,
  pub properties: P,
}

// ─── Geometry ────────────────────────────────────────────────────────────────

/// Raw GeoJSON geometry member. Coordinates are kept opaque until the
/// `type` tag says how to read them.
#[derive(Debug, Deserialize)]
pub(crate) struct Geo {
  #[serde(rename = "type", default)]
  pub kind:        String,
  #[serde(default)]
  pub coordinates: serde_json::Value,
}

impl Geo {
  /// Zone boundaries: a bare `Polygon` is promoted to a single-member
  /// multi-polygon. A missing or empty geometry is a valid boundary-less
  /// zone (catalog stubs, some marine zones).
  fn into_multi_polygon(self) -> Result<MultiPolygon, RemoteError> {
    match self.kind.as_str() {
      "" => Ok(vec![]),
      "Polygon" => serde_json::from_value::<Polygon>(self.coordinates)
        .map(|p| vec![p])
        .map_err(|e| RemoteError::Decode(e.to_string())),
      "MultiPolygon" => serde_json::from_value(self.coordinates)
        .map_err(|e| RemoteError::Decode(e.to_string())),
      other => Err(RemoteError::Decode(format!(
        "unsupported geometry type {other:?}",
      ))),
    }
  }

  /// Alert footprints: the service only ever attaches a single polygon.
  fn into_boundary(self) -> Result<Option<Polygon>, RemoteError> {
    match self.kind.as_str() {
      "" => Ok(None),
      "Polygon" => serde_json::from_value(self.coordinates)
        .map(Some)
        .map_err(|e| RemoteError::Decode(e.to_string())),
      other => Err(RemoteError::Decode(format!(
        "unsupported alert geometry type {other:?}",
      ))),
    }
  }
}

// ─── Zones ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct ZoneProps {
  #[serde(rename = "id")]
  pub code:      String,
  #[serde(rename = "type")]
  pub kind:      String,
  pub name:      String,
  #[serde(rename = "effectiveDate")]
  pub effective: DateTime<Utc>,
  /// Absent for some marine zones.
  #[serde(default)]
  pub state:     Option<String>,
}

impl Feature<ZoneProps> {
  pub fn into_zone(self, fallback_region: &str) -> Result<Zone, RemoteError> {
    let geometry = match self.geometry {
      Some(geo) => geo.into_multi_polygon()?,
      None => vec![],
    };
    let p = self.properties;
    Ok(Zone {
      uri: self.id,
      code: p.code,
      kind: p.kind,
      name: p.name,
      effective: p.effective,
      region: p.state.unwrap_or_else(|| fallback_region.to_owned()),
      geometry,
    })
  }
}

// ─── Alerts ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AlertProps {
  pub id:             String,
  pub area_desc:      String,
  #[serde(default)]
  pub affected_zones: Vec<String>,
  #[serde(default)]
  pub references:     Vec<AlertReference>,
  #[serde(default)]
  pub onset:          Option<DateTime<Utc>>,
  pub expires:        DateTime<Utc>,
  #[serde(default)]
  pub ends:           Option<DateTime<Utc>>,
  pub message_type:   MessageType,
  pub category:       String,
  pub severity:       String,
  pub certainty:      String,
  pub urgency:        String,
  pub event:          String,
  #[serde(default)]
  pub headline:       Option<String>,
  #[serde(default)]
  pub description:    String,
  #[serde(default)]
  pub instruction:    Option<String>,
  pub response:       String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AlertReference {
  pub identifier: String,
}

impl Feature<AlertProps> {
  pub fn into_bundle(self) -> Result<AlertBundle, RemoteError> {
    let boundary = match self.geometry {
      Some(geo) => geo.into_boundary()?,
      None => None,
    };
    let p = self.properties;
    Ok(AlertBundle {
      alert:          Alert {
        id: p.id,
        area_desc: p.area_desc,
        onset: p.onset,
        expires: p.expires,
        ends: p.ends,
        message_type: p.message_type,
        category: p.category,
        severity: p.severity,
        certainty: p.certainty,
        urgency: p.urgency,
        event: p.event,
        headline: p.headline.unwrap_or_default(),
        description: p.description,
        instruction: p.instruction.unwrap_or_default(),
        response: p.response,
        boundary,
      },
      references:     p.references.into_iter().map(|r| r.identifier).collect(),
      affected_zones: p.affected_zones,
    })
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
