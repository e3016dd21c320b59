//! Encoding and decoding helpers between Rust domain types and the
//! plain-text representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microsecond
//! precision, `+00:00` offset) so lexicographic SQL comparisons agree
//! with chronological order. Geometry rings and alert boundaries are
//! stored as compact JSON coordinate arrays.

use chrono::{DateTime, SecondsFormat, Utc};
use squall_core::{
  alert::{Alert, AlertRecord, MessageType},
  geometry::{Polygon, Ring},
  region::Region,
  zone::{Zone, ZoneRecord},
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, false)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_opt_dt(dt: Option<DateTime<Utc>>) -> Option<String> {
  dt.map(encode_dt)
}

pub fn decode_opt_dt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
  s.as_deref().map(decode_dt).transpose()
}

// ─── MessageType ─────────────────────────────────────────────────────────────

pub fn encode_message_type(m: MessageType) -> &'static str {
  match m {
    MessageType::Alert => "Alert",
    MessageType::Update => "Update",
    MessageType::Cancel => "Cancel",
  }
}

pub fn decode_message_type(s: &str) -> Result<MessageType> {
  match s {
    "Alert" => Ok(MessageType::Alert),
    "Update" => Ok(MessageType::Update),
    "Cancel" => Ok(MessageType::Cancel),
    other => Err(Error::UnknownMessageType(other.to_owned())),
  }
}

// ─── Geometry ────────────────────────────────────────────────────────────────

pub fn encode_ring(ring: &Ring) -> Result<String> {
  Ok(serde_json::to_string(ring)?)
}

pub fn decode_ring(s: &str) -> Result<Ring> { Ok(serde_json::from_str(s)?) }

pub fn encode_boundary(boundary: &Option<Polygon>) -> Result<Option<String>> {
  boundary
    .as_ref()
    .map(|p| Ok(serde_json::to_string(p)?))
    .transpose()
}

pub fn decode_boundary(s: Option<String>) -> Result<Option<Polygon>> {
  s.as_deref().map(|s| Ok(serde_json::from_str(s)?)).transpose()
}

/// A zone boundary flattened for the geometry child tables: one
/// `(perimeter, holes)` pair of JSON ring strings per polygon.
pub fn encode_geometry(zone: &Zone) -> Result<Vec<(String, Vec<String>)>> {
  zone
    .geometry
    .iter()
    .map(|polygon| {
      let perimeter = encode_ring(&polygon.perimeter)?;
      let holes = polygon
        .holes
        .iter()
        .map(encode_ring)
        .collect::<Result<Vec<_>>>()?;
      Ok((perimeter, holes))
    })
    .collect()
}

// ─── Raw row types ───────────────────────────────────────────────────────────

/// A `regions` row as it comes off the wire, decoded outside the
/// connection closure.
pub struct RawRegion {
  pub code:        String,
  pub total_zones: i64,
  pub created_at:  String,
  pub updated_at:  String,
}

impl RawRegion {
  pub fn into_region(self) -> Result<Region> {
    Ok(Region {
      code:        self.code,
      total_zones: self.total_zones,
      created_at:  decode_dt(&self.created_at)?,
      updated_at:  decode_dt(&self.updated_at)?,
    })
  }
}

/// A `zones` row. Geometry is not carried; reconciliation never needs
/// the stored boundary (updates replace it wholesale).
pub struct RawZone {
  pub zone_id:    i64,
  pub uri:        String,
  pub code:       String,
  pub kind:       String,
  pub name:       String,
  pub effective:  String,
  pub region:     String,
  pub created_at: String,
  pub updated_at: String,
}

impl RawZone {
  pub fn into_record(self) -> Result<ZoneRecord> {
    Ok(ZoneRecord {
      id:         self.zone_id,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
      zone:       Zone {
        uri:       self.uri,
        code:      self.code,
        kind:      self.kind,
        name:      self.name,
        effective: decode_dt(&self.effective)?,
        region:    self.region,
        geometry:  vec![],
      },
    })
  }
}

/// An `alerts` row.
pub struct RawAlert {
  pub alert_id:     String,
  pub area_desc:    String,
  pub onset:        Option<String>,
  pub expires:      String,
  pub ends:         Option<String>,
  pub message_type: String,
  pub category:     String,
  pub severity:     String,
  pub certainty:    String,
  pub urgency:      String,
  pub event:        String,
  pub headline:     String,
  pub description:  String,
  pub instruction:  String,
  pub response:     String,
  pub boundary:     Option<String>,
  pub created_at:   String,
}

impl RawAlert {
  /// Read the 17 alert columns of a row, in schema order, starting at
  /// column 0.
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(RawAlert {
      alert_id:     row.get(0)?,
      area_desc:    row.get(1)?,
      onset:        row.get(2)?,
      expires:      row.get(3)?,
      ends:         row.get(4)?,
      message_type: row.get(5)?,
      category:     row.get(6)?,
      severity:     row.get(7)?,
      certainty:    row.get(8)?,
      urgency:      row.get(9)?,
      event:        row.get(10)?,
      headline:     row.get(11)?,
      description:  row.get(12)?,
      instruction:  row.get(13)?,
      response:     row.get(14)?,
      boundary:     row.get(15)?,
      created_at:   row.get(16)?,
    })
  }

  pub fn into_record(self) -> Result<AlertRecord> {
    Ok(AlertRecord {
      created_at: decode_dt(&self.created_at)?,
      alert:      Alert {
        id:           self.alert_id,
        area_desc:    self.area_desc,
        onset:        decode_opt_dt(self.onset)?,
        expires:      decode_dt(&self.expires)?,
        ends:         decode_opt_dt(self.ends)?,
        message_type: decode_message_type(&self.message_type)?,
        category:     self.category,
        severity:     self.severity,
        certainty:    self.certainty,
        urgency:      self.urgency,
        event:        self.event,
        headline:     self.headline,
        description:  self.description,
        instruction:  self.instruction,
        response:     self.response,
        boundary:     decode_boundary(self.boundary)?,
      },
    })
  }
}
