//! Zone — a named geographic area used for forecast and alert targeting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geometry::MultiPolygon;

/// A zone as retrieved from the remote service.
///
/// Catalog listings produce stubs whose `geometry` is empty; the detail
/// endpoint hydrates the boundary. `uri`, `code` and `kind` identify a
/// zone and never change across hydration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
  /// Globally unique zone URI, e.g. `https://api.weather.gov/zones/county/ILC031`.
  pub uri:       String,
  /// Short code, e.g. `ILC031`.
  pub code:      String,
  /// Zone type, e.g. `county`, `forecast`, `fire`.
  pub kind:      String,
  pub name:      String,
  /// Timestamp after which this definition supersedes an older one with
  /// the same URI.
  pub effective: DateTime<Utc>,
  /// Owning region code, e.g. `IL`.
  pub region:    String,
  pub geometry:  MultiPolygon,
}

impl Zone {
  /// Merge a fetched detail onto this stub: identifying fields are taken
  /// from `self`, descriptive and geometric fields from `detail`. The
  /// detail endpoint reports no owning state for some marine zones, so
  /// an empty detail region falls back to the stub's.
  pub fn hydrated(&self, detail: Zone) -> Zone {
    Zone {
      uri:       self.uri.clone(),
      code:      self.code.clone(),
      kind:      self.kind.clone(),
      name:      detail.name,
      effective: detail.effective,
      region:    if detail.region.is_empty() {
        self.region.clone()
      } else {
        detail.region
      },
      geometry:  detail.geometry,
    }
  }
}

/// A zone as persisted, with its store-assigned identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneRecord {
  pub id:         i64,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
  pub zone:       Zone,
}

impl ZoneRecord {
  /// The same identity carrying refreshed zone fields; used when a delta
  /// update replaces a zone's descriptive data and geometry wholesale.
  pub fn refreshed(&self, fresh: Zone) -> ZoneRecord {
    ZoneRecord {
      id:         self.id,
      created_at: self.created_at,
      updated_at: self.updated_at,
      zone:       fresh,
    }
  }
}
