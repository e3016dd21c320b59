//! Alert types — time-bounded hazard notifications tied to zones or to an
//! explicit polygon.
//!
//! Alerts are never updated in place. The remote service supersedes an
//! alert by issuing a new one whose references list the outdated IDs;
//! ingestion deletes those rows in the same transaction that inserts the
//! replacement.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geometry::Polygon;

/// The remote message type of an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
  Alert,
  Update,
  Cancel,
}

/// A hazard alert for a geographic area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
  /// Remote-issued identifier; the primary key, never store-generated.
  pub id:           String,
  /// Semicolon-separated human-readable area description.
  pub area_desc:    String,
  /// Start of the hazard, when known.
  pub onset:        Option<DateTime<Utc>>,
  /// When the alert message itself expires.
  pub expires:      DateTime<Utc>,
  /// When the hazard ends. When absent, `expires` determines staleness.
  pub ends:         Option<DateTime<Utc>>,
  pub message_type: MessageType,
  /// Event category, e.g. `Met`, `Geo`, `Safety`.
  pub category:     String,
  /// `Extreme`, `Severe`, `Moderate`, `Minor` or `Unknown`.
  pub severity:     String,
  /// `Observed`, `Likely`, `Possible`, `Unlikely` or `Unknown`.
  pub certainty:    String,
  /// `Immediate`, `Expected`, `Future`, `Past` or `Unknown`.
  pub urgency:      String,
  pub event:        String,
  pub headline:     String,
  pub description:  String,
  pub instruction:  String,
  /// Recommended response, e.g. `Shelter`, `Evacuate`, `Monitor`.
  pub response:     String,
  /// Explicit footprint; most alerts have none and resolve their bounds
  /// through affected zones instead.
  pub boundary:     Option<Polygon>,
}

/// An alert as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
  pub alert:      Alert,
  pub created_at: DateTime<Utc>,
}

/// An alert together with its relationships, as retrieved from the
/// remote service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertBundle {
  pub alert:          Alert,
  /// IDs of alerts this one supersedes. Populated for `Update` and
  /// `Cancel` messages, empty for `Alert`.
  pub references:     Vec<String>,
  /// URIs of the zones this alert targets.
  pub affected_zones: Vec<String>,
}
