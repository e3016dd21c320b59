//! [`SqliteStore`] — the SQLite implementation of [`ReconStore`].

use std::{collections::HashMap, path::Path};

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;
use squall_core::{
  alert::{AlertBundle, AlertRecord},
  geometry::Point,
  region::Region,
  store::ReconStore,
  zone::{Zone, ZoneRecord},
};

use crate::{
  Error, Result,
  encode::{
    RawAlert, RawRegion, RawZone, encode_boundary, encode_dt,
    encode_geometry, encode_message_type, encode_opt_dt,
  },
  schema::SCHEMA,
};

const ALERT_COLUMNS: &str = "alert_id, area_desc, onset, expires, ends, \
                             message_type, category, severity, certainty, \
                             urgency, event, headline, description, \
                             instruction, response, boundary, created_at";

// ─── Store ───────────────────────────────────────────────────────────────────

/// A reconciliation store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

#[cfg(test)]
impl SqliteStore {
  /// Run a `SELECT COUNT(*)` style query; test introspection only.
  pub(crate) async fn count(&self, sql: &'static str) -> Result<i64> {
    let n = self
      .conn
      .call(move |conn| Ok(conn.query_row(sql, [], |row| row.get(0))?))
      .await?;
    Ok(n)
  }
}

// ─── ReconStore impl ─────────────────────────────────────────────────────────

impl ReconStore for SqliteStore {
  type Error = Error;

  // ── Regions ───────────────────────────────────────────────────────────────

  async fn get_region(&self, code: &str) -> Result<Option<Region>> {
    let code = code.to_owned();

    let raw: Option<RawRegion> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT code, total_zones, created_at, updated_at
               FROM regions WHERE code = ?1",
              rusqlite::params![code],
              |row| {
                Ok(RawRegion {
                  code:        row.get(0)?,
                  total_zones: row.get(1)?,
                  created_at:  row.get(2)?,
                  updated_at:  row.get(3)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawRegion::into_region).transpose()
  }

  async fn insert_region(&self, region: &Region) -> Result<()> {
    let code       = region.code.clone();
    let total      = region.total_zones;
    let created_at = encode_dt(region.created_at);
    let updated_at = encode_dt(region.updated_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO regions (code, total_zones, created_at, updated_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![code, total, created_at, updated_at],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn update_region(&self, region: &Region) -> Result<()> {
    let code       = region.code.clone();
    let total      = region.total_zones;
    let updated_at = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE regions SET total_zones = ?2, updated_at = ?3
           WHERE code = ?1",
          rusqlite::params![code, total, updated_at],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn list_regions(&self) -> Result<Vec<String>> {
    let codes = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare("SELECT code FROM regions ORDER BY code")?;
        let codes = stmt
          .query_map([], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(codes)
      })
      .await?;
    Ok(codes)
  }

  // ── Zones ─────────────────────────────────────────────────────────────────

  async fn zones_for_region(
    &self,
    region: &str,
  ) -> Result<HashMap<String, ZoneRecord>> {
    let region = region.to_owned();

    let raws: Vec<RawZone> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT zone_id, uri, code, kind, name, effective, region,
                  created_at, updated_at
           FROM zones WHERE region = ?1",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![region], |row| {
            Ok(RawZone {
              zone_id:    row.get(0)?,
              uri:        row.get(1)?,
              code:       row.get(2)?,
              kind:       row.get(3)?,
              name:       row.get(4)?,
              effective:  row.get(5)?,
              region:     row.get(6)?,
              created_at: row.get(7)?,
              updated_at: row.get(8)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(|raw| {
        let record = raw.into_record()?;
        Ok((record.zone.uri.clone(), record))
      })
      .collect()
  }

  async fn insert_zone(&self, zone: &Zone) -> Result<ZoneRecord> {
    let now      = Utc::now();
    let now_str  = encode_dt(now);
    let geometry = encode_geometry(zone)?;
    let z        = zone.clone();

    let zone_id = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        tx.execute(
          "INSERT INTO zones (uri, code, kind, name, effective, region,
                              created_at, updated_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          rusqlite::params![
            z.uri,
            z.code,
            z.kind,
            z.name,
            encode_dt(z.effective),
            z.region,
            now_str,
            now_str,
          ],
        )?;
        let zone_id = tx.last_insert_rowid();

        for (perimeter, holes) in &geometry {
          tx.execute(
            "INSERT INTO zone_perimeters (zone_id, ring) VALUES (?1, ?2)",
            rusqlite::params![zone_id, perimeter],
          )?;
          let perimeter_id = tx.last_insert_rowid();
          for hole in holes {
            tx.execute(
              "INSERT INTO zone_holes (perimeter_id, ring) VALUES (?1, ?2)",
              rusqlite::params![perimeter_id, hole],
            )?;
          }
        }

        // The zone now exists, so any alert waiting on its URI is no
        // longer lonely. Promote each pair exactly once, in this same
        // transaction.
        let waiting: Vec<String> = {
          let mut stmt = tx
            .prepare("SELECT alert_id FROM lonely_alerts WHERE zone_uri = ?1")?;
          stmt
            .query_map(rusqlite::params![z.uri], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };
        for alert_id in waiting {
          tx.execute(
            "INSERT INTO alert_zones (alert_id, zone_id) VALUES (?1, ?2)",
            rusqlite::params![alert_id, zone_id],
          )?;
          tx.execute(
            "DELETE FROM lonely_alerts WHERE alert_id = ?1 AND zone_uri = ?2",
            rusqlite::params![alert_id, z.uri],
          )?;
        }

        tx.commit()?;
        Ok(zone_id)
      })
      .await?;

    Ok(ZoneRecord {
      id:         zone_id,
      created_at: now,
      updated_at: now,
      zone:       zone.clone(),
    })
  }

  async fn update_zone(&self, record: &ZoneRecord) -> Result<()> {
    let updated_at = encode_dt(Utc::now());
    let geometry   = encode_geometry(&record.zone)?;
    let zone_id    = record.id;
    let z          = record.zone.clone();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        tx.execute(
          "UPDATE zones
           SET code = ?2, kind = ?3, name = ?4, effective = ?5, region = ?6,
               updated_at = ?7
           WHERE zone_id = ?1",
          rusqlite::params![
            zone_id,
            z.code,
            z.kind,
            z.name,
            encode_dt(z.effective),
            z.region,
            updated_at,
          ],
        )?;

        // Geometry is replaced wholesale, never merged. Hole rows
        // cascade with their perimeters.
        tx.execute(
          "DELETE FROM zone_perimeters WHERE zone_id = ?1",
          rusqlite::params![zone_id],
        )?;
        for (perimeter, holes) in &geometry {
          tx.execute(
            "INSERT INTO zone_perimeters (zone_id, ring) VALUES (?1, ?2)",
            rusqlite::params![zone_id, perimeter],
          )?;
          let perimeter_id = tx.last_insert_rowid();
          for hole in holes {
            tx.execute(
              "INSERT INTO zone_holes (perimeter_id, ring) VALUES (?1, ?2)",
              rusqlite::params![perimeter_id, hole],
            )?;
          }
        }

        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn delete_zone(&self, id: i64) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "DELETE FROM zones WHERE zone_id = ?1",
          rusqlite::params![id],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Alerts ────────────────────────────────────────────────────────────────

  async fn alert_exists(&self, id: &str) -> Result<bool> {
    let id = id.to_owned();

    let exists = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT 1 FROM alerts WHERE alert_id = ?1",
              rusqlite::params![id],
              |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false),
        )
      })
      .await?;
    Ok(exists)
  }

  async fn insert_alert(&self, bundle: &AlertBundle) -> Result<AlertRecord> {
    let now        = Utc::now();
    let now_str    = encode_dt(now);
    let alert      = bundle.alert.clone();
    let references = bundle.references.clone();
    let affected   = bundle.affected_zones.clone();
    let boundary   = encode_boundary(&alert.boundary)?;
    let a          = alert.clone();

    let inserted = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let exists: bool = tx
          .query_row(
            "SELECT 1 FROM alerts WHERE alert_id = ?1",
            rusqlite::params![a.id],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if exists {
          return Ok(false);
        }

        tx.execute(
          "INSERT INTO alerts (alert_id, area_desc, onset, expires, ends,
                               message_type, category, severity, certainty,
                               urgency, event, headline, description,
                               instruction, response, boundary, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                   ?14, ?15, ?16, ?17)",
          rusqlite::params![
            a.id,
            a.area_desc,
            encode_opt_dt(a.onset),
            encode_dt(a.expires),
            encode_opt_dt(a.ends),
            encode_message_type(a.message_type),
            a.category,
            a.severity,
            a.certainty,
            a.urgency,
            a.event,
            a.headline,
            a.description,
            a.instruction,
            a.response,
            boundary,
            now_str,
          ],
        )?;

        // Every referenced alert is superseded by this one; its
        // associations cascade away with the row.
        for reference in &references {
          tx.execute(
            "DELETE FROM alerts WHERE alert_id = ?1",
            rusqlite::params![reference],
          )?;
        }

        for uri in &affected {
          let zone_id: Option<i64> = tx
            .query_row(
              "SELECT zone_id FROM zones WHERE uri = ?1",
              rusqlite::params![uri],
              |row| row.get(0),
            )
            .optional()?;

          match zone_id {
            Some(zone_id) => {
              tx.execute(
                "INSERT INTO alert_zones (alert_id, zone_id) VALUES (?1, ?2)",
                rusqlite::params![a.id, zone_id],
              )?;
            }
            None => {
              tx.execute(
                "INSERT INTO lonely_alerts (alert_id, zone_uri)
                 VALUES (?1, ?2)",
                rusqlite::params![a.id, uri],
              )?;
            }
          }
        }

        tx.commit()?;
        Ok(true)
      })
      .await?;

    if !inserted {
      return Err(Error::AlertExists(alert.id));
    }

    Ok(AlertRecord { alert, created_at: now })
  }

  async fn delete_ended_alerts(&self, cutoff: DateTime<Utc>) -> Result<u64> {
    let cutoff = encode_dt(cutoff);

    let n = self
      .conn
      .call(move |conn| {
        let n = conn.execute(
          "DELETE FROM alerts WHERE ends IS NOT NULL AND ends < ?1",
          rusqlite::params![cutoff],
        )?;
        Ok(n as u64)
      })
      .await?;
    Ok(n)
  }

  async fn delete_expired_alerts(&self, cutoff: DateTime<Utc>) -> Result<u64> {
    let cutoff = encode_dt(cutoff);

    let n = self
      .conn
      .call(move |conn| {
        let n = conn.execute(
          "DELETE FROM alerts WHERE ends IS NULL AND expires < ?1",
          rusqlite::params![cutoff],
        )?;
        Ok(n as u64)
      })
      .await?;
    Ok(n)
  }

  async fn alerts_at(&self, point: Point) -> Result<Vec<AlertRecord>> {
    // SQLite has no polygon containment operator, so candidate rows are
    // loaded and filtered with the core ray cast. Cancel messages carry
    // no actionable hazard and are excluded, as are superseded rows
    // (already deleted at ingestion).
    let explicit: Vec<RawAlert> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {ALERT_COLUMNS} FROM alerts
           WHERE boundary IS NOT NULL AND message_type != 'Cancel'",
        ))?;
        let rows = stmt
          .query_map([], |row| RawAlert::from_row(row))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    let linked: Vec<(RawAlert, String)> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {}, p.ring
           FROM alerts AS a
           JOIN alert_zones AS az ON az.alert_id = a.alert_id
           JOIN zone_perimeters AS p ON p.zone_id = az.zone_id
           WHERE a.message_type != 'Cancel'",
          ALERT_COLUMNS
            .split(", ")
            .map(|c| format!("a.{c}"))
            .collect::<Vec<_>>()
            .join(", "),
        ))?;
        let rows = stmt
          .query_map([], |row| {
            Ok((RawAlert::from_row(row)?, row.get::<_, String>(17)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    // Preserve first-seen order while deduplicating alerts matched
    // through several zones or both paths.
    let mut seen = std::collections::HashSet::new();
    let mut matches = Vec::new();

    for raw in explicit {
      let record = raw.into_record()?;
      let contained = record
        .alert
        .boundary
        .as_ref()
        .is_some_and(|b| b.contains(point));
      if contained && seen.insert(record.alert.id.clone()) {
        matches.push(record);
      }
    }

    for (raw, ring) in linked {
      // Zone-linked matching tests the perimeter only; holes in a zone
      // boundary do not exempt a point from the zone's alerts.
      if !crate::encode::decode_ring(&ring)?.contains(point) {
        continue;
      }
      let record = raw.into_record()?;
      if seen.insert(record.alert.id.clone()) {
        matches.push(record);
      }
    }

    Ok(matches)
  }
}
