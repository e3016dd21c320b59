//! Catalog diffing: compute the insert/update/delete plan that reconciles
//! a fresh remote zone catalog against the persisted one.
//!
//! Pure computation, no I/O. The caller fetches geometry for the
//! insert/update stubs and applies the plan through the store.

use std::collections::HashMap;

use crate::zone::{Zone, ZoneRecord};

/// The reconciliation plan for one region's catalog. The three sets are
/// pairwise disjoint by URI.
#[derive(Debug, Clone, Default)]
pub struct ZoneDelta {
  /// Zones present remotely but not stored.
  pub insert: Vec<Zone>,
  /// Stored zones whose remote effective date is strictly newer; each
  /// carries the stored identity with the fresh fields copied in.
  pub update: Vec<ZoneRecord>,
  /// Stored zones absent from the fresh catalog.
  pub delete: Vec<ZoneRecord>,
}

impl ZoneDelta {
  pub fn total_operations(&self) -> usize {
    self.insert.len() + self.update.len() + self.delete.len()
  }

  pub fn total_insert_updates(&self) -> usize {
    self.insert.len() + self.update.len()
  }

  /// The stubs that need a geometry fetch before the plan can be
  /// applied. Deletes need only the stored identity.
  pub fn insert_update_stubs(&self) -> Vec<Zone> {
    let mut stubs = self.insert.clone();
    stubs.extend(self.update.iter().map(|r| r.zone.clone()));
    stubs
  }
}

/// Diff a fresh catalog (authoritative, unique by URI) against the
/// stored state. `stored` is consumed as a working copy: entries matched
/// by a fresh zone are removed, and whatever remains becomes the delete
/// set.
pub fn diff(
  fresh: Vec<Zone>,
  mut stored: HashMap<String, ZoneRecord>,
) -> ZoneDelta {
  let mut delta = ZoneDelta::default();

  for f in fresh {
    match stored.remove(&f.uri) {
      Some(record) => {
        // Strictly newer only; an equal effective date is a no-op.
        if record.zone.effective < f.effective {
          delta.update.push(record.refreshed(f));
        }
      }
      None => delta.insert.push(f),
    }
  }

  delta.delete.extend(stored.into_values());
  delta
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use std::collections::HashSet;

  use chrono::{TimeZone, Utc};

  use super::*;

  fn zone(uri: &str, effective_secs: i64) -> Zone {
    Zone {
      uri:       uri.into(),
      code:      uri.rsplit('/').next().unwrap().into(),
      kind:      "county".into(),
      name:      format!("Zone {uri}"),
      effective: Utc.timestamp_opt(effective_secs, 0).unwrap(),
      region:    "IL".into(),
      geometry:  vec![],
    }
  }

  fn record(uri: &str, effective_secs: i64, id: i64) -> (String, ZoneRecord) {
    let ts = Utc.timestamp_opt(effective_secs, 0).unwrap();
    (
      uri.to_owned(),
      ZoneRecord {
        id,
        created_at: ts,
        updated_at: ts,
        zone: zone(uri, effective_secs),
      },
    )
  }

  #[test]
  fn newer_effective_date_is_update() {
    let fresh = vec![zone("z1", 2)];
    let stored = HashMap::from([record("z1", 1, 7)]);

    let delta = diff(fresh, stored);
    assert!(delta.insert.is_empty());
    assert!(delta.delete.is_empty());
    assert_eq!(delta.update.len(), 1);
    assert_eq!(delta.update[0].id, 7);
    assert_eq!(
      delta.update[0].zone.effective,
      Utc.timestamp_opt(2, 0).unwrap()
    );
  }

  #[test]
  fn equal_effective_date_is_noop() {
    let fresh = vec![zone("z1", 5)];
    let stored = HashMap::from([record("z1", 5, 1)]);
    assert_eq!(diff(fresh, stored).total_operations(), 0);
  }

  #[test]
  fn older_effective_date_is_noop() {
    let fresh = vec![zone("z1", 3)];
    let stored = HashMap::from([record("z1", 5, 1)]);
    assert_eq!(diff(fresh, stored).total_operations(), 0);
  }

  #[test]
  fn unmatched_stored_zones_are_deleted() {
    let stored = HashMap::from([record("z1", 1, 1), record("z2", 1, 2)]);
    let delta = diff(vec![], stored);
    assert!(delta.insert.is_empty());
    assert!(delta.update.is_empty());
    let deleted: HashSet<_> =
      delta.delete.iter().map(|r| r.zone.uri.clone()).collect();
    assert_eq!(deleted, HashSet::from(["z1".to_owned(), "z2".to_owned()]));
  }

  #[test]
  fn unknown_fresh_zones_are_inserted() {
    let delta = diff(vec![zone("z9", 1)], HashMap::new());
    assert_eq!(delta.insert.len(), 1);
    assert_eq!(delta.insert[0].uri, "z9");
    assert!(delta.update.is_empty());
    assert!(delta.delete.is_empty());
  }

  #[test]
  fn sets_partition_the_catalogs() {
    let fresh = vec![zone("a", 9), zone("b", 1), zone("c", 1)];
    let stored =
      HashMap::from([record("b", 1, 1), record("a", 1, 2), record("d", 1, 3)]);

    let delta = diff(fresh, stored);

    let inserts: HashSet<_> =
      delta.insert.iter().map(|z| z.uri.clone()).collect();
    let updates: HashSet<_> =
      delta.update.iter().map(|r| r.zone.uri.clone()).collect();
    let deletes: HashSet<_> =
      delta.delete.iter().map(|r| r.zone.uri.clone()).collect();

    assert_eq!(inserts, HashSet::from(["c".to_owned()]));
    assert_eq!(updates, HashSet::from(["a".to_owned()]));
    assert_eq!(deletes, HashSet::from(["d".to_owned()]));
    assert!(inserts.is_disjoint(&updates));
    assert!(inserts.is_disjoint(&deletes));
    assert!(updates.is_disjoint(&deletes));
    assert!(delta.total_operations() <= 3 + 3);
  }

  #[test]
  fn applying_the_delta_reaches_a_fixpoint() {
    let fresh = vec![zone("a", 9), zone("c", 1)];
    let stored = HashMap::from([record("a", 1, 2), record("d", 1, 3)]);

    let delta = diff(fresh.clone(), stored.clone());

    // Apply the plan to an in-memory copy of the stored state.
    let mut post: HashMap<String, ZoneRecord> = stored;
    for rec in &delta.delete {
      post.remove(&rec.zone.uri);
    }
    for rec in &delta.update {
      post.insert(rec.zone.uri.clone(), rec.clone());
    }
    for (i, z) in delta.insert.iter().enumerate() {
      let ts = z.effective;
      post.insert(z.uri.clone(), ZoneRecord {
        id:         100 + i as i64,
        created_at: ts,
        updated_at: ts,
        zone:       z.clone(),
      });
    }

    // Re-running the diff with the post-state yields an empty plan.
    assert_eq!(diff(fresh, post).total_operations(), 0);
  }

  #[test]
  fn insert_update_stubs_covers_exactly_both_sets() {
    let fresh = vec![zone("a", 9), zone("c", 1)];
    let stored = HashMap::from([record("a", 1, 2), record("d", 1, 3)]);

    let delta = diff(fresh, stored);
    let stubs: HashSet<_> = delta
      .insert_update_stubs()
      .into_iter()
      .map(|z| z.uri)
      .collect();
    assert_eq!(stubs, HashSet::from(["a".to_owned(), "c".to_owned()]));
    assert_eq!(delta.total_insert_updates(), 2);
  }
}
