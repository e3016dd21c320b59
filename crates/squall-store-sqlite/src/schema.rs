//! SQL schema for the Squall SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated
//! on `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- One row per onboarded region; the periodic alert sync targets every
-- row in this table.
CREATE TABLE IF NOT EXISTS regions (
    code        TEXT PRIMARY KEY,
    total_zones INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS zones (
    zone_id    INTEGER PRIMARY KEY,
    uri        TEXT NOT NULL UNIQUE,
    code       TEXT NOT NULL,
    kind       TEXT NOT NULL,    -- 'county' | 'forecast' | 'fire' | ...
    name       TEXT NOT NULL,
    effective  TEXT NOT NULL,    -- ISO 8601 UTC
    region     TEXT NOT NULL REFERENCES regions(code),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- One row per polygon of a zone's (possibly disjoint) boundary.
CREATE TABLE IF NOT EXISTS zone_perimeters (
    perimeter_id INTEGER PRIMARY KEY,
    zone_id      INTEGER NOT NULL REFERENCES zones(zone_id) ON DELETE CASCADE,
    ring         TEXT NOT NULL   -- JSON [[lon, lat], ...]
);

CREATE TABLE IF NOT EXISTS zone_holes (
    hole_id      INTEGER PRIMARY KEY,
    perimeter_id INTEGER NOT NULL REFERENCES zone_perimeters(perimeter_id) ON DELETE CASCADE,
    ring         TEXT NOT NULL
);

-- Alerts keep their remote-issued identifier as the primary key and are
-- never updated in place; supersession deletes the referenced rows.
CREATE TABLE IF NOT EXISTS alerts (
    alert_id     TEXT PRIMARY KEY,
    area_desc    TEXT NOT NULL,
    onset        TEXT,
    expires      TEXT NOT NULL,
    ends         TEXT,
    message_type TEXT NOT NULL,  -- 'Alert' | 'Update' | 'Cancel'
    category     TEXT NOT NULL,
    severity     TEXT NOT NULL,
    certainty    TEXT NOT NULL,
    urgency      TEXT NOT NULL,
    event        TEXT NOT NULL,
    headline     TEXT NOT NULL,
    description  TEXT NOT NULL,
    instruction  TEXT NOT NULL,
    response     TEXT NOT NULL,
    boundary     TEXT,           -- JSON rings or NULL
    created_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS alert_zones (
    alert_id TEXT    NOT NULL REFERENCES alerts(alert_id) ON DELETE CASCADE,
    zone_id  INTEGER NOT NULL REFERENCES zones(zone_id) ON DELETE CASCADE,
    PRIMARY KEY (alert_id, zone_id)
);

-- An alert-to-zone association recorded before the zone is onboarded.
-- A (alert, zone URI) pair lives in exactly one of alert_zones or
-- lonely_alerts; inserting the zone promotes the pair exactly once.
CREATE TABLE IF NOT EXISTS lonely_alerts (
    alert_id TEXT NOT NULL REFERENCES alerts(alert_id) ON DELETE CASCADE,
    zone_uri TEXT NOT NULL,
    PRIMARY KEY (alert_id, zone_uri)
);

CREATE INDEX IF NOT EXISTS zones_region_idx      ON zones(region);
CREATE INDEX IF NOT EXISTS perimeters_zone_idx   ON zone_perimeters(zone_id);
CREATE INDEX IF NOT EXISTS lonely_zone_uri_idx   ON lonely_alerts(zone_uri);
CREATE INDEX IF NOT EXISTS alerts_ends_idx       ON alerts(ends);
CREATE INDEX IF NOT EXISTS alerts_expires_idx    ON alerts(expires);

PRAGMA user_version = 1;
";
