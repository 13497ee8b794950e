// 🗄️ Record Store - persistence contract + SQLite implementation
//
// The importer only needs two calls: look up a natural key, insert a record.
// SqliteStore adds an audit trail (every insert is an event) and the read
// helpers the CLI uses for pre-fetching keys and ranking wards.

use crate::entities::{compose_key, EntityKind, NormalizedRecord, WardRecord};
use crate::error::{InsertError, StoreError, StoreErrorKind};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

// ============================================================================
// RECORD STORE CONTRACT
// ============================================================================

/// Store-assigned identifier of an inserted record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl RecordId {
    pub fn new_v4() -> Self {
        RecordId(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Persistence seen by the bulk importer
///
/// `insert` must report a natural-key collision as
/// [`InsertError::DuplicateKey`], never as a generic store failure.
pub trait RecordStore {
    fn find_by_natural_key(
        &self,
        kind: EntityKind,
        key: &str,
    ) -> Result<Option<RecordId>, StoreError>;

    fn insert(
        &self,
        kind: EntityKind,
        record: &NormalizedRecord,
        actor: &str,
    ) -> Result<RecordId, InsertError>;
}

/// Deduplication hash of a record: SHA-256 over `kind|natural_key`
///
/// Identity is the record id; this hash only answers "seen before?".
pub fn idempotency_hash(kind: EntityKind, natural_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}|{}", kind.as_str(), compose_key(&[natural_key])));
    format!("{:x}", hasher.finalize())
}

// ============================================================================
// AUDIT EVENTS
// ============================================================================

/// Event for audit trail: every change is an event
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

/// A persisted record with its store metadata
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredRecord {
    pub id: RecordId,
    pub natural_key: String,
    pub record: NormalizedRecord,
    pub created_at: String,
}

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection) -> Result<(), StoreError> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    // ==========================================================================
    // Records Table (one table for every kind, payload as JSON)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            record_uuid TEXT UNIQUE NOT NULL,
            kind TEXT NOT NULL,
            natural_key TEXT NOT NULL,
            idempotency_hash TEXT UNIQUE NOT NULL,
            payload TEXT NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE(kind, natural_key)
        )",
        [],
    )?;

    // ==========================================================================
    // Events Table (audit trail)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_records_kind ON records(kind)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp)",
        [],
    )?;

    Ok(())
}

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> Result<(), StoreError> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

/// Get events for a specific entity, newest first
pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> Result<Vec<Event>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY timestamp DESC, id DESC",
    )?;

    let rows = stmt
        .query_map(params![entity_type, entity_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(
            |(event_id, timestamp, event_type, entity_type, entity_id, data, actor)| -> Result<Event, StoreError> {
                let timestamp = DateTime::parse_from_rfc3339(&timestamp)
                    .map_err(|e| {
                        StoreError::new(
                            StoreErrorKind::Serialization,
                            format!("bad event timestamp '{}': {}", timestamp, e),
                        )
                    })?
                    .with_timezone(&Utc);

                Ok(Event {
                    event_id,
                    timestamp,
                    event_type,
                    entity_type,
                    entity_id,
                    data: serde_json::from_str(&data)?,
                    actor,
                })
            },
        )
        .collect()
}

// ============================================================================
// SQLITE STORE
// ============================================================================

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) a database file and make sure the schema exists
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|e| {
            StoreError::unavailable(format!("cannot open {}: {}", path.display(), e))
        })?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    pub fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        setup_database(&conn)?;
        Ok(SqliteStore { conn })
    }

    /// All natural keys stored for a kind, for pre-fetching `existing_keys`
    pub fn natural_keys(&self, kind: EntityKind) -> Result<HashSet<String>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT natural_key FROM records WHERE kind = ?1")?;

        let keys = stmt
            .query_map([kind.as_str()], |row| row.get::<_, String>(0))?
            .collect::<Result<HashSet<_>, _>>()?;

        Ok(keys)
    }

    /// Stored records of a kind, in insertion order
    pub fn records(&self, kind: EntityKind) -> Result<Vec<StoredRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT record_uuid, natural_key, payload, created_at
             FROM records
             WHERE kind = ?1
             ORDER BY id",
        )?;

        let rows = stmt
            .query_map([kind.as_str()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, natural_key, payload, created_at)| -> Result<StoredRecord, StoreError> {
                Ok(StoredRecord {
                    id: RecordId(id),
                    natural_key,
                    record: serde_json::from_str(&payload)?,
                    created_at,
                })
            })
            .collect()
    }

    /// Stored wards, ready for ranking
    pub fn wards(&self) -> Result<Vec<WardRecord>, StoreError> {
        Ok(self
            .records(EntityKind::Ward)?
            .into_iter()
            .filter_map(|stored| match stored.record {
                NormalizedRecord::Ward(ward) => Some(ward),
                _ => None,
            })
            .collect())
    }

    pub fn count(&self, kind: EntityKind) -> Result<usize, StoreError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM records WHERE kind = ?1",
            [kind.as_str()],
            |row| row.get(0),
        )?;

        Ok(count as usize)
    }

    /// Audit trail of one record, newest first
    pub fn events_for(&self, kind: EntityKind, id: &RecordId) -> Result<Vec<Event>, StoreError> {
        get_events_for_entity(&self.conn, kind.as_str(), id.as_str())
    }
}

impl RecordStore for SqliteStore {
    fn find_by_natural_key(
        &self,
        kind: EntityKind,
        key: &str,
    ) -> Result<Option<RecordId>, StoreError> {
        let id = self
            .conn
            .query_row(
                "SELECT record_uuid FROM records WHERE kind = ?1 AND natural_key = ?2",
                params![kind.as_str(), compose_key(&[key])],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        Ok(id.map(RecordId))
    }

    fn insert(
        &self,
        kind: EntityKind,
        record: &NormalizedRecord,
        actor: &str,
    ) -> Result<RecordId, InsertError> {
        let natural_key = record.natural_key();
        let hash = idempotency_hash(kind, &natural_key);
        let payload = serde_json::to_string(record).map_err(StoreError::from)?;
        let id = RecordId::new_v4();

        let result = self.conn.execute(
            "INSERT INTO records (
                record_uuid, kind, natural_key, idempotency_hash, payload, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                id.as_str(),
                kind.as_str(),
                natural_key,
                hash,
                payload,
                Utc::now().to_rfc3339(),
            ],
        );

        match result {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
            {
                return Err(InsertError::DuplicateKey { key: natural_key });
            }
            Err(e) => return Err(StoreError::from(e).into()),
        }

        // Log event to audit trail
        let event = Event::new(
            "record_added",
            kind.as_str(),
            id.as_str(),
            serde_json::json!({
                "natural_key": natural_key,
                "idempotency_hash": hash,
            }),
            actor,
        );
        if let Err(e) = insert_event(&self.conn, &event) {
            log::warn!("Record {} stored but its audit event was not: {}", id, e);
        }

        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Coordinates, RiskIndexRecord, WeatherRecord};
    use crate::risk::RiskLevel;
    use chrono::NaiveDate;

    fn create_test_ward(name: &str) -> NormalizedRecord {
        NormalizedRecord::Ward(WardRecord {
            ward_name: name.to_string(),
            district: None,
            area_km2: 2.0,
            population: 10000.0,
            population_density: 5000.0,
            coordinates: Coordinates { lat: 10.77, lng: 106.7 },
            rainfall_mm: 100.0,
            low_elevation_ratio: 0.3,
            urban_land_ratio: 0.6,
            drainage_capacity: None,
        })
    }

    fn create_test_weather(ward: &str, day: u32) -> NormalizedRecord {
        NormalizedRecord::WeatherObservation(WeatherRecord {
            ward_name: ward.to_string(),
            observed_on: NaiveDate::from_ymd_opt(2024, 9, day).unwrap(),
            rainfall_mm: 12.0,
            temperature_c: 30.0,
            humidity_pct: 80.0,
            wind_speed_kmh: None,
            water_level_m: None,
        })
    }

    #[test]
    fn test_insert_and_find_by_natural_key() {
        let store = SqliteStore::open_in_memory().unwrap();

        let id = store
            .insert(EntityKind::Ward, &create_test_ward("Ward 1"), "tester")
            .unwrap();

        assert_eq!(
            store.find_by_natural_key(EntityKind::Ward, "ward 1").unwrap(),
            Some(id.clone())
        );
        assert_eq!(
            store.find_by_natural_key(EntityKind::Ward, "  WARD   1 ").unwrap(),
            Some(id)
        );
        assert_eq!(store.find_by_natural_key(EntityKind::Ward, "ward 2").unwrap(), None);
        assert_eq!(
            store.find_by_natural_key(EntityKind::DrainageAsset, "ward 1").unwrap(),
            None
        );
    }

    #[test]
    fn test_idempotency_import_twice() {
        let store = SqliteStore::open_in_memory().unwrap();
        let records = vec![create_test_ward("Ward 1"), create_test_ward("Ward 2")];

        for record in &records {
            store.insert(EntityKind::Ward, record, "tester").unwrap();
        }
        let count1 = store.count(EntityKind::Ward).unwrap();

        let second: Vec<_> = records
            .iter()
            .map(|record| store.insert(EntityKind::Ward, record, "tester"))
            .collect();
        let count2 = store.count(EntityKind::Ward).unwrap();

        println!("First import: {} in DB, second import: {} in DB", count1, count2);

        assert_eq!(count1, 2);
        assert_eq!(count2, 2, "second import must not add rows");
        for result in second {
            assert!(matches!(result, Err(InsertError::DuplicateKey { .. })));
        }
    }

    #[test]
    fn test_duplicate_key_ignores_case_and_spacing() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .insert(EntityKind::Ward, &create_test_ward("Ward A"), "tester")
            .unwrap();

        let err = store
            .insert(EntityKind::Ward, &create_test_ward("ward  a"), "tester")
            .unwrap_err();

        assert_eq!(err, InsertError::DuplicateKey { key: "ward a".to_string() });
    }

    #[test]
    fn test_same_key_in_different_kinds_does_not_collide() {
        let store = SqliteStore::open_in_memory().unwrap();

        store
            .insert(EntityKind::WeatherObservation, &create_test_weather("Ward 1", 1), "tester")
            .unwrap();
        store
            .insert(EntityKind::WeatherObservation, &create_test_weather("Ward 1", 2), "tester")
            .unwrap();

        assert_eq!(store.count(EntityKind::WeatherObservation).unwrap(), 2);
        let keys = store.natural_keys(EntityKind::WeatherObservation).unwrap();
        assert!(keys.contains("ward 1|2024-09-01"));
        assert!(keys.contains("ward 1|2024-09-02"));
    }

    #[test]
    fn test_records_round_trip_payload() {
        let store = SqliteStore::open_in_memory().unwrap();
        let ward = create_test_ward("Ward 9");
        let id = store.insert(EntityKind::Ward, &ward, "tester").unwrap();

        let stored = store.records(EntityKind::Ward).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, id);
        assert_eq!(stored[0].natural_key, "ward 9");
        assert_eq!(stored[0].record, ward);

        let wards = store.wards().unwrap();
        assert_eq!(wards[0].ward_name, "Ward 9");
    }

    #[test]
    fn test_risk_index_score_follows_stored_factors() {
        let store = SqliteStore::open_in_memory().unwrap();
        let record = NormalizedRecord::RiskIndexRecord(RiskIndexRecord {
            ward_name: "Ward 1".to_string(),
            assessed_on: NaiveDate::from_ymd_opt(2024, 10, 1).unwrap(),
            exposure: 2.0,
            susceptibility: 5.0,
            resilience: 2.0,
            declared_category: None,
        });
        store.insert(EntityKind::RiskIndexRecord, &record, "tester").unwrap();

        store
            .conn
            .execute(
                "UPDATE records SET payload = json_set(payload, '$.resilience', 7.0)",
                [],
            )
            .unwrap();

        let stored = store.records(EntityKind::RiskIndexRecord).unwrap();
        match &stored[0].record {
            NormalizedRecord::RiskIndexRecord(r) => {
                assert_eq!(r.resilience, 7.0);
                assert_eq!(r.score().index, 1.0);
                assert_eq!(r.score().level, RiskLevel::Low);
            }
            other => panic!("expected a risk index record, got {:?}", other),
        }
    }

    #[test]
    fn test_compute_idempotency_hash() {
        let hash1 = idempotency_hash(EntityKind::Ward, "ward 1");
        let hash2 = idempotency_hash(EntityKind::Ward, "Ward  1");

        println!("Hash: {}", hash1);

        assert_eq!(hash1, hash2, "same key should produce same hash");
        assert_eq!(hash1.len(), 64, "SHA-256 hash should be 64 hex characters");
        assert_ne!(hash1, idempotency_hash(EntityKind::DrainageAsset, "ward 1"));
    }

    #[test]
    fn test_insert_records_audit_event() {
        let store = SqliteStore::open_in_memory().unwrap();
        let id = store
            .insert(EntityKind::Ward, &create_test_ward("Ward 5"), "admin@example.org")
            .unwrap();

        let events = store.events_for(EntityKind::Ward, &id).unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "record_added");
        assert_eq!(events[0].actor, "admin@example.org");
        assert_eq!(events[0].data["natural_key"], "ward 5");
    }

    #[test]
    fn test_event_log() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        let event = Event::new(
            "test_event",
            "ward",
            "test_id_123",
            serde_json::json!({"test": "data"}),
            "test_actor",
        );

        insert_event(&conn, &event).unwrap();

        let events = get_events_for_entity(&conn, "ward", "test_id_123").unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "test_event");
        assert_eq!(events[0].actor, "test_actor");
    }

    #[test]
    fn test_unopenable_path_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("nested").join("store.db");

        let err = match SqliteStore::open(&path) {
            Err(e) => e,
            Ok(_) => panic!("opening under a missing directory should fail"),
        };
        assert!(err.is_fatal());
    }
}
