//! SQLite-backed acquisition store implementation.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::types::{
    AcquisitionRequest, AcquisitionState, AcquisitionStatus, CreateAcquisitionRequest, Event,
    FundingRecord, InventoryStatus, InventoryUnit, NewFundingRecord, NewInventoryUnit,
    RequestFilter,
};
use super::{AcquisitionStore, StoreError};

/// SQLite-backed acquisition store.
pub struct SqliteAcquisitionStore {
    conn: Mutex<Connection>,
}

impl SqliteAcquisitionStore {
    /// Create a new SQLite store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|e| StoreError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite store (useful for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn =
            Connection::open_in_memory().map_err(|e| StoreError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS events (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                venue TEXT,
                starts_at TEXT NOT NULL,
                published INTEGER NOT NULL DEFAULT 0,
                face_value_cents INTEGER NOT NULL,
                target_url TEXT
            );

            CREATE TABLE IF NOT EXISTS funding_records (
                id TEXT PRIMARY KEY,
                event_id TEXT NOT NULL,
                units INTEGER NOT NULL,
                amount_cents INTEGER NOT NULL,
                settlement_ref TEXT,
                settlement_verified INTEGER NOT NULL DEFAULT 0,
                verified_at TEXT,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_funding_event ON funding_records(event_id);

            CREATE TABLE IF NOT EXISTS acquisition_requests (
                id TEXT PRIMARY KEY,
                event_id TEXT NOT NULL,
                units INTEGER NOT NULL,
                expected_cost_cents INTEGER NOT NULL,
                target_url TEXT,
                status TEXT NOT NULL,
                instrument_id TEXT,
                instrument_digest TEXT,
                confirmation_reference TEXT,
                error TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_requests_event ON acquisition_requests(event_id);
            CREATE INDEX IF NOT EXISTS idx_requests_status ON acquisition_requests(status);

            -- Serialization point: at most one non-terminal request per event.
            CREATE UNIQUE INDEX IF NOT EXISTS idx_requests_open_event
                ON acquisition_requests(event_id)
                WHERE status NOT IN ('completed', 'failed');

            CREATE TABLE IF NOT EXISTS inventory_units (
                id TEXT PRIMARY KEY,
                event_id TEXT NOT NULL,
                funding_record_id TEXT NOT NULL,
                acquisition_request_id TEXT NOT NULL,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_inventory_event ON inventory_units(event_id);
            CREATE INDEX IF NOT EXISTS idx_inventory_request
                ON inventory_units(acquisition_request_id);
            "#,
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn parse_timestamp(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    }

    fn status_from_str(value: &str) -> rusqlite::Result<AcquisitionStatus> {
        match value {
            "pending" => Ok(AcquisitionStatus::Pending),
            "card_created" => Ok(AcquisitionStatus::CardCreated),
            "purchasing" => Ok(AcquisitionStatus::Purchasing),
            "completed" => Ok(AcquisitionStatus::Completed),
            "failed" => Ok(AcquisitionStatus::Failed),
            other => Err(rusqlite::Error::FromSqlConversionFailure(
                5,
                rusqlite::types::Type::Text,
                format!("unknown acquisition status '{}'", other).into(),
            )),
        }
    }

    fn row_to_event(row: &rusqlite::Row) -> rusqlite::Result<Event> {
        let starts_at_str: String = row.get(3)?;
        Ok(Event {
            id: row.get(0)?,
            name: row.get(1)?,
            venue: row.get(2)?,
            starts_at: Self::parse_timestamp(&starts_at_str),
            published: row.get::<_, i64>(4)? != 0,
            face_value_cents: row.get(5)?,
            target_url: row.get(6)?,
        })
    }

    fn row_to_funding_record(row: &rusqlite::Row) -> rusqlite::Result<FundingRecord> {
        let verified_at_str: Option<String> = row.get(6)?;
        let created_at_str: String = row.get(7)?;
        Ok(FundingRecord {
            id: row.get(0)?,
            event_id: row.get(1)?,
            units: row.get(2)?,
            amount_cents: row.get(3)?,
            settlement_ref: row.get(4)?,
            settlement_verified: row.get::<_, i64>(5)? != 0,
            verified_at: verified_at_str.map(|s| Self::parse_timestamp(&s)),
            created_at: Self::parse_timestamp(&created_at_str),
        })
    }

    fn row_to_request(row: &rusqlite::Row) -> rusqlite::Result<AcquisitionRequest> {
        let status_str: String = row.get(5)?;
        let created_at_str: String = row.get(10)?;
        let updated_at_str: String = row.get(11)?;
        Ok(AcquisitionRequest {
            id: row.get(0)?,
            event_id: row.get(1)?,
            units: row.get(2)?,
            expected_cost_cents: row.get(3)?,
            target_url: row.get(4)?,
            status: Self::status_from_str(&status_str)?,
            instrument_id: row.get(6)?,
            instrument_digest: row.get(7)?,
            confirmation_reference: row.get(8)?,
            error: row.get(9)?,
            created_at: Self::parse_timestamp(&created_at_str),
            updated_at: Self::parse_timestamp(&updated_at_str),
        })
    }

    fn row_to_inventory_unit(row: &rusqlite::Row) -> rusqlite::Result<InventoryUnit> {
        let status_str: String = row.get(4)?;
        let created_at_str: String = row.get(5)?;
        let status = if status_str == "assigned" {
            InventoryStatus::Assigned
        } else {
            InventoryStatus::Available
        };
        Ok(InventoryUnit {
            id: row.get(0)?,
            event_id: row.get(1)?,
            funding_record_id: row.get(2)?,
            acquisition_request_id: row.get(3)?,
            status,
            created_at: Self::parse_timestamp(&created_at_str),
        })
    }

    const REQUEST_COLUMNS: &'static str = "id, event_id, units, expected_cost_cents, target_url, \
         status, instrument_id, instrument_digest, confirmation_reference, error, \
         created_at, updated_at";

    fn get_request_locked(
        conn: &Connection,
        id: &str,
    ) -> Result<AcquisitionRequest, StoreError> {
        let sql = format!(
            "SELECT {} FROM acquisition_requests WHERE id = ?",
            Self::REQUEST_COLUMNS
        );
        match conn.query_row(&sql, params![id], Self::row_to_request) {
            Ok(request) => Ok(request),
            Err(rusqlite::Error::QueryReturnedNoRows) => {
                Err(StoreError::NotFound(format!("acquisition request {}", id)))
            }
            Err(e) => Err(StoreError::Database(e.to_string())),
        }
    }
}

impl AcquisitionStore for SqliteAcquisitionStore {
    fn upsert_event(&self, event: &Event) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO events \
             (id, name, venue, starts_at, published, face_value_cents, target_url) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                event.id,
                event.name,
                event.venue,
                event.starts_at.to_rfc3339(),
                event.published as i64,
                event.face_value_cents,
                event.target_url,
            ],
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }

    fn get_event(&self, id: &str) -> Result<Option<Event>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let result = conn.query_row(
            "SELECT id, name, venue, starts_at, published, face_value_cents, target_url \
             FROM events WHERE id = ?",
            params![id],
            Self::row_to_event,
        );
        match result {
            Ok(event) => Ok(Some(event)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StoreError::Database(e.to_string())),
        }
    }

    fn list_open_events(&self, now: DateTime<Utc>) -> Result<Vec<Event>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT id, name, venue, starts_at, published, face_value_cents, target_url \
                 FROM events WHERE published = 1 AND starts_at > ? ORDER BY starts_at ASC",
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params![now.to_rfc3339()], Self::row_to_event)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let mut events = Vec::new();
        for row in rows {
            events.push(row.map_err(|e| StoreError::Database(e.to_string()))?);
        }
        Ok(events)
    }

    fn add_funding_record(&self, record: NewFundingRecord) -> Result<FundingRecord, StoreError> {
        if record.units <= 0 {
            return Err(StoreError::InvalidRequest(
                "funding record units must be > 0".to_string(),
            ));
        }

        let conn = self.conn.lock().unwrap();
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        let verified_at = if record.settlement_verified {
            Some(now)
        } else {
            None
        };

        conn.execute(
            "INSERT INTO funding_records \
             (id, event_id, units, amount_cents, settlement_ref, settlement_verified, \
              verified_at, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                id,
                record.event_id,
                record.units,
                record.amount_cents,
                record.settlement_ref,
                record.settlement_verified as i64,
                verified_at.map(|t| t.to_rfc3339()),
                now.to_rfc3339(),
            ],
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(FundingRecord {
            id,
            event_id: record.event_id,
            units: record.units,
            amount_cents: record.amount_cents,
            settlement_ref: record.settlement_ref,
            settlement_verified: record.settlement_verified,
            verified_at,
            created_at: now,
        })
    }

    fn funding_records(&self, event_id: &str) -> Result<Vec<FundingRecord>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT id, event_id, units, amount_cents, settlement_ref, settlement_verified, \
                 verified_at, created_at \
                 FROM funding_records WHERE event_id = ? ORDER BY created_at ASC, id ASC",
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params![event_id], Self::row_to_funding_record)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row.map_err(|e| StoreError::Database(e.to_string()))?);
        }
        Ok(records)
    }

    fn create_request(
        &self,
        request: CreateAcquisitionRequest,
    ) -> Result<AcquisitionRequest, StoreError> {
        if request.units <= 0 {
            return Err(StoreError::InvalidRequest(
                "units requested must be > 0".to_string(),
            ));
        }

        let conn = self.conn.lock().unwrap();
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        let status = AcquisitionStatus::Pending;

        let result = conn.execute(
            "INSERT INTO acquisition_requests \
             (id, event_id, units, expected_cost_cents, target_url, status, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                id,
                request.event_id,
                request.units,
                request.expected_cost_cents,
                request.target_url,
                status.as_str(),
                now.to_rfc3339(),
                now.to_rfc3339(),
            ],
        );

        if let Err(e) = result {
            // The partial unique index rejects a second non-terminal request.
            if e.to_string().contains("UNIQUE constraint failed") {
                return Err(StoreError::RequestInFlight {
                    event_id: request.event_id,
                });
            }
            return Err(StoreError::Database(e.to_string()));
        }

        Ok(AcquisitionRequest {
            id,
            event_id: request.event_id,
            units: request.units,
            expected_cost_cents: request.expected_cost_cents,
            target_url: request.target_url,
            status,
            instrument_id: None,
            instrument_digest: None,
            confirmation_reference: None,
            error: None,
            created_at: now,
            updated_at: now,
        })
    }

    fn get_request(&self, id: &str) -> Result<Option<AcquisitionRequest>, StoreError> {
        let conn = self.conn.lock().unwrap();
        match Self::get_request_locked(&conn, id) {
            Ok(request) => Ok(Some(request)),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn list_requests(&self, filter: &RequestFilter) -> Result<Vec<AcquisitionRequest>, StoreError> {
        let conn = self.conn.lock().unwrap();

        let mut conditions = Vec::new();
        let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref event_id) = filter.event_id {
            conditions.push("event_id = ?");
            values.push(Box::new(event_id.clone()));
        }
        if let Some(status) = filter.status {
            conditions.push("status = ?");
            values.push(Box::new(status.as_str().to_string()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let sql = format!(
            "SELECT {} FROM acquisition_requests {} ORDER BY created_at DESC LIMIT ? OFFSET ?",
            Self::REQUEST_COLUMNS,
            where_clause
        );

        values.push(Box::new(filter.limit));
        values.push(Box::new(filter.offset));

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| StoreError::Database(e.to_string()))?;
        let value_refs: Vec<&dyn rusqlite::ToSql> = values.iter().map(|v| v.as_ref()).collect();

        let rows = stmt
            .query_map(value_refs.as_slice(), Self::row_to_request)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let mut requests = Vec::new();
        for row in rows {
            requests.push(row.map_err(|e| StoreError::Database(e.to_string()))?);
        }
        Ok(requests)
    }

    fn update_state(
        &self,
        id: &str,
        new_state: AcquisitionState,
    ) -> Result<AcquisitionRequest, StoreError> {
        let conn = self.conn.lock().unwrap();
        let current = Self::get_request_locked(&conn, id)?;
        let next_status = new_state.status();

        if !current.status.can_transition_to(next_status) {
            return Err(StoreError::InvalidTransition {
                request_id: id.to_string(),
                from: current.status.as_str().to_string(),
                to: next_status.as_str().to_string(),
            });
        }

        let now = Utc::now();
        match &new_state {
            AcquisitionState::Pending => {
                // Unreachable through the transition table, kept for completeness.
                conn.execute(
                    "UPDATE acquisition_requests SET status = ?, updated_at = ? WHERE id = ?",
                    params![next_status.as_str(), now.to_rfc3339(), id],
                )
            }
            AcquisitionState::CardCreated {
                instrument_id,
                instrument_digest,
            } => conn.execute(
                "UPDATE acquisition_requests \
                 SET status = ?, instrument_id = ?, instrument_digest = ?, updated_at = ? \
                 WHERE id = ?",
                params![
                    next_status.as_str(),
                    instrument_id,
                    instrument_digest,
                    now.to_rfc3339(),
                    id
                ],
            ),
            AcquisitionState::Purchasing => conn.execute(
                "UPDATE acquisition_requests SET status = ?, updated_at = ? WHERE id = ?",
                params![next_status.as_str(), now.to_rfc3339(), id],
            ),
            AcquisitionState::Completed {
                confirmation_reference,
            } => conn.execute(
                "UPDATE acquisition_requests \
                 SET status = ?, confirmation_reference = ?, updated_at = ? WHERE id = ?",
                params![
                    next_status.as_str(),
                    confirmation_reference,
                    now.to_rfc3339(),
                    id
                ],
            ),
            AcquisitionState::Failed { error } => conn.execute(
                "UPDATE acquisition_requests \
                 SET status = ?, error = ?, updated_at = ? WHERE id = ?",
                params![next_status.as_str(), error, now.to_rfc3339(), id],
            ),
        }
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Self::get_request_locked(&conn, id)
    }

    fn acquired_units(&self, event_id: &str) -> Result<i64, StoreError> {
        let conn = self.conn.lock().unwrap();
        let sum: i64 = conn
            .query_row(
                "SELECT COALESCE(SUM(units), 0) FROM acquisition_requests \
                 WHERE event_id = ? AND status != 'failed'",
                params![event_id],
                |row| row.get(0),
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(sum)
    }

    fn insert_inventory_unit(&self, unit: NewInventoryUnit) -> Result<InventoryUnit, StoreError> {
        let conn = self.conn.lock().unwrap();
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        let status = InventoryStatus::Available;

        conn.execute(
            "INSERT INTO inventory_units \
             (id, event_id, funding_record_id, acquisition_request_id, status, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                id,
                unit.event_id,
                unit.funding_record_id,
                unit.acquisition_request_id,
                status.as_str(),
                now.to_rfc3339(),
            ],
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(InventoryUnit {
            id,
            event_id: unit.event_id,
            funding_record_id: unit.funding_record_id,
            acquisition_request_id: unit.acquisition_request_id,
            status,
            created_at: now,
        })
    }

    fn inventory_units(&self, event_id: &str) -> Result<Vec<InventoryUnit>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT id, event_id, funding_record_id, acquisition_request_id, status, \
                 created_at FROM inventory_units WHERE event_id = ? ORDER BY created_at ASC",
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params![event_id], Self::row_to_inventory_unit)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let mut units = Vec::new();
        for row in rows {
            units.push(row.map_err(|e| StoreError::Database(e.to_string()))?);
        }
        Ok(units)
    }

    fn count_inventory_for_request(&self, request_id: &str) -> Result<i64, StoreError> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM inventory_units WHERE acquisition_request_id = ?",
                params![request_id],
                |row| row.get(0),
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn create_test_store() -> SqliteAcquisitionStore {
        SqliteAcquisitionStore::in_memory().unwrap()
    }

    fn test_event(id: &str) -> Event {
        Event {
            id: id.to_string(),
            name: "Midnight Choir: World Tour".to_string(),
            venue: Some("Velvet Hall".to_string()),
            starts_at: Utc::now() + Duration::days(30),
            published: true,
            face_value_cents: 5_000,
            target_url: Some("https://tickets.example.com/midnight-choir".to_string()),
        }
    }

    fn test_create_request(event_id: &str) -> CreateAcquisitionRequest {
        CreateAcquisitionRequest {
            event_id: event_id.to_string(),
            units: 4,
            expected_cost_cents: 20_000,
            target_url: Some("https://tickets.example.com/midnight-choir".to_string()),
        }
    }

    #[test]
    fn test_upsert_and_get_event() {
        let store = create_test_store();
        let event = test_event("ev-1");
        store.upsert_event(&event).unwrap();

        let fetched = store.get_event("ev-1").unwrap().unwrap();
        assert_eq!(fetched.name, event.name);
        assert_eq!(fetched.face_value_cents, 5_000);
    }

    #[test]
    fn test_list_open_events_filters_past_and_unpublished() {
        let store = create_test_store();

        store.upsert_event(&test_event("future")).unwrap();

        let mut past = test_event("past");
        past.starts_at = Utc::now() - Duration::days(1);
        store.upsert_event(&past).unwrap();

        let mut unpublished = test_event("draft");
        unpublished.published = false;
        store.upsert_event(&unpublished).unwrap();

        let events = store.list_open_events(Utc::now()).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, "future");
    }

    #[test]
    fn test_add_funding_record() {
        let store = create_test_store();
        let record = store
            .add_funding_record(NewFundingRecord {
                event_id: "ev-1".to_string(),
                units: 2,
                amount_cents: 10_000,
                settlement_ref: Some("stl_abc".to_string()),
                settlement_verified: true,
            })
            .unwrap();

        assert!(record.is_verified());
        assert!(record.verified_at.is_some());

        let records = store.funding_records("ev-1").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].amount_cents, 10_000);
    }

    #[test]
    fn test_funding_record_rejects_zero_units() {
        let store = create_test_store();
        let result = store.add_funding_record(NewFundingRecord {
            event_id: "ev-1".to_string(),
            units: 0,
            amount_cents: 1,
            settlement_ref: None,
            settlement_verified: false,
        });
        assert!(matches!(result, Err(StoreError::InvalidRequest(_))));
    }

    #[test]
    fn test_create_request_starts_pending() {
        let store = create_test_store();
        let request = store.create_request(test_create_request("ev-1")).unwrap();

        assert!(!request.id.is_empty());
        assert_eq!(request.status, AcquisitionStatus::Pending);
        assert_eq!(request.units, 4);
        assert!(request.instrument_id.is_none());
    }

    #[test]
    fn test_create_request_rejects_zero_units() {
        let store = create_test_store();
        let mut request = test_create_request("ev-1");
        request.units = 0;
        assert!(matches!(
            store.create_request(request),
            Err(StoreError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_one_non_terminal_request_per_event() {
        let store = create_test_store();
        store.create_request(test_create_request("ev-1")).unwrap();

        let second = store.create_request(test_create_request("ev-1"));
        assert!(matches!(
            second,
            Err(StoreError::RequestInFlight { ref event_id }) if event_id == "ev-1"
        ));

        // A different event is fine.
        store.create_request(test_create_request("ev-2")).unwrap();
    }

    #[test]
    fn test_new_request_allowed_after_terminal() {
        let store = create_test_store();
        let first = store.create_request(test_create_request("ev-1")).unwrap();
        store
            .update_state(
                &first.id,
                AcquisitionState::Failed {
                    error: "issuer outage".to_string(),
                },
            )
            .unwrap();

        // Terminal request no longer blocks the event.
        store.create_request(test_create_request("ev-1")).unwrap();
    }

    #[test]
    fn test_full_lifecycle_transitions() {
        let store = create_test_store();
        let request = store.create_request(test_create_request("ev-1")).unwrap();

        let request = store
            .update_state(
                &request.id,
                AcquisitionState::CardCreated {
                    instrument_id: "ins-1".to_string(),
                    instrument_digest: "a1b2c3d4e5f6".to_string(),
                },
            )
            .unwrap();
        assert_eq!(request.status, AcquisitionStatus::CardCreated);
        assert_eq!(request.instrument_id.as_deref(), Some("ins-1"));

        let request = store
            .update_state(&request.id, AcquisitionState::Purchasing)
            .unwrap();
        assert_eq!(request.status, AcquisitionStatus::Purchasing);

        let request = store
            .update_state(
                &request.id,
                AcquisitionState::Completed {
                    confirmation_reference: "ORD-99".to_string(),
                },
            )
            .unwrap();
        assert_eq!(request.status, AcquisitionStatus::Completed);
        assert_eq!(request.confirmation_reference.as_deref(), Some("ORD-99"));
        // Instrument assignment survives the transition.
        assert_eq!(request.instrument_id.as_deref(), Some("ins-1"));
    }

    #[test]
    fn test_manual_handoff_rests_in_card_created() {
        let store = create_test_store();
        let request = store.create_request(test_create_request("ev-1")).unwrap();
        store
            .update_state(
                &request.id,
                AcquisitionState::CardCreated {
                    instrument_id: "ins-1".to_string(),
                    instrument_digest: "a1b2c3d4e5f6".to_string(),
                },
            )
            .unwrap();
        store
            .update_state(&request.id, AcquisitionState::Purchasing)
            .unwrap();

        let request = store
            .update_state(
                &request.id,
                AcquisitionState::CardCreated {
                    instrument_id: "ins-1".to_string(),
                    instrument_digest: "a1b2c3d4e5f6".to_string(),
                },
            )
            .unwrap();
        assert_eq!(request.status, AcquisitionStatus::CardCreated);
    }

    #[test]
    fn test_terminal_state_is_immutable() {
        let store = create_test_store();
        let request = store.create_request(test_create_request("ev-1")).unwrap();
        store
            .update_state(
                &request.id,
                AcquisitionState::Failed {
                    error: "blocklisted".to_string(),
                },
            )
            .unwrap();

        let result = store.update_state(&request.id, AcquisitionState::Purchasing);
        assert!(matches!(result, Err(StoreError::InvalidTransition { .. })));
    }

    #[test]
    fn test_illegal_skip_transition() {
        let store = create_test_store();
        let request = store.create_request(test_create_request("ev-1")).unwrap();

        // Pending cannot jump straight to Completed.
        let result = store.update_state(
            &request.id,
            AcquisitionState::Completed {
                confirmation_reference: "ORD-1".to_string(),
            },
        );
        assert!(matches!(result, Err(StoreError::InvalidTransition { .. })));
    }

    #[test]
    fn test_update_state_nonexistent_request() {
        let store = create_test_store();
        let result = store.update_state("missing", AcquisitionState::Purchasing);
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_acquired_units_excludes_failed() {
        let store = create_test_store();

        let first = store.create_request(test_create_request("ev-1")).unwrap();
        store
            .update_state(
                &first.id,
                AcquisitionState::Failed {
                    error: "vendor outage".to_string(),
                },
            )
            .unwrap();

        let mut second = test_create_request("ev-1");
        second.units = 3;
        let second = store.create_request(second).unwrap();
        store
            .update_state(
                &second.id,
                AcquisitionState::CardCreated {
                    instrument_id: "ins-1".to_string(),
                    instrument_digest: "a1b2c3d4e5f6".to_string(),
                },
            )
            .unwrap();

        // Failed (4 units) excluded; in-flight (3 units) counted.
        assert_eq!(store.acquired_units("ev-1").unwrap(), 3);
    }

    #[test]
    fn test_list_requests_with_filter() {
        let store = create_test_store();
        let request = store.create_request(test_create_request("ev-1")).unwrap();
        store.create_request(test_create_request("ev-2")).unwrap();

        let by_event = store
            .list_requests(&RequestFilter::new().with_event("ev-1"))
            .unwrap();
        assert_eq!(by_event.len(), 1);
        assert_eq!(by_event[0].id, request.id);

        let pending = store
            .list_requests(&RequestFilter::new().with_status(AcquisitionStatus::Pending))
            .unwrap();
        assert_eq!(pending.len(), 2);
    }

    #[test]
    fn test_inventory_units() {
        let store = create_test_store();
        let unit = store
            .insert_inventory_unit(NewInventoryUnit {
                event_id: "ev-1".to_string(),
                funding_record_id: "fr-1".to_string(),
                acquisition_request_id: "req-1".to_string(),
            })
            .unwrap();

        assert_eq!(unit.status, InventoryStatus::Available);
        assert_eq!(store.inventory_units("ev-1").unwrap().len(), 1);
        assert_eq!(store.count_inventory_for_request("req-1").unwrap(), 1);
        assert_eq!(store.count_inventory_for_request("req-2").unwrap(), 0);
    }

    #[test]
    fn test_unknown_status_surfaces_as_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("encore.db");

        let store = SqliteAcquisitionStore::new(&db_path).unwrap();
        let request = store.create_request(test_create_request("ev-1")).unwrap();

        // Corrupt the status column through a second connection.
        let conn = Connection::open(&db_path).unwrap();
        conn.execute(
            "UPDATE acquisition_requests SET status = 'limbo' WHERE id = ?",
            params![request.id],
        )
        .unwrap();

        let result = store.get_request(&request.id);
        assert!(matches!(result, Err(StoreError::Database(_))));
    }

    #[test]
    fn test_file_based_store() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("encore.db");

        let store = SqliteAcquisitionStore::new(&db_path).unwrap();
        store.upsert_event(&test_event("ev-1")).unwrap();

        assert!(db_path.exists());
        assert!(store.get_event("ev-1").unwrap().is_some());
    }
}
