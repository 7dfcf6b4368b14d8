use anyhow::{anyhow, Result};
use chrono::{Local, NaiveDateTime};
use rusqlite::{params, Connection, Row};
use std::path::Path;
use uuid::Uuid;

use crate::detect::BoundingBox;
use crate::event::PhoneUsageEvent;

/// Fixed-width local timestamp text; sorts lexicographically in time order.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// One persisted event, timestamps in local wall-clock time.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredEvent {
    pub id: i64,
    pub event_id: Uuid,
    pub timestamp: NaiveDateTime,
    pub screenshot_path: Option<String>,
    pub person_bbox: BoundingBox,
    pub phone_bbox: BoundingBox,
    pub frame_count: u32,
}

pub trait EventStore: Send {
    /// Persist a newly started event. Returns the row id.
    fn insert_event(&mut self, event: &PhoneUsageEvent, screenshot: Option<&Path>) -> Result<i64>;

    /// Record the final frame count. Returns false if the event is unknown.
    fn update_frame_count(&mut self, event_id: Uuid, frame_count: u32) -> Result<bool>;

    fn total_events(&self) -> Result<u64>;

    /// Events with `start <= timestamp <= end`, newest first.
    fn events_between(&self, start: NaiveDateTime, end: NaiveDateTime)
        -> Result<Vec<StoredEvent>>;

    /// Newest `limit` events, newest first.
    fn recent_events(&self, limit: usize) -> Result<Vec<StoredEvent>>;

    /// Earliest and latest event timestamps, if any events exist.
    fn first_and_last(&self) -> Result<Option<(NaiveDateTime, NaiveDateTime)>>;

    /// Delete events strictly older than `cutoff`. Returns the number removed.
    fn delete_before(&mut self, cutoff: NaiveDateTime) -> Result<usize>;

    fn delete_all(&mut self) -> Result<usize>;
}

pub(crate) fn local_timestamp(event: &PhoneUsageEvent) -> NaiveDateTime {
    event.start_time.with_timezone(&Local).naive_local()
}

fn format_ts(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

fn parse_ts(raw: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .map_err(|e| anyhow!("corrupt event timestamp {:?}: {}", raw, e))
}

fn bbox_json(bbox: &BoundingBox) -> Result<String> {
    Ok(serde_json::to_string(&bbox.to_array())?)
}

fn parse_bbox(raw: &str) -> Result<BoundingBox> {
    let [x1, y1, x2, y2]: [f32; 4] = serde_json::from_str(raw)
        .map_err(|e| anyhow!("corrupt bbox {:?}: {}", raw, e))?;
    Ok(BoundingBox::new(x1, y1, x2, y2))
}

fn to_i64(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

// ----------------------------------------------------------------------------
// SQLite
// ----------------------------------------------------------------------------

pub struct SqliteEventStore {
    conn: Connection,
}

struct EventRow {
    id: i64,
    event_uuid: String,
    timestamp: String,
    screenshot_path: Option<String>,
    person_bbox: String,
    phone_bbox: String,
    frame_count: i64,
}

impl EventRow {
    const COLUMNS: &'static str =
        "id, event_uuid, timestamp, screenshot_path, person_bbox, phone_bbox, frame_count";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            event_uuid: row.get(1)?,
            timestamp: row.get(2)?,
            screenshot_path: row.get(3)?,
            person_bbox: row.get(4)?,
            phone_bbox: row.get(5)?,
            frame_count: row.get(6)?,
        })
    }

    fn into_event(self) -> Result<StoredEvent> {
        Ok(StoredEvent {
            id: self.id,
            event_id: Uuid::parse_str(&self.event_uuid)
                .map_err(|e| anyhow!("corrupt event uuid {:?}: {}", self.event_uuid, e))?,
            timestamp: parse_ts(&self.timestamp)?,
            screenshot_path: self.screenshot_path,
            person_bbox: parse_bbox(&self.person_bbox)?,
            phone_bbox: parse_bbox(&self.phone_bbox)?,
            frame_count: u32::try_from(self.frame_count)
                .map_err(|_| anyhow!("corrupt frame_count {}", self.frame_count))?,
        })
    }
}

impl SqliteEventStore {
    pub fn open(db_path: &str) -> Result<Self> {
        if let Some(parent) = Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(db_path)?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let mut store = Self { conn };
        store.ensure_schema()?;
        Ok(store)
    }

    fn ensure_schema(&mut self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS events (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              event_uuid TEXT UNIQUE NOT NULL,
              timestamp TEXT NOT NULL,
              screenshot_path TEXT,
              person_bbox TEXT,
              phone_bbox TEXT,
              frame_count INTEGER NOT NULL DEFAULT 1
            );

            CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp);
            "#,
        )?;
        Ok(())
    }

    fn query_events<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<Vec<StoredEvent>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, EventRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(EventRow::into_event).collect()
    }
}

impl EventStore for SqliteEventStore {
    fn insert_event(&mut self, event: &PhoneUsageEvent, screenshot: Option<&Path>) -> Result<i64> {
        let screenshot = screenshot.map(|p| p.to_string_lossy().into_owned());
        self.conn.execute(
            r#"
            INSERT INTO events(event_uuid, timestamp, screenshot_path, person_bbox, phone_bbox, frame_count)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                event.event_id.to_string(),
                format_ts(&local_timestamp(event)),
                screenshot,
                bbox_json(&event.person_bbox)?,
                bbox_json(&event.phone_bbox)?,
                i64::from(event.frame_count),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update_frame_count(&mut self, event_id: Uuid, frame_count: u32) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE events SET frame_count = ?1 WHERE event_uuid = ?2",
            params![i64::from(frame_count), event_id.to_string()],
        )?;
        Ok(changed > 0)
    }

    fn total_events(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    fn events_between(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<StoredEvent>> {
        let sql = format!(
            "SELECT {} FROM events WHERE timestamp >= ?1 AND timestamp <= ?2 ORDER BY timestamp DESC, id DESC",
            EventRow::COLUMNS
        );
        self.query_events(&sql, params![format_ts(&start), format_ts(&end)])
    }

    fn recent_events(&self, limit: usize) -> Result<Vec<StoredEvent>> {
        let sql = format!(
            "SELECT {} FROM events ORDER BY timestamp DESC, id DESC LIMIT ?1",
            EventRow::COLUMNS
        );
        self.query_events(&sql, params![to_i64(limit)])
    }

    fn first_and_last(&self) -> Result<Option<(NaiveDateTime, NaiveDateTime)>> {
        let bounds: (Option<String>, Option<String>) = self.conn.query_row(
            "SELECT MIN(timestamp), MAX(timestamp) FROM events",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        match bounds {
            (Some(first), Some(last)) => Ok(Some((parse_ts(&first)?, parse_ts(&last)?))),
            _ => Ok(None),
        }
    }

    fn delete_before(&mut self, cutoff: NaiveDateTime) -> Result<usize> {
        let removed = self.conn.execute(
            "DELETE FROM events WHERE timestamp < ?1",
            params![format_ts(&cutoff)],
        )?;
        Ok(removed)
    }

    fn delete_all(&mut self) -> Result<usize> {
        Ok(self.conn.execute("DELETE FROM events", [])?)
    }
}

// ----------------------------------------------------------------------------
// In-memory
// ----------------------------------------------------------------------------

#[derive(Clone, Debug, Default)]
pub struct InMemoryEventStore {
    events: Vec<StoredEvent>,
    next_id: i64,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert with an explicit local timestamp, for fixtures.
    pub fn insert_at(
        &mut self,
        event: &PhoneUsageEvent,
        timestamp: NaiveDateTime,
        screenshot: Option<&Path>,
    ) -> Result<i64> {
        if self.events.iter().any(|e| e.event_id == event.event_id) {
            return Err(anyhow!("duplicate event id {}", event.event_id));
        }
        self.next_id += 1;
        self.events.push(StoredEvent {
            id: self.next_id,
            event_id: event.event_id,
            timestamp,
            screenshot_path: screenshot.map(|p| p.to_string_lossy().into_owned()),
            person_bbox: event.person_bbox,
            phone_bbox: event.phone_bbox,
            frame_count: event.frame_count,
        });
        Ok(self.next_id)
    }

    fn newest_first(&self) -> Vec<StoredEvent> {
        let mut out = self.events.clone();
        out.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        out
    }
}

impl EventStore for InMemoryEventStore {
    fn insert_event(&mut self, event: &PhoneUsageEvent, screenshot: Option<&Path>) -> Result<i64> {
        self.insert_at(event, local_timestamp(event), screenshot)
    }

    fn update_frame_count(&mut self, event_id: Uuid, frame_count: u32) -> Result<bool> {
        match self.events.iter_mut().find(|e| e.event_id == event_id) {
            Some(entry) => {
                entry.frame_count = frame_count;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn total_events(&self) -> Result<u64> {
        Ok(self.events.len() as u64)
    }

    fn events_between(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<StoredEvent>> {
        Ok(self
            .newest_first()
            .into_iter()
            .filter(|e| e.timestamp >= start && e.timestamp <= end)
            .collect())
    }

    fn recent_events(&self, limit: usize) -> Result<Vec<StoredEvent>> {
        let mut out = self.newest_first();
        out.truncate(limit);
        Ok(out)
    }

    fn first_and_last(&self) -> Result<Option<(NaiveDateTime, NaiveDateTime)>> {
        let first = self.events.iter().map(|e| e.timestamp).min();
        let last = self.events.iter().map(|e| e.timestamp).max();
        Ok(first.zip(last))
    }

    fn delete_before(&mut self, cutoff: NaiveDateTime) -> Result<usize> {
        let before = self.events.len();
        self.events.retain(|e| e.timestamp >= cutoff);
        Ok(before - self.events.len())
    }

    fn delete_all(&mut self) -> Result<usize> {
        let removed = self.events.len();
        self.events.clear();
        Ok(removed)
    }
}
