//! Storage layer for timeclock.
//!
//! Provides the event log, interval store, day slices, reports and settings
//! using `rusqlite`.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! Share it between threads by handing it to a [`tc_core::Tracker`], which
//! serializes all access behind one mutex.
//!
//! # Schema
//!
//! ## Timestamp Format
//!
//! Timestamps are stored as TEXT in RFC 3339 format with whole seconds
//! (e.g., `2024-01-15T10:30:00Z`), so lexicographic ordering matches
//! chronological ordering.
//!
//! ## Versioning
//!
//! `PRAGMA user_version` records the last applied migration. Migrations only
//! add tables and indexes, each guarded by `IF NOT EXISTS`, and each runs in
//! its own transaction.

mod report;
mod settings;

use std::path::Path;

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use thiserror::Error;

use tc_core::{
    Action, IntervalClose, LastEvent, NewEvent, NewInterval, OpenInterval, SessionId,
    SessionStore, StoreError, UnknownAction, ValidationError, slice_days,
};

pub use report::CategoryTotal;
pub use settings::EXACT_DURATIONS;

/// Latest schema version this build knows how to migrate to.
pub const SCHEMA_VERSION: i32 = 2;

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Failed to parse a stored timestamp.
    #[error("invalid timestamp in {table} row {row_id}: {timestamp}")]
    TimestampParse {
        table: &'static str,
        row_id: i64,
        timestamp: String,
        #[source]
        source: chrono::ParseError,
    },
    /// Failed to parse a stored local date.
    #[error("invalid local date: {date}")]
    DateParse {
        date: String,
        #[source]
        source: chrono::ParseError,
    },
    /// The event log contains an action this build does not know.
    #[error("event {event_id} has an unrecognized action")]
    UnknownAction {
        event_id: i64,
        #[source]
        source: UnknownAction,
    },
    /// A stored value failed domain validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// No open interval exists for the session being closed.
    #[error("no open interval for session {session_id}")]
    NoOpenInterval { session_id: String },
    /// The database was written by a newer version.
    #[error("database schema version {found} is newer than supported version {supported}")]
    UnsupportedSchema { found: i32, supported: i32 },
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NoOpenInterval { session_id } => Self::NoOpenInterval { session_id },
            other => Self::Backend(Box::new(other)),
        }
    }
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

/// A row of the event log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    pub id: i64,
    pub session_id: SessionId,
    pub timestamp: DateTime<Utc>,
    pub action: Action,
    pub category: String,
    pub description: String,
    /// Host time zone name at write time. Diagnostic only.
    pub user_tz: Option<String>,
}

/// A row of the interval store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalRecord {
    pub id: i64,
    pub session_id: SessionId,
    pub index: u32,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub category: String,
    pub description: String,
    pub duration_seconds: Option<i64>,
}

/// A row of `interval_days`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaySliceRecord {
    pub id: i64,
    pub interval_id: i64,
    pub session_id: SessionId,
    pub date_local: String,
    pub category: String,
    pub description: String,
    pub duration_seconds: i64,
}

const MIGRATIONS: &[(i32, &str)] = &[
    (
        1,
        "
        -- Event log: ground truth audit trail, never updated
        CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id TEXT NOT NULL,
            timestamp_utc TEXT NOT NULL,
            action TEXT NOT NULL CHECK (action IN ('START', 'PAUSE', 'RESUME', 'STOP')),
            category TEXT NOT NULL,
            description TEXT,
            user_tz TEXT
        );

        -- Work segments; end_utc and duration_seconds stay NULL while open
        CREATE TABLE IF NOT EXISTS intervals (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id TEXT NOT NULL,
            interval_index INTEGER NOT NULL,
            start_utc TEXT NOT NULL,
            end_utc TEXT,
            category TEXT NOT NULL,
            description TEXT,
            duration_seconds INTEGER
        );

        -- Closed intervals split per local date ('YYYY-MM-DD')
        CREATE TABLE IF NOT EXISTS interval_days (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            interval_id INTEGER NOT NULL,
            session_id TEXT NOT NULL,
            date_local TEXT NOT NULL,
            category TEXT NOT NULL,
            description TEXT,
            duration_seconds INTEGER NOT NULL,
            FOREIGN KEY (interval_id) REFERENCES intervals(id) ON DELETE CASCADE
        );
        ",
    ),
    (
        2,
        "
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_intervals_open ON intervals(session_id, end_utc);
        CREATE INDEX IF NOT EXISTS idx_interval_days_date ON interval_days(date_local);
        CREATE INDEX IF NOT EXISTS idx_interval_days_interval ON interval_days(interval_id);
        ",
    ),
];

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// Pending schema migrations are applied on open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let mut db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let mut db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn init(&mut self) -> Result<(), DbError> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.migrate()
    }

    /// Current `PRAGMA user_version`.
    pub fn schema_version(&self) -> Result<i32, DbError> {
        Ok(self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))?)
    }

    /// Applies every migration newer than the stored version.
    ///
    /// This is idempotent - safe to call on an up-to-date database.
    pub fn migrate(&mut self) -> Result<(), DbError> {
        let current = self.schema_version()?;
        if current > SCHEMA_VERSION {
            return Err(DbError::UnsupportedSchema {
                found: current,
                supported: SCHEMA_VERSION,
            });
        }

        for &(version, sql) in MIGRATIONS {
            if version <= current {
                continue;
            }
            let tx = self.conn.transaction()?;
            tx.execute_batch(sql)?;
            tx.pragma_update(None, "user_version", version)?;
            tx.commit()?;
            tracing::debug!(version, "applied schema migration");
        }
        Ok(())
    }

    fn transact<T>(
        &mut self,
        f: impl FnOnce(&Connection) -> Result<T, DbError>,
    ) -> Result<T, DbError> {
        let tx = self.conn.transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Appends one event to the log and returns its row id.
    pub fn append_event(&mut self, event: &NewEvent<'_>) -> Result<i64, DbError> {
        self.transact(|conn| insert_event(conn, event))
    }

    /// Inserts an open interval and returns its row id.
    ///
    /// The caller guarantees the session has no other open interval.
    pub fn open_interval(&mut self, interval: &NewInterval<'_>) -> Result<i64, DbError> {
        self.transact(|conn| insert_interval(conn, interval))
    }

    /// Closes the session's open interval and writes its day slices in one
    /// transaction. Returns the closed interval's row id.
    pub fn close_open_interval_and_slice<Tz: TimeZone>(
        &mut self,
        close: &IntervalClose<'_>,
        zone: &Tz,
    ) -> Result<i64, DbError> {
        self.transact(|conn| close_and_slice(conn, close, zone))
    }

    /// Most recently opened interval that is still open, across sessions.
    pub fn current_open_interval(&self) -> Result<Option<IntervalRecord>, DbError> {
        let row = self
            .conn
            .query_row(
                &format!("{INTERVAL_COLUMNS} WHERE end_utc IS NULL ORDER BY id DESC LIMIT 1"),
                [],
                raw_interval,
            )
            .optional()?;
        row.map(RawInterval::into_record).transpose()
    }

    /// Most recently appended event.
    pub fn last_event(&self) -> Result<Option<EventRecord>, DbError> {
        let row = self
            .conn
            .query_row(
                &format!("{EVENT_COLUMNS} ORDER BY id DESC LIMIT 1"),
                [],
                raw_event,
            )
            .optional()?;
        row.map(RawEvent::into_record).transpose()
    }

    /// Lists the most recent events, newest first.
    pub fn recent_events(&self, limit: usize) -> Result<Vec<EventRecord>, DbError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = self
            .conn
            .prepare(&format!("{EVENT_COLUMNS} ORDER BY id DESC LIMIT ?"))?;
        let rows = stmt.query_map([limit], raw_event)?;
        let mut events = Vec::new();
        for row in rows {
            events.push(row?.into_record()?);
        }
        Ok(events)
    }

    /// Total number of events in the log.
    pub fn event_count(&self) -> Result<i64, DbError> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?)
    }

    /// Number of intervals ever opened for a session.
    pub fn intervals_opened(&self, session_id: &SessionId) -> Result<u32, DbError> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM intervals WHERE session_id = ?",
            [session_id.as_str()],
            |row| row.get(0),
        )?)
    }

    /// Lists a session's intervals in insertion order.
    pub fn intervals_for_session(
        &self,
        session_id: &SessionId,
    ) -> Result<Vec<IntervalRecord>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "{INTERVAL_COLUMNS} WHERE session_id = ? ORDER BY id ASC"
        ))?;
        let rows = stmt.query_map([session_id.as_str()], raw_interval)?;
        let mut intervals = Vec::new();
        for row in rows {
            intervals.push(row?.into_record()?);
        }
        Ok(intervals)
    }

    /// Lists the day slices derived from one interval, in date order.
    pub fn day_slices_for_interval(&self, interval_id: i64) -> Result<Vec<DaySliceRecord>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT id, interval_id, session_id, date_local, category, description, duration_seconds
            FROM interval_days
            WHERE interval_id = ?
            ORDER BY date_local ASC, id ASC
            ",
        )?;
        let rows = stmt.query_map([interval_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, i64>(6)?,
            ))
        })?;
        let mut slices = Vec::new();
        for row in rows {
            let (id, interval_id, session_id, date_local, category, description, duration_seconds) =
                row?;
            slices.push(DaySliceRecord {
                id,
                interval_id,
                session_id: SessionId::new(session_id)?,
                date_local,
                category,
                description: description.unwrap_or_default(),
                duration_seconds,
            });
        }
        Ok(slices)
    }
}

impl SessionStore for Database {
    fn record_open(
        &mut self,
        event: &NewEvent<'_>,
        interval: &NewInterval<'_>,
    ) -> Result<(), StoreError> {
        self.transact(|conn| {
            insert_event(conn, event)?;
            insert_interval(conn, interval)
        })?;
        Ok(())
    }

    fn record_close<Tz: TimeZone>(
        &mut self,
        event: &NewEvent<'_>,
        close: &IntervalClose<'_>,
        zone: &Tz,
    ) -> Result<(), StoreError> {
        self.transact(|conn| {
            close_and_slice(conn, close, zone)?;
            insert_event(conn, event)
        })?;
        Ok(())
    }

    fn record_event(&mut self, event: &NewEvent<'_>) -> Result<(), StoreError> {
        self.append_event(event)?;
        Ok(())
    }

    fn latest_open_interval(&self) -> Result<Option<OpenInterval>, StoreError> {
        Ok(self.current_open_interval()?.map(|interval| OpenInterval {
            session_id: interval.session_id,
            index: interval.index,
            start: interval.start,
            category: interval.category,
            description: interval.description,
        }))
    }

    fn latest_event(&self) -> Result<Option<LastEvent>, StoreError> {
        Ok(self.last_event()?.map(|event| LastEvent {
            session_id: event.session_id,
            action: event.action,
            timestamp: event.timestamp,
            category: event.category,
            description: event.description,
        }))
    }

    fn interval_count(&self, session_id: &SessionId) -> Result<u32, StoreError> {
        Ok(self.intervals_opened(session_id)?)
    }
}

const EVENT_COLUMNS: &str = "
    SELECT id, session_id, timestamp_utc, action, category, description, user_tz
    FROM events";

const INTERVAL_COLUMNS: &str = "
    SELECT id, session_id, interval_index, start_utc, end_utc, category, description, duration_seconds
    FROM intervals";

struct RawEvent {
    id: i64,
    session_id: String,
    timestamp: String,
    action: String,
    category: String,
    description: Option<String>,
    user_tz: Option<String>,
}

fn raw_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawEvent> {
    Ok(RawEvent {
        id: row.get(0)?,
        session_id: row.get(1)?,
        timestamp: row.get(2)?,
        action: row.get(3)?,
        category: row.get(4)?,
        description: row.get(5)?,
        user_tz: row.get(6)?,
    })
}

impl RawEvent {
    fn into_record(self) -> Result<EventRecord, DbError> {
        let action = self
            .action
            .parse()
            .map_err(|source| DbError::UnknownAction {
                event_id: self.id,
                source,
            })?;
        Ok(EventRecord {
            id: self.id,
            session_id: SessionId::new(self.session_id)?,
            timestamp: parse_timestamp(&self.timestamp, "events", self.id)?,
            action,
            category: self.category,
            description: self.description.unwrap_or_default(),
            user_tz: self.user_tz,
        })
    }
}

struct RawInterval {
    id: i64,
    session_id: String,
    index: u32,
    start: String,
    end: Option<String>,
    category: String,
    description: Option<String>,
    duration_seconds: Option<i64>,
}

fn raw_interval(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawInterval> {
    Ok(RawInterval {
        id: row.get(0)?,
        session_id: row.get(1)?,
        index: row.get(2)?,
        start: row.get(3)?,
        end: row.get(4)?,
        category: row.get(5)?,
        description: row.get(6)?,
        duration_seconds: row.get(7)?,
    })
}

impl RawInterval {
    fn into_record(self) -> Result<IntervalRecord, DbError> {
        let end = self
            .end
            .as_deref()
            .map(|end| parse_timestamp(end, "intervals", self.id))
            .transpose()?;
        Ok(IntervalRecord {
            id: self.id,
            session_id: SessionId::new(self.session_id)?,
            index: self.index,
            start: parse_timestamp(&self.start, "intervals", self.id)?,
            end,
            category: self.category,
            description: self.description.unwrap_or_default(),
            duration_seconds: self.duration_seconds,
        })
    }
}

fn insert_event(conn: &Connection, event: &NewEvent<'_>) -> Result<i64, DbError> {
    conn.execute(
        "
        INSERT INTO events (session_id, timestamp_utc, action, category, description, user_tz)
        VALUES (?, ?, ?, ?, ?, ?)
        ",
        params![
            event.session_id.as_str(),
            format_timestamp(event.timestamp),
            event.action.as_str(),
            event.category,
            event.description,
            host_time_zone(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn insert_interval(conn: &Connection, interval: &NewInterval<'_>) -> Result<i64, DbError> {
    conn.execute(
        "
        INSERT INTO intervals (session_id, interval_index, start_utc, category, description)
        VALUES (?, ?, ?, ?, ?)
        ",
        params![
            interval.session_id.as_str(),
            interval.index,
            format_timestamp(interval.start),
            interval.category,
            interval.description,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn close_and_slice<Tz: TimeZone>(
    conn: &Connection,
    close: &IntervalClose<'_>,
    zone: &Tz,
) -> Result<i64, DbError> {
    let session_id = close.session_id.as_str();
    // Highest id wins if the one-open-interval invariant was ever broken.
    let interval_id: Option<i64> = conn
        .query_row(
            "
            SELECT id FROM intervals
            WHERE session_id = ? AND end_utc IS NULL
            ORDER BY id DESC
            LIMIT 1
            ",
            [session_id],
            |row| row.get(0),
        )
        .optional()?;
    let Some(interval_id) = interval_id else {
        return Err(DbError::NoOpenInterval {
            session_id: session_id.to_string(),
        });
    };

    if close.end < close.start {
        tracing::warn!(
            interval_id,
            start = %close.start,
            end = %close.end,
            "interval ends before it starts; recording zero duration"
        );
    }
    let duration_seconds = (close.end.timestamp() - close.start.timestamp()).max(0);
    conn.execute(
        "UPDATE intervals SET end_utc = ?, duration_seconds = ? WHERE id = ?",
        params![format_timestamp(close.end), duration_seconds, interval_id],
    )?;

    let spans = slice_days(close.start, close.end, zone);
    let mut stmt = conn.prepare(
        "
        INSERT INTO interval_days (interval_id, session_id, date_local, category, description, duration_seconds)
        VALUES (?, ?, ?, ?, ?, ?)
        ",
    )?;
    for span in &spans {
        stmt.execute(params![
            interval_id,
            session_id,
            span.date_label(),
            close.category,
            close.description,
            span.seconds,
        ])?;
    }

    tracing::debug!(
        interval_id,
        session_id,
        duration_seconds,
        slices = spans.len(),
        "closed interval"
    );
    Ok(interval_id)
}

fn host_time_zone() -> Option<String> {
    iana_time_zone::get_timezone().ok()
}

fn parse_timestamp(timestamp: &str, table: &'static str, row_id: i64) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| DbError::TimestampParse {
            table,
            row_id,
            timestamp: timestamp.to_string(),
            source,
        })
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
}
