//! Persistence seam between the session state machine and its storage.
//!
//! Each write method records one whole transition and must be atomic: the
//! event row and the interval change it accompanies are committed together or
//! not at all.

use chrono::{DateTime, TimeZone, Utc};
use thiserror::Error;

use crate::action::Action;
use crate::types::SessionId;

/// Errors surfaced by a [`SessionStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// A close was requested but the session has no open interval.
    #[error("no open interval for session {session_id}")]
    NoOpenInterval { session_id: String },
    /// Failure in the underlying storage.
    #[error(transparent)]
    Backend(Box<dyn std::error::Error + Send + Sync>),
}

/// Event row to append to the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEvent<'a> {
    pub session_id: &'a SessionId,
    pub timestamp: DateTime<Utc>,
    pub action: Action,
    pub category: &'a str,
    pub description: &'a str,
}

/// Interval row to open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewInterval<'a> {
    pub session_id: &'a SessionId,
    pub index: u32,
    pub start: DateTime<Utc>,
    pub category: &'a str,
    pub description: &'a str,
}

/// Close of the session's open interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalClose<'a> {
    pub session_id: &'a SessionId,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub category: &'a str,
    pub description: &'a str,
}

/// An interval that has not been closed yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenInterval {
    pub session_id: SessionId,
    pub index: u32,
    pub start: DateTime<Utc>,
    pub category: String,
    pub description: String,
}

/// The most recent entry of the event log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastEvent {
    pub session_id: SessionId,
    pub action: Action,
    pub timestamp: DateTime<Utc>,
    pub category: String,
    pub description: String,
}

/// Durable storage for session transitions.
pub trait SessionStore {
    /// Appends a START or RESUME event and opens its interval.
    fn record_open(&mut self, event: &NewEvent<'_>, interval: &NewInterval<'_>)
    -> Result<(), StoreError>;

    /// Closes the open interval, slices it into days of `zone`, and appends
    /// the accompanying PAUSE or STOP event.
    fn record_close<Tz: TimeZone>(
        &mut self,
        event: &NewEvent<'_>,
        close: &IntervalClose<'_>,
        zone: &Tz,
    ) -> Result<(), StoreError>;

    /// Appends an event that has no interval change (STOP while paused).
    fn record_event(&mut self, event: &NewEvent<'_>) -> Result<(), StoreError>;

    /// Most recently opened interval without an end, across all sessions.
    fn latest_open_interval(&self) -> Result<Option<OpenInterval>, StoreError>;

    /// Most recently appended event.
    fn latest_event(&self) -> Result<Option<LastEvent>, StoreError>;

    /// Number of intervals ever opened for `session_id`.
    fn interval_count(&self, session_id: &SessionId) -> Result<u32, StoreError>;
}
