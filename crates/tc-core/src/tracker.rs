//! Session state machine.
//!
//! A [`Tracker`] is the in-memory authority for the current session. Every
//! transition is validated against the current state, written to the
//! [`SessionStore`] as one atomic unit, and only then applied in memory, so
//! memory never runs ahead of the durable log.
//!
//! ```text
//! Stopped --start--> InProgress --pause--> Paused --start--> InProgress
//!    ^                   |                    |
//!    +-------stop--------+--------stop--------+
//! ```
//!
//! # Thread Safety
//!
//! All operations, including [`Tracker::elapsed`], take one mutex that guards
//! both the session fields and the store. A `Tracker` is `Sync` whenever its
//! store is `Send`.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Local, TimeZone, Timelike, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::action::Action;
use crate::store::{IntervalClose, LastEvent, NewEvent, NewInterval, SessionStore, StoreError};
use crate::types::{SessionId, SessionState, ValidationError};

/// Errors returned by state machine operations.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// The operation is not allowed in the current state.
    #[error("cannot {attempted} while {state}")]
    InvalidTransition {
        state: SessionState,
        attempted: &'static str,
    },
    /// An argument failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The store had no open interval to close.
    #[error("no open interval for session {session_id}")]
    NoOpenInterval { session_id: String },
    /// The store failed to read or write.
    #[error("persistence failure: {0}")]
    Persistence(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl From<StoreError> for TrackerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NoOpenInterval { session_id } => Self::NoOpenInterval { session_id },
            StoreError::Backend(source) => Self::Persistence(source),
        }
    }
}

/// Consistent copy of the session fields, for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub state: SessionState,
    pub session_id: Option<SessionId>,
    pub category: String,
    pub description: String,
    pub interval_index: u32,
    pub interval_start: Option<DateTime<Utc>>,
    pub round_to_nearest_minute: bool,
}

#[derive(Debug, Clone)]
struct ActiveSession {
    id: SessionId,
    category: String,
    description: String,
    interval_index: u32,
}

#[derive(Debug, Clone)]
enum Phase {
    Stopped,
    InProgress {
        session: ActiveSession,
        since: DateTime<Utc>,
    },
    Paused {
        session: ActiveSession,
    },
}

impl Phase {
    const fn state(&self) -> SessionState {
        match self {
            Self::Stopped => SessionState::Stopped,
            Self::InProgress { .. } => SessionState::InProgress,
            Self::Paused { .. } => SessionState::Paused,
        }
    }
}

struct Inner<S> {
    store: S,
    phase: Phase,
    round_to_nearest_minute: bool,
}

impl<S> Inner<S> {
    fn snapshot(&self) -> Snapshot {
        let (session, since) = match &self.phase {
            Phase::Stopped => (None, None),
            Phase::InProgress { session, since } => (Some(session), Some(*since)),
            Phase::Paused { session } => (Some(session), None),
        };
        Snapshot {
            state: self.phase.state(),
            session_id: session.map(|s| s.id.clone()),
            category: session.map(|s| s.category.clone()).unwrap_or_default(),
            description: session.map(|s| s.description.clone()).unwrap_or_default(),
            interval_index: session.map_or(0, |s| s.interval_index),
            interval_start: since,
            round_to_nearest_minute: self.round_to_nearest_minute,
        }
    }

    fn invalid(&self, attempted: &'static str) -> TrackerError {
        TrackerError::InvalidTransition {
            state: self.phase.state(),
            attempted,
        }
    }
}

/// Session state machine over a [`SessionStore`].
///
/// Intervals are sliced into days of `Tz`, the local zone by default.
pub struct Tracker<S, Tz: TimeZone = Local> {
    inner: Mutex<Inner<S>>,
    zone: Tz,
}

impl<S: SessionStore> Tracker<S, Local> {
    /// Creates a tracker slicing days in the system's local time zone and
    /// restores it from `store`.
    pub fn open(store: S) -> Result<Self, TrackerError> {
        Self::open_in_zone(store, Local)
    }
}

impl<S: SessionStore, Tz: TimeZone> Tracker<S, Tz> {
    /// Creates a stopped tracker without reading the store.
    pub fn new(store: S, zone: Tz) -> Self {
        Self {
            inner: Mutex::new(Inner {
                store,
                phase: Phase::Stopped,
                round_to_nearest_minute: true,
            }),
            zone,
        }
    }

    /// Creates a tracker and restores it from `store`.
    pub fn open_in_zone(store: S, zone: Tz) -> Result<Self, TrackerError> {
        let tracker = Self::new(store, zone);
        tracker.restore()?;
        Ok(tracker)
    }

    fn lock(&self) -> MutexGuard<'_, Inner<S>> {
        // Memory is only mutated after a successful write, so a poisoned
        // guard still holds a consistent state.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Rebuilds the in-memory state from the store. Never writes.
    ///
    /// An open interval means the last run ended while work was in progress.
    /// Otherwise a trailing PAUSE event means the session is paused, and
    /// anything else leaves the tracker stopped.
    pub fn restore(&self) -> Result<Snapshot, TrackerError> {
        let mut guard = self.lock();
        let inner = &mut *guard;

        let phase = if let Some(open) = inner.store.latest_open_interval()? {
            Phase::InProgress {
                session: ActiveSession {
                    id: open.session_id,
                    category: open.category,
                    description: open.description,
                    interval_index: open.index,
                },
                since: open.start,
            }
        } else {
            match inner.store.latest_event()? {
                Some(LastEvent {
                    action: Action::Pause,
                    session_id,
                    category,
                    description,
                    ..
                }) => {
                    // The next resume opens interval number `count`.
                    let count = inner.store.interval_count(&session_id)?;
                    Phase::Paused {
                        session: ActiveSession {
                            id: session_id,
                            category,
                            description,
                            interval_index: count.saturating_sub(1),
                        },
                    }
                }
                Some(LastEvent {
                    action: Action::Start | Action::Resume | Action::Stop,
                    ..
                })
                | None => Phase::Stopped,
            }
        };

        inner.phase = phase;
        let snapshot = inner.snapshot();
        tracing::info!(
            state = %snapshot.state,
            session_id = snapshot.session_id.as_ref().map(SessionId::as_str),
            interval_index = snapshot.interval_index,
            "restored session state"
        );
        Ok(snapshot)
    }

    /// Starts a new session when stopped, or resumes when paused.
    pub fn start(&self, description: &str, category: &str) -> Result<Snapshot, TrackerError> {
        self.start_at(Utc::now(), description, category)
    }

    /// [`Tracker::start`] at an explicit instant.
    pub fn start_at(
        &self,
        now: DateTime<Utc>,
        description: &str,
        category: &str,
    ) -> Result<Snapshot, TrackerError> {
        let now = whole_seconds(now);
        let mut guard = self.lock();
        let inner = &mut *guard;

        let (session, action) = match &inner.phase {
            Phase::Stopped => {
                let category = category.trim();
                if category.is_empty() {
                    return Err(ValidationError::Empty { field: "category" }.into());
                }
                let session = ActiveSession {
                    id: SessionId::generate(),
                    category: category.to_string(),
                    description: description.to_string(),
                    interval_index: 0,
                };
                (session, Action::Start)
            }
            Phase::Paused { session } => {
                let mut session = session.clone();
                session.interval_index += 1;
                (session, Action::Resume)
            }
            Phase::InProgress { .. } => return Err(inner.invalid("start")),
        };

        let event = NewEvent {
            session_id: &session.id,
            timestamp: now,
            action,
            category: &session.category,
            description: &session.description,
        };
        let interval = NewInterval {
            session_id: &session.id,
            index: session.interval_index,
            start: now,
            category: &session.category,
            description: &session.description,
        };
        inner.store.record_open(&event, &interval)?;

        tracing::debug!(
            session_id = %session.id,
            interval_index = session.interval_index,
            %action,
            "opened interval"
        );
        inner.phase = Phase::InProgress {
            session,
            since: now,
        };
        Ok(inner.snapshot())
    }

    /// Closes the running interval and pauses the session.
    pub fn pause(&self) -> Result<Snapshot, TrackerError> {
        self.pause_at(Utc::now())
    }

    /// [`Tracker::pause`] at an explicit instant.
    pub fn pause_at(&self, now: DateTime<Utc>) -> Result<Snapshot, TrackerError> {
        let now = whole_seconds(now);
        let mut guard = self.lock();
        let inner = &mut *guard;

        let Phase::InProgress { session, since } = &inner.phase else {
            return Err(inner.invalid("pause"));
        };
        let event = NewEvent {
            session_id: &session.id,
            timestamp: now,
            action: Action::Pause,
            category: &session.category,
            description: &session.description,
        };
        let close = IntervalClose {
            session_id: &session.id,
            start: *since,
            end: now,
            category: &session.category,
            description: &session.description,
        };
        inner.store.record_close(&event, &close, &self.zone)?;

        tracing::debug!(session_id = %session.id, interval_index = session.interval_index, "paused");
        let session = session.clone();
        inner.phase = Phase::Paused { session };
        Ok(inner.snapshot())
    }

    /// Ends the session, closing the running interval if there is one.
    pub fn stop(&self) -> Result<Snapshot, TrackerError> {
        self.stop_at(Utc::now())
    }

    /// [`Tracker::stop`] at an explicit instant.
    pub fn stop_at(&self, now: DateTime<Utc>) -> Result<Snapshot, TrackerError> {
        let now = whole_seconds(now);
        let mut guard = self.lock();
        let inner = &mut *guard;

        let (session, since) = match &inner.phase {
            Phase::Stopped => return Err(inner.invalid("stop")),
            Phase::InProgress { session, since } => (session, Some(*since)),
            Phase::Paused { session } => (session, None),
        };
        let event = NewEvent {
            session_id: &session.id,
            timestamp: now,
            action: Action::Stop,
            category: &session.category,
            description: &session.description,
        };
        match since {
            Some(start) => {
                let close = IntervalClose {
                    session_id: &session.id,
                    start,
                    end: now,
                    category: &session.category,
                    description: &session.description,
                };
                inner.store.record_close(&event, &close, &self.zone)?;
            }
            None => inner.store.record_event(&event)?,
        }

        tracing::debug!(session_id = %session.id, "stopped");
        inner.phase = Phase::Stopped;
        Ok(inner.snapshot())
    }

    /// Time since the running interval started, or zero unless in progress.
    pub fn elapsed(&self) -> Duration {
        self.elapsed_at(Utc::now())
    }

    /// [`Tracker::elapsed`] at an explicit instant.
    pub fn elapsed_at(&self, now: DateTime<Utc>) -> Duration {
        match &self.lock().phase {
            Phase::InProgress { since, .. } => (now - *since).max(Duration::zero()),
            Phase::Stopped | Phase::Paused { .. } => Duration::zero(),
        }
    }

    /// Current session fields.
    pub fn snapshot(&self) -> Snapshot {
        self.lock().snapshot()
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.lock().phase.state()
    }

    /// Sets the display preference for rounding durations.
    pub fn set_round_to_nearest_minute(&self, round: bool) {
        self.lock().round_to_nearest_minute = round;
    }

    /// Runs `f` with shared access to the store, under the tracker lock.
    pub fn with_store<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&self.lock().store)
    }

    /// Consumes the tracker and returns its store.
    pub fn into_store(self) -> S {
        self.inner
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .store
    }
}

fn whole_seconds(instant: DateTime<Utc>) -> DateTime<Utc> {
    instant.with_nanosecond(0).unwrap_or(instant)
}
