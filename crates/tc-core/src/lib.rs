//! Core domain logic for timeclock.
//!
//! This crate contains the fundamental types and logic for:
//! - Session actions and states
//! - Day slicing: splitting intervals at local midnight
//! - The session state machine and its storage seam

pub mod action;
pub mod slicer;
pub mod store;
pub mod tracker;
pub mod types;

pub use action::{Action, UnknownAction};
pub use slicer::{DaySpan, local_midnight_to_utc, slice_days};
pub use store::{
    IntervalClose, LastEvent, NewEvent, NewInterval, OpenInterval, SessionStore, StoreError,
};
pub use tracker::{Snapshot, Tracker, TrackerError};
pub use types::{SessionId, SessionState, ValidationError};
