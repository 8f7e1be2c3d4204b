//! Session transition commands: start, resume, pause, stop.

use std::io::Write;

use anyhow::Result;
use chrono::TimeZone;
use tc_core::{SessionState, Tracker};
use tc_db::Database;

use super::util::format_duration;

/// Starts a new session, or resumes when paused.
pub fn start<W: Write, Tz: TimeZone>(
    writer: &mut W,
    tracker: &Tracker<Database, Tz>,
    category: Option<&str>,
    description: &str,
) -> Result<()> {
    let was = tracker.state();
    let snapshot = tracker.start(description, category.unwrap_or_default())?;
    if was == SessionState::Paused {
        writeln!(
            writer,
            "Resumed {} (interval {})",
            snapshot.category, snapshot.interval_index
        )?;
    } else {
        writeln!(writer, "Started {}", snapshot.category)?;
    }
    if !snapshot.description.is_empty() {
        writeln!(writer, "Description: {}", snapshot.description)?;
    }
    Ok(())
}

/// Resumes a paused session.
pub fn resume<W: Write, Tz: TimeZone>(writer: &mut W, tracker: &Tracker<Database, Tz>) -> Result<()> {
    let state = tracker.state();
    if state != SessionState::Paused {
        anyhow::bail!("cannot resume while {state}");
    }
    start(writer, tracker, None, "")
}

/// Pauses the running session.
pub fn pause<W: Write, Tz: TimeZone>(writer: &mut W, tracker: &Tracker<Database, Tz>) -> Result<()> {
    let worked = tracker.elapsed();
    let snapshot = tracker.pause()?;
    writeln!(
        writer,
        "Paused {} after {}",
        snapshot.category,
        format_duration(worked.num_seconds(), snapshot.round_to_nearest_minute)
    )?;
    Ok(())
}

/// Stops the current session.
pub fn stop<W: Write, Tz: TimeZone>(writer: &mut W, tracker: &Tracker<Database, Tz>) -> Result<()> {
    let before = tracker.snapshot();
    tracker.stop()?;
    writeln!(writer, "Stopped {}", before.category)?;
    Ok(())
}
