//! Status command for showing the current session.

use std::io::Write;

use anyhow::Result;
use chrono::{Duration, TimeZone};
use tc_core::{SessionState, Snapshot, Tracker};
use tc_db::Database;

use super::util::format_duration;

pub fn run<W: Write, Tz: TimeZone>(writer: &mut W, tracker: &Tracker<Database, Tz>) -> Result<()> {
    let snapshot = tracker.snapshot();
    let elapsed = tracker.elapsed();
    render(writer, &snapshot, elapsed)
}

fn render<W: Write>(writer: &mut W, snapshot: &Snapshot, elapsed: Duration) -> Result<()> {
    writeln!(writer, "State: {}", snapshot.state)?;
    if snapshot.state == SessionState::Stopped {
        return Ok(());
    }

    if let Some(session_id) = &snapshot.session_id {
        writeln!(writer, "Session: {session_id}")?;
    }
    writeln!(writer, "Category: {}", snapshot.category)?;
    if !snapshot.description.is_empty() {
        writeln!(writer, "Description: {}", snapshot.description)?;
    }
    writeln!(writer, "Interval: {}", snapshot.interval_index)?;
    if snapshot.state == SessionState::InProgress {
        writeln!(
            writer,
            "Elapsed: {}",
            format_duration(elapsed.num_seconds(), snapshot.round_to_nearest_minute)
        )?;
    }
    Ok(())
}
