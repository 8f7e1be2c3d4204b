//! Log command for listing recent state changes.

use std::io::Write;

use anyhow::Result;
use chrono::{Local, TimeZone};
use tc_db::{Database, EventRecord};

use super::util::truncate;

pub fn run<W: Write>(writer: &mut W, db: &Database, limit: usize) -> Result<()> {
    let events = db.recent_events(limit)?;
    render(writer, &events, &Local)
}

fn render<W: Write, Tz: TimeZone>(writer: &mut W, events: &[EventRecord], zone: &Tz) -> Result<()>
where
    Tz::Offset: std::fmt::Display,
{
    if events.is_empty() {
        writeln!(writer, "No events recorded.")?;
        return Ok(());
    }
    for event in events {
        let when = event.timestamp.with_timezone(zone);
        writeln!(
            writer,
            "{}  {:<6}  {}  {}",
            when.format("%Y-%m-%d %H:%M:%S"),
            event.action,
            event.category,
            truncate(&event.description, 30)
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{DateTime, FixedOffset, Utc};
    use insta::assert_snapshot;
    use tc_core::{Action, SessionId};

    fn event(id: i64, action: Action, timestamp: &str, description: &str) -> EventRecord {
        EventRecord {
            id,
            session_id: SessionId::new("sess-1").unwrap(),
            timestamp: DateTime::parse_from_rfc3339(timestamp)
                .unwrap()
                .with_timezone(&Utc),
            action,
            category: "Task".to_string(),
            description: description.to_string(),
            user_tz: None,
        }
    }

    #[test]
    fn renders_events_in_local_time() {
        let zone = FixedOffset::east_opt(3600).unwrap();
        let events = [
            event(2, Action::Pause, "2024-01-15T09:30:00Z", "write docs"),
            event(
                1,
                Action::Start,
                "2024-01-15T09:00:00Z",
                "a description that is far too long to fit",
            ),
        ];
        let mut output = Vec::new();
        render(&mut output, &events, &zone).unwrap();
        assert_snapshot!(String::from_utf8(output).unwrap(), @r"
        2024-01-15 10:30:00  PAUSE   Task  write docs
        2024-01-15 10:00:00  START   Task  a description that is far t...
        ");
    }

    #[test]
    fn empty_log_says_so() {
        let db = Database::open_in_memory().unwrap();
        let mut output = Vec::new();
        run(&mut output, &db, 5).unwrap();
        assert_eq!(String::from_utf8(output).unwrap(), "No events recorded.\n");
    }
}
