//! Report command for totals per category over a local date range.
//!
//! Output lists per-category totals (largest first) followed by the dates
//! that have any recorded work, either human-readable or as JSON.

use std::io::Write;

use anyhow::Result;
use chrono::NaiveDate;
use serde::Serialize;
use tc_db::{CategoryTotal, Database};

use super::util::{format_duration, parse_date};

/// Computed report data.
#[derive(Debug, Serialize)]
pub struct ReportData {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub totals: Vec<CategoryTotal>,
    pub presence_days: Vec<NaiveDate>,
}

/// Queries totals and presence days for `[from, to]`.
pub fn generate_report_data(db: &Database, from: NaiveDate, to: NaiveDate) -> Result<ReportData> {
    Ok(ReportData {
        from,
        to,
        totals: db.totals_by_category(from, to)?,
        presence_days: db.presence_days(from, to)?,
    })
}

pub fn run<W: Write>(
    writer: &mut W,
    db: &Database,
    from: &str,
    to: &str,
    json: bool,
    round_to_nearest_minute: bool,
) -> Result<()> {
    let from = parse_date(from)?;
    let to = parse_date(to)?;
    let data = generate_report_data(db, from, to)?;

    if json {
        serde_json::to_writer_pretty(&mut *writer, &data)?;
        writeln!(writer)?;
    } else {
        write_human(writer, &data, round_to_nearest_minute)?;
    }
    Ok(())
}

fn write_human<W: Write>(writer: &mut W, data: &ReportData, round: bool) -> Result<()> {
    writeln!(writer, "Totals {} to {}", data.from, data.to)?;
    if data.totals.is_empty() {
        writeln!(writer, "  (No results)")?;
    }
    for total in &data.totals {
        writeln!(
            writer,
            "  {:<14} : {}",
            total.category,
            format_duration(total.total_seconds, round)
        )?;
    }

    writeln!(writer, "Days with any work:")?;
    if data.presence_days.is_empty() {
        writeln!(writer, "  (none)")?;
    }
    for day in &data.presence_days {
        writeln!(writer, "  {day}")?;
    }
    Ok(())
}
