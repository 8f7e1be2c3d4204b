//! Aggregations over the day-sliced table.
//!
//! Date bounds are inclusive and compared as `YYYY-MM-DD` strings, which sort
//! the same way as the dates they name.

use chrono::NaiveDate;
use serde::Serialize;

use crate::{Database, DbError};

/// Total time recorded for one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryTotal {
    pub category: String,
    pub total_seconds: i64,
}

fn date_bound(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

impl Database {
    /// Sums day slices in `[from, to]` per category, largest total first.
    pub fn totals_by_category(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<CategoryTotal>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT category, SUM(duration_seconds) AS total_seconds
            FROM interval_days
            WHERE date_local >= ? AND date_local <= ?
            GROUP BY category
            ORDER BY total_seconds DESC, category ASC
            ",
        )?;
        let rows = stmt.query_map([date_bound(from), date_bound(to)], |row| {
            Ok(CategoryTotal {
                category: row.get(0)?,
                total_seconds: row.get(1)?,
            })
        })?;
        let mut totals = Vec::new();
        for row in rows {
            totals.push(row?);
        }
        Ok(totals)
    }

    /// Distinct local dates in `[from, to]` with any recorded work, ascending.
    pub fn presence_days(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<NaiveDate>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT DISTINCT date_local
            FROM interval_days
            WHERE date_local >= ? AND date_local <= ? AND duration_seconds > 0
            ORDER BY date_local ASC
            ",
        )?;
        let rows = stmt.query_map([date_bound(from), date_bound(to)], |row| {
            row.get::<_, String>(0)
        })?;
        let mut days = Vec::new();
        for row in rows {
            let date = row?;
            let parsed = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                .map_err(|source| DbError::DateParse { date, source })?;
            days.push(parsed);
        }
        Ok(days)
    }
}
