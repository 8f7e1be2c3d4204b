//! Key/value preferences stored alongside the tracking data.

use rusqlite::{OptionalExtension, params};

use crate::{Database, DbError};

/// When `"true"`, durations are shown to the second instead of rounded to
/// the nearest minute.
pub const EXACT_DURATIONS: &str = "exact_durations";

impl Database {
    /// Reads a setting, if it has been set.
    pub fn get_setting(&self, key: &str) -> Result<Option<String>, DbError> {
        Ok(self
            .conn
            .query_row("SELECT value FROM settings WHERE key = ?", [key], |row| {
                row.get(0)
            })
            .optional()?)
    }

    /// Writes a setting, replacing any previous value.
    pub fn set_setting(&mut self, key: &str, value: &str) -> Result<(), DbError> {
        self.conn.execute(
            "
            INSERT INTO settings (key, value) VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            ",
            params![key, value],
        )?;
        tracing::debug!(key, value, "updated setting");
        Ok(())
    }

    /// Display preference derived from [`EXACT_DURATIONS`]; defaults to true.
    pub fn round_to_nearest_minute(&self) -> Result<bool, DbError> {
        Ok(self.get_setting(EXACT_DURATIONS)?.as_deref() != Some("true"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_setting_is_none() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.get_setting("scale").unwrap(), None);
    }

    #[test]
    fn set_setting_upserts() {
        let mut db = Database::open_in_memory().unwrap();
        db.set_setting("scale", "1.00").unwrap();
        db.set_setting("scale", "1.50").unwrap();
        assert_eq!(db.get_setting("scale").unwrap().as_deref(), Some("1.50"));
    }

    #[test]
    fn rounding_defaults_on_and_follows_exact_durations() {
        let mut db = Database::open_in_memory().unwrap();
        assert!(db.round_to_nearest_minute().unwrap());

        db.set_setting(EXACT_DURATIONS, "true").unwrap();
        assert!(!db.round_to_nearest_minute().unwrap());

        db.set_setting(EXACT_DURATIONS, "false").unwrap();
        assert!(db.round_to_nearest_minute().unwrap());
    }
}
