//! Settings command for display preferences.

use std::io::Write;

use anyhow::Result;
use tc_db::{Database, EXACT_DURATIONS};

pub fn show<W: Write>(writer: &mut W, db: &Database) -> Result<()> {
    let exact = !db.round_to_nearest_minute()?;
    writeln!(writer, "{EXACT_DURATIONS} = {exact}")?;
    Ok(())
}

pub fn set_exact_durations<W: Write>(writer: &mut W, db: &mut Database, enabled: bool) -> Result<()> {
    db.set_setting(EXACT_DURATIONS, &enabled.to_string())?;
    show(writer, db)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggles_exact_durations() {
        let mut db = Database::open_in_memory().unwrap();

        let mut output = Vec::new();
        show(&mut output, &db).unwrap();
        assert_eq!(String::from_utf8(output).unwrap(), "exact_durations = false\n");

        let mut output = Vec::new();
        set_exact_durations(&mut output, &mut db, true).unwrap();
        assert_eq!(String::from_utf8(output).unwrap(), "exact_durations = true\n");
        assert!(!db.round_to_nearest_minute().unwrap());
    }
}
