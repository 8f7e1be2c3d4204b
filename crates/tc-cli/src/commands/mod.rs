//! CLI subcommand implementations.

pub mod log;
pub mod report;
pub mod settings;
pub mod status;
pub mod track;
pub mod util;
