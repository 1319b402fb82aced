//! Subcommand implementations.

pub mod run;
pub mod schedules;
