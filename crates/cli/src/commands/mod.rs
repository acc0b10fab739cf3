//! Subcommand implementations

pub mod control;
pub mod status;
pub mod train;
