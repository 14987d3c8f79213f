//! Subcommand implementations

pub mod model;
pub mod samples;
pub mod status;
