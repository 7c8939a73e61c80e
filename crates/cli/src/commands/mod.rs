//! CLI subcommand implementations

pub mod dataset;
pub mod info;
pub mod predict;
