//! CLI command implementations

pub mod modes;
pub mod setup;
pub mod status;
