//! CLI subcommands

pub mod pods;
pub mod recommend;
pub mod status;
