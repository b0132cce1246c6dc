//! CLI subcommands.

pub mod catalog;
pub mod orders;
pub mod seed;
