//! Shared utilities.

pub mod scavenge;
pub mod text;
pub mod time;
