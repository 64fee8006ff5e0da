//! Command-line argument parsing.

pub mod args;

pub use args::Cli;
