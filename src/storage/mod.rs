//! Document persistence: default paths and the atomic multi-destination
//! writer.

pub mod paths;
pub mod writer;
