//! Acquire stage: resolve a version, download its archive, clone consumers.

pub mod download;
pub mod git;
pub mod registry;
