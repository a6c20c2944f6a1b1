//! Build stage: extract the archive, patch manifests, run the build.

pub mod command;
pub mod extract;
pub mod manifest;
