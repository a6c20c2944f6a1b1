//! Internal utilities shared across pipeline stages.

pub mod fs_utils;
