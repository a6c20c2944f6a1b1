//! Core infrastructure: configuration, errors, locking and terminal output.

pub mod config;
pub mod error;
pub mod lock;
pub mod output;
