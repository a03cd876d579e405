//! Materialization: turn plans into directories and files.

pub mod builder;
pub mod content;
