//! Human and JSON run summaries.

pub mod summary;
