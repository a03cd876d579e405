//! Planning: level policy, large-blob budget, small-file inventory.
//!
//! Everything in here is pure. Plans are computed once per run and handed to
//! [`crate::tree`] for materialization.

pub mod budget;
pub mod policy;
pub mod small_files;

#[cfg(test)]
mod test_properties;
