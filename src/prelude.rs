//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use netrepo_synth::prelude::*;
//! ```

// Core
pub use crate::core::config::{Caps, Config};
pub use crate::core::errors::{NrsError, Result};

// Planning
pub use crate::plan::budget::{BlobAssignment, BudgetPlan, RandomSizes, SizeSource, plan};
pub use crate::plan::policy::{JsonPlanParams, ScaleLevel, SizePolicy, resolve};
pub use crate::plan::small_files::{SmallFileKind, SmallFilePlan, plan_small_files};

// Materialization
pub use crate::tree::builder::{BuildOptions, BuildReport, CreatedFile, TreeBuilder};

// Reporting
pub use crate::report::summary::RunSummary;
