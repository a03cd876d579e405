#![forbid(unsafe_code)]

//! netrepo_synth (nrs): synthetic managed-file repository generator.
//!
//! Builds a directory tree shaped like a network-infrastructure tool's
//! managed-file repository: many small scripts, reports, templates and config
//! snippets, plus a handful of large CSV/JSON placeholder blobs. Two hard caps
//! hold for every run:
//! 1. **Per-file cap**: no generated file exceeds `MAX_SINGLE_MB`
//! 2. **Total budget**: large blobs plus small-file headroom stay within `TOTAL_BUDGET_MB`
//!
//! # Library usage
//!
//! ```rust,no_run
//! use netrepo_synth::prelude::*;
//!
//! let policy = resolve(2)?;
//! let mut sizes = RandomSizes::seeded(7);
//! let blobs = plan(&Caps::default(), policy.csv_preset, policy.json, &mut sizes)?;
//! let small = plan_small_files(&policy, &mut sizes);
//! TreeBuilder::new(BuildOptions::new("netrepo")).build(&small, &blobs, &mut |_: &CreatedFile| {})?;
//! # Ok::<(), NrsError>(())
//! ```

pub mod prelude;

pub mod core;
pub mod logger;
pub mod plan;
pub mod report;
pub mod tree;
