//! Budget planner: decides which large blobs to create and how big each may be.
//!
//! The planner clamps the level presets to the per-file cap, rejects budgets
//! the CSV blobs alone cannot fit into, then draws JSON blob sizes greedily
//! until either the target count is reached or the remaining budget drops
//! below the minimum blob size. Running out of budget is not an error: the
//! plan simply carries fewer JSON blobs.
//!
//! All sizes here are whole MB. Nothing in this module touches the
//! filesystem.

#![allow(missing_docs)]

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::core::config::Caps;
use crate::core::errors::{NrsError, Result};
use crate::plan::policy::JsonPlanParams;

/// Bytes in one MB. Small-file sizes and headroom are always measured in it.
pub const MB: u64 = 1024 * 1024;

// ──────────────────── size source ────────────────────

/// Source of uniformly distributed sizes, injected so plans are reproducible.
pub trait SizeSource {
    /// Draw a value in `min..=max`. Callers guarantee `min <= max`.
    fn draw(&mut self, min: u64, max: u64) -> u64;
}

/// [`SizeSource`] backed by any `rand` generator.
#[derive(Debug, Clone)]
pub struct RandomSizes<R> {
    rng: R,
}

impl<R: Rng> RandomSizes<R> {
    pub const fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl RandomSizes<StdRng> {
    /// Deterministic source for a given seed.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> SizeSource for RandomSizes<R> {
    fn draw(&mut self, min: u64, max: u64) -> u64 {
        self.rng.random_range(min..=max)
    }
}

// ──────────────────── plan model ────────────────────

/// The three fixed CSV blobs, in emission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CsvBlob {
    Devices,
    Links,
    Sites,
}

impl CsvBlob {
    pub const ALL: [Self; 3] = [Self::Devices, Self::Links, Self::Sites];

    #[must_use]
    pub const fn stem(self) -> &'static str {
        match self {
            Self::Devices => "devices",
            Self::Links => "links",
            Self::Sites => "sites",
        }
    }
}

/// What a large-blob assignment is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlobKind {
    Csv { table: CsvBlob },
    /// `index` is 1-based and sequential.
    Json { index: u32 },
}

/// One large file the tree builder must create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BlobAssignment {
    pub kind: BlobKind,
    pub size_mb: u64,
}

impl BlobAssignment {
    /// File name embedding the size, e.g. `links_30MB.csv` or `data_3_17MB.json`.
    #[must_use]
    pub fn file_name(&self) -> String {
        match self.kind {
            BlobKind::Csv { table } => format!("{}_{}MB.csv", table.stem(), self.size_mb),
            BlobKind::Json { index } => format!("data_{index}_{}MB.json", self.size_mb),
        }
    }

    #[must_use]
    pub const fn is_csv(&self) -> bool {
        matches!(self.kind, BlobKind::Csv { .. })
    }
}

/// Output of [`plan`]: three CSV assignments followed by zero or more JSON ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BudgetPlan {
    pub caps: Caps,
    pub assignments: Vec<BlobAssignment>,
    /// JSON blobs the level asked for; `json().count()` may be lower.
    pub json_target: u32,
}

impl BudgetPlan {
    pub fn csv(&self) -> impl Iterator<Item = &BlobAssignment> {
        self.assignments.iter().filter(|a| a.is_csv())
    }

    pub fn json(&self) -> impl Iterator<Item = &BlobAssignment> {
        self.assignments.iter().filter(|a| !a.is_csv())
    }

    #[must_use]
    pub fn csv_total_mb(&self) -> u64 {
        self.csv().fold(0, |acc, a| acc.saturating_add(a.size_mb))
    }

    #[must_use]
    pub fn json_total_mb(&self) -> u64 {
        self.json().fold(0, |acc, a| acc.saturating_add(a.size_mb))
    }

    /// Headroom actually held back for small files.
    ///
    /// When the configured headroom is larger than what the CSV blobs leave
    /// over, only the leftover is reserved; see [`BudgetPlan::headroom_overrun`].
    #[must_use]
    pub fn reserved_headroom_mb(&self) -> u64 {
        self.caps
            .small_headroom_mb
            .min(self.caps.total_budget_mb.saturating_sub(self.csv_total_mb()))
    }

    /// True when the configured headroom did not fit after the CSV blobs.
    #[must_use]
    pub fn headroom_overrun(&self) -> bool {
        self.reserved_headroom_mb() < self.caps.small_headroom_mb
    }

    /// Large blobs plus the reserved small-file headroom. Saturates at `u64::MAX`.
    #[must_use]
    pub fn planned_total_mb(&self) -> u64 {
        self.csv_total_mb()
            .saturating_add(self.reserved_headroom_mb())
            .saturating_add(self.json_total_mb())
    }

    /// Budget left unallocated once the plan is materialized.
    #[must_use]
    pub fn unused_mb(&self) -> u64 {
        self.caps
            .total_budget_mb
            .saturating_sub(self.planned_total_mb())
    }

    /// True when the budget ran out before the JSON target was met.
    #[must_use]
    pub fn json_short(&self) -> bool {
        self.json().count() < self.json_target as usize
    }
}

// ──────────────────── planner ────────────────────

/// Compute the large-blob plan for the given caps and level parameters.
pub fn plan<S>(
    caps: &Caps,
    csv_preset: [u64; 3],
    json: JsonPlanParams,
    sizes: &mut S,
) -> Result<BudgetPlan>
where
    S: SizeSource + ?Sized,
{
    let cap = caps.max_single_mb;
    let csv_sizes = csv_preset.map(|mb| mb.min(cap));
    let json_max = json.max_mb.min(cap);
    // A zero-sized blob is never useful and would never drain `remaining`.
    let json_min = json.min_mb.max(1);

    let csv_total = csv_sizes.iter().fold(0u64, |acc, mb| acc.saturating_add(*mb));
    if csv_total >= caps.total_budget_mb {
        return Err(NrsError::InfeasibleBudget {
            csv_sizes,
            csv_total,
            total_budget: caps.total_budget_mb,
        });
    }

    // Headroom overrun leaves nothing for JSON rather than failing.
    let mut remaining = caps
        .total_budget_mb
        .saturating_sub(csv_total)
        .saturating_sub(caps.small_headroom_mb);

    let mut assignments: Vec<BlobAssignment> = CsvBlob::ALL
        .iter()
        .zip(csv_sizes)
        .map(|(&table, size_mb)| BlobAssignment {
            kind: BlobKind::Csv { table },
            size_mb,
        })
        .collect();

    for index in 1..=json.target_count {
        if remaining < json_min {
            break;
        }
        let max_allowed = json_max.min(remaining);
        if max_allowed < json_min {
            break;
        }
        let size_mb = sizes.draw(json_min, max_allowed).min(cap);
        assignments.push(BlobAssignment {
            kind: BlobKind::Json { index },
            size_mb,
        });
        remaining = remaining.saturating_sub(size_mb);
    }

    let plan = BudgetPlan {
        caps: *caps,
        assignments,
        json_target: json.target_count,
    };
    check_plan(&plan)?;
    Ok(plan)
}

/// Post-plan assertion: per-file cap and total budget both hold.
pub fn check_plan(plan: &BudgetPlan) -> Result<()> {
    let caps = &plan.caps;
    if let Some(big) = plan
        .assignments
        .iter()
        .find(|a| a.size_mb > caps.max_single_mb)
    {
        return Err(NrsError::PlanInvariant {
            details: format!(
                "{} is {}MB, above MAX_SINGLE_MB={}MB",
                big.file_name(),
                big.size_mb,
                caps.max_single_mb
            ),
        });
    }

    let exact = plan
        .assignments
        .iter()
        .try_fold(plan.reserved_headroom_mb(), |acc, a| acc.checked_add(a.size_mb));
    let Some(planned) = exact else {
        return Err(NrsError::PlanInvariant {
            details: format!(
                "planned total overflows u64 MB against TOTAL_BUDGET_MB={}MB",
                caps.total_budget_mb
            ),
        });
    };
    if planned > caps.total_budget_mb {
        return Err(NrsError::PlanInvariant {
            details: format!(
                "planned total {planned}MB (csv {}MB + headroom {}MB + json {}MB) \
                 exceeds TOTAL_BUDGET_MB={}MB",
                plan.csv_total_mb(),
                plan.reserved_headroom_mb(),
                plan.json_total_mb(),
                caps.total_budget_mb
            ),
        });
    }
    Ok(())
}
