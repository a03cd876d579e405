//! Property-based tests for budget planner invariants.
//!
//! Uses `proptest` to check that arbitrary caps, presets and JSON parameters
//! either fail fast as infeasible or produce a plan that respects the
//! per-file cap and the total budget.

use proptest::prelude::*;

use super::budget::{BudgetPlan, RandomSizes, SizeSource, plan};
use super::policy::{JsonPlanParams, ScaleLevel};
use crate::core::config::Caps;
use crate::core::errors::NrsError;

// ──────────────────── strategies ────────────────────

fn arb_caps() -> impl Strategy<Value = Caps> {
    (1u64..=200, 1u64..=2_000, 0u64..=600).prop_map(
        |(max_single_mb, total_budget_mb, small_headroom_mb)| Caps {
            max_single_mb,
            total_budget_mb,
            small_headroom_mb,
        },
    )
}

fn arb_preset() -> impl Strategy<Value = [u64; 3]> {
    prop::array::uniform3(0u64..=150)
}

fn arb_json() -> impl Strategy<Value = JsonPlanParams> {
    (0u32..=50, 1u64..=40, 0u64..=60).prop_map(|(target_count, min_mb, spread)| {
        JsonPlanParams::new(target_count, min_mb, min_mb + spread)
    })
}

/// Always draws the upper bound.
struct Ceiling;

impl SizeSource for Ceiling {
    fn draw(&mut self, _min: u64, max: u64) -> u64 {
        max
    }
}

fn clamped_total(caps: &Caps, preset: [u64; 3]) -> u64 {
    preset.iter().map(|mb| (*mb).min(caps.max_single_mb)).sum()
}

fn assert_plan_invariants(
    plan: &BudgetPlan,
    caps: &Caps,
    json: JsonPlanParams,
) -> Result<(), TestCaseError> {
    prop_assert_eq!(plan.csv().count(), 3);
    prop_assert!(plan.json().count() <= json.target_count as usize);
    for blob in &plan.assignments {
        prop_assert!(blob.size_mb <= caps.max_single_mb, "{:?}", blob);
    }
    for blob in plan.json() {
        prop_assert!(blob.size_mb >= json.min_mb, "{:?}", blob);
    }
    prop_assert!(plan.planned_total_mb() <= caps.total_budget_mb);
    Ok(())
}

// ──────────────────── properties ────────────────────

proptest! {
    #[test]
    fn feasible_inputs_plan_within_caps(
        caps in arb_caps(),
        preset in arb_preset(),
        json in arb_json(),
        seed in any::<u64>(),
    ) {
        let result = plan(&caps, preset, json, &mut RandomSizes::seeded(seed));
        if clamped_total(&caps, preset) < caps.total_budget_mb {
            let plan = result.expect("feasible inputs must plan");
            assert_plan_invariants(&plan, &caps, json)?;
        } else {
            let is_infeasible = matches!(result, Err(NrsError::InfeasibleBudget { .. }));
            prop_assert!(is_infeasible);
        }
    }

    #[test]
    fn json_indices_are_sequential_from_one(
        caps in arb_caps(),
        preset in arb_preset(),
        json in arb_json(),
        seed in any::<u64>(),
    ) {
        if let Ok(plan) = plan(&caps, preset, json, &mut RandomSizes::seeded(seed)) {
            let names: Vec<String> = plan.json().map(|a| a.file_name()).collect();
            for (i, name) in names.iter().enumerate() {
                let prefix = format!("data_{}_", i + 1);
                prop_assert!(name.starts_with(&prefix), "{} vs {}", name, prefix);
            }
        }
    }

    #[test]
    fn headroom_covering_remainder_yields_no_json(
        caps in arb_caps(),
        preset in arb_preset(),
        json in arb_json(),
        extra in 0u64..=100,
        seed in any::<u64>(),
    ) {
        let csv_total = clamped_total(&caps, preset);
        prop_assume!(csv_total < caps.total_budget_mb);
        let caps = Caps {
            small_headroom_mb: caps.total_budget_mb - csv_total + extra,
            ..caps
        };
        let plan = plan(&caps, preset, json, &mut RandomSizes::seeded(seed)).unwrap();
        prop_assert_eq!(plan.json().count(), 0);
        prop_assert_eq!(plan.planned_total_mb(), caps.total_budget_mb);
    }

    #[test]
    fn shrinking_budget_never_adds_fixed_size_blobs(
        caps in arb_caps(),
        preset in arb_preset(),
        target in 0u32..=50,
        size in 1u64..=40,
        cut in 1u64..=500,
        seed in any::<u64>(),
    ) {
        let json = JsonPlanParams::new(target, size, size);
        let smaller = Caps {
            total_budget_mb: caps.total_budget_mb.saturating_sub(cut).max(1),
            ..caps
        };
        let big = plan(&caps, preset, json, &mut RandomSizes::seeded(seed));
        let small = plan(&smaller, preset, json, &mut RandomSizes::seeded(seed));
        if let (Ok(big), Ok(small)) = (big, small) {
            prop_assert!(small.json().count() <= big.json().count());
        }
    }

    #[test]
    fn shrinking_budget_never_adds_ceiling_blobs(
        caps in arb_caps(),
        preset in arb_preset(),
        json in arb_json(),
        cut in 1u64..=500,
    ) {
        let smaller = Caps {
            total_budget_mb: caps.total_budget_mb.saturating_sub(cut).max(1),
            ..caps
        };
        if let (Ok(big), Ok(small)) = (
            plan(&caps, preset, json, &mut Ceiling),
            plan(&smaller, preset, json, &mut Ceiling),
        ) {
            prop_assert!(small.json().count() <= big.json().count());
        }
    }

    #[test]
    fn level_presets_plan_under_default_caps(
        level in prop::sample::select(ScaleLevel::ALL.to_vec()),
        seed in any::<u64>(),
    ) {
        let policy = level.policy();
        let caps = Caps::default();
        let plan = plan(&caps, policy.csv_preset, policy.json, &mut RandomSizes::seeded(seed))
            .expect("every level fits the default caps");
        assert_plan_invariants(&plan, &caps, policy.json)?;
    }
}
