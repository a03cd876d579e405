//! Run summary: what was planned, what was written, and how it fits the budget.

#![allow(missing_docs)]
#![allow(clippy::cast_precision_loss)]

use std::fmt::Write as _;
use std::path::Path;

use serde_json::{Value, json};

use crate::plan::budget::{BudgetPlan, MB};
use crate::plan::policy::SizePolicy;
use crate::plan::small_files::{SmallFileKind, SmallFilePlan};
use crate::tree::builder::BuildReport;

/// Everything the reporter needs about one run.
#[derive(Debug, Clone, Copy)]
pub struct RunSummary<'a> {
    pub output_dir: &'a Path,
    pub policy: &'a SizePolicy,
    pub seed: u64,
    pub plan: &'a BudgetPlan,
    pub small: &'a SmallFilePlan,
    /// Bytes per planned MB.
    pub unit_bytes: u64,
    /// `None` for plan-only runs.
    pub build: Option<&'a BuildReport>,
}

impl RunSummary<'_> {
    /// Conditions worth surfacing that are not errors.
    #[must_use]
    pub fn warnings(&self) -> Vec<String> {
        let mut out = Vec::new();
        let caps = &self.plan.caps;
        if self.plan.headroom_overrun() {
            out.push(format!(
                "SMALL_HEADROOM_MB={}MB does not fit after {}MB of CSV blobs; \
                 only {}MB reserved and no JSON blobs planned",
                caps.small_headroom_mb,
                self.plan.csv_total_mb(),
                self.plan.reserved_headroom_mb()
            ));
        }
        if self.plan.json_short() {
            out.push(format!(
                "budget allowed {} of {} JSON blobs",
                self.plan.json().count(),
                self.plan.json_target
            ));
        }
        if self
            .small
            .exceeds_headroom(caps.small_headroom_mb)
        {
            out.push(format!(
                "small files total {}, above the {}MB headroom",
                format_bytes(self.small.total_bytes()),
                caps.small_headroom_mb
            ));
        }
        if let Some(build) = self.build {
            let budget_bytes = self.budget_bytes();
            if build.on_disk_bytes > budget_bytes {
                out.push(format!(
                    "tree is {} on disk, above the {} TOTAL_BUDGET_MB={}MB allows",
                    format_bytes(build.on_disk_bytes),
                    format_bytes(budget_bytes),
                    caps.total_budget_mb
                ));
            }
        }
        out
    }

    /// Byte ceiling of the tree as built.
    ///
    /// Blobs are written in `unit_bytes` per MB while small files keep their
    /// real size, so the reserved headroom is always counted in real MB.
    #[must_use]
    pub fn budget_bytes(&self) -> u64 {
        let reserved = self.plan.reserved_headroom_mb();
        let blob_budget = self.plan.caps.total_budget_mb.saturating_sub(reserved);
        blob_budget
            .saturating_mul(self.unit_bytes)
            .saturating_add(reserved.saturating_mul(MB))
    }

    /// Multi-line human-readable report.
    #[must_use]
    pub fn format_human(&self) -> String {
        let caps = &self.plan.caps;
        let mut out = String::new();
        let title = if self.build.is_some() {
            "Repository Generated"
        } else {
            "Repository Plan"
        };
        let _ = writeln!(out, "{title}");
        let _ = writeln!(out, "  Output:    {}", self.output_dir.display());
        let _ = writeln!(
            out,
            "  Level:     {} (count x{}, sizes {}%)",
            self.policy.level, self.policy.count_factor, self.policy.size_percent
        );
        let _ = writeln!(out, "  Seed:      {}", self.seed);
        if self.unit_bytes != MB {
            let _ = writeln!(
                out,
                "  Unit:      blobs scaled to {} bytes per MB",
                self.unit_bytes
            );
        }
        let _ = writeln!(
            out,
            "  Caps:      {}MB per file, {}MB total, {}MB small-file headroom",
            caps.max_single_mb, caps.total_budget_mb, caps.small_headroom_mb
        );

        let _ = writeln!(out, "\n  Large files");
        let _ = writeln!(out, "  {:<28}  {:>8}", "Name", "Size");
        let _ = writeln!(out, "  {}", "-".repeat(38));
        for blob in &self.plan.assignments {
            let _ = writeln!(out, "  {:<28}  {:>6}MB", blob.file_name(), blob.size_mb);
        }
        let _ = writeln!(
            out,
            "  CSV {}MB + JSON {}MB ({} of {} blobs)",
            self.plan.csv_total_mb(),
            self.plan.json_total_mb(),
            self.plan.json().count(),
            self.plan.json_target
        );

        let _ = writeln!(out, "\n  Small files");
        for kind in SmallFileKind::ALL {
            let _ = writeln!(
                out,
                "  {:<10} {:>5} files in {}/",
                kind.label(),
                self.small.count(kind),
                kind.dir()
            );
        }
        let _ = writeln!(
            out,
            "  total      {:>5} files, {}",
            self.small.files.len(),
            format_bytes(self.small.total_bytes())
        );

        let _ = writeln!(out, "\n  Budget");
        let _ = writeln!(
            out,
            "  Planned:   {}MB of {}MB ({}MB unused)",
            self.plan.planned_total_mb(),
            caps.total_budget_mb,
            self.plan.unused_mb()
        );
        if let Some(build) = self.build {
            let _ = writeln!(
                out,
                "  Written:   {} files, {} on disk",
                build.files_created(),
                format_bytes(build.on_disk_bytes)
            );
        }

        let warnings = self.warnings();
        if !warnings.is_empty() {
            let _ = writeln!(out);
            for warning in warnings {
                let _ = writeln!(out, "  warning: {warning}");
            }
        }
        out
    }

    /// Machine-readable report.
    #[must_use]
    pub fn to_json(&self, command: &str) -> Value {
        let large: Vec<Value> = self
            .plan
            .assignments
            .iter()
            .map(|blob| {
                json!({
                    "name": blob.file_name(),
                    "kind": blob.kind,
                    "size_mb": blob.size_mb,
                })
            })
            .collect();
        let small: Value = SmallFileKind::ALL
            .iter()
            .map(|kind| (kind.label().to_string(), json!(self.small.count(*kind))))
            .collect::<serde_json::Map<String, Value>>()
            .into();

        json!({
            "command": command,
            "output_dir": self.output_dir.to_string_lossy(),
            "level": self.policy.level,
            "policy": self.policy,
            "seed": self.seed,
            "caps": self.plan.caps,
            "large_files": large,
            "json_target": self.plan.json_target,
            "csv_total_mb": self.plan.csv_total_mb(),
            "json_total_mb": self.plan.json_total_mb(),
            "reserved_headroom_mb": self.plan.reserved_headroom_mb(),
            "planned_total_mb": self.plan.planned_total_mb(),
            "unused_mb": self.plan.unused_mb(),
            "small_files": small,
            "small_total_bytes": self.small.total_bytes(),
            "build": self.build,
            "warnings": self.warnings(),
        })
    }
}

/// Human-readable byte count, binary units.
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * KIB;
    const GIB: u64 = 1024 * MIB;

    if bytes >= GIB {
        format!("{:.1} GB", bytes as f64 / GIB as f64)
    } else if bytes >= MIB {
        format!("{:.1} MB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1} KB", bytes as f64 / KIB as f64)
    } else {
        format!("{bytes} B")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Caps;
    use crate::plan::budget::{RandomSizes, plan};
    use crate::plan::policy::ScaleLevel;
    use crate::plan::small_files::plan_small_files;

    fn fixture(caps: Caps) -> (SizePolicy, BudgetPlan, SmallFilePlan) {
        let policy = ScaleLevel::Two.policy();
        let mut sizes = RandomSizes::seeded(21);
        let budget = plan(&caps, policy.csv_preset, policy.json, &mut sizes).unwrap();
        let small = plan_small_files(&policy, &mut sizes);
        (policy, budget, small)
    }

    #[test]
    fn human_report_lists_every_blob() {
        let (policy, budget, small) = fixture(Caps::default());
        let summary = RunSummary {
            output_dir: Path::new("/tmp/repo"),
            policy: &policy,
            seed: 21,
            plan: &budget,
            small: &small,
            unit_bytes: MB,
            build: None,
        };
        let text = summary.format_human();
        assert!(text.starts_with("Repository Plan"));
        for blob in &budget.assignments {
            assert!(text.contains(&blob.file_name()), "missing {}", blob.file_name());
        }
        assert!(text.contains("Seed:      21"));
        assert!(text.contains("of 900MB"));
    }

    #[test]
    fn headroom_overrun_is_warned() {
        let (policy, budget, small) = fixture(Caps {
            max_single_mb: 99,
            total_budget_mb: 150,
            small_headroom_mb: 80,
        });
        let summary = RunSummary {
            output_dir: Path::new("out"),
            policy: &policy,
            seed: 1,
            plan: &budget,
            small: &small,
            unit_bytes: MB,
            build: None,
        };
        let warnings = summary.warnings();
        assert!(warnings.iter().any(|w| w.contains("SMALL_HEADROOM_MB=80MB")));
        assert!(warnings.iter().any(|w| w.contains("0 of 18 JSON blobs")));
        assert!(summary.format_human().contains("warning:"));
    }

    #[test]
    fn default_caps_have_no_warnings() {
        let (policy, budget, small) = fixture(Caps::default());
        let summary = RunSummary {
            output_dir: Path::new("out"),
            policy: &policy,
            seed: 1,
            plan: &budget,
            small: &small,
            unit_bytes: MB,
            build: None,
        };
        assert!(summary.warnings().is_empty(), "{:?}", summary.warnings());
    }

    #[test]
    fn scaled_unit_does_not_shrink_small_file_headroom() {
        let (policy, budget, small) = fixture(Caps::default());
        let build = BuildReport {
            on_disk_bytes: small.total_bytes() + budget.csv_total_mb() * 1024,
            ..BuildReport::default()
        };
        let summary = RunSummary {
            output_dir: Path::new("out"),
            policy: &policy,
            seed: 1,
            plan: &budget,
            small: &small,
            unit_bytes: 1024,
            build: Some(&build),
        };
        assert!(summary.warnings().is_empty(), "{:?}", summary.warnings());
        assert_eq!(summary.budget_bytes(), (900 - 80) * 1024 + 80 * MB);
        assert!(summary.format_human().contains("1024 bytes per MB"));
    }

    #[test]
    fn json_report_carries_totals() {
        let (policy, budget, small) = fixture(Caps::default());
        let summary = RunSummary {
            output_dir: Path::new("out"),
            policy: &policy,
            seed: 5,
            plan: &budget,
            small: &small,
            unit_bytes: MB,
            build: None,
        };
        let value = summary.to_json("plan");
        assert_eq!(value["command"], "plan");
        assert_eq!(value["level"], 2);
        assert_eq!(value["csv_total_mb"], 124);
        assert_eq!(value["caps"]["total_budget_mb"], 900);
        assert_eq!(value["large_files"][0]["name"], "devices_70MB.csv");
        assert_eq!(value["large_files"][0]["kind"]["type"], "csv");
        assert_eq!(value["small_files"]["script"], 24);
        assert!(value["build"].is_null());
    }

    #[test]
    fn format_bytes_picks_unit() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
        assert_eq!(format_bytes(5 * 1024 * 1024 * 1024), "5.0 GB");
    }
}
