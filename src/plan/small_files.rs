//! Small-file inventory: scripts, reports, templates and config snippets.

#![allow(missing_docs)]

use std::path::PathBuf;

use serde::Serialize;

use crate::plan::budget::{MB, SizeSource};
use crate::plan::policy::SizePolicy;

const KIB: u64 = 1024;

/// Category of small text file in the managed-file repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SmallFileKind {
    Script,
    Report,
    Template,
    Config,
}

impl SmallFileKind {
    pub const ALL: [Self; 4] = [Self::Script, Self::Report, Self::Template, Self::Config];

    /// Directory under the output root.
    #[must_use]
    pub const fn dir(self) -> &'static str {
        match self {
            Self::Script => "scripts",
            Self::Report => "reports",
            Self::Template => "templates",
            Self::Config => "configs",
        }
    }

    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Script => "py",
            Self::Report => "txt",
            Self::Template => "j2",
            Self::Config => "cfg",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Script => "script",
            Self::Report => "report",
            Self::Template => "template",
            Self::Config => "config",
        }
    }

    /// Files at count factor 1.
    #[must_use]
    pub const fn base_count(self) -> u32 {
        match self {
            Self::Script => 12,
            Self::Report => 8,
            Self::Template => 10,
            Self::Config => 16,
        }
    }

    /// Size range in KiB at 100%.
    #[must_use]
    pub const fn base_kib(self) -> (u64, u64) {
        match self {
            Self::Script => (2, 12),
            Self::Report => (4, 24),
            Self::Template => (1, 6),
            Self::Config => (1, 4),
        }
    }

    /// Byte range after applying a size percentage. Never below 1 KiB.
    #[must_use]
    pub fn byte_range(self, size_percent: u32) -> (u64, u64) {
        let (lo, hi) = self.base_kib();
        let pct = u64::from(size_percent);
        let lo_bytes = (lo * KIB * pct / 100).max(KIB);
        let hi_bytes = (hi * KIB * pct / 100).max(lo_bytes);
        (lo_bytes, hi_bytes)
    }
}

/// A single small file to write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SmallFile {
    pub kind: SmallFileKind,
    /// 1-based within its kind.
    pub index: u32,
    /// Relative to the output root.
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// All small files for a run, grouped by kind in [`SmallFileKind::ALL`] order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct SmallFilePlan {
    pub files: Vec<SmallFile>,
}

impl SmallFilePlan {
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.size_bytes).sum()
    }

    #[must_use]
    pub fn count(&self, kind: SmallFileKind) -> usize {
        self.files.iter().filter(|f| f.kind == kind).count()
    }

    /// Whether the small files outgrow the headroom reserved for them.
    ///
    /// Small-file sizes are absolute, so the headroom is always read as real MB.
    #[must_use]
    pub fn exceeds_headroom(&self, headroom_mb: u64) -> bool {
        self.total_bytes() > headroom_mb.saturating_mul(MB)
    }
}

/// Build the small-file inventory for a policy, drawing each size from `sizes`.
pub fn plan_small_files<S>(policy: &SizePolicy, sizes: &mut S) -> SmallFilePlan
where
    S: SizeSource + ?Sized,
{
    let mut files = Vec::new();
    for kind in SmallFileKind::ALL {
        let count = kind.base_count() * policy.count_factor;
        let (lo, hi) = kind.byte_range(policy.size_percent);
        for index in 1..=count {
            let name = format!("{}_{index:03}.{}", kind.label(), kind.extension());
            files.push(SmallFile {
                kind,
                index,
                path: PathBuf::from(kind.dir()).join(name),
                size_bytes: sizes.draw(lo, hi),
            });
        }
    }
    SmallFilePlan { files }
}
