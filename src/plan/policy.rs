//! Scale levels and the fixed size policy table they resolve to.

#![allow(missing_docs)]

use std::fmt;

use serde::Serialize;

use crate::core::errors::{NrsError, Result};

/// User-selected scale. Higher levels produce more and larger files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(into = "u8")]
pub enum ScaleLevel {
    One,
    Two,
    Three,
    Four,
}

impl ScaleLevel {
    pub const ALL: [Self; 4] = [Self::One, Self::Two, Self::Three, Self::Four];

    #[must_use]
    pub const fn number(self) -> u8 {
        match self {
            Self::One => 1,
            Self::Two => 2,
            Self::Three => 3,
            Self::Four => 4,
        }
    }

    /// Fixed policy tuple for this level.
    #[must_use]
    pub const fn policy(self) -> SizePolicy {
        let (count_factor, size_percent, csv_preset, json) = match self {
            Self::One => (1, 50, [35, 15, 12], JsonPlanParams::new(8, 4, 12)),
            Self::Two => (2, 100, [70, 30, 24], JsonPlanParams::new(18, 8, 22)),
            Self::Three => (4, 150, [90, 45, 36], JsonPlanParams::new(28, 12, 30)),
            Self::Four => (8, 200, [99, 50, 45], JsonPlanParams::new(40, 16, 40)),
        };
        SizePolicy {
            level: self,
            count_factor,
            size_percent,
            csv_preset,
            json,
        }
    }
}

impl TryFrom<i64> for ScaleLevel {
    type Error = NrsError;

    fn try_from(value: i64) -> Result<Self> {
        match value {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            3 => Ok(Self::Three),
            4 => Ok(Self::Four),
            level => Err(NrsError::InvalidLevel { level }),
        }
    }
}

impl From<ScaleLevel> for u8 {
    fn from(level: ScaleLevel) -> Self {
        level.number()
    }
}

impl fmt::Display for ScaleLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// Parameters for the randomized JSON blob pass, sizes in MB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct JsonPlanParams {
    pub target_count: u32,
    pub min_mb: u64,
    pub max_mb: u64,
}

impl JsonPlanParams {
    #[must_use]
    pub const fn new(target_count: u32, min_mb: u64, max_mb: u64) -> Self {
        Self {
            target_count,
            min_mb,
            max_mb,
        }
    }
}

/// Everything a scale level decides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SizePolicy {
    pub level: ScaleLevel,
    /// Multiplier applied to every small-file base count.
    pub count_factor: u32,
    /// Percentage applied to small-file size ranges.
    pub size_percent: u32,
    /// Target MB for the devices, links and sites CSV blobs, in that order.
    pub csv_preset: [u64; 3],
    pub json: JsonPlanParams,
}

/// Resolve a raw level to its policy. Anything outside 1..=4 is rejected.
pub fn resolve(level: i64) -> Result<SizePolicy> {
    ScaleLevel::try_from(level).map(ScaleLevel::policy)
}
