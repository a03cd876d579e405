//! Configuration system: TOML file + env var overrides + smart defaults.
//!
//! Env overrides use the short, unprefixed names the generator has always
//! accepted (`MAX_SINGLE_MB`, `TOTAL_BUDGET_MB`, `SMALL_HEADROOM_MB`, `LEVEL`)
//! so existing fixture scripts keep working.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{NrsError, Result};
use crate::plan::policy::ScaleLevel;

/// Full generator configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Config {
    pub caps: Caps,
    pub generation: GenerationConfig,
    pub paths: PathsConfig,
}

/// Hard size caps, all in MB.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Caps {
    /// No single generated file may exceed this.
    pub max_single_mb: u64,
    /// The whole tree may not exceed this.
    pub total_budget_mb: u64,
    /// Reserved for small files before large blobs are planned.
    pub small_headroom_mb: u64,
}

/// What to generate and where.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GenerationConfig {
    /// Raw scale level; validated against 1..=4 at load time.
    pub level: i64,
    pub output_dir: PathBuf,
    /// Fixed seed for size draws. `None` picks one per run.
    pub seed: Option<u64>,
}

/// Filesystem paths used by nrs itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub config_file: PathBuf,
    pub activity_log: PathBuf,
}

/// Highest-precedence layer, typically from command-line flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub max_single_mb: Option<u64>,
    pub total_budget_mb: Option<u64>,
    pub small_headroom_mb: Option<u64>,
    pub level: Option<i64>,
    pub output_dir: Option<PathBuf>,
    pub seed: Option<u64>,
}

impl Default for Caps {
    fn default() -> Self {
        Self {
            max_single_mb: 99,
            total_budget_mb: 900,
            small_headroom_mb: 80,
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            level: 2,
            output_dir: PathBuf::from("netrepo"),
            seed: None,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        let home_dir = env::var_os("HOME").map_or_else(
            || {
                eprintln!("[NRS-CONFIG] WARNING: HOME not set, falling back to /tmp for data paths");
                PathBuf::from("/tmp")
            },
            PathBuf::from,
        );
        Self {
            config_file: home_dir.join(".config").join("nrs").join("config.toml"),
            activity_log: home_dir
                .join(".local")
                .join("share")
                .join("nrs")
                .join("activity.jsonl"),
        }
    }
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathsConfig::default().config_file
    }

    /// Load config from default or explicit path, then apply env overrides from `lookup`.
    ///
    /// Missing config file is not an error when loading from default path; defaults are used.
    pub fn load_with<F>(path: Option<&Path>, lookup: F) -> Result<Self>
    where
        F: FnMut(&str) -> Option<String>,
    {
        Self::load_layered(path, lookup, &Overrides::default())
    }

    /// Defaults < TOML file < env < `overrides`, validated once at the end.
    pub fn load_layered<F>(path: Option<&Path>, lookup: F, overrides: &Overrides) -> Result<Self>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| NrsError::Io {
                path: path_buf.clone(),
                source,
            })?;
            let parsed: Self = toml::from_str(&raw)?;
            parsed
        } else if is_explicit_path {
            return Err(NrsError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.paths.config_file = path_buf;
        cfg.apply_env_overrides_from(lookup)?;
        cfg.apply_overrides(overrides);
        cfg.validate()?;
        Ok(cfg)
    }

    /// Process-environment lookup for [`Config::load_layered`]. Blank values count as unset.
    #[must_use]
    pub fn env_lookup(name: &str) -> Option<String> {
        env_var(name)
    }

    /// Deterministic hash of the effective config for logging.
    ///
    /// FNV-1a over the canonical JSON form, stable across processes.
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        // caps
        if let Some(raw) = lookup("MAX_SINGLE_MB") {
            self.caps.max_single_mb = parse_env_u64("MAX_SINGLE_MB", &raw)?;
        }
        if let Some(raw) = lookup("TOTAL_BUDGET_MB") {
            self.caps.total_budget_mb = parse_env_u64("TOTAL_BUDGET_MB", &raw)?;
        }
        if let Some(raw) = lookup("SMALL_HEADROOM_MB") {
            self.caps.small_headroom_mb = parse_env_u64("SMALL_HEADROOM_MB", &raw)?;
        }

        // generation
        if let Some(raw) = lookup("LEVEL") {
            self.generation.level = parse_env_i64("LEVEL", &raw)?;
        }
        if let Some(raw) = lookup("OUTPUT_DIR") {
            self.generation.output_dir = PathBuf::from(raw);
        }
        if let Some(raw) = lookup("SEED") {
            self.generation.seed = Some(parse_env_u64("SEED", &raw)?);
        }

        // paths
        if let Some(raw) = lookup("NRS_ACTIVITY_LOG") {
            self.paths.activity_log = PathBuf::from(raw);
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(v) = overrides.max_single_mb {
            self.caps.max_single_mb = v;
        }
        if let Some(v) = overrides.total_budget_mb {
            self.caps.total_budget_mb = v;
        }
        if let Some(v) = overrides.small_headroom_mb {
            self.caps.small_headroom_mb = v;
        }
        if let Some(v) = overrides.level {
            self.generation.level = v;
        }
        if let Some(v) = &overrides.output_dir {
            self.generation.output_dir.clone_from(v);
        }
        if let Some(v) = overrides.seed {
            self.generation.seed = Some(v);
        }
    }

    /// Check caps and level. Called after every override layer is applied.
    pub fn validate(&self) -> Result<()> {
        if self.caps.max_single_mb == 0 {
            return Err(NrsError::InvalidConfig {
                details: "MAX_SINGLE_MB must be > 0".to_string(),
            });
        }
        if self.caps.total_budget_mb == 0 {
            return Err(NrsError::InvalidConfig {
                details: "TOTAL_BUDGET_MB must be > 0".to_string(),
            });
        }
        if self.generation.output_dir.as_os_str().is_empty() {
            return Err(NrsError::InvalidConfig {
                details: "OUTPUT_DIR must not be empty".to_string(),
            });
        }

        ScaleLevel::try_from(self.generation.level)?;
        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn parse_env_u64(name: &str, raw: &str) -> Result<u64> {
    raw.trim()
        .parse::<u64>()
        .map_err(|error| NrsError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })
}

fn parse_env_i64(name: &str, raw: &str) -> Result<i64> {
    raw.trim()
        .parse::<i64>()
        .map_err(|error| NrsError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })
}

#[cfg(test)]
mod tests {
    use super::{Config, NrsError, Overrides};
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(name, value)| ((*name).to_string(), (*value).to_string()))
            .collect()
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn default_config_is_valid() {
        let cfg = Config::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.caps.max_single_mb, 99);
        assert_eq!(cfg.caps.total_budget_mb, 900);
        assert_eq!(cfg.caps.small_headroom_mb, 80);
        assert_eq!(cfg.generation.level, 2);
    }

    #[test]
    fn env_overrides_replace_defaults() {
        let mut cfg = Config::default();
        let overrides = vars(&[
            ("MAX_SINGLE_MB", "50"),
            ("TOTAL_BUDGET_MB", "400"),
            ("SMALL_HEADROOM_MB", "10"),
            ("LEVEL", "3"),
            ("OUTPUT_DIR", "/tmp/nrs-out"),
            ("SEED", "42"),
        ]);

        cfg.apply_env_overrides_from(|name| overrides.get(name).cloned())
            .expect("overrides should parse");

        assert_eq!(cfg.caps.max_single_mb, 50);
        assert_eq!(cfg.caps.total_budget_mb, 400);
        assert_eq!(cfg.caps.small_headroom_mb, 10);
        assert_eq!(cfg.generation.level, 3);
        assert_eq!(cfg.generation.output_dir, PathBuf::from("/tmp/nrs-out"));
        assert_eq!(cfg.generation.seed, Some(42));
    }

    #[test]
    fn env_invalid_integer_rejected() {
        let mut cfg = Config::default();
        let overrides = vars(&[("TOTAL_BUDGET_MB", "lots")]);

        let err = cfg
            .apply_env_overrides_from(|name| overrides.get(name).cloned())
            .expect_err("non-numeric budget should fail");
        match err {
            NrsError::ConfigParse { context, details } => {
                assert_eq!(context, "env");
                assert!(details.contains("TOTAL_BUDGET_MB"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn level_out_of_range_is_configuration_error() {
        let mut cfg = Config::default();
        cfg.generation.level = 5;
        let err = cfg.validate().expect_err("level 5 must be rejected");
        assert!(matches!(err, NrsError::InvalidLevel { level: 5 }));
    }

    #[test]
    fn negative_level_is_configuration_error() {
        let overrides = vars(&[("LEVEL", "-1")]);
        let mut cfg = Config::default();
        cfg.apply_env_overrides_from(|name| overrides.get(name).cloned())
            .unwrap();
        let err = cfg.validate().unwrap_err();
        assert_eq!(err.code(), "NRS-1001");
    }

    #[test]
    fn zero_caps_rejected() {
        let mut cfg = Config::default();
        cfg.caps.max_single_mb = 0;
        let err = cfg.validate().expect_err("zero per-file cap");
        assert!(err.to_string().contains("MAX_SINGLE_MB"));

        let mut cfg = Config::default();
        cfg.caps.total_budget_mb = 0;
        let err = cfg.validate().expect_err("zero total budget");
        assert!(err.to_string().contains("TOTAL_BUDGET_MB"));
    }

    #[test]
    fn zero_headroom_is_allowed() {
        let mut cfg = Config::default();
        cfg.caps.small_headroom_mb = 0;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn load_returns_error_for_explicit_missing_path() {
        let result = Config::load_with(Some(Path::new("/nonexistent/nrs/config.toml")), no_env);
        assert!(matches!(result, Err(NrsError::MissingConfig { .. })));
    }

    #[test]
    fn load_reads_toml_then_env_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[caps]\ntotal_budget_mb = 300\nmax_single_mb = 40\n\n[generation]\nlevel = 1\n",
        )
        .unwrap();

        let overrides = vars(&[("TOTAL_BUDGET_MB", "250")]);
        let cfg = Config::load_with(Some(&path), |name| overrides.get(name).cloned()).unwrap();

        assert_eq!(cfg.caps.total_budget_mb, 250);
        assert_eq!(cfg.caps.max_single_mb, 40);
        assert_eq!(cfg.caps.small_headroom_mb, 80);
        assert_eq!(cfg.generation.level, 1);
        assert_eq!(cfg.paths.config_file, path);
    }

    #[test]
    fn flag_overrides_beat_env_and_rescue_bad_level() {
        let overrides = vars(&[("LEVEL", "9"), ("MAX_SINGLE_MB", "10")]);
        let flags = Overrides {
            level: Some(4),
            max_single_mb: Some(64),
            ..Overrides::default()
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "").unwrap();

        let cfg =
            Config::load_layered(Some(&path), |name| overrides.get(name).cloned(), &flags).unwrap();
        assert_eq!(cfg.generation.level, 4);
        assert_eq!(cfg.caps.max_single_mb, 64);
    }

    #[test]
    fn load_rejects_malformed_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[caps\n").unwrap();
        let err = Config::load_with(Some(&path), no_env).unwrap_err();
        assert_eq!(err.code(), "NRS-1004");
    }

    #[test]
    fn stable_hash_changes_when_config_changes() {
        let cfg = Config::default();
        let before = cfg.stable_hash().expect("hash");
        let mut modified = Config::default();
        modified.caps.total_budget_mb += 1;
        let after = modified.stable_hash().expect("hash");
        assert_ne!(before, after);
        assert_eq!(before, cfg.stable_hash().expect("hash"));
    }
}
