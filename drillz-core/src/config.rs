//! Configuration for the DRILLZ scheduler.
//!
//! Maps directly to `drillz.toml`. The [`SchedulerConfig`] section is the one
//! the engine consults on every operation; it is immutable once built and is
//! swapped wholesale (see [`crate::MemoryModel::replace_config`]) whenever a
//! calibration produces a rescaled copy.

use serde::{Deserialize, Serialize};

use crate::error::{DrillzError, Result};

/// Top-level DRILLZ configuration, loadable from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DrillzConfig {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Memory model and selection thresholds.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Motor-baseline calibration settings.
    #[serde(default)]
    pub calibration: CalibrationConfig,
    /// Reference storage adapter settings.
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

impl DrillzConfig {
    /// Load configuration from a TOML string.
    ///
    /// The scheduler section is validated before it is returned.
    ///
    /// # Errors
    /// Returns `DrillzError::Config` if the TOML is invalid, or
    /// `DrillzError::InvalidConfig` if the scheduler thresholds are inconsistent.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(toml_str).map_err(|e| DrillzError::Config(e.to_string()))?;
        config.scheduler.validate()?;
        config.calibration.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Storage namespace: one per quiz mode, so the same item ID in two
    /// modes keeps two independent histories.
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
        }
    }
}

/// Thresholds and tuning constants for the memory model and selection.
///
/// All `*_ms` fields are absolute latencies for a learner with a 1000 ms
/// motor baseline; [`crate::calibration::derive_scaled_config`] rescales them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Motor floor: latencies below this are clamped up.
    #[serde(default = "default_min_time")]
    pub min_time_ms: f64,
    /// Latencies above this are clamped down (distraction, not knowledge).
    #[serde(default = "default_max_response_time")]
    pub max_response_time_ms: f64,
    /// Reference latency of the speed score: speed is 1.0 at or below it and
    /// `target / ewma` above it, so 0.5 is reached at *twice* this value.
    ///
    /// Some descriptions of this model call the target "the latency at which
    /// speed = 0.5"; that reading does not match the formula used here. To
    /// tune from a desired 0.5-point `L`, set this field to `L / 2`.
    #[serde(default = "default_automaticity_target")]
    pub automaticity_target_ms: f64,
    /// Recall / automaticity at or above which an item counts as fluent.
    #[serde(default = "default_0_5")]
    pub automaticity_threshold: f64,
    /// Consolidation ratio at or above which a new group is unlocked.
    #[serde(default = "default_0_7")]
    pub expansion_threshold: f64,
    /// EWMA smoothing factor for latency, in `(0, 1]`.
    #[serde(default = "default_0_3")]
    pub ewma_alpha: f64,
    /// Selection weight of an item that has never been answered.
    #[serde(default = "default_3_0")]
    pub unseen_boost: f64,
    /// Stability (hours) of a freshly created record.
    #[serde(default = "default_4_0")]
    pub initial_stability_hours: f64,
    /// Stability ceiling (hours).
    #[serde(default = "default_336_0")]
    pub max_stability_hours: f64,
    /// Stability floor (hours) after repeated lapses.
    #[serde(default = "default_0_5")]
    pub min_stability_hours: f64,
    /// Growth factor applied by a correct answer on a fresh record.
    #[serde(default = "default_2_0")]
    pub stability_growth_base: f64,
    /// Extra growth multiplier for a correct answer at full speed.
    #[serde(default = "default_1_5")]
    pub speed_bonus_max: f64,
    /// Multiplicative stability shrink on an incorrect answer, in `(0, 1)`.
    #[serde(default = "default_0_2")]
    pub lapse_factor: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            min_time_ms: 1000.0,
            max_response_time_ms: 9000.0,
            automaticity_target_ms: 3000.0,
            automaticity_threshold: 0.5,
            expansion_threshold: 0.7,
            ewma_alpha: 0.3,
            unseen_boost: 3.0,
            initial_stability_hours: 4.0,
            max_stability_hours: 336.0,
            min_stability_hours: 0.5,
            stability_growth_base: 2.0,
            speed_bonus_max: 1.5,
            lapse_factor: 0.2,
        }
    }
}

impl SchedulerConfig {
    /// Check that every threshold is usable.
    ///
    /// # Errors
    /// Returns `DrillzError::InvalidConfig` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("min_time_ms", self.min_time_ms),
            ("max_response_time_ms", self.max_response_time_ms),
            ("automaticity_target_ms", self.automaticity_target_ms),
            ("unseen_boost", self.unseen_boost),
            ("initial_stability_hours", self.initial_stability_hours),
            ("max_stability_hours", self.max_stability_hours),
            ("min_stability_hours", self.min_stability_hours),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(invalid(format!("{name} must be positive and finite, got {value}")));
            }
        }

        if self.min_time_ms > self.max_response_time_ms {
            return Err(invalid(format!(
                "min_time_ms ({}) exceeds max_response_time_ms ({})",
                self.min_time_ms, self.max_response_time_ms
            )));
        }
        for (name, value) in [
            ("automaticity_threshold", self.automaticity_threshold),
            ("expansion_threshold", self.expansion_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(format!("{name} must lie in [0, 1], got {value}")));
            }
        }
        if !(self.ewma_alpha > 0.0 && self.ewma_alpha <= 1.0) {
            return Err(invalid(format!("ewma_alpha must lie in (0, 1], got {}", self.ewma_alpha)));
        }
        if !(self.lapse_factor > 0.0 && self.lapse_factor < 1.0) {
            return Err(invalid(format!(
                "lapse_factor must lie in (0, 1), got {}",
                self.lapse_factor
            )));
        }
        if !self.stability_growth_base.is_finite() || self.stability_growth_base <= 1.0 {
            return Err(invalid(format!(
                "stability_growth_base must exceed 1, got {}",
                self.stability_growth_base
            )));
        }
        if !self.speed_bonus_max.is_finite() || self.speed_bonus_max < 1.0 {
            return Err(invalid(format!(
                "speed_bonus_max must be at least 1, got {}",
                self.speed_bonus_max
            )));
        }
        if self.min_stability_hours > self.initial_stability_hours
            || self.initial_stability_hours >= self.max_stability_hours
        {
            return Err(invalid(format!(
                "stability bounds must satisfy min <= initial < max, got {} / {} / {}",
                self.min_stability_hours, self.initial_stability_hours, self.max_stability_hours
            )));
        }
        Ok(())
    }
}

fn invalid(msg: String) -> DrillzError {
    DrillzError::InvalidConfig(msg)
}

/// Motor-baseline calibration settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Leading probe samples discarded as warm-up.
    #[serde(default = "default_2_usize")]
    pub warmup_samples: usize,
    /// Minimum samples required after the warm-up.
    #[serde(default = "default_3_usize")]
    pub min_samples: usize,
    /// Safety margin applied to the measured baseline for `min_time_ms`.
    #[serde(default = "default_1_0")]
    pub margin_factor: f64,
    /// Baseline the default `*_ms` constants were tuned for.
    #[serde(default = "default_reference_baseline")]
    pub reference_baseline_ms: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            warmup_samples: 2,
            min_samples: 3,
            margin_factor: 1.0,
            reference_baseline_ms: 1000.0,
        }
    }
}

impl CalibrationConfig {
    /// Check the margin and reference baseline.
    ///
    /// # Errors
    /// Returns `DrillzError::InvalidConfig` if `margin_factor < 1`, the
    /// reference baseline is not positive, or `min_samples` is zero.
    pub fn validate(&self) -> Result<()> {
        if !self.margin_factor.is_finite() || self.margin_factor < 1.0 {
            return Err(invalid(format!(
                "margin_factor must be at least 1, got {}",
                self.margin_factor
            )));
        }
        if !self.reference_baseline_ms.is_finite() || self.reference_baseline_ms <= 0.0 {
            return Err(invalid(format!(
                "reference_baseline_ms must be positive, got {}",
                self.reference_baseline_ms
            )));
        }
        if self.min_samples == 0 {
            return Err(invalid("min_samples must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Encoding of an [`crate::ItemRecord`] inside the SQLite blob column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordCodec {
    /// Human-readable JSON (default; easy to inspect with `sqlite3`).
    #[default]
    Json,
    /// Compact MessagePack.
    MessagePack,
}

/// Settings for the bundled SQLite adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// How records are encoded in the blob column.
    #[serde(default)]
    pub codec: RecordCodec,
    /// Use WAL mode for concurrent reads.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
    /// Detect corrupted rows via checksums.
    #[serde(default = "default_true")]
    pub checksum_enabled: bool,
    /// Read cache capacity (records) filled by `preload` and by reads.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            codec: RecordCodec::Json,
            wal_mode: true,
            checksum_enabled: true,
            cache_capacity: 512,
        }
    }
}

// ---------------------------------------------------------------------------
// Serde default helpers
// ---------------------------------------------------------------------------

fn default_true() -> bool { true }
fn default_namespace() -> String { "default".to_string() }
fn default_min_time() -> f64 { 1000.0 }
fn default_max_response_time() -> f64 { 9000.0 }
fn default_automaticity_target() -> f64 { 3000.0 }
fn default_reference_baseline() -> f64 { 1000.0 }
fn default_0_2() -> f64 { 0.2 }
fn default_0_3() -> f64 { 0.3 }
fn default_0_5() -> f64 { 0.5 }
fn default_0_7() -> f64 { 0.7 }
fn default_1_0() -> f64 { 1.0 }
fn default_1_5() -> f64 { 1.5 }
fn default_2_0() -> f64 { 2.0 }
fn default_3_0() -> f64 { 3.0 }
fn default_4_0() -> f64 { 4.0 }
fn default_336_0() -> f64 { 336.0 }
fn default_2_usize() -> usize { 2 }
fn default_3_usize() -> usize { 3 }
fn default_cache_capacity() -> usize { 512 }
