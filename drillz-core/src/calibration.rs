//! Calibration & Threshold Scaler
//!
//! A fixed-millisecond threshold conflates how fast a learner can physically
//! respond with how well they know an item. Calibration measures the motor
//! floor with a reaction-time probe (answers that need no recall) and scales
//! every absolute time constant of the [`SchedulerConfig`] by it, so that
//! "automatic" means "about as fast as this learner can go" on any device.
//!
//! ```text
//! samples ──▶ drop warm-up ──▶ median ──▶ baseline_ms
//! baseline_ms × (default_ms / reference_ms) ──▶ scaled constants
//! min_time = baseline_ms × margin_factor
//! ```
//!
//! Calibration is always optional: on [`DrillzError::InsufficientSamples`]
//! the caller may simply keep the unscaled defaults.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{CalibrationConfig, SchedulerConfig};
use crate::error::{DrillzError, Result};
use crate::types::median;

/// Motor baseline from raw probe latencies.
///
/// Discards the first `config.warmup_samples`, then returns the median of
/// the rest.
///
/// # Errors
/// `DrillzError::InvalidInput` if any sample is negative or non-finite;
/// `DrillzError::InsufficientSamples` if fewer than `config.min_samples`
/// remain after the warm-up.
pub fn measure_baseline(samples: &[f64], config: &CalibrationConfig) -> Result<f64> {
    if let Some(bad) = samples.iter().find(|s| !s.is_finite() || **s < 0.0) {
        return Err(DrillzError::invalid_input(format!(
            "calibration sample must be a finite, non-negative latency, got {bad}"
        )));
    }

    let usable = samples.get(config.warmup_samples..).unwrap_or(&[]);
    if usable.len() < config.min_samples {
        return Err(DrillzError::InsufficientSamples {
            got: usable.len(),
            needed: config.min_samples,
        });
    }

    median(usable).ok_or(DrillzError::InsufficientSamples {
        got: 0,
        needed: config.min_samples,
    })
}

/// Rescale every time constant of `defaults` to a measured baseline.
///
/// Each `*_ms` field of `defaults` is read as a ratio against
/// `config.reference_baseline_ms` and multiplied by `baseline_ms`;
/// `min_time_ms` is `baseline_ms × margin_factor`. Non-time fields are copied.
/// `defaults` is left untouched.
///
/// # Errors
/// `DrillzError::InvalidInput` for a non-positive or non-finite baseline;
/// `DrillzError::InvalidConfig` if the calibration settings or the scaled
/// result fail validation.
pub fn derive_scaled_config(
    baseline_ms: f64,
    defaults: &SchedulerConfig,
    config: &CalibrationConfig,
) -> Result<SchedulerConfig> {
    if !baseline_ms.is_finite() || baseline_ms <= 0.0 {
        return Err(DrillzError::invalid_input(format!(
            "baseline must be a positive latency, got {baseline_ms}"
        )));
    }
    config.validate()?;

    let factor = baseline_ms / config.reference_baseline_ms;
    let scaled = SchedulerConfig {
        min_time_ms: baseline_ms * config.margin_factor,
        max_response_time_ms: defaults.max_response_time_ms * factor,
        automaticity_target_ms: defaults.automaticity_target_ms * factor,
        ..defaults.clone()
    };
    scaled.validate()?;
    Ok(scaled)
}

/// Outcome of one calibration run, suitable for persisting between sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationProfile {
    /// Measured motor baseline (ms).
    pub baseline_ms: f64,
    /// Samples that contributed to the median.
    pub sample_count: usize,
    /// When the probe was run.
    pub measured_at: DateTime<Utc>,
}

impl CalibrationProfile {
    /// Rebuild the scaled scheduler config from this profile.
    ///
    /// # Errors
    /// See [`derive_scaled_config`].
    pub fn apply(
        &self,
        defaults: &SchedulerConfig,
        config: &CalibrationConfig,
    ) -> Result<SchedulerConfig> {
        derive_scaled_config(self.baseline_ms, defaults, config)
    }
}

/// Measure a baseline and package it as a [`CalibrationProfile`].
///
/// # Errors
/// See [`measure_baseline`].
pub fn calibrate(
    samples: &[f64],
    measured_at: DateTime<Utc>,
    config: &CalibrationConfig,
) -> Result<CalibrationProfile> {
    let baseline_ms = measure_baseline(samples, config)?;
    let sample_count = samples.len().saturating_sub(config.warmup_samples);
    info!(baseline_ms, sample_count, "Motor baseline calibrated");
    Ok(CalibrationProfile {
        baseline_ms,
        sample_count,
        measured_at,
    })
}
