use crate::activity::DEFAULT_ACTIVITY_CAPACITY;
use crate::gamification::{GamificationConfig, GamificationEngine, GamificationError};
use crate::lifecycle::{LifecycleConfig, LifecycleError};
use crate::notify::{NotificationConfig, NotifyError};
use crate::scheduler::SchedulerError;
use crate::streaming::{StreamingConfig, WalkBounds};
use crate::summary::SummaryConfig;
use crate::telemetry::TelemetryConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Longest cadence or delay accepted from config: one week.
pub const MAX_INTERVAL_MS: u64 = 7 * 24 * 60 * 60 * 1_000;
pub const MAX_METRICS_WINDOW: usize = 10_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cadence {0} must be greater than zero")]
    ZeroCadence(&'static str),
    #[error("{field} of {value_ms}ms exceeds the {max_ms}ms limit")]
    IntervalTooLong {
        field: &'static str,
        value_ms: u64,
        max_ms: u64,
    },
    #[error("{0} capacity must be greater than zero")]
    ZeroCapacity(&'static str),
    #[error("invalid range for {field}: {reason}")]
    InvalidRange { field: &'static str, reason: String },
    #[error(transparent)]
    Gamification(#[from] GamificationError),
}

#[derive(Debug, Error)]
pub enum OpsError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error(transparent)]
    Gamification(#[from] GamificationError),
    #[error(transparent)]
    Notify(#[from] NotifyError),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SchedulerCadence {
    pub telemetry_ms: u64,
    pub streaming_ms: u64,
    pub summary_refresh_ms: u64,
}

impl Default for SchedulerCadence {
    fn default() -> Self {
        Self {
            telemetry_ms: 1_200,
            streaming_ms: 2_000,
            summary_refresh_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OpsConfig {
    pub seed: u64,
    pub activity_capacity: usize,
    pub cadence: SchedulerCadence,
    pub lifecycle: LifecycleConfig,
    pub telemetry: TelemetryConfig,
    pub streaming: StreamingConfig,
    pub gamification: GamificationConfig,
    pub notifications: NotificationConfig,
    pub summary: SummaryConfig,
}

impl Default for OpsConfig {
    fn default() -> Self {
        Self {
            seed: 0x5eed,
            activity_capacity: DEFAULT_ACTIVITY_CAPACITY,
            cadence: SchedulerCadence::default(),
            lifecycle: LifecycleConfig::default(),
            telemetry: TelemetryConfig::default(),
            streaming: StreamingConfig::default(),
            gamification: GamificationConfig::default(),
            notifications: NotificationConfig::default(),
            summary: SummaryConfig::default(),
        }
    }
}

impl OpsConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cadence.telemetry_ms == 0 {
            return Err(ConfigError::ZeroCadence("telemetry_ms"));
        }
        if self.cadence.streaming_ms == 0 {
            return Err(ConfigError::ZeroCadence("streaming_ms"));
        }
        if self.cadence.summary_refresh_ms == 0 {
            return Err(ConfigError::ZeroCadence("summary_refresh_ms"));
        }
        for (field, value_ms) in [
            ("cadence.telemetry_ms", self.cadence.telemetry_ms),
            ("cadence.streaming_ms", self.cadence.streaming_ms),
            ("cadence.summary_refresh_ms", self.cadence.summary_refresh_ms),
            ("lifecycle.restart_delay_ms", self.lifecycle.restart_delay_ms),
            ("lifecycle.restart_all_delay_ms", self.lifecycle.restart_all_delay_ms),
            ("summary.fetch_timeout_ms", self.summary.fetch_timeout_ms),
        ] {
            if value_ms > MAX_INTERVAL_MS {
                return Err(ConfigError::IntervalTooLong {
                    field,
                    value_ms,
                    max_ms: MAX_INTERVAL_MS,
                });
            }
        }
        if self.activity_capacity == 0 {
            return Err(ConfigError::ZeroCapacity("activity log"));
        }
        if self.streaming.window == 0 {
            return Err(ConfigError::ZeroCapacity("metrics window"));
        }
        if self.streaming.window > MAX_METRICS_WINDOW {
            return Err(ConfigError::InvalidRange {
                field: "streaming.window",
                reason: format!(
                    "{} samples exceeds the {MAX_METRICS_WINDOW} limit",
                    self.streaming.window
                ),
            });
        }
        if self.telemetry.configuring_bpm_min >= self.telemetry.configuring_bpm_max {
            return Err(ConfigError::InvalidRange {
                field: "telemetry.configuring_bpm",
                reason: format!(
                    "min {} must be below max {}",
                    self.telemetry.configuring_bpm_min, self.telemetry.configuring_bpm_max
                ),
            });
        }
        validate_walk("streaming.alignment", &self.streaming.alignment)?;
        validate_walk("streaming.revenue", &self.streaming.revenue)?;
        validate_walk("streaming.deals", &self.streaming.deals)?;
        validate_walk("streaming.active_agents", &self.streaming.active_agents)?;
        let fallback = self.summary.fallback_alignment;
        if !fallback.is_finite() || !(0.0..=100.0).contains(&fallback) {
            return Err(ConfigError::InvalidRange {
                field: "summary.fallback_alignment",
                reason: format!("{fallback} is outside 0..=100"),
            });
        }
        GamificationEngine::new(&self.gamification)?;
        Ok(())
    }
}

fn validate_walk(field: &'static str, bounds: &WalkBounds) -> Result<(), ConfigError> {
    if bounds.is_valid() {
        Ok(())
    } else {
        Err(ConfigError::InvalidRange {
            field,
            reason: format!(
                "min {} max {} step {} initial {}",
                bounds.min, bounds.max, bounds.max_step, bounds.initial
            ),
        })
    }
}
