use crate::lifecycle::LifecycleSnapshot;
use aoc_core::{AgentId, AgentStatus, Vitals, Waveform, WAVEFORM_POINTS};
use chrono::{DateTime, Utc};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::trace;

pub const FLATLINE_LEVEL: f64 = 0.1;
pub const PEAK_INDEX: usize = 4;
const POINT_JITTER: f64 = 0.05;
const PEAK_MIN: f64 = 0.95;
const PEAK_MAX: f64 = 1.0;
// baseline, rise, fall, dip, peak (replaced per tick), dip, rounded bump, baseline
const HEALTHY_ENVELOPE: Waveform = [0.2, 0.3, 0.25, 0.1, 0.975, 0.15, 0.4, 0.2];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TelemetryConfig {
    pub baselines: BTreeMap<AgentId, u32>,
    pub default_baseline: u32,
    pub bpm_jitter: u32,
    pub configuring_bpm_min: u32,
    /// Exclusive upper bound.
    pub configuring_bpm_max: u32,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        let mut baselines = BTreeMap::new();
        baselines.insert(AgentId::Guardian, 85);
        baselines.insert(AgentId::Dealflow, 75);
        baselines.insert(AgentId::Revenue, 72);
        baselines.insert(AgentId::Portfolio, 68);
        Self {
            baselines,
            default_baseline: 70,
            bpm_jitter: 5,
            configuring_bpm_min: 40,
            configuring_bpm_max: 60,
        }
    }
}

impl TelemetryConfig {
    pub fn baseline(&self, id: AgentId) -> u32 {
        self.baselines
            .get(&id)
            .copied()
            .unwrap_or(self.default_baseline)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VitalsRegime {
    Offline,
    Configuring,
    Healthy,
}

impl From<AgentStatus> for VitalsRegime {
    fn from(status: AgentStatus) -> Self {
        match status {
            AgentStatus::Stopped => VitalsRegime::Offline,
            AgentStatus::Configuring => VitalsRegime::Configuring,
            AgentStatus::Running => VitalsRegime::Healthy,
        }
    }
}

pub fn generate_bpm<R: Rng>(
    regime: VitalsRegime,
    baseline: u32,
    config: &TelemetryConfig,
    rng: &mut R,
) -> u32 {
    match regime {
        VitalsRegime::Offline => 0,
        VitalsRegime::Configuring => {
            rng.gen_range(config.configuring_bpm_min..config.configuring_bpm_max)
        }
        VitalsRegime::Healthy => {
            let jitter = i64::from(config.bpm_jitter);
            let offset = rng.gen_range(-jitter..=jitter);
            (i64::from(baseline) + offset).max(0) as u32
        }
    }
}

/// Offline and configuring agents share the same flat placeholder; only a
/// healthy agent gets the stylised heartbeat envelope with its peak at index 4.
pub fn generate_waveform<R: Rng>(regime: VitalsRegime, rng: &mut R) -> Waveform {
    match regime {
        VitalsRegime::Offline | VitalsRegime::Configuring => [FLATLINE_LEVEL; WAVEFORM_POINTS],
        VitalsRegime::Healthy => {
            let mut waveform = HEALTHY_ENVELOPE;
            for (index, sample) in waveform.iter_mut().enumerate() {
                *sample = if index == PEAK_INDEX {
                    rng.gen_range(PEAK_MIN..=PEAK_MAX)
                } else {
                    (*sample + rng.gen_range(-POINT_JITTER..=POINT_JITTER)).clamp(0.0, 1.0)
                };
            }
            waveform
        }
    }
}

pub fn generate_vitals<R: Rng>(
    regime: VitalsRegime,
    baseline: u32,
    config: &TelemetryConfig,
    rng: &mut R,
    now: DateTime<Utc>,
) -> Vitals {
    let bpm = generate_bpm(regime, baseline, config, rng);
    let waveform = generate_waveform(regime, rng);
    Vitals {
        bpm,
        waveform,
        last_update: now,
    }
}

#[derive(Debug, Clone)]
pub struct TelemetrySimulator {
    config: TelemetryConfig,
    rng: SmallRng,
    vitals: BTreeMap<AgentId, Vitals>,
    ticks: u64,
}

impl TelemetrySimulator {
    pub fn new(config: TelemetryConfig, seed: u64) -> Self {
        Self {
            config,
            rng: SmallRng::seed_from_u64(seed),
            vitals: BTreeMap::new(),
            ticks: 0,
        }
    }

    /// Recomputes every agent from the one snapshot it is handed.
    pub fn tick(
        &mut self,
        snapshot: &LifecycleSnapshot,
        now: DateTime<Utc>,
    ) -> &BTreeMap<AgentId, Vitals> {
        for (id, status) in snapshot.iter() {
            let regime = VitalsRegime::from(status);
            let baseline = self.config.baseline(id);
            let vitals = generate_vitals(regime, baseline, &self.config, &mut self.rng, now);
            trace!(
                event = "vitals_tick",
                agent_id = %id,
                status = status.as_str(),
                bpm = vitals.bpm
            );
            self.vitals.insert(id, vitals);
        }
        self.ticks += 1;
        &self.vitals
    }

    pub fn vitals(&self) -> &BTreeMap<AgentId, Vitals> {
        &self.vitals
    }

    pub fn vitals_for(&self, id: AgentId) -> Option<&Vitals> {
        self.vitals.get(&id)
    }

    pub fn tick_count(&self) -> u64 {
        self.ticks
    }

    pub fn config(&self) -> &TelemetryConfig {
        &self.config
    }
}
