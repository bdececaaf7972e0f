use chrono::{DateTime, Duration, Utc};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

pub const DEFAULT_WINDOW: usize = 10;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WalkBounds {
    pub min: f64,
    pub max: f64,
    pub max_step: f64,
    pub initial: f64,
    pub integral: bool,
}

impl Default for WalkBounds {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: 100.0,
            max_step: 1.0,
            initial: 50.0,
            integral: false,
        }
    }
}

impl WalkBounds {
    pub fn is_valid(&self) -> bool {
        self.min.is_finite()
            && self.max.is_finite()
            && self.initial.is_finite()
            && self.max_step.is_finite()
            && self.min < self.max
            && self.max_step >= 0.0
    }

    pub fn clamp(&self, value: f64) -> f64 {
        let value = if self.integral { value.round() } else { value };
        value.clamp(self.min, self.max)
    }

    pub fn step<R: Rng>(&self, previous: f64, rng: &mut R) -> f64 {
        let delta = if self.max_step > 0.0 {
            rng.gen_range(-self.max_step..=self.max_step)
        } else {
            0.0
        };
        self.clamp(previous + delta)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StreamingConfig {
    pub window: usize,
    pub alignment: WalkBounds,
    pub revenue: WalkBounds,
    pub deals: WalkBounds,
    pub active_agents: WalkBounds,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            alignment: WalkBounds {
                min: 80.0,
                max: 100.0,
                max_step: 1.5,
                initial: 94.0,
                integral: false,
            },
            revenue: WalkBounds {
                min: 180.0,
                max: 320.0,
                max_step: 6.0,
                initial: 248.0,
                integral: false,
            },
            deals: WalkBounds {
                min: 0.0,
                max: 40.0,
                max_step: 3.0,
                initial: 18.0,
                integral: true,
            },
            active_agents: WalkBounds {
                min: 0.0,
                max: 4.0,
                max_step: 1.0,
                initial: 4.0,
                integral: true,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct MetricSample {
    pub at: DateTime<Utc>,
    pub alignment: f64,
    pub revenue: f64,
    pub deals: f64,
    pub active_agents: f64,
}

#[derive(Debug, Clone)]
pub struct StreamingMetricsSimulator {
    config: StreamingConfig,
    rng: SmallRng,
    window: VecDeque<MetricSample>,
    ticks: u64,
}

impl StreamingMetricsSimulator {
    /// Builds a full window up front, walking backwards in time by `spacing`
    /// so the first rendered chart already has every point.
    pub fn new(config: StreamingConfig, spacing: Duration, seed: u64, now: DateTime<Utc>) -> Self {
        let capacity = config.window.max(1);
        let mut simulator = Self {
            rng: SmallRng::seed_from_u64(seed),
            window: VecDeque::with_capacity(capacity),
            ticks: 0,
            config,
        };
        let first_at = now - spacing * (capacity as i32 - 1);
        let mut sample = MetricSample {
            at: first_at,
            alignment: simulator.config.alignment.clamp(simulator.config.alignment.initial),
            revenue: simulator.config.revenue.clamp(simulator.config.revenue.initial),
            deals: simulator.config.deals.clamp(simulator.config.deals.initial),
            active_agents: simulator
                .config
                .active_agents
                .clamp(simulator.config.active_agents.initial),
        };
        simulator.window.push_back(sample);
        for index in 1..capacity {
            sample = simulator.next_sample(&sample, first_at + spacing * index as i32);
            simulator.window.push_back(sample);
        }
        simulator
    }

    pub fn tick(&mut self, now: DateTime<Utc>) -> MetricSample {
        let previous = self.latest();
        let sample = self.next_sample(&previous, now);
        if self.window.len() >= self.config.window.max(1) {
            self.window.pop_front();
        }
        self.window.push_back(sample);
        self.ticks += 1;
        sample
    }

    pub fn latest(&self) -> MetricSample {
        // new() always leaves at least one sample in the window
        self.window[self.window.len() - 1]
    }

    /// Oldest first.
    pub fn window(&self) -> impl Iterator<Item = &MetricSample> + '_ {
        self.window.iter()
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn tick_count(&self) -> u64 {
        self.ticks
    }

    fn next_sample(&mut self, previous: &MetricSample, at: DateTime<Utc>) -> MetricSample {
        MetricSample {
            at,
            alignment: self.config.alignment.step(previous.alignment, &mut self.rng),
            revenue: self.config.revenue.step(previous.revenue, &mut self.rng),
            deals: self.config.deals.step(previous.deals, &mut self.rng),
            active_agents: self
                .config
                .active_agents
                .step(previous.active_agents, &mut self.rng),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_000 + ms)
            .single()
            .expect("valid test timestamp")
    }

    fn within(bounds: &WalkBounds, value: f64) -> bool {
        value >= bounds.min && value <= bounds.max
    }

    #[test]
    fn window_starts_full_and_stays_full() {
        let config = StreamingConfig::default();
        let mut simulator =
            StreamingMetricsSimulator::new(config, Duration::seconds(2), 1, ts(0));
        assert_eq!(simulator.len(), DEFAULT_WINDOW);
        assert_eq!(simulator.window().last().map(|s| s.at), Some(ts(0)));
        assert_eq!(simulator.window().next().map(|s| s.at), Some(ts(-18_000)));

        for step in 1..=25 {
            let sample = simulator.tick(ts(step * 2_000));
            assert_eq!(simulator.len(), DEFAULT_WINDOW);
            assert_eq!(simulator.latest(), sample);
        }
        assert_eq!(simulator.window().next().map(|s| s.at), Some(ts(32_000)));
    }

    #[test]
    fn walk_respects_bounds_and_step_size() {
        let config = StreamingConfig::default();
        let mut simulator =
            StreamingMetricsSimulator::new(config.clone(), Duration::seconds(2), 99, ts(0));
        let mut previous = simulator.latest();
        for step in 1..=500 {
            let sample = simulator.tick(ts(step * 2_000));
            assert!(within(&config.alignment, sample.alignment));
            assert!(within(&config.revenue, sample.revenue));
            assert!(within(&config.deals, sample.deals));
            assert!(within(&config.active_agents, sample.active_agents));
            assert!((sample.alignment - previous.alignment).abs() <= config.alignment.max_step);
            assert_eq!(sample.deals.fract(), 0.0);
            assert_eq!(sample.active_agents.fract(), 0.0);
            previous = sample;
        }
    }

    #[test]
    fn initial_value_outside_bounds_is_clamped() {
        let mut config = StreamingConfig::default();
        config.alignment.initial = 140.0;
        let simulator = StreamingMetricsSimulator::new(config, Duration::seconds(2), 1, ts(0));
        let first = simulator.window().next().copied().expect("first sample");
        assert_eq!(first.alignment, 100.0);
    }

    #[test]
    fn same_seed_reproduces_series() {
        let build = || {
            let mut simulator = StreamingMetricsSimulator::new(
                StreamingConfig::default(),
                Duration::seconds(2),
                1234,
                ts(0),
            );
            (1..=5).map(|step| simulator.tick(ts(step * 2_000))).collect::<Vec<_>>()
        };
        assert_eq!(build(), build());
    }
}
