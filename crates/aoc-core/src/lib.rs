pub mod summary_contracts;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const WAVEFORM_POINTS: usize = 8;

pub type Waveform = [f64; WAVEFORM_POINTS];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AgentId {
    Revenue,
    Portfolio,
    Guardian,
    Dealflow,
}

impl AgentId {
    pub const ALL: [AgentId; 4] = [
        AgentId::Revenue,
        AgentId::Portfolio,
        AgentId::Guardian,
        AgentId::Dealflow,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AgentId::Revenue => "revenue",
            AgentId::Portfolio => "portfolio",
            AgentId::Guardian => "guardian",
            AgentId::Dealflow => "dealflow",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AgentId::Revenue => "Revenue",
            AgentId::Portfolio => "Portfolio",
            AgentId::Guardian => "Guardian",
            AgentId::Dealflow => "Dealflow",
        }
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentId {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let normalized = input.trim().to_lowercase();
        match normalized.as_str() {
            "revenue" => Ok(AgentId::Revenue),
            "portfolio" => Ok(AgentId::Portfolio),
            "guardian" => Ok(AgentId::Guardian),
            "dealflow" | "deal-flow" | "deal_flow" => Ok(AgentId::Dealflow),
            other => Err(format!("Unknown agent: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Running,
    Stopped,
    Configuring,
}

impl Default for AgentStatus {
    fn default() -> Self {
        Self::Running
    }
}

impl AgentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AgentStatus::Running => "running",
            AgentStatus::Stopped => "stopped",
            AgentStatus::Configuring => "configuring",
        }
    }

    pub fn is_running(self) -> bool {
        matches!(self, AgentStatus::Running)
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentStatus {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let normalized = input.trim().to_lowercase();
        match normalized.as_str() {
            "running" => Ok(AgentStatus::Running),
            "stopped" => Ok(AgentStatus::Stopped),
            "configuring" => Ok(AgentStatus::Configuring),
            other => Err(format!("Unknown status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ActivityCategory {
    Command,
    Success,
    Alert,
    Info,
}

impl ActivityCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            ActivityCategory::Command => "command",
            ActivityCategory::Success => "success",
            ActivityCategory::Alert => "alert",
            ActivityCategory::Info => "info",
        }
    }

    pub fn icon_ref(self) -> &'static str {
        match self {
            ActivityCategory::Command => "terminal",
            ActivityCategory::Success => "check-circle",
            ActivityCategory::Alert => "alert-triangle",
            ActivityCategory::Info => "info",
        }
    }

    pub fn color_ref(self) -> &'static str {
        match self {
            ActivityCategory::Command => "blue",
            ActivityCategory::Success => "green",
            ActivityCategory::Alert => "red",
            ActivityCategory::Info => "slate",
        }
    }

    /// Alerts and successes leave the app; everything else stays in the activity log.
    pub fn reaches_external_channels(self) -> bool {
        matches!(self, ActivityCategory::Alert | ActivityCategory::Success)
    }
}

impl fmt::Display for ActivityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityCategory {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let normalized = input.trim().to_lowercase();
        match normalized.as_str() {
            "command" | "cmd" => Ok(ActivityCategory::Command),
            "success" | "ok" => Ok(ActivityCategory::Success),
            "alert" | "warning" | "warn" => Ok(ActivityCategory::Alert),
            "info" => Ok(ActivityCategory::Info),
            other => Err(format!("Unknown category: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Vitals {
    pub bpm: u32,
    pub waveform: Waveform,
    #[serde(rename = "lastUpdate")]
    pub last_update: DateTime<Utc>,
}

impl Vitals {
    pub fn is_flat(&self) -> bool {
        let first = self.waveform[0];
        self.waveform.iter().all(|sample| *sample == first)
    }

    pub fn peak_index(&self) -> usize {
        let mut best = 0;
        for (index, sample) in self.waveform.iter().enumerate() {
            if *sample > self.waveform[best] {
                best = index;
            }
        }
        best
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActivityEvent {
    pub id: u64,
    pub category: ActivityCategory,
    pub message: String,
    #[serde(rename = "iconRef")]
    pub icon_ref: String,
    #[serde(rename = "colorRef")]
    pub color_ref: String,
    pub timestamp: DateTime<Utc>,
}
