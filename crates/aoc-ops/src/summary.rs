use aoc_core::summary_contracts::{
    AgentCluster, AlertCounts, DashboardSummary, SummaryOrigin, SummaryPayload,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SummaryError {
    #[error("summary request failed: {0}")]
    Network(String),
    #[error("summary request timed out after {0}ms")]
    Timeout(u64),
    #[error("summary endpoint returned status {0}")]
    Status(u16),
    #[error("malformed summary payload: {0}")]
    Malformed(String),
    #[error("summary payload missing field: {0}")]
    MissingField(&'static str),
}

impl SummaryError {
    pub fn kind(&self) -> &'static str {
        match self {
            SummaryError::Network(_) => "network",
            SummaryError::Timeout(_) => "timeout",
            SummaryError::Status(_) => "status",
            SummaryError::Malformed(_) => "malformed",
            SummaryError::MissingField(_) => "missing_field",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BackendSummary {
    pub clusters: Vec<AgentCluster>,
    pub alignment_pct: f64,
    pub alerts: AlertCounts,
}

pub fn parse_summary(raw: &str) -> Result<BackendSummary, SummaryError> {
    let payload: SummaryPayload =
        serde_json::from_str(raw).map_err(|err| SummaryError::Malformed(err.to_string()))?;
    let clusters = payload
        .agent_clusters
        .ok_or(SummaryError::MissingField("agentClusters"))?;
    let alignment_pct = payload
        .alignment
        .ok_or(SummaryError::MissingField("alignment"))?;
    if !alignment_pct.is_finite() || !(0.0..=100.0).contains(&alignment_pct) {
        return Err(SummaryError::Malformed(format!(
            "alignment out of range: {alignment_pct}"
        )));
    }
    let alerts = payload.alerts.ok_or(SummaryError::MissingField("alerts"))?;
    Ok(BackendSummary {
        clusters: clusters.into_iter().map(AgentCluster::from).collect(),
        alignment_pct,
        alerts: alerts.into(),
    })
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SummaryConfig {
    pub fallback_clusters: Vec<AgentCluster>,
    pub fallback_alignment: f64,
    pub fallback_alerts: AlertCounts,
    pub fetch_timeout_ms: u64,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        let cluster = |name: &str, count| AgentCluster {
            name: name.to_string(),
            count,
        };
        Self {
            fallback_clusters: vec![
                cluster("Revenue", 3),
                cluster("Portfolio", 2),
                cluster("Guardian", 4),
                cluster("Dealflow", 3),
            ],
            fallback_alignment: 94.0,
            fallback_alerts: AlertCounts {
                critical: 0,
                warning: 2,
                info: 5,
            },
            fetch_timeout_ms: 4_000,
        }
    }
}

impl SummaryConfig {
    pub fn fallback(&self) -> DashboardSummary {
        DashboardSummary {
            clusters: self.fallback_clusters.clone(),
            alignment_pct: self.fallback_alignment,
            alerts: self.fallback_alerts,
            origin: SummaryOrigin::Fallback,
            updated_at: None,
        }
    }
}

/// Display state for the backend summary. Failures are absorbed here and
/// never leave this type.
#[derive(Debug, Clone)]
pub struct SummaryBoard {
    config: SummaryConfig,
    current: DashboardSummary,
    consecutive_failures: u32,
    total_failures: u64,
    last_error: Option<SummaryError>,
}

impl SummaryBoard {
    pub fn new(config: SummaryConfig) -> Self {
        Self {
            current: config.fallback(),
            config,
            consecutive_failures: 0,
            total_failures: 0,
            last_error: None,
        }
    }

    pub fn apply(
        &mut self,
        result: Result<BackendSummary, SummaryError>,
        now: DateTime<Utc>,
    ) -> SummaryOrigin {
        match result {
            Ok(summary) => {
                self.current = DashboardSummary {
                    clusters: summary.clusters,
                    alignment_pct: summary.alignment_pct,
                    alerts: summary.alerts,
                    origin: SummaryOrigin::Live,
                    updated_at: Some(now),
                };
                self.consecutive_failures = 0;
                self.last_error = None;
            }
            Err(err) => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                self.total_failures = self.total_failures.saturating_add(1);
                info!(
                    event = "summary_fallback",
                    kind = err.kind(),
                    consecutive = self.consecutive_failures,
                    error = %err
                );
                self.current = self.config.fallback();
                self.last_error = Some(err);
            }
        }
        self.current.origin
    }

    pub fn current(&self) -> &DashboardSummary {
        &self.current
    }

    pub fn origin(&self) -> SummaryOrigin {
        self.current.origin
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn total_failures(&self) -> u64 {
        self.total_failures
    }

    pub fn last_error(&self) -> Option<&SummaryError> {
        self.last_error.as_ref()
    }

    pub fn config(&self) -> &SummaryConfig {
        &self.config
    }
}
