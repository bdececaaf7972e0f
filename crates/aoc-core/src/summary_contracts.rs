use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Wire shape of the backend summary. Every field is optional here so that
/// missing data can be reported by name instead of as a generic decode error.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SummaryPayload {
    #[serde(default)]
    pub agent_clusters: Option<Vec<AgentClusterPayload>>,
    #[serde(default, deserialize_with = "deserialize_opt_number")]
    pub alignment: Option<f64>,
    #[serde(default)]
    pub alerts: Option<AlertCountsPayload>,
    #[serde(default, flatten)]
    pub extra: HashMap<String, Value>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct AgentClusterPayload {
    pub name: String,
    #[serde(deserialize_with = "deserialize_count")]
    pub count: u32,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct AlertCountsPayload {
    #[serde(default, deserialize_with = "deserialize_count")]
    pub critical: u32,
    #[serde(default, deserialize_with = "deserialize_count")]
    pub warning: u32,
    #[serde(default, deserialize_with = "deserialize_count")]
    pub info: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentCluster {
    pub name: String,
    pub count: u32,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AlertCounts {
    pub critical: u32,
    pub warning: u32,
    pub info: u32,
}

impl AlertCounts {
    pub fn total(&self) -> u32 {
        self.critical
            .saturating_add(self.warning)
            .saturating_add(self.info)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SummaryOrigin {
    Live,
    Fallback,
}

impl SummaryOrigin {
    pub fn as_str(self) -> &'static str {
        match self {
            SummaryOrigin::Live => "live",
            SummaryOrigin::Fallback => "fallback",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DashboardSummary {
    pub clusters: Vec<AgentCluster>,
    pub alignment_pct: f64,
    pub alerts: AlertCounts,
    pub origin: SummaryOrigin,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl DashboardSummary {
    pub fn agent_total(&self) -> u32 {
        self.clusters
            .iter()
            .fold(0u32, |total, cluster| total.saturating_add(cluster.count))
    }
}

impl From<AgentClusterPayload> for AgentCluster {
    fn from(payload: AgentClusterPayload) -> Self {
        Self {
            name: payload.name,
            count: payload.count,
        }
    }
}

impl From<AlertCountsPayload> for AlertCounts {
    fn from(payload: AlertCountsPayload) -> Self {
        Self {
            critical: payload.critical,
            warning: payload.warning,
            info: payload.info,
        }
    }
}

/// Accepts a number, a numeric string, or null.
fn deserialize_opt_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let val: Option<Value> = Option::deserialize(deserializer)?;
    match val {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_f64()
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom("number out of range")),
        Some(Value::String(s)) => s
            .trim()
            .trim_end_matches('%')
            .parse::<f64>()
            .map(Some)
            .map_err(serde::de::Error::custom),
        Some(_) => Err(serde::de::Error::custom("expected number or numeric string")),
    }
}

/// Deserialize a non-negative count that can be either a string or a number into a u32
fn deserialize_count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let val: Value = Value::deserialize(deserializer)?;
    match val {
        Value::String(s) => s.trim().parse::<u32>().map_err(serde::de::Error::custom),
        Value::Number(n) => n
            .as_u64()
            .and_then(|u| u32::try_from(u).ok())
            .ok_or_else(|| serde::de::Error::custom("invalid count")),
        _ => Err(serde::de::Error::custom("expected string or number for count")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_accepts_numeric_strings() {
        let payload: SummaryPayload = serde_json::from_str(
            r#"{
                "agentClusters": [{"name": "core", "count": "3"}],
                "alignment": "96.5%",
                "alerts": {"critical": 1, "warning": "2"},
                "generatedBy": "backend-v2"
            }"#,
        )
        .expect("payload decodes");

        assert_eq!(payload.alignment, Some(96.5));
        let clusters = payload.agent_clusters.expect("clusters");
        assert_eq!(clusters[0].count, 3);
        let alerts = AlertCounts::from(payload.alerts.expect("alerts"));
        assert_eq!(alerts.total(), 3);
        assert!(payload.extra.contains_key("generatedBy"));
    }

    #[test]
    fn payload_leaves_absent_fields_empty() {
        let payload: SummaryPayload = serde_json::from_str("{}").expect("empty object decodes");
        assert!(payload.agent_clusters.is_none());
        assert!(payload.alignment.is_none());
        assert!(payload.alerts.is_none());
    }

    #[test]
    fn negative_counts_are_rejected() {
        let result = serde_json::from_str::<AgentClusterPayload>(r#"{"name": "x", "count": -1}"#);
        assert!(result.is_err());
    }
}
