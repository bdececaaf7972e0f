use aoc_core::{AgentId, AgentStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("agent {0} is configuring; wait for the restart to finish")]
    Configuring(AgentId),
    #[error("agent {0} is not configuring")]
    NotConfiguring(AgentId),
    #[error("a restart of all agents is already in progress")]
    BulkRestartInProgress,
    #[error("no restart of all agents is in progress")]
    NoBulkRestart,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LifecycleConfig {
    pub restart_delay_ms: u64,
    pub restart_all_delay_ms: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            restart_delay_ms: 2_000,
            restart_all_delay_ms: 3_000,
        }
    }
}

/// Frozen copy of every agent's status, taken once per telemetry tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleSnapshot {
    statuses: BTreeMap<AgentId, AgentStatus>,
}

impl LifecycleSnapshot {
    pub fn status(&self, id: AgentId) -> AgentStatus {
        self.statuses.get(&id).copied().unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (AgentId, AgentStatus)> + '_ {
        self.statuses.iter().map(|(id, status)| (*id, *status))
    }

    pub fn running_count(&self) -> usize {
        self.statuses
            .values()
            .filter(|status| status.is_running())
            .count()
    }
}

#[derive(Debug, Clone)]
pub struct AgentLifecycleController {
    statuses: BTreeMap<AgentId, AgentStatus>,
    bulk_restart: bool,
}

impl Default for AgentLifecycleController {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentLifecycleController {
    pub fn new() -> Self {
        let statuses = AgentId::ALL
            .iter()
            .map(|id| (*id, AgentStatus::Running))
            .collect();
        Self {
            statuses,
            bulk_restart: false,
        }
    }

    pub fn statuses(&self) -> &BTreeMap<AgentId, AgentStatus> {
        &self.statuses
    }

    pub fn status(&self, id: AgentId) -> AgentStatus {
        self.statuses.get(&id).copied().unwrap_or_default()
    }

    pub fn is_bulk_restarting(&self) -> bool {
        self.bulk_restart
    }

    pub fn snapshot(&self) -> LifecycleSnapshot {
        LifecycleSnapshot {
            statuses: self.statuses.clone(),
        }
    }

    /// Flips running and stopped. A configuring agent is left alone and the
    /// request is rejected.
    pub fn toggle(&mut self, id: AgentId) -> Result<AgentStatus, LifecycleError> {
        let next = match self.status(id) {
            AgentStatus::Running => AgentStatus::Stopped,
            AgentStatus::Stopped => AgentStatus::Running,
            AgentStatus::Configuring => return Err(LifecycleError::Configuring(id)),
        };
        self.set(id, next);
        Ok(next)
    }

    pub fn begin_restart(&mut self, id: AgentId) -> Result<(), LifecycleError> {
        if self.status(id) == AgentStatus::Configuring {
            return Err(LifecycleError::Configuring(id));
        }
        self.set(id, AgentStatus::Configuring);
        Ok(())
    }

    pub fn complete_restart(&mut self, id: AgentId) -> Result<(), LifecycleError> {
        if self.status(id) != AgentStatus::Configuring {
            return Err(LifecycleError::NotConfiguring(id));
        }
        self.set(id, AgentStatus::Running);
        Ok(())
    }

    /// Moves every agent to configuring. Returns the agents that were already
    /// mid-restart; their single-agent completions are superseded.
    pub fn begin_restart_all(&mut self) -> Result<Vec<AgentId>, LifecycleError> {
        if self.bulk_restart {
            return Err(LifecycleError::BulkRestartInProgress);
        }
        let superseded = self
            .statuses
            .iter()
            .filter(|(_, status)| **status == AgentStatus::Configuring)
            .map(|(id, _)| *id)
            .collect::<Vec<_>>();
        for id in AgentId::ALL {
            self.set(id, AgentStatus::Configuring);
        }
        self.bulk_restart = true;
        Ok(superseded)
    }

    pub fn complete_restart_all(&mut self) -> Result<(), LifecycleError> {
        if !self.bulk_restart {
            return Err(LifecycleError::NoBulkRestart);
        }
        for id in AgentId::ALL {
            self.set(id, AgentStatus::Running);
        }
        self.bulk_restart = false;
        Ok(())
    }

    fn set(&mut self, id: AgentId, status: AgentStatus) {
        let previous = self.statuses.insert(id, status);
        debug!(
            event = "lifecycle_transition",
            agent_id = %id,
            from = previous.map(AgentStatus::as_str).unwrap_or("none"),
            to = status.as_str()
        );
    }
}
