use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::info;

pub const DEFAULT_LEVEL_THRESHOLDS: [u64; 11] =
    [0, 100, 300, 600, 1000, 1500, 2100, 2800, 3600, 4500, 5500];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GamificationError {
    #[error("invalid level thresholds: {0}")]
    InvalidThresholds(String),
    #[error("initial level {level} outside 1..={max}")]
    InvalidInitialLevel { level: u32, max: u32 },
    #[error("duplicate badge id: {0}")]
    DuplicateBadge(String),
    #[error("unknown badge: {0}")]
    UnknownBadge(String),
    #[error("badge {0} is still locked")]
    BadgeLocked(String),
    #[error("reward for badge {0} was already claimed")]
    RewardClaimed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelTable {
    thresholds: Vec<u64>,
}

impl Default for LevelTable {
    fn default() -> Self {
        Self {
            thresholds: DEFAULT_LEVEL_THRESHOLDS.to_vec(),
        }
    }
}

impl LevelTable {
    pub fn new(thresholds: Vec<u64>) -> Result<Self, GamificationError> {
        if thresholds.len() < 2 {
            return Err(GamificationError::InvalidThresholds(format!(
                "need at least 2 breakpoints, got {}",
                thresholds.len()
            )));
        }
        if let Some(pair) = thresholds.windows(2).find(|pair| pair[0] >= pair[1]) {
            return Err(GamificationError::InvalidThresholds(format!(
                "breakpoints must ascend strictly ({} then {})",
                pair[0], pair[1]
            )));
        }
        Ok(Self { thresholds })
    }

    pub fn max_level(&self) -> u32 {
        (self.thresholds.len() - 1) as u32
    }

    /// XP at which `level` begins.
    pub fn floor(&self, level: u32) -> Option<u64> {
        self.thresholds.get(level as usize).copied()
    }

    pub fn progress_percent(&self, xp: u64, level: u32) -> f64 {
        let (Some(floor), Some(ceiling)) = (self.floor(level), self.floor(level + 1)) else {
            return 100.0;
        };
        let span = ceiling.saturating_sub(floor) as f64;
        if span <= 0.0 {
            return 100.0;
        }
        let earned = xp as f64 - floor as f64;
        (earned / span * 100.0).clamp(0.0, 100.0)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionCounters {
    pub agent_starts: u32,
    pub restarts_completed: u32,
    pub missions_completed: u32,
    pub quick_actions: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct XpState {
    pub xp: u64,
    pub level: u32,
    pub streak: u32,
    pub last_check_in: Option<NaiveDate>,
    pub unlocked_badges: BTreeSet<String>,
    pub claimed_rewards: BTreeSet<String>,
}

impl Default for XpState {
    fn default() -> Self {
        Self {
            xp: 0,
            level: 1,
            streak: 0,
            last_check_in: None,
            unlocked_badges: BTreeSet::new(),
            claimed_rewards: BTreeSet::new(),
        }
    }
}

pub struct BadgeContext<'a> {
    pub state: &'a XpState,
    pub counters: &'a SessionCounters,
    pub alignment_pct: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum BadgeRule {
    MinXp(u64),
    MinLevel(u32),
    MinStreak(u32),
    AgentStarts(u32),
    RestartsCompleted(u32),
    MissionsCompleted(u32),
    QuickActions(u32),
    MinAlignment(f64),
}

impl BadgeRule {
    pub fn is_satisfied(&self, ctx: &BadgeContext<'_>) -> bool {
        match self {
            BadgeRule::MinXp(xp) => ctx.state.xp >= *xp,
            BadgeRule::MinLevel(level) => ctx.state.level >= *level,
            BadgeRule::MinStreak(days) => ctx.state.streak >= *days,
            BadgeRule::AgentStarts(count) => ctx.counters.agent_starts >= *count,
            BadgeRule::RestartsCompleted(count) => ctx.counters.restarts_completed >= *count,
            BadgeRule::MissionsCompleted(count) => ctx.counters.missions_completed >= *count,
            BadgeRule::QuickActions(count) => ctx.counters.quick_actions >= *count,
            BadgeRule::MinAlignment(pct) => ctx.alignment_pct >= *pct,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Badge {
    pub id: String,
    pub name: String,
    pub description: String,
    pub xp_reward: u64,
    pub rule: BadgeRule,
}

impl Badge {
    fn new(id: &str, name: &str, description: &str, xp_reward: u64, rule: BadgeRule) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            xp_reward,
            rule,
        }
    }
}

pub fn default_badge_catalog() -> Vec<Badge> {
    vec![
        Badge::new(
            "ignition",
            "Ignition",
            "Bring a stopped agent back online",
            25,
            BadgeRule::AgentStarts(1),
        ),
        Badge::new(
            "mechanic",
            "Mechanic",
            "Complete 5 agent restarts",
            50,
            BadgeRule::RestartsCompleted(5),
        ),
        Badge::new(
            "mission-ace",
            "Mission Ace",
            "Complete 3 missions",
            100,
            BadgeRule::MissionsCompleted(3),
        ),
        Badge::new(
            "on-fire",
            "On Fire",
            "Check in 7 days in a row",
            75,
            BadgeRule::MinStreak(7),
        ),
        Badge::new(
            "perfectly-aligned",
            "Perfectly Aligned",
            "Reach 95% alignment",
            50,
            BadgeRule::MinAlignment(95.0),
        ),
        Badge::new(
            "veteran",
            "Veteran",
            "Reach level 5",
            150,
            BadgeRule::MinLevel(5),
        ),
        Badge::new(
            "quick-draw",
            "Quick Draw",
            "Run 10 quick actions",
            30,
            BadgeRule::QuickActions(10),
        ),
    ]
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GamificationConfig {
    pub thresholds: Vec<u64>,
    pub initial: XpState,
    pub badges: Vec<Badge>,
    pub quick_action_xp: u64,
    pub mission_xp: u64,
}

impl Default for GamificationConfig {
    fn default() -> Self {
        Self {
            thresholds: DEFAULT_LEVEL_THRESHOLDS.to_vec(),
            initial: XpState::default(),
            badges: default_badge_catalog(),
            quick_action_xp: 10,
            mission_xp: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum XpFeedback {
    LevelUp { level: u32 },
    Coin,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XpGain {
    pub amount: u64,
    pub reason: String,
    pub xp: u64,
    pub level_before: u32,
    pub level_after: u32,
    pub feedback: XpFeedback,
}

impl XpGain {
    pub fn leveled_up(&self) -> bool {
        matches!(self.feedback, XpFeedback::LevelUp { .. })
    }
}

#[derive(Debug, Clone)]
pub struct GamificationEngine {
    table: LevelTable,
    catalog: Vec<Badge>,
    state: XpState,
}

impl GamificationEngine {
    pub fn new(config: &GamificationConfig) -> Result<Self, GamificationError> {
        let table = LevelTable::new(config.thresholds.clone())?;
        let max = table.max_level();
        if config.initial.level == 0 || config.initial.level > max {
            return Err(GamificationError::InvalidInitialLevel {
                level: config.initial.level,
                max,
            });
        }
        let mut seen = BTreeSet::new();
        for badge in &config.badges {
            if !seen.insert(badge.id.as_str()) {
                return Err(GamificationError::DuplicateBadge(badge.id.clone()));
            }
        }
        let mut state = config.initial.clone();
        // restored unlocks must still name a catalog badge
        state
            .unlocked_badges
            .retain(|id| config.badges.iter().any(|badge| &badge.id == id));
        let unlocked = state.unlocked_badges.clone();
        state.claimed_rewards.retain(|id| unlocked.contains(id));
        Ok(Self {
            table,
            catalog: config.badges.clone(),
            state,
        })
    }

    pub fn state(&self) -> &XpState {
        &self.state
    }

    pub fn table(&self) -> &LevelTable {
        &self.table
    }

    pub fn catalog(&self) -> &[Badge] {
        &self.catalog
    }

    pub fn level_progress(&self) -> f64 {
        self.table.progress_percent(self.state.xp, self.state.level)
    }

    /// Adds `amount` and climbs at most one level per call.
    pub fn gain_xp(&mut self, amount: u64, reason: impl Into<String>) -> XpGain {
        let reason = reason.into();
        let level_before = self.state.level;
        self.state.xp = self.state.xp.saturating_add(amount);

        let next_floor = self.table.floor(level_before + 1);
        let feedback = match next_floor {
            Some(floor) if level_before < self.table.max_level() && self.state.xp >= floor => {
                self.state.level = level_before + 1;
                XpFeedback::LevelUp {
                    level: self.state.level,
                }
            }
            _ => XpFeedback::Coin,
        };

        info!(
            event = "xp_gain",
            amount = amount,
            reason = %reason,
            xp = self.state.xp,
            level = self.state.level
        );

        XpGain {
            amount,
            reason,
            xp: self.state.xp,
            level_before,
            level_after: self.state.level,
            feedback,
        }
    }

    pub fn record_check_in(&mut self, date: NaiveDate) -> u32 {
        self.state.streak = match self.state.last_check_in {
            Some(last) if last == date => self.state.streak,
            Some(last) if last.succ_opt() == Some(date) => self.state.streak.saturating_add(1),
            Some(last) if last > date => self.state.streak,
            _ => 1,
        };
        if self
            .state
            .last_check_in
            .map(|last| date > last)
            .unwrap_or(true)
        {
            self.state.last_check_in = Some(date);
        }
        self.state.streak
    }

    /// Evaluates every locked badge's rule and unlocks the satisfied ones.
    /// Returns only the badges unlocked by this call.
    pub fn unlock_satisfied(&mut self, counters: &SessionCounters, alignment_pct: f64) -> Vec<Badge> {
        let ctx = BadgeContext {
            state: &self.state,
            counters,
            alignment_pct,
        };
        let newly = self
            .catalog
            .iter()
            .filter(|badge| !ctx.state.unlocked_badges.contains(&badge.id))
            .filter(|badge| badge.rule.is_satisfied(&ctx))
            .cloned()
            .collect::<Vec<_>>();
        for badge in &newly {
            info!(event = "badge_unlocked", badge_id = %badge.id);
            self.state.unlocked_badges.insert(badge.id.clone());
        }
        newly
    }

    /// Marks an unlocked badge's reward as paid out. The caller credits the
    /// returned badge's `xp_reward`.
    pub fn claim_reward(&mut self, badge_id: &str) -> Result<Badge, GamificationError> {
        let badge = self
            .catalog
            .iter()
            .find(|badge| badge.id == badge_id)
            .cloned()
            .ok_or_else(|| GamificationError::UnknownBadge(badge_id.to_string()))?;
        if !self.state.unlocked_badges.contains(&badge.id) {
            return Err(GamificationError::BadgeLocked(badge.id));
        }
        if !self.state.claimed_rewards.insert(badge.id.clone()) {
            return Err(GamificationError::RewardClaimed(badge.id));
        }
        info!(event = "badge_reward_claimed", badge_id = %badge.id, xp_reward = badge.xp_reward);
        Ok(badge)
    }

    pub fn unclaimed_rewards(&self) -> Vec<&Badge> {
        self.catalog
            .iter()
            .filter(|badge| self.state.unlocked_badges.contains(&badge.id))
            .filter(|badge| !self.state.claimed_rewards.contains(&badge.id))
            .filter(|badge| badge.xp_reward > 0)
            .collect()
    }

    pub fn is_unlocked(&self, badge_id: &str) -> bool {
        self.state.unlocked_badges.contains(badge_id)
    }

    pub fn unlocked_badges(&self) -> Vec<&Badge> {
        self.catalog
            .iter()
            .filter(|badge| self.state.unlocked_badges.contains(&badge.id))
            .collect()
    }
}
