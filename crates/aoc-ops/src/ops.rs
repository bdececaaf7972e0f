use crate::activity::{ActivityDraft, ActivityEventLog};
use crate::config::{OpsConfig, OpsError};
use crate::gamification::{
    Badge, GamificationEngine, SessionCounters, XpFeedback, XpGain, XpState,
};
use crate::lifecycle::AgentLifecycleController;
use crate::notify::{
    Celebration, Channel, DispatchReport, Notification, NotificationBackends,
    NotificationDispatcher, PermissionPrompt, PushPermission, PushStatus,
};
use crate::scheduler::{millis, Scheduler, TimerId};
use crate::streaming::{MetricSample, StreamingMetricsSimulator};
use crate::summary::{BackendSummary, SummaryBoard, SummaryError};
use crate::telemetry::TelemetrySimulator;
use aoc_core::summary_contracts::{DashboardSummary, SummaryOrigin};
use aoc_core::{ActivityCategory, ActivityEvent, AgentId, AgentStatus, Vitals};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

pub const TELEMETRY_TASK: &str = "telemetry";
pub const STREAMING_TASK: &str = "streaming-metrics";
pub const SUMMARY_TASK: &str = "summary-refresh";

const BADGE_ICON: &str = "award";
const BADGE_COLOR: &str = "amber";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpsJob {
    TelemetryTick,
    MetricsTick,
    SummaryRefresh,
    CompleteRestart(AgentId),
    CompleteRestartAll,
}

/// What happened during one [`AgentOps::advance_to`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub telemetry_ticks: u32,
    pub metric_ticks: u32,
    pub restarts_completed: Vec<AgentId>,
    pub bulk_restart_completed: bool,
    pub summary_refresh_due: bool,
}

impl TickReport {
    pub fn is_idle(&self) -> bool {
        *self == TickReport::default()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpsSnapshot {
    pub at: DateTime<Utc>,
    pub statuses: BTreeMap<AgentId, AgentStatus>,
    pub vitals: BTreeMap<AgentId, Vitals>,
    pub xp: XpState,
    pub level_progress: f64,
    pub counters: SessionCounters,
    pub activity: Vec<ActivityEvent>,
    pub metrics: Vec<MetricSample>,
    pub summary: DashboardSummary,
    pub push_status: PushStatus,
}

/// Owns every component of the simulated operations core. All mutation goes
/// through `&mut self`, and time only moves through [`AgentOps::advance_to`].
pub struct AgentOps {
    config: OpsConfig,
    scheduler: Scheduler<OpsJob>,
    lifecycle: AgentLifecycleController,
    telemetry: TelemetrySimulator,
    metrics: StreamingMetricsSimulator,
    gamification: GamificationEngine,
    activity: ActivityEventLog,
    notifier: NotificationDispatcher,
    summary: SummaryBoard,
    counters: SessionCounters,
    pending_restarts: BTreeMap<AgentId, TimerId>,
    pending_bulk_restart: Option<TimerId>,
    last_celebration: Option<Celebration>,
}

impl AgentOps {
    pub fn new(
        config: OpsConfig,
        backends: NotificationBackends,
        now: DateTime<Utc>,
    ) -> Result<Self, OpsError> {
        config.validate()?;
        let mut gamification = GamificationEngine::new(&config.gamification)?;
        // restored progress may already satisfy rules; unlock without fanfare
        let restored = gamification.unlock_satisfied(
            &SessionCounters::default(),
            config.summary.fallback_alignment,
        );

        let mut scheduler = Scheduler::new(now);
        scheduler.start_periodic(
            TELEMETRY_TASK,
            millis(config.cadence.telemetry_ms),
            OpsJob::TelemetryTick,
        )?;
        scheduler.start_periodic(
            STREAMING_TASK,
            millis(config.cadence.streaming_ms),
            OpsJob::MetricsTick,
        )?;
        scheduler.start_periodic(
            SUMMARY_TASK,
            millis(config.cadence.summary_refresh_ms),
            OpsJob::SummaryRefresh,
        )?;

        let lifecycle = AgentLifecycleController::new();
        let mut telemetry = TelemetrySimulator::new(config.telemetry.clone(), config.seed);
        telemetry.tick(&lifecycle.snapshot(), now);
        let metrics = StreamingMetricsSimulator::new(
            config.streaming.clone(),
            millis(config.cadence.streaming_ms),
            config.seed.wrapping_add(1),
            now,
        );

        info!(
            event = "ops_started",
            seed = config.seed,
            agents = AgentId::ALL.len(),
            level = gamification.state().level,
            restored_badges = restored.len()
        );

        Ok(Self {
            scheduler,
            lifecycle,
            telemetry,
            metrics,
            gamification,
            activity: ActivityEventLog::new(config.activity_capacity),
            notifier: NotificationDispatcher::new(config.notifications.clone(), backends),
            summary: SummaryBoard::new(config.summary.clone()),
            counters: SessionCounters::default(),
            pending_restarts: BTreeMap::new(),
            pending_bulk_restart: None,
            last_celebration: None,
            config,
        })
    }

    /// Runs every job due up to `now`, in due order.
    pub fn advance_to(&mut self, now: DateTime<Utc>) -> TickReport {
        let mut report = TickReport::default();
        while let Some(fired) = self.scheduler.pop_due(now) {
            match fired.job {
                OpsJob::TelemetryTick => {
                    self.telemetry.tick(&self.lifecycle.snapshot(), fired.due);
                    report.telemetry_ticks += 1;
                }
                OpsJob::MetricsTick => {
                    self.metrics.tick(fired.due);
                    report.metric_ticks += 1;
                }
                OpsJob::SummaryRefresh => report.summary_refresh_due = true,
                OpsJob::CompleteRestart(id) => {
                    if self.finish_restart(id) {
                        report.restarts_completed.push(id);
                    }
                }
                OpsJob::CompleteRestartAll => {
                    report.bulk_restart_completed = self.finish_restart_all();
                }
            }
        }
        self.scheduler.settle(now);
        report
    }

    pub fn toggle_agent(&mut self, id: AgentId) -> Result<AgentStatus, OpsError> {
        let status = self.lifecycle.toggle(id)?;
        let verb = if status.is_running() {
            "started"
        } else {
            "stopped"
        };
        info!(event = "agent_toggled", agent_id = %id, status = status.as_str());
        self.append_activity(format!("{} agent {verb}", id.label()), ActivityCategory::Command);
        if status.is_running() {
            self.counters.agent_starts = self.counters.agent_starts.saturating_add(1);
            self.refresh_badges();
        }
        Ok(status)
    }

    pub fn restart_agent(&mut self, id: AgentId) -> Result<(), OpsError> {
        self.scheduler.ensure_running()?;
        self.lifecycle.begin_restart(id)?;
        let timer = self.scheduler.schedule_once(
            millis(self.config.lifecycle.restart_delay_ms),
            OpsJob::CompleteRestart(id),
        )?;
        self.pending_restarts.insert(id, timer);
        info!(event = "agent_restart_started", agent_id = %id);
        self.append_activity(
            format!("Restarting {} agent...", id.label()),
            ActivityCategory::Command,
        );
        Ok(())
    }

    pub fn restart_all_agents(&mut self) -> Result<(), OpsError> {
        self.scheduler.ensure_running()?;
        let superseded = self.lifecycle.begin_restart_all()?;
        for (id, timer) in std::mem::take(&mut self.pending_restarts) {
            self.scheduler.cancel(timer);
            debug!(event = "agent_restart_superseded", agent_id = %id);
        }
        let timer = self.scheduler.schedule_once(
            millis(self.config.lifecycle.restart_all_delay_ms),
            OpsJob::CompleteRestartAll,
        )?;
        self.pending_bulk_restart = Some(timer);
        info!(
            event = "agent_restart_all_started",
            superseded = superseded.len()
        );
        self.append_activity("Restarting all agents...", ActivityCategory::Command);
        Ok(())
    }

    /// Credits exactly `amount`, then re-evaluates badges. Unlocking never
    /// pays XP on its own.
    pub fn gain_xp(&mut self, amount: u64, reason: impl Into<String>) -> XpGain {
        let gain = self.award_xp(amount, reason.into());
        self.refresh_badges();
        gain
    }

    /// Pays out an unlocked badge's reward once, through the normal gain path.
    pub fn claim_badge_reward(&mut self, badge_id: &str) -> Result<XpGain, OpsError> {
        let badge = self.gamification.claim_reward(badge_id)?;
        Ok(self.gain_xp(badge.xp_reward, format!("badge {}", badge.name)))
    }

    pub fn append_activity(&mut self, message: impl Into<String>, category: ActivityCategory) -> u64 {
        self.activity
            .append(ActivityDraft::new(category, message), self.scheduler.now())
    }

    pub fn notify(
        &mut self,
        title: impl Into<String>,
        body: impl Into<String>,
        category: ActivityCategory,
    ) -> DispatchReport {
        self.dispatch(Notification::new(title, body, category))
    }

    pub fn complete_mission(&mut self, name: &str) -> XpGain {
        self.counters.missions_completed = self.counters.missions_completed.saturating_add(1);
        self.notify("Mission complete", name, ActivityCategory::Success);
        let amount = self.config.gamification.mission_xp;
        self.gain_xp(amount, format!("mission {name}"))
    }

    pub fn run_quick_action(&mut self, label: &str) -> XpGain {
        self.counters.quick_actions = self.counters.quick_actions.saturating_add(1);
        self.append_activity(format!("Quick action: {label}"), ActivityCategory::Command);
        let amount = self.config.gamification.quick_action_xp;
        self.gain_xp(amount, label)
    }

    pub fn record_check_in(&mut self, date: NaiveDate) -> u32 {
        let new_day = self
            .gamification
            .state()
            .last_check_in
            .map(|last| date > last)
            .unwrap_or(true);
        let streak = self.gamification.record_check_in(date);
        if new_day {
            self.append_activity(
                format!("Daily check-in: {streak}-day streak"),
                ActivityCategory::Info,
            );
        }
        self.refresh_badges();
        streak
    }

    pub async fn request_push_permission<P: PermissionPrompt>(
        &mut self,
        prompt: &mut P,
    ) -> Result<PushPermission, OpsError> {
        let outcome = self.notifier.request_push_permission(prompt).await?;
        match outcome {
            PushPermission::Granted => {
                self.append_activity("Desktop notifications enabled", ActivityCategory::Success);
            }
            PushPermission::Denied => {
                self.append_activity("Desktop notifications blocked", ActivityCategory::Alert);
            }
            PushPermission::Default => {}
        }
        Ok(outcome)
    }

    pub fn set_channel_enabled(&mut self, channel: Channel, enabled: bool) {
        self.notifier.set_enabled(channel, enabled);
    }

    /// Failures only ever touch the summary board.
    pub fn apply_summary(
        &mut self,
        result: Result<BackendSummary, SummaryError>,
    ) -> SummaryOrigin {
        let origin = self.summary.apply(result, self.scheduler.now());
        if origin == SummaryOrigin::Live {
            self.refresh_badges();
        }
        origin
    }

    /// Cancels every timer. Nothing fires afterwards.
    pub fn teardown(&mut self) -> usize {
        self.pending_restarts.clear();
        self.pending_bulk_restart = None;
        let cancelled = self.scheduler.shutdown();
        info!(event = "ops_teardown", cancelled = cancelled);
        cancelled
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.scheduler.now()
    }

    pub fn statuses(&self) -> &BTreeMap<AgentId, AgentStatus> {
        self.lifecycle.statuses()
    }

    pub fn status(&self, id: AgentId) -> AgentStatus {
        self.lifecycle.status(id)
    }

    pub fn vitals(&self) -> &BTreeMap<AgentId, Vitals> {
        self.telemetry.vitals()
    }

    pub fn vitals_for(&self, id: AgentId) -> Option<&Vitals> {
        self.telemetry.vitals_for(id)
    }

    pub fn xp_state(&self) -> &XpState {
        self.gamification.state()
    }

    pub fn level_progress(&self) -> f64 {
        self.gamification.level_progress()
    }

    pub fn unlocked_badges(&self) -> Vec<&Badge> {
        self.gamification.unlocked_badges()
    }

    pub fn unclaimed_rewards(&self) -> Vec<&Badge> {
        self.gamification.unclaimed_rewards()
    }

    pub fn activity(&self) -> &ActivityEventLog {
        &self.activity
    }

    pub fn metrics_window(&self) -> Vec<MetricSample> {
        self.metrics.window().copied().collect()
    }

    pub fn summary(&self) -> &DashboardSummary {
        self.summary.current()
    }

    pub fn summary_board(&self) -> &SummaryBoard {
        &self.summary
    }

    pub fn push_status(&self) -> PushStatus {
        self.notifier.push_status()
    }

    pub fn last_celebration(&self) -> Option<&Celebration> {
        self.last_celebration.as_ref()
    }

    pub fn counters(&self) -> SessionCounters {
        self.counters
    }

    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.scheduler.next_deadline()
    }

    pub fn is_torn_down(&self) -> bool {
        self.scheduler.is_shut_down()
    }

    pub fn periodic_task_count(&self) -> usize {
        self.scheduler.periodic_count()
    }

    pub fn pending_timer_count(&self) -> usize {
        self.scheduler.pending_count()
    }

    pub fn snapshot_view(&self) -> OpsSnapshot {
        OpsSnapshot {
            at: self.scheduler.now(),
            statuses: self.lifecycle.statuses().clone(),
            vitals: self.telemetry.vitals().clone(),
            xp: self.gamification.state().clone(),
            level_progress: self.gamification.level_progress(),
            counters: self.counters,
            activity: self.activity.to_vec(),
            metrics: self.metrics_window(),
            summary: self.summary.current().clone(),
            push_status: self.notifier.push_status(),
        }
    }

    fn dispatch(&mut self, notification: Notification) -> DispatchReport {
        self.append_activity(notification.activity_message(), notification.category);
        info!(
            event = "notify",
            category = notification.category.as_str(),
            title = %notification.title
        );
        self.notifier.dispatch(&notification)
    }

    fn award_xp(&mut self, amount: u64, reason: String) -> XpGain {
        let gain = self.gamification.gain_xp(amount, reason);
        let (message, celebration) = match gain.feedback {
            XpFeedback::LevelUp { level } => (
                format!("Level {level} reached! +{} XP ({})", gain.amount, gain.reason),
                Celebration::LevelUp { level },
            ),
            XpFeedback::Coin => (
                format!("+{} XP: {}", gain.amount, gain.reason),
                Celebration::Coin { amount },
            ),
        };
        self.append_activity(message, ActivityCategory::Info);
        self.celebrate(celebration);
        gain
    }

    fn celebrate(&mut self, celebration: Celebration) {
        self.notifier.celebrate(&celebration);
        self.last_celebration = Some(celebration);
    }

    fn refresh_badges(&mut self) {
        let alignment = self.summary.current().alignment_pct;
        for badge in self.gamification.unlock_satisfied(&self.counters, alignment) {
            let draft = ActivityDraft::new(
                ActivityCategory::Success,
                format!("Badge unlocked: {} ({})", badge.name, badge.description),
            )
            .with_icon(BADGE_ICON)
            .with_color(BADGE_COLOR);
            self.activity.append(draft, self.scheduler.now());
            info!(event = "badge_celebrated", badge_id = %badge.id, xp_reward = badge.xp_reward);
            self.celebrate(Celebration::Badge { name: badge.name });
        }
    }

    fn finish_restart(&mut self, id: AgentId) -> bool {
        self.pending_restarts.remove(&id);
        if let Err(err) = self.lifecycle.complete_restart(id) {
            warn!(event = "agent_restart_dropped", agent_id = %id, error = %err);
            return false;
        }
        self.counters.restarts_completed = self.counters.restarts_completed.saturating_add(1);
        info!(event = "agent_restart_completed", agent_id = %id);
        self.notify(
            "Agent restarted",
            format!("{} agent is back online", id.label()),
            ActivityCategory::Success,
        );
        self.refresh_badges();
        true
    }

    fn finish_restart_all(&mut self) -> bool {
        self.pending_bulk_restart = None;
        if let Err(err) = self.lifecycle.complete_restart_all() {
            warn!(event = "agent_restart_all_dropped", error = %err);
            return false;
        }
        let count = AgentId::ALL.len();
        self.counters.restarts_completed = self
            .counters
            .restarts_completed
            .saturating_add(count as u32);
        info!(event = "agent_restart_all_completed", agents = count);
        self.notify(
            "All agents restarted",
            format!("All {count} agents are back online"),
            ActivityCategory::Success,
        );
        self.refresh_badges();
        true
    }
}
