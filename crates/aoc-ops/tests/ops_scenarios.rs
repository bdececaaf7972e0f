use aoc_core::summary_contracts::SummaryOrigin;
use aoc_core::{ActivityCategory, AgentId, AgentStatus};
use aoc_ops::{
    parse_summary, AgentOps, NotificationBackends, NotifyError, OpsConfig, OpsError,
    PermissionPrompt, PushBackend, PushPermission, PushStatus, SoundBackend, SoundUnavailable,
    SpeechBackend, SummaryError, Tone, Utterance, XpState,
};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

fn ts(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(1_700_000_000_000 + ms)
        .single()
        .expect("valid test timestamp")
}

#[derive(Default)]
struct Recorder {
    utterances: Vec<Utterance>,
    pushes: Vec<(String, String)>,
    tones: Vec<Tone>,
    prompts: usize,
}

type Shared = Rc<RefCell<Recorder>>;

struct RecordingSpeech(Shared);
struct RecordingPush(Shared);
struct RecordingSound(Shared);

impl SpeechBackend for RecordingSpeech {
    fn speak(&mut self, utterance: &Utterance) {
        self.0.borrow_mut().utterances.push(utterance.clone());
    }

    fn cancel(&mut self) {}

    fn is_speaking(&self) -> bool {
        false
    }
}

impl PushBackend for RecordingPush {
    fn send(&mut self, title: &str, body: &str) {
        self.0
            .borrow_mut()
            .pushes
            .push((title.to_string(), body.to_string()));
    }
}

impl SoundBackend for RecordingSound {
    fn play(&mut self, tone: Tone) -> Result<(), SoundUnavailable> {
        self.0.borrow_mut().tones.push(tone);
        Ok(())
    }
}

struct AnswerWith(PushPermission, Shared);

impl PermissionPrompt for AnswerWith {
    fn prompt(&mut self) -> impl Future<Output = PushPermission> {
        self.1.borrow_mut().prompts += 1;
        let answer = self.0;
        async move { answer }
    }
}

fn recording_ops(config: OpsConfig) -> (AgentOps, Shared) {
    let recorder: Shared = Rc::default();
    let backends = NotificationBackends {
        speech: Box::new(RecordingSpeech(recorder.clone())),
        push: Box::new(RecordingPush(recorder.clone())),
        sound: Box::new(RecordingSound(recorder.clone())),
    };
    let ops = AgentOps::new(config, backends, ts(0)).expect("ops");
    (ops, recorder)
}

fn messages(ops: &AgentOps) -> Vec<String> {
    ops.activity().iter().map(|event| event.message.clone()).collect()
}

#[test]
fn toggling_running_guardian_stops_it_and_logs_one_command() {
    let (mut ops, _) = recording_ops(OpsConfig::default());
    let status = ops.toggle_agent(AgentId::Guardian).expect("toggle");
    assert_eq!(status, AgentStatus::Stopped);
    assert_eq!(ops.activity().len(), 1);
    let head = ops.activity().get(0).expect("head event");
    assert_eq!(head.category, ActivityCategory::Command);
    assert_eq!(head.message, "Guardian agent stopped");

    ops.advance_to(ts(1_200));
    let vitals = ops.vitals_for(AgentId::Guardian).expect("vitals");
    assert_eq!(vitals.bpm, 0);
    assert!(vitals.is_flat());
}

#[test]
fn level_up_scenario_celebrates_exactly_once() {
    let mut config = OpsConfig::default();
    config.gamification.initial = XpState {
        xp: 2_450,
        level: 7,
        ..XpState::default()
    };
    let (mut ops, recorder) = recording_ops(config);
    // level 7 already satisfies the level-5 badge at construction
    assert!(ops.unlocked_badges().iter().any(|badge| badge.id == "veteran"));
    assert!(recorder.borrow().tones.is_empty());

    let gain = ops.gain_xp(1_200, "test");
    assert_eq!(gain.xp, 3_650);
    assert_eq!(gain.level_after, 8);
    assert!(gain.leveled_up());

    let level_ups = recorder
        .borrow()
        .tones
        .iter()
        .filter(|tone| **tone == Tone::LevelUp)
        .count();
    assert_eq!(level_ups, 1);
    assert_eq!(ops.xp_state().level, 8);
    assert_eq!(ops.xp_state().xp, 3_650);
    assert!(!recorder.borrow().tones.contains(&Tone::Badge));
    assert!(messages(&ops)
        .iter()
        .any(|message| message == "Level 8 reached! +1200 XP (test)"));
}

#[test]
fn restart_reaches_running_only_at_deadline_and_announces_completion() {
    let (mut ops, recorder) = recording_ops(OpsConfig::default());
    ops.restart_agent(AgentId::Dealflow).expect("restart");
    assert_eq!(ops.status(AgentId::Dealflow), AgentStatus::Configuring);
    assert!(matches!(
        ops.restart_agent(AgentId::Dealflow),
        Err(OpsError::Lifecycle(_))
    ));

    ops.advance_to(ts(1_200));
    let vitals = ops.vitals_for(AgentId::Dealflow).expect("vitals");
    assert!((40..60).contains(&vitals.bpm));

    ops.advance_to(ts(2_000));
    assert_eq!(ops.status(AgentId::Dealflow), AgentStatus::Running);
    assert_eq!(
        messages(&ops),
        vec![
            "Agent restarted: Dealflow agent is back online".to_string(),
            "Restarting Dealflow agent...".to_string(),
        ]
    );
    let spoken = recorder
        .borrow()
        .utterances
        .iter()
        .map(|u| u.text.clone())
        .collect::<Vec<_>>();
    assert_eq!(spoken, vec!["Dealflow agent is back online".to_string()]);
    assert!(recorder.borrow().tones.contains(&Tone::Success));
}

#[test]
fn restart_all_logs_one_aggregated_start_and_completion() {
    let (mut ops, _) = recording_ops(OpsConfig::default());
    ops.restart_agent(AgentId::Revenue).expect("single restart");
    ops.restart_all_agents().expect("restart all");
    assert!(matches!(
        ops.restart_all_agents(),
        Err(OpsError::Lifecycle(_))
    ));
    assert!(ops
        .statuses()
        .values()
        .all(|status| *status == AgentStatus::Configuring));

    let report = ops.advance_to(ts(3_000));
    assert!(report.bulk_restart_completed);
    assert!(report.restarts_completed.is_empty());
    assert!(ops.statuses().values().all(|status| status.is_running()));

    let log = messages(&ops);
    let starts = log
        .iter()
        .filter(|m| m.as_str() == "Restarting all agents...")
        .count();
    let completions = log
        .iter()
        .filter(|m| m.starts_with("All agents restarted"))
        .count();
    assert_eq!((starts, completions), (1, 1));
}

#[test]
fn teardown_cancels_every_timer_and_freezes_the_clockwork() {
    let (mut ops, _) = recording_ops(OpsConfig::default());
    ops.restart_agent(AgentId::Portfolio).expect("restart");
    let live = ops.periodic_task_count() + ops.pending_timer_count();
    assert_eq!(live, 4);

    assert_eq!(ops.teardown(), live);
    assert!(ops.is_torn_down());
    assert!(ops.next_deadline().is_none());

    let before = ops.vitals().clone();
    let report = ops.advance_to(ts(60_000));
    assert!(report.is_idle());
    assert_eq!(ops.vitals(), &before);
    assert_eq!(ops.status(AgentId::Portfolio), AgentStatus::Configuring);
}

#[test]
fn failed_summary_fetch_only_touches_the_board() {
    let (mut ops, _) = recording_ops(OpsConfig::default());
    let live = parse_summary(
        r#"{"agentClusters": [{"name": "Revenue", "count": 2}], "alignment": 91, "alerts": {"critical": 1}}"#,
    )
    .expect("parse");
    assert_eq!(ops.apply_summary(Ok(live)), SummaryOrigin::Live);
    ops.gain_xp(40, "warmup");

    let xp = ops.xp_state().clone();
    let vitals = ops.vitals().clone();
    let log_len = ops.activity().len();

    let origin = ops.apply_summary(Err(SummaryError::Network("connection refused".into())));
    assert_eq!(origin, SummaryOrigin::Fallback);
    assert_eq!(ops.summary().alignment_pct, 94.0);
    assert_eq!(ops.xp_state(), &xp);
    assert_eq!(ops.vitals(), &vitals);
    assert_eq!(ops.activity().len(), log_len);
    assert_eq!(ops.summary_board().consecutive_failures(), 1);
}

#[test]
fn live_alignment_unlocks_alignment_badge() {
    let (mut ops, recorder) = recording_ops(OpsConfig::default());
    let live = parse_summary(r#"{"agentClusters": [], "alignment": "96%", "alerts": {}}"#)
        .expect("parse");
    ops.apply_summary(Ok(live));
    assert!(ops
        .unlocked_badges()
        .iter()
        .any(|badge| badge.id == "perfectly-aligned"));
    assert!(recorder.borrow().tones.contains(&Tone::Badge));
}

#[test]
fn identical_alerts_are_spoken_once() {
    let (mut ops, recorder) = recording_ops(OpsConfig::default());
    ops.notify("Alert", "Guardian heartbeat lost", ActivityCategory::Alert);
    ops.notify("Alert", "Guardian heartbeat lost", ActivityCategory::Alert);
    ops.notify("Note", "Quarter closed", ActivityCategory::Info);
    assert_eq!(recorder.borrow().utterances.len(), 1);
    assert_eq!(ops.activity().len(), 3);
}

#[test]
fn streak_check_ins_count_consecutive_days() {
    let (mut ops, _) = recording_ops(OpsConfig::default());
    let day = |d| NaiveDate::from_ymd_opt(2024, 3, d).expect("date");
    assert_eq!(ops.record_check_in(day(1)), 1);
    assert_eq!(ops.record_check_in(day(1)), 1);
    assert_eq!(ops.record_check_in(day(2)), 2);
    assert_eq!(ops.record_check_in(day(5)), 1);
    assert_eq!(ops.activity().len(), 3);
}

#[tokio::test]
async fn granted_permission_sends_confirmation_and_enables_push() {
    let (mut ops, recorder) = recording_ops(OpsConfig::default());
    ops.notify("Alert", "before permission", ActivityCategory::Alert);
    assert!(recorder.borrow().pushes.is_empty());

    let mut prompt = AnswerWith(PushPermission::Granted, recorder.clone());
    let outcome = ops
        .request_push_permission(&mut prompt)
        .await
        .expect("granted");
    assert_eq!(outcome, PushPermission::Granted);
    assert_eq!(ops.push_status(), PushStatus::Ready);
    assert_eq!(recorder.borrow().pushes.len(), 1);

    ops.notify("Alert", "after permission", ActivityCategory::Alert);
    assert_eq!(recorder.borrow().pushes.len(), 2);
}

#[tokio::test]
async fn denied_permission_is_never_prompted_again() {
    let (mut ops, recorder) = recording_ops(OpsConfig::default());
    let mut prompt = AnswerWith(PushPermission::Denied, recorder.clone());
    let first = ops.request_push_permission(&mut prompt).await;
    assert!(matches!(first, Ok(PushPermission::Denied)));
    assert_eq!(ops.push_status(), PushStatus::Blocked);

    prompt.0 = PushPermission::Granted;
    let second = ops.request_push_permission(&mut prompt).await;
    assert!(matches!(
        second,
        Err(OpsError::Notify(NotifyError::PushBlocked))
    ));
    assert_eq!(recorder.borrow().prompts, 1);

    ops.notify("Alert", "still blocked", ActivityCategory::Alert);
    assert!(recorder.borrow().pushes.is_empty());
}
