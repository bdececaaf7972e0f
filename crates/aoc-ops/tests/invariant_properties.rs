use aoc_core::{ActivityCategory, AgentId, AgentStatus};
use aoc_ops::telemetry::PEAK_INDEX;
use aoc_ops::{
    ActivityDraft, ActivityEventLog, AgentLifecycleController, AgentOps, GamificationConfig,
    GamificationEngine, NotificationBackends, OpsConfig, TelemetryConfig, TelemetrySimulator,
    DEFAULT_ACTIVITY_CAPACITY,
};
use chrono::{DateTime, TimeZone, Utc};
use proptest::prelude::*;

fn ts(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(1_700_000_000_000 + ms)
        .single()
        .expect("valid test timestamp")
}

#[derive(Debug, Clone, Copy)]
enum LifecycleStep {
    Toggle(usize),
    BeginRestart(usize),
    CompleteRestart(usize),
    BeginRestartAll,
    CompleteRestartAll,
}

fn lifecycle_step() -> impl Strategy<Value = LifecycleStep> {
    prop_oneof![
        (0usize..4).prop_map(LifecycleStep::Toggle),
        (0usize..4).prop_map(LifecycleStep::BeginRestart),
        (0usize..4).prop_map(LifecycleStep::CompleteRestart),
        Just(LifecycleStep::BeginRestartAll),
        Just(LifecycleStep::CompleteRestartAll),
    ]
}

#[derive(Debug, Clone, Copy)]
enum OpsStep {
    Gain(u64),
    Toggle(usize),
    QuickAction,
    Mission,
}

fn ops_step() -> impl Strategy<Value = OpsStep> {
    prop_oneof![
        (0u64..2_000).prop_map(OpsStep::Gain),
        (0usize..4).prop_map(OpsStep::Toggle),
        Just(OpsStep::QuickAction),
        Just(OpsStep::Mission),
    ]
}

fn category() -> impl Strategy<Value = ActivityCategory> {
    prop_oneof![
        Just(ActivityCategory::Command),
        Just(ActivityCategory::Success),
        Just(ActivityCategory::Alert),
        Just(ActivityCategory::Info),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_xp_is_sum_of_gains_and_level_never_drops(
        amounts in proptest::collection::vec(0u64..2_000, 0..60)
    ) {
        let config = GamificationConfig {
            badges: Vec::new(),
            ..GamificationConfig::default()
        };
        let mut engine = GamificationEngine::new(&config).expect("engine");
        let max = engine.table().max_level();
        let mut expected = 0u64;
        let mut previous_level = engine.state().level;
        for amount in amounts {
            let gain = engine.gain_xp(amount, "prop");
            expected += amount;
            prop_assert_eq!(engine.state().xp, expected);
            prop_assert!(gain.level_after >= previous_level);
            prop_assert!(gain.level_after <= gain.level_before + 1);
            prop_assert!(engine.state().level <= max);
            let progress = engine.level_progress();
            prop_assert!((0.0..=100.0).contains(&progress));
            previous_level = gain.level_after;
        }
    }

    #[test]
    fn prop_facade_xp_counts_only_gains_with_default_badges(
        steps in proptest::collection::vec(ops_step(), 0..60)
    ) {
        let mut ops = AgentOps::new(OpsConfig::default(), NotificationBackends::silent(), ts(0))
            .expect("ops");
        let mut expected = 0u64;
        for step in steps {
            let gain = match step {
                OpsStep::Gain(amount) => Some(ops.gain_xp(amount, "prop")),
                OpsStep::Toggle(i) => {
                    ops.toggle_agent(AgentId::ALL[i]).expect("toggle");
                    None
                }
                OpsStep::QuickAction => Some(ops.run_quick_action("sync")),
                OpsStep::Mission => Some(ops.complete_mission("close")),
            };
            if let Some(gain) = gain {
                prop_assert!(gain.level_after <= gain.level_before + 1);
                expected += gain.amount;
            }
            // badges unlocked along the way never pay out by themselves
            prop_assert_eq!(ops.xp_state().xp, expected);
        }
    }

    #[test]
    fn prop_activity_log_is_capped_and_recency_ordered(
        entries in proptest::collection::vec((category(), "[a-z ]{0,24}"), 0..80)
    ) {
        let mut log = ActivityEventLog::default();
        for (offset, (category, message)) in entries.iter().enumerate() {
            log.append(ActivityDraft::new(*category, message.clone()), ts(offset as i64));
            prop_assert!(log.len() <= DEFAULT_ACTIVITY_CAPACITY);
            let ids = log.iter().map(|event| event.id).collect::<Vec<_>>();
            prop_assert!(ids.windows(2).all(|pair| pair[0] > pair[1]));
            prop_assert_eq!(log.latest().map(|event| event.message.as_str()), Some(message.as_str()));
        }
        prop_assert_eq!(log.len(), entries.len().min(DEFAULT_ACTIVITY_CAPACITY));
    }

    #[test]
    fn prop_vitals_follow_lifecycle_status(
        steps in proptest::collection::vec(lifecycle_step(), 0..40),
        seed in any::<u64>()
    ) {
        let config = TelemetryConfig::default();
        let mut controller = AgentLifecycleController::new();
        let mut simulator = TelemetrySimulator::new(config.clone(), seed);
        for (tick, step) in steps.into_iter().enumerate() {
            // rejected transitions leave the controller untouched
            let _ = match step {
                LifecycleStep::Toggle(i) => controller.toggle(AgentId::ALL[i]).map(|_| ()),
                LifecycleStep::BeginRestart(i) => controller.begin_restart(AgentId::ALL[i]),
                LifecycleStep::CompleteRestart(i) => controller.complete_restart(AgentId::ALL[i]),
                LifecycleStep::BeginRestartAll => controller.begin_restart_all().map(|_| ()),
                LifecycleStep::CompleteRestartAll => controller.complete_restart_all(),
            };
            let snapshot = controller.snapshot();
            let vitals = simulator.tick(&snapshot, ts(tick as i64 * 1_200)).clone();
            for (id, status) in snapshot.iter() {
                let agent = vitals.get(&id).expect("every agent has vitals");
                match status {
                    AgentStatus::Stopped => {
                        prop_assert_eq!(agent.bpm, 0);
                        prop_assert!(agent.is_flat());
                    }
                    AgentStatus::Configuring => {
                        prop_assert!((40..60).contains(&agent.bpm));
                        prop_assert!(agent.is_flat());
                    }
                    AgentStatus::Running => {
                        let baseline = config.baseline(id);
                        prop_assert!(agent.bpm + 5 >= baseline && agent.bpm <= baseline + 5);
                        prop_assert_eq!(agent.peak_index(), PEAK_INDEX);
                        prop_assert!(agent.waveform[PEAK_INDEX] >= 0.9);
                        prop_assert!(agent.waveform.iter().all(|v| (0.0..=1.0).contains(v)));
                    }
                }
            }
        }
    }
}
