pub mod activity;
pub mod config;
pub mod gamification;
pub mod lifecycle;
pub mod notify;
pub mod ops;
pub mod scheduler;
pub mod streaming;
pub mod summary;
pub mod telemetry;

pub use activity::{ActivityDraft, ActivityEventLog, DEFAULT_ACTIVITY_CAPACITY};
pub use config::{ConfigError, OpsConfig, OpsError, SchedulerCadence, MAX_INTERVAL_MS};
pub use gamification::{
    default_badge_catalog, Badge, BadgeRule, GamificationConfig, GamificationEngine,
    GamificationError, LevelTable, SessionCounters, XpFeedback, XpGain, XpState,
};
pub use lifecycle::{AgentLifecycleController, LifecycleConfig, LifecycleError, LifecycleSnapshot};
pub use notify::{
    Celebration, Channel, DispatchReport, Notification, NotificationBackends, NotificationConfig,
    NotificationDispatcher, NotifyError, PermissionPrompt, PushBackend, PushOutcome,
    PushPermission, PushStatus, SoundBackend, SoundOutcome, SoundUnavailable, SpeechBackend,
    SpeechOutcome, SpeechPriority, Tone, Utterance,
};
pub use ops::{AgentOps, OpsSnapshot, TickReport};
pub use scheduler::{Scheduler, SchedulerError, TimerId};
pub use streaming::{MetricSample, StreamingConfig, StreamingMetricsSimulator, WalkBounds};
pub use summary::{parse_summary, BackendSummary, SummaryBoard, SummaryConfig, SummaryError};
pub use telemetry::{TelemetryConfig, TelemetrySimulator, VitalsRegime};
