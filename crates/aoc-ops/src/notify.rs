use aoc_core::ActivityCategory;
use serde::{Deserialize, Serialize};
use std::future::Future;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NotifyError {
    #[error("desktop notifications were denied for this session")]
    PushBlocked,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("audio backend unavailable: {0}")]
pub struct SoundUnavailable(pub String);

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Speech,
    Push,
    Sound,
}

impl Channel {
    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Speech => "speech",
            Channel::Push => "push",
            Channel::Sound => "sound",
        }
    }
}

impl std::str::FromStr for Channel {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_lowercase().as_str() {
            "speech" | "voice" => Ok(Channel::Speech),
            "push" | "desktop" => Ok(Channel::Push),
            "sound" | "audio" => Ok(Channel::Sound),
            other => Err(format!("Unknown channel: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum Tone {
    LevelUp,
    Badge,
    Success,
    Coin,
    Alert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToneSpec {
    pub frequency_hz: u32,
    pub duration_ms: u32,
}

impl Tone {
    pub fn as_str(self) -> &'static str {
        match self {
            Tone::LevelUp => "levelUp",
            Tone::Badge => "badge",
            Tone::Success => "success",
            Tone::Coin => "coin",
            Tone::Alert => "alert",
        }
    }

    pub fn spec(self) -> ToneSpec {
        let (frequency_hz, duration_ms) = match self {
            Tone::LevelUp => (1_046, 420),
            Tone::Badge => (880, 300),
            Tone::Success => (660, 180),
            Tone::Coin => (1_318, 90),
            Tone::Alert => (220, 350),
        };
        ToneSpec {
            frequency_hz,
            duration_ms,
        }
    }

    pub fn for_category(category: ActivityCategory) -> Option<Tone> {
        match category {
            ActivityCategory::Success => Some(Tone::Success),
            ActivityCategory::Alert => Some(Tone::Alert),
            ActivityCategory::Info | ActivityCategory::Command => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SpeechPriority {
    Normal,
    High,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    pub text: String,
    pub priority: SpeechPriority,
}

pub trait SpeechBackend {
    fn speak(&mut self, utterance: &Utterance);
    fn cancel(&mut self);
    fn is_speaking(&self) -> bool;
}

pub trait PushBackend {
    fn send(&mut self, title: &str, body: &str);
}

pub trait SoundBackend {
    fn play(&mut self, tone: Tone) -> Result<(), SoundUnavailable>;
}

/// The user-facing permission dialog. Resolves once with the user's choice.
pub trait PermissionPrompt {
    fn prompt(&mut self) -> impl Future<Output = PushPermission>;
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PushPermission {
    #[default]
    Default,
    Granted,
    Denied,
}

impl PushPermission {
    pub fn as_str(self) -> &'static str {
        match self {
            PushPermission::Default => "default",
            PushPermission::Granted => "granted",
            PushPermission::Denied => "denied",
        }
    }
}

impl std::str::FromStr for PushPermission {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_lowercase().as_str() {
            "default" | "prompt" => Ok(PushPermission::Default),
            "granted" | "allow" => Ok(PushPermission::Granted),
            "denied" | "deny" | "block" => Ok(PushPermission::Denied),
            other => Err(format!("Unknown permission: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PushStatus {
    Disabled,
    NeedsPermission,
    Ready,
    Blocked,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NotificationConfig {
    pub speech_enabled: bool,
    pub push_enabled: bool,
    pub sound_enabled: bool,
    pub push_confirmation_title: String,
    pub push_confirmation_body: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            speech_enabled: true,
            push_enabled: true,
            sound_enabled: true,
            push_confirmation_title: "Notifications enabled".to_string(),
            push_confirmation_body: "Agent alerts will appear on this desktop".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub category: ActivityCategory,
    pub tone: Option<Tone>,
}

impl Notification {
    pub fn new(
        title: impl Into<String>,
        body: impl Into<String>,
        category: ActivityCategory,
    ) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            category,
            tone: Tone::for_category(category),
        }
    }

    pub fn with_tone(mut self, tone: Tone) -> Self {
        self.tone = Some(tone);
        self
    }

    /// What the speech channel reads out, and what dedupe compares.
    pub fn spoken_text(&self) -> &str {
        if self.body.trim().is_empty() {
            &self.title
        } else {
            &self.body
        }
    }

    pub fn activity_message(&self) -> String {
        if self.body.trim().is_empty() {
            self.title.clone()
        } else if self.title.trim().is_empty() {
            self.body.clone()
        } else {
            format!("{}: {}", self.title, self.body)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Celebration {
    LevelUp { level: u32 },
    Coin { amount: u64 },
    Badge { name: String },
}

impl Celebration {
    pub fn tone(&self) -> Tone {
        match self {
            Celebration::LevelUp { .. } => Tone::LevelUp,
            Celebration::Coin { .. } => Tone::Coin,
            Celebration::Badge { .. } => Tone::Badge,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechOutcome {
    Spoken { preempted: bool },
    Duplicate,
    Disabled,
    NotOffered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Sent,
    Disabled,
    NotPermitted,
    NotOffered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundOutcome {
    Played(Tone),
    Disabled,
    Unavailable,
    Silent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    pub speech: SpeechOutcome,
    pub push: PushOutcome,
    pub sound: SoundOutcome,
}

pub struct NotificationBackends {
    pub speech: Box<dyn SpeechBackend>,
    pub push: Box<dyn PushBackend>,
    pub sound: Box<dyn SoundBackend>,
}

impl NotificationBackends {
    pub fn silent() -> Self {
        Self {
            speech: Box::new(NullSpeech),
            push: Box::new(NullPush),
            sound: Box::new(NullSound),
        }
    }
}

struct NullSpeech;

impl SpeechBackend for NullSpeech {
    fn speak(&mut self, _utterance: &Utterance) {}

    fn cancel(&mut self) {}

    fn is_speaking(&self) -> bool {
        false
    }
}

struct NullPush;

impl PushBackend for NullPush {
    fn send(&mut self, _title: &str, _body: &str) {}
}

struct NullSound;

impl SoundBackend for NullSound {
    fn play(&mut self, _tone: Tone) -> Result<(), SoundUnavailable> {
        Err(SoundUnavailable("no audio backend".to_string()))
    }
}

#[derive(Debug, Clone, Default)]
struct SpeechChannel {
    enabled: bool,
    last_spoken: Option<String>,
}

#[derive(Debug, Clone, Default)]
struct PushChannel {
    enabled: bool,
    permission: PushPermission,
    confirmation_sent: bool,
}

pub struct NotificationDispatcher {
    config: NotificationConfig,
    backends: NotificationBackends,
    speech: SpeechChannel,
    push: PushChannel,
    sound_enabled: bool,
}

impl NotificationDispatcher {
    pub fn new(config: NotificationConfig, backends: NotificationBackends) -> Self {
        Self {
            speech: SpeechChannel {
                enabled: config.speech_enabled,
                last_spoken: None,
            },
            push: PushChannel {
                enabled: config.push_enabled,
                permission: PushPermission::Default,
                confirmation_sent: false,
            },
            sound_enabled: config.sound_enabled,
            backends,
            config,
        }
    }

    /// Alerts and successes go to speech and push; every category gets its
    /// tone, if it has one.
    pub fn dispatch(&mut self, notification: &Notification) -> DispatchReport {
        let external = notification.category.reaches_external_channels();
        let speech = if external {
            let priority = if notification.category == ActivityCategory::Alert {
                SpeechPriority::High
            } else {
                SpeechPriority::Normal
            };
            self.offer_speech(notification.spoken_text(), priority)
        } else {
            SpeechOutcome::NotOffered
        };
        let push = if external {
            self.offer_push(&notification.title, &notification.body)
        } else {
            PushOutcome::NotOffered
        };
        let sound = match notification.tone {
            Some(tone) => self.offer_sound(tone),
            None => SoundOutcome::Silent,
        };
        debug!(
            event = "notification_dispatched",
            category = notification.category.as_str(),
            speech = ?speech,
            push = ?push,
            sound = ?sound
        );
        DispatchReport {
            speech,
            push,
            sound,
        }
    }

    /// Celebrations bypass category fan-out. Badges also reach push.
    pub fn celebrate(&mut self, celebration: &Celebration) -> DispatchReport {
        let sound = self.offer_sound(celebration.tone());
        let (speech, push) = match celebration {
            Celebration::LevelUp { level } => (
                self.offer_speech(
                    &format!("Level up! You reached level {level}"),
                    SpeechPriority::Normal,
                ),
                PushOutcome::NotOffered,
            ),
            Celebration::Coin { .. } => (SpeechOutcome::NotOffered, PushOutcome::NotOffered),
            Celebration::Badge { name } => (
                self.offer_speech(&format!("Badge unlocked: {name}"), SpeechPriority::Normal),
                self.offer_push("Badge unlocked", name),
            ),
        };
        DispatchReport {
            speech,
            push,
            sound,
        }
    }

    /// Only ever called from an explicit user action. A denial is final for
    /// the session.
    pub async fn request_push_permission<P: PermissionPrompt>(
        &mut self,
        prompt: &mut P,
    ) -> Result<PushPermission, NotifyError> {
        match self.push.permission {
            PushPermission::Denied => return Err(NotifyError::PushBlocked),
            PushPermission::Granted => return Ok(PushPermission::Granted),
            PushPermission::Default => {}
        }

        let outcome = prompt.prompt().await;
        self.push.permission = outcome;
        match outcome {
            PushPermission::Granted => {
                info!(event = "push_permission", outcome = outcome.as_str());
                if !self.push.confirmation_sent {
                    self.backends.push.send(
                        &self.config.push_confirmation_title,
                        &self.config.push_confirmation_body,
                    );
                    self.push.confirmation_sent = true;
                }
            }
            PushPermission::Denied => {
                warn!(event = "push_permission", outcome = outcome.as_str());
            }
            PushPermission::Default => {
                debug!(event = "push_permission", outcome = outcome.as_str());
            }
        }
        Ok(outcome)
    }

    pub fn push_permission(&self) -> PushPermission {
        self.push.permission
    }

    pub fn push_status(&self) -> PushStatus {
        match (self.push.permission, self.push.enabled) {
            (PushPermission::Denied, _) => PushStatus::Blocked,
            (_, false) => PushStatus::Disabled,
            (PushPermission::Default, true) => PushStatus::NeedsPermission,
            (PushPermission::Granted, true) => PushStatus::Ready,
        }
    }

    pub fn is_enabled(&self, channel: Channel) -> bool {
        match channel {
            Channel::Speech => self.speech.enabled,
            Channel::Push => self.push.enabled,
            Channel::Sound => self.sound_enabled,
        }
    }

    pub fn set_enabled(&mut self, channel: Channel, enabled: bool) {
        match channel {
            Channel::Speech => {
                if !enabled && self.backends.speech.is_speaking() {
                    self.backends.speech.cancel();
                }
                self.speech.enabled = enabled;
            }
            Channel::Push => self.push.enabled = enabled,
            Channel::Sound => self.sound_enabled = enabled,
        }
        info!(
            event = "channel_toggled",
            channel = channel.as_str(),
            enabled = enabled
        );
    }

    pub fn last_spoken(&self) -> Option<&str> {
        self.speech.last_spoken.as_deref()
    }

    fn offer_speech(&mut self, text: &str, priority: SpeechPriority) -> SpeechOutcome {
        if !self.speech.enabled {
            return SpeechOutcome::Disabled;
        }
        if self.speech.last_spoken.as_deref() == Some(text) {
            debug!(event = "speech_deduped");
            return SpeechOutcome::Duplicate;
        }
        let preempted = priority == SpeechPriority::High && self.backends.speech.is_speaking();
        if preempted {
            self.backends.speech.cancel();
        }
        self.backends.speech.speak(&Utterance {
            text: text.to_string(),
            priority,
        });
        self.speech.last_spoken = Some(text.to_string());
        SpeechOutcome::Spoken { preempted }
    }

    fn offer_push(&mut self, title: &str, body: &str) -> PushOutcome {
        if !self.push.enabled {
            return PushOutcome::Disabled;
        }
        if self.push.permission != PushPermission::Granted {
            return PushOutcome::NotPermitted;
        }
        self.backends.push.send(title, body);
        PushOutcome::Sent
    }

    fn offer_sound(&mut self, tone: Tone) -> SoundOutcome {
        if !self.sound_enabled {
            return SoundOutcome::Disabled;
        }
        match self.backends.sound.play(tone) {
            Ok(()) => SoundOutcome::Played(tone),
            Err(err) => {
                debug!(event = "sound_unavailable", tone = tone.as_str(), error = %err);
                SoundOutcome::Unavailable
            }
        }
    }
}
