use aoc_ops::{
    NotificationBackends, PermissionPrompt, PushBackend, PushPermission, SoundBackend,
    SoundUnavailable, SpeechBackend, SpeechPriority, Tone, Utterance,
};
use std::future::Future;
use std::io::{self, IsTerminal, Write};
use tracing::info;

/// No speech engine is available headless; utterances are echoed instead.
#[derive(Debug, Default)]
pub struct EchoSpeech;

impl SpeechBackend for EchoSpeech {
    fn speak(&mut self, utterance: &Utterance) {
        let marker = match utterance.priority {
            SpeechPriority::High => "voice!",
            SpeechPriority::Normal => "voice",
        };
        info!(event = "speech", text = %utterance.text);
        println!("  {marker}> {}", utterance.text);
    }

    // echo completes synchronously so there is never anything to cancel
    fn cancel(&mut self) {}

    fn is_speaking(&self) -> bool {
        false
    }
}

#[derive(Debug, Default)]
pub struct StdoutPush;

impl PushBackend for StdoutPush {
    fn send(&mut self, title: &str, body: &str) {
        info!(event = "push_sent", title = %title);
        if body.is_empty() {
            println!("  push> {title}");
        } else {
            println!("  push> {title}: {body}");
        }
    }
}

/// Rings the terminal bell on stderr. Without a terminal there is no audio.
#[derive(Debug)]
pub struct TerminalBell {
    attached: bool,
}

impl TerminalBell {
    pub fn detect() -> Self {
        Self {
            attached: io::stderr().is_terminal(),
        }
    }
}

impl SoundBackend for TerminalBell {
    fn play(&mut self, tone: Tone) -> Result<(), SoundUnavailable> {
        if !self.attached {
            return Err(SoundUnavailable("stderr is not a terminal".to_string()));
        }
        let mut stderr = io::stderr();
        let rings = if tone == Tone::LevelUp { 2 } else { 1 };
        for _ in 0..rings {
            stderr
                .write_all(b"\x07")
                .map_err(|err| SoundUnavailable(err.to_string()))?;
        }
        stderr
            .flush()
            .map_err(|err| SoundUnavailable(err.to_string()))
    }
}

pub fn terminal_backends() -> NotificationBackends {
    NotificationBackends {
        speech: Box::new(EchoSpeech),
        push: Box::new(StdoutPush),
        sound: Box::new(TerminalBell::detect()),
    }
}

/// Stands in for the desktop permission dialog with a preconfigured answer.
#[derive(Debug, Clone, Copy)]
pub struct PresetPrompt {
    pub answer: PushPermission,
}

impl PermissionPrompt for PresetPrompt {
    fn prompt(&mut self) -> impl Future<Output = PushPermission> {
        let answer = self.answer;
        println!("  permission> desktop notifications: {}", answer.as_str());
        async move { answer }
    }
}
