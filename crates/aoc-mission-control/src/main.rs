mod backends;
mod commands;
mod settings;

use anyhow::Result;
use aoc_ops::{parse_summary, AgentOps, BackendSummary, SummaryError};
use backends::{terminal_backends, PresetPrompt};
use chrono::{Local, Utc};
use clap::Parser;
use commands::{Command, HELP};
use settings::{load_settings, parse_bool_flag, Args};
use std::io;
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DRIVE_INTERVAL_MS: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging();
    let settings = load_settings(&args)?;
    let timeout_ms = settings.ops.summary.fetch_timeout_ms;
    let mut prompt = PresetPrompt {
        answer: settings.push_answer,
    };
    let mut ops = AgentOps::new(settings.ops, terminal_backends(), Utc::now())?;
    info!(
        event = "mission_control_started",
        summary_source = settings
            .summary_file
            .as_deref()
            .map(|path| path.display().to_string())
            .unwrap_or_default()
    );
    println!("mission control ready; type `help` for commands");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut driver = tokio::time::interval(Duration::from_millis(DRIVE_INTERVAL_MS));
    let deadline = settings
        .run_for
        .map(|run_for| tokio::time::Instant::now() + run_for);
    let mut printed_up_to = 0u64;

    loop {
        tokio::select! {
            _ = driver.tick() => {
                let report = ops.advance_to(Utc::now());
                if report.summary_refresh_due {
                    let result = fetch_summary(settings.summary_file.as_deref(), timeout_ms).await;
                    ops.apply_summary(result);
                }
            }
            line = lines.next_line(), if stdin_open => {
                match line {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        match line.parse::<Command>() {
                            Ok(command) => {
                                if execute(&mut ops, &mut prompt, command).await? == Flow::Quit {
                                    break;
                                }
                            }
                            Err(err) => eprintln!("{err}"),
                        }
                    }
                    Ok(None) => {
                        stdin_open = false;
                        if deadline.is_none() {
                            break;
                        }
                    }
                    Err(err) => {
                        warn!(event = "stdin_error", error = %err);
                        stdin_open = false;
                        if deadline.is_none() {
                            break;
                        }
                    }
                }
            }
            _ = wait_for(deadline) => break,
        }
        print_new_activity(&ops, &mut printed_up_to);
    }

    print_new_activity(&ops, &mut printed_up_to);
    let cancelled = ops.teardown();
    info!(event = "mission_control_stopped", cancelled = cancelled);
    Ok(())
}

async fn execute(ops: &mut AgentOps, prompt: &mut PresetPrompt, command: Command) -> Result<Flow> {
    let outcome = match command {
        Command::Toggle(id) => ops.toggle_agent(id).map(|_| ()),
        Command::Restart(id) => ops.restart_agent(id),
        Command::RestartAll => ops.restart_all_agents(),
        Command::Xp { amount, reason } => {
            ops.gain_xp(amount, reason);
            Ok(())
        }
        Command::Mission(name) => {
            ops.complete_mission(&name);
            Ok(())
        }
        Command::Quick(label) => {
            ops.run_quick_action(&label);
            Ok(())
        }
        Command::CheckIn => {
            ops.record_check_in(Local::now().date_naive());
            Ok(())
        }
        Command::Claim(badge_id) => ops.claim_badge_reward(&badge_id).map(|_| ()),
        Command::Notify {
            category,
            title,
            body,
        } => {
            ops.notify(title, body, category);
            Ok(())
        }
        Command::Push => ops.request_push_permission(prompt).await.map(|_| ()),
        Command::SetChannel { channel, enabled } => {
            ops.set_channel_enabled(channel, enabled);
            Ok(())
        }
        Command::Status => {
            println!("{}", serde_json::to_string_pretty(&ops.snapshot_view())?);
            Ok(())
        }
        Command::Help => {
            println!("{HELP}");
            Ok(())
        }
        Command::Quit => return Ok(Flow::Quit),
    };
    if let Err(err) = outcome {
        warn!(event = "command_rejected", error = %err);
        eprintln!("rejected: {err}");
    }
    Ok(Flow::Continue)
}

async fn fetch_summary(
    source: Option<&Path>,
    timeout_ms: u64,
) -> Result<BackendSummary, SummaryError> {
    let Some(path) = source else {
        return Err(SummaryError::Network(
            "no summary source configured".to_string(),
        ));
    };
    let read = tokio::fs::read_to_string(path);
    match tokio::time::timeout(Duration::from_millis(timeout_ms), read).await {
        Err(_) => Err(SummaryError::Timeout(timeout_ms)),
        Ok(Err(err)) => Err(SummaryError::Network(err.to_string())),
        Ok(Ok(raw)) => parse_summary(&raw),
    }
}

async fn wait_for(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}

fn print_new_activity(ops: &AgentOps, printed_up_to: &mut u64) {
    let fresh = ops
        .activity()
        .iter()
        .filter(|event| event.id > *printed_up_to)
        .collect::<Vec<_>>();
    for event in fresh.iter().rev() {
        println!(
            "[{}] {:<7} {}",
            event.timestamp.with_timezone(&Local).format("%H:%M:%S"),
            event.category.as_str(),
            event.message
        );
    }
    if let Some(latest) = fresh.first() {
        *printed_up_to = latest.id;
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_enabled = std::env::var("AOC_LOG_STDOUT")
        .ok()
        .and_then(|value| parse_bool_flag(&value))
        .unwrap_or(false);
    if stdout_enabled {
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    } else {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::sink)
            .try_init();
    }
}
