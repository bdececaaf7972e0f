use anyhow::{Context, Result};
use aoc_ops::{OpsConfig, PushPermission};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser, Debug, Default)]
#[command(
    name = "aoc-mission-control",
    about = "Headless console for the simulated agent operations core"
)]
pub struct Args {
    /// TOML file layered over the built-in defaults.
    #[arg(long)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub seed: Option<u64>,
    /// JSON file read on every summary refresh in place of the backend.
    #[arg(long)]
    pub summary_file: Option<PathBuf>,
    /// Answer given when desktop notification permission is requested.
    #[arg(long)]
    pub push_permission: Option<String>,
    #[arg(long, default_value_t = false)]
    pub no_voice: bool,
    #[arg(long, default_value_t = false)]
    pub no_sound: bool,
    #[arg(long, default_value_t = false)]
    pub no_push: bool,
    #[arg(long)]
    pub run_for_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub ops: OpsConfig,
    pub summary_file: Option<PathBuf>,
    pub push_answer: PushPermission,
    pub run_for: Option<Duration>,
}

pub fn load_settings(args: &Args) -> Result<Settings> {
    let mut ops = match args.config.clone().or_else(resolve_config_path) {
        Some(path) => load_config_file(&path)?,
        None => OpsConfig::default(),
    };
    if let Some(seed) = args.seed.or_else(resolve_seed) {
        ops.seed = seed;
    }
    if args.no_voice {
        ops.notifications.speech_enabled = false;
    }
    if args.no_sound {
        ops.notifications.sound_enabled = false;
    }
    if args.no_push {
        ops.notifications.push_enabled = false;
    }
    ops.validate().context("invalid operations config")?;

    let push_answer = match args.push_permission.clone().or_else(resolve_push_permission) {
        Some(value) => value
            .parse::<PushPermission>()
            .map_err(anyhow::Error::msg)?,
        None => PushPermission::Granted,
    };

    Ok(Settings {
        ops,
        summary_file: args.summary_file.clone().or_else(resolve_summary_file),
        push_answer,
        run_for: args.run_for_secs.map(Duration::from_secs),
    })
}

pub fn load_config_file(path: &Path) -> Result<OpsConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn resolve_config_path() -> Option<PathBuf> {
    non_empty_env("AOC_OPS_CONFIG").map(PathBuf::from)
}

fn resolve_seed() -> Option<u64> {
    non_empty_env("AOC_SEED").and_then(|value| value.parse::<u64>().ok())
}

fn resolve_summary_file() -> Option<PathBuf> {
    non_empty_env("AOC_SUMMARY_FILE").map(PathBuf::from)
}

fn resolve_push_permission() -> Option<String> {
    non_empty_env("AOC_PUSH_PERMISSION")
}

pub fn parse_bool_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
