use aoc_core::{ActivityCategory, AgentId};
use aoc_ops::Channel;
use std::str::FromStr;

pub const HELP: &str = "\
commands:
  toggle <agent>                  start or stop an agent
  restart <agent>                 restart one agent
  restart-all                     restart every agent
  xp <amount> [reason]            award experience points
  mission <name>                  complete a mission
  quick <label>                   run a quick action
  checkin                         record today's check-in
  claim <badge-id>                collect an unlocked badge's xp reward
  notify <kind> <title> | <body>  raise a notification
  push                            ask for desktop notification permission
  mute <channel> / unmute <channel>
  status                          print the full state as JSON
  quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Toggle(AgentId),
    Restart(AgentId),
    RestartAll,
    Xp { amount: u64, reason: String },
    Mission(String),
    Quick(String),
    CheckIn,
    Claim(String),
    Notify {
        category: ActivityCategory,
        title: String,
        body: String,
    },
    Push,
    SetChannel { channel: Channel, enabled: bool },
    Status,
    Help,
    Quit,
}

impl FromStr for Command {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let line = input.trim();
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };
        match verb.to_ascii_lowercase().as_str() {
            "" => Err("empty command".to_string()),
            "toggle" => Ok(Command::Toggle(parse_agent(rest)?)),
            "restart" => Ok(Command::Restart(parse_agent(rest)?)),
            "restart-all" | "restartall" => Ok(Command::RestartAll),
            "xp" => {
                let (amount, reason) = match rest.split_once(char::is_whitespace) {
                    Some((amount, reason)) => (amount, reason.trim()),
                    None => (rest, ""),
                };
                if amount.is_empty() {
                    return Err("usage: xp <amount> [reason]".to_string());
                }
                let amount = amount
                    .parse::<u64>()
                    .map_err(|_| format!("invalid xp amount: {amount}"))?;
                let reason = if reason.is_empty() { "manual" } else { reason };
                Ok(Command::Xp {
                    amount,
                    reason: reason.to_string(),
                })
            }
            "mission" => Ok(Command::Mission(required(rest, "usage: mission <name>")?)),
            "quick" => Ok(Command::Quick(required(rest, "usage: quick <label>")?)),
            "checkin" | "check-in" => Ok(Command::CheckIn),
            "claim" => Ok(Command::Claim(
                required(rest, "usage: claim <badge-id>")?.to_ascii_lowercase(),
            )),
            "notify" => parse_notify(rest),
            "push" => Ok(Command::Push),
            "mute" | "unmute" => Ok(Command::SetChannel {
                channel: rest.parse::<Channel>()?,
                enabled: verb.eq_ignore_ascii_case("unmute"),
            }),
            "status" => Ok(Command::Status),
            "help" | "?" => Ok(Command::Help),
            "quit" | "exit" => Ok(Command::Quit),
            other => Err(format!("unknown command: {other} (try `help`)")),
        }
    }
}

fn parse_agent(input: &str) -> Result<AgentId, String> {
    if input.is_empty() {
        return Err("missing agent name".to_string());
    }
    input.parse::<AgentId>()
}

fn required(input: &str, usage: &str) -> Result<String, String> {
    if input.is_empty() {
        Err(usage.to_string())
    } else {
        Ok(input.to_string())
    }
}

fn parse_notify(rest: &str) -> Result<Command, String> {
    const USAGE: &str = "usage: notify <kind> <title> | <body>";
    let (kind, text) = rest
        .split_once(char::is_whitespace)
        .ok_or_else(|| USAGE.to_string())?;
    let category = kind.parse::<ActivityCategory>()?;
    let (title, body) = match text.split_once('|') {
        Some((title, body)) => (title.trim(), body.trim()),
        None => (text.trim(), ""),
    };
    if title.is_empty() && body.is_empty() {
        return Err(USAGE.to_string());
    }
    Ok(Command::Notify {
        category,
        title: title.to_string(),
        body: body.to_string(),
    })
}
