//! Line-oriented control console on stdin

use crate::scheduler::{RotationEvent, RotatorHandle, StatusSnapshot};
use crate::state::TimeUnit;
use crate::util::time::format_duration;
use anyhow::Result;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// One parsed console line
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Rotate,
    Enable,
    Disable,
    Interval { value: f64, unit: String },
    Status,
    Help,
    Quit,
}

/// Parse one line; blank lines yield `Ok(None)`
pub fn parse_command(line: &str) -> Result<Option<ConsoleCommand>, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };

    let command = match verb.to_ascii_lowercase().as_str() {
        "rotate" | "r" => ConsoleCommand::Rotate,
        "enable" | "on" => ConsoleCommand::Enable,
        "disable" | "off" => ConsoleCommand::Disable,
        "status" | "s" => ConsoleCommand::Status,
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" | "q" => ConsoleCommand::Quit,
        "interval" | "i" => {
            let value = words
                .next()
                .ok_or("usage: interval <value> <unit>")?
                .parse::<f64>()
                .map_err(|_| "interval value must be a number".to_string())?;
            let unit = words.next().ok_or("usage: interval <value> <unit>")?;
            ConsoleCommand::Interval {
                value,
                unit: unit.to_string(),
            }
        },
        other => return Err(format!("unknown command '{}'; try 'help'", other)),
    };

    if words.next().is_some() {
        return Err(format!("too many arguments for '{}'", verb));
    }
    Ok(Some(command))
}

/// Read commands until `quit` or end of input
///
/// `quit` requests shutdown; end of input only stops the console.
pub async fn run<R>(handle: RotatorHandle, input: R) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    println!("Type 'help' for commands.");

    loop {
        let line = tokio::select! {
            () = handle.cancelled() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            debug!("Console input closed");
            break;
        };

        let command = match parse_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(msg) => {
                println!("{}", msg);
                continue;
            },
        };

        if command == ConsoleCommand::Quit {
            println!("Shutting down...");
            handle.shutdown();
            break;
        }
        println!("{}", execute(&handle, command).await);
    }
    Ok(())
}

/// Apply a command and describe the result
pub async fn execute(handle: &RotatorHandle, command: ConsoleCommand) -> String {
    match command {
        ConsoleCommand::Rotate => {
            handle.rotate_now();
            "Rotation requested".to_string()
        },
        ConsoleCommand::Enable => {
            handle.set_enabled(true).await;
            "Rotation enabled".to_string()
        },
        ConsoleCommand::Disable => {
            handle.set_enabled(false).await;
            "Rotation disabled; daemons stopping".to_string()
        },
        ConsoleCommand::Interval { value, unit } => {
            match handle.set_interval_from(value, &unit).await {
                Ok(interval) => format!("Interval set to {}", interval),
                Err(e) => match unit.parse::<TimeUnit>() {
                    Ok(unit) => {
                        let (min, max) = unit.range();
                        format!("{} (valid {}: {} to {})", e, unit, min, max)
                    },
                    Err(_) => format!("{} (units: seconds, minutes, hours)", e),
                },
            }
        },
        ConsoleCommand::Status => format_status(&handle.snapshot().await),
        ConsoleCommand::Help => help_text(),
        ConsoleCommand::Quit => "Shutting down...".to_string(),
    }
}

pub fn format_status(status: &StatusSnapshot) -> String {
    let since = status
        .since_last_rotation_secs
        .map(|s| format!("{} ago", format_duration(Duration::from_secs(s))))
        .unwrap_or_else(|| "never".to_string());

    format!(
        "Rotation:      {} ({})\n\
         Interval:      {}\n\
         Rotations:     {} (last {})\n\
         Address:       {}\n\
         Tor:           {}\n\
         Proxy:         {}",
        if status.enabled { "enabled" } else { "disabled" },
        status.phase,
        format_duration(Duration::from_secs_f64(status.interval_secs)),
        status.rotations,
        since,
        status.last_address.as_deref().unwrap_or(crate::probe::UNKNOWN_ADDRESS),
        if status.tor_running { "running" } else { "stopped" },
        if status.proxy_running { "running" } else { "stopped" },
    )
}

fn help_text() -> String {
    let mut text = String::from(
        "Commands:\n  \
         rotate                   request a new identity now\n  \
         enable | disable         turn scheduled rotation on or off\n  \
         interval <value> <unit>  set the rotation interval\n  \
         status                   show current state\n  \
         quit                     stop daemons and exit\n\
         Interval ranges:",
    );
    for unit in [TimeUnit::Seconds, TimeUnit::Minutes, TimeUnit::Hours] {
        let (min, max) = unit.range();
        text.push_str(&format!("\n  {:<8} {} to {}", unit.as_str(), min, max));
    }
    text
}

/// Print loop events until the channel closes
pub async fn print_events(mut events: broadcast::Receiver<RotationEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => {
                if let Some(line) = describe_event(&event) {
                    println!("{}", line);
                }
            },
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!("Console missed {} events", n);
            },
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn describe_event(event: &RotationEvent) -> Option<String> {
    match event {
        RotationEvent::AddressUpdated(result) => {
            Some(format!("Current address: {}", result.display_address()))
        },
        RotationEvent::RotationFailed { error } => Some(format!("Rotation failed: {}", error)),
        RotationEvent::DaemonError { daemon, error } => {
            Some(format!("{} error: {}", daemon, error))
        },
        // Everything else is already logged
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_command("rotate"), Ok(Some(ConsoleCommand::Rotate)));
        assert_eq!(parse_command("  STATUS "), Ok(Some(ConsoleCommand::Status)));
        assert_eq!(parse_command(""), Ok(None));
        assert_eq!(
            parse_command("interval 30 minutes"),
            Ok(Some(ConsoleCommand::Interval {
                value: 30.0,
                unit: "minutes".to_string()
            }))
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_command("interval").is_err());
        assert!(parse_command("interval ten minutes").is_err());
        assert!(parse_command("interval 10").is_err());
        assert!(parse_command("rotate now please").is_err());
        assert!(parse_command("launch").is_err());
    }

    #[test]
    fn test_help_lists_ranges() {
        let help = help_text();
        assert!(help.contains("seconds  1 to 86400"));
        assert!(help.contains("hours    0.01 to 24"));
    }

    #[test]
    fn test_format_status() {
        let status = StatusSnapshot {
            enabled: true,
            phase: "rotating".to_string(),
            interval_secs: 1800.0,
            rotations: 2,
            last_address: None,
            since_last_rotation_secs: Some(42),
            tor_running: true,
            proxy_running: false,
        };
        let text = format_status(&status);
        assert!(text.contains("enabled (rotating)"));
        assert!(text.contains("30m 0s"));
        assert!(text.contains("last 42s ago"));
        assert!(text.contains("Address:       unknown"));
        assert!(text.contains("Proxy:         stopped"));
    }
}
