//! Drives a session through a scenario, step by step or headless.

use std::io::Write as _;

use tokio::io::{BufReader, Stdin};
use tracing::debug;
use vmtester_sdk::Session;

use crate::scenario::Scenario;

/// Line-buffered stdin shared between the menus and the runner.
pub type Input = tokio::io::Lines<BufReader<Stdin>>;

/// Tally of one scenario run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub sent: usize,
    pub replied: usize,
    pub failed: usize,
}

/// Control entered between interactive steps.
enum Control {
    Next,
    Replay,
    Skip,
    Insert(String),
    Quit,
}

/// Replays every line without pausing and prints a summary.
pub async fn run_headless(session: &mut Session, scenario: &Scenario) -> RunReport {
    let mut report = RunReport::default();

    for (i, line) in scenario.lines.iter().enumerate() {
        if !session.is_connected() {
            println!("Connection lost to voice manager");
            break;
        }
        send_step(session, &mut report, i, scenario.lines.len(), line).await;
    }

    print_summary(&scenario.name, &report);
    report
}

/// Replays the scenario one line at a time, pausing for a control between
/// steps: Enter advances, `r` replays the line just sent, `s` skips the next
/// line, `i <text>` inserts an ad-hoc line, `q` quits.
pub async fn run_interactive(
    session: &mut Session,
    scenario: &Scenario,
    input: &mut Input,
) -> RunReport {
    let mut report = RunReport::default();
    let mut lines = scenario.lines.clone();

    println!("Loaded {} lines from '{}'", lines.len(), scenario.name);
    println!("Controls: Enter = next, r = replay, s = skip, i <text> = insert, q = quit");

    let mut i = 0;
    while i < lines.len() {
        if !session.is_connected() {
            println!("Connection lost to voice manager");
            if !offer_reconnect(session, input).await {
                break;
            }
        }

        let line = lines[i].clone();
        send_step(session, &mut report, i, lines.len(), &line).await;

        if i + 1 == lines.len() {
            break;
        }

        match next_control(input).await {
            Control::Next => i += 1,
            Control::Replay => debug!("replaying line {}", i + 1),
            Control::Skip => {
                if let Some(skipped) = lines.get(i + 1) {
                    println!("Skipping: {skipped}");
                }
                i += 2;
            }
            Control::Insert(text) => {
                lines.insert(i + 1, text);
                i += 1;
            }
            Control::Quit => {
                println!("Scenario stopped");
                break;
            }
        }
    }

    print_summary(&scenario.name, &report);
    report
}

async fn send_step(
    session: &mut Session,
    report: &mut RunReport,
    index: usize,
    total: usize,
    line: &str,
) {
    println!("[{}/{}] > {}", index + 1, total, line);
    report.sent += 1;
    match session.send_command(line).await {
        Ok(reply) => {
            println!("        < {reply}");
            report.replied += 1;
        }
        Err(e) => {
            println!("        ! {e}");
            report.failed += 1;
        }
    }
}

fn print_summary(name: &str, report: &RunReport) {
    println!(
        "Scenario '{}' finished: {} sent, {} replied, {} failed",
        name, report.sent, report.replied, report.failed
    );
}

async fn next_control(input: &mut Input) -> Control {
    loop {
        print!("continue> ");
        let _ = std::io::stdout().flush();

        let line = match input.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) | Err(_) => return Control::Quit,
        };
        let trimmed = line.trim();

        if trimmed.is_empty() {
            return Control::Next;
        }
        if let Some(text) = trimmed.strip_prefix("i ") {
            return Control::Insert(text.trim().to_string());
        }
        match trimmed {
            "r" => return Control::Replay,
            "s" => return Control::Skip,
            "q" | "quit" | "exit" | "stop" => return Control::Quit,
            other => println!("Unknown control '{other}'"),
        }
    }
}

async fn offer_reconnect(session: &mut Session, input: &mut Input) -> bool {
    print!("Reconnect? (y/N): ");
    let _ = std::io::stdout().flush();

    let answer = match input.next_line().await {
        Ok(Some(line)) => line,
        Ok(None) | Err(_) => return false,
    };
    if !matches!(answer.trim().to_lowercase().as_str(), "y" | "yes") {
        return false;
    }

    match session.reconnect().await {
        Ok(()) => {
            println!("Reconnected");
            true
        }
        Err(e) => {
            println!("Reconnect failed: {e}");
            false
        }
    }
}
