use std::io::Write as _;
use std::path::{Path, PathBuf};

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::error;
use vmtester_client::runner::{self, Input};
use vmtester_client::scenario;
use vmtester_sdk::{Session, SessionConfig};

/// Directory scanned for scenario files.
const SCENARIOS_DIR: &str = "scenarios";

/// Maximum accepted user id length.
const MAX_USER_ID_LEN: usize = 50;

enum Mode {
    Interactive,
    Headless,
}

fn print_banner() {
    println!("{}", "=".repeat(60));
    println!("Voice Manager E2E Tester");
    println!("{}", "=".repeat(60));
    println!("Replays scripted scenarios against a voice manager service.");
    println!();
}

async fn read_line(input: &mut Input, prompt: &str) -> Option<String> {
    print!("{prompt}");
    let _ = std::io::stdout().flush();
    match input.next_line().await {
        Ok(Some(line)) => Some(line),
        Ok(None) | Err(_) => None,
    }
}

async fn select_mode(input: &mut Input) -> Option<Mode> {
    println!("Please select the mode of operation:");
    println!("  1. Interactive - run scenarios step by step, pausing between lines");
    println!("  2. Headless    - run scenarios straight through and print a report");
    println!();

    loop {
        let choice = read_line(input, "Enter your choice (1 or 2): ").await?;
        match choice.trim() {
            "1" => {
                println!("Interactive mode selected");
                return Some(Mode::Interactive);
            }
            "2" => {
                println!("Headless mode selected");
                return Some(Mode::Headless);
            }
            _ => println!("Invalid choice. Please enter 1 or 2."),
        }
    }
}

async fn prompt_user_id(input: &mut Input) -> Option<String> {
    println!();
    println!("Please enter your user id.");
    println!("It identifies your session with the voice manager.");

    loop {
        let user_id = read_line(input, "User id: ").await?;
        let user_id = user_id.trim();

        if user_id.is_empty() {
            println!("User id cannot be empty. Please try again.");
            continue;
        }
        if user_id.contains(' ') {
            println!("User id cannot contain spaces. Please try again.");
            continue;
        }
        if user_id.len() > MAX_USER_ID_LEN {
            println!("User id too long (max {MAX_USER_ID_LEN} characters). Please try again.");
            continue;
        }

        println!("User id set to: {user_id}");
        return Some(user_id.to_string());
    }
}

async fn select_scenario(input: &mut Input) -> Option<PathBuf> {
    println!();
    println!("Available scenarios");
    println!("{}", "=".repeat(40));

    let scenarios = scenario::available_scenarios(Path::new(SCENARIOS_DIR));
    if scenarios.is_empty() {
        println!("No scenario files found in the '{SCENARIOS_DIR}' folder.");
        println!("Add .yaml or .yml scenario files there and try again.");
        return None;
    }

    for (i, path) in scenarios.iter().enumerate() {
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("?");
        println!("{}. {}", i + 1, name);
    }

    loop {
        let prompt = format!("Select a scenario (1-{}): ", scenarios.len());
        let choice = read_line(input, &prompt).await?;

        let Ok(number) = choice.trim().parse::<usize>() else {
            println!("Please enter a valid number.");
            continue;
        };
        if number < 1 || number > scenarios.len() {
            println!("Please enter a number between 1 and {}.", scenarios.len());
            continue;
        }

        let selected = scenarios[number - 1].clone();
        if let Some(name) = selected.file_name().and_then(|n| n.to_str()) {
            println!("Selected scenario: {name}");
        }
        return Some(selected);
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    print_banner();

    let mut input = BufReader::new(tokio::io::stdin()).lines();

    let Some(mode) = select_mode(&mut input).await else {
        println!("Operation cancelled.");
        return;
    };

    let Some(user_id) = prompt_user_id(&mut input).await else {
        println!("A user id is required.");
        return;
    };

    let mut config = SessionConfig::from_env();
    config.user_id = user_id;

    println!();
    println!("Connection details:");
    println!("  endpoint: {}", config.url());
    println!("  user id:  {}", config.user_id);

    let mut session = Session::new(config);
    if let Err(e) = session.connect().await {
        error!("connection failed: {}", e);
        println!("Failed to connect to the voice manager.");
        println!("Make sure one is running, e.g.: cargo run -p vmtester-server");
        return;
    }
    println!("Connected to voice manager");

    let Some(path) = select_scenario(&mut input).await else {
        session.disconnect().await;
        return;
    };

    match scenario::load_scenario(&path) {
        Ok(scenario) => {
            match mode {
                Mode::Interactive => {
                    runner::run_interactive(&mut session, &scenario, &mut input).await;
                }
                Mode::Headless => {
                    runner::run_headless(&mut session, &scenario).await;
                }
            };
        }
        Err(e) => println!("Failed to load scenario: {e}"),
    }

    session.disconnect().await;
    println!("Session ended");
}
