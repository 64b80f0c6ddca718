//! `ekimate chat` — Interactive conversation mode.
//!
//! One conversation spans the whole session, so the companion remembers
//! earlier turns and topic escalation carries over.

use ekimate_config::AppConfig;
use ekimate_core::{GameSnapshot, PlayerRequest};
use ekimate_router::Pipeline;
use std::io::{BufRead, Write};

pub async fn run(location: String, objective: String) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if config.router.tier3_enabled && config.api_key.is_none() {
        eprintln!();
        eprintln!("  Note: no API key configured, so only the built-in trees and the");
        eprintln!("  local model are available. Set EKIMATE_API_KEY or add api_key to:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
    }

    let pipeline = Pipeline::from_config(&config)?;
    let conversation = pipeline.open_conversation().await;

    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║        Ekimate — Station Companion            ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Location:  {location}");
    println!("  Objective: {objective}");
    println!();
    println!("  Type your question and press Enter.");
    println!("  Type 'exit' or Ctrl+C to quit.");
    println!();

    let stdin = std::io::stdin();
    print!("  You > ");
    std::io::stdout().flush()?;

    for line in stdin.lock().lines() {
        let line = line?;
        let text = line.trim();
        if text.is_empty() {
            print!("  You > ");
            std::io::stdout().flush()?;
            continue;
        }
        if text == "exit" || text == "quit" {
            break;
        }

        let request = PlayerRequest::new(
            text,
            GameSnapshot {
                location: location.clone(),
                objective: objective.clone(),
            },
        )
        .in_conversation(conversation.clone());

        eprint!("  ...");
        match pipeline.handle(request).await {
            Ok(result) => {
                eprint!("\r     \r");
                println!();
                for line in result.response.lines() {
                    println!("  Hachiko > {line}");
                }
                println!();
            }
            Err(e) => {
                eprint!("\r     \r");
                eprintln!("  [Error] {e}");
                println!();
            }
        }

        print!("  You > ");
        std::io::stdout().flush()?;
    }

    pipeline.close_conversation(&conversation).await;
    println!();
    println!("  Mata ne! 👋");
    println!();

    Ok(())
}
