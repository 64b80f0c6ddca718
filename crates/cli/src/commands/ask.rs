//! `ekimate ask` — Single-question mode.

use ekimate_config::AppConfig;
use ekimate_core::{GameSnapshot, PlayerRequest};
use ekimate_router::Pipeline;

pub async fn run(
    message: String,
    location: String,
    objective: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let pipeline = Pipeline::from_config(&config)?;

    let request = PlayerRequest::new(
        message,
        GameSnapshot {
            location,
            objective,
        },
    );

    eprint!("  Thinking...");
    let result = pipeline.handle(request).await?;
    eprint!("\r              \r");

    println!("{}", result.response);

    match result.tier_used {
        Some(tier) => tracing::debug!(intent = %result.intent, tier = %tier, "answered"),
        None => tracing::debug!(intent = %result.intent, "served fallback"),
    }

    Ok(())
}
