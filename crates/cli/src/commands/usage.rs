//! `ekimate usage` — Remote quota limits.

use ekimate_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;

    println!("📊 Remote Quota Limits");
    println!("─────────────────────────────────────");
    println!("  Hourly:   {} requests", config.quota.hourly_requests);
    println!("  Daily:    {} tokens", config.quota.daily_tokens);
    println!("  Monthly:  ${:.2}", config.quota.monthly_usd);

    if !config.quota.custom_pricing.is_empty() {
        let mut overrides: Vec<_> = config.quota.custom_pricing.iter().collect();
        overrides.sort_by(|a, b| a.0.cmp(b.0));

        println!();
        println!("  Pricing overrides:");
        for (model, p) in overrides {
            println!(
                "    {:<36} ${}/M in, ${}/M out",
                model, p.input_per_m, p.output_per_m
            );
        }
    }

    // Usage counters live with the process that serves requests, so a
    // fresh CLI run has nothing to report beyond the limits.
    println!();
    println!("  Live counters are held by the running pipeline; this command");
    println!("  shows the configured ceilings it enforces.");

    Ok(())
}
