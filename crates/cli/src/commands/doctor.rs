//! `ekimate doctor` — Diagnose configuration and backend health.

use ekimate_config::AppConfig;
use ekimate_router::Pipeline;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 Ekimate Doctor — System Diagnostics");
    println!("======================================\n");

    let mut issues = 0;

    // Check config
    let config_path = AppConfig::config_dir().join("config.toml");
    let config = if config_path.exists() {
        match AppConfig::load() {
            Ok(config) => {
                println!("  ✅ Config file valid");
                Some(config)
            }
            Err(e) => {
                println!("  ❌ Config file invalid: {e}");
                issues += 1;
                None
            }
        }
    } else {
        println!("  ℹ️  No config file at {} — using defaults", config_path.display());
        AppConfig::load().ok()
    };

    let Some(config) = config else {
        println!();
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
        return Ok(());
    };

    // Check API key
    if config.has_api_key() {
        println!("  ✅ API key configured");
    } else if config.router.tier3_enabled {
        println!("  ⚠️  No API key — the remote tier will fail and turns will degrade");
        issues += 1;
    } else {
        println!("  ✅ Remote tier disabled, no API key needed");
    }

    // Check backends
    let pipeline = Pipeline::from_config(&config)?;
    let (tier2, tier3) = pipeline.health().await;

    if tier2 {
        println!("  ✅ Local model reachable");
    } else {
        println!("  ⚠️  Local model unreachable — is Ollama running?");
        issues += 1;
    }

    if !config.router.tier3_enabled {
        println!("  ➖ Remote tier disabled in config");
    } else if tier3 {
        println!("  ✅ Remote endpoint reachable");
    } else {
        println!("  ⚠️  Remote endpoint unreachable");
        issues += 1;
    }

    // Summary
    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
        println!();
        println!("  A default config looks like:");
        println!();
        for line in AppConfig::default_toml().lines() {
            println!("    {line}");
        }
    }

    Ok(())
}
