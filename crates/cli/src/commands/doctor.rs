//! `aichat doctor`: Diagnose configuration and connectivity.

use std::path::Path;

use aichat_config::{AppConfig, ConfigError};
use aichat_core::provider::Provider;
use aichat_providers::OpenAiCompatProvider;

pub async fn run(
    env_file: &Path,
    config: Result<AppConfig, ConfigError>,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("aichat doctor: System Diagnostics");
    println!("==================================\n");

    let mut issues = 0;

    if env_file.exists() {
        println!("  ✅ Env file found at {}", env_file.display());
    } else {
        println!(
            "  ℹ️  No env file at {} (using process environment only)",
            env_file.display()
        );
    }

    let config = match config {
        Ok(config) => {
            println!("  ✅ Configuration valid");
            config
        }
        Err(e) => {
            println!("  ❌ Configuration invalid: {e}");
            println!("\n  ⚠️  1 issue found. See above for details.");
            return Err(format!("Configuration invalid: {e}").into());
        }
    };

    match config.require_api_key() {
        Ok(_) => println!("  ✅ API key configured (from {})", config.source("api_key")),
        Err(e) => {
            println!("  ❌ {e}");
            issues += 1;
        }
    }

    if config.has_api_key() {
        let provider = OpenAiCompatProvider::from_config(&config)?;
        match provider.health_check().await {
            Ok(true) => println!("  ✅ {} reachable", provider.base_url()),
            Ok(false) => {
                println!("  ❌ {} rejected the request (check the key)", provider.base_url());
                issues += 1;
            }
            Err(e) => {
                println!("  ❌ {} unreachable: {e}", provider.base_url());
                issues += 1;
            }
        }
    }

    println!("\n  Model:     {}", config.model);
    println!("  Memory:    last {} messages", config.max_history);

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
        Ok(())
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
        Err(format!("{issues} diagnostic check(s) failed").into())
    }
}
