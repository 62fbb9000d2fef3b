//! `aichat config`: Print the effective configuration.

use std::path::Path;

use aichat_config::{AppConfig, ConfigError};

/// Fields in the order they are reported.
const FIELDS: &[&str] = &[
    "api_key",
    "api_base",
    "model",
    "temperature",
    "max_tokens",
    "max_history",
    "max_context_tokens",
    "system_prompt",
    "log_level",
];

pub fn run(
    env_file: &Path,
    config: Result<AppConfig, ConfigError>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = config.map_err(|e| format!("Failed to load config: {e}"))?;
    print!("{}", render(env_file, &config));
    Ok(())
}

fn render(env_file: &Path, config: &AppConfig) -> String {
    let mut out = format!("# env file: {}\n", env_file.display());
    out.push_str("# sources:\n");
    for field in FIELDS {
        out.push_str(&format!("#   {field:<20} {}\n", config.source(field)));
    }
    out.push('\n');
    out.push_str(&config.to_redacted_toml());
    out
}
