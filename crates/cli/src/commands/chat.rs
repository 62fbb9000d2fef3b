//! `aichat chat`: Interactive or single-message chat mode.

use std::path::PathBuf;
use std::sync::Arc;

use aichat_agent::ChatAgent;
use aichat_config::{API_KEY_VARS, AppConfig, ConfigError, ConfigOverrides};
use aichat_providers::OpenAiCompatProvider;
use clap::Args;

use crate::repl;

#[derive(Args, Debug)]
pub struct ChatArgs {
    /// Send a single message instead of entering interactive mode
    #[arg(short, long)]
    pub message: Option<String>,

    /// Model name
    #[arg(long)]
    pub model: Option<String>,

    /// Sampling temperature (0.0 to 2.0)
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Max tokens per response
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Number of non-system messages to remember
    #[arg(long)]
    pub max_history: Option<usize>,

    /// Base URL of the OpenAI-compatible API
    #[arg(long)]
    pub api_base: Option<String>,

    /// System prompt pinned at the start of the conversation
    #[arg(long)]
    pub system_prompt: Option<String>,

    /// Env file to read
    #[arg(long, default_value = ".env")]
    pub env_file: PathBuf,
}

impl ChatArgs {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            api_base: self.api_base.clone(),
            model: self.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            max_history: self.max_history,
            system_prompt: self.system_prompt.clone(),
            ..ConfigOverrides::default()
        }
    }
}

pub async fn run(
    message: Option<String>,
    config: Result<AppConfig, ConfigError>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = config.map_err(|e| format!("Failed to load config: {e}"))?;

    // Fail early with setup hints
    if let Err(e) = config.require_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables (or put it in .env):");
        for var in API_KEY_VARS {
            eprintln!("    {var}=sk-...");
        }
        eprintln!();
        return Err(e.into());
    }

    let provider = Arc::new(OpenAiCompatProvider::from_config(&config)?);
    let mut agent = ChatAgent::from_config(provider, &config);

    if let Some(msg) = message {
        eprint!("  Thinking...");
        let result = agent.chat(&msg).await;
        eprint!("\r              \r");
        println!("{}", result?);
        return Ok(());
    }

    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║          aichat — Interactive Mode           ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Model:     {}", config.model);
    println!("  Endpoint:  {}", config.api_base);
    println!("  Memory:    last {} messages", config.max_history);
    println!();
    println!("  Commands:  'history' shows memory, 'clear' forgets it,");
    println!("             'quit' or 'exit' ends the session.");
    println!();

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    repl::run_session(&mut agent, stdin, &mut stdout).await?;

    println!();
    println!("  Goodbye!");
    println!();
    Ok(())
}
