//! The read-eval-print loop behind `aichat chat`.

use std::borrow::Cow;
use std::io::Write;

use aichat_agent::ChatAgent;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::warn;

/// What a line typed at the prompt asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplCommand<'a> {
    Quit,
    Clear,
    History,
    Empty,
    Message(&'a str),
}

impl<'a> ReplCommand<'a> {
    /// Commands are matched case-insensitively after trimming.
    pub fn parse(line: &'a str) -> Self {
        let trimmed = line.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "" => ReplCommand::Empty,
            "quit" | "exit" => ReplCommand::Quit,
            "clear" => ReplCommand::Clear,
            "history" => ReplCommand::History,
            _ => ReplCommand::Message(trimmed),
        }
    }
}

/// Run turns until `quit`/`exit` or end of input.
///
/// A failed turn is reported on stderr and the loop keeps going.
pub async fn run_session<R, W>(
    agent: &mut ChatAgent,
    input: R,
    out: &mut W,
) -> Result<(), Box<dyn std::error::Error>>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut input = input;
    let mut buf = Vec::new();

    loop {
        write!(out, "  You > ")?;
        out.flush()?;

        buf.clear();
        if input.read_until(b'\n', &mut buf).await? == 0 {
            break; // EOF (Ctrl+D)
        }

        // Terminals in legacy code pages can send bytes that are not UTF-8.
        let line = String::from_utf8_lossy(&buf);
        if let Cow::Owned(_) = line {
            warn!("Input was not valid UTF-8; invalid bytes were replaced");
        }

        match ReplCommand::parse(&line) {
            ReplCommand::Quit => break,
            ReplCommand::Empty => continue,
            ReplCommand::Clear => {
                agent.clear_history();
                writeln!(out, "  History cleared.")?;
            }
            ReplCommand::History => print_history(agent, out)?,
            ReplCommand::Message(text) => {
                eprint!("  ...");
                let result = agent.chat(text).await;
                eprint!("\r     \r");
                match result {
                    Ok(reply) => {
                        writeln!(out)?;
                        for line in reply.lines() {
                            writeln!(out, "  Assistant > {line}")?;
                        }
                        writeln!(out)?;
                    }
                    Err(e) => eprintln!("  [Error] {e}"),
                }
            }
        }
    }

    Ok(())
}

fn print_history<W: Write>(agent: &ChatAgent, out: &mut W) -> std::io::Result<()> {
    let memory = agent.memory();
    writeln!(
        out,
        "  {} of {} messages retained",
        memory.len(),
        memory.max_history()
    )?;
    for (i, message) in agent.history().iter().enumerate() {
        writeln!(out, "  {:>3}. [{}] {}", i + 1, message.role(), message.content())?;
    }
    Ok(())
}
