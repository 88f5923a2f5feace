//! A small program that connects to an MCP server, lists the tools it serves
//! and optionally calls one of them.
//!
//! ```text
//! baton npx -y @modelcontextprotocol/server-everything
//! BATON_MCP_URL=http://localhost:3001/mcp baton
//! baton --call echo --args '{"message":"hi"}' mcp-server
//! ```

#[macro_use]
extern crate tracing;

mod cli;

use std::process::ExitCode;
use std::time::Duration;

use baton::mcp::{self, McpServer};
use baton::remote::{RemoteTool, join_content};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, ToolCall};

const BAR_CHAR: &str = "▎";

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let (config, call) = Cli::parse().into_parts();
    debug!("connecting with {config:?}");

    let style = ProgressStyle::with_template("{spinner} {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
    let progress_bar = spinner(&style, "🔌 Connecting...");

    let result = mcp::scoped(&config, |server, tools| {
        let progress_bar = progress_bar.clone();
        let style = &style;
        async move {
            progress_bar.finish_and_clear();
            inspect(&server, &tools, call, style).await
        }
    })
    .await;
    // Connecting may have failed before the block ran.
    progress_bar.finish_and_clear();

    match result {
        Ok(Ok(())) => ExitCode::SUCCESS,
        Ok(Err(err)) | Err(err) => {
            eprintln!("{} {}", BAR_CHAR.bright_red(), err.bright_red());
            ExitCode::FAILURE
        }
    }
}

async fn inspect(
    server: &McpServer,
    tools: &[RemoteTool],
    call: Option<ToolCall>,
    style: &ProgressStyle,
) -> Result<(), mcp::Error> {
    let bar = BAR_CHAR.bright_cyan();
    println!(
        "{bar}🧰 {} serves {} tools",
        server.name().bright_white().bold(),
        tools.len()
    );
    for tool in tools {
        println!("{bar}");
        println!("{bar}{}", tool.name.bright_white().bold());
        for line in tool.description.lines() {
            println!("{bar}  {}", line.dimmed());
        }
    }

    let Some(call) = call else {
        return Ok(());
    };
    if !tools.iter().any(|tool| tool.name == call.name) {
        warn!("{} is not listed by {}", call.name, server.name());
    }

    let message = format!("🔧 Calling {}...", call.name);
    let progress_bar = spinner(style, &message);
    let parts = server.call_tool(&call.name, call.arguments).await;
    progress_bar.finish_and_clear();

    println!();
    println!(
        "{}🤖 {}",
        BAR_CHAR.bright_yellow(),
        join_content(&parts?).bright_white()
    );
    Ok(())
}

fn spinner(style: &ProgressStyle, message: &str) -> ProgressBar {
    let progress_bar = ProgressBar::new_spinner();
    progress_bar.set_style(style.clone());
    progress_bar.set_message(message.to_owned());
    progress_bar.enable_steady_tick(Duration::from_millis(100));
    progress_bar
}
