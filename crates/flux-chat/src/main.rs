//! Terminal chat over the hero data service.
//!
//! Usage:
//!   flux-chat [--model gpt-4o] [--max-tool-roundtrips 3] [--api-base-url URL]
//!             [--visual-tools getHero,getCardsByOwner]
//!
//! Type a message and press enter. `/transcript` reprints the conversation,
//! `/quit` exits, Ctrl-C cancels the response in flight.

mod chat;
mod render;

use std::sync::Arc;

use clap::Parser;
use flux_ai_harness::model::DEFAULT_MAX_TOOL_ROUNDTRIPS;
use flux_ai_harness::vendors::openai::OpenAiProvider;
use flux_ai_harness::{Harness, ModelRef, SessionConfig};
use flux_core::{AggregatorConfig, LiveAggregator};
use flux_tools::{HeroApiConfig, ReqwestHeroApi, hero_tool_registry};
use tokio::io::{AsyncBufRead, AsyncBufReadExt as _, BufReader, Lines};
use tracing::{info, warn};

use crate::chat::Chat;

/// Chat with an assistant that can look up heroes, cards and players.
#[derive(Parser, Debug)]
#[command(name = "flux-chat", version, about, long_about = None)]
struct Args {
    /// OpenAI model name
    #[arg(long, default_value = "gpt-4o")]
    model: String,

    /// Automatic tool round trips per message
    #[arg(long, default_value_t = DEFAULT_MAX_TOOL_ROUNDTRIPS)]
    max_tool_roundtrips: u32,

    /// Data-service base URL (overrides API_BASE_URL)
    #[arg(long)]
    api_base_url: Option<String>,

    /// Comma-separated tools whose results render as visuals (overrides FLUX_VISUAL_TOOLS)
    #[arg(long)]
    visual_tools: Option<String>,

    /// Default log filter when FLUX_LOG_LEVEL and RUST_LOG are unset
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    flux_core::init_observability(&args.log_level);

    let mut aggregator_config = AggregatorConfig::from_env()?;
    if let Some(list) = args.visual_tools.as_deref() {
        aggregator_config = aggregator_config.with_visual_tools_list(list)?;
    }

    let mut api_config = HeroApiConfig::from_env();
    if let Some(url) = args.api_base_url {
        api_config = api_config.base_url(url);
    }
    info!(
        event = "chat.starting",
        model = %args.model,
        api_base_url = %api_config.base_url,
        max_tool_roundtrips = args.max_tool_roundtrips
    );
    let tools = hero_tool_registry(Arc::new(ReqwestHeroApi::new(api_config)?))?;

    let harness = Harness::builder()
        .register_provider(Arc::new(OpenAiProvider::from_env()?))
        .build()?;
    let session = harness.session(SessionConfig::named("flux-chat").tools(tools));
    let mut chat = Chat::new(
        session,
        ModelRef::new("openai", args.model),
        args.max_tool_roundtrips,
        LiveAggregator::new(aggregator_config),
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    eprintln!("flux-chat ready. /quit or Ctrl-C to exit.");
    loop {
        let line = match next_input(&mut lines, tokio::signal::ctrl_c()).await? {
            Input::Line(line) => line,
            Input::Interrupted => {
                info!(event = "chat.interrupted");
                break;
            }
            Input::Eof => break,
        };
        let line = line.trim();
        match line {
            "" => continue,
            "/quit" => break,
            "/transcript" => {
                print!("{}", render::render_transcript(&chat.aggregator().view()));
                continue;
            }
            _ => {}
        }
        if let Err(err) = chat.submit(line).await {
            warn!(event = "chat.submit_failed", error = %err);
            eprintln!("could not send message: {err}");
        }
    }
    Ok(())
}

#[derive(Debug, PartialEq)]
enum Input {
    Line(String),
    Interrupted,
    Eof,
}

/// Waits for the next prompt line. Once a run has installed the Ctrl-C
/// handler the default SIGINT exit is gone, so the prompt listens too.
async fn next_input<R, F, T>(lines: &mut Lines<R>, interrupt: F) -> std::io::Result<Input>
where
    R: AsyncBufRead + Unpin,
    F: std::future::Future<Output = T>,
{
    tokio::select! {
        biased;
        _ = interrupt => Ok(Input::Interrupted),
        line = lines.next_line() => Ok(line?.map_or(Input::Eof, Input::Line)),
    }
}
