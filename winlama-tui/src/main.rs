use std::{
    fs::File,
    io::Write as _,
    path::{Path, PathBuf},
};

use clap::{Parser, Subcommand};
use config::Config;
use futures::StreamExt as _;
use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter};
use tui::AppContext;
use winlama_core::{Client, ModelHost, ModelName, StreamEvent};

mod config;
mod tui;

#[derive(Parser)]
#[command(version, about = "Chat with local Ollama models")]
pub struct Cli {
    /// Ollama server address, e.g. http://localhost:11434
    #[arg(long)]
    host: Option<ModelHost>,
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    mode: Option<Mode>,
}

#[derive(Subcommand)]
enum Mode {
    /// Interactive chat (the default)
    Tui,
    /// Print the installed models, one per line
    Models,
    /// Print a single completion
    Generate {
        #[arg(long)]
        model: ModelName,
        /// Wait for the whole response instead of streaming tokens
        #[arg(long)]
        no_stream: bool,
        prompt: String,
    },
}

fn setup_tracing(log_file: impl AsRef<Path>) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .json()
        .with_span_events(FmtSpan::FULL)
        .with_env_filter(filter)
        .with_writer(File::create(log_file)?)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    tracing_log::LogTracer::init()?;

    Ok(())
}

async fn print_models(client: &Client) -> anyhow::Result<()> {
    for model in client.list_models().await? {
        println!("{model}");
    }
    Ok(())
}

async fn print_generation(
    client: &Client,
    model: ModelName,
    prompt: String,
    stream: bool,
) -> anyhow::Result<()> {
    if !stream {
        let generation = client.generate(model, prompt, None).await?;
        println!("{}", generation.response);
        return Ok(());
    }

    let mut stdout = std::io::stdout();
    let mut events = std::pin::pin!(client.generate_stream(model, prompt, None));
    while let Some(event) = events.next().await {
        match event {
            StreamEvent::Token { text } => {
                write!(stdout, "{text}")?;
                stdout.flush()?;
            }
            StreamEvent::Done { .. } => {
                writeln!(stdout)?;
                break;
            }
            StreamEvent::Error { message } => anyhow::bail!(message),
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    let config = Config::load(args.config.as_deref())?;
    setup_tracing(config.log_file()?)?;

    let host = args.host.unwrap_or_else(|| config.host.clone());
    let client = Client::new(host);

    match args.mode.unwrap_or(Mode::Tui) {
        Mode::Models => print_models(&client).await?,
        Mode::Generate {
            model,
            no_stream,
            prompt,
        } => print_generation(&client, model, prompt, !no_stream).await?,
        Mode::Tui => {
            color_eyre::install().map_err(|error| anyhow::anyhow!("{error}"))?;
            tracing::info!(host = %client.host(), "starting TUI");
            let app_context = AppContext::new(client, config.default_model);
            let terminal = ratatui::init();
            let result = app_context.run(terminal).await;
            ratatui::restore();
            result?;
        }
    }

    Ok(())
}
