use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use taproot::agent::client::OpenAiClient;
use taproot::config::AppConfig;
use taproot::editor::CommandEditor;
use taproot::platform::github::GitHubPlatform;
use taproot::processor::RepositoryProcessor;

#[derive(Parser)]
#[command(name = "taproot", about = "Automated triage bot for GitHub issues and pull requests")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Repositories to process (owner/repo), overriding the configured set
    #[arg(short, long)]
    repo: Vec<String>,

    /// Keep polling with this many seconds between passes
    #[arg(long)]
    interval: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if !cli.repo.is_empty() {
        config.repos = cli.repo.clone();
    }
    if config.repos.is_empty() {
        anyhow::bail!("No repositories configured; set `repos` in the config file or pass --repo");
    }

    tracing::info!(repos = config.repos.len(), "Starting taproot");

    let platform = Arc::new(GitHubPlatform::new(&config.github)?);
    let editor = Arc::new(CommandEditor::new(&config.editor));
    let llm = Arc::new(OpenAiClient::new(&config.llm));

    let processor = RepositoryProcessor::new(platform, editor, llm, config);

    loop {
        processor.process_all().await;

        match cli.interval {
            Some(secs) => {
                tracing::info!(seconds = secs, "Pass complete, sleeping");
                tokio::time::sleep(Duration::from_secs(secs)).await;
            }
            None => break,
        }
    }

    Ok(())
}
