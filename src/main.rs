use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use news_briefing::aws::AwsContext;
use news_briefing::config::{self, RuntimeConfig};
use news_briefing::news::FeedFetcher;
use news_briefing::open_url::{dashboard_url, open_url};
use news_briefing::processor::{NewsProcessor, ProcessOutcome, RssSummaryJob};
use news_briefing::web::{self, AppState, model_from_store};
use news_briefing::{scheduler, store};

#[derive(Parser)]
#[command(name = "news-briefing")]
#[command(about = "Daily AI-curated news briefing")]
struct Cli {
    /// Path to a config.toml with seed feeds, categories and topics
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the web console and the daily scheduler
    Serve {
        /// Open the dashboard in a browser once listening
        #[arg(long)]
        open: bool,
    },
    /// Run one refresh pass and exit
    Refresh,
    /// Report AWS environment and LLM connectivity
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenv::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let cfg = config::load(cli.config)?;

    match cli.command.unwrap_or(Command::Serve { open: false }) {
        Command::Serve { open } => serve(cfg, open).await,
        Command::Refresh => refresh(cfg).await,
        Command::Check => check(cfg).await,
    }
}

/// Pool, AWS context and processor shared by every command.
async fn bootstrap(cfg: &RuntimeConfig) -> Result<(Arc<NewsProcessor>, Arc<AwsContext>)> {
    let pool = store::create_pool(&cfg.database_url)
        .await
        .with_context(|| format!("opening database {}", cfg.database_url))?;
    store::seed(&pool, &cfg.seeds).await.context("seeding database")?;

    let aws = Arc::new(AwsContext::detect(&cfg.aws).await);
    let (model, _) = model_from_store(&pool, &aws).await;
    let fetcher = FeedFetcher::new().context("building feed HTTP client")?;
    let processor = Arc::new(NewsProcessor::new(pool, fetcher, model, cfg.analysis_delay));
    Ok((processor, aws))
}

async fn serve(cfg: RuntimeConfig, open: bool) -> Result<()> {
    let (processor, aws) = bootstrap(&cfg).await?;
    let job = Arc::new(RssSummaryJob::new(Arc::clone(&processor)));
    let scheduler = scheduler::spawn(job, cfg.schedule, cfg.schedule_offset);

    let state = AppState::new(
        processor.pool().clone(),
        processor,
        scheduler,
        aws,
        &cfg.secret_key,
        cfg.header.clone(),
    );

    let listener = TcpListener::bind(cfg.bind_addr)
        .await
        .with_context(|| format!("binding {}", cfg.bind_addr))?;
    let addr = listener.local_addr()?;
    println!(
        "{} {}",
        style("Dashboard:").bold(),
        style(dashboard_url(addr)).cyan()
    );
    if open {
        if let Err(e) = open_url(&dashboard_url(addr)) {
            eprintln!("{} {:#}", style("Could not open browser:").yellow(), e);
        }
    }

    web::serve(listener, state).await.context("server failed")
}

async fn refresh(cfg: RuntimeConfig) -> Result<()> {
    let (processor, _) = bootstrap(&cfg).await?;
    let outcome = processor.process_feeds().await;
    match &outcome {
        ProcessOutcome::Completed { .. } | ProcessOutcome::Stopped { .. } => {
            println!("{} {}", style("Done:").green().bold(), outcome);
            Ok(())
        }
        _ => anyhow::bail!("{outcome}"),
    }
}

async fn check(cfg: RuntimeConfig) -> Result<()> {
    let (processor, aws) = bootstrap(&cfg).await?;
    let yes_no = |b: bool| if b { style("yes").green() } else { style("no").yellow() };

    println!("{:<20} {}", "Running on EC2:", yes_no(aws.on_ec2));
    println!("{:<20} {}", "Region:", aws.region);
    println!("{:<20} {}", "Credentials:", aws.environment_label());
    println!("{:<20} {}", "Model:", processor.model().model_id());

    match processor.check_llm().await {
        Ok(()) => {
            println!("{:<20} {}", "LLM:", style("reachable").green());
            Ok(())
        }
        Err(msg) => {
            println!("{:<20} {}", "LLM:", style(&msg).red());
            anyhow::bail!("LLM connectivity check failed")
        }
    }
}
