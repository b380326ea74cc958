//! chatarc CLI - ChatGPT conversation history exporter
//!
//! Entry point for the chatarc command-line tool, which provides:
//! - Conversation listing (`list` subcommand)
//! - Batch export to json / json-archive / markdown-archive / html-archive
//!   (`export` subcommand)
//! - Post-export conversation mutations (`archive`, `delete` subcommands)

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use chatarc_client::{BearerToken, Exporter, ProgressEvent, ReqwestTransport};
use chatarc_core::ExportConfig;

mod tracing_setup;

#[derive(Parser, Debug)]
#[command(
    name = "chatarc",
    author,
    version,
    about = "Export ChatGPT conversation history with attachments",
    long_about = "Fetch conversations through the backend API with randomized request \
                  pacing, resolve referenced files and images, and render the batch as \
                  JSON or as a browsable archive."
)]
struct Cli {
    /// Session access token (falls back to the CHATARC_TOKEN environment variable)
    #[arg(long, global = true, env = "CHATARC_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Override the backend API base URL
    #[arg(long, global = true, value_name = "URL")]
    base_url: Option<String>,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Suppress progress bars (for script consumption)
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List conversations without exporting them
    List,
    /// Export conversations to an artifact file
    Export(ExportArgs),
    /// Archive conversations on the remote service
    Archive(IdsArgs),
    /// Delete conversations on the remote service
    Delete(IdsArgs),
}

#[derive(Parser, Debug)]
struct ExportArgs {
    /// Conversation ids to export (omit with --all to export everything)
    ids: Vec<String>,

    /// Export every conversation the listing returns
    #[arg(long, conflicts_with = "ids")]
    all: bool,

    /// Output format: json, json-archive, markdown-archive, html-archive
    #[arg(long, short = 'f', default_value = "json")]
    format: String,

    /// Directory the artifact is written to (defaults to config, then cwd)
    #[arg(long, short = 'o', value_name = "DIR")]
    output: Option<PathBuf>,

    /// Cap the number of conversations fetched with --all
    #[arg(long, value_name = "N")]
    limit: Option<usize>,
}

#[derive(Parser, Debug)]
struct IdsArgs {
    /// Conversation ids to operate on
    #[arg(required = true)]
    ids: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_setup::init(&tracing_setup::TracingConfig { debug: cli.debug })?;

    let mut config = ExportConfig::load().context("loading configuration")?;
    if let Some(base_url) = &cli.base_url {
        config.base_url = base_url.clone();
    }
    if let Commands::Export(args) = &cli.command {
        if args.limit.is_some() {
            config.conversation_limit = args.limit;
        }
    }
    config.validate().context("validating configuration")?;

    let Some(token) = cli.token.clone() else {
        bail!("no access token: pass --token or set CHATARC_TOKEN");
    };

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, finishing current request then stopping");
                cancel.cancel();
            }
        });
    }

    let mut exporter = Exporter::new(
        Arc::new(ReqwestTransport::new()?),
        Arc::new(BearerToken::new(token)),
        &config,
        cancel,
    );

    match cli.command {
        Commands::List => run_list(&mut exporter, cli.quiet).await,
        Commands::Export(args) => run_export(&mut exporter, &config, args, cli.quiet).await,
        Commands::Archive(args) => run_mutation(&mut exporter, args.ids, true).await,
        Commands::Delete(args) => run_mutation(&mut exporter, args.ids, false).await,
    }
}

async fn run_list(exporter: &mut Exporter, quiet: bool) -> Result<()> {
    let bar = spinner(quiet, "fetching conversation list");
    let summaries = exporter
        .list(&mut |event| {
            if let ProgressEvent::List(progress) = event {
                bar.set_message(format!("{}/{} conversations", progress.fetched, progress.total));
            }
        })
        .await?;
    bar.finish_and_clear();

    for summary in &summaries {
        println!("{}\t{}", summary.id, summary.title.as_deref().unwrap_or("Untitled"));
    }
    info!(count = summaries.len(), "listing complete");
    Ok(())
}

async fn run_export(
    exporter: &mut Exporter,
    config: &ExportConfig,
    args: ExportArgs,
    quiet: bool,
) -> Result<()> {
    let ids = if args.all {
        let bar = spinner(quiet, "fetching conversation list");
        let summaries = exporter
            .list(&mut |event| {
                if let ProgressEvent::List(progress) = event {
                    bar.set_message(format!(
                        "{}/{} conversations",
                        progress.fetched, progress.total
                    ));
                }
            })
            .await?;
        bar.finish_and_clear();
        summaries.into_iter().map(|s| s.id).collect()
    } else if args.ids.is_empty() {
        bail!("no conversation ids given; pass ids or --all");
    } else {
        args.ids
    };

    let bar = conversation_bar(quiet, ids.len() as u64);
    let outcome = exporter
        .export(&ids, &args.format, &mut |event| match event {
            ProgressEvent::ConversationStarted {
                index,
                conversation_id,
                ..
            } => {
                bar.set_position(index as u64);
                bar.set_message(conversation_id);
            }
            ProgressEvent::Traversal { progress, .. } => {
                bar.set_message(format!("node {}/{}", progress.processed, progress.total));
            }
            ProgressEvent::List(_) => {}
        })
        .await?;
    bar.finish_and_clear();

    let out_dir = args
        .output
        .or_else(|| config.output_dir.clone())
        .unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("creating output directory {}", out_dir.display()))?;
    let path = out_dir.join(&outcome.artifact.filename);
    std::fs::write(&path, &outcome.artifact.bytes)
        .with_context(|| format!("writing {}", path.display()))?;

    println!(
        "exported {} conversation(s) to {}",
        outcome.successful.len(),
        path.display()
    );
    if !outcome.failed.is_empty() {
        println!("failed: {}", outcome.failed.join(", "));
    }
    Ok(())
}

async fn run_mutation(exporter: &mut Exporter, ids: Vec<String>, archive: bool) -> Result<()> {
    let outcomes = if archive {
        exporter.archive(&ids).await?
    } else {
        exporter.delete(&ids).await?
    };

    let mut failures = 0usize;
    for outcome in &outcomes {
        match &outcome.error {
            None => println!("{}\tok", outcome.conversation_id),
            Some(err) => {
                failures += 1;
                println!("{}\tfailed: {}", outcome.conversation_id, err);
            }
        }
    }
    if failures > 0 {
        bail!("{failures} of {} operation(s) failed", outcomes.len());
    }
    Ok(())
}

fn spinner(quiet: bool, message: &'static str) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new_spinner();
    bar.set_message(message);
    bar.enable_steady_tick(std::time::Duration::from_millis(120));
    bar
}

fn conversation_bar(quiet: bool, total: u64) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(total);
    bar.set_style(
        ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar
}
