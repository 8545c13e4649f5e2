use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use quell_engine::backend::Backend;
use quell_engine::config::{ConfigLoader, QuellConfig};
use quell_engine::error::StabilizationError;
use quell_engine::orchestrator::{Identity, Orchestrator};
use quell_engine::poller::Poller;
use quell_engine::target::LogicalTarget;
use quell_h::HeadlessBackend;
use serde_json::{Value, json};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use url::Url;

#[derive(Parser)]
#[command(name = "quell", version, about = "Stabilized WordPress admin automation")]
struct Args {
    /// Configuration file (defaults to ./quell.yaml, then ~/.quell/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Launch browser in visible mode (not headless)
    #[arg(long, global = true)]
    visible: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log in with the configured credentials
    Login,
    /// Log in, create a post and optionally publish it
    Post {
        #[arg(long)]
        title: String,
        #[arg(long)]
        body: Option<String>,
        #[arg(long)]
        publish: bool,
    },
    /// Resolve a logical target on a page and print the matching selector
    Locate {
        /// Target name, e.g. `title_field`
        target: LogicalTarget,
        /// Absolute URL or path relative to the site base URL
        #[arg(long)]
        url: Option<String>,
        /// Log in before navigating
        #[arg(long)]
        login: bool,
    },
    /// Remove overlays from a page once and report how many went
    Sweep {
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        login: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Results go to stdout; keep logs on stderr.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ConfigLoader::load_from(path)
            .await
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ConfigLoader::load_default().await?,
    };

    let backend = Arc::new(HeadlessBackend::new_with_visibility(args.visible));
    backend.launch().await.context("Failed to launch backend")?;

    let mut orchestrator = Orchestrator::new(backend.clone(), config);
    let result = run(&mut orchestrator, args.command).await;

    orchestrator.shutdown().await;
    if let Err(e) = backend.close().await {
        tracing::warn!("Failed to close backend: {}", e);
    }
    result
}

async fn run(orchestrator: &mut Orchestrator, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Login => {
            let report = login(orchestrator).await?;
            print_json(serde_json::to_value(report)?)?;
        }
        Command::Post {
            title,
            body,
            publish,
        } => {
            login(orchestrator).await?;
            let authored = orchestrator
                .author_content(&title, body.as_deref())
                .await
                .map_err(classified)?;
            let published = if publish {
                Some(orchestrator.publish().await.map_err(classified)?)
            } else {
                None
            };
            print_json(json!({ "authored": authored, "published": published }))?;
        }
        Command::Locate { target, url, login: needs_login } => {
            if needs_login {
                login(orchestrator).await?;
            }
            open(orchestrator, url.as_deref()).await?;

            let policy = orchestrator.config().polling.editor;
            let page = orchestrator.page();
            Poller::new(policy)
                .await_condition("target", move || page.is_present(target))
                .await;
            let located = page.locate(target).await.map_err(classified)?.found();
            print_json(json!({ "target": target, "found": located.is_some(), "located": located }))?;
            if located.is_none() {
                bail!("{} not found", target);
            }
        }
        Command::Sweep { url, login: needs_login } => {
            if needs_login {
                login(orchestrator).await?;
            }
            open(orchestrator, url.as_deref()).await?;
            let removed = orchestrator.clear_environment().await;
            print_json(json!({ "removed": removed }))?;
        }
    }
    Ok(())
}

async fn login(
    orchestrator: &mut Orchestrator,
) -> anyhow::Result<quell_engine::orchestrator::AuthReport> {
    let identity = Identity::from_config(&orchestrator.config().credentials);
    if identity.username.is_empty() {
        bail!("No username configured (set credentials.username or QUELL_USERNAME)");
    }
    orchestrator.authenticate(&identity).await.map_err(classified)
}

async fn open(orchestrator: &mut Orchestrator, target: Option<&str>) -> anyhow::Result<()> {
    let url = resolve_url(orchestrator.config(), target.unwrap_or("/"))?;
    info!("Opening {}", url);
    orchestrator
        .page_mut()
        .navigate(url.as_str())
        .await
        .map_err(classified)?;
    Ok(())
}

/// Absolute URLs pass through; anything else is joined onto the base URL.
fn resolve_url(config: &QuellConfig, raw: &str) -> anyhow::Result<Url> {
    match Url::parse(raw) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => config
            .site
            .url(raw)
            .with_context(|| format!("Invalid path {}", raw)),
        Err(e) => Err(e).with_context(|| format!("Invalid URL {}", raw)),
    }
}

fn classified(err: StabilizationError) -> anyhow::Error {
    anyhow::anyhow!(err.reason())
}

fn print_json(value: Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}
