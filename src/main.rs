use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use newsmux::config::Config;
use newsmux::feed::{Aggregator, AggregatorOptions, MergeRequest};
use newsmux::util::validate_url;

/// Get the config file path (~/.config/newsmux/config.toml)
fn default_config_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home)
        .join(".config")
        .join("newsmux")
        .join("config.toml"))
}

#[derive(Parser, Debug)]
#[command(
    name = "newsmux",
    about = "Merge RSS/Atom feeds into one deduplicated news stream"
)]
struct Args {
    /// Path to the config file (default: ~/.config/newsmux/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Bypass the result cache and refetch every source
    #[arg(long)]
    refresh: bool,

    /// Emit the merged feed as JSON instead of text
    #[arg(long)]
    json: bool,

    /// Override the total item cap from the config
    #[arg(long, value_name = "N")]
    limit: Option<usize>,

    /// Extra feed URLs, appended after the configured sources
    #[arg(value_name = "URL")]
    sources: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing for debug logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => default_config_path()?,
    };
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let mut sources = config.validated_sources();
    for url in &args.sources {
        match validate_url(url) {
            Ok(_) => sources.push(url.clone()),
            Err(e) => eprintln!("Skipping invalid URL {url}: {e}"),
        }
    }

    if sources.is_empty() {
        anyhow::bail!(
            "No feed sources configured. Add `sources = [\"https://…\"]` to {} or pass URLs as arguments.",
            config_path.display()
        );
    }

    let aggregator = Aggregator::new(AggregatorOptions {
        user_agent: config.user_agent.clone(),
        fetch_timeout: config.fetch_timeout(),
        default_offset: config.default_offset()?,
        excerpt_max_chars: config.excerpt_max_chars,
    })
    .context("Failed to build HTTP client")?;

    let request = MergeRequest {
        sources,
        per_feed_limit: config.per_feed_limit,
        total_limit: args.limit.unwrap_or(config.total_limit),
        ttl: if args.refresh {
            Duration::ZERO
        } else {
            config.ttl()
        },
    };

    let items = aggregator.fetch_combined(&request).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&*items)?);
        return Ok(());
    }

    if items.is_empty() {
        println!("No items available.");
        return Ok(());
    }

    for item in items.iter() {
        let when = item
            .published_at
            .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "(no date)".to_string());
        println!("{when}  [{}] {}", item.source_label, item.title);
        if let Some(summary) = &item.summary {
            println!("                  {summary}");
        }
        println!("                  {}", item.link);
    }

    Ok(())
}
