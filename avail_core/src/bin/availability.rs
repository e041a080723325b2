use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use avail_core::{
    AppConfig, AvailabilityFinder, ChannelCatalog, ChannelMapper, GitSnapshotProvider, Platform,
};
use avail_providers::MemoryResultCache;
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Parser, Subcommand};
use serde::Serialize;

/// Report when extension APIs and their schema nodes became available.
#[derive(Parser, Debug)]
#[command(name = "availability")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<Utf8PathBuf>,

    /// Repository to read history from
    #[arg(long, global = true, default_value = ".")]
    repo: Utf8PathBuf,

    /// Channel catalog (JSON or TOML); overrides the configured one
    #[arg(long, global = true)]
    catalog: Option<Utf8PathBuf>,

    /// Platform whose features apply; overrides the configured one
    #[arg(long, global = true)]
    platform: Option<Platform>,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Namespace availability for each API
    Api {
        /// API namespaces or schema filename stems
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Node availability for one API
    Nodes {
        /// API namespace or schema filename stem
        api: String,
        /// Dotted node paths to look up, namespace first; prints the whole
        /// graph when omitted
        paths: Vec<String>,
    },
    /// Current head of every channel
    Channels,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let mut config = match &cli.config {
        Some(path) => AppConfig::load(path).with_context(|| format!("loading {path}"))?,
        None => AppConfig::default(),
    };
    if let Some(platform) = cli.platform {
        config.platform = platform;
    }

    let catalog_path = cli
        .catalog
        .clone()
        .or_else(|| config.catalog.clone())
        .context("no channel catalog given; pass --catalog or set `catalog` in the config")?;
    let catalog = ChannelCatalog::load(&catalog_path)
        .with_context(|| format!("loading catalog {catalog_path}"))?;
    let mapper = Arc::new(ChannelMapper::new(catalog)?);

    match cli.command {
        Command::Channels => print_json(&mapper.all_channel_info()),
        Command::Api { names } => {
            let finder = open_finder(&cli.repo, &config, mapper)?;
            let mut report = BTreeMap::new();
            for name in names {
                let info = finder
                    .api_availability(&name)
                    .with_context(|| format!("resolving {name}"))?;
                report.insert(name, info);
            }
            print_json(&report)
        }
        Command::Nodes { api, paths } => {
            let finder = open_finder(&cli.repo, &config, mapper)?;
            let graph = finder
                .api_node_availability(&api)
                .with_context(|| format!("resolving nodes of {api}"))?;
            if paths.is_empty() {
                return print_json(&graph);
            }
            let report: BTreeMap<_, _> = paths
                .iter()
                .map(|path| (path.clone(), graph.lookup(path.split('.'))))
                .collect();
            print_json(&report)
        }
    }
}

fn open_finder(
    repo: &Utf8Path,
    config: &AppConfig,
    mapper: Arc<ChannelMapper>,
) -> Result<AvailabilityFinder> {
    let provider = GitSnapshotProvider::open(repo, config.repository.clone())
        .with_context(|| format!("opening repository {repo}"))?;
    Ok(AvailabilityFinder::new(
        mapper,
        Arc::new(provider),
        config.finder.clone(),
        config.platform,
    )
    .with_cache(Arc::new(MemoryResultCache::new())))
}

fn init_tracing(debug: bool) {
    let default = if debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default.into()),
        )
        .init();
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("serializing output")?;
    println!("{text}");
    Ok(())
}
