//! Site-Mirror main entry point
//!
//! This is the command-line interface for the Site-Mirror rendering website
//! mirror: run the HTTP service, crawl a single site, or export mirrors.

use anyhow::Context;
use clap::{Parser, Subcommand};
use site_mirror::config::{load_config_with_hash, Config};
use site_mirror::crawler::Coordinator;
use site_mirror::output::{print_statistics, zip_directory};
use site_mirror::storage::MirrorRoot;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Configuration file picked up from the working directory when `-c` is absent
const DEFAULT_CONFIG_FILE: &str = "site-mirror.toml";

/// Site-Mirror: a rendering website mirror
///
/// Site-Mirror renders every page of a site in headless Chrome, saves each
/// same-origin response it observes into a local directory tree, and serves
/// the results as zip archives.
#[derive(Parser, Debug)]
#[command(name = "site-mirror")]
#[command(version)]
#[command(about = "A rendering website mirror", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, global = true, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service
    Serve {
        /// Port to listen on (overrides the config file)
        #[arg(short, long, env = "PORT")]
        port: Option<u16>,
    },

    /// Mirror one site and print its statistics
    Crawl {
        /// Seed URL; its host scopes the crawl
        url: String,
    },

    /// List existing mirrors
    List,

    /// Write a mirror as a zip archive
    Export {
        /// Mirror name (the site's host)
        domain: String,

        /// Output file (defaults to <DOMAIN>.zip)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate the configuration and print the effective settings
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let config = load_configuration(cli.config.as_deref())?;

    match cli.command {
        Command::Serve { port } => handle_serve(config, port).await,
        Command::Crawl { url } => handle_crawl(&config, &url).await,
        Command::List => handle_list(&config).await,
        Command::Export { domain, output } => handle_export(&config, &domain, output).await,
        Command::Check => {
            handle_check(&config);
            Ok(())
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("site_mirror=info,tower_http=info,warn"),
            1 => EnvFilter::new("site_mirror=debug,tower_http=debug,info"),
            2 => EnvFilter::new("site_mirror=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Loads the explicit config, else `site-mirror.toml` if present, else defaults
fn load_configuration(path: Option<&Path>) -> anyhow::Result<Config> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None if Path::new(DEFAULT_CONFIG_FILE).is_file() => PathBuf::from(DEFAULT_CONFIG_FILE),
        None => {
            tracing::debug!("No configuration file, using defaults");
            return Ok(Config::default());
        }
    };

    tracing::info!("Loading configuration from: {}", path.display());
    let (config, hash) = load_config_with_hash(&path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    Ok(config)
}

async fn handle_serve(mut config: Config, port: Option<u16>) -> anyhow::Result<()> {
    if let Some(port) = port {
        config.server.port = port;
    }

    site_mirror::server::serve(&config)
        .await
        .context("Server error")
}

async fn handle_crawl(config: &Config, url: &str) -> anyhow::Result<()> {
    let coordinator = Coordinator::from_config(config);

    let report = coordinator
        .run(url)
        .await
        .with_context(|| format!("Backup of {} failed", url))?;

    println!("Backup completed!");
    println!("  Domain: {}", report.origin.host());
    println!("  Mirror: {}", report.mirror_dir.display());
    println!(
        "  Duration: {:.1}s\n",
        report.duration().num_milliseconds() as f64 / 1000.0
    );
    print_statistics(&report.stats);

    Ok(())
}

async fn handle_list(config: &Config) -> anyhow::Result<()> {
    let root = MirrorRoot::new(&config.output.backups_dir);
    let names = root.list().await.context("Failed to list backups")?;

    if names.is_empty() {
        println!("No backups in {}", root.path().display());
    }
    for name in names {
        println!("{}", name);
    }

    Ok(())
}

async fn handle_export(
    config: &Config,
    domain: &str,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let root = MirrorRoot::new(&config.output.backups_dir);
    let dir = root
        .existing(domain)
        .await
        .with_context(|| format!("No backup for {}", domain))?;

    let archive = tokio::task::spawn_blocking(move || zip_directory(&dir))
        .await
        .context("Archive task failed")??;

    let output = output.unwrap_or_else(|| PathBuf::from(format!("{}.zip", domain)));
    tokio::fs::write(&output, &archive)
        .await
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!(
        "✓ Exported {} to {} ({} bytes)",
        domain,
        output.display(),
        archive.len()
    );

    Ok(())
}

/// Validates config and shows the effective settings
fn handle_check(config: &Config) {
    println!("=== Site-Mirror Configuration ===\n");

    println!("Crawler:");
    println!("  Max concurrent renders: {}", config.crawler.max_concurrent);
    println!("  Max pages per crawl: {}", config.crawler.max_pages);

    println!("\nRender:");
    println!("  Backend: {:?}", config.render.backend);
    println!("  Navigation timeout: {}ms", config.render.navigation_timeout);
    println!("  Network idle window: {}ms", config.render.network_idle);
    println!("  Settle timeout: {}ms", config.render.settle_timeout);
    if let Some(path) = &config.render.chrome_executable {
        println!("  Chrome executable: {}", path.display());
    }
    println!("  User agent: {}", config.render.user_agent);

    println!("\nOutput:");
    println!("  Backups directory: {}", config.output.backups_dir.display());

    println!("\nServer:");
    println!("  Listen: {}:{}", config.server.host, config.server.port);
    match &config.server.static_dir {
        Some(dir) => println!("  Static files: {}", dir.display()),
        None => println!("  Static files: disabled"),
    }

    println!("\n✓ Configuration is valid");
}
