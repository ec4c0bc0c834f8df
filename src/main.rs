//! CLI entry point for curator-rs

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use curator_rs::assets::Bucket;

#[derive(Parser)]
#[command(name = "curator-rs")]
#[command(version = "0.1.0")]
#[command(about = "Content synchronization and asset lifecycle backend", long_about = None)]
struct Cli {
    /// Set the base directory (defaults to current directory)
    #[arg(short, long, global = true)]
    cwd: Option<PathBuf>,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the content API server
    #[command(alias = "s")]
    Serve {
        /// Port to listen on (overrides curator.yml)
        #[arg(short, long)]
        port: Option<u16>,

        /// IP address to bind to (overrides curator.yml)
        #[arg(short, long)]
        ip: Option<String>,
    },

    /// Print the sitemap XML, or write it to a file
    Sitemap {
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Delete aged, unreferenced assets
    Sweep {
        /// Bucket to sweep (all buckets when omitted)
        #[arg(short, long)]
        bucket: Option<String>,

        /// Report orphans without deleting them
        #[arg(long)]
        dry_run: bool,

        /// Grace window in seconds (overrides curator.yml)
        #[arg(long)]
        grace_secs: Option<u64>,
    },

    /// Display version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.debug {
        "curator_rs=debug,info"
    } else {
        "curator_rs=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine base directory
    let base_dir = cli.cwd.unwrap_or_else(|| std::env::current_dir().unwrap());

    match cli.command {
        Commands::Serve { port, ip } => {
            let mut curator = curator_rs::Curator::new(&base_dir)?;
            if let Some(port) = port {
                curator.config.server_port = port;
            }
            if let Some(ip) = ip {
                curator.config.server_ip = ip;
            }

            tracing::info!(
                "Serving content for {} against {}",
                curator.config.title,
                curator.config.store_url
            );
            curator_rs::server::start(curator.editor()?, &curator.config).await?;
        }

        Commands::Sitemap { output } => {
            let curator = curator_rs::Curator::new(&base_dir)?;
            let entries =
                curator_rs::sitemap::entries(&curator.store()?, &curator.config.url).await;
            let xml = curator_rs::sitemap::render_sitemap(&entries);

            match output {
                Some(path) => {
                    std::fs::write(&path, xml)?;
                    println!("Wrote sitemap with {} entries to {:?}", entries.len(), path);
                }
                None => print!("{}", xml),
            }
        }

        Commands::Sweep {
            bucket,
            dry_run,
            grace_secs,
        } => {
            let curator = curator_rs::Curator::new(&base_dir)?;
            let editor = curator.editor()?;
            let grace = grace_secs
                .map(Duration::from_secs)
                .unwrap_or_else(|| curator.config.sweep_grace());

            let buckets: Vec<Bucket> = match bucket {
                Some(name) => vec![Bucket::from_name(&name)
                    .ok_or_else(|| anyhow::anyhow!("unknown bucket: {}", name))?],
                None => Bucket::ALL.to_vec(),
            };

            for bucket in buckets {
                let report = editor.sweep_orphans(bucket, grace, dry_run).await?;
                println!(
                    "{}: scanned {}, retained {}, skipped {} recent, {} {} orphan(s)",
                    bucket.as_str(),
                    report.scanned,
                    report.retained,
                    report.skipped_recent,
                    if dry_run { "found" } else { "deleted" },
                    report.deleted.len()
                );
            }
        }

        Commands::Version => {
            println!("curator-rs version {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
