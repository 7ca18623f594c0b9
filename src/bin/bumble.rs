use anyhow::{Result, anyhow};
use bumble::host::Host;
use bumble::host::config::HostConfig;
use bumble::preload::fetch::IoFetcher;
use bumble::preload::manifest::{Manifest, load_manifest_from_yaml};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tokio::runtime::Handle;
use tracing::{error, info};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Preload every resource of a manifest and report what was loaded
    Preload {
        /// Path to the manifest YAML file
        #[arg(long, short)]
        manifest: PathBuf,

        /// Directory local resource urls are resolved against (defaults to the manifest's directory)
        #[arg(long)]
        base_dir: Option<PathBuf>,

        /// Override the manifest framerate
        #[arg(long)]
        framerate: Option<u32>,

        /// Give up after this many frames
        #[arg(long)]
        max_ticks: Option<u64>,
    },

    /// Validate a manifest and list its resources
    Check {
        /// Path to the manifest YAML file
        #[arg(long, short)]
        manifest: PathBuf,
    },
}

fn load_checked(path: &Path) -> Result<Manifest> {
    let manifest = load_manifest_from_yaml(path)?;
    manifest.validate()?;
    Ok(manifest)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Check { manifest } => {
            let m = load_checked(&manifest)?;
            info!("Manifest '{}' is valid ({} resources)", m.name, m.resources.len());
            for r in &m.resources {
                info!("  {:<6} {:<24} {}", r.kind, r.name, r.url);
            }
        }

        Commands::Preload { manifest, base_dir, framerate, max_ticks } => {
            let m = load_checked(&manifest)?;
            let base_dir = base_dir.unwrap_or_else(|| {
                manifest.parent().map(Path::to_path_buf).unwrap_or_default()
            });

            let mut config = HostConfig::from_manifest(&m);
            if let Some(fps) = framerate {
                config.framerate = fps;
            }
            if max_ticks.is_some() {
                config.max_ticks = max_ticks;
            }

            info!("Preloading '{}' from {} at {} fps", m.name, base_dir.display(), config.framerate);
            let fetcher = Rc::new(IoFetcher::new(Handle::current(), base_dir));
            let mut host = Host::new(config, fetcher);
            host.preloader_mut().load_all(m.resources.clone());

            let frames = host.run_until_loaded().await?;
            let preloader = host.preloader();
            info!(
                "Loaded {}/{} resources in {} frames",
                preloader.loaded(),
                preloader.started(),
                frames
            );
            for r in &m.resources {
                if preloader.get(r.kind, &r.name).is_some() {
                    info!("  ok     {}", r.name);
                }
            }

            if preloader.failed_count() > 0 {
                for name in preloader.failed() {
                    error!("  failed {}", name);
                }
                return Err(anyhow!("{} resources failed to load", preloader.failed_count()));
            }
        }
    }

    Ok(())
}
