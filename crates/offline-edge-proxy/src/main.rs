//! offline-edge proxy entry point.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use offline_edge_proxy::config::{resolve_config_path, ProxyConfig};
use offline_edge_proxy::{EdgeApp, HttpTransport};

#[derive(Parser)]
#[command(
    name = "offline-edge-proxy",
    about = "Intercepting edge in front of an origin: cached assets, offline page, adaptive images",
    version
)]
struct Cli {
    /// Path to the JSON config file.
    /// Also reads from OFFLINE_EDGE_CONFIG env var.
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Listen address (host:port), overrides the config file.
    #[arg(long, global = true)]
    listen: Option<String>,

    /// Origin URL, overrides the config file.
    #[arg(long, global = true)]
    origin: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Pre-cache the manifest, then serve (default).
    Serve,

    /// Run only the pre-cache step and print a report.
    Precache,

    /// Print the effective configuration as JSON.
    Info,

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   offline-edge-proxy completions bash > ~/.local/share/bash-completion/completions/offline-edge-proxy
    ///   offline-edge-proxy completions zsh > ~/.zfunc/_offline-edge-proxy
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let overrides = Overrides {
        config: cli.config,
        listen: cli.listen,
        origin: cli.origin,
    };

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            let (_, config) = overrides.load()?;
            let app = EdgeApp::from_config(config)?;
            let report = app.install().await?;
            tracing::info!("offline-edge proxy");
            tracing::info!("Origin: {}", app.origin());
            tracing::info!("Pre-cached: {} assets", report.stored.len());

            let listen = app.config().listen.clone();
            let transport = HttpTransport::new(Arc::new(app));
            transport.run(&listen).await?;
        }

        Commands::Precache => {
            let (_, config) = overrides.load()?;
            let app = EdgeApp::from_config(config)?;
            match app.install().await {
                Ok(report) => println!("{}", serde_json::to_string_pretty(&report)?),
                Err(e) => {
                    eprintln!("Pre-cache failed: {e}");
                    std::process::exit(1);
                }
            }
        }

        Commands::Info => {
            let (config_path, config) = overrides.load()?;
            let offline_url = config.offline_absolute()?;
            let precache = config.precache_urls()?;
            let info = serde_json::json!({
                "config_path": config_path.map(|p| p.display().to_string()),
                "config": config,
                "offline_url": offline_url,
                "precache": precache,
            });
            println!("{}", serde_json::to_string_pretty(&info)?);
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "offline-edge-proxy", &mut std::io::stdout());
        }
    }

    Ok(())
}

/// Command-line values layered over the config file.
struct Overrides {
    config: Option<String>,
    listen: Option<String>,
    origin: Option<String>,
}

impl Overrides {
    fn load(self) -> anyhow::Result<(Option<PathBuf>, ProxyConfig)> {
        let path = resolve_config_path(self.config.as_deref());
        let mut config = ProxyConfig::load(path.as_deref())?;
        if let Some(listen) = self.listen {
            config.listen = listen;
        }
        if let Some(origin) = self.origin {
            config.origin = origin;
        }
        config.validate()?;
        Ok((path, config))
    }
}
