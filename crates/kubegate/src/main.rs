use std::io::{self, Write};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use tracing::info;

use kubegate::api::{self, AppState};
use kubegate::config::Settings;

const APP_NAME: &str = "kubegate";
const DEFAULT_CONFIG_FILE: &str = "kubegate.yaml";

fn main() {
    if let Err(err) = try_main() {
        let _ = writeln!(io::stderr(), "{err:?}");
        std::process::exit(1);
    }
}

#[tokio::main]
async fn async_main(settings: Settings, cmd: ServeCommand) -> Result<()> {
    handle_serve(settings, cmd).await
}

fn try_main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.common);

    match cli.command {
        Command::Serve(cmd) => {
            let settings = load_settings(&cli.common)?;
            async_main(settings, cmd)
        }
        Command::Config { command } => handle_config(&cli.common, command),
        Command::Completions { shell } => {
            handle_completions(shell);
            Ok(())
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Multi-cluster OIDC authentication gateway for Kubernetes.",
    propagate_version = true
)]
struct Cli {
    #[command(flatten)]
    common: CommonOpts,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Args)]
struct CommonOpts {
    /// Override the config file path
    #[arg(long, value_name = "PATH", env = "KUBEGATE_CONFIG", global = true)]
    config: Option<PathBuf>,
    /// Reduce output to only errors
    #[arg(short, long, global = true)]
    quiet: bool,
    /// Increase logging verbosity (stackable)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start the gateway
    Serve(ServeCommand),
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Args)]
struct ServeCommand {
    /// Host address to bind to
    #[arg(long)]
    host: Option<String>,
    /// Port to listen on
    #[arg(long)]
    port: Option<u16>,
}

#[derive(Debug, Subcommand)]
enum ConfigCommand {
    /// Print the resolved configuration with secrets redacted
    Show,
    /// Load and validate the configuration, then exit
    Validate,
}

fn init_logging(common: &CommonOpts) {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let level = if common.quiet {
        "error"
    } else {
        match common.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("kubegate={level},tower_http={level}")));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .ok();
}

/// Explicit path, or the default file if it exists; env-only config is valid.
fn config_path(common: &CommonOpts) -> Option<PathBuf> {
    if let Some(path) = &common.config {
        return Some(path.clone());
    }
    let default = Path::new(DEFAULT_CONFIG_FILE);
    default.exists().then(|| default.to_path_buf())
}

fn load_settings(common: &CommonOpts) -> Result<Settings> {
    let path = config_path(common);
    Settings::load(path.as_deref()).context("loading configuration")
}

fn handle_config(common: &CommonOpts, command: ConfigCommand) -> Result<()> {
    let settings = load_settings(common)?;
    match command {
        ConfigCommand::Show => {
            let mut redacted = settings;
            redacted.session_security_key = "<redacted>".to_string();
            for cluster in &mut redacted.clusters {
                if !cluster.client_secret.is_empty() {
                    cluster.client_secret = "<redacted>".to_string();
                }
            }
            let yaml = serde_yaml::to_string(&redacted).context("serializing configuration")?;
            print!("{yaml}");
        }
        ConfigCommand::Validate => {
            println!("configuration OK ({} clusters)", settings.clusters.len());
        }
    }
    Ok(())
}

fn handle_completions(shell: Shell) {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, APP_NAME, &mut io::stdout());
}

async fn handle_serve(mut settings: Settings, cmd: ServeCommand) -> Result<()> {
    if let Some(host) = cmd.host {
        settings.host = host;
    }
    if let Some(port) = cmd.port {
        settings.port = port;
    }

    let state = AppState::from_settings(&settings)?;
    let router = api::create_router(state);
    let addr: SocketAddr = format!("{}:{}", settings.host, settings.port)
        .parse()
        .context("parsing listen address")?;

    info!(%addr, tls = settings.serve_tls, clusters = settings.clusters.len(), "starting kubegate");

    if settings.serve_tls {
        // Validation guarantees both files are set.
        let cert = settings.cert_file.clone().unwrap_or_default();
        let key = settings.key_file.clone().unwrap_or_default();
        let tls = axum_server::tls_rustls::RustlsConfig::from_pem_file(cert, key)
            .await
            .context("loading TLS certificate")?;

        let handle = axum_server::Handle::new();
        let shutdown_handle = handle.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            shutdown_handle.graceful_shutdown(Some(Duration::from_secs(5)));
        });

        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(router.into_make_service())
            .await
            .context("server error")?;
    } else {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .context("binding to address")?;
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("server error")?;
    }

    info!("kubegate stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install signal handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
