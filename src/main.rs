use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{debug, info, warn};

use linecord::config::{Config, LoggingConfig};
use linecord::discord::DiscordWebhook;
use linecord::error::{RelayError, Result};
use linecord::gateway::Gateway;
use linecord::identity::{IdentityCache, IdentityResolver};
use linecord::line::LineClient;

#[derive(Parser)]
#[command(name = "linecord", version, about = "Relay LINE chat events to a Discord webhook")]
struct Cli {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter config file
    Init,
    /// Start the webhook server
    Start,
    /// Validate the configuration and print a summary
    Check,
    /// Query the running server's health endpoint
    Status,
    /// Show recent logs
    Logs {
        /// Number of lines to show
        #[arg(short = 'n', long, default_value = "50")]
        lines: usize,
    },
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Loaded before the config so `${VAR}` and env overrides can see it;
    // reported once logging is up.
    let dotenv = dotenvy::dotenv();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);

    match cli.command {
        Commands::Init => {
            init_logging(None, &dotenv)?;
            cmd_init(&config_path)?;
        }
        Commands::Start => {
            let config = Config::load_or_default(&config_path)?;
            init_logging(Some(&config.logging), &dotenv)?;
            config.validate()?;
            cmd_start(config).await?;
        }
        Commands::Check => {
            init_logging(None, &dotenv)?;
            cmd_check(&config_path)?;
        }
        Commands::Status => {
            init_logging(None, &dotenv)?;
            cmd_status(&config_path).await?;
        }
        Commands::Logs { lines } => {
            init_logging(None, &dotenv)?;
            cmd_logs(&config_path, lines)?;
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

type DotenvResult = std::result::Result<PathBuf, dotenvy::Error>;

/// A missing `.env` is normal; an unreadable or malformed one is not.
fn dotenv_problem(result: &DotenvResult) -> Option<&dotenvy::Error> {
    match result {
        Err(e) if !e.not_found() => Some(e),
        _ => None,
    }
}

fn init_logging(file: Option<&LoggingConfig>, dotenv: &DotenvResult) -> Result<()> {
    linecord::logging::init_tracing(file)?;
    match dotenv {
        Ok(path) => debug!("Loaded environment from {}", path.display()),
        Err(_) => {
            if let Some(e) = dotenv_problem(dotenv) {
                warn!("Ignoring .env file: {e}");
            }
        }
    }
    Ok(())
}

/// Load and validate; any missing secret aborts startup.
fn load_config(path: &Path) -> Result<Config> {
    let config = Config::load_or_default(path)?;
    config.validate()?;
    Ok(config)
}

fn build_gateway(config: &Config) -> Result<Gateway> {
    let timeout = Duration::from_secs(config.relay.timeout_secs);

    let line: Arc<LineClient> = Arc::new(LineClient::new(
        &config.line.api_base,
        &config.line.data_api_base,
        config.access_token()?,
        timeout,
    )?);
    let webhook = Arc::new(DiscordWebhook::new(config.webhook_url()?, timeout)?);

    let resolver = IdentityResolver::new(
        line.clone(),
        config.overrides.clone(),
        IdentityCache::new(config.relay.cache_capacity),
    );

    Ok(
        Gateway::new(resolver, line, webhook, config.relay.max_file_size)
            .with_fetch_failure_policy(config.relay.on_fetch_failure),
    )
}

/// Show at most the first few characters of a secret.
fn redact(secret: &str) -> String {
    let shown: String = secret.chars().take(4).collect();
    format!("{shown}…")
}

/// Address to reach a server bound to `bind` from this machine.
fn local_url(bind: &str) -> String {
    let addr = bind
        .replace("0.0.0.0", "127.0.0.1")
        .replace("[::]", "[::1]");
    format!("http://{addr}")
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn cmd_init(config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("Config already exists at {}", config_path.display());
        return Ok(());
    }
    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(config_path, Config::default_toml())?;
    println!("Created config at {}", config_path.display());
    println!("Set LINE_CHANNEL_ACCESS_TOKEN and DISCORD_WEBHOOK_URL, then run `linecord start`.");
    Ok(())
}

async fn cmd_start(config: Config) -> Result<()> {
    let bind_addr = config.server.bind.clone();
    let gateway = Arc::new(build_gateway(&config)?);

    let state = Arc::new(linecord::api::AppState { gateway });
    let app = linecord::api::router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| RelayError::Config(format!("Failed to bind to {bind_addr}: {e}")))?;

    let local_addr = listener
        .local_addr()
        .map_err(|e| RelayError::Config(format!("Failed to get local address: {e}")))?;

    info!(
        "linecord v{} listening on {local_addr} (overrides={}, cache_capacity={}, on_fetch_failure={:?})",
        env!("CARGO_PKG_VERSION"),
        config.overrides.len(),
        config.relay.cache_capacity,
        config.relay.on_fetch_failure,
    );

    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutting down...");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| RelayError::Config(format!("Server error: {e}")))?;

    info!("linecord stopped");
    Ok(())
}

fn cmd_check(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;

    let source = if config_path.exists() {
        config_path.display().to_string()
    } else {
        "environment only".to_string()
    };

    println!("Config OK ({source})");
    println!("  Bind:          {}", config.server.bind);
    println!("  LINE token:    {}", redact(config.access_token()?));
    println!("  LINE API:      {}", config.line.api_base);
    let webhook_host = url::Url::parse(config.webhook_url()?)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_default();
    println!("  Webhook:       {webhook_host} (path redacted)");
    println!("  Timeout:       {}s", config.relay.timeout_secs);
    println!("  Max file size: {} bytes", config.relay.max_file_size);
    println!("  Cache:         {}", match config.relay.cache_capacity {
        0 => "unbounded".to_string(),
        n => format!("{n} entries"),
    });
    println!("  Fetch failure: {:?}", config.relay.on_fetch_failure);
    println!("  Overrides:     {}", config.overrides.len());
    println!("  Log dir:       {}", config.logging.dir);
    Ok(())
}

async fn cmd_status(config_path: &Path) -> Result<()> {
    let config = Config::load_or_default(config_path)?;
    let url = format!("{}/health", local_url(&config.server.bind));

    match reqwest::get(&url).await {
        Ok(resp) if resp.status().is_success() => {
            println!("linecord is running on {}", config.server.bind);
            if let Ok(body) = resp.text().await {
                println!("  Health: {body}");
            }
        }
        Ok(resp) => println!("Health check on {url} returned {}", resp.status()),
        Err(_) => println!("linecord is not reachable at {url}"),
    }
    Ok(())
}

fn cmd_logs(config_path: &Path, num_lines: usize) -> Result<()> {
    let config = Config::load_or_default(config_path)?;
    let dir = PathBuf::from(&config.logging.dir);

    let Some(path) = linecord::logging::dated_log_files(&dir)?.pop() else {
        println!("No log file found in {}", dir.display());
        println!("Start the server first: linecord start");
        return Ok(());
    };

    let content = std::fs::read_to_string(&path)?;
    let lines: Vec<&str> = content.lines().collect();
    let start = lines.len().saturating_sub(num_lines);

    for line in &lines[start..] {
        println!("{line}");
    }

    if start > 0 {
        println!(
            "\n(Showing last {} of {} lines from {})",
            lines.len() - start,
            lines.len(),
            path.display()
        );
    }

    Ok(())
}
