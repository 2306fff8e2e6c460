//! figma-fetch - Fetch and cache Figma design files
//!
//! Command-line front end for the access layer.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use figma_fetch::auth::{self, AuthMode};
use figma_fetch::{api, config::Config};

#[derive(Parser)]
#[command(name = "figma-fetch")]
#[command(about = "Fetch and cache Figma design files", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Store credentials and settings
    Configure {
        /// Authentication mode
        #[arg(long, value_enum)]
        mode: Option<AuthMode>,

        /// OAuth client ID
        #[arg(long)]
        client_id: Option<String>,

        /// OAuth client secret
        #[arg(long)]
        client_secret: Option<String>,

        /// OAuth redirect URI
        #[arg(long)]
        redirect_uri: Option<String>,

        /// Personal access token (token mode)
        #[arg(long)]
        token: Option<String>,

        /// REST API base URL
        #[arg(long)]
        base_url: Option<String>,

        /// Directory for cached files
        #[arg(long)]
        cache_dir: Option<PathBuf>,
    },

    /// Print the OAuth authorization URL
    Authorize,

    /// Exchange an authorization code for tokens
    Login {
        /// The code, or the full URL Figma redirected to
        code: String,
    },

    /// Clear stored OAuth tokens
    Logout,

    /// Show authentication and cache status
    Status,

    /// Fetch a file (served from cache when available)
    Fetch {
        /// File key or Figma URL
        file: String,

        /// Ignore the cached copy and fetch again
        #[arg(short, long)]
        refresh: bool,

        /// Write the file JSON here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Fetch selected nodes of a file (never cached)
    Nodes {
        /// File key or Figma URL
        file: String,

        /// Node IDs, comma separated
        #[arg(long, value_delimiter = ',', required = true)]
        ids: Vec<String>,
    },

    /// Inspect or clear the file cache
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },
}

#[derive(Subcommand)]
enum CacheCommands {
    /// Show cache location and size
    Stats,

    /// Remove one cached file, or everything
    Clear {
        /// File key or Figma URL (all files when omitted)
        file: Option<String>,
    },
}

fn configure(
    mode: Option<AuthMode>,
    client_id: Option<String>,
    client_secret: Option<String>,
    redirect_uri: Option<String>,
    token: Option<String>,
    base_url: Option<String>,
    cache_dir: Option<PathBuf>,
) -> Result<()> {
    let mut config = Config::load()?;

    // New client registration invalidates tokens issued to the old one
    let client_changed = client_id.as_ref().is_some_and(|id| config.client_id.as_ref() != Some(id))
        || client_secret
            .as_ref()
            .is_some_and(|s| config.client_secret.as_ref() != Some(s));
    if client_changed && config.tokens.is_authorized() {
        tracing::info!("OAuth client changed, clearing stored tokens");
        config.tokens = Default::default();
    }

    if let Some(mode) = mode {
        config.auth_mode = mode;
    }
    config.client_id = client_id.or(config.client_id);
    config.client_secret = client_secret.or(config.client_secret);
    config.redirect_uri = redirect_uri.or(config.redirect_uri);
    config.personal_token = token.or(config.personal_token);
    config.api_base_url = base_url.or(config.api_base_url);
    config.cache_dir = cache_dir.or(config.cache_dir);
    config.save()?;

    println!("Configuration saved to {}", Config::config_path()?.display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match cli.command {
        Commands::Configure {
            mode,
            client_id,
            client_secret,
            redirect_uri,
            token,
            base_url,
            cache_dir,
        } => {
            configure(
                mode,
                client_id,
                client_secret,
                redirect_uri,
                token,
                base_url,
                cache_dir,
            )?;
        }
        Commands::Authorize => {
            auth::authorize()?;
        }
        Commands::Login { code } => {
            tracing::info!("Starting authentication flow...");
            auth::login(&code).await?;
        }
        Commands::Logout => {
            tracing::info!("Logging out...");
            auth::logout().await?;
        }
        Commands::Status => {
            auth::status().await?;
        }
        Commands::Fetch {
            file,
            refresh,
            output,
        } => {
            api::fetch(&file, refresh, output.as_deref()).await?;
        }
        Commands::Nodes { file, ids } => {
            api::nodes(&file, &ids).await?;
        }
        Commands::Cache { command } => match command {
            CacheCommands::Stats => api::cache_stats()?,
            CacheCommands::Clear { file } => api::cache_clear(file.as_deref())?,
        },
    }

    Ok(())
}
