//! The `parley` command: web server, terminal chat and model list.

mod config;
mod repl;

use clap::{Parser, Subcommand};
use config::ParleyConfig;
use parley_agent::{LlmClient, MessageDispatcher, PromptRenderer, API_KEY_ENV};
use parley_core::{ModelChoice, ResponseStyle};
use parley_gateway::{spawn_session_sweeper, AuthConfig, GatewayOptions, GatewayServer};
use parley_session::{InMemorySessionStore, SessionStore};
use repl::Repl;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "parley", version, about = "Parley: chat with Claude in the browser or the terminal")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "parley.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the web UI and API server
    Serve {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Chat in the terminal
    Chat {
        /// Model label, e.g. claude-3.5-haiku (overrides config)
        #[arg(short, long)]
        model: Option<ModelChoice>,
        /// Response style: normal, concise or custom (overrides config)
        #[arg(short, long)]
        style: Option<String>,
        /// Directive used with `--style custom`
        #[arg(long)]
        custom_style: Option<String>,
        /// File to attach before the first message (repeatable)
        #[arg(short, long = "file")]
        files: Vec<PathBuf>,
    },
    /// List the selectable models
    Models,
}

fn init_tracing(json: bool) {
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .json()
            .init();
    } else {
        // Terminal chat writes the conversation to stdout; keep logs quiet and on stderr.
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .compact()
            .with_writer(std::io::stderr)
            .init();
    }
}

fn build_dispatcher(config: &ParleyConfig) -> anyhow::Result<MessageDispatcher> {
    if !config.api.has_api_key() {
        anyhow::bail!("No API key configured: set {API_KEY_ENV} or [api].api_key in the config file");
    }

    let prompts = match &config.prompts_dir {
        Some(dir) => PromptRenderer::from_dir(dir)?,
        None => PromptRenderer::embedded()?,
    };

    Ok(MessageDispatcher::new(LlmClient::new(config.api.clone()), prompts))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(matches!(cli.command, Commands::Serve { .. }));

    let config = ParleyConfig::load(&cli.config)?;

    match cli.command {
        Commands::Serve { host, port } => {
            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);

            let dispatcher = Arc::new(build_dispatcher(&config)?);
            let sessions: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());

            if config.server.session_idle_secs > 0 {
                let max_idle = Duration::from_secs(config.server.session_idle_secs);
                spawn_session_sweeper(
                    sessions.clone(),
                    max_idle,
                    max_idle.min(Duration::from_secs(60)),
                );
            }

            let auth = AuthConfig::new(config.security.api_keys.clone());
            if auth.is_enabled() {
                info!(keys = config.security.api_keys.len(), "API key auth enabled");
            }

            let options = GatewayOptions {
                auth,
                max_upload_bytes: config.server.max_upload_bytes,
                defaults: config.session_defaults()?,
            };
            let app = GatewayServer::build_with_options(dispatcher, sessions, options);

            let addr = format!("{host}:{port}");
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            info!(addr = %addr, "Parley listening");

            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await?;
        }

        Commands::Chat {
            model,
            style,
            custom_style,
            files,
        } => {
            let dispatcher = build_dispatcher(&config)?;
            let mut settings = config.session_defaults()?;
            if let Some(model) = model {
                settings.model = model;
            }
            if let Some(style) = style {
                settings.style = ResponseStyle::from_parts(&style, custom_style.as_deref())?;
            }

            Repl::new(dispatcher, settings).run(files).await?;
        }

        Commands::Models => {
            for model in ModelChoice::ALL {
                let thinking = if model.supports_extended_thinking() {
                    "  (extended thinking)"
                } else {
                    ""
                };
                println!("{:<20}{}{}", model.label(), model.api_id(), thinking);
            }
        }
    }

    Ok(())
}
