// ============================
// crates/backend-bin/src/main.rs
// ============================
//! Tokio / Axum entry-point for the TutorHub API server.
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::{net::TcpListener, time::interval};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use tutorhub_backend::{
    auth::{mailer_from_settings, token_generator::generate_secure_token},
    config::{MailTransport, SecretKey, Settings},
    create_router,
    storage::FlatFileStorage,
    AppState,
};
use tutorhub_common::Role;

/// How often expired rate-limit windows and lockouts are dropped
const RATE_LIMIT_CLEANUP: Duration = Duration::from_secs(15 * 60);

#[derive(Parser)]
#[command(name = "tutorhub-server", version, about = "TutorHub API server")]
struct Cli {
    /// Config file (toml, yaml or json); defaults to ./config.{toml,yaml,json}
    #[arg(short, long, env = "TUTORHUB_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Add a user to the directory
    CreateUser {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
        #[arg(long, env = "TUTORHUB_NEW_USER_PASSWORD")]
        password: String,
        #[arg(long, default_value = "admin")]
        role: Role,
    },
}

fn init_tracing(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.log_level.clone()));

    let registry = tracing_subscriber::registry().with(filter);
    if settings.log_json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Settings plus whether an ephemeral token secret had to be generated
fn load_settings(path: Option<&PathBuf>) -> anyhow::Result<(Settings, bool)> {
    let mut settings = match path {
        Some(path) => Settings::load_from(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Settings::load().context("loading config")?,
    };

    // Validation already refuses a missing secret in production
    let generated = settings.token_secret.is_empty();
    if generated {
        settings.token_secret = SecretKey::new(generate_secure_token());
    }
    Ok((settings, generated))
}

async fn build_state(settings: Settings) -> anyhow::Result<Arc<AppState>> {
    let storage = FlatFileStorage::new(&settings.data_dir)
        .with_context(|| format!("opening data dir {}", settings.data_dir.display()))?;
    let mailer = mailer_from_settings(&settings.mail)?;
    let state = AppState::new(storage, settings, mailer)?;
    Ok(Arc::new(state))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let (settings, generated_secret) = load_settings(cli.config.as_ref())?;
    init_tracing(&settings);

    if generated_secret {
        tracing::warn!("token_secret not set; using an ephemeral key, sessions end on restart");
    }
    if settings.environment.is_production() && settings.mail.transport == MailTransport::Log {
        tracing::warn!("mail transport is `log`; reset codes will not reach users");
    }

    let bind_addr = settings.bind_addr;
    let state = build_state(settings).await?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            if let Some(admin) = state.ensure_bootstrap_admin().await? {
                tracing::info!(user_id = admin.id, email = %admin.email, "bootstrap admin created");
            }

            let limits = state.clone();
            tokio::spawn(async move {
                let mut interval = interval(RATE_LIMIT_CLEANUP);
                loop {
                    interval.tick().await;
                    limits.cleanup_rate_limits();
                }
            });

            let app = create_router(state);
            let listener = TcpListener::bind(bind_addr)
                .await
                .with_context(|| format!("binding {bind_addr}"))?;
            tracing::info!(%bind_addr, "listening");

            axum::serve(listener, app).await?;
        },
        Command::CreateUser {
            email,
            name,
            password,
            role,
        } => {
            let user = state.create_user(&name, &email, &password, role).await?;
            println!("created {} {} (id {})", user.role, user.email, user.id);
        },
    }

    Ok(())
}
