use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod cli;
mod clock;
mod config;
mod errors;
mod models;
mod ring;
mod samples;
mod store;

use clock::{Clock, SystemClock};
use errors::AppError;
use ring::finalizer::Finalizer;
use ring::runner::CommandRinger;
use ring::BellService;
use store::memory::MemoryStore;
use store::redis::RedisStore;
use store::TokenStore;

/// Shared application state passed to handlers.
pub struct AppState {
    pub service: BellService,
    pub config: config::Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "bellgate=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = config::load()?;
    let args = cli::Cli::parse();

    let result = match args.command {
        Some(cli::Commands::Serve { port }) => {
            let port = port.unwrap_or(cfg.port);
            run_server(cfg, port).await
        }
        Some(cli::Commands::Token { command }) => {
            let state = build_state(cfg).await?;
            handle_token_command(command, &state).await
        }
        None => {
            let port = cfg.port;
            run_server(cfg, port).await
        }
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

/// Wire up the store, the bell worker and the service facade.
async fn build_state(cfg: config::Config) -> anyhow::Result<Arc<AppState>> {
    let store: Arc<dyn TokenStore> = match cfg.store {
        config::StoreBackend::Memory => Arc::new(MemoryStore::new()),
        config::StoreBackend::Redis => {
            tracing::info!("Connecting to Redis...");
            Arc::new(RedisStore::connect(&cfg.redis_url).await?)
        }
    };
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let ringer = Arc::new(CommandRinger::new(
        cfg.ring_command.clone(),
        cfg.ring_grace_ms,
    ));
    let queue = ring::worker::spawn(ringer, Finalizer::new(store.clone(), clock.clone()));
    let service = BellService::new(store, clock, queue);

    Ok(Arc::new(AppState {
        service,
        config: cfg,
    }))
}

async fn run_server(cfg: config::Config, port: u16) -> anyhow::Result<()> {
    let seed_samples = cfg.sample_tokens;
    let state = build_state(cfg).await?;

    if seed_samples {
        match state.service.reset_sample_tokens().await {
            Ok(tokens) => tracing::info!(count = tokens.len(), "sample tokens seeded"),
            Err(e) => tracing::warn!("failed to seed sample tokens: {}", e),
        }
    }

    let app = axum::Router::new()
        // Liveness (no auth)
        .route("/healthz", axum::routing::get(|| async { "ok" }))
        // Ring endpoints (verification is per-token, see handlers)
        .route(
            "/ring/:id",
            axum::routing::get(api::handlers::ring_status).post(api::handlers::ring_token),
        )
        // Management API
        .nest("/api/v1", api::api_router())
        .with_state(state.clone())
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer({
            use axum::http::{HeaderName, Method};
            use tower_http::cors::{Any, CorsLayer};
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::DELETE])
                .allow_headers([
                    HeaderName::from_static("content-type"),
                    HeaderName::from_static("authorization"),
                    HeaderName::from_static("x-admin-key"),
                ])
        });

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("bellgate listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn handle_token_command(
    cmd: cli::TokenCommands,
    state: &Arc<AppState>,
) -> anyhow::Result<()> {
    match cmd {
        cli::TokenCommands::Create {
            duration_ms,
            not_before,
            not_after,
            sticky,
            skip_verification,
        } => {
            let token = state
                .service
                .create_token(ring::TokenParams {
                    duration_ms,
                    not_before: parse_instant(not_before.as_deref())?,
                    not_after: parse_instant(not_after.as_deref())?,
                    sticky,
                    skip_verification,
                })
                .await?;
            println!(
                "Token created:\n  ID:       {}\n  Duration: {} ms\n  Sticky:   {}\n  Machine:  {}",
                token.id, token.duration_ms, token.sticky, token.skip_verification
            );
        }
        cli::TokenCommands::List => {
            let tokens = state.service.list_tokens().await?;
            if tokens.is_empty() {
                println!("No tokens found.");
            } else {
                println!("{:<38} {:<8} {:<10} FAILED", "ID", "STATUS", "DURATION");
                for t in tokens {
                    println!(
                        "{:<38} {:<8} {:<10} {}",
                        t.id, t.status, t.duration_ms, t.failed_count
                    );
                }
            }
        }
        cli::TokenCommands::Delete { id } => match state.service.delete_token(&id).await {
            Ok(_) => println!("Token deleted."),
            Err(AppError::UnknownToken) => println!("Token not found."),
            Err(AppError::TokenInUse) => println!("Token is ringing right now; try again later."),
            Err(e) => return Err(e.into()),
        },
        cli::TokenCommands::ResetSamples => {
            let tokens = state.service.reset_sample_tokens().await?;
            println!("Recreated {} sample tokens.", tokens.len());
        }
    }
    Ok(())
}

fn parse_instant(raw: Option<&str>) -> anyhow::Result<Option<chrono::DateTime<chrono::Utc>>> {
    raw.map(|s| {
        chrono::DateTime::parse_from_rfc3339(s)
            .map(|t| t.with_timezone(&chrono::Utc))
            .with_context(|| format!("'{s}' is not an RFC 3339 instant"))
    })
    .transpose()
}
