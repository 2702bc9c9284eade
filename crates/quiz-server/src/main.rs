use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use quiz_server::config::StoreBackend;
use quiz_server::quiz::QuizService;
use quiz_server::quiz::store::QuizStore;
use quiz_server::quiz::store::mock::InMemoryQuizStore;
use quiz_server::quiz::store::pg::PgQuizStore;
use quiz_server::rate_limit::IpRateLimiter;
use quiz_server::state::AppState;
use quiz_server::{config, db, routes};
use sqlx::PgPool;
use tokio::net::TcpListener;
use tower_http::trace::{DefaultMakeSpan, TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "quiz-server", version, about = "Ordered quiz list HTTP service")]
struct Cli {
    /// Port to listen on (overrides the PORT env var)
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quiz_server=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut cfg = config::Config::from_env();
    if let Some(port) = cli.port {
        cfg.port = port;
    }
    tracing::info!(environment = %cfg.environment, "starting with {cfg:?}");

    let (store, pool): (Arc<dyn QuizStore>, Option<PgPool>) = match cfg.store_backend {
        StoreBackend::Postgres => {
            let pool = db::create_pool(&cfg).await?;
            if cfg.run_migrations {
                db::run_migrations(&pool).await?;
            } else {
                tracing::info!("RUN_MIGRATIONS=false, skipping migrations");
            }
            let store: Arc<dyn QuizStore> = Arc::new(PgQuizStore::new(pool.clone()));
            (store, Some(pool))
        }
        StoreBackend::Memory => {
            tracing::warn!("STORE_BACKEND=memory, quizzes will not survive a restart");
            let store: Arc<dyn QuizStore> = Arc::new(InMemoryQuizStore::new());
            (store, None)
        }
    };

    let rate_limiter = Arc::new(IpRateLimiter::new(
        cfg.rate_limit_per_sec,
        cfg.rate_limit_burst,
    ));
    let sweeper = rate_limiter.spawn_sweeper(IpRateLimiter::DEFAULT_SWEEP_INTERVAL);

    let state = AppState {
        quizzes: QuizService::new(store),
        rate_limiter,
        trust_proxy: cfg.trust_proxy,
    };

    let app = routes::create_router(state)
        .layer(routes::cors_layer(&cfg.cors_origins))
        .layer(
            // Header capture stays off so client headers never reach the logs.
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(false)),
        );
    let addr = format!("0.0.0.0:{}", cfg.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("listening on {addr}");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    sweeper.abort();
    if let Some(pool) = pool {
        pool.close().await;
    }
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("failed to listen for ctrl_c: {e}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => tracing::warn!("failed to install SIGTERM handler: {e}"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
