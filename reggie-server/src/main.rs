use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal::ctrl_c;
#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use reggie_core::IdGenerator;
use reggie_server::cache::{InMemoryCache, RedisCache};
use reggie_server::notify::{LogCodeSender, SmtpCodeSender};
use reggie_server::{build_router, AppState, Cache, CodeSender, Config, Database};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting Reggie takeout server");

    let config = Config::from_env().context("Failed to load configuration")?;

    let ids = IdGenerator::new(config.worker_id).context("Invalid WORKER_ID")?;
    info!("Using database: {}", config.database_path.display());
    let db = Database::open(&config.database_path, ids).context("Failed to open database")?;
    if config.bootstrap_admin && db.ensure_admin().await? {
        warn!("Created default admin account; change its password");
    }

    let cache: Arc<dyn Cache> = match &config.redis_url {
        Some(url) => {
            info!("Using Redis cache");
            Arc::new(
                RedisCache::connect(url)
                    .await
                    .context("Failed to connect to Redis")?,
            )
        }
        None => {
            info!("REDIS_URL not set, using in-process cache");
            Arc::new(InMemoryCache::new())
        }
    };

    let mailer: Arc<dyn CodeSender> = match &config.smtp {
        Some(smtp) => {
            info!("Sending verification codes through {}", smtp.host);
            Arc::new(SmtpCodeSender::new(smtp).context("Failed to configure SMTP")?)
        }
        None => {
            info!("SMTP_HOST not set, verification codes will only be logged");
            Arc::new(LogCodeSender)
        }
    };

    let port = config.port;
    let state = Arc::new(AppState {
        db: Arc::new(db),
        cache,
        mailer,
        config,
    });
    let app = build_router(state);

    let listener = TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    info!("Server listening on port {}", port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
