use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

use bounty_ledger::{
    api::{create_app, ApiState, SecurityMiddlewareConfig, SecurityState},
    config::{sanitize_for_logging, AppConfig},
    content::{ContentStore, IpfsContentStore, MemoryContentStore},
    database::{DatabasePool, MemoryStore, Store},
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Load configuration first - the arbiter address is mandatory
    let config = AppConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {:#}", e);
        eprintln!("Please check the BOUNTY_* environment variables.");
        e
    })?;

    init_logging(&config)?;

    info!("Starting bounty ledger");
    info!(
        arbiter = %config.dispute.arbiter_address,
        completion_points = config.ledger.completion_points,
        "Ledger settings"
    );

    let store = init_store(&config).await?;
    let content = init_content_store(&config)?;

    let state = ApiState::new(
        store,
        content,
        config.ledger.completion_points,
        &config.dispute.arbiter_address,
    )
    .context("Failed to initialize lifecycle components")?
    .with_admin_api_key(config.security.admin_api_key.clone());

    let security = SecurityState::new(SecurityMiddlewareConfig {
        rate_limit_per_minute: config.security.rate_limit_per_minute,
        max_request_size: config.security.max_request_size,
        log_requests: config.logging.log_requests,
    });

    let rate_limiter = security.rate_limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(300));
        loop {
            interval.tick().await;
            rate_limiter.cleanup();
        }
    });

    let app = create_app(state, security, config.security.enable_cors);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!("Listening on http://{}", addr);
    info!("  GET  /health");
    info!("  GET  /api/v1/bounties");
    info!("  POST /api/v1/bounties/{{id}}/claim|submit|complete|dispute|resolve");
    info!("  GET  /api/v1/reputation/{{user_id}}");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("Server error")?;

    Ok(())
}

fn init_logging(config: &AppConfig) -> Result<()> {
    let log_level = match config.logging.level.to_lowercase().as_str() {
        "error" => Level::ERROR,
        "warn" => Level::WARN,
        "info" => Level::INFO,
        "debug" => Level::DEBUG,
        "trace" => Level::TRACE,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_span_events(if config.logging.log_requests {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        })
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    Ok(())
}

async fn init_store(config: &AppConfig) -> Result<Arc<dyn Store>> {
    if !config.database.postgres_enabled {
        info!("PostgreSQL disabled, using in-memory store");
        return Ok(Arc::new(MemoryStore::new()));
    }

    let pool = DatabasePool::connect(
        &config.database.postgres_url,
        config.database.max_connections,
    )
    .await
    .context("Failed to connect to PostgreSQL")?;
    pool.init_schema()
        .await
        .context("Failed to initialize database schema")?;
    info!("PostgreSQL store ready");

    Ok(Arc::new(pool))
}

fn init_content_store(config: &AppConfig) -> Result<Arc<dyn ContentStore>> {
    let content = &config.content;
    if !content.ipfs_enabled {
        info!("IPFS disabled, keeping content in memory");
        return Ok(Arc::new(MemoryContentStore::new()));
    }

    if let Some(project_id) = &content.ipfs_project_id {
        info!(
            endpoint = %content.ipfs_endpoint,
            project_id = %sanitize_for_logging(project_id),
            "Using authenticated IPFS endpoint"
        );
    } else {
        info!(endpoint = %content.ipfs_endpoint, "Using IPFS endpoint");
    }

    let store = IpfsContentStore::new(
        &content.ipfs_endpoint,
        content.ipfs_project_id.clone(),
        content.ipfs_project_secret.clone(),
        content.timeout(),
    )
    .context("Failed to create IPFS client")?;

    Ok(Arc::new(store))
}
