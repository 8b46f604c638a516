use anyhow::Result;
use axum::Router;
use sqlx::sqlite::SqlitePoolOptions;
use std::{fs, io::ErrorKind, path::Path, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use powder_media::config::RelayConfig;
use powder_media::handlers::relay_handlers::RelayState;
use powder_media::models::policy::UploadPolicy;
use powder_media::routes::routes::routes;
use powder_media::services::storage_service::{INIT_SQL, StorageService, apply_migrations};

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config + migrate flag ---
    let (cfg, migrate_only) = RelayConfig::from_env_and_args()?;

    tracing::info!("Starting media relay with config: {:?}", cfg);

    // --- Ensure storage directory exists ---
    if !Path::new(&cfg.storage_dir).exists() {
        fs::create_dir_all(&cfg.storage_dir)?;
        tracing::info!("Created storage directory at {}", cfg.storage_dir);
    }

    // --- Initialize SQLite connection ---
    let db_url = &cfg.database_url;
    let db_path = db_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("file:");
    tracing::debug!("Interpreted SQLite path => {}", db_path);

    // Create parent directory if needed
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.exists() {
            fs::create_dir_all(parent)?;
            tracing::info!("Created missing directory {:?}", parent);
        }
    }

    // SQLx does not create the file for a bare URL; touch it first.
    match fs::OpenOptions::new().create(true).write(true).open(db_path) {
        Ok(_) => tracing::debug!("Database file can be created/opened."),
        Err(err) => tracing::warn!("Failed to open database file manually: {}", err),
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await?;

    // --- Migrations run on every start; --migrate stops after them ---
    apply_migrations(&pool, INIT_SQL).await?;
    if migrate_only {
        tracing::info!("Database migration complete.");
        return Ok(());
    }

    let db = Arc::new(pool);

    // --- Initialize core service ---
    let storage = StorageService::new(db.clone(), cfg.storage_dir.clone());
    let policy = UploadPolicy::relay_default().with_max_bytes(cfg.max_upload_bytes);

    // --- Build router ---
    let app: Router = routes(&cfg.allowed_origins).with_state(RelayState { storage, policy });

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Relay listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
