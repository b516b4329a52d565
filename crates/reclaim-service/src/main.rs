use clap::{Parser, ValueEnum};
use reclaim_adapters::hash_password;
use reclaim_core::StorageConfig;
use reclaim_service::{build_router, ServiceConfig, ServiceState};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StorageMode {
    Auto,
    Memory,
    File,
}

#[derive(Debug, Parser)]
#[command(name = "reclaimd", version, about = "Reclaim lost-and-found REST service")]
struct Cli {
    /// Socket address to bind, e.g. 127.0.0.1:8095
    #[arg(long, default_value = "127.0.0.1:8095")]
    listen: SocketAddr,
    /// Storage backend. `auto` picks the file backend when a database url is
    /// configured.
    #[arg(long, value_enum, default_value_t = StorageMode::Auto, env = "RECLAIM_STORAGE")]
    storage: StorageMode,
    /// SQLite url for persistent storage, e.g. sqlite://reclaim.db
    #[arg(long, env = "RECLAIM_DATABASE_URL")]
    database_url: Option<String>,
    /// Max pool connections for the file backend.
    #[arg(long, default_value_t = 5, env = "RECLAIM_DB_MAX_CONNECTIONS")]
    db_max_connections: u32,
    /// Directory holding uploaded item and proof images.
    #[arg(long, default_value = "data/uploads", env = "RECLAIM_IMAGE_DIR")]
    image_dir: PathBuf,
    /// Username of the bootstrap administrator account.
    #[arg(long, default_value = "admin", env = "RECLAIM_ADMIN_USER")]
    admin_user: String,
    /// When set, ensure the bootstrap administrator exists with this
    /// password. Existing accounts are left untouched.
    #[arg(long, env = "RECLAIM_ADMIN_PASSWORD")]
    admin_password: Option<String>,
}

fn resolve_storage(cli: &Cli) -> anyhow::Result<StorageConfig> {
    let resolved_url = cli
        .database_url
        .clone()
        .or_else(|| std::env::var("DATABASE_URL").ok());

    let storage = match cli.storage {
        StorageMode::Memory => StorageConfig::Memory,
        StorageMode::File => {
            let database_url = resolved_url.ok_or_else(|| {
                anyhow::anyhow!("storage=file requires --database-url or DATABASE_URL")
            })?;
            StorageConfig::file(database_url, cli.db_max_connections)
        }
        StorageMode::Auto => match resolved_url {
            Some(database_url) => StorageConfig::file(database_url, cli.db_max_connections),
            None => StorageConfig::Memory,
        },
    };

    Ok(storage)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "reclaim_service=info,info".to_string()),
        )
        .init();

    let cli = Cli::parse();
    let storage = resolve_storage(&cli)?;
    let config = ServiceConfig {
        storage,
        image_root: cli.image_dir.clone(),
    };
    let state = ServiceState::bootstrap(config).await?;
    info!(
        backend = state.engine.backend_label(),
        "reclaim storage ready"
    );

    if let Some(password) = &cli.admin_password {
        state
            .engine
            .seed_admin(&cli.admin_user, &hash_password(password)?)
            .await?;
        info!(username = %cli.admin_user, "bootstrap administrator ensured");
    }

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(cli.listen).await?;
    info!("reclaim-service listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
