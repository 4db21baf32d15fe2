use std::sync::Arc;

use dotenv::dotenv;
use eyre::eyre;
use mimalloc::MiMalloc;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use forum::{
    App,
    config::{Env, ServerConfig, StoreBackend},
    router,
    store::{BoardStore, MemoryStore, PgStore},
};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn init_tracing(env: Env) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("forum=debug,tower_http=debug"));
    let registry = tracing_subscriber::registry().with(filter);

    match env {
        Env::Dev => registry.with(fmt::layer()).init(),
        Env::Staging | Env::Production => registry.with(fmt::layer().json()).init(),
    }
}

#[tokio::main]
async fn main() -> Result<(), eyre::Error> {
    dotenv().ok();
    init_tracing(Env::from_env());

    let config = ServerConfig::new_from_env();

    let store: Arc<dyn BoardStore> = match config.store_backend {
        StoreBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .ok_or_else(|| eyre!("DATABASE_URL is required for the postgres backend"))?;
            Arc::new(PgStore::connect(url, config.db_max_connections)?)
        }
        StoreBackend::Memory => {
            tracing::warn!("using the in-memory store, nothing will be persisted");
            Arc::new(MemoryStore::new())
        }
    };

    let listen_addr = config.listen_addr;
    let app = router(App {
        store,
        config: Arc::new(config),
    });

    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
