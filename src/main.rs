//! Server binary: settings from the environment, store selection, migrations, bootstrap admin, serve.

use school_admin::{
    app, apply_migrations, auth, ensure_database_exists, AppState, LocalBlobStore, MemoryStore, PgStore, Settings,
    Store, StoreKind,
};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("school_admin=info")),
        )
        .init();

    let settings = Settings::from_env()?;
    let store: Arc<dyn Store> = match settings.store {
        StoreKind::Postgres => {
            ensure_database_exists(&settings.database_url).await?;
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(5)
                .connect(&settings.database_url)
                .await?;
            apply_migrations(&pool).await?;
            Arc::new(PgStore::new(pool))
        }
        StoreKind::Memory => {
            tracing::warn!("using in-memory store; data is lost on exit");
            Arc::new(MemoryStore::new())
        }
    };

    if let Some(admin) = &settings.bootstrap_admin {
        auth::ensure_admin(store.as_ref(), admin).await?;
    }

    tokio::fs::create_dir_all(&settings.media_root).await?;
    let blobs = Arc::new(LocalBlobStore::new(settings.media_root.clone()));
    let bind_addr = settings.bind_addr;
    let state = AppState::new(store, blobs, settings);

    let listener = TcpListener::bind(bind_addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app(state)).await?;
    Ok(())
}
