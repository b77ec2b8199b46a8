//! Example consumer: serves a catalog directory over HTTP.
//!
//! Run from repo root: `cargo run -p example-consumer`
//! Uses PostgreSQL when `DATABASE_URL` is set and S3 when `CATALOG_DOCUMENT_BUCKET` is set;
//! in-memory storage otherwise.

use catalog_sdk::{
    app, bootstrap_with_documents, load_from_dir, AppState, DocumentStore, MemoryDocumentStore,
    MemoryRepositoryFactory, PgRepositoryFactory, RepositoryFactory, S3DocumentStore, ServerSettings,
};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("catalog_sdk=info,example_consumer=info")),
        )
        .init();

    let settings = ServerSettings::from_env()?;
    let config = load_from_dir(&settings.config_path).await?;

    let factory: Box<dyn RepositoryFactory> = match &settings.database_url {
        Some(url) => {
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(5)
                .connect(url)
                .await?;
            Box::new(PgRepositoryFactory::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; records are kept in memory");
            Box::new(MemoryRepositoryFactory)
        }
    };
    let documents: Arc<dyn DocumentStore> = match &settings.document_bucket {
        Some(bucket) => Arc::new(S3DocumentStore::from_env(bucket.clone()).await),
        None => Arc::new(MemoryDocumentStore::new()),
    };

    let catalog = bootstrap_with_documents(config, factory.as_ref(), documents)?;
    let state = AppState::new(&catalog).with_body_limit(settings.body_limit);

    let listener = TcpListener::bind(&settings.bind).await?;
    tracing::info!("Catalog listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app(state)).await?;
    Ok(())
}
