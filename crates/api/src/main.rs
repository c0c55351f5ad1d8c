use anyhow::Context;

use stockroom_api::app::{build_app, AppServices};
use stockroom_api::config::Settings;
use stockroom_infra::{InMemoryLedgerStore, PostgresLedgerStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load().context("failed to load configuration")?;
    stockroom_observability::init(settings.log.format);

    let report = settings.report_settings().context("invalid reporting settings")?;
    let limits = settings.movements;

    let app = match settings.database.url.as_deref() {
        Some(url) => {
            let store = PostgresLedgerStore::connect(url, settings.database.max_connections)
                .await
                .context("failed to connect to PostgreSQL")?;
            if settings.database.run_migrations {
                store.migrate().await.context("failed to run migrations")?;
            }
            tracing::info!("using PostgreSQL ledger store");
            build_app(AppServices::new(store, report, limits))
        }
        None => {
            tracing::warn!("database.url not set; using in-memory ledger store (data is lost on exit)");
            build_app(AppServices::new(InMemoryLedgerStore::default(), report, limits))
        }
    };

    let addr = settings.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!(environment = %settings.environment, "listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
