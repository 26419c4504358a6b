#[cfg(feature = "http_api")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use std::net::SocketAddr;
    use std::sync::Arc;

    use anyhow::Context;
    use timetable_sync::{SqliteScheduleStore, SyncConfig, SyncPipeline, http_api};
    use tracing::info;
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let addr: SocketAddr = std::env::var("TIMETABLE_HTTP_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:3000".to_string())
        .parse()
        .context("TIMETABLE_HTTP_ADDR is not a socket address")?;

    let config = SyncConfig::from_env().context("reading configuration")?;
    let store = Arc::new(
        SqliteScheduleStore::new(config.database_path()).context("opening schedule database")?,
    );
    let pipeline = Arc::new(SyncPipeline::new(config));
    pipeline
        .snapshot()
        .reload(&*store)
        .context("loading schedule snapshot")?;

    info!(%addr, "timetable HTTP API listening");
    http_api::serve(addr, store, pipeline).await?;
    Ok(())
}

#[cfg(not(feature = "http_api"))]
fn main() {
    eprintln!("Rebuild with the `http_api` feature to enable the HTTP server.");
}
