#[cfg(feature = "http_api")]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use std::sync::Arc;
    use timetable_store::{Timetable, TimetableConfig, http_api};
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let config = TimetableConfig::from_env()?;
    let timetable = Arc::new(Timetable::open_with_config(&config)?);
    tracing::info!(
        store = %timetable.describe_backend(),
        "timetable store ready"
    );

    println!("timetable HTTP API listening on http://{}", config.http_addr);
    http_api::serve(config.http_addr, timetable).await?;
    Ok(())
}

#[cfg(not(feature = "http_api"))]
fn main() {
    eprintln!("Rebuild with the `http_api` feature to enable the HTTP server.");
}
