//! Poll an S3 prefix for delimited files and publish their rows to Kafka as Avro.
use anyhow::{Context, Error};
use csv_producer::{
    config::{load_dotenv, Config},
    context::AppContext,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

fn setup_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let log_layer = tracing_subscriber::fmt::layer().with_filter(filter);
    tracing_subscriber::registry().with(log_layer).init();
}

#[tokio::main]
pub async fn main() -> Result<(), Error> {
    // Before tracing, so RUST_LOG can come from the file
    let dotenv = load_dotenv();
    setup_tracing();
    info!("Starting up...");

    match dotenv {
        Ok(Some(path)) => info!("Loaded environment from {}", path.display()),
        Ok(None) => {}
        Err(e) => warn!("Failed to load environment file: {}", e),
    }

    let config = Config::load().inspect_err(|e| error!("Invalid configuration: {}", e))?;

    if let Some(bind) = config.metrics_bind.0 {
        PrometheusBuilder::new()
            .with_http_listener(bind)
            .install()
            .context("installing prometheus exporter")?;
        info!("Serving metrics on {}", bind);
    }

    let context = AppContext::new(&config)
        .await
        .inspect_err(|e| error!("Failed to initialize: {:#}", e))?;

    info!(
        bucket = config.bucket.as_str(),
        prefix = config.path_prefix.as_str(),
        topic = config.kafka_topic.as_str(),
        "Watching for files"
    );
    context.discovery_loop().run().await;

    Ok(())
}
