use axum::Router;
use config::Config;
use envconfig::Envconfig;
use eyre::Result;

use crate::sinks::kafka::KafkaSink;
use crate::sinks::{NoopSink, PrintSink};
use crate::store::CustomerStore;

mod api;
mod config;
mod customer;
mod customers;
mod event;
mod prometheus;
mod router;
mod sinks;
mod store;
mod token;

async fn listen(app: Router, bind: String) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;

    axum::serve(listener, app).await?;

    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = Config::init_from_env().expect("failed to load configuration from env");

    let store = CustomerStore::new(&config.database_url, config.max_pg_connections)
        .expect("failed to create customer store");

    let recorder_handle = config
        .export_prometheus
        .then(prometheus::setup_metrics_recorder);

    let app = if config.print_sink {
        router::router(
            store,
            PrintSink {},
            config.api_token.clone(),
            recorder_handle,
        )
    } else if config.kafka.kafka_hosts.is_empty() {
        tracing::warn!("no Kafka hosts configured, customer events will not be published");
        router::router(
            store,
            NoopSink {},
            config.api_token.clone(),
            recorder_handle,
        )
    } else {
        let sink = KafkaSink::new(config.kafka.clone()).expect("failed to create Kafka sink");
        router::router(store, sink, config.api_token.clone(), recorder_handle)
    };

    match listen(app, config.bind()).await {
        Ok(_) => {}
        Err(e) => tracing::error!("failed to start customer-api http server, {}", e),
    }
}
