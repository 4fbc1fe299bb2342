mod configuration;
mod errors;
mod http;
mod metrics;
mod register;
mod ws;

use std::sync::Arc;

use anyhow::Result;
use auction_engine::store::{MemoryStore, PostgresStore, StateStore};
use auction_engine::Engine;
use clap::{crate_name, App, Arg};
use env_logger::Env;
use log::info;
use tokio::signal;
use tokio::signal::unix::{signal, SignalKind};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use configuration::Configuration;
use metrics::PrometheusExporterHandle;
use register::Register;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let matches = App::new(crate_name!())
        .arg(
            Arg::with_name("config-file")
                .short('c')
                .long("config-file")
                .takes_value(true)
                .default_value("./Config.toml")
                .help("The name of the configuration file"),
        )
        .get_matches();

    let register = Register::new(Configuration::new(matches.value_of("config-file").unwrap_or_default())?);

    info!("Starting auction-server");

    let store: Arc<dyn StateStore> = match register.config.get_database_url() {
        Some(database_url) => {
            info!("Connecting to Postgres");
            let store = PostgresStore::connect(&database_url).await?;
            store.run_migrations().await?;
            Arc::new(store)
        }
        None => {
            info!("No database_url configured, falling back to the in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    let engine = Arc::new(Engine::new(store));

    PrometheusExporterHandle::new(&register)?;

    let app = http::router(engine.clone())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let bind_address = register.config.get_http_bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!("auction-server listening on http://{bind_address}");

    tokio::select! {
        result = axum::serve(listener, app) => {
            if let Err(err) = result {
                log::error!("http server error: {err}");
            }
        }
        _ = wait_termination() => {}
    }

    info!("Shutting down auction-server");
    Ok(())
}

async fn wait_termination() {
    let mut term = signal(SignalKind::terminate()).unwrap();
    let mut inter = signal(SignalKind::interrupt()).unwrap();

    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Ctrl-C pressed");
        },
        _ = term.recv() => {
            info!("terminate signal received");
        },
        _ = inter.recv() => {
            info!("interrupt signal received");
        },
    }
}
