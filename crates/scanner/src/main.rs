use anyhow::{anyhow, Context as _};
use axum::{routing::get, Router};
use scanner::{env, AppState, Config, Result};
use std::{
    env::args,
    net::{SocketAddr, TcpListener},
};
use tokio::signal::unix::SignalKind;
use tower_http::trace::TraceLayer;
use tracing_log::LogTracer;
use tracing_subscriber::{filter::EnvFilter, fmt::format::JsonFields, Layer};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(error) = env::load_dotenv() {
        eprintln!(
            "error loading .env.toml (this is expected in production): {}",
            error
        );
    }

    match args().nth(1).as_deref() {
        Some("version") => {
            println!("scanner v{VERSION}");
        }
        Some("serve") => {
            let config = envy::from_env::<Config>().context("error loading config")?;
            init_tracing(&config);

            let state = AppState::new(config).await?;

            let listener = TcpListener::bind(format!("0.0.0.0:{}", state.config.http_port))
                .context("failed to bind TCP listener")?;
            tracing::info!(port = state.config.http_port, "scanner listening");

            let app = scanner::api::routes(state.clone())
                .merge(Router::new().route("/", get(handle_root)))
                .layer(TraceLayer::new_for_http());

            let mut sigterm = tokio::signal::unix::signal(SignalKind::terminate())
                .context("failed to listen for terminate signal")?;
            let mut sigint = tokio::signal::unix::signal(SignalKind::interrupt())
                .context("failed to listen for interrupt signal")?;

            axum::Server::from_tcp(listener)
                .context("failed to start server")?
                .serve(app.into_make_service_with_connect_info::<SocketAddr>())
                .with_graceful_shutdown(async move {
                    let sigterm = sigterm.recv();
                    let sigint = sigint.recv();
                    futures::pin_mut!(sigterm, sigint);
                    futures::future::select(sigterm, sigint).await;
                    tracing::info!("Received interrupt signal");
                })
                .await
                .context("server error")?;
        }
        _ => {
            Err(anyhow!("usage: scanner <version | serve>"))?;
        }
    }
    Ok(())
}

async fn handle_root() -> String {
    format!("scanner v{VERSION}")
}

pub fn init_tracing(config: &Config) -> Option<()> {
    use std::str::FromStr;
    use tracing_subscriber::layer::SubscriberExt;
    let rust_log = config.rust_log.clone()?;

    LogTracer::init()
        .map_err(|error| eprintln!("failed to install log tracer: {error}"))
        .ok()?;

    let subscriber = tracing_subscriber::Registry::default()
        .with(if config.log_json.unwrap_or(false) {
            Box::new(
                tracing_subscriber::fmt::layer()
                    .fmt_fields(JsonFields::default())
                    .event_format(
                        tracing_subscriber::fmt::format()
                            .json()
                            .flatten_event(true)
                            .with_span_list(true),
                    ),
            ) as Box<dyn Layer<_> + Send + Sync>
        } else {
            Box::new(
                tracing_subscriber::fmt::layer()
                    .event_format(tracing_subscriber::fmt::format().pretty()),
            )
        })
        .with(
            EnvFilter::from_str(rust_log.as_str())
                .map_err(|error| eprintln!("invalid RUST_LOG filter: {error}"))
                .ok()?,
        );

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|error| eprintln!("failed to set tracing subscriber: {error}"))
        .ok()?;

    Some(())
}
