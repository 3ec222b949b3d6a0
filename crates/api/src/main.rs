//! API server entry point.

use api::config::{Config, LogFormat};
use journal::{FileJournal, InMemoryJournal, Journal};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let (json, text) = match config.log_format {
        LogFormat::Json => (Some(tracing_subscriber::fmt::layer().json()), None),
        LogFormat::Text => (None, Some(tracing_subscriber::fmt::layer())),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(text)
        .init();
}

async fn serve<J: Journal + Clone + 'static>(journal: J, config: Config, metrics: PrometheusHandle) {
    let state = api::create_default_state(journal, &config);

    // Restore the dashboard and restart unfinished orders
    api::recover(&state).await.expect("recovery from journal failed");

    let feed = state.dashboard.feed().clone();
    let app = api::create_app(state, metrics);

    let addr = config.addr();
    tracing::info!(%addr, "starting pizza dashboard");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            // Open count streams would otherwise hold the server open
            feed.shutdown();
        })
        .await
        .expect("server error");

    tracing::info!("server shut down gracefully");
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();
    init_tracing(&config);

    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    match config.journal_path.clone() {
        Some(path) => {
            tracing::info!(path = %path.display(), "using file journal");
            let journal = FileJournal::open(&path)
                .await
                .expect("failed to open journal file");
            serve(journal, config, metrics_handle).await;
        }
        None => {
            tracing::info!("using in-memory journal");
            serve(InMemoryJournal::new(), config, metrics_handle).await;
        }
    }
}
