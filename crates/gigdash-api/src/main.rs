//! gigdash API server.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::request_id::{
    MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use gigdash_api::config::{LogConfig, LogFormat, ServerConfig};
use gigdash_api::{build_bus, router, AppState};
use gigdash_core::{logging, EventBus};

/// Request ID generator using UUIDv7 for time-ordered request tracing.
#[derive(Clone, Default)]
struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

fn parse_allowed_origins(origins: &[String]) -> Vec<HeaderValue> {
    origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(e) => {
                warn!("Invalid CORS origin '{}': {}", origin, e);
                None
            }
        })
        .collect()
}

/// Install the global subscriber. The returned guard must live as long as
/// the process when logging to a file.
fn init_tracing(log: &LogConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "gigdash_api=debug,gigdash_core=info,tower_http=debug".into());

    let registry = tracing_subscriber::registry().with(env_filter);

    if let Some(ref path) = log.file {
        let file_dir = path.parent().unwrap_or(std::path::Path::new("."));
        let file_name = path
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("gigdash-api.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        match log.format {
            LogFormat::Json => registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init(),
            LogFormat::Text => registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(log.ansi.unwrap_or(false)), // no ANSI in files by default
                )
                .init(),
        }
        Some(guard)
    } else {
        match log.format {
            LogFormat::Json => registry
                .with(tracing_subscriber::fmt::layer().json())
                .init(),
            LogFormat::Text => {
                let mut layer = tracing_subscriber::fmt::layer();
                if let Some(ansi) = log.ansi {
                    layer = layer.with_ansi(ansi);
                }
                registry.with(layer).init();
            }
        }
        None
    }
}

/// Resolves on Ctrl-C, then closes the bus so open SSE streams finish and
/// the server can drain.
async fn shutdown_signal(bus: Arc<EventBus>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!(
        subsystem = logging::SUBSYSTEM_STREAM,
        "Shutdown requested, closing event streams"
    );
    bus.destroy();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = ServerConfig::from_env()?;
    let _file_guard = init_tracing(&config.log);

    info!(
        log_format = ?config.log.format,
        log_file = config
            .log
            .file
            .as_deref()
            .and_then(|p| p.to_str())
            .unwrap_or("(stdout)"),
        "Logging initialized"
    );

    let bus = Arc::new(build_bus(config.adapter, config.bus_capacity));
    info!(
        adapter = bus.adapter_name(),
        heartbeat_secs = config.stream.heartbeat_interval.as_secs(),
        stream_buffer = config.stream.buffer,
        "Event bus ready"
    );

    let state = AppState::new(bus.clone(), config.stream.clone());

    let app = router(state)
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(parse_allowed_origins(
                    &config.allowed_origins,
                )))
                .allow_methods([Method::GET, Method::OPTIONS])
                .allow_headers([header::AUTHORIZATION, header::ACCEPT, header::CACHE_CONTROL])
                .allow_credentials(true)
                .max_age(std::time::Duration::from_secs(3600)),
        );

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(bus))
        .await?;

    info!("Server stopped");
    Ok(())
}
