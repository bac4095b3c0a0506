//! s3gate - an authorizing reverse proxy for S3-compatible object stores.
//!
//! Every request is classified into an S3 action and its required permission, checked
//! with a policy evaluator, and only then forwarded to the backend.
//!
//! # Usage
//!
//! ```text
//! BACKEND_ENDPOINT=http://minio:9000 POLICY_ENDPOINT=http://opa:8181/v1/data/s3/allow s3gate-server
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `GATEWAY_LISTEN` | `0.0.0.0:8080` | Bind address |
//! | `BACKEND_ENDPOINT` | `http://127.0.0.1:9000` | Backend base URL |
//! | `BACKEND_ACCESS_KEY_ID` / `BACKEND_SECRET_ACCESS_KEY` | *(unset)* | Re-sign requests for the backend |
//! | `POLICY_ENDPOINT` | *(unset)* | HTTP policy evaluator |
//! | `POLICY_RULES_FILE` | *(unset)* | Static rules, used without `POLICY_ENDPOINT` |
//! | `SKIP_SIGNATURE_VALIDATION` | `false` | Trust client access keys without verifying |
//! | `CLIENT_CREDENTIALS` | *(unset)* | `AKID:SECRET,...` used to verify client signatures |
//! | `LOG_LEVEL` | `info` | Log level filter |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `LOG_LEVEL`) |
//!
//! Without a policy endpoint or rules file every request is denied.

mod components;

use std::future::Future;
use std::net::SocketAddr;

use anyhow::{Context, Result};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as HttpConnBuilder;
use hyper_util::server::graceful::GracefulShutdown;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use s3gate_core::GatewayConfig;
use s3gate_http::GatewayService;

use crate::components::build_service;

/// Server version reported at startup.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the tracing subscriber.
///
/// Uses `RUST_LOG` if set, otherwise falls back to the `LOG_LEVEL` config value.
fn init_tracing(log_level: &str) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    Ok(())
}

/// Accept connections until `shutdown` resolves, then drain in-flight requests.
async fn serve<F>(listener: TcpListener, service: GatewayService, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    let graceful = GracefulShutdown::new();
    let builder = HttpConnBuilder::new(TokioExecutor::new());
    tokio::pin!(shutdown);

    loop {
        let (stream, peer_addr) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    warn!(error = %e, "failed to accept connection");
                    continue;
                }
            },
            () = &mut shutdown => break,
        };

        let conn = builder
            .serve_connection(TokioIo::new(stream), service.clone())
            .into_owned();
        let conn = graceful.watch(conn);
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                debug!(%peer_addr, error = %e, "connection closed with error");
            }
        });
    }

    info!("stopped accepting, draining open connections");
    graceful.shutdown().await;
    info!("all connections drained");
    Ok(())
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("received shutdown signal");
}

/// Probe `GET /_health` over a raw HTTP/1.1 connection. Used as a container probe.
async fn run_health_check(addr: &str) -> Result<()> {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let mut stream = tokio::net::TcpStream::connect(addr)
        .await
        .with_context(|| format!("cannot connect to {addr}"))?;
    stream
        .write_all(format!("GET /_health HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n").as_bytes())
        .await
        .context("failed to send health probe")?;

    let mut response = String::new();
    stream
        .read_to_string(&mut response)
        .await
        .context("failed to read health response")?;

    anyhow::ensure!(is_healthy_response(&response), "unhealthy response from {addr}");
    Ok(())
}

fn is_healthy_response(response: &str) -> bool {
    response.starts_with("HTTP/1.1 200") && response.contains("\"status\":\"running\"")
}

/// The address to probe for a bind address: wildcard binds are probed on loopback.
fn probe_address(gateway_listen: &str) -> String {
    gateway_listen.replace("0.0.0.0", "127.0.0.1")
}

#[tokio::main]
async fn main() -> Result<()> {
    // Handle --health-check flag for Docker HEALTHCHECK.
    if std::env::args().any(|a| a == "--health-check") {
        let config = GatewayConfig::from_env().context("invalid configuration")?;
        let healthy = run_health_check(&probe_address(&config.gateway_listen))
            .await
            .is_ok();
        std::process::exit(i32::from(!healthy));
    }

    let config = GatewayConfig::from_env().context("invalid configuration")?;

    init_tracing(&config.log_level)?;

    info!(
        gateway_listen = %config.gateway_listen,
        backend_endpoint = %config.backend_endpoint,
        policy_endpoint = ?config.policy_endpoint,
        policy_rules_file = ?config.policy_rules_file,
        skip_signature_validation = config.skip_signature_validation,
        version = VERSION,
        "starting s3gate",
    );

    let service = build_service(&config)?;

    let addr: SocketAddr = config
        .gateway_listen
        .parse()
        .with_context(|| format!("invalid bind address: {}", config.gateway_listen))?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    info!(%addr, "listening for connections");

    serve(listener, service, ctrl_c()).await
}
