#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    reason = "not yet ready for that"
)]

pub mod error;
pub mod routes;
pub mod service;

use core::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use hyper::body::Incoming;
use hyper::Request;
use hyper_util::rt::{TokioExecutor, TokioIo};
use seat_allocation_config::Config;
use seat_allocation_database::{MemoryStore, PgStore, SubmissionStore};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::service::SeatService;

pub struct AppState {
    pub service: SeatService,
    pub admin_token: Option<String>,
    pub max_body_bytes: usize,
}

impl AppState {
    #[must_use]
    pub fn new(service: SeatService, config: &Config) -> Self {
        Self {
            service,
            admin_token: config.admin_token.clone(),
            max_body_bytes: config.max_body_bytes,
        }
    }
}

/// Builds the seat inventory and connects the submission store described by `config`.
pub async fn setup_state(config: &Config) -> Result<Arc<AppState>, AppError> {
    let inventory = config.seat_inventory()?;
    let store: Arc<dyn SubmissionStore> = match &config.database_url {
        Some(database_url) => Arc::new(PgStore::connect(database_url).await?),
        None => {
            warn!("no database configured, submissions are only kept in memory");
            Arc::new(MemoryStore::new())
        }
    };
    if config.admin_token.is_none() {
        warn!("no admin token configured, administrative routes are open");
    }
    info!(
        seats = inventory.len(),
        capacity = inventory.total_capacity(),
        "loaded seat inventory"
    );
    Ok(Arc::new(AppState::new(
        SeatService::new(store, inventory),
        config,
    )))
}

/// Serves HTTP/1 and HTTP/2 on `listener` until `shutdown` completes, then waits for open
/// connections to finish their requests.
#[allow(clippy::redundant_pub_crate)]
pub async fn serve(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: impl Future<Output = ()> + Send,
) -> Result<(), AppError> {
    // tell the connections to shutdown
    let (shutdown_tx, shutdown_rx) = watch::channel(());
    let shutdown_tx = Arc::new(shutdown_tx);

    // wait for the connections to finish shutdown
    let (closed_tx, closed_rx) = watch::channel(());

    info!(address = %listener.local_addr()?, "listening");
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accept = listener.accept() => {
                let (socket, remote_address): (_, SocketAddr) = match accept {
                    Ok(accepted) => accepted,
                    Err(error) => {
                        warn!(%error, "failed to accept connection");
                        continue;
                    }
                };
                let state = Arc::clone(&state);
                let shutdown_tx = Arc::clone(&shutdown_tx);
                let closed_rx = closed_rx.clone();

                tokio::spawn(async move {
                    let hyper_service = hyper::service::service_fn(move |request: Request<Incoming>| {
                        routes::handle(Arc::clone(&state), request)
                    });
                    let builder = hyper_util::server::conn::auto::Builder::new(TokioExecutor::new());
                    let connection = builder.serve_connection(TokioIo::new(socket), hyper_service);
                    tokio::pin!(connection);

                    let result = tokio::select! {
                        result = connection.as_mut() => result,
                        () = shutdown_tx.closed() => {
                            connection.as_mut().graceful_shutdown();
                            connection.as_mut().await
                        }
                    };
                    if let Err(error) = result {
                        debug!(%remote_address, error = %error, "connection closed with error");
                    }

                    drop(closed_rx);
                });
            }
            () = &mut shutdown => {
                info!("shutting down");
                break;
            }
        }
    }

    drop(listener);
    drop(shutdown_rx); // initiate shutdown
    drop(closed_rx);
    closed_tx.closed().await;
    Ok(())
}

#[allow(clippy::redundant_pub_crate)]
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            warn!(%error, "failed to listen for Ctrl+C");
            core::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                warn!(%error, "failed to listen for SIGTERM");
                core::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = core::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
