mod telemetry;

use seat_allocation_backend::error::AppError;
use seat_allocation_backend::{serve, setup_state, shutdown_signal};
use seat_allocation_config::get_config;
use tokio::net::TcpListener;
use tracing::info;

use crate::telemetry::setup_telemetry;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    setup_telemetry();

    let config = get_config()?;
    info!(?config, "starting up server...");

    let state = setup_state(&config).await?;
    let listener = TcpListener::bind(config.listen_address).await?;
    serve(listener, state, shutdown_signal()).await
}
