use std::sync::Arc;

use bytes::Bytes;
use http::{Request, Response, StatusCode};
use http_body_util::Full;
use serde::Serialize;

use crate::error::AppError;
use crate::routes::json_response;
use crate::service::SeatOccupancy;
use crate::AppState;

#[derive(Serialize)]
struct SeatMap {
    seats: Vec<SeatOccupancy>,
}

pub async fn seats(
    state: Arc<AppState>,
    _request: Request<Bytes>,
) -> Result<Response<Full<Bytes>>, AppError> {
    let seats = state.service.seat_map().await?;
    json_response(StatusCode::OK, &SeatMap { seats })
}
