use std::sync::Arc;

use bytes::Bytes;
use http::{Request, Response, StatusCode};
use http_body_util::Full;
use seat_allocation_optimizer::Allocation;
use serde::Serialize;

use crate::error::AppError;
use crate::routes::json_response;
use crate::AppState;

#[derive(Serialize)]
struct AllocationResponse<'a> {
    assigned: usize,
    unassigned: usize,
    #[serde(flatten)]
    allocation: &'a Allocation,
}

fn respond(allocation: &Allocation) -> Result<Response<Full<Bytes>>, AppError> {
    json_response(
        StatusCode::OK,
        &AllocationResponse {
            assigned: allocation.assigned(),
            unassigned: allocation.unassigned(),
            allocation,
        },
    )
}

pub async fn assign(
    state: Arc<AppState>,
    _request: Request<Bytes>,
) -> Result<Response<Full<Bytes>>, AppError> {
    let allocation = state.service.allocate().await?;
    respond(&allocation)
}

pub async fn latest(
    state: Arc<AppState>,
    _request: Request<Bytes>,
) -> Result<Response<Full<Bytes>>, AppError> {
    let allocation = state
        .service
        .latest_allocation()
        .await
        .ok_or(AppError::NoAllocation)?;
    respond(&allocation)
}
