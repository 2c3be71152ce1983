use std::sync::Arc;

use bytes::Bytes;
use http::{Request, Response, StatusCode};
use http_body_util::Full;
use seat_allocation_database::StudentRecord;
use serde::Serialize;

use crate::error::AppError;
use crate::routes::{json_response, ok};
use crate::AppState;

#[derive(Serialize)]
struct Students {
    students: Vec<StudentRecord>,
}

pub async fn students(
    state: Arc<AppState>,
    _request: Request<Bytes>,
) -> Result<Response<Full<Bytes>>, AppError> {
    let students = state.service.students().await?;
    json_response(StatusCode::OK, &Students { students })
}

pub async fn reset(
    state: Arc<AppState>,
    _request: Request<Bytes>,
) -> Result<Response<Full<Bytes>>, AppError> {
    state.service.reset().await?;
    ok()
}
