use std::sync::Arc;

use bytes::Bytes;
use http::{Request, Response};
use http_body_util::Full;
use seat_allocation_optimizer::SubmissionRequest;

use crate::error::AppError;
use crate::routes::{ok, parse_json};
use crate::AppState;

pub async fn submit(
    state: Arc<AppState>,
    request: Request<Bytes>,
) -> Result<Response<Full<Bytes>>, AppError> {
    let payload: SubmissionRequest = parse_json(&request)?;
    state.service.submit(payload).await?;
    ok()
}
