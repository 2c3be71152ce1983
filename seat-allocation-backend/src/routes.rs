//! JSON API over the seat service.

pub mod allocation;
pub mod seats;
pub mod students;
pub mod submit;

use std::convert::Infallible;
use std::sync::Arc;

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderValue, Method, Request, Response, StatusCode};
use http_body::Body;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::AppError;
use crate::AppState;

pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

#[derive(Clone, Copy, PartialEq, Eq)]
enum Access {
    Public,
    Admin,
}

type Handler = fn(Arc<AppState>, Request<Bytes>) -> HandlerFuture;
type HandlerFuture = std::pin::Pin<
    Box<dyn std::future::Future<Output = Result<Response<Full<Bytes>>, AppError>> + Send>,
>;

struct Route {
    method: Method,
    path: &'static str,
    access: Access,
    handler: Handler,
}

macro_rules! route {
    ($method:ident $path:literal $access:ident => $handler:path) => {
        Route {
            method: Method::$method,
            path: $path,
            access: Access::$access,
            handler: |state, request| -> HandlerFuture { Box::pin($handler(state, request)) },
        }
    };
}

fn routes() -> [Route; 6] {
    [
        route!(POST "/api/submit" Public => submit::submit),
        route!(GET "/api/seats" Public => seats::seats),
        route!(GET "/api/students" Admin => students::students),
        route!(POST "/api/reset" Admin => students::reset),
        route!(POST "/api/assign" Admin => allocation::assign),
        route!(GET "/api/allocation" Admin => allocation::latest),
    ]
}

/// Entry point for every request. Errors are turned into JSON responses here.
pub async fn handle<B>(
    state: Arc<AppState>,
    request: Request<B>,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body<Data = Bytes> + Send,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    debug!(method = %request.method(), path = request.uri().path(), "request");
    Ok(dispatch(state, request)
        .await
        .unwrap_or_else(AppError::into_response))
}

async fn dispatch<B>(
    state: Arc<AppState>,
    request: Request<B>,
) -> Result<Response<Full<Bytes>>, AppError>
where
    B: Body<Data = Bytes> + Send,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let (access, handler) = {
        let routes = routes();
        let path = request.uri().path();
        let mut matching = routes.iter().filter(|route| route.path == path).peekable();
        if matching.peek().is_none() {
            return Err(AppError::NotFound);
        }
        let route = matching
            .find(|route| route.method == request.method())
            .ok_or(AppError::MethodNotAllowed)?;
        (route.access, route.handler)
    };

    if access == Access::Admin {
        authorize(state.admin_token.as_deref(), request.headers())?;
    }

    let (parts, body) = request.into_parts();
    let bytes = read_body(body, state.max_body_bytes).await?;
    handler(state, Request::from_parts(parts, bytes)).await
}

/// Admin routes are open when no token is configured.
fn authorize(expected: Option<&str>, headers: &HeaderMap) -> Result<(), AppError> {
    let Some(expected) = expected else {
        return Ok(());
    };
    let given = headers
        .get(ADMIN_TOKEN_HEADER)
        .ok_or(AppError::Unauthorized)?;
    // comparing digests keeps the comparison time independent of the token
    if Sha256::digest(given.as_bytes()) == Sha256::digest(expected.as_bytes()) {
        Ok(())
    } else {
        Err(AppError::Unauthorized)
    }
}

async fn read_body<B>(body: B, limit: usize) -> Result<Bytes, AppError>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(error) if error.is::<LengthLimitError>() => Err(AppError::PayloadTooLarge(limit)),
        Err(error) => Err(AppError::Body(error)),
    }
}

pub fn parse_json<T: DeserializeOwned>(request: &Request<Bytes>) -> Result<T, AppError> {
    Ok(serde_json::from_slice(request.body())?)
}

pub fn json_response<T: Serialize + ?Sized>(
    status: StatusCode,
    value: &T,
) -> Result<Response<Full<Bytes>>, AppError> {
    let mut response = Response::new(Full::new(Bytes::from(serde_json::to_vec(value)?)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(response)
}

#[derive(Serialize)]
pub struct Ack {
    pub ok: bool,
}

pub fn ok() -> Result<Response<Full<Bytes>>, AppError> {
    json_response(StatusCode::OK, &Ack { ok: true })
}
