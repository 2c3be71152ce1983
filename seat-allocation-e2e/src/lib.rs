//! Runs the server on an ephemeral port and talks to it over plain HTTP/1.

// https://github.com/hyperium/hyper/blob/master/examples/client.rs

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::header::{CONTENT_TYPE, HOST};
use hyper::{Method, Request, StatusCode};
use hyper_util::rt::TokioIo;
use seat_allocation_backend::error::AppError;
use seat_allocation_backend::routes::ADMIN_TOKEN_HEADER;
use seat_allocation_backend::{serve, setup_state};
use seat_allocation_config::Config;
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing_subscriber::EnvFilter;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

pub struct TestServer {
    address: SocketAddr,
    admin_token: Option<String>,
    shutdown: oneshot::Sender<()>,
    server: JoinHandle<std::result::Result<(), AppError>>,
}

impl TestServer {
    /// Starts a server for `config`, ignoring its listen address.
    pub async fn start(config: Config) -> Result<Self> {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init()
            .ok();

        let state = setup_state(&config).await?;
        let listener =
            TcpListener::bind(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0)).await?;
        let address = listener.local_addr()?;
        let (shutdown, stop) = oneshot::channel::<()>();
        let server = tokio::spawn(serve(listener, state, async move {
            stop.await.ok();
        }));
        Ok(Self {
            address,
            admin_token: config.admin_token,
            shutdown,
            server,
        })
    }

    /// Sends one request on a fresh connection and decodes the JSON answer.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<(StatusCode, Value)> {
        self.request_with_token(method, path, self.admin_token.as_deref(), body)
            .await
    }

    pub async fn request_with_token(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<&Value>,
    ) -> Result<(StatusCode, Value)> {
        let stream = TcpStream::connect(self.address).await?;
        let (mut sender, connection) =
            hyper::client::conn::http1::handshake(TokioIo::new(stream)).await?;
        tokio::spawn(async move {
            if let Err(error) = connection.await {
                debug!(%error, "client connection failed");
            }
        });

        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header(HOST, self.address.to_string())
            .header(CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(ADMIN_TOKEN_HEADER, token);
        }
        let body = body.map_or_else(Bytes::new, |body| Bytes::from(body.to_string()));
        let response = sender.send_request(builder.body(Full::new(body))?).await?;

        let status = response.status();
        let bytes = response.into_body().collect().await?.to_bytes();
        Ok((status, serde_json::from_slice(&bytes)?))
    }

    /// Triggers a graceful shutdown and waits for the server to finish.
    pub async fn stop(self) -> Result<()> {
        self.shutdown.send(()).ok();
        self.server.await?.map_err(|error| error.to_string())?;
        Ok(())
    }
}
