//! HTTP server implementation using hyper

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response};
use hyper_util::rt::TokioIo;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::controller::Controller;
use crate::routes;
use crate::types::Result;

/// Paths with a handler; anything else is a 404
const KNOWN_PATHS: &[&str] = &[
    "/health",
    "/healthz",
    "/version",
    "/status",
    "/webhook",
    "/livekit/webhook",
    "/assign",
];

/// Shared application state
pub struct AppState {
    pub controller: Arc<Controller>,
}

impl AppState {
    pub fn new(controller: Arc<Controller>) -> Self {
        Self { controller }
    }
}

/// Bind `listen` and serve until `shutdown` resolves
pub async fn run(
    state: Arc<AppState>,
    listen: SocketAddr,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    let listener = TcpListener::bind(listen).await?;
    info!(
        "Switchboard listening on {} in {} mode",
        listener.local_addr()?,
        state.controller.mode()
    );
    serve(listener, state, shutdown).await
}

/// Accept connections on `listener` until `shutdown` resolves
///
/// In-flight requests keep running on their own tasks; only new connections
/// stop being accepted.
pub async fn serve(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutting down HTTP server");
                return Ok(());
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    let state = Arc::clone(&state);
                    tokio::spawn(async move {
                        let io = TokioIo::new(stream);

                        let service = service_fn(move |req| {
                            let state = Arc::clone(&state);
                            async move { handle_request(state, addr, req).await }
                        });

                        if let Err(err) = http1::Builder::new()
                            .serve_connection(io, service)
                            .await
                        {
                            error!("Error serving connection from {}: {:?}", addr, err);
                        }
                    });
                }
                Err(e) => {
                    error!("Error accepting connection: {:?}", e);
                }
            }
        }
    }
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> std::result::Result<Response<Full<Bytes>>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    info!("[{}] {} {}", addr, method, path);

    let response = match (method, path.as_str()) {
        (Method::GET, "/health") | (Method::GET, "/healthz") => routes::health_check(),

        (Method::GET, "/version") => routes::version_info(),

        (Method::GET, "/status") => routes::status_check(Arc::clone(&state)),

        // Platform webhooks; the second path matches the platform's default config
        (Method::POST, "/webhook") | (Method::POST, "/livekit/webhook") => {
            routes::handle_webhook(Arc::clone(&state), req).await
        }

        // Long-poll; hyper drops this future if the client goes away
        (Method::GET, "/assign") => routes::handle_assign(Arc::clone(&state)).await,

        (_, path) if KNOWN_PATHS.contains(&path) => routes::method_not_allowed_response(path),

        (_, path) => routes::not_found_response(path),
    };

    Ok(response)
}
