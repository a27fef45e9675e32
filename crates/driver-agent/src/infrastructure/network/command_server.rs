//! HTTP command transport.
//!
//! One `POST /<route>` endpoint per route name.  The request body is the
//! plain-text command (see [`driver_core::protocol::route`]); the response is
//! always the JSON [`CommandResponse`], with HTTP 200 even when the command
//! failed.  Two cases are answered at the transport level instead:
//!
//! | case                    | HTTP | body                          |
//! |-------------------------|------|-------------------------------|
//! | unknown path            | 404  | `BadRoute` CommandResponse    |
//! | body is not UTF-8       | 400  | plain text                    |
//!
//! The session token travels in the [`TOKEN_HEADER`] header; the client
//! identity recorded by `driver start` is the `User-Agent`.

use std::future::Future;
use std::net::{IpAddr, SocketAddr};

use axum::{
    body::Bytes,
    extract::{MatchedPath, State},
    http::{header::USER_AGENT, HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use driver_core::{CommandError, CommandResponse, RouteName};
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{debug, info};

use crate::application::command_router::CommandRequest;
use crate::application::executor::ExecutorHandle;

/// Header carrying the session token.
pub const TOKEN_HEADER: &str = "x-driver-token";

/// Identity used when the client sends no `User-Agent`.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Error type for the command server.
#[derive(Debug, Error)]
pub enum CommandServerError {
    #[error("failed to bind command listener on {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("command server failed: {0}")]
    Serve(#[from] std::io::Error),
}

/// Builds the router with one endpoint per route name.
pub fn router(executor: ExecutorHandle) -> Router {
    RouteName::ALL
        .into_iter()
        .fold(Router::new(), |router, route| {
            router.route(&format!("/{}", route.as_str()), post(handle_command))
        })
        .fallback(handle_unknown_route)
        .with_state(executor)
}

/// Binds the TCP listener for the command server.
///
/// # Errors
///
/// Returns [`CommandServerError::BindFailed`] if the address cannot be bound.
pub async fn bind_command_listener(ip: IpAddr, port: u16) -> Result<TcpListener, CommandServerError> {
    let addr = SocketAddr::new(ip, port);
    TcpListener::bind(addr)
        .await
        .map_err(|source| CommandServerError::BindFailed { addr, source })
}

/// Serves commands on `listener` until `shutdown` resolves.
///
/// # Errors
///
/// Returns [`CommandServerError::Serve`] if the server stops with an I/O error.
pub async fn serve<F>(
    listener: TcpListener,
    executor: ExecutorHandle,
    shutdown: F,
) -> Result<(), CommandServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!("command server listening on http://{addr}");
    }
    axum::serve(listener, router(executor))
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("command server stopped");
    Ok(())
}

async fn handle_command(
    State(executor): State<ExecutorHandle>,
    path: MatchedPath,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let route = path.as_str().trim_start_matches('/').to_string();

    let Ok(body) = String::from_utf8(body.to_vec()) else {
        debug!("/{route}: request body is not valid UTF-8");
        return (StatusCode::BAD_REQUEST, "request body is not valid UTF-8").into_response();
    };

    let request = CommandRequest {
        route,
        body,
        token: header_str(&headers, TOKEN_HEADER).map(str::to_string),
        client_identity: header_str(&headers, USER_AGENT.as_str())
            .filter(|ua| !ua.trim().is_empty())
            .unwrap_or(UNKNOWN_CLIENT)
            .to_string(),
    };

    Json(executor.execute(request).await).into_response()
}

async fn handle_unknown_route(uri: Uri) -> Response {
    let route = uri.path().trim_start_matches('/').to_string();
    debug!("unknown route '{route}'");
    let response = CommandResponse::from(CommandError::BadRoute(route));
    (StatusCode::NOT_FOUND, Json(response)).into_response()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
