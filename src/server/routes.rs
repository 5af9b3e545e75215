//! HTTP routes
//!
//! | Path | Description |
//! |------|-------------|
//! | `/{channel}/stream.mjpg` | Live `multipart/x-mixed-replace` stream |
//! | `/{channel}/image.jpg` | Most recent frame, rate limited to the channel framerate |

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{ConnectInfo, Path, Request, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE, USER_AGENT};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::Span;

use crate::error::ConfigError;
use crate::media::multipart::{stream_content_type, JPEG_CONTENT_TYPE};
use crate::registry::{ChannelRegistry, RegistryError};
use crate::session::{ImageReply, StreamSession};

/// Shared state passed to all request handlers
#[derive(Clone)]
struct AppState {
    registry: Arc<ChannelRegistry>,
    boundary: Arc<str>,
    stream_content_type: HeaderValue,
}

/// Build the router for all channels in `registry`
///
/// Fails if `boundary` cannot be carried in a `Content-Type` header.
pub fn router(registry: Arc<ChannelRegistry>, boundary: &str) -> Result<Router, ConfigError> {
    let stream_content_type = HeaderValue::from_str(&stream_content_type(boundary))
        .map_err(|_| ConfigError::InvalidBoundary(boundary.to_string()))?;

    let state = AppState {
        registry,
        boundary: Arc::from(boundary),
        stream_content_type,
    };

    let access_log = TraceLayer::new_for_http()
        .make_span_with(|req: &Request| {
            tracing::info_span!("request", method = %req.method(), path = %req.uri().path())
        })
        .on_request(|req: &Request, _span: &Span| {
            let agent = req
                .headers()
                .get(USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-");
            let peer = req
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.to_string());
            tracing::info!(
                peer = peer.as_deref().unwrap_or("-"),
                user_agent = %agent,
                "Request"
            );
        });

    Ok(Router::new()
        .route("/{channel}/stream.mjpg", get(stream_handler))
        .route("/{channel}/image.jpg", get(image_handler))
        .layer(access_log)
        .with_state(state))
}

/// Handles `GET /{channel}/stream.mjpg`
///
/// The response body is the viewer session itself: it takes a frame from the
/// relay slot only when the server is ready to write the next part. When the
/// client goes away the body is dropped, which deregisters the viewer.
async fn stream_handler(State(state): State<AppState>, Path(channel): Path<String>) -> Response {
    let entry = match state.registry.get(&channel) {
        Ok(entry) => entry,
        Err(e) => return not_found(e),
    };

    let session = StreamSession::new(entry.hub(), state.boundary.as_ref());

    let mut response = Body::from_stream(session.into_body()).into_response();
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, state.stream_content_type.clone());
    headers.insert(CACHE_CONTROL, no_cache());
    response
}

/// Handles `GET /{channel}/image.jpg`
async fn image_handler(State(state): State<AppState>, Path(channel): Path<String>) -> Response {
    let entry = match state.registry.get(&channel) {
        Ok(entry) => entry,
        Err(e) => return not_found(e),
    };

    // The hold has to happen before the response is handed over: the server
    // completes a Content-Length response as soon as the last byte is written.
    let reply = ImageReply::fetch(entry.hub(), entry.channel().frame_interval()).await;

    match reply {
        ImageReply::Unavailable => {
            tracing::debug!(channel = %channel, "No frame available yet");
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            response.headers_mut().insert(CACHE_CONTROL, no_cache());
            response
        }
        ImageReply::Frame { frame, .. } => {
            let len = frame.len();
            let mut response = Body::from(frame.data).into_response();
            let headers = response.headers_mut();
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(JPEG_CONTENT_TYPE));
            headers.insert(CACHE_CONTROL, no_cache());
            headers.insert(CONTENT_LENGTH, HeaderValue::from(len));
            response
        }
    }
}

fn no_cache() -> HeaderValue {
    HeaderValue::from_static("no-cache")
}

fn not_found(err: RegistryError) -> Response {
    tracing::debug!(error = %err, "Unknown channel");
    (StatusCode::NOT_FOUND, err.to_string()).into_response()
}
