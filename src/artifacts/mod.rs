use std::net::SocketAddr;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use tokio_util::io::ReaderStream;
use tracing::{debug, error, info};

use crate::latest::{resolve_latest, ResolveError};
use crate::models::{ResolvedTarget, Variant};
use crate::request::{
    base_name, classify, decode_path, encode_segment, join_under_root, Classification, Rejection,
};
use crate::AppState;

pub const ARCHIVE_CONTENT_TYPE: &str = "application/x-gtar-compressed";

pub fn routes() -> axum::Router<AppState> {
    axum::Router::new().fallback(handle_request)
}

/// Everything a request can fail with, mapped to a status in `into_response`
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("Method Not Allowed")]
    MethodNotAllowed,
    #[error("{0}")]
    Rejected(Rejection),
    #[error("Not Found")]
    NotFound,
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error("{0}")]
    Io(std::io::Error),
}

impl ServeError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServeError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ServeError::Rejected(Rejection::FilenameNotAllowed) => StatusCode::FORBIDDEN,
            ServeError::Rejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServeError::NotFound | ServeError::Resolve(ResolveError::EmptyDirectory) => {
                StatusCode::NOT_FOUND
            }
            ServeError::Resolve(ResolveError::Io(_)) | ServeError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ServeError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }
        (status, self.to_string()).into_response()
    }
}

/// Single entry point for every method and path
async fn handle_request(
    State(state): State<AppState>,
    remote: Option<ConnectInfo<SocketAddr>>,
    method: Method,
    uri: Uri,
) -> Response {
    let remote = remote
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    info!("{} {} from {}", method, uri, remote);

    if method != Method::GET {
        return ServeError::MethodNotAllowed.into_response();
    }

    match dispatch(&state, uri.path()).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

async fn dispatch(state: &AppState, raw_path: &str) -> Result<Response, ServeError> {
    let url_path = decode_path(raw_path).map_err(ServeError::Rejected)?;

    match classify(&url_path, state.variant()) {
        Classification::Malformed(reason) => Err(ServeError::Rejected(reason)),
        Classification::Direct(path) => send_archive(state, &path).await,
        Classification::Latest(dir_path) => redirect_to_latest(state, dir_path).await,
    }
}

/// Stream an archive from disk.
///
/// The open file moves into the body stream and is closed when the stream is
/// dropped, whether the transfer finished, failed, or the client went away.
async fn send_archive(state: &AppState, url_path: &str) -> Result<Response, ServeError> {
    let path = join_under_root(state.root().path(), url_path);

    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(ServeError::NotFound),
        Err(e) => return Err(ServeError::Io(e)),
    };

    let metadata = file.metadata().await.map_err(ServeError::Io)?;
    if metadata.is_dir() {
        return Err(ServeError::Io(std::io::Error::other(format!(
            "{} is a directory",
            url_path
        ))));
    }

    debug!("Sending {} ({} bytes)", path.display(), metadata.len());

    let headers = [
        (header::CONTENT_TYPE, HeaderValue::from_static(ARCHIVE_CONTENT_TYPE)),
        (header::CONTENT_LENGTH, HeaderValue::from(metadata.len())),
    ];
    Ok((headers, Body::from_stream(ReaderStream::new(file))).into_response())
}

async fn redirect_to_latest(state: &AppState, dir_path: String) -> Result<Response, ServeError> {
    let root = state.root().clone();
    let lookup_dir = dir_path.clone();
    let target = tokio::task::spawn_blocking(move || resolve_latest(&root, &lookup_dir))
        .await
        .map_err(|e| ServeError::Io(std::io::Error::other(e.to_string())))??;

    let location = redirect_location(&dir_path, &target);
    let value = HeaderValue::try_from(location)
        .map_err(|e| ServeError::Io(std::io::Error::other(e)))?;

    let status = match state.variant() {
        Variant::Archive => StatusCode::SEE_OTHER,
        Variant::LatestOnly => StatusCode::TEMPORARY_REDIRECT,
    };
    Ok((status, [(header::LOCATION, value)]).into_response())
}

/// `<dir base name>/<entry>`, or just `<entry>` for the root directory.
///
/// Both segments are percent-encoded, so the value is always a valid header.
fn redirect_location(dir_path: &str, target: &ResolvedTarget) -> String {
    match base_name(dir_path) {
        "" => encode_segment(target.name()),
        dir => format!("{}/{}", encode_segment(dir), encode_segment(target.name())),
    }
}
