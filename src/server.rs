//! Static HTTP server for a rendered asset set.
//!
//! The server lives on its own thread with a current-thread tokio runtime
//! and is owned by a [`ServerHandle`]. Dropping the handle also shuts the
//! server down, but only [`ServerHandle::stop`] waits for the thread.

use crate::error::SceneResult;
use axum::body::Body;
use axum::extract::{Path as UrlPath, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use mime_guess::MimeGuess;
use std::future::IntoFuture;
use std::net::{IpAddr, SocketAddr};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio_util::io::ReaderStream;

/// Default wait for in-flight requests on stop
pub const DEFAULT_GRACE: Duration = Duration::from_secs(2);

pub struct ServerHandle {
    local_addr: SocketAddr,
    root: PathBuf,
    shutdown: oneshot::Sender<()>,
    thread: JoinHandle<()>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// URL reachable from this machine; an unspecified bind is reported as loopback.
    pub fn base_url(&self) -> String {
        let host = match self.local_addr.ip() {
            ip if ip.is_unspecified() => IpAddr::from([127, 0, 0, 1]),
            ip => ip,
        };
        format!("http://{}", SocketAddr::new(host, self.local_addr.port()))
    }

    /// Signal shutdown, wait up to the grace period for in-flight requests,
    /// then drop remaining connections and join the server thread.
    pub fn stop(self) {
        let _ = self.shutdown.send(());
        if self.thread.join().is_err() {
            tracing::error!("Content server thread panicked");
        }
        tracing::info!("Content server on {} stopped", self.local_addr);
    }
}

/// Serve `directory` on `bind:port`. Port 0 picks an ephemeral port.
pub fn start(directory: &Path, bind: IpAddr, port: u16, grace: Duration) -> SceneResult<ServerHandle> {
    let root = directory.canonicalize()?;
    let listener = std::net::TcpListener::bind((bind, port))?;
    listener.set_nonblocking(true)?;
    let local_addr = listener.local_addr()?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let (shutdown, stop_rx) = oneshot::channel::<()>();
    let app = router(root.clone());

    let thread = std::thread::Builder::new()
        .name("content-server".to_string())
        .spawn(move || runtime.block_on(serve(listener, app, stop_rx, grace)))?;

    tracing::info!("Serving {} on http://{}", root.display(), local_addr);
    Ok(ServerHandle {
        local_addr,
        root,
        shutdown,
        thread,
    })
}

async fn serve(
    listener: std::net::TcpListener,
    app: Router,
    stop_rx: oneshot::Receiver<()>,
    grace: Duration,
) {
    let listener = match tokio::net::TcpListener::from_std(listener) {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("Content server listener failed: {}", e);
            return;
        }
    };

    let (graceful_tx, graceful_rx) = oneshot::channel::<()>();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = graceful_rx.await;
        })
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => {
            if let Err(e) = result {
                tracing::error!("Content server exited: {}", e);
            }
        }
        _ = stop_rx => {
            let _ = graceful_tx.send(());
            if tokio::time::timeout(grace, &mut server).await.is_err() {
                tracing::warn!("Content server grace period elapsed; dropping open connections");
            }
        }
    }
}

#[derive(Clone)]
struct ServeState {
    root: Arc<PathBuf>,
}

fn router(root: PathBuf) -> Router {
    let state = ServeState {
        root: Arc::new(root),
    };
    Router::new()
        .route("/", get(serve_root).head(serve_root))
        .route("/{*path}", get(serve_path).head(serve_path))
        .with_state(state)
}

async fn serve_root(State(state): State<ServeState>, method: Method) -> Response {
    serve_file(&state, "", method).await
}

async fn serve_path(
    State(state): State<ServeState>,
    UrlPath(path): UrlPath<String>,
    method: Method,
) -> Response {
    serve_file(&state, &path, method).await
}

/// Relative path made only of normal components.
fn is_safe_relative(path: &str) -> bool {
    !path.contains('\\')
        && Path::new(path)
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

async fn serve_file(state: &ServeState, relative: &str, method: Method) -> Response {
    tracing::debug!("content request method={} path={}", method, relative);

    if !is_safe_relative(relative) {
        return (StatusCode::BAD_REQUEST, "invalid path").into_response();
    }

    let mut path = state.root.join(relative);
    let mut meta = match tokio::fs::metadata(&path).await {
        Ok(m) => m,
        Err(_) => return (StatusCode::NOT_FOUND, "not found").into_response(),
    };
    if meta.is_dir() {
        path = path.join("index.html");
        meta = match tokio::fs::metadata(&path).await {
            Ok(m) if m.is_file() => m,
            _ => return (StatusCode::NOT_FOUND, "not found").into_response(),
        };
    }

    let mime = MimeGuess::from_path(&path).first_or_octet_stream();
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(mime.as_ref())
            .unwrap_or(HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(
        header::CONTENT_LENGTH,
        HeaderValue::from_str(&meta.len().to_string()).unwrap_or(HeaderValue::from_static("0")),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::SERVER, HeaderValue::from_static(crate::app_constants::APP_NAME));

    if method == Method::HEAD {
        return (StatusCode::OK, headers, "").into_response();
    }

    let file = match tokio::fs::File::open(&path).await {
        Ok(f) => f,
        Err(_) => return (StatusCode::NOT_FOUND, "not found").into_response(),
    };
    (StatusCode::OK, headers, Body::from_stream(ReaderStream::new(file))).into_response()
}
