//! Server and client transports
//!
//! The daemon listens on a Unix socket by default, or on TCP when
//! `MRPC_TRANSPORT_MODE=tcp`. Every server also answers the standard gRPC
//! health service for the service it hosts.

use std::convert::Infallible;
use std::error::Error;
use std::future::Future;
use std::net::SocketAddr;

use http::{Request as HttpRequest, Response as HttpResponse};
use hyper::Body;
use tonic::body::BoxBody;
use tonic::codegen::Service;
use tonic::server::NamedService;
use tonic::transport::{Channel, Server};
use tracing::info;

type BoxError = Box<dyn Error + Send + Sync>;

use crate::config::{DaemonConfig, Listen};

#[cfg(unix)]
use std::path::Path;
#[cfg(unix)]
use tokio::net::UnixListener;
#[cfg(unix)]
use tokio_stream::wrappers::UnixListenerStream;
#[cfg(unix)]
use tracing::warn;

#[cfg(unix)]
use tokio::net::UnixStream;
#[cfg(unix)]
use tonic::transport::{Endpoint, Uri};
#[cfg(unix)]
use tower::service_fn;

/// Serve `service` on the endpoint configured through the environment
pub async fn serve_default<S, F>(service: S, shutdown: F) -> Result<(), BoxError>
where
    S: Service<HttpRequest<Body>, Response = HttpResponse<BoxBody>, Error = Infallible>
        + NamedService
        + Clone
        + Send
        + 'static,
    S::Future: Send + 'static,
    F: Future<Output = ()> + Send + 'static,
{
    let listen = DaemonConfig::from_env().listen()?;
    serve(&listen, service, shutdown).await
}

/// Serve `service` and its health status until `shutdown` resolves
pub async fn serve<S, F>(listen: &Listen, service: S, shutdown: F) -> Result<(), BoxError>
where
    S: Service<HttpRequest<Body>, Response = HttpResponse<BoxBody>, Error = Infallible>
        + NamedService
        + Clone
        + Send
        + 'static,
    S::Future: Send + 'static,
    F: Future<Output = ()> + Send + 'static,
{
    let (mut health_reporter, health_service) = tonic_health::server::health_reporter();
    health_reporter.set_serving::<S>().await;

    match listen {
        Listen::Tcp(addr) => {
            info!(addr = %addr, service = S::NAME, "gRPC server listening on TCP");
            Server::builder()
                .add_service(health_service)
                .add_service(service)
                .serve_with_shutdown(*addr, shutdown)
                .await?;
        }
        #[cfg(unix)]
        Listen::Unix(path) => {
            serve_on_unix_socket(path, service, health_service, shutdown).await?;
        }
        #[cfg(not(unix))]
        Listen::Unix(path) => {
            return Err(format!("Unix sockets are not supported here: {}", path.display()).into());
        }
    }

    Ok(())
}

pub async fn create_channel_default() -> Result<Channel, BoxError> {
    let listen = DaemonConfig::from_env().listen()?;
    create_channel(&listen).await
}

pub async fn create_channel(listen: &Listen) -> Result<Channel, BoxError> {
    match listen {
        Listen::Tcp(addr) => Ok(tcp_channel(*addr).await?),
        #[cfg(unix)]
        Listen::Unix(path) => {
            let socket_path = path.clone();
            let channel = Endpoint::try_from("http://[::]:50051")?
                .connect_with_connector(service_fn(move |_: Uri| {
                    let socket_path = socket_path.clone();
                    async move { UnixStream::connect(socket_path).await }
                }))
                .await?;
            Ok(channel)
        }
        #[cfg(not(unix))]
        Listen::Unix(path) => {
            Err(format!("Unix sockets are not supported here: {}", path.display()).into())
        }
    }
}

async fn tcp_channel(addr: SocketAddr) -> Result<Channel, BoxError> {
    let endpoint = format!("http://{}", addr);
    Ok(Channel::from_shared(endpoint)?.connect().await?)
}

#[cfg(unix)]
async fn serve_on_unix_socket<S, H, F>(
    path: &Path,
    service: S,
    health_service: H,
    shutdown: F,
) -> Result<(), BoxError>
where
    S: Service<HttpRequest<Body>, Response = HttpResponse<BoxBody>, Error = Infallible>
        + NamedService
        + Clone
        + Send
        + 'static,
    S::Future: Send + 'static,
    H: Service<HttpRequest<Body>, Response = HttpResponse<BoxBody>, Error = Infallible>
        + NamedService
        + Clone
        + Send
        + 'static,
    H::Future: Send + 'static,
    F: Future<Output = ()> + Send + 'static,
{
    if path.exists() {
        info!(path = %path.display(), "Removing existing socket file");
        std::fs::remove_file(path)?;
    }

    if let Some(parent) = path.parent() {
        if !parent.exists() {
            info!(path = %parent.display(), "Creating socket directory");
            std::fs::create_dir_all(parent)?;
        }
    }

    let listener = UnixListener::bind(path)?;

    // 0660: owner and group can read/write
    {
        use std::os::unix::fs::PermissionsExt;
        let permissions = std::fs::Permissions::from_mode(0o660);
        std::fs::set_permissions(path, permissions)?;
    }

    info!(path = %path.display(), service = S::NAME, "gRPC server listening on Unix socket");

    Server::builder()
        .add_service(health_service)
        .add_service(service)
        .serve_with_incoming_shutdown(UnixListenerStream::new(listener), shutdown)
        .await?;

    if path.exists() {
        warn!(path = %path.display(), "Cleaning up socket file");
        let _ = std::fs::remove_file(path);
    }

    Ok(())
}
