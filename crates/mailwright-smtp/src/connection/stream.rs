//! TCP and TLS connection setup.

use crate::error::{Error, Result};
use rustls::pki_types::ServerName;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_rustls::{
    TlsConnector,
    rustls::{ClientConfig, RootCertStore},
};

/// TLS-wrapped TCP stream.
pub type TlsStream = tokio_rustls::client::TlsStream<TcpStream>;

/// Connects to an SMTP server over plain TCP.
///
/// # Errors
///
/// Returns an error if the connection fails or takes longer than `timeout`.
pub async fn connect(hostname: &str, port: u16, timeout: Duration) -> Result<TcpStream> {
    let addr = format!("{hostname}:{port}");
    tracing::debug!(%addr, "connecting");
    tokio::time::timeout(timeout, TcpStream::connect(&addr))
        .await
        .map_err(|_| Error::Timeout(timeout))?
        .map_err(Error::from)
}

/// Connects to an SMTP server over TLS (implicit TLS on port 465).
///
/// # Errors
///
/// Returns an error if the connection or TLS handshake fails.
pub async fn connect_tls(hostname: &str, port: u16, timeout: Duration) -> Result<TlsStream> {
    let tcp_stream = connect(hostname, port, timeout).await?;
    upgrade_to_tls(tcp_stream, hostname).await
}

/// Runs the TLS handshake over an established TCP stream.
///
/// # Errors
///
/// Returns an error if the hostname is invalid or the handshake fails.
pub async fn upgrade_to_tls(stream: TcpStream, hostname: &str) -> Result<TlsStream> {
    let server_name = ServerName::try_from(hostname.to_string())
        .map_err(|_| Error::Protocol(format!("Invalid hostname: {hostname}")))?;

    Ok(tls_connector().connect(server_name, stream).await?)
}

/// Creates a TLS connector with the webpki root certificates.
fn tls_connector() -> TlsConnector {
    let root_store = RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    let config = ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    TlsConnector::from(Arc::new(config))
}
