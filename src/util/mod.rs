//! Utility functions shared across the application.

mod secret;

pub use secret::SecretString;

use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::warn;

/// Bind a listener on the preferred port, falling back to nearby ports.
///
/// Tries the preferred port, then the next 10 consecutive ports, then lets
/// the OS pick one.
pub async fn bind_available(host: &str, preferred: u16) -> std::io::Result<TcpListener> {
    let addr = parse_addr(host, preferred)?;
    if let Ok(listener) = TcpListener::bind(addr).await {
        return Ok(listener);
    }

    for offset in 1..=10 {
        let port = preferred.saturating_add(offset);
        if let Ok(listener) = TcpListener::bind(parse_addr(host, port)?).await {
            warn!(
                preferred,
                actual = port,
                "Preferred port unavailable, using alternate"
            );
            return Ok(listener);
        }
    }

    let listener = TcpListener::bind(parse_addr(host, 0)?).await?;
    warn!(
        preferred,
        actual = listener.local_addr()?.port(),
        "Using OS-assigned port"
    );
    Ok(listener)
}

fn parse_addr(host: &str, port: u16) -> std::io::Result<SocketAddr> {
    format!("{}:{}", host, port)
        .parse()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))
}

/// Join a public base URL and a path-and-query without doubling the slash
pub fn join_url(base: &str, path_and_query: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path_and_query.trim_start_matches('/')
    )
}
