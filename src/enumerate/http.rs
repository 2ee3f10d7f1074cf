//! Domain discovery from HTTP redirects.
//!
//! Web servers behind name-based virtual hosting often answer a bare-IP
//! request with a redirect to their canonical name. A `HEAD /` is enough
//! to read the `Location` header without pulling a body.

use super::{EnumContext, Enumerator};
use crate::error::{EnumError, EnumResult};
use crate::output;
use async_trait::async_trait;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

const SERVICE: &str = "HTTP";

/// Maximum bytes read from the response head.
const MAX_RESPONSE_SIZE: usize = 4096;

#[derive(Debug, Clone, Copy)]
pub struct HttpEnumerator {
    port: u16,
}

impl Default for HttpEnumerator {
    fn default() -> Self {
        Self { port: 80 }
    }
}

impl HttpEnumerator {
    pub fn with_port(port: u16) -> Self {
        Self { port }
    }
}

#[async_trait]
impl Enumerator for HttpEnumerator {
    fn name(&self) -> &'static str {
        SERVICE
    }

    fn port(&self) -> u16 {
        self.port
    }

    async fn run(&self, ctx: &EnumContext) -> EnumResult<()> {
        let addr = SocketAddr::new(ctx.ip, self.port);
        let response = fetch_head(addr, &ctx.address, ctx.timeout).await?;

        match parse_location_domain(&response) {
            Some(domain) => output::print_success(&format!("Domain name found: {}", domain)),
            None => tracing::debug!(port = self.port, "no redirect location in response"),
        }
        Ok(())
    }
}

/// Send `HEAD /` and return the response head as text.
pub async fn fetch_head(addr: SocketAddr, host: &str, limit: Duration) -> EnumResult<String> {
    let mut stream = timeout(limit, TcpStream::connect(addr))
        .await
        .map_err(|_| EnumError::Timeout { service: SERVICE })?
        .map_err(|source| EnumError::Connect {
            service: SERVICE,
            port: addr.port(),
            source,
        })?;

    let request = format!("HEAD / HTTP/1.0\r\nHost: {}\r\n\r\n", host);
    stream.write_all(request.as_bytes()).await?;

    let mut buffer = vec![0u8; MAX_RESPONSE_SIZE];
    let mut filled = 0;
    while filled < buffer.len() {
        let n = timeout(limit, stream.read(&mut buffer[filled..]))
            .await
            .map_err(|_| EnumError::Timeout { service: SERVICE })??;
        if n == 0 {
            break;
        }
        filled += n;
        if buffer[..filled].windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
    }

    if filled == 0 {
        return Err(EnumError::Protocol {
            service: SERVICE,
            reason: "empty response".to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&buffer[..filled]).into_owned())
}

/// Extract the host name from a `Location:` header, if any.
///
/// Absolute URLs yield their host without port or path; relative
/// locations carry no domain and yield `None`.
pub fn parse_location_domain(response: &str) -> Option<String> {
    let location = response.lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        name.trim()
            .eq_ignore_ascii_case("location")
            .then(|| value.trim())
    })?;

    let (_, rest) = location.split_once("://")?;
    let authority = rest.split(['/', '?', '#']).next()?;
    let host = authority.rsplit('@').next()?;
    let host = match host.strip_prefix('[') {
        Some(v6) => v6.split(']').next()?,
        None => host.split(':').next()?,
    };

    (!host.is_empty()).then(|| host.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn test_parse_location() {
        let response = "HTTP/1.1 301 Moved Permanently\r\n\
                        Server: nginx\r\n\
                        Location: http://Intranet.Example.htb/login?next=/\r\n\r\n";
        assert_eq!(
            parse_location_domain(response),
            Some("intranet.example.htb".to_string())
        );
    }

    #[test]
    fn test_parse_location_variants() {
        assert_eq!(
            parse_location_domain("location: https://site.local:8443/\r\n"),
            Some("site.local".to_string())
        );
        assert_eq!(
            parse_location_domain("Location: http://user@box.lan/\r\n"),
            Some("box.lan".to_string())
        );
        assert_eq!(
            parse_location_domain("Location: http://[::1]:8080/\r\n"),
            Some("::1".to_string())
        );
        assert_eq!(parse_location_domain("Location: /login\r\n"), None);
        assert_eq!(parse_location_domain("HTTP/1.1 200 OK\r\n\r\n"), None);
    }

    #[tokio::test]
    async fn test_fetch_head_from_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = vec![0u8; 512];
            let n = stream.read(&mut request).await.unwrap();
            assert!(request[..n].starts_with(b"HEAD / HTTP/1.0\r\n"));
            stream
                .write_all(b"HTTP/1.1 302 Found\r\nLocation: http://portal.test/\r\n\r\n")
                .await
                .unwrap();
        });

        let response = fetch_head(addr, "127.0.0.1", Duration::from_secs(2)).await.unwrap();
        assert_eq!(parse_location_domain(&response), Some("portal.test".to_string()));
    }

    #[tokio::test]
    async fn test_enumerator_run() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = vec![0u8; 512];
            let _ = stream.read(&mut request).await;
            let _ = stream.write_all(b"HTTP/1.0 200 OK\r\n\r\n").await;
        });

        let ctx = EnumContext {
            address: "127.0.0.1".to_string(),
            ip: addr.ip(),
            dump: false,
            dump_root: std::env::temp_dir(),
            timeout: Duration::from_secs(2),
        };
        tokio_test::assert_ok!(HttpEnumerator::with_port(addr.port()).run(&ctx).await);
    }
}
