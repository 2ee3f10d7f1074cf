//! TCP connect prober.
//!
//! Performs standard TCP connect probes using the operating system's
//! socket API. A successful handshake is closed immediately; no data is
//! sent or read.

use super::traits::{PortState, ProbeOutcome};
use crate::error::{ScanError, ScanResult};
use crate::types::Port;
use async_trait::async_trait;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Default number of retries after the process ran out of descriptors.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Opens (and immediately closes) one connection.
///
/// Split out from [`Prober`] so the retry and classification logic can be
/// driven without real sockets.
#[async_trait]
pub trait Dialer: Send + Sync {
    async fn dial(&self, addr: SocketAddr, timeout: Duration) -> ScanResult<()>;
}

/// Dials with `tokio::net::TcpStream`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpDialer;

#[async_trait]
impl Dialer for TcpDialer {
    async fn dial(&self, addr: SocketAddr, limit: Duration) -> ScanResult<()> {
        match timeout(limit, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => {
                drop(stream);
                Ok(())
            }
            Ok(Err(e)) => Err(classify_io_error(addr.port(), e)),
            Err(_) => Err(ScanError::Timeout),
        }
    }
}

/// Map a connect error onto the scanner's taxonomy.
pub fn classify_io_error(port: u16, e: io::Error) -> ScanError {
    if is_resource_exhaustion(&e) {
        return ScanError::ResourceExhausted;
    }

    match e.kind() {
        io::ErrorKind::ConnectionRefused => ScanError::ConnectionRefused,
        io::ErrorKind::TimedOut => ScanError::Timeout,
        _ => {
            let text = e.to_string().to_lowercase();
            if text.contains("unreachable") {
                ScanError::Unreachable(e.to_string())
            } else {
                ScanError::ConnectionFailed {
                    port,
                    reason: e.to_string(),
                }
            }
        }
    }
}

fn is_resource_exhaustion(e: &io::Error) -> bool {
    #[cfg(unix)]
    {
        if matches!(e.raw_os_error(), Some(libc::EMFILE) | Some(libc::ENFILE)) {
            return true;
        }
    }

    e.to_string().to_lowercase().contains("too many open files")
}

/// Resolves the state of one port at a time against a fixed address.
#[derive(Debug, Clone)]
pub struct Prober<D = TcpDialer> {
    target: IpAddr,
    timeout: Duration,
    max_retries: u32,
    dialer: D,
}

impl Prober<TcpDialer> {
    /// Create a prober that uses real TCP sockets.
    pub fn new(target: IpAddr, timeout: Duration) -> Self {
        Self::with_dialer(target, timeout, TcpDialer)
    }
}

impl<D: Dialer> Prober<D> {
    pub fn with_dialer(target: IpAddr, timeout: Duration, dialer: D) -> Self {
        Self {
            target,
            timeout,
            max_retries: DEFAULT_MAX_RETRIES,
            dialer,
        }
    }

    /// Set how many times a resource-exhausted probe is retried.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Probe one port.
    ///
    /// Descriptor exhaustion backs off for one timeout interval and retries,
    /// at most `max_retries` times; past that the port is reported closed.
    pub async fn probe(&self, port: Port) -> ProbeOutcome {
        let addr = SocketAddr::new(self.target, port.as_u16());
        let mut attempt = 0;

        loop {
            let state = match self.dialer.dial(addr, self.timeout).await {
                Ok(()) => PortState::Open,
                Err(ScanError::ResourceExhausted) if attempt < self.max_retries => {
                    attempt += 1;
                    tracing::debug!(%port, attempt, "out of descriptors, backing off");
                    tokio::time::sleep(self.timeout).await;
                    continue;
                }
                Err(ScanError::ResourceExhausted) => {
                    tracing::debug!(%port, attempt, "still out of descriptors, giving up");
                    PortState::Closed
                }
                Err(e) => state_for_error(&e),
            };

            return ProbeOutcome::new(port, state);
        }
    }
}

/// Terminal classification of a failed connect.
fn state_for_error(e: &ScanError) -> PortState {
    match e {
        ScanError::Timeout | ScanError::Unreachable(_) => PortState::Filtered,
        _ => PortState::Closed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    /// Fails with `ResourceExhausted` a fixed number of times, then succeeds.
    struct ExhaustedDialer {
        failures: u32,
        calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl Dialer for ExhaustedDialer {
        async fn dial(&self, _addr: SocketAddr, _timeout: Duration) -> ScanResult<()> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(ScanError::ResourceExhausted)
            } else {
                Ok(())
            }
        }
    }

    fn localhost() -> IpAddr {
        IpAddr::V4(Ipv4Addr::LOCALHOST)
    }

    #[tokio::test]
    async fn test_open_port_with_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = Port::new(listener.local_addr().unwrap().port()).unwrap();

        let accept = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Ok((mut stream, _)) = listener.accept().await {
                // The prober must close without sending anything
                let _ = stream.read_to_end(&mut buf).await;
            }
            buf
        });

        let prober = Prober::new(localhost(), Duration::from_millis(500));
        let outcome = prober.probe(port).await;
        assert_eq!(outcome, ProbeOutcome::new(port, PortState::Open));

        let received = accept.await.unwrap();
        assert!(received.is_empty());
    }

    #[tokio::test]
    async fn test_closed_port_is_never_open() {
        // Bind then drop to get a port with no listener
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let port = Port::new(port).unwrap();

        let prober = Prober::new(localhost(), Duration::from_millis(200));
        let outcome = prober.probe(port).await;
        assert!(matches!(outcome.state, PortState::Closed | PortState::Filtered));
    }

    #[tokio::test(start_paused = true)]
    async fn test_resource_exhaustion_retries_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let dialer = ExhaustedDialer {
            failures: 2,
            calls: Arc::clone(&calls),
        };
        let prober = Prober::with_dialer(localhost(), Duration::from_millis(500), dialer);

        let outcome = prober.probe(Port::new(8080).unwrap()).await;
        assert_eq!(outcome.state, PortState::Open);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resource_exhaustion_is_bounded() {
        let calls = Arc::new(AtomicU32::new(0));
        let dialer = ExhaustedDialer {
            failures: u32::MAX,
            calls: Arc::clone(&calls),
        };
        let prober =
            Prober::with_dialer(localhost(), Duration::from_millis(500), dialer).with_max_retries(3);

        let outcome = prober.probe(Port::new(8080).unwrap()).await;
        assert_eq!(outcome.state, PortState::Closed);
        // One initial attempt plus three retries
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_classify_io_error() {
        let refused = io::Error::from(io::ErrorKind::ConnectionRefused);
        assert!(matches!(classify_io_error(80, refused), ScanError::ConnectionRefused));

        #[cfg(unix)]
        {
            let emfile = io::Error::from_raw_os_error(libc::EMFILE);
            assert!(matches!(classify_io_error(80, emfile), ScanError::ResourceExhausted));
        }

        let text = io::Error::new(io::ErrorKind::Other, "Too many open files");
        assert!(matches!(classify_io_error(80, text), ScanError::ResourceExhausted));

        let other = io::Error::new(io::ErrorKind::Other, "boom");
        assert!(matches!(
            classify_io_error(80, other),
            ScanError::ConnectionFailed { port: 80, .. }
        ));
    }

    #[test]
    fn test_state_for_error() {
        assert_eq!(state_for_error(&ScanError::Timeout), PortState::Filtered);
        assert_eq!(state_for_error(&ScanError::ConnectionRefused), PortState::Closed);
        assert_eq!(
            state_for_error(&ScanError::Unreachable("no route".into())),
            PortState::Filtered
        );
    }
}
