//! TCP transport adapters.
//!
//! [`TcpClientAdapter`] dials out to a remote endpoint (the master side of
//! a telemetry link); [`TcpServerAdapter`] accepts a single inbound
//! connection per open cycle (the outstation side). Both report
//! completions through the [`EventSender`] supplied at construction and
//! honor `close_request` by cancelling whatever phase the connection is in
//! -- a close racing an in-flight connect resolves as an open failure.

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use phylink_core::adapter::{EventSender, PhysAdapter, PhysEvent};

use crate::io::{self, IoSession};

/// Default connection timeout (5 seconds).
///
/// Generous enough for WAN links to remote substations, short enough that
/// a dead endpoint does not stall the reconnect cycle.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Outbound TCP adapter.
///
/// Each `open_request` spawns a connect task; on success the connection is
/// split into reader/writer tasks that service read/write requests until
/// `close_request` cancels them.
pub struct TcpClientAdapter {
    addr: String,
    connect_timeout: Duration,
    events: EventSender,
    session: Option<IoSession>,
}

impl TcpClientAdapter {
    /// Create an adapter that will dial `addr` (`host:port`) on open.
    pub fn new(addr: impl Into<String>, events: EventSender) -> Self {
        Self {
            addr: addr.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            events,
            session: None,
        }
    }

    /// Override the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// The address this adapter dials.
    pub fn addr(&self) -> &str {
        &self.addr
    }
}

impl PhysAdapter for TcpClientAdapter {
    fn open_request(&mut self) {
        let (session, receivers) = io::session();
        let cancel = session.cancel_token();
        self.session = Some(session);

        let addr = self.addr.clone();
        let timeout = self.connect_timeout;
        let events = self.events.clone();

        tokio::spawn(async move {
            debug!(addr = %addr, timeout_ms = timeout.as_millis(), "connecting");

            let stream = tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(addr = %addr, "connect aborted by close");
                    let _ = events.send(PhysEvent::OpenFailure);
                    return;
                }
                result = tokio::time::timeout(timeout, TcpStream::connect(&addr)) => match result {
                    Ok(Ok(stream)) => stream,
                    Ok(Err(e)) => {
                        debug!(addr = %addr, error = %e, "connect failed");
                        let _ = events.send(PhysEvent::OpenFailure);
                        return;
                    }
                    Err(_) => {
                        debug!(addr = %addr, "connect timed out");
                        let _ = events.send(PhysEvent::OpenFailure);
                        return;
                    }
                },
            };

            // Disable Nagle's algorithm: telemetry exchanges are small and
            // latency-sensitive.
            if let Err(e) = stream.set_nodelay(true) {
                warn!(addr = %addr, error = %e, "failed to set TCP_NODELAY (continuing anyway)");
            }

            info!(addr = %addr, "connection established");
            let _ = events.send(PhysEvent::OpenSuccess);

            let (read_half, write_half) = stream.into_split();
            io::run_io(read_half, write_half, receivers, events, cancel).await;
            debug!(addr = %addr, "connection tasks stopped");
        });
    }

    fn close_request(&mut self) {
        if let Some(session) = self.session.take() {
            debug!(addr = %self.addr, "closing connection");
            session.shutdown();
        }
    }

    fn read_request(&mut self, buf: BytesMut) {
        match &self.session {
            Some(session) => session.request_read(&self.events, buf),
            None => {
                let _ = self.events.send(PhysEvent::ReadFailure);
            }
        }
    }

    fn write_request(&mut self, data: Bytes) {
        match &self.session {
            Some(session) => session.request_write(&self.events, data),
            None => {
                let _ = self.events.send(PhysEvent::SendFailure);
            }
        }
    }
}

impl Drop for TcpClientAdapter {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            session.shutdown();
        }
    }
}

/// Inbound TCP adapter.
///
/// Each `open_request` binds the listen address and accepts exactly one
/// connection; the open resolves when a peer arrives. Reopening after a
/// close rebinds the listener.
pub struct TcpServerAdapter {
    listen_addr: String,
    events: EventSender,
    session: Option<IoSession>,
}

impl TcpServerAdapter {
    /// Create an adapter that will listen on `addr` (`host:port`) on open.
    pub fn new(addr: impl Into<String>, events: EventSender) -> Self {
        Self {
            listen_addr: addr.into(),
            events,
            session: None,
        }
    }

    /// The address this adapter listens on.
    pub fn listen_addr(&self) -> &str {
        &self.listen_addr
    }
}

impl PhysAdapter for TcpServerAdapter {
    fn open_request(&mut self) {
        let (session, receivers) = io::session();
        let cancel = session.cancel_token();
        self.session = Some(session);

        let addr = self.listen_addr.clone();
        let events = self.events.clone();

        tokio::spawn(async move {
            let listener = match TcpListener::bind(&addr).await {
                Ok(listener) => listener,
                Err(e) => {
                    debug!(addr = %addr, error = %e, "bind failed");
                    let _ = events.send(PhysEvent::OpenFailure);
                    return;
                }
            };
            debug!(addr = %addr, "listening");

            let (stream, peer) = tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(addr = %addr, "accept aborted by close");
                    let _ = events.send(PhysEvent::OpenFailure);
                    return;
                }
                result = listener.accept() => match result {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        debug!(addr = %addr, error = %e, "accept failed");
                        let _ = events.send(PhysEvent::OpenFailure);
                        return;
                    }
                },
            };
            // One connection per open cycle; stop listening immediately.
            drop(listener);

            if let Err(e) = stream.set_nodelay(true) {
                warn!(peer = %peer, error = %e, "failed to set TCP_NODELAY (continuing anyway)");
            }

            info!(peer = %peer, "connection accepted");
            let _ = events.send(PhysEvent::OpenSuccess);

            let (read_half, write_half) = stream.into_split();
            io::run_io(read_half, write_half, receivers, events, cancel).await;
            debug!(peer = %peer, "connection tasks stopped");
        });
    }

    fn close_request(&mut self) {
        if let Some(session) = self.session.take() {
            debug!(addr = %self.listen_addr, "closing connection");
            session.shutdown();
        }
    }

    fn read_request(&mut self, buf: BytesMut) {
        match &self.session {
            Some(session) => session.request_read(&self.events, buf),
            None => {
                let _ = self.events.send(PhysEvent::ReadFailure);
            }
        }
    }

    fn write_request(&mut self, data: Bytes) {
        match &self.session {
            Some(session) => session.request_write(&self.events, data),
            None => {
                let _ = self.events.send(PhysEvent::SendFailure);
            }
        }
    }
}

impl Drop for TcpServerAdapter {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            session.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::sync::mpsc;

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<PhysEvent>) -> PhysEvent {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed")
    }

    async fn test_listener() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        (listener, addr)
    }

    #[tokio::test]
    async fn client_open_success() {
        let (listener, addr) = test_listener().await;
        let server = tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let mut adapter = TcpClientAdapter::new(addr, events_tx);
        adapter.open_request();
        assert!(matches!(next_event(&mut events_rx).await, PhysEvent::OpenSuccess));

        adapter.close_request();
        server.abort();
    }

    #[tokio::test]
    async fn client_open_failure_on_refused_connection() {
        // Bind then drop so the port is not listening.
        let (listener, addr) = test_listener().await;
        drop(listener);

        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let mut adapter = TcpClientAdapter::new(addr, events_tx);
        adapter.open_request();
        assert!(matches!(next_event(&mut events_rx).await, PhysEvent::OpenFailure));
    }

    #[tokio::test]
    async fn client_write_and_read_round_trip() {
        let (listener, addr) = test_listener().await;
        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 256];
            let n = stream.read(&mut buf).await.unwrap();
            stream.write_all(&buf[..n]).await.unwrap();
            stream.flush().await.unwrap();
        });

        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let mut adapter = TcpClientAdapter::new(addr, events_tx);
        adapter.open_request();
        assert!(matches!(next_event(&mut events_rx).await, PhysEvent::OpenSuccess));

        adapter.write_request(Bytes::from_static(b"probe"));
        assert!(matches!(next_event(&mut events_rx).await, PhysEvent::SendSuccess));

        adapter.read_request(BytesMut::with_capacity(256));
        match next_event(&mut events_rx).await {
            PhysEvent::ReadSuccess(buf) => assert_eq!(buf.as_ref(), b"probe"),
            other => panic!("expected ReadSuccess, got {other:?}"),
        }

        adapter.close_request();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn client_close_fails_outstanding_read() {
        let (listener, addr) = test_listener().await;
        let server = tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let mut adapter = TcpClientAdapter::new(addr, events_tx);
        adapter.open_request();
        assert!(matches!(next_event(&mut events_rx).await, PhysEvent::OpenSuccess));

        // The server never sends; this read parks until the close aborts it.
        adapter.read_request(BytesMut::with_capacity(256));
        adapter.close_request();
        assert!(matches!(next_event(&mut events_rx).await, PhysEvent::ReadFailure));

        server.abort();
    }

    #[tokio::test]
    async fn client_close_during_connect_resolves_as_open_failure() {
        // RFC 5737: 192.0.2.0/24 is TEST-NET-1; connects to it black-hole
        // rather than getting refused, leaving the connect in flight.
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let mut adapter = TcpClientAdapter::new("192.0.2.1:20000", events_tx)
            .with_connect_timeout(Duration::from_secs(30));
        adapter.open_request();

        tokio::time::sleep(Duration::from_millis(50)).await;
        adapter.close_request();
        assert!(matches!(next_event(&mut events_rx).await, PhysEvent::OpenFailure));
    }

    #[tokio::test]
    async fn client_read_without_open_fails() {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let mut adapter = TcpClientAdapter::new("127.0.0.1:1", events_tx);
        adapter.read_request(BytesMut::with_capacity(8));
        assert!(matches!(next_event(&mut events_rx).await, PhysEvent::ReadFailure));
    }

    #[tokio::test]
    async fn server_accepts_one_connection() {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();

        // Bind on an ephemeral port by binding first ourselves to learn a
        // free address, then releasing it for the adapter.
        let (listener, addr) = test_listener().await;
        drop(listener);

        let mut adapter = TcpServerAdapter::new(addr.clone(), events_tx);
        adapter.open_request();

        // Give the listener a moment to bind before dialing in.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let mut peer = TcpStream::connect(&addr).await.unwrap();
        assert!(matches!(next_event(&mut events_rx).await, PhysEvent::OpenSuccess));

        peer.write_all(b"hello outstation").await.unwrap();
        adapter.read_request(BytesMut::with_capacity(256));
        match next_event(&mut events_rx).await {
            PhysEvent::ReadSuccess(buf) => assert_eq!(buf.as_ref(), b"hello outstation"),
            other => panic!("expected ReadSuccess, got {other:?}"),
        }

        adapter.close_request();
    }

    #[tokio::test]
    async fn server_close_while_waiting_for_peer_is_open_failure() {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let (listener, addr) = test_listener().await;
        drop(listener);

        let mut adapter = TcpServerAdapter::new(addr, events_tx);
        adapter.open_request();
        tokio::time::sleep(Duration::from_millis(50)).await;

        adapter.close_request();
        assert!(matches!(next_event(&mut events_rx).await, PhysEvent::OpenFailure));
    }
}
