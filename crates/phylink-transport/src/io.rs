//! Shared reader/writer task loops used by every adapter.
//!
//! An open connection is driven by two tasks: one owns the read half and
//! services read requests, one owns the write half and services write
//! requests. Both watch a shared [`CancellationToken`]; when the adapter's
//! `close_request` cancels it, any operation still in flight (and anything
//! still queued) resolves as a failure event, which is how the state
//! machine learns its outstanding operations have drained.

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use phylink_core::adapter::{EventSender, PhysEvent};

/// The adapter-side handles for one open connection.
pub(crate) struct IoSession {
    read_tx: mpsc::UnboundedSender<BytesMut>,
    write_tx: mpsc::UnboundedSender<Bytes>,
    cancel: CancellationToken,
}

/// The task-side receivers, moved into the spawned open task.
pub(crate) struct IoReceivers {
    read_rx: mpsc::UnboundedReceiver<BytesMut>,
    write_rx: mpsc::UnboundedReceiver<Bytes>,
}

/// Create the request channels and cancellation token for one open cycle.
///
/// The session is created before the connection exists so the adapter can
/// accept read/write requests the instant the open succeeds.
pub(crate) fn session() -> (IoSession, IoReceivers) {
    let (read_tx, read_rx) = mpsc::unbounded_channel();
    let (write_tx, write_rx) = mpsc::unbounded_channel();
    let session = IoSession {
        read_tx,
        write_tx,
        cancel: CancellationToken::new(),
    };
    (session, IoReceivers { read_rx, write_rx })
}

impl IoSession {
    /// Token cancelled by `close_request`; also observed by the open task
    /// while the connection is still being established.
    pub(crate) fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel the open cycle: aborts a pending connect and fails every
    /// in-flight or queued read/write.
    pub(crate) fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Forward a read request to the reader task.
    ///
    /// If the task is already gone the operation completes as a failure,
    /// so the state machine never waits on a read nobody will finish.
    pub(crate) fn request_read(&self, events: &EventSender, buf: BytesMut) {
        if self.read_tx.send(buf).is_err() {
            let _ = events.send(PhysEvent::ReadFailure);
        }
    }

    /// Forward a write request to the writer task; fails it if the task is
    /// gone, mirroring [`request_read`](Self::request_read).
    pub(crate) fn request_write(&self, events: &EventSender, data: Bytes) {
        if self.write_tx.send(data).is_err() {
            let _ = events.send(PhysEvent::SendFailure);
        }
    }
}

/// Drive both halves of an open connection until cancellation or EOF.
pub(crate) async fn run_io<R, W>(
    read_half: R,
    write_half: W,
    receivers: IoReceivers,
    events: EventSender,
    cancel: CancellationToken,
) where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::join!(
        reader_loop(read_half, receivers.read_rx, events.clone(), cancel.clone()),
        writer_loop(write_half, receivers.write_rx, events, cancel),
    );
}

async fn reader_loop<R>(
    mut read_half: R,
    mut read_rx: mpsc::UnboundedReceiver<BytesMut>,
    events: EventSender,
    cancel: CancellationToken,
) where
    R: AsyncRead + Unpin,
{
    loop {
        let mut buf = tokio::select! {
            _ = cancel.cancelled() => break,
            op = read_rx.recv() => match op {
                Some(buf) => buf,
                None => return,
            },
        };

        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = events.send(PhysEvent::ReadFailure);
                break;
            }
            result = read_half.read_buf(&mut buf) => {
                let event = match result {
                    // 0 bytes with spare capacity means the peer closed.
                    Ok(0) => PhysEvent::ReadFailure,
                    Ok(n) => {
                        trace!(bytes = n, "read completed");
                        PhysEvent::ReadSuccess(buf)
                    }
                    Err(e) => {
                        trace!(error = %e, "read failed");
                        PhysEvent::ReadFailure
                    }
                };
                let _ = events.send(event);
            }
        }
    }

    // Fail anything still queued after cancellation.
    while read_rx.try_recv().is_ok() {
        let _ = events.send(PhysEvent::ReadFailure);
    }
}

async fn writer_loop<W>(
    mut write_half: W,
    mut write_rx: mpsc::UnboundedReceiver<Bytes>,
    events: EventSender,
    cancel: CancellationToken,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        let data = tokio::select! {
            _ = cancel.cancelled() => break,
            op = write_rx.recv() => match op {
                Some(data) => data,
                None => return,
            },
        };

        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = events.send(PhysEvent::SendFailure);
                break;
            }
            result = async {
                write_half.write_all(&data).await?;
                write_half.flush().await
            } => {
                let event = match result {
                    Ok(()) => {
                        trace!(bytes = data.len(), "write completed");
                        PhysEvent::SendSuccess
                    }
                    Err(e) => {
                        trace!(error = %e, "write failed");
                        PhysEvent::SendFailure
                    }
                };
                let _ = events.send(event);
            }
        }
    }

    while write_rx.try_recv().is_ok() {
        let _ = events.send(PhysEvent::SendFailure);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<PhysEvent>) -> PhysEvent {
        tokio::time::timeout(std::time::Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed")
    }

    #[tokio::test]
    async fn read_and_write_complete_through_loops() {
        let (local, mut remote) = duplex(256);
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let (session, receivers) = session();
        let cancel = session.cancel_token();

        let (read_half, write_half) = tokio::io::split(local);
        let io = tokio::spawn(run_io(read_half, write_half, receivers, events_tx.clone(), cancel));

        session.request_write(&events_tx, Bytes::from_static(b"hello"));
        assert!(matches!(next_event(&mut events_rx).await, PhysEvent::SendSuccess));

        let mut echoed = [0u8; 5];
        remote.read_exact(&mut echoed).await.unwrap();
        assert_eq!(&echoed, b"hello");

        remote.write_all(b"reply").await.unwrap();
        session.request_read(&events_tx, BytesMut::with_capacity(64));
        match next_event(&mut events_rx).await {
            PhysEvent::ReadSuccess(buf) => assert_eq!(buf.as_ref(), b"reply"),
            other => panic!("expected ReadSuccess, got {other:?}"),
        }

        session.shutdown();
        io.await.unwrap();
    }

    #[tokio::test]
    async fn cancel_fails_in_flight_read() {
        let (local, _remote) = duplex(256);
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let (session, receivers) = session();
        let cancel = session.cancel_token();

        let (read_half, write_half) = tokio::io::split(local);
        let io = tokio::spawn(run_io(read_half, write_half, receivers, events_tx.clone(), cancel));

        // No data will ever arrive; the read parks until cancellation.
        session.request_read(&events_tx, BytesMut::with_capacity(64));
        tokio::task::yield_now().await;

        session.shutdown();
        assert!(matches!(next_event(&mut events_rx).await, PhysEvent::ReadFailure));
        io.await.unwrap();
    }

    #[tokio::test]
    async fn requests_after_task_exit_complete_as_failures() {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let (session, receivers) = session();
        drop(receivers);

        session.request_read(&events_tx, BytesMut::with_capacity(8));
        assert!(matches!(next_event(&mut events_rx).await, PhysEvent::ReadFailure));

        session.request_write(&events_tx, Bytes::from_static(b"x"));
        assert!(matches!(next_event(&mut events_rx).await, PhysEvent::SendFailure));
    }

    #[tokio::test]
    async fn peer_close_reports_read_failure() {
        let (local, remote) = duplex(256);
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let (session, receivers) = session();
        let cancel = session.cancel_token();

        let (read_half, write_half) = tokio::io::split(local);
        let io = tokio::spawn(run_io(read_half, write_half, receivers, events_tx.clone(), cancel));

        drop(remote);
        session.request_read(&events_tx, BytesMut::with_capacity(64));
        assert!(matches!(next_event(&mut events_rx).await, PhysEvent::ReadFailure));

        session.shutdown();
        io.await.unwrap();
    }
}
