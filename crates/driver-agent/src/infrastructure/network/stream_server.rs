//! Pull-based UDP screen stream.
//!
//! The client sends any datagram to the stream port; each one is a pull
//! trigger.  For every trigger the server captures one frame, compresses it
//! and sends it back cut into datagrams with the 8-byte offset/remaining
//! header (see [`driver_core::protocol::datagram`]).  Nothing is ever sent
//! unsolicited.
//!
//! # Peer lifecycle
//!
//! ```text
//! Idle ──pull──▶ AwaitingPull ──▶ Sending ──▶ AwaitingPull ──pull──▶ ...
//!                     │                            │
//!                     └──── stop / socket fault ───┴──▶ Closed ──pull──▶ ...
//! ```
//!
//! Only one peer is served.  A trigger from another address replaces the
//! current peer.  `driver stop` resets the peer through [`StreamControl`].
//!
//! # Failure handling
//!
//! - No frame from the capture source: nothing is sent, the server waits for
//!   the next trigger.
//! - Encoding failure or oversize frame: logged, frame skipped.
//! - Socket error while sending or receiving: logged, peer dropped.
//!
//! # Shutdown
//!
//! Each receive waits at most [`POLL_INTERVAL`].  On every timeout the
//! `running` flag and the control generation are checked, so the loop exits
//! within one interval of shutdown.

use std::net::{IpAddr, SocketAddr};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use driver_core::protocol::datagram::{split_frame, MAX_PAYLOAD};
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::infrastructure::screen_capture::{FrameEncoder, ScreenCapture};

/// Upper bound on one receive wait.
pub const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Error type for the stream server.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("failed to bind stream socket on {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("stream socket error: {0}")]
    Io(#[from] std::io::Error),
}

/// Lifecycle of the streaming peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// No peer has sent a trigger yet.
    Idle,
    AwaitingPull,
    Sending,
    /// The last peer was dropped; the next trigger starts a new one.
    Closed,
}

/// Handle used by the command side to reset the streaming peer.
///
/// Every [`reset_peer`](Self::reset_peer) bumps a generation counter; the
/// stream loop drops its peer when it sees a new generation.
#[derive(Debug, Clone)]
pub struct StreamControl {
    generation: Arc<watch::Sender<u64>>,
}

impl StreamControl {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self {
            generation: Arc::new(tx),
        }
    }

    pub fn reset_peer(&self) {
        self.generation.send_modify(|g| *g = g.wrapping_add(1));
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.generation.subscribe()
    }
}

impl Default for StreamControl {
    fn default() -> Self {
        Self::new()
    }
}

/// Binds the UDP stream socket.
///
/// # Errors
///
/// Returns [`StreamError::BindFailed`] if the socket cannot be bound.
pub async fn bind_stream_socket(ip: IpAddr, port: u16) -> Result<UdpSocket, StreamError> {
    let addr = SocketAddr::new(ip, port);
    UdpSocket::bind(addr)
        .await
        .map_err(|source| StreamError::BindFailed { addr, source })
}

/// Serves compressed frames to a single pulling peer.
pub struct StreamServer {
    socket: UdpSocket,
    capture: Arc<dyn ScreenCapture>,
    encoder: FrameEncoder,
    control: watch::Receiver<u64>,
    running: Arc<AtomicBool>,
    peer: Option<SocketAddr>,
    state: watch::Sender<StreamState>,
}

impl StreamServer {
    pub fn new(
        socket: UdpSocket,
        capture: Arc<dyn ScreenCapture>,
        encoder: FrameEncoder,
        control: &StreamControl,
        running: Arc<AtomicBool>,
    ) -> Self {
        let (state, _rx) = watch::channel(StreamState::Idle);
        Self {
            socket,
            capture,
            encoder,
            control: control.subscribe(),
            running,
            peer: None,
            state,
        }
    }

    /// # Errors
    ///
    /// Returns the OS error if the socket address cannot be read.
    pub fn local_addr(&self) -> Result<SocketAddr, StreamError> {
        Ok(self.socket.local_addr()?)
    }

    /// Observes peer state changes.
    pub fn state_watch(&self) -> watch::Receiver<StreamState> {
        self.state.subscribe()
    }

    /// Runs the receive/send loop until `running` is cleared.
    pub async fn run(mut self) {
        let mut buf = vec![0u8; 2048];
        info!(
            "stream server listening on UDP {}",
            self.local_addr()
                .map(|a| a.to_string())
                .unwrap_or_else(|_| "?".to_string())
        );

        while self.running.load(Ordering::Relaxed) {
            if self.control.has_changed().unwrap_or(false) {
                self.control.borrow_and_update();
                self.close_peer("reset by driver stop");
            }

            let (_, src) =
                match tokio::time::timeout(POLL_INTERVAL, self.socket.recv_from(&mut buf)).await {
                    Err(_) => continue,
                    Ok(Ok(pair)) => pair,
                    Ok(Err(e)) => {
                        warn!("stream recv error: {e}");
                        self.close_peer("receive failed");
                        continue;
                    }
                };

            self.accept_trigger(src);
            self.serve_frame(src).await;
        }

        self.set_state(StreamState::Closed);
        info!("stream server stopped");
    }

    fn set_state(&self, state: StreamState) {
        self.state.send_replace(state);
    }

    fn accept_trigger(&mut self, src: SocketAddr) {
        match self.peer {
            Some(current) if current == src => {}
            Some(current) => {
                info!("stream peer {current} preempted by {src}");
                self.peer = Some(src);
            }
            None => {
                info!("stream peer {src} connected");
                self.peer = Some(src);
            }
        }
        self.set_state(StreamState::AwaitingPull);
    }

    fn close_peer(&mut self, reason: &str) {
        if let Some(peer) = self.peer.take() {
            info!("stream peer {peer} dropped: {reason}");
            self.set_state(StreamState::Closed);
        }
    }

    /// Captures, encodes and sends one frame to `peer`.
    async fn serve_frame(&mut self, peer: SocketAddr) {
        self.set_state(StreamState::Sending);

        let capture = Arc::clone(&self.capture);
        let encoder = self.encoder;
        let encoded = tokio::task::spawn_blocking(move || {
            capture
                .capture()
                .map(|frame| encoder.encode_stream_frame(&frame))
        })
        .await;

        let frame = match encoded {
            Ok(Some(Ok(bytes))) => bytes,
            Ok(Some(Err(e))) => {
                warn!("frame encoding failed: {e}");
                self.set_state(StreamState::AwaitingPull);
                return;
            }
            Ok(None) => {
                debug!("no frame available; waiting for next pull");
                self.set_state(StreamState::AwaitingPull);
                return;
            }
            Err(e) => {
                error!("capture task failed: {e}");
                self.set_state(StreamState::AwaitingPull);
                return;
            }
        };

        let datagrams = match split_frame(&frame, MAX_PAYLOAD) {
            Ok(chunks) => chunks,
            Err(e) => {
                warn!("frame skipped: {e}");
                self.set_state(StreamState::AwaitingPull);
                return;
            }
        };

        let count = datagrams.len();
        for datagram in datagrams {
            if let Err(e) = self.socket.send_to(&datagram, peer).await {
                warn!("stream send to {peer} failed: {e}");
                self.close_peer("send failed");
                return;
            }
        }
        debug!("sent frame of {} bytes in {count} datagrams to {peer}", frame.len());

        self.set_state(StreamState::AwaitingPull);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
