//! WebSocket push endpoint.
//!
//! `PushEndpoint` accepts TCP connections on a blocking loop and hands each one to its own
//! worker thread. A worker performs the WebSocket handshake (only `/ws/prices` is
//! served), registers with the `BroadcastHub`, and then alternates between two jobs:
//!
//! - forwarding queued payloads from its subscription to the socket;
//! - reading inbound frames with a short timeout and discarding them. The read exists
//!   only to notice a close frame or a dead peer.
//!
//! The worker unsubscribes and drops the socket when the peer goes away, a write fails,
//! or the hub drops the subscription (slow consumer). Errors stay inside the worker and
//! never affect other connections.

use crate::hub::{BroadcastHub, Payload, Subscription};
use crossbeam_channel::RecvTimeoutError;
use feed_common::net::PRICES_PATH;
use feed_common::{FeedError, Result};
use log::{debug, error, info, warn};
use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tungstenite::http::StatusCode;
use tungstenite::{HandshakeError, Message, WebSocket};

/// How long a worker waits for outbound payloads before polling the socket.
const OUTBOUND_POLL: Duration = Duration::from_millis(20);
/// Read timeout used while checking the socket for inbound frames.
const INBOUND_POLL: Duration = Duration::from_millis(20);

/// Accepts WebSocket subscribers and serves each on its own thread.
pub struct PushEndpoint {
    listener: TcpListener,
    hub: Arc<BroadcastHub>,
}

impl PushEndpoint {
    /// Serve subscribers of `hub` on an already bound `listener`.
    pub fn new(listener: TcpListener, hub: Arc<BroadcastHub>) -> Self {
        Self { listener, hub }
    }

    /// Address the endpoint is listening on.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Blocking accept loop. Returns only if the listener itself fails.
    pub fn accept_loop(self) -> Result<()> {
        info!("Price stream is served on ws://{}{}", self.listener.local_addr()?, PRICES_PATH);

        for stream in self.listener.incoming() {
            match stream {
                Ok(stream) => {
                    let hub = Arc::clone(&self.hub);
                    let spawned = thread::Builder::new()
                        .name("feed-connection".to_string())
                        .spawn(move || serve_connection(stream, hub));
                    if let Err(e) = spawned {
                        error!("Failed to spawn connection worker: {}", e);
                    }
                }
                Err(e) => error!("TCP connection error: {}", e),
            }
        }
        Ok(())
    }
}

fn serve_connection(stream: TcpStream, hub: Arc<BroadcastHub>) {
    let peer = stream
        .peer_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|_| "unknown peer".to_string());

    let mut socket = match handshake(stream) {
        Ok(socket) => socket,
        Err(e) => {
            warn!("Handshake with {} rejected: {}", peer, e);
            return;
        }
    };

    let subscription = match hub.subscribe() {
        Ok(subscription) => subscription,
        Err(e) => {
            error!("Failed to register {}: {}", peer, e);
            return;
        }
    };
    let handle = subscription.handle;
    info!("{} connected as {}", peer, handle);

    match pump(&mut socket, &subscription) {
        Ok(()) => info!("{} ({}) disconnected", peer, handle),
        Err(e) => warn!("{} ({}) dropped: {}", peer, handle, e),
    }
    if let Err(e) = hub.unsubscribe(handle) {
        error!("Failed to unregister {}: {}", handle, e);
    }
    let _ = socket.close(None);
    let _ = socket.flush();
}

fn handshake(stream: TcpStream) -> Result<WebSocket<TcpStream>> {
    let socket = tungstenite::accept_hdr(stream, |request: &Request, response: Response| {
        if request.uri().path() == PRICES_PATH {
            Ok(response)
        } else {
            let path = request.uri().path();
            let mut refusal = ErrorResponse::new(Some(format!("no stream at {}", path)));
            *refusal.status_mut() = StatusCode::NOT_FOUND;
            Err(refusal)
        }
    })
    .map_err(|e| match e {
        HandshakeError::Failure(e) => FeedError::WebSocket(e),
        HandshakeError::Interrupted(_) => FeedError::Io(ErrorKind::WouldBlock.into()),
    })?;
    socket.get_ref().set_read_timeout(Some(INBOUND_POLL))?;
    Ok(socket)
}

/// Forward payloads and discard inbound frames until either side goes away.
///
/// `Ok(())` means an orderly end: the peer closed, or the hub dropped the subscription.
fn pump(socket: &mut WebSocket<TcpStream>, subscription: &Subscription) -> Result<()> {
    loop {
        match subscription.receiver.recv_timeout(OUTBOUND_POLL) {
            Ok(payload) => {
                send_payload(socket, &payload)?;
                for payload in subscription.receiver.try_iter() {
                    send_payload(socket, &payload)?;
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                info!("{} no longer registered with the hub", subscription.handle);
                return Ok(());
            }
        }

        match socket.read() {
            Ok(Message::Close(_)) => return Ok(()),
            Ok(message) => debug!("Ignoring inbound {} byte message", message.len()),
            Err(tungstenite::Error::Io(e))
                if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }
    }
}

fn send_payload(socket: &mut WebSocket<TcpStream>, payload: &Payload) -> Result<()> {
    socket
        .send(Message::text(payload.to_string()))
        .map_err(|e| FeedError::Send(e.to_string()))
}
