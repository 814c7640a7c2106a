//! Feed Client: connects to the price feed WebSocket and keeps a table of the latest
//! snapshot on the console. Every `stock_price_update` message redraws the table;
//! any other message is ignored.
//!
//! Usage example (CLI):
//! ```bash
//! feed_client --url ws://192.168.0.10:8000/ws/prices
//! ```
#![warn(missing_docs)]
mod args;
mod render;

use crate::args::Args;
use crate::render::{CLEAR_SCREEN, render_snapshot};
use clap::Parser;
use feed_common::{FeedError, PriceUpdate, Result};
use log::{debug, info, warn};
use std::io::{ErrorKind, Write};
use std::net::TcpStream;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::Duration;
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Message, WebSocket};

/// Read timeout so the receive loop notices Ctrl+C.
const READ_TIMEOUT: Duration = Duration::from_millis(500);

/// Runs a blocking loop that receives snapshots from `socket` and draws them until the
/// server closes the stream or `shutdown` is set.
fn start_receiver_loop(
    socket: &mut WebSocket<MaybeTlsStream<TcpStream>>,
    shutdown: Arc<AtomicBool>,
) -> Result<(), FeedError> {
    let stdout = std::io::stdout();

    while !shutdown.load(Ordering::Relaxed) {
        match socket.read() {
            Ok(Message::Text(text)) => match PriceUpdate::from_json(&text) {
                Ok(update) if update.is_price_update() => {
                    let mut out = stdout.lock();
                    write!(out, "{}{}", CLEAR_SCREEN, render_snapshot(&update))?;
                    out.flush()?;
                }
                Ok(update) => debug!("Ignoring message of type {}", update.kind),
                Err(e) => debug!("Received non-snapshot message ({}): {}", e, text),
            },
            Ok(Message::Close(frame)) => {
                info!("Server closed the stream: {:?}", frame);
                return Ok(());
            }
            Ok(_) => {}
            Err(tungstenite::Error::Io(e))
                if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
            Err(tungstenite::Error::ConnectionClosed) => return Ok(()),
            Err(e) => return Err(e.into()),
        }
    }
    info!("Receiver loop stopping...");
    let _ = socket.close(None);
    let _ = socket.flush();
    Ok(())
}

fn main() -> Result<(), FeedError> {
    init_logger();
    let args = Args::parse();
    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || {
            info!("Ctrl+C received. Shutting down client...");
            shutdown.store(true, Ordering::SeqCst);
        })
        .map_err(std::io::Error::other)?;
    }

    let url = args.url.trim().replace('"', "");
    info!("Connecting to {}", url);
    let (mut socket, response) = tungstenite::connect(url.as_str())?;
    debug!("Handshake response: {:?}", response.status());

    match socket.get_mut() {
        MaybeTlsStream::Plain(stream) => stream.set_read_timeout(Some(READ_TIMEOUT))?,
        _ => warn!(
            "Read timeout not supported on this stream; Ctrl+C takes effect on the next message"
        ),
    }

    info!("Client is running. Press Ctrl+C to exit.");
    start_receiver_loop(&mut socket, shutdown)
}

fn init_logger() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
}
