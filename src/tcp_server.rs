use crate::defs::{CLIENT_KEEP_ALIVE_SEC, TCP_CONNECTION_TICK_PERIOD_MSEC};
use crate::errors::{ListenerError, TcpServerError};
use crate::events::MarketEvent;
use crate::market_engine::MarketDataEngine;

use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, UdpSocket};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// TCP server exposing the market data engine to remote clients.
///
/// Supported commands (one per line):
/// - `PING` → responds with `PONG`
/// - `SNAPSHOT [SYMBOLS...]` → responds with a JSON snapshot; no symbols
///   means all quotes
/// - `FILTER [SYMBOLS...]` → replaces the subscription filter, echoes the
///   accepted ids; no symbols clears the filter
/// - `OPEN` / `CLOSE` → market state transitions
/// - `STATE` → responds with the current market state
/// - `STREAM host:port` → registers an event listener that pushes JSON
///   events to the given UDP address
/// - `STOP` → removes the listener
pub struct TcpServer {
    /// TCP listener socket
    listener: TcpListener,

    /// Shared handle to the engine serving all connections
    engine: Arc<MarketDataEngine>,
}

impl TcpServer {
    /// Creates a new TCP server bound to the given address.
    ///
    /// # Arguments
    /// * `addr` - Address to bind, e.g., `"127.0.0.1:3333"`.
    /// * `engine` - `Arc` reference to the engine instance.
    ///
    /// # Returns
    /// * `Ok(TcpServer)` if binding succeeds.
    /// * `Err(TcpServerError::BindError)` if the port is unavailable.
    pub fn new(addr: &str, engine: Arc<MarketDataEngine>) -> Result<Self, TcpServerError> {
        log::info!("Binding TCP server to address: {}", addr);
        let listener =
            TcpListener::bind(addr).map_err(|e| TcpServerError::BindError(e.to_string()))?;
        log::info!("TCP server successfully bound to: {}", addr);

        Ok(Self { listener, engine })
    }

    /// Starts the TCP server in an infinite loop.
    ///
    /// For every incoming client connection, spawns a dedicated thread to
    /// handle the connection. Each thread handles keep-alive and
    /// dispatches commands to the shared engine.
    pub fn start(&self) -> Result<(), TcpServerError> {
        log::info!("TCP server starting main loop");
        loop {
            match self.listener.accept() {
                Ok((stream, addr)) => {
                    log::info!("New TCP connection from: {}", addr);
                    let engine = self.engine.clone();
                    thread::spawn(move || {
                        log::debug!("Spawning handler thread for client: {}", addr);
                        if let Err(e) = handle_connection(stream, addr, engine) {
                            log::warn!("Connection handler error for {}: {}", addr, e);
                        }
                        log::debug!("Handler thread finished for client: {}", addr);
                    });
                }
                Err(e) => {
                    log::error!("Failed to accept TCP connection: {}", e);
                    return Err(TcpServerError::AcceptError(e.to_string()));
                }
            }
        }
    }
}

/// Handles a single client TCP connection.
///
/// - Reads commands from the TCP stream and dispatches them to the engine.
/// - Tracks keep-alive; disconnects the client and removes its listener
///   if no input is received within the timeout.
fn handle_connection(
    mut stream: TcpStream,
    addr: SocketAddr,
    engine: Arc<MarketDataEngine>,
) -> Result<(), TcpServerError> {
    log::info!("[tcp] connected: {}", addr);

    let mut listener_id: Option<u64> = None;
    let mut last_ping = Instant::now();

    let tick_timeout = Duration::from_millis(TCP_CONNECTION_TICK_PERIOD_MSEC);
    // Clone the stream for buffered, line-based reading
    let cloned = stream
        .try_clone()
        .map_err(|e| TcpServerError::ClientIoError(e.to_string()))?;

    // Also set the same read timeout on the cloned handle used by BufReader.
    // Some platforms treat timeouts per-handle, so do it explicitly.
    cloned
        .set_read_timeout(Some(tick_timeout))
        .map_err(|e| TcpServerError::ClientIoError(e.to_string()))?;

    // Wrap the cloned stream in BufReader for line-based reading
    let mut reader = BufReader::new(cloned);

    loop {
        let mut line = String::new();

        match reader.read_line(&mut line) {
            Ok(0) => {
                log::info!("Client {} closed connection", addr);
                if let Some(id) = listener_id.take() {
                    engine.unsubscribe(id);
                }
                return Ok(());
            }
            Ok(_) => {
                last_ping = Instant::now();
                let msg = line.trim().to_string(); // trim removes trailing \n

                if msg.is_empty() {
                    continue; // ignore empty lines
                }

                log::debug!("Received from {}: '{}'", addr, msg);

                if msg.starts_with("PING") {
                    handle_ping(&mut stream, &addr)?;
                } else if msg.starts_with("SNAPSHOT") {
                    handle_snapshot(&mut stream, &msg, &engine, &addr)?;
                } else if msg.starts_with("FILTER") {
                    handle_filter(&mut stream, &msg, &engine, &addr)?;
                } else if msg.starts_with("OPEN") {
                    handle_open(&mut stream, &engine, &addr)?;
                } else if msg.starts_with("CLOSE") {
                    handle_close(&mut stream, &engine, &addr)?;
                } else if msg.starts_with("STATE") {
                    handle_state(&mut stream, &engine)?;
                } else if msg.starts_with("STREAM ") {
                    handle_stream(&mut stream, msg, &engine, &mut listener_id, &addr)?;
                } else if msg.starts_with("STOP") {
                    handle_stop(&mut stream, &engine, &mut listener_id, &addr)?;
                } else {
                    handle_invalid(&mut stream, msg, &addr)?;
                }
            }
            Err(ref e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                // Keep-alive check
                if last_ping.elapsed().as_secs() > CLIENT_KEEP_ALIVE_SEC {
                    log::warn!(
                        "Client {} keep-alive timeout ({}s), disconnecting",
                        addr,
                        CLIENT_KEEP_ALIVE_SEC
                    );
                    if let Some(id) = listener_id.take() {
                        log::info!("Removing listener {} due to timeout", id);
                        engine.unsubscribe(id);
                    }
                    return Ok(());
                }
                thread::sleep(Duration::from_millis(TCP_CONNECTION_TICK_PERIOD_MSEC));
                continue;
            }
            Err(e) => {
                log::error!("Connection failed for {}: {}", addr, e);
                if let Some(id) = listener_id.take() {
                    log::info!("Removing listener {} due to connection error", id);
                    engine.unsubscribe(id);
                }
                return Err(TcpServerError::ClientIoError(e.to_string()));
            }
        }
    }
}

/// Responds to a `PING` command with `PONG`.
fn handle_ping(stream: &mut TcpStream, addr: &SocketAddr) -> Result<(), TcpServerError> {
    log::debug!("Responding to PING from {}", addr);
    stream
        .write_all(b"PONG\n")
        .map_err(|e| TcpServerError::ClientIoError(e.to_string()))
}

/// Handles a `SNAPSHOT` command: responds with a one-line JSON object
/// holding the requested quotes and any unresolved ids.
fn handle_snapshot(
    stream: &mut TcpStream,
    msg: &str,
    engine: &Arc<MarketDataEngine>,
    addr: &SocketAddr,
) -> Result<(), TcpServerError> {
    let ids: Vec<String> = msg
        .split_whitespace()
        .skip(1)
        .map(|s| s.to_string())
        .collect();
    log::debug!("SNAPSHOT request from {} for {:?}", addr, ids);

    let snapshot = engine.get_snapshot(&ids)?;
    let payload = json!({
        "quotes": snapshot.quotes.iter().map(|q| q.to_json()).collect::<Vec<_>>(),
        "unresolved": snapshot.unresolved,
    });

    stream
        .write_all(format!("SNAPSHOT {}\n", payload).as_bytes())
        .map_err(|e| TcpServerError::ClientIoError(e.to_string()))
}

/// Handles a `FILTER` command: replaces the active subscription filter
/// and echoes the accepted ids.
fn handle_filter(
    stream: &mut TcpStream,
    msg: &str,
    engine: &Arc<MarketDataEngine>,
    addr: &SocketAddr,
) -> Result<(), TcpServerError> {
    let ids: Vec<String> = msg
        .split_whitespace()
        .skip(1)
        .map(|s| s.to_string())
        .collect();
    log::info!("FILTER request from {}: {:?}", addr, ids);

    let accepted = engine.set_filter(&ids)?;
    stream
        .write_all(format!("FILTER OK {}\n", accepted.join(" ")).as_bytes())
        .map_err(|e| TcpServerError::ClientIoError(e.to_string()))
}

/// Handles an `OPEN` command.
fn handle_open(
    stream: &mut TcpStream,
    engine: &Arc<MarketDataEngine>,
    addr: &SocketAddr,
) -> Result<(), TcpServerError> {
    log::info!("OPEN request from {}", addr);
    engine.open()?;
    stream
        .write_all(b"OPEN OK\n")
        .map_err(|e| TcpServerError::ClientIoError(e.to_string()))
}

/// Handles a `CLOSE` command.
fn handle_close(
    stream: &mut TcpStream,
    engine: &Arc<MarketDataEngine>,
    addr: &SocketAddr,
) -> Result<(), TcpServerError> {
    log::info!("CLOSE request from {}", addr);
    engine.close()?;
    stream
        .write_all(b"CLOSE OK\n")
        .map_err(|e| TcpServerError::ClientIoError(e.to_string()))
}

/// Handles a `STATE` command: reports the current market state.
fn handle_state(
    stream: &mut TcpStream,
    engine: &Arc<MarketDataEngine>,
) -> Result<(), TcpServerError> {
    let state = engine.market_state()?;
    stream
        .write_all(format!("STATE {}\n", state).as_bytes())
        .map_err(|e| TcpServerError::ClientIoError(e.to_string()))
}

/// Handles a `STREAM` command:
/// - Parses the UDP address.
/// - Registers an engine listener pushing JSON events to that address.
fn handle_stream(
    stream: &mut TcpStream,
    msg: String,
    engine: &Arc<MarketDataEngine>,
    listener_id: &mut Option<u64>,
    addr: &SocketAddr,
) -> Result<(), TcpServerError> {
    let parts: Vec<_> = msg.split_whitespace().collect();

    if parts.len() != 2 {
        log::warn!("Invalid STREAM command from {}", addr);
        return Err(TcpServerError::InvalidCommand("STREAM host:port".into()));
    }

    let udp_addr: SocketAddr = parts[1].parse().map_err(|_| {
        log::warn!("Invalid UDP address from {}: {}", addr, parts[1]);
        TcpServerError::InvalidCommand("Bad UDP address".into())
    })?;

    log::info!("STREAM request from {}: UDP {}", addr, udp_addr);

    // One connection holds at most one listener.
    if let Some(id) = listener_id.take() {
        engine.unsubscribe(id);
    }

    let udp_socket =
        UdpSocket::bind("0.0.0.0:0").map_err(|e| TcpServerError::ClientIoError(e.to_string()))?;

    let callback = move |event: MarketEvent| -> Result<(), ListenerError> {
        udp_socket
            .send_to(event.to_json().to_string().as_bytes(), udp_addr)
            .map_err(|e| ListenerError::CallbackFailed(e.to_string()))?;
        Ok(())
    };

    let id = engine.subscribe(callback);
    *listener_id = Some(id);
    log::info!("Registered listener {} for TCP connection {}", id, addr);

    stream
        .write_all(b"STREAM OK\n")
        .map_err(|e| TcpServerError::ClientIoError(e.to_string()))
}

/// Handles a `STOP` command:
/// - Removes the connection's listener, if any.
/// - Sends confirmation to the TCP client.
fn handle_stop(
    stream: &mut TcpStream,
    engine: &Arc<MarketDataEngine>,
    listener_id: &mut Option<u64>,
    addr: &SocketAddr,
) -> Result<(), TcpServerError> {
    if let Some(id) = listener_id.take() {
        log::info!("STOP request from {}, removing listener {}", addr, id);
        engine.unsubscribe(id);
    } else {
        log::warn!("STOP request from {} but no listener registered", addr);
    }

    stream
        .write_all(b"STOP OK\n")
        .map_err(|e| TcpServerError::ClientIoError(e.to_string()))
}

/// Sends an error message to the client for invalid commands.
fn handle_invalid(
    stream: &mut TcpStream,
    msg: String,
    addr: &SocketAddr,
) -> Result<(), TcpServerError> {
    log::warn!("Invalid command from {}: '{}'", addr, msg);
    stream
        .write_all(b"ERR Invalid command\n")
        .map_err(|e| TcpServerError::ClientIoError(e.to_string()))
}
