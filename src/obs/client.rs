//! OBS WebSocket client
//!
//! Controls OBS Studio via the obs-websocket 5.x protocol (built into OBS 28+).
//! Default endpoint: ws://{host}:4455
//!
//! One authenticated connection is held for a whole reconciliation run.
//! Requests are sent one at a time; every read is bounded by the request
//! timeout.

use super::protocol::{self, op, Envelope, Hello, Identified};
use super::Transport;
use crate::error::{SceneError, SceneResult};
use serde_json::Value;
use std::net::{IpAddr, SocketAddr, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::{Duration, Instant};
use tungstenite::{Message, WebSocket};

/// Number of retry attempts for the initial connection
const MAX_RETRIES: u32 = 2;

/// Delay between retry attempts
const RETRY_DELAY: Duration = Duration::from_millis(100);

/// Connection parameters for OBS
#[derive(Debug, Clone)]
pub struct ObsConnection {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    /// Bound on connect and on each request/response pair
    pub timeout: Duration,
}

impl ObsConnection {
    pub fn new(host: &str, port: u16, password: Option<String>, timeout: Duration) -> Self {
        Self {
            host: host.to_string(),
            port,
            password,
            timeout,
        }
    }

    pub fn key(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn failed(&self, reason: impl std::fmt::Display) -> SceneError {
        SceneError::ControlConnectionFailed {
            host: self.host.clone(),
            port: self.port,
            reason: reason.to_string(),
        }
    }
}

/// Only private, loopback and link-local peers are accepted.
fn validate_ip(addr: IpAddr) -> Result<(), String> {
    let is_safe = match addr {
        IpAddr::V4(v4) => v4.is_private() || v4.is_loopback() || v4.is_link_local(),
        IpAddr::V6(v6) => v6.is_loopback(),
    };
    if is_safe {
        Ok(())
    } else {
        Err(format!(
            "OBS WebSocket host must be on a private/local network, got: {addr}"
        ))
    }
}

/// Execute a fallible operation with retries
fn with_retry<T, F>(mut operation: F) -> SceneResult<T>
where
    F: FnMut() -> SceneResult<T>,
{
    let mut attempt = 0;
    loop {
        match operation() {
            Ok(result) => return Ok(result),
            Err(e) if attempt < MAX_RETRIES => {
                tracing::debug!("Attempt {} failed: {}", attempt + 1, e);
                attempt += 1;
                thread::sleep(RETRY_DELAY);
            }
            Err(e) => return Err(e),
        }
    }
}

pub struct ObsClient {
    conn: ObsConnection,
    socket: WebSocket<TcpStream>,
    next_id: u64,
    /// Version string from Hello
    pub server_version: String,
}

impl ObsClient {
    /// Connect, authenticate when challenged, and wait for Identified.
    pub fn connect(conn: &ObsConnection) -> SceneResult<Self> {
        with_retry(|| Self::connect_once(conn))
    }

    fn connect_once(conn: &ObsConnection) -> SceneResult<Self> {
        let addr = resolve_addr(conn)?;
        let stream = TcpStream::connect_timeout(&addr, conn.timeout).map_err(|e| conn.failed(e))?;
        stream
            .set_read_timeout(Some(conn.timeout))
            .and_then(|()| stream.set_write_timeout(Some(conn.timeout)))
            .and_then(|()| stream.set_nodelay(true))
            .map_err(|e| conn.failed(e))?;

        let url = format!("ws://{}", addr);
        let (socket, _response) = tungstenite::client(url.as_str(), stream)
            .map_err(|e| conn.failed(format!("WebSocket handshake failed: {e}")))?;

        let mut client = Self {
            conn: conn.clone(),
            socket,
            next_id: 0,
            server_version: String::new(),
        };
        client.identify().map_err(|e| match e {
            SceneError::ControlConnectionFailed { .. } => e,
            other => conn.failed(other),
        })?;

        tracing::info!(
            "Connected to OBS {} (obs-websocket {})",
            conn.key(),
            client.server_version
        );
        Ok(client)
    }

    fn identify(&mut self) -> SceneResult<()> {
        let hello = Envelope::parse(&self.read_text()?)?;
        if hello.op != op::HELLO {
            return Err(SceneError::protocol(format!(
                "expected Hello message, got op {}",
                hello.op
            )));
        }
        let hello: Hello = serde_json::from_value(hello.d)?;
        self.server_version = hello.obs_web_socket_version.clone();

        let identify = protocol::identify(&hello, self.conn.password.as_deref())?;
        self.send(identify)?;

        let identified = Envelope::parse(&self.read_text()?)?;
        if identified.op != op::IDENTIFIED {
            return Err(SceneError::protocol(format!(
                "authentication failed or unexpected message (op {})",
                identified.op
            )));
        }
        let identified: Identified = serde_json::from_value(identified.d)?;
        tracing::debug!("Negotiated RPC version {}", identified.negotiated_rpc_version);
        Ok(())
    }

    fn send(&mut self, message: Value) -> SceneResult<()> {
        self.socket
            .send(Message::Text(message.to_string()))
            .map_err(|e| SceneError::protocol(format!("failed to send: {e}")))
    }

    /// Next text frame. Control frames are skipped.
    fn read_text(&mut self) -> SceneResult<String> {
        loop {
            match self.socket.read() {
                Ok(Message::Text(text)) => return Ok(text),
                Ok(Message::Close(frame)) => {
                    let reason = frame
                        .map(|f| format!("{} ({})", f.reason, u16::from(f.code)))
                        .unwrap_or_else(|| "no reason".to_string());
                    return Err(SceneError::protocol(format!("OBS closed the connection: {reason}")));
                }
                Ok(_) => continue,
                Err(tungstenite::Error::Io(e))
                    if matches!(
                        e.kind(),
                        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                    ) =>
                {
                    return Err(SceneError::protocol(format!(
                        "timed out after {} ms waiting for OBS",
                        self.conn.timeout.as_millis()
                    )));
                }
                Err(e) => return Err(SceneError::protocol(format!("failed to read: {e}"))),
            }
        }
    }

    pub fn close(mut self) {
        let _ = self.socket.close(None);
        let _ = self.socket.flush();
    }
}

impl Transport for ObsClient {
    fn request(&mut self, request_type: &str, data: Option<Value>) -> SceneResult<Value> {
        self.next_id += 1;
        let request_id = self.next_id.to_string();
        self.send(protocol::request(request_type, &request_id, data.as_ref()))?;

        let deadline = Instant::now() + self.conn.timeout;
        loop {
            if Instant::now() > deadline {
                return Err(SceneError::protocol(format!(
                    "{request_type}: no response within {} ms",
                    self.conn.timeout.as_millis()
                )));
            }
            let message = Envelope::parse(&self.read_text()?)?;
            if message.op != op::REQUEST_RESPONSE {
                continue;
            }
            if message.d.get("requestId").and_then(Value::as_str) != Some(request_id.as_str()) {
                tracing::debug!("Skipping response for another request");
                continue;
            }
            tracing::trace!("{} -> {}", request_type, message.d);
            return protocol::check_response(request_type, &message.d);
        }
    }
}

fn resolve_addr(conn: &ObsConnection) -> SceneResult<SocketAddr> {
    let addrs = (conn.host.as_str(), conn.port)
        .to_socket_addrs()
        .map_err(|e| conn.failed(format!("cannot resolve host: {e}")))?;

    let mut last_reason = "host resolved to no addresses".to_string();
    for addr in addrs {
        match validate_ip(addr.ip()) {
            Ok(()) => return Ok(addr),
            Err(reason) => last_reason = reason,
        }
    }
    Err(conn.failed(last_reason))
}
