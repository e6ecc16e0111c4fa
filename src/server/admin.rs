//! Metadata-server admin channel.
//!
//! The admin endpoint speaks a newline-delimited request/response protocol
//! over TCP. Every connection authenticates first with `AUTH <secret>`;
//! the secret is read from a mode-restricted file and travels only on the
//! connection, never on an argument list. Each subsequent request line
//! receives exactly one reply line: `OK`, `OK <payload>`, or
//! `ERROR: <vendor text>`.
//!
//! The status query is the probe's input: `STATUS` replies with the
//! fixed-order tuple `<role> <connection> <version>`. Fault replies and
//! transport failures are surfaced to the probe as raw text; the
//! translation into classes happens in [`crate::probe::faults`], not here.

use crate::core::error::{WardenError, WardenResult};
use crate::probe::{ConnectionState, ReplicaRole};
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Status tuple reported by a live metadata server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetadataStatus {
    /// Reported replica role.
    pub role: ReplicaRole,
    /// Reported connection state.
    pub connection: ConnectionState,
    /// Metadata version applied in RAM. Never ahead of what is durable.
    pub version: u64,
}

/// Admin-channel operations used by the probe and the controllers.
///
/// The status query returns raw vendor text on failure so the probe can
/// classify it; control commands return typed errors because their
/// failures drive failed-role statuses, not fault classification.
pub trait AdminClient {
    /// Query (role, connection-state, metadata-version).
    fn metadata_status(&self) -> Result<MetadataStatus, String>;

    /// Promote a running shadow to master without restart.
    fn promote(&self) -> WardenResult<()>;

    /// Save metadata and exit.
    fn stop(&self) -> WardenResult<()>;

    /// Exit without flushing in-memory state to the snapshot.
    fn quick_stop(&self) -> WardenResult<()>;

    /// Save metadata without stopping.
    fn save(&self) -> WardenResult<()>;

    /// Save metadata, exit, and start again with the current personality.
    fn restart(&self) -> WardenResult<()>;

    /// Re-read the static configuration in place.
    fn reload(&self) -> WardenResult<()>;
}

/// Blocking TCP implementation of [`AdminClient`].
#[derive(Debug, Clone)]
pub struct TcpAdminClient {
    host: String,
    port: u16,
    secret: String,
    connect_timeout: Duration,
    io_timeout: Duration,
}

impl TcpAdminClient {
    /// Create a client for the admin endpoint at `host:port`.
    pub fn new(
        host: impl Into<String>,
        port: u16,
        secret: impl Into<String>,
        connect_timeout: Duration,
        io_timeout: Duration,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            secret: secret.into(),
            connect_timeout,
            io_timeout,
        }
    }

    /// Run one authenticated request/response exchange.
    ///
    /// All failures come back as raw text: transport errors verbatim from
    /// the OS, protocol errors as the server sent them. The fault table
    /// in `probe::faults` knows both shapes.
    fn exchange(&self, command: &str) -> Result<String, String> {
        let addr = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| e.to_string())?
            .next()
            .ok_or_else(|| format!("no address for {}:{}", self.host, self.port))?;

        let stream =
            TcpStream::connect_timeout(&addr, self.connect_timeout).map_err(|e| e.to_string())?;
        stream
            .set_read_timeout(Some(self.io_timeout))
            .map_err(|e| e.to_string())?;
        stream
            .set_write_timeout(Some(self.io_timeout))
            .map_err(|e| e.to_string())?;

        let mut reader = BufReader::new(stream.try_clone().map_err(|e| e.to_string())?);
        let mut stream = stream;

        let auth_reply = Self::round_trip(&mut stream, &mut reader, &format!("AUTH {}", self.secret))?;
        if auth_reply != "OK" {
            return Err(strip_error_prefix(&auth_reply).to_string());
        }

        let reply = Self::round_trip(&mut stream, &mut reader, command)?;
        if let Some(text) = reply.strip_prefix("ERROR:") {
            return Err(text.trim().to_string());
        }
        Ok(reply)
    }

    fn round_trip(
        stream: &mut TcpStream,
        reader: &mut BufReader<TcpStream>,
        line: &str,
    ) -> Result<String, String> {
        stream
            .write_all(format!("{line}\n").as_bytes())
            .map_err(|e| e.to_string())?;
        let mut reply = String::new();
        reader.read_line(&mut reply).map_err(|e| e.to_string())?;
        if reply.is_empty() {
            return Err("connection reset by peer".to_string());
        }
        Ok(reply.trim_end().to_string())
    }

    /// Issue a control command expecting a bare `OK`.
    fn control(&self, command: &'static str) -> WardenResult<()> {
        match self.exchange(command) {
            Ok(reply) if reply == "OK" => Ok(()),
            Ok(reply) => Err(WardenError::Admin {
                command,
                message: format!("unexpected reply: {reply}"),
            }),
            Err(message) => Err(WardenError::Admin { command, message }),
        }
    }
}

impl AdminClient for TcpAdminClient {
    fn metadata_status(&self) -> Result<MetadataStatus, String> {
        let reply = self.exchange("STATUS")?;
        parse_status(reply.strip_prefix("OK").map(str::trim).unwrap_or(&reply))
    }

    fn promote(&self) -> WardenResult<()> {
        self.control("PROMOTE")
    }

    fn stop(&self) -> WardenResult<()> {
        self.control("STOP")
    }

    fn quick_stop(&self) -> WardenResult<()> {
        self.control("QUICK-STOP")
    }

    fn save(&self) -> WardenResult<()> {
        self.control("SAVE")
    }

    fn restart(&self) -> WardenResult<()> {
        self.control("RESTART")
    }

    fn reload(&self) -> WardenResult<()> {
        self.control("RELOAD")
    }
}

/// Parse the fixed-order `<role> <connection> <version>` tuple.
fn parse_status(line: &str) -> Result<MetadataStatus, String> {
    let mut fields = line.split_whitespace();
    let (Some(role), Some(connection), Some(version), None) = (
        fields.next(),
        fields.next(),
        fields.next(),
        fields.next(),
    ) else {
        return Err(format!("malformed status reply: {line}"));
    };

    let role = role
        .parse::<ReplicaRole>()
        .map_err(|_| format!("malformed status reply: {line}"))?;
    let connection = connection
        .parse::<ConnectionState>()
        .map_err(|_| format!("malformed status reply: {line}"))?;
    let version = version
        .parse::<u64>()
        .map_err(|_| format!("malformed status reply: {line}"))?;

    Ok(MetadataStatus {
        role,
        connection,
        version,
    })
}

fn strip_error_prefix(reply: &str) -> &str {
    reply.strip_prefix("ERROR:").map(str::trim).unwrap_or(reply)
}
