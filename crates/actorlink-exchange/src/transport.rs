//! Request/response transports carrying exchange messages.

use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use actorlink_core::config::ExchangeConfig;
use actorlink_core::error::TransportError;
use tracing::debug;

use crate::framing::{io_error, read_message, write_message};
use crate::protocol::{InboundMessage, OutboundMessage};

/// A duplex connection with request/response pairing.
///
/// At most one exchange is in flight at a time; a call blocks until the peer
/// answers or the transport gives up.
pub trait Transport: Send {
    /// Send `message` and wait for the peer's reply.
    fn exchange(&mut self, message: &OutboundMessage) -> Result<InboundMessage, TransportError>;

    /// Send `message` without waiting for a reply.
    fn notify(&mut self, message: &OutboundMessage) -> Result<(), TransportError>;

    /// Peer description used in diagnostics.
    fn peer(&self) -> String {
        "peer".into()
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn exchange(&mut self, message: &OutboundMessage) -> Result<InboundMessage, TransportError> {
        (**self).exchange(message)
    }

    fn notify(&mut self, message: &OutboundMessage) -> Result<(), TransportError> {
        (**self).notify(message)
    }

    fn peer(&self) -> String {
        (**self).peer()
    }
}

// ---------------------------------------------------------------------------
// TcpTransport
// ---------------------------------------------------------------------------

/// Length-prefixed JSON over one TCP connection.
///
/// The connection is established on the first message, so a peer that is not
/// listening surfaces during the handshake rather than at construction.
#[derive(Debug)]
pub struct TcpTransport {
    stream: Option<TcpStream>,
    address: String,
    timeout: Option<Duration>,
    max_message_size: usize,
}

impl TcpTransport {
    /// Transport for `config.address()`. Nothing is dialed until the first
    /// message is sent.
    pub fn new(config: &ExchangeConfig) -> Self {
        Self {
            stream: None,
            address: config.address(),
            timeout: config.timeout(),
            max_message_size: config.max_message_size,
        }
    }

    /// Connect to `config.address()` right away, applying the configured
    /// timeout to the connect and to every read and write.
    pub fn connect(config: &ExchangeConfig) -> Result<Self, TransportError> {
        let mut transport = Self::new(config);
        transport.stream()?;
        Ok(transport)
    }

    /// Wrap an already connected stream.
    pub fn from_stream(stream: TcpStream, max_message_size: usize) -> Self {
        let address = stream
            .peer_addr()
            .map_or_else(|_| "unknown".into(), |a| a.to_string());
        Self {
            stream: Some(stream),
            address,
            timeout: None,
            max_message_size,
        }
    }

    pub const fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// The open stream, dialing the peer first if needed.
    fn stream(&mut self) -> Result<&mut TcpStream, TransportError> {
        if self.stream.is_none() {
            self.stream = Some(dial(&self.address, self.timeout)?);
        }
        self.stream.as_mut().ok_or(TransportError::Disconnected)
    }
}

fn dial(address: &str, timeout: Option<Duration>) -> Result<TcpStream, TransportError> {
    let mut last_err = None;
    for addr in address.to_socket_addrs().map_err(io_error)? {
        let attempt = match timeout {
            Some(t) => TcpStream::connect_timeout(&addr, t),
            None => TcpStream::connect(addr),
        };
        match attempt {
            Ok(stream) => {
                stream.set_read_timeout(timeout).map_err(io_error)?;
                stream.set_write_timeout(timeout).map_err(io_error)?;
                stream.set_nodelay(true).map_err(io_error)?;
                debug!(%addr, "connected");
                return Ok(stream);
            }
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err.map_or(TransportError::Disconnected, io_error))
}

impl Transport for TcpTransport {
    fn exchange(&mut self, message: &OutboundMessage) -> Result<InboundMessage, TransportError> {
        let max = self.max_message_size;
        let stream = self.stream()?;
        write_message(&mut *stream, message, max)?;
        read_message(stream, max)?.ok_or(TransportError::Disconnected)
    }

    fn notify(&mut self, message: &OutboundMessage) -> Result<(), TransportError> {
        let max = self.max_message_size;
        write_message(self.stream()?, message, max)
    }

    fn peer(&self) -> String {
        self.address.clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{InboundPayload, PeerCommand, STATUS_CLOSING};
    use std::net::TcpListener;

    const MAX: usize = 1024 * 1024;

    fn config_for(listener: &TcpListener) -> ExchangeConfig {
        ExchangeConfig {
            port: listener.local_addr().unwrap().port(),
            timeout_ms: 5_000,
            ..ExchangeConfig::default()
        }
    }

    #[test]
    fn exchange_round_trips_over_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let config = config_for(&listener);

        let handle = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let request: OutboundMessage = read_message(&mut stream, MAX).unwrap().unwrap();
            assert!(request.is_ok());
            let reply = InboundMessage::ok(InboundPayload {
                command: PeerCommand::Reset,
                ..InboundPayload::default()
            });
            write_message(&mut stream, &reply, MAX).unwrap();

            let closing: OutboundMessage = read_message(&mut stream, MAX).unwrap().unwrap();
            assert_eq!(closing.status, STATUS_CLOSING);
        });

        let mut transport = TcpTransport::connect(&config).unwrap();
        assert!(transport.peer().starts_with("127.0.0.1:"));
        let reply = transport
            .exchange(&OutboundMessage::ok(Default::default()))
            .unwrap();
        assert_eq!(reply.payload.unwrap().command, PeerCommand::Reset);
        transport.notify(&OutboundMessage::closing()).unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn peer_hangup_is_disconnected() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let config = config_for(&listener);

        let handle = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let _: Option<OutboundMessage> = read_message(&mut stream, MAX).unwrap();
        });

        let mut transport = TcpTransport::connect(&config).unwrap();
        let result = transport.exchange(&OutboundMessage::ok(Default::default()));
        handle.join().unwrap();
        assert!(matches!(result, Err(TransportError::Disconnected)));
    }

    #[test]
    fn connect_to_closed_port_fails() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let config = ExchangeConfig {
            port,
            timeout_ms: 1_000,
            ..ExchangeConfig::default()
        };
        assert!(TcpTransport::connect(&config).is_err());

        let mut lazy = TcpTransport::new(&config);
        assert!(!lazy.is_connected());
        assert!(lazy.exchange(&OutboundMessage::ok(Default::default())).is_err());
        assert!(!lazy.is_connected());
    }
}
