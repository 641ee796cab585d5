use crate::error::{BlockchainError, Result};
use crate::network::message::{Message, Rpc};
use crate::network::server::Event;
use bincode::error::DecodeError;
use log::{debug, info, warn};
use std::io::{BufReader, ErrorKind, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::mpsc::SyncSender;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

pub const TCP_WRITE_TIMEOUT: u64 = 5000;

/// One live connection. Writes are serialised through a mutex so each
/// `send` puts exactly one whole message on the wire.
#[derive(Debug)]
pub struct Peer {
    addr: SocketAddr,
    outgoing: bool,
    writer: Mutex<TcpStream>,
}

impl Peer {
    pub fn new(stream: TcpStream, outgoing: bool) -> Result<Peer> {
        let addr = stream
            .peer_addr()
            .map_err(|e| BlockchainError::Network(format!("Failed to get peer address: {e}")))?;
        stream
            .set_write_timeout(Some(Duration::from_millis(TCP_WRITE_TIMEOUT)))
            .map_err(|e| BlockchainError::Network(format!("Failed to set write timeout: {e}")))?;
        if let Err(e) = stream.set_nodelay(true) {
            warn!("Failed to disable Nagle for {addr}: {e}");
        }

        Ok(Peer {
            addr,
            outgoing,
            writer: Mutex::new(stream),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Registry key and the `from` of every message read from this peer.
    pub fn id(&self) -> String {
        self.addr.to_string()
    }

    /// Whether we dialed this peer.
    pub fn is_outgoing(&self) -> bool {
        self.outgoing
    }

    pub fn send(&self, payload: &[u8]) -> Result<()> {
        let mut stream = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        stream
            .write_all(payload)
            .and_then(|_| stream.flush())
            .map_err(|e| BlockchainError::Network(format!("Failed to send to {}: {e}", self.addr)))
    }

    pub fn close(&self) {
        let stream = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = stream.shutdown(Shutdown::Both);
    }

    /// Decode envelopes off the connection until it fails, forwarding each
    /// to the server. Ends with a disconnect event.
    pub fn read_loop(&self, events: SyncSender<Event>) {
        let stream = {
            let writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
            writer.try_clone()
        };
        let stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                warn!("Failed to clone stream for {}: {e}", self.addr);
                let _ = events.send(Event::PeerDisconnected(self.id()));
                return;
            }
        };

        let mut reader = BufReader::new(stream);
        loop {
            match Message::read_from(&mut reader) {
                Ok(message) => {
                    let rpc = Rpc {
                        from: self.id(),
                        message,
                    };
                    if events.send(Event::Rpc(rpc)).is_err() {
                        debug!("Server gone, stopping reader for {}", self.addr);
                        return;
                    }
                }
                Err(DecodeError::Io { inner, .. })
                    if matches!(
                        inner.kind(),
                        ErrorKind::UnexpectedEof | ErrorKind::ConnectionReset
                    ) =>
                {
                    info!("Peer {} closed the connection", self.addr);
                    break;
                }
                Err(e) => {
                    warn!("Dropping peer {}: failed to read message: {e}", self.addr);
                    break;
                }
            }
        }
        let _ = events.send(Event::PeerDisconnected(self.id()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_new_peer_configures_stream() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let stream = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let _accepted = listener.accept().unwrap();

        let peer = Peer::new(stream, true).unwrap();
        assert_eq!(peer.addr(), listener.local_addr().unwrap());
        assert!(peer.is_outgoing());

        let writer = peer.writer.lock().unwrap();
        assert!(writer.nodelay().unwrap());
        assert_eq!(
            writer.write_timeout().unwrap(),
            Some(Duration::from_millis(TCP_WRITE_TIMEOUT))
        );
    }
}
