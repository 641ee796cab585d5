use crate::error::{BlockchainError, Result};
use crate::network::server::Event;
use crate::network::Peer;
use log::{error, info, warn};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::mpsc::SyncSender;
use std::thread;
use std::time::Duration;

const TCP_CONNECT_TIMEOUT: u64 = 5000;

/// Listening socket plus outbound dialing. New connections are handed to
/// the server as `Event::PeerConnected`.
pub struct TcpTransport {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl TcpTransport {
    pub fn bind(addr: &str) -> Result<TcpTransport> {
        let listener = TcpListener::bind(addr)
            .map_err(|e| BlockchainError::Network(format!("Failed to bind to {addr}: {e}")))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| BlockchainError::Network(format!("Failed to read local address: {e}")))?;
        Ok(TcpTransport {
            listener,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Run the accept loop on its own thread.
    pub fn start(self, events: SyncSender<Event>) {
        info!("Accepting TCP connections on {}", self.local_addr);
        thread::spawn(move || {
            for stream in self.listener.incoming() {
                let stream = match stream {
                    Ok(stream) => stream,
                    Err(e) => {
                        error!("Error accepting connection: {e}");
                        continue;
                    }
                };
                match Peer::new(stream, false) {
                    Ok(peer) => {
                        if events.send(Event::PeerConnected(peer)).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("Failed to set up inbound peer: {e}"),
                }
            }
            info!("Accept loop on {} stopped", self.local_addr);
        });
    }
}

/// Dial `addr` in the background. Failures are logged and the attempt is
/// abandoned; there is no retry.
pub fn dial(addr: String, events: SyncSender<Event>) {
    thread::spawn(move || match connect(&addr) {
        Ok(peer) => {
            let _ = events.send(Event::PeerConnected(peer));
        }
        Err(e) => error!("Could not connect to {addr}: {e}"),
    });
}

fn connect(addr: &str) -> Result<Peer> {
    let socket_addr = addr
        .to_socket_addrs()
        .map_err(|e| BlockchainError::Network(format!("Invalid address {addr}: {e}")))?
        .next()
        .ok_or_else(|| BlockchainError::Network(format!("Address {addr} did not resolve")))?;

    let stream =
        TcpStream::connect_timeout(&socket_addr, Duration::from_millis(TCP_CONNECT_TIMEOUT))
            .map_err(|e| BlockchainError::Network(format!("Failed to connect to {addr}: {e}")))?;
    Peer::new(stream, true)
}
