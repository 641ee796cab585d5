//! Peer-to-peer networking
//!
//! TCP transport, the tagged message envelope, the peer registry and the
//! node itself, which dispatches every inbound message from a single loop.

pub mod message;
pub mod peer;
pub mod peer_manager;
pub mod server;
pub mod transport;

pub use message::{
    default_rpc_decode, BlocksMessage, DecodedMessage, GetBlocksMessage, Message, MessageType,
    Payload, Rpc, RpcDecodeFn, StatusMessage,
};
pub use peer::Peer;
pub use peer_manager::PeerManager;
pub use server::{
    Event, RpcProcessor, Server, ServerHandle, ServerOptions, DEFAULT_BLOCK_TIME,
    DEFAULT_LISTEN_ADDR, DEFAULT_MAX_PEERS, MAX_BLOCKS_PER_REPLY, MAX_BLOCKS_REPLY_BYTES,
    NODE_VERSION,
};
pub use transport::{dial, TcpTransport};
