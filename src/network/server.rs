use crate::core::{Block, Blockchain, Transaction};
use crate::crypto::PrivateKey;
use crate::error::{BlockchainError, Result};
use crate::network::message::{
    default_rpc_decode, BlocksMessage, DecodedMessage, GetBlocksMessage, Message, MessageType,
    Payload, Rpc, RpcDecodeFn, StatusMessage,
};
use crate::network::transport::{dial, TcpTransport};
use crate::network::{Peer, PeerManager};
use crate::storage::{Storage, TxPool, DEFAULT_MEMPOOL_CAPACITY};
use crate::utils::{serialize, MAX_DECODE_SIZE};
use log::{debug, error, info, warn};
use std::net::SocketAddr;
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

pub const NODE_VERSION: u32 = 1;
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:3000";
pub const DEFAULT_BLOCK_TIME: Duration = Duration::from_millis(5000);
pub const DEFAULT_MAX_PEERS: usize = 32;
const EVENT_QUEUE_CAPACITY: usize = 1024;
/// Encoded size a single `Blocks` reply may grow to, well under what a
/// reader accepts in one frame.
pub const MAX_BLOCKS_REPLY_BYTES: usize = MAX_DECODE_SIZE / 2;
pub const MAX_BLOCKS_PER_REPLY: usize = 500;

/// Everything the dispatch loop reacts to. Accept, dial, read and timer
/// threads only ever talk to the server through this queue.
#[derive(Debug)]
pub enum Event {
    PeerConnected(Peer),
    PeerDisconnected(String),
    Rpc(Rpc),
    /// A transaction submitted by the local process rather than a peer.
    SubmitTx(Transaction),
    ProduceBlock,
    Shutdown,
}

/// Handles decoded messages. The server is its own processor unless
/// `ServerOptions::rpc_processor` replaces it.
pub trait RpcProcessor: Send {
    fn process_message(&mut self, msg: DecodedMessage) -> Result<()>;
}

pub struct ServerOptions {
    pub id: String,
    pub listen_addr: String,
    pub seed_nodes: Vec<String>,
    pub block_time: Duration,
    pub rpc_decode: RpcDecodeFn,
    pub rpc_processor: Option<Box<dyn RpcProcessor>>,
    /// Present means this node produces blocks.
    pub private_key: Option<PrivateKey>,
    pub mempool_capacity: usize,
    pub max_peers: usize,
    /// Block store; in-memory when `None`.
    pub storage: Option<Box<dyn Storage>>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        ServerOptions {
            id: String::from("node"),
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            seed_nodes: Vec::new(),
            block_time: DEFAULT_BLOCK_TIME,
            rpc_decode: default_rpc_decode,
            rpc_processor: None,
            private_key: None,
            mempool_capacity: DEFAULT_MEMPOOL_CAPACITY,
            max_peers: DEFAULT_MAX_PEERS,
            storage: None,
        }
    }
}

/// Cloneable view of a server that has been moved into `start`.
#[derive(Clone)]
pub struct ServerHandle {
    id: String,
    local_addr: SocketAddr,
    chain: Arc<Blockchain>,
    mempool: Arc<TxPool>,
    peers: Arc<PeerManager>,
    events: SyncSender<Event>,
}

impl ServerHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn chain(&self) -> &Blockchain {
        &self.chain
    }

    pub fn mempool_len(&self) -> usize {
        self.mempool.len()
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// Queue a locally created transaction for admission and gossip.
    pub fn submit_transaction(&self, tx: Transaction) -> Result<()> {
        self.send(Event::SubmitTx(tx))
    }

    /// Ask the dispatch loop to stop. Returns once the request is queued.
    pub fn shutdown(&self) -> Result<()> {
        self.send(Event::Shutdown)
    }

    fn send(&self, event: Event) -> Result<()> {
        self.events
            .send(event)
            .map_err(|_| BlockchainError::Network(format!("server {} is not running", self.id)))
    }
}

/// The node: owns the chain, the mempool and the peer set, and is the only
/// writer of any of them.
pub struct Server {
    id: String,
    seed_nodes: Vec<String>,
    block_time: Duration,
    rpc_decode: RpcDecodeFn,
    rpc_processor: Option<Box<dyn RpcProcessor>>,
    private_key: Option<PrivateKey>,
    transport: Option<TcpTransport>,
    local_addr: SocketAddr,
    chain: Arc<Blockchain>,
    mempool: Arc<TxPool>,
    peers: Arc<PeerManager>,
    events_tx: SyncSender<Event>,
    events_rx: Receiver<Event>,
}

impl Server {
    /// Build a node on a fresh chain holding only the genesis block.
    pub fn new(mut options: ServerOptions) -> Result<Server> {
        let chain = match options.storage.take() {
            Some(store) => Blockchain::with_storage(Block::genesis(), store)?,
            None => Blockchain::new(Block::genesis())?,
        };
        Self::with_chain(options, chain)
    }

    /// Build a node around an existing chain. The listener is bound here so
    /// the local address is known before `start`.
    pub fn with_chain(options: ServerOptions, chain: Blockchain) -> Result<Server> {
        if options.private_key.is_some() && options.block_time.is_zero() {
            return Err(BlockchainError::Config(
                "block time must be greater than zero".to_string(),
            ));
        }
        let transport = TcpTransport::bind(&options.listen_addr)?;
        let local_addr = transport.local_addr();
        let (events_tx, events_rx) = sync_channel(EVENT_QUEUE_CAPACITY);

        Ok(Server {
            id: options.id,
            seed_nodes: options.seed_nodes,
            block_time: options.block_time,
            rpc_decode: options.rpc_decode,
            rpc_processor: options.rpc_processor,
            private_key: options.private_key,
            transport: Some(transport),
            local_addr,
            chain: Arc::new(chain),
            mempool: Arc::new(TxPool::new(options.mempool_capacity)),
            peers: Arc::new(PeerManager::new(options.max_peers)),
            events_tx,
            events_rx,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_producer(&self) -> bool {
        self.private_key.is_some()
    }

    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            id: self.id.clone(),
            local_addr: self.local_addr,
            chain: Arc::clone(&self.chain),
            mempool: Arc::clone(&self.mempool),
            peers: Arc::clone(&self.peers),
            events: self.events_tx.clone(),
        }
    }

    /// Start accepting, dial the seeds, start producing if we hold a key,
    /// then run the dispatch loop until shutdown. Blocks the calling thread.
    pub fn start(mut self) -> Result<()> {
        let transport = self.transport.take().ok_or_else(|| {
            BlockchainError::Network(format!("server {} was already started", self.id))
        })?;
        transport.start(self.events_tx.clone());

        for seed in &self.seed_nodes {
            info!("Dialing seed node {seed}");
            dial(seed.clone(), self.events_tx.clone());
        }

        if self.is_producer() {
            self.spawn_block_ticker();
        }

        info!(
            "Node {} running on {} at height {}",
            self.id,
            self.local_addr,
            self.chain.height()
        );
        self.dispatch_loop();

        self.peers.close_all();
        info!("Node {} stopped", self.id);
        Ok(())
    }

    fn spawn_block_ticker(&self) {
        let events = self.events_tx.clone();
        let interval = self.block_time;
        info!("Producing a block every {interval:?}");
        thread::spawn(move || loop {
            thread::sleep(interval);
            if events.send(Event::ProduceBlock).is_err() {
                break;
            }
        });
    }

    fn dispatch_loop(&mut self) {
        // The server holds a sender itself, so `recv` only fails if that
        // invariant is broken.
        while let Ok(event) = self.events_rx.recv() {
            match event {
                Event::PeerConnected(peer) => self.on_peer_connected(peer),
                Event::PeerDisconnected(id) => {
                    self.peers.remove(&id);
                }
                Event::Rpc(rpc) => self.on_rpc(rpc),
                Event::SubmitTx(tx) => {
                    if let Err(e) = self.process_transaction(None, tx) {
                        warn!("Rejected local transaction: {e}");
                    }
                }
                Event::ProduceBlock => {
                    if let Err(e) = self.create_new_block() {
                        error!("Failed to produce block: {e}");
                    }
                }
                Event::Shutdown => {
                    info!("Shutdown requested");
                    break;
                }
            }
        }
    }

    fn on_peer_connected(&self, peer: Peer) {
        let peer = Arc::new(peer);
        if let Err(e) = self.peers.add(Arc::clone(&peer)) {
            warn!("{e}");
            peer.close();
            return;
        }

        let reader = Arc::clone(&peer);
        let events = self.events_tx.clone();
        thread::spawn(move || reader.read_loop(events));

        if let Err(e) = self.send_to(&peer.id(), &Payload::GetStatus) {
            warn!("Failed to request status from {}: {e}", peer.id());
        }
    }

    fn on_rpc(&mut self, rpc: Rpc) {
        let msg = match (self.rpc_decode)(rpc) {
            Ok(msg) => msg,
            Err(e) => {
                warn!("Dropping undecodable message: {e}");
                return;
            }
        };
        let from = msg.from.clone();
        let result = match self.rpc_processor.as_mut() {
            Some(processor) => processor.process_message(msg),
            None => self.process_message(msg),
        };
        if let Err(e) = result {
            warn!("Failed to process message from {from}: {e}");
        }
    }

    fn send_to(&self, peer_id: &str, payload: &Payload) -> Result<()> {
        let peer = self.peers.get(peer_id)?;
        let bytes = payload.to_bytes()?;
        if let Err(e) = peer.send(&bytes) {
            self.peers.remove(peer_id);
            return Err(e);
        }
        Ok(())
    }

    /// Admit a transaction and gossip it on. Transactions we already hold,
    /// in the pool or on the chain, are dropped quietly so gossip dies out.
    fn process_transaction(&self, from: Option<&str>, tx: Transaction) -> Result<()> {
        let hash = tx.hash();
        if self.mempool.contains(&hash) || self.chain.has_transaction(&hash) {
            debug!("Ignoring known transaction {hash}");
            return Ok(());
        }

        let bytes = Message::new(MessageType::Tx, serialize(&tx)?).to_bytes()?;
        if self.mempool.add(tx)? {
            info!(
                "Accepted transaction {hash} ({} pending)",
                self.mempool.len()
            );
            self.peers.broadcast(&bytes, from);
        }
        Ok(())
    }

    fn process_block(&self, from: &str, block: Block) -> Result<()> {
        let hash = block.hash();
        let bytes = Message::new(MessageType::Block, serialize(&block)?).to_bytes()?;

        match self.chain.add_block(block) {
            Ok(()) => {}
            Err(e) if e.is_already_known() => {
                debug!("{e}");
                return Ok(());
            }
            Err(BlockchainError::HeightMismatch { expected, got }) if got > expected => {
                info!("Block {got} from {from} is ahead of us, requesting the missing range");
                return self.send_to(
                    from,
                    &Payload::GetBlocks(GetBlocksMessage {
                        from: self.chain.height(),
                        to: 0,
                    }),
                );
            }
            Err(e) => return Err(e),
        }

        let block = self.chain.get_block_by_hash(&hash)?;
        self.mempool.prune(block.transactions());
        self.peers.broadcast(&bytes, Some(from));
        Ok(())
    }

    fn process_get_status(&self, from: &str) -> Result<()> {
        let status = StatusMessage {
            id: self.id.clone(),
            version: NODE_VERSION,
            current_height: self.chain.height(),
        };
        self.send_to(from, &Payload::Status(status))
    }

    fn process_status(&self, from: &str, status: StatusMessage) -> Result<()> {
        let height = self.chain.height();
        debug!(
            "Status from {from}: node {} v{} at height {} (ours {height})",
            status.id, status.version, status.current_height
        );
        if status.current_height <= height {
            return Ok(());
        }

        info!(
            "Peer {} is at height {}, syncing from {height}",
            status.id, status.current_height
        );
        self.send_to(
            from,
            &Payload::GetBlocks(GetBlocksMessage {
                from: height,
                to: 0,
            }),
        )
    }

    /// Replies with at most one frame's worth of the requested range. The
    /// requester asks again from its new height until it has caught up.
    fn process_get_blocks(&self, from: &str, request: GetBlocksMessage) -> Result<()> {
        let range = self.chain.blocks_range(request.from, request.to);
        let blocks = take_blocks_within(&range, MAX_BLOCKS_REPLY_BYTES, MAX_BLOCKS_PER_REPLY)?;
        debug!(
            "Sending {} of {} requested blocks from height {} to {from}",
            blocks.len(),
            range.len(),
            request.from
        );
        self.send_to(from, &Payload::Blocks(BlocksMessage { blocks }))
    }

    /// Append in order. Blocks we already have are skipped; the first other
    /// failure stops the batch. A batch that moved us forward is followed by
    /// a request for the next one.
    fn process_blocks(&self, from: &str, msg: BlocksMessage) -> Result<()> {
        let mut added = 0;
        for block in msg.blocks {
            let hash = block.hash();
            match self.chain.add_block(block) {
                Ok(()) => {
                    added += 1;
                    let block = self.chain.get_block_by_hash(&hash)?;
                    self.mempool.prune(block.transactions());
                }
                Err(e) if e.is_already_known() => continue,
                Err(e) => {
                    if added > 0 {
                        info!("Synced {added} blocks from {from} before failure");
                    }
                    return Err(e);
                }
            }
        }
        if added == 0 {
            return Ok(());
        }
        let height = self.chain.height();
        info!("Synced {added} blocks from {from}, height now {height}");
        self.send_to(
            from,
            &Payload::GetBlocks(GetBlocksMessage {
                from: height,
                to: 0,
            }),
        )
    }

    fn create_new_block(&self) -> Result<()> {
        let key = self
            .private_key
            .as_ref()
            .ok_or_else(|| BlockchainError::Config("node has no producer key".to_string()))?;

        let head = self.chain.get_header(self.chain.height())?;
        let txs = self.mempool.pending();
        let mut block = Block::from_prev_header(&head, txs)?;
        block.sign(key)?;

        let bytes = Message::new(MessageType::Block, serialize(&block)?).to_bytes()?;
        let (hash, height, count) = (block.hash(), block.height(), block.transactions().len());
        self.chain.add_block(block)?;
        self.mempool.clear_pending();

        info!("Produced block {hash} at height {height} with {count} transactions");
        self.peers.broadcast(&bytes, None);
        Ok(())
    }
}

/// Leading blocks of `range` whose encodings fit in `max_bytes`, capped at
/// `max_blocks`. The first block is always taken so a reply is never empty
/// while the range is not.
fn take_blocks_within(
    range: &[Arc<Block>],
    max_bytes: usize,
    max_blocks: usize,
) -> Result<Vec<Block>> {
    let mut blocks = Vec::new();
    let mut size = 0;
    for block in range.iter().take(max_blocks) {
        let len = serialize(&**block)?.len();
        if !blocks.is_empty() && size + len > max_bytes {
            break;
        }
        size += len;
        blocks.push(Block::clone(block));
    }
    Ok(blocks)
}

impl RpcProcessor for Server {
    fn process_message(&mut self, msg: DecodedMessage) -> Result<()> {
        let DecodedMessage { from, data } = msg;
        match data {
            Payload::Tx(tx) => self.process_transaction(Some(&from), tx),
            Payload::Block(block) => self.process_block(&from, block),
            Payload::GetStatus => self.process_get_status(&from),
            Payload::Status(status) => self.process_status(&from, status),
            Payload::GetBlocks(request) => self.process_get_blocks(&from, request),
            Payload::Blocks(blocks) => self.process_blocks(&from, blocks),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use std::io::BufReader;
    use std::net::{TcpListener, TcpStream};

    fn options() -> ServerOptions {
        ServerOptions {
            id: "test".to_string(),
            listen_addr: "127.0.0.1:0".to_string(),
            ..ServerOptions::default()
        }
    }

    fn signed_tx(key: &PrivateKey, data: &[u8]) -> Transaction {
        let mut tx = Transaction::new(data.to_vec());
        tx.sign(key).unwrap();
        tx
    }

    fn msg(data: Payload) -> DecodedMessage {
        DecodedMessage {
            from: "127.0.0.1:1".to_string(),
            data,
        }
    }

    /// Registers a live peer on `server`; the returned stream is its far end.
    fn connect_peer(server: &Server) -> (String, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let stream = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (remote, _) = listener.accept().unwrap();
        let peer = Peer::new(stream, true).unwrap();
        let id = peer.id();
        server.peers.add(Arc::new(peer)).unwrap();
        (id, remote)
    }

    fn read_payload(remote: TcpStream) -> Payload {
        let message = Message::read_from(&mut BufReader::new(remote)).unwrap();
        let rpc = Rpc {
            from: String::new(),
            message,
        };
        default_rpc_decode(rpc).unwrap().data
    }

    #[test]
    fn test_new_server_starts_at_genesis() {
        let server = Server::new(options()).unwrap();
        assert!(!server.is_producer());
        assert_eq!(server.chain.height(), 0);
        assert_ne!(server.local_addr().port(), 0);
    }

    #[test]
    fn test_zero_block_time_is_rejected_for_producers() {
        let opts = ServerOptions {
            private_key: Some(PrivateKey::generate().unwrap()),
            block_time: Duration::ZERO,
            ..options()
        };
        assert!(matches!(
            Server::new(opts),
            Err(BlockchainError::Config(_))
        ));
    }

    #[test]
    fn test_server_uses_given_storage() {
        let store = Arc::new(MemoryStore::new());
        let opts = ServerOptions {
            storage: Some(Box::new(Arc::clone(&store))),
            ..options()
        };
        let _server = Server::new(opts).unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_create_new_block_drains_mempool() {
        let key = PrivateKey::generate().unwrap();
        let opts = ServerOptions {
            private_key: Some(PrivateKey::from_hex(&key.to_hex()).unwrap()),
            ..options()
        };
        let mut server = Server::new(opts).unwrap();

        let a = signed_tx(&key, b"a");
        let b = signed_tx(&key, b"b");
        server.process_message(msg(Payload::Tx(a.clone()))).unwrap();
        server.process_message(msg(Payload::Tx(b.clone()))).unwrap();
        assert_eq!(server.mempool.len(), 2);

        server.create_new_block().unwrap();
        assert_eq!(server.chain.height(), 1);
        assert!(server.mempool.is_empty());

        let block = server.chain.get_block(1).unwrap();
        assert_eq!(block.transactions(), &[a.clone(), b]);
        assert_eq!(block.validator(), Some(&key.public_key()));

        // already on chain, so not readmitted
        server.process_message(msg(Payload::Tx(a))).unwrap();
        assert!(server.mempool.is_empty());
    }

    #[test]
    fn test_follower_cannot_produce() {
        let server = Server::new(options()).unwrap();
        assert!(matches!(
            server.create_new_block(),
            Err(BlockchainError::Config(_))
        ));
    }

    #[test]
    fn test_block_message_appends_and_prunes() {
        let key = PrivateKey::generate().unwrap();
        let mut server = Server::new(options()).unwrap();
        let tx = signed_tx(&key, b"included");
        server.process_message(msg(Payload::Tx(tx.clone()))).unwrap();

        let mut block =
            Block::from_prev_header(Block::genesis().header(), vec![tx.clone()]).unwrap();
        block.sign(&key).unwrap();

        server
            .process_message(msg(Payload::Block(block.clone())))
            .unwrap();
        assert_eq!(server.chain.height(), 1);
        assert!(!server.mempool.contains(&tx.hash()));

        // a second copy is not an error
        server.process_message(msg(Payload::Block(block))).unwrap();
        assert_eq!(server.chain.height(), 1);
    }

    #[test]
    fn test_blocks_message_skips_known_and_stops_on_failure() {
        let key = PrivateKey::generate().unwrap();
        let mut server = Server::new(options()).unwrap();

        let mut blocks = vec![Block::genesis()];
        for _ in 0..3 {
            let head = blocks[blocks.len() - 1].header().clone();
            let mut block = Block::from_prev_header(&head, vec![]).unwrap();
            block.sign(&key).unwrap();
            blocks.push(block);
        }
        // unsigned block at the end fails verification
        let tail = Block::from_prev_header(blocks[3].header(), vec![]).unwrap();
        let mut batch = blocks.clone();
        batch.push(tail);

        let err = server
            .process_message(msg(Payload::Blocks(BlocksMessage { blocks: batch })))
            .unwrap_err();
        assert!(matches!(err, BlockchainError::InvalidSignature(_)));
        assert_eq!(server.chain.height(), 3);
        assert_eq!(server.chain.get_block(3).unwrap().hash(), blocks[3].hash());
    }

    #[test]
    fn test_take_blocks_within_budget() {
        let key = PrivateKey::generate().unwrap();
        let range: Vec<Arc<Block>> = (0..5u8)
            .map(|i| {
                let tx = signed_tx(&key, &[i; 1000]);
                let mut block =
                    Block::from_prev_header(Block::genesis().header(), vec![tx]).unwrap();
                block.sign(&key).unwrap();
                Arc::new(block)
            })
            .collect();
        let sizes: Vec<usize> = range
            .iter()
            .map(|b| serialize(&**b).unwrap().len())
            .collect();
        let budget = sizes[0] + sizes[1] + sizes[2];

        assert_eq!(take_blocks_within(&range, budget, 100).unwrap().len(), 3);
        assert_eq!(take_blocks_within(&range, budget - 1, 100).unwrap().len(), 2);
        assert_eq!(take_blocks_within(&range, usize::MAX, 2).unwrap().len(), 2);
        // a single oversized block still goes out on its own
        assert_eq!(take_blocks_within(&range, 1, 100).unwrap().len(), 1);
        assert!(take_blocks_within(&[], 1, 100).unwrap().is_empty());

        let taken = take_blocks_within(&range, usize::MAX, 100).unwrap();
        assert_eq!(taken.len(), 5);
        assert_eq!(taken[4].hash(), range[4].hash());
    }

    #[test]
    fn test_get_blocks_reply_fits_in_one_frame() {
        let key = PrivateKey::generate().unwrap();
        let chain = Blockchain::new(Block::genesis()).unwrap();
        // about 40 MiB in total, more than a reader takes in one frame
        for i in 0..40u8 {
            let tx = signed_tx(&key, &vec![i; 1 << 20]);
            let head = chain.get_header(chain.height()).unwrap();
            let mut block = Block::from_prev_header(&head, vec![tx]).unwrap();
            block.sign(&key).unwrap();
            chain.add_block(block).unwrap();
        }
        let mut server = Server::with_chain(options(), chain).unwrap();
        let (peer_id, remote) = connect_peer(&server);
        let reader = thread::spawn(move || read_payload(remote));

        server
            .process_message(DecodedMessage {
                from: peer_id,
                data: Payload::GetBlocks(GetBlocksMessage { from: 0, to: 0 }),
            })
            .unwrap();

        let blocks = match reader.join().unwrap() {
            Payload::Blocks(msg) => msg.blocks,
            other => panic!("unexpected reply {:?}", other.message_type()),
        };
        assert!(!blocks.is_empty());
        assert!(blocks.len() < 41);
        for (height, block) in blocks.iter().enumerate() {
            assert_eq!(block.height(), height as u32);
        }
    }

    #[test]
    fn test_blocks_batch_requests_the_next_range() {
        let key = PrivateKey::generate().unwrap();
        let mut server = Server::new(options()).unwrap();
        let (peer_id, remote) = connect_peer(&server);

        let mut blocks = Vec::new();
        let mut head = Block::genesis().header().clone();
        for _ in 0..2 {
            let mut block = Block::from_prev_header(&head, vec![]).unwrap();
            block.sign(&key).unwrap();
            head = block.header().clone();
            blocks.push(block);
        }

        server
            .process_message(DecodedMessage {
                from: peer_id,
                data: Payload::Blocks(BlocksMessage { blocks }),
            })
            .unwrap();
        assert_eq!(server.chain.height(), 2);
        assert_eq!(
            read_payload(remote),
            Payload::GetBlocks(GetBlocksMessage { from: 2, to: 0 })
        );
    }

    #[test]
    fn test_bad_envelopes_do_not_stop_later_messages() {
        let key = PrivateKey::generate().unwrap();
        let mut server = Server::new(options()).unwrap();

        let mut unknown_tag: &[u8] = &[0x7f, 0x00];
        let bad = [
            Message::read_from(&mut unknown_tag).unwrap(),
            Message::new(MessageType::Block, vec![0xff, 0x01]),
            Message::new(MessageType::Tx, Vec::new()),
        ];
        for message in bad {
            server.on_rpc(Rpc {
                from: "127.0.0.1:1".to_string(),
                message,
            });
        }
        assert_eq!(server.chain.height(), 0);
        assert!(server.mempool.is_empty());

        let tx = signed_tx(&key, b"still admitted");
        server.on_rpc(Rpc {
            from: "127.0.0.1:1".to_string(),
            message: Payload::Tx(tx.clone()).to_message().unwrap(),
        });
        assert!(server.mempool.contains(&tx.hash()));
    }

    struct Counting(Arc<std::sync::atomic::AtomicUsize>);

    impl RpcProcessor for Counting {
        fn process_message(&mut self, _msg: DecodedMessage) -> Result<()> {
            self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_custom_processor_replaces_builtin_handlers() {
        let count = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let key = PrivateKey::generate().unwrap();
        let opts = ServerOptions {
            rpc_processor: Some(Box::new(Counting(Arc::clone(&count)))),
            ..options()
        };
        let mut server = Server::new(opts).unwrap();
        let tx = signed_tx(&key, b"routed elsewhere");

        server.on_rpc(Rpc {
            from: "127.0.0.1:1".to_string(),
            message: Payload::Tx(tx).to_message().unwrap(),
        });
        assert_eq!(count.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert!(server.mempool.is_empty());
    }

    #[test]
    fn test_handle_shutdown_stops_dispatch_loop() {
        let server = Server::new(options()).unwrap();
        let handle = server.handle();
        let runner = thread::spawn(move || server.start());
        handle.shutdown().unwrap();
        runner.join().unwrap().unwrap();
    }
}
