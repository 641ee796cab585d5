use crate::core::{Block, Transaction};
use crate::error::{BlockchainError, Result};
use crate::utils::{deserialize, read_from, serialize};
use log::debug;
use std::io::Read;

/// Wire tag of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    Tx = 0x1,
    Block = 0x2,
    GetBlocks = 0x3,
    Status = 0x4,
    GetStatus = 0x5,
    Blocks = 0x6,
}

impl TryFrom<u8> for MessageType {
    type Error = BlockchainError;

    fn try_from(tag: u8) -> Result<Self> {
        match tag {
            0x1 => Ok(MessageType::Tx),
            0x2 => Ok(MessageType::Block),
            0x3 => Ok(MessageType::GetBlocks),
            0x4 => Ok(MessageType::Status),
            0x5 => Ok(MessageType::GetStatus),
            0x6 => Ok(MessageType::Blocks),
            other => Err(BlockchainError::UnknownMessageType(other)),
        }
    }
}

/// Envelope as it travels on a connection: one tag byte followed by the
/// length-delimited payload encoding. Consecutive envelopes are simply
/// concatenated on the stream.
#[derive(Debug, Clone, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct Message {
    header: u8,
    data: Vec<u8>,
}

impl Message {
    pub fn new(header: MessageType, data: Vec<u8>) -> Message {
        Message {
            header: header as u8,
            data,
        }
    }

    pub fn header(&self) -> u8 {
        self.header
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serialize(self)
    }

    /// Read the next envelope off a stream. Errors here mean the stream can
    /// no longer be delimited.
    pub fn read_from<R: Read>(
        reader: &mut R,
    ) -> std::result::Result<Message, bincode::error::DecodeError> {
        read_from(reader)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct StatusMessage {
    /// id of the announcing node
    pub id: String,
    pub version: u32,
    pub current_height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct GetBlocksMessage {
    pub from: u32,
    /// 0 means "up to the tip at response time".
    pub to: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct BlocksMessage {
    pub blocks: Vec<Block>,
}

/// A decoded payload, resolved from the wire tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Tx(Transaction),
    Block(Block),
    GetBlocks(GetBlocksMessage),
    Status(StatusMessage),
    GetStatus,
    Blocks(BlocksMessage),
}

impl Payload {
    pub fn message_type(&self) -> MessageType {
        match self {
            Payload::Tx(_) => MessageType::Tx,
            Payload::Block(_) => MessageType::Block,
            Payload::GetBlocks(_) => MessageType::GetBlocks,
            Payload::Status(_) => MessageType::Status,
            Payload::GetStatus => MessageType::GetStatus,
            Payload::Blocks(_) => MessageType::Blocks,
        }
    }

    /// Encode into a full envelope.
    pub fn to_message(&self) -> Result<Message> {
        let data = match self {
            Payload::Tx(tx) => serialize(tx)?,
            Payload::Block(block) => serialize(block)?,
            Payload::GetBlocks(msg) => serialize(msg)?,
            Payload::Status(msg) => serialize(msg)?,
            Payload::GetStatus => Vec::new(),
            Payload::Blocks(msg) => serialize(msg)?,
        };
        Ok(Message::new(self.message_type(), data))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.to_message()?.to_bytes()
    }
}

/// One envelope as received from a peer, not yet decoded.
#[derive(Debug, Clone)]
pub struct Rpc {
    pub from: String,
    pub message: Message,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedMessage {
    pub from: String,
    pub data: Payload,
}

pub type RpcDecodeFn = fn(Rpc) -> Result<DecodedMessage>;

/// Turns an envelope into a typed payload by its tag.
pub fn default_rpc_decode(rpc: Rpc) -> Result<DecodedMessage> {
    let Rpc { from, message } = rpc;
    let message_type = MessageType::try_from(message.header)?;
    debug!("Received {message_type:?} message from {from}");

    let bytes = message.data.as_slice();
    let data = match message_type {
        MessageType::Tx => Payload::Tx(deserialize(bytes)?),
        MessageType::Block => Payload::Block(deserialize(bytes)?),
        MessageType::GetBlocks => Payload::GetBlocks(deserialize(bytes)?),
        MessageType::Status => Payload::Status(deserialize(bytes)?),
        MessageType::GetStatus => Payload::GetStatus,
        MessageType::Blocks => Payload::Blocks(deserialize(bytes)?),
    };
    Ok(DecodedMessage { from, data })
}
