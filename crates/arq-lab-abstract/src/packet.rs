use serde::{Deserialize, Serialize};

use crate::error::PacketError;

/// Largest payload (in bytes) a message or packet may carry.
pub const MAX_DATA_SIZE: usize = 20;

/// A packet as it travels through the channel.
///
/// Packets are compared field by field: the channel hands the peer a copy that
/// may have been altered in flight, so there is no notion of identity beyond the
/// values themselves.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Packet {
    /// Sequence number (the alternating bit for Stop-and-Wait).
    pub seq_num: i32,
    /// Acknowledgment number, `0` on data packets.
    pub ack_num: i32,
    /// Integrity code stamped by the sender of this packet.
    pub checksum: i32,
    pub payload: String,
}

impl Packet {
    pub fn new(seq_num: i32, ack_num: i32, checksum: i32, payload: impl Into<String>) -> Self {
        Self {
            seq_num,
            ack_num,
            checksum,
            payload: payload.into(),
        }
    }

    /// Create a pure acknowledgment (empty payload, sequence field zero).
    pub fn new_ack(ack_num: i32, checksum: i32) -> Self {
        Self::new(0, ack_num, checksum, String::new())
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Application-layer datum handed down to a sender and up from a receiver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Message {
    data: String,
}

impl Message {
    /// Wrap `data`, rejecting anything longer than [`MAX_DATA_SIZE`] bytes.
    pub fn new(data: impl Into<String>) -> Result<Self, PacketError> {
        let data = data.into();
        if data.len() > MAX_DATA_SIZE {
            return Err(PacketError::PayloadTooLarge {
                len: data.len(),
                max: MAX_DATA_SIZE,
            });
        }
        Ok(Self { data })
    }

    pub fn data(&self) -> &str {
        &self.data
    }

    pub fn into_data(self) -> String {
        self.data
    }
}

impl TryFrom<String> for Message {
    type Error = PacketError;

    fn try_from(data: String) -> Result<Self, Self::Error> {
        Self::new(data)
    }
}

impl From<Message> for String {
    fn from(message: Message) -> Self {
        message.data
    }
}
