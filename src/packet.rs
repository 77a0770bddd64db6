use crate::checksum::{Checksum, CHECKSUM_LEN};
use crate::error::PacketError;
use crate::seq_number::SeqNumber;
use bytes::{BufMut, Bytes, BytesMut};

/// ```text
/// 0     1                               9 (BYTE)
/// +-----+-------------------------------+---------------
/// | seq |  checksum (8 ASCII digits)    |  payload ...
/// +-----+-------------------------------+---------------
/// ```
pub const RDT_HEADER_SIZE: usize = 1 + CHECKSUM_LEN;

/// Payload of the last packet of a session.
pub const TERMINATION_MARKER: &[u8] = b"DONE";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RdtPacket {
    pub sequence: SeqNumber,
    pub checksum: Checksum,
    pub payload: Bytes,
}

impl RdtPacket {
    /// Data packet whose checksum is computed from `payload`.
    pub fn new(sequence: SeqNumber, payload: impl Into<Bytes>) -> Self {
        let payload = payload.into();
        Self {
            sequence,
            checksum: Checksum::compute(&payload),
            payload,
        }
    }

    /// Acknowledgement for the packet numbered `sequence`.
    pub fn ack(sequence: SeqNumber) -> Self {
        Self::new(sequence, format!("ACK-{sequence}"))
    }

    pub fn termination(sequence: SeqNumber) -> Self {
        Self::new(sequence, Bytes::from_static(TERMINATION_MARKER))
    }

    pub fn is_termination(&self) -> bool {
        self.payload.as_ref() == TERMINATION_MARKER
    }

    /// Whether the carried checksum matches the payload.
    pub fn is_intact(&self) -> bool {
        self.checksum.verify(&self.payload)
    }

    pub fn serialize(&self) -> Bytes {
        let mut buffer = BytesMut::with_capacity(RDT_HEADER_SIZE + self.payload.len());
        buffer.put_u8(self.sequence.number());
        buffer.put_slice(self.checksum.as_bytes());
        buffer.put_slice(&self.payload);
        buffer.freeze()
    }

    /// Splits a datagram into its fields. The checksum is not verified here.
    pub fn deserialize(raw: &[u8]) -> Result<Self, PacketError> {
        if raw.len() < RDT_HEADER_SIZE {
            return Err(PacketError::Malformed {
                len: raw.len(),
                min: RDT_HEADER_SIZE,
            });
        }
        let mut checksum = [0_u8; CHECKSUM_LEN];
        checksum.copy_from_slice(&raw[1..RDT_HEADER_SIZE]);
        Ok(Self {
            sequence: raw[0].into(),
            checksum: checksum.into(),
            payload: Bytes::copy_from_slice(&raw[RDT_HEADER_SIZE..]),
        })
    }
}
