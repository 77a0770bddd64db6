use crate::seq_number::SeqNumber;
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RdtError>;

#[derive(Debug, Error)]
pub enum RdtError {
    #[error("no acknowledgement for packet {sequence} after {attempts} attempts")]
    RetryBudgetExhausted { sequence: SeqNumber, attempts: u32 },
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(&'static str),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PacketError {
    #[error("malformed packet: {len} bytes is shorter than the {min} byte header")]
    Malformed { len: usize, min: usize },
}

/// Why an incoming datagram was discarded. Drops are never fatal: the
/// retransmission timer recovers from them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    MalformedPacket,
    ChecksumMismatch,
    SequenceMismatch {
        expected: SeqNumber,
        received: SeqNumber,
    },
}

impl From<PacketError> for DropReason {
    fn from(_: PacketError) -> Self {
        Self::MalformedPacket
    }
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedPacket => write!(f, "malformed packet"),
            Self::ChecksumMismatch => write!(f, "checksum mismatch"),
            Self::SequenceMismatch { expected, received } => {
                write!(f, "sequence mismatch (expected {expected}, got {received})")
            }
        }
    }
}
