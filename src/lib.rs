mod checksum;
mod configuration;
mod error;
mod packet;
mod receiver;
mod sender;
mod seq_number;
mod simulator;
mod timer;
mod transport;

pub use checksum::{Checksum, CHECKSUM_LEN};
pub use configuration::{default_server_addr, RdtConfiguration, DEFAULT_PORT};
pub use error::{DropReason, PacketError, RdtError, Result};
pub use packet::{RdtPacket, RDT_HEADER_SIZE, TERMINATION_MARKER};
pub use receiver::{RdtReceiver, ReceiveReport, ReceiverState, Verdict};
pub use sender::{RdtSender, SenderState, TransferReport};
pub use seq_number::SeqNumber;
pub use simulator::{FaultConfig, LossyTransport};
pub use timer::CountdownTimer;
pub use transport::{bind_udp, Transport};

#[cfg(doctest)]
doc_comment::doctest!("../README.md");
