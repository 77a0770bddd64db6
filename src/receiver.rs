//! Stop-and-wait receiver.
//!
//! ```text
//!  WAITING_PACKET ──▶ VALIDATING ──┬─▶ ACCEPT ────┬─▶ ACKING ──▶ WAITING_PACKET
//!        ▲                         ├─▶ DUPLICATE ─┘      │
//!        └─────────────────────────┴─▶ CORRUPT           └─(DONE)─▶ SHUTDOWN
//! ```
//!
//! Every intact packet is acknowledged with its own sequence number, whether
//! or not it was the one expected. A sender whose acknowledgement got lost
//! retransmits, and the re-acknowledgement of the duplicate lets it move on.
//! Corrupt or malformed packets are never acknowledged.

use crate::configuration::RdtConfiguration;
use crate::error::{DropReason, RdtError, Result};
use crate::packet::RdtPacket;
use crate::seq_number::SeqNumber;
use crate::timer::CountdownTimer;
use crate::transport::Transport;
use bytes::Bytes;
use std::io::ErrorKind;
use std::net::SocketAddr;
use tokio::time::sleep;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverState {
    WaitingPacket,
    Validating,
    Accept,
    Duplicate,
    Corrupt,
    Acking,
    Shutdown,
}

/// Result of processing one datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The expected packet; the expected sequence number has advanced.
    Accepted { packet: RdtPacket, ack: RdtPacket },
    /// An intact packet that was already accepted or arrived out of order.
    Duplicate { packet: RdtPacket, ack: RdtPacket },
    /// Discarded without acknowledgement.
    Dropped(DropReason),
}

impl Verdict {
    /// Acknowledgement to send back, if any.
    pub fn ack(&self) -> Option<&RdtPacket> {
        match self {
            Self::Accepted { ack, .. } | Self::Duplicate { ack, .. } => Some(ack),
            Self::Dropped(_) => None,
        }
    }

    pub fn is_termination(&self) -> bool {
        match self {
            Self::Accepted { packet, .. } | Self::Duplicate { packet, .. } => {
                packet.is_termination()
            }
            Self::Dropped(_) => false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceiveReport {
    /// Application payloads in delivery order, termination marker excluded.
    pub messages: Vec<Bytes>,
    /// Packets accepted as new, including the termination packet.
    pub accepted: usize,
    pub duplicates: usize,
    /// Malformed or corrupt packets.
    pub dropped: usize,
    pub expected_sequence: SeqNumber,
    /// Where the termination packet came from.
    pub peer: Option<SocketAddr>,
}

#[derive(Debug)]
pub struct RdtReceiver<T> {
    transport: T,
    config: RdtConfiguration,
    expected: SeqNumber,
    state: ReceiverState,
    report: ReceiveReport,
}

impl<T: Transport> RdtReceiver<T> {
    pub fn new(transport: T, config: RdtConfiguration) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            transport,
            config,
            expected: SeqNumber::zero(),
            state: ReceiverState::WaitingPacket,
            report: ReceiveReport::default(),
        })
    }

    pub fn state(&self) -> ReceiverState {
        self.state
    }

    pub fn expected_sequence(&self) -> SeqNumber {
        self.expected
    }

    pub fn report(&self) -> &ReceiveReport {
        &self.report
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Validates one datagram and updates the session. Performs no I/O: the
    /// caller sends [`Verdict::ack`] back to the datagram's source.
    pub fn handle_datagram(&mut self, datagram: &[u8]) -> Verdict {
        self.state = ReceiverState::Validating;
        let packet = match RdtPacket::deserialize(datagram) {
            Ok(packet) => packet,
            Err(err) => {
                debug!("dropping datagram: {}", err);
                return self.drop_packet(DropReason::MalformedPacket);
            }
        };
        debug!(
            "received packet {} ({} bytes), expecting {}",
            packet.sequence,
            packet.payload.len(),
            self.expected
        );
        if !packet.is_intact() {
            debug!("invalid checksum for packet {}, dropping", packet.sequence);
            return self.drop_packet(DropReason::ChecksumMismatch);
        }

        let ack = RdtPacket::ack(packet.sequence);
        if packet.sequence == self.expected {
            self.state = ReceiverState::Accept;
            self.expected = self.expected.next();
            self.report.accepted += 1;
            if !packet.is_termination() {
                info!(
                    "accepted packet {}: {}",
                    packet.sequence,
                    String::from_utf8_lossy(&packet.payload)
                );
                self.report.messages.push(packet.payload.clone());
            }
            Verdict::Accepted { packet, ack }
        } else {
            self.state = ReceiverState::Duplicate;
            self.report.duplicates += 1;
            debug!(
                "duplicate or out-of-order packet {} (expected {})",
                packet.sequence, self.expected
            );
            Verdict::Duplicate { packet, ack }
        }
    }

    fn drop_packet(&mut self, reason: DropReason) -> Verdict {
        self.state = ReceiverState::Corrupt;
        self.report.dropped += 1;
        Verdict::Dropped(reason)
    }

    /// Serves one session until the termination packet has been acknowledged.
    ///
    /// The first packet is awaited without any timeout. When a linger timeout
    /// is configured, retransmitted termination packets keep being
    /// acknowledged for that long before returning.
    pub async fn serve(&mut self) -> Result<ReceiveReport> {
        let mut buf = vec![0_u8; self.config.max_datagram_size];
        loop {
            self.state = ReceiverState::WaitingPacket;
            let (size, addr) = match self.transport.recv_from(&mut buf).await {
                Ok(received) => received,
                Err(err) if is_transient(&err) => {
                    warn!("ignoring receive error: {}", err);
                    continue;
                }
                Err(err) => return Err(err.into()),
            };

            let verdict = self.handle_datagram(&buf[..size]);
            if let Some(ack) = verdict.ack() {
                self.state = ReceiverState::Acking;
                self.transport.send_to(&ack.serialize(), addr).await?;
                debug!("sent ACK for packet {} to {}", ack.sequence, addr);
                if verdict.is_termination() {
                    info!("received termination packet, shutting down");
                    self.state = ReceiverState::Shutdown;
                    self.report.peer = Some(addr);
                    break;
                }
            }
        }

        self.linger(&mut buf).await?;
        self.report.expected_sequence = self.expected;
        Ok(self.report.clone())
    }

    async fn linger(&mut self, buf: &mut [u8]) -> Result<()> {
        let Some(linger_timeout) = self.config.linger_timeout else {
            return Ok(());
        };
        let mut timer = CountdownTimer::new(linger_timeout);
        timer.start();
        while !timer.expired() {
            let received = tokio::select! {
                r = self.transport.recv_from(buf) => Some(r),
                _ = sleep(timer.remaining()) => None,
            };
            match received {
                Some(Ok((size, addr))) => {
                    let packet = match RdtPacket::deserialize(&buf[..size]) {
                        Ok(packet) if packet.is_intact() && packet.is_termination() => packet,
                        _ => continue,
                    };
                    self.report.duplicates += 1;
                    let ack = RdtPacket::ack(packet.sequence);
                    self.transport.send_to(&ack.serialize(), addr).await?;
                    debug!("re-acknowledged termination packet {}", packet.sequence);
                }
                Some(Err(err)) if is_transient(&err) => continue,
                Some(Err(err)) => return Err(RdtError::Io(err)),
                None => break,
            }
        }
        Ok(())
    }
}

/// ICMP errors surfaced on UDP sockets by some platforms.
fn is_transient(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::ConnectionReset | ErrorKind::ConnectionRefused | ErrorKind::Interrupted
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::UdpSocket;

    async fn receiver() -> RdtReceiver<UdpSocket> {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        RdtReceiver::new(socket, RdtConfiguration::default()).unwrap()
    }

    fn datagram(sequence: u8, payload: &'static [u8]) -> Bytes {
        RdtPacket::new(sequence.into(), payload).serialize()
    }

    #[tokio::test]
    async fn accepts_in_order_and_acks_with_received_sequence() {
        let mut receiver = receiver().await;
        let verdict = receiver.handle_datagram(&datagram(0, b"Message-0-Seq-0"));
        assert!(matches!(verdict, Verdict::Accepted { .. }));
        assert_eq!(verdict.ack(), Some(&RdtPacket::ack(0.into())));
        assert_eq!(receiver.state(), ReceiverState::Accept);
        assert_eq!(receiver.expected_sequence().number(), 1);
        assert_eq!(receiver.report().messages, vec![Bytes::from_static(b"Message-0-Seq-0")]);
    }

    #[tokio::test]
    async fn duplicate_is_reacknowledged_without_advancing() {
        let mut receiver = receiver().await;
        receiver.handle_datagram(&datagram(0, b"first"));

        let verdict = receiver.handle_datagram(&datagram(0, b"first"));
        assert!(matches!(verdict, Verdict::Duplicate { .. }));
        assert_eq!(verdict.ack().unwrap().sequence, SeqNumber::zero());
        assert_eq!(receiver.expected_sequence().number(), 1);
        assert_eq!(receiver.state(), ReceiverState::Duplicate);
        assert_eq!(receiver.report().messages.len(), 1);
        assert_eq!(receiver.report().duplicates, 1);
    }

    #[tokio::test]
    async fn out_of_order_is_acknowledged_but_not_accepted() {
        let mut receiver = receiver().await;
        let verdict = receiver.handle_datagram(&datagram(5, b"early"));
        assert_eq!(verdict.ack().unwrap().sequence.number(), 5);
        assert_eq!(receiver.expected_sequence(), SeqNumber::zero());
        assert!(receiver.report().messages.is_empty());
    }

    #[tokio::test]
    async fn corrupt_packet_is_dropped_silently() {
        let mut receiver = receiver().await;
        let mut raw = datagram(0, b"Message-0-Seq-0").to_vec();
        raw[12] ^= 0x10;

        let verdict = receiver.handle_datagram(&raw);
        assert_eq!(verdict, Verdict::Dropped(DropReason::ChecksumMismatch));
        assert_eq!(verdict.ack(), None);
        assert_eq!(receiver.state(), ReceiverState::Corrupt);
        assert_eq!(receiver.expected_sequence(), SeqNumber::zero());
        assert_eq!(receiver.report().dropped, 1);
        assert_eq!(receiver.report().accepted, 0);
    }

    #[tokio::test]
    async fn truncated_datagram_is_malformed() {
        let mut receiver = receiver().await;
        let verdict = receiver.handle_datagram(b"\x00000");
        assert_eq!(verdict, Verdict::Dropped(DropReason::MalformedPacket));
        assert_eq!(receiver.expected_sequence(), SeqNumber::zero());
    }

    #[tokio::test]
    async fn termination_is_accepted_but_not_delivered() {
        let mut receiver = receiver().await;
        let verdict = receiver.handle_datagram(&RdtPacket::termination(0.into()).serialize());
        assert!(verdict.is_termination());
        assert!(matches!(verdict, Verdict::Accepted { .. }));
        assert_eq!(receiver.report().accepted, 1);
        assert!(receiver.report().messages.is_empty());
    }

    #[tokio::test]
    async fn expected_sequence_wraps() {
        let mut receiver = receiver().await;
        for n in 0..=255_u8 {
            receiver.handle_datagram(&datagram(n, b"x"));
        }
        assert_eq!(receiver.expected_sequence(), SeqNumber::zero());
        assert_eq!(receiver.report().accepted, 256);
        assert!(matches!(
            receiver.handle_datagram(&datagram(0, b"y")),
            Verdict::Accepted { .. }
        ));
    }

    #[test]
    fn icmp_errors_are_transient() {
        assert!(is_transient(&ErrorKind::ConnectionReset.into()));
        assert!(!is_transient(&ErrorKind::PermissionDenied.into()));
    }
}
