//! Stop-and-wait sender.
//!
//! Every message goes through the same cycle: transmit, start the timer, poll
//! for a matching acknowledgement, retransmit the byte-identical datagram on
//! timeout. Only one packet is ever outstanding and the sequence number
//! advances only once that packet is acknowledged.
//!
//! ```text
//!  IDLE ──▶ SENDING ──▶ WAITING_ACK ──ack──▶ ACKED ──▶ (next message)
//!              ▲             │
//!              │          timeout
//!              │             ▼
//!              └──────── RETRY ──budget spent──▶ ABORTED
//! ```

use crate::configuration::RdtConfiguration;
use crate::error::{DropReason, RdtError, Result};
use crate::packet::RdtPacket;
use crate::seq_number::SeqNumber;
use crate::timer::CountdownTimer;
use crate::transport::Transport;
use bytes::Bytes;
use std::net::SocketAddr;
use tokio::time::sleep;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderState {
    Idle,
    Sending,
    WaitingAck,
    Acked,
    Retry,
    Aborted,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferReport {
    /// Application messages acknowledged by the receiver.
    pub delivered: usize,
    pub transmissions: u32,
    pub retransmissions: u32,
    /// Replies dropped because they were malformed or failed the checksum.
    pub corrupt_replies: u32,
    /// Intact replies acknowledging another sequence number.
    pub stale_replies: u32,
    /// Whether the termination packet was acknowledged.
    pub terminated: bool,
    pub next_sequence: SeqNumber,
}

#[derive(Debug, PartialEq, Eq)]
enum Delivery {
    Acked,
    Exhausted { attempts: u32 },
}

#[derive(Debug)]
pub struct RdtSender<T> {
    transport: T,
    peer: SocketAddr,
    config: RdtConfiguration,
    sequence: SeqNumber,
    state: SenderState,
    timer: CountdownTimer,
    report: TransferReport,
    buffer: Vec<u8>,
}

impl<T: Transport> RdtSender<T> {
    pub fn new(transport: T, peer: SocketAddr, config: RdtConfiguration) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            transport,
            peer,
            timer: CountdownTimer::new(config.base_timeout),
            buffer: vec![0_u8; config.max_datagram_size],
            config,
            sequence: SeqNumber::zero(),
            state: SenderState::Idle,
            report: TransferReport::default(),
        })
    }

    pub fn state(&self) -> SenderState {
        self.state
    }

    /// Sequence number of the next (or currently outstanding) packet.
    pub fn sequence(&self) -> SeqNumber {
        self.sequence
    }

    /// Statistics of the current or last transfer, also available after an error.
    pub fn report(&self) -> &TransferReport {
        &self.report
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Delivers `messages` in order, then closes the session with a
    /// termination packet.
    ///
    /// The termination packet is sent exactly once per call, even when a
    /// message exhausted its retry budget or the transport failed. Its own
    /// retry budget is independent of the messages'.
    pub async fn transfer<I>(&mut self, messages: I) -> Result<TransferReport>
    where
        I: IntoIterator,
        I::Item: Into<Bytes>,
    {
        self.report = TransferReport::default();
        let outcome = self.send_messages(messages).await;
        if let Err(err) = &outcome {
            warn!("transfer interrupted: {}", err);
        }

        let terminated = self.send_termination().await;
        self.report.next_sequence = self.sequence;
        if let Ok(terminated) = &terminated {
            self.report.terminated = *terminated;
        }
        if outcome.is_err() {
            self.state = SenderState::Aborted;
        }

        outcome?;
        terminated?;
        Ok(self.report.clone())
    }

    async fn send_messages<I>(&mut self, messages: I) -> Result<()>
    where
        I: IntoIterator,
        I::Item: Into<Bytes>,
    {
        for (index, message) in messages.into_iter().enumerate() {
            if index > 0 && !self.config.message_interval.is_zero() {
                sleep(self.config.message_interval).await;
            }
            let packet = RdtPacket::new(self.sequence, message);
            match self.deliver(&packet).await? {
                Delivery::Acked => self.report.delivered += 1,
                Delivery::Exhausted { attempts } => {
                    self.state = SenderState::Aborted;
                    warn!(
                        "no ACK for packet {} after {} attempts, giving up",
                        packet.sequence, attempts
                    );
                    return Err(RdtError::RetryBudgetExhausted {
                        sequence: packet.sequence,
                        attempts,
                    });
                }
            }
        }
        Ok(())
    }

    async fn send_termination(&mut self) -> Result<bool> {
        let packet = RdtPacket::termination(self.sequence);
        info!("sending termination packet {}", packet.sequence);
        match self.deliver(&packet).await? {
            Delivery::Acked => {
                info!("termination acknowledged");
                Ok(true)
            }
            Delivery::Exhausted { attempts } => {
                // Nothing is outstanding any more, the session is simply over.
                self.state = SenderState::Idle;
                warn!("termination not acknowledged after {} attempts", attempts);
                Ok(false)
            }
        }
    }

    /// Runs the send-wait-retransmit cycle for a single packet.
    async fn deliver(&mut self, packet: &RdtPacket) -> Result<Delivery> {
        let datagram = packet.serialize();
        let mut timeout = self.config.base_timeout;
        let mut retries = 0;
        self.timer.set_duration(timeout);

        loop {
            self.state = SenderState::Sending;
            self.transport.send_to(&datagram, self.peer).await?;
            self.report.transmissions += 1;
            if retries > 0 {
                self.report.retransmissions += 1;
            }
            debug!(
                "sent packet {} ({} bytes, attempt {})",
                packet.sequence,
                datagram.len(),
                retries + 1
            );

            self.timer.start();
            self.state = SenderState::WaitingAck;
            let acked = self.wait_for_ack(packet.sequence).await;
            self.timer.stop();

            if acked {
                self.state = SenderState::Acked;
                self.sequence = self.sequence.next();
                debug!("packet {} acknowledged", packet.sequence);
                return Ok(Delivery::Acked);
            }

            self.state = SenderState::Retry;
            retries += 1;
            if retries >= self.config.max_retries {
                return Ok(Delivery::Exhausted { attempts: retries });
            }
            warn!(
                "timeout for packet {}, retrying ({}/{})",
                packet.sequence, retries, self.config.max_retries
            );
            if retries > 1 {
                timeout = self.config.backoff(timeout);
                self.timer.set_duration(timeout);
                debug!("timeout raised to {:?}", timeout);
            }
        }
    }

    /// Polls the transport until the timer expires or `sequence` is acknowledged.
    async fn wait_for_ack(&mut self, sequence: SeqNumber) -> bool {
        while self.timer.running() && !self.timer.expired() {
            let wait = self.timer.remaining().min(self.config.poll_interval);
            let received = tokio::select! {
                r = self.transport.recv_from(&mut self.buffer) => Some(r),
                _ = sleep(wait) => None,
            };
            match received {
                Some(Ok((size, addr))) => match check_reply(sequence, &self.buffer[..size]) {
                    Ok(_) => return true,
                    Err(reason) => {
                        match reason {
                            DropReason::SequenceMismatch { .. } => self.report.stale_replies += 1,
                            _ => self.report.corrupt_replies += 1,
                        }
                        debug!("dropping reply from {}: {}", addr, reason);
                    }
                },
                Some(Err(err)) => {
                    warn!("receive failed: {}", err);
                    sleep(wait).await;
                }
                None => {}
            }
        }
        false
    }
}

/// Accepts an acknowledgement only if it is intact and names `expected`.
fn check_reply(expected: SeqNumber, datagram: &[u8]) -> std::result::Result<RdtPacket, DropReason> {
    let reply = RdtPacket::deserialize(datagram)?;
    if !reply.is_intact() {
        return Err(DropReason::ChecksumMismatch);
    }
    if reply.sequence != expected {
        return Err(DropReason::SequenceMismatch {
            expected,
            received: reply.sequence,
        });
    }
    Ok(reply)
}
