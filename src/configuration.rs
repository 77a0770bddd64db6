use crate::error::{RdtError, Result};
use crate::packet::RDT_HEADER_SIZE;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 10000;
const DEFAULT_BASE_TIMEOUT: Duration = Duration::from_secs(1);
const DEFAULT_MAX_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_BACKOFF_FACTOR: f64 = 1.5;
const DEFAULT_MAX_RETRIES: u32 = 10;
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);
const DEFAULT_MESSAGE_INTERVAL: Duration = Duration::from_millis(100);
const DEFAULT_MAX_DATAGRAM_SIZE: usize = 2048;

pub fn default_server_addr() -> SocketAddr {
    SocketAddrV4::new(Ipv4Addr::LOCALHOST, DEFAULT_PORT).into()
}

/// Options for the RDT protocol
#[derive(Debug, Clone)]
pub struct RdtConfiguration {
    /// Retransmission timeout used for the first attempts of every message.
    /// Default: 1 second
    pub base_timeout: Duration,
    /// Ceiling for the retransmission timeout after backoff. Default: 5 seconds
    pub max_timeout: Duration,
    /// Multiplier applied to the timeout from the second retry of a message onwards.
    /// Default: 1.5
    pub backoff_factor: f64,
    /// Number of transmissions of a single packet before the transfer is abandoned.
    /// Applies separately to the termination packet. Default: 10
    pub max_retries: u32,
    /// Longest single wait for a reply before the timer is checked again.
    pub poll_interval: Duration,
    /// Pause between two successive messages. Default: 100 ms
    pub message_interval: Duration,
    /// Size of the receive buffer; longer datagrams are truncated by the OS.
    pub max_datagram_size: usize,
    /// How long a receiver keeps acknowledging retransmitted termination packets
    /// after shutting down. `None` stops serving right after the first one.
    /// Default: None
    pub linger_timeout: Option<Duration>,
    /// Kernel send buffer for the UDP socket, left to the OS when `None`.
    pub udp_snd_buf_size: Option<usize>,
    /// Kernel receive buffer for the UDP socket, left to the OS when `None`.
    pub udp_rcv_buf_size: Option<usize>,
}

impl RdtConfiguration {
    pub fn validate(&self) -> Result<()> {
        if self.max_retries == 0 {
            return Err(RdtError::InvalidConfiguration(
                "max_retries must allow at least one transmission",
            ));
        }
        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            return Err(RdtError::InvalidConfiguration(
                "backoff_factor must be a finite number >= 1",
            ));
        }
        if self.base_timeout.is_zero() {
            return Err(RdtError::InvalidConfiguration("base_timeout must be positive"));
        }
        if self.base_timeout > self.max_timeout {
            return Err(RdtError::InvalidConfiguration(
                "base_timeout must not exceed max_timeout",
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(RdtError::InvalidConfiguration("poll_interval must be positive"));
        }
        if self.max_datagram_size <= RDT_HEADER_SIZE {
            return Err(RdtError::InvalidConfiguration(
                "max_datagram_size must leave room for a payload",
            ));
        }
        Ok(())
    }

    /// Timeout to use after another unsuccessful attempt. Products too large
    /// for a [`Duration`] saturate at `max_timeout`.
    pub fn backoff(&self, current: Duration) -> Duration {
        Duration::try_from_secs_f64(current.as_secs_f64() * self.backoff_factor)
            .map_or(self.max_timeout, |timeout| timeout.min(self.max_timeout))
    }
}

impl Default for RdtConfiguration {
    fn default() -> Self {
        Self {
            base_timeout: DEFAULT_BASE_TIMEOUT,
            max_timeout: DEFAULT_MAX_TIMEOUT,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
            max_retries: DEFAULT_MAX_RETRIES,
            poll_interval: DEFAULT_POLL_INTERVAL,
            message_interval: DEFAULT_MESSAGE_INTERVAL,
            max_datagram_size: DEFAULT_MAX_DATAGRAM_SIZE,
            linger_timeout: None,
            udp_snd_buf_size: None,
            udp_rcv_buf_size: None,
        }
    }
}
