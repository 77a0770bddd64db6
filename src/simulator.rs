//! Fault injection for exercising the protocol on a well-behaved link.
//!
//! [`LossyTransport`] wraps another [`Transport`] and, on the way out, drops,
//! corrupts or duplicates datagrams at configurable rates. Incoming datagrams
//! are passed through untouched. All randomness comes from a seeded RNG so a
//! run can be reproduced.

use crate::transport::Transport;
use clap::Args;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::net::SocketAddr;
use std::sync::Mutex;
use tokio::io::Result;
use tracing::debug;

/// Probabilities in `[0.0, 1.0]`, applied independently to every datagram sent.
#[derive(Debug, Clone, Default, Args)]
pub struct FaultConfig {
    /// Probability of silently dropping an outgoing datagram.
    #[arg(long, default_value_t = 0.0)]
    pub loss_rate: f64,
    /// Probability of flipping one random bit of an outgoing datagram.
    #[arg(long, default_value_t = 0.0)]
    pub corrupt_rate: f64,
    /// Probability of sending an outgoing datagram twice.
    #[arg(long, default_value_t = 0.0)]
    pub duplicate_rate: f64,
    /// Seed of the fault generator.
    #[arg(long, default_value_t = 0)]
    pub seed: u64,
}

impl FaultConfig {
    pub fn is_transparent(&self) -> bool {
        self.loss_rate <= 0.0 && self.corrupt_rate <= 0.0 && self.duplicate_rate <= 0.0
    }
}

#[derive(Debug)]
pub struct LossyTransport<T> {
    inner: T,
    config: FaultConfig,
    rng: Mutex<StdRng>,
}

impl<T: Transport> LossyTransport<T> {
    pub fn new(inner: T, config: FaultConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            inner,
            config,
            rng: Mutex::new(rng),
        }
    }

    fn roll(&self, probability: f64) -> bool {
        if probability <= 0.0 {
            return false;
        }
        let mut rng = self.rng.lock().unwrap();
        rng.gen_bool(probability.min(1.0))
    }

    fn corrupt(&self, buf: &[u8]) -> Vec<u8> {
        let mut corrupted = buf.to_vec();
        if !corrupted.is_empty() {
            let mut rng = self.rng.lock().unwrap();
            let index = rng.gen_range(0..corrupted.len());
            let bit = rng.gen_range(0..8);
            corrupted[index] ^= 1 << bit;
        }
        corrupted
    }
}

impl<T: Transport> Transport for LossyTransport<T> {
    async fn send_to(&self, buf: &[u8], target: SocketAddr) -> Result<usize> {
        if self.roll(self.config.loss_rate) {
            debug!("simulator: dropped {} bytes to {}", buf.len(), target);
            return Ok(buf.len());
        }
        let corrupted;
        let datagram = if self.roll(self.config.corrupt_rate) {
            debug!("simulator: corrupted {} bytes to {}", buf.len(), target);
            corrupted = self.corrupt(buf);
            &corrupted[..]
        } else {
            buf
        };
        let sent = self.inner.send_to(datagram, target).await?;
        if self.roll(self.config.duplicate_rate) {
            debug!("simulator: duplicated {} bytes to {}", buf.len(), target);
            self.inner.send_to(datagram, target).await?;
        }
        Ok(sent)
    }

    async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr)> {
        self.inner.recv_from(buf).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::UdpSocket;

    async fn pair() -> (UdpSocket, UdpSocket) {
        let a = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let b = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        (a, b)
    }

    async fn recv_within(socket: &UdpSocket, buf: &mut [u8]) -> Option<Vec<u8>> {
        let wait = std::time::Duration::from_millis(200);
        match tokio::time::timeout(wait, socket.recv_from(buf)).await {
            Ok(Ok((n, _))) => Some(buf[..n].to_vec()),
            _ => None,
        }
    }

    #[tokio::test]
    async fn transparent_by_default() {
        let (a, b) = pair().await;
        let config = FaultConfig::default();
        assert!(config.is_transparent());
        let lossy = LossyTransport::new(a, config);
        lossy.send_to(b"intact", b.local_addr().unwrap()).await.unwrap();

        let mut buf = [0_u8; 32];
        assert_eq!(recv_within(&b, &mut buf).await.unwrap(), b"intact");
    }

    #[tokio::test]
    async fn full_loss_drops_everything() {
        let (a, b) = pair().await;
        let lossy = LossyTransport::new(
            a,
            FaultConfig {
                loss_rate: 1.0,
                ..Default::default()
            },
        );
        let sent = lossy.send_to(b"gone", b.local_addr().unwrap()).await.unwrap();
        assert_eq!(sent, 4, "a dropped datagram still looks sent");

        let mut buf = [0_u8; 32];
        assert!(recv_within(&b, &mut buf).await.is_none());
    }

    #[tokio::test]
    async fn corruption_flips_exactly_one_bit() {
        let (a, b) = pair().await;
        let lossy = LossyTransport::new(
            a,
            FaultConfig {
                corrupt_rate: 1.0,
                seed: 7,
                ..Default::default()
            },
        );
        let original = b"Message-1-Seq-1";
        lossy.send_to(original, b.local_addr().unwrap()).await.unwrap();

        let mut buf = [0_u8; 32];
        let received = recv_within(&b, &mut buf).await.unwrap();
        let flipped: u32 = original
            .iter()
            .zip(&received)
            .map(|(x, y)| (x ^ y).count_ones())
            .sum();
        assert_eq!(flipped, 1);
    }

    #[tokio::test]
    async fn duplication_delivers_twice() {
        let (a, b) = pair().await;
        let lossy = LossyTransport::new(
            a,
            FaultConfig {
                duplicate_rate: 1.0,
                ..Default::default()
            },
        );
        lossy.send_to(b"twice", b.local_addr().unwrap()).await.unwrap();

        let mut buf = [0_u8; 32];
        assert_eq!(recv_within(&b, &mut buf).await.unwrap(), b"twice");
        assert_eq!(recv_within(&b, &mut buf).await.unwrap(), b"twice");
        assert!(recv_within(&b, &mut buf).await.is_none());
    }
}
