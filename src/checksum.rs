//! Integrity digest carried in every packet header.
//!
//! The digest is the number of set bits in the payload, written as eight
//! zero-padded ASCII decimal digits. It depends on the payload only: the
//! sequence number is not covered. Bit-count collisions (two payloads with the
//! same number of ones) go undetected, so this only catches accidental
//! corruption on a cooperative link.

use std::fmt;

pub const CHECKSUM_LEN: usize = 8;

/// Digests wrap at 10^8 so they always fit in [`CHECKSUM_LEN`] digits.
const DIGEST_MODULUS: u64 = 100_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Checksum([u8; CHECKSUM_LEN]);

impl Checksum {
    pub fn compute(payload: &[u8]) -> Self {
        let bits: u64 = payload.iter().map(|b| b.count_ones() as u64).sum();
        let digits = format!("{:08}", bits % DIGEST_MODULUS);
        let mut raw = [0_u8; CHECKSUM_LEN];
        raw.copy_from_slice(digits.as_bytes());
        Self(raw)
    }

    /// Recomputes the digest of `payload` and compares it with `self`.
    pub fn verify(&self, payload: &[u8]) -> bool {
        *self == Self::compute(payload)
    }

    pub fn as_bytes(&self) -> &[u8; CHECKSUM_LEN] {
        &self.0
    }
}

impl From<[u8; CHECKSUM_LEN]> for Checksum {
    fn from(raw: [u8; CHECKSUM_LEN]) -> Self {
        Self(raw)
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_zero_padded_bit_count() {
        // 'D'=0x44 (2), 'O'=0x4f (5), 'N'=0x4e (4), 'E'=0x45 (3)
        assert_eq!(Checksum::compute(b"DONE").as_bytes(), b"00000014");
        assert_eq!(Checksum::compute(b"").as_bytes(), b"00000000");
        assert_eq!(Checksum::compute(&[0xff; 4]).as_bytes(), b"00000032");
    }

    #[test]
    fn verify_accepts_own_digest() {
        let payloads: [&[u8]; 4] = [b"", b"Message-0-Seq-0", b"ACK-17", &[0x00, 0xff, 0x80]];
        for payload in payloads {
            assert!(Checksum::compute(payload).verify(payload));
        }
    }

    #[test]
    fn verify_rejects_single_bit_flip() {
        let payload = b"Message-3-Seq-3".to_vec();
        let digest = Checksum::compute(&payload);
        for i in 0..payload.len() {
            for bit in 0..8 {
                let mut corrupted = payload.clone();
                corrupted[i] ^= 1 << bit;
                assert!(!digest.verify(&corrupted));
            }
        }
    }

    #[test]
    fn bit_swaps_collide() {
        // Known weakness: moving a set bit keeps the count unchanged.
        assert!(Checksum::compute(&[0b0000_0001]).verify(&[0b1000_0000]));
    }

    #[test]
    fn garbage_digest_never_verifies() {
        let digest = Checksum::from(*b"0000001x");
        assert!(!digest.verify(b"anything"));
    }
}
