use std::fmt;

/// Number of distinct sequence numbers on the wire (one byte).
const SEQ_SPACE: i32 = 256;

/// Sequence number of a packet, wrapping modulo 256.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash, Default)]
pub struct SeqNumber {
    number: u8,
}

impl From<u8> for SeqNumber {
    fn from(number: u8) -> Self {
        Self { number }
    }
}

impl SeqNumber {
    pub const MAX_NUMBER: u8 = u8::MAX;

    pub fn number(self) -> u8 {
        self.number
    }

    pub fn zero() -> Self {
        Self { number: 0 }
    }

    pub fn max() -> Self {
        Self {
            number: Self::MAX_NUMBER,
        }
    }

    /// The sequence number following this one.
    pub fn next(self) -> Self {
        self + 1
    }
}

impl fmt::Display for SeqNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number)
    }
}

impl std::ops::Add<i32> for SeqNumber {
    type Output = SeqNumber;

    fn add(self, rhs: i32) -> Self {
        let resp = (self.number as i32 + rhs).rem_euclid(SEQ_SPACE) as u8;
        resp.into()
    }
}
