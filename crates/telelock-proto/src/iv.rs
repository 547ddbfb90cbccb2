//! Effective input vector construction.
//!
//! The cipher always runs with a full 16-byte IV:
//!
//! ```text
//! bytes 0-3:  SendCounter (little-endian)
//! bytes 4-15: session nonce (all zero, or random for the process lifetime)
//! ```
//!
//! Frames may carry a condensed form of it. With [`IvWidth::Counter2`] and
//! [`IvWidth::Counter4`] only the low counter bytes travel; the receiver
//! fills the rest with zeros and the nonce it shares with the device out of
//! band. With [`IvWidth::Full16`] the whole IV is on the wire.

use crate::errors::{ProtocolError, Result};

/// Size of the nonce half of the IV.
pub const NONCE_SIZE: usize = 12;

/// Size of the counter half of the IV.
const COUNTER_SIZE: usize = 4;

/// How much of the effective IV is embedded in each frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IvWidth {
    /// Low two counter bytes. The effective IV counter is truncated to
    /// 16 bits so the receiver can rebuild it.
    Counter2,
    /// All four counter bytes.
    Counter4,
    /// The complete 16-byte effective IV.
    #[default]
    Full16,
}

impl IvWidth {
    /// Number of bytes the counter prefix occupies in a frame.
    pub const fn prefix_len(self) -> usize {
        match self {
            Self::Counter2 => 2,
            Self::Counter4 => 4,
            Self::Full16 => 16,
        }
    }

    /// Counter value as it appears in the effective IV.
    ///
    /// Identity except for `Counter2`, which keeps the low 16 bits.
    pub const fn effective_counter(self, counter: u32) -> u32 {
        match self {
            Self::Counter2 => counter & 0xFFFF,
            Self::Counter4 | Self::Full16 => counter,
        }
    }
}

/// Source of the nonce half of the IV.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NonceMode {
    /// Twelve zero bytes. Uniqueness rests on the counter alone.
    #[default]
    Zero,
    /// Random bytes drawn once per process start.
    Random,
}

/// The nonce half of the IV, fixed for one process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionNonce([u8; NONCE_SIZE]);

impl SessionNonce {
    /// All-zero nonce.
    pub const fn zero() -> Self {
        Self([0u8; NONCE_SIZE])
    }

    /// Wrap nonce bytes.
    pub const fn from_bytes(bytes: [u8; NONCE_SIZE]) -> Self {
        Self(bytes)
    }

    /// Nonce bytes.
    pub const fn as_bytes(&self) -> &[u8; NONCE_SIZE] {
        &self.0
    }
}

/// The 16-byte IV actually fed to the stream cipher for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EffectiveIv([u8; 16]);

impl EffectiveIv {
    /// Build the IV for `counter` as it will be reconstructible under
    /// `width`.
    pub fn new(counter: u32, width: IvWidth, nonce: &SessionNonce) -> Self {
        let mut iv = [0u8; 16];
        iv[..COUNTER_SIZE].copy_from_slice(&width.effective_counter(counter).to_le_bytes());
        iv[COUNTER_SIZE..].copy_from_slice(nonce.as_bytes());
        Self(iv)
    }

    /// Wrap a complete IV taken from the wire.
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Rebuild the IV from a frame's counter prefix.
    ///
    /// For `Full16` the prefix is the IV and `nonce` is ignored.
    ///
    /// # Errors
    ///
    /// `InvalidPrefix` if `prefix` is not `width.prefix_len()` bytes.
    pub fn from_wire(prefix: &[u8], width: IvWidth, nonce: &SessionNonce) -> Result<Self> {
        if prefix.len() != width.prefix_len() {
            return Err(ProtocolError::InvalidPrefix {
                expected: width.prefix_len(),
                actual: prefix.len(),
            });
        }

        let mut iv = [0u8; 16];
        match width {
            IvWidth::Full16 => iv.copy_from_slice(prefix),
            IvWidth::Counter2 | IvWidth::Counter4 => {
                iv[..prefix.len()].copy_from_slice(prefix);
                iv[COUNTER_SIZE..].copy_from_slice(nonce.as_bytes());
            },
        }

        Ok(Self(iv))
    }

    /// IV bytes.
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Counter half, decoded.
    pub fn counter(&self) -> u32 {
        u32::from_le_bytes([self.0[0], self.0[1], self.0[2], self.0[3]])
    }

    /// The bytes of this IV that go on the wire under `width`.
    pub fn wire_prefix(&self, width: IvWidth) -> &[u8] {
        &self.0[..width.prefix_len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_is_little_endian_in_first_four_bytes() {
        let iv = EffectiveIv::new(0x0403_0201, IvWidth::Full16, &SessionNonce::zero());
        assert_eq!(&iv.as_bytes()[..4], &[0x01, 0x02, 0x03, 0x04]);
        assert_eq!(&iv.as_bytes()[4..], &[0u8; 12]);
        assert_eq!(iv.counter(), 0x0403_0201);
    }

    #[test]
    fn nonce_fills_last_twelve_bytes() {
        let nonce = SessionNonce::from_bytes([0xAA; NONCE_SIZE]);
        let iv = EffectiveIv::new(5, IvWidth::Counter4, &nonce);
        assert_eq!(&iv.as_bytes()[4..], &[0xAA; 12]);
    }

    #[test]
    fn counter2_truncates_effective_counter() {
        let iv = EffectiveIv::new(0x0001_0005, IvWidth::Counter2, &SessionNonce::zero());
        assert_eq!(iv.counter(), 5);
        assert_eq!(iv.wire_prefix(IvWidth::Counter2), &[0x05, 0x00]);
    }

    #[test]
    fn wire_roundtrip_for_every_width() {
        let nonce = SessionNonce::from_bytes([7; NONCE_SIZE]);

        for width in [IvWidth::Counter2, IvWidth::Counter4, IvWidth::Full16] {
            let iv = EffectiveIv::new(0x1234, width, &nonce);
            let rebuilt = EffectiveIv::from_wire(iv.wire_prefix(width), width, &nonce).unwrap();
            assert_eq!(rebuilt, iv, "width {width:?}");
        }
    }

    #[test]
    fn full16_ignores_receiver_nonce() {
        let device_nonce = SessionNonce::from_bytes([1; NONCE_SIZE]);
        let iv = EffectiveIv::new(99, IvWidth::Full16, &device_nonce);

        let rebuilt = EffectiveIv::from_wire(
            iv.wire_prefix(IvWidth::Full16),
            IvWidth::Full16,
            &SessionNonce::zero(),
        )
        .unwrap();
        assert_eq!(rebuilt, iv);
    }

    #[test]
    fn from_wire_rejects_wrong_prefix_length() {
        let result = EffectiveIv::from_wire(&[1, 2, 3], IvWidth::Counter4, &SessionNonce::zero());
        assert_eq!(result, Err(ProtocolError::InvalidPrefix { expected: 4, actual: 3 }));
    }
}
