//! Telemetry frame with a fixed binary layout.
//!
//! The body after the counter prefix is always 21 bytes:
//!
//! ```text
//! offset  size  field
//! 0       1     clear block length (8)
//! 1       1     0x01 temperature marker
//! 2       1     temperature (i8)
//! 3       1     0x02 humidity marker
//! 4       1     humidity (u8)
//! 5       1     0x03 gyroscope marker
//! 6       3     gyro x, y, z (i8 each)
//! 9       1     secure block length (11)
//! 10      11    ENCRYPTED: 0x04 accel marker, accel magnitude (u8),
//!               0x05 position marker, latitude (i32 LE), longitude (i32 LE)
//! ```
//!
//! Offsets are relative to the end of the counter prefix, whose width is
//! set by [`IvWidth`]. Frames are built into a statically sized buffer; the
//! only runtime size is the prefix width.

use telelock_crypto::{DailyKey, stream_cipher};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::{
    errors::{ProtocolError, Result},
    fields::{ClearFields, SecureFields},
    iv::{EffectiveIv, IvWidth, SessionNonce},
};

/// Semantic marker bytes preceding each field.
pub mod marker {
    /// Temperature reading
    pub const TEMPERATURE: u8 = 0x01;
    /// Humidity reading
    pub const HUMIDITY: u8 = 0x02;
    /// Three-axis angular rate
    pub const GYROSCOPE: u8 = 0x03;
    /// Acceleration magnitude
    pub const ACCELEROMETER: u8 = 0x04;
    /// Latitude and longitude
    pub const POSITION: u8 = 0x05;
}

/// Clear block, including its leading length byte.
#[repr(C, packed)]
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
struct ClearBlock {
    len: u8,
    temperature_marker: u8,
    temperature: u8,
    humidity_marker: u8,
    humidity: u8,
    gyro_marker: u8,
    gyro: [u8; 3],
}

/// Plaintext of the encrypted block (its length byte stays in the clear).
#[repr(C, packed)]
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
struct SecureBlock {
    accel_marker: u8,
    accel_magnitude: u8,
    position_marker: u8,
    latitude: [u8; 4],
    longitude: [u8; 4],
}

const CLEAR_BLOCK_SIZE: usize = size_of::<ClearBlock>();
const SECURE_BLOCK_SIZE: usize = size_of::<SecureBlock>();

/// Offset of the secure block length byte, relative to the body.
const SECURE_LEN_OFFSET: usize = CLEAR_BLOCK_SIZE;

/// Offset of the encrypted bytes, relative to the body.
const SECURE_OFFSET: usize = SECURE_LEN_OFFSET + 1;

impl ClearBlock {
    fn new(fields: &ClearFields) -> Self {
        Self {
            len: (CLEAR_BLOCK_SIZE - 1) as u8,
            temperature_marker: marker::TEMPERATURE,
            temperature: fields.temperature as u8,
            humidity_marker: marker::HUMIDITY,
            humidity: fields.humidity,
            gyro_marker: marker::GYROSCOPE,
            gyro: fields.gyro.map(|axis| axis as u8),
        }
    }

    fn validate(&self, base: usize) -> Result<ClearFields> {
        check_len(base, CLEAR_BLOCK_SIZE - 1, self.len)?;
        check_marker(base + 1, marker::TEMPERATURE, self.temperature_marker)?;
        check_marker(base + 3, marker::HUMIDITY, self.humidity_marker)?;
        check_marker(base + 5, marker::GYROSCOPE, self.gyro_marker)?;

        Ok(ClearFields {
            temperature: self.temperature as i8,
            humidity: self.humidity,
            gyro: self.gyro.map(|axis| axis as i8),
        })
    }
}

impl SecureBlock {
    fn new(fields: &SecureFields) -> Self {
        Self {
            accel_marker: marker::ACCELEROMETER,
            accel_magnitude: fields.accel_magnitude,
            position_marker: marker::POSITION,
            latitude: fields.latitude.to_le_bytes(),
            longitude: fields.longitude.to_le_bytes(),
        }
    }

    fn validate(&self, base: usize) -> Result<SecureFields> {
        check_marker(base, marker::ACCELEROMETER, self.accel_marker)?;
        check_marker(base + 2, marker::POSITION, self.position_marker)?;

        Ok(SecureFields {
            accel_magnitude: self.accel_magnitude,
            latitude: i32::from_le_bytes(self.latitude),
            longitude: i32::from_le_bytes(self.longitude),
        })
    }
}

fn check_marker(offset: usize, expected: u8, actual: u8) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(ProtocolError::UnexpectedMarker { offset, expected, actual })
    }
}

fn check_len(offset: usize, expected: usize, actual: u8) -> Result<()> {
    if usize::from(actual) == expected {
        Ok(())
    } else {
        Err(ProtocolError::UnexpectedBlockLength { offset, expected: expected as u8, actual })
    }
}

/// One telemetry frame in wire layout.
///
/// # Invariants
///
/// - `len() == width.prefix_len() + BODY_SIZE`, fixed at construction
/// - Bytes past `len()` in the backing buffer are always zero
/// - Whether the secure region currently holds plaintext or ciphertext is
///   the owner's responsibility; the device encrypts it exactly once
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct TelemetryFrame {
    bytes: [u8; Self::MAX_SIZE],
    width: IvWidth,
}

impl TelemetryFrame {
    /// Size of everything after the counter prefix.
    pub const BODY_SIZE: usize = CLEAR_BLOCK_SIZE + 1 + SECURE_BLOCK_SIZE;

    /// Size of the largest frame (full 16-byte IV prefix).
    pub const MAX_SIZE: usize = 16 + Self::BODY_SIZE;

    /// Frame size for an IV width.
    pub const fn size_for(width: IvWidth) -> usize {
        width.prefix_len() + Self::BODY_SIZE
    }

    /// Lay out a frame with the secure block still in plaintext.
    pub fn encode(
        iv: &EffectiveIv,
        width: IvWidth,
        clear: &ClearFields,
        secure: &SecureFields,
    ) -> Self {
        let mut bytes = [0u8; Self::MAX_SIZE];
        let prefix = width.prefix_len();

        bytes[..prefix].copy_from_slice(iv.wire_prefix(width));

        let body = &mut bytes[prefix..prefix + Self::BODY_SIZE];
        body[..CLEAR_BLOCK_SIZE].copy_from_slice(ClearBlock::new(clear).as_bytes());
        body[SECURE_LEN_OFFSET] = SECURE_BLOCK_SIZE as u8;
        body[SECURE_OFFSET..].copy_from_slice(SecureBlock::new(secure).as_bytes());

        Self { bytes, width }
    }

    /// Copy a received frame out of `bytes`.
    ///
    /// Only the size is checked here; see [`Self::parse`] for layout
    /// validation.
    ///
    /// # Errors
    ///
    /// `FrameSizeMismatch` unless `bytes` is exactly one frame for `width`.
    pub fn from_bytes(bytes: &[u8], width: IvWidth) -> Result<Self> {
        let expected = Self::size_for(width);
        if bytes.len() != expected {
            return Err(ProtocolError::FrameSizeMismatch { expected, actual: bytes.len() });
        }

        let mut buf = [0u8; Self::MAX_SIZE];
        buf[..expected].copy_from_slice(bytes);
        Ok(Self { bytes: buf, width })
    }

    /// Decode a frame from its hex wire form.
    ///
    /// Whitespace is ignored and either case is accepted, so both the
    /// compact form and space-separated byte dumps decode.
    pub fn from_hex(text: &str, width: IvWidth) -> Result<Self> {
        let bytes = decode_hex(text)?;
        Self::from_bytes(&bytes, width)
    }

    /// Split a combined radio payload into its frames, in order.
    ///
    /// # Errors
    ///
    /// `MisalignedBatch` if the payload is not a whole number of frames.
    pub fn split_batch(payload: &[u8], width: IvWidth) -> Result<Vec<Self>> {
        let frame_size = Self::size_for(width);
        if payload.len() % frame_size != 0 {
            return Err(ProtocolError::MisalignedBatch { len: payload.len(), frame_size });
        }

        payload.chunks_exact(frame_size).map(|chunk| Self::from_bytes(chunk, width)).collect()
    }

    /// IV width this frame was laid out for.
    pub fn width(&self) -> IvWidth {
        self.width
    }

    /// Frame size in bytes.
    pub fn len(&self) -> usize {
        Self::size_for(self.width)
    }

    /// Always false; frames have a fixed non-zero size.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Frame bytes as sent on the wire.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len()]
    }

    /// Counter prefix (condensed or full IV).
    pub fn counter_prefix(&self) -> &[u8] {
        &self.bytes[..self.width.prefix_len()]
    }

    /// Everything that is never encrypted: prefix, clear block and the
    /// secure block's length byte.
    pub fn clear_region(&self) -> &[u8] {
        &self.bytes[..self.secure_start()]
    }

    /// The encrypted sub-region.
    pub fn secure_region(&self) -> &[u8] {
        let start = self.secure_start();
        &self.bytes[start..start + SECURE_BLOCK_SIZE]
    }

    /// Mutable access to the encrypted sub-region, for in-place encryption.
    pub fn secure_region_mut(&mut self) -> &mut [u8] {
        let start = self.secure_start();
        &mut self.bytes[start..start + SECURE_BLOCK_SIZE]
    }

    /// Uppercase hex of the wire bytes.
    pub fn to_hex(&self) -> String {
        hex::encode_upper(self.as_bytes())
    }

    /// Validate the layout and extract clear fields.
    ///
    /// The secure block is returned still encrypted; see
    /// [`ParsedFrame::decrypt`].
    ///
    /// # Errors
    ///
    /// `UnexpectedBlockLength` / `UnexpectedMarker` when a length or marker
    /// byte in the clear region disagrees with format v1.
    pub fn parse(&self) -> Result<ParsedFrame> {
        let prefix = self.width.prefix_len();

        let clear_bytes = &self.bytes[prefix..prefix + CLEAR_BLOCK_SIZE];
        let Ok(clear_block) = ClearBlock::ref_from_bytes(clear_bytes) else {
            unreachable!("clear block slice has the exact block size");
        };
        let clear = clear_block.validate(prefix)?;

        let secure_len_at = prefix + SECURE_LEN_OFFSET;
        check_len(secure_len_at, SECURE_BLOCK_SIZE, self.bytes[secure_len_at])?;

        let mut secure_ciphertext = [0u8; SECURE_BLOCK_SIZE];
        secure_ciphertext.copy_from_slice(self.secure_region());

        let mut counter_prefix = [0u8; 16];
        counter_prefix[..prefix].copy_from_slice(self.counter_prefix());

        Ok(ParsedFrame { width: self.width, counter_prefix, clear, secure_ciphertext })
    }

    fn secure_start(&self) -> usize {
        self.width.prefix_len() + SECURE_OFFSET
    }
}

impl std::fmt::Debug for TelemetryFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryFrame")
            .field("width", &self.width)
            .field("hex", &self.to_hex())
            .finish()
    }
}

/// A frame whose clear region has been validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFrame {
    width: IvWidth,
    counter_prefix: [u8; 16],
    /// Readings from the clear block
    pub clear: ClearFields,
    secure_ciphertext: [u8; SECURE_BLOCK_SIZE],
}

impl ParsedFrame {
    /// Counter prefix bytes as received.
    pub fn counter_prefix(&self) -> &[u8] {
        &self.counter_prefix[..self.width.prefix_len()]
    }

    /// Rebuild the IV the sender used.
    ///
    /// `nonce` must be the session nonce shared out of band for the
    /// condensed widths; it is ignored for `Full16`.
    pub fn effective_iv(&self, nonce: &SessionNonce) -> EffectiveIv {
        let Ok(iv) = EffectiveIv::from_wire(self.counter_prefix(), self.width, nonce) else {
            unreachable!("stored prefix always matches the frame width");
        };
        iv
    }

    /// Embedded counter value (low 16 bits only for `Counter2`).
    pub fn counter(&self, nonce: &SessionNonce) -> u32 {
        self.effective_iv(nonce).counter()
    }

    /// Decrypt and validate the secure block.
    ///
    /// # Errors
    ///
    /// `UnexpectedMarker` if the decrypted markers are wrong, which is what
    /// a wrong key, wrong day or wrong nonce looks like.
    pub fn decrypt(&self, key: &DailyKey, nonce: &SessionNonce) -> Result<SecureFields> {
        let iv = self.effective_iv(nonce);
        let mut plaintext = self.secure_ciphertext;
        stream_cipher::apply(&mut plaintext, iv.as_bytes(), key);

        let Ok(block) = SecureBlock::ref_from_bytes(&plaintext[..]) else {
            unreachable!("secure buffer has the exact block size");
        };
        block.validate(self.width.prefix_len() + SECURE_OFFSET)
    }
}

fn decode_hex(text: &str) -> Result<Vec<u8>> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    hex::decode(compact).map_err(|e| ProtocolError::InvalidHex(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_clear() -> ClearFields {
        ClearFields { temperature: -5, humidity: 61, gyro: [12, -3, 127] }
    }

    fn sample_secure() -> SecureFields {
        SecureFields { accel_magnitude: 10, latitude: 451_234_567, longitude: -76_543_210 }
    }

    fn sample_frame(width: IvWidth) -> TelemetryFrame {
        let iv = EffectiveIv::new(0x0102_0304, width, &SessionNonce::zero());
        TelemetryFrame::encode(&iv, width, &sample_clear(), &sample_secure())
    }

    #[test]
    fn block_sizes() {
        assert_eq!(CLEAR_BLOCK_SIZE, 9);
        assert_eq!(SECURE_BLOCK_SIZE, 11);
        assert_eq!(TelemetryFrame::BODY_SIZE, 21);
        assert_eq!(TelemetryFrame::size_for(IvWidth::Counter2), 23);
        assert_eq!(TelemetryFrame::size_for(IvWidth::Counter4), 25);
        assert_eq!(TelemetryFrame::size_for(IvWidth::Full16), 37);
    }

    #[test]
    fn counter4_layout_is_byte_exact() {
        let frame = sample_frame(IvWidth::Counter4);

        assert_eq!(
            frame.as_bytes(),
            &[
                0x04, 0x03, 0x02, 0x01, // counter LE
                0x08, 0x01, 0xFB, 0x02, 0x3D, 0x03, 0x0C, 0xFD, 0x7F, // clear block
                0x0B, // secure length
                0x04, 0x0A, 0x05, // accel, position marker
                0x07, 0x4B, 0xE5, 0x1A, // latitude LE
                0x16, 0x0B, 0x70, 0xFB, // longitude LE
            ]
        );
    }

    #[test]
    fn counter2_prefix_holds_low_bytes() {
        let frame = sample_frame(IvWidth::Counter2);
        assert_eq!(frame.counter_prefix(), &[0x04, 0x03]);
        assert_eq!(frame.len(), 23);
    }

    #[test]
    fn full16_prefix_is_effective_iv() {
        let frame = sample_frame(IvWidth::Full16);
        let iv = EffectiveIv::new(0x0102_0304, IvWidth::Full16, &SessionNonce::zero());
        assert_eq!(frame.counter_prefix(), iv.as_bytes());
    }

    #[test]
    fn regions_are_disjoint_and_cover_frame() {
        for width in [IvWidth::Counter2, IvWidth::Counter4, IvWidth::Full16] {
            let frame = sample_frame(width);
            assert_eq!(frame.clear_region().len() + frame.secure_region().len(), frame.len());
            assert_eq!(frame.secure_region()[0], marker::ACCELEROMETER);
        }
    }

    #[test]
    fn parse_extracts_clear_fields() {
        let frame = sample_frame(IvWidth::Counter4);
        let parsed = frame.parse().unwrap();
        assert_eq!(parsed.clear, sample_clear());
        assert_eq!(parsed.counter(&SessionNonce::zero()), 0x0102_0304);
    }

    #[test]
    fn parse_rejects_corrupted_marker() {
        let frame = sample_frame(IvWidth::Counter2);
        let mut bytes = frame.as_bytes().to_vec();
        bytes[2 + 3] = 0x09;

        let corrupted = TelemetryFrame::from_bytes(&bytes, IvWidth::Counter2).unwrap();
        assert_eq!(
            corrupted.parse(),
            Err(ProtocolError::UnexpectedMarker {
                offset: 5,
                expected: marker::HUMIDITY,
                actual: 0x09
            })
        );
    }

    #[test]
    fn parse_rejects_wrong_block_length() {
        let mut bytes = sample_frame(IvWidth::Counter2).as_bytes().to_vec();
        bytes[2 + SECURE_LEN_OFFSET] = 12;

        let corrupted = TelemetryFrame::from_bytes(&bytes, IvWidth::Counter2).unwrap();
        assert!(matches!(
            corrupted.parse(),
            Err(ProtocolError::UnexpectedBlockLength { expected: 11, actual: 12, .. })
        ));
    }

    #[test]
    fn from_bytes_rejects_wrong_size() {
        let result = TelemetryFrame::from_bytes(&[0u8; 24], IvWidth::Counter4);
        assert_eq!(result, Err(ProtocolError::FrameSizeMismatch { expected: 25, actual: 24 }));
    }

    #[test]
    fn hex_roundtrip_accepts_spaced_lowercase() {
        let frame = sample_frame(IvWidth::Counter4);
        let spaced = frame
            .as_bytes()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect::<Vec<_>>()
            .join(" ");

        assert_eq!(TelemetryFrame::from_hex(&spaced, IvWidth::Counter4).unwrap(), frame);
        assert_eq!(TelemetryFrame::from_hex(&frame.to_hex(), IvWidth::Counter4).unwrap(), frame);
    }

    #[test]
    fn from_hex_rejects_garbage() {
        assert!(matches!(
            TelemetryFrame::from_hex("zz", IvWidth::Counter2),
            Err(ProtocolError::InvalidHex(_))
        ));
    }

    #[test]
    fn split_batch_preserves_order() {
        let first = sample_frame(IvWidth::Counter2);
        let iv = EffectiveIv::new(9, IvWidth::Counter2, &SessionNonce::zero());
        let second = TelemetryFrame::encode(
            &iv,
            IvWidth::Counter2,
            &ClearFields::default(),
            &sample_secure(),
        );

        let mut payload = first.as_bytes().to_vec();
        payload.extend_from_slice(second.as_bytes());

        let frames = TelemetryFrame::split_batch(&payload, IvWidth::Counter2).unwrap();
        assert_eq!(frames, vec![first, second]);
    }

    #[test]
    fn split_batch_rejects_partial_frame() {
        let result = TelemetryFrame::split_batch(&[0u8; 30], IvWidth::Counter2);
        assert_eq!(result, Err(ProtocolError::MisalignedBatch { len: 30, frame_size: 23 }));
    }

    #[test]
    fn decrypt_recovers_secure_fields() {
        let key = DailyKey::from_bytes([0x33; 16]);
        let nonce = SessionNonce::zero();
        let mut frame = sample_frame(IvWidth::Counter4);

        let iv = EffectiveIv::new(0x0102_0304, IvWidth::Counter4, &nonce);
        stream_cipher::apply(frame.secure_region_mut(), iv.as_bytes(), &key);
        assert_ne!(frame.secure_region()[0], marker::ACCELEROMETER);

        let parsed = frame.parse().unwrap();
        assert_eq!(parsed.decrypt(&key, &nonce).unwrap(), sample_secure());
    }

    #[test]
    fn decrypt_with_wrong_key_does_not_recover_fields() {
        let key = DailyKey::from_bytes([0x33; 16]);
        let nonce = SessionNonce::zero();
        let mut frame = sample_frame(IvWidth::Counter4);

        let iv = EffectiveIv::new(0x0102_0304, IvWidth::Counter4, &nonce);
        stream_cipher::apply(frame.secure_region_mut(), iv.as_bytes(), &key);

        let parsed = frame.parse().unwrap();
        let wrong = DailyKey::from_bytes([0x44; 16]);
        assert_ne!(parsed.decrypt(&wrong, &nonce), Ok(sample_secure()));
    }
}
