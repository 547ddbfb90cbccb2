//! Provisioned master secret, the root of the daily key chain.

use zeroize::Zeroizing;

use crate::error::CryptoError;

/// Accepted master secret sizes in bytes (AES-128 and AES-256 sized).
const VALID_LENGTHS: [usize; 2] = [16, 32];

/// The device's long-term secret.
///
/// Only ever used to derive `DailyKey(0)`. Never transmitted, never logged.
/// The bytes are zeroized on drop.
#[derive(Clone)]
pub struct MasterSecret {
    bytes: Zeroizing<Vec<u8>>,
}

impl MasterSecret {
    /// Parse a hex-encoded master secret.
    ///
    /// Surrounding whitespace and a leading `0x` are ignored. The remaining
    /// text must be exactly 32 or 64 hex characters, in either case.
    ///
    /// # Errors
    ///
    /// - `InvalidKeyLength` if the text is not 32 or 64 characters
    /// - `InvalidKeyEncoding` if it contains non-hex characters
    pub fn from_hex(text: &str) -> Result<Self, CryptoError> {
        let trimmed = text.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        if !VALID_LENGTHS.iter().any(|len| len * 2 == digits.len()) {
            return Err(CryptoError::InvalidKeyLength { actual: digits.len() });
        }

        let bytes = hex::decode(digits)
            .map_err(|e| CryptoError::InvalidKeyEncoding { reason: e.to_string() })?;

        Ok(Self { bytes: Zeroizing::new(bytes) })
    }

    /// Wrap raw secret bytes (16 or 32 bytes).
    ///
    /// # Errors
    ///
    /// `InvalidKeyLength` reports the hex-character equivalent of the given
    /// length so both constructors speak the same unit.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if !VALID_LENGTHS.contains(&bytes.len()) {
            return Err(CryptoError::InvalidKeyLength { actual: bytes.len() * 2 });
        }

        Ok(Self { bytes: Zeroizing::new(bytes.to_vec()) })
    }

    /// Raw secret bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Secret length in bytes (16 or 32).
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always false; a master secret is never empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl std::fmt::Debug for MasterSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterSecret").field("len", &self.bytes.len()).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_32_hex_characters() {
        let secret = MasterSecret::from_hex("00112233445566778899aabbccddeeff").unwrap();
        assert_eq!(secret.len(), 16);
        assert_eq!(secret.as_bytes()[0], 0x00);
        assert_eq!(secret.as_bytes()[15], 0xFF);
    }

    #[test]
    fn parses_64_hex_characters() {
        let text = "ab".repeat(32);
        let secret = MasterSecret::from_hex(&text).unwrap();
        assert_eq!(secret.len(), 32);
        assert!(secret.as_bytes().iter().all(|&b| b == 0xAB));
    }

    #[test]
    fn accepts_prefix_whitespace_and_uppercase() {
        let lower = MasterSecret::from_hex("00112233445566778899aabbccddeeff").unwrap();
        let upper = MasterSecret::from_hex("  0x00112233445566778899AABBCCDDEEFF\n").unwrap();
        assert_eq!(lower.as_bytes(), upper.as_bytes());
    }

    #[test]
    fn rejects_wrong_length() {
        let candidates =
            [String::new(), "0011".to_string(), "a".repeat(31), "a".repeat(33), "a".repeat(63)];
        for text in &candidates {
            let result = MasterSecret::from_hex(text);
            assert_eq!(result.unwrap_err(), CryptoError::InvalidKeyLength { actual: text.len() });
        }
    }

    #[test]
    fn rejects_non_hex_characters() {
        let text = "zz112233445566778899aabbccddeeff";
        assert!(matches!(
            MasterSecret::from_hex(text),
            Err(CryptoError::InvalidKeyEncoding { .. })
        ));
    }

    #[test]
    fn from_bytes_checks_length() {
        assert!(MasterSecret::from_bytes(&[0u8; 16]).is_ok());
        assert!(MasterSecret::from_bytes(&[0u8; 32]).is_ok());
        assert_eq!(
            MasterSecret::from_bytes(&[0u8; 20]).unwrap_err(),
            CryptoError::InvalidKeyLength { actual: 40 }
        );
    }

    #[test]
    fn debug_does_not_leak_bytes() {
        let secret = MasterSecret::from_hex("00112233445566778899aabbccddeeff").unwrap();
        let rendered = format!("{secret:?}");
        assert!(!rendered.contains("0011"));
        assert!(rendered.contains("len"));
    }
}
