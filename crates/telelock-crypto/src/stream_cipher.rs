//! AES-128 in counter mode
//!
//! The 16-byte input vector is the initial counter block; the whole block
//! is incremented as one 128-bit big-endian integer, matching the
//! `aes-128-ctr` mode of common receiver-side libraries.
//!
//! Encryption and decryption are the same operation. The function is pure
//! apart from mutating the buffer; there is no nonce tracking here.

use aes::Aes128;
use ctr::{
    Ctr128BE,
    cipher::{KeyIvInit, StreamCipher},
};

use crate::daily_key::DailyKey;

/// AES block size in bytes.
pub const BLOCK_SIZE: usize = 16;

/// Input vector size in bytes (one full counter block).
pub const IV_SIZE: usize = 16;

type Aes128Ctr = Ctr128BE<Aes128>;

/// XOR `buffer` in place with the keystream for (`key`, `iv`).
///
/// Applying this twice with the same key and IV restores the original
/// bytes. Any buffer length is accepted, including zero.
///
/// # Security
///
/// - Caller MUST NOT reuse an (`key`, `iv`) pair: two ciphertexts under the
///   same pair leak the XOR of their plaintexts
/// - No integrity: flipped ciphertext bits flip the same plaintext bits
pub fn apply(buffer: &mut [u8], iv: &[u8; IV_SIZE], key: &DailyKey) {
    let mut cipher = Aes128Ctr::new(key.as_bytes().into(), iv.into());

    // Keystream length is bounded by 2^128 blocks; no frame comes close
    let Ok(()) = cipher.try_apply_keystream(buffer) else {
        unreachable!("AES-128-CTR keystream cannot be exhausted by a single buffer");
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> DailyKey {
        let mut key = [0u8; 16];
        key.copy_from_slice(&hex::decode("87f191a455a1ac2ed1ad1babf9400f19").unwrap());
        DailyKey::from_bytes(key)
    }

    fn counter_iv(counter: u32) -> [u8; IV_SIZE] {
        let mut iv = [0u8; IV_SIZE];
        iv[0..4].copy_from_slice(&counter.to_le_bytes());
        iv
    }

    #[test]
    fn matches_known_answer() {
        let mut buffer: Vec<u8> = (0u8..40).collect();
        apply(&mut buffer, &counter_iv(7), &test_key());

        assert_eq!(
            hex::encode(&buffer),
            "77da84547392aa7b56aba138aa235b55e065274833982756c009a1a781862724630cfb52b0bc8970"
        );
    }

    #[test]
    fn counter_carries_across_full_block() {
        // Counter block ends in 0xFFFFFFFF; the second block must carry into
        // byte 11 rather than wrapping the low 32 bits
        let mut iv = [0u8; IV_SIZE];
        iv[12..16].copy_from_slice(&[0xFF; 4]);

        let mut buffer = [0u8; 32];
        apply(&mut buffer, &iv, &test_key());

        assert_eq!(
            hex::encode(buffer),
            "c77db874e12196718a37f471b14a4acd8c5d32136f0b3e846b976ed889d540c2"
        );
    }

    #[test]
    fn empty_buffer_is_untouched() {
        let mut buffer: [u8; 0] = [];
        apply(&mut buffer, &counter_iv(0), &test_key());
        assert!(buffer.is_empty());
    }

    #[test]
    fn applying_twice_restores_plaintext() {
        let original = b"sensitive telemetry".to_vec();
        let mut buffer = original.clone();

        apply(&mut buffer, &counter_iv(1), &test_key());
        assert_ne!(buffer, original);

        apply(&mut buffer, &counter_iv(1), &test_key());
        assert_eq!(buffer, original);
    }

    #[test]
    fn different_iv_produces_different_ciphertext() {
        let mut a = [0u8; 10];
        let mut b = [0u8; 10];
        apply(&mut a, &counter_iv(1), &test_key());
        apply(&mut b, &counter_iv(2), &test_key());
        assert_ne!(a, b);
    }

    #[test]
    fn wrong_key_does_not_decrypt() {
        let original = [0x42u8; 10];
        let mut buffer = original;
        apply(&mut buffer, &counter_iv(3), &test_key());

        let other = DailyKey::from_bytes([0x11; 16]);
        apply(&mut buffer, &counter_iv(3), &other);
        assert_ne!(buffer, original);
    }
}
