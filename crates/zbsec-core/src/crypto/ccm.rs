// ============================================
// File: crates/zbsec-core/src/crypto/ccm.rs
// ============================================
//! # CCM* Frame Protection
//!
//! ## Creation Reason
//! Zigbee secures NWK and APS payloads with CCM*, the CCM variant that also
//! allows encryption-only (`M = 0`) operation. This module implements it on
//! top of the AES-128 block primitive.
//!
//! ## Main Functionality
//! - `FrameCrypto`: Trait for frame protection engines
//! - `CcmStarCrypto`: Software implementation
//! - `protect` / `unprotect`: Convenience wrappers around the default engine
//!
//! ## Construction (L = 2, 13-byte nonce)
//! ```text
//! B0    = flags ‖ nonce ‖ l(m)            flags = Adata<<6 | M'<<3 | 1
//! AAD   = l(a) (2 BE) ‖ a ‖ zero pad to 16
//! MSG   = m ‖ zero pad to 16
//! T     = CBC-MAC(B0 ‖ AAD ‖ MSG)[..M]
//! A_i   = 0x01 ‖ nonce ‖ i (2 BE)
//! C     = m ⊕ E(A_1) ‖ E(A_2) ‖ ...
//! U     = T ⊕ E(A_0)[..M]
//! ```
//!
//! ## Level Mapping
//! - Encrypted levels: a = aux-inclusive header, m = payload
//! - MIC-only levels: a = header ‖ payload, m = empty
//! - `None`: pass-through, never reported as secured
//!
//! ## ⚠️ Important Note for Next Developer
//! - The MIC is compared in constant time
//! - Decrypted plaintext is wiped before `AuthenticationFailed` is returned
//! - Never reuse (key, nonce): the frame counter makes the nonce unique
//!
//! ## Last Modified
//! v0.1.0 - Initial CCM* implementation

use subtle::ConstantTimeEq;
use tracing::trace;
use zeroize::Zeroize;

use super::block::{xor_into, AesBlock};
use super::keys::Key;
use super::BLOCK_SIZE;
use crate::error::{CoreError, Result};
use crate::protocol::{Nonce, SecurityLevel};

// ============================================
// Constants
// ============================================

/// Associated data must be shorter than this (2^16 - 2^8).
pub const MAX_AAD_LENGTH: usize = 0xFF00;

/// Message must be shorter than this (2^(8L) with L = 2).
pub const MAX_MESSAGE_LENGTH: usize = 0x1_0000;

/// Adata flag in the B0 block.
const FLAG_ADATA: u8 = 0x40;

/// L' = L - 1 with L = 2.
const FLAG_L_PRIME: u8 = 0x01;

// ============================================
// Protected
// ============================================

/// Output of frame protection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Protected {
    /// Ciphertext (encrypted levels) or the unchanged payload.
    pub body: Vec<u8>,
    /// Encrypted authentication tag, `M` bytes.
    pub mic: Vec<u8>,
}

impl Protected {
    /// Concatenates body and MIC as they appear on the wire.
    #[must_use]
    pub fn into_wire(mut self) -> Vec<u8> {
        self.body.extend_from_slice(&self.mic);
        self.body
    }
}

// ============================================
// FrameCrypto Trait
// ============================================

/// Trait for frame protection engines.
///
/// # Purpose
/// Abstracts CCM* so that a radio's hardware AES/CCM engine can replace the
/// software implementation, and so tests can inject failures.
pub trait FrameCrypto: Send + Sync {
    /// Protects a payload.
    ///
    /// # Arguments
    /// * `key` - 128-bit key
    /// * `nonce` - 13-byte nonce built from the substituted header
    /// * `level` - Security level selecting M and encryption
    /// * `header` - Frame header plus aux header (authenticated only)
    /// * `payload` - Data to protect
    ///
    /// # Errors
    /// `InvalidArgument` if the header or payload exceeds CCM* limits.
    fn protect(
        &self,
        key: &Key,
        nonce: &Nonce,
        level: SecurityLevel,
        header: &[u8],
        payload: &[u8],
    ) -> Result<Protected>;

    /// Authenticates and decrypts a payload.
    ///
    /// # Errors
    /// - `AuthenticationFailed`: MIC mismatch or wrong MIC length
    /// - `InvalidArgument`: CCM* length limits exceeded
    fn unprotect(
        &self,
        key: &Key,
        nonce: &Nonce,
        level: SecurityLevel,
        header: &[u8],
        body: &[u8],
        mic: &[u8],
    ) -> Result<Vec<u8>>;
}

// ============================================
// CcmStarCrypto
// ============================================

/// Software CCM* on AES-128.
#[derive(Debug, Default, Clone, Copy)]
pub struct CcmStarCrypto;

impl CcmStarCrypto {
    /// Creates a new instance.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn check_limits(aad_len: usize, msg_len: usize) -> Result<()> {
        if aad_len >= MAX_AAD_LENGTH {
            return Err(CoreError::invalid_argument(
                "header",
                format!("{aad_len} bytes of associated data, limit is {}", MAX_AAD_LENGTH - 1),
            ));
        }
        if msg_len >= MAX_MESSAGE_LENGTH {
            return Err(CoreError::invalid_argument(
                "payload",
                format!("{msg_len} bytes of message, limit is {}", MAX_MESSAGE_LENGTH - 1),
            ));
        }
        Ok(())
    }

    /// Counter block `A_i`.
    fn counter_block(nonce: &Nonce, index: u16) -> [u8; BLOCK_SIZE] {
        let mut block = [0u8; BLOCK_SIZE];
        block[0] = FLAG_L_PRIME;
        block[1..14].copy_from_slice(nonce.as_bytes());
        block[14..].copy_from_slice(&index.to_be_bytes());
        block
    }

    /// CBC-MAC over B0, the length-prefixed associated data and the message.
    fn cbc_mac(
        aes: &AesBlock,
        nonce: &Nonce,
        mic_len: usize,
        aad: &[u8],
        msg: &[u8],
    ) -> [u8; BLOCK_SIZE] {
        // M' = (M - 2) / 2, with M = 0 encoded as 0
        let m_prime = if mic_len == 0 { 0 } else { ((mic_len - 2) / 2) as u8 };
        let adata = if aad.is_empty() { 0 } else { FLAG_ADATA };

        let mut x = [0u8; BLOCK_SIZE];
        x[0] = adata | (m_prime << 3) | FLAG_L_PRIME;
        x[1..14].copy_from_slice(nonce.as_bytes());
        x[14..].copy_from_slice(&(msg.len() as u16).to_be_bytes());
        aes.encrypt(&mut x);

        if !aad.is_empty() {
            // First block carries l(a) in two bytes
            let mut block = [0u8; BLOCK_SIZE];
            block[..2].copy_from_slice(&(aad.len() as u16).to_be_bytes());
            let first = aad.len().min(BLOCK_SIZE - 2);
            block[2..2 + first].copy_from_slice(&aad[..first]);
            xor_into(&mut x, &block);
            aes.encrypt(&mut x);

            for chunk in aad[first..].chunks(BLOCK_SIZE) {
                xor_into(&mut x, chunk);
                aes.encrypt(&mut x);
            }
        }

        for chunk in msg.chunks(BLOCK_SIZE) {
            xor_into(&mut x, chunk);
            aes.encrypt(&mut x);
        }

        x
    }

    /// XORs the key stream `E(A_1) ‖ E(A_2) ‖ ...` into `data`.
    fn ctr_xor(aes: &AesBlock, nonce: &Nonce, data: &mut [u8]) {
        for (i, chunk) in data.chunks_mut(BLOCK_SIZE).enumerate() {
            // i < 4096 by the message length limit
            let stream = aes.encrypt_copy(&Self::counter_block(nonce, (i + 1) as u16));
            for (byte, s) in chunk.iter_mut().zip(stream.iter()) {
                *byte ^= s;
            }
        }
    }

    /// Encrypted tag `U = T ⊕ E(A_0)`, truncated to `M`.
    fn encrypted_tag(aes: &AesBlock, nonce: &Nonce, tag: &[u8; BLOCK_SIZE], mic_len: usize) -> Vec<u8> {
        let s0 = aes.encrypt_copy(&Self::counter_block(nonce, 0));
        tag.iter().zip(s0.iter()).take(mic_len).map(|(t, s)| t ^ s).collect()
    }
}

impl FrameCrypto for CcmStarCrypto {
    fn protect(
        &self,
        key: &Key,
        nonce: &Nonce,
        level: SecurityLevel,
        header: &[u8],
        payload: &[u8],
    ) -> Result<Protected> {
        if !level.is_secured() {
            trace!("[CCM] Level NONE, payload passed through");
            return Ok(Protected {
                body: payload.to_vec(),
                mic: Vec::new(),
            });
        }

        let mic_len = level.mic_length();
        let aes = AesBlock::new(key.as_bytes());

        let (body, mic) = if level.is_encrypted() {
            Self::check_limits(header.len(), payload.len())?;
            let mic = if mic_len > 0 {
                let tag = Self::cbc_mac(&aes, nonce, mic_len, header, payload);
                Self::encrypted_tag(&aes, nonce, &tag, mic_len)
            } else {
                Vec::new()
            };
            let mut body = payload.to_vec();
            Self::ctr_xor(&aes, nonce, &mut body);
            (body, mic)
        } else {
            let mut aad = Vec::with_capacity(header.len() + payload.len());
            aad.extend_from_slice(header);
            aad.extend_from_slice(payload);
            Self::check_limits(aad.len(), 0)?;
            let tag = Self::cbc_mac(&aes, nonce, mic_len, &aad, &[]);
            (payload.to_vec(), Self::encrypted_tag(&aes, nonce, &tag, mic_len))
        };

        trace!(
            level = %level,
            body_len = body.len(),
            mic_len = mic.len(),
            "[CCM] Payload protected"
        );

        Ok(Protected { body, mic })
    }

    fn unprotect(
        &self,
        key: &Key,
        nonce: &Nonce,
        level: SecurityLevel,
        header: &[u8],
        body: &[u8],
        mic: &[u8],
    ) -> Result<Vec<u8>> {
        if !level.is_secured() {
            return Ok(body.to_vec());
        }

        let mic_len = level.mic_length();
        if mic.len() != mic_len {
            trace!(expected = mic_len, actual = mic.len(), "[CCM] MIC length mismatch");
            return Err(CoreError::AuthenticationFailed);
        }

        let aes = AesBlock::new(key.as_bytes());

        let (mut plaintext, expected) = if level.is_encrypted() {
            Self::check_limits(header.len(), body.len())?;
            let mut plaintext = body.to_vec();
            Self::ctr_xor(&aes, nonce, &mut plaintext);
            let expected = if mic_len > 0 {
                let tag = Self::cbc_mac(&aes, nonce, mic_len, header, &plaintext);
                Self::encrypted_tag(&aes, nonce, &tag, mic_len)
            } else {
                Vec::new()
            };
            (plaintext, expected)
        } else {
            let mut aad = Vec::with_capacity(header.len() + body.len());
            aad.extend_from_slice(header);
            aad.extend_from_slice(body);
            Self::check_limits(aad.len(), 0)?;
            let tag = Self::cbc_mac(&aes, nonce, mic_len, &aad, &[]);
            (body.to_vec(), Self::encrypted_tag(&aes, nonce, &tag, mic_len))
        };

        if !bool::from(expected.ct_eq(mic)) {
            plaintext.zeroize();
            trace!(level = %level, "[CCM] MIC verification failed");
            return Err(CoreError::AuthenticationFailed);
        }

        Ok(plaintext)
    }
}

// ============================================
// Convenience Functions
// ============================================

/// Protects a payload with the default engine.
///
/// # Errors
/// See [`FrameCrypto::protect`].
pub fn protect(
    key: &Key,
    nonce: &Nonce,
    level: SecurityLevel,
    header: &[u8],
    payload: &[u8],
) -> Result<Protected> {
    CcmStarCrypto::new().protect(key, nonce, level, header, payload)
}

/// Authenticates and decrypts with the default engine.
///
/// # Errors
/// See [`FrameCrypto::unprotect`].
pub fn unprotect(
    key: &Key,
    nonce: &Nonce,
    level: SecurityLevel,
    header: &[u8],
    body: &[u8],
    mic: &[u8],
) -> Result<Vec<u8>> {
    CcmStarCrypto::new().unprotect(key, nonce, level, header, body, mic)
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{AuxiliarySecurityHeader, KeyIdentifier};
    use zbsec_common::ExtendedAddress;

    fn test_key() -> Key {
        Key::from_bytes([0x42u8; 16])
    }

    fn test_nonce() -> Nonce {
        Nonce::new(ExtendedAddress::new(0x0011_2233_4455_6677), 12, 0x2d)
    }

    fn unhex(s: &str) -> Vec<u8> {
        hex::decode(s).unwrap()
    }

    #[test]
    fn test_rfc3610_packet_vector_1() {
        let key = Key::from_slice(&unhex("c0c1c2c3c4c5c6c7c8c9cacbcccdcecf")).unwrap();
        let nonce = Nonce::from_bytes(unhex("00000003020100a0a1a2a3a4a5").try_into().unwrap());
        let header = unhex("0001020304050607");
        let payload = unhex("08090a0b0c0d0e0f101112131415161718191a1b1c1d1e");

        let out = protect(&key, &nonce, SecurityLevel::EncMic64, &header, &payload).unwrap();
        assert_eq!(hex::encode(&out.body), "588c979a61c663d2f066d0c2c0f989806d5f6b61dac384");
        assert_eq!(hex::encode(&out.mic), "17e8d12cfdf926e0");

        let plain =
            unprotect(&key, &nonce, SecurityLevel::EncMic64, &header, &out.body, &out.mic).unwrap();
        assert_eq!(plain, payload);
    }

    /// ZigBee Annex C.6.1: key C0..CF, source A0..A7 (LE), counter 0x00010203.
    #[test]
    fn test_zigbee_annex_c6_vector() {
        let key = Key::from_slice(&unhex("c0c1c2c3c4c5c6c7c8c9cacbcccdcecf")).unwrap();
        let source = ExtendedAddress::new(0xA7A6_A5A4_A3A2_A1A0);
        let header = unhex("0001020304050607");
        let payload = unhex("08090a0b0c0d0e0f101112131415161718191a1b1c1d1e");
        let aux = AuxiliarySecurityHeader::new(
            SecurityLevel::EncMic64,
            KeyIdentifier::Link,
            0x0001_0203,
            None,
            None,
        )
        .unwrap();

        let nonce = Nonce::for_header(&aux, source);
        assert_eq!(hex::encode(nonce.as_bytes()), "a0a1a2a3a4a5a6a70302010006");

        let out = protect(&key, &nonce, aux.level, &header, &payload).unwrap();
        assert_eq!(hex::encode(&out.body), "1a55a36abb6c610d066b3375649cef10d4664ecad854a8");
        assert_eq!(hex::encode(&out.mic), "0a895cc1d8ff9469");
        let plain = unprotect(&key, &nonce, aux.level, &header, &out.body, &out.mic).unwrap();
        assert_eq!(plain, payload);

        // ENC only: M = 0, CTR keystream from A_1
        let enc = aux.with_level(SecurityLevel::Enc);
        let nonce = Nonce::for_header(&enc, source);
        let out = protect(&key, &nonce, enc.level, &header, &payload).unwrap();
        assert_eq!(hex::encode(&out.body), "e9b182b093d03cc6addeac07d768a7f4dc29a11df6d98b");
        assert!(out.mic.is_empty());
        let plain = unprotect(&key, &nonce, enc.level, &header, &out.body, &[]).unwrap();
        assert_eq!(plain, payload);

        // MIC only: header and payload both authenticated, payload in clear
        let mic = aux.with_level(SecurityLevel::Mic64);
        let nonce = Nonce::for_header(&mic, source);
        let out = protect(&key, &nonce, mic.level, &header, &payload).unwrap();
        assert_eq!(out.body, payload);
        assert_eq!(hex::encode(&out.mic), "19065f4987abf14f");
    }

    #[test]
    fn test_roundtrip_every_level_and_length() {
        let key = test_key();
        let nonce = test_nonce();
        let header = b"frame-hdr+aux";

        for level in SecurityLevel::ALL {
            for len in [0usize, 1, 15, 16, 17, 64, 127] {
                let payload: Vec<u8> = (0..len).map(|i| i as u8).collect();
                let out = protect(&key, &nonce, level, header, &payload).unwrap();
                assert_eq!(out.mic.len(), level.mic_length(), "level {level}");
                if level.is_encrypted() && len > 0 {
                    assert_ne!(out.body, payload, "level {level} len {len}");
                }
                if !level.is_encrypted() {
                    assert_eq!(out.body, payload);
                }

                let plain = unprotect(&key, &nonce, level, header, &out.body, &out.mic).unwrap();
                assert_eq!(plain, payload, "level {level} len {len}");
            }
        }
    }

    #[test]
    fn test_single_bit_tamper_rejected() {
        let key = test_key();
        let nonce = test_nonce();
        let header = b"\x48\x02\x00\x00\x2d\x0c\x00\x00\x00";
        let payload = b"on/off toggle";

        for level in SecurityLevel::ALL.into_iter().filter(|l| l.mic_length() > 0) {
            let out = protect(&key, &nonce, level, header, payload).unwrap();

            for bit in 0..header.len() * 8 {
                let mut h = header.to_vec();
                h[bit / 8] ^= 1 << (bit % 8);
                assert!(matches!(
                    unprotect(&key, &nonce, level, &h, &out.body, &out.mic),
                    Err(CoreError::AuthenticationFailed)
                ));
            }
            for bit in 0..out.body.len() * 8 {
                let mut b = out.body.clone();
                b[bit / 8] ^= 1 << (bit % 8);
                assert!(matches!(
                    unprotect(&key, &nonce, level, header, &b, &out.mic),
                    Err(CoreError::AuthenticationFailed)
                ));
            }
            for bit in 0..out.mic.len() * 8 {
                let mut m = out.mic.clone();
                m[bit / 8] ^= 1 << (bit % 8);
                assert!(matches!(
                    unprotect(&key, &nonce, level, header, &out.body, &m),
                    Err(CoreError::AuthenticationFailed)
                ));
            }
        }
    }

    #[test]
    fn test_wrong_key_or_nonce_fails() {
        let out = protect(&test_key(), &test_nonce(), SecurityLevel::EncMic32, b"hdr", b"data").unwrap();

        let other_key = Key::from_bytes([0x43u8; 16]);
        assert!(matches!(
            unprotect(&other_key, &test_nonce(), SecurityLevel::EncMic32, b"hdr", &out.body, &out.mic),
            Err(CoreError::AuthenticationFailed)
        ));

        let other_nonce = Nonce::new(ExtendedAddress::new(0x0011_2233_4455_6677), 13, 0x2d);
        assert!(matches!(
            unprotect(&test_key(), &other_nonce, SecurityLevel::EncMic32, b"hdr", &out.body, &out.mic),
            Err(CoreError::AuthenticationFailed)
        ));
    }

    #[test]
    fn test_wrong_mic_length_fails() {
        let out = protect(&test_key(), &test_nonce(), SecurityLevel::EncMic64, b"hdr", b"data").unwrap();
        assert!(matches!(
            unprotect(&test_key(), &test_nonce(), SecurityLevel::EncMic64, b"hdr", &out.body, &out.mic[..4]),
            Err(CoreError::AuthenticationFailed)
        ));
    }

    #[test]
    fn test_none_is_pass_through() {
        let out = protect(&test_key(), &test_nonce(), SecurityLevel::None, b"hdr", b"clear").unwrap();
        assert_eq!(out.body, b"clear");
        assert!(out.mic.is_empty());
        assert_eq!(out.clone().into_wire(), b"clear");
    }

    #[test]
    fn test_limits() {
        let big_header = vec![0u8; MAX_AAD_LENGTH];
        assert!(matches!(
            protect(&test_key(), &test_nonce(), SecurityLevel::EncMic32, &big_header, b"x"),
            Err(CoreError::InvalidArgument { .. })
        ));

        let big_payload = vec![0u8; MAX_MESSAGE_LENGTH];
        assert!(matches!(
            protect(&test_key(), &test_nonce(), SecurityLevel::EncMic32, b"h", &big_payload),
            Err(CoreError::InvalidArgument { .. })
        ));

        // MIC-only levels fold the payload into associated data
        let payload = vec![0u8; MAX_AAD_LENGTH];
        assert!(matches!(
            protect(&test_key(), &test_nonce(), SecurityLevel::Mic32, b"h", &payload),
            Err(CoreError::InvalidArgument { .. })
        ));
    }
}
