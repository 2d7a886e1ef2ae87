// ============================================
// File: crates/zbsec-core/src/crypto/mmo.rs
// ============================================
//! # AES-MMO Hash and Keyed Hash
//!
//! ## Creation Reason
//! Zigbee derives link keys from install codes, hashes link keys into
//! key-transport/key-load keys and runs the CBKE KDF and confirmation MACs
//! all on a single hash: Matyas-Meyer-Oseas over AES-128.
//!
//! ## Construction
//! ```text
//! H_0 = 0^128
//! H_j = E(H_{j-1}, M_j) ⊕ M_j
//!
//! Padding (l = bit length):
//!   l < 2^16  : M ‖ 1 ‖ 0^k ‖ l (16 bit)          l+1+k ≡ 112 (mod 128)
//!   otherwise : M ‖ 1 ‖ 0^k ‖ l (32 bit) ‖ 0^16   l+1+k ≡  80 (mod 128)
//!
//! HMAC-MMO(K, M) = H((K ⊕ opad) ‖ H((K ⊕ ipad) ‖ M))   block = 16 bytes
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Inputs are byte-aligned; bit-granular messages are not supported
//! - The chaining value is used as the AES *key*, the block as plaintext

use zeroize::Zeroize;

use super::block::AesBlock;
use super::keys::Key;
use super::BLOCK_SIZE;

/// Digest size.
pub const MMO_DIGEST_SIZE: usize = BLOCK_SIZE;

/// HMAC inner pad byte.
const IPAD: u8 = 0x36;
/// HMAC outer pad byte.
const OPAD: u8 = 0x5c;

/// Key-transport key derivation input.
pub const KEY_TRANSPORT_HASH_INPUT: u8 = 0x00;
/// Key-load key derivation input.
pub const KEY_LOAD_HASH_INPUT: u8 = 0x02;

/// Messages of this many bits or more use the long padding form.
const SHORT_FORM_LIMIT_BITS: u64 = 1 << 16;

// ============================================
// MmoHash
// ============================================

/// Incremental AES-MMO hasher.
///
/// # Example
/// ```
/// use zbsec_core::crypto::mmo::{mmo_hash, MmoHash};
///
/// let mut hasher = MmoHash::new();
/// hasher.update(b"Zig");
/// hasher.update(b"bee");
/// assert_eq!(hasher.finalize(), mmo_hash(b"Zigbee"));
/// ```
#[derive(Clone)]
pub struct MmoHash {
    state: [u8; BLOCK_SIZE],
    buffer: [u8; BLOCK_SIZE],
    buffered: usize,
    total_len: u64,
}

impl MmoHash {
    /// Creates a hasher with the all-zero initial value.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: [0u8; BLOCK_SIZE],
            buffer: [0u8; BLOCK_SIZE],
            buffered: 0,
            total_len: 0,
        }
    }

    fn compress(&mut self, block: &[u8; BLOCK_SIZE]) {
        let mut out = AesBlock::new(&self.state).encrypt_copy(block);
        for (o, m) in out.iter_mut().zip(block) {
            *o ^= m;
        }
        self.state = out;
    }

    /// Absorbs more input.
    pub fn update(&mut self, mut data: &[u8]) {
        self.total_len += data.len() as u64;

        if self.buffered > 0 {
            let take = (BLOCK_SIZE - self.buffered).min(data.len());
            self.buffer[self.buffered..self.buffered + take].copy_from_slice(&data[..take]);
            self.buffered += take;
            data = &data[take..];
            if self.buffered < BLOCK_SIZE {
                return;
            }
            let block = self.buffer;
            self.compress(&block);
            self.buffered = 0;
        }

        let mut chunks = data.chunks_exact(BLOCK_SIZE);
        for chunk in &mut chunks {
            let mut block = [0u8; BLOCK_SIZE];
            block.copy_from_slice(chunk);
            self.compress(&block);
        }

        let rest = chunks.remainder();
        self.buffer[..rest.len()].copy_from_slice(rest);
        self.buffered = rest.len();
    }

    /// Applies padding and returns the digest.
    #[must_use]
    pub fn finalize(mut self) -> [u8; MMO_DIGEST_SIZE] {
        let bit_len = self.total_len * 8;

        // Trailer placement within the final block
        let (trailer_at, trailer): (usize, Vec<u8>) = if bit_len < SHORT_FORM_LIMIT_BITS {
            (BLOCK_SIZE - 2, (bit_len as u16).to_be_bytes().to_vec())
        } else {
            let mut t = (bit_len as u32).to_be_bytes().to_vec();
            t.extend_from_slice(&[0, 0]);
            (BLOCK_SIZE - 6, t)
        };

        let mut block = [0u8; BLOCK_SIZE];
        block[..self.buffered].copy_from_slice(&self.buffer[..self.buffered]);
        block[self.buffered] = 0x80;

        if self.buffered + 1 > trailer_at {
            self.compress(&block);
            block = [0u8; BLOCK_SIZE];
        }
        block[trailer_at..].copy_from_slice(&trailer);
        self.compress(&block);

        let digest = self.state;
        self.buffer.zeroize();
        self.state.zeroize();
        digest
    }
}

impl Default for MmoHash {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================
// Functions
// ============================================

/// One-shot AES-MMO hash.
#[must_use]
pub fn mmo_hash(data: &[u8]) -> [u8; MMO_DIGEST_SIZE] {
    let mut hasher = MmoHash::new();
    hasher.update(data);
    hasher.finalize()
}

/// HMAC over AES-MMO with a 16-byte block.
#[must_use]
pub fn hmac_mmo(key: &[u8], message: &[u8]) -> [u8; MMO_DIGEST_SIZE] {
    let mut k0 = [0u8; BLOCK_SIZE];
    if key.len() > BLOCK_SIZE {
        k0 = mmo_hash(key);
    } else {
        k0[..key.len()].copy_from_slice(key);
    }

    let mut pad = [0u8; BLOCK_SIZE];
    for (p, k) in pad.iter_mut().zip(&k0) {
        *p = k ^ IPAD;
    }
    let mut inner = MmoHash::new();
    inner.update(&pad);
    inner.update(message);
    let inner_digest = inner.finalize();

    for (p, k) in pad.iter_mut().zip(&k0) {
        *p = k ^ OPAD;
    }
    let mut outer = MmoHash::new();
    outer.update(&pad);
    outer.update(&inner_digest);

    pad.zeroize();
    k0.zeroize();
    outer.finalize()
}

/// Key-transport key: `HMAC-MMO(link_key, 0x00)`.
#[must_use]
pub fn transport_key(link_key: &Key) -> Key {
    Key::from_bytes(hmac_mmo(link_key.as_bytes(), &[KEY_TRANSPORT_HASH_INPUT]))
}

/// Key-load key: `HMAC-MMO(link_key, 0x02)`.
#[must_use]
pub fn key_load_key(link_key: &Key) -> Key {
    Key::from_bytes(hmac_mmo(link_key.as_bytes(), &[KEY_LOAD_HASH_INPUT]))
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_byte_vector() {
        assert_eq!(hex::encode(mmo_hash(&[0xC0])), "ae3a102a28d43ee0d4a09e22788b206c");
    }

    #[test]
    fn test_install_code_vector() {
        let code = hex::decode("83fed3407a939723a5c639b26916d505c3b5").unwrap();
        assert_eq!(hex::encode(mmo_hash(&code)), "66b6900981e1ee3ca4206b6b861c02bb");
    }

    #[test]
    fn test_incremental_matches_one_shot() {
        let data: Vec<u8> = (0..200u8).collect();
        for split in [0usize, 1, 13, 14, 15, 16, 17, 31, 32, 199] {
            let mut hasher = MmoHash::new();
            hasher.update(&data[..split]);
            hasher.update(&data[split..]);
            assert_eq!(hasher.finalize(), mmo_hash(&data), "split {split}");
        }
    }

    #[test]
    fn test_padding_boundaries_distinct() {
        // 13, 14 and 16 bytes straddle the extra-block boundary
        let digests: Vec<_> = [13usize, 14, 15, 16]
            .iter()
            .map(|&n| mmo_hash(&vec![0u8; n]))
            .collect();
        for i in 0..digests.len() {
            for j in i + 1..digests.len() {
                assert_ne!(digests[i], digests[j]);
            }
        }
    }

    #[test]
    fn test_long_form_padding_runs() {
        // 8192 bytes = 2^16 bits switches to the 32-bit length trailer
        let long = vec![0xA5u8; 8192];
        let shorter = vec![0xA5u8; 8191];
        assert_ne!(mmo_hash(&long), mmo_hash(&shorter));
    }

    #[test]
    fn test_hmac_matches_definition() {
        let key = [0x40u8, 0x41, 0x42, 0x43, 0x44, 0x45, 0x46, 0x47, 0x48, 0x49, 0x4a, 0x4b, 0x4c, 0x4d, 0x4e, 0x4f];
        let msg = [0xC0u8];

        let mut inner_input: Vec<u8> = key.iter().map(|k| k ^ 0x36).collect();
        inner_input.extend_from_slice(&msg);
        let inner = mmo_hash(&inner_input);
        let mut outer_input: Vec<u8> = key.iter().map(|k| k ^ 0x5c).collect();
        outer_input.extend_from_slice(&inner);

        assert_eq!(hmac_mmo(&key, &msg), mmo_hash(&outer_input));
    }

    #[test]
    fn test_hashed_link_keys_differ() {
        let link = Key::zigbee_alliance_09();
        let transport = transport_key(&link);
        let load = key_load_key(&link);
        assert_ne!(transport, load);
        assert_ne!(transport, link);
        assert_eq!(transport, transport_key(&link));
    }
}
