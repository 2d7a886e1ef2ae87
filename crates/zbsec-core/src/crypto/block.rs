// ============================================
// File: crates/zbsec-core/src/crypto/block.rs
// ============================================
//! AES-128 single-block helper shared by CCM* and AES-MMO.

use aes::cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit};
use aes::Aes128;

use super::{BLOCK_SIZE, KEY_SIZE};

/// AES-128 keyed for single-block encryption.
#[derive(Clone)]
pub(crate) struct AesBlock {
    cipher: Aes128,
}

impl AesBlock {
    pub(crate) fn new(key: &[u8; KEY_SIZE]) -> Self {
        Self {
            cipher: Aes128::new(GenericArray::from_slice(key)),
        }
    }

    /// Encrypts one block in place.
    pub(crate) fn encrypt(&self, block: &mut [u8; BLOCK_SIZE]) {
        let generic = GenericArray::from_mut_slice(block);
        self.cipher.encrypt_block(generic);
    }

    /// Encrypts a copy of `block`.
    pub(crate) fn encrypt_copy(&self, block: &[u8; BLOCK_SIZE]) -> [u8; BLOCK_SIZE] {
        let mut out = *block;
        self.encrypt(&mut out);
        out
    }
}

/// XORs `b` into `a`.
#[inline]
pub(crate) fn xor_into(a: &mut [u8; BLOCK_SIZE], b: &[u8]) {
    for (x, y) in a.iter_mut().zip(b) {
        *x ^= y;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fips197_vector() {
        // FIPS-197 Appendix C.1
        let key: [u8; 16] = hex::decode("000102030405060708090a0b0c0d0e0f")
            .unwrap()
            .try_into()
            .unwrap();
        let plain: [u8; 16] = hex::decode("00112233445566778899aabbccddeeff")
            .unwrap()
            .try_into()
            .unwrap();
        let out = AesBlock::new(&key).encrypt_copy(&plain);
        assert_eq!(hex::encode(out), "69c4e0d86a7b0430d8cdb78070b4c55a");
    }

    #[test]
    fn test_xor_into_partial() {
        let mut a = [0xFFu8; 16];
        xor_into(&mut a, &[0x0F, 0xF0]);
        assert_eq!(a[0], 0xF0);
        assert_eq!(a[1], 0x0F);
        assert_eq!(a[2], 0xFF);
    }
}
