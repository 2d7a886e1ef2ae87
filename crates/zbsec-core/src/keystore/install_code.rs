// ============================================
// File: crates/zbsec-core/src/keystore/install_code.rs
// ============================================
//! # Install Codes
//!
//! ## Format
//! ```text
//! ┌──────────────────────────────────────┬─────────────────────┐
//! │ Code (6, 8, 12 or 16 bytes)          │ CRC-16/X-25 (2, LE) │
//! └──────────────────────────────────────┴─────────────────────┘
//! link key = AES-MMO(code ‖ CRC)
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - The CRC is checked before any key is derived
//! - The hash covers the CRC bytes too

use crc::{Crc, CRC_16_IBM_SDLC};

use crate::crypto::mmo::mmo_hash;
use crate::crypto::Key;
use crate::error::{CoreError, Result};

/// Accepted total lengths, CRC included.
pub const INSTALL_CODE_LENGTHS: [usize; 4] = [8, 10, 14, 18];

/// Trailing CRC length.
pub const INSTALL_CODE_CRC_LENGTH: usize = 2;

/// CRC-16/X-25 (reflected 0x1021, init and xorout 0xFFFF).
const X25: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_SDLC);

/// Computes the install code CRC over `code` (without trailer).
#[must_use]
pub fn install_code_crc(code: &[u8]) -> u16 {
    X25.checksum(code)
}

/// Checks length and CRC of an install code.
///
/// # Errors
/// `InvalidInstallCode` on a bad length or CRC mismatch.
pub fn validate_install_code(install_code: &[u8]) -> Result<()> {
    if !INSTALL_CODE_LENGTHS.contains(&install_code.len()) {
        return Err(CoreError::invalid_install_code(format!(
            "length {} is not one of {INSTALL_CODE_LENGTHS:?}",
            install_code.len()
        )));
    }

    let (code, trailer) = install_code.split_at(install_code.len() - INSTALL_CODE_CRC_LENGTH);
    let stored = u16::from_le_bytes([trailer[0], trailer[1]]);
    let computed = install_code_crc(code);
    if stored != computed {
        return Err(CoreError::invalid_install_code(format!(
            "CRC mismatch: stored 0x{stored:04x}, computed 0x{computed:04x}"
        )));
    }
    Ok(())
}

/// Validates an install code and derives its link key.
///
/// # Errors
/// `InvalidInstallCode` if validation fails.
pub fn derive_link_key(install_code: &[u8]) -> Result<Key> {
    validate_install_code(install_code)?;
    Ok(Key::from_bytes(mmo_hash(install_code)))
}

/// Appends the CRC trailer to a raw code.
///
/// # Errors
/// `InvalidInstallCode` if the result would not be a valid length.
pub fn append_crc(code: &[u8]) -> Result<Vec<u8>> {
    let total = code.len() + INSTALL_CODE_CRC_LENGTH;
    if !INSTALL_CODE_LENGTHS.contains(&total) {
        return Err(CoreError::invalid_install_code(format!(
            "code length {} cannot carry a CRC",
            code.len()
        )));
    }
    let mut out = code.to_vec();
    out.extend_from_slice(&install_code_crc(code).to_le_bytes());
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOLDEN: &str = "83fed3407a939723a5c639b26916d505c3b5";

    #[test]
    fn test_crc_check_value() {
        assert_eq!(install_code_crc(b"123456789"), 0x906E);
    }

    #[test]
    fn test_golden_install_code() {
        let code = hex::decode(GOLDEN).unwrap();
        let key = derive_link_key(&code).unwrap();
        assert_eq!(hex::encode(key.as_bytes()), "66b6900981e1ee3ca4206b6b861c02bb");
    }

    #[test]
    fn test_append_crc_matches_golden() {
        let code = hex::decode(GOLDEN).unwrap();
        assert_eq!(append_crc(&code[..16]).unwrap(), code);
        assert!(append_crc(&code[..5]).is_err());
    }

    #[test]
    fn test_corrupted_crc_rejected() {
        let mut code = hex::decode(GOLDEN).unwrap();
        let last = code.len() - 1;
        code[last] ^= 0x01;
        assert!(matches!(
            derive_link_key(&code),
            Err(CoreError::InvalidInstallCode { .. })
        ));
    }

    #[test]
    fn test_bad_lengths_rejected() {
        for len in [0usize, 2, 7, 9, 16, 19] {
            let code = vec![0u8; len];
            assert!(matches!(
                validate_install_code(&code),
                Err(CoreError::InvalidInstallCode { .. })
            ));
        }
    }

    #[test]
    fn test_every_length_accepted_with_valid_crc() {
        for len in INSTALL_CODE_LENGTHS {
            let raw: Vec<u8> = (0..len - 2).map(|i| i as u8).collect();
            let code = append_crc(&raw).unwrap();
            assert!(derive_link_key(&code).is_ok());
        }
    }
}
