// ============================================
// File: crates/zbsec-core/src/error.rs
// ============================================
//! # Core Error Types
//!
//! ## Creation Reason
//! Defines the error taxonomy of the Zigbee security core. Every
//! cryptographic or structural failure is returned to the caller as a typed
//! value; nothing is retried internally.
//!
//! ## Error Categories
//! 1. **Caller errors**: `InvalidArgument`, `InvalidState`
//! 2. **Wire errors**: `MalformedHeader`, `MalformedInput` (rejected before crypto)
//! 3. **Crypto errors**: `AuthenticationFailed`, `SignatureInvalid`
//! 4. **Freshness errors**: `Replay`, `CountersExhausted`
//! 5. **Key management errors**: `KeyNotFound`, `InvalidInstallCode`
//! 6. **Key establishment errors**: `CurveMismatch`, `InvalidCertificate`,
//!    `ConfirmationFailed`, `Aborted`, `KeyAgreement`
//!
//! ## ⚠️ Important Note for Next Developer
//! - NEVER include key material or plaintext in error messages
//! - `MalformedInput` is a caller bug, `SignatureInvalid` is an attacker or
//!   content problem; keep them apart in logs
//! - `CountersExhausted` means the key must be replaced upstream
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use thiserror::Error;

use zbsec_common::error::CommonError;

// ============================================
// Result Type Alias
// ============================================

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

// ============================================
// CoreError
// ============================================

/// Core error types for frame security and key management.
#[derive(Error, Debug)]
pub enum CoreError {
    // ========================================
    // Caller Errors
    // ========================================
    /// Caller supplied an out-of-range or inconsistent argument.
    #[error("Invalid argument '{field}': {reason}")]
    InvalidArgument {
        /// Which argument
        field: String,
        /// What's wrong with it
        reason: String,
    },

    /// Operation not valid in the current state.
    #[error("Invalid state for operation: {operation} requires {required_state}")]
    InvalidState {
        /// What operation was attempted
        operation: String,
        /// What state was required
        required_state: String,
    },

    // ========================================
    // Wire Errors
    // ========================================
    /// Auxiliary security header is structurally invalid.
    #[error("Malformed security header: {reason}")]
    MalformedHeader {
        /// What's wrong with the header
        reason: String,
    },

    /// Fixed-size input buffer has the wrong length.
    #[error("Malformed input '{field}': expected {expected} bytes, got {actual}")]
    MalformedInput {
        /// Which buffer
        field: String,
        /// Required length
        expected: usize,
        /// Length supplied
        actual: usize,
    },

    // ========================================
    // Cryptographic Errors
    // ========================================
    /// MIC verification failed. No plaintext is released.
    #[error("Frame authentication failed")]
    AuthenticationFailed,

    /// Signature did not verify.
    #[error("Signature invalid: {reason}")]
    SignatureInvalid {
        /// Which check failed
        reason: String,
    },

    // ========================================
    // Freshness Errors
    // ========================================
    /// Frame counter did not advance.
    #[error("Replay detected: counter {received} not greater than {last_accepted}")]
    Replay {
        /// Counter value received
        received: u32,
        /// Last accepted counter for this key and source
        last_accepted: u32,
    },

    /// Outgoing frame counter reached its maximum for this key.
    #[error("Frame counters exhausted for {key}; key must be replaced")]
    CountersExhausted {
        /// Key identity (never key bytes)
        key: String,
    },

    // ========================================
    // Key Management Errors
    // ========================================
    /// No key matches the requested identity.
    #[error("Key not found: {identity}")]
    KeyNotFound {
        /// What was looked up
        identity: String,
    },

    /// Install code failed length or CRC validation.
    #[error("Invalid install code: {reason}")]
    InvalidInstallCode {
        /// Why validation failed
        reason: String,
    },

    // ========================================
    // Key Establishment Errors
    // ========================================
    /// Peer material belongs to a different curve/suite.
    #[error("Curve mismatch: expected {expected}, got {actual}")]
    CurveMismatch {
        /// Suite in use
        expected: String,
        /// Suite implied by the peer material
        actual: String,
    },

    /// Certificate failed layout or identifier validation.
    #[error("Invalid certificate: {reason}")]
    InvalidCertificate {
        /// Which check failed
        reason: String,
    },

    /// Key confirmation values did not match.
    #[error("Key confirmation failed")]
    ConfirmationFailed,

    /// Key establishment session was aborted.
    #[error("Key establishment aborted: {reason}")]
    Aborted {
        /// Why the session aborted
        reason: String,
    },

    /// Curve backend failed to derive a shared secret.
    #[error("Key agreement failed: {reason}")]
    KeyAgreement {
        /// Backend reason
        reason: String,
    },

    // ========================================
    // Wrapped Errors
    // ========================================
    /// Error from common crate.
    #[error(transparent)]
    Common(#[from] CommonError),
}

impl CoreError {
    // ========================================
    // Convenience Constructors
    // ========================================

    /// Creates an `InvalidArgument` error.
    pub fn invalid_argument(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates an `InvalidState` error.
    pub fn invalid_state(
        operation: impl Into<String>,
        required_state: impl Into<String>,
    ) -> Self {
        Self::InvalidState {
            operation: operation.into(),
            required_state: required_state.into(),
        }
    }

    /// Creates a `MalformedHeader` error.
    pub fn malformed_header(reason: impl Into<String>) -> Self {
        Self::MalformedHeader {
            reason: reason.into(),
        }
    }

    /// Creates a `MalformedInput` error.
    pub fn malformed_input(field: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self::MalformedInput {
            field: field.into(),
            expected,
            actual,
        }
    }

    /// Creates a `SignatureInvalid` error.
    pub fn signature_invalid(reason: impl Into<String>) -> Self {
        Self::SignatureInvalid {
            reason: reason.into(),
        }
    }

    /// Creates a `Replay` error.
    #[must_use]
    pub const fn replay(received: u32, last_accepted: u32) -> Self {
        Self::Replay {
            received,
            last_accepted,
        }
    }

    /// Creates a `KeyNotFound` error.
    pub fn key_not_found(identity: impl Into<String>) -> Self {
        Self::KeyNotFound {
            identity: identity.into(),
        }
    }

    /// Creates an `InvalidInstallCode` error.
    pub fn invalid_install_code(reason: impl Into<String>) -> Self {
        Self::InvalidInstallCode {
            reason: reason.into(),
        }
    }

    /// Creates an `InvalidCertificate` error.
    pub fn invalid_certificate(reason: impl Into<String>) -> Self {
        Self::InvalidCertificate {
            reason: reason.into(),
        }
    }

    /// Creates an `Aborted` error.
    pub fn aborted(reason: impl Into<String>) -> Self {
        Self::Aborted {
            reason: reason.into(),
        }
    }

    // ========================================
    // Error Classification
    // ========================================

    /// Returns `true` if this is a cryptographic verification error.
    #[must_use]
    pub const fn is_crypto_error(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationFailed
                | Self::SignatureInvalid { .. }
                | Self::ConfirmationFailed
                | Self::KeyAgreement { .. }
        )
    }

    /// Returns `true` if this error concerns received wire data.
    #[must_use]
    pub const fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedHeader { .. }
                | Self::Replay { .. }
                | Self::InvalidCertificate { .. }
                | Self::CurveMismatch { .. }
        )
    }

    /// Returns `true` if the caller misused the API.
    #[must_use]
    pub const fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument { .. } | Self::InvalidState { .. } | Self::MalformedInput { .. }
        )
    }

    /// Returns `true` if this error might indicate an attack.
    ///
    /// These errors warrant additional logging/monitoring.
    #[must_use]
    pub const fn is_suspicious(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationFailed
                | Self::SignatureInvalid { .. }
                | Self::Replay { .. }
                | Self::ConfirmationFailed
        )
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::replay(4, 6);
        assert!(err.to_string().contains('4'));
        assert!(err.to_string().contains('6'));

        let err = CoreError::malformed_input("signature", 80, 79);
        assert!(err.to_string().contains("80"));
        assert!(err.to_string().contains("79"));
    }

    #[test]
    fn test_error_classification() {
        assert!(CoreError::AuthenticationFailed.is_crypto_error());
        assert!(CoreError::AuthenticationFailed.is_suspicious());

        let replay = CoreError::replay(5, 10);
        assert!(replay.is_protocol_error());
        assert!(replay.is_suspicious());

        let malformed = CoreError::malformed_input("certificate", 74, 10);
        assert!(malformed.is_caller_error());
        assert!(!malformed.is_suspicious());

        let invalid = CoreError::signature_invalid("r,s rejected");
        assert!(invalid.is_suspicious());
        assert!(!invalid.is_caller_error());
    }

    #[test]
    fn test_common_error_conversion() {
        let common = CommonError::invalid_input("field", "bad value");
        let core: CoreError = common.into();
        assert!(matches!(core, CoreError::Common(_)));
    }
}
