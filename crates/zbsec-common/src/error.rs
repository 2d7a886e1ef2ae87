// ============================================
// File: crates/zbsec-common/src/error.rs
// ============================================
//! # Common Error Types
//!
//! ## Creation Reason
//! Errors raised by the shared types, mainly parsing extended addresses
//! from configuration files and the command line.
//!
//! ## Main Functionality
//! - `CommonError`: Validation and decoding failures
//! - `Result<T>`: Type alias using `CommonError`
//!
//! ## ⚠️ Important Note for Next Developer
//! - Higher crates wrap this type (`CoreError::Common`, `ToolError::Common`)
//! - Never include key bytes in error messages
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use std::fmt;
use thiserror::Error;

/// Common result type for operations that may fail.
pub type Result<T> = std::result::Result<T, CommonError>;

/// Errors shared across zbsec crates.
///
/// # Example
/// ```
/// use zbsec_common::error::CommonError;
/// use zbsec_common::ExtendedAddress;
///
/// let err = "00:0d:6f".parse::<ExtendedAddress>().unwrap_err();
/// assert!(matches!(err, CommonError::InvalidInput { .. }));
/// ```
#[derive(Error, Debug)]
pub enum CommonError {
    /// Invalid input data provided.
    #[error("Invalid input for '{field}': {reason}")]
    InvalidInput {
        /// Name of the field or parameter
        field: String,
        /// Description of what's wrong
        reason: String,
    },

    /// Failed to decode text input (hex, addresses).
    #[error("Decoding error: {context}: {details}")]
    Decoding {
        /// What was being decoded
        context: String,
        /// Error details
        details: String,
    },
}

impl CommonError {
    /// Creates an `InvalidInput` error.
    pub fn invalid_input(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `Decoding` error.
    pub fn decoding(context: impl Into<String>, details: impl fmt::Display) -> Self {
        Self::Decoding {
            context: context.into(),
            details: details.to_string(),
        }
    }
}

// ============================================
// Tests
// ============================================
