// ============================================
// File: crates/zbsec-core/src/cbke/mod.rs
// ============================================
//! # Certificate-Based Key Establishment
//!
//! ## Creation Reason
//! Smart Energy devices agree on application link keys with CBKE
//! (ECMQV over Koblitz curves with implicit certificates) or with the
//! Curve25519 ECDHE variant.
//!
//! ## Main Functionality
//! - [`suite`]: `CryptoSuite` sizes, identifiers and default timeouts
//! - [`certificate`]: v1 / v2 certificate parsing and validation
//! - [`agreement`]: `KeyAgreement` backend trait, `X25519Agreement`
//! - [`session`]: `CbkeSession` state machine
//!
//! ## Exchange Flow
//! ```text
//! Initiator (U)                                 Responder (V)
//!     │ generate_ephemeral_keys                     │
//!     │──────── cert(U), QEU ──────────────────────►│
//!     │◄─────── cert(V), QEV ───────────────────────│
//!     │ derive_shared_secret      derive_shared_secret
//!     │──────── MACU ──────────────────────────────►│ confirm
//!     │◄─────── MACV ───────────────────────────────│
//!     │ confirm                                     │
//!     ▼ KeyData installed as AppLink                ▼
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - sect163k1 / sect283k1 arithmetic is not implemented here; plug an
//!   engine in through `KeyAgreement`

pub mod agreement;
pub mod certificate;
pub mod session;
pub mod suite;

pub use agreement::{AgreementInput, KeyAgreement, KeyPair, SharedSecret, X25519Agreement};
pub use certificate::{Certificate, CertificateV1, CertificateV2};
pub use session::{CbkeConfig, CbkeCredentials, CbkeRole, CbkeSession, CbkeState};
pub use suite::CryptoSuite;
