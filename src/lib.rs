//! Webauthn and FIDO U2F verification for Rust Server Applications
//!
//! Webauthn is a standard allowing communication between servers, browsers and authenticators
//! to allow strong, passwordless, cryptographic authentication to be performed. This crate
//! verifies the two ceremonies of a relying party, registration and authentication, for
//! WebAuthn/FIDO2 authenticators as well as the legacy FIDO U2F protocol.
//!
//! To use this library yourself, you will want to reference the `WebauthnConfig` trait to
//! develop site specific policy and configuration, the `WebauthnCore` struct for Webauthn
//! interactions, and the `CredentialRepository` trait to connect your credential storage.
//! Legacy U2F devices are handled through the [u2f] module.

#![warn(unused_extern_crates)]
#![warn(missing_docs)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![deny(clippy::unreachable)]
#![deny(clippy::await_holding_lock)]
#![deny(clippy::needless_pass_by_value)]
#![deny(clippy::trivially_copy_pass_by_ref)]

#[macro_use]
extern crate tracing;

#[macro_use]
mod macros;

mod constants;

pub mod attestation;
pub mod certificate;
pub mod crypto;
pub mod reader;
pub mod trust;

pub mod core;
pub mod ephemeral;
pub mod error;
pub mod interface;
pub mod internals;
pub mod proto;
pub mod u2f;

pub use base64urlsafedata::Base64UrlSafeData;

pub use crate::attestation::{AttestationFormat, ParsedAttestationData};
pub use crate::core::*;
pub use crate::error::{ErrorKind, WebauthnError, WebauthnResult};
pub use crate::interface::{AuthenticationResult, CredentialRepository, RegistrationResult};
pub use crate::trust::{verify_attestation_ca_chain, AttestationCa, AttestationCaList};
