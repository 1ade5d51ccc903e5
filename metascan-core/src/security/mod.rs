//! Credential handling.
//!
//! Passwords arrive encrypted from the data-source configuration store. The
//! engine never manages keys: it hands the ciphertext to a
//! [`CredentialDecryptor`] supplied by the host and keeps the plaintext in a
//! [`Credentials`] container that zeroes its memory on drop.

pub mod credentials;

pub use credentials::{CredentialDecryptor, Credentials, PlaintextDecryptor};
