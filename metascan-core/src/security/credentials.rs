//! Secure credential container and the decrypt seam.
//!
//! # Security
//! - Credentials are stored in `Zeroizing<T>` containers
//! - Memory is cleared when credentials go out of scope
//! - Passwords and tokens never appear in debug output or logs

use crate::Result;
use std::fmt;
use zeroize::Zeroizing;

/// Decrypts stored data-source passwords.
///
/// Implemented by the host's credential service. A failure must be reported
/// as [`MetaScanError::Decryption`](crate::error::MetaScanError::Decryption);
/// a scan cannot proceed without valid credentials.
pub trait CredentialDecryptor: Send + Sync {
    /// Turns stored ciphertext into a plaintext password.
    fn decrypt(&self, ciphertext: &str) -> Result<Zeroizing<String>>;
}

/// Decryptor for passwords that were stored or supplied in plaintext.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaintextDecryptor;

impl CredentialDecryptor for PlaintextDecryptor {
    fn decrypt(&self, ciphertext: &str) -> Result<Zeroizing<String>> {
        Ok(Zeroizing::new(ciphertext.to_string()))
    }
}

/// Account, password and optional bearer token for one data source.
///
/// # Example
///
/// ```rust
/// use metascan_core::security::Credentials;
///
/// let creds = Credentials::new("admin", "secret");
/// assert_eq!(creds.account(), "admin");
/// assert!(creds.has_password());
/// assert!(!format!("{:?}", creds).contains("secret"));
/// ```
#[derive(Clone, Default)]
pub struct Credentials {
    account: Zeroizing<String>,
    password: Zeroizing<String>,
    token: Option<Zeroizing<String>>,
}

impl Credentials {
    /// Creates account/password credentials.
    pub fn new(account: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            account: Zeroizing::new(account.into()),
            password: Zeroizing::new(password.into()),
            token: None,
        }
    }

    /// Attaches a bearer token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(Zeroizing::new(token.into()));
        self
    }

    /// Account name.
    pub fn account(&self) -> &str {
        &self.account
    }

    /// Plaintext password; empty when none was configured.
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Bearer token, if one is configured and non-empty.
    pub fn token(&self) -> Option<&str> {
        self.token
            .as_deref()
            .map(String::as_str)
            .filter(|token| !token.is_empty())
    }

    /// Checks if a password is present without exposing it.
    pub fn has_password(&self) -> bool {
        !self.password.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("account", &self.account.as_str())
            .field("password", &if self.has_password() { "****" } else { "" })
            .field("token", &self.token().map(|_| "****"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MetaScanError;

    struct RejectingDecryptor;

    impl CredentialDecryptor for RejectingDecryptor {
        fn decrypt(&self, _ciphertext: &str) -> Result<Zeroizing<String>> {
            Err(MetaScanError::decryption_failed("key not found"))
        }
    }

    #[test]
    fn test_credentials_debug_hides_secrets() {
        let creds = Credentials::new("reader", "hunter2").with_token("tok-123");
        let debug = format!("{:?}", creds);

        assert!(debug.contains("reader"));
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("tok-123"));
    }

    #[test]
    fn test_empty_token_is_absent() {
        let creds = Credentials::new("reader", "").with_token("");
        assert_eq!(creds.token(), None);
        assert!(!creds.has_password());
    }

    #[test]
    fn test_plaintext_decryptor_passes_through() {
        let plain = PlaintextDecryptor.decrypt("s3cret").unwrap();
        assert_eq!(plain.as_str(), "s3cret");
    }

    #[test]
    fn test_decrypt_failure_is_decryption_error() {
        let err = RejectingDecryptor.decrypt("abc").unwrap_err();
        assert!(matches!(err, MetaScanError::Decryption { .. }));
        assert!(err.is_fatal());
    }
}
