//! Data-source descriptors and resolved connection configuration.

use crate::adapters::catalog::{DialectCatalog, DialectKind, DriverId};
use crate::error::{MetaScanError, redact_database_url};
use crate::security::{CredentialDecryptor, Credentials};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroizing;

/// URL property carrying the bearer token for token-authenticated dialects.
const TOKEN_PROPERTY: &str = "guardianToken";

/// Stored settings of one data source, as handed over by the configuration
/// collaborator.
///
/// # Example
/// ```rust
/// use metascan_core::adapters::DataSourceDescriptor;
///
/// let descriptor = DataSourceDescriptor::new("postgresql", "localhost")
///     .with_port(5432)
///     .with_database("sales")
///     .with_account("reader");
///
/// assert!(descriptor.validate().is_ok());
/// assert_eq!(descriptor.schema_name(), Some("sales"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSourceDescriptor {
    /// Display name of the data source
    pub name: Option<String>,
    /// Data-source type (`mysql`, `postgresql`, `oracle`, ...)
    pub source_type: String,
    /// Host name or address
    pub host: String,
    /// Port; the dialect default applies when absent
    pub port: Option<u16>,
    /// Database (or service) name
    pub database: Option<String>,
    /// Schema to scan; falls back to `database`
    pub schema: Option<String>,
    /// Login account
    pub account: Option<String>,
    /// Password ciphertext
    pub encrypted_password: Option<String>,
    /// Bearer token for token-authenticated dialects
    pub token: Option<String>,
    /// Federated catalog this source registers under
    pub catalog: Option<String>,
}

impl DataSourceDescriptor {
    /// Creates a descriptor for a type and host.
    pub fn new(source_type: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            source_type: source_type.into(),
            host: host.into(),
            ..Default::default()
        }
    }

    /// Builder method to set the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Builder method to set the database.
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Builder method to set the schema.
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Builder method to set the account.
    pub fn with_account(mut self, account: impl Into<String>) -> Self {
        self.account = Some(account.into());
        self
    }

    /// Builder method to set the password ciphertext.
    pub fn with_encrypted_password(mut self, ciphertext: impl Into<String>) -> Self {
        self.encrypted_password = Some(ciphertext.into());
        self
    }

    /// Builder method to set the bearer token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Schema to scan: the explicit schema, else the database name.
    pub fn schema_name(&self) -> Option<&str> {
        self.schema
            .as_deref()
            .or(self.database.as_deref())
            .filter(|s| !s.is_empty())
    }

    /// Validates the descriptor.
    ///
    /// # Errors
    /// Returns `UnsupportedDialect` for unknown types and `Configuration`
    /// for an empty host or a zero port.
    pub fn validate(&self) -> Result<()> {
        DialectKind::parse(&self.source_type)?;

        if self.host.trim().is_empty() {
            return Err(MetaScanError::configuration("host cannot be empty"));
        }

        if self.port == Some(0) {
            return Err(MetaScanError::configuration("port must be greater than 0"));
        }

        Ok(())
    }
}

/// How credentials reach the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Token appended to the connection string; no user/password
    Token,
    /// Account and password passed as connection properties
    Password,
}

impl AuthMode {
    /// Picks token auth when the dialect requires a token and one is present.
    pub fn select(config: &ConnectionConfig) -> Self {
        let entry = DialectCatalog::entry(config.dialect);
        if entry.requires_token && config.credentials.token().is_some() {
            Self::Token
        } else {
            Self::Password
        }
    }
}

/// Resolved connection settings, immutable for one scan call.
#[derive(Clone)]
pub struct ConnectionConfig {
    /// Dialect of the data source
    pub dialect: DialectKind,
    /// Driver used to connect
    pub driver_id: DriverId,
    /// Connection URL without credentials
    pub url: String,
    /// Decrypted credentials
    pub credentials: Credentials,
}

impl ConnectionConfig {
    /// Creates a configuration for a dialect and URL with no credentials.
    pub fn new(dialect: DialectKind, url: impl Into<String>) -> Self {
        Self {
            dialect,
            driver_id: DialectCatalog::entry(dialect).driver,
            url: url.into(),
            credentials: Credentials::default(),
        }
    }

    /// Builder method to set credentials.
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Resolves a stored descriptor: catalog lookup, URL build and password
    /// decryption.
    ///
    /// # Errors
    /// `UnsupportedDialect` for unknown types, `Configuration` for invalid
    /// descriptors and `Decryption` when the password cannot be decrypted.
    pub fn resolve(
        descriptor: &DataSourceDescriptor,
        decryptor: &dyn CredentialDecryptor,
    ) -> Result<Self> {
        descriptor.validate()?;
        let dialect = DialectKind::parse(&descriptor.source_type)?;
        let url = DialectCatalog::build_url(
            &descriptor.source_type,
            &descriptor.host,
            descriptor.port,
            descriptor.database.as_deref(),
        )?;

        let password = match descriptor.encrypted_password.as_deref() {
            Some(ciphertext) if !ciphertext.is_empty() => decryptor.decrypt(ciphertext)?,
            _ => Zeroizing::new(String::new()),
        };

        let mut credentials = Credentials::new(
            descriptor.account.clone().unwrap_or_default(),
            password.as_str(),
        );
        if let Some(token) = &descriptor.token {
            credentials = credentials.with_token(token.as_str());
        }

        Ok(Self::new(dialect, url).with_credentials(credentials))
    }

    /// Selected authentication mode.
    pub fn auth_mode(&self) -> AuthMode {
        AuthMode::select(self)
    }

    /// URL handed to the driver. In token mode the token is appended as a
    /// connection-string property.
    pub fn connection_url(&self) -> Zeroizing<String> {
        match (self.auth_mode(), self.credentials.token()) {
            (AuthMode::Token, Some(token)) => {
                Zeroizing::new(format!("{};{}={}", self.url, TOKEN_PROPERTY, token))
            }
            _ => Zeroizing::new(self.url.clone()),
        }
    }

    /// Account and password for password-mode drivers; `None` in token mode.
    pub fn password_properties(&self) -> Option<(&str, &str)> {
        match self.auth_mode() {
            AuthMode::Token => None,
            AuthMode::Password => Some((self.credentials.account(), self.credentials.password())),
        }
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("dialect", &self.dialect)
            .field("driver_id", &self.driver_id)
            .field("url", &redact_database_url(&self.url))
            .field("credentials", &self.credentials)
            .finish()
    }
}

impl fmt::Display for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} via {} ({})",
            self.dialect,
            self.driver_id,
            redact_database_url(&self.url)
        )
        // Intentionally omit credentials
    }
}
