//! Database credential handling and SCRAM-SHA-256 verifiers.
//!
//! The role password never leaves the operator machine: the server receives a
//! pre-hashed verifier in the format PostgreSQL stores in `pg_authid`:
//!
//! ```text
//! SCRAM-SHA-256$<iterations>:<salt>$<StoredKey>:<ServerKey>
//! ```

use std::borrow::Cow;
use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use hmac::{Hmac, Mac};
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::domain::error::CredentialError;

type HmacSha256 = Hmac<Sha256>;

/// Default environment variable holding the database password.
pub const DEFAULT_PASSWORD_ENV: &str = "POSTGRES_DB_PASSWORD";

/// Iteration count PostgreSQL uses by default (`scram_iterations`).
pub const SCRAM_ITERATIONS: u32 = 4096;

const SCRAM_PREFIX: &str = "SCRAM-SHA-256$";
const SALT_LEN: usize = 16;

/// Placeholder values that must never reach a database.
const PLACEHOLDERS: &[&str] = &["changeme", "password", "postgres"];

/// Password for the application database role.
pub struct DbPassword(SecretString);

impl DbPassword {
    /// Validates a raw environment value.
    ///
    /// `var` names the source variable for error messages.
    ///
    /// # Errors
    ///
    /// Fails closed on a missing, empty, or placeholder password.
    pub fn from_env_value(var: &str, value: Option<String>) -> Result<Self, CredentialError> {
        let value = value.ok_or_else(|| CredentialError::Missing {
            var: var.to_string(),
        })?;
        if value.trim().is_empty() {
            return Err(CredentialError::Empty {
                var: var.to_string(),
            });
        }
        if PLACEHOLDERS.contains(&value.trim().to_ascii_lowercase().as_str()) {
            return Err(CredentialError::Placeholder {
                var: var.to_string(),
                value,
            });
        }
        Ok(Self(SecretString::from(value)))
    }

    /// Builds a verifier with a fresh random salt.
    ///
    /// # Errors
    ///
    /// Propagates HMAC key errors (not expected for SHA-256).
    pub fn verifier(&self) -> Result<ScramVerifier, CredentialError> {
        let mut salt = [0u8; SALT_LEN];
        rand::rng().fill_bytes(&mut salt);
        ScramVerifier::derive(self.0.expose_secret(), &salt, SCRAM_ITERATIONS)
    }

    /// Checks this password against a stored verifier string.
    #[must_use]
    pub fn matches(&self, stored: &str) -> bool {
        ScramVerifier::parse(stored).is_ok_and(|v| v.verify(self.0.expose_secret()))
    }
}

impl fmt::Debug for DbPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DbPassword([REDACTED])")
    }
}

/// A parsed SCRAM-SHA-256 verifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ScramVerifier {
    iterations: u32,
    salt: Vec<u8>,
    stored_key: Vec<u8>,
    server_key: Vec<u8>,
}

impl ScramVerifier {
    /// Derives the verifier for `password` with the given salt and iterations.
    ///
    /// # Errors
    ///
    /// Propagates HMAC key errors (not expected for SHA-256).
    pub fn derive(password: &str, salt: &[u8], iterations: u32) -> Result<Self, CredentialError> {
        let (stored_key, server_key) = scram_keys(password, salt, iterations)?;
        Ok(Self {
            iterations,
            salt: salt.to_vec(),
            stored_key,
            server_key,
        })
    }

    /// Parses the `pg_authid.rolpassword` representation.
    ///
    /// # Errors
    ///
    /// Returns `CredentialError::MalformedVerifier` for anything that is not a
    /// well-formed SCRAM-SHA-256 verifier (including legacy md5 hashes).
    pub fn parse(raw: &str) -> Result<Self, CredentialError> {
        let malformed = || CredentialError::MalformedVerifier(redact(raw));
        let rest = raw.strip_prefix(SCRAM_PREFIX).ok_or_else(malformed)?;
        let (params, keys) = rest.split_once('$').ok_or_else(malformed)?;
        let (iterations, salt) = params.split_once(':').ok_or_else(malformed)?;
        let (stored_key, server_key) = keys.split_once(':').ok_or_else(malformed)?;
        let decode = |s: &str| B64.decode(s).map_err(|_| malformed());
        Ok(Self {
            iterations: iterations.parse().map_err(|_| malformed())?,
            salt: decode(salt)?,
            stored_key: decode(stored_key)?,
            server_key: decode(server_key)?,
        })
    }

    /// Returns `true` when `candidate` produces the same keys.
    #[must_use]
    pub fn verify(&self, candidate: &str) -> bool {
        let Ok((stored_key, server_key)) = scram_keys(candidate, &self.salt, self.iterations)
        else {
            return false;
        };
        let stored_ok = stored_key.as_slice().ct_eq(self.stored_key.as_slice());
        let server_ok = server_key.as_slice().ct_eq(self.server_key.as_slice());
        (stored_ok & server_ok).into()
    }
}

impl fmt::Display for ScramVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{SCRAM_PREFIX}{}:{}${}:{}",
            self.iterations,
            B64.encode(&self.salt),
            B64.encode(&self.stored_key),
            B64.encode(&self.server_key)
        )
    }
}

impl TryFrom<String> for ScramVerifier {
    type Error = CredentialError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ScramVerifier> for String {
    fn from(value: ScramVerifier) -> Self {
        value.to_string()
    }
}

fn scram_keys(
    password: &str,
    salt: &[u8],
    iterations: u32,
) -> Result<(Vec<u8>, Vec<u8>), CredentialError> {
    // PostgreSQL normalizes with SASLprep and falls back to the raw bytes
    // when the password contains prohibited characters.
    let prepared = stringprep::saslprep(password).unwrap_or(Cow::Borrowed(password));
    let mut salted = [0u8; 32];
    pbkdf2::pbkdf2_hmac::<Sha256>(prepared.as_bytes(), salt, iterations, &mut salted);

    let client_key = hmac_sha256(&salted, b"Client Key")?;
    let stored_key = Sha256::digest(&client_key).to_vec();
    let server_key = hmac_sha256(&salted, b"Server Key")?;
    Ok((stored_key, server_key))
}

fn hmac_sha256(key: &[u8], message: &[u8]) -> Result<Vec<u8>, CredentialError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| CredentialError::MalformedVerifier(e.to_string()))?;
    mac.update(message);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Keeps only the scheme so key material never appears in errors.
fn redact(raw: &str) -> String {
    match raw.split_once('$') {
        Some((scheme, _)) => format!("{scheme}$…"),
        None => format!("{}…", raw.chars().take(3).collect::<String>()),
    }
}
