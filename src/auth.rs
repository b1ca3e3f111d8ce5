//! Credential store for the login handshake.
//!
//! The storage and hashing scheme is opaque to the rest of the server; the
//! handshake only asks whether a user exists and whether a password matches.

use crate::config::UserEntry;
use std::collections::HashMap;
use tracing::warn;

/// Verifies login credentials and answers user-existence queries
/// (`/subscribe` targets must name a known user).
pub trait CredentialStore: Send + Sync {
    /// Whether a user with this name is known at all.
    fn exists(&self, username: &str) -> bool;

    /// Verify a password for a user. Unknown users verify as false.
    fn verify(&self, username: &str, password: &str) -> bool;
}

/// Credential store backed by the static user table from the config file.
///
/// Passwords are stored as bcrypt hashes; verification cost is bounded by the
/// hash's embedded work factor.
pub struct StaticCredentials {
    users: HashMap<String, String>,
}

impl StaticCredentials {
    pub fn from_config(entries: &[UserEntry]) -> Self {
        let users = entries
            .iter()
            .map(|e| (e.name.clone(), e.password_hash.clone()))
            .collect();
        Self { users }
    }

    /// Number of known users.
    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl CredentialStore for StaticCredentials {
    fn exists(&self, username: &str) -> bool {
        self.users.contains_key(username)
    }

    fn verify(&self, username: &str, password: &str) -> bool {
        let Some(hash) = self.users.get(username) else {
            return false;
        };
        match bcrypt::verify(password, hash) {
            Ok(ok) => ok,
            Err(e) => {
                // A hash that fails to parse means a broken config entry.
                warn!(user = %username, error = %e, "Unverifiable password hash");
                false
            }
        }
    }
}
