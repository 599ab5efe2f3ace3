//! Credential masking for log output
//!
//! Share passwords are held as `secrecy::SecretString`; transport errors may
//! still echo them back (e.g. inside a URL), so any text that reaches the
//! build log or tracing output goes through [`CredentialMasker`] first.

use crate::core::config::ShareDefinition;
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};

/// Replacement for a masked secret; reveals nothing about its content or length
pub const MASK: &str = "****";

/// Scrubs known secrets from free-form text
#[derive(Default)]
pub struct CredentialMasker {
    secrets: Vec<SecretString>,
}

impl CredentialMasker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Masker for every password configured on `share`
    pub fn for_share(share: &ShareDefinition) -> Self {
        let mut masker = Self::new();
        if let Some(password) = &share.password {
            masker.add(password.clone());
        }
        masker
    }

    /// Masker for the passwords of all `shares`
    pub fn for_shares<'a>(shares: impl IntoIterator<Item = &'a ShareDefinition>) -> Self {
        let mut masker = Self::new();
        for share in shares {
            if let Some(password) = &share.password {
                masker.add(password.clone());
            }
        }
        masker
    }

    pub fn add(&mut self, secret: SecretString) {
        if !secret.expose_secret().is_empty() {
            self.secrets.push(secret);
        }
    }

    pub fn len(&self) -> usize {
        self.secrets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }

    /// Replace every occurrence of a known secret in `text`
    pub fn mask(&self, text: &str) -> String {
        let mut masked = text.to_string();

        // Longest first so a secret containing another is masked whole
        let mut secrets: Vec<&str> = self.secrets.iter().map(|s| s.expose_secret()).collect();
        secrets.sort_by_key(|s| std::cmp::Reverse(s.len()));

        for secret in secrets {
            if let Ok(regex) = Regex::new(&regex::escape(secret)) {
                masked = regex.replace_all(&masked, MASK).to_string();
            }
        }

        masked
    }
}

impl std::fmt::Debug for CredentialMasker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialMasker")
            .field("secrets", &self.secrets.len())
            .finish()
    }
}
