//! Credential store for the four API secrets.
//!
//! Secrets come from the `[credentials]` config section and may be
//! overridden by `TWEETDB_CONSUMER_KEY`, `TWEETDB_CONSUMER_SECRET`,
//! `TWEETDB_ACCESS_TOKEN` and `TWEETDB_ACCESS_TOKEN_SECRET`.

use crate::error::{Result, TweetDbError};
use serde::Deserialize;

/// Names accepted by [`Credentials::get`].
pub const CREDENTIAL_NAMES: [&str; 4] = [
    "consumer_key",
    "consumer_secret",
    "access_token",
    "access_token_secret",
];

/// The four opaque secrets needed to sign API requests.
#[derive(Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Credentials {
    pub consumer_key: Option<String>,
    pub consumer_secret: Option<String>,
    pub access_token: Option<String>,
    pub access_token_secret: Option<String>,
}

impl Credentials {
    /// Look a secret up by name.
    ///
    /// Unknown names and unset or empty secrets both yield `None`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        let value = match name {
            "consumer_key" => &self.consumer_key,
            "consumer_secret" => &self.consumer_secret,
            "access_token" => &self.access_token,
            "access_token_secret" => &self.access_token_secret,
            _ => return None,
        };
        value.as_deref().filter(|v| !v.is_empty())
    }

    /// Look a secret up by name, failing if it is not configured.
    ///
    /// # Errors
    ///
    /// Returns [`TweetDbError::MissingCredential`] when the secret is unset.
    pub fn require(&self, name: &'static str) -> Result<&str> {
        self.get(name)
            .ok_or(TweetDbError::MissingCredential { name })
    }

    /// Check that all four secrets are present.
    ///
    /// # Errors
    ///
    /// Returns the first missing secret.
    pub fn validate(&self) -> Result<()> {
        for name in CREDENTIAL_NAMES {
            self.require(name)?;
        }
        Ok(())
    }

    pub(crate) fn apply_env_overrides(&mut self) {
        let slots = [
            ("TWEETDB_CONSUMER_KEY", &mut self.consumer_key),
            ("TWEETDB_CONSUMER_SECRET", &mut self.consumer_secret),
            ("TWEETDB_ACCESS_TOKEN", &mut self.access_token),
            ("TWEETDB_ACCESS_TOKEN_SECRET", &mut self.access_token_secret),
        ];
        for (var, slot) in slots {
            if let Ok(value) = std::env::var(var) {
                *slot = Some(value);
            }
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |v: &Option<String>| if v.is_some() { "<set>" } else { "<unset>" };
        f.debug_struct("Credentials")
            .field("consumer_key", &redact(&self.consumer_key))
            .field("consumer_secret", &redact(&self.consumer_secret))
            .field("access_token", &redact(&self.access_token))
            .field("access_token_secret", &redact(&self.access_token_secret))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full() -> Credentials {
        Credentials {
            consumer_key: Some("CK-1".into()),
            consumer_secret: Some("CS-1".into()),
            access_token: Some("AT-1".into()),
            access_token_secret: Some("ATS-1".into()),
        }
    }

    #[test]
    fn lookup_by_name() {
        let creds = full();
        assert_eq!(creds.get("consumer_key"), Some("CK-1"));
        assert_eq!(creds.get("access_token_secret"), Some("ATS-1"));
        assert_eq!(creds.get("password"), None);
        assert!(creds.validate().is_ok());
    }

    #[test]
    fn empty_secret_counts_as_missing() {
        let creds = Credentials {
            access_token: Some(String::new()),
            ..full()
        };
        let err = creds.validate().unwrap_err();
        assert!(matches!(
            err,
            TweetDbError::MissingCredential {
                name: "access_token"
            }
        ));
    }

    #[test]
    fn debug_redacts_secrets() {
        let rendered = format!("{:?}", full());
        assert!(!rendered.contains("CS-1"));
        assert!(rendered.contains("<set>"));
        assert!(format!("{:?}", Credentials::default()).contains("<unset>"));
    }
}
