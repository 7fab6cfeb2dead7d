//! OAuth 1.0a request signing (HMAC-SHA1).
//!
//! Produces the `Authorization: OAuth ...` header the v1.1 API expects for
//! user-context requests.

use crate::credentials::Credentials;
use crate::error::{Result, TweetDbError};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use itertools::Itertools;
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// Signs requests with a consumer key pair and an access token pair.
#[derive(Clone)]
pub struct OAuthSigner {
    consumer_key: String,
    consumer_secret: String,
    token: String,
    token_secret: String,
}

impl OAuthSigner {
    #[must_use]
    pub fn new(
        consumer_key: impl Into<String>,
        consumer_secret: impl Into<String>,
        token: impl Into<String>,
        token_secret: impl Into<String>,
    ) -> Self {
        Self {
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
            token: token.into(),
            token_secret: token_secret.into(),
        }
    }

    /// Build a signer from the credential store.
    ///
    /// # Errors
    ///
    /// Returns [`TweetDbError::MissingCredential`] for the first unset secret.
    pub fn from_credentials(credentials: &Credentials) -> Result<Self> {
        Ok(Self::new(
            credentials.require("consumer_key")?,
            credentials.require("consumer_secret")?,
            credentials.require("access_token")?,
            credentials.require("access_token_secret")?,
        ))
    }

    /// `Authorization` header value for a request, with a fresh nonce and
    /// timestamp.
    ///
    /// `url` is the request URL without its query string; `query` holds the
    /// request parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if the signing key is rejected.
    pub fn authorization_header(
        &self,
        method: &str,
        url: &str,
        query: &[(String, String)],
    ) -> Result<String> {
        let nonce = uuid::Uuid::new_v4().simple().to_string();
        let timestamp = chrono::Utc::now().timestamp().to_string();
        self.authorization_header_with(method, url, query, &nonce, &timestamp)
    }

    /// Header value for a fixed nonce and timestamp.
    ///
    /// # Errors
    ///
    /// Returns an error if the signing key is rejected.
    pub fn authorization_header_with(
        &self,
        method: &str,
        url: &str,
        query: &[(String, String)],
        nonce: &str,
        timestamp: &str,
    ) -> Result<String> {
        let mut oauth_params = vec![
            ("oauth_consumer_key".to_string(), self.consumer_key.clone()),
            ("oauth_nonce".to_string(), nonce.to_string()),
            (
                "oauth_signature_method".to_string(),
                "HMAC-SHA1".to_string(),
            ),
            ("oauth_timestamp".to_string(), timestamp.to_string()),
            ("oauth_token".to_string(), self.token.clone()),
            ("oauth_version".to_string(), "1.0".to_string()),
        ];

        let all_params: Vec<(String, String)> =
            oauth_params.iter().chain(query).cloned().collect();
        let base = signature_base_string(method, url, &all_params);
        let signature = self.sign(&base)?;
        oauth_params.push(("oauth_signature".to_string(), signature));

        let fields = oauth_params
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", percent_encode(k), percent_encode(v)))
            .join(", ");
        Ok(format!("OAuth {fields}"))
    }

    /// Base64 HMAC-SHA1 of `base` keyed by `consumer_secret&token_secret`.
    ///
    /// # Errors
    ///
    /// Returns an error if the signing key is rejected.
    pub fn sign(&self, base: &str) -> Result<String> {
        let key = format!(
            "{}&{}",
            percent_encode(&self.consumer_secret),
            percent_encode(&self.token_secret)
        );
        let mut mac =
            HmacSha1::new_from_slice(key.as_bytes()).map_err(|_| TweetDbError::InvalidArgument {
                reason: "OAuth signing key rejected".to_string(),
            })?;
        mac.update(base.as_bytes());
        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }
}

impl std::fmt::Debug for OAuthSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthSigner")
            .field("consumer_key", &self.consumer_key)
            .finish_non_exhaustive()
    }
}

/// `METHOD&encoded-url&encoded-sorted-params`
#[must_use]
pub fn signature_base_string(method: &str, url: &str, params: &[(String, String)]) -> String {
    let normalized = params
        .iter()
        .map(|(k, v)| (percent_encode(k), percent_encode(v)))
        .sorted()
        .map(|(k, v)| format!("{k}={v}"))
        .join("&");
    format!(
        "{}&{}&{}",
        method.to_uppercase(),
        percent_encode(url),
        percent_encode(&normalized)
    )
}

/// RFC 3986 percent-encoding: everything but unreserved characters.
#[must_use]
pub fn percent_encode(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                result.push(byte as char);
            }
            _ => {
                result.push_str(&format!("%{byte:02X}"));
            }
        }
    }
    result
}
