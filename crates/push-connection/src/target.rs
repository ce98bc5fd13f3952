//! Connection target: base endpoint plus credential.

use std::fmt;

use reportify_protocol::constants::TOKEN_QUERY_PARAM;

/// Endpoint and credential a connection is made against.
///
/// Immutable; a new credential means a new target. `Display` and `Debug`
/// redact the token so targets are safe to log.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionTarget {
    base: String,
    url: String,
}

impl ConnectionTarget {
    /// Builds `<base>?token=<url-encoded token>`.
    ///
    /// Returns `None` when either part is empty: there is nothing to
    /// connect to.
    pub fn with_token(base: &str, token: &str) -> Option<Self> {
        if base.is_empty() || token.is_empty() {
            return None;
        }
        let separator = if base.contains('?') { '&' } else { '?' };
        let url = format!(
            "{base}{separator}{TOKEN_QUERY_PARAM}={}",
            urlencoding::encode(token)
        );
        Some(Self {
            base: base.to_string(),
            url,
        })
    }

    /// Full connect URL, credential included.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Endpoint without the credential.
    pub fn base(&self) -> &str {
        &self.base
    }
}

impl fmt::Display for ConnectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let separator = if self.base.contains('?') { '&' } else { '?' };
        write!(f, "{}{separator}{TOKEN_QUERY_PARAM}=***", self.base)
    }
}

impl fmt::Debug for ConnectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ConnectionTarget")
            .field(&self.to_string())
            .finish()
    }
}
