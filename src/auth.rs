//! Broker credential handling.
//!
//! The brokerage authorizes a WebSocket connection with a single bearer
//! token sent in the `authorize` message. [`ApiToken`] keeps that token out
//! of debug output and log lines and wipes it from memory on drop.

use std::fmt;

use zeroize::Zeroizing;

/// An account API token with a redacted `Debug` representation.
///
/// The inner buffer is zeroed when the token is dropped.
#[derive(Clone)]
pub struct ApiToken(Zeroizing<String>);

impl ApiToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Zeroizing::new(token.into()))
    }

    /// Returns the raw token for inclusion in an `authorize` message.
    ///
    /// Call sites should hand the value straight to the serializer and not
    /// keep copies around.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiToken(***)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_is_redacted() {
        let token = ApiToken::new("super-secret");
        let rendered = format!("{token:?}");
        assert!(!rendered.contains("super-secret"));
        assert_eq!(rendered, "ApiToken(***)");
    }

    #[test]
    fn expose_returns_raw_value() {
        let token = ApiToken::new("abc123");
        assert_eq!(token.expose(), "abc123");
    }
}
