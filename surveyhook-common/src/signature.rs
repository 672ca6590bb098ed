//! Webhook signature verification
//!
//! The form provider signs every delivery with a shared secret:
//!
//! - HMAC-SHA256 keyed by the secret, computed over the raw request body
//! - Result encoded as standard base64 and prefixed with `sha256=`
//! - Sent in the `Typeform-Signature` header
//!
//! # Open mode
//!
//! When no secret is configured, verification is a no-op and every delivery
//! is accepted ([`SignatureCheck::Disabled`]). This is an operational switch
//! for local development and provider-side setup, not a secure default.
//! The receiver logs a warning at startup whenever it runs in open mode.
//!
//! # Pure Functions
//!
//! No HTTP framework dependencies - header extraction lives in the receiver.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the delivery signature
pub const SIGNATURE_HEADER: &str = "Typeform-Signature";

/// Algorithm tag that prefixes every signature token
pub const SIGNATURE_PREFIX: &str = "sha256=";

/// Outcome of checking one delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureCheck {
    /// Signature present and matches the body
    Valid,
    /// No secret configured - verification skipped (open mode)
    Disabled,
    /// Signing enabled but the request carried no signature
    Missing,
    /// Signature present but malformed or not matching the body
    Invalid,
}

impl SignatureCheck {
    /// Whether the delivery may proceed
    pub fn is_accepted(self) -> bool {
        matches!(self, SignatureCheck::Valid | SignatureCheck::Disabled)
    }
}

/// Verifies delivery signatures against a pre-shared secret
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: Option<String>,
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

impl SignatureVerifier {
    /// Create a verifier
    ///
    /// `None` or a blank secret puts the verifier in open mode.
    pub fn new(secret: Option<String>) -> Self {
        let secret = secret.filter(|s| !s.trim().is_empty());
        Self { secret }
    }

    /// Verifier that accepts every delivery
    pub fn disabled() -> Self {
        Self { secret: None }
    }

    /// Whether a secret is configured
    pub fn is_enabled(&self) -> bool {
        self.secret.is_some()
    }

    /// Check `presented` against the signature of `body`
    ///
    /// # Examples
    ///
    /// ```
    /// use surveyhook_common::signature::{SignatureCheck, SignatureVerifier};
    ///
    /// let verifier = SignatureVerifier::new(Some("s3cret".to_string()));
    /// let body = br#"{"form_response":{}}"#;
    /// let token = verifier.sign(body).unwrap();
    ///
    /// assert_eq!(verifier.verify(body, Some(&token)), SignatureCheck::Valid);
    /// assert_eq!(verifier.verify(b"tampered", Some(&token)), SignatureCheck::Invalid);
    /// assert_eq!(verifier.verify(body, None), SignatureCheck::Missing);
    /// ```
    pub fn verify(&self, body: &[u8], presented: Option<&str>) -> SignatureCheck {
        let Some(secret) = &self.secret else {
            return SignatureCheck::Disabled;
        };

        let Some(presented) = presented.map(str::trim).filter(|p| !p.is_empty()) else {
            return SignatureCheck::Missing;
        };

        let Some(encoded) = presented.strip_prefix(SIGNATURE_PREFIX) else {
            return SignatureCheck::Invalid;
        };

        let Ok(expected) = STANDARD.decode(encoded) else {
            return SignatureCheck::Invalid;
        };

        let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
            return SignatureCheck::Invalid;
        };
        mac.update(body);

        // verify_slice compares in constant time
        match mac.verify_slice(&expected) {
            Ok(()) => SignatureCheck::Valid,
            Err(_) => SignatureCheck::Invalid,
        }
    }

    /// Compute the signature token for `body`
    ///
    /// Returns `None` in open mode.
    pub fn sign(&self, body: &[u8]) -> Option<String> {
        let secret = self.secret.as_ref()?;
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
        mac.update(body);
        let digest = mac.finalize().into_bytes();
        Some(format!("{}{}", SIGNATURE_PREFIX, STANDARD.encode(digest)))
    }
}
