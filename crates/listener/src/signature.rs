//! GitHub webhook signature verification (`X-Hub-Signature-256`).

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Header GitHub puts the body signature in.
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

const SIGNATURE_PREFIX: &str = "sha256=";

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("Webhook secret cannot be used as an HMAC key")]
    InvalidKey,
    #[error("Missing X-Hub-Signature-256 header")]
    Missing,
    #[error("Malformed X-Hub-Signature-256 header")]
    Malformed,
    #[error("Webhook signature does not match payload")]
    Mismatch,
}

/// Checks delivery bodies against the shared webhook secret.
#[derive(Clone)]
pub struct SignatureVerifier {
    keyed: HmacSha256,
}

impl SignatureVerifier {
    /// Creates a verifier keyed with `secret`.
    pub fn new(secret: &SecretString) -> Result<Self, SignatureError> {
        let keyed = <HmacSha256 as Mac>::new_from_slice(secret.expose_secret().as_bytes())
            .map_err(|_| SignatureError::InvalidKey)?;
        Ok(Self { keyed })
    }

    /// Verifies `signature` (the raw header value) against `body`.
    ///
    /// The comparison is constant-time.
    pub fn verify(&self, signature: Option<&str>, body: &[u8]) -> Result<(), SignatureError> {
        let signature = signature.ok_or(SignatureError::Missing)?;
        let digest = signature
            .trim()
            .strip_prefix(SIGNATURE_PREFIX)
            .ok_or(SignatureError::Malformed)?;
        let expected = hex::decode(digest).map_err(|_| SignatureError::Malformed)?;

        self.mac_over(body)
            .verify_slice(&expected)
            .map_err(|_| SignatureError::Mismatch)
    }

    /// Produces the header value GitHub would send for `body`.
    pub fn sign(&self, body: &[u8]) -> String {
        let digest = self.mac_over(body).finalize().into_bytes();
        format!("{SIGNATURE_PREFIX}{}", hex::encode(digest))
    }

    fn mac_over(&self, body: &[u8]) -> HmacSha256 {
        let mut mac = self.keyed.clone();
        mac.update(body);
        mac
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verifier() -> SignatureVerifier {
        SignatureVerifier::new(&SecretString::new("It's a Secret to Everybody".into())).unwrap()
    }

    #[test]
    fn matches_github_documented_example() {
        // Example from GitHub's "Validating webhook deliveries" guide.
        let signature = "sha256=757107ea0eb2509fc211221cce984b8a37570b6d7586c22c46f4379c8b043e17";
        assert!(verifier().verify(Some(signature), b"Hello, World!").is_ok());
    }

    #[test]
    fn sign_then_verify_accepts_own_signature() {
        let v = verifier();
        let body = br#"{"pull_request":{"id":7}}"#;
        assert!(v.verify(Some(&v.sign(body)), body).is_ok());
    }

    #[test]
    fn rejects_missing_malformed_and_mismatched_signatures() {
        let v = verifier();
        let body = b"payload";

        assert!(matches!(v.verify(None, body), Err(SignatureError::Missing)));
        assert!(matches!(
            v.verify(Some("sha1=abcd"), body),
            Err(SignatureError::Malformed)
        ));
        assert!(matches!(
            v.verify(Some("sha256=not-hex"), body),
            Err(SignatureError::Malformed)
        ));
        assert!(matches!(
            v.verify(Some(&v.sign(b"other payload")), body),
            Err(SignatureError::Mismatch)
        ));
    }
}
