use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::{Sha256, Sha512};
use std::fmt;
use std::str::FromStr;
use subtle::ConstantTimeEq;

/// Keyed-hash algorithms a signature header may name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureAlgorithm {
    Sha1,
    Sha256,
    Sha512,
}

impl SignatureAlgorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            SignatureAlgorithm::Sha1 => "sha1",
            SignatureAlgorithm::Sha256 => "sha256",
            SignatureAlgorithm::Sha512 => "sha512",
        }
    }
}

impl FromStr for SignatureAlgorithm {
    type Err = &'static str;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sha1" => Ok(SignatureAlgorithm::Sha1),
            "sha256" => Ok(SignatureAlgorithm::Sha256),
            "sha512" => Ok(SignatureAlgorithm::Sha512),
            _ => Err("unsupported signature algorithm"),
        }
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationOutcome {
    Accepted,
    RejectedMissingHeader,
    RejectedMalformedHeader,
    RejectedUnsupportedAlgorithm,
    RejectedDigestMismatch,
}

impl VerificationOutcome {
    pub fn is_accepted(self) -> bool {
        matches!(self, VerificationOutcome::Accepted)
    }

    /// Stable label for logs. Never sent back to the caller.
    pub fn as_str(self) -> &'static str {
        match self {
            VerificationOutcome::Accepted => "accepted",
            VerificationOutcome::RejectedMissingHeader => "missing_header",
            VerificationOutcome::RejectedMalformedHeader => "malformed_header",
            VerificationOutcome::RejectedUnsupportedAlgorithm => "unsupported_algorithm",
            VerificationOutcome::RejectedDigestMismatch => "digest_mismatch",
        }
    }
}

/// Webhook shared secret. Its `Debug` output never contains the key material.
#[derive(Clone, PartialEq, Eq)]
pub struct SharedSecret(Vec<u8>);

impl SharedSecret {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self(secret.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret(<redacted>)")
    }
}

/// Checks a `<algorithm>=<hexdigest>` header against the HMAC of `payload`.
///
/// The digest is always computed over the exact bytes passed in; callers must
/// hand over the raw request body, not a re-serialized form of it. Only
/// algorithms listed in `allowed` can ever produce `Accepted`.
pub fn verify_signature(
    secret: &[u8],
    payload: &[u8],
    signature_header: &str,
    allowed: &[SignatureAlgorithm],
) -> VerificationOutcome {
    let Some((algorithm_token, provided)) = split_signature_header(signature_header) else {
        return VerificationOutcome::RejectedMalformedHeader;
    };

    let algorithm = algorithm_token
        .parse::<SignatureAlgorithm>()
        .ok()
        .filter(|algorithm| allowed.contains(algorithm));

    // Unsupported tokens still run one full HMAC and comparison over the body.
    let digest_algorithm = algorithm
        .or_else(|| allowed.first().copied())
        .unwrap_or(SignatureAlgorithm::Sha256);
    let expected = compute_hmac_hex(digest_algorithm, secret, payload);
    let digest_matches = constant_time_hex_equals(&normalize_digest(provided), &expected);

    match algorithm {
        None => VerificationOutcome::RejectedUnsupportedAlgorithm,
        Some(_) if digest_matches => VerificationOutcome::Accepted,
        Some(_) => VerificationOutcome::RejectedDigestMismatch,
    }
}

pub fn compute_hmac_hex(algorithm: SignatureAlgorithm, secret: &[u8], payload: &[u8]) -> String {
    match algorithm {
        SignatureAlgorithm::Sha1 => finalize_hex(
            Hmac::<Sha1>::new_from_slice(secret).expect("HMAC accepts variable-length keys"),
            payload,
        ),
        SignatureAlgorithm::Sha256 => finalize_hex(
            Hmac::<Sha256>::new_from_slice(secret).expect("HMAC accepts variable-length keys"),
            payload,
        ),
        SignatureAlgorithm::Sha512 => finalize_hex(
            Hmac::<Sha512>::new_from_slice(secret).expect("HMAC accepts variable-length keys"),
            payload,
        ),
    }
}

/// Renders a header value the way a sender would.
pub fn format_signature_header(
    algorithm: SignatureAlgorithm,
    secret: &[u8],
    payload: &[u8],
) -> String {
    format!("{algorithm}={}", compute_hmac_hex(algorithm, secret, payload))
}

fn finalize_hex<M: Mac>(mut mac: M, payload: &[u8]) -> String {
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

// Exactly one `=` with a non-empty token on each side.
fn split_signature_header(raw: &str) -> Option<(&str, &str)> {
    let (algorithm, digest) = raw.trim().split_once('=')?;
    if digest.contains('=') {
        return None;
    }

    let algorithm = algorithm.trim();
    let digest = digest.trim();
    if algorithm.is_empty() || digest.is_empty() {
        return None;
    }

    Some((algorithm, digest))
}

fn normalize_digest(raw: &str) -> String {
    raw.chars()
        .filter(|character| !character.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase()
}

fn constant_time_hex_equals(left: &str, right: &str) -> bool {
    if left.len() != right.len() {
        return false;
    }
    left.as_bytes().ct_eq(right.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const DEFAULT_ALLOWED: &[SignatureAlgorithm] =
        &[SignatureAlgorithm::Sha1, SignatureAlgorithm::Sha256];

    #[test]
    fn accepts_sha1_signature_over_raw_body() {
        let secret = b"s3cr3t";
        let body = br#"{"ref":"refs/heads/main"}"#;
        let header = format_signature_header(SignatureAlgorithm::Sha1, secret, body);

        assert!(header.starts_with("sha1="));
        assert_eq!(
            verify_signature(secret, body, &header, DEFAULT_ALLOWED),
            VerificationOutcome::Accepted
        );
    }

    #[test]
    fn known_sha1_vector() {
        // RFC 2202 test case 2.
        assert_eq!(
            compute_hmac_hex(
                SignatureAlgorithm::Sha1,
                b"Jefe",
                b"what do ya want for nothing?"
            ),
            "effcdf6ae5eb2fa2d27416d5f184df9c259a7c79"
        );
    }

    #[test]
    fn rejects_short_digest_as_mismatch() {
        assert_eq!(
            verify_signature(b"s3cr3t", b"{}", "sha1=deadbeef", DEFAULT_ALLOWED),
            VerificationOutcome::RejectedDigestMismatch
        );
    }

    #[test]
    fn rejects_digest_from_wrong_secret() {
        let body = b"payload";
        let header = format_signature_header(SignatureAlgorithm::Sha256, b"other", body);

        assert_eq!(
            verify_signature(b"s3cr3t", body, &header, DEFAULT_ALLOWED),
            VerificationOutcome::RejectedDigestMismatch
        );
    }

    #[test]
    fn reserialized_body_no_longer_matches() {
        let secret = b"s3cr3t";
        let raw = br#"{ "ref" : "refs/heads/main" }"#;
        let header = format_signature_header(SignatureAlgorithm::Sha1, secret, raw);
        let parsed: serde_json::Value = serde_json::from_slice(raw).expect("valid json");
        let reserialized = serde_json::to_vec(&parsed).expect("serialize");

        assert_eq!(
            verify_signature(secret, raw, &header, DEFAULT_ALLOWED),
            VerificationOutcome::Accepted
        );
        assert_eq!(
            verify_signature(secret, &reserialized, &header, DEFAULT_ALLOWED),
            VerificationOutcome::RejectedDigestMismatch
        );
    }

    #[test]
    fn accepts_uppercase_hex_and_algorithm_token() {
        let secret = b"s3cr3t";
        let body = b"payload";
        let digest = compute_hmac_hex(SignatureAlgorithm::Sha1, secret, body).to_uppercase();

        assert_eq!(
            verify_signature(secret, body, &format!("SHA1={digest}"), DEFAULT_ALLOWED),
            VerificationOutcome::Accepted
        );
    }

    #[test]
    fn malformed_headers_are_rejected() {
        for header in ["", "sha1", "sha1=", "=abcdef", "sha1=ab=cd", "sha1==abcd", "   "] {
            assert_eq!(
                verify_signature(b"s3cr3t", b"{}", header, DEFAULT_ALLOWED),
                VerificationOutcome::RejectedMalformedHeader,
                "header {header:?}"
            );
        }
    }

    #[test]
    fn algorithm_outside_whitelist_is_unsupported_even_if_digest_matches() {
        let secret = b"s3cr3t";
        let body = b"payload";
        let sha1_header = format_signature_header(SignatureAlgorithm::Sha1, secret, body);

        assert_eq!(
            verify_signature(secret, body, &sha1_header, &[SignatureAlgorithm::Sha256]),
            VerificationOutcome::RejectedUnsupportedAlgorithm
        );
        assert_eq!(
            verify_signature(secret, body, "md5=0123456789abcdef", DEFAULT_ALLOWED),
            VerificationOutcome::RejectedUnsupportedAlgorithm
        );
    }

    #[test]
    fn unknown_token_carrying_a_valid_digest_is_still_unsupported() {
        let secret = b"s3cr3t";
        let body = b"payload";
        // Same digest the whitelisted algorithm would produce for this body.
        let digest = compute_hmac_hex(SignatureAlgorithm::Sha1, secret, body);

        for token in ["md5", "sha3", "sha512"] {
            assert_eq!(
                verify_signature(secret, body, &format!("{token}={digest}"), DEFAULT_ALLOWED),
                VerificationOutcome::RejectedUnsupportedAlgorithm,
                "token {token}"
            );
        }
        assert_eq!(
            verify_signature(secret, body, &format!("md5={digest}"), &[]),
            VerificationOutcome::RejectedUnsupportedAlgorithm
        );
    }

    #[test]
    fn sha512_requires_explicit_whitelisting() {
        let secret = b"s3cr3t";
        let body = b"payload";
        let header = format_signature_header(SignatureAlgorithm::Sha512, secret, body);

        assert_eq!(
            verify_signature(secret, body, &header, DEFAULT_ALLOWED),
            VerificationOutcome::RejectedUnsupportedAlgorithm
        );
        assert_eq!(
            verify_signature(secret, body, &header, &[SignatureAlgorithm::Sha512]),
            VerificationOutcome::Accepted
        );
    }

    #[test]
    fn shared_secret_debug_is_redacted() {
        let secret = SharedSecret::new("hunter2");
        assert!(!format!("{secret:?}").contains("hunter2"));
        assert_eq!(secret.as_bytes(), b"hunter2");
    }

    fn algorithm_strategy() -> impl Strategy<Value = SignatureAlgorithm> {
        prop_oneof![
            Just(SignatureAlgorithm::Sha1),
            Just(SignatureAlgorithm::Sha256),
            Just(SignatureAlgorithm::Sha512),
        ]
    }

    proptest! {
        #[test]
        fn valid_signature_is_always_accepted(
            secret in proptest::collection::vec(any::<u8>(), 1..64),
            body in proptest::collection::vec(any::<u8>(), 0..512),
            algorithm in algorithm_strategy(),
        ) {
            let header = format_signature_header(algorithm, &secret, &body);
            prop_assert_eq!(
                verify_signature(&secret, &body, &header, &[algorithm]),
                VerificationOutcome::Accepted
            );
        }

        #[test]
        fn any_single_bit_flip_is_a_mismatch(
            secret in proptest::collection::vec(any::<u8>(), 1..64),
            body in proptest::collection::vec(any::<u8>(), 0..256),
            algorithm in algorithm_strategy(),
            bit in any::<usize>(),
        ) {
            let mut digest = hex::decode(compute_hmac_hex(algorithm, &secret, &body))
                .expect("hex digest");
            let bit = bit % (digest.len() * 8);
            digest[bit / 8] ^= 1 << (bit % 8);
            let header = format!("{algorithm}={}", hex::encode(&digest));

            prop_assert_eq!(
                verify_signature(&secret, &body, &header, &[algorithm]),
                VerificationOutcome::RejectedDigestMismatch
            );
        }

        #[test]
        fn header_without_equals_is_malformed(header in "[^=]*") {
            prop_assert_eq!(
                verify_signature(b"s3cr3t", b"{}", &header, DEFAULT_ALLOWED),
                VerificationOutcome::RejectedMalformedHeader
            );
        }

        #[test]
        fn verification_is_idempotent(
            secret in proptest::collection::vec(any::<u8>(), 0..32),
            body in proptest::collection::vec(any::<u8>(), 0..128),
            header in "[a-z0-9=]{0,80}",
        ) {
            let first = verify_signature(&secret, &body, &header, DEFAULT_ALLOWED);
            for _ in 0..3 {
                prop_assert_eq!(verify_signature(&secret, &body, &header, DEFAULT_ALLOWED), first);
            }
        }
    }
}
