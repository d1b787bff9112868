//! BZCert verification (§3, §4.7): the signature-on-rand check, both
//! id-tokens, and the rotation-policy check between them.

use crate::error::CryptoError;
use crate::keys::Ed25519PublicKey;
use crate::oidc::{self, IdTokenVerifier};
use mrzap_types::BzCert;

/// Verifies a [`BzCert`] end to end:
///
/// 1. `signatureOnRand` verifies under `clientPublicKey` (§3).
/// 2. Both id-tokens pass signature verification via `verifier`.
/// 3. The *current* id-token's `exp`/`iss` claims are checked against
///    `expected_issuer` and `now_unix_seconds` (§4.7 — the initial token is
///    allowed to have since expired; only the current one must still be
///    live).
/// 4. The initial and current id-tokens' `sub` claims match — rotation to a
///    refreshed token is permitted, rotation to a *different user* is not
///    (§4.7, §9 Open Question on id-token rotation).
pub fn verify(
    cert: &BzCert,
    verifier: &dyn IdTokenVerifier,
    expected_issuer: &str,
    now_unix_seconds: i64,
) -> Result<(), CryptoError> {
    let client_key = Ed25519PublicKey::from_base64(&cert.client_public_key)?;
    client_key
        .verify(cert.rand.as_bytes(), &cert.signature_on_rand)
        .map_err(|_| CryptoError::BzCertSignatureInvalid)?;

    verifier.verify_signature(&cert.initial_id_token)?;
    verifier.verify_signature(&cert.current_id_token)?;

    let initial_claims = oidc::decode_claims_unverified(&cert.initial_id_token)?;
    let current_claims = oidc::decode_claims_unverified(&cert.current_id_token)?;

    oidc::check_issuer(&current_claims, expected_issuer)?;
    oidc::check_not_expired(&current_claims, now_unix_seconds)?;

    if initial_claims.sub != current_claims.sub {
        return Err(CryptoError::RotationSubjectMismatch);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::Ed25519KeyPair;
    use crate::oidc::{AlwaysValidVerifier, IdTokenClaims};
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token_for(sub: &str, iss: &str, exp: i64) -> String {
        let claims = IdTokenClaims {
            sub: sub.into(),
            iss: iss.into(),
            exp,
            aud: None,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(b"test")).unwrap()
    }

    fn signed_cert(initial_sub: &str, current_sub: &str) -> BzCert {
        let client_key = Ed25519KeyPair::generate();
        let rand = "a-nonce";
        let signature_on_rand = client_key.sign(rand.as_bytes());
        BzCert {
            initial_id_token: token_for(initial_sub, "https://idp.example", 9_999_999_999),
            current_id_token: token_for(current_sub, "https://idp.example", 9_999_999_999),
            client_public_key: client_key.public_key().to_base64(),
            rand: rand.into(),
            signature_on_rand,
        }
    }

    #[test]
    fn accepts_a_well_formed_cert() {
        let cert = signed_cert("user-1", "user-1");
        verify(&cert, &AlwaysValidVerifier, "https://idp.example", 0).unwrap();
    }

    #[test]
    fn rejects_subject_rotation_to_a_different_user() {
        let cert = signed_cert("user-1", "user-2");
        let err = verify(&cert, &AlwaysValidVerifier, "https://idp.example", 0).unwrap_err();
        assert!(matches!(err, CryptoError::RotationSubjectMismatch));
    }

    #[test]
    fn rejects_a_tampered_signature_on_rand() {
        let mut cert = signed_cert("user-1", "user-1");
        let other_key = Ed25519KeyPair::generate();
        cert.signature_on_rand = other_key.sign(cert.rand.as_bytes());
        let err = verify(&cert, &AlwaysValidVerifier, "https://idp.example", 0).unwrap_err();
        assert!(matches!(err, CryptoError::BzCertSignatureInvalid));
    }

    #[test]
    fn rejects_an_unrecognized_issuer() {
        let cert = signed_cert("user-1", "user-1");
        let err = verify(&cert, &AlwaysValidVerifier, "https://other-idp.example", 0).unwrap_err();
        assert!(matches!(err, CryptoError::IdTokenIssuerMismatch { .. }));
    }
}
