//! HMAC-signed bearer tokens.
//!
//! A token is `base64url(json(claims)) + "." + base64url(hmac_sha256(payload))`.
//! No header segment and no algorithm negotiation — the coordinator only
//! ever speaks one signing scheme, so there is nothing to negotiate and
//! nothing for a caller to downgrade.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::HashSet;
use std::sync::RwLock;
use subtle::ConstantTimeEq;

use crate::claims::Claims;
use crate::error::{AuthError, AuthResult};
use shared_types::EndpointId;

type HmacSha256 = Hmac<Sha256>;

pub const DEFAULT_TOKEN_TTL_SECONDS: i64 = 30 * 24 * 60 * 60;

/// Issues and verifies tokens against a rotatable shared secret.
///
/// The secret is held behind a `RwLock` rather than threaded through
/// every call because rotation is rare (an operator action) and
/// verification is frequent (every authenticated request); readers
/// never block each other.
pub struct TokenIssuer {
    secret: RwLock<Vec<u8>>,
    ttl_seconds: i64,
    admin_tokens: HashSet<String>,
}

impl TokenIssuer {
    #[must_use]
    pub fn new(secret: Vec<u8>, ttl_seconds: i64) -> Self {
        Self {
            secret: RwLock::new(secret),
            ttl_seconds,
            admin_tokens: HashSet::new(),
        }
    }

    #[must_use]
    pub fn with_admin_tokens(mut self, tokens: impl IntoIterator<Item = String>) -> Self {
        self.admin_tokens = tokens.into_iter().collect();
        self
    }

    pub fn issue(&self, endpoint_id: EndpointId, endpoint_name: &str) -> AuthResult<String> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            endpoint_id,
            endpoint_name: endpoint_name.to_string(),
            issued_at: now,
            expires_at: now + self.ttl_seconds,
        };
        self.sign(&claims)
    }

    fn sign(&self, claims: &Claims) -> AuthResult<String> {
        let payload = serde_json::to_vec(claims).map_err(|_| AuthError::Malformed)?;
        let payload_b64 = URL_SAFE_NO_PAD.encode(&payload);
        let secret = self.secret.read().expect("secret lock poisoned");
        let mut mac = HmacSha256::new_from_slice(&secret).expect("HMAC accepts any key length");
        mac.update(payload_b64.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_b64 = URL_SAFE_NO_PAD.encode(signature);
        Ok(format!("{payload_b64}.{signature_b64}"))
    }

    /// Verifies against the wall clock. Use [`Self::verify_at`] in tests
    /// that need a fixed instant.
    pub fn verify(&self, token: &str) -> AuthResult<Claims> {
        self.verify_at(token, Utc::now().timestamp())
    }

    pub fn verify_at(&self, token: &str, now_unix: i64) -> AuthResult<Claims> {
        let (payload_b64, signature_b64) = token.split_once('.').ok_or(AuthError::Malformed)?;

        let expected_signature = {
            let secret = self.secret.read().expect("secret lock poisoned");
            let mut mac = HmacSha256::new_from_slice(&secret).expect("HMAC accepts any key length");
            mac.update(payload_b64.as_bytes());
            mac.finalize().into_bytes()
        };
        let given_signature = URL_SAFE_NO_PAD.decode(signature_b64).map_err(|_| AuthError::Malformed)?;

        if given_signature.ct_eq(&expected_signature).unwrap_u8() != 1 {
            return Err(AuthError::BadSignature);
        }

        let payload = URL_SAFE_NO_PAD.decode(payload_b64).map_err(|_| AuthError::Malformed)?;
        let claims: Claims = serde_json::from_slice(&payload).map_err(|_| AuthError::Malformed)?;

        if claims.is_expired_at(now_unix) {
            return Err(AuthError::Expired(claims.expires_at));
        }
        Ok(claims)
    }

    /// Replaces the signing secret. Every token signed under the old
    /// secret fails verification from this point on (§4.2 "secret
    /// rotation invalidates all outstanding tokens").
    pub fn rotate_secret(&self, new_secret: Vec<u8>) {
        *self.secret.write().expect("secret lock poisoned") = new_secret;
    }

    #[must_use]
    pub fn is_admin_token(&self, candidate: &str) -> bool {
        self.admin_tokens
            .iter()
            .any(|known| candidate.as_bytes().ct_eq(known.as_bytes()).unwrap_u8() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(b"test-secret-at-least-32-bytes-long".to_vec(), DEFAULT_TOKEN_TTL_SECONDS)
    }

    #[test]
    fn round_trips_claims() {
        let issuer = issuer();
        let id = EndpointId::new();
        let token = issuer.issue(id, "alpha").expect("issue");
        let claims = issuer.verify(&token).expect("verify");
        assert_eq!(claims.endpoint_id, id);
        assert_eq!(claims.endpoint_name, "alpha");
    }

    #[test]
    fn rejects_tampered_payload() {
        let issuer = issuer();
        let token = issuer.issue(EndpointId::new(), "alpha").expect("issue");
        let (payload, signature) = token.split_once('.').unwrap();
        let tampered = format!("{payload}x.{signature}");
        assert!(matches!(issuer.verify(&tampered), Err(AuthError::BadSignature) | Err(AuthError::Malformed)));
    }

    #[test]
    fn rejects_expired_token() {
        let issuer = TokenIssuer::new(b"another-32-byte-minimum-secret!!".to_vec(), 60);
        let token = issuer.issue(EndpointId::new(), "alpha").expect("issue");
        let claims = issuer.verify_at(&token, Utc::now().timestamp() + 61);
        assert!(matches!(claims, Err(AuthError::Expired(_))));
    }

    #[test]
    fn rotation_invalidates_old_tokens() {
        let issuer = issuer();
        let token = issuer.issue(EndpointId::new(), "alpha").expect("issue");
        issuer.rotate_secret(b"a-completely-different-secret-32b".to_vec());
        assert!(matches!(issuer.verify(&token), Err(AuthError::BadSignature)));
    }

    #[test]
    fn admin_token_membership_is_checked() {
        let issuer = issuer().with_admin_tokens(["admin-one".to_string(), "admin-two".to_string()]);
        assert!(issuer.is_admin_token("admin-one"));
        assert!(!issuer.is_admin_token("not-an-admin-token"));
    }
}
