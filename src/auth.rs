//! Session derivation from the stored bearer token.
//!
//! **This client performs no cryptographic verification.** Only the payload
//! segment is decoded; the header (including `alg`) and signature are ignored.
//! The claims are trusted for display and UI gating only. The backend must verify the signature on every privileged call; the
//! role-derived gating here is a usability feature, not a security boundary.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use tracing::{debug, warn};

use crate::models::Session;
use crate::storage::TokenStore;

/// What a token looks like once decoded, before the collapse to `Option<Session>`
#[derive(Debug, Clone, PartialEq)]
pub enum TokenStatus {
    Valid(Session),
    Expired(Session),
    Malformed,
}

/// Decode the payload segment (`header.payload.signature`, base64url JSON).
/// The header and signature are never looked at.
pub fn decode_claims(token: &str) -> Option<Session> {
    let payload = token.split('.').nth(1)?;
    let bytes = match URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')) {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!("Token payload is not base64url: {}", e);
            return None;
        }
    };
    match serde_json::from_slice::<Session>(&bytes) {
        Ok(session) => Some(session),
        Err(e) => {
            debug!("Token payload could not be decoded: {}", e);
            None
        }
    }
}

/// Classify a token against `now_millis`. Valid iff decodable and `exp * 1000 > now`.
pub fn inspect_token(token: &str, now_millis: i64) -> TokenStatus {
    match decode_claims(token) {
        Some(session) if session.expires_at_millis() > now_millis => TokenStatus::Valid(session),
        Some(session) => TokenStatus::Expired(session),
        None => TokenStatus::Malformed,
    }
}

/// Derive the active session from the token store at the given instant.
///
/// "No token", "expired" and "malformed" all collapse to `None`; use
/// [`inspect_token`] when the distinction matters. Storage is never cleared here.
pub fn derive_session_at(store: &TokenStore, now_millis: i64) -> Option<Session> {
    let token = match store.get() {
        Ok(Some(token)) => token,
        Ok(None) => return None,
        Err(e) => {
            warn!("Could not read token store: {}", e);
            return None;
        }
    };

    match inspect_token(&token, now_millis) {
        TokenStatus::Valid(session) => Some(session),
        TokenStatus::Expired(session) => {
            debug!("Stored token for {} expired at {}", session.sub, session.exp);
            None
        }
        TokenStatus::Malformed => None,
    }
}

pub fn derive_session(store: &TokenStore) -> Option<Session> {
    derive_session_at(store, chrono::Utc::now().timestamp_millis())
}


#[cfg(test)]
mod tests {
    use super::test_tokens::{mint, now_secs};
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    #[test]
    fn test_future_token_yields_decoded_session() {
        let store = TokenStore::temporary().unwrap();
        let exp = now_secs() + 3600;
        store.set(&mint("7", "alice", &["USER", "ADMIN"], exp)).unwrap();

        let session = derive_session(&store).expect("session");
        assert_eq!(session.sub, "7");
        assert_eq!(session.username, "alice");
        assert_eq!(session.exp, exp as u64);
        assert!(session.roles.contains("USER"));
        assert!(session.is_admin());
    }

    #[test]
    fn test_expired_token_yields_none_but_stays_stored() {
        let store = TokenStore::temporary().unwrap();
        let token = mint("7", "alice", &["USER"], now_secs() - 10);
        store.set(&token).unwrap();

        assert_eq!(derive_session(&store), None);
        assert_eq!(store.get().unwrap().as_deref(), Some(token.as_str()));
        assert!(matches!(inspect_token(&token, chrono::Utc::now().timestamp_millis()), TokenStatus::Expired(_)));
    }

    #[test]
    fn test_expiry_is_strict() {
        let token = mint("1", "bob", &[], 1_000);
        assert!(matches!(inspect_token(&token, 999_999), TokenStatus::Valid(_)));
        assert!(matches!(inspect_token(&token, 1_000_000), TokenStatus::Expired(_)));
    }

    #[test]
    fn test_numeric_subject_is_accepted() {
        let exp = now_secs() + 3600;
        let claims = json!({"sub": 42, "username": "alice", "roles": ["ADMIN"], "exp": exp});
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(b"k")).unwrap();

        let store = TokenStore::temporary().unwrap();
        store.set(&token).unwrap();
        let session = derive_session(&store).expect("session");
        assert_eq!(session.sub, "42");
        assert_eq!(session.username, "alice");
        assert!(session.is_admin());
    }

    #[test]
    fn test_header_is_ignored() {
        let exp = now_secs() + 3600;
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(
            json!({"sub": "1", "username": "dave", "roles": [], "exp": exp})
                .to_string()
                .as_bytes(),
        );
        // Unsigned token: empty signature segment
        let token = format!("{}.{}.", header, payload);

        match inspect_token(&token, chrono::Utc::now().timestamp_millis()) {
            TokenStatus::Valid(session) => {
                assert_eq!(session.sub, "1");
                assert_eq!(session.exp, exp as u64);
            }
            other => panic!("expected valid session, got {:?}", other),
        }

        // Padded payloads decode too
        let padded = format!("x.{}==.y", payload);
        assert!(matches!(inspect_token(&padded, 0), TokenStatus::Valid(_)));
    }

    #[test]
    fn test_malformed_tokens_yield_none() {
        let store = TokenStore::temporary().unwrap();
        for garbage in ["", "not-a-jwt", "a.b.c", "eyJhbGciOiJIUzI1NiJ9.e30.sig"] {
            store.set(garbage).unwrap();
            assert_eq!(derive_session(&store), None, "token {:?}", garbage);
            assert_eq!(inspect_token(garbage, 0), TokenStatus::Malformed);
        }
    }

    #[test]
    fn test_absent_token_yields_none() {
        let store = TokenStore::temporary().unwrap();
        assert_eq!(derive_session(&store), None);
    }
}
