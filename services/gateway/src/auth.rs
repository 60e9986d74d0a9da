use crate::error::AppError;
use crate::state::AppState;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use dashmap::DashMap;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};
use types::ids::UserId;

const TOKEN_TTL_SECS: u64 = 24 * 60 * 60;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: UserId,
    pub exp: usize,
}

/// Active bearer tokens. Logout removes the token, after which the bearer
/// is rejected even though the JWT itself is still within its lifetime.
pub struct SessionStore {
    active: DashMap<String, UserId>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            active: DashMap::new(),
        }
    }

    pub fn insert(&self, token: String, user_id: UserId) {
        self.active.insert(token, user_id);
    }

    pub fn revoke(&self, token: &str) -> bool {
        self.active.remove(token).is_some()
    }

    pub fn is_active(&self, token: &str) -> bool {
        self.active.contains_key(token)
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Issue a signed bearer token for a user.
pub fn issue_token(secret: &str, user_id: UserId) -> Result<String, AppError> {
    let exp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
        + TOKEN_TTL_SECS;
    let claims = Claims {
        sub: user_id,
        exp: exp as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|err| AppError::Internal(anyhow::anyhow!("token issuance failed: {err}")))
}

/// Salted SHA-256 password hash, stored as `salt$digest` in hex.
pub fn hash_password(password: &str) -> String {
    let salt: [u8; 16] = rand::thread_rng().gen();
    let digest = digest_with_salt(&salt, password);
    format!("{}${}", hex_encode(&salt), hex_encode(&digest))
}

/// Verify a password against a stored `salt$digest` hash.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt_hex, digest_hex)) = stored.split_once('$') else {
        return false;
    };
    let Some(salt) = hex_decode(salt_hex) else {
        return false;
    };
    hex_encode(&digest_with_salt(&salt, password)) == digest_hex
}

fn digest_with_salt(salt: &[u8], password: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hasher.finalize().to_vec()
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn hex_decode(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}

pub struct AuthenticatedUser {
    pub user_id: UserId,
    pub token: String,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get("Authorization")
            .ok_or_else(|| AppError::Unauthorized("Missing authentication credentials".into()))?;
        let auth_str = header
            .to_str()
            .map_err(|_| AppError::Unauthorized("Invalid header string".into()))?;
        let token = auth_str
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Unauthorized("Expected a bearer token".into()))?;

        if !state.sessions.is_active(token) {
            return Err(AppError::Unauthorized("Token revoked or unknown".into()));
        }

        let key = DecodingKey::from_secret(state.jwt_secret.as_bytes());
        let token_data = decode::<Claims>(token, &key, &Validation::default())
            .map_err(|e| AppError::Unauthorized(format!("Invalid token: {e}")))?;

        Ok(AuthenticatedUser {
            user_id: token_data.claims.sub,
            token: token.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_roundtrip() {
        let hash = hash_password("correct horse");
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
    }

    #[test]
    fn test_hashes_are_salted() {
        assert_ne!(hash_password("same"), hash_password("same"));
    }

    #[test]
    fn test_verify_rejects_malformed_hash() {
        assert!(!verify_password("anything", "not-a-valid-hash"));
        assert!(!verify_password("anything", "zz$zz"));
    }

    #[test]
    fn test_issue_token_embeds_user() {
        let user_id = UserId::new();
        let token = issue_token("secret", user_id).unwrap();
        let key = DecodingKey::from_secret("secret".as_bytes());
        let data = decode::<Claims>(&token, &key, &Validation::default()).unwrap();
        assert_eq!(data.claims.sub, user_id);
    }
}
