use std::time::{SystemTime, UNIX_EPOCH};

use crate::{
    model::role::Role,
    models::{Claims, TokenType},
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::Error};
use uuid::Uuid;

fn now() -> usize {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as usize)
        .unwrap_or(0)
}

fn issue(
    user_id: u64,
    email: &str,
    role: Role,
    token_type: TokenType,
    secret: &str,
    ttl: usize,
) -> Result<(String, Claims), Error> {
    let claims = Claims {
        user_id,
        sub: email.to_string(),
        role,
        exp: now() + ttl,
        jti: Uuid::new_v4().to_string(),
        token_type,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok((token, claims))
}

pub fn generate_access_token(
    user_id: u64,
    email: &str,
    role: Role,
    secret: &str,
    ttl: usize,
) -> Result<String, Error> {
    issue(user_id, email, role, TokenType::Access, secret, ttl).map(|(token, _)| token)
}

/// Returns the claims too; the caller persists `jti` and `exp`.
pub fn generate_refresh_token(
    user_id: u64,
    email: &str,
    role: Role,
    secret: &str,
    ttl: usize,
) -> Result<(String, Claims), Error> {
    issue(user_id, email, role, TokenType::Refresh, secret, ttl)
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, String> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| e.to_string())
}

/// Pulls the token out of an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header_value: &str) -> Option<&str> {
    header_value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn access_token_round_trips_claims() {
        let token = generate_access_token(7, "a@b.co", Role::Admin, SECRET, 900).unwrap();
        let claims = verify_token(&token, SECRET).unwrap();

        assert_eq!(claims.user_id, 7);
        assert_eq!(claims.sub, "a@b.co");
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.token_type, TokenType::Access);
    }

    #[test]
    fn refresh_tokens_get_unique_jti() {
        let (_, first) = generate_refresh_token(1, "a@b.co", Role::Employee, SECRET, 60).unwrap();
        let (token, second) =
            generate_refresh_token(1, "a@b.co", Role::Employee, SECRET, 60).unwrap();

        assert_ne!(first.jti, second.jti);
        assert_eq!(verify_token(&token, SECRET).unwrap().token_type, TokenType::Refresh);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = generate_access_token(1, "a@b.co", Role::Employee, SECRET, 900).unwrap();
        assert!(verify_token(&token, "other-secret").is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let claims = Claims {
            user_id: 1,
            sub: "a@b.co".into(),
            role: Role::Employee,
            exp: now() - 3600,
            jti: "x".into(),
            token_type: TokenType::Access,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        assert!(verify_token(&token, SECRET).is_err());
    }

    #[test]
    fn bearer_prefix_is_required() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer "), None);
    }
}
