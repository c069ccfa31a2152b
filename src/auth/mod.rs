use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::SecurityConfig;
use crate::database::models::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Username
    pub sub: String,
    pub uid: i64,
    pub role: Role,
    pub typ: TokenType,
    pub jti: Uuid,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(user_id: i64, username: &str, role: Role, typ: TokenType, security: &SecurityConfig) -> Self {
        let now = Utc::now();
        let ttl = match typ {
            TokenType::Access => Duration::minutes(security.access_token_ttl_minutes),
            TokenType::Refresh => Duration::hours(security.refresh_token_ttl_hours),
        };

        Self {
            sub: username.to_string(),
            uid: user_id,
            role,
            typ,
            jti: Uuid::new_v4(),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        }
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or_else(Utc::now)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("JWT generation error: {0}")]
    TokenGeneration(String),

    #[error("Invalid JWT secret")]
    InvalidSecret,

    #[error("Invalid token: {0}")]
    Invalid(String),

    #[error("Expected a {expected:?} token but received a {found:?} token")]
    WrongTokenType { expected: TokenType, found: TokenType },
}

pub fn generate_jwt(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    if secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }

    let encoding_key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), claims, &encoding_key).map_err(|e| JwtError::TokenGeneration(e.to_string()))
}

/// Decode a token and check that it is of the expected kind.
pub fn validate_jwt(token: &str, expected: TokenType, secret: &str) -> Result<Claims, JwtError> {
    if secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }

    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let token_data = decode::<Claims>(token, &decoding_key, &Validation::default())
        .map_err(|e| JwtError::Invalid(e.to_string()))?;

    if token_data.claims.typ != expected {
        return Err(JwtError::WrongTokenType {
            expected,
            found: token_data.claims.typ,
        });
    }

    Ok(token_data.claims)
}

/// Access and refresh token issued together at login and on every refresh.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub access: Claims,
    pub refresh: Claims,
}

pub fn issue_token_pair(
    user_id: i64,
    username: &str,
    role: Role,
    security: &SecurityConfig,
) -> Result<TokenPair, JwtError> {
    let access = Claims::new(user_id, username, role, TokenType::Access, security);
    let refresh = Claims::new(user_id, username, role, TokenType::Refresh, security);

    Ok(TokenPair {
        access_token: generate_jwt(&access, &security.jwt_secret)?,
        refresh_token: generate_jwt(&refresh, &security.jwt_secret)?,
        access,
        refresh,
    })
}

/// Lowest bcrypt work factor; used by the development preset and tests.
pub const MIN_HASH_COST: u32 = 4;

/// bcrypt hash with the given work factor, in the usual `$2b$<cost>$...` form.
pub fn hash_password(password: &str, cost: u32) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(password, cost)
}

/// False for a wrong password and for anything that is not a bcrypt hash.
pub fn verify_password(password: &str, stored: &str) -> bool {
    bcrypt::verify(password, stored).unwrap_or(false)
}
