//! JWT authentication module.
//!
//! Handles password hashing, token issue and validation, and the
//! [`CurrentUser`] extractor that guards every `/api` route except login.
//!
//! ## Request Flow
//! ```text
//! Authorization: Bearer <jwt>
//!      │
//!      ▼
//! validate signature + expiry ──► claims.sub (user id)
//!      │
//!      ▼
//! reload user row ──► Principal (role, access level, columns)
//! ```
//!
//! The user row is reloaded on every request so role changes and deletions
//! take effect without waiting for the token to expire.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use stockbook_core::{CoreError, Principal, Role, UserProfile, ValidationError};

use crate::error::ApiError;
use crate::state::AppState;

/// Shortest accepted password.
pub const MIN_PASSWORD_LEN: usize = 8;

const ACCESS_TOKEN: &str = "access";

/// JWT claims structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,

    pub email: String,

    pub role: Role,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration (Unix timestamp)
    pub exp: i64,

    /// JWT ID (unique identifier for this token)
    pub jti: String,

    /// Token type ("access")
    pub token_type: String,
}

/// JWT token manager.
pub struct JwtManager {
    secret: String,
    access_lifetime_secs: i64,
}

impl JwtManager {
    pub fn new(secret: String, access_lifetime_secs: i64) -> Self {
        JwtManager {
            secret,
            access_lifetime_secs,
        }
    }

    pub fn access_lifetime_secs(&self) -> i64 {
        self.access_lifetime_secs
    }

    /// Generate an access token.
    pub fn generate_access_token(&self, user: &UserProfile) -> Result<String, ApiError> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.access_lifetime_secs);

        let claims = Claims {
            sub: user.id.clone(),
            email: user.email.clone(),
            role: user.role,
            iat: now.timestamp(),
            exp: exp.timestamp(),
            jti: Uuid::new_v4().to_string(),
            token_type: ACCESS_TOKEN.to_string(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| ApiError::Internal(format!("Failed to generate token: {}", e)))
    }

    /// Validate and decode an access token.
    pub fn validate_access_token(&self, token: &str) -> Result<Claims, ApiError> {
        let token_data: TokenData<Claims> = decode(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| ApiError::unauthorized(format!("Invalid token: {}", e)))?;

        if token_data.claims.token_type != ACCESS_TOKEN {
            return Err(ApiError::unauthorized("Expected access token"));
        }

        Ok(token_data.claims)
    }
}

/// Extract bearer token from authorization header.
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

// =============================================================================
// Passwords
// =============================================================================

/// Hash a password for storage.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);

    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| ApiError::Internal(format!("Failed to hash password: {}", e)))?;

    Ok(hash.to_string())
}

/// Verify a password against its hash.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

pub fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(CoreError::Validation(ValidationError::InvalidFormat {
            field: "password".to_string(),
            reason: format!("must be at least {} characters", MIN_PASSWORD_LEN),
        })
        .into());
    }
    Ok(())
}

// =============================================================================
// Current User
// =============================================================================

/// The authenticated caller of a request.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub profile: UserProfile,
    pub principal: Principal,
}

impl CurrentUser {
    pub fn id(&self) -> &str {
        &self.profile.id
    }

    /// Fails with 403 unless `allowed`.
    pub fn require(&self, allowed: bool, action: &str) -> Result<(), ApiError> {
        Ok(self.principal.require(allowed, action)?)
    }
}

/// Resolves a raw token to the user it belongs to.
pub async fn authenticate(state: &AppState, token: &str) -> Result<CurrentUser, ApiError> {
    let claims = state.jwt.validate_access_token(token)?;

    let profile = state
        .db
        .users()
        .get_by_id(&claims.sub)
        .await?
        .ok_or_else(|| ApiError::unauthorized("User no longer exists"))?;

    Ok(CurrentUser {
        principal: Principal::from(&profile),
        profile,
    })
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized("Missing authorization header"))?;

        let token = extract_bearer_token(header)
            .ok_or_else(|| ApiError::unauthorized("Expected a bearer token"))?;

        authenticate(state, token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockbook_core::AccessLevel;

    fn profile() -> UserProfile {
        UserProfile {
            id: "user-001".to_string(),
            email: "manager@shop.in".to_string(),
            full_name: None,
            role: Role::Manager,
            access_level: AccessLevel::Read,
            assigned_columns: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_jwt_roundtrip() {
        let manager = JwtManager::new("test-secret".to_string(), 3600);

        let token = manager.generate_access_token(&profile()).unwrap();
        let claims = manager.validate_access_token(&token).unwrap();

        assert_eq!(claims.sub, "user-001");
        assert_eq!(claims.email, "manager@shop.in");
        assert_eq!(claims.role, Role::Manager);
        assert_eq!(claims.token_type, "access");
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let issuer = JwtManager::new("secret-a".to_string(), 3600);
        let other = JwtManager::new("secret-b".to_string(), 3600);

        let token = issuer.generate_access_token(&profile()).unwrap();
        assert!(matches!(
            other.validate_access_token(&token),
            Err(ApiError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_expired_token_rejected() {
        // Past the default 60s leeway.
        let manager = JwtManager::new("test-secret".to_string(), -120);
        let token = manager.generate_access_token(&profile()).unwrap();
        assert!(manager.validate_access_token(&token).is_err());
    }

    #[test]
    fn test_password_hashing() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
        assert!(!verify_password("correct horse", "not-a-hash"));
    }

    #[test]
    fn test_bearer_extraction() {
        assert_eq!(extract_bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(extract_bearer_token("Basic abc"), None);
        assert_eq!(extract_bearer_token("Bearer "), None);
        assert!(validate_password("short").is_err());
        assert!(validate_password("long enough").is_ok());
    }
}
