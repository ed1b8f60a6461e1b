use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::user::{User, ROLE_ADMIN};
use crate::errors::ErrorClass;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub usr_id: i64,
    pub login_id: String,
    pub role_cd: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    pub iat: i64,
    pub exp: i64,
}

/// Identity decoded from a verified bearer token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthUser {
    pub usr_id: i64,
    pub login_id: String,
    pub role_cd: String,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role_cd == ROLE_ADMIN
    }

    pub fn require_role(&self, allowed: &[&str]) -> Result<(), AuthError> {
        if allowed.iter().any(|role| *role == self.role_cd) {
            Ok(())
        } else {
            Err(AuthError::Forbidden)
        }
    }
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self { usr_id: claims.usr_id, login_id: claims.login_id, role_cd: claims.role_cd }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("authentication token is required")]
    MissingToken,
    #[error("authentication token has expired")]
    Expired,
    #[error("authentication token is invalid")]
    Invalid,
    #[error("insufficient role for this operation")]
    Forbidden,
    #[error("invalid login id or password")]
    BadCredentials,
    #[error("token encoding failed: {0}")]
    Encoding(String),
    #[error("password hashing failed: {0}")]
    PasswordHash(String),
}

impl AuthError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::MissingToken | Self::Expired | Self::Invalid | Self::BadCredentials => {
                ErrorClass::Unauthorized
            }
            Self::Forbidden => ErrorClass::Forbidden,
            Self::Encoding(_) | Self::PasswordHash(_) => ErrorClass::Internal,
        }
    }
}

/// HS256 issuer/verifier bound to the configured secret.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService").field("ttl", &self.ttl).finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(secret: &SecretString, ttl_minutes: u32) -> Self {
        let secret = secret.expose_secret().as_bytes();
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl: Duration::minutes(i64::from(ttl_minutes)),
        }
    }

    pub fn issue(&self, user: &User) -> Result<(String, Claims), AuthError> {
        let now = Utc::now();
        let claims = Claims {
            usr_id: user.id,
            login_id: user.login_id.clone(),
            role_cd: user.role_cd.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        self.encode(&claims).map(|token| (token, claims))
    }

    pub fn encode(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|error| AuthError::Encoding(error.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|error| match error.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::Invalid,
            })
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: Option<&str>) -> Result<&str, AuthError> {
    header
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::MissingToken)
}

/// bcrypt hash in modular crypt format (`$2b$<cost>$<salt><digest>`); the
/// salt travels inside the hash.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST)
        .map_err(|error| AuthError::PasswordHash(error.to_string()))
}

/// A malformed stored hash never verifies.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    bcrypt::verify(password, stored_hash).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use secrecy::SecretString;

    use super::{
        bearer_token, hash_password, verify_password, AuthError, AuthUser, Claims, TokenService,
    };
    use crate::domain::user::{User, ROLE_ADMIN, ROLE_USER};

    fn service(secret: &str) -> TokenService {
        TokenService::new(&SecretString::from(secret.to_string()), 120)
    }

    fn user() -> User {
        User {
            id: 7,
            login_id: "lee".to_string(),
            name: "Lee".to_string(),
            email: Some("lee@example.com".to_string()),
            phone: None,
            role_cd: ROLE_USER.to_string(),
            depart_cd: None,
            position: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn issued_token_verifies_with_same_secret() {
        let tokens = service("test-secret");
        let (token, issued) = tokens.issue(&user()).expect("issue");
        let claims = tokens.verify(&token).expect("verify");
        assert_eq!(claims, issued);
        assert_eq!(AuthUser::from(claims).usr_id, 7);
    }

    #[test]
    fn token_signed_with_other_secret_is_invalid() {
        let (token, _) = service("secret-a").issue(&user()).expect("issue");
        assert_eq!(service("secret-b").verify(&token), Err(AuthError::Invalid));
    }

    #[test]
    fn expired_token_is_reported_as_expired() {
        let tokens = service("test-secret");
        let now = Utc::now().timestamp();
        let claims = Claims {
            usr_id: 1,
            login_id: "old".to_string(),
            role_cd: ROLE_USER.to_string(),
            name: "Old".to_string(),
            email: None,
            iat: now - 7_200,
            exp: now - 3_600,
        };
        let token = tokens.encode(&claims).expect("encode");
        assert_eq!(tokens.verify(&token), Err(AuthError::Expired));
    }

    #[test]
    fn bearer_prefix_is_required() {
        assert_eq!(bearer_token(Some("Bearer abc")), Ok("abc"));
        assert_eq!(bearer_token(Some("Token abc")), Err(AuthError::MissingToken));
        assert_eq!(bearer_token(None), Err(AuthError::MissingToken));
    }

    #[test]
    fn password_hash_is_salted_bcrypt() {
        let hash = hash_password("pw1234").expect("hash");
        assert!(hash.starts_with("$2b$"));
        assert!(verify_password("pw1234", &hash));
        assert!(!verify_password("pw1235", &hash));
        assert_ne!(hash, hash_password("pw1234").expect("hash again"));
    }

    #[test]
    fn malformed_stored_hash_never_verifies() {
        assert!(!verify_password("pw1234", ""));
        assert!(!verify_password("pw1234", "not-a-bcrypt-hash"));
    }

    #[test]
    fn role_check_allows_listed_roles_only() {
        let admin = AuthUser { usr_id: 1, login_id: "a".into(), role_cd: ROLE_ADMIN.into() };
        let member = AuthUser { usr_id: 2, login_id: "m".into(), role_cd: ROLE_USER.into() };
        assert!(admin.require_role(&[ROLE_ADMIN]).is_ok());
        assert_eq!(member.require_role(&[ROLE_ADMIN]), Err(AuthError::Forbidden));
    }
}
