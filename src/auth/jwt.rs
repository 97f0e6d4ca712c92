use crate::error::AuthError;
use crate::models::User;
use crate::rate_limiter::TokenVerifier;
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// Default issuer claim.
pub const DEFAULT_ISSUER: &str = "tot-api";

/// Claims carried by an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    pub sub: String,
    pub iss: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
}

/// Issues and verifies HS256 access tokens.
#[derive(Clone)]
pub struct JwtManager {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    issuer: String,
    expiry: Duration,
}

impl JwtManager {
    pub fn new(secret: &str, issuer: impl Into<String>, expiry: Duration) -> Result<Self, AuthError> {
        if secret.is_empty() {
            return Err(AuthError::MissingSecret);
        }
        let issuer = issuer.into();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&issuer]);
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.leeway = 0;

        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            issuer,
            expiry,
        })
    }

    /// Signs a token for `user`, valid from now for the configured expiry.
    pub fn issue(&self, user: &User) -> Result<String, AuthError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            user_id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            sub: user.id.to_string(),
            iss: self.issuer.clone(),
            iat: now,
            nbf: now,
            exp: now.saturating_add(self.expiry.as_secs() as i64),
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }

    /// Checks signature, algorithm, issuer, expiry and not-before.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|err| {
            debug!(error = %err, "Token rejected");
            err
        })?;
        Ok(data.claims)
    }

    pub fn expiry(&self) -> Duration {
        self.expiry
    }
}

impl TokenVerifier for JwtManager {
    fn verify_identity(&self, token: &str) -> Result<String, AuthError> {
        self.verify(token).map(|claims| claims.user_id.to_string())
    }
}

impl std::fmt::Debug for JwtManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtManager")
            .field("issuer", &self.issuer)
            .field("expiry", &self.expiry)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            email: "ada@example.com".into(),
            username: "ada".into(),
            password_hash: String::new(),
            bio: None,
            profile_picture: None,
            last_place_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    fn manager() -> JwtManager {
        JwtManager::new("test-secret", DEFAULT_ISSUER, Duration::from_secs(3600)).unwrap()
    }

    #[test]
    fn test_issue_and_verify() {
        let jwt = manager();
        let user = user();

        let token = jwt.issue(&user).unwrap();
        let claims = jwt.verify(&token).unwrap();

        assert_eq!(claims.user_id, user.id);
        assert_eq!(claims.sub, user.id.to_string());
        assert_eq!(claims.iss, "tot-api");
        assert_eq!(claims.exp - claims.iat, 3600);
        assert_eq!(jwt.verify_identity(&token).unwrap(), user.id.to_string());
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert!(matches!(
            JwtManager::new("", DEFAULT_ISSUER, Duration::from_secs(60)),
            Err(AuthError::MissingSecret)
        ));
    }

    #[test]
    fn test_wrong_secret_or_issuer() {
        let token = manager().issue(&user()).unwrap();

        let other_secret =
            JwtManager::new("another-secret", DEFAULT_ISSUER, Duration::from_secs(3600)).unwrap();
        assert!(other_secret.verify(&token).is_err());

        let other_issuer = JwtManager::new("test-secret", "someone-else", Duration::from_secs(3600)).unwrap();
        assert!(other_issuer.verify(&token).is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let jwt = manager();
        let user = user();
        let past = Utc::now().timestamp() - 7200;
        let claims = Claims {
            user_id: user.id,
            username: user.username,
            email: user.email,
            sub: user.id.to_string(),
            iss: DEFAULT_ISSUER.into(),
            iat: past,
            nbf: past,
            exp: past + 60,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();

        assert!(jwt.verify(&token).is_err());
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(manager().verify("not.a.jwt").is_err());
        assert!(manager().verify("").is_err());
    }
}
