//! HS256 bearer token verification.

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Authenticator, Identity, UserRole};
use crate::config::AuthConfig;
use crate::{ChatError, Result};

/// JWT claims structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (user ID).
    pub sub: i64,
    /// Platform role.
    pub role: String,
    /// Issued at timestamp.
    pub iat: u64,
    /// Expiration timestamp.
    pub exp: u64,
    /// JWT ID (unique identifier).
    pub jti: String,
}

/// Verifies tokens minted by the platform's login service.
#[derive(Clone)]
pub struct JwtAuthenticator {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtAuthenticator {
    /// Create an authenticator from a shared secret.
    pub fn new(secret: &str) -> Self {
        Self::with_leeway(secret, 0)
    }

    /// Create an authenticator tolerating `leeway_secs` of clock skew.
    pub fn with_leeway(secret: &str, leeway_secs: u64) -> Self {
        let mut validation = Validation::default();
        validation.validate_exp = true;
        validation.leeway = leeway_secs;

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Create an authenticator from configuration.
    pub fn from_config(config: &AuthConfig) -> Self {
        Self::with_leeway(&config.jwt_secret, config.token_leeway_secs)
    }

    /// Mint a token for `identity` valid for `ttl_secs`.
    ///
    /// Used by tooling and tests; production tokens come from the login service.
    pub fn issue(&self, identity: Identity, ttl_secs: u64) -> Result<String> {
        let now = chrono::Utc::now().timestamp() as u64;
        let claims = JwtClaims {
            sub: identity.user_id,
            role: identity.role.as_str().to_string(),
            iat: now,
            exp: now + ttl_secs,
            jti: uuid::Uuid::new_v4().to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| ChatError::Config(format!("failed to encode token: {e}")))
    }
}

impl Authenticator for JwtAuthenticator {
    fn authenticate(&self, credential: &str) -> Result<Identity> {
        let token = credential.strip_prefix("Bearer ").unwrap_or(credential).trim();
        if token.is_empty() {
            return Err(ChatError::Unauthorized("missing credential".into()));
        }

        let data = decode::<JwtClaims>(token, &self.decoding_key, &self.validation).map_err(
            |e| {
                debug!("JWT validation failed: {}", e);
                ChatError::Unauthorized("invalid or expired token".into())
            },
        )?;

        let role = data
            .claims
            .role
            .parse::<UserRole>()
            .map_err(ChatError::Unauthorized)?;

        Ok(Identity::new(data.claims.sub, role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_raw(secret: &str, claims: &JwtClaims) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_issue_and_authenticate() {
        let auth = JwtAuthenticator::new("test-secret");
        let token = auth
            .issue(Identity::new(7, UserRole::Alumni), 3600)
            .unwrap();

        let identity = auth.authenticate(&token).unwrap();
        assert_eq!(identity, Identity::new(7, UserRole::Alumni));
    }

    #[test]
    fn test_bearer_prefix_accepted() {
        let auth = JwtAuthenticator::new("test-secret");
        let token = auth
            .issue(Identity::new(1, UserRole::Student), 3600)
            .unwrap();

        let identity = auth.authenticate(&format!("Bearer {token}")).unwrap();
        assert_eq!(identity.user_id, 1);
    }

    #[test]
    fn test_expired_token() {
        let now = chrono::Utc::now().timestamp() as u64;
        let claims = JwtClaims {
            sub: 1,
            role: "student".to_string(),
            iat: now - 7200,
            exp: now - 3600,
            jti: uuid::Uuid::new_v4().to_string(),
        };
        let token = encode_raw("test-secret", &claims);

        let auth = JwtAuthenticator::new("test-secret");
        assert!(matches!(
            auth.authenticate(&token),
            Err(ChatError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_wrong_secret() {
        let issuer = JwtAuthenticator::new("secret1");
        let token = issuer
            .issue(Identity::new(1, UserRole::Teacher), 3600)
            .unwrap();

        let verifier = JwtAuthenticator::new("secret2");
        assert!(verifier.authenticate(&token).is_err());
    }

    #[test]
    fn test_unknown_role_rejected() {
        let now = chrono::Utc::now().timestamp() as u64;
        let claims = JwtClaims {
            sub: 1,
            role: "sysop".to_string(),
            iat: now,
            exp: now + 3600,
            jti: uuid::Uuid::new_v4().to_string(),
        };
        let token = encode_raw("test-secret", &claims);

        let auth = JwtAuthenticator::new("test-secret");
        assert!(matches!(
            auth.authenticate(&token),
            Err(ChatError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_empty_credential() {
        let auth = JwtAuthenticator::new("test-secret");
        assert!(auth.authenticate("").is_err());
        assert!(auth.authenticate("Bearer ").is_err());
    }
}
