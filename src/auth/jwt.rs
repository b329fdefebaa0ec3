use std::time::Duration;

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use crate::{
    auth::claims::Claims,
    config::{JwtConfig, MAX_TTL_MINUTES},
    error::{AppError, AppResult},
};

/// Holds JWT signing and verification keys with config data.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    ttl: Duration,
}

/// `AppConfig::from_env` bounds the value; anything outside those bounds is
/// clamped here instead of overflowing.
fn ttl_from_minutes(minutes: i64) -> Duration {
    let minutes = minutes.clamp(1, MAX_TTL_MINUTES) as u64;
    Duration::from_secs(minutes * 60)
}

/// A signed token together with the instant it stops being valid.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: OffsetDateTime,
}

impl JwtKeys {
    pub fn from_config(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            ttl: ttl_from_minutes(cfg.ttl_minutes),
        }
    }

    /// Signs a token for `subject` that expires at `expires_at`.
    pub fn issue_token(&self, subject: &str, expires_at: OffsetDateTime) -> AppResult<String> {
        let claims = Claims {
            sub: subject.to_string(),
            iat: OffsetDateTime::now_utc().unix_timestamp(),
            exp: expires_at.unix_timestamp(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            jti: Uuid::new_v4(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(anyhow::Error::new(e).context("jwt encode")))?;
        debug!(jti = %claims.jti, exp = claims.exp, "jwt signed");
        Ok(token)
    }

    /// Signs an access token valid for the configured ttl.
    pub fn issue_access(&self, subject: &str) -> AppResult<IssuedToken> {
        let expires_at = OffsetDateTime::now_utc() + self.ttl;
        let token = self.issue_token(subject, expires_at)?;
        Ok(IssuedToken { token, expires_at })
    }

    pub fn verify_token(&self, token: &str) -> AppResult<Claims> {
        self.verify_token_at(token, OffsetDateTime::now_utc())
    }

    /// Checks signature, issuer and audience, then expiry against `now`.
    /// A token is expired from its `exp` second onwards.
    pub fn verify_token_at(&self, token: &str, now: OffsetDateTime) -> AppResult<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        validation.validate_exp = false;
        validation.leeway = 0;

        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            debug!(error = %e, "jwt rejected");
            AppError::TokenInvalid
        })?;

        if now.unix_timestamp() >= data.claims.exp {
            debug!(jti = %data.claims.jti, "jwt expired");
            return Err(AppError::TokenExpired);
        }
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration as TimeDuration;

    fn make_keys(secret: &str, issuer: &str, audience: &str) -> JwtKeys {
        JwtKeys::from_config(&JwtConfig {
            secret: secret.into(),
            issuer: issuer.into(),
            audience: audience.into(),
            ttl_minutes: 30,
        })
    }

    fn at(ts: i64) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(ts).unwrap()
    }

    #[test]
    fn issue_and_verify_access_token() {
        let keys = make_keys("dev-secret", "test-issuer", "test-aud");
        let issued = keys.issue_access("a@x.com").expect("issue access");
        let claims = keys.verify_token(&issued.token).expect("verify token");
        assert_eq!(claims.sub, "a@x.com");
        assert_eq!(claims.iss, "test-issuer");
        assert_eq!(claims.aud, "test-aud");
        assert_eq!(claims.exp, issued.expires_at.unix_timestamp());
    }

    #[test]
    fn access_token_defaults_to_thirty_minutes() {
        let keys = make_keys("dev-secret", "iss", "aud");
        let before = OffsetDateTime::now_utc();
        let issued = keys.issue_access("a@x.com").unwrap();
        let ttl = issued.expires_at - before;
        assert!(ttl >= TimeDuration::minutes(30));
        assert!(ttl < TimeDuration::minutes(31));
    }

    #[test]
    fn out_of_range_ttl_does_not_overflow() {
        assert_eq!(ttl_from_minutes(i64::MAX), Duration::from_secs(MAX_TTL_MINUTES as u64 * 60));
        assert_eq!(ttl_from_minutes(-10), Duration::from_secs(60));
    }

    #[test]
    fn token_expires_exactly_at_expiry() {
        let keys = make_keys("dev-secret", "iss", "aud");
        let expiry = 4_102_444_800; // 2100-01-01
        let token = keys.issue_token("a@x.com", at(expiry)).unwrap();

        assert_eq!(keys.verify_token_at(&token, at(expiry - 1)).unwrap().sub, "a@x.com");
        assert!(matches!(
            keys.verify_token_at(&token, at(expiry)),
            Err(AppError::TokenExpired)
        ));
        assert!(matches!(
            keys.verify_token_at(&token, at(expiry + 3600)),
            Err(AppError::TokenExpired)
        ));
    }

    #[test]
    fn past_expiry_is_expired_now() {
        let keys = make_keys("dev-secret", "iss", "aud");
        let token = keys
            .issue_token("a@x.com", OffsetDateTime::now_utc() - TimeDuration::minutes(1))
            .unwrap();
        assert!(matches!(keys.verify_token(&token), Err(AppError::TokenExpired)));
    }

    #[test]
    fn verify_rejects_foreign_signature() {
        let ours = make_keys("secret-a", "iss", "aud");
        let theirs = make_keys("secret-b", "iss", "aud");
        let issued = theirs.issue_access("a@x.com").unwrap();
        assert!(matches!(ours.verify_token(&issued.token), Err(AppError::TokenInvalid)));
    }

    #[test]
    fn verify_rejects_wrong_issuer_or_audience() {
        let good_keys = make_keys("same-secret", "good-iss", "good-aud");
        let bad_iss = make_keys("same-secret", "bad-iss", "good-aud");
        let bad_aud = make_keys("same-secret", "good-iss", "bad-aud");
        let issued = good_keys.issue_access("a@x.com").unwrap();
        assert!(matches!(bad_iss.verify_token(&issued.token), Err(AppError::TokenInvalid)));
        assert!(matches!(bad_aud.verify_token(&issued.token), Err(AppError::TokenInvalid)));
    }

    #[test]
    fn verify_rejects_garbage() {
        let keys = make_keys("dev-secret", "iss", "aud");
        assert!(matches!(keys.verify_token("not.a.jwt"), Err(AppError::TokenInvalid)));
        assert!(matches!(keys.verify_token(""), Err(AppError::TokenInvalid)));
    }
}
