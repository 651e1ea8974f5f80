use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use chrono::{Utc, TimeZone};
use tracing::debug;
use shared_models::auth::{JwtClaims, User};

type HmacSha256 = Hmac<Sha256>;

pub fn validate_token(token: &str, jwt_secret: &str) -> Result<User, String> {
    if jwt_secret.is_empty() {
        return Err("JWT secret is not set".to_string());
    }

    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err("Invalid token format".to_string());
    }

    let header_b64 = parts[0];
    let claims_b64 = parts[1];
    let signature_b64 = parts[2];

    let signature = URL_SAFE_NO_PAD.decode(signature_b64).map_err(|e| {
        debug!("Failed to decode signature: {}", e);
        "Invalid signature encoding".to_string()
    })?;

    let signing_input = format!("{}.{}", header_b64, claims_b64);

    let mut mac = HmacSha256::new_from_slice(jwt_secret.as_bytes())
        .map_err(|_| "Failed to create HMAC".to_string())?;
    mac.update(signing_input.as_bytes());

    if mac.verify_slice(&signature).is_err() {
        debug!("Token signature verification failed");
        return Err("Invalid token signature".to_string());
    }

    let claims = decode_claims(claims_b64)?;

    if let Some(exp) = claims.exp {
        let now = Utc::now().timestamp() as u64;
        if exp < now {
            debug!("Token expired at {} (now: {})", exp, now);
            return Err("Token expired".to_string());
        }
    }

    let user = user_from_claims(claims);
    debug!("Token validated successfully for user: {}", user.id);
    Ok(user)
}

fn decode_claims(claims_b64: &str) -> Result<JwtClaims, String> {
    let bytes = URL_SAFE_NO_PAD
        .decode(claims_b64)
        .map_err(|_| "Invalid claims encoding".to_string())?;
    let claims_json = String::from_utf8(bytes).map_err(|_| "Invalid claims encoding".to_string())?;

    serde_json::from_str(&claims_json).map_err(|e| {
        debug!("Failed to parse claims: {}", e);
        "Invalid claims format".to_string()
    })
}

/// Email verification is read from the top-level claim first and falls back to
/// `user_metadata.email_verified`, which is where the identity provider puts it.
fn user_from_claims(claims: JwtClaims) -> User {
    let email_verified = claims.email_verified.unwrap_or_else(|| {
        claims
            .user_metadata
            .as_ref()
            .and_then(|m| m.get("email_verified"))
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    });

    let created_at = claims
        .iat
        .and_then(|timestamp| Utc.timestamp_opt(timestamp as i64, 0).single());

    User {
        id: claims.sub,
        email: claims.email,
        role: claims.role,
        email_verified,
        metadata: claims.user_metadata,
        created_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{JwtTestUtils, TestUser};
    use tokio_test::{assert_err, assert_ok};

    const SECRET: &str = "test-secret-key-for-jwt-validation-must-be-long-enough";

    #[test]
    fn valid_token_yields_user() {
        let doctor = TestUser::doctor("doc@example.com");
        let token = JwtTestUtils::create_test_token(&doctor, SECRET, Some(1));

        let user = assert_ok!(validate_token(&token, SECRET));
        assert_eq!(user.id, doctor.id);
        assert!(user.is_doctor());
        assert!(user.email_verified);
    }

    #[test]
    fn unverified_email_is_reported() {
        let doctor = TestUser::doctor("doc@example.com").unverified();
        let token = JwtTestUtils::create_test_token(&doctor, SECRET, Some(1));

        let user = assert_ok!(validate_token(&token, SECRET));
        assert!(!user.email_verified);
    }

    #[test]
    fn expired_and_tampered_tokens_are_rejected() {
        let doctor = TestUser::doctor("doc@example.com");
        let expired = validate_token(&JwtTestUtils::create_expired_token(&doctor, SECRET), SECRET);
        assert_eq!(expired.unwrap_err(), "Token expired");
        assert_err!(validate_token(&JwtTestUtils::create_invalid_signature_token(&doctor), SECRET));
        assert_err!(validate_token(&JwtTestUtils::create_malformed_token(), SECRET));
    }
}
