use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{ErrorMessage, HttpError};

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub iat: usize,
    pub exp: usize,
}

pub fn decode_token<T: Into<String>>(token: T, secret: &[u8]) -> Result<String, HttpError> {
    let decoded = decode::<TokenClaims>(
        &token.into(),
        &DecodingKey::from_secret(secret),
        &Validation::new(Algorithm::HS256),
    );

    match decoded {
        Ok(token) => Ok(token.claims.sub),
        Err(_) => Err(HttpError::unauthorized(ErrorMessage::InvalidToken.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use jsonwebtoken::{encode, EncodingKey, Header};

    use super::*;

    // Production tokens come from the identity service.
    pub fn create_token(
        user_id: &str,
        secret: &[u8],
        expires_in_seconds: i64,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        if user_id.is_empty() {
            return Err(jsonwebtoken::errors::ErrorKind::InvalidSubject.into());
        }

        let now = Utc::now();
        let iat = now.timestamp() as usize;
        let exp = (now + Duration::seconds(expires_in_seconds)).timestamp() as usize;
        let claims = TokenClaims {
            sub: user_id.to_string(),
            iat,
            exp,
        };

        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret))
    }

    #[test]
    fn round_trips_subject() {
        let secret = b"contact-test-secret";
        let token = create_token("a6f1c0de-0000-4000-8000-000000000001", secret, 60).unwrap();
        let sub = decode_token(token, secret).unwrap();
        assert_eq!(sub, "a6f1c0de-0000-4000-8000-000000000001");
    }

    #[test]
    fn rejects_wrong_secret() {
        let token = create_token("someone", b"right", 60).unwrap();
        assert!(decode_token(token, b"wrong").is_err());
    }

    #[test]
    fn rejects_empty_subject() {
        assert!(create_token("", b"secret", 60).is_err());
    }
}
