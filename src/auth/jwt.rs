use crate::models::{Claims, TokenType};
use jsonwebtoken::{DecodingKey, Validation, decode};

/// Decodes and validates an HS256 token, including its expiry. Refresh tokens
/// are rejected; only access tokens may call the API.
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, String> {
    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| e.to_string())?;

    if claims.token_type != TokenType::Access {
        return Err("Access token required".to_string());
    }

    Ok(claims)
}

#[cfg(test)]
pub fn issue_token(
    user_id: u64,
    role: u8,
    employee_id: Option<u64>,
    token_type: TokenType,
    secret: &str,
    ttl: i64,
) -> String {
    use jsonwebtoken::{EncodingKey, Header, encode};

    let claims = Claims {
        user_id,
        sub: format!("user{user_id}"),
        role,
        exp: (chrono::Utc::now().timestamp() + ttl) as usize,
        jti: uuid::Uuid::new_v4().to_string(),
        token_type,
        employee_id,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn accepts_access_token() {
        let token = issue_token(1, 3, Some(1000), TokenType::Access, SECRET, 600);
        let claims = verify_token(&token, SECRET).unwrap();
        assert_eq!(claims.employee_id, Some(1000));
        assert_eq!(claims.role, 3);
    }

    #[test]
    fn rejects_refresh_expired_and_foreign_tokens() {
        let refresh = issue_token(1, 3, None, TokenType::Refresh, SECRET, 600);
        assert!(verify_token(&refresh, SECRET).is_err());

        // past the default 60s leeway
        let expired = issue_token(1, 3, None, TokenType::Access, SECRET, -120);
        assert!(verify_token(&expired, SECRET).is_err());

        let foreign = issue_token(1, 3, None, TokenType::Access, "other", 600);
        assert!(verify_token(&foreign, SECRET).is_err());
    }
}
