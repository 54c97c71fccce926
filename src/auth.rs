use actix_web::HttpRequest;
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::env;
use uuid::Uuid;

use crate::errors::ApiError;
use crate::models::{User, UserRole};

// Claims do token JWT
#[derive(Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub role: String,
    pub sector_id: Option<Uuid>,
}

fn jwt_secret() -> String {
    env::var("JWT_SECRET").unwrap_or_else(|_| "secret".to_string())
}

pub fn create_token(user: &User) -> Result<String, ApiError> {
    let expiration = Utc::now()
        .checked_add_signed(chrono::Duration::hours(24))
        .map(|t| t.timestamp() as usize)
        .ok_or_else(|| ApiError::unauthorized("Erro ao gerar token"))?;

    let claims = Claims {
        sub: user.id.to_string(),
        exp: expiration,
        role: user.role.as_str().to_string(),
        sector_id: user.sector_id,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt_secret().as_ref()),
    )
    .map_err(|_| ApiError::unauthorized("Erro ao gerar token"))
}

pub fn decode_token(token: &str) -> Result<Claims, ApiError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_secret().as_ref()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| ApiError::unauthorized("Token inválido ou expirado"))
}

pub fn map_user(row: &PgRow) -> User {
    let role: String = row.get("role");
    User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        role: UserRole::parse(&role).unwrap_or(UserRole::User),
        sector_id: row.get("sector_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

pub async fn get_user_by_id(pool: &PgPool, user_id: Uuid) -> Result<Option<User>, sqlx::Error> {
    sqlx::query(
        "SELECT id, username, email, role, sector_id, created_at, updated_at \
         FROM users WHERE id = $1",
    )
    .bind(user_id)
    .map(|row: PgRow| map_user(&row))
    .fetch_optional(pool)
    .await
}

/// Resolve o usuário autenticado a partir do header Authorization.
pub async fn authenticate(req: &HttpRequest, pool: &PgPool) -> Result<User, ApiError> {
    let header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("Header Authorization obrigatório"))?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::unauthorized("Header Authorization obrigatório"))?;

    let claims = decode_token(token)?;
    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| ApiError::unauthorized("Token inválido ou expirado"))?;

    get_user_by_id(pool, user_id)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Usuário inválido"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_user(role: UserRole) -> User {
        User {
            id: Uuid::new_v4(),
            username: "maria.souza".to_string(),
            email: None,
            role,
            sector_id: Some(Uuid::new_v4()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn token_round_trip_preserves_identity() {
        let user = sample_user(UserRole::Manager);
        let token = create_token(&user).unwrap();
        let claims = decode_token(&token).unwrap();
        assert_eq!(claims.sub, user.id.to_string());
        assert_eq!(claims.role, "manager");
        assert_eq!(claims.sector_id, user.sector_id);
    }

    #[test]
    fn garbage_token_is_rejected() {
        assert!(decode_token("nem.um.token").is_err());
    }
}
