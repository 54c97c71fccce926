use actix_web::{web, HttpRequest, HttpResponse};
use bcrypt::{hash, verify, DEFAULT_COST};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::auth::{authenticate, create_token, get_user_by_id, map_user};
use crate::errors::ApiError;
use crate::models::{CreateUser, LoginRequest, LoginResponse, UpdateUser, UserRole};

const USER_COLUMNS: &str = "id, username, email, role, sector_id, created_at, updated_at";

pub async fn register_user(
    pool: web::Data<PgPool>,
    user_data: web::Json<CreateUser>,
) -> Result<HttpResponse, ApiError> {
    if user_data.username.trim().is_empty() {
        return Err(ApiError::validation("Username é obrigatório"));
    }
    if user_data.password.is_empty() {
        return Err(ApiError::validation("Senha é obrigatória"));
    }

    let username = user_data.username.to_lowercase();

    let existing: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM users WHERE username = $1)")
        .bind(&username)
        .fetch_one(pool.get_ref())
        .await?;
    if existing.0 {
        return Err(ApiError::validation("Username já cadastrado"));
    }

    if let Some(sector_id) = user_data.sector_id {
        let sector_exists: (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM sectors WHERE id = $1)")
                .bind(sector_id)
                .fetch_one(pool.get_ref())
                .await?;
        if !sector_exists.0 {
            return Err(ApiError::validation("Setor não encontrado"));
        }
    }

    let password_hash = hash(&user_data.password, DEFAULT_COST)
        .map_err(|_| ApiError::validation("Erro ao processar a senha"))?;
    let role = user_data.role.unwrap_or(UserRole::User);

    let user = sqlx::query(&format!(
        "INSERT INTO users (id, username, password_hash, email, role, sector_id) \
         VALUES (gen_random_uuid(), $1, $2, $3, $4, $5) RETURNING {USER_COLUMNS}"
    ))
    .bind(&username)
    .bind(&password_hash)
    .bind(&user_data.email)
    .bind(role.as_str())
    .bind(user_data.sector_id)
    .map(|row: PgRow| map_user(&row))
    .fetch_one(pool.get_ref())
    .await?;

    Ok(HttpResponse::Created().json(user))
}

pub async fn login_user(
    pool: web::Data<PgPool>,
    login_data: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    let row = sqlx::query(&format!(
        "SELECT {USER_COLUMNS}, password_hash FROM users WHERE username = LOWER($1)"
    ))
    .bind(&login_data.username)
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| ApiError::unauthorized("Credenciais inválidas"))?;

    let password_hash: String = row.get("password_hash");
    let user = map_user(&row);

    let valid = verify(&login_data.password, &password_hash).unwrap_or(false);
    if !valid {
        return Err(ApiError::unauthorized("Credenciais inválidas"));
    }

    let token = create_token(&user)?;

    Ok(HttpResponse::Ok().json(LoginResponse { token, user }))
}

pub async fn me(pool: web::Data<PgPool>, req: HttpRequest) -> Result<HttpResponse, ApiError> {
    let user = authenticate(&req, pool.get_ref()).await?;
    Ok(HttpResponse::Ok().json(user))
}

pub async fn get_users(pool: web::Data<PgPool>, req: HttpRequest) -> Result<HttpResponse, ApiError> {
    let user = authenticate(&req, pool.get_ref()).await?;
    if user.role != UserRole::Admin {
        return Err(ApiError::permission("Acesso restrito a administradores"));
    }

    let users = sqlx::query(&format!(
        "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC"
    ))
    .map(|row: PgRow| map_user(&row))
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(users))
}

pub async fn get_user(
    pool: web::Data<PgPool>,
    id: web::Path<Uuid>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let _user = authenticate(&req, pool.get_ref()).await?;

    let user = get_user_by_id(pool.get_ref(), id.into_inner())
        .await?
        .ok_or_else(|| ApiError::not_found("Usuário não encontrado"))?;

    Ok(HttpResponse::Ok().json(user))
}

pub async fn update_user(
    pool: web::Data<PgPool>,
    id: web::Path<Uuid>,
    user_data: web::Json<UpdateUser>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let caller = authenticate(&req, pool.get_ref()).await?;
    let user_id = id.into_inner();

    // Usuário comum só altera o próprio cadastro; papel só muda por admin
    if caller.role != UserRole::Admin {
        if caller.id != user_id {
            return Err(ApiError::permission("Acesso restrito a administradores"));
        }
        if user_data.role.is_some() {
            return Err(ApiError::permission("Somente administradores alteram papel"));
        }
    }

    let existing = get_user_by_id(pool.get_ref(), user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Usuário não encontrado"))?;

    if let Some(sector_id) = user_data.sector_id {
        let sector_exists: (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM sectors WHERE id = $1)")
                .bind(sector_id)
                .fetch_one(pool.get_ref())
                .await?;
        if !sector_exists.0 {
            return Err(ApiError::validation("Setor não encontrado"));
        }
    }

    let username = user_data
        .username
        .as_ref()
        .map(|u| u.to_lowercase())
        .unwrap_or(existing.username);
    let email = user_data.email.clone().or(existing.email);
    let role = user_data.role.unwrap_or(existing.role);
    let sector_id = user_data.sector_id.or(existing.sector_id);

    let password_hash = match &user_data.password {
        Some(password) => Some(
            hash(password, DEFAULT_COST)
                .map_err(|_| ApiError::validation("Erro ao processar a senha"))?,
        ),
        None => None,
    };

    let updated = sqlx::query(&format!(
        "UPDATE users SET username = $1, email = $2, role = $3, sector_id = $4, \
         password_hash = COALESCE($5, password_hash), updated_at = NOW() \
         WHERE id = $6 RETURNING {USER_COLUMNS}"
    ))
    .bind(&username)
    .bind(&email)
    .bind(role.as_str())
    .bind(sector_id)
    .bind(&password_hash)
    .bind(user_id)
    .map(|row: PgRow| map_user(&row))
    .fetch_one(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(updated))
}
