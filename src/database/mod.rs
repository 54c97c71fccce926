use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Pool, Postgres};
use std::time::Duration;
use tracing::{error, info};

use crate::config::AppConfig;

pub async fn init(config: &AppConfig) -> Result<Pool<Postgres>, sqlx::Error> {
    info!("Conectando ao banco de dados");

    let mut retries = 10;
    loop {
        match PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(&config.database_url)
            .await
        {
            Ok(pool) => {
                sqlx::query("SELECT 1").execute(&pool).await?;
                info!("Conexão com o banco estabelecida");
                run_migrations(&pool).await?;
                seed_admin(&pool).await?;
                return Ok(pool);
            }
            Err(e) => {
                retries -= 1;
                if retries == 0 {
                    error!("Não foi possível conectar ao banco: {e}");
                    return Err(e);
                }
                error!("Falha ao conectar ({retries} tentativas restantes): {e}");
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    }
}

async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sectors (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            name VARCHAR NOT NULL UNIQUE,
            description TEXT,
            created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS categories (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            name VARCHAR NOT NULL UNIQUE,
            description TEXT,
            created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            username VARCHAR NOT NULL UNIQUE,
            password_hash VARCHAR NOT NULL,
            email VARCHAR,
            role VARCHAR NOT NULL DEFAULT 'user',
            sector_id UUID REFERENCES sectors(id) ON DELETE SET NULL,
            created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS patrimonies (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            plate VARCHAR NOT NULL UNIQUE,
            name VARCHAR NOT NULL,
            description TEXT,
            category_id UUID REFERENCES categories(id) ON DELETE SET NULL,
            sector_id UUID REFERENCES sectors(id) ON DELETE SET NULL,
            responsible_id UUID REFERENCES users(id) ON DELETE SET NULL,
            acquisition_date DATE,
            value DECIMAL(12, 2) NOT NULL DEFAULT 0,
            status VARCHAR NOT NULL DEFAULT 'active',
            created_by UUID REFERENCES users(id) ON DELETE SET NULL,
            created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS transfers (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            patrimony_id UUID NOT NULL REFERENCES patrimonies(id) ON DELETE CASCADE,
            origin_sector_id UUID REFERENCES sectors(id) ON DELETE SET NULL,
            destination_sector_id UUID REFERENCES sectors(id) ON DELETE SET NULL,
            origin_responsible_id UUID REFERENCES users(id) ON DELETE SET NULL,
            destination_responsible_id UUID REFERENCES users(id) ON DELETE SET NULL,
            requested_by UUID REFERENCES users(id) ON DELETE SET NULL,
            reason TEXT,
            approved_by UUID REFERENCES users(id) ON DELETE SET NULL,
            approval_date TIMESTAMP WITH TIME ZONE,
            approval_notes TEXT,
            rejection_reason TEXT,
            effectuated BOOLEAN NOT NULL DEFAULT FALSE,
            effectuation_date TIMESTAMP WITH TIME ZONE,
            created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS write_offs (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            patrimony_id UUID NOT NULL REFERENCES patrimonies(id) ON DELETE CASCADE,
            write_off_type VARCHAR NOT NULL,
            reason TEXT,
            requested_by UUID REFERENCES users(id) ON DELETE SET NULL,
            document_path VARCHAR,
            approved_by UUID REFERENCES users(id) ON DELETE SET NULL,
            approval_date TIMESTAMP WITH TIME ZONE,
            approval_notes TEXT,
            rejected_by UUID REFERENCES users(id) ON DELETE SET NULL,
            rejection_date TIMESTAMP WITH TIME ZONE,
            rejection_reason TEXT,
            created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS inventory_sessions (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            title VARCHAR NOT NULL,
            description TEXT,
            scope_type VARCHAR NOT NULL,
            sector_id UUID REFERENCES sectors(id) ON DELETE SET NULL,
            category_id UUID REFERENCES categories(id) ON DELETE SET NULL,
            responsible_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            status VARCHAR NOT NULL DEFAULT 'in_progress',
            start_date TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
            end_date TIMESTAMP WITH TIME ZONE,
            created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS inventory_items (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            session_id UUID NOT NULL REFERENCES inventory_sessions(id) ON DELETE CASCADE,
            patrimony_id UUID NOT NULL REFERENCES patrimonies(id) ON DELETE CASCADE,
            situation VARCHAR NOT NULL DEFAULT 'pending',
            notes TEXT,
            reviewed_by UUID REFERENCES users(id) ON DELETE SET NULL,
            review_date TIMESTAMP WITH TIME ZONE,
            created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
            UNIQUE (session_id, patrimony_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS audit_logs (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            action VARCHAR NOT NULL,
            entity VARCHAR NOT NULL,
            entity_id UUID,
            user_id UUID REFERENCES users(id) ON DELETE SET NULL,
            details JSONB,
            created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS attachments (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            patrimony_id UUID REFERENCES patrimonies(id) ON DELETE CASCADE,
            write_off_id UUID REFERENCES write_offs(id) ON DELETE CASCADE,
            file_path VARCHAR NOT NULL,
            original_name VARCHAR NOT NULL,
            description TEXT,
            uploaded_by UUID REFERENCES users(id) ON DELETE SET NULL,
            created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    info!("Migrações do banco de dados concluídas");
    Ok(())
}

async fn seed_admin(pool: &PgPool) -> Result<(), sqlx::Error> {
    let admin_exists: (bool,) =
        sqlx::query_as("SELECT EXISTS(SELECT 1 FROM users WHERE username = 'admin')")
            .fetch_one(pool)
            .await?;

    if !admin_exists.0 {
        let password_hash = bcrypt::hash("admin123", bcrypt::DEFAULT_COST)
            .map_err(|e| sqlx::Error::Configuration(Box::new(e)))?;

        sqlx::query(
            "INSERT INTO users (username, password_hash, email, role) \
             VALUES ('admin', $1, 'admin@prefeitura.gov.br', 'admin')",
        )
        .bind(password_hash)
        .execute(pool)
        .await?;

        info!("Usuário administrador criado (username: admin)");
    }

    Ok(())
}
