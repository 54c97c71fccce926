use actix_cors::Cors;
use actix_files::Files;
use actix_web::{web, App, HttpServer};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod audit;
mod auth;
mod config;
mod database;
mod errors;
mod handlers;
mod models;
mod permissions;

use config::AppConfig;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env();

    // Diretório de anexos servido estaticamente em /uploads
    let anexos_dir = format!("{}/anexos", config.upload_dir);
    if let Err(e) = std::fs::create_dir_all(&anexos_dir) {
        error!("Erro ao criar diretório de uploads: {e}");
    }

    let pool = match database::init(&config).await {
        Ok(pool) => pool,
        Err(e) => {
            error!("Erro fatal ao inicializar o banco de dados: {e}");
            std::process::exit(1);
        }
    };

    info!("Servidor em http://{}", config.bind_addr);

    let bind_addr = config.bind_addr.clone();
    let upload_dir = config.upload_dir.clone();

    HttpServer::new(move || {
        let mut cors = Cors::default()
            .allowed_origin_fn(|origin, _req_head| {
                origin.as_bytes().starts_with(b"http://localhost")
                    || origin.as_bytes().starts_with(b"http://127.0.0.1")
            })
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                actix_web::http::header::CONTENT_TYPE,
                actix_web::http::header::AUTHORIZATION,
                actix_web::http::header::ACCEPT,
            ])
            .supports_credentials()
            .max_age(3600);
        for origin in &config.cors_origins {
            cors = cors.allowed_origin(origin);
        }

        App::new()
            .wrap(cors)
            .app_data(web::Data::new(pool.clone()))
            .app_data(web::Data::new(config.clone()))
            .service(Files::new("/uploads", upload_dir.clone()).use_last_modified(true))
            .route("/api/health", web::get().to(handlers::health_check))
            .service(
                web::scope("/api")
                    // Autenticação e usuários
                    .route("/auth/register", web::post().to(handlers::auth::register_user))
                    .route("/auth/login", web::post().to(handlers::auth::login_user))
                    .route("/auth/me", web::get().to(handlers::auth::me))
                    .route("/users", web::get().to(handlers::auth::get_users))
                    .route("/users/{id}", web::get().to(handlers::auth::get_user))
                    .route("/users/{id}", web::put().to(handlers::auth::update_user))
                    // Setores e categorias
                    .route("/sectors", web::get().to(handlers::sectors::get_sectors))
                    .route("/sectors", web::post().to(handlers::sectors::create_sector))
                    .route("/sectors/{id}", web::get().to(handlers::sectors::get_sector))
                    .route("/sectors/{id}", web::put().to(handlers::sectors::update_sector))
                    .route("/sectors/{id}", web::delete().to(handlers::sectors::delete_sector))
                    .route("/categories", web::get().to(handlers::categories::get_categories))
                    .route("/categories", web::post().to(handlers::categories::create_category))
                    .route("/categories/{id}", web::get().to(handlers::categories::get_category))
                    .route("/categories/{id}", web::put().to(handlers::categories::update_category))
                    .route(
                        "/categories/{id}",
                        web::delete().to(handlers::categories::delete_category),
                    )
                    // Patrimônios
                    .route("/patrimonies", web::get().to(handlers::patrimonies::get_patrimonies))
                    .route("/patrimonies", web::post().to(handlers::patrimonies::create_patrimony))
                    .route("/patrimonies/{id}", web::get().to(handlers::patrimonies::get_patrimony))
                    .route("/patrimonies/{id}", web::put().to(handlers::patrimonies::update_patrimony))
                    .route(
                        "/patrimonies/{id}",
                        web::delete().to(handlers::patrimonies::delete_patrimony),
                    )
                    // Transferências
                    .route("/transfers", web::post().to(handlers::transfers::request_transfer))
                    .route("/transfers", web::get().to(handlers::transfers::get_transfers))
                    .route("/transfers/{id}", web::get().to(handlers::transfers::get_transfer))
                    .route("/transfers/{id}", web::delete().to(handlers::transfers::delete_transfer))
                    .route(
                        "/transfers/{id}/approve",
                        web::post().to(handlers::transfers::approve_transfer),
                    )
                    .route(
                        "/transfers/{id}/reject",
                        web::post().to(handlers::transfers::reject_transfer),
                    )
                    .route(
                        "/transfers/{id}/effectuate",
                        web::post().to(handlers::transfers::effectuate_transfer),
                    )
                    // Baixas
                    .route("/write-offs", web::post().to(handlers::write_offs::request_write_off))
                    .route("/write-offs", web::get().to(handlers::write_offs::get_write_offs))
                    .route("/write-offs/{id}", web::get().to(handlers::write_offs::get_write_off))
                    .route(
                        "/write-offs/{id}",
                        web::delete().to(handlers::write_offs::delete_write_off),
                    )
                    .route(
                        "/write-offs/{id}/approve",
                        web::post().to(handlers::write_offs::approve_write_off),
                    )
                    .route(
                        "/write-offs/{id}/reject",
                        web::post().to(handlers::write_offs::reject_write_off),
                    )
                    // Inventários
                    .route("/inventories", web::post().to(handlers::inventories::create_session))
                    .route("/inventories", web::get().to(handlers::inventories::get_sessions))
                    .route("/inventories/{id}", web::get().to(handlers::inventories::get_session))
                    .route("/inventories/{id}", web::put().to(handlers::inventories::update_session))
                    .route(
                        "/inventories/{id}",
                        web::delete().to(handlers::inventories::delete_session),
                    )
                    .route(
                        "/inventories/{id}/items",
                        web::post().to(handlers::inventories::add_item),
                    )
                    .route(
                        "/inventories/{id}/items/bulk",
                        web::post().to(handlers::inventories::bulk_add_items),
                    )
                    .route(
                        "/inventories/{id}/items/{item_id}",
                        web::put().to(handlers::inventories::review_item),
                    )
                    .route(
                        "/inventories/{id}/items/{item_id}",
                        web::delete().to(handlers::inventories::remove_item),
                    )
                    .route(
                        "/inventories/{id}/finalize",
                        web::post().to(handlers::inventories::finalize_session),
                    )
                    .route(
                        "/inventories/{id}/cancel",
                        web::post().to(handlers::inventories::cancel_session),
                    )
                    .route(
                        "/inventories/{id}/stats",
                        web::get().to(handlers::inventories::session_stats),
                    )
                    // Anexos
                    .route("/attachments", web::post().to(handlers::attachments::upload_attachment))
                    .route("/attachments", web::get().to(handlers::attachments::get_attachments))
                    .route(
                        "/attachments/{id}",
                        web::delete().to(handlers::attachments::delete_attachment),
                    )
                    // Logs de auditoria
                    .route("/audit-logs", web::get().to(handlers::audit_logs::get_audit_logs))
                    .route("/audit-logs/{id}", web::get().to(handlers::audit_logs::get_audit_log)),
            )
    })
    .bind(bind_addr)?
    .run()
    .await
}
