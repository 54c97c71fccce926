pub mod attachments;
pub mod audit_logs;
pub mod auth;
pub mod categories;
pub mod inventories;
pub mod patrimonies;
pub mod sectors;
pub mod transfers;
pub mod write_offs;

use actix_web::HttpResponse;

pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "message": "API de Gestão de Patrimônio",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
