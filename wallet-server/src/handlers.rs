use crate::error::ApiError;
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;
use wallet_core::TransferEngine;

#[derive(Debug, Deserialize)]
pub struct CreateWalletRequest {
    pub owner_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub amount: i64,
}

#[derive(Debug, Deserialize)]
pub struct AmountRequest {
    pub amount: i64,
}

/// Health check endpoint; pings Postgres
pub async fn health_check(pool: web::Data<PgPool>) -> HttpResponse {
    let db_healthy = sqlx::query("SELECT 1")
        .fetch_one(pool.get_ref())
        .await
        .is_ok();

    if db_healthy {
        HttpResponse::Ok().json(json!({
            "status": "healthy",
            "service": "wallet-server",
            "database": true
        }))
    } else {
        HttpResponse::ServiceUnavailable().json(json!({
            "status": "unhealthy",
            "service": "wallet-server",
            "database": false
        }))
    }
}

/// Create a wallet with zero balance
pub async fn create_wallet(
    engine: web::Data<Arc<TransferEngine>>,
    request: web::Json<CreateWalletRequest>,
) -> Result<HttpResponse, ApiError> {
    let wallet = engine.create_wallet(request.owner_id).await?;
    Ok(HttpResponse::Created().json(wallet))
}

/// Wallet snapshot, served through the cache
pub async fn get_wallet(
    engine: web::Data<Arc<TransferEngine>>,
    wallet_id: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let wallet = engine.get_balance(*wallet_id).await?;
    Ok(HttpResponse::Ok().json(wallet))
}

/// Move funds between two wallets
pub async fn create_transfer(
    engine: web::Data<Arc<TransferEngine>>,
    request: web::Json<TransferRequest>,
) -> Result<HttpResponse, ApiError> {
    let entry = engine
        .transfer(request.sender_id, request.receiver_id, request.amount)
        .await?;
    Ok(HttpResponse::Created().json(entry))
}

/// Credit external funds
pub async fn deposit(
    engine: web::Data<Arc<TransferEngine>>,
    wallet_id: web::Path<Uuid>,
    request: web::Json<AmountRequest>,
) -> Result<HttpResponse, ApiError> {
    let entry = engine.deposit(*wallet_id, request.amount).await?;
    Ok(HttpResponse::Created().json(entry))
}

/// Debit external funds
pub async fn withdraw(
    engine: web::Data<Arc<TransferEngine>>,
    wallet_id: web::Path<Uuid>,
    request: web::Json<AmountRequest>,
) -> Result<HttpResponse, ApiError> {
    let entry = engine.withdraw(*wallet_id, request.amount).await?;
    Ok(HttpResponse::Created().json(entry))
}

/// Configure routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/wallets", web::post().to(create_wallet))
        .route("/wallets/{id}", web::get().to(get_wallet))
        .route("/wallets/{id}/deposit", web::post().to(deposit))
        .route("/wallets/{id}/withdraw", web::post().to(withdraw))
        .route("/transfers", web::post().to(create_transfer));
}
