use actix_web::{delete, get, patch, post, put, web, HttpResponse};
use sea_orm::DatabaseConnection;
use validator::Validate;

use crate::errors::ServiceError;
use crate::models::dto::{CreateTradeRequest, UpdateTradeRequest};
use crate::services::market_data_service::{FinnhubService, QuoteProvider};
use crate::services::trade_service::TradeService;

// Provider absent = enrichissement désactivé, la liste reste servie
fn provider_ref(market: &web::Data<Option<FinnhubService>>) -> Option<&dyn QuoteProvider> {
    market.get_ref().as_ref().map(|s| s as &dyn QuoteProvider)
}

#[get("")]
pub async fn get_all_trades(
    db: web::Data<DatabaseConnection>,
    market: web::Data<Option<FinnhubService>>,
) -> Result<HttpResponse, ServiceError> {
    let trades = TradeService::get_all_trades(db.get_ref(), provider_ref(&market)).await?;
    Ok(HttpResponse::Ok().json(trades))
}

#[get("/{trade_id}")]
pub async fn get_trade_by_id(
    db: web::Data<DatabaseConnection>,
    market: web::Data<Option<FinnhubService>>,
    path: web::Path<String>,
) -> Result<HttpResponse, ServiceError> {
    let trade =
        TradeService::get_trade_by_id(db.get_ref(), &path.into_inner(), provider_ref(&market))
            .await?;
    Ok(HttpResponse::Ok().json(trade))
}

#[post("")]
pub async fn create_trade(
    db: web::Data<DatabaseConnection>,
    request: web::Json<CreateTradeRequest>,
) -> Result<HttpResponse, ServiceError> {
    if let Err(errors) = request.validate() {
        return Ok(HttpResponse::BadRequest().json(errors));
    }

    let trade = TradeService::create_trade(db.get_ref(), request.into_inner()).await?;
    Ok(HttpResponse::Created().json(trade))
}

/// Remplacement complet (trade en WATCHING uniquement).
#[put("/{trade_id}")]
pub async fn replace_trade(
    db: web::Data<DatabaseConnection>,
    path: web::Path<String>,
    request: web::Json<CreateTradeRequest>,
) -> Result<HttpResponse, ServiceError> {
    if let Err(errors) = request.validate() {
        return Ok(HttpResponse::BadRequest().json(errors));
    }

    let trade =
        TradeService::replace_trade(db.get_ref(), &path.into_inner(), request.into_inner()).await?;
    Ok(HttpResponse::Ok().json(trade))
}

#[patch("/{trade_id}")]
pub async fn update_trade(
    db: web::Data<DatabaseConnection>,
    path: web::Path<String>,
    request: web::Json<UpdateTradeRequest>,
) -> Result<HttpResponse, ServiceError> {
    if let Err(errors) = request.validate() {
        return Ok(HttpResponse::BadRequest().json(errors));
    }

    let trade =
        TradeService::update_trade(db.get_ref(), &path.into_inner(), request.into_inner()).await?;
    Ok(HttpResponse::Ok().json(trade))
}

#[post("/{trade_id}/invalidate")]
pub async fn invalidate_trade(
    db: web::Data<DatabaseConnection>,
    path: web::Path<String>,
) -> Result<HttpResponse, ServiceError> {
    let trade = TradeService::invalidate_trade(db.get_ref(), &path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(trade))
}

#[post("/{trade_id}/close")]
pub async fn close_trade(
    db: web::Data<DatabaseConnection>,
    path: web::Path<String>,
) -> Result<HttpResponse, ServiceError> {
    let trade = TradeService::close_trade(db.get_ref(), &path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(trade))
}

#[delete("/{trade_id}")]
pub async fn delete_trade(
    db: web::Data<DatabaseConnection>,
    path: web::Path<String>,
) -> Result<HttpResponse, ServiceError> {
    TradeService::delete_trade(db.get_ref(), &path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub fn trades_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/trades")
            .service(get_all_trades)
            .service(create_trade)
            .service(invalidate_trade)
            .service(close_trade)
            .service(get_trade_by_id)
            .service(replace_trade)
            .service(update_trade)
            .service(delete_trade),
    );
}
