use actix_web::{delete, get, patch, post, web, HttpResponse};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use validator::Validate;

use crate::errors::ServiceError;
use crate::models::dto::{CreateScalePlanRequest, UpdateScalePlanRequest};
use crate::services::scale_plan_service::ScalePlanService;

#[derive(Deserialize)]
pub struct ScalePlanListQuery {
    pub trade_id: Option<String>,
}

#[get("")]
pub async fn get_scale_plans(
    db: web::Data<DatabaseConnection>,
    query: web::Query<ScalePlanListQuery>,
) -> Result<HttpResponse, ServiceError> {
    let plans = match query.into_inner().trade_id {
        Some(trade_id) => ScalePlanService::get_scale_plans_by_trade(db.get_ref(), &trade_id).await?,
        None => ScalePlanService::get_all_scale_plans(db.get_ref()).await?,
    };
    Ok(HttpResponse::Ok().json(plans))
}

#[get("/{scale_plan_id}")]
pub async fn get_scale_plan_by_id(
    db: web::Data<DatabaseConnection>,
    path: web::Path<String>,
) -> Result<HttpResponse, ServiceError> {
    let plan = ScalePlanService::get_scale_plan_by_id(db.get_ref(), &path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(plan))
}

#[post("")]
pub async fn create_scale_plan(
    db: web::Data<DatabaseConnection>,
    request: web::Json<CreateScalePlanRequest>,
) -> Result<HttpResponse, ServiceError> {
    if let Err(errors) = request.validate() {
        return Ok(HttpResponse::BadRequest().json(errors));
    }

    let plan = ScalePlanService::create_scale_plan(db.get_ref(), request.into_inner()).await?;
    Ok(HttpResponse::Created().json(plan))
}

#[patch("/{scale_plan_id}")]
pub async fn update_scale_plan(
    db: web::Data<DatabaseConnection>,
    path: web::Path<String>,
    request: web::Json<UpdateScalePlanRequest>,
) -> Result<HttpResponse, ServiceError> {
    if let Err(errors) = request.validate() {
        return Ok(HttpResponse::BadRequest().json(errors));
    }

    let plan = ScalePlanService::update_scale_plan(
        db.get_ref(),
        &path.into_inner(),
        request.into_inner(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(plan))
}

/// Annulation (PLANNED uniquement).
#[post("/{scale_plan_id}/cancel")]
pub async fn cancel_scale_plan(
    db: web::Data<DatabaseConnection>,
    path: web::Path<String>,
) -> Result<HttpResponse, ServiceError> {
    let plan = ScalePlanService::cancel_scale_plan(db.get_ref(), &path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(plan))
}

/// Suppression (PLANNED uniquement); les exécutions référencées sont détachées.
#[delete("/{scale_plan_id}")]
pub async fn delete_scale_plan(
    db: web::Data<DatabaseConnection>,
    path: web::Path<String>,
) -> Result<HttpResponse, ServiceError> {
    ScalePlanService::delete_scale_plan(db.get_ref(), &path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub fn scale_plans_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/scale-plans")
            .service(get_scale_plans)
            .service(create_scale_plan)
            .service(cancel_scale_plan)
            .service(get_scale_plan_by_id)
            .service(update_scale_plan)
            .service(delete_scale_plan),
    );
}
