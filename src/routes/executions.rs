use actix_web::{delete, get, patch, post, web, HttpResponse};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use validator::Validate;

use crate::errors::ServiceError;
use crate::models::dto::{
    BatchDeleteExecutionsRequest, CreateExecutionRequest, ExecutionResponse,
    UpdateExecutionRequest,
};
use crate::services::execution_service::ExecutionService;

#[derive(Deserialize)]
pub struct ExecutionListQuery {
    pub trade_id: Option<String>,
}

#[get("")]
pub async fn get_executions(
    db: web::Data<DatabaseConnection>,
    query: web::Query<ExecutionListQuery>,
) -> Result<HttpResponse, ServiceError> {
    let executions =
        ExecutionService::get_executions(db.get_ref(), query.into_inner().trade_id).await?;
    let response: Vec<ExecutionResponse> =
        executions.into_iter().map(ExecutionResponse::from).collect();
    Ok(HttpResponse::Ok().json(response))
}

#[get("/{execution_id}")]
pub async fn get_execution_by_id(
    db: web::Data<DatabaseConnection>,
    path: web::Path<String>,
) -> Result<HttpResponse, ServiceError> {
    let execution = ExecutionService::get_execution_by_id(db.get_ref(), &path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ExecutionResponse::from(execution)))
}

#[post("")]
pub async fn create_execution(
    db: web::Data<DatabaseConnection>,
    request: web::Json<CreateExecutionRequest>,
) -> Result<HttpResponse, ServiceError> {
    if let Err(errors) = request.validate() {
        return Ok(HttpResponse::BadRequest().json(errors));
    }

    let execution = ExecutionService::create_execution(db.get_ref(), request.into_inner()).await?;
    Ok(HttpResponse::Created().json(ExecutionResponse::from(execution)))
}

#[patch("/{execution_id}")]
pub async fn update_execution(
    db: web::Data<DatabaseConnection>,
    path: web::Path<String>,
    request: web::Json<UpdateExecutionRequest>,
) -> Result<HttpResponse, ServiceError> {
    if let Err(errors) = request.validate() {
        return Ok(HttpResponse::BadRequest().json(errors));
    }

    let execution =
        ExecutionService::update_execution(db.get_ref(), &path.into_inner(), request.into_inner())
            .await?;
    Ok(HttpResponse::Ok().json(ExecutionResponse::from(execution)))
}

/// Suppression en lot, atomique (tout le lot ou rien).
#[post("/batch-delete")]
pub async fn batch_delete_executions(
    db: web::Data<DatabaseConnection>,
    request: web::Json<BatchDeleteExecutionsRequest>,
) -> Result<HttpResponse, ServiceError> {
    if let Err(errors) = request.validate() {
        return Ok(HttpResponse::BadRequest().json(errors));
    }

    ExecutionService::delete_executions(db.get_ref(), request.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[delete("/{execution_id}")]
pub async fn delete_execution(
    db: web::Data<DatabaseConnection>,
    path: web::Path<String>,
) -> Result<HttpResponse, ServiceError> {
    ExecutionService::delete_execution(db.get_ref(), &path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub fn executions_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/executions")
            .service(get_executions)
            .service(create_execution)
            .service(batch_delete_executions)
            .service(get_execution_by_id)
            .service(update_execution)
            .service(delete_execution),
    );
}
