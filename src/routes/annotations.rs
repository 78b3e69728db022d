use actix_web::{delete, get, patch, post, web, HttpResponse};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use validator::Validate;

use crate::errors::ServiceError;
use crate::models::dto::{AnnotationResponse, CreateAnnotationRequest, UpdateAnnotationRequest};
use crate::services::annotation_service::AnnotationService;

#[derive(Deserialize)]
pub struct AnnotationListQuery {
    pub trade_id: Option<String>,
}

#[get("")]
pub async fn get_annotations(
    db: web::Data<DatabaseConnection>,
    query: web::Query<AnnotationListQuery>,
) -> Result<HttpResponse, ServiceError> {
    let annotations =
        AnnotationService::get_annotations(db.get_ref(), query.into_inner().trade_id).await?;
    let response: Vec<AnnotationResponse> = annotations
        .into_iter()
        .map(AnnotationResponse::from)
        .collect();
    Ok(HttpResponse::Ok().json(response))
}

#[post("")]
pub async fn create_annotation(
    db: web::Data<DatabaseConnection>,
    request: web::Json<CreateAnnotationRequest>,
) -> Result<HttpResponse, ServiceError> {
    if let Err(errors) = request.validate() {
        return Ok(HttpResponse::BadRequest().json(errors));
    }

    let annotation =
        AnnotationService::create_annotation(db.get_ref(), request.into_inner()).await?;
    Ok(HttpResponse::Created().json(AnnotationResponse::from(annotation)))
}

#[patch("/{annotation_id}")]
pub async fn update_annotation(
    db: web::Data<DatabaseConnection>,
    path: web::Path<String>,
    request: web::Json<UpdateAnnotationRequest>,
) -> Result<HttpResponse, ServiceError> {
    if let Err(errors) = request.validate() {
        return Ok(HttpResponse::BadRequest().json(errors));
    }

    let annotation = AnnotationService::update_annotation(
        db.get_ref(),
        &path.into_inner(),
        request.into_inner(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(AnnotationResponse::from(annotation)))
}

#[delete("/{annotation_id}")]
pub async fn delete_annotation(
    db: web::Data<DatabaseConnection>,
    path: web::Path<String>,
) -> Result<HttpResponse, ServiceError> {
    AnnotationService::delete_annotation(db.get_ref(), &path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub fn annotations_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/annotations")
            .service(get_annotations)
            .service(create_annotation)
            .service(update_annotation)
            .service(delete_annotation),
    );
}
