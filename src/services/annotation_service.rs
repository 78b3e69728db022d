use chrono::Utc;
use sea_orm::*;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::dto::{CreateAnnotationRequest, UpdateAnnotationRequest};
use crate::models::{annotation, trade};

pub struct AnnotationService;

impl AnnotationService {
    pub async fn get_annotations(
        db: &DatabaseConnection,
        trade_id: Option<String>,
    ) -> Result<Vec<annotation::Model>, ServiceError> {
        let mut query = annotation::Entity::find().order_by_desc(annotation::Column::Date);
        if let Some(trade_id) = trade_id {
            query = query.filter(annotation::Column::TradeId.eq(trade_id));
        }
        Ok(query.all(db).await?)
    }

    pub async fn get_annotation_by_id(
        db: &DatabaseConnection,
        annotation_id: &str,
    ) -> Result<annotation::Model, ServiceError> {
        annotation::Entity::find_by_id(annotation_id.to_string())
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Annotation not found"))
    }

    pub async fn create_annotation(
        db: &DatabaseConnection,
        request: CreateAnnotationRequest,
    ) -> Result<annotation::Model, ServiceError> {
        trade::Entity::find_by_id(request.trade_id.clone())
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Trade not found"))?;

        let new_annotation = annotation::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            trade_id: Set(request.trade_id),
            annotation_type: Set(request.annotation_type),
            content: Set(request.content),
            date: Set(request.date.unwrap_or_else(Utc::now)),
        };
        Ok(new_annotation.insert(db).await?)
    }

    pub async fn update_annotation(
        db: &DatabaseConnection,
        annotation_id: &str,
        request: UpdateAnnotationRequest,
    ) -> Result<annotation::Model, ServiceError> {
        let existing = Self::get_annotation_by_id(db, annotation_id).await?;

        let mut active: annotation::ActiveModel = existing.into();
        if let Some(annotation_type) = request.annotation_type {
            active.annotation_type = Set(annotation_type);
        }
        if let Some(content) = request.content {
            active.content = Set(content);
        }
        if let Some(date) = request.date {
            active.date = Set(date);
        }
        Ok(active.update(db).await?)
    }

    pub async fn delete_annotation(
        db: &DatabaseConnection,
        annotation_id: &str,
    ) -> Result<(), ServiceError> {
        let existing = Self::get_annotation_by_id(db, annotation_id).await?;
        annotation::Entity::delete_by_id(existing.id).exec(db).await?;
        Ok(())
    }
}
