use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::*;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::dto::{BatchDeleteExecutionsRequest, CreateExecutionRequest, UpdateExecutionRequest};
use crate::models::execution::ExecutionSource;
use crate::models::scale_plan::ScalePlanStatus;
use crate::models::trade::TradeStatus;
use crate::models::{execution, scale_plan, trade};
use crate::services::accounting::fill;

pub struct ExecutionService;

impl ExecutionService {
    /// Liste les exécutions, ordonnées par executed_at.
    /// Si trade_id est fourni, seules celles du trade sont retournées.
    pub async fn get_executions(
        db: &DatabaseConnection,
        trade_id: Option<String>,
    ) -> Result<Vec<execution::Model>, ServiceError> {
        let mut query = execution::Entity::find().order_by_asc(execution::Column::ExecutedAt);
        if let Some(trade_id) = trade_id {
            query = query.filter(execution::Column::TradeId.eq(trade_id));
        }
        Ok(query.all(db).await?)
    }

    pub async fn get_execution_by_id(
        db: &DatabaseConnection,
        execution_id: &str,
    ) -> Result<execution::Model, ServiceError> {
        execution::Entity::find_by_id(execution_id.to_string())
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Execution not found"))
    }

    /// Enregistre un fill et fait avancer le statut du plan référencé dans la
    /// même transaction. C'est le seul déclencheur automatique qui ouvre un
    /// trade WATCHING (plan d'entrée entièrement rempli).
    pub async fn create_execution(
        db: &DatabaseConnection,
        request: CreateExecutionRequest,
    ) -> Result<execution::Model, ServiceError> {
        if request.price <= Decimal::ZERO {
            return Err(ServiceError::validation("Price must be greater than 0"));
        }
        let commission = request.commission.unwrap_or(Decimal::ZERO);
        if commission < Decimal::ZERO {
            return Err(ServiceError::validation("Commission cannot be negative"));
        }

        let txn = db.begin().await?;

        let trade = trade::Entity::find_by_id(request.trade_id.clone())
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("Trade not found"))?;

        // Le plan référencé doit appartenir au même trade et être encore actif
        let plan = match &request.scale_plan_id {
            Some(plan_id) => {
                let plan = scale_plan::Entity::find_by_id(plan_id.clone())
                    .one(&txn)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("Scale plan not found"))?;
                if plan.trade_id != trade.id {
                    return Err(ServiceError::validation(
                        "Scale plan does not belong to this trade",
                    ));
                }
                if plan.status == ScalePlanStatus::Canceled {
                    return Err(ServiceError::validation(
                        "Cannot record an execution against a canceled scale plan",
                    ));
                }
                Some(plan)
            }
            None => None,
        };

        let new_execution = execution::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            trade_id: Set(request.trade_id.clone()),
            scale_plan_id: Set(request.scale_plan_id.clone()),
            side: Set(request.side),
            source: Set(request.source.unwrap_or(ExecutionSource::Manual)),
            qty: Set(request.qty),
            price: Set(request.price),
            commission: Set(commission),
            executed_at: Set(request.executed_at.unwrap_or_else(Utc::now)),
            notes: Set(request.notes.clone()),
        };
        let created = new_execution.insert(&txn).await?;

        if let Some(plan) = plan {
            Self::advance_plan_status(&txn, &trade, &plan).await?;
        }

        txn.commit().await?;
        Ok(created)
    }

    /// Correction administrative (qty/prix/commission/notes).
    /// Le statut du plan référencé est recalculé depuis le nouveau total.
    pub async fn update_execution(
        db: &DatabaseConnection,
        execution_id: &str,
        request: UpdateExecutionRequest,
    ) -> Result<execution::Model, ServiceError> {
        if let Some(price) = request.price {
            if price <= Decimal::ZERO {
                return Err(ServiceError::validation("Price must be greater than 0"));
            }
        }
        if let Some(commission) = request.commission {
            if commission < Decimal::ZERO {
                return Err(ServiceError::validation("Commission cannot be negative"));
            }
        }

        let txn = db.begin().await?;

        let existing = execution::Entity::find_by_id(execution_id.to_string())
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("Execution not found"))?;

        let plan_id = existing.scale_plan_id.clone();

        let mut active: execution::ActiveModel = existing.into();
        if let Some(qty) = request.qty {
            active.qty = Set(qty);
        }
        if let Some(price) = request.price {
            active.price = Set(price);
        }
        if let Some(commission) = request.commission {
            active.commission = Set(commission);
        }
        if let Some(notes) = request.notes {
            active.notes = Set(Some(notes));
        }
        let updated = active.update(&txn).await?;

        if let Some(plan_id) = plan_id {
            if let Some(plan) = scale_plan::Entity::find_by_id(plan_id.clone())
                .one(&txn)
                .await?
            {
                let total = Self::total_executed_qty(&txn, &plan.id).await?;
                let next = fill::recompute_status(plan.status, plan.qty, total);
                if next != plan.status {
                    let mut active: scale_plan::ActiveModel = plan.into();
                    active.status = Set(next);
                    active.update(&txn).await?;
                }
            }
        }

        txn.commit().await?;
        Ok(updated)
    }

    pub async fn delete_execution(
        db: &DatabaseConnection,
        execution_id: &str,
    ) -> Result<(), ServiceError> {
        Self::delete_executions(
            db,
            BatchDeleteExecutionsRequest {
                ids: vec![execution_id.to_string()],
            },
        )
        .await
    }

    /// Suppression en lot, atomique: soit toutes les exécutions partent et les
    /// statuts des plans touchés sont recalculés, soit rien ne bouge.
    /// Le recalcul ne fait que rétrograder (0 → PLANNED, partiel → FILLED_PARTIAL).
    pub async fn delete_executions(
        db: &DatabaseConnection,
        request: BatchDeleteExecutionsRequest,
    ) -> Result<(), ServiceError> {
        let txn = db.begin().await?;

        let mut executions = Vec::new();
        for id in &request.ids {
            let found = execution::Entity::find_by_id(id.clone())
                .one(&txn)
                .await?
                .ok_or_else(|| ServiceError::not_found(format!("Execution {} not found", id)))?;
            executions.push(found);
        }

        execution::Entity::delete_many()
            .filter(execution::Column::Id.is_in(request.ids.clone()))
            .exec(&txn)
            .await?;

        // Plans distincts touchés par le lot
        let mut plan_ids: Vec<String> = executions
            .iter()
            .filter_map(|e| e.scale_plan_id.clone())
            .collect();
        plan_ids.sort();
        plan_ids.dedup();

        for plan_id in plan_ids {
            if let Some(plan) = scale_plan::Entity::find_by_id(plan_id).one(&txn).await? {
                // Total recalculé sur les exécutions survivantes uniquement
                let total = Self::total_executed_qty(&txn, &plan.id).await?;
                let next = fill::status_after_removal(plan.status, plan.qty, total);
                if next != plan.status {
                    let mut active: scale_plan::ActiveModel = plan.into();
                    active.status = Set(next);
                    active.update(&txn).await?;
                }
            }
        }

        txn.commit().await?;
        Ok(())
    }

    // Fait avancer le plan sur l'échelle de remplissage; ouvre le trade
    // WATCHING quand son plan d'entrée atteint FILLED.
    async fn advance_plan_status<C: ConnectionTrait>(
        conn: &C,
        trade: &trade::Model,
        plan: &scale_plan::Model,
    ) -> Result<(), ServiceError> {
        let total = Self::total_executed_qty(conn, &plan.id).await?;
        let next = fill::status_after_execution(plan.status, plan.qty, total);

        // Écriture uniquement si le statut change
        if next == plan.status {
            return Ok(());
        }

        let mut active: scale_plan::ActiveModel = plan.clone().into();
        active.status = Set(next);
        active.update(conn).await?;

        if fill::entry_fill_opens_trade(next, plan.plan_type, trade.status) {
            let mut active_trade: trade::ActiveModel = trade.clone().into();
            active_trade.status = Set(TradeStatus::Open);
            active_trade.enter_date = Set(Some(Utc::now()));
            active_trade.update(conn).await?;
            tracing::info!(
                "Trade {} opened: entry plan {} fully filled",
                trade.id,
                plan.id
            );
        }

        Ok(())
    }

    async fn total_executed_qty<C: ConnectionTrait>(
        conn: &C,
        plan_id: &str,
    ) -> Result<i32, ServiceError> {
        let executions = execution::Entity::find()
            .filter(execution::Column::ScalePlanId.eq(plan_id))
            .all(conn)
            .await?;
        Ok(executions.iter().map(|e| e.qty).sum())
    }
}
