use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::*;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::dto::{CreateScalePlanRequest, ScalePlanPayload, UpdateScalePlanRequest};
use crate::models::scale_plan::{PlanType, ScalePlanStatus, TradeDirection};
use crate::models::{execution, scale_plan, trade};

/// Forme neutre d'un plan pour la validation: les mêmes règles s'appliquent
/// aux payloads de création et aux plans déjà persistés.
#[derive(Debug, Clone)]
pub struct PlanCheck {
    pub plan_type: PlanType,
    pub trade_type: TradeDirection,
    pub qty: i32,
    pub target_price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
    pub limit_price: Option<Decimal>,
}

impl From<&ScalePlanPayload> for PlanCheck {
    fn from(p: &ScalePlanPayload) -> Self {
        PlanCheck {
            plan_type: p.plan_type,
            trade_type: p.trade_type,
            qty: p.qty,
            target_price: p.target_price,
            stop_price: p.stop_price,
            limit_price: p.limit_price,
        }
    }
}

impl From<&scale_plan::Model> for PlanCheck {
    fn from(p: &scale_plan::Model) -> Self {
        PlanCheck {
            plan_type: p.plan_type,
            trade_type: p.trade_type,
            qty: p.qty,
            target_price: p.target_price,
            stop_price: p.stop_price,
            limit_price: p.limit_price,
        }
    }
}

/// Valide un jeu complet de plans pour un trade:
/// - qty > 0 partout
/// - plan d'entrée présent si exigé, avec limit > 0, stop > 0 et
///   l'ordre stop/limit cohérent avec le sens (long: stop < limit)
/// - au plus une jambe "remainder" (target_price null) par type de plan
/// - la somme des quantités TARGET ne dépasse jamais la quantité d'entrée
pub fn validate_plan_set(plans: &[PlanCheck], require_entry: bool) -> Result<(), ServiceError> {
    for plan in plans {
        if plan.qty <= 0 {
            return Err(ServiceError::validation("Qty must be greater than 0"));
        }
    }

    let entries: Vec<&PlanCheck> = plans
        .iter()
        .filter(|p| p.plan_type == PlanType::Entry)
        .collect();

    if require_entry && entries.is_empty() {
        return Err(ServiceError::validation(
            "Trade must include an entry scale plan",
        ));
    }

    for entry in &entries {
        let limit = entry
            .limit_price
            .filter(|v| *v > Decimal::ZERO)
            .ok_or_else(|| {
                ServiceError::validation("Entry plan requires a positive limit price")
            })?;
        let stop = entry
            .stop_price
            .filter(|v| *v > Decimal::ZERO)
            .ok_or_else(|| {
                ServiceError::validation("Entry plan requires a positive stop price")
            })?;

        match entry.trade_type {
            TradeDirection::Long => {
                if stop >= limit {
                    return Err(ServiceError::validation(
                        "Long entry requires a stop price below the limit price",
                    ));
                }
            }
            TradeDirection::Short => {
                if stop <= limit {
                    return Err(ServiceError::validation(
                        "Short entry requires a stop price above the limit price",
                    ));
                }
            }
        }
    }

    // Au plus une jambe sans cible explicite par groupe plan_type
    for plan_type in [PlanType::Entry, PlanType::Target] {
        let remainder_count = plans
            .iter()
            .filter(|p| p.plan_type == plan_type && p.target_price.is_none())
            .count();
        if remainder_count > 1 {
            return Err(ServiceError::validation(
                "At most one scale plan may have a null target_price (remainder)",
            ));
        }
    }

    if !entries.is_empty() {
        let entry_qty: i64 = entries.iter().map(|p| p.qty as i64).sum();
        let target_qty: i64 = plans
            .iter()
            .filter(|p| p.plan_type == PlanType::Target)
            .map(|p| p.qty as i64)
            .sum();
        if target_qty > entry_qty {
            return Err(ServiceError::validation(
                "Total shares for scale plans cannot exceed position size",
            ));
        }
    }

    Ok(())
}

pub struct ScalePlanService;

impl ScalePlanService {
    pub async fn get_all_scale_plans(
        db: &DatabaseConnection,
    ) -> Result<Vec<scale_plan::Model>, ServiceError> {
        Ok(scale_plan::Entity::find().all(db).await?)
    }

    pub async fn get_scale_plans_by_trade(
        db: &DatabaseConnection,
        trade_id: &str,
    ) -> Result<Vec<scale_plan::Model>, ServiceError> {
        Ok(scale_plan::Entity::find()
            .filter(scale_plan::Column::TradeId.eq(trade_id))
            .all(db)
            .await?)
    }

    pub async fn get_scale_plan_by_id(
        db: &DatabaseConnection,
        scale_plan_id: &str,
    ) -> Result<scale_plan::Model, ServiceError> {
        scale_plan::Entity::find_by_id(scale_plan_id.to_string())
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Scale plan not found"))
    }

    /// Ajoute un plan à un trade existant; le jeu complet (plans persistés +
    /// nouveau) doit rester valide.
    pub async fn create_scale_plan(
        db: &DatabaseConnection,
        request: CreateScalePlanRequest,
    ) -> Result<scale_plan::Model, ServiceError> {
        let txn = db.begin().await?;

        trade::Entity::find_by_id(request.trade_id.clone())
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("Trade not found"))?;

        let existing = scale_plan::Entity::find()
            .filter(scale_plan::Column::TradeId.eq(request.trade_id.clone()))
            .all(&txn)
            .await?;

        let mut checks: Vec<PlanCheck> = existing
            .iter()
            .filter(|p| p.status != ScalePlanStatus::Canceled)
            .map(PlanCheck::from)
            .collect();
        checks.push(PlanCheck::from(&request.plan));
        validate_plan_set(&checks, false)?;

        let payload = request.plan;
        let new_plan = scale_plan::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            trade_id: Set(request.trade_id),
            plan_type: Set(payload.plan_type),
            order_type: Set(payload.order_type),
            trade_type: Set(payload.trade_type),
            label: Set(payload.label),
            qty: Set(payload.qty),
            target_price: Set(payload.target_price),
            stop_price: Set(payload.stop_price),
            limit_price: Set(payload.limit_price),
            good_till: Set(payload.good_till),
            notes: Set(payload.notes),
            status: Set(ScalePlanStatus::Planned),
        };
        let created = new_plan.insert(&txn).await?;

        txn.commit().await?;
        Ok(created)
    }

    /// Patch partiel; le jeu de plans du trade doit rester valide après coup.
    pub async fn update_scale_plan(
        db: &DatabaseConnection,
        scale_plan_id: &str,
        request: UpdateScalePlanRequest,
    ) -> Result<scale_plan::Model, ServiceError> {
        let txn = db.begin().await?;

        let existing = scale_plan::Entity::find_by_id(scale_plan_id.to_string())
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("Scale plan not found"))?;

        let mut patched = existing.clone();
        if let Some(order_type) = request.order_type {
            patched.order_type = order_type;
        }
        if let Some(label) = request.label.clone() {
            patched.label = label;
        }
        if let Some(qty) = request.qty {
            patched.qty = qty;
        }
        if let Some(target_price) = request.target_price {
            patched.target_price = Some(target_price);
        }
        if let Some(stop_price) = request.stop_price {
            patched.stop_price = Some(stop_price);
        }
        if let Some(limit_price) = request.limit_price {
            patched.limit_price = Some(limit_price);
        }
        if let Some(good_till) = request.good_till {
            patched.good_till = Some(good_till);
        }
        if let Some(notes) = request.notes.clone() {
            patched.notes = Some(notes);
        }

        // Revalider le jeu complet avec le plan patché à la place de l'original
        let siblings = scale_plan::Entity::find()
            .filter(scale_plan::Column::TradeId.eq(patched.trade_id.clone()))
            .all(&txn)
            .await?;
        let checks: Vec<PlanCheck> = siblings
            .iter()
            .filter(|p| p.status != ScalePlanStatus::Canceled)
            .map(|p| {
                if p.id == patched.id {
                    PlanCheck::from(&patched)
                } else {
                    PlanCheck::from(p)
                }
            })
            .collect();
        validate_plan_set(&checks, false)?;

        let mut active: scale_plan::ActiveModel = existing.into();
        if let Some(order_type) = request.order_type {
            active.order_type = Set(order_type);
        }
        if let Some(label) = request.label {
            active.label = Set(label);
        }
        if let Some(qty) = request.qty {
            active.qty = Set(qty);
        }
        if let Some(target_price) = request.target_price {
            active.target_price = Set(Some(target_price));
        }
        if let Some(stop_price) = request.stop_price {
            active.stop_price = Set(Some(stop_price));
        }
        if let Some(limit_price) = request.limit_price {
            active.limit_price = Set(Some(limit_price));
        }
        if let Some(good_till) = request.good_till {
            active.good_till = Set(Some(good_till));
        }
        if let Some(notes) = request.notes {
            active.notes = Set(Some(notes));
        }
        let updated = active.update(&txn).await?;

        txn.commit().await?;
        Ok(updated)
    }

    /// Annulation: uniquement depuis PLANNED.
    pub async fn cancel_scale_plan(
        db: &DatabaseConnection,
        scale_plan_id: &str,
    ) -> Result<scale_plan::Model, ServiceError> {
        let plan = Self::get_scale_plan_by_id(db, scale_plan_id).await?;
        if plan.status != ScalePlanStatus::Planned {
            return Err(ServiceError::validation(
                "Scale plan is not in PLANNED status",
            ));
        }

        let mut active: scale_plan::ActiveModel = plan.into();
        active.status = Set(ScalePlanStatus::Canceled);
        Ok(active.update(db).await?)
    }

    /// Suppression: uniquement depuis PLANNED (l'historique de fills ne se perd
    /// pas). Les exécutions qui référencent le plan sont détachées, jamais
    /// supprimées.
    pub async fn delete_scale_plan(
        db: &DatabaseConnection,
        scale_plan_id: &str,
    ) -> Result<(), ServiceError> {
        let txn = db.begin().await?;

        let plan = scale_plan::Entity::find_by_id(scale_plan_id.to_string())
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("Scale plan not found"))?;

        if plan.status != ScalePlanStatus::Planned {
            return Err(ServiceError::validation(
                "Scale plan is not in PLANNED status",
            ));
        }

        execution::Entity::update_many()
            .col_expr(execution::Column::ScalePlanId, Expr::value(Option::<String>::None))
            .filter(execution::Column::ScalePlanId.eq(plan.id.clone()))
            .exec(&txn)
            .await?;

        scale_plan::Entity::delete_by_id(plan.id).exec(&txn).await?;

        txn.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn entry_plan(qty: i32, stop: Decimal, limit: Decimal, trade_type: TradeDirection) -> PlanCheck {
        PlanCheck {
            plan_type: PlanType::Entry,
            trade_type,
            qty,
            target_price: None,
            stop_price: Some(stop),
            limit_price: Some(limit),
        }
    }

    fn target_plan(qty: i32, target_price: Option<Decimal>) -> PlanCheck {
        PlanCheck {
            plan_type: PlanType::Target,
            trade_type: TradeDirection::Long,
            qty,
            target_price,
            stop_price: None,
            limit_price: None,
        }
    }

    #[test]
    fn test_long_entry_with_stop_above_limit_rejected() {
        // Long avec stop 105 ≥ limit 100: ordre incohérent
        let plans = vec![entry_plan(100, dec!(105), dec!(100), TradeDirection::Long)];
        assert!(validate_plan_set(&plans, true).is_err());
    }

    #[test]
    fn test_long_entry_well_formed_accepted() {
        let plans = vec![entry_plan(100, dec!(95), dec!(100), TradeDirection::Long)];
        assert!(validate_plan_set(&plans, true).is_ok());
    }

    #[test]
    fn test_short_entry_requires_stop_above_limit() {
        let bad = vec![entry_plan(100, dec!(95), dec!(100), TradeDirection::Short)];
        assert!(validate_plan_set(&bad, true).is_err());

        let good = vec![entry_plan(100, dec!(105), dec!(100), TradeDirection::Short)];
        assert!(validate_plan_set(&good, true).is_ok());
    }

    #[test]
    fn test_entry_plan_required_when_creating_trade() {
        let plans = vec![target_plan(50, Some(dec!(120)))];
        assert!(validate_plan_set(&plans, true).is_err());
        // Ajout d'un plan isolé sur un trade existant: l'entrée n'est pas exigée
        assert!(validate_plan_set(&plans, false).is_ok());
    }

    #[test]
    fn test_target_qty_cannot_exceed_entry_qty() {
        // Cibles pour 120 parts sur une entrée de 100: refusé
        let plans = vec![
            entry_plan(100, dec!(95), dec!(100), TradeDirection::Long),
            target_plan(70, Some(dec!(110))),
            target_plan(50, Some(dec!(120))),
        ];
        assert!(validate_plan_set(&plans, true).is_err());
    }

    #[test]
    fn test_target_qty_at_cap_with_remainder_leg_accepted() {
        // 100 parts ciblées dont une jambe remainder: exactement la taille
        let plans = vec![
            entry_plan(100, dec!(95), dec!(100), TradeDirection::Long),
            target_plan(50, Some(dec!(110))),
            target_plan(50, None),
        ];
        assert!(validate_plan_set(&plans, true).is_ok());
    }

    #[test]
    fn test_single_remainder_leg_per_group() {
        let plans = vec![
            entry_plan(100, dec!(95), dec!(100), TradeDirection::Long),
            target_plan(40, None),
            target_plan(40, None),
        ];
        assert!(validate_plan_set(&plans, true).is_err());
    }

    #[test]
    fn test_entry_without_limit_price_rejected() {
        let mut entry = entry_plan(100, dec!(95), dec!(100), TradeDirection::Long);
        entry.limit_price = None;
        assert!(validate_plan_set(&[entry], true).is_err());
    }

    #[test]
    fn test_non_positive_qty_rejected() {
        let plans = vec![entry_plan(0, dec!(95), dec!(100), TradeDirection::Long)];
        assert!(validate_plan_set(&plans, true).is_err());
    }
}
