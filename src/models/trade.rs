use serde::{Serialize, Deserialize};
use sea_orm::entity::prelude::*;

/// Statuts du cycle de vie d'un trade.
/// WATCHING → OPEN (remplissage du plan d'entrée) → CLOSED
/// WATCHING → INVALIDATED (setup cassé avant l'entrée)
#[derive(Copy, Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "lowercase")]
pub enum TradeStatus {
    #[sea_orm(string_value = "watching")]
    Watching,
    #[sea_orm(string_value = "open")]
    Open,
    #[sea_orm(string_value = "closed")]
    Closed,
    #[sea_orm(string_value = "invalidated")]
    Invalidated,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "trade")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub symbol: String,
    pub setup: String,
    pub rating: f64,

    // Stop courant du trade; requis pour que les métriques de risque soient calculables.
    // Les métriques dérivées (remaining_shares, realized_pnl, realized_r, rr_ratio)
    // ne sont JAMAIS stockées: toujours recalculées depuis les enfants.
    pub stop_loss: Option<Decimal>,
    pub outcome: Option<String>,

    pub status: TradeStatus,
    pub idea_date: DateTimeUtc,
    pub enter_date: Option<DateTimeUtc>,
    pub exit_date: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::scale_plan::Entity")]
    ScalePlan,

    #[sea_orm(has_many = "super::execution::Entity")]
    Execution,

    #[sea_orm(has_many = "super::annotation::Entity")]
    Annotation,
}

impl Related<super::scale_plan::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ScalePlan.def()
    }
}

impl Related<super::execution::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Execution.def()
    }
}

impl Related<super::annotation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Annotation.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
