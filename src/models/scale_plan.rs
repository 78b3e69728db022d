use serde::{Serialize, Deserialize};
use sea_orm::entity::prelude::*;

/// Type de jambe: entrée ou prise de profit.
#[derive(Copy, Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "lowercase")]
pub enum PlanType {
    #[sea_orm(string_value = "entry")]
    Entry,
    #[sea_orm(string_value = "target")]
    Target,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    #[sea_orm(string_value = "market")]
    Market,
    #[sea_orm(string_value = "limit")]
    Limit,
    #[sea_orm(string_value = "stop_limit")]
    StopLimit,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "lowercase")]
pub enum TradeDirection {
    #[sea_orm(string_value = "long")]
    Long,
    #[sea_orm(string_value = "short")]
    Short,
}

/// Cycle de vie d'un plan:
/// PLANNED → TRIGGERED → FILLED_PARTIAL → FILLED (avance avec les exécutions)
/// PLANNED → CANCELED (annulation possible uniquement depuis PLANNED)
#[derive(Copy, Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum ScalePlanStatus {
    #[sea_orm(string_value = "planned")]
    Planned,
    #[sea_orm(string_value = "triggered")]
    Triggered,
    #[sea_orm(string_value = "filled_partial")]
    FilledPartial,
    #[sea_orm(string_value = "filled")]
    Filled,
    #[sea_orm(string_value = "canceled")]
    Canceled,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "scale_plan")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub trade_id: String,

    pub plan_type: PlanType,
    pub order_type: OrderType,
    pub trade_type: TradeDirection,
    pub label: String,
    pub qty: i32,

    // NULL = jambe "remainder" (absorbe la quantité restante, pas de cible explicite)
    pub target_price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
    pub limit_price: Option<Decimal>,
    pub good_till: Option<DateTimeUtc>,
    pub notes: Option<String>,

    pub status: ScalePlanStatus,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::trade::Entity",
        from = "Column::TradeId",
        to = "super::trade::Column::Id",
        on_delete = "Cascade"
    )]
    Trade,

    // Référence faible: supprimer un plan met scale_plan_id à NULL
    // sur ses exécutions, jamais de cascade (l'historique des fills survit).
    #[sea_orm(has_many = "super::execution::Entity")]
    Execution,
}

impl Related<super::trade::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Trade.def()
    }
}

impl Related<super::execution::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Execution.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
