use serde::{Serialize, Deserialize};
use sea_orm::entity::prelude::*;

#[derive(Copy, Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "lowercase")]
pub enum ExecutionSide {
    #[sea_orm(string_value = "buy")]
    Buy,
    #[sea_orm(string_value = "sell")]
    Sell,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionSource {
    #[sea_orm(string_value = "MANUAL")]
    Manual,
    #[sea_orm(string_value = "IMPORT")]
    Import,
    #[sea_orm(string_value = "AUTOMATED")]
    Automated,
}

/// Un fill individuel. Historique append-only: le moteur ne modifie jamais
/// qty/price d'une exécution en effet de bord d'une autre opération
/// (seules les corrections administratives passent par update).
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "execution")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub trade_id: String,
    pub scale_plan_id: Option<String>,

    pub side: ExecutionSide,
    pub source: ExecutionSource,
    pub qty: i32,
    pub price: Decimal,
    pub commission: Decimal,
    pub executed_at: DateTimeUtc,
    pub notes: Option<String>,
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

    #[sea_orm(
        belongs_to = "super::scale_plan::Entity",
        from = "Column::ScalePlanId",
        to = "super::scale_plan::Column::Id",
        on_delete = "SetNull"
    )]
    ScalePlan,
}

impl Related<super::trade::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Trade.def()
    }
}

impl Related<super::scale_plan::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ScalePlan.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
