// DTOs pour les requêtes/réponses API.
// Les entités stockent des Decimal; les réponses exposent des f64 comme le front les attend.
use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use validator::Validate;

use crate::models::annotation::AnnotationType;
use crate::models::execution::{ExecutionSide, ExecutionSource};
use crate::models::scale_plan::{OrderType, PlanType, ScalePlanStatus, TradeDirection};
use crate::models::trade::TradeStatus;
use crate::models::{annotation, execution, scale_plan, trade};

// ============================================================================
// Requêtes
// ============================================================================

/// Jambe de scale plan telle que fournie à la création d'un trade
/// (ou ajoutée après coup via POST /scale-plans).
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ScalePlanPayload {
    pub plan_type: PlanType,
    pub order_type: OrderType,
    pub trade_type: TradeDirection,
    #[validate(length(min = 1, message = "Label is required"))]
    pub label: String,
    #[validate(range(min = 1, message = "Qty must be greater than 0"))]
    pub qty: i32,
    pub target_price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
    pub limit_price: Option<Decimal>,
    pub good_till: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTradeRequest {
    #[validate(length(min = 1, message = "Symbol is required"))]
    pub symbol: String,
    #[validate(length(min = 1, message = "Setup is required"))]
    pub setup: String,
    #[validate(range(min = 0.0, max = 10.0, message = "Rating must be between 0 and 10"))]
    pub rating: f64,
    pub stop_loss: Option<Decimal>,
    #[validate(nested)]
    pub scale_plans: Vec<ScalePlanPayload>,
    // Transformées en annotations (note / catalyst) à la création
    pub notes: Option<Vec<String>>,
    pub catalysts: Option<Vec<String>>,
}

/// Patch partiel d'un trade: chaque champ n'est appliqué que s'il est fourni.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateTradeRequest {
    #[validate(length(min = 1, message = "Symbol is required"))]
    pub symbol: Option<String>,
    #[validate(length(min = 1, message = "Setup is required"))]
    pub setup: Option<String>,
    #[validate(range(min = 0.0, max = 10.0, message = "Rating must be between 0 and 10"))]
    pub rating: Option<f64>,
    pub stop_loss: Option<Decimal>,
    pub outcome: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateScalePlanRequest {
    #[validate(length(min = 1, message = "trade_id is required"))]
    pub trade_id: String,
    #[serde(flatten)]
    #[validate(nested)]
    pub plan: ScalePlanPayload,
}

/// Patch partiel d'un plan. Le statut ne se change jamais ici:
/// il avance avec les exécutions, ou via /cancel.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateScalePlanRequest {
    pub order_type: Option<OrderType>,
    #[validate(length(min = 1, message = "Label is required"))]
    pub label: Option<String>,
    #[validate(range(min = 1, message = "Qty must be greater than 0"))]
    pub qty: Option<i32>,
    pub target_price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
    pub limit_price: Option<Decimal>,
    pub good_till: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateExecutionRequest {
    #[validate(length(min = 1, message = "trade_id is required"))]
    pub trade_id: String,
    pub scale_plan_id: Option<String>,
    pub side: ExecutionSide,
    pub source: Option<ExecutionSource>,
    #[validate(range(min = 1, message = "Qty must be greater than 0"))]
    pub qty: i32,
    pub price: Decimal,
    pub commission: Option<Decimal>,
    pub executed_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

/// Correction administrative d'une exécution.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateExecutionRequest {
    #[validate(range(min = 1, message = "Qty must be greater than 0"))]
    pub qty: Option<i32>,
    pub price: Option<Decimal>,
    pub commission: Option<Decimal>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct BatchDeleteExecutionsRequest {
    #[validate(length(min = 1, message = "At least one execution id is required"))]
    pub ids: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateAnnotationRequest {
    #[validate(length(min = 1, message = "trade_id is required"))]
    pub trade_id: String,
    pub annotation_type: AnnotationType,
    #[validate(length(min = 1, message = "Content is required"))]
    pub content: String,
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateAnnotationRequest {
    pub annotation_type: Option<AnnotationType>,
    #[validate(length(min = 1, message = "Content is required"))]
    pub content: Option<String>,
    pub date: Option<DateTime<Utc>>,
}

// ============================================================================
// Schémas Finnhub (quote + profil société)
// ============================================================================

/// Réponse /quote de Finnhub (clés abrégées c, d, dp, o, pc).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockQuote {
    #[serde(default)]
    pub symbol: String,
    #[serde(alias = "c")]
    pub current_price: f64,
    #[serde(alias = "d")]
    pub change: f64,
    #[serde(alias = "dp")]
    pub percent_change: f64,
    #[serde(alias = "o")]
    pub open_price: f64,
    #[serde(alias = "pc")]
    pub previous_close: f64,
}

/// Réponse /stock/profile2 de Finnhub.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub country: Option<String>,
    pub currency: Option<String>,
    pub exchange: Option<String>,
    pub name: Option<String>,
    #[serde(alias = "finnhubIndustry")]
    pub industry: Option<String>,
    pub logo: Option<String>,
    #[serde(alias = "marketCapitalization")]
    pub market_cap: Option<f64>,
}

// ============================================================================
// Réponses
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ExecutionResponse {
    pub id: String,
    pub trade_id: String,
    pub scale_plan_id: Option<String>,
    pub side: ExecutionSide,
    pub source: ExecutionSource,
    pub qty: i32,
    pub price: f64,
    pub commission: f64,
    pub executed_at: DateTime<Utc>,
    pub notes: Option<String>,
}

impl From<execution::Model> for ExecutionResponse {
    fn from(e: execution::Model) -> Self {
        ExecutionResponse {
            id: e.id,
            trade_id: e.trade_id,
            scale_plan_id: e.scale_plan_id,
            side: e.side,
            source: e.source,
            qty: e.qty,
            price: decimal_to_f64(e.price),
            commission: decimal_to_f64(e.commission),
            executed_at: e.executed_at,
            notes: e.notes,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ScalePlanResponse {
    pub id: String,
    pub trade_id: String,
    pub plan_type: PlanType,
    pub order_type: OrderType,
    pub trade_type: TradeDirection,
    pub label: String,
    pub qty: i32,
    pub target_price: Option<f64>,
    pub stop_price: Option<f64>,
    pub limit_price: Option<f64>,
    pub good_till: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub status: ScalePlanStatus,
    pub executions: Vec<ExecutionResponse>,
}

impl ScalePlanResponse {
    pub fn from_model(plan: scale_plan::Model, executions: Vec<execution::Model>) -> Self {
        ScalePlanResponse {
            id: plan.id,
            trade_id: plan.trade_id,
            plan_type: plan.plan_type,
            order_type: plan.order_type,
            trade_type: plan.trade_type,
            label: plan.label,
            qty: plan.qty,
            target_price: plan.target_price.map(decimal_to_f64),
            stop_price: plan.stop_price.map(decimal_to_f64),
            limit_price: plan.limit_price.map(decimal_to_f64),
            good_till: plan.good_till,
            notes: plan.notes,
            status: plan.status,
            executions: executions.into_iter().map(ExecutionResponse::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AnnotationResponse {
    pub id: String,
    pub trade_id: String,
    pub annotation_type: AnnotationType,
    pub content: String,
    pub date: DateTime<Utc>,
}

impl From<annotation::Model> for AnnotationResponse {
    fn from(a: annotation::Model) -> Self {
        AnnotationResponse {
            id: a.id,
            trade_id: a.trade_id,
            annotation_type: a.annotation_type,
            content: a.content,
            date: a.date,
        }
    }
}

/// Vue complète d'un trade: champs propres, collections, métriques dérivées
/// (None = pas encore calculable, jamais 0 par défaut) et enrichissement marché.
#[derive(Debug, Serialize)]
pub struct TradeResponse {
    pub id: String,
    pub symbol: String,
    pub setup: String,
    pub rating: f64,
    pub stop_loss: Option<f64>,
    pub outcome: Option<String>,
    pub status: TradeStatus,
    pub idea_date: DateTime<Utc>,
    pub enter_date: Option<DateTime<Utc>>,
    pub exit_date: Option<DateTime<Utc>>,

    pub scale_plans: Vec<ScalePlanResponse>,
    pub executions: Vec<ExecutionResponse>,
    pub annotations: Vec<AnnotationResponse>,

    // Métriques dérivées (recalculées à chaque lecture)
    pub remaining_shares: Option<i32>,
    pub risk_per_share: Option<f64>,
    pub realized_pnl: Option<f64>,
    pub realized_r: Option<f64>,
    pub weighted_exit_avg: Option<f64>,
    pub rr_ratio: Option<f64>,

    // Enrichissement marché (absent si le fetch externe échoue)
    pub current_price: Option<f64>,
    pub price_change: Option<f64>,
    pub percent_change: Option<f64>,
    pub open_price: Option<f64>,
    pub previous_close: Option<f64>,
    pub company: Option<CompanyProfile>,
}

impl TradeResponse {
    /// Construit la vue sans métriques ni enrichissement (remplis par le service).
    pub fn from_model(
        t: trade::Model,
        scale_plans: Vec<ScalePlanResponse>,
        executions: Vec<execution::Model>,
        annotations: Vec<annotation::Model>,
    ) -> Self {
        TradeResponse {
            id: t.id,
            symbol: t.symbol,
            setup: t.setup,
            rating: t.rating,
            stop_loss: t.stop_loss.map(decimal_to_f64),
            outcome: t.outcome,
            status: t.status,
            idea_date: t.idea_date,
            enter_date: t.enter_date,
            exit_date: t.exit_date,
            scale_plans,
            executions: executions.into_iter().map(ExecutionResponse::from).collect(),
            annotations: annotations.into_iter().map(AnnotationResponse::from).collect(),
            remaining_shares: None,
            risk_per_share: None,
            realized_pnl: None,
            realized_r: None,
            weighted_exit_avg: None,
            rr_ratio: None,
            current_price: None,
            price_change: None,
            percent_change: None,
            open_price: None,
            previous_close: None,
            company: None,
        }
    }
}

// Conversion Decimal → f64 pour les réponses JSON
pub fn decimal_to_f64(decimal: Decimal) -> f64 {
    decimal.to_string().parse::<f64>().unwrap_or(0.0)
}
