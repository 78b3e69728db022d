use std::collections::{HashMap, HashSet};

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::*;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::annotation::AnnotationType;
use crate::models::dto::{
    decimal_to_f64, CompanyProfile, CreateTradeRequest, ScalePlanPayload, ScalePlanResponse,
    StockQuote, TradeResponse, UpdateTradeRequest,
};
use crate::models::scale_plan::ScalePlanStatus;
use crate::models::trade::TradeStatus;
use crate::models::{annotation, execution, scale_plan, trade};
use crate::services::accounting::position::{self, TradeAggregate};
use crate::services::market_data_service::QuoteProvider;
use crate::services::scale_plan_service::{validate_plan_set, PlanCheck};

pub struct TradeService;

impl TradeService {
    /// Tous les trades avec leurs collections, métriques dérivées et
    /// enrichissement marché (si un provider est configuré).
    pub async fn get_all_trades(
        db: &DatabaseConnection,
        provider: Option<&dyn QuoteProvider>,
    ) -> Result<Vec<TradeResponse>, ServiceError> {
        let trades = trade::Entity::find()
            .order_by_desc(trade::Column::IdeaDate)
            .all(db)
            .await?;

        let mut responses = Self::build_responses(db, trades).await?;
        if let Some(provider) = provider {
            Self::enrich_trades(&mut responses, provider).await;
        }
        Ok(responses)
    }

    pub async fn get_trade_by_id(
        db: &DatabaseConnection,
        trade_id: &str,
        provider: Option<&dyn QuoteProvider>,
    ) -> Result<TradeResponse, ServiceError> {
        let found = trade::Entity::find_by_id(trade_id.to_string())
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Trade not found"))?;

        let mut responses = Self::build_responses(db, vec![found]).await?;
        let mut response = responses
            .pop()
            .ok_or_else(|| ServiceError::not_found("Trade not found"))?;

        if let Some(provider) = provider {
            Self::enrich_trades(std::slice::from_mut(&mut response), provider).await;
        }
        Ok(response)
    }

    /// Crée un trade en WATCHING avec ses plans et annotations, atomiquement.
    /// Le jeu de plans doit contenir une entrée bien formée (voir
    /// validate_plan_set); toute violation rejette la création entière.
    pub async fn create_trade(
        db: &DatabaseConnection,
        request: CreateTradeRequest,
    ) -> Result<TradeResponse, ServiceError> {
        let checks: Vec<PlanCheck> = request.scale_plans.iter().map(PlanCheck::from).collect();
        validate_plan_set(&checks, true)?;

        let txn = db.begin().await?;

        let trade_id = Uuid::new_v4().to_string();
        let new_trade = trade::ActiveModel {
            id: Set(trade_id.clone()),
            symbol: Set(request.symbol.to_uppercase()),
            setup: Set(request.setup),
            rating: Set(request.rating),
            stop_loss: Set(request.stop_loss),
            outcome: Set(None),
            status: Set(TradeStatus::Watching),
            idea_date: Set(Utc::now()),
            enter_date: Set(None),
            exit_date: Set(None),
        };
        new_trade.insert(&txn).await?;

        Self::insert_scale_plans(&txn, &trade_id, &request.scale_plans).await?;
        Self::insert_annotations(
            &txn,
            &trade_id,
            request.notes.as_deref(),
            request.catalysts.as_deref(),
        )
        .await?;

        txn.commit().await?;

        tracing::info!("Trade {} created (watching)", trade_id);
        Self::get_trade_by_id(db, &trade_id, None).await
    }

    /// Remplacement complet d'un trade encore en WATCHING: les champs
    /// descriptifs sont réécrits, les collections plans/annotations purgées et
    /// reconstruites. Identité, idea_date et status sont conservés.
    pub async fn replace_trade(
        db: &DatabaseConnection,
        trade_id: &str,
        request: CreateTradeRequest,
    ) -> Result<TradeResponse, ServiceError> {
        let checks: Vec<PlanCheck> = request.scale_plans.iter().map(PlanCheck::from).collect();
        validate_plan_set(&checks, true)?;

        let txn = db.begin().await?;

        let existing = trade::Entity::find_by_id(trade_id.to_string())
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("Trade not found"))?;

        if existing.status != TradeStatus::Watching {
            return Err(ServiceError::validation("Trade is not in WATCHING status"));
        }

        let mut active: trade::ActiveModel = existing.into();
        active.symbol = Set(request.symbol.to_uppercase());
        active.setup = Set(request.setup);
        active.rating = Set(request.rating);
        active.stop_loss = Set(request.stop_loss);
        active.update(&txn).await?;

        // Détacher les exécutions des anciens plans avant la purge:
        // l'historique de fills survit au remplacement.
        execution::Entity::update_many()
            .col_expr(
                execution::Column::ScalePlanId,
                Expr::value(Option::<String>::None),
            )
            .filter(execution::Column::TradeId.eq(trade_id))
            .exec(&txn)
            .await?;
        scale_plan::Entity::delete_many()
            .filter(scale_plan::Column::TradeId.eq(trade_id))
            .exec(&txn)
            .await?;
        annotation::Entity::delete_many()
            .filter(annotation::Column::TradeId.eq(trade_id))
            .exec(&txn)
            .await?;

        Self::insert_scale_plans(&txn, trade_id, &request.scale_plans).await?;
        Self::insert_annotations(
            &txn,
            trade_id,
            request.notes.as_deref(),
            request.catalysts.as_deref(),
        )
        .await?;

        txn.commit().await?;
        Self::get_trade_by_id(db, trade_id, None).await
    }

    /// Patch partiel des champs descriptifs (jamais du statut).
    pub async fn update_trade(
        db: &DatabaseConnection,
        trade_id: &str,
        request: UpdateTradeRequest,
    ) -> Result<TradeResponse, ServiceError> {
        let existing = trade::Entity::find_by_id(trade_id.to_string())
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Trade not found"))?;

        let mut active: trade::ActiveModel = existing.into();
        if let Some(symbol) = request.symbol {
            active.symbol = Set(symbol.to_uppercase());
        }
        if let Some(setup) = request.setup {
            active.setup = Set(setup);
        }
        if let Some(rating) = request.rating {
            active.rating = Set(rating);
        }
        if let Some(stop_loss) = request.stop_loss {
            active.stop_loss = Set(Some(stop_loss));
        }
        if let Some(outcome) = request.outcome {
            active.outcome = Set(Some(outcome));
        }
        active.update(db).await?;

        Self::get_trade_by_id(db, trade_id, None).await
    }

    /// WATCHING → INVALIDATED (état terminal). Rejeté depuis tout autre état.
    pub async fn invalidate_trade(
        db: &DatabaseConnection,
        trade_id: &str,
    ) -> Result<TradeResponse, ServiceError> {
        let existing = trade::Entity::find_by_id(trade_id.to_string())
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Trade not found"))?;

        if existing.status != TradeStatus::Watching {
            return Err(ServiceError::validation(
                "Only a WATCHING trade can be invalidated",
            ));
        }

        let mut active: trade::ActiveModel = existing.into();
        active.status = Set(TradeStatus::Invalidated);
        active.update(db).await?;

        Self::get_trade_by_id(db, trade_id, None).await
    }

    /// OPEN → CLOSED (état terminal), exit_date horodaté.
    pub async fn close_trade(
        db: &DatabaseConnection,
        trade_id: &str,
    ) -> Result<TradeResponse, ServiceError> {
        let existing = trade::Entity::find_by_id(trade_id.to_string())
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Trade not found"))?;

        if existing.status != TradeStatus::Open {
            return Err(ServiceError::validation("Only an OPEN trade can be closed"));
        }

        let mut active: trade::ActiveModel = existing.into();
        active.status = Set(TradeStatus::Closed);
        active.exit_date = Set(Some(Utc::now()));
        active.update(db).await?;

        Self::get_trade_by_id(db, trade_id, None).await
    }

    /// Suppression en cascade: plans, exécutions et annotations partent avec
    /// le trade, dans la même transaction.
    pub async fn delete_trade(db: &DatabaseConnection, trade_id: &str) -> Result<(), ServiceError> {
        let txn = db.begin().await?;

        trade::Entity::find_by_id(trade_id.to_string())
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("Trade not found"))?;

        execution::Entity::delete_many()
            .filter(execution::Column::TradeId.eq(trade_id))
            .exec(&txn)
            .await?;
        scale_plan::Entity::delete_many()
            .filter(scale_plan::Column::TradeId.eq(trade_id))
            .exec(&txn)
            .await?;
        annotation::Entity::delete_many()
            .filter(annotation::Column::TradeId.eq(trade_id))
            .exec(&txn)
            .await?;
        trade::Entity::delete_by_id(trade_id.to_string())
            .exec(&txn)
            .await?;

        txn.commit().await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Assemblage des vues
    // ------------------------------------------------------------------

    // Une seule requête par collection (pas de N+1 sur la liste).
    async fn build_responses(
        db: &DatabaseConnection,
        trades: Vec<trade::Model>,
    ) -> Result<Vec<TradeResponse>, ServiceError> {
        if trades.is_empty() {
            return Ok(Vec::new());
        }

        let trade_ids: Vec<String> = trades.iter().map(|t| t.id.clone()).collect();

        let all_plans = scale_plan::Entity::find()
            .filter(scale_plan::Column::TradeId.is_in(trade_ids.clone()))
            .all(db)
            .await?;
        let all_executions = execution::Entity::find()
            .filter(execution::Column::TradeId.is_in(trade_ids.clone()))
            .order_by_asc(execution::Column::ExecutedAt)
            .all(db)
            .await?;
        let all_annotations = annotation::Entity::find()
            .filter(annotation::Column::TradeId.is_in(trade_ids))
            .all(db)
            .await?;

        let mut plans_by_trade: HashMap<String, Vec<scale_plan::Model>> = HashMap::new();
        for plan in all_plans {
            plans_by_trade
                .entry(plan.trade_id.clone())
                .or_default()
                .push(plan);
        }
        let mut executions_by_trade: HashMap<String, Vec<execution::Model>> = HashMap::new();
        for e in all_executions {
            executions_by_trade
                .entry(e.trade_id.clone())
                .or_default()
                .push(e);
        }
        let mut annotations_by_trade: HashMap<String, Vec<annotation::Model>> = HashMap::new();
        for a in all_annotations {
            annotations_by_trade
                .entry(a.trade_id.clone())
                .or_default()
                .push(a);
        }

        let mut responses = Vec::new();
        for t in trades {
            let plans = plans_by_trade.remove(&t.id).unwrap_or_default();
            let executions = executions_by_trade.remove(&t.id).unwrap_or_default();
            let annotations = annotations_by_trade.remove(&t.id).unwrap_or_default();
            responses.push(Self::build_response(t, plans, executions, annotations));
        }
        Ok(responses)
    }

    fn build_response(
        t: trade::Model,
        plans: Vec<scale_plan::Model>,
        executions: Vec<execution::Model>,
        annotations: Vec<annotation::Model>,
    ) -> TradeResponse {
        // Métriques calculées avant de céder les modèles à la vue
        let agg = TradeAggregate {
            trade: &t,
            scale_plans: &plans,
            executions: &executions,
        };
        let remaining_shares = position::remaining_shares(&agg);
        let risk_per_share = position::risk_per_share(&agg).map(decimal_to_f64);
        let realized_pnl = position::realized_pnl(&agg).map(decimal_to_f64);
        let realized_r = position::realized_r(&agg).map(decimal_to_f64);
        let weighted_exit_avg = position::weighted_exit_avg_if_closed(&agg).map(decimal_to_f64);
        let rr_ratio = position::rr_ratio(&agg).map(decimal_to_f64);

        let plan_responses: Vec<ScalePlanResponse> = plans
            .into_iter()
            .map(|plan| {
                let plan_executions: Vec<execution::Model> = executions
                    .iter()
                    .filter(|e| e.scale_plan_id.as_deref() == Some(plan.id.as_str()))
                    .cloned()
                    .collect();
                ScalePlanResponse::from_model(plan, plan_executions)
            })
            .collect();

        let mut response = TradeResponse::from_model(t, plan_responses, executions, annotations);
        response.remaining_shares = remaining_shares;
        response.risk_per_share = risk_per_share;
        response.realized_pnl = realized_pnl;
        response.realized_r = realized_r;
        response.weighted_exit_avg = weighted_exit_avg;
        response.rr_ratio = rr_ratio;
        response
    }

    // ------------------------------------------------------------------
    // Enrichissement marché
    // ------------------------------------------------------------------

    /// Fusionne quotes et profils sur les trades OPEN/WATCHING.
    /// Ne renvoie jamais d'erreur: un échec du provider laisse simplement
    /// les champs d'enrichissement absents.
    pub async fn enrich_trades(responses: &mut [TradeResponse], provider: &dyn QuoteProvider) {
        let mut symbols: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        for response in responses.iter() {
            if matches!(response.status, TradeStatus::Open | TradeStatus::Watching)
                && seen.insert(response.symbol.clone())
            {
                symbols.push(response.symbol.clone());
            }
        }
        if symbols.is_empty() {
            return;
        }

        // Quotes et profils en parallèle
        let (quotes, profiles) = futures::join!(
            provider.get_quote_batch(&symbols),
            Self::fetch_profiles(provider, &symbols)
        );

        let quote_map: HashMap<String, StockQuote> = quotes
            .into_iter()
            .map(|q| (q.symbol.clone(), q))
            .collect();

        for response in responses.iter_mut() {
            if !matches!(response.status, TradeStatus::Open | TradeStatus::Watching) {
                continue;
            }
            if let Some(quote) = quote_map.get(&response.symbol) {
                response.current_price = Some(quote.current_price);
                response.price_change = Some(quote.change);
                response.percent_change = Some(quote.percent_change);
                response.open_price = Some(quote.open_price);
                response.previous_close = Some(quote.previous_close);
            }
            if let Some(profile) = profiles.get(&response.symbol) {
                response.company = Some(profile.clone());
            }
        }
    }

    async fn fetch_profiles(
        provider: &dyn QuoteProvider,
        symbols: &[String],
    ) -> HashMap<String, CompanyProfile> {
        let results =
            futures::future::join_all(symbols.iter().map(|s| provider.get_company_profile(s)))
                .await;
        symbols
            .iter()
            .cloned()
            .zip(results)
            .filter_map(|(symbol, profile)| profile.map(|p| (symbol, p)))
            .collect()
    }

    // ------------------------------------------------------------------
    // Insertion des enfants
    // ------------------------------------------------------------------

    async fn insert_scale_plans<C: ConnectionTrait>(
        conn: &C,
        trade_id: &str,
        plans: &[ScalePlanPayload],
    ) -> Result<(), ServiceError> {
        for payload in plans {
            let new_plan = scale_plan::ActiveModel {
                id: Set(Uuid::new_v4().to_string()),
                trade_id: Set(trade_id.to_string()),
                plan_type: Set(payload.plan_type),
                order_type: Set(payload.order_type),
                trade_type: Set(payload.trade_type),
                label: Set(payload.label.clone()),
                qty: Set(payload.qty),
                target_price: Set(payload.target_price),
                stop_price: Set(payload.stop_price),
                limit_price: Set(payload.limit_price),
                good_till: Set(payload.good_till),
                notes: Set(payload.notes.clone()),
                status: Set(ScalePlanStatus::Planned),
            };
            new_plan.insert(conn).await?;
        }
        Ok(())
    }

    async fn insert_annotations<C: ConnectionTrait>(
        conn: &C,
        trade_id: &str,
        notes: Option<&[String]>,
        catalysts: Option<&[String]>,
    ) -> Result<(), ServiceError> {
        let now = Utc::now();
        let entries = notes
            .unwrap_or_default()
            .iter()
            .map(|content| (AnnotationType::Note, content))
            .chain(
                catalysts
                    .unwrap_or_default()
                    .iter()
                    .map(|content| (AnnotationType::Catalyst, content)),
            );

        for (annotation_type, content) in entries {
            let new_annotation = annotation::ActiveModel {
                id: Set(Uuid::new_v4().to_string()),
                trade_id: Set(trade_id.to_string()),
                annotation_type: Set(annotation_type),
                content: Set(content.clone()),
                date: Set(now),
            };
            new_annotation.insert(conn).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;

    struct StubProvider {
        quotes: Vec<StockQuote>,
        profiles: HashMap<String, CompanyProfile>,
    }

    impl StubProvider {
        fn failing() -> Self {
            StubProvider {
                quotes: Vec::new(),
                profiles: HashMap::new(),
            }
        }
    }

    #[async_trait]
    impl QuoteProvider for StubProvider {
        async fn get_quote_batch(&self, symbols: &[String]) -> Vec<StockQuote> {
            self.quotes
                .iter()
                .filter(|q| symbols.contains(&q.symbol))
                .cloned()
                .collect()
        }

        async fn get_company_profile(&self, symbol: &str) -> Option<CompanyProfile> {
            self.profiles.get(symbol).cloned()
        }
    }

    fn make_response(symbol: &str, status: TradeStatus) -> TradeResponse {
        let t = trade::Model {
            id: Uuid::new_v4().to_string(),
            symbol: symbol.to_string(),
            setup: "Breakout".to_string(),
            rating: 7.0,
            stop_loss: Some(dec!(90)),
            outcome: None,
            status,
            idea_date: Utc::now(),
            enter_date: None,
            exit_date: None,
        };
        TradeResponse::from_model(t, Vec::new(), Vec::new(), Vec::new())
    }

    fn make_quote(symbol: &str, price: f64) -> StockQuote {
        StockQuote {
            symbol: symbol.to_string(),
            current_price: price,
            change: 1.2,
            percent_change: 0.8,
            open_price: price - 1.0,
            previous_close: price - 1.2,
        }
    }

    #[tokio::test]
    async fn test_enrichment_failure_leaves_core_fields_intact() {
        // Provider en échec total: la liste reste servie, enrichissement absent
        let mut responses = vec![make_response("AAPL", TradeStatus::Open)];
        TradeService::enrich_trades(&mut responses, &StubProvider::failing()).await;

        let response = &responses[0];
        assert_eq!(response.symbol, "AAPL");
        assert_eq!(response.current_price, None);
        assert_eq!(response.previous_close, None);
        assert!(response.company.is_none());
    }

    #[tokio::test]
    async fn test_enrichment_merges_quotes_on_open_trades() {
        let provider = StubProvider {
            quotes: vec![make_quote("AAPL", 184.5)],
            profiles: HashMap::new(),
        };
        let mut responses = vec![make_response("AAPL", TradeStatus::Open)];
        TradeService::enrich_trades(&mut responses, &provider).await;

        let response = &responses[0];
        assert_eq!(response.current_price, Some(184.5));
        assert_eq!(response.price_change, Some(1.2));
        assert_eq!(response.open_price, Some(183.5));
    }

    #[tokio::test]
    async fn test_enrichment_skips_terminal_trades() {
        // Les trades CLOSED/INVALIDATED ne sont jamais enrichis
        let provider = StubProvider {
            quotes: vec![make_quote("AAPL", 184.5)],
            profiles: HashMap::new(),
        };
        let mut responses = vec![
            make_response("AAPL", TradeStatus::Closed),
            make_response("AAPL", TradeStatus::Invalidated),
        ];
        TradeService::enrich_trades(&mut responses, &provider).await;

        assert_eq!(responses[0].current_price, None);
        assert_eq!(responses[1].current_price, None);
    }

    #[tokio::test]
    async fn test_enrichment_merges_company_profile() {
        let mut profiles = HashMap::new();
        profiles.insert(
            "AAPL".to_string(),
            CompanyProfile {
                country: Some("US".to_string()),
                currency: Some("USD".to_string()),
                exchange: Some("NASDAQ".to_string()),
                name: Some("Apple Inc".to_string()),
                industry: Some("Technology".to_string()),
                logo: None,
                market_cap: Some(2500000.0),
            },
        );
        let provider = StubProvider {
            quotes: Vec::new(),
            profiles,
        };
        let mut responses = vec![make_response("AAPL", TradeStatus::Watching)];
        TradeService::enrich_trades(&mut responses, &provider).await;

        let company = responses[0].company.as_ref().unwrap();
        assert_eq!(company.name.as_deref(), Some("Apple Inc"));
    }
}
