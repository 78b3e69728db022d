use rust_decimal::Decimal;

use crate::models::execution::ExecutionSide;
use crate::models::scale_plan::{PlanType, ScalePlanStatus, TradeDirection};
use crate::models::{execution, scale_plan, trade};
use crate::services::accounting::risk_reward;

/// Vue empruntée d'un trade avec ses enfants. Les métriques sont des fonctions
/// pures de cette vue: rien n'est mis en cache sur les entités, chaque lecture
/// repart du ledger.
pub struct TradeAggregate<'a> {
    pub trade: &'a trade::Model,
    pub scale_plans: &'a [scale_plan::Model],
    pub executions: &'a [execution::Model],
}

/// Entrée effective du trade, dérivée du plan ENTRY:
/// - plan rempli (même partiellement): moyenne pondérée des fills, taille exécutée
/// - plan encore PLANNED: prix limite et quantité planifiée
pub struct EntryMetrics {
    pub entry_price_avg: Decimal,
    pub position_size: i32,
    pub stop: Option<Decimal>,
    pub direction: TradeDirection,
}

fn entry_plan<'a>(agg: &'a TradeAggregate) -> Option<&'a scale_plan::Model> {
    agg.scale_plans
        .iter()
        .find(|p| p.plan_type == PlanType::Entry && p.status != ScalePlanStatus::Canceled)
}

fn entry_fills<'a>(
    agg: &'a TradeAggregate,
    entry_plan_id: &str,
) -> Vec<&'a execution::Model> {
    agg.executions
        .iter()
        .filter(|e| e.scale_plan_id.as_deref() == Some(entry_plan_id))
        .collect()
}

// Toutes les exécutions qui ne remplissent pas le plan d'entrée:
// les sorties (SELL) et les rachats correctifs (BUY).
fn exit_executions<'a>(agg: &'a TradeAggregate) -> Vec<&'a execution::Model> {
    let entry_id = entry_plan(agg).map(|p| p.id.as_str());
    agg.executions
        .iter()
        .filter(|e| match (e.scale_plan_id.as_deref(), entry_id) {
            (Some(plan_id), Some(eid)) => plan_id != eid,
            _ => true,
        })
        .collect()
}

fn weighted_avg_price(executions: &[&execution::Model]) -> Option<Decimal> {
    let total_qty: i32 = executions.iter().map(|e| e.qty).sum();
    if total_qty == 0 {
        return None;
    }
    let total_value = executions
        .iter()
        .fold(Decimal::ZERO, |acc, e| acc + e.price * Decimal::from(e.qty));
    Some(total_value / Decimal::from(total_qty))
}

pub fn entry_metrics(agg: &TradeAggregate) -> Option<EntryMetrics> {
    let plan = entry_plan(agg)?;
    // Le stop du trade prime; celui du plan d'entrée sert de repli
    let stop = agg.trade.stop_loss.or(plan.stop_price);

    let fills = entry_fills(agg, &plan.id);
    if fills.is_empty() {
        let limit = plan.limit_price?;
        return Some(EntryMetrics {
            entry_price_avg: limit,
            position_size: plan.qty,
            stop,
            direction: plan.trade_type,
        });
    }

    let entry_price_avg = weighted_avg_price(&fills)?;
    let position_size: i32 = fills.iter().map(|e| e.qty).sum();
    Some(EntryMetrics {
        entry_price_avg,
        position_size,
        stop,
        direction: plan.trade_type,
    })
}

/// Parts restantes en position: taille − ventes + rachats correctifs,
/// plancher à 0. Sans exécution de sortie, la taille est inchangée.
pub fn remaining_shares(agg: &TradeAggregate) -> Option<i32> {
    let em = entry_metrics(agg)?;
    let mut remaining = em.position_size;
    for e in exit_executions(agg) {
        match e.side {
            ExecutionSide::Sell => remaining -= e.qty,
            ExecutionSide::Buy => remaining += e.qty,
        }
    }
    Some(remaining.max(0))
}

/// Risque par part: |entrée moyenne − stop|. None sans stop ou sans entrée.
pub fn risk_per_share(agg: &TradeAggregate) -> Option<Decimal> {
    let em = entry_metrics(agg)?;
    let stop = em.stop?;
    Some((em.entry_price_avg - stop).abs())
}

/// P&L réalisé (convention long uniquement):
/// Σ ventes (prix − entrée moyenne) × qty − Σ commissions de toutes les
/// exécutions, arrondi à 2 décimales. None tant qu'aucune vente n'existe.
pub fn realized_pnl(agg: &TradeAggregate) -> Option<Decimal> {
    let em = entry_metrics(agg)?;
    let sells: Vec<&execution::Model> = exit_executions(agg)
        .into_iter()
        .filter(|e| e.side == ExecutionSide::Sell)
        .collect();
    if sells.is_empty() {
        return None;
    }

    let gross = sells.iter().fold(Decimal::ZERO, |acc, e| {
        acc + (e.price - em.entry_price_avg) * Decimal::from(e.qty)
    });
    let commissions = agg
        .executions
        .iter()
        .fold(Decimal::ZERO, |acc, e| acc + e.commission);

    Some((gross - commissions).round_dp(2))
}

/// R réalisé: chaque vente contribue ((prix − entrée) / risque_par_part)
/// pondéré par qty / taille de position. None si le risque par part est
/// indéfini ou nul, ou tant qu'aucune vente n'existe.
pub fn realized_r(agg: &TradeAggregate) -> Option<Decimal> {
    let em = entry_metrics(agg)?;
    let rps = risk_per_share(agg)?;
    if rps == Decimal::ZERO || em.position_size <= 0 {
        return None;
    }

    let sells: Vec<&execution::Model> = exit_executions(agg)
        .into_iter()
        .filter(|e| e.side == ExecutionSide::Sell)
        .collect();
    if sells.is_empty() {
        return None;
    }

    let size = Decimal::from(em.position_size);
    let total = sells.iter().fold(Decimal::ZERO, |acc, e| {
        let r = (e.price - em.entry_price_avg) / rps;
        acc + r * (Decimal::from(e.qty) / size)
    });

    Some(total.round_dp(2))
}

/// Prix de sortie moyen pondéré, défini uniquement quand la position est
/// entièrement fermée (remaining == 0) et qu'au moins une vente existe.
pub fn weighted_exit_avg_if_closed(agg: &TradeAggregate) -> Option<Decimal> {
    if remaining_shares(agg)? != 0 {
        return None;
    }
    let sells: Vec<&execution::Model> = exit_executions(agg)
        .into_iter()
        .filter(|e| e.side == ExecutionSide::Sell)
        .collect();
    if sells.is_empty() {
        return None;
    }
    weighted_avg_price(&sells)
}

/// Ratio risque/rendement du setup: cibles = plans TARGET non annulés avec un
/// target_price explicite (les jambes remainder n'ont pas de cible mesurable).
pub fn rr_ratio(agg: &TradeAggregate) -> Option<Decimal> {
    let em = entry_metrics(agg)?;
    let stop = em.stop?;

    let targets: Vec<Decimal> = agg
        .scale_plans
        .iter()
        .filter(|p| p.plan_type == PlanType::Target && p.status != ScalePlanStatus::Canceled)
        .filter_map(|p| p.target_price)
        .collect();

    risk_reward::calculate_rr(em.entry_price_avg, stop, &targets, Some(em.direction), None)
        .ok()
        .flatten()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::execution::ExecutionSource;
    use crate::models::scale_plan::OrderType;
    use crate::models::trade::TradeStatus;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn make_trade(stop_loss: Option<Decimal>) -> trade::Model {
        trade::Model {
            id: "trade-1".to_string(),
            symbol: "AAPL".to_string(),
            setup: "Breakout".to_string(),
            rating: 7.0,
            stop_loss,
            outcome: None,
            status: TradeStatus::Open,
            idea_date: Utc::now(),
            enter_date: None,
            exit_date: None,
        }
    }

    fn make_plan(
        id: &str,
        plan_type: PlanType,
        qty: i32,
        target_price: Option<Decimal>,
        limit_price: Option<Decimal>,
        status: ScalePlanStatus,
    ) -> scale_plan::Model {
        scale_plan::Model {
            id: id.to_string(),
            trade_id: "trade-1".to_string(),
            plan_type,
            order_type: OrderType::Limit,
            trade_type: TradeDirection::Long,
            label: "T1".to_string(),
            qty,
            target_price,
            stop_price: None,
            limit_price,
            good_till: None,
            notes: None,
            status,
        }
    }

    fn make_execution(
        id: &str,
        plan_id: Option<&str>,
        side: ExecutionSide,
        qty: i32,
        price: Decimal,
        commission: Decimal,
    ) -> execution::Model {
        execution::Model {
            id: id.to_string(),
            trade_id: "trade-1".to_string(),
            scale_plan_id: plan_id.map(|p| p.to_string()),
            side,
            source: ExecutionSource::Manual,
            qty,
            price,
            commission,
            executed_at: Utc::now(),
            notes: None,
        }
    }

    // Entrée remplie: 100 parts à 10.00 via le plan "entry"
    fn filled_entry_fixture() -> (trade::Model, Vec<scale_plan::Model>, Vec<execution::Model>) {
        let trade = make_trade(Some(dec!(9)));
        let plans = vec![make_plan(
            "entry",
            PlanType::Entry,
            100,
            None,
            Some(dec!(10)),
            ScalePlanStatus::Filled,
        )];
        let executions = vec![make_execution(
            "e1",
            Some("entry"),
            ExecutionSide::Buy,
            100,
            dec!(10),
            dec!(0),
        )];
        (trade, plans, executions)
    }

    #[test]
    fn test_remaining_shares_floor_at_zero() {
        // Vente de 150 sur une position de 100 → 0, jamais négatif
        let (trade, plans, mut executions) = filled_entry_fixture();
        executions.push(make_execution(
            "e2",
            None,
            ExecutionSide::Sell,
            150,
            dec!(12),
            dec!(0),
        ));
        let agg = TradeAggregate {
            trade: &trade,
            scale_plans: &plans,
            executions: &executions,
        };
        assert_eq!(remaining_shares(&agg), Some(0));
    }

    #[test]
    fn test_remaining_shares_unchanged_without_exits() {
        let (trade, plans, executions) = filled_entry_fixture();
        let agg = TradeAggregate {
            trade: &trade,
            scale_plans: &plans,
            executions: &executions,
        };
        assert_eq!(remaining_shares(&agg), Some(100));
    }

    #[test]
    fn test_remaining_shares_corrective_buy_added_back() {
        let (trade, plans, mut executions) = filled_entry_fixture();
        executions.push(make_execution(
            "e2",
            None,
            ExecutionSide::Sell,
            60,
            dec!(12),
            dec!(0),
        ));
        executions.push(make_execution(
            "e3",
            None,
            ExecutionSide::Buy,
            20,
            dec!(11),
            dec!(0),
        ));
        let agg = TradeAggregate {
            trade: &trade,
            scale_plans: &plans,
            executions: &executions,
        };
        assert_eq!(remaining_shares(&agg), Some(60));
    }

    #[test]
    fn test_entry_metrics_weighted_average() {
        // 60 @ 10 + 40 @ 11 → moyenne 10.4, taille 100
        let trade = make_trade(Some(dec!(9)));
        let plans = vec![make_plan(
            "entry",
            PlanType::Entry,
            100,
            None,
            Some(dec!(10)),
            ScalePlanStatus::Filled,
        )];
        let executions = vec![
            make_execution("e1", Some("entry"), ExecutionSide::Buy, 60, dec!(10), dec!(0)),
            make_execution("e2", Some("entry"), ExecutionSide::Buy, 40, dec!(11), dec!(0)),
        ];
        let agg = TradeAggregate {
            trade: &trade,
            scale_plans: &plans,
            executions: &executions,
        };
        let em = entry_metrics(&agg).unwrap();
        assert_eq!(em.entry_price_avg, dec!(10.4));
        assert_eq!(em.position_size, 100);
    }

    #[test]
    fn test_entry_metrics_planned_uses_limit_price() {
        let trade = make_trade(None);
        let plans = vec![make_plan(
            "entry",
            PlanType::Entry,
            50,
            None,
            Some(dec!(25.5)),
            ScalePlanStatus::Planned,
        )];
        let agg = TradeAggregate {
            trade: &trade,
            scale_plans: &plans,
            executions: &[],
        };
        let em = entry_metrics(&agg).unwrap();
        assert_eq!(em.entry_price_avg, dec!(25.5));
        assert_eq!(em.position_size, 50);
    }

    #[test]
    fn test_metrics_undefined_without_entry_plan() {
        let trade = make_trade(Some(dec!(9)));
        let agg = TradeAggregate {
            trade: &trade,
            scale_plans: &[],
            executions: &[],
        };
        assert!(entry_metrics(&agg).is_none());
        assert!(remaining_shares(&agg).is_none());
        assert!(realized_pnl(&agg).is_none());
        assert!(rr_ratio(&agg).is_none());
    }

    #[test]
    fn test_realized_pnl_subtracts_all_commissions() {
        // Vente 50 @ 12 (entrée 10): brut 100, commissions 1 + 1.5 → 97.50
        let (trade, plans, mut executions) = filled_entry_fixture();
        executions[0].commission = dec!(1);
        executions.push(make_execution(
            "e2",
            None,
            ExecutionSide::Sell,
            50,
            dec!(12),
            dec!(1.5),
        ));
        let agg = TradeAggregate {
            trade: &trade,
            scale_plans: &plans,
            executions: &executions,
        };
        assert_eq!(realized_pnl(&agg), Some(dec!(97.50)));
    }

    #[test]
    fn test_realized_pnl_undefined_before_first_sell() {
        let (trade, plans, executions) = filled_entry_fixture();
        let agg = TradeAggregate {
            trade: &trade,
            scale_plans: &plans,
            executions: &executions,
        };
        assert_eq!(realized_pnl(&agg), None);
    }

    #[test]
    fn test_realized_r_weighted_by_position_fraction() {
        // Entrée 10, stop 9 → risque 1. Vente 50/100 @ 12 → R 2 × 0.5 = 1.00
        let (trade, plans, mut executions) = filled_entry_fixture();
        executions.push(make_execution(
            "e2",
            None,
            ExecutionSide::Sell,
            50,
            dec!(12),
            dec!(0),
        ));
        let agg = TradeAggregate {
            trade: &trade,
            scale_plans: &plans,
            executions: &executions,
        };
        assert_eq!(realized_r(&agg), Some(dec!(1.00)));
    }

    #[test]
    fn test_realized_r_undefined_without_stop() {
        let (mut trade, plans, mut executions) = filled_entry_fixture();
        trade.stop_loss = None;
        executions.push(make_execution(
            "e2",
            None,
            ExecutionSide::Sell,
            50,
            dec!(12),
            dec!(0),
        ));
        let agg = TradeAggregate {
            trade: &trade,
            scale_plans: &plans,
            executions: &executions,
        };
        assert_eq!(realized_r(&agg), None);
    }

    #[test]
    fn test_weighted_exit_avg_only_when_fully_closed() {
        let (trade, plans, mut executions) = filled_entry_fixture();
        executions.push(make_execution(
            "e2",
            None,
            ExecutionSide::Sell,
            40,
            dec!(12),
            dec!(0),
        ));
        let agg = TradeAggregate {
            trade: &trade,
            scale_plans: &plans,
            executions: &executions,
        };
        // Position encore ouverte: pas de moyenne de sortie
        assert_eq!(weighted_exit_avg_if_closed(&agg), None);

        let mut executions = executions.clone();
        executions.push(make_execution(
            "e3",
            None,
            ExecutionSide::Sell,
            60,
            dec!(13),
            dec!(0),
        ));
        let agg = TradeAggregate {
            trade: &trade,
            scale_plans: &plans,
            executions: &executions,
        };
        // (12×40 + 13×60) / 100 = 12.6
        assert_eq!(weighted_exit_avg_if_closed(&agg), Some(dec!(12.6)));
    }

    #[test]
    fn test_rr_ratio_excludes_remainder_legs() {
        // Entrée 10, stop 9; cibles: 12 explicite + jambe remainder (ignorée) → R = 2
        let (trade, mut plans, executions) = filled_entry_fixture();
        plans.push(make_plan(
            "t1",
            PlanType::Target,
            50,
            Some(dec!(12)),
            None,
            ScalePlanStatus::Planned,
        ));
        plans.push(make_plan(
            "t2",
            PlanType::Target,
            50,
            None,
            None,
            ScalePlanStatus::Planned,
        ));
        let agg = TradeAggregate {
            trade: &trade,
            scale_plans: &plans,
            executions: &executions,
        };
        assert_eq!(rr_ratio(&agg), Some(dec!(2.00)));
    }

    #[test]
    fn test_risk_per_share_absolute_difference() {
        let (trade, plans, executions) = filled_entry_fixture();
        let agg = TradeAggregate {
            trade: &trade,
            scale_plans: &plans,
            executions: &executions,
        };
        assert_eq!(risk_per_share(&agg), Some(dec!(1)));
    }
}
