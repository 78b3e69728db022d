use crate::models::scale_plan::{PlanType, ScalePlanStatus};
use crate::models::trade::TradeStatus;

// Position de chaque statut sur l'échelle de remplissage.
// CANCELED est hors échelle: un plan annulé ne bouge plus.
fn ladder_rank(status: ScalePlanStatus) -> u8 {
    match status {
        ScalePlanStatus::Planned => 0,
        ScalePlanStatus::Triggered => 1,
        ScalePlanStatus::FilledPartial => 2,
        ScalePlanStatus::Filled => 3,
        ScalePlanStatus::Canceled => u8::MAX,
    }
}

/// Statut d'un plan après la création d'une exécution le référençant.
/// `total_executed_qty` = somme des qty de TOUTES les exécutions du plan.
/// Le statut ne recule jamais sur ce chemin: l'échelle n'avance que vers l'avant.
pub fn status_after_execution(
    current: ScalePlanStatus,
    plan_qty: i32,
    total_executed_qty: i32,
) -> ScalePlanStatus {
    if current == ScalePlanStatus::Canceled {
        return current;
    }

    let next = if total_executed_qty == plan_qty {
        ScalePlanStatus::Filled
    } else if total_executed_qty > 0 {
        ScalePlanStatus::FilledPartial
    } else if current == ScalePlanStatus::Planned {
        ScalePlanStatus::Triggered
    } else {
        current
    };

    if ladder_rank(next) > ladder_rank(current) {
        next
    } else {
        current
    }
}

/// Statut d'un plan après suppression d'exécutions (recalculé sur les survivantes).
/// Ce chemin ne fait que rétrograder: 0 → PLANNED, partiel → FILLED_PARTIAL,
/// sinon le statut courant est conservé.
pub fn status_after_removal(
    current: ScalePlanStatus,
    plan_qty: i32,
    total_executed_qty: i32,
) -> ScalePlanStatus {
    if current == ScalePlanStatus::Canceled {
        return current;
    }

    if total_executed_qty == 0 {
        ScalePlanStatus::Planned
    } else if total_executed_qty < plan_qty {
        ScalePlanStatus::FilledPartial
    } else {
        current
    }
}

/// Recalcul complet après correction administrative d'une exécution
/// (la qty corrigée peut faire monter ou descendre le total).
pub fn recompute_status(
    current: ScalePlanStatus,
    plan_qty: i32,
    total_executed_qty: i32,
) -> ScalePlanStatus {
    if current == ScalePlanStatus::Canceled {
        return current;
    }

    if total_executed_qty == 0 {
        ScalePlanStatus::Planned
    } else if total_executed_qty == plan_qty {
        ScalePlanStatus::Filled
    } else {
        ScalePlanStatus::FilledPartial
    }
}

/// Vrai quand un plan venant de changer de statut doit ouvrir son trade:
/// plan d'entrée entièrement rempli, trade encore en WATCHING.
/// C'est le seul déclencheur automatique de la transition WATCHING → OPEN.
pub fn entry_fill_opens_trade(
    new_status: ScalePlanStatus,
    plan_type: PlanType,
    trade_status: TradeStatus,
) -> bool {
    new_status == ScalePlanStatus::Filled
        && plan_type == PlanType::Entry
        && trade_status == TradeStatus::Watching
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_ladder_partial_then_filled() {
        // Plan qty=100: fill de 40 → FILLED_PARTIAL, puis 60 de plus → FILLED
        let s1 = status_after_execution(ScalePlanStatus::Planned, 100, 40);
        assert_eq!(s1, ScalePlanStatus::FilledPartial);

        let s2 = status_after_execution(s1, 100, 100);
        assert_eq!(s2, ScalePlanStatus::Filled);
    }

    #[test]
    fn test_fill_exact_qty_fills_from_planned() {
        let s = status_after_execution(ScalePlanStatus::Planned, 100, 100);
        assert_eq!(s, ScalePlanStatus::Filled);
    }

    #[test]
    fn test_fill_zero_total_triggers_planned_plan() {
        let s = status_after_execution(ScalePlanStatus::Planned, 100, 0);
        assert_eq!(s, ScalePlanStatus::Triggered);
    }

    #[test]
    fn test_fill_over_fill_stays_partial() {
        // Au-delà de la qty planifiée, seule l'égalité vaut FILLED
        let s = status_after_execution(ScalePlanStatus::FilledPartial, 100, 120);
        assert_eq!(s, ScalePlanStatus::FilledPartial);
    }

    #[test]
    fn test_fill_never_downgrades() {
        // Un plan déjà FILLED ne redescend pas via ce chemin
        let s = status_after_execution(ScalePlanStatus::Filled, 100, 120);
        assert_eq!(s, ScalePlanStatus::Filled);
    }

    #[test]
    fn test_fill_canceled_never_advances() {
        let s = status_after_execution(ScalePlanStatus::Canceled, 100, 50);
        assert_eq!(s, ScalePlanStatus::Canceled);
    }

    #[test]
    fn test_removal_downgrades_to_planned() {
        // FILLED (qty=100, une exécution de 100) puis suppression → PLANNED
        let s = status_after_removal(ScalePlanStatus::Filled, 100, 0);
        assert_eq!(s, ScalePlanStatus::Planned);
    }

    #[test]
    fn test_removal_downgrades_to_partial() {
        let s = status_after_removal(ScalePlanStatus::Filled, 100, 40);
        assert_eq!(s, ScalePlanStatus::FilledPartial);
    }

    #[test]
    fn test_removal_keeps_status_when_still_covered() {
        let s = status_after_removal(ScalePlanStatus::Filled, 100, 100);
        assert_eq!(s, ScalePlanStatus::Filled);
    }

    #[test]
    fn test_entry_fill_opens_watching_trade() {
        // Plan d'entrée qty=100: 40 → FILLED_PARTIAL, le trade reste WATCHING;
        // 60 de plus → FILLED, le trade doit s'ouvrir
        let partial = status_after_execution(ScalePlanStatus::Planned, 100, 40);
        assert!(!entry_fill_opens_trade(
            partial,
            PlanType::Entry,
            TradeStatus::Watching
        ));

        let filled = status_after_execution(partial, 100, 100);
        assert!(entry_fill_opens_trade(
            filled,
            PlanType::Entry,
            TradeStatus::Watching
        ));
    }

    #[test]
    fn test_target_fill_never_opens_trade() {
        assert!(!entry_fill_opens_trade(
            ScalePlanStatus::Filled,
            PlanType::Target,
            TradeStatus::Watching
        ));
        // Un trade déjà OPEN ne se réouvre pas
        assert!(!entry_fill_opens_trade(
            ScalePlanStatus::Filled,
            PlanType::Entry,
            TradeStatus::Open
        ));
    }

    #[test]
    fn test_recompute_after_correction() {
        assert_eq!(
            recompute_status(ScalePlanStatus::Filled, 100, 60),
            ScalePlanStatus::FilledPartial
        );
        assert_eq!(
            recompute_status(ScalePlanStatus::FilledPartial, 100, 100),
            ScalePlanStatus::Filled
        );
        assert_eq!(
            recompute_status(ScalePlanStatus::FilledPartial, 100, 0),
            ScalePlanStatus::Planned
        );
    }
}
