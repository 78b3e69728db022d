use rust_decimal::Decimal;

use crate::errors::ServiceError;
use crate::models::scale_plan::TradeDirection;

/// Calcule le ratio risque/rendement d'un setup.
///
/// Chaque cible donne un multiple R = reward / risk; le résultat est la
/// moyenne pondérée des multiples (pondération uniforme par défaut),
/// arrondie à 2 décimales.
///
/// Retourne None quand le ratio n'est pas mesurable:
/// - stop du mauvais côté de l'entrée (risque ≤ 0)
/// - aucune cible profitable (tous les multiples à 0)
/// - somme des poids ≤ 0
/// Une cible non profitable compte pour 0, jamais en négatif.
pub fn calculate_rr(
    entry_price: Decimal,
    stop_price: Decimal,
    target_prices: &[Decimal],
    side: Option<TradeDirection>,
    weights: Option<&[Decimal]>,
) -> Result<Option<Decimal>, ServiceError> {
    if target_prices.is_empty() {
        return Ok(None);
    }

    if let Some(w) = weights {
        if w.len() != target_prices.len() {
            return Err(ServiceError::validation(
                "Weights length must match target prices length",
            ));
        }
    }

    // Side déduit si absent: stop sous l'entrée = long, sinon short
    let side = side.unwrap_or(if stop_price < entry_price {
        TradeDirection::Long
    } else {
        TradeDirection::Short
    });

    let risk = match side {
        TradeDirection::Long => entry_price - stop_price,
        TradeDirection::Short => stop_price - entry_price,
    };
    if risk <= Decimal::ZERO {
        return Ok(None);
    }

    let multiples: Vec<Decimal> = target_prices
        .iter()
        .map(|target| {
            let reward = match side {
                TradeDirection::Long => *target - entry_price,
                TradeDirection::Short => entry_price - *target,
            };
            if reward <= Decimal::ZERO {
                Decimal::ZERO
            } else {
                reward / risk
            }
        })
        .collect();

    if multiples.iter().all(|m| *m == Decimal::ZERO) {
        return Ok(None);
    }

    let (weighted_sum, weight_total) = match weights {
        Some(w) => {
            let sum = multiples
                .iter()
                .zip(w.iter())
                .fold(Decimal::ZERO, |acc, (m, weight)| acc + *m * *weight);
            let total = w.iter().fold(Decimal::ZERO, |acc, weight| acc + *weight);
            (sum, total)
        }
        None => {
            let sum = multiples.iter().fold(Decimal::ZERO, |acc, m| acc + *m);
            (sum, Decimal::from(multiples.len() as i64))
        }
    };

    if weight_total <= Decimal::ZERO {
        return Ok(None);
    }

    Ok(Some((weighted_sum / weight_total).round_dp(2)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_rr_equal_weighted_mean() {
        // entry 100, stop 90 (risk 10), cibles 110 et 120 → R 1.0 et 2.0 → 1.5
        let rr = calculate_rr(dec!(100), dec!(90), &[dec!(110), dec!(120)], None, None).unwrap();
        assert_eq!(rr, Some(dec!(1.5)));
    }

    #[test]
    fn test_rr_undefined_on_non_profitable_targets() {
        // Seule cible à 95 sous l'entrée: aucun rendement viable
        let rr = calculate_rr(dec!(100), dec!(90), &[dec!(95)], None, None).unwrap();
        assert_eq!(rr, None);
    }

    #[test]
    fn test_rr_non_profitable_target_contributes_zero() {
        // 95 → 0, 120 → 2.0; moyenne = 1.0 (jamais de contribution négative)
        let rr = calculate_rr(dec!(100), dec!(90), &[dec!(95), dec!(120)], None, None).unwrap();
        assert_eq!(rr, Some(dec!(1.0)));
    }

    #[test]
    fn test_rr_undefined_when_stop_on_wrong_side() {
        let rr = calculate_rr(
            dec!(100),
            dec!(110),
            &[dec!(120)],
            Some(TradeDirection::Long),
            None,
        )
        .unwrap();
        assert_eq!(rr, None);
    }

    #[test]
    fn test_rr_side_inferred_short() {
        // stop 110 > entrée 100 → short; cible 80 → reward 20, risk 10 → 2.0
        let rr = calculate_rr(dec!(100), dec!(110), &[dec!(80)], None, None).unwrap();
        assert_eq!(rr, Some(dec!(2.0)));
    }

    #[test]
    fn test_rr_weighted_average() {
        // R 1.0 (poids 1) et 2.0 (poids 3) → 7/4 = 1.75
        let rr = calculate_rr(
            dec!(100),
            dec!(90),
            &[dec!(110), dec!(120)],
            None,
            Some(&[dec!(1), dec!(3)]),
        )
        .unwrap();
        assert_eq!(rr, Some(dec!(1.75)));
    }

    #[test]
    fn test_rr_weights_length_mismatch_rejected() {
        let result = calculate_rr(
            dec!(100),
            dec!(90),
            &[dec!(110), dec!(120)],
            None,
            Some(&[dec!(1)]),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_rr_zero_weight_sum_undefined() {
        let rr = calculate_rr(
            dec!(100),
            dec!(90),
            &[dec!(110), dec!(120)],
            None,
            Some(&[dec!(0), dec!(0)]),
        )
        .unwrap();
        assert_eq!(rr, None);
    }

    #[test]
    fn test_rr_no_targets_undefined() {
        let rr = calculate_rr(dec!(100), dec!(90), &[], None, None).unwrap();
        assert_eq!(rr, None);
    }

    #[test]
    fn test_rr_rounded_to_two_decimals() {
        // risk 3, cibles 110 et 114 → R 10/3 et 14/3 → moyenne 4.0
        let rr = calculate_rr(dec!(100), dec!(97), &[dec!(110), dec!(114)], None, None).unwrap();
        assert_eq!(rr, Some(dec!(4.00)));
    }
}
