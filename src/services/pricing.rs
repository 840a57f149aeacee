use rust_decimal::{prelude::ToPrimitive, Decimal, RoundingStrategy};

use crate::entities::promotion::Model as PromotionModel;
use crate::services::customization::ValidatedLine;

/// Money is kept at two fractional digits.
pub const MONEY_SCALE: u32 = 2;

/// Totals for one checkout
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PriceBreakdown {
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    /// Percentage of the applied promotion, if any
    pub discount_percent: Option<Decimal>,
    pub promotion_name: Option<String>,
    pub total: Decimal,
}

/// Rounds half away from zero to cents.
pub fn round2(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Converts an amount to integer minor units (cents), rounding half up.
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    (round2(amount) * Decimal::ONE_HUNDRED).to_i64()
}

/// Prices validated lines with at most one promotion.
pub fn price(lines: &[ValidatedLine], promotion: Option<&PromotionModel>) -> PriceBreakdown {
    let subtotal = round2(lines.iter().map(ValidatedLine::line_total).sum());

    let (discount_amount, discount_percent, promotion_name) = match promotion {
        Some(promo) => (
            round2(subtotal * promo.discount_value / Decimal::ONE_HUNDRED),
            Some(promo.discount_value),
            Some(promo.name.clone()),
        ),
        None => (Decimal::ZERO, None, None),
    };

    PriceBreakdown {
        subtotal,
        discount_amount,
        discount_percent,
        promotion_name,
        total: subtotal - discount_amount,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::promotion::PromotionType;
    use chrono::{Duration, Utc};
    use proptest::prelude::*;
    use rust_decimal_macros::dec;
    use std::collections::BTreeMap;
    use uuid::Uuid;

    fn line(name: &str, qty: u32, unit: Decimal) -> ValidatedLine {
        ValidatedLine {
            menu_item_id: Uuid::new_v4(),
            name: name.into(),
            quantity: qty,
            unit_price: unit,
            selected_options: BTreeMap::new(),
        }
    }

    fn percent_off(value: Decimal) -> PromotionModel {
        let now = Utc::now();
        PromotionModel {
            id: Uuid::new_v4(),
            name: "Lunch deal".into(),
            description: String::new(),
            promotion_type: PromotionType::PercentDiscount,
            discount_value: value,
            start_time: now - Duration::hours(1),
            end_time: now + Duration::hours(1),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn ten_percent_off_two_cheese_burgers() {
        let promo = percent_off(dec!(10));
        let breakdown = price(&[line("Cheese Burger", 2, dec!(6.95))], Some(&promo));

        assert_eq!(breakdown.subtotal, dec!(13.90));
        assert_eq!(breakdown.discount_amount, dec!(1.39));
        assert_eq!(breakdown.total, dec!(12.51));
        assert_eq!(breakdown.discount_percent, Some(dec!(10)));
        assert_eq!(breakdown.promotion_name.as_deref(), Some("Lunch deal"));
    }

    #[test]
    fn no_promotion_means_no_discount() {
        let breakdown = price(
            &[line("Falafel Wrap", 1, dec!(9.50)), line("Chips", 3, dec!(2.25))],
            None,
        );
        assert_eq!(breakdown.subtotal, dec!(16.25));
        assert_eq!(breakdown.discount_amount, Decimal::ZERO);
        assert_eq!(breakdown.total, breakdown.subtotal);
        assert!(breakdown.discount_percent.is_none());
    }

    #[test]
    fn discount_rounds_half_up() {
        // 12.5% of 0.20 = 0.025 -> 0.03
        let breakdown = price(&[line("Dip", 1, dec!(0.20))], Some(&percent_off(dec!(12.5))));
        assert_eq!(breakdown.discount_amount, dec!(0.03));
        assert_eq!(breakdown.total, dec!(0.17));
    }

    #[test]
    fn minor_units_round_per_amount() {
        assert_eq!(to_minor_units(dec!(6.95)), Some(695));
        assert_eq!(to_minor_units(dec!(0.005)), Some(1));
        assert_eq!(to_minor_units(dec!(10)), Some(1000));
    }

    proptest! {
        #[test]
        fn total_is_subtotal_minus_discount(
            cents in proptest::collection::vec((1u32..20, 0i64..5_000), 1..10),
            pct in proptest::option::of(0u32..=100),
        ) {
            let lines: Vec<ValidatedLine> = cents
                .iter()
                .map(|(qty, c)| line("Item", *qty, Decimal::new(*c, 2)))
                .collect();
            let promo = pct.map(|p| percent_off(Decimal::from(p)));
            let breakdown = price(&lines, promo.as_ref());

            prop_assert_eq!(breakdown.total, breakdown.subtotal - breakdown.discount_amount);
            prop_assert!(breakdown.discount_amount >= Decimal::ZERO);
            prop_assert!(breakdown.discount_amount <= breakdown.subtotal);
            prop_assert_eq!(breakdown.discount_amount, breakdown.discount_amount.round_dp(2));

            let expected: Decimal = cents
                .iter()
                .map(|(qty, c)| Decimal::new(*c, 2) * Decimal::from(*qty))
                .sum();
            prop_assert_eq!(breakdown.subtotal, expected);
        }
    }
}
