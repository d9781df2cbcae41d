//! Collapses the retailer's four price signals into one effective price.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::types::PriceSignals;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceResolution {
    Sellable(Decimal),
    NotSellable,
}

/// Resolves the effective price of a listing entry.
///
/// 1. A visible sale strictly below the original price wins.
/// 2. Otherwise a visible, positive original price is used.
/// 3. Otherwise the item is not sellable.
///
/// The chosen price is rounded to cents, half away from zero, since that is
/// the precision the catalog stores. A price that rounds to zero or less
/// never yields a sellable result.
#[must_use]
pub fn resolve_price(signals: &PriceSignals) -> PriceResolution {
    let PriceSignals {
        original_price,
        sale_price,
        can_show_original_price,
        can_show_sale_price,
    } = *signals;

    if original_price > sale_price && can_show_sale_price {
        return sellable_in_cents(sale_price);
    }

    if can_show_original_price {
        return sellable_in_cents(original_price);
    }

    PriceResolution::NotSellable
}

fn sellable_in_cents(price: Decimal) -> PriceResolution {
    let cents = price.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    if cents > Decimal::ZERO {
        PriceResolution::Sellable(cents)
    } else {
        PriceResolution::NotSellable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signals(original: i64, sale: i64, show_original: bool, show_sale: bool) -> PriceSignals {
        PriceSignals {
            original_price: Decimal::new(original, 2),
            sale_price: Decimal::new(sale, 2),
            can_show_original_price: show_original,
            can_show_sale_price: show_sale,
        }
    }

    #[test]
    fn visible_sale_below_original_wins() {
        assert_eq!(
            resolve_price(&signals(500, 400, true, true)),
            PriceResolution::Sellable(Decimal::new(400, 2))
        );
    }

    #[test]
    fn hidden_sale_falls_back_to_original() {
        assert_eq!(
            resolve_price(&signals(500, 400, true, false)),
            PriceResolution::Sellable(Decimal::new(500, 2))
        );
    }

    #[test]
    fn nothing_visible_is_not_sellable() {
        assert_eq!(
            resolve_price(&signals(500, 0, false, false)),
            PriceResolution::NotSellable
        );
    }

    #[test]
    fn sale_equal_to_original_uses_original() {
        assert_eq!(
            resolve_price(&signals(500, 500, true, true)),
            PriceResolution::Sellable(Decimal::new(500, 2))
        );
    }

    #[test]
    fn sale_above_original_is_ignored() {
        assert_eq!(
            resolve_price(&signals(1000, 1200, true, true)),
            PriceResolution::Sellable(Decimal::new(1000, 2))
        );
    }

    #[test]
    fn zero_sale_price_is_not_sellable() {
        assert_eq!(
            resolve_price(&signals(500, 0, true, true)),
            PriceResolution::NotSellable
        );
    }

    #[test]
    fn zero_original_with_no_sale_is_not_sellable() {
        assert_eq!(
            resolve_price(&signals(0, 0, true, false)),
            PriceResolution::NotSellable
        );
    }

    #[test]
    fn sub_cent_price_is_not_sellable() {
        let fraction = PriceSignals {
            original_price: Decimal::new(4, 3),
            can_show_original_price: true,
            ..PriceSignals::default()
        };
        assert_eq!(resolve_price(&fraction), PriceResolution::NotSellable);
    }

    #[test]
    fn sub_cent_sale_is_not_sellable() {
        let fraction = PriceSignals {
            original_price: Decimal::new(500, 2),
            sale_price: Decimal::new(3, 3),
            can_show_original_price: true,
            can_show_sale_price: true,
        };
        assert_eq!(resolve_price(&fraction), PriceResolution::NotSellable);
    }

    #[test]
    fn price_is_rounded_half_away_from_zero_to_cents() {
        let half_cent = PriceSignals {
            original_price: Decimal::new(1235, 3),
            can_show_original_price: true,
            ..PriceSignals::default()
        };
        assert_eq!(
            resolve_price(&half_cent),
            PriceResolution::Sellable(Decimal::new(124, 2))
        );

        let just_above = PriceSignals {
            original_price: Decimal::new(5, 3),
            can_show_original_price: true,
            ..PriceSignals::default()
        };
        assert_eq!(
            resolve_price(&just_above),
            PriceResolution::Sellable(Decimal::new(1, 2))
        );
    }

    #[test]
    fn missing_bundle_is_not_sellable() {
        assert_eq!(
            resolve_price(&PriceSignals::default()),
            PriceResolution::NotSellable
        );
    }
}
