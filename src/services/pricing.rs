//! Расчёт цен. Чистые функции, все суммы округляются до 2 знаков.

use std::collections::HashMap;

use crate::models::ZonePrice;

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Цена места: базовая цена зоны, умноженная на множитель события.
pub fn calc_price(base_price: f64, multiplier: f64) -> f64 {
    round2(base_price * multiplier)
}

/// Зона -> итоговая цена места.
pub fn price_map(prices: &[ZonePrice]) -> HashMap<String, f64> {
    prices
        .iter()
        .map(|p| (p.zone_code.clone(), calc_price(p.base_price, p.multiplier)))
        .collect()
}

pub fn subtotal(unit_prices: impl IntoIterator<Item = f64>) -> f64 {
    round2(unit_prices.into_iter().sum())
}

/// Скидка в процентах от суммы, с тем же округлением до 2 знаков.
pub fn discount(subtotal: f64, discount_pct: f64) -> f64 {
    round2(subtotal * discount_pct / 100.0)
}

pub fn total(subtotal: f64, discount: f64) -> f64 {
    round2((subtotal - discount).max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn applies_multiplier() {
        assert_eq!(calc_price(100.0, 1.1), 110.00);
        assert_eq!(calc_price(250.0, 1.0), 250.00);
    }

    #[test]
    fn rounds_to_cents() {
        assert_eq!(calc_price(33.333, 1.0), 33.33);
        assert_eq!(calc_price(10.005, 1.0), 10.01);
    }

    #[test]
    fn ten_percent_off_three_hundred() {
        let d = discount(300.0, 10.0);
        assert_eq!(d, 30.00);
        assert_eq!(total(300.0, d), 270.00);
    }

    #[test]
    fn total_never_goes_negative() {
        assert_eq!(total(50.0, 80.0), 0.0);
    }

    #[test]
    fn price_map_keeps_every_zone() {
        let prices = vec![
            ZonePrice { zone_code: "VIP".into(), base_price: 200.0, multiplier: 1.5 },
            ZonePrice { zone_code: "A".into(), base_price: 80.0, multiplier: 1.0 },
        ];
        let map = price_map(&prices);
        assert_eq!(map["VIP"], 300.0);
        assert_eq!(map["A"], 80.0);
        assert!(!map.contains_key("B"));
    }

    #[test]
    fn subtotal_hides_float_noise() {
        assert_eq!(subtotal([0.1, 0.2]), 0.3);
    }

    proptest! {
        #[test]
        fn calc_price_is_deterministic_and_cent_aligned(base in 0.0f64..10_000.0, mult in 0.1f64..5.0) {
            let a = calc_price(base, mult);
            prop_assert_eq!(a, calc_price(base, mult));
            prop_assert!(((a * 100.0).round() - a * 100.0).abs() < 1e-6);
        }

        #[test]
        fn discount_stays_within_subtotal(sub in 0.0f64..100_000.0, pct in 0.0f64..=100.0) {
            let d = discount(sub, pct);
            prop_assert!(d >= 0.0);
            prop_assert!(d <= round2(sub) + 0.01);
            let t = total(sub, d);
            prop_assert!(t >= 0.0);
        }
    }
}
