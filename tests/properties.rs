//! Algebraic laws checked over generated inputs.

mod common;

use common::*;
use finextract::domain::metrics::value_at_risk;
use finextract::domain::portfolio::Portfolio;
use finextract::domain::returns::ReturnSeries;
use proptest::prelude::*;

fn closes_strategy() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(0.5f64..500.0, 32..120)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn returns_have_one_fewer_element_and_reconstruct(closes in closes_strategy()) {
        let series = PriceSeries::new("P", bars_from_closes("2020-01-01", &closes));
        let returns = ReturnSeries::from_prices(&series).unwrap();
        prop_assert_eq!(returns.len(), closes.len() - 1);

        let rebuilt = returns.reconstruct_prices();
        prop_assert_eq!(rebuilt.len(), closes.len());
        for (a, b) in rebuilt.iter().zip(&closes) {
            prop_assert!((a - b).abs() <= 1e-9 * b.abs());
        }
    }

    #[test]
    fn normalized_weights_sum_to_one(
        wa in 0.0f64..10.0,
        wb in 0.0f64..10.0,
        wc in 0.01f64..10.0,
    ) {
        let a = make_asset("A", &wave_closes(40, 10.0, 0.001, 0.02, 0.0));
        let b = make_asset("B", &wave_closes(40, 20.0, 0.0, 0.03, 1.0));
        let c = make_asset("C", &wave_closes(40, 30.0, 0.002, 0.01, 2.0));
        let p = Portfolio::new(
            &[&a, &b, &c],
            &[("A".to_string(), wa), ("B".to_string(), wb), ("C".to_string(), wc)],
        )
        .unwrap();

        let total: f64 = p.weights().iter().map(|(_, w)| w).sum();
        prop_assert!((total - 1.0).abs() < 1e-12);
        let expected_c = wc / (wa + wb + wc);
        prop_assert!((p.weight("C").unwrap() - expected_c).abs() < 1e-12);
    }

    #[test]
    fn higher_confidence_never_lowers_var(
        returns in prop::collection::vec(-0.2f64..0.2, 30..300),
    ) {
        let var95 = value_at_risk(&returns, 0.95).unwrap();
        let var99 = value_at_risk(&returns, 0.99).unwrap();
        prop_assert!(var99 >= var95);
    }
}
