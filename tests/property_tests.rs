/// Property-based tests using proptest
/// Tests invariants of result merging, variant-key lookup and comparison
use carlease_client::comparison::{compare, Metric};
use carlease_client::models::{AnalysisResult, StoredContract};
use carlease_client::normalize::{self, parse_number};
use proptest::prelude::*;
use serde_json::{json, Map, Value};

fn json_leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i32>().prop_map(|n| json!(n)),
        "[a-z ]{0,12}".prop_map(Value::String),
    ]
}

fn json_object() -> impl Strategy<Value = Map<String, Value>> {
    prop::collection::btree_map("[a-z_]{1,8}", json_leaf(), 0..8)
        .prop_map(|entries| entries.into_iter().collect())
}

// Property: merge overwrites exactly the update's keys and keeps the rest
proptest! {
    #[test]
    fn merge_overwrites_update_keys_and_preserves_others(
        partial in json_object(),
        update in json_object()
    ) {
        let mut merged = AnalysisResult::from(partial.clone());
        merged.merge(&update);

        for (key, value) in &update {
            prop_assert_eq!(merged.get(key), Some(value));
        }
        for (key, value) in &partial {
            if !update.contains_key(key) {
                prop_assert_eq!(merged.get(key), Some(value));
            }
        }
        prop_assert!(merged.as_map().keys().all(|k| partial.contains_key(k) || update.contains_key(k)));
    }

    #[test]
    fn merge_with_empty_update_is_identity(partial in json_object()) {
        let mut merged = AnalysisResult::from(partial.clone());
        merged.merge(&Map::new());
        prop_assert_eq!(merged, AnalysisResult::from(partial));
    }
}

// Property: variant lookup honors key precedence and never panics
proptest! {
    #[test]
    fn pascal_case_only_rating_is_used(rating in 0u8..=10) {
        let result = AnalysisResult::from_value(json!({"DealRating": rating})).unwrap();
        prop_assert_eq!(normalize::deal_rating(&result), f64::from(rating));
    }

    #[test]
    fn snake_case_beats_camel_case(snake in 0u8..=10, camel in 0u8..=10) {
        let result = AnalysisResult::from_value(json!({
            "dealRating": camel,
            "deal_rating": snake
        })).unwrap();
        prop_assert_eq!(normalize::deal_rating(&result), f64::from(snake));
    }

    #[test]
    fn displayed_rating_stays_in_range(payload in json_object()) {
        let result = AnalysisResult::from(payload);
        let rating = normalize::deal_rating(&result);
        prop_assert!((0.0..=10.0).contains(&rating));
    }

    #[test]
    fn parse_number_never_panics(text in "\\PC*") {
        let _ = parse_number(&Value::String(text));
    }

    #[test]
    fn currency_strings_parse(dollars in 1u32..100_000, cents in 0u32..100) {
        let text = format!("${}.{:02}", dollars, cents);
        let parsed = parse_number(&Value::String(text)).unwrap();
        prop_assert!((parsed - (f64::from(dollars) + f64::from(cents) / 100.0)).abs() < 1e-6);
    }
}

// Property: comparison never picks a zero and returns true extremes
proptest! {
    #[test]
    fn comparison_extremes_ignore_zero(payments in prop::collection::vec(0u32..3_000, 2..8)) {
        let contracts: Vec<StoredContract> = payments
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let result = AnalysisResult::from_value(json!({"monthly_payment": p})).unwrap();
                StoredContract::new(result, format!("lease-{}", i))
            })
            .collect();

        let report = compare(&contracts).unwrap();
        let non_zero: Vec<u32> = payments.iter().copied().filter(|p| *p != 0).collect();

        match report.line(Metric::MonthlyPayment) {
            None => prop_assert!(non_zero.is_empty()),
            Some(line) => {
                let min = non_zero.iter().min().copied().unwrap();
                let max = non_zero.iter().max().copied().unwrap();
                prop_assert_eq!(line.lowest.value, f64::from(min));
                prop_assert_eq!(line.highest.value, f64::from(max));
                // first occurrence wins ties
                let first_min = payments.iter().position(|p| *p == min).unwrap();
                prop_assert_eq!(line.lowest.index, first_min);
            }
        }
    }
}

#[test]
fn comparison_lowest_monthly_skips_zero() {
    let contracts: Vec<StoredContract> = [0, 1200, 900]
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let result = AnalysisResult::from_value(json!({"monthly_payment": p})).unwrap();
            StoredContract::new(result, ["zero", "pricey", "cheap"][i])
        })
        .collect();

    let report = compare(&contracts).unwrap();
    let line = report.line(Metric::MonthlyPayment).unwrap();

    assert_eq!(line.lowest.name, "cheap");
    assert_eq!(line.highest.name, "pricey");
}
