//! Tolerant reads over backend payloads.
//!
//! The backend has shipped the same logical field under several spellings
//! over time. Each logical field is an ordered list of candidate keys; a
//! lookup walks a fixed list of scopes (the root, then the nested analysis
//! objects) and returns the first candidate that is present and not null.
//!
//! Defaults such as the neutral 5.0 rating are applied here, at read time,
//! and never written back into the `AnalysisResult`.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::models::AnalysisResult;

/// A logical field and its known spellings, highest precedence first.
#[derive(Debug, Clone, Copy)]
pub struct FieldVariants {
    pub name: &'static str,
    pub keys: &'static [&'static str],
}

pub const DEAL_RATING: FieldVariants = FieldVariants {
    name: "deal rating",
    keys: &["deal_rating", "DealRating", "dealRating", "fairness_score"],
};

/// The bare `summary` key comes last: on upload responses it is an object
/// describing the upload, so summary reads only accept strings.
pub const FAIRNESS_SUMMARY: FieldVariants = FieldVariants {
    name: "fairness summary",
    keys: &[
        "fairness_summary",
        "FairnessSummary",
        "fairnessSummary",
        "final_summary",
        "summary",
    ],
};

pub const RED_FLAGS: FieldVariants = FieldVariants {
    name: "red flags",
    keys: &["red_flags", "RedFlags", "redFlags", "risks"],
};

pub const GREEN_FLAGS: FieldVariants = FieldVariants {
    name: "green flags",
    keys: &["green_flags", "GreenFlags", "greenFlags", "benefits"],
};

pub const MONTHLY_PAYMENT: FieldVariants = FieldVariants {
    name: "monthly payment",
    keys: &["monthly_payment", "MonthlyPayment", "monthlyPayment", "monthly"],
};

pub const TOTAL_LEASE_COST: FieldVariants = FieldVariants {
    name: "total lease cost",
    keys: &["total_lease_cost", "TotalLeaseCost", "totalLeaseCost", "total_cost"],
};

pub const NEGOTIABLE_ITEMS: FieldVariants = FieldVariants {
    name: "negotiable items",
    keys: &["negotiable_items", "NegotiableItems", "negotiableItems"],
};

/// Objects searched, in order, for every logical field.
const SCOPES: &[&[&str]] = &[
    &[],
    &["fairness_analysis"],
    &["negotiation_advice"],
    &["full_extraction"],
    &["full_extraction", "fairness_analysis"],
    &["full_extraction", "negotiation_advice"],
];

/// Rating shown when the backend did not provide a usable one.
pub const NEUTRAL_RATING: f64 = 5.0;
pub const MAX_RATING: f64 = 10.0;

const NO_SUMMARY: &str = "No fairness summary available yet.";

/// First present, non-null candidate within a single object.
pub fn lookup_in<'a>(map: &'a Map<String, Value>, field: &FieldVariants) -> Option<&'a Value> {
    field
        .keys
        .iter()
        .filter_map(|key| map.get(*key))
        .find(|value| !value.is_null())
}

/// First present, non-null candidate across all scopes.
pub fn lookup<'a>(result: &'a AnalysisResult, field: &FieldVariants) -> Option<&'a Value> {
    lookup_by(result, field, Some)
}

/// Like `lookup`, but only accepts candidates that `accept` can convert.
pub fn lookup_by<'a, T>(
    result: &'a AnalysisResult,
    field: &FieldVariants,
    accept: impl Fn(&'a Value) -> Option<T>,
) -> Option<T> {
    SCOPES
        .iter()
        .filter_map(|path| scope(result.as_map(), path))
        .flat_map(|map| field.keys.iter().filter_map(move |key| map.get(*key)))
        .filter(|value| !value.is_null())
        .find_map(accept)
}

fn scope<'a>(root: &'a Map<String, Value>, path: &[&str]) -> Option<&'a Map<String, Value>> {
    path.iter()
        .try_fold(root, |map, key| map.get(*key).and_then(Value::as_object))
}

fn number_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"-?\d[\d,]*(?:\.\d+)?").unwrap())
}

/// Reads a number out of a JSON value.
///
/// Accepts JSON numbers and strings such as `"7"`, `"$1,249.99"` or
/// `"Score 8/10"` (first number wins). Everything else is `None`.
pub fn parse_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => number_pattern()
            .find(s)
            .and_then(|m| m.as_str().replace(',', "").parse::<f64>().ok()),
        _ => None,
    }
    .filter(|n| n.is_finite())
}

/// Deal rating as reported, without any default.
pub fn deal_rating_raw(result: &AnalysisResult) -> Option<f64> {
    lookup(result, &DEAL_RATING).and_then(parse_number)
}

/// Deal rating for display: clamped to 0..=10, neutral 5.0 when unknown.
pub fn deal_rating(result: &AnalysisResult) -> f64 {
    deal_rating_raw(result)
        .map(|rating| rating.clamp(0.0, MAX_RATING))
        .unwrap_or(NEUTRAL_RATING)
}

pub fn fairness_summary(result: &AnalysisResult) -> String {
    lookup_by(result, &FAIRNESS_SUMMARY, Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(NO_SUMMARY)
        .to_string()
}

pub fn red_flags(result: &AnalysisResult) -> Vec<String> {
    flag_list(lookup(result, &RED_FLAGS))
}

pub fn green_flags(result: &AnalysisResult) -> Vec<String> {
    flag_list(lookup(result, &GREEN_FLAGS))
}

pub fn monthly_payment(result: &AnalysisResult) -> Option<f64> {
    lookup(result, &MONTHLY_PAYMENT).and_then(parse_number)
}

pub fn total_lease_cost(result: &AnalysisResult) -> Option<f64> {
    lookup(result, &TOTAL_LEASE_COST).and_then(parse_number)
}

fn flag_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(flag_text).collect(),
        Some(other) => flag_text(other).into_iter().collect(),
        None => Vec::new(),
    }
}

/// Renders a flag that may be a plain string or an object such as
/// `{"issue": ..., "severity": ..., "why": ...}`.
pub fn flag_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Object(map) => {
            let headline = first_str(map, &["issue", "benefit", "clause", "description", "item", "title"])?;
            let detail = first_str(map, &["why", "value", "detail"]);
            let severity = first_str(map, &["severity"]);

            let mut text = headline.to_string();
            if let Some(detail) = detail.filter(|d| *d != headline) {
                text.push_str(": ");
                text.push_str(detail);
            }
            if let Some(severity) = severity {
                text.push_str(&format!(" ({})", severity.to_lowercase()));
            }
            Some(text)
        }
        Value::Null | Value::String(_) => None,
        other => Some(other.to_string()),
    }
}

fn first_str<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|key| map.get(*key).and_then(Value::as_str))
        .find(|s| !s.trim().is_empty())
}

/// A negotiable term and how to push back on it.
#[derive(Debug, Clone, PartialEq)]
pub struct NegotiableItem {
    pub item: String,
    pub tip: Option<String>,
}

pub fn negotiable_items(result: &AnalysisResult) -> Vec<NegotiableItem> {
    let Some(Value::Array(items)) = lookup(result, &NEGOTIABLE_ITEMS) else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|entry| match entry {
            Value::String(s) => Some(NegotiableItem {
                item: s.clone(),
                tip: None,
            }),
            Value::Object(map) => Some(NegotiableItem {
                item: first_str(map, &["item", "name", "title"])?.to_string(),
                tip: first_str(map, &["negotiation_strategy", "negotiation_tips", "tips", "example_phrase"])
                    .map(str::to_string),
            }),
            _ => None,
        })
        .collect()
}

/// Display-ready view of an analysis. All defaults live here.
#[derive(Debug, Clone, PartialEq)]
pub struct LeaseSummary {
    pub rating: f64,
    pub rating_known: bool,
    pub summary: String,
    pub monthly_payment: Option<f64>,
    pub total_lease_cost: Option<f64>,
    pub vehicle: Option<String>,
    pub red_flags: Vec<String>,
    pub green_flags: Vec<String>,
    pub negotiable_items: Vec<NegotiableItem>,
}

impl LeaseSummary {
    pub fn from_result(result: &AnalysisResult) -> Self {
        Self {
            rating: deal_rating(result),
            rating_known: deal_rating_raw(result).is_some(),
            summary: fairness_summary(result),
            monthly_payment: monthly_payment(result),
            total_lease_cost: total_lease_cost(result),
            vehicle: vehicle_label(result),
            red_flags: red_flags(result),
            green_flags: green_flags(result),
            negotiable_items: negotiable_items(result),
        }
    }
}

fn vehicle_label(result: &AnalysisResult) -> Option<String> {
    let extraction = result.get("full_extraction").and_then(Value::as_object);
    let vehicle = result.get("vehicle_info").and_then(Value::as_object);

    let part = |key: &str| {
        [extraction, vehicle]
            .into_iter()
            .flatten()
            .find_map(|map| match map.get(key) {
                Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
                Some(Value::Number(n)) => Some(n.to_string()),
                _ => None,
            })
    };

    let parts: Vec<String> = ["year", "make", "model"].into_iter().filter_map(part).collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

impl fmt::Display for LeaseSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(vehicle) = &self.vehicle {
            writeln!(f, "Vehicle:          {}", vehicle)?;
        }
        if self.rating_known {
            writeln!(f, "Deal rating:      {:.1} / 10", self.rating)?;
        } else {
            writeln!(f, "Deal rating:      {:.1} / 10 (not rated yet)", self.rating)?;
        }
        if let Some(monthly) = self.monthly_payment {
            writeln!(f, "Monthly payment:  ${:.2}", monthly)?;
        }
        if let Some(total) = self.total_lease_cost {
            writeln!(f, "Total lease cost: ${:.2}", total)?;
        }
        writeln!(f, "Summary:          {}", self.summary)?;

        if !self.red_flags.is_empty() {
            writeln!(f, "Red flags:")?;
            for flag in &self.red_flags {
                writeln!(f, "  - {}", flag)?;
            }
        }
        if !self.green_flags.is_empty() {
            writeln!(f, "Green flags:")?;
            for flag in &self.green_flags {
                writeln!(f, "  + {}", flag)?;
            }
        }
        if !self.negotiable_items.is_empty() {
            writeln!(f, "Negotiable:")?;
            for item in &self.negotiable_items {
                match &item.tip {
                    Some(tip) => writeln!(f, "  * {}: {}", item.item, tip)?,
                    None => writeln!(f, "  * {}", item.item)?,
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn result(value: Value) -> AnalysisResult {
        AnalysisResult::from_value(value).unwrap()
    }

    #[test]
    fn test_parse_number_variants() {
        assert_eq!(parse_number(&json!(7)), Some(7.0));
        assert_eq!(parse_number(&json!("7")), Some(7.0));
        assert_eq!(parse_number(&json!("$1,249.99")), Some(1249.99));
        assert_eq!(parse_number(&json!("Score 8/10")), Some(8.0));
        assert_eq!(parse_number(&json!("unknown")), None);
        assert_eq!(parse_number(&json!(true)), None);
        assert_eq!(parse_number(&Value::Null), None);
    }

    #[test]
    fn test_rating_found_in_nested_fairness_analysis() {
        let r = result(json!({"fairness_analysis": {"fairness_score": 6}}));
        assert_eq!(deal_rating(&r), 6.0);
    }

    #[test]
    fn test_root_scope_beats_nested_scope() {
        let r = result(json!({
            "dealRating": 9,
            "fairness_analysis": {"deal_rating": 2}
        }));
        assert_eq!(deal_rating(&r), 9.0);
    }

    #[test]
    fn test_null_candidate_is_skipped() {
        let r = result(json!({"deal_rating": null, "DealRating": "4"}));
        assert_eq!(deal_rating(&r), 4.0);
    }

    #[test]
    fn test_rating_is_clamped_for_display() {
        assert_eq!(deal_rating(&result(json!({"deal_rating": 42}))), 10.0);
        assert_eq!(deal_rating(&result(json!({"deal_rating": -3}))), 0.0);
    }

    #[test]
    fn test_summary_ignores_upload_summary_object() {
        let r = result(json!({
            "summary": {"file": "lease.pdf", "text_length": 1200},
            "fairness_analysis": {"summary": "Fairness score 6 based on fees."}
        }));
        assert_eq!(fairness_summary(&r), "Fairness score 6 based on fees.");
    }

    #[test]
    fn test_summary_default_when_absent() {
        assert_eq!(fairness_summary(&AnalysisResult::new()), NO_SUMMARY);
    }

    #[test]
    fn test_flag_objects_rendered() {
        let r = result(json!({
            "fairness_analysis": {
                "red_flags": [
                    {"clause": "Early termination", "issue": "Penalty of $3,000", "severity": "High"},
                    "Excess mileage at $0.30/mile",
                    null
                ],
                "green_flags": [{"benefit": "Gap insurance", "value": "Included"}]
            }
        }));

        assert_eq!(
            red_flags(&r),
            vec![
                "Penalty of $3,000 (high)".to_string(),
                "Excess mileage at $0.30/mile".to_string()
            ]
        );
        assert_eq!(green_flags(&r), vec!["Gap insurance: Included".to_string()]);
    }

    #[test]
    fn test_negotiable_items_from_nested_advice() {
        let r = result(json!({
            "negotiation_advice": {
                "negotiable_items": [
                    {"item": "Acquisition fee", "negotiation_strategy": "Ask to waive it"},
                    {"description": "missing item name"},
                    "Mileage allowance"
                ]
            }
        }));

        assert_eq!(
            negotiable_items(&r),
            vec![
                NegotiableItem {
                    item: "Acquisition fee".into(),
                    tip: Some("Ask to waive it".into())
                },
                NegotiableItem {
                    item: "Mileage allowance".into(),
                    tip: None
                },
            ]
        );
    }

    #[test]
    fn test_summary_does_not_mutate_result() {
        let r = result(json!({"full_extraction": {"make": "Honda", "model": "Civic", "year": 2023}}));
        let before = r.clone();

        let summary = LeaseSummary::from_result(&r);

        assert_eq!(r, before);
        assert_eq!(summary.rating, NEUTRAL_RATING);
        assert!(!summary.rating_known);
        assert_eq!(summary.vehicle.as_deref(), Some("2023 Honda Civic"));
    }
}
