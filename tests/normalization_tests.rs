/// Tests for reading backend payloads
/// Covers variant keys, nested scopes and display defaults on realistic responses
use carlease_client::comparison::{compare, Metric};
use carlease_client::contracts::ContractShelf;
use carlease_client::models::AnalysisResult;
use carlease_client::normalize::{self, LeaseSummary, NEUTRAL_RATING};
use serde_json::{json, Value};

fn result(value: Value) -> AnalysisResult {
    AnalysisResult::from_value(value).unwrap()
}

/// Upload response followed by a finished job, as the backend sends them.
fn finished_analysis() -> AnalysisResult {
    let mut analysis = result(json!({
        "status": "pending",
        "job_id": "4f1c",
        "lease_id": 12,
        "extracted_text": "LEASE AGREEMENT ...",
        "lease_datapoints": {"fee_details": "Acquisition fee $895"},
        "vehicle_info": {"vin": "1HGCM82633A004352"},
        "full_extraction": {"monthly_payment": "$389.00", "make": "Honda", "model": "Accord", "year": 2023},
        "summary": {"file": "accord.pdf", "text_length": 20450}
    }));
    let done = json!({
        "fairness_analysis": {
            "fairness_score": 6,
            "red_flags": [
                {"clause": "High late fee", "issue": "Late fee 250 is >50% of monthly payment", "severity": "high"}
            ],
            "green_flags": [],
            "summary": "Deal is acceptable but fees are high."
        },
        "negotiation_advice": {
            "negotiable_items": [
                {"item": "Acquisition fee", "negotiation_strategy": "Ask the dealer to waive it"}
            ]
        },
        "full_extraction": {
            "monthly_payment": "$389.00",
            "total_lease_cost": "14,004",
            "make": "Honda",
            "model": "Accord",
            "year": 2023
        }
    });
    analysis.merge(done.as_object().unwrap());
    analysis
}

#[cfg(test)]
mod variant_key_tests {
    use super::*;

    #[test]
    fn test_pascal_case_only() {
        let r = result(json!({"FairnessSummary": "Good", "RedFlags": ["a"], "MonthlyPayment": 300}));
        assert_eq!(normalize::fairness_summary(&r), "Good");
        assert_eq!(normalize::red_flags(&r), vec!["a".to_string()]);
        assert_eq!(normalize::monthly_payment(&r), Some(300.0));
    }

    #[test]
    fn test_snake_case_preferred_over_camel_case() {
        let r = result(json!({"greenFlags": ["camel"], "green_flags": ["snake"]}));
        assert_eq!(normalize::green_flags(&r), vec!["snake".to_string()]);
    }

    #[test]
    fn test_llm_template_keys() {
        let r = result(json!({"deal_rating": "7", "final_summary": "Fair deal overall."}));
        assert_eq!(normalize::deal_rating(&r), 7.0);
        assert_eq!(normalize::fairness_summary(&r), "Fair deal overall.");
    }

    #[test]
    fn test_missing_rating_defaults_without_mutation() {
        let r = result(json!({"full_extraction": {}}));
        let before = r.clone();

        assert_eq!(normalize::deal_rating(&r), NEUTRAL_RATING);
        assert_eq!(normalize::deal_rating_raw(&r), None);
        assert_eq!(r, before);
    }

    #[test]
    fn test_unparseable_rating_falls_back() {
        let r = result(json!({"deal_rating": "n/a"}));
        assert_eq!(normalize::deal_rating(&r), NEUTRAL_RATING);
    }
}

#[cfg(test)]
mod finished_analysis_tests {
    use super::*;

    #[test]
    fn test_summary_of_merged_result() {
        let summary = LeaseSummary::from_result(&finished_analysis());

        assert_eq!(summary.rating, 6.0);
        assert!(summary.rating_known);
        assert_eq!(summary.summary, "Deal is acceptable but fees are high.");
        assert_eq!(summary.monthly_payment, Some(389.0));
        assert_eq!(summary.total_lease_cost, Some(14004.0));
        assert_eq!(summary.vehicle.as_deref(), Some("2023 Honda Accord"));
        assert_eq!(
            summary.red_flags,
            vec!["Late fee 250 is >50% of monthly payment (high)".to_string()]
        );
        assert!(summary.green_flags.is_empty());
        assert_eq!(summary.negotiable_items.len(), 1);
    }

    #[test]
    fn test_summary_display() {
        let rendered = LeaseSummary::from_result(&finished_analysis()).to_string();

        assert!(rendered.contains("Deal rating:      6.0 / 10"));
        assert!(rendered.contains("Monthly payment:  $389.00"));
        assert!(rendered.contains("* Acquisition fee: Ask the dealer to waive it"));
    }

    #[test]
    fn test_partial_result_renders_placeholders() {
        let partial = result(json!({
            "status": "pending",
            "job_id": "4f1c",
            "summary": {"file": "accord.pdf"}
        }));
        let rendered = LeaseSummary::from_result(&partial).to_string();

        assert!(rendered.contains("(not rated yet)"));
        assert!(rendered.contains("No fairness summary available yet."));
    }
}

#[cfg(test)]
mod shelf_and_comparison_tests {
    use super::*;

    #[test]
    fn test_compare_saved_and_imported_contracts() {
        let mut shelf = ContractShelf::new();
        shelf.save(finished_analysis(), "Accord");
        shelf.import_remote(vec![result(json!({
            "file_name": "civic.pdf",
            "full_extraction": {"monthly_payment": 329, "total_lease_cost": 0},
            "fairness_analysis": {"fairness_score": 8}
        }))]);

        let report = compare(shelf.as_slice()).unwrap();

        let monthly = report.line(Metric::MonthlyPayment).unwrap();
        assert_eq!(monthly.lowest.name, "civic.pdf");
        assert_eq!(monthly.highest.name, "Accord");

        let total = report.line(Metric::TotalLeaseCost).unwrap();
        assert_eq!(total.lowest.name, "Accord");
        assert_eq!(total.highest.name, "Accord");

        let rating = report.line(Metric::DealRating).unwrap();
        assert_eq!(rating.highest.name, "civic.pdf");
        assert_eq!(rating.lowest.value, 6.0);
    }
}
