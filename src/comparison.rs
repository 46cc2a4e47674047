//! Side-by-side comparison of saved contracts.

use std::fmt;

use crate::errors::AppError;
use crate::models::{AnalysisResult, StoredContract};
use crate::normalize::{self, parse_number};

/// A numeric attribute the comparison ranks contracts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    MonthlyPayment,
    TotalLeaseCost,
    DealRating,
}

impl Metric {
    pub const ALL: [Metric; 3] = [
        Metric::MonthlyPayment,
        Metric::TotalLeaseCost,
        Metric::DealRating,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Metric::MonthlyPayment => "monthly payment",
            Metric::TotalLeaseCost => "total lease cost",
            Metric::DealRating => "deal rating",
        }
    }

    /// Value used for ranking; unreadable values count as 0. Deal rating is
    /// read raw, without the display default.
    pub fn value_of(&self, result: &AnalysisResult) -> f64 {
        let field = match self {
            Metric::MonthlyPayment => &normalize::MONTHLY_PAYMENT,
            Metric::TotalLeaseCost => &normalize::TOTAL_LEASE_COST,
            Metric::DealRating => &normalize::DEAL_RATING,
        };
        normalize::lookup(result, field)
            .and_then(parse_number)
            .unwrap_or(0.0)
    }

    fn format(&self, value: f64) -> String {
        match self {
            Metric::DealRating => format!("{:.1}/10", value),
            _ => format!("${:.2}", value),
        }
    }
}

/// One contract's standing on a metric.
#[derive(Debug, Clone, PartialEq)]
pub struct Standing {
    pub index: usize,
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricComparison {
    pub metric: Metric,
    pub lowest: Standing,
    pub highest: Standing,
}

impl MetricComparison {
    /// Extremes among non-zero values, ties going to the earlier contract.
    /// `None` when every contract reads as zero.
    pub fn rank(metric: Metric, contracts: &[StoredContract]) -> Option<Self> {
        let mut lowest: Option<Standing> = None;
        let mut highest: Option<Standing> = None;

        for (index, contract) in contracts.iter().enumerate() {
            let value = metric.value_of(&contract.result);
            if value == 0.0 {
                continue;
            }
            let standing = Standing {
                index,
                name: contract.saved_name.clone(),
                value,
            };
            if lowest.as_ref().map_or(true, |low| value < low.value) {
                lowest = Some(standing.clone());
            }
            if highest.as_ref().map_or(true, |high| value > high.value) {
                highest = Some(standing);
            }
        }

        Some(Self {
            metric,
            lowest: lowest?,
            highest: highest?,
        })
    }
}

impl fmt::Display for MetricComparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Lowest {}: {} ({}), highest: {} ({})",
            self.metric.label(),
            self.lowest.name,
            self.metric.format(self.lowest.value),
            self.highest.name,
            self.metric.format(self.highest.value)
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonReport {
    pub compared: usize,
    pub lines: Vec<MetricComparison>,
}

impl ComparisonReport {
    pub fn line(&self, metric: Metric) -> Option<&MetricComparison> {
        self.lines.iter().find(|line| line.metric == metric)
    }
}

impl fmt::Display for ComparisonReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Compared {} contracts", self.compared)?;
        if self.lines.is_empty() {
            writeln!(f, "No comparable figures found.")?;
        }
        for line in &self.lines {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

/// Ranks two or more contracts on every `Metric`.
pub fn compare(contracts: &[StoredContract]) -> Result<ComparisonReport, AppError> {
    if contracts.len() < 2 {
        return Err(AppError::InvalidInput(format!(
            "select at least two contracts to compare (got {})",
            contracts.len()
        )));
    }

    let lines = Metric::ALL
        .iter()
        .filter_map(|metric| MetricComparison::rank(*metric, contracts))
        .collect();

    Ok(ComparisonReport {
        compared: contracts.len(),
        lines,
    })
}
