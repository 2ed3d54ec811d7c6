use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::domain::Cents;

/// Per-category spending breakdown over a date range. Categories are sorted
/// by total descending so the head of the list is the "top categories" view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryBreakdown {
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub categories: Vec<CategorySummary>,
    pub total: Cents,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorySummary {
    pub category: String,
    pub total: Cents,
    pub count: i64,
    pub average: Cents,
    pub percentage: f64,
}

/// Spending totals for a single calendar period (week or month).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodReport {
    pub period_start: NaiveDate,
    /// Exclusive end of the period
    pub period_end: NaiveDate,
    pub expense_count: i64,
    pub total: Cents,
}

// Helper struct for repository aggregation
#[derive(Debug, Clone)]
pub struct CategoryAggregate {
    pub category: String,
    pub count: i64,
    pub total: Cents,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportPeriod {
    Weekly,
    Monthly,
}

impl ReportPeriod {
    /// Bounds of the period containing `anchor`: [start, end), weeks starting
    /// on Monday, months on the 1st.
    pub fn bounds(&self, anchor: NaiveDate) -> (NaiveDate, NaiveDate) {
        match self {
            ReportPeriod::Weekly => {
                let start = anchor
                    - Days::new(u64::from(anchor.weekday().num_days_from_monday()));
                let end = start + Days::new(7);
                (start, end)
            }
            ReportPeriod::Monthly => {
                let start = anchor.with_day(1).unwrap();
                let end = if anchor.month() == 12 {
                    NaiveDate::from_ymd_opt(anchor.year() + 1, 1, 1).unwrap()
                } else {
                    NaiveDate::from_ymd_opt(anchor.year(), anchor.month() + 1, 1).unwrap()
                };
                (start, end)
            }
        }
    }
}
