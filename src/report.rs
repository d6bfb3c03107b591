// 📈 Dashboard Summary - what the presentation layers show
//
// Scalars (total, counts, covered period) plus the three series, already
// sorted the way they are displayed.

use crate::config::ColumnNames;
use crate::error::{PipelineError, Result};
use crate::kpi::KpiBundle;
use crate::table::Table;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// ============================================================================
// SERIES ENTRIES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchStat {
    pub branch: String,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SellerStat {
    pub branch: String,
    pub salesperson: String,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthStat {
    pub month: u32,
    pub month_name: String,
    pub amount: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// "01/01/2024 - 31/03/2024"
    pub fn display(&self) -> String {
        format!(
            "{} - {}",
            self.start.format("%d/%m/%Y"),
            self.end.format("%d/%m/%Y")
        )
    }
}

// ============================================================================
// SUMMARY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub total_amount: f64,
    pub row_count: usize,
    /// Distinct salespeople across all branches
    pub seller_count: usize,
    /// None when the date column exists but every cell is empty
    pub date_range: Option<DateRange>,
    /// Largest branch first
    pub by_branch: Vec<BranchStat>,
    /// Best seller first
    pub by_seller: Vec<SellerStat>,
    /// Calendar order
    pub by_month: Vec<MonthStat>,
}

impl DashboardSummary {
    /// Fails with `MissingColumn` when the salesperson or date column is
    /// absent: the period and the monthly series both need dates.
    pub fn build(table: &Table, kpis: &KpiBundle, columns: &ColumnNames) -> Result<Self> {
        let sellers = table
            .column(&columns.salesperson)
            .ok_or_else(|| PipelineError::missing_column(&columns.salesperson))?;
        let seller_count = sellers
            .filter_map(|v| v.key())
            .collect::<HashSet<_>>()
            .len();

        let mut dates = table
            .column(&columns.date)
            .ok_or_else(|| PipelineError::missing_column(&columns.date))?
            .filter_map(|v| v.as_date());
        let date_range = dates.next().map(|first| {
            let (start, end) = dates.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d)));
            DateRange { start, end }
        });

        let mut by_branch: Vec<BranchStat> = kpis
            .par_agence
            .iter()
            .map(|(branch, amount)| BranchStat {
                branch: branch.clone(),
                amount: *amount,
            })
            .collect();
        by_branch.sort_by(|a, b| {
            b.amount
                .total_cmp(&a.amount)
                .then_with(|| a.branch.cmp(&b.branch))
        });

        let mut by_seller: Vec<SellerStat> = kpis
            .par_vendeur
            .iter()
            .map(|(key, amount)| SellerStat {
                branch: key.branch.clone(),
                salesperson: key.salesperson.clone(),
                amount: *amount,
            })
            .collect();
        by_seller.sort_by(|a, b| {
            b.amount
                .total_cmp(&a.amount)
                .then_with(|| a.branch.cmp(&b.branch))
                .then_with(|| a.salesperson.cmp(&b.salesperson))
        });

        let by_month = kpis
            .par_mois()?
            .iter()
            .map(|(key, amount)| MonthStat {
                month: key.month,
                month_name: key.name.clone(),
                amount: *amount,
            })
            .collect();

        Ok(DashboardSummary {
            total_amount: kpis.total_global,
            row_count: table.len(),
            seller_count,
            date_range,
            by_branch,
            by_seller,
            by_month,
        })
    }

    /// Plain-text rendering for the `report` command
    pub fn render_text(&self, currency: &str) -> String {
        let mut out = String::new();

        out.push_str("KPI\n");
        out.push_str(&format!(
            "  Total sales:    {}\n",
            format_amount(self.total_amount, currency)
        ));
        out.push_str(&format!("  Sales count:    {}\n", self.row_count));
        out.push_str(&format!("  Salespeople:    {}\n", self.seller_count));
        out.push_str(&format!(
            "  Period:         {}\n",
            self.date_range
                .map(|r| r.display())
                .unwrap_or_else(|| "n/a".to_string())
        ));

        out.push_str("\nBy branch\n");
        for stat in &self.by_branch {
            out.push_str(&format!(
                "  {:<20} {:>20}\n",
                stat.branch,
                format_amount(stat.amount, currency)
            ));
        }

        out.push_str("\nBy month\n");
        for stat in &self.by_month {
            out.push_str(&format!(
                "  {:<20} {:>20}\n",
                stat.month_name,
                format_amount(stat.amount, currency)
            ));
        }

        out.push_str("\nBy salesperson\n");
        for stat in &self.by_seller {
            out.push_str(&format!(
                "  {:<20} {:<20} {:>20}\n",
                stat.branch,
                stat.salesperson,
                format_amount(stat.amount, currency)
            ));
        }

        out
    }
}

// ============================================================================
// FORMATTING
// ============================================================================

/// Whole-unit amount with thousands separators: `1,234,567 FCFA`
pub fn format_amount(amount: f64, currency: &str) -> String {
    let rounded = format!("{:.0}", amount.abs());
    let mut grouped = String::with_capacity(rounded.len() + rounded.len() / 3);

    for (i, ch) in rounded.chars().enumerate() {
        if i > 0 && (rounded.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if amount < 0.0 && rounded != "0" { "-" } else { "" };
    if currency.is_empty() {
        format!("{}{}", sign, grouped)
    } else {
        format!("{}{} {}", sign, grouped, currency)
    }
}
