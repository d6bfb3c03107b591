// 📊 KPI Aggregation - grand total and group-by-sum rollups
//
// Four independent rollups over the global table:
//   total_global  - sum of amounts
//   par_agence    - by branch
//   par_vendeur   - by (branch, salesperson)
//   par_mois      - by (month, month name), only when dates existed
//
// Missing amounts count as zero. Amounts that are present but not numeric
// are rejected rather than guessed at.
//
// Group keys compare by their displayed text: a salesperson cell holding
// the number 7 and one holding the text "7" form a single group, since
// the dashboard could not tell two such groups apart.

use crate::config::ColumnNames;
use crate::error::{PipelineError, Result};
use crate::table::{Row, Table, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

// ============================================================================
// GROUP KEYS
// ============================================================================

/// Branch and salesperson in display form (see module notes)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SellerKey {
    pub branch: String,
    pub salesperson: String,
}

impl SellerKey {
    pub fn new(branch: &str, salesperson: &str) -> Self {
        SellerKey {
            branch: branch.to_string(),
            salesperson: salesperson.to_string(),
        }
    }
}

/// Orders by month number first, so January sorts before February
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey {
    pub month: u32,
    pub name: String,
}

// ============================================================================
// KPI BUNDLE
// ============================================================================

/// Read-only snapshot of every rollup, recomputed on each run
#[derive(Debug, Clone, PartialEq)]
pub struct KpiBundle {
    pub total_global: f64,
    pub par_agence: BTreeMap<String, f64>,
    pub par_vendeur: BTreeMap<SellerKey, f64>,
    /// None when the global table had no date column
    par_mois: Option<BTreeMap<MonthKey, f64>>,
    date_column: String,
}

impl KpiBundle {
    /// Bundle for an absent table: zero total, empty rollups
    pub fn empty(columns: &ColumnNames) -> Self {
        KpiBundle {
            total_global: 0.0,
            par_agence: BTreeMap::new(),
            par_vendeur: BTreeMap::new(),
            par_mois: Some(BTreeMap::new()),
            date_column: columns.date.clone(),
        }
    }

    /// Monthly rollup; fails when the source data carried no dates
    pub fn par_mois(&self) -> Result<&BTreeMap<MonthKey, f64>> {
        self.par_mois
            .as_ref()
            .ok_or_else(|| PipelineError::missing_column(&self.date_column))
    }

    pub fn has_monthly(&self) -> bool {
        self.par_mois.is_some()
    }

    pub fn branch_total(&self, branch: &str) -> Option<f64> {
        self.par_agence.get(branch).copied()
    }

    pub fn seller_total(&self, branch: &str, salesperson: &str) -> Option<f64> {
        self.par_vendeur
            .get(&SellerKey::new(branch, salesperson))
            .copied()
    }

    /// SHA-256 over the exact bit patterns of every figure
    ///
    /// Two bundles share a fingerprint only if they are bit-identical.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();

        hasher.update(b"total");
        hasher.update(self.total_global.to_bits().to_le_bytes());

        hasher.update(b"agence");
        for (branch, amount) in &self.par_agence {
            hash_key(&mut hasher, branch);
            hasher.update(amount.to_bits().to_le_bytes());
        }

        hasher.update(b"vendeur");
        for (key, amount) in &self.par_vendeur {
            hash_key(&mut hasher, &key.branch);
            hash_key(&mut hasher, &key.salesperson);
            hasher.update(amount.to_bits().to_le_bytes());
        }

        match &self.par_mois {
            Some(months) => {
                hasher.update(b"mois");
                for (key, amount) in months {
                    hasher.update(key.month.to_le_bytes());
                    hash_key(&mut hasher, &key.name);
                    hasher.update(amount.to_bits().to_le_bytes());
                }
            }
            None => hasher.update(b"no-mois"),
        }

        format!("{:x}", hasher.finalize())
    }
}

/// Length-prefixed so ("ab","c") and ("a","bc") hash differently
fn hash_key(hasher: &mut Sha256, key: &str) {
    hasher.update((key.len() as u64).to_le_bytes());
    hasher.update(key.as_bytes());
}

// ============================================================================
// ROLLUPS
// ============================================================================

/// Per-row amounts, aligned with the table's rows
fn amounts(table: &Table, columns: &ColumnNames) -> Result<Vec<f64>> {
    let column = table
        .column(&columns.amount)
        .ok_or_else(|| PipelineError::missing_column(&columns.amount))?;

    column
        .enumerate()
        .map(|(row, value)| match value {
            Value::Null => Ok(0.0),
            other => other.as_f64().ok_or_else(|| PipelineError::InvalidAmount {
                row,
                value: other.to_string(),
            }),
        })
        .collect()
}

fn column_index(table: &Table, name: &str) -> Result<usize> {
    table
        .column_index(name)
        .ok_or_else(|| PipelineError::missing_column(name))
}

/// Sum amounts per key, in row order; rows without a key are skipped
fn group_sum<K, F>(table: &Table, amounts: &[f64], key: F) -> BTreeMap<K, f64>
where
    K: Ord,
    F: Fn(&Row) -> Option<K>,
{
    let mut groups = BTreeMap::new();
    for (row, amount) in table.rows().iter().zip(amounts) {
        if let Some(k) = key(row) {
            *groups.entry(k).or_insert(0.0) += amount;
        }
    }
    groups
}

pub fn total_global(table: &Table, columns: &ColumnNames) -> Result<f64> {
    Ok(amounts(table, columns)?.iter().sum())
}

/// Sales by branch; only branches with rows appear
pub fn par_agence(table: &Table, columns: &ColumnNames) -> Result<BTreeMap<String, f64>> {
    let amounts = amounts(table, columns)?;
    let origin = column_index(table, &columns.origin)?;

    Ok(group_sum(table, &amounts, |row| row[origin].key()))
}

/// Sales by (branch, salesperson)
pub fn par_vendeur(table: &Table, columns: &ColumnNames) -> Result<BTreeMap<SellerKey, f64>> {
    let amounts = amounts(table, columns)?;
    let origin = column_index(table, &columns.origin)?;
    let seller = column_index(table, &columns.salesperson)?;

    Ok(group_sum(table, &amounts, |row| {
        Some(SellerKey {
            branch: row[origin].key()?,
            salesperson: row[seller].key()?,
        })
    }))
}

/// Sales by (month, month name); needs a consolidated date column
pub fn par_mois(table: &Table, columns: &ColumnNames) -> Result<BTreeMap<MonthKey, f64>> {
    column_index(table, &columns.date)?;
    let amounts = amounts(table, columns)?;
    let month_idx = column_index(table, &columns.month)?;
    let name_idx = column_index(table, &columns.month_name)?;

    Ok(group_sum(table, &amounts, |row| {
        let month = match &row[month_idx] {
            Value::Integer(m) => u32::try_from(*m).ok()?,
            _ => return None,
        };
        Some(MonthKey {
            month,
            name: row[name_idx].key()?,
        })
    }))
}

/// Compute every rollup
///
/// An absent table yields the empty bundle; an empty table aggregates
/// normally into zeros. Monthly figures are left unavailable, not empty,
/// when the table has no date column.
pub fn aggregate(table: Option<&Table>, columns: &ColumnNames) -> Result<KpiBundle> {
    let table = match table {
        Some(t) => t,
        None => return Ok(KpiBundle::empty(columns)),
    };

    let par_mois = if table.has_column(&columns.date) {
        Some(par_mois(table, columns)?)
    } else {
        None
    };

    Ok(KpiBundle {
        total_global: total_global(table, columns)?,
        par_agence: par_agence(table, columns)?,
        par_vendeur: par_vendeur(table, columns)?,
        par_mois,
        date_column: columns.date.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consolidate::consolidate;
    use crate::temporal::MonthLocale;
    use crate::test_support::sales_table;

    fn cols() -> ColumnNames {
        ColumnNames::default()
    }

    fn consolidated(rows: &[(&str, &str, f64, Option<&str>)]) -> Table {
        consolidate(vec![sales_table(rows)], &cols(), MonthLocale::En).unwrap()
    }

    #[test]
    fn test_branch_scenario() {
        let table = consolidated(&[
            ("A", "X", 600.0, Some("2024-01-10")),
            ("A", "Y", 400.0, Some("2024-01-20")),
            ("B", "Z", 500.0, Some("2024-02-05")),
            ("C", "W", 250.0, Some("2024-03-15")),
        ]);

        let kpis = aggregate(Some(&table), &cols()).unwrap();

        assert_eq!(kpis.total_global, 1750.0);
        assert_eq!(kpis.branch_total("A"), Some(1000.0));
        assert_eq!(kpis.branch_total("B"), Some(500.0));
        assert_eq!(kpis.branch_total("C"), Some(250.0));
        assert_eq!(kpis.par_agence.len(), 3);
        assert_eq!(table.len(), 4);
    }

    #[test]
    fn test_seller_keys_compare_by_display_text() {
        let mut table = Table::new(vec![
            "Agence".to_string(),
            "Vendeur".to_string(),
            "Montant".to_string(),
        ]);
        table.push_row(vec![Value::text("A"), Value::Integer(7), Value::Integer(100)]);
        table.push_row(vec![Value::text("A"), Value::text("7"), Value::Integer(50)]);
        table.push_row(vec![Value::text("A"), Value::Null, Value::Integer(1)]);

        let sellers = par_vendeur(&table, &cols()).unwrap();

        assert_eq!(sellers.len(), 1, "Rows without a salesperson are not grouped");
        assert_eq!(sellers.get(&SellerKey::new("A", "7")), Some(&150.0));
        assert_eq!(total_global(&table, &cols()).unwrap(), 151.0);
    }

    #[test]
    fn test_seller_rollup_sums_shared_key() {
        let table = consolidated(&[
            ("A", "X", 100.0, None),
            ("A", "X", 200.0, None),
            ("B", "X", 50.0, None),
        ]);

        let kpis = aggregate(Some(&table), &cols()).unwrap();

        assert_eq!(kpis.seller_total("A", "X"), Some(300.0));
        assert_eq!(kpis.seller_total("B", "X"), Some(50.0));
        assert_eq!(kpis.par_vendeur.len(), 2);
    }

    #[test]
    fn test_group_sums_match_total() {
        let table = consolidated(&[
            ("Douala", "Alice", 1200.0, None),
            ("Douala", "Bob", 300.0, None),
            ("Yaoundé", "Carol", 875.0, None),
            ("Garoua", "Dan", 40.0, None),
            ("Garoua", "Alice", 15.0, None),
        ]);

        let kpis = aggregate(Some(&table), &cols()).unwrap();
        let by_branch: f64 = kpis.par_agence.values().sum();
        let by_seller: f64 = kpis.par_vendeur.values().sum();

        assert!((by_branch - kpis.total_global).abs() < 1e-9);
        assert!((by_seller - kpis.total_global).abs() < 1e-9);
    }

    #[test]
    fn test_monthly_rollup() {
        let table = consolidated(&[
            ("A", "X", 100.0, Some("2024-01-10")),
            ("B", "Y", 50.0, Some("2024-01-31")),
            ("A", "X", 25.0, Some("2024-02-01")),
            ("A", "X", 5.0, None),
        ]);

        let kpis = aggregate(Some(&table), &cols()).unwrap();
        let months = kpis.par_mois().unwrap();

        let january = MonthKey {
            month: 1,
            name: "January".to_string(),
        };
        assert_eq!(months.get(&january), Some(&150.0));
        assert_eq!(months.len(), 2, "Rows without a date are left out of the monthly rollup");

        let order: Vec<u32> = months.keys().map(|k| k.month).collect();
        assert_eq!(order, vec![1, 2]);
    }

    #[test]
    fn test_monthly_rollup_requires_date_column() {
        let mut table = Table::new(vec![
            "Agence".to_string(),
            "Vendeur".to_string(),
            "Montant".to_string(),
        ]);
        table.push_row(vec![Value::text("A"), Value::text("X"), Value::Integer(10)]);

        let kpis = aggregate(Some(&table), &cols()).unwrap();

        assert!(!kpis.has_monthly());
        assert_eq!(
            kpis.par_mois().unwrap_err(),
            PipelineError::missing_column("Date")
        );
        assert!(matches!(
            par_mois(&table, &cols()),
            Err(PipelineError::MissingColumn { .. })
        ));
        // The other rollups are unaffected
        assert_eq!(kpis.total_global, 10.0);
    }

    #[test]
    fn test_absent_table_gives_empty_bundle() {
        let kpis = aggregate(None, &cols()).unwrap();

        assert_eq!(kpis.total_global, 0.0);
        assert!(kpis.par_agence.is_empty());
        assert!(kpis.par_vendeur.is_empty());
        assert!(kpis.par_mois().unwrap().is_empty());
    }

    #[test]
    fn test_empty_table_aggregates_to_zero() {
        let table = consolidated(&[]);
        let kpis = aggregate(Some(&table), &cols()).unwrap();

        assert_eq!(kpis.total_global, 0.0);
        assert!(kpis.par_agence.is_empty());
        assert!(kpis.par_mois().unwrap().is_empty());
    }

    #[test]
    fn test_null_amount_counts_as_zero() {
        let mut table = sales_table(&[("A", "X", 100.0, None)]);
        table.push_row(vec![Value::text("A"), Value::text("X"), Value::Null, Value::Null]);

        assert_eq!(total_global(&table, &cols()).unwrap(), 100.0);
        assert_eq!(par_vendeur(&table, &cols()).unwrap().len(), 1);
    }

    #[test]
    fn test_text_amount_rejected() {
        let mut table = sales_table(&[("A", "X", 100.0, None)]);
        table.push_row(vec![
            Value::text("A"),
            Value::text("X"),
            Value::text("mille"),
            Value::Null,
        ]);

        let err = total_global(&table, &cols()).unwrap_err();
        assert_eq!(
            err,
            PipelineError::InvalidAmount {
                row: 1,
                value: "mille".to_string()
            }
        );
    }

    #[test]
    fn test_missing_amount_column() {
        let table = Table::new(vec!["Agence".to_string(), "Vendeur".to_string()]);
        assert_eq!(
            aggregate(Some(&table), &cols()).unwrap_err(),
            PipelineError::missing_column("Montant")
        );
    }

    #[test]
    fn test_missing_salesperson_column() {
        let mut table = Table::new(vec!["Agence".to_string(), "Montant".to_string()]);
        table.push_row(vec![Value::text("A"), Value::Integer(1)]);

        assert_eq!(
            par_vendeur(&table, &cols()).unwrap_err(),
            PipelineError::missing_column("Vendeur")
        );
        assert_eq!(par_agence(&table, &cols()).unwrap().get("A"), Some(&1.0));
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let rows = [
            ("A", "X", 0.1, Some("2024-01-10")),
            ("A", "Y", 0.2, Some("2024-04-10")),
            ("B", "Z", 0.3, None),
        ];

        let first = aggregate(Some(&consolidated(&rows)), &cols()).unwrap();
        let second = aggregate(Some(&consolidated(&rows)), &cols()).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.fingerprint(), second.fingerprint());
        assert_eq!(first.fingerprint().len(), 64);
    }

    #[test]
    fn test_fingerprint_detects_changes() {
        let a = aggregate(Some(&consolidated(&[("A", "X", 100.0, None)])), &cols()).unwrap();
        let b = aggregate(Some(&consolidated(&[("A", "X", 100.5, None)])), &cols()).unwrap();
        let c = aggregate(Some(&consolidated(&[("A", "Y", 100.0, None)])), &cols()).unwrap();

        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
    }
}
