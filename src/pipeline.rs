// 🚰 Pipeline - parsers → consolidation → KPIs → summary
//
// Each stage takes its input by value or reference and returns its output;
// nothing is kept between runs. Any error aborts the whole run unmodified.

use crate::config::{BranchConfig, Config};
use crate::consolidate::consolidate;
use crate::error::{PipelineError, Result};
use crate::kpi::{aggregate, KpiBundle};
use crate::parser::get_parser;
use crate::report::DashboardSummary;
use crate::table::Table;
use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

/// Everything one run produces, handed to the presentation layer
#[derive(Debug, Clone)]
pub struct Dashboard {
    /// Fresh per run; only used to correlate log lines
    pub run_id: Uuid,
    pub table: Table,
    pub kpis: KpiBundle,
    pub summary: DashboardSummary,
}

/// Every branch needs an existing file before anything is parsed
pub fn check_inputs(branches: &[BranchConfig]) -> Result<()> {
    let missing: Vec<String> = branches
        .iter()
        .filter(|b| b.path.as_ref().map_or(true, |p| !p.is_file()))
        .map(|b| b.label.clone())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::IncompleteInput { missing })
    }
}

/// Parse every branch's file, in branch order
pub fn load_sources(branches: &[BranchConfig], origin_column: &str) -> Result<Vec<Table>> {
    check_inputs(branches)?;

    let mut tables = Vec::with_capacity(branches.len());
    for branch in branches {
        let path = branch.path.as_ref().ok_or_else(|| PipelineError::IncompleteInput {
            missing: vec![branch.label.clone()],
        })?;

        let parser = get_parser(branch.format);
        if !parser.can_parse(path) {
            warn!(
                branch = %branch.label,
                path = %path.display(),
                format = branch.format.name(),
                "file extension does not match the configured format"
            );
        }

        let table = parser.load_file(path, &branch.label, origin_column)?;
        info!(branch = %branch.label, rows = table.len(), "loaded source");
        tables.push(table);
    }

    Ok(tables)
}

/// Consolidate and aggregate already-parsed tables
pub fn run_tables(tables: Vec<Table>, config: &Config) -> Result<Dashboard> {
    let run_id = Uuid::new_v4();
    let span = info_span!("pipeline", run_id = %run_id);
    let _enter = span.enter();

    let source_rows: usize = tables.iter().map(Table::len).sum();
    let table = consolidate(tables, &config.columns, config.locale)?;
    debug!(source_rows, global_rows = table.len(), "consolidated");

    let kpis = aggregate(Some(&table), &config.columns)?;
    let summary = DashboardSummary::build(&table, &kpis, &config.columns)?;
    info!(
        rows = summary.row_count,
        total = kpis.total_global,
        branches = kpis.par_agence.len(),
        "pipeline complete"
    );

    Ok(Dashboard {
        run_id,
        table,
        kpis,
        summary,
    })
}

/// Full run from the configured branch files
pub fn run(config: &Config) -> Result<Dashboard> {
    let tables = load_sources(&config.branches, &config.columns.origin)?;
    run_tables(tables, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::SourceFormat;
    use crate::table::Value;
    use crate::test_support::{xlsx_bytes, XCell};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    /// Douala 2 rows (1000), Yaoundé 1 row (500), Garoua 1 row (250)
    fn write_sources(dir: &Path) -> Config {
        let xlsx = xlsx_bytes(&[
            &[XCell::Str("Date"), XCell::Str("Vendeur"), XCell::Str("Montant")],
            &[XCell::Date(45306.0), XCell::Str("Alice"), XCell::Num(600.0)],
            &[XCell::Str("2024-02-20"), XCell::Str("Bob"), XCell::Num(400.0)],
        ]);
        fs::write(dir.join("douala.xlsx"), xlsx).unwrap();
        fs::write(
            dir.join("yaounde.csv"),
            "Date,Vendeur,Montant,Produit\n2024-02-01,Carol,500,Riz\n",
        )
        .unwrap();
        fs::write(
            dir.join("garoua.json"),
            r#"[{"Date": "2024-03-10", "Vendeur": "Alice", "Montant": 250}]"#,
        )
        .unwrap();

        let mut config = Config::default();
        config.branches[0].path = Some(dir.join("douala.xlsx"));
        config.branches[1].path = Some(dir.join("yaounde.csv"));
        config.branches[2].path = Some(dir.join("garoua.json"));
        config
    }

    #[test]
    fn test_full_run_three_formats() {
        let dir = TempDir::new().unwrap();
        let config = write_sources(dir.path());

        let dashboard = run(&config).unwrap();

        assert_eq!(dashboard.table.len(), 4);
        assert_eq!(dashboard.kpis.total_global, 1750.0);
        assert_eq!(dashboard.kpis.branch_total("Douala"), Some(1000.0));
        assert_eq!(dashboard.kpis.branch_total("Yaoundé"), Some(500.0));
        assert_eq!(dashboard.kpis.branch_total("Garoua"), Some(250.0));
        assert_eq!(dashboard.summary.seller_count, 3);
        assert_eq!(dashboard.kpis.par_mois().unwrap().len(), 3);

        // The workbook's date-formatted cell counts toward January
        let january: Vec<&str> = dashboard
            .summary
            .by_month
            .iter()
            .filter(|m| m.month == 1)
            .map(|m| m.month_name.as_str())
            .collect();
        assert_eq!(january, vec!["January"]);
        assert_eq!(dashboard.summary.by_month[0].amount, 600.0);
    }

    #[test]
    fn test_origin_matches_source() {
        let dir = TempDir::new().unwrap();
        let config = write_sources(dir.path());

        let dashboard = run(&config).unwrap();
        let origins: Vec<Value> = dashboard.table.column("Agence").unwrap().cloned().collect();

        assert_eq!(
            origins,
            vec![
                Value::text("Douala"),
                Value::text("Douala"),
                Value::text("Yaoundé"),
                Value::text("Garoua"),
            ]
        );
    }

    #[test]
    fn test_rerun_is_bit_identical() {
        let dir = TempDir::new().unwrap();
        let config = write_sources(dir.path());

        let first = run(&config).unwrap();
        let second = run(&config).unwrap();

        assert_eq!(first.kpis, second.kpis);
        assert_eq!(first.kpis.fingerprint(), second.kpis.fingerprint());
        assert_ne!(first.run_id, second.run_id, "Every run gets its own id");
    }

    #[test]
    fn test_missing_path_is_waiting() {
        let dir = TempDir::new().unwrap();
        let mut config = write_sources(dir.path());
        config.branches[1].path = None;

        let err = run(&config).unwrap_err();

        assert!(err.is_waiting());
        assert_eq!(
            err,
            PipelineError::IncompleteInput {
                missing: vec!["Yaoundé".to_string()]
            }
        );
    }

    #[test]
    fn test_nonexistent_file_is_waiting() {
        let dir = TempDir::new().unwrap();
        let mut config = write_sources(dir.path());
        config.branches[0].path = Some(dir.path().join("absent.xlsx"));
        config.branches[2].path = None;

        let err = check_inputs(&config.branches).unwrap_err();
        assert_eq!(
            err,
            PipelineError::IncompleteInput {
                missing: vec!["Douala".to_string(), "Garoua".to_string()]
            }
        );
    }

    #[test]
    fn test_parse_error_aborts_run() {
        let dir = TempDir::new().unwrap();
        let config = write_sources(dir.path());
        fs::write(dir.path().join("garoua.json"), "{ not json").unwrap();

        let err = run(&config).unwrap_err();
        assert!(matches!(err, PipelineError::Parse { .. }));
        assert!(!err.is_waiting());
    }

    #[test]
    fn test_date_error_aborts_run() {
        let dir = TempDir::new().unwrap();
        let config = write_sources(dir.path());
        fs::write(
            dir.path().join("yaounde.csv"),
            "Date,Vendeur,Montant\nhier,Carol,500\n",
        )
        .unwrap();

        let err = run(&config).unwrap_err();
        assert!(matches!(err, PipelineError::DateParse { .. }));
    }

    fn two_csv_branches(dir: &Path, a: &str, b: &str) -> Config {
        fs::write(dir.join("a.csv"), a).unwrap();
        fs::write(dir.join("b.csv"), b).unwrap();

        let mut config = Config::default();
        config.branches = vec![
            BranchConfig {
                label: "A".to_string(),
                format: SourceFormat::Csv,
                path: Some(dir.join("a.csv")),
            },
            BranchConfig {
                label: "B".to_string(),
                format: SourceFormat::Csv,
                path: Some(dir.join("b.csv")),
            },
        ];
        config
    }

    #[test]
    fn test_configurable_branches() {
        let dir = TempDir::new().unwrap();
        let config = two_csv_branches(
            dir.path(),
            "Date,Vendeur,Montant\n2024-01-02,X,100\n2024-01-03,X,200\n",
            "Date,Vendeur,Montant\n2024-02-01,Y,5\n",
        );

        let dashboard = run(&config).unwrap();

        assert_eq!(dashboard.kpis.seller_total("A", "X"), Some(300.0));
        assert_eq!(dashboard.kpis.branch_total("B"), Some(5.0));
        assert_eq!(dashboard.summary.by_month.len(), 2);
    }

    #[test]
    fn test_missing_date_column_aborts_run() {
        let dir = TempDir::new().unwrap();
        let config = two_csv_branches(
            dir.path(),
            "Vendeur,Montant\nX,100\nX,200\n",
            "Vendeur,Montant\nY,5\n",
        );

        let err = run(&config).unwrap_err();

        assert_eq!(err, PipelineError::missing_column("Date"));
        assert!(!err.is_waiting());
    }
}
