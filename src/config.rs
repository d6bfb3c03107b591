// ⚙️ Configuration - branches, column names, display settings
//
// Everything has a default for the three historical agencies, so a
// config file only needs to mention what differs.

use crate::error::{PipelineError, Result};
use crate::parser::SourceFormat;
use crate::temporal::MonthLocale;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Names of the columns the pipeline reads and writes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnNames {
    pub amount: String,
    pub salesperson: String,
    pub date: String,
    /// Stamped by the parsers with the branch label
    pub origin: String,
    /// Derived month number (1-12)
    pub month: String,
    /// Derived month name
    pub month_name: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        ColumnNames {
            amount: "Montant".to_string(),
            salesperson: "Vendeur".to_string(),
            date: "Date".to_string(),
            origin: "Agence".to_string(),
            month: "Mois".to_string(),
            month_name: "Mois_Nom".to_string(),
        }
    }
}

impl ColumnNames {
    fn all(&self) -> [(&'static str, &str); 6] {
        [
            ("amount", self.amount.as_str()),
            ("salesperson", self.salesperson.as_str()),
            ("date", self.date.as_str()),
            ("origin", self.origin.as_str()),
            ("month", self.month.as_str()),
            ("month_name", self.month_name.as_str()),
        ]
    }
}

/// One branch: its label, the format it exports, and where its file is
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchConfig {
    pub label: String,
    pub format: SourceFormat,
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl BranchConfig {
    pub fn new(label: &str, format: SourceFormat) -> Self {
        BranchConfig {
            label: label.to_string(),
            format,
            path: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Currency label shown next to amounts
    pub currency: String,
    pub locale: MonthLocale,
    pub columns: ColumnNames,
    pub branches: Vec<BranchConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            currency: "FCFA".to_string(),
            locale: MonthLocale::En,
            columns: ColumnNames::default(),
            branches: vec![
                BranchConfig::new("Douala", SourceFormat::Excel),
                BranchConfig::new("Yaoundé", SourceFormat::Csv),
                BranchConfig::new("Garoua", SourceFormat::Json),
            ],
        }
    }
}

impl Config {
    /// Read a TOML config file; missing fields take their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| PipelineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.branches.is_empty() {
            return Err(PipelineError::Config(
                "At least one branch must be configured".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for branch in &self.branches {
            if branch.label.trim().is_empty() {
                return Err(PipelineError::Config("Branch label cannot be empty".to_string()));
            }
            if !seen.insert(branch.label.as_str()) {
                return Err(PipelineError::Config(format!(
                    "Duplicate branch label '{}'",
                    branch.label
                )));
            }
        }

        for (key, name) in self.columns.all() {
            if name.trim().is_empty() {
                return Err(PipelineError::Config(format!(
                    "Column name '{}' cannot be empty",
                    key
                )));
            }
        }

        Ok(())
    }

    /// Apply a `LABEL=PATH` override from the command line
    pub fn apply_source_override(&mut self, source: &str) -> Result<()> {
        let (label, path) = source.split_once('=').ok_or_else(|| {
            PipelineError::Config(format!("Expected LABEL=PATH, got '{}'", source))
        })?;

        let label = label.trim();
        let branch = self
            .branches
            .iter_mut()
            .find(|b| b.label == label)
            .ok_or_else(|| PipelineError::Config(format!("Unknown branch '{}'", label)))?;

        branch.path = Some(PathBuf::from(path.trim()));
        Ok(())
    }

    /// Config file when given (defaults otherwise), then command-line overrides
    pub fn resolve(
        path: Option<&Path>,
        sources: &[String],
        locale: Option<MonthLocale>,
    ) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };

        for source in sources {
            config.apply_source_override(source)?;
        }
        if let Some(locale) = locale {
            config.locale = locale;
        }

        Ok(config)
    }
}
