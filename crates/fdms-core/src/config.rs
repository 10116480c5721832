use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::result_table::Frequency;
use crate::scale::Scale;
use crate::steps::SumAndSpliceRule;
use crate::timeseries::{Year, YearWindow};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct InputPaths {
    pub forecast: PathBuf,
    #[serde(default)]
    pub history: Option<PathBuf>,
    #[serde(default)]
    pub reference: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputPaths {
    #[serde(default)]
    pub csv: Option<PathBuf>,
    #[serde(default)]
    pub parquet: Option<PathBuf>,
    #[serde(default)]
    pub summary: Option<PathBuf>,
}

fn default_scale() -> Scale {
    Scale::Units
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    pub country: String,
    #[serde(default)]
    pub frequency: Frequency,
    #[serde(default = "default_scale")]
    pub default_scale: Scale,
    pub first_year: Year,
    pub last_year: Year,
    pub inputs: InputPaths,
    #[serde(default)]
    pub outputs: OutputPaths,
    /// Expected scale per variable code.
    #[serde(default)]
    pub scales: BTreeMap<String, Scale>,
    #[serde(default)]
    pub sum_and_splice: Vec<SumAndSpliceRule>,
    /// Step codes to run, in order. Defaults to the standard sequence.
    #[serde(default)]
    pub steps: Option<Vec<String>>,
}

impl PipelineConfig {
    pub fn from_toml_str(toml_str: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a configuration file. Relative input and output paths are
    /// resolved against the directory holding the file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&contents)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.country.trim().is_empty() {
            return Err(ConfigError::Invalid("country must not be empty".into()));
        }
        if self.first_year > self.last_year {
            return Err(ConfigError::Invalid(format!(
                "first_year {} is after last_year {}",
                self.first_year, self.last_year
            )));
        }
        for rule in &self.sum_and_splice {
            if rule.sources.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "sum_and_splice rule for {} has no sources",
                    rule.variable
                )));
            }
        }
        Ok(())
    }

    pub fn window(&self) -> YearWindow {
        YearWindow::new(self.first_year, self.last_year)
    }

    pub fn settings(&self) -> RunSettings {
        RunSettings {
            country: self.country.clone(),
            frequency: self.frequency,
            default_scale: self.default_scale,
            window: self.window(),
            expected_scales: self.scales.clone(),
        }
    }

    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };
        resolve(&mut self.inputs.forecast);
        for path in [
            self.inputs.history.as_mut(),
            self.inputs.reference.as_mut(),
            self.outputs.csv.as_mut(),
            self.outputs.parquet.as_mut(),
            self.outputs.summary.as_mut(),
        ]
        .into_iter()
        .flatten()
        {
            resolve(path);
        }
    }
}

/// The part of the configuration every step sees while running.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    pub country: String,
    pub frequency: Frequency,
    pub default_scale: Scale,
    pub window: YearWindow,
    pub expected_scales: BTreeMap<String, Scale>,
}

impl RunSettings {
    pub fn new(country: impl Into<String>, window: YearWindow) -> Self {
        Self {
            country: country.into(),
            frequency: Frequency::Annual,
            default_scale: Scale::Units,
            window,
            expected_scales: BTreeMap::new(),
        }
    }

    pub fn with_expected_scale(mut self, variable: impl Into<String>, scale: Scale) -> Self {
        self.expected_scales.insert(variable.into(), scale);
        self
    }

    pub fn expected_scale(&self, variable: &str) -> Option<Scale> {
        self.expected_scales.get(variable).copied()
    }
}
