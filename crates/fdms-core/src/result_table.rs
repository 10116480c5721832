use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error};

use crate::scale::{Scale, ScaleCorrectionLog, ScaleDiscrepancy};
use crate::timeseries::{TimeSeries, YearWindow};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("series {code} not found for country {country}")]
    NotFound { country: String, code: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum Frequency {
    #[default]
    Annual,
    Quarterly,
    Monthly,
}

impl Frequency {
    pub fn as_str(self) -> &'static str {
        match self {
            Frequency::Annual => "Annual",
            Frequency::Quarterly => "Quarterly",
            Frequency::Monthly => "Monthly",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown frequency '{0}'")]
pub struct UnknownFrequency(pub String);

impl FromStr for Frequency {
    type Err = UnknownFrequency;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "annual" | "a" => Ok(Frequency::Annual),
            "quarterly" | "q" => Ok(Frequency::Quarterly),
            "monthly" | "m" => Ok(Frequency::Monthly),
            _ => Err(UnknownFrequency(s.to_string())),
        }
    }
}

impl TryFrom<String> for Frequency {
    type Error = UnknownFrequency;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VariableKey {
    pub country: String,
    pub code: String,
}

impl VariableKey {
    pub fn new(country: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            country: country.into(),
            code: code.into(),
        }
    }
}

impl fmt::Display for VariableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.country, self.code)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableRecord {
    pub country: String,
    pub code: String,
    pub frequency: Frequency,
    pub scale: Scale,
    pub series: TimeSeries,
}

impl VariableRecord {
    pub fn new(
        country: impl Into<String>,
        code: impl Into<String>,
        frequency: Frequency,
        scale: Scale,
        series: TimeSeries,
    ) -> Self {
        Self {
            country: country.into(),
            code: code.into(),
            frequency,
            scale,
            series,
        }
    }

    pub fn key(&self) -> VariableKey {
        VariableKey::new(self.country.clone(), self.code.clone())
    }

    fn matches(&self, country: &str, code: &str) -> bool {
        self.country == country && self.code == code
    }
}

/// Tagged lookup result, for callers that decide explicitly what a missing
/// series means.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Lookup<'a> {
    Found(&'a TimeSeries),
    NotFound,
}

impl<'a> Lookup<'a> {
    pub fn found(self) -> Option<&'a TimeSeries> {
        match self {
            Lookup::Found(series) => Some(series),
            Lookup::NotFound => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScaleCorrectionReport {
    /// Variables that were rescaled, with the factor applied.
    pub rescaled: Vec<(String, f64)>,
    /// Discrepancies with an unknown side; metadata updated, values left alone.
    pub unresolved: Vec<(String, ScaleDiscrepancy)>,
    /// Discrepancies whose variable had no series in the table.
    pub missing: Vec<String>,
}

impl ScaleCorrectionReport {
    pub fn is_empty(&self) -> bool {
        self.rescaled.is_empty() && self.unresolved.is_empty() && self.missing.is_empty()
    }

    pub fn extend(&mut self, other: ScaleCorrectionReport) {
        self.rescaled.extend(other.rescaled);
        self.unresolved.extend(other.unresolved);
        self.missing.extend(other.missing);
    }
}

/// Variable series keyed by `(country, code)`.
///
/// Rows are kept in insertion order and may repeat a key; the most recently
/// written row of a key is its live row and is what lookups return.
/// [`ResultTable::deduplicated`] collapses the table to live rows only.
#[derive(Debug, Clone, Default)]
pub struct ResultTable {
    records: Vec<VariableRecord>,
    live: HashMap<VariableKey, usize>,
}

impl ResultTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows, duplicates included.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of distinct keys.
    pub fn key_count(&self) -> usize {
        self.live.len()
    }

    pub fn contains(&self, country: &str, code: &str) -> bool {
        self.position(country, code).is_some()
    }

    /// Appends a row without checking for an existing key. The new row
    /// becomes the live row of its key.
    pub fn append(&mut self, record: VariableRecord) {
        let key = record.key();
        self.records.push(record);
        self.live.insert(key, self.records.len() - 1);
    }

    /// Overwrites the live row of the record's key in place, or appends.
    pub fn put_or_replace(&mut self, record: VariableRecord) {
        match self.position(&record.country, &record.code) {
            Some(idx) => self.records[idx] = record,
            None => self.append(record),
        }
    }

    pub fn get(&self, country: &str, code: &str) -> Result<&TimeSeries, LookupError> {
        self.get_record(country, code).map(|record| &record.series)
    }

    pub fn get_record(&self, country: &str, code: &str) -> Result<&VariableRecord, LookupError> {
        self.position(country, code)
            .map(|idx| &self.records[idx])
            .ok_or_else(|| LookupError::NotFound {
                country: country.to_string(),
                code: code.to_string(),
            })
    }

    pub fn get_record_mut(
        &mut self,
        country: &str,
        code: &str,
    ) -> Result<&mut VariableRecord, LookupError> {
        match self.position(country, code) {
            Some(idx) => Ok(&mut self.records[idx]),
            None => Err(LookupError::NotFound {
                country: country.to_string(),
                code: code.to_string(),
            }),
        }
    }

    pub fn lookup(&self, country: &str, code: &str) -> Lookup<'_> {
        match self.get(country, code) {
            Ok(series) => Lookup::Found(series),
            Err(LookupError::NotFound { .. }) => Lookup::NotFound,
        }
    }

    /// Every row in insertion order, duplicates included.
    pub fn records(&self) -> impl Iterator<Item = &VariableRecord> {
        self.records.iter()
    }

    /// Only the live row of each key, in insertion order of those rows.
    pub fn live_records(&self) -> impl Iterator<Item = &VariableRecord> + '_ {
        self.records
            .iter()
            .enumerate()
            .filter(|(idx, record)| {
                self.live
                    .get(&VariableKey::new(record.country.as_str(), record.code.as_str()))
                    == Some(idx)
            })
            .map(|(_, record)| record)
    }

    /// Concatenates `other`'s rows after this table's rows; on key collision
    /// the rows from `other` become live. No deduplication happens here.
    pub fn merge(&mut self, other: ResultTable) {
        for record in other.records {
            self.append(record);
        }
    }

    pub fn merged(&self, other: &ResultTable) -> ResultTable {
        let mut combined = self.clone();
        combined.merge(other.clone());
        combined
    }

    /// Keeps the last occurrence of every key.
    pub fn deduplicated(&self) -> ResultTable {
        let mut table = ResultTable::new();
        for record in self.live_records() {
            table.append(record.clone());
        }
        table
    }

    /// Live rows whose code is in `codes`.
    pub fn filter_codes(&self, codes: &[&str]) -> ResultTable {
        let mut table = ResultTable::new();
        for record in self.live_records() {
            if codes.contains(&record.code.as_str()) {
                table.append(record.clone());
            }
        }
        table
    }

    pub fn restrict_years(&self, window: YearWindow) -> ResultTable {
        let mut table = ResultTable::new();
        for record in self.records() {
            let mut restricted = record.clone();
            restricted.series = record.series.restrict(window);
            table.append(restricted);
        }
        table
    }

    /// Applies every pending discrepancy of `log` to the live rows of
    /// `country`, draining the log. Known pairs are rescaled by
    /// `1000^(rank(expected) - rank(observed))`; the row's scale becomes the
    /// expected one whenever that is known. Missing rows are reported and
    /// skipped.
    pub fn apply_scale_correction(
        &mut self,
        country: &str,
        log: &mut ScaleCorrectionLog,
    ) -> ScaleCorrectionReport {
        let mut report = ScaleCorrectionReport::default();

        for (variable, discrepancy) in log.drain() {
            let record = match self.get_record_mut(country, &variable) {
                Ok(record) => record,
                Err(err) => {
                    error!(
                        country,
                        variable = %variable,
                        error = %err,
                        "unable to apply scale correction"
                    );
                    report.missing.push(variable);
                    continue;
                }
            };

            match discrepancy.factor() {
                Some(factor) => {
                    record.series = record.series.scale_by(factor);
                    debug!(country, variable = %variable, factor, "rescaled series");
                    report.rescaled.push((variable, factor));
                }
                None => report.unresolved.push((variable, discrepancy)),
            }
            if let Some(expected) = discrepancy.expected {
                record.scale = expected;
            }
        }

        report
    }

    fn position(&self, country: &str, code: &str) -> Option<usize> {
        self.live
            .get(&VariableKey::new(country, code))
            .copied()
            .filter(|idx| self.records[*idx].matches(country, code))
    }
}

impl FromIterator<VariableRecord> for ResultTable {
    fn from_iter<T: IntoIterator<Item = VariableRecord>>(iter: T) -> Self {
        let mut table = ResultTable::new();
        for record in iter {
            table.append(record);
        }
        table
    }
}
