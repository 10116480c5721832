use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Order-of-magnitude unit convention of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum Scale {
    Units,
    Thousands,
    Millions,
    Billions,
}

#[derive(Debug, Error)]
#[error("unknown scale '{0}'")]
pub struct UnknownScale(pub String);

impl Scale {
    pub fn rank(self) -> i32 {
        match self {
            Scale::Units => 0,
            Scale::Thousands => 1,
            Scale::Millions => 2,
            Scale::Billions => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Scale::Units => "Units",
            Scale::Thousands => "Thousands",
            Scale::Millions => "Millions",
            Scale::Billions => "Billions",
        }
    }

    /// Multiplier that moves a value recorded under `observed` onto `expected`:
    /// `1000^(rank(expected) - rank(observed))`.
    pub fn correction_factor(observed: Scale, expected: Scale) -> f64 {
        1000f64.powi(expected.rank() - observed.rank())
    }

    /// Interprets a free-text scale or unit label. Besides the scale names
    /// this understands the AMECO unit prefixes (`Mrd`, `Mio`, `1000`).
    /// Returns `None` for `-` and for labels that carry no magnitude.
    pub fn from_label(label: &str) -> Option<Scale> {
        let trimmed = label.trim();
        if let Ok(scale) = trimmed.parse::<Scale>() {
            return Some(scale);
        }

        let first = trimmed
            .trim_start_matches('(')
            .split(|c: char| c.is_whitespace() || c == ')')
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        match first.as_str() {
            "mrd" | "bn" | "billion" => Some(Scale::Billions),
            "mio" | "mn" | "million" => Some(Scale::Millions),
            "1000" | "thousand" => Some(Scale::Thousands),
            _ => None,
        }
    }
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scale {
    type Err = UnknownScale;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "units" | "unit" => Ok(Scale::Units),
            "thousands" => Ok(Scale::Thousands),
            "millions" => Ok(Scale::Millions),
            "billions" => Ok(Scale::Billions),
            _ => Err(UnknownScale(s.to_string())),
        }
    }
}

impl TryFrom<String> for Scale {
    type Error = UnknownScale;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaleDiscrepancy {
    pub observed: Option<Scale>,
    pub expected: Option<Scale>,
}

impl ScaleDiscrepancy {
    /// Rescale factor, when both sides are known.
    pub fn factor(&self) -> Option<f64> {
        match (self.observed, self.expected) {
            (Some(observed), Some(expected)) => Some(Scale::correction_factor(observed, expected)),
            _ => None,
        }
    }
}

/// Pending scale discrepancies of one step, keyed by variable code. Only the
/// first discrepancy recorded for a variable is kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScaleCorrectionLog {
    entries: BTreeMap<String, ScaleDiscrepancy>,
}

impl ScaleCorrectionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when the variable had no pending discrepancy yet.
    pub fn record(
        &mut self,
        variable: impl Into<String>,
        observed: Option<Scale>,
        expected: Option<Scale>,
    ) -> bool {
        let variable = variable.into();
        if self.entries.contains_key(&variable) {
            return false;
        }
        self.entries
            .insert(variable, ScaleDiscrepancy { observed, expected });
        true
    }

    pub fn get(&self, variable: &str) -> Option<&ScaleDiscrepancy> {
        self.entries.get(variable)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ScaleDiscrepancy)> {
        self.entries
            .iter()
            .map(|(variable, discrepancy)| (variable.as_str(), discrepancy))
    }

    /// Empties the log; each entry is handed out exactly once.
    pub fn drain(&mut self) -> Vec<(String, ScaleDiscrepancy)> {
        std::mem::take(&mut self.entries).into_iter().collect()
    }
}

/// Scale labels declared by the input data, per variable code.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObservedScales {
    labels: BTreeMap<String, Option<Scale>>,
}

impl ObservedScales {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, variable: impl Into<String>, scale: Option<Scale>) {
        self.labels.insert(variable.into(), scale);
    }

    /// `None` both when the variable was never declared and when its label
    /// carried no known scale.
    pub fn get(&self, variable: &str) -> Option<Scale> {
        self.labels.get(variable).copied().flatten()
    }

    pub fn contains(&self, variable: &str) -> bool {
        self.labels.contains_key(variable)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, Option<Scale>)> for ObservedScales {
    fn from_iter<T: IntoIterator<Item = (S, Option<Scale>)>>(iter: T) -> Self {
        Self {
            labels: iter
                .into_iter()
                .map(|(variable, scale)| (variable.into(), scale))
                .collect(),
        }
    }
}
