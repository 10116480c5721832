//! Reconciles two series describing the same variable into one continuous
//! series. The base series is authoritative over its own domain; the other
//! series only extends it beyond the overlap year.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::timeseries::{TimeSeries, Year};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpliceDirection {
    /// Extend into years before the base's first valid year.
    Backward,
    /// Extend into years after the base's last valid year.
    Forward,
}

impl fmt::Display for SpliceDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpliceDirection::Backward => f.write_str("backward"),
            SpliceDirection::Forward => f.write_str("forward"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpliceMethod {
    /// Multiplicative factor at the overlap year.
    Ratio,
    /// Additive offset at the overlap year.
    Butt,
}

impl fmt::Display for SpliceMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpliceMethod::Ratio => f.write_str("ratio"),
            SpliceMethod::Butt => f.write_str("butt"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SpliceUndefined {
    /// The base series has no valid year to anchor on.
    EmptyBase,
    /// The other series has no value at the overlap year.
    MissingOverlap { year: Year },
    /// Ratio splice against a zero in the other series.
    ZeroAtOverlap { year: Year },
}

impl fmt::Display for SpliceUndefined {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpliceUndefined::EmptyBase => f.write_str("base series has no valid values"),
            SpliceUndefined::MissingOverlap { year } => {
                write!(f, "other series has no value at overlap year {year}")
            }
            SpliceUndefined::ZeroAtOverlap { year } => {
                write!(f, "other series is zero at overlap year {year}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SpliceOutcome {
    Extended {
        overlap_year: Year,
        factor: f64,
        /// Years copied over from the other series.
        years: usize,
    },
    Undefined(SpliceUndefined),
}

impl SpliceOutcome {
    pub fn is_undefined(&self) -> bool {
        matches!(self, SpliceOutcome::Undefined(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Splice {
    pub series: TimeSeries,
    pub outcome: SpliceOutcome,
}

impl Splice {
    pub fn into_series(self) -> TimeSeries {
        self.series
    }
}

pub fn ratio_splice(base: &TimeSeries, other: &TimeSeries, direction: SpliceDirection) -> Splice {
    splice(SpliceMethod::Ratio, base, other, direction)
}

pub fn butt_splice(base: &TimeSeries, other: &TimeSeries, direction: SpliceDirection) -> Splice {
    splice(SpliceMethod::Butt, base, other, direction)
}

/// When the correction factor is undefined the base comes back untouched and
/// the outcome says why; nothing is extended.
pub fn splice(
    method: SpliceMethod,
    base: &TimeSeries,
    other: &TimeSeries,
    direction: SpliceDirection,
) -> Splice {
    let overlap = match direction {
        SpliceDirection::Backward => base.first_valid_index(),
        SpliceDirection::Forward => base.last_valid_index(),
    };
    let Some(overlap_year) = overlap else {
        return undefined(base, SpliceUndefined::EmptyBase);
    };

    // overlap_year is a valid index of base
    let base_value = base.get(overlap_year).unwrap_or_default();
    let Some(other_value) = other.get(overlap_year) else {
        return undefined(base, SpliceUndefined::MissingOverlap { year: overlap_year });
    };

    let factor = match method {
        SpliceMethod::Ratio => {
            if other_value == 0.0 {
                return undefined(base, SpliceUndefined::ZeroAtOverlap { year: overlap_year });
            }
            base_value / other_value
        }
        SpliceMethod::Butt => base_value - other_value,
    };

    let mut series = base.clone();
    let mut years = 0;
    for (year, value) in other.iter() {
        let outside = match direction {
            SpliceDirection::Backward => year < overlap_year,
            SpliceDirection::Forward => year > overlap_year,
        };
        if !outside {
            continue;
        }
        let adjusted = value.map(|value| match method {
            SpliceMethod::Ratio => value * factor,
            SpliceMethod::Butt => value + factor,
        });
        if adjusted.is_some() {
            years += 1;
        }
        series.insert(year, adjusted);
    }

    Splice {
        series,
        outcome: SpliceOutcome::Extended {
            overlap_year,
            factor,
            years,
        },
    }
}

fn undefined(base: &TimeSeries, reason: SpliceUndefined) -> Splice {
    Splice {
        series: base.clone(),
        outcome: SpliceOutcome::Undefined(reason),
    }
}
