use std::collections::btree_map;
use std::collections::BTreeMap;
use std::ops::{Add, Div, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

pub type Year = i32;

/// Inclusive range of years a pipeline run publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearWindow {
    pub first: Year,
    pub last: Year,
}

impl YearWindow {
    pub fn new(first: Year, last: Year) -> Self {
        Self { first, last }
    }

    pub fn contains(&self, year: Year) -> bool {
        (self.first..=self.last).contains(&year)
    }

    pub fn years(&self) -> impl Iterator<Item = Year> {
        self.first..=self.last
    }

    pub fn len(&self) -> usize {
        if self.last < self.first {
            0
        } else {
            (self.last - self.first) as usize + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Year-indexed annual series.
///
/// A year present with `None` is a gap inside the series' domain; a year that
/// is not a key lies outside the domain. NaN never gets stored: arithmetic
/// that produces NaN records a gap instead, so a gap is never confused with
/// zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    values: BTreeMap<Year, Option<f64>>,
}

fn clean(value: f64) -> Option<f64> {
    (!value.is_nan()).then_some(value)
}

impl TimeSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consecutive values starting at `start`.
    pub fn from_values<I>(start: Year, values: I) -> Self
    where
        I: IntoIterator<Item = Option<f64>>,
    {
        values
            .into_iter()
            .enumerate()
            .map(|(offset, value)| (start + offset as Year, value))
            .collect()
    }

    /// A series covering `window` with every year a gap.
    pub fn gaps(window: YearWindow) -> Self {
        Self {
            values: window.years().map(|year| (year, None)).collect(),
        }
    }

    pub fn insert(&mut self, year: Year, value: Option<f64>) {
        self.values.insert(year, value.and_then(clean));
    }

    pub fn get(&self, year: Year) -> Option<f64> {
        self.values.get(&year).copied().flatten()
    }

    pub fn contains_year(&self, year: Year) -> bool {
        self.values.contains_key(&year)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn valid_count(&self) -> usize {
        self.values.values().filter(|value| value.is_some()).count()
    }

    pub fn years(&self) -> impl Iterator<Item = Year> + '_ {
        self.values.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Year, Option<f64>)> + '_ {
        self.values.iter().map(|(year, value)| (*year, *value))
    }

    pub fn valid(&self) -> impl Iterator<Item = (Year, f64)> + '_ {
        self.values
            .iter()
            .filter_map(|(year, value)| value.map(|v| (*year, v)))
    }

    pub fn first_year(&self) -> Option<Year> {
        self.values.keys().next().copied()
    }

    pub fn last_year(&self) -> Option<Year> {
        self.values.keys().next_back().copied()
    }

    /// Smallest year holding a value; `None` when the series has no data.
    pub fn first_valid_index(&self) -> Option<Year> {
        self.valid().next().map(|(year, _)| year)
    }

    /// Largest year holding a value; `None` when the series has no data.
    pub fn last_valid_index(&self) -> Option<Year> {
        self.values
            .iter()
            .rev()
            .find(|(_, value)| value.is_some())
            .map(|(year, _)| *year)
    }

    /// Reindexes onto `window`: years outside are dropped, missing years become gaps.
    pub fn restrict(&self, window: YearWindow) -> Self {
        Self {
            values: window.years().map(|year| (year, self.get(year))).collect(),
        }
    }

    pub fn map<F>(&self, mut f: F) -> Self
    where
        F: FnMut(f64) -> f64,
    {
        Self {
            values: self
                .values
                .iter()
                .map(|(year, value)| (*year, value.map(&mut f).and_then(clean)))
                .collect(),
        }
    }

    pub fn scale_by(&self, factor: f64) -> Self {
        self.map(|value| value * factor)
    }

    pub fn ln(&self) -> Self {
        self.map(f64::ln)
    }

    pub fn powf(&self, exponent: f64) -> Self {
        self.map(|value| value.powf(exponent))
    }

    /// Combines two series over the union of their domains. `f` sees `None`
    /// for a year that is a gap or outside one operand's domain.
    pub fn zip_with<F>(&self, other: &TimeSeries, mut f: F) -> Self
    where
        F: FnMut(Option<f64>, Option<f64>) -> Option<f64>,
    {
        let mut values = BTreeMap::new();
        for year in self.values.keys().chain(other.values.keys()) {
            if let btree_map::Entry::Vacant(entry) = values.entry(*year) {
                entry.insert(f(self.get(*year), other.get(*year)).and_then(clean));
            }
        }
        Self { values }
    }

    fn binary<F>(&self, other: &TimeSeries, op: F) -> Self
    where
        F: Fn(f64, f64) -> f64,
    {
        self.zip_with(other, |lhs, rhs| match (lhs, rhs) {
            (Some(lhs), Some(rhs)) => Some(op(lhs, rhs)),
            _ => None,
        })
    }

    /// Addition treating a year missing from one operand as zero. The year is a
    /// gap only when both operands lack it.
    pub fn add_fill_zero(&self, other: &TimeSeries) -> Self {
        self.zip_with(other, |lhs, rhs| match (lhs, rhs) {
            (None, None) => None,
            (lhs, rhs) => Some(lhs.unwrap_or(0.0) + rhs.unwrap_or(0.0)),
        })
    }
}

impl FromIterator<(Year, f64)> for TimeSeries {
    fn from_iter<T: IntoIterator<Item = (Year, f64)>>(iter: T) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(year, value)| (year, clean(value)))
                .collect(),
        }
    }
}

impl FromIterator<(Year, Option<f64>)> for TimeSeries {
    fn from_iter<T: IntoIterator<Item = (Year, Option<f64>)>>(iter: T) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(year, value)| (year, value.and_then(clean)))
                .collect(),
        }
    }
}

impl<const N: usize> From<[(Year, f64); N]> for TimeSeries {
    fn from(pairs: [(Year, f64); N]) -> Self {
        pairs.into_iter().collect()
    }
}

macro_rules! series_binary_op {
    ($trait:ident, $method:ident, $op:tt) => {
        impl $trait<&TimeSeries> for &TimeSeries {
            type Output = TimeSeries;

            fn $method(self, rhs: &TimeSeries) -> TimeSeries {
                self.binary(rhs, |lhs, rhs| lhs $op rhs)
            }
        }

        impl $trait<TimeSeries> for TimeSeries {
            type Output = TimeSeries;

            fn $method(self, rhs: TimeSeries) -> TimeSeries {
                (&self).$method(&rhs)
            }
        }

        impl $trait<f64> for &TimeSeries {
            type Output = TimeSeries;

            fn $method(self, rhs: f64) -> TimeSeries {
                self.map(|value| value $op rhs)
            }
        }

        impl $trait<f64> for TimeSeries {
            type Output = TimeSeries;

            fn $method(self, rhs: f64) -> TimeSeries {
                (&self).$method(rhs)
            }
        }
    };
}

series_binary_op!(Add, add, +);
series_binary_op!(Sub, sub, -);
series_binary_op!(Mul, mul, *);
series_binary_op!(Div, div, /);

impl Neg for &TimeSeries {
    type Output = TimeSeries;

    fn neg(self) -> TimeSeries {
        self.map(|value| -value)
    }
}

impl Neg for TimeSeries {
    type Output = TimeSeries;

    fn neg(self) -> TimeSeries {
        -&self
    }
}
