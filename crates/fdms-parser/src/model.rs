use std::collections::{BTreeMap, BTreeSet};

use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// One variable row of a raw input table: the key, the declared metadata and
/// the per-year observations in file order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedRow {
    pub country: String,
    pub variable_code: String,
    pub frequency: Option<String>,
    pub scale_label: Option<String>,
    pub observations: Vec<(i32, Option<f64>)>,
}

impl ParsedRow {
    pub fn value(&self, year: i32) -> Option<f64> {
        self.observations
            .iter()
            .find(|(y, _)| *y == year)
            .and_then(|(_, value)| *value)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedTable {
    pub format: String,
    pub rows: Vec<ParsedRow>,
}

impl ParsedTable {
    pub fn new(format: impl Into<String>, rows: Vec<ParsedRow>) -> Self {
        Self {
            format: format.into(),
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Sorted, de-duplicated years covered by any row.
    pub fn years(&self) -> Vec<i32> {
        let years: BTreeSet<i32> = self
            .rows
            .iter()
            .flat_map(|row| row.observations.iter().map(|(year, _)| *year))
            .collect();
        years.into_iter().collect()
    }

    pub fn countries(&self) -> Vec<&str> {
        let countries: BTreeSet<&str> = self.rows.iter().map(|row| row.country.as_str()).collect();
        countries.into_iter().collect()
    }

    pub fn rows_for_country<'a>(&'a self, country: &'a str) -> impl Iterator<Item = &'a ParsedRow> {
        self.rows.iter().filter(move |row| row.country == country)
    }

    /// Wide frame: key and metadata columns followed by one `f64` column per year.
    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let years = self.years();
        let height = self.rows.len();

        let mut year_values: BTreeMap<i32, Vec<Option<f64>>> = years
            .iter()
            .map(|year| (*year, vec![None; height]))
            .collect();
        for (idx, row) in self.rows.iter().enumerate() {
            for (year, value) in &row.observations {
                if let Some(column) = year_values.get_mut(year) {
                    column[idx] = *value;
                }
            }
        }

        let countries: Vec<&str> = self.rows.iter().map(|row| row.country.as_str()).collect();
        let codes: Vec<&str> = self
            .rows
            .iter()
            .map(|row| row.variable_code.as_str())
            .collect();
        let frequencies: Vec<Option<&str>> = self
            .rows
            .iter()
            .map(|row| row.frequency.as_deref())
            .collect();
        let scales: Vec<Option<&str>> = self
            .rows
            .iter()
            .map(|row| row.scale_label.as_deref())
            .collect();

        let mut columns: Vec<Column> = Vec::with_capacity(4 + year_values.len());
        columns.push(Series::new("country".into(), countries).into());
        columns.push(Series::new("variable_code".into(), codes).into());
        columns.push(Series::new("frequency".into(), frequencies).into());
        columns.push(Series::new("scale".into(), scales).into());
        for (year, values) in year_values {
            columns.push(Series::new(year.to_string().into(), values).into());
        }

        DataFrame::new(columns)
    }
}
