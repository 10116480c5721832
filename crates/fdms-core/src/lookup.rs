use crate::result_table::{LookupError, ResultTable};
use crate::timeseries::TimeSeries;

/// Anything series can be fetched from by `(country, code)`.
pub trait SeriesSource {
    fn get_series(&self, country: &str, code: &str) -> Result<&TimeSeries, LookupError>;
}

impl SeriesSource for ResultTable {
    fn get_series(&self, country: &str, code: &str) -> Result<&TimeSeries, LookupError> {
        self.get(country, code)
    }
}

pub fn get_series<'a, S: SeriesSource + ?Sized>(
    source: &'a S,
    country: &str,
    code: &str,
) -> Result<&'a TimeSeries, LookupError> {
    source.get_series(country, code)
}

/// Which of two sources a series came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sourced<'a> {
    Primary(&'a TimeSeries),
    Fallback(&'a TimeSeries),
    NotFound,
}

impl<'a> Sourced<'a> {
    pub fn series(self) -> Option<&'a TimeSeries> {
        match self {
            Sourced::Primary(series) | Sourced::Fallback(series) => Some(series),
            Sourced::NotFound => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Sourced::Primary(_) => "primary",
            Sourced::Fallback(_) => "fallback",
            Sourced::NotFound => "not_found",
        }
    }
}

/// Uses `primary` when it holds the key, else `fallback`.
pub fn choose_source<'a, P, F>(
    primary: &'a P,
    fallback: &'a F,
    country: &str,
    code: &str,
) -> Sourced<'a>
where
    P: SeriesSource + ?Sized,
    F: SeriesSource + ?Sized,
{
    if let Ok(series) = primary.get_series(country, code) {
        return Sourced::Primary(series);
    }
    match fallback.get_series(country, code) {
        Ok(series) => Sourced::Fallback(series),
        Err(LookupError::NotFound { .. }) => Sourced::NotFound,
    }
}
