use csv::StringRecord;

use crate::errors::ParserError;

const MISSING_MARKERS: &[&str] = &["", "na", "n.a.", "n/a", "nan", "-", ":"];

const MIN_YEAR: i32 = 1800;
const MAX_YEAR: i32 = 2200;

pub(crate) fn find_column(header: &StringRecord, names: &[&str]) -> Option<usize> {
    header.iter().position(|field| {
        let trimmed = field.trim();
        names.iter().any(|name| trimmed.eq_ignore_ascii_case(name))
    })
}

/// Year columns are bare integers; anything else is a metadata column.
pub(crate) fn parse_year_header(value: &str) -> Option<i32> {
    value
        .trim()
        .parse::<i32>()
        .ok()
        .filter(|year| (MIN_YEAR..=MAX_YEAR).contains(year))
}

pub(crate) fn parse_observation(
    parser: &'static str,
    value: &str,
    line_index: usize,
    year: i32,
) -> Result<Option<f64>, ParserError> {
    let trimmed = value.trim();
    if MISSING_MARKERS
        .iter()
        .any(|marker| trimmed.eq_ignore_ascii_case(marker))
    {
        return Ok(None);
    }

    match trimmed.parse::<f64>() {
        Ok(parsed) if parsed.is_nan() => Ok(None),
        Ok(parsed) => Ok(Some(parsed)),
        Err(err) => Err(ParserError::DataRow {
            parser,
            line_index,
            message: format!("failed to parse value '{trimmed}' for year {year}: {err}"),
        }),
    }
}

pub(crate) fn clean_optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty() && *v != "-")
        .map(|v| v.to_string())
}
