use csv::StringRecord;

use crate::errors::ParserError;
use crate::model::{ParsedRow, ParsedTable};
use crate::registry::TableParser;

use super::{clean_optional, find_column, parse_observation, parse_year_header};

const COUNTRY_HEADERS: &[&str] = &["Country", "Country Ameco"];
const CODE_HEADERS: &[&str] = &["Variable Code", "Variable"];
const FREQUENCY_HEADERS: &[&str] = &["Frequency"];
const SCALE_HEADERS: &[&str] = &["Scale"];

/// Comma separated table with one row per variable:
/// `Country, Variable Code, Frequency, Scale, 1960, 1961, ...`.
pub struct WideCsvParser;

impl Default for WideCsvParser {
    fn default() -> Self {
        Self
    }
}

struct Layout {
    country: usize,
    code: usize,
    frequency: Option<usize>,
    scale: Option<usize>,
    years: Vec<(usize, i32)>,
}

impl WideCsvParser {
    const NAME: &'static str = "WIDE_CSV";

    fn layout(header: &StringRecord) -> Result<Layout, ParserError> {
        let country = find_column(header, COUNTRY_HEADERS);
        let code = find_column(header, CODE_HEADERS);

        let (country, code) = match (country, code) {
            (None, None) => {
                return Err(ParserError::FormatMismatch {
                    parser: Self::NAME,
                    reason: "header has neither a country nor a variable code column".to_string(),
                })
            }
            (None, Some(_)) => {
                return Err(ParserError::MissingColumn {
                    parser: Self::NAME,
                    column: "Country",
                })
            }
            (Some(_), None) => {
                return Err(ParserError::MissingColumn {
                    parser: Self::NAME,
                    column: "Variable Code",
                })
            }
            (Some(country), Some(code)) => (country, code),
        };

        let years: Vec<(usize, i32)> = header
            .iter()
            .enumerate()
            .filter_map(|(idx, field)| parse_year_header(field).map(|year| (idx, year)))
            .collect();
        if years.is_empty() {
            return Err(ParserError::InvalidHeader {
                parser: Self::NAME,
                message: "no year columns found".to_string(),
            });
        }

        Ok(Layout {
            country,
            code,
            frequency: find_column(header, FREQUENCY_HEADERS),
            scale: find_column(header, SCALE_HEADERS),
            years,
        })
    }

    fn parse_row(
        layout: &Layout,
        record: &StringRecord,
        line_index: usize,
    ) -> Result<ParsedRow, ParserError> {
        let country = record.get(layout.country).map(str::trim).unwrap_or_default();
        let code = record.get(layout.code).map(str::trim).unwrap_or_default();
        if country.is_empty() || code.is_empty() {
            return Err(ParserError::DataRow {
                parser: Self::NAME,
                line_index,
                message: "row is missing its country or variable code".to_string(),
            });
        }

        let mut observations = Vec::with_capacity(layout.years.len());
        for (idx, year) in &layout.years {
            let raw = record.get(*idx).unwrap_or_default();
            observations.push((*year, parse_observation(Self::NAME, raw, line_index, *year)?));
        }

        Ok(ParsedRow {
            country: country.to_string(),
            variable_code: code.to_string(),
            frequency: clean_optional(layout.frequency.and_then(|idx| record.get(idx))),
            scale_label: clean_optional(layout.scale.and_then(|idx| record.get(idx))),
            observations,
        })
    }
}

impl TableParser for WideCsvParser {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn parse(&self, content: &str) -> Result<ParsedTable, ParserError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(content.as_bytes());

        let mut records = reader.records();

        let header = records
            .next()
            .ok_or(ParserError::FormatMismatch {
                parser: Self::NAME,
                reason: "table missing header row".to_string(),
            })?
            .map_err(|err| ParserError::Csv {
                parser: Self::NAME,
                source: err,
            })?;
        let layout = Self::layout(&header)?;

        let mut rows = Vec::new();
        for (row_idx, record) in records.enumerate() {
            let record = record.map_err(|err| ParserError::Csv {
                parser: Self::NAME,
                source: err,
            })?;
            // header is line 0
            let line_index = row_idx + 1;

            if record.iter().all(|field| field.trim().is_empty()) {
                continue;
            }
            if record.len() != header.len() {
                return Err(ParserError::DataRow {
                    parser: Self::NAME,
                    line_index,
                    message: format!(
                        "expected {} fields, found {}",
                        header.len(),
                        record.len()
                    ),
                });
            }

            rows.push(Self::parse_row(&layout, &record, line_index)?);
        }

        if rows.is_empty() {
            return Err(ParserError::EmptyData { parser: Self::NAME });
        }

        Ok(ParsedTable::new(Self::NAME, rows))
    }
}
