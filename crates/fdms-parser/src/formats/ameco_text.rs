use csv::StringRecord;

use crate::errors::ParserError;
use crate::model::{ParsedRow, ParsedTable};
use crate::registry::TableParser;

use super::{clean_optional, find_column, parse_observation, parse_year_header};

/// AMECO country prefixes are ISO 3166 alpha-3; the forecast tables use alpha-2.
const COUNTRY_ALIASES: &[(&str, &str)] = &[
    ("AUT", "AT"),
    ("BEL", "BE"),
    ("BGR", "BG"),
    ("CYP", "CY"),
    ("CZE", "CZ"),
    ("DEU", "DE"),
    ("DNK", "DK"),
    ("ESP", "ES"),
    ("EST", "EE"),
    ("FIN", "FI"),
    ("FRA", "FR"),
    ("GBR", "UK"),
    ("GRC", "EL"),
    ("HRV", "HR"),
    ("HUN", "HU"),
    ("IRL", "IE"),
    ("ITA", "IT"),
    ("JPN", "JP"),
    ("LTU", "LT"),
    ("LUX", "LU"),
    ("LVA", "LV"),
    ("MLT", "MT"),
    ("NLD", "NL"),
    ("POL", "PL"),
    ("PRT", "PT"),
    ("ROM", "RO"),
    ("SVK", "SK"),
    ("SVN", "SI"),
    ("SWE", "SE"),
    ("USA", "US"),
];

/// Semicolon separated AMECO export:
/// `CODE;COUNTRY;SUB-CHAPTER;TITLE;UNIT;1960;1961;...`, where `CODE` is
/// `<country>.<d1>.<d2>.<d3>.<d4>.<mnemonic>`.
pub struct AmecoTextParser;

impl Default for AmecoTextParser {
    fn default() -> Self {
        Self
    }
}

impl AmecoTextParser {
    const NAME: &'static str = "AMECO_TEXT";

    fn normalize_country(raw: &str) -> String {
        COUNTRY_ALIASES
            .iter()
            .find(|(alpha3, _)| raw.eq_ignore_ascii_case(alpha3))
            .map(|(_, alpha2)| alpha2.to_string())
            .unwrap_or_else(|| raw.to_ascii_uppercase())
    }

    /// `BEL.1.0.0.0.UVGD` becomes (`BE`, `UVGD.1.0.0.0`).
    fn split_code(raw: &str, line_index: usize) -> Result<(String, String), ParserError> {
        let parts: Vec<&str> = raw.trim().split('.').map(str::trim).collect();
        if parts.len() < 3 || parts.iter().any(|part| part.is_empty()) {
            return Err(ParserError::DataRow {
                parser: Self::NAME,
                line_index,
                message: format!("malformed AMECO code '{raw}'"),
            });
        }

        let country = Self::normalize_country(parts[0]);
        let mnemonic = parts[parts.len() - 1];
        let dimensions = &parts[1..parts.len() - 1];
        Ok((country, format!("{mnemonic}.{}", dimensions.join("."))))
    }

    fn parse_row(
        record: &StringRecord,
        code_idx: usize,
        unit_idx: Option<usize>,
        years: &[(usize, i32)],
        line_index: usize,
    ) -> Result<ParsedRow, ParserError> {
        let raw_code = record.get(code_idx).unwrap_or_default();
        let (country, variable_code) = Self::split_code(raw_code, line_index)?;

        let mut observations = Vec::with_capacity(years.len());
        for (idx, year) in years {
            let raw = record.get(*idx).unwrap_or_default();
            observations.push((*year, parse_observation(Self::NAME, raw, line_index, *year)?));
        }

        Ok(ParsedRow {
            country,
            variable_code,
            frequency: None,
            scale_label: clean_optional(unit_idx.and_then(|idx| record.get(idx))),
            observations,
        })
    }
}

impl TableParser for AmecoTextParser {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn parse(&self, content: &str) -> Result<ParsedTable, ParserError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b';')
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

        let first = header.get(0).map(str::trim).unwrap_or_default();
        if !first.eq_ignore_ascii_case("code") {
            return Err(ParserError::FormatMismatch {
                parser: Self::NAME,
                reason: format!("expected leading CODE column, found '{first}'"),
            });
        }

        let unit_idx = find_column(&header, &["UNIT"]);
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

        let mut rows = Vec::new();
        for (row_idx, record) in records.enumerate() {
            let record = record.map_err(|err| ParserError::Csv {
                parser: Self::NAME,
                source: err,
            })?;
            let line_index = row_idx + 1;

            if record.iter().all(|field| field.trim().is_empty()) {
                continue;
            }

            rows.push(Self::parse_row(&record, 0, unit_idx, &years, line_index)?);
        }

        if rows.is_empty() {
            return Err(ParserError::EmptyData { parser: Self::NAME });
        }

        Ok(ParsedTable::new(Self::NAME, rows))
    }
}
