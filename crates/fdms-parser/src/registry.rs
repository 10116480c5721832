use crate::errors::{ParserAttempt, ParserError};
use crate::formats::{AmecoTextParser, WideCsvParser};
use crate::model::ParsedTable;

pub trait TableParser {
    fn name(&self) -> &'static str;
    fn parse(&self, content: &str) -> Result<ParsedTable, ParserError>;
}

pub fn parse_table(content: &str) -> Result<ParsedTable, ParserError> {
    let wide_csv = WideCsvParser;
    let ameco_text = AmecoTextParser;
    let parsers: [&dyn TableParser; 2] = [&wide_csv, &ameco_text];
    parse_with_parsers(content, &parsers)
}

pub fn parse_with_parsers(
    content: &str,
    parsers: &[&dyn TableParser],
) -> Result<ParsedTable, ParserError> {
    let mut attempts = Vec::new();

    for parser in parsers {
        match parser.parse(content) {
            Ok(parsed) => return Ok(parsed),
            Err(ParserError::FormatMismatch { reason, .. }) => {
                attempts.push(ParserAttempt::new(parser.name(), reason));
            }
            Err(err) => return Err(err),
        }
    }

    Err(ParserError::NoMatchingParser { attempts })
}
