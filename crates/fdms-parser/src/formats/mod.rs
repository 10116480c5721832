mod ameco_text;
mod common;
mod wide_csv;

pub use ameco_text::AmecoTextParser;
pub use wide_csv::WideCsvParser;

pub(crate) use common::{clean_optional, find_column, parse_observation, parse_year_header};
