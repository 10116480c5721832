pub mod errors;
pub mod formats;
pub mod model;
mod registry;

pub use errors::{ParserAttempt, ParserError};
pub use model::{ParsedRow, ParsedTable};
pub use registry::{parse_table, parse_with_parsers, TableParser};
