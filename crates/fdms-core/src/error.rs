// crates/fdms-core/src/error.rs

use thiserror::Error;

use crate::config::ConfigError;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Input table could not be parsed: {0}")]
    Parser(#[from] fdms_parser::ParserError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Polars operation failed: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("CSV writing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown computation step '{0}'")]
    UnknownStep(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
