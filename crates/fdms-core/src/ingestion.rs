use std::fs;
use std::path::Path;

use blake3::Hasher;
use fdms_parser::{parse_table, ParsedTable};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::pipeline::PipelineInputs;
use crate::result_table::{Frequency, ResultTable, VariableRecord};
use crate::scale::{ObservedScales, Scale};
use crate::timeseries::TimeSeries;

/// Provenance of one input file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputFileReport {
    pub role: &'static str,
    pub path: String,
    pub hash: String,
    pub format: String,
    pub rows: usize,
}

#[derive(Debug, Clone)]
pub struct LoadedTable {
    pub parsed: ParsedTable,
    pub report: InputFileReport,
}

pub fn compute_hash(contents: &[u8]) -> String {
    let mut hasher = Hasher::new();
    hasher.update(contents);
    hasher.finalize().to_hex().to_string()
}

pub fn load_table(path: &Path) -> Result<ParsedTable> {
    Ok(load_input("table", path)?.parsed)
}

pub fn load_input(role: &'static str, path: &Path) -> Result<LoadedTable> {
    let contents = fs::read_to_string(path)?;
    let parsed = parse_table(&contents)?;
    let report = InputFileReport {
        role,
        path: path.display().to_string(),
        hash: compute_hash(contents.as_bytes()),
        format: parsed.format.clone(),
        rows: parsed.len(),
    };
    info!(
        role,
        path = %report.path,
        format = %report.format,
        rows = report.rows,
        "loaded input table"
    );
    Ok(LoadedTable { parsed, report })
}

/// Unrecognised frequency labels fall back to annual and labels without a
/// known magnitude to `default_scale`. A repeated key keeps its last row
/// live.
pub fn table_from_parsed(parsed: &ParsedTable, default_scale: Scale) -> ResultTable {
    let mut table = ResultTable::new();
    for row in &parsed.rows {
        let frequency = match row.frequency.as_deref().map(str::parse::<Frequency>) {
            Some(Ok(frequency)) => frequency,
            Some(Err(err)) => {
                warn!(
                    country = %row.country,
                    variable = %row.variable_code,
                    error = %err,
                    "unrecognised frequency; assuming annual"
                );
                Frequency::Annual
            }
            None => Frequency::Annual,
        };
        let scale = row
            .scale_label
            .as_deref()
            .and_then(Scale::from_label)
            .unwrap_or(default_scale);
        let series: TimeSeries = row.observations.iter().copied().collect();

        table.append(VariableRecord::new(
            row.country.as_str(),
            row.variable_code.as_str(),
            frequency,
            scale,
            series,
        ));
    }
    table
}

/// Scale labels declared for `country`'s rows. Rows without a label are left
/// out; labels with no recognisable magnitude are kept as unknown.
pub fn observed_scales(parsed: &ParsedTable, country: &str) -> ObservedScales {
    parsed
        .rows_for_country(country)
        .filter_map(|row| {
            row.scale_label
                .as_deref()
                .map(|label| (row.variable_code.clone(), Scale::from_label(label)))
        })
        .collect()
}

/// Reads every configured input. Missing history or reference files leave
/// the corresponding table empty.
pub fn load_inputs(config: &PipelineConfig) -> Result<(PipelineInputs, Vec<InputFileReport>)> {
    let mut reports = Vec::new();

    let forecast = load_input("forecast", &config.inputs.forecast)?;
    let observed = observed_scales(&forecast.parsed, &config.country);
    let forecast_table = table_from_parsed(&forecast.parsed, config.default_scale);
    reports.push(forecast.report);

    let mut optional = |role: &'static str, path: Option<&Path>| -> Result<ResultTable> {
        match path {
            Some(path) => {
                let loaded = load_input(role, path)?;
                let table = table_from_parsed(&loaded.parsed, config.default_scale);
                reports.push(loaded.report);
                Ok(table)
            }
            None => {
                info!(role, "no input configured; using an empty table");
                Ok(ResultTable::new())
            }
        }
    };
    let history = optional("history", config.inputs.history.as_deref())?;
    let reference = optional("reference", config.inputs.reference.as_deref())?;

    Ok((
        PipelineInputs {
            forecast: forecast_table,
            history,
            reference,
            observed_scales: observed,
        },
        reports,
    ))
}
