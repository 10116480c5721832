use std::collections::BTreeSet;
use std::io::{Cursor, Write};

use chrono::{DateTime, Utc};
use polars::io::parquet::write::{ParquetCompression, ParquetWriter, StatisticsOptions};
use polars::prelude::*;
use serde::Serialize;

use crate::config::RunSettings;
use crate::error::Result;
use crate::ingestion::InputFileReport;
use crate::pipeline::PipelineOutput;
use crate::result_table::ResultTable;
use crate::step::StepReport;
use crate::timeseries::{Year, YearWindow};

pub const COUNTRY_COLUMN: &str = "Country";
pub const VARIABLE_COLUMN: &str = "Variable Code";
pub const FREQUENCY_COLUMN: &str = "Frequency";
pub const SCALE_COLUMN: &str = "Scale";

/// Every year any live row covers, limited to `window` when given.
fn export_years(table: &ResultTable, window: Option<YearWindow>) -> Vec<Year> {
    let years: BTreeSet<Year> = table
        .live_records()
        .flat_map(|record| record.series.years())
        .filter(|year| window.map_or(true, |window| window.contains(*year)))
        .collect();
    years.into_iter().collect()
}

/// Wide frame of the live rows: metadata columns, then one `f64` column per
/// year.
pub fn to_dataframe(table: &ResultTable, window: Option<YearWindow>) -> PolarsResult<DataFrame> {
    let years = export_years(table, window);
    let records: Vec<_> = table.live_records().collect();

    let countries: Vec<&str> = records.iter().map(|r| r.country.as_str()).collect();
    let codes: Vec<&str> = records.iter().map(|r| r.code.as_str()).collect();
    let frequencies: Vec<&str> = records.iter().map(|r| r.frequency.as_str()).collect();
    let scales: Vec<&str> = records.iter().map(|r| r.scale.as_str()).collect();

    let mut columns: Vec<Column> = Vec::with_capacity(4 + years.len());
    columns.push(Series::new(COUNTRY_COLUMN.into(), countries).into());
    columns.push(Series::new(VARIABLE_COLUMN.into(), codes).into());
    columns.push(Series::new(FREQUENCY_COLUMN.into(), frequencies).into());
    columns.push(Series::new(SCALE_COLUMN.into(), scales).into());
    for year in years {
        let values: Vec<Option<f64>> = records.iter().map(|r| r.series.get(year)).collect();
        columns.push(Series::new(year.to_string().into(), values).into());
    }

    DataFrame::new(columns)
}

/// Same layout as [`to_dataframe`]; gaps are written as empty fields.
pub fn write_csv<W: Write>(table: &ResultTable, window: Option<YearWindow>, writer: W) -> Result<()> {
    let years = export_years(table, window);
    let mut csv_writer = csv::Writer::from_writer(writer);

    let mut header = vec![
        COUNTRY_COLUMN.to_string(),
        VARIABLE_COLUMN.to_string(),
        FREQUENCY_COLUMN.to_string(),
        SCALE_COLUMN.to_string(),
    ];
    header.extend(years.iter().map(|year| year.to_string()));
    csv_writer.write_record(&header)?;

    for record in table.live_records() {
        let mut row = vec![
            record.country.clone(),
            record.code.clone(),
            record.frequency.as_str().to_string(),
            record.scale.as_str().to_string(),
        ];
        row.extend(years.iter().map(|year| {
            record
                .series
                .get(*year)
                .map(|value| value.to_string())
                .unwrap_or_default()
        }));
        csv_writer.write_record(&row)?;
    }

    csv_writer.flush()?;
    Ok(())
}

pub fn parquet_bytes(table: &ResultTable, window: Option<YearWindow>) -> Result<Vec<u8>> {
    let mut df = to_dataframe(table, window)?;
    let mut buffer = Vec::new();
    {
        let mut cursor = Cursor::new(&mut buffer);
        ParquetWriter::new(&mut cursor)
            .with_compression(ParquetCompression::Zstd(None))
            .with_statistics(StatisticsOptions::default())
            .finish(&mut df)?;
    }
    Ok(buffer)
}

/// Machine-readable record of one run, written next to the exported table.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub generated_at: DateTime<Utc>,
    pub country: String,
    pub window: YearWindow,
    pub variables: usize,
    pub inputs: Vec<InputFileReport>,
    pub steps: Vec<StepReport>,
}

impl RunSummary {
    pub fn new(settings: &RunSettings, inputs: Vec<InputFileReport>, output: &PipelineOutput) -> Self {
        Self {
            generated_at: Utc::now(),
            country: settings.country.clone(),
            window: settings.window,
            variables: output.table.len(),
            inputs,
            steps: output.reports.clone(),
        }
    }

    pub fn skipped_count(&self) -> usize {
        self.steps.iter().map(|step| step.skipped.len()).sum()
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }
}
