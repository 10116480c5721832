use anyhow::Result;
use fdms_core::config::RunSettings;
use fdms_core::outputs::{parquet_bytes, to_dataframe, write_csv, RunSummary};
use fdms_core::pipeline::PipelineOutput;
use fdms_core::result_table::{Frequency, ResultTable, VariableRecord};
use fdms_core::scale::Scale;
use fdms_core::step::StepReport;
use fdms_core::timeseries::{TimeSeries, YearWindow};

fn sample_table() -> ResultTable {
    let mut gappy = TimeSeries::from([(2000, 3.5)]);
    gappy.insert(2001, None);

    vec![
        VariableRecord::new(
            "BE",
            "OKND.1.0.0.0",
            Frequency::Annual,
            Scale::Billions,
            TimeSeries::from([(1999, 1.0), (2000, 2.0), (2001, 2.5)]),
        ),
        VariableRecord::new("BE", "KNP.1.0.212.0", Frequency::Annual, Scale::Units, gappy),
        VariableRecord::new(
            "BE",
            "OKND.1.0.0.0",
            Frequency::Annual,
            Scale::Billions,
            TimeSeries::from([(2000, 4.0), (2001, 5.0)]),
        ),
    ]
    .into_iter()
    .collect()
}

#[test]
fn dataframe_has_metadata_then_year_columns() -> Result<()> {
    let df = to_dataframe(&sample_table(), None)?;

    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();
    assert_eq!(
        names,
        vec!["Country", "Variable Code", "Frequency", "Scale", "2000", "2001"]
    );
    assert_eq!(df.height(), 2);

    let codes = df.column("Variable Code")?.str()?;
    assert_eq!(codes.get(0), Some("KNP.1.0.212.0"));
    assert_eq!(codes.get(1), Some("OKND.1.0.0.0"));

    let y2001 = df.column("2001")?.f64()?;
    assert_eq!(y2001.get(0), None);
    assert_eq!(y2001.get(1), Some(5.0));
    Ok(())
}

#[test]
fn window_limits_exported_years() -> Result<()> {
    let df = to_dataframe(&sample_table(), Some(YearWindow::new(2001, 2005)))?;
    assert_eq!(df.width(), 5);
    assert!(df.column("2000").is_err());
    Ok(())
}

#[test]
fn csv_writes_gaps_as_empty_fields() -> Result<()> {
    let mut buffer = Vec::new();
    write_csv(&sample_table(), None, &mut buffer)?;
    let text = String::from_utf8(buffer)?;
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(lines[0], "Country,Variable Code,Frequency,Scale,2000,2001");
    assert_eq!(lines[1], "BE,KNP.1.0.212.0,Annual,Units,3.5,");
    assert_eq!(lines[2], "BE,OKND.1.0.0.0,Annual,Billions,4,5");
    assert_eq!(lines.len(), 3);
    Ok(())
}

#[test]
fn parquet_export_produces_parquet_file() -> Result<()> {
    let bytes = parquet_bytes(&sample_table(), None)?;
    assert!(bytes.starts_with(b"PAR1"));
    assert!(bytes.ends_with(b"PAR1"));
    Ok(())
}

#[test]
fn run_summary_serializes_step_reports() -> Result<()> {
    let settings = RunSettings::new("BE", YearWindow::new(2000, 2001));
    let output = PipelineOutput {
        table: sample_table().deduplicated(),
        reports: vec![StepReport {
            step: "capital_stock".into(),
            published: vec!["OKND.1.0.0.0".into()],
            ..StepReport::default()
        }],
    };

    let summary = RunSummary::new(&settings, Vec::new(), &output);
    assert_eq!(summary.variables, 2);
    assert_eq!(summary.skipped_count(), 0);

    let json: serde_json::Value = serde_json::from_slice(&summary.to_json()?)?;
    assert_eq!(json["country"], "BE");
    assert_eq!(json["window"]["first"], 2000);
    assert_eq!(json["steps"][0]["step"], "capital_stock");
    assert!(json["generated_at"].is_string());
    Ok(())
}
