use anyhow::Result;
use fdms_core::config::RunSettings;
use fdms_core::result_table::{Frequency, ResultTable, VariableRecord};
use fdms_core::scale::{ObservedScales, Scale};
use fdms_core::splicer::{SpliceDirection, SpliceMethod, SpliceOutcome};
use fdms_core::step::{ComputationStep, StepContext, StepInputs, StepOutput};
use fdms_core::steps::{CapitalStock, RecalculateUvgdh, SumAndSplice, SumAndSpliceRule};
use fdms_core::timeseries::{TimeSeries, YearWindow};

fn table(rows: Vec<(&str, TimeSeries)>) -> ResultTable {
    rows.into_iter()
        .map(|(code, series)| {
            VariableRecord::new("BE", code, Frequency::Annual, Scale::Billions, series)
        })
        .collect()
}

fn constant(first: i32, last: i32, value: f64) -> TimeSeries {
    (first..=last).map(|year| (year, value)).collect()
}

fn approx(actual: Option<f64>, expected: f64) {
    let actual = actual.expect("value present");
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}

struct Tables {
    forecast: ResultTable,
    history: ResultTable,
    reference: ResultTable,
    accumulated: ResultTable,
    observed: ObservedScales,
}

impl Tables {
    fn new(forecast: ResultTable, history: ResultTable, reference: ResultTable) -> Self {
        Self {
            forecast,
            history,
            reference,
            accumulated: ResultTable::new(),
            observed: ObservedScales::new(),
        }
    }

    fn run(&self, step: &dyn ComputationStep, settings: &RunSettings) -> Result<StepOutput> {
        let inputs = StepInputs {
            forecast: &self.forecast,
            history: &self.history,
            reference: &self.reference,
            accumulated: &self.accumulated,
            observed_scales: &self.observed,
        };
        let ctx = StepContext::new(step.code_identifier(), settings, &self.observed);
        Ok(step.perform(ctx, &inputs)?)
    }
}

#[test]
fn sum_and_splice_butt_splices_signed_sum_onto_history() -> Result<()> {
    let forecast = table(vec![
        ("UXGN.1.0.0.0", TimeSeries::from([(2000, 50.0), (2001, 60.0)])),
        ("UMGN.1.0.0.0", TimeSeries::from([(2000, 20.0), (2001, 25.0), (2002, 30.0)])),
    ]);
    let history = table(vec![(
        "UBGN.1.0.0.0",
        TimeSeries::from([(1999, 28.0), (2000, 31.0)]),
    )]);
    let tables = Tables::new(forecast, history, ResultTable::new());
    let step = SumAndSplice::new(vec![
        SumAndSpliceRule::new("UBGN.1.0.0.0", ["UXGN.1.0.0.0", "-UMGN.1.0.0.0"]),
        SumAndSpliceRule::new("UTOT.1.0.0.0", ["UBGN.1.0.0.0", "UXGN.1.0.0.0"]),
    ]);
    let settings = RunSettings::new("BE", YearWindow::new(1999, 2002));

    let output = tables.run(&step, &settings)?;

    let ubgn = output.table.get("BE", "UBGN.1.0.0.0")?;
    assert_eq!(ubgn.get(1999), Some(28.0));
    assert_eq!(ubgn.get(2000), Some(31.0));
    assert_eq!(ubgn.get(2001), Some(36.0));
    assert_eq!(ubgn.get(2002), Some(-29.0));

    let splice = output
        .report
        .splice_for("UBGN.1.0.0.0")
        .expect("splice recorded");
    assert_eq!(splice.method, SpliceMethod::Butt);
    assert_eq!(splice.direction, SpliceDirection::Forward);

    // UTOT has no history: the raw sum of the spliced UBGN and UXGN
    let utot = output.table.get("BE", "UTOT.1.0.0.0")?;
    assert_eq!(utot.get(2000), Some(81.0));
    assert_eq!(utot.get(2002), Some(-29.0));
    Ok(())
}

#[test]
fn sum_and_splice_skips_variable_with_missing_addend() -> Result<()> {
    let forecast = table(vec![("UXGN.1.0.0.0", TimeSeries::from([(2000, 1.0)]))]);
    let tables = Tables::new(forecast, ResultTable::new(), ResultTable::new());
    let step = SumAndSplice::new(vec![SumAndSpliceRule::new(
        "UBGN.1.0.0.0",
        ["UXGN.1.0.0.0", "-UMGN.1.0.0.0"],
    )]);
    let settings = RunSettings::new("BE", YearWindow::new(2000, 2001));

    let output = tables.run(&step, &settings)?;

    assert!(output.table.is_empty());
    assert!(output.report.was_skipped("UBGN.1.0.0.0"));
    Ok(())
}

#[test]
fn sum_and_splice_can_ratio_splice() -> Result<()> {
    let forecast = table(vec![("A", TimeSeries::from([(2000, 2.0), (2001, 3.0)]))]);
    let history = table(vec![("TOTAL", TimeSeries::from([(2000, 4.0)]))]);
    let tables = Tables::new(forecast, history, ResultTable::new());
    let step = SumAndSplice::new(vec![
        SumAndSpliceRule::new("TOTAL", ["A"]).with_method(SpliceMethod::Ratio)
    ]);
    let settings = RunSettings::new("BE", YearWindow::new(2000, 2001));

    let output = tables.run(&step, &settings)?;
    assert_eq!(output.table.get("BE", "TOTAL")?.get(2001), Some(6.0));
    Ok(())
}

#[test]
fn uvgdh_splices_history_forward_and_corrects_scale() -> Result<()> {
    let forecast = table(vec![(
        "UVGDH.1.0.0.0",
        TimeSeries::from([(1995, 90.0), (1996, 100.0)]),
    )]);
    let history = table(vec![
        (
            "UVGDH.1.0.0.0",
            TimeSeries::from([(1993, 170.0), (1994, 176.0), (1995, 180.0)]),
        ),
        ("KNP.1.0.212.0", TimeSeries::from([(1995, 1001.0)])),
    ]);
    let mut tables = Tables::new(forecast, history, ResultTable::new());
    tables.observed = [("UVGDH", Some(Scale::Millions))].into_iter().collect();
    let settings = RunSettings::new("BE", YearWindow::new(1993, 1996))
        .with_expected_scale("UVGDH", Scale::Billions);

    let output = tables.run(&RecalculateUvgdh, &settings)?;

    let uvgdh = output.table.get_record("BE", "UVGDH")?;
    assert_eq!(uvgdh.scale, Scale::Billions);
    assert_eq!(uvgdh.series.get(1993), Some(170_000.0));
    assert_eq!(uvgdh.series.get(1996), Some(200_000.0));
    assert_eq!(
        output.report.scale_corrections.rescaled,
        vec![("UVGDH".to_string(), 1000.0)]
    );
    assert_eq!(output.report.scale_discrepancies.len(), 1);
    assert_eq!(output.report.sources[0].source, "primary");

    let knp = output.table.get_record("BE", "KNP.1.0.212.0")?;
    assert_eq!(knp.series.get(1995), Some(1001.0));
    assert_eq!(knp.scale, Scale::Units);
    Ok(())
}

#[test]
fn uvgdh_falls_back_to_forecast_aggregate() -> Result<()> {
    let forecast = table(vec![("UVGDH", TimeSeries::from([(2000, 5.0)]))]);
    let tables = Tables::new(forecast, ResultTable::new(), ResultTable::new());
    let settings = RunSettings::new("BE", YearWindow::new(2000, 2000));

    let output = tables.run(&RecalculateUvgdh, &settings)?;

    assert_eq!(output.table.get("BE", "UVGDH")?.get(2000), Some(5.0));
    assert_eq!(output.report.sources[0].source, "fallback");
    assert!(output.report.splices.is_empty());
    assert!(output.report.was_skipped("KNP.1.0.212.0"));
    Ok(())
}

#[test]
fn uvgdh_is_skipped_without_any_source() -> Result<()> {
    let tables = Tables::new(ResultTable::new(), ResultTable::new(), ResultTable::new());
    let settings = RunSettings::new("BE", YearWindow::new(2000, 2000));

    let output = tables.run(&RecalculateUvgdh, &settings)?;

    assert!(output.table.is_empty());
    assert!(output.report.was_skipped("UVGDH"));
    assert_eq!(output.report.sources[0].source, "not_found");
    Ok(())
}

fn capital_stock_tables() -> Tables {
    let forecast = table(vec![
        ("OIGT.1.0.0.0", constant(2000, 2004, 10.0)),
        ("UIGT.1.0.0.0", constant(2000, 2004, 20.0)),
        ("OVGD.1.0.0.0", constant(2000, 2004, 100.0)),
        ("NLHT9.1.0.0.0", constant(2000, 2004, 1.0)),
    ]);
    let history = table(vec![("UKCT.1.0.0.0", constant(2000, 2002, 4.0))]);
    let reference = table(vec![
        ("OVGD.1.0.0.0", constant(1998, 2004, 100.0)),
        ("OIGT.1.0.0.0", constant(1999, 2004, 5.0)),
        ("OINT.1.0.0.0", constant(1999, 2004, 2.0)),
    ]);
    Tables::new(forecast, history, reference)
}

#[test]
fn capital_stock_projects_stock_and_consumption() -> Result<()> {
    let tables = capital_stock_tables();
    let settings = RunSettings::new("BE", YearWindow::new(2000, 2004));

    let output = tables.run(&CapitalStock, &settings)?;

    // reference OIGT is half the forecast level at the overlap year
    let oigt = output.table.get("BE", "OIGT.1.0.0.0")?;
    assert_eq!(oigt.first_year(), Some(2000));
    assert_eq!(oigt.get(2000), Some(10.0));
    match &output.report.splice_for("OIGT.1.0.0.0").expect("splice").outcome {
        SpliceOutcome::Extended { factor, .. } => assert_eq!(*factor, 2.0),
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(output.table.get("BE", "UIGT.1.0.0.0")?.get(2004), Some(20.0));

    // anchor 1998 at three times output, then reference net investment
    let oknd = output.table.get("BE", "OKND.1.0.0.0")?;
    approx(oknd.get(2000), 304.0);
    approx(oknd.get(2002), 308.0);
    assert_eq!(oknd.first_year(), Some(2000));

    let okct = output.table.get("BE", "OKCT.1.0.0.0")?;
    approx(okct.get(2002), 2.0);
    let okct_2003 = 308.0 * 2.0 / 306.0;
    approx(okct.get(2003), okct_2003);
    let knd_2003 = 308.0 + 10.0 - okct_2003;
    approx(oknd.get(2003), knd_2003);
    let okct_2004 = knd_2003 * okct_2003 / 308.0;
    approx(okct.get(2004), okct_2004);
    approx(oknd.get(2004), knd_2003 + 10.0 - okct_2004);

    let oint = output.table.get("BE", "OINT.1.0.0.0")?;
    approx(oint.get(2001), 8.0);
    approx(oint.get(2003), 10.0 - okct_2003);

    let ukct = output.table.get("BE", "UKCT.1.0.0.0")?;
    approx(ukct.get(2002), 4.0);
    approx(ukct.get(2004), okct_2004 * 20.0 / 10.0);

    let tfp = output.table.get("BE", "ZVGDFA3.3.0.0.0")?;
    let expected = (100.0 / (1000f64.powf(0.65) * 304f64.powf(0.35))).ln();
    approx(tfp.get(2000), expected);

    for record in output.table.live_records() {
        assert_eq!(record.scale, Scale::Billions, "{}", record.code);
    }
    assert_eq!(output.table.len(), output.table.key_count());
    assert!(output.report.skipped.is_empty());
    Ok(())
}

#[test]
fn capital_stock_skips_tfp_without_hours() -> Result<()> {
    let mut tables = capital_stock_tables();
    tables.forecast = tables.forecast.filter_codes(&[
        "OIGT.1.0.0.0",
        "UIGT.1.0.0.0",
        "OVGD.1.0.0.0",
    ]);
    let settings = RunSettings::new("BE", YearWindow::new(2000, 2004));

    let output = tables.run(&CapitalStock, &settings)?;

    assert!(output.table.contains("BE", "OKND.1.0.0.0"));
    assert!(!output.table.contains("BE", "ZVGDFA3.3.0.0.0"));
    assert!(output.report.was_skipped("ZVGDFA3.3.0.0.0"));
    Ok(())
}

#[test]
fn capital_stock_without_ukct_skips_dependants() -> Result<()> {
    let mut tables = capital_stock_tables();
    tables.history = ResultTable::new();
    let settings = RunSettings::new("BE", YearWindow::new(2000, 2004));

    let output = tables.run(&CapitalStock, &settings)?;

    for code in [
        "UKCT.1.0.0.0",
        "OKCT.1.0.0.0",
        "OINT.1.0.0.0",
        "OKND.1.0.0.0",
        "ZVGDFA3.3.0.0.0",
    ] {
        assert!(output.report.was_skipped(code), "{code}");
    }
    assert!(output.table.contains("BE", "OVGD.1.0.0.0"));
    Ok(())
}

#[test]
fn sum_and_splice_publishes_sum_when_history_has_no_values() -> Result<()> {
    let forecast = table(vec![
        ("UXGN.1.0.0.0", TimeSeries::from([(2000, 50.0), (2001, 60.0)])),
        ("UMGN.1.0.0.0", TimeSeries::from([(2000, 20.0), (2001, 25.0)])),
    ]);
    let history = table(vec![(
        "UBGN.1.0.0.0",
        TimeSeries::gaps(YearWindow::new(1993, 1996)),
    )]);
    let tables = Tables::new(forecast, history, ResultTable::new());
    let step = SumAndSplice::new(vec![SumAndSpliceRule::new(
        "UBGN.1.0.0.0",
        ["UXGN.1.0.0.0", "-UMGN.1.0.0.0"],
    )]);
    let settings = RunSettings::new("BE", YearWindow::new(2000, 2001));

    let output = tables.run(&step, &settings)?;

    let ubgn = output.table.get("BE", "UBGN.1.0.0.0")?;
    assert_eq!(ubgn.get(2000), Some(30.0));
    assert_eq!(ubgn.get(2001), Some(35.0));
    assert!(output.report.splices.is_empty());
    assert_eq!(output.report.empty_bases, vec!["UBGN.1.0.0.0".to_string()]);
    Ok(())
}

#[test]
fn uvgdh_falls_back_when_history_has_no_values() -> Result<()> {
    let forecast = table(vec![
        ("UVGDH.1.0.0.0", TimeSeries::from([(2000, 6.0)])),
        ("UVGDH", TimeSeries::from([(2000, 5.0)])),
    ]);
    let history = table(vec![(
        "UVGDH.1.0.0.0",
        TimeSeries::gaps(YearWindow::new(1993, 1996)),
    )]);
    let tables = Tables::new(forecast, history, ResultTable::new());
    let settings = RunSettings::new("BE", YearWindow::new(2000, 2000));

    let output = tables.run(&RecalculateUvgdh, &settings)?;

    assert_eq!(output.table.get("BE", "UVGDH")?.get(2000), Some(5.0));
    assert_eq!(output.report.sources[0].source, "fallback");
    assert!(output.report.splices.is_empty());
    assert_eq!(output.report.empty_bases, vec!["UVGDH.1.0.0.0".to_string()]);
    Ok(())
}

#[test]
fn capital_stock_takes_ukct_from_reference_when_history_has_no_values() -> Result<()> {
    let mut tables = capital_stock_tables();
    tables.history = table(vec![(
        "UKCT.1.0.0.0",
        TimeSeries::gaps(YearWindow::new(1995, 2004)),
    )]);
    tables.reference.append(VariableRecord::new(
        "BE",
        "UKCT.1.0.0.0",
        Frequency::Annual,
        Scale::Billions,
        constant(1995, 2004, 4.0),
    ));
    let settings = RunSettings::new("BE", YearWindow::new(2000, 2004));

    let output = tables.run(&CapitalStock, &settings)?;

    assert_eq!(output.report.sources[0].source, "fallback");
    assert_eq!(output.report.empty_bases, vec!["UKCT.1.0.0.0".to_string()]);

    let ukct = output.table.get("BE", "UKCT.1.0.0.0")?;
    assert_eq!(ukct.first_year(), Some(2000));
    approx(ukct.get(2003), 4.0);
    // reference UKCT covers the whole window, so nothing is projected
    approx(output.table.get("BE", "OKCT.1.0.0.0")?.get(2004), 2.0);
    approx(output.table.get("BE", "OINT.1.0.0.0")?.get(2004), 8.0);
    approx(output.table.get("BE", "OKND.1.0.0.0")?.get(2004), 312.0);
    assert!(output.table.contains("BE", "ZVGDFA3.3.0.0.0"));
    assert!(output.report.skipped.is_empty());
    Ok(())
}

#[test]
fn capital_stock_outputs_are_limited_to_the_window() -> Result<()> {
    let mut tables = capital_stock_tables();
    tables.history = table(vec![("UKCT.1.0.0.0", constant(1995, 2002, 4.0))]);
    let settings = RunSettings::new("BE", YearWindow::new(2000, 2004));

    let output = tables.run(&CapitalStock, &settings)?;

    for code in ["UKCT.1.0.0.0", "OKCT.1.0.0.0", "OINT.1.0.0.0", "OKND.1.0.0.0"] {
        let series = output.table.get("BE", code)?;
        assert_eq!(series.first_year(), Some(2000), "{code}");
        assert_eq!(series.last_year(), Some(2004), "{code}");
    }
    approx(output.table.get("BE", "UKCT.1.0.0.0")?.get(2002), 4.0);
    Ok(())
}
