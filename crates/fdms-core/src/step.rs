//! The contract every computation step follows.
//!
//! A step reads the input tables and the results published by earlier steps,
//! and hands back a fragment of new rows. It never mutates shared state; the
//! [`crate::pipeline::Pipeline`] merges fragments into the next snapshot.

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::RunSettings;
use crate::error::Result;
use crate::lookup::Sourced;
use crate::result_table::{LookupError, ResultTable, ScaleCorrectionReport, VariableRecord};
use crate::scale::{ObservedScales, Scale, ScaleCorrectionLog, ScaleDiscrepancy};
use crate::splicer::{Splice, SpliceDirection, SpliceMethod, SpliceOutcome};
use crate::timeseries::{TimeSeries, YearWindow};

pub trait ComputationStep: Send + Sync {
    fn code_identifier(&self) -> &'static str;
    fn version(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn perform(&self, ctx: StepContext<'_>, inputs: &StepInputs<'_>) -> Result<StepOutput>;
}

/// Read-only view of everything a step may consult.
#[derive(Debug, Clone, Copy)]
pub struct StepInputs<'a> {
    pub forecast: &'a ResultTable,
    pub history: &'a ResultTable,
    pub reference: &'a ResultTable,
    /// Results of the steps that already ran.
    pub accumulated: &'a ResultTable,
    pub observed_scales: &'a ObservedScales,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedVariable {
    pub variable: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpliceRecord {
    pub variable: String,
    pub method: SpliceMethod,
    pub direction: SpliceDirection,
    pub outcome: SpliceOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceRecord {
    pub variable: String,
    pub source: &'static str,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StepReport {
    pub step: String,
    pub published: Vec<String>,
    pub skipped: Vec<SkippedVariable>,
    pub splices: Vec<SpliceRecord>,
    pub sources: Vec<SourceRecord>,
    /// Variables whose history row exists but holds no values.
    pub empty_bases: Vec<String>,
    pub scale_discrepancies: Vec<(String, ScaleDiscrepancy)>,
    pub scale_corrections: ScaleCorrectionReport,
}

impl StepReport {
    pub fn was_skipped(&self, variable: &str) -> bool {
        self.skipped.iter().any(|skip| skip.variable == variable)
    }

    pub fn splice_for(&self, variable: &str) -> Option<&SpliceRecord> {
        self.splices.iter().find(|record| record.variable == variable)
    }
}

#[derive(Debug, Clone)]
pub struct StepOutput {
    pub table: ResultTable,
    pub report: StepReport,
}

/// Working state of one step run: its private result fragment, pending scale
/// discrepancies and the report.
#[derive(Debug)]
pub struct StepContext<'a> {
    step: &'static str,
    settings: &'a RunSettings,
    observed_scales: &'a ObservedScales,
    scale_log: ScaleCorrectionLog,
    result: ResultTable,
    report: StepReport,
}

impl<'a> StepContext<'a> {
    pub fn new(
        step: &'static str,
        settings: &'a RunSettings,
        observed_scales: &'a ObservedScales,
    ) -> Self {
        Self {
            step,
            settings,
            observed_scales,
            scale_log: ScaleCorrectionLog::new(),
            result: ResultTable::new(),
            report: StepReport {
                step: step.to_string(),
                ..StepReport::default()
            },
        }
    }

    pub fn step(&self) -> &'static str {
        self.step
    }

    pub fn country(&self) -> &'a str {
        &self.settings.country
    }

    pub fn window(&self) -> YearWindow {
        self.settings.window
    }

    pub fn settings(&self) -> &'a RunSettings {
        self.settings
    }

    /// What this step has published so far.
    pub fn result(&self) -> &ResultTable {
        &self.result
    }

    pub fn pending_scale_corrections(&self) -> &ScaleCorrectionLog {
        &self.scale_log
    }

    /// Scale a variable is published under: the expected scale, else the one
    /// declared by the input data, else the run default. An expected scale
    /// that differs from the observed one is logged for correction.
    pub fn meta(&mut self, variable: &str) -> Scale {
        let expected = self.settings.expected_scale(variable);
        let observed = self.observed_scales.get(variable);

        if let Some(expected_scale) = expected {
            if observed != Some(expected_scale)
                && self.scale_log.record(variable, observed, expected)
            {
                warn!(
                    step = self.step,
                    country = self.country(),
                    variable,
                    observed = ?observed,
                    expected = %expected_scale,
                    "scale discrepancy"
                );
                self.report.scale_discrepancies.push((
                    variable.to_string(),
                    ScaleDiscrepancy { observed, expected },
                ));
            }
        }

        expected
            .or(observed)
            .unwrap_or(self.settings.default_scale)
    }

    pub fn publish(&mut self, variable: &str, series: TimeSeries) {
        let scale = self.meta(variable);
        self.publish_with_scale(variable, scale, series);
    }

    pub fn publish_with_scale(&mut self, variable: &str, scale: Scale, series: TimeSeries) {
        debug!(
            step = self.step,
            country = self.country(),
            variable,
            scale = %scale,
            years = series.valid_count(),
            "published series"
        );
        let record = VariableRecord::new(
            self.country(),
            variable,
            self.settings.frequency,
            scale,
            series,
        );
        self.result.append(record);
        self.report.published.push(variable.to_string());
    }

    /// Swaps the series of an already published variable, keeping its
    /// metadata.
    pub fn replace_series(
        &mut self,
        variable: &str,
        series: TimeSeries,
    ) -> std::result::Result<(), LookupError> {
        let country = self.settings.country.as_str();
        let mut record = self.result.get_record(country, variable)?.clone();
        record.series = series;
        self.result.put_or_replace(record);
        Ok(())
    }

    pub fn skip_missing(&mut self, variable: &str, err: &LookupError) {
        self.skip(variable, err.to_string());
    }

    pub fn skip(&mut self, variable: &str, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(
            step = self.step,
            country = self.country(),
            variable,
            reason = %reason,
            "skipping variable"
        );
        self.report.skipped.push(SkippedVariable {
            variable: variable.to_string(),
            reason,
        });
    }

    /// The series for `variable` in `table`, if it holds at least one value.
    /// A row made only of gaps is logged and reported as an empty base so the
    /// caller treats it like a missing one.
    pub fn splice_base<'t>(
        &mut self,
        table: &'t ResultTable,
        variable: &str,
    ) -> Option<&'t TimeSeries> {
        let series = table.get(self.country(), variable).ok()?;
        if series.first_valid_index().is_some() {
            return Some(series);
        }
        warn!(
            step = self.step,
            country = self.country(),
            variable,
            years = series.len(),
            "base series has no values; ignoring it"
        );
        self.report.empty_bases.push(variable.to_string());
        None
    }

    pub fn record_splice(
        &mut self,
        variable: &str,
        method: SpliceMethod,
        direction: SpliceDirection,
        splice: &Splice,
    ) {
        match &splice.outcome {
            SpliceOutcome::Extended {
                overlap_year,
                factor,
                years,
            } => debug!(
                step = self.step,
                country = self.country(),
                variable,
                method = %method,
                direction = %direction,
                overlap_year,
                factor,
                years,
                "spliced series"
            ),
            SpliceOutcome::Undefined(reason) => warn!(
                step = self.step,
                country = self.country(),
                variable,
                method = %method,
                direction = %direction,
                reason = %reason,
                "splice factor undefined; keeping base series"
            ),
        }
        self.report.splices.push(SpliceRecord {
            variable: variable.to_string(),
            method,
            direction,
            outcome: splice.outcome.clone(),
        });
    }

    pub fn record_source(&mut self, variable: &str, sourced: &Sourced<'_>) {
        self.report.sources.push(SourceRecord {
            variable: variable.to_string(),
            source: sourced.label(),
        });
    }

    /// Corrects every pending scale discrepancy against this step's own
    /// results. The log is drained, so calling this again is a no-op until
    /// new discrepancies are recorded.
    pub fn apply_scale(&mut self) -> ScaleCorrectionReport {
        let country = self.settings.country.as_str();
        let applied = self.result.apply_scale_correction(country, &mut self.scale_log);
        self.report.scale_corrections.extend(applied.clone());
        applied
    }

    pub fn finish(self) -> StepOutput {
        if !self.scale_log.is_empty() {
            debug!(
                step = self.step,
                pending = self.scale_log.len(),
                "step finished with uncorrected scale discrepancies"
            );
        }
        StepOutput {
            table: self.result,
            report: self.report,
        }
    }
}
