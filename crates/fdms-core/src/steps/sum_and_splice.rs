use serde::Deserialize;

use crate::error::Result;
use crate::lookup::{choose_source, Sourced};
use crate::result_table::LookupError;
use crate::splicer::{splice, SpliceDirection, SpliceMethod};
use crate::step::{ComputationStep, StepContext, StepInputs, StepOutput};
use crate::timeseries::TimeSeries;

fn default_method() -> SpliceMethod {
    SpliceMethod::Butt
}

/// One aggregate: `variable` is the signed sum of `sources`, spliced
/// forward onto its history.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SumAndSpliceRule {
    pub variable: String,
    /// Variable codes to add up; a leading `-` subtracts the series.
    pub sources: Vec<String>,
    #[serde(default = "default_method")]
    pub method: SpliceMethod,
}

impl SumAndSpliceRule {
    pub fn new<I, S>(variable: impl Into<String>, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            variable: variable.into(),
            sources: sources.into_iter().map(Into::into).collect(),
            method: SpliceMethod::Butt,
        }
    }

    pub fn with_method(mut self, method: SpliceMethod) -> Self {
        self.method = method;
        self
    }

    pub fn addends(&self) -> impl Iterator<Item = Addend<'_>> {
        self.sources.iter().map(|source| Addend::parse(source))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Addend<'a> {
    pub code: &'a str,
    pub sign: f64,
}

impl<'a> Addend<'a> {
    pub fn parse(source: &'a str) -> Self {
        match source.strip_prefix('-') {
            Some(code) => Self { code, sign: -1.0 },
            None => Self {
                code: source,
                sign: 1.0,
            },
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SumAndSplice {
    rules: Vec<SumAndSpliceRule>,
}

impl SumAndSplice {
    pub const CODE: &'static str = "sum_and_splice";
    pub const VERSION: &'static str = "0.1.0";
    pub const DESCRIPTION: &'static str =
        "Signed sums of forecast series butt-spliced onto history";

    pub fn new(rules: Vec<SumAndSpliceRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[SumAndSpliceRule] {
        &self.rules
    }
}

impl ComputationStep for SumAndSplice {
    fn code_identifier(&self) -> &'static str {
        Self::CODE
    }

    fn version(&self) -> &'static str {
        Self::VERSION
    }

    fn description(&self) -> &'static str {
        Self::DESCRIPTION
    }

    fn perform(&self, mut ctx: StepContext<'_>, inputs: &StepInputs<'_>) -> Result<StepOutput> {
        for rule in &self.rules {
            let variable = rule.variable.as_str();
            let total = match sum_addends(&ctx, inputs, rule) {
                Ok(total) => total,
                Err(err) => {
                    ctx.skip_missing(variable, &err);
                    continue;
                }
            };

            let series = match ctx.splice_base(inputs.history, variable) {
                Some(base) => {
                    let spliced = splice(rule.method, base, &total, SpliceDirection::Forward);
                    ctx.record_splice(variable, rule.method, SpliceDirection::Forward, &spliced);
                    spliced.into_series()
                }
                None => total,
            };
            ctx.publish(variable, series);
        }

        ctx.apply_scale();
        Ok(ctx.finish())
    }
}

/// Addends come from the forecast, else from what this step already
/// published, else from earlier steps.
fn sum_addends(
    ctx: &StepContext<'_>,
    inputs: &StepInputs<'_>,
    rule: &SumAndSpliceRule,
) -> std::result::Result<TimeSeries, LookupError> {
    let country = ctx.country();
    let mut total = TimeSeries::new();

    for addend in rule.addends() {
        let sourced = choose_source(inputs.forecast, ctx.result(), country, addend.code);
        let series = match sourced {
            Sourced::Primary(series) | Sourced::Fallback(series) => series,
            Sourced::NotFound => inputs.accumulated.get(country, addend.code)?,
        };
        total = total.add_fill_zero(&series.scale_by(addend.sign));
    }

    Ok(total)
}
