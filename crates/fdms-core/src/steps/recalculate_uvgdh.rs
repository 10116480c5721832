use crate::error::Result;
use crate::lookup::Sourced;
use crate::splicer::{ratio_splice, SpliceDirection, SpliceMethod};
use crate::step::{ComputationStep, StepContext, StepInputs, StepOutput};
use crate::timeseries::TimeSeries;

pub(crate) const UVGDH: &str = "UVGDH";
pub(crate) const UVGDH_DETAILED: &str = "UVGDH.1.0.0.0";
pub(crate) const KNP: &str = "KNP.1.0.212.0";

/// Gross disposable household income and the population series that goes
/// with it.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecalculateUvgdh;

impl RecalculateUvgdh {
    pub const CODE: &'static str = "recalculate_uvgdh";
    pub const VERSION: &'static str = "0.1.0";
    pub const DESCRIPTION: &'static str =
        "Household disposable income spliced from history and forecast";
}

impl ComputationStep for RecalculateUvgdh {
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
        let country = ctx.country();

        // History spliced forward with the forecast when both carry the
        // detailed code, else the forecast's aggregate code. A history row
        // without values counts as absent.
        let detailed = (
            ctx.splice_base(inputs.history, UVGDH_DETAILED),
            inputs.forecast.lookup(country, UVGDH_DETAILED).found(),
        );
        let uvgdh: Option<TimeSeries> = match detailed {
            (Some(history), Some(forecast)) => {
                let spliced = ratio_splice(history, forecast, SpliceDirection::Forward);
                ctx.record_splice(
                    UVGDH,
                    SpliceMethod::Ratio,
                    SpliceDirection::Forward,
                    &spliced,
                );
                ctx.record_source(UVGDH, &Sourced::Primary(history));
                Some(spliced.into_series())
            }
            _ => match inputs.forecast.get(country, UVGDH) {
                Ok(series) => {
                    ctx.record_source(UVGDH, &Sourced::Fallback(series));
                    Some(series.clone())
                }
                Err(err) => {
                    ctx.record_source(UVGDH, &Sourced::NotFound);
                    ctx.skip_missing(UVGDH, &err);
                    None
                }
            },
        };
        if let Some(series) = uvgdh {
            ctx.publish(UVGDH, series);
        }

        match inputs.history.get(country, KNP) {
            Ok(series) => ctx.publish(KNP, series.clone()),
            Err(err) => ctx.skip_missing(KNP, &err),
        }

        ctx.apply_scale();
        Ok(ctx.finish())
    }
}
