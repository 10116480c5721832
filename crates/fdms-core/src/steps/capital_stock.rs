use tracing::{debug, warn};

use crate::error::Result;
use crate::lookup::Sourced;
use crate::recurrence::accumulate_stock;
use crate::result_table::LookupError;
use crate::scale::Scale;
use crate::splicer::{ratio_splice, SpliceDirection, SpliceMethod};
use crate::step::{ComputationStep, StepContext, StepInputs, StepOutput};
use crate::timeseries::{TimeSeries, Year, YearWindow};

pub(crate) const OIGT: &str = "OIGT.1.0.0.0";
pub(crate) const OVGD: &str = "OVGD.1.0.0.0";
pub(crate) const UIGT: &str = "UIGT.1.0.0.0";
pub(crate) const UKCT: &str = "UKCT.1.0.0.0";
pub(crate) const OKCT: &str = "OKCT.1.0.0.0";
pub(crate) const OINT: &str = "OINT.1.0.0.0";
pub(crate) const OKND: &str = "OKND.1.0.0.0";
pub(crate) const NLHT9: &str = "NLHT9.1.0.0.0";
pub(crate) const ZVGDFA3: &str = "ZVGDFA3.3.0.0.0";

/// Investment and output series extended backward with the long reference
/// history.
const SPLICED_FROM_REFERENCE: [&str; 3] = [OIGT, OVGD, UIGT];

/// Capital stock of the anchor year, as a multiple of that year's output.
const INITIAL_CAPITAL_OUTPUT_RATIO: f64 = 3.0;
const LABOUR_ELASTICITY: f64 = 0.65;
const CAPITAL_ELASTICITY: f64 = 0.35;

/// Net capital stock and total factor productivity.
///
/// Every series this step publishes is in billions.
#[derive(Debug, Clone, Copy, Default)]
pub struct CapitalStock;

impl CapitalStock {
    pub const CODE: &'static str = "capital_stock";
    pub const VERSION: &'static str = "0.1.0";
    pub const DESCRIPTION: &'static str =
        "Capital stock, net investment and total factor productivity";
}

impl ComputationStep for CapitalStock {
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
        let window = ctx.window();

        for variable in SPLICED_FROM_REFERENCE {
            let base = match inputs.forecast.get(country, variable) {
                Ok(series) => series,
                Err(err) => {
                    ctx.skip_missing(variable, &err);
                    continue;
                }
            };
            let series = match inputs.reference.get(country, variable) {
                Ok(reference) => {
                    let spliced = ratio_splice(base, reference, SpliceDirection::Backward);
                    ctx.record_splice(
                        variable,
                        SpliceMethod::Ratio,
                        SpliceDirection::Backward,
                        &spliced,
                    );
                    spliced.into_series()
                }
                Err(err) => {
                    warn!(
                        step = Self::CODE,
                        country,
                        variable,
                        error = %err,
                        "no reference series; publishing forecast only"
                    );
                    base.clone()
                }
            };
            ctx.publish_with_scale(variable, Scale::Billions, series.restrict(window));
        }

        let ukct = consumption_of_fixed_capital(&mut ctx, inputs, window);
        let okct = ukct.as_ref().map_err(Clone::clone).and_then(|ukct| {
            let uigt = inputs.forecast.get(country, UIGT)?;
            let oigt = inputs.forecast.get(country, OIGT)?;
            Ok(ukct / &(uigt / oigt))
        });
        let oint = okct.as_ref().map_err(Clone::clone).and_then(|okct| {
            let oigt = inputs.forecast.get(country, OIGT)?;
            Ok(oigt - okct)
        });

        for (variable, series) in [(UKCT, &ukct), (OKCT, &okct), (OINT, &oint)] {
            match series {
                Ok(series) => {
                    ctx.publish_with_scale(variable, Scale::Billions, series.restrict(window))
                }
                Err(err) => ctx.skip_missing(variable, err),
            }
        }

        let (ukct, okct, oint) = match (ukct, okct, oint) {
            (Ok(ukct), Ok(okct), Ok(oint)) => (ukct, okct, oint),
            (Err(err), _, _) | (_, Err(err), _) | (_, _, Err(err)) => {
                ctx.skip_missing(OKND, &err);
                ctx.skip_missing(ZVGDFA3, &err);
                ctx.apply_scale();
                return Ok(ctx.finish());
            }
        };

        let projection = match project_capital_stock(&ctx, inputs, window, ukct, okct, oint) {
            Ok(projection) => projection,
            Err(reason) => {
                ctx.skip(OKND, reason.clone());
                ctx.skip(ZVGDFA3, reason);
                ctx.apply_scale();
                return Ok(ctx.finish());
            }
        };

        for (variable, series) in [
            (OKCT, projection.okct),
            (OINT, projection.oint),
            (UKCT, projection.ukct),
        ] {
            if let Err(err) = ctx.replace_series(variable, series.restrict(window)) {
                ctx.skip_missing(variable, &err);
            }
        }
        ctx.publish_with_scale(OKND, Scale::Billions, projection.knd.restrict(window));

        match total_factor_productivity(inputs, country, &projection.knd) {
            Ok(series) => ctx.publish_with_scale(ZVGDFA3, Scale::Billions, series),
            Err(err) => ctx.skip_missing(ZVGDFA3, &err),
        }

        ctx.apply_scale();
        Ok(ctx.finish())
    }
}

/// `UKCT` from history, extended backward with the reference table; the
/// reference alone when history lacks it or holds no values.
fn consumption_of_fixed_capital(
    ctx: &mut StepContext<'_>,
    inputs: &StepInputs<'_>,
    window: YearWindow,
) -> std::result::Result<TimeSeries, LookupError> {
    let country = ctx.country();
    let reference = inputs.reference.get(country, UKCT).ok();
    let sourced = match (ctx.splice_base(inputs.history, UKCT), reference) {
        (Some(history), _) => Sourced::Primary(history),
        (None, Some(reference)) => Sourced::Fallback(reference),
        (None, None) => Sourced::NotFound,
    };
    ctx.record_source(UKCT, &sourced);

    match sourced {
        Sourced::Primary(history) => match reference {
            Some(reference) => {
                let spliced =
                    ratio_splice(history, &reference.restrict(window), SpliceDirection::Backward);
                ctx.record_splice(UKCT, SpliceMethod::Ratio, SpliceDirection::Backward, &spliced);
                Ok(spliced.into_series())
            }
            None => Ok(history.clone()),
        },
        Sourced::Fallback(reference) => Ok(reference.restrict(window)),
        Sourced::NotFound => Err(LookupError::NotFound {
            country: country.to_string(),
            code: UKCT.to_string(),
        }),
    }
}

#[derive(Debug)]
struct CapitalStockProjection {
    knd: TimeSeries,
    okct: TimeSeries,
    oint: TimeSeries,
    ukct: TimeSeries,
}

/// Net capital stock `OKND`.
///
/// The stock starts at the anchor year at three times that year's output and
/// accumulates reference net investment through the last window year. Past
/// the last valid `OKCT` year, consumption of fixed capital grows with the
/// stock and `OKND`, `OKCT`, `OINT` and `UKCT` are projected together from
/// published gross investment.
fn project_capital_stock(
    ctx: &StepContext<'_>,
    inputs: &StepInputs<'_>,
    window: YearWindow,
    mut ukct: TimeSeries,
    mut okct: TimeSeries,
    mut oint: TimeSeries,
) -> std::result::Result<CapitalStockProjection, String> {
    let country = ctx.country();
    let output = inputs.reference.get(country, OVGD).map_err(|err| err.to_string())?;
    let investment = inputs.reference.get(country, OIGT).map_err(|err| err.to_string())?;
    let net_investment = inputs.reference.get(country, OINT).map_err(|err| err.to_string())?;
    let oigt = ctx.result().get(country, OIGT).map_err(|err| err.to_string())?;
    let uigt = ctx.result().get(country, UIGT).map_err(|err| err.to_string())?;

    let anchor = anchor_year(output, investment)
        .ok_or_else(|| format!("reference {OVGD} or {OIGT} has no valid values"))?;
    let initial = output
        .get(anchor)
        .ok_or_else(|| format!("reference {OVGD} has no value in anchor year {anchor}"))?;

    let mut knd = accumulate_stock(
        anchor,
        INITIAL_CAPITAL_OUTPUT_RATIO * initial,
        net_investment,
        window.last,
    );

    if let Some(last_observed) = okct.last_valid_index() {
        debug!(
            step = CapitalStock::CODE,
            country,
            anchor,
            first_projected = last_observed + 1,
            "projecting capital stock"
        );
        for year in (last_observed + 1)..=window.last {
            let okct_year = project_consumption(&knd, &okct, year);
            let oigt_year = oigt.get(year);

            let knd_year = knd
                .get(year - 1)
                .zip(oigt_year)
                .zip(okct_year)
                .map(|((stock, gross), consumed)| stock + gross - consumed);
            let oint_year = oigt_year
                .zip(okct_year)
                .map(|(gross, consumed)| gross - consumed);
            let ukct_year = okct_year
                .zip(uigt.get(year))
                .zip(oigt_year)
                .map(|((consumed, nominal), real)| consumed * nominal / real);

            okct.insert(year, okct_year);
            knd.insert(year, knd_year);
            oint.insert(year, oint_year);
            ukct.insert(year, ukct_year);
        }
    }

    Ok(CapitalStockProjection {
        knd,
        okct,
        oint,
        ukct,
    })
}

/// First year of reference output, or the year before reference investment
/// starts when output starts more than a year earlier.
fn anchor_year(output: &TimeSeries, investment: &TimeSeries) -> Option<Year> {
    let output_start = output.first_valid_index()?;
    let investment_start = investment.first_valid_index()?;
    if output_start + 1 < investment_start {
        Some(investment_start - 1)
    } else {
        Some(output_start)
    }
}

/// `OKCT(y) = OKND(y-1) * OKCT(y-1) / OKND(y-2)`
fn project_consumption(knd: &TimeSeries, okct: &TimeSeries, year: Year) -> Option<f64> {
    let stock = knd.get(year - 1)?;
    let consumed = okct.get(year - 1)?;
    let earlier_stock = knd.get(year - 2)?;
    Some(stock * consumed / earlier_stock)
}

/// `ZVGDFA3 = ln(OVGD / ((NLHT9 * 1000)^0.65 * OKND^0.35))`, with output
/// from the reference table and hours worked from the forecast.
fn total_factor_productivity(
    inputs: &StepInputs<'_>,
    country: &str,
    knd: &TimeSeries,
) -> std::result::Result<TimeSeries, LookupError> {
    let output = inputs.reference.get(country, OVGD)?;
    let hours = inputs.forecast.get(country, NLHT9)?;
    let inputs_index =
        hours.scale_by(1000.0).powf(LABOUR_ELASTICITY) * knd.powf(CAPITAL_ELASTICITY);
    Ok((output / &inputs_index).ln())
}
