use crate::timeseries::{TimeSeries, Year};

/// Builds a stock series from an initial level and a flow series:
/// `stock(start) = initial`, `stock(k) = stock(k - 1) + flow(k)` for
/// `k` in `start + 1..=through`.
///
/// Years are visited strictly earliest first. Once a flow year is a gap every
/// later stock year is a gap as well.
pub fn accumulate_stock(start: Year, initial: f64, flow: &TimeSeries, through: Year) -> TimeSeries {
    let mut stock = TimeSeries::new();
    stock.insert(start, Some(initial));

    let mut previous = Some(initial);
    for year in (start + 1)..=through {
        let current = match (previous, flow.get(year)) {
            (Some(level), Some(change)) => Some(level + change),
            _ => None,
        };
        stock.insert(year, current);
        previous = current;
    }

    stock
}
