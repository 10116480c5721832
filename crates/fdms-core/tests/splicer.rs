use fdms_core::splicer::{
    butt_splice, ratio_splice, splice, SpliceDirection, SpliceMethod, SpliceOutcome,
    SpliceUndefined,
};
use fdms_core::timeseries::TimeSeries;

fn base() -> TimeSeries {
    TimeSeries::from([(1995, 100.0), (1996, 110.0)])
}

fn other() -> TimeSeries {
    TimeSeries::from([(1990, 45.0), (1995, 50.0), (1996, 55.0)])
}

#[test]
fn ratio_splice_backward_scales_other_by_overlap_ratio() {
    let spliced = ratio_splice(&base(), &other(), SpliceDirection::Backward);

    assert_eq!(
        spliced.series,
        TimeSeries::from([(1990, 90.0), (1995, 100.0), (1996, 110.0)])
    );
    assert_eq!(
        spliced.outcome,
        SpliceOutcome::Extended {
            overlap_year: 1995,
            factor: 2.0,
            years: 1,
        }
    );
}

#[test]
fn butt_splice_backward_shifts_other_by_overlap_difference() {
    let spliced = butt_splice(&base(), &other(), SpliceDirection::Backward);

    assert_eq!(
        spliced.series,
        TimeSeries::from([(1990, 95.0), (1995, 100.0), (1996, 110.0)])
    );
}

#[test]
fn forward_splice_anchors_on_last_valid_year() {
    let history = TimeSeries::from([(2000, 10.0), (2001, 12.0)]);
    let forecast = TimeSeries::from([(2000, 1.0), (2001, 3.0), (2002, 4.0), (2003, 6.0)]);

    let ratio = ratio_splice(&history, &forecast, SpliceDirection::Forward);
    assert_eq!(ratio.series.get(2000), Some(10.0));
    assert_eq!(ratio.series.get(2001), Some(12.0));
    assert_eq!(ratio.series.get(2002), Some(16.0));
    assert_eq!(ratio.series.get(2003), Some(24.0));

    let butt = butt_splice(&history, &forecast, SpliceDirection::Forward);
    assert_eq!(butt.series.get(2002), Some(13.0));
    assert_eq!(butt.series.get(2003), Some(15.0));
}

#[test]
fn base_valid_domain_is_never_altered() {
    let base = TimeSeries::from([(1995, 100.0), (1996, 110.0), (1997, 120.0)]);
    let other = TimeSeries::from([(1990, 1.0), (1995, 2.0), (1996, 999.0), (1997, 3.0)]);

    for method in [SpliceMethod::Ratio, SpliceMethod::Butt] {
        for direction in [SpliceDirection::Backward, SpliceDirection::Forward] {
            let spliced = splice(method, &base, &other, direction);
            for (year, value) in base.valid() {
                assert_eq!(spliced.series.get(year), Some(value), "{method} {direction}");
            }
        }
    }
}

#[test]
fn splice_is_idempotent_when_other_adds_nothing() {
    let base = base();
    let inside = TimeSeries::from([(1995, 7.0), (1996, 8.0)]);

    for method in [SpliceMethod::Ratio, SpliceMethod::Butt] {
        let spliced = splice(method, &base, &inside, SpliceDirection::Backward);
        assert_eq!(spliced.series, base);
        assert!(!spliced.outcome.is_undefined());
    }
}

#[test]
fn undefined_factor_returns_base_unchanged() {
    let base = base();

    let missing = TimeSeries::from([(1990, 1.0), (1996, 2.0)]);
    let spliced = ratio_splice(&base, &missing, SpliceDirection::Backward);
    assert_eq!(spliced.series, base);
    assert_eq!(
        spliced.outcome,
        SpliceOutcome::Undefined(SpliceUndefined::MissingOverlap { year: 1995 })
    );

    let zero = TimeSeries::from([(1990, 1.0), (1995, 0.0)]);
    let spliced = ratio_splice(&base, &zero, SpliceDirection::Backward);
    assert_eq!(spliced.series, base);
    assert_eq!(
        spliced.outcome,
        SpliceOutcome::Undefined(SpliceUndefined::ZeroAtOverlap { year: 1995 })
    );

    // a zero is a fine offset for a butt splice
    let spliced = butt_splice(&base, &zero, SpliceDirection::Backward);
    assert_eq!(spliced.series.get(1990), Some(101.0));
}

#[test]
fn empty_base_is_reported() {
    let mut empty = TimeSeries::new();
    empty.insert(2000, None);

    let spliced = butt_splice(&empty, &other(), SpliceDirection::Forward);
    assert_eq!(spliced.series, empty);
    assert_eq!(
        spliced.outcome,
        SpliceOutcome::Undefined(SpliceUndefined::EmptyBase)
    );
}
