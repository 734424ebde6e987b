use chrono::{Datelike, NaiveDate, NaiveDateTime};

/// Quarter-end report dates in `[from, to]`, ascending.
pub fn report_periods(from: NaiveDate, to: NaiveDate) -> Vec<NaiveDateTime> {
    let mut periods = Vec::new();
    if from > to {
        return periods;
    }
    for year in from.year()..=to.year() {
        for (month, day) in [(3, 31), (6, 30), (9, 30), (12, 31)] {
            if let Some(period) = NaiveDate::from_ymd_opt(year, month, day) {
                if period >= from && period <= to {
                    periods.extend(period.and_hms_opt(0, 0, 0));
                }
            }
        }
    }
    periods
}
