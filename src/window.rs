use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};

use crate::error::ConfigError;
use crate::nav::{date_from_parts, NavRecord, DATE_FORMAT};

/// Look-back period for the chart and history views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimeWindow {
    OneMonth,
    ThreeMonths,
    SixMonths,
    OneYear,
    TwoYears,
    FiveYears,
    MaxPeriod,
}

impl TimeWindow {
    /// Shortest to longest, the order the window buttons are laid out in.
    pub fn all() -> &'static [TimeWindow] {
        &[
            TimeWindow::OneMonth,
            TimeWindow::ThreeMonths,
            TimeWindow::SixMonths,
            TimeWindow::OneYear,
            TimeWindow::TwoYears,
            TimeWindow::FiveYears,
            TimeWindow::MaxPeriod,
        ]
    }

    /// `None` means no lower bound.
    pub fn months(self) -> Option<u32> {
        match self {
            TimeWindow::OneMonth => Some(1),
            TimeWindow::ThreeMonths => Some(3),
            TimeWindow::SixMonths => Some(6),
            TimeWindow::OneYear => Some(12),
            TimeWindow::TwoYears => Some(24),
            TimeWindow::FiveYears => Some(60),
            TimeWindow::MaxPeriod => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TimeWindow::OneMonth => "1M",
            TimeWindow::ThreeMonths => "3M",
            TimeWindow::SixMonths => "6M",
            TimeWindow::OneYear => "1Y",
            TimeWindow::TwoYears => "2Y",
            TimeWindow::FiveYears => "5Y",
            TimeWindow::MaxPeriod => "MAX",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            TimeWindow::OneMonth => "Last 1 Month",
            TimeWindow::ThreeMonths => "Last 3 Months",
            TimeWindow::SixMonths => "Last 6 Months",
            TimeWindow::OneYear => "Last 1 Year",
            TimeWindow::TwoYears => "Last 2 Years",
            TimeWindow::FiveYears => "Last 5 Years",
            TimeWindow::MaxPeriod => "Max Period",
        }
    }

    /// First day included in the window, or `None` for [`TimeWindow::MaxPeriod`].
    ///
    /// Months are subtracted on the calendar keeping the day of month. When
    /// the target month is shorter the date rolls forward, so one month
    /// before 31 March is 2 or 3 March. That rollover is intended.
    pub fn start_date(self, today: NaiveDate) -> Option<NaiveDate> {
        let months = i64::from(self.months()?);
        date_from_parts(
            i64::from(today.year()),
            i64::from(today.month0()) - months,
            i64::from(today.day()),
        )
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TimeWindow {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "1M" | "ONE_MONTH" => Ok(TimeWindow::OneMonth),
            "3M" | "THREE_MONTH" => Ok(TimeWindow::ThreeMonths),
            "6M" | "SIX_MONTH" => Ok(TimeWindow::SixMonths),
            "1Y" | "ONE_YEAR" => Ok(TimeWindow::OneYear),
            "2Y" | "TWO_YEAR" => Ok(TimeWindow::TwoYears),
            "5Y" | "FIVE_YEAR" => Ok(TimeWindow::FiveYears),
            "MAX" | "MAX_PERIOD" => Ok(TimeWindow::MaxPeriod),
            _ => Err(ConfigError::UnknownWindow(s.to_string())),
        }
    }
}

/// Records whose date lies in `[window start, today]`, in input order.
///
/// `today` is a calendar day, so a record dated today is always inside the
/// window. [`TimeWindow::MaxPeriod`] returns the input unfiltered.
pub fn filter_window(records: &[NavRecord], window: TimeWindow, today: NaiveDate) -> Vec<NavRecord> {
    match window.start_date(today) {
        None => records.to_vec(),
        Some(start) => records
            .iter()
            .filter(|r| r.date >= start && r.date <= today)
            .cloned()
            .collect(),
    }
}

/// Which windows have at least one record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowAvailability {
    pub one_month: bool,
    pub three_month: bool,
    pub six_month: bool,
    pub one_year: bool,
    pub two_year: bool,
    pub five_year: bool,
    pub max_period: bool,
}

impl WindowAvailability {
    pub fn probe(records: &[NavRecord], today: NaiveDate) -> Self {
        let mut availability = WindowAvailability::default();
        for &window in TimeWindow::all() {
            let available = !filter_window(records, window, today).is_empty();
            availability.set(window, available);
        }
        availability
    }

    pub fn is_available(&self, window: TimeWindow) -> bool {
        match window {
            TimeWindow::OneMonth => self.one_month,
            TimeWindow::ThreeMonths => self.three_month,
            TimeWindow::SixMonths => self.six_month,
            TimeWindow::OneYear => self.one_year,
            TimeWindow::TwoYears => self.two_year,
            TimeWindow::FiveYears => self.five_year,
            TimeWindow::MaxPeriod => self.max_period,
        }
    }

    fn set(&mut self, window: TimeWindow, available: bool) {
        let slot = match window {
            TimeWindow::OneMonth => &mut self.one_month,
            TimeWindow::ThreeMonths => &mut self.three_month,
            TimeWindow::SixMonths => &mut self.six_month,
            TimeWindow::OneYear => &mut self.one_year,
            TimeWindow::TwoYears => &mut self.two_year,
            TimeWindow::FiveYears => &mut self.five_year,
            TimeWindow::MaxPeriod => &mut self.max_period,
        };
        *slot = available;
    }

    /// The longest available window, favouring context over granularity.
    /// `None` when there is no data at all.
    pub fn default_window(&self) -> Option<TimeWindow> {
        TimeWindow::all()
            .iter()
            .rev()
            .copied()
            .find(|w| self.is_available(*w))
    }
}

/// Human readable period, e.g. `Last 1 Year (15-06-2023 to 15-06-2024)`.
///
/// For [`TimeWindow::MaxPeriod`] the range starts at the oldest record.
pub fn window_caption(window: TimeWindow, records: &[NavRecord], today: NaiveDate) -> String {
    let start = match window.start_date(today) {
        Some(start) => Some(start),
        None => records.last().map(|r| r.date),
    };
    match start {
        Some(start) => format!(
            "{} ({} to {})",
            window.description(),
            start.format(DATE_FORMAT),
            today.format(DATE_FORMAT)
        ),
        None => window.description().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn today() -> NaiveDate {
        ymd(2024, 6, 15)
    }

    /// Daily records from `today` back to `oldest`, newest-first.
    fn daily(oldest: NaiveDate, today: NaiveDate) -> Vec<NavRecord> {
        std::iter::successors(Some(today), |d| d.pred_opt())
            .take_while(|d| *d >= oldest)
            .enumerate()
            .map(|(i, d)| NavRecord::new(d, &format!("{}", 100.0 - i as f64 * 0.01)))
            .collect()
    }

    #[rstest]
    #[case(TimeWindow::OneMonth, ymd(2024, 5, 15))]
    #[case(TimeWindow::ThreeMonths, ymd(2024, 3, 15))]
    #[case(TimeWindow::SixMonths, ymd(2023, 12, 15))]
    #[case(TimeWindow::OneYear, ymd(2023, 6, 15))]
    #[case(TimeWindow::TwoYears, ymd(2022, 6, 15))]
    #[case(TimeWindow::FiveYears, ymd(2019, 6, 15))]
    fn test_start_date(#[case] window: TimeWindow, #[case] expected: NaiveDate) {
        assert_eq!(window.start_date(today()), Some(expected));
    }

    #[rstest]
    #[case(ymd(2024, 3, 31), TimeWindow::OneMonth, ymd(2024, 3, 2))]
    #[case(ymd(2023, 3, 31), TimeWindow::OneMonth, ymd(2023, 3, 3))]
    #[case(ymd(2024, 1, 31), TimeWindow::OneMonth, ymd(2023, 12, 31))]
    #[case(ymd(2024, 2, 29), TimeWindow::OneYear, ymd(2023, 3, 1))]
    #[case(ymd(2024, 8, 31), TimeWindow::SixMonths, ymd(2024, 3, 2))]
    fn test_start_date_end_of_month_rollover(
        #[case] today: NaiveDate,
        #[case] window: TimeWindow,
        #[case] expected: NaiveDate,
    ) {
        assert_eq!(window.start_date(today), Some(expected));
    }

    #[test]
    fn test_max_period_has_no_start() {
        assert_eq!(TimeWindow::MaxPeriod.start_date(today()), None);
    }

    #[test]
    fn test_filter_is_inclusive_on_both_ends() {
        let records = vec![
            NavRecord::new(ymd(2024, 6, 16), "101"),
            NavRecord::new(ymd(2024, 6, 15), "100"),
            NavRecord::new(ymd(2024, 5, 15), "99"),
            NavRecord::new(ymd(2024, 5, 14), "98"),
        ];

        let filtered = filter_window(&records, TimeWindow::OneMonth, today());
        let dates: Vec<NaiveDate> = filtered.iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![ymd(2024, 6, 15), ymd(2024, 5, 15)]);
    }

    #[test]
    fn test_filter_max_period_is_identity() {
        let mut records = daily(ymd(2015, 1, 1), today());
        records.insert(0, NavRecord::new(ymd(2030, 1, 1), "1"));
        assert_eq!(filter_window(&records, TimeWindow::MaxPeriod, today()), records);
    }

    #[test]
    fn test_filter_preserves_relative_order_and_contiguity() {
        let records = daily(ymd(2022, 1, 1), today());
        for &window in TimeWindow::all() {
            let filtered = filter_window(&records, window, today());
            assert!(filtered.windows(2).all(|w| w[0].date > w[1].date));
            if let Some(first) = filtered.first() {
                let offset = records.iter().position(|r| r == first).unwrap();
                assert_eq!(&records[offset..offset + filtered.len()], filtered.as_slice());
            }
        }
    }

    #[test]
    fn test_filter_reverse_twice_round_trips() {
        let records = daily(ymd(2024, 1, 1), today());
        let filtered = filter_window(&records, TimeWindow::ThreeMonths, today());
        let mut round_trip = filtered.clone();
        round_trip.reverse();
        round_trip.reverse();
        assert_eq!(round_trip, filtered);
    }

    #[test]
    fn test_recent_only_data_availability() {
        let records = daily(ymd(2024, 5, 20), today());
        let availability = WindowAvailability::probe(&records, today());

        assert!(availability.one_month);
        assert!(availability.three_month);
        assert!(availability.one_year);
        assert!(availability.five_year);
        assert!(availability.max_period);
        assert_eq!(availability.default_window(), Some(TimeWindow::MaxPeriod));
    }

    #[test]
    fn test_five_year_boundary_excludes_61_months_back() {
        let records = vec![NavRecord::new(ymd(2019, 5, 15), "10")];
        let availability = WindowAvailability::probe(&records, today());
        assert!(!availability.five_year);
        assert!(!availability.two_year);
        assert!(availability.max_period);

        let records = vec![NavRecord::new(ymd(2019, 6, 15), "10")];
        let availability = WindowAvailability::probe(&records, today());
        assert!(availability.five_year);
        assert!(!availability.two_year);
    }

    #[test]
    fn test_stale_data_only_max_available() {
        let records = daily(ymd(2018, 1, 1), ymd(2018, 12, 31));
        let availability = WindowAvailability::probe(&records, today());
        assert!(!availability.one_month);
        assert!(!availability.five_year);
        assert!(availability.max_period);
        assert_eq!(availability.default_window(), Some(TimeWindow::MaxPeriod));
    }

    #[test]
    fn test_empty_records() {
        for &window in TimeWindow::all() {
            assert!(filter_window(&[], window, today()).is_empty());
        }
        let availability = WindowAvailability::probe(&[], today());
        assert_eq!(availability, WindowAvailability::default());
        assert_eq!(availability.default_window(), None);
    }

    #[test]
    fn test_from_str() {
        assert_eq!("1y".parse::<TimeWindow>().unwrap(), TimeWindow::OneYear);
        assert_eq!("MAX".parse::<TimeWindow>().unwrap(), TimeWindow::MaxPeriod);
        assert_eq!("three_month".parse::<TimeWindow>().unwrap(), TimeWindow::ThreeMonths);
        assert!("3Y".parse::<TimeWindow>().is_err());
        for &window in TimeWindow::all() {
            assert_eq!(window.to_string().parse::<TimeWindow>().unwrap(), window);
        }
    }

    #[test]
    fn test_window_caption() {
        let records = daily(ymd(2021, 3, 4), today());
        assert_eq!(
            window_caption(TimeWindow::OneYear, &records, today()),
            "Last 1 Year (15-06-2023 to 15-06-2024)"
        );
        assert_eq!(
            window_caption(TimeWindow::MaxPeriod, &records, today()),
            "Max Period (04-03-2021 to 15-06-2024)"
        );
        assert_eq!(window_caption(TimeWindow::MaxPeriod, &[], today()), "Max Period");
    }
}
