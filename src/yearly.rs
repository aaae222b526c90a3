use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};

use crate::change::ChangeMetric;
use crate::nav::NavRecord;

/// Latest NAV observed in one calendar year.
#[derive(Debug, Clone, PartialEq)]
pub struct YearlySummaryRow {
    pub year: i32,
    pub nav: Option<f64>,
    pub source_date: NaiveDate,
    pub count_in_year: usize,
}

/// One row per calendar year in `records`, newest year first.
///
/// Works on the whole history regardless of the selected window. `records`
/// must be newest-first: the first record met for a year is that year's
/// latest and becomes its representative. Later records of the same year are
/// only counted, except that a representative with an unknown NAV is
/// replaced by the next record whose NAV is known.
pub fn yearly_summary(records: &[NavRecord]) -> Vec<YearlySummaryRow> {
    let mut years: BTreeMap<i32, YearlySummaryRow> = BTreeMap::new();

    for record in records {
        let year = record.date.year();
        match years.get_mut(&year) {
            None => {
                years.insert(
                    year,
                    YearlySummaryRow {
                        year,
                        nav: record.nav,
                        source_date: record.date,
                        count_in_year: 1,
                    },
                );
            }
            Some(row) => {
                row.count_in_year += 1;
                if row.nav.is_none() && record.nav.is_some() {
                    row.nav = record.nav;
                    row.source_date = record.date;
                }
            }
        }
    }

    years.into_values().rev().collect()
}

/// Year-over-year change for rows sorted newest year first. The earliest
/// year has no baseline.
pub fn yearly_changes(rows: &[YearlySummaryRow]) -> Vec<Option<ChangeMetric>> {
    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            let previous = rows.get(i + 1)?;
            ChangeMetric::between_known(row.nav, previous.nav)
        })
        .collect()
}
