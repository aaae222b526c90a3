use crate::nav::NavRecord;

/// Difference between a NAV and its baseline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChangeMetric {
    pub absolute: f64,
    pub percent: f64,
    /// No change counts as positive.
    pub is_positive: bool,
}

impl ChangeMetric {
    pub fn between(current: f64, baseline: f64) -> Self {
        let absolute = current - baseline;
        let percent = if baseline == 0.0 {
            0.0
        } else {
            absolute / baseline * 100.0
        };
        ChangeMetric {
            absolute,
            percent,
            is_positive: absolute >= 0.0,
        }
    }

    /// Like [`ChangeMetric::between`], but absent when either side is unknown.
    pub fn between_known(current: Option<f64>, baseline: Option<f64>) -> Option<Self> {
        Some(Self::between(current?, baseline?))
    }

    /// `+1.23`, `-0.50`
    pub fn absolute_text(&self) -> String {
        signed(self.absolute, "")
    }

    /// `+1.23%`, `-0.50%`
    pub fn percent_text(&self) -> String {
        signed(self.percent, "%")
    }
}

fn signed(value: f64, suffix: &str) -> String {
    let sign = if value >= 0.0 { "+" } else { "" };
    format!("{sign}{value:.2}{suffix}")
}

/// Change over a window: newest known NAV against oldest known NAV.
///
/// `records` may be in either order; only the dates decide which end is the
/// baseline. Returns `None` when no NAV in `records` is known.
pub fn window_change(records: &[NavRecord]) -> Option<ChangeMetric> {
    let known = records.iter().filter(|r| r.nav.is_some());
    let oldest = known.clone().min_by_key(|r| r.date)?;
    let newest = known.max_by_key(|r| r.date)?;
    ChangeMetric::between_known(newest.nav, oldest.nav)
}

/// Day-over-day change for a newest-first table.
///
/// Entry `i` compares row `i` with row `i + 1`, the adjacent older row. The
/// oldest visible row has no baseline, nor does any row where either NAV is
/// unknown.
pub fn row_changes(records: &[NavRecord]) -> Vec<Option<ChangeMetric>> {
    records
        .iter()
        .enumerate()
        .map(|(i, record)| {
            let older = records.get(i + 1)?;
            ChangeMetric::between_known(record.nav, older.nav)
        })
        .collect()
}
