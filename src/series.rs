use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::nav::NavRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    UpOrFlat,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChartStyle {
    #[default]
    Line,
    Bar,
}

impl ChartStyle {
    pub fn toggled(self) -> Self {
        match self {
            ChartStyle::Line => ChartStyle::Bar,
            ChartStyle::Bar => ChartStyle::Line,
        }
    }
}

impl fmt::Display for ChartStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChartStyle::Line => write!(f, "line"),
            ChartStyle::Bar => write!(f, "bar"),
        }
    }
}

impl FromStr for ChartStyle {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "line" => Ok(ChartStyle::Line),
            "bar" => Ok(ChartStyle::Bar),
            _ => Err(ConfigError::UnknownChartStyle(s.to_string())),
        }
    }
}

/// Chart-ready data, oldest point first. All three vectors have equal length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChartSeries {
    pub labels: Vec<String>,
    /// `None` marks an unknown NAV; renderers leave a gap there.
    pub values: Vec<Option<f64>>,
    pub trends: Vec<Trend>,
}

impl ChartSeries {
    /// Builds the series from a newest-first window. The records are reversed
    /// so the chart reads left to right in time.
    ///
    /// A point is `Down` when its value is below the previous point's. The
    /// first point, and any point next to an unknown value, is `UpOrFlat`.
    pub fn from_newest_first(records: &[NavRecord]) -> Self {
        let chronological: Vec<&NavRecord> = records.iter().rev().collect();

        let labels = chronological.iter().map(|r| r.label()).collect();
        let values: Vec<Option<f64>> = chronological.iter().map(|r| r.nav).collect();
        let trends = values
            .iter()
            .enumerate()
            .map(|(i, value)| {
                let previous = if i == 0 { None } else { values[i - 1] };
                match (value, previous) {
                    (Some(v), Some(p)) if *v < p => Trend::Down,
                    _ => Trend::UpOrFlat,
                }
            })
            .collect();

        ChartSeries {
            labels,
            values,
            trends,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn known_values(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().flatten().copied()
    }

    pub fn max_value(&self) -> Option<f64> {
        self.known_values().reduce(f64::max)
    }

    pub fn min_value(&self) -> Option<f64> {
        self.known_values().reduce(f64::min)
    }

    /// Lower bound for the value axis: a hair under the lowest NAV so the
    /// line never sits on the axis, or zero when nothing positive is known.
    pub fn y_axis_floor(&self) -> f64 {
        match self.min_value() {
            Some(lowest) if lowest > 0.0 => lowest - 0.1,
            _ => 0.0,
        }
    }
}
