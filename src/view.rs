//! Derived data for one loaded scheme.
//!
//! A [`SchemeView`] owns its [`SchemeHistory`], so everything cached inside it
//! is keyed on that history by construction. Fetching again produces a new
//! view; nothing here is ever invalidated in place.

use std::cell::OnceCell;

use chrono::NaiveDate;

use crate::change::{row_changes, window_change, ChangeMetric};
use crate::nav::{NavRecord, SchemeHistory};
use crate::series::ChartSeries;
use crate::window::{filter_window, window_caption, TimeWindow, WindowAvailability};
use crate::yearly::{yearly_changes, yearly_summary, YearlySummaryRow};

/// Everything the chart and history table need for one window.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowView {
    pub window: TimeWindow,
    /// Newest-first, like the history it came from.
    pub records: Vec<NavRecord>,
    pub series: ChartSeries,
    pub change: Option<ChangeMetric>,
    pub row_changes: Vec<Option<ChangeMetric>>,
    pub caption: String,
}

impl WindowView {
    pub fn build(history: &SchemeHistory, window: TimeWindow, today: NaiveDate) -> Self {
        let records = filter_window(&history.records, window, today);
        WindowView {
            window,
            series: ChartSeries::from_newest_first(&records),
            change: window_change(&records),
            row_changes: row_changes(&records),
            caption: window_caption(window, &history.records, today),
            records,
        }
    }

    /// No data for this period. Not an error.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

pub struct SchemeView {
    history: SchemeHistory,
    today: NaiveDate,
    availability: WindowAvailability,
    yearly: Vec<YearlySummaryRow>,
    yearly_changes: Vec<Option<ChangeMetric>>,
    windows: [OnceCell<WindowView>; 7],
}

impl SchemeView {
    /// Availability and the yearly table are computed here, once. Window
    /// views are computed on first use.
    pub fn new(history: SchemeHistory, today: NaiveDate) -> Self {
        let availability = WindowAvailability::probe(&history.records, today);
        let yearly = yearly_summary(&history.records);
        let yearly_changes = yearly_changes(&yearly);
        SchemeView {
            history,
            today,
            availability,
            yearly,
            yearly_changes,
            windows: std::array::from_fn(|_| OnceCell::new()),
        }
    }

    pub fn history(&self) -> &SchemeHistory {
        &self.history
    }

    pub fn availability(&self) -> WindowAvailability {
        self.availability
    }

    pub fn default_window(&self) -> Option<TimeWindow> {
        self.availability.default_window()
    }

    pub fn has_data(&self) -> bool {
        !self.history.is_empty()
    }

    pub fn yearly(&self) -> &[YearlySummaryRow] {
        &self.yearly
    }

    pub fn yearly_changes(&self) -> &[Option<ChangeMetric>] {
        &self.yearly_changes
    }

    pub fn window(&self, window: TimeWindow) -> &WindowView {
        self.windows[window as usize]
            .get_or_init(|| WindowView::build(&self.history, window, self.today))
    }
}

/// Identifies one scheme fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTicket {
    pub scheme_code: u64,
    id: u64,
}

/// Latest-request-wins guard for scheme fetches.
///
/// Every fetch takes a ticket. A response is applied only if its ticket is
/// still the current one, so a slow response for a scheme the user already
/// navigated away from can never overwrite a newer one.
#[derive(Debug, Default)]
pub struct RequestTracker {
    next_id: u64,
    current: Option<RequestTicket>,
}

impl RequestTracker {
    pub fn begin(&mut self, scheme_code: u64) -> RequestTicket {
        self.next_id += 1;
        let ticket = RequestTicket {
            scheme_code,
            id: self.next_id,
        };
        self.current = Some(ticket);
        ticket
    }

    pub fn is_current(&self, ticket: &RequestTicket) -> bool {
        self.current.as_ref() == Some(ticket)
    }

    /// Returns whether the response for `ticket` should be applied.
    pub fn complete(&mut self, ticket: &RequestTicket) -> bool {
        if self.is_current(ticket) {
            self.current = None;
            true
        } else {
            false
        }
    }

    pub fn pending(&self) -> Option<u64> {
        self.current.map(|t| t.scheme_code)
    }
}
