use chrono::{Duration, NaiveDate};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

/// Wire format of NAV dates, e.g. `15-06-2024`.
pub const DATE_FORMAT: &str = "%d-%m-%Y";

/// One NAV observation after ingestion.
///
/// `nav` is `None` when the upstream string could not be parsed. Unknown is
/// never `0.0`.
#[derive(Debug, Clone, PartialEq)]
pub struct NavRecord {
    pub date: NaiveDate,
    pub nav_raw: String,
    pub nav: Option<f64>,
}

impl NavRecord {
    pub fn new(date: NaiveDate, nav_raw: &str) -> Self {
        NavRecord {
            date,
            nav_raw: nav_raw.to_string(),
            nav: parse_nav_value(nav_raw),
        }
    }

    /// The date in upstream `DD-MM-YYYY` form, used as chart label.
    pub fn label(&self) -> String {
        self.date.format(DATE_FORMAT).to_string()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemeMeta {
    pub scheme_name: String,
    pub fund_house: String,
    pub scheme_type: String,
    pub scheme_category: String,
    pub scheme_code: Option<u64>,
}

impl SchemeMeta {
    /// Reads every field on its own, so a malformed field is lost alone and
    /// the rest of the metadata survives. Numbers and strings are accepted
    /// interchangeably.
    pub fn from_json(meta: &Value) -> Self {
        if !meta.is_object() {
            warn!("Ignoring scheme meta that is not an object: {meta}");
            return SchemeMeta::default();
        }
        let scheme_code = meta_text(meta, "scheme_code");
        SchemeMeta {
            scheme_name: meta_text(meta, "scheme_name"),
            fund_house: meta_text(meta, "fund_house"),
            scheme_type: meta_text(meta, "scheme_type"),
            scheme_category: meta_text(meta, "scheme_category"),
            scheme_code: scheme_code.trim().parse().ok(),
        }
    }
}

fn meta_text(meta: &Value, key: &str) -> String {
    let Some(value) = meta.get(key) else {
        return String::new();
    };
    match serde_json::from_value::<RawText>(value.clone()) {
        Ok(text) => text.into_string(),
        Err(_) => {
            debug!(key, "Ignoring malformed scheme meta field: {value}");
            String::new()
        }
    }
}

/// NAV history of one scheme as returned by the scheme endpoint.
///
/// `records` keep the upstream order, which is newest-first. Everything
/// downstream relies on that: either preserve it or reverse it explicitly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemeHistory {
    pub meta: SchemeMeta,
    pub records: Vec<NavRecord>,
    /// Rows dropped at ingestion because they carried no usable date.
    pub skipped: usize,
}

// Upstream sometimes serialises numbers as strings with thousands separators,
// sometimes as plain JSON numbers.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawText {
    Text(String),
    Number(serde_json::Number),
}

impl RawText {
    fn into_string(self) -> String {
        match self {
            RawText::Text(s) => s,
            RawText::Number(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawNavEntry {
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    nav: Option<RawText>,
}

impl SchemeHistory {
    pub fn new(meta: SchemeMeta, records: Vec<NavRecord>) -> Self {
        SchemeHistory {
            meta,
            records,
            skipped: 0,
        }
    }

    /// Builds a history from the scheme endpoint's JSON payload.
    ///
    /// Never fails: a missing `meta` gives empty metadata, a missing `data`
    /// gives no records, and rows without a parseable date are dropped and
    /// counted in `skipped`.
    pub fn from_json(payload: &Value) -> Self {
        let meta = payload
            .get("meta")
            .map(SchemeMeta::from_json)
            .unwrap_or_default();

        let entries = payload
            .get("data")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        let mut records = Vec::with_capacity(entries.len());
        let mut skipped = 0;
        for (index, entry) in entries.iter().enumerate() {
            match parse_entry(entry) {
                Some(record) => records.push(record),
                None => {
                    warn!(index, "Skipping NAV row without a usable date: {entry}");
                    skipped += 1;
                }
            }
        }

        debug!(
            scheme = %meta.scheme_name,
            records = records.len(),
            skipped,
            "Ingested scheme history"
        );

        SchemeHistory {
            meta,
            records,
            skipped,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn latest(&self) -> Option<&NavRecord> {
        self.records.first()
    }

    pub fn oldest(&self) -> Option<&NavRecord> {
        self.records.last()
    }
}

fn parse_entry(entry: &Value) -> Option<NavRecord> {
    let raw: RawNavEntry = serde_json::from_value(entry.clone()).ok()?;
    let date = parse_nav_date(raw.date.as_deref()?)?;
    let nav_raw = raw.nav.map(RawText::into_string).unwrap_or_default();
    Some(NavRecord::new(date, &nav_raw))
}

/// Parses an upstream `DD-MM-YYYY` date.
///
/// Out-of-range days and months roll over into the following period the way
/// calendar construction from `(year, month - 1, day)` does, so `31-02-2023`
/// becomes 3 March 2023.
pub fn parse_nav_date(s: &str) -> Option<NaiveDate> {
    let mut parts = s.trim().split('-');
    let day: i64 = parts.next()?.trim().parse().ok()?;
    let month: i64 = parts.next()?.trim().parse().ok()?;
    let year: i64 = parts.next()?.trim().parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    date_from_parts(year, month - 1, day)
}

/// Parses a NAV string such as `"1,234.56"`. Returns `None` for anything
/// that is not a finite decimal number once thousands separators are removed.
pub fn parse_nav_value(s: &str) -> Option<f64> {
    let cleaned: String = s.chars().filter(|c| *c != ',').collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Builds a date from a zero-based month index, normalising overflow in both
/// fields: month 12 is January of the next year, day 0 is the last day of the
/// previous month, day 31 of a 30-day month is the 1st of the next.
pub fn date_from_parts(year: i64, month0: i64, day: i64) -> Option<NaiveDate> {
    let total = year.checked_mul(12)?.checked_add(month0)?;
    let year = i32::try_from(total.div_euclid(12)).ok()?;
    let month = u32::try_from(total.rem_euclid(12) + 1).ok()?;
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    first.checked_add_signed(Duration::try_days(day - 1)?)
}
