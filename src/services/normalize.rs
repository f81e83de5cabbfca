//! Ingestion boundary for raw feed rows.
//!
//! Upstream rows are loosely typed: prices arrive as numbers or numeric
//! strings, dates as `DD/MM/YYYY` or ISO, and fields come and go between
//! feed revisions. Everything is validated here so that only well-formed
//! `PriceRecord`s reach the store.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;

use crate::config::PriorityStates;
use crate::error::RecordRejection;
use crate::models::price::PriceRecord;

const DATE_FORMATS: [&str; 3] = ["%d/%m/%Y", "%Y-%m-%d", "%d-%m-%Y"];

/// Placeholders the feed uses for "not reported"
const MISSING_MARKERS: [&str; 4] = ["NA", "N/A", "NR", "-"];

/// Raw feed row. Unknown fields are ignored.
#[derive(Debug, Default, Deserialize)]
struct RawPriceRow {
    state: Option<Value>,
    district: Option<Value>,
    market: Option<Value>,
    commodity: Option<Value>,
    variety: Option<Value>,
    grade: Option<Value>,
    #[serde(alias = "date")]
    arrival_date: Option<Value>,
    #[serde(alias = "min")]
    min_price: Option<Value>,
    #[serde(alias = "max")]
    max_price: Option<Value>,
    #[serde(alias = "modal")]
    modal_price: Option<Value>,
}

/// Full validation pipeline for one row: decode, allow-list, price ordering.
pub fn normalize_row(
    raw: &Value,
    target_date: NaiveDate,
    fetched_at: DateTime<Utc>,
    priority_states: &PriorityStates,
) -> Result<PriceRecord, RecordRejection> {
    let record = parse_row(raw, target_date, fetched_at)?;
    let record = apply_allow_list(record, priority_states)?;
    check_price_order(&record)?;
    Ok(record)
}

/// Decode a row into a record. The state is kept as reported; a row without
/// a date takes the run's target date.
pub fn parse_row(
    raw: &Value,
    target_date: NaiveDate,
    fetched_at: DateTime<Utc>,
) -> Result<PriceRecord, RecordRejection> {
    if !raw.is_object() {
        return Err(RecordRejection::NotAnObject);
    }

    let row: RawPriceRow = serde_json::from_value(raw.clone())
        .map_err(|e| RecordRejection::Undecodable(e.to_string()))?;

    let market = text(&row.market).ok_or(RecordRejection::MissingField("market"))?;
    let commodity = text(&row.commodity).ok_or(RecordRejection::MissingField("commodity"))?;
    let modal_price =
        price(&row.modal_price, "modal_price")?.ok_or(RecordRejection::MissingField("modal_price"))?;
    let min_price = price(&row.min_price, "min_price")?;
    let max_price = price(&row.max_price, "max_price")?;

    let price_date = match text(&row.arrival_date) {
        Some(raw_date) => parse_date(&raw_date)?,
        None => target_date,
    };

    Ok(PriceRecord {
        state: text(&row.state).unwrap_or_default(),
        district: text(&row.district),
        market,
        commodity,
        variety: text(&row.variety),
        grade: text(&row.grade),
        min_price,
        max_price,
        modal_price,
        price_date,
        source_updated_at: fetched_at,
    })
}

/// Keep the record only if its state is allowed, rewriting the state to the
/// configured spelling.
pub fn apply_allow_list(
    mut record: PriceRecord,
    priority_states: &PriorityStates,
) -> Result<PriceRecord, RecordRejection> {
    match priority_states.canonical(&record.state) {
        Some(canonical) => {
            record.state = canonical.to_string();
            Ok(record)
        }
        None => Err(RecordRejection::OutsideAllowList(record.state)),
    }
}

/// `min <= modal <= max` for whichever bounds are present.
pub fn check_price_order(record: &PriceRecord) -> Result<(), RecordRejection> {
    let modal = record.modal_price;
    let below_min = record.min_price.is_some_and(|min| min > modal);
    let above_max = record.max_price.is_some_and(|max| modal > max);
    let inverted = matches!((record.min_price, record.max_price), (Some(min), Some(max)) if min > max);

    if below_min || above_max || inverted {
        return Err(RecordRejection::PriceOrder {
            min: record.min_price,
            modal,
            max: record.max_price,
        });
    }
    Ok(())
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, RecordRejection> {
    let trimmed = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
        .ok_or_else(|| RecordRejection::InvalidDate(trimmed.to_string()))
}

fn text(value: &Option<Value>) -> Option<String> {
    let s = match value.as_ref()? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };

    if s.is_empty() || MISSING_MARKERS.iter().any(|m| m.eq_ignore_ascii_case(&s)) {
        None
    } else {
        Some(s)
    }
}

fn price(value: &Option<Value>, field: &'static str) -> Result<Option<Decimal>, RecordRejection> {
    let invalid = |v: &Value| RecordRejection::InvalidPrice {
        field,
        value: v.to_string(),
    };

    let raw = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(v @ (Value::Bool(_) | Value::Array(_) | Value::Object(_))) => return Err(invalid(v)),
        Some(v) => v,
    };

    let Some(s) = text(value) else {
        return Ok(None);
    };

    let cleaned = s.replace(',', "");
    let parsed = Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .map_err(|_| invalid(raw))?;

    if parsed.is_sign_negative() && !parsed.is_zero() {
        return Err(RecordRejection::NegativePrice { field });
    }

    // Kept at full precision so the ordering check sees what the feed sent
    Ok(Some(parsed))
}
