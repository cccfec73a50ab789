//! Translation of query parameters into record-store predicates.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, DurationRound, Months, SecondsFormat, Utc};

use super::types::{DateRange, QueryParams};
use crate::storage::{Condition, Operand, Predicate, RecordField, ScanFilter};

pub const PRODUCT_ID_PARAM: &str = "productId";
pub const CATEGORY_PARAM: &str = "category";
pub const DATE_FROM_PARAM: &str = "dateFrom";
pub const DATE_TO_PARAM: &str = "dateTo";
pub const DATE_RANGE_PARAM: &str = "dateRange";
pub const RESULT_PARAM: &str = "result";

/// Alias the store uses for the `timestamp` attribute.
pub const TIMESTAMP_ALIAS: &str = "#ts";

/// Look up a parameter, treating empty values as absent.
pub fn param<'a>(params: &'a QueryParams, key: &str) -> Option<&'a str> {
    params
        .get(key)
        .map(String::as_str)
        .filter(|value| !value.is_empty())
}

/// Build the list/export predicate from the recognized filter keys.
///
/// Conditions appear in a fixed order and only for keys that are present.
pub fn build_filter(params: &QueryParams) -> ScanFilter {
    let mut filter = ScanFilter::default();

    if let Some(product_id) = param(params, PRODUCT_ID_PARAM) {
        filter.conditions.push(Condition {
            field: RecordField::ProductId,
            predicate: Predicate::Equals(Operand::new(":productId", product_id)),
        });
    }

    if let Some(category) = param(params, CATEGORY_PARAM) {
        filter.conditions.push(Condition {
            field: RecordField::ProductCategory,
            predicate: Predicate::Equals(Operand::new(":category", category)),
        });
    }

    if let Some(date_from) = param(params, DATE_FROM_PARAM) {
        filter.conditions.push(Condition {
            field: RecordField::Timestamp,
            predicate: Predicate::AtLeast(Operand::new(":dateFrom", date_from)),
        });
        alias_timestamp(&mut filter);
    }

    if let Some(date_to) = param(params, DATE_TO_PARAM) {
        filter.conditions.push(Condition {
            field: RecordField::Timestamp,
            predicate: Predicate::AtMost(Operand::new(":dateTo", date_to)),
        });
        alias_timestamp(&mut filter);
    }

    filter
}

/// Predicate selecting every record inside the given window.
pub fn build_range_filter(range: &DateRange) -> ScanFilter {
    let mut filter = ScanFilter {
        conditions: vec![Condition {
            field: RecordField::Timestamp,
            predicate: Predicate::Between(
                Operand::new(":dateFrom", format_timestamp(range.from)),
                Operand::new(":dateTo", format_timestamp(range.to)),
            ),
        }],
        ..Default::default()
    };
    alias_timestamp(&mut filter);
    filter
}

fn alias_timestamp(filter: &mut ScanFilter) {
    filter.attribute_names.insert(
        TIMESTAMP_ALIAS.to_string(),
        RecordField::Timestamp.attribute().to_string(),
    );
}

/// The filters echoed back in response metadata.
pub fn applied_filters(params: &QueryParams) -> BTreeMap<String, String> {
    [
        PRODUCT_ID_PARAM,
        CATEGORY_PARAM,
        RESULT_PARAM,
        DATE_FROM_PARAM,
        DATE_TO_PARAM,
    ]
    .into_iter()
    .filter_map(|key| param(params, key).map(|value| (key.to_string(), value.to_string())))
    .collect()
}

/// Second-precision RFC 3339 in UTC, comparable with stored timestamps.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Named summary windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateRangePreset {
    Today,
    Week,
    Month,
    Quarter,
}

impl std::str::FromStr for DateRangePreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "today" => Ok(DateRangePreset::Today),
            "week" => Ok(DateRangePreset::Week),
            "month" => Ok(DateRangePreset::Month),
            "quarter" => Ok(DateRangePreset::Quarter),
            _ => Err(format!("Unknown date range: {}", s)),
        }
    }
}

impl DateRangePreset {
    /// Window ending at `now`.
    pub fn window(&self, now: DateTime<Utc>) -> DateRange {
        let from = match self {
            DateRangePreset::Today => now.duration_trunc(Duration::days(1)).unwrap_or(now),
            DateRangePreset::Week => now - Duration::days(7),
            DateRangePreset::Month => months_before(now, 1),
            DateRangePreset::Quarter => months_before(now, 3),
        };
        DateRange { from, to: now }
    }
}

fn months_before(now: DateTime<Utc>, months: u32) -> DateTime<Utc> {
    now.checked_sub_months(Months::new(months)).unwrap_or(now)
}

/// Resolve the summary window from the request.
///
/// A recognized `dateRange` preset wins; otherwise `dateFrom`/`dateTo` are
/// read as RFC 3339, with unparsable values ignored. The default window is
/// the last month.
pub fn resolve_date_range(params: &QueryParams, now: DateTime<Utc>) -> DateRange {
    if let Some(preset) = param(params, DATE_RANGE_PARAM).and_then(|raw| raw.parse::<DateRangePreset>().ok()) {
        return preset.window(now);
    }

    let mut range = DateRangePreset::Month.window(now);

    if let Some(from) = param(params, DATE_FROM_PARAM).and_then(parse_rfc3339) {
        range.from = from;
    }
    if let Some(to) = param(params, DATE_TO_PARAM).and_then(parse_rfc3339) {
        range.to = to;
    }

    range
}

fn parse_rfc3339(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn params(pairs: &[(&str, &str)]) -> QueryParams {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 15, 13, 45, 10).unwrap()
    }

    #[test]
    fn test_category_only() {
        let filter = build_filter(&params(&[("category", "REF")]));
        assert_eq!(filter.conditions.len(), 1);
        assert_eq!(filter.conditions[0].field, RecordField::ProductCategory);
        assert!(filter.attribute_names.is_empty());
        assert_eq!(filter.expression(), "productCategory = :category");
    }

    #[test]
    fn test_no_recognized_keys_is_empty() {
        let filter = build_filter(&params(&[("page", "2"), ("view", "list")]));
        assert!(filter.is_empty());
        assert!(filter.attribute_names.is_empty());
    }

    #[test]
    fn test_empty_values_are_ignored() {
        let filter = build_filter(&params(&[("productId", ""), ("category", "")]));
        assert!(filter.is_empty());
    }

    #[test]
    fn test_all_keys_in_fixed_order() {
        let input = params(&[
            ("dateTo", "2024-02-01T00:00:00Z"),
            ("category", "TV"),
            ("dateFrom", "2024-01-01T00:00:00Z"),
            ("productId", "P-9"),
        ]);
        let filter = build_filter(&input);

        assert_eq!(
            filter.expression(),
            "productId = :productId AND productCategory = :category AND #ts >= :dateFrom AND #ts <= :dateTo"
        );
        assert_eq!(
            filter.attribute_names.get(TIMESTAMP_ALIAS).map(String::as_str),
            Some("timestamp")
        );
        assert_eq!(filter, build_filter(&input));
    }

    #[test]
    fn test_range_filter_uses_between() {
        let range = DateRange {
            from: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            to: Utc.with_ymd_and_hms(2024, 1, 31, 23, 59, 59).unwrap(),
        };
        let filter = build_range_filter(&range);
        assert_eq!(filter.expression(), "#ts BETWEEN :dateFrom AND :dateTo");
        match &filter.conditions[0].predicate {
            Predicate::Between(low, high) => {
                assert_eq!(low.value, "2024-01-01T00:00:00Z");
                assert_eq!(high.value, "2024-01-31T23:59:59Z");
            }
            other => panic!("unexpected predicate {:?}", other),
        }
    }

    #[test]
    fn test_applied_filters() {
        let applied = applied_filters(&params(&[
            ("category", "WM"),
            ("result", "CORRECT"),
            ("page", "3"),
            ("productId", ""),
        ]));
        assert_eq!(applied.len(), 2);
        assert_eq!(applied.get("category").map(String::as_str), Some("WM"));
        assert_eq!(applied.get("result").map(String::as_str), Some("CORRECT"));
    }

    #[test]
    fn test_presets() {
        let today = resolve_date_range(&params(&[("dateRange", "today")]), now());
        assert_eq!(today.from, Utc.with_ymd_and_hms(2024, 5, 15, 0, 0, 0).unwrap());
        assert_eq!(today.to, now());

        let week = resolve_date_range(&params(&[("dateRange", "week")]), now());
        assert_eq!(week.from, Utc.with_ymd_and_hms(2024, 5, 8, 13, 45, 10).unwrap());

        let month = resolve_date_range(&params(&[("dateRange", "month")]), now());
        assert_eq!(month.from, Utc.with_ymd_and_hms(2024, 4, 15, 13, 45, 10).unwrap());

        let quarter = resolve_date_range(&params(&[("dateRange", "quarter")]), now());
        assert_eq!(quarter.from, Utc.with_ymd_and_hms(2024, 2, 15, 13, 45, 10).unwrap());
    }

    #[test]
    fn test_default_range_is_last_month() {
        let range = resolve_date_range(&QueryParams::new(), now());
        assert_eq!(range.from, Utc.with_ymd_and_hms(2024, 4, 15, 13, 45, 10).unwrap());
        assert_eq!(range.to, now());
    }

    #[test]
    fn test_custom_range_and_invalid_values() {
        let range = resolve_date_range(
            &params(&[("dateFrom", "2024-01-01T00:00:00Z"), ("dateTo", "yesterday")]),
            now(),
        );
        assert_eq!(range.from, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(range.to, now());
    }

    #[test]
    fn test_unknown_preset_falls_back_to_custom() {
        let range = resolve_date_range(
            &params(&[("dateRange", "decade"), ("dateFrom", "2023-06-01T00:00:00+02:00")]),
            now(),
        );
        assert_eq!(range.from, Utc.with_ymd_and_hms(2023, 5, 31, 22, 0, 0).unwrap());
    }
}
