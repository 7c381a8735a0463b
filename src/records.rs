//! Market records, filter state, region selectors and display formatting.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use chrono_tz::Asia::Kolkata;
use serde::{Deserialize, Deserializer, Serialize};

pub const ALL_STATES_LABEL: &str = "All States";
pub const ALL_DISTRICTS_LABEL: &str = "All Districts";
pub const MISSING_TEXT: &str = "N/A";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketRecord {
    #[serde(default, deserialize_with = "deserialize_text")]
    pub market: String,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub state: String,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub district: String,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub commodity: String,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub variety: String,
    /// Minor currency units (paise).
    #[serde(default, deserialize_with = "deserialize_minor_units")]
    pub price: i64,
    #[serde(default, alias = "quantity", deserialize_with = "deserialize_volume")]
    pub total_volume: f64,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub date: String,
}

impl MarketRecord {
    pub fn price_major(&self) -> f64 {
        self.price as f64 / 100.0
    }
}

fn deserialize_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn deserialize_minor_units<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<f64>::deserialize(deserializer)?;
    Ok(raw
        .filter(|value| value.is_finite())
        .map(|value| value.round() as i64)
        .unwrap_or(0))
}

fn deserialize_volume<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<f64>::deserialize(deserializer)?;
    Ok(raw.filter(|value| value.is_finite()).unwrap_or(0.0))
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterState {
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub district: String,
    #[serde(default)]
    pub crop: String,
    #[serde(default)]
    pub market: String,
}

impl FilterState {
    /// Query parameters in the order the backend documents them.
    pub fn query_pairs(&self) -> [(&'static str, &str); 4] {
        [
            ("state", self.state.as_str()),
            ("district", self.district.as_str()),
            ("crop", self.crop.as_str()),
            ("market", self.market.as_str()),
        ]
    }

    pub fn is_empty(&self) -> bool {
        self.query_pairs()
            .iter()
            .all(|(_, value)| value.trim().is_empty())
    }

    pub fn trimmed(&self) -> Self {
        Self {
            state: self.state.trim().to_string(),
            district: self.district.trim().to_string(),
            crop: self.crop.trim().to_string(),
            market: self.market.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
}

impl SelectOption {
    fn placeholder(label: &str) -> Self {
        Self {
            value: String::new(),
            label: label.to_string(),
        }
    }

    fn keyed(label: &str) -> Self {
        Self {
            value: region_key(label),
            label: label.to_string(),
        }
    }
}

/// State name to district names, as served by the static region dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionMap(BTreeMap<String, Vec<String>>);

impl RegionMap {
    pub fn new(entries: BTreeMap<String, Vec<String>>) -> Self {
        Self(entries)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn state_count(&self) -> usize {
        self.0.len()
    }

    pub fn state_name_for_key(&self, state_key: &str) -> Option<&str> {
        self.0
            .keys()
            .find(|name| region_key(name) == state_key)
            .map(String::as_str)
    }

    pub fn state_options(&self) -> Vec<SelectOption> {
        let mut options = Vec::with_capacity(self.0.len() + 1);
        options.push(SelectOption::placeholder(ALL_STATES_LABEL));
        options.extend(self.0.keys().map(|name| SelectOption::keyed(name)));
        options
    }

    /// District options for a state key; only the placeholder when the key
    /// is empty or unknown.
    pub fn district_options(&self, state_key: &str) -> Vec<SelectOption> {
        let mut options = vec![SelectOption::placeholder(ALL_DISTRICTS_LABEL)];
        if state_key.is_empty() {
            return options;
        }

        if let Some(districts) = self
            .state_name_for_key(state_key)
            .and_then(|name| self.0.get(name))
        {
            let mut sorted: Vec<&String> = districts.iter().collect();
            sorted.sort();
            options.extend(sorted.into_iter().map(|name| SelectOption::keyed(name)));
        }

        options
    }
}

/// Selector value for a state or district name: lowercase, whitespace runs
/// collapsed into a single `-`.
pub fn region_key(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

pub fn display_or_missing(value: &str) -> String {
    if value.trim().is_empty() {
        MISSING_TEXT.to_string()
    } else {
        value.to_string()
    }
}

/// en-IN number formatting: lakh/crore digit grouping, up to three
/// fraction digits with trailing zeros removed.
pub fn format_en_in(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }

    let scaled = (value.abs() * 1_000.0).round() as u128;
    let whole = scaled / 1_000;
    let fraction = scaled % 1_000;

    let mut out = String::new();
    if value < 0.0 && scaled != 0 {
        out.push('-');
    }
    out.push_str(&group_en_in(&whole.to_string()));

    if fraction != 0 {
        let digits = format!("{fraction:03}");
        out.push('.');
        out.push_str(digits.trim_end_matches('0'));
    }

    out
}

fn group_en_in(digits: &str) -> String {
    if digits.len() <= 3 {
        return digits.to_string();
    }

    let (head, tail) = digits.split_at(digits.len() - 3);
    let mut groups = Vec::new();
    let mut end = head.len();
    while end > 2 {
        groups.push(&head[end - 2..end]);
        end -= 2;
    }
    groups.push(&head[..end]);
    groups.reverse();

    format!("{},{}", groups.join(","), tail)
}

/// Renders an ISO-8601 date or datetime as `DD/MM/YYYY` in India time.
/// Input that does not parse is returned unchanged.
pub fn format_display_date(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return MISSING_TEXT.to_string();
    }

    parse_record_date(trimmed)
        .map(|date| date.format("%d/%m/%Y").to_string())
        .unwrap_or_else(|| trimmed.to_string())
}

fn parse_record_date(raw: &str) -> Option<NaiveDate> {
    if let Ok(with_offset) = DateTime::parse_from_rfc3339(raw) {
        return Some(with_offset.with_timezone(&Kolkata).date_naive());
    }
    if let Ok(naive) = raw.parse::<NaiveDateTime>() {
        return Some(naive.date());
    }
    raw.parse::<NaiveDate>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regions() -> RegionMap {
        let mut entries = BTreeMap::new();
        entries.insert(
            "Tamil Nadu".to_string(),
            vec!["Salem".to_string(), "Chennai".to_string()],
        );
        entries.insert(
            "Andhra Pradesh".to_string(),
            vec!["Guntur".to_string(), "East Godavari".to_string()],
        );
        RegionMap::new(entries)
    }

    #[test]
    fn region_key_lowercases_and_dashes_whitespace() {
        assert_eq!(region_key("Andhra Pradesh"), "andhra-pradesh");
        assert_eq!(region_key("  Jammu   and Kashmir "), "jammu-and-kashmir");
        assert_eq!(region_key("Goa"), "goa");
    }

    #[test]
    fn state_options_are_sorted_behind_placeholder() {
        let options = regions().state_options();
        assert_eq!(options.len(), 3);
        assert_eq!(options[0].value, "");
        assert_eq!(options[0].label, ALL_STATES_LABEL);
        assert_eq!(options[1].label, "Andhra Pradesh");
        assert_eq!(options[1].value, "andhra-pradesh");
        assert_eq!(options[2].label, "Tamil Nadu");
    }

    #[test]
    fn district_options_follow_state_key() {
        let options = regions().district_options("tamil-nadu");
        let labels: Vec<&str> = options.iter().map(|o| o.label.as_str()).collect();
        assert_eq!(labels, vec![ALL_DISTRICTS_LABEL, "Chennai", "Salem"]);
        assert_eq!(options[1].value, "chennai");

        assert_eq!(regions().district_options("").len(), 1);
        assert_eq!(regions().district_options("atlantis").len(), 1);
    }

    #[test]
    fn record_accepts_backend_quantity_and_float_price() {
        let record: MarketRecord = serde_json::from_str(
            r#"{"market":"Salem","state":"Tamil Nadu","commodity":"Onion","price":2450.0,"quantity":12.5,"date":"2025-01-15T00:00:00"}"#,
        )
        .unwrap();

        assert_eq!(record.price, 2450);
        assert_eq!(record.total_volume, 12.5);
        assert_eq!(record.district, "");
        assert_eq!(record.variety, "");
    }

    #[test]
    fn record_treats_null_fields_as_missing() {
        let record: MarketRecord = serde_json::from_str(
            r#"{"market":"A","variety":null,"price":null,"totalVolume":null}"#,
        )
        .unwrap();
        assert_eq!(record.price, 0);
        assert_eq!(record.total_volume, 0.0);
        assert_eq!(record.variety, "");
    }

    #[test]
    fn en_in_formatting_groups_lakhs_and_trims_fraction() {
        assert_eq!(format_en_in(0.0), "0");
        assert_eq!(format_en_in(20.0), "20");
        assert_eq!(format_en_in(25.5), "25.5");
        assert_eq!(format_en_in(1_234.0), "1,234");
        assert_eq!(format_en_in(12_345.0), "12,345");
        assert_eq!(format_en_in(123_456.0), "1,23,456");
        assert_eq!(format_en_in(1_234_567.891), "12,34,567.891");
        assert_eq!(format_en_in(2.0 / 3.0), "0.667");
        assert_eq!(format_en_in(-1_500.25), "-1,500.25");
    }

    #[test]
    fn display_date_handles_iso_variants() {
        assert_eq!(format_display_date("2025-01-15"), "15/01/2025");
        assert_eq!(format_display_date("2025-01-15T08:30:00"), "15/01/2025");
        assert_eq!(format_display_date("2025-01-15T20:00:00Z"), "16/01/2025");
        assert_eq!(format_display_date("yesterday"), "yesterday");
        assert_eq!(format_display_date(""), MISSING_TEXT);
    }

    #[test]
    fn filter_state_query_pairs_keep_empty_fields() {
        let filters = FilterState {
            crop: "onion".to_string(),
            ..FilterState::default()
        };
        let pairs = filters.query_pairs();
        assert_eq!(pairs[0], ("state", ""));
        assert_eq!(pairs[2], ("crop", "onion"));
        assert!(!filters.is_empty());
        assert!(FilterState::default().is_empty());
    }
}
