//! Key/value filter sets for network listing and pruning

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, Utc};
use serde_json::Value;

use crate::backend::is_predefined_network;
use crate::error::NetworkError;
use crate::network::NetworkResource;

/// Filter keys accepted when listing networks
pub const ACCEPTED_NETWORK_FILTERS: &[&str] = &["driver", "type", "name", "id", "label", "scope"];

/// Filter keys accepted when pruning networks
pub const ACCEPTED_PRUNE_FILTERS: &[&str] = &["until", "label", "label!"];

const TYPE_CUSTOM: &str = "custom";
const TYPE_BUILTIN: &str = "builtin";

/// A set of filter values grouped by key
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filters {
    fields: BTreeMap<String, BTreeSet<String>>,
}

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.entry(key.into()).or_default().insert(value.into());
    }

    /// Builder-style [`Filters::add`]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.add(key, value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn get(&self, key: &str) -> impl Iterator<Item = &str> {
        self.fields
            .get(key)
            .into_iter()
            .flat_map(|values| values.iter().map(String::as_str))
    }

    /// Decode the JSON form used on the wire.
    ///
    /// Accepts `{"key":{"value":true}}` as well as the legacy
    /// `{"key":["value"]}`. An empty string means no filters.
    pub fn from_json(input: &str) -> Result<Self, NetworkError> {
        let mut filters = Filters::new();
        if input.trim().is_empty() {
            return Ok(filters);
        }

        let invalid = |detail: &str| {
            NetworkError::invalid_parameter(format!("invalid filter '{}': {}", input, detail))
        };

        let root: Value = serde_json::from_str(input).map_err(|e| invalid(&e.to_string()))?;
        let Value::Object(map) = root else {
            return Err(invalid("expected a JSON object"));
        };

        for (key, values) in map {
            match values {
                Value::Object(set) => {
                    for (value, enabled) in set {
                        match enabled {
                            Value::Bool(true) => filters.add(key.clone(), value),
                            Value::Bool(false) => {}
                            _ => return Err(invalid("filter values must be booleans")),
                        }
                    }
                }
                Value::Array(list) => {
                    for value in list {
                        let Value::String(value) = value else {
                            return Err(invalid("filter values must be strings"));
                        };
                        filters.add(key.clone(), value);
                    }
                }
                _ => return Err(invalid("expected an object or an array of values")),
            }
        }

        Ok(filters)
    }

    /// Parse `key=value` arguments as given on a command line
    pub fn from_args<S: AsRef<str>>(args: &[S]) -> Result<Self, NetworkError> {
        let mut filters = Filters::new();
        for arg in args {
            let arg = arg.as_ref();
            match arg.split_once('=') {
                Some((key, value)) if !key.is_empty() => filters.add(key, value),
                _ => {
                    return Err(NetworkError::invalid_parameter(format!(
                        "bad format of filter (expected name=value): '{}'",
                        arg
                    )))
                }
            }
        }
        Ok(filters)
    }

    /// Reject any key not in `accepted`
    pub fn validate(&self, accepted: &[&str]) -> Result<(), NetworkError> {
        match self.fields.keys().find(|key| !accepted.contains(&key.as_str())) {
            Some(key) => Err(NetworkError::invalid_parameter(format!(
                "invalid filter '{}'",
                key
            ))),
            None => Ok(()),
        }
    }

    /// True when no `key` filter is set or one of its values equals `candidate`
    pub fn exact_match(&self, key: &str, candidate: &str) -> bool {
        match self.fields.get(key) {
            Some(values) => values.contains(candidate),
            None => true,
        }
    }

    /// Creation time cutoff of the `until` filter, resolved against `now`.
    ///
    /// Accepts a duration such as `24h` or `1h30m`, an RFC 3339 timestamp,
    /// a `YYYY-MM-DD[THH:MM[:SS]]` UTC time or Unix seconds.
    pub fn until_cutoff(&self, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>, NetworkError> {
        let mut values = self.get("until");
        let Some(value) = values.next() else {
            return Ok(None);
        };
        if values.next().is_some() {
            return Err(NetworkError::invalid_parameter("more than one until filter specified"));
        }

        parse_until(value, now).map(Some).ok_or_else(|| {
            NetworkError::invalid_parameter(format!("invalid until filter '{}'", value))
        })
    }

    /// True when no `key` filter is set or one of its `name[=value]` entries
    /// matches `labels`
    pub fn match_kv_list(&self, key: &str, labels: &HashMap<String, String>) -> bool {
        match self.fields.get(key) {
            Some(values) => values.iter().any(|entry| label_matches(entry, labels)),
            None => true,
        }
    }
}

pub(crate) fn label_matches(entry: &str, labels: &HashMap<String, String>) -> bool {
    match entry.split_once('=') {
        Some((name, value)) => labels.get(name).is_some_and(|v| v == value),
        None => labels.contains_key(entry),
    }
}

fn parse_until(value: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if let Some(age) = parse_duration(value) {
        return now.checked_sub_signed(age);
    }
    if let Ok(time) = DateTime::parse_from_rfc3339(value) {
        return Some(time.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(time) = NaiveDateTime::parse_from_str(value, format) {
            return Some(time.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|time| time.and_utc());
    }
    parse_unix_seconds(value)
}

/// `<seconds>[.<fraction>]`
fn parse_unix_seconds(value: &str) -> Option<DateTime<Utc>> {
    let (secs, fraction) = value.split_once('.').unwrap_or((value, ""));
    if fraction.len() > 9 || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let secs = secs.parse::<i64>().ok()?;
    let nanos = if fraction.is_empty() {
        0
    } else {
        format!("{:0<9}", fraction).parse::<u32>().ok()?
    };
    DateTime::from_timestamp(secs, nanos)
}

/// Durations written as a sequence of `<number><unit>`, e.g. `1h30m` or `1.5s`
fn parse_duration(value: &str) -> Option<TimeDelta> {
    let (negative, mut rest) = match value.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, value.strip_prefix('+').unwrap_or(value)),
    };
    if rest == "0" {
        return Some(TimeDelta::zero());
    }
    if rest.is_empty() {
        return None;
    }

    let mut nanos = 0f64;
    while !rest.is_empty() {
        let number_end = rest.find(|c: char| !(c.is_ascii_digit() || c == '.'))?;
        let (number, tail) = rest.split_at(number_end);
        let number: f64 = number.parse().ok()?;

        let unit_end = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_end);
        let scale = match unit {
            "ns" => 1.0,
            "us" | "µs" | "μs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            _ => return None,
        };

        nanos += number * scale;
        rest = tail;
    }

    if nanos > i64::MAX as f64 {
        return None;
    }
    let nanos = nanos as i64;
    Some(TimeDelta::nanoseconds(if negative { -nanos } else { nanos }))
}

/// Apply `filters` to `views`, keeping the views that satisfy every key.
///
/// Unknown keys and unknown `type` values fail before anything is filtered.
pub fn filter_networks(
    views: Vec<NetworkResource>,
    filters: &Filters,
) -> Result<Vec<NetworkResource>, NetworkError> {
    filters.validate(ACCEPTED_NETWORK_FILTERS)?;

    for value in filters.get("type") {
        if value != TYPE_CUSTOM && value != TYPE_BUILTIN {
            return Err(NetworkError::invalid_parameter(format!(
                "invalid filter: 'type'='{}'",
                value
            )));
        }
    }

    if filters.is_empty() {
        return Ok(views);
    }

    Ok(views
        .into_iter()
        .filter(|view| matches_view(view, filters))
        .collect())
}

fn matches_view(view: &NetworkResource, filters: &Filters) -> bool {
    filters.exact_match("driver", &view.driver)
        && filters.exact_match("name", &view.name)
        && filters.exact_match("id", &view.id)
        && filters.exact_match("scope", &view.scope)
        && filters.exact_match("type", network_type(view))
        && filters.match_kv_list("label", &view.labels)
}

fn network_type(view: &NetworkResource) -> &'static str {
    if is_predefined_network(&view.name) {
        TYPE_BUILTIN
    } else {
        TYPE_CUSTOM
    }
}
