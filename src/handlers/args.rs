//! Loose argument coercion.
//!
//! Callers send loosely typed JSON. Every accessor here accepts the shapes
//! a client plausibly sends for a field and returns `None` for anything
//! else, so handlers never fail on a wrong-shaped optional field.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{Map, Value};

use super::DomainError;
use crate::sanitize::{sanitize_text, sanitize_textarea};

/// Largest page size any listing accepts. The REST backend rejects more.
pub const MAX_PER_PAGE: u32 = 100;

/// Borrowed view over a handler's argument map.
#[derive(Debug, Clone, Copy)]
pub struct Args<'a> {
    map: &'a Map<String, Value>,
}

impl<'a> Args<'a> {
    pub fn new(map: &'a Map<String, Value>) -> Self {
        Self { map }
    }

    pub fn raw(&self, key: &str) -> Option<&'a Value> {
        self.map.get(key).filter(|v| !v.is_null())
    }

    /// Unprocessed string form of a scalar.
    fn scalar(&self, key: &str) -> Option<String> {
        match self.raw(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(true) => Some("1".into()),
            Value::Bool(false) => Some(String::new()),
            _ => None,
        }
    }

    /// Single-line plain text. Empty after sanitizing counts as absent.
    pub fn text(&self, key: &str) -> Option<String> {
        self.scalar(key)
            .map(|s| sanitize_text(&s))
            .filter(|s| !s.is_empty())
    }

    /// Multi-line plain text.
    pub fn textarea(&self, key: &str) -> Option<String> {
        self.scalar(key)
            .map(|s| sanitize_textarea(&s))
            .filter(|s| !s.is_empty())
    }

    /// String value without sanitizing. Used for rich content and passwords.
    pub fn verbatim(&self, key: &str) -> Option<String> {
        self.scalar(key).filter(|s| !s.is_empty())
    }

    pub fn required_text(&self, key: &str) -> Result<String, DomainError> {
        self.text(key).ok_or_else(|| DomainError::required(key))
    }

    /// Integers from numbers (fractions truncate), numeric strings and bools.
    pub fn integer(&self, key: &str) -> Option<i64> {
        match self.raw(key)? {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
            Value::String(s) => parse_int(s),
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        match self.raw(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok().filter(|f: &f64| f.is_finite()),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Booleans from bools, numbers and `true`/`1`/`yes`/`on` strings.
    pub fn boolean(&self, key: &str) -> Option<bool> {
        match self.raw(key)? {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => n.as_f64().map(|f| f != 0.0),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Some(true),
                "false" | "0" | "no" | "off" | "" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Positive id. Zero and negatives count as absent.
    pub fn id(&self, key: &str) -> Option<u64> {
        self.integer(key).filter(|&n| n > 0).map(|n| n as u64)
    }

    pub fn required_id(&self, key: &str) -> Result<u64, DomainError> {
        self.id(key).ok_or_else(|| DomainError::required(key))
    }

    /// Integer with a fallback and a lower bound.
    pub fn integer_or(&self, key: &str, default: i64, min: i64) -> i64 {
        self.integer(key).unwrap_or(default).max(min)
    }

    /// `per_page`, clamped to `1..=MAX_PER_PAGE`.
    pub fn per_page(&self, default: u32) -> u32 {
        self.integer_or("per_page", i64::from(default), 1)
            .min(i64::from(MAX_PER_PAGE)) as u32
    }

    /// `page`, at least 1.
    pub fn page(&self) -> u32 {
        self.integer_or("page", 1, 1).min(i64::from(u32::MAX)) as u32
    }

    pub fn array(&self, key: &str) -> Option<&'a Vec<Value>> {
        self.raw(key)?.as_array()
    }

    pub fn object(&self, key: &str) -> Option<&'a Map<String, Value>> {
        self.raw(key)?.as_object()
    }

    /// An object of scalar fields, each sanitized as plain text.
    pub fn text_map(&self, key: &str) -> Option<BTreeMap<String, String>> {
        let obj = self.object(key)?;
        let nested = Args::new(obj);
        Some(
            obj.keys()
                .filter_map(|k| nested.text(k).map(|v| (sanitize_text(k), v)))
                .filter(|(k, _)| !k.is_empty())
                .collect(),
        )
    }

    /// Positive ids from an array of numbers or numeric strings.
    pub fn id_list(&self, key: &str) -> Vec<u64> {
        self.array(key)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| match v {
                        Value::Number(n) => n.as_i64(),
                        Value::String(s) => parse_int(s),
                        _ => None,
                    })
                    .filter(|&n| n > 0)
                    .map(|n| n as u64)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// A `YYYY-MM-DD` date.
    pub fn date(&self, key: &str) -> Option<NaiveDate> {
        let raw = self.text(key)?;
        NaiveDate::parse_from_str(&raw, "%Y-%m-%d").ok()
    }
}

/// Leading integer of a string, the way loose numeric parsing reads it:
/// `"12"`, `" 12 "`, `"12.9"` and `"12abc"` all give 12.
fn parse_int(s: &str) -> Option<i64> {
    let s = s.trim();
    let (sign, digits) = match s.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, s.strip_prefix('+').unwrap_or(s)),
    };
    let end = digits
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().ok().map(|n| sign * n)
}

/// Start of the given day, UTC.
pub fn day_start(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc()
}

/// Last second of the given day, UTC.
pub fn day_end(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_opt(23, 59, 59).unwrap_or_default().and_utc()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn with(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_text_sanitizes_and_drops_empty() {
        let map = with(json!({"a": "  <b>Hi</b>\n", "b": "   ", "c": 12, "d": ["x"]}));
        let args = Args::new(&map);
        assert_eq!(args.text("a").as_deref(), Some("Hi"));
        assert_eq!(args.text("b"), None);
        assert_eq!(args.text("c").as_deref(), Some("12"));
        assert_eq!(args.text("d"), None);
        assert_eq!(args.text("missing"), None);
    }

    #[test]
    fn test_integer_coercion() {
        let map = with(json!({
            "n": 5, "f": 7.9, "s": " 12 ", "mixed": "3abc", "neg": "-4",
            "bad": "abc", "t": true, "arr": [1]
        }));
        let args = Args::new(&map);
        assert_eq!(args.integer("n"), Some(5));
        assert_eq!(args.integer("f"), Some(7));
        assert_eq!(args.integer("s"), Some(12));
        assert_eq!(args.integer("mixed"), Some(3));
        assert_eq!(args.integer("neg"), Some(-4));
        assert_eq!(args.integer("bad"), None);
        assert_eq!(args.integer("t"), Some(1));
        assert_eq!(args.integer("arr"), None);
    }

    #[test]
    fn test_integer_or_clamps() {
        let map = with(json!({"per_page": -3, "page": "abc"}));
        let args = Args::new(&map);
        assert_eq!(args.integer_or("per_page", 10, 1), 1);
        assert_eq!(args.integer_or("page", 1, 1), 1);
        assert_eq!(args.integer_or("absent", 20, 1), 20);
        assert_eq!(args.per_page(10), 1);
        assert_eq!(args.page(), 1);

        let map = with(json!({"per_page": 5000, "page": "3"}));
        let args = Args::new(&map);
        assert_eq!(args.per_page(10), MAX_PER_PAGE);
        assert_eq!(args.page(), 3);
    }

    #[test]
    fn test_boolean_coercion() {
        let map = with(json!({"a": "yes", "b": 0, "c": "TRUE", "d": "maybe", "e": false}));
        let args = Args::new(&map);
        assert_eq!(args.boolean("a"), Some(true));
        assert_eq!(args.boolean("b"), Some(false));
        assert_eq!(args.boolean("c"), Some(true));
        assert_eq!(args.boolean("d"), None);
        assert_eq!(args.boolean("e"), Some(false));
    }

    #[test]
    fn test_ids() {
        let map = with(json!({"id": "0", "ok": "42", "list": [3, "4", -1, "x", 0]}));
        let args = Args::new(&map);
        assert_eq!(args.id("id"), None);
        assert_eq!(args.id("ok"), Some(42));
        assert_eq!(args.id_list("list"), vec![3, 4]);
        assert_eq!(args.required_id("id"), Err(DomainError::required("id")));
    }

    #[test]
    fn test_text_map() {
        let map = with(json!({"billing": {"first_name": " Jo ", "city": "<i>Lyon</i>", "nested": {}}}));
        let args = Args::new(&map);
        let billing = args.text_map("billing").unwrap();
        assert_eq!(billing.get("first_name").map(String::as_str), Some("Jo"));
        assert_eq!(billing.get("city").map(String::as_str), Some("Lyon"));
        assert!(!billing.contains_key("nested"));
    }

    #[test]
    fn test_dates() {
        let map = with(json!({"from": "2024-02-29", "bad": "29/02/2024"}));
        let args = Args::new(&map);
        let from = args.date("from").unwrap();
        assert_eq!(day_start(from).to_rfc3339(), "2024-02-29T00:00:00+00:00");
        assert_eq!(day_end(from).to_rfc3339(), "2024-02-29T23:59:59+00:00");
        assert_eq!(args.date("bad"), None);
    }
}
