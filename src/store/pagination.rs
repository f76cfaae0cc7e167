// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Link-header pagination and record deduplication

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

/// One page of records plus the continuation URL, if any
#[derive(Debug, Clone, Default)]
pub struct FetchPage {
    pub records: Vec<Value>,
    pub next: Option<String>,
}

fn link_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"<([^>]*)>\s*;\s*rel="?([^";,]+)"?"#).expect("link pattern is valid")
    })
}

/// Extract the `rel="next"` URL from a `Link` header value.
///
/// Entries look like `<https://shop/admin/api/2025-07/orders.json?page_info=abc>; rel="next"`.
pub fn next_link(header: &str) -> Option<String> {
    link_pattern()
        .captures_iter(header)
        .find(|caps| caps[2].trim().eq_ignore_ascii_case("next"))
        .map(|caps| caps[1].trim().to_string())
        .filter(|url| !url.is_empty())
}

/// Identity used for deduplication. Numeric and string ids with the same text
/// collapse together.
fn record_key(record: &Value) -> Option<String> {
    match record.get("id")? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Keep the first record seen for each id, preserving order. Records without
/// an id cannot be compared and are all kept.
pub fn dedup_by_id(records: Vec<Value>) -> Vec<Value> {
    let mut seen = HashSet::with_capacity(records.len());
    records
        .into_iter()
        .filter(|record| match record_key(record) {
            Some(key) => seen.insert(key),
            None => true,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_next_link_single() {
        let header = r#"<https://shop.example/admin/api/2025-07/orders.json?limit=250&page_info=abc>; rel="next""#;
        assert_eq!(
            next_link(header).as_deref(),
            Some("https://shop.example/admin/api/2025-07/orders.json?limit=250&page_info=abc")
        );
    }

    #[test]
    fn test_next_link_with_previous() {
        let header = concat!(
            r#"<https://shop.example/orders.json?page_info=prev>; rel="previous", "#,
            r#"<https://shop.example/orders.json?page_info=next>; rel="next""#
        );
        assert_eq!(
            next_link(header).as_deref(),
            Some("https://shop.example/orders.json?page_info=next")
        );
    }

    #[test]
    fn test_next_link_absent() {
        let header = r#"<https://shop.example/orders.json?page_info=prev>; rel="previous""#;
        assert!(next_link(header).is_none());
        assert!(next_link("").is_none());
    }

    #[test]
    fn test_next_link_with_commas_in_url() {
        let header = r#"<https://shop.example/orders.json?fields=id,name&page_info=x>; rel="next""#;
        assert_eq!(
            next_link(header).as_deref(),
            Some("https://shop.example/orders.json?fields=id,name&page_info=x")
        );
    }

    #[test]
    fn test_dedup_keeps_first_occurrence_in_order() {
        let records = vec![
            json!({"id": 1, "v": "a"}),
            json!({"id": 2, "v": "b"}),
            json!({"id": 1, "v": "c"}),
            json!({"id": 3, "v": "d"}),
            json!({"id": 2, "v": "e"}),
        ];
        let deduped = dedup_by_id(records);
        let values: Vec<&str> = deduped.iter().map(|r| r["v"].as_str().unwrap()).collect();
        assert_eq!(values, vec!["a", "b", "d"]);
    }

    #[test]
    fn test_dedup_string_and_number_ids_collapse() {
        let records = vec![json!({"id": 7}), json!({"id": "7"})];
        assert_eq!(dedup_by_id(records).len(), 1);
    }

    #[test]
    fn test_dedup_keeps_records_without_id() {
        let records = vec![json!({"name": "x"}), json!({"name": "x"}), json!({"id": null})];
        assert_eq!(dedup_by_id(records).len(), 3);
    }
}
