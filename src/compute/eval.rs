// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Evaluator for compute programs

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

use super::lexer::CmpOp;
use super::parser::{AggKind, Expr, Func, GroupAgg, Pipeline, Stage, Statement};
use super::render::{format_number, markdown_table};
use super::scope::ExecutionScope;
use super::ComputeError;

/// Run statements in order against `scope`, returning the value of the last
/// one. `let` bindings persist in the scope for later compute calls.
pub fn execute(
    statements: &[Statement],
    scope: &mut ExecutionScope,
) -> Result<Value, ComputeError> {
    let mut last = Value::Null;
    for statement in statements {
        last = match statement {
            Statement::Let { name, pipeline } => {
                let value = run_pipeline(pipeline, scope)?;
                let summary = describe_value(&value);
                scope.insert(name.clone(), value);
                Value::String(format!("Stored '{}' ({})", name, summary))
            }
            Statement::Eval(pipeline) => run_pipeline(pipeline, scope)?,
        };
    }
    Ok(last)
}

fn run_pipeline(pipeline: &Pipeline, scope: &ExecutionScope) -> Result<Value, ComputeError> {
    let mut value = eval_expr(&pipeline.source, scope)?;
    for stage in &pipeline.stages {
        value = apply_stage(value, stage, scope)?;
    }
    Ok(value)
}

fn eval_expr(expr: &Expr, scope: &ExecutionScope) -> Result<Value, ComputeError> {
    match expr {
        Expr::Var(name) => scope
            .get(name)
            .cloned()
            .ok_or_else(|| ComputeError::UnknownVariable {
                name: name.clone(),
                available: scope.names().join(", "),
            }),
        Expr::Value(value) => Ok(value.clone()),
        Expr::Call(func) => eval_func(func).map(Value::String),
    }
}

fn eval_func(func: &Func) -> Result<String, ComputeError> {
    let now = Utc::now();
    let instant = match func {
        Func::DaysAgo(days) => days_before(now, *days)?,
        Func::Today => now
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|midnight| midnight.and_utc())
            .unwrap_or(now),
        Func::Now => now,
    };
    Ok(instant.to_rfc3339_opts(SecondsFormat::Secs, true))
}

fn days_before(now: DateTime<Utc>, days: f64) -> Result<DateTime<Utc>, ComputeError> {
    let out_of_range = || ComputeError::Range(format!("days_ago({}) is outside the calendar", days));
    let seconds = days * 86_400.0;
    if !seconds.is_finite() || seconds.abs() >= i64::MAX as f64 {
        return Err(out_of_range());
    }
    chrono::Duration::try_seconds(seconds as i64)
        .and_then(|delta| now.checked_sub_signed(delta))
        .ok_or_else(out_of_range)
}

fn apply_stage(value: Value, stage: &Stage, scope: &ExecutionScope) -> Result<Value, ComputeError> {
    match stage {
        Stage::Where { path, op, rhs } => {
            let rhs = eval_expr(rhs, scope)?;
            let rows = into_rows(value, "where")?;
            Ok(Value::Array(
                rows.into_iter()
                    .filter(|row| matches(lookup(row, path), *op, &rhs))
                    .collect(),
            ))
        }
        Stage::Select(paths) => {
            let rows = into_rows(value, "select")?;
            Ok(Value::Array(
                rows.iter()
                    .map(|row| {
                        let mut out = Map::new();
                        for path in paths {
                            out.insert(path.clone(), lookup(row, path).cloned().unwrap_or(Value::Null));
                        }
                        Value::Object(out)
                    })
                    .collect(),
            ))
        }
        Stage::SortBy { path, descending } => {
            let mut rows = into_rows(value, "sort_by")?;
            rows.sort_by(|a, b| {
                sort_order(lookup(a, path), lookup(b, path), *descending)
            });
            Ok(Value::Array(rows))
        }
        Stage::Take(n) => {
            let mut rows = into_rows(value, "take")?;
            rows.truncate(*n);
            Ok(Value::Array(rows))
        }
        Stage::Flatten(path) => {
            let rows = into_rows(value, "flatten")?;
            let mut out = Vec::new();
            for row in &rows {
                match lookup(row, path) {
                    Some(Value::Array(items)) => out.extend(items.iter().cloned()),
                    Some(Value::Null) | None => {}
                    Some(other) => out.push(other.clone()),
                }
            }
            Ok(Value::Array(out))
        }
        Stage::Distinct(path) => {
            let rows = into_rows(value, "distinct")?;
            let mut seen = std::collections::HashSet::new();
            let mut out = Vec::new();
            for row in &rows {
                let item = match path {
                    Some(path) => match lookup(row, path) {
                        Some(Value::Null) | None => continue,
                        Some(v) => v,
                    },
                    None => row,
                };
                if seen.insert(key_text(item)) {
                    out.push(item.clone());
                }
            }
            Ok(Value::Array(out))
        }
        Stage::Count => match value {
            Value::Array(items) => Ok(Value::from(items.len())),
            Value::Object(map) => Ok(Value::from(map.len())),
            Value::Null => Ok(Value::from(0)),
            other => Err(type_error("count", "a list", &other)),
        },
        Stage::Aggregate { kind, path } => {
            let rows = into_rows(value, aggregate_name(*kind))?;
            let values: Vec<&Value> = rows
                .iter()
                .filter_map(|row| match path {
                    Some(path) => lookup(row, path),
                    None => Some(row),
                })
                .filter(|v| !v.is_null())
                .collect();
            Ok(aggregate(*kind, &values))
        }
        Stage::GroupBy { path, agg } => {
            let rows = into_rows(value, "group_by")?;
            Ok(group_by(&rows, path, agg))
        }
        Stage::Table(columns) => Ok(Value::String(markdown_table(&value, columns))),
        Stage::Keys => {
            let keys = match &value {
                Value::Object(map) => map.keys().cloned().collect::<Vec<_>>(),
                Value::Array(items) => match items.first() {
                    Some(Value::Object(map)) => map.keys().cloned().collect(),
                    Some(_) => return Err(type_error("keys", "a list of records", &value)),
                    None => Vec::new(),
                },
                other => return Err(type_error("keys", "a record or list of records", other)),
            };
            Ok(Value::Array(keys.into_iter().map(Value::String).collect()))
        }
    }
}

fn aggregate_name(kind: AggKind) -> &'static str {
    match kind {
        AggKind::Sum => "sum",
        AggKind::Avg => "avg",
        AggKind::Min => "min",
        AggKind::Max => "max",
    }
}

fn aggregate(kind: AggKind, values: &[&Value]) -> Value {
    match kind {
        AggKind::Sum => number(values.iter().filter_map(|v| as_number(v)).sum()),
        AggKind::Avg => {
            let numbers: Vec<f64> = values.iter().filter_map(|v| as_number(v)).collect();
            if numbers.is_empty() {
                Value::Null
            } else {
                number(numbers.iter().sum::<f64>() / numbers.len() as f64)
            }
        }
        AggKind::Min | AggKind::Max => {
            let want = if kind == AggKind::Min {
                Ordering::Less
            } else {
                Ordering::Greater
            };
            let mut best: Option<&Value> = None;
            for value in values {
                best = match best {
                    Some(current) if compare_values(value, current) != Some(want) => Some(current),
                    _ => Some(*value),
                };
            }
            best.cloned().unwrap_or(Value::Null)
        }
    }
}

enum Accumulator {
    Count(u64),
    Sum(f64),
    Avg(f64, u64),
}

impl Accumulator {
    fn result(&self) -> f64 {
        match self {
            Accumulator::Count(n) => *n as f64,
            Accumulator::Sum(total) => *total,
            Accumulator::Avg(total, n) if *n > 0 => total / *n as f64,
            Accumulator::Avg(..) => 0.0,
        }
    }
}

/// Group rows by `path` and aggregate; rows come back as `{key, value}`
/// sorted by value descending, ties in first-seen order.
fn group_by(rows: &[Value], path: &str, agg: &GroupAgg) -> Value {
    let mut order: Vec<(Value, Accumulator)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for row in rows {
        let key = lookup(row, path).cloned().unwrap_or(Value::Null);
        let slot = *index.entry(key_text(&key)).or_insert_with(|| {
            let acc = match agg {
                GroupAgg::Count => Accumulator::Count(0),
                GroupAgg::Sum(_) => Accumulator::Sum(0.0),
                GroupAgg::Avg(_) => Accumulator::Avg(0.0, 0),
            };
            order.push((key.clone(), acc));
            order.len() - 1
        });

        let acc = &mut order[slot].1;
        match (acc, agg) {
            (Accumulator::Count(n), _) => *n += 1,
            (Accumulator::Sum(total), GroupAgg::Sum(field)) => {
                *total += lookup(row, field).and_then(as_number).unwrap_or(0.0);
            }
            (Accumulator::Avg(total, n), GroupAgg::Avg(field)) => {
                if let Some(v) = lookup(row, field).and_then(as_number) {
                    *total += v;
                    *n += 1;
                }
            }
            _ => {}
        }
    }

    let mut groups: Vec<(Value, f64)> = order
        .into_iter()
        .map(|(key, acc)| (key, acc.result()))
        .collect();
    groups.sort_by(|a, b| b.1.total_cmp(&a.1));

    Value::Array(
        groups
            .into_iter()
            .map(|(key, value)| serde_json::json!({"key": key, "value": number(value)}))
            .collect(),
    )
}

fn into_rows(value: Value, stage: &str) -> Result<Vec<Value>, ComputeError> {
    match value {
        Value::Array(items) => Ok(items),
        Value::Null => Ok(Vec::new()),
        other => Err(type_error(stage, "a list", &other)),
    }
}

fn type_error(stage: &str, expected: &str, got: &Value) -> ComputeError {
    let kind = match got {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a record",
    };
    ComputeError::Type(format!("'{}' expects {}, got {}", stage, expected, kind))
}

/// Follow a dotted path through objects (and numeric list indexes).
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Numeric view of a value; numeric strings count.
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

/// Timestamp view of a string: RFC 3339, naive datetime, or plain date.
pub fn as_instant(value: &Value) -> Option<DateTime<Utc>> {
    let text = value.as_str()?.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt.and_utc());
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Order two values: numbers numerically, timestamps chronologically, other
/// strings lexically. Mixed kinds are unordered.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (as_number(a), as_number(b)) {
        return x.partial_cmp(&y);
    }
    if let (Some(x), Some(y)) = (as_instant(a), as_instant(b)) {
        return Some(x.cmp(&y));
    }
    match (a, b) {
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

/// Kind rank used to order values that `compare_values` cannot relate:
/// numbers, then timestamps, then other strings, then booleans, then the rest.
fn kind_rank(value: &Value) -> u8 {
    if as_number(value).is_some() {
        return 0;
    }
    if as_instant(value).is_some() {
        return 1;
    }
    match value {
        Value::String(_) => 2,
        Value::Bool(_) => 3,
        _ => 4,
    }
}

/// A total order over values for sorting: by kind first, then within a kind.
pub fn total_order(a: &Value, b: &Value) -> Ordering {
    let (rank_a, rank_b) = (kind_rank(a), kind_rank(b));
    if rank_a != rank_b {
        return rank_a.cmp(&rank_b);
    }
    match rank_a {
        0 => match (as_number(a), as_number(b)) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            _ => Ordering::Equal,
        },
        1 => as_instant(a).cmp(&as_instant(b)),
        2 => a.as_str().cmp(&b.as_str()),
        3 => a.as_bool().cmp(&b.as_bool()),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    compare_values(a, b) == Some(Ordering::Equal) || a == b
}

fn matches(lhs: Option<&Value>, op: CmpOp, rhs: &Value) -> bool {
    let lhs = lhs.unwrap_or(&Value::Null);
    match op {
        CmpOp::Eq => values_equal(lhs, rhs),
        CmpOp::Ne => !values_equal(lhs, rhs),
        CmpOp::Contains => match (lhs, rhs) {
            (Value::String(hay), Value::String(needle)) => {
                hay.to_lowercase().contains(&needle.to_lowercase())
            }
            (Value::Array(items), needle) => items.iter().any(|item| values_equal(item, needle)),
            _ => false,
        },
        CmpOp::Gt => compare_values(lhs, rhs) == Some(Ordering::Greater),
        CmpOp::Ge => matches!(
            compare_values(lhs, rhs),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        CmpOp::Lt => compare_values(lhs, rhs) == Some(Ordering::Less),
        CmpOp::Le => matches!(
            compare_values(lhs, rhs),
            Some(Ordering::Less | Ordering::Equal)
        ),
    }
}

/// Missing and null values sort last in either direction.
fn sort_order(a: Option<&Value>, b: Option<&Value>, descending: bool) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(x), Some(y)) => {
            let ord = total_order(x, y);
            if descending {
                ord.reverse()
            } else {
                ord
            }
        }
    }
}

fn key_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn number(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

/// One-line description used when a `let` binding is stored.
pub fn describe_value(value: &Value) -> String {
    match value {
        Value::Array(items) => format!("list of {} items", items.len()),
        Value::Object(map) => format!("record with {} fields", map.len()),
        Value::Number(n) => n.as_f64().map(format_number).unwrap_or_else(|| n.to_string()),
        Value::String(s) => format!("string of {} chars", s.chars().count()),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lookup_nested_and_index() {
        let row = json!({"billing_address": {"city": "Chicago"}, "line_items": [{"title": "A"}]});
        assert_eq!(lookup(&row, "billing_address.city"), Some(&json!("Chicago")));
        assert_eq!(lookup(&row, "line_items.0.title"), Some(&json!("A")));
        assert_eq!(lookup(&row, "customer.id"), None);
    }

    #[test]
    fn test_compare_numeric_strings_and_instants() {
        assert_eq!(compare_values(&json!("100.00"), &json!(50)), Some(Ordering::Greater));
        assert_eq!(
            compare_values(&json!("2025-12-15T10:00:00-05:00"), &json!("2025-12-15T14:00:00Z")),
            Some(Ordering::Greater)
        );
        assert_eq!(
            compare_values(&json!("2025-12-15T00:00:00Z"), &json!("2025-12-15")),
            Some(Ordering::Equal)
        );
        assert_eq!(compare_values(&json!("abc"), &json!(1)), None);
    }

    #[test]
    fn test_matches_ops() {
        assert!(matches(Some(&json!("Paid")), CmpOp::Contains, &json!("pai")));
        assert!(matches(Some(&json!(["vip", "new"])), CmpOp::Contains, &json!("vip")));
        assert!(matches(Some(&json!(101)), CmpOp::Eq, &json!("101")));
        assert!(matches(None, CmpOp::Eq, &Value::Null));
        assert!(!matches(None, CmpOp::Gt, &json!(0)));
        assert!(matches(Some(&json!(5)), CmpOp::Le, &json!(5)));
    }

    #[test]
    fn test_sort_missing_last() {
        let mut rows = vec![json!({"v": 2}), json!({}), json!({"v": 3}), json!({"v": 1})];
        rows.sort_by(|a, b| sort_order(lookup(a, "v"), lookup(b, "v"), true));
        assert_eq!(rows, vec![json!({"v": 3}), json!({"v": 2}), json!({"v": 1}), json!({})]);
    }

    #[test]
    fn test_aggregate_min_max_dates() {
        let a = json!("2025-01-02T00:00:00Z");
        let b = json!("2024-12-31T00:00:00Z");
        let values = vec![&a, &b];
        assert_eq!(aggregate(AggKind::Min, &values), b);
        assert_eq!(aggregate(AggKind::Max, &values), a);
        assert_eq!(aggregate(AggKind::Avg, &[]), Value::Null);
        assert_eq!(aggregate(AggKind::Sum, &[]), json!(0));
    }

    #[test]
    fn test_days_ago_is_rfc3339() {
        let text = eval_func(&Func::DaysAgo(7.0)).unwrap();
        let parsed = DateTime::parse_from_rfc3339(&text).unwrap();
        let age = Utc::now() - parsed.with_timezone(&Utc);
        assert!(age.num_days() >= 6 && age.num_days() <= 7);
    }

    #[test]
    fn test_days_ago_out_of_calendar_is_an_error() {
        for days in [100_000_000.0, -100_000_000.0, 1e11, f64::INFINITY] {
            let err = eval_func(&Func::DaysAgo(days)).unwrap_err();
            assert!(matches!(err, ComputeError::Range(_)), "days_ago({})", days);
        }
    }

    #[test]
    fn test_days_ago_program_reports_error() {
        let mut scope = ExecutionScope::new();
        scope.insert("rows", json!([{"created_at": "2025-12-01T00:00:00Z"}]));
        let err = crate::compute::evaluate(
            "rows | where created_at >= days_ago(100000000) | count",
            &mut scope,
        )
        .unwrap_err();
        assert!(err.to_string().contains("outside the calendar"));
    }

    #[test]
    fn test_total_order_ranks_kinds() {
        assert_eq!(total_order(&json!(5), &json!("abc")), Ordering::Less);
        assert_eq!(total_order(&json!("abc"), &json!(3)), Ordering::Greater);
        assert_eq!(total_order(&json!("10"), &json!(9)), Ordering::Greater);
        assert_eq!(
            total_order(&json!("2025-01-01"), &json!("SKU-1")),
            Ordering::Less
        );
        assert_eq!(total_order(&json!(true), &json!("x")), Ordering::Greater);
    }

    #[test]
    fn test_sort_mixed_kinds_is_stable_and_grouped() {
        let mut rows = Vec::new();
        for i in 0..240 {
            let v = match i % 6 {
                0 => json!(i),
                1 => json!(format!("SKU-{}", i)),
                2 => Value::Null,
                3 => json!(format!("{}.5", i)),
                4 => json!(i % 2 == 0),
                _ => json!(format!("2025-01-{:02}", i % 28 + 1)),
            };
            rows.push(json!({"v": v}));
        }

        for descending in [false, true] {
            let mut sorted = rows.clone();
            sorted.sort_by(|a, b| sort_order(lookup(a, "v"), lookup(b, "v"), descending));
            let ranks: Vec<u8> = sorted
                .iter()
                .filter_map(|r| lookup(r, "v").filter(|v| !v.is_null()))
                .map(kind_rank)
                .collect();
            let mut expected = ranks.clone();
            expected.sort_unstable();
            if descending {
                expected.reverse();
            }
            assert_eq!(ranks, expected);
            assert!(sorted[200..].iter().all(|r| r["v"].is_null()));
            for pair in sorted.windows(2) {
                let (a, b) = (lookup(&pair[0], "v"), lookup(&pair[1], "v"));
                assert_ne!(sort_order(a, b, descending), Ordering::Greater);
            }
        }
    }

    #[test]
    fn test_describe_value() {
        assert_eq!(describe_value(&json!([1, 2, 3])), "list of 3 items");
        assert_eq!(describe_value(&json!(2.5)), "2.50");
    }
}
