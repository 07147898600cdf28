//! Condition evaluation over nested JSON data

use super::types::{Condition, FieldCondition, Operator};
use serde_json::Value;
use std::borrow::Cow;
use std::cmp::Ordering;

impl Condition {
    /// True iff every field predicate holds for `data`
    pub fn matches(&self, data: &Value) -> bool {
        self.fields().iter().all(|field| field.matches(data))
    }
}

impl FieldCondition {
    /// Resolve the path in `data` and test every operator against it
    pub fn matches(&self, data: &Value) -> bool {
        let candidate = resolve_path(data, &self.path);
        let candidate = candidate.as_deref();
        self.operators
            .iter()
            .all(|operator| operator.test(candidate))
    }
}

impl Operator {
    /// Test the operator against a resolved value; `None` is undefined
    pub fn test(&self, candidate: Option<&Value>) -> bool {
        match self {
            Operator::Eq(expected) => equals(candidate, expected),
            Operator::Ne(expected) => !equals(candidate, expected),
            Operator::In(list) => list.iter().any(|expected| equals(candidate, expected)),
            Operator::Nin(list) => !list.iter().any(|expected| equals(candidate, expected)),
            Operator::All(list) => match candidate {
                None => false,
                Some(Value::Array(items)) => list
                    .iter()
                    .all(|expected| items.iter().any(|item| loose_eq(item, expected))),
                Some(single) => list.iter().all(|expected| loose_eq(single, expected)),
            },
            Operator::Gt(bound) => any_element(candidate, |v| {
                matches!(compare(v, bound), Some(Ordering::Greater))
            }),
            Operator::Gte(bound) => any_element(candidate, |v| {
                matches!(compare(v, bound), Some(Ordering::Greater | Ordering::Equal))
            }),
            Operator::Lt(bound) => any_element(candidate, |v| {
                matches!(compare(v, bound), Some(Ordering::Less))
            }),
            Operator::Lte(bound) => any_element(candidate, |v| {
                matches!(compare(v, bound), Some(Ordering::Less | Ordering::Equal))
            }),
            Operator::Exists(expected) => candidate.is_some() == *expected,
            Operator::Regex(regex) => any_element(candidate, |v| match coerce_to_string(v) {
                Some(text) => regex.is_match(&text),
                None => false,
            }),
        }
    }
}

/// Walk a dotted path through objects and arrays
///
/// Numeric segments index into arrays. A non-numeric segment applied to an
/// array is applied to each element and the hits are collected, so
/// `comments.author` yields every comment's author.
pub fn resolve_path<'a>(data: &'a Value, path: &[String]) -> Option<Cow<'a, Value>> {
    let Some((head, rest)) = path.split_first() else {
        return Some(Cow::Borrowed(data));
    };

    match data {
        Value::Object(map) => map.get(head).and_then(|value| resolve_path(value, rest)),
        Value::Array(items) => {
            if let Ok(index) = head.parse::<usize>() {
                return items.get(index).and_then(|value| resolve_path(value, rest));
            }

            let mut found = Vec::new();
            for item in items {
                match resolve_path(item, path).map(Cow::into_owned) {
                    Some(Value::Array(nested)) => found.extend(nested),
                    Some(value) => found.push(value),
                    None => {}
                }
            }

            if found.is_empty() {
                None
            } else {
                Some(Cow::Owned(Value::Array(found)))
            }
        }
        _ => None,
    }
}

/// Equality used by plain values, `$eq`, `$ne`, `$in` and `$nin`
///
/// An undefined path equals `null`. A sequence candidate equals a scalar
/// expectation when any element does.
fn equals(candidate: Option<&Value>, expected: &Value) -> bool {
    match candidate {
        None => expected.is_null(),
        Some(value) => {
            if loose_eq(value, expected) {
                return true;
            }
            match (value, expected) {
                (Value::Array(items), scalar) if !scalar.is_array() => {
                    items.iter().any(|item| loose_eq(item, scalar))
                }
                _ => false,
            }
        }
    }
}

/// Structural equality with numbers compared by value (1 == 1.0)
pub fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => {
            if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
                return a == b;
            }
            if let (Some(a), Some(b)) = (a.as_u64(), b.as_u64()) {
                return a == b;
            }
            match (a.as_f64(), b.as_f64()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            }
        }
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| loose_eq(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(key, x)| b.get(key).is_some_and(|y| loose_eq(x, y)))
        }
        _ => left == right,
    }
}

/// Ordering between two numbers or two strings; anything else is unordered
fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => {
            if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
                return Some(a.cmp(&b));
            }
            a.as_f64()?.partial_cmp(&b.as_f64()?)
        }
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn any_element(candidate: Option<&Value>, test: impl Fn(&Value) -> bool) -> bool {
    match candidate {
        None => false,
        Some(Value::Array(items)) => items.iter().any(&test),
        Some(value) => test(value),
    }
}

fn coerce_to_string(value: &Value) -> Option<Cow<'_, str>> {
    match value {
        Value::String(s) => Some(Cow::Borrowed(s.as_str())),
        Value::Number(n) => Some(Cow::Owned(n.to_string())),
        Value::Bool(b) => Some(Cow::Owned(b.to_string())),
        Value::Null => Some(Cow::Borrowed("null")),
        Value::Array(_) | Value::Object(_) => None,
    }
}
