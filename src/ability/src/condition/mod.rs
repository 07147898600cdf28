//! Condition matcher
//!
//! A condition maps dotted field paths to a literal or to an operator
//! object. All fields must hold (implicit AND); alternatives are expressed as
//! separate rules.
//!
//! Supported operators: `$eq`, `$ne`, `$in`, `$nin`, `$all`, `$gt`, `$gte`,
//! `$lt`, `$lte`, `$exists`, `$regex` (with optional `$options`).
//!
//! # Example
//!
//! ```rust
//! use cretoai_ability::condition::Condition;
//! use serde_json::json;
//!
//! let source = json!({ "views": { "$gt": 10 }, "author.name": "alice" });
//! let condition = Condition::parse(source.as_object().unwrap()).unwrap();
//!
//! assert!(condition.matches(&json!({ "views": 11, "author": { "name": "alice" } })));
//! assert!(!condition.matches(&json!({ "views": 9, "author": { "name": "alice" } })));
//! ```

pub mod matcher;
pub mod types;


pub use matcher::{loose_eq, resolve_path};
pub use types::{Condition, FieldCondition, Operator};

use crate::error::Result;
use serde_json::{Map, Value};

/// Parse `conditions` and evaluate them against `data` in one call
///
/// Rules parse their conditions once at construction; this is for one-off
/// checks.
pub fn matches(conditions: &Map<String, Value>, data: &Value) -> Result<bool> {
    Ok(Condition::parse(conditions)?.matches(data))
}
