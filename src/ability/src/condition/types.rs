//! Typed condition tree parsed from the declarative JSON form

use crate::error::{AbilityError, Result};
use regex::{Regex, RegexBuilder};
use serde_json::{Map, Value};

/// One comparison applied to the value found at a field path
#[derive(Debug, Clone)]
pub enum Operator {
    /// Loosely equal to the operand (plain `key: value` or `$eq`)
    Eq(Value),
    /// Not loosely equal (`$ne`)
    Ne(Value),
    /// Equal to one of the listed values (`$in`)
    In(Vec<Value>),
    /// Equal to none of the listed values (`$nin`)
    Nin(Vec<Value>),
    /// Candidate sequence contains every listed value (`$all`)
    All(Vec<Value>),
    /// Greater than (`$gt`)
    Gt(Value),
    /// Greater than or equal (`$gte`)
    Gte(Value),
    /// Less than (`$lt`)
    Lt(Value),
    /// Less than or equal (`$lte`)
    Lte(Value),
    /// Path resolves (true) or does not resolve (false) (`$exists`)
    Exists(bool),
    /// Candidate, as a string, matches the pattern (`$regex`, `$options`)
    Regex(Regex),
}

/// All operators applying to one dotted path
#[derive(Debug, Clone)]
pub struct FieldCondition {
    /// Key as written in the rule, e.g. "comments.author"
    pub key: String,

    /// Key split on '.'
    pub path: Vec<String>,

    /// Operators, all of which must hold
    pub operators: Vec<Operator>,
}

/// Parsed conditions of one rule (implicit AND over fields)
#[derive(Debug, Clone)]
pub struct Condition {
    /// Declarative source, kept for rule views
    source: Map<String, Value>,

    /// Parsed field predicates
    fields: Vec<FieldCondition>,
}

impl Condition {
    /// Parse a condition mapping
    ///
    /// # Errors
    ///
    /// - [`AbilityError::UnsupportedOperator`] for an unknown `$` key, or a
    ///   `$` key used as a field path (`$or`, `$and`, `meta.$size`)
    /// - [`AbilityError::InvalidCondition`] for malformed operands, empty
    ///   paths, invalid regular expressions, or objects mixing operator and
    ///   plain keys
    pub fn parse(source: &Map<String, Value>) -> Result<Self> {
        let mut fields = Vec::with_capacity(source.len());

        for (key, value) in source {
            // Operators only appear inside a field's operator object
            if key.split('.').any(|segment| segment.starts_with('$')) {
                return Err(AbilityError::UnsupportedOperator(key.clone()));
            }

            if key.is_empty() || key.split('.').any(str::is_empty) {
                return Err(AbilityError::InvalidCondition(format!(
                    "Invalid field path '{}'",
                    key
                )));
            }

            fields.push(FieldCondition {
                key: key.clone(),
                path: key.split('.').map(str::to_string).collect(),
                operators: Self::parse_operators(key, value)?,
            });
        }

        Ok(Self {
            source: source.clone(),
            fields,
        })
    }

    /// Declarative form the condition was parsed from
    pub fn source(&self) -> &Map<String, Value> {
        &self.source
    }

    /// Parsed field predicates
    pub fn fields(&self) -> &[FieldCondition] {
        &self.fields
    }

    fn parse_operators(key: &str, value: &Value) -> Result<Vec<Operator>> {
        let object = match value {
            Value::Object(object) if object.keys().any(|k| k.starts_with('$')) => object,
            literal => return Ok(vec![Operator::Eq(literal.clone())]),
        };

        if let Some(plain) = object.keys().find(|k| !k.starts_with('$')) {
            return Err(AbilityError::InvalidCondition(format!(
                "Field '{}' mixes operators with plain key '{}'",
                key, plain
            )));
        }

        let mut operators = Vec::with_capacity(object.len());
        for (name, operand) in object {
            let operator = match name.as_str() {
                "$eq" => Operator::Eq(operand.clone()),
                "$ne" => Operator::Ne(operand.clone()),
                "$in" => Operator::In(Self::list_operand(key, name, operand)?),
                "$nin" => Operator::Nin(Self::list_operand(key, name, operand)?),
                "$all" => Operator::All(Self::list_operand(key, name, operand)?),
                "$gt" => Operator::Gt(Self::orderable_operand(key, name, operand)?),
                "$gte" => Operator::Gte(Self::orderable_operand(key, name, operand)?),
                "$lt" => Operator::Lt(Self::orderable_operand(key, name, operand)?),
                "$lte" => Operator::Lte(Self::orderable_operand(key, name, operand)?),
                "$exists" => match operand {
                    Value::Bool(expected) => Operator::Exists(*expected),
                    _ => {
                        return Err(AbilityError::InvalidCondition(format!(
                            "'$exists' on '{}' expects a boolean",
                            key
                        )))
                    }
                },
                "$regex" => Operator::Regex(Self::regex_operand(key, operand, object.get("$options"))?),
                "$options" => {
                    if !object.contains_key("$regex") {
                        return Err(AbilityError::InvalidCondition(format!(
                            "'$options' on '{}' requires '$regex'",
                            key
                        )));
                    }
                    continue;
                }
                unknown => return Err(AbilityError::UnsupportedOperator(unknown.to_string())),
            };
            operators.push(operator);
        }

        Ok(operators)
    }

    fn list_operand(key: &str, name: &str, operand: &Value) -> Result<Vec<Value>> {
        match operand {
            Value::Array(items) => Ok(items.clone()),
            _ => Err(AbilityError::InvalidCondition(format!(
                "'{}' on '{}' expects a list",
                name, key
            ))),
        }
    }

    fn orderable_operand(key: &str, name: &str, operand: &Value) -> Result<Value> {
        match operand {
            Value::Number(_) | Value::String(_) => Ok(operand.clone()),
            _ => Err(AbilityError::InvalidCondition(format!(
                "'{}' on '{}' expects a number or a string",
                name, key
            ))),
        }
    }

    fn regex_operand(key: &str, operand: &Value, options: Option<&Value>) -> Result<Regex> {
        let pattern = operand.as_str().ok_or_else(|| {
            AbilityError::InvalidCondition(format!("'$regex' on '{}' expects a string", key))
        })?;

        let mut builder = RegexBuilder::new(pattern);
        match options {
            None => {}
            Some(Value::String(flags)) => {
                for flag in flags.chars() {
                    match flag {
                        'i' => builder.case_insensitive(true),
                        'm' => builder.multi_line(true),
                        's' => builder.dot_matches_new_line(true),
                        'x' => builder.ignore_whitespace(true),
                        other => {
                            return Err(AbilityError::InvalidCondition(format!(
                                "Unknown regex option '{}' on '{}'",
                                other, key
                            )))
                        }
                    };
                }
            }
            Some(_) => {
                return Err(AbilityError::InvalidCondition(format!(
                    "'$options' on '{}' expects a string",
                    key
                )))
            }
        }

        builder.build().map_err(|e| {
            AbilityError::InvalidCondition(format!("Invalid regex on '{}': {}", key, e))
        })
    }
}
