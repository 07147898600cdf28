//! Rule descriptors and compiled rules

use crate::alias::AliasRegistry;
use crate::condition::Condition;
use crate::error::{AbilityError, Result};
use crate::types::{Names, ALL_SUBJECTS, MANAGE};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::HashSet;

/// Declarative rule, as produced by a rule builder or read from JSON
///
/// Serializes with only the keys that are set, so a rule view never carries
/// `"conditions": null` or `"inverted": false`.
///
/// ```rust
/// use cretoai_ability::RawRule;
/// use serde_json::json;
///
/// let rule = RawRule::cannot("read", "Post")
///     .with_conditions(json!({ "private": true }))
///     .because("Private posts are hidden");
///
/// assert_eq!(
///     serde_json::to_value(&rule).unwrap(),
///     json!({
///         "actions": ["read"],
///         "subject": ["Post"],
///         "conditions": { "private": true },
///         "inverted": true,
///         "reason": "Private posts are hidden"
///     })
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRule {
    /// Actions granted or denied
    #[serde(alias = "action", deserialize_with = "one_or_many")]
    pub actions: Vec<String>,

    /// Subject type names, or "all"
    #[serde(deserialize_with = "one_or_many")]
    pub subject: Vec<String>,

    /// Fields the rule is limited to; `None` covers every field
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "option_one_or_many"
    )]
    pub fields: Option<Vec<String>>,

    /// Data conditions (a JSON object); `None` matches unconditionally
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Value>,

    /// Whether the rule forbids instead of grants
    #[serde(default, skip_serializing_if = "is_false")]
    pub inverted: bool,

    /// Message surfaced when this rule blocks an enforced check
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl From<OneOrMany> for Vec<String> {
    fn from(value: OneOrMany) -> Self {
        match value {
            OneOrMany::One(name) => vec![name],
            OneOrMany::Many(names) => names,
        }
    }
}

fn one_or_many<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Vec<String>, D::Error> {
    Ok(OneOrMany::deserialize(deserializer)?.into())
}

fn option_one_or_many<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<Vec<String>>, D::Error> {
    Ok(Option::<OneOrMany>::deserialize(deserializer)?.map(Into::into))
}

impl RawRule {
    /// Rule granting `actions` on `subject`
    pub fn can(actions: impl Into<Names>, subject: impl Into<Names>) -> Self {
        Self {
            actions: actions.into().into_vec(),
            subject: subject.into().into_vec(),
            fields: None,
            conditions: None,
            inverted: false,
            reason: None,
        }
    }

    /// Rule forbidding `actions` on `subject`
    pub fn cannot(actions: impl Into<Names>, subject: impl Into<Names>) -> Self {
        Self {
            inverted: true,
            ..Self::can(actions, subject)
        }
    }

    /// Restrict the rule to the given fields
    pub fn with_fields(mut self, fields: impl Into<Names>) -> Self {
        self.fields = Some(fields.into().into_vec());
        self
    }

    /// Restrict the rule to instances matching `conditions`
    ///
    /// `conditions` must be a JSON object; anything else is rejected when
    /// the rule is compiled.
    pub fn with_conditions(mut self, conditions: Value) -> Self {
        self.conditions = Some(conditions);
        self
    }

    /// Attach the message reported when this rule blocks an action
    pub fn because(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Compiled, immutable rule
///
/// Conditions are parsed once here; matching never re-reads the JSON form.
#[derive(Debug, Clone)]
pub struct Rule {
    raw: RawRule,
    condition: Option<Condition>,
    applies_to_all: bool,
    priority: usize,
}

impl Rule {
    /// Validate and compile a descriptor
    ///
    /// `priority` is the declaration index within its rule set.
    ///
    /// # Errors
    ///
    /// - [`AbilityError::InvalidRule`] for empty action, subject or field lists
    ///   or empty names
    /// - [`AbilityError::InvalidCondition`] when conditions are not an object
    /// - condition parse errors (see [`Condition::parse`])
    pub fn compile(raw: RawRule, priority: usize) -> Result<Self> {
        Self::validate_names("actions", &raw.actions, priority)?;
        Self::validate_names("subject", &raw.subject, priority)?;
        if let Some(fields) = &raw.fields {
            Self::validate_names("fields", fields, priority)?;
        }

        let condition = match &raw.conditions {
            None => None,
            Some(Value::Object(source)) => Some(Condition::parse(source)?),
            Some(_) => {
                return Err(AbilityError::InvalidCondition(format!(
                    "Rule #{} conditions must be an object",
                    priority
                )))
            }
        };
        let applies_to_all = raw.subject.iter().any(|s| s == ALL_SUBJECTS);

        Ok(Self {
            raw,
            condition,
            applies_to_all,
            priority,
        })
    }

    fn validate_names(kind: &str, names: &[String], priority: usize) -> Result<()> {
        if names.is_empty() {
            return Err(AbilityError::InvalidRule(format!(
                "Rule #{} has no {}",
                priority, kind
            )));
        }
        if names.iter().any(String::is_empty) {
            return Err(AbilityError::InvalidRule(format!(
                "Rule #{} has an empty name in {}",
                priority, kind
            )));
        }
        Ok(())
    }

    /// Declared actions (unexpanded)
    pub fn actions(&self) -> &[String] {
        &self.raw.actions
    }

    /// Declared subject names
    pub fn subjects(&self) -> &[String] {
        &self.raw.subject
    }

    /// Field restriction, if any
    pub fn fields(&self) -> Option<&[String]> {
        self.raw.fields.as_deref()
    }

    /// Parsed conditions, if any
    pub fn conditions(&self) -> Option<&Condition> {
        self.condition.as_ref()
    }

    /// Whether the rule forbids
    pub fn inverted(&self) -> bool {
        self.raw.inverted
    }

    /// Denial reason
    pub fn reason(&self) -> Option<&str> {
        self.raw.reason.as_deref()
    }

    /// Declaration index within the rule set
    pub fn priority(&self) -> usize {
        self.priority
    }

    /// Whether the subject list contains the "all" marker
    pub fn applies_to_all(&self) -> bool {
        self.applies_to_all
    }

    /// Descriptor this rule was compiled from
    pub fn to_raw(&self) -> &RawRule {
        &self.raw
    }

    /// Whether `action` is covered by this rule, resolving aliases
    pub fn matches_action(&self, action: &str, registry: &AliasRegistry) -> bool {
        self.matches_any_action(&registry.aliases_of(action))
    }

    /// Whether the rule lists `manage` or one of the covering names
    ///
    /// `covering` is the requested action plus every alias expanding to it,
    /// computed once per query.
    pub fn matches_any_action(&self, covering: &HashSet<String>) -> bool {
        self.raw
            .actions
            .iter()
            .any(|action| action == MANAGE || covering.contains(action))
    }

    /// Whether the rule applies to `subject_name`
    pub fn matches_subject(&self, subject_name: &str) -> bool {
        self.applies_to_all || self.raw.subject.iter().any(|s| s == subject_name)
    }

    /// Whether the rule covers `field` (`None` means the whole subject)
    pub fn matches_field(&self, field: Option<&str>) -> bool {
        match (field, &self.raw.fields) {
            (None, _) | (_, None) => true,
            (Some(field), Some(fields)) => fields.iter().any(|f| f == field),
        }
    }

    /// Field relevance used by lookups
    ///
    /// Like [`Rule::matches_field`], except that an inverted rule limited to
    /// some fields is not relevant to a whole-subject check: forbidding a
    /// few fields does not forbid the subject.
    pub fn is_relevant_for_field(&self, field: Option<&str>) -> bool {
        match (field, &self.raw.fields) {
            (_, None) => true,
            (None, Some(_)) => !self.raw.inverted,
            (Some(field), Some(fields)) => fields.iter().any(|f| f == field),
        }
    }

    /// Whether the conditions hold for `data`
    ///
    /// `None` data is a type-level check: a conditional grant still applies
    /// ("can read some posts"), a conditional denial does not ("cannot read
    /// some posts" is not "cannot read posts").
    pub fn matches_conditions(&self, data: Option<&Value>) -> bool {
        match (&self.condition, data) {
            (None, _) => true,
            (Some(_), None) => !self.raw.inverted,
            (Some(condition), Some(data)) => condition.matches(data),
        }
    }
}

impl Serialize for Rule {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.raw.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn compile(raw: RawRule) -> Rule {
        Rule::compile(raw, 0).unwrap()
    }

    #[test]
    fn test_rule_from_json() {
        let raw: RawRule = serde_json::from_value(json!({
            "action": "read",
            "subject": ["Post", "Comment"],
            "fields": "title",
            "conditions": { "published": true }
        }))
        .unwrap();

        assert_eq!(raw.actions, vec!["read"]);
        assert_eq!(raw.subject, vec!["Post", "Comment"]);
        assert_eq!(raw.fields, Some(vec!["title".to_string()]));
        assert!(!raw.inverted);
        assert!(raw.reason.is_none());
    }

    #[test]
    fn test_rule_serializes_defined_keys_only() {
        let raw = RawRule::can("read", "Post");
        assert_eq!(
            serde_json::to_value(compile(raw)).unwrap(),
            json!({ "actions": ["read"], "subject": ["Post"] })
        );
    }

    #[test]
    fn test_rule_validation() {
        assert!(matches!(
            Rule::compile(RawRule::can(Vec::<String>::new(), "Post"), 0),
            Err(AbilityError::InvalidRule(_))
        ));
        assert!(matches!(
            Rule::compile(RawRule::can("read", Vec::<String>::new()), 0),
            Err(AbilityError::InvalidRule(_))
        ));
        assert!(matches!(
            Rule::compile(RawRule::can("read", "Post").with_fields(Vec::<String>::new()), 0),
            Err(AbilityError::InvalidRule(_))
        ));
        assert!(matches!(
            Rule::compile(
                RawRule::can("read", "Post").with_conditions(json!({ "a": { "$near": 1 } })),
                0
            ),
            Err(AbilityError::UnsupportedOperator(_))
        ));
    }

    #[test]
    fn test_non_object_conditions_are_rejected() {
        let built = RawRule::can("read", "Post").with_conditions(json!(true));
        assert_eq!(built.conditions, Some(json!(true)));
        match Rule::compile(built, 3) {
            Err(AbilityError::InvalidCondition(msg)) => {
                assert_eq!(msg, "Rule #3 conditions must be an object")
            }
            other => panic!("expected InvalidCondition, got {:?}", other),
        }

        let parsed: RawRule = serde_json::from_value(json!({
            "action": "read",
            "subject": "Post",
            "conditions": ["creator", "me"]
        }))
        .unwrap();
        match Rule::compile(parsed, 0) {
            Err(AbilityError::InvalidCondition(msg)) => assert!(msg.ends_with("must be an object")),
            other => panic!("expected InvalidCondition, got {:?}", other),
        }
    }

    #[test]
    fn test_matches_subject() {
        let rule = compile(RawRule::can("read", ["Post", "Comment"]));
        assert!(rule.matches_subject("Post"));
        assert!(rule.matches_subject("Comment"));
        assert!(!rule.matches_subject("User"));

        let all = compile(RawRule::can("read", "all"));
        assert!(all.applies_to_all());
        assert!(all.matches_subject("User"));
    }

    #[test]
    fn test_matches_action_with_aliases() {
        let registry = AliasRegistry::new();
        registry.register("modify", "update").unwrap();

        let rule = compile(RawRule::can("modify", "Post"));
        assert!(rule.matches_action("update", &registry));
        assert!(rule.matches_action("modify", &registry));
        assert!(!rule.matches_action("delete", &registry));

        let manage = compile(RawRule::can("manage", "Post"));
        assert!(manage.matches_action("publish", &registry));
    }

    #[test]
    fn test_field_matching() {
        let rule = compile(RawRule::can("read", "Post").with_fields(["title", "id"]));
        assert!(rule.matches_field(None));
        assert!(rule.matches_field(Some("title")));
        assert!(!rule.matches_field(Some("description")));

        let denial = compile(RawRule::cannot("read", "Post").with_fields("secret"));
        assert!(denial.matches_field(None));
        assert!(!denial.is_relevant_for_field(None));
        assert!(denial.is_relevant_for_field(Some("secret")));
    }

    #[test]
    fn test_conditions_on_type_level_checks() {
        let grant = compile(RawRule::can("read", "Post").with_conditions(json!({ "published": true })));
        assert!(grant.matches_conditions(None));
        assert!(grant.matches_conditions(Some(&json!({ "published": true }))));
        assert!(!grant.matches_conditions(Some(&json!({ "published": false }))));

        let denial = compile(RawRule::cannot("read", "Post").with_conditions(json!({ "private": true })));
        assert!(!denial.matches_conditions(None));
        assert!(denial.matches_conditions(Some(&json!({ "private": true }))));

        let unconditional = compile(RawRule::cannot("read", "Post"));
        assert!(unconditional.matches_conditions(None));
    }
}
