//! Rule store and matching engine
//!
//! Resolves an ordered, possibly contradictory rule list into one decision.
//!
//! # Precedence
//!
//! ```text
//! request(action, subject, field?)
//!     │
//!     ├─ aliases_of(action) ── resolved once per query
//!     │
//!     ├─ pass 1: rules naming the subject, newest first
//!     ├─ pass 2: rules on "all", newest first
//!     │
//!     └─ first rule whose field scope and conditions match decides:
//!        grant → allowed, inverted → denied, none → denied
//! ```
//!
//! Later rules override earlier ones, and subject-specific rules override
//! "all" rules regardless of declaration order.

pub mod cache;

pub use cache::{CacheStats, LookupCache, RuleList};

use crate::alias::AliasRegistry;
use crate::config::AbilityConfig;
use crate::error::Result;
use crate::rule::{RawRule, Rule};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Ordered, immutable rule set of one ability
pub struct RuleStore {
    /// Compiled rules in declaration order
    rules: Vec<Arc<Rule>>,

    /// Alias graph used to resolve requested actions
    registry: Arc<AliasRegistry>,

    /// Candidate list memoization
    cache: Option<LookupCache>,
}

impl RuleStore {
    /// Compile `raw_rules` into a store
    ///
    /// # Errors
    ///
    /// The first rule that fails to compile aborts the whole set.
    pub fn new(
        raw_rules: Vec<RawRule>,
        registry: Arc<AliasRegistry>,
        config: &AbilityConfig,
    ) -> Result<Self> {
        let rules = raw_rules
            .into_iter()
            .enumerate()
            .map(|(index, raw)| Rule::compile(raw, index).map(Arc::new))
            .collect::<Result<Vec<_>>>()
            .map_err(|e| {
                warn!("Rejected rule set: {}", e);
                e
            })?;

        let cache = config
            .enable_cache
            .then(|| LookupCache::new(config.cache_capacity));

        Ok(Self {
            rules,
            registry,
            cache,
        })
    }

    /// Rules in declaration order
    pub fn rules(&self) -> &[Arc<Rule>] {
        &self.rules
    }

    /// Descriptors in declaration order
    pub fn raw_rules(&self) -> Vec<RawRule> {
        self.rules.iter().map(|rule| rule.to_raw().clone()).collect()
    }

    /// Number of rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the store holds no rules
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Alias registry the store resolves actions against
    pub fn registry(&self) -> &Arc<AliasRegistry> {
        &self.registry
    }

    /// Lookup cache statistics, if caching is enabled
    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(LookupCache::stats)
    }

    /// Rules matching subject and action, most relevant first
    ///
    /// Subject-specific rules come first (newest to oldest), then rules on
    /// "all" (newest to oldest). Fields and conditions are not checked.
    pub fn possible_rules_for(&self, action: &str, subject_name: &str) -> RuleList {
        if action.is_empty() || subject_name.is_empty() {
            return Vec::new().into();
        }

        let generation = self.registry.generation();
        if let Some(cache) = &self.cache {
            if let Some(rules) = cache.get(subject_name, action, generation) {
                return rules;
            }
        }

        let covering = self.registry.aliases_of(action);
        let specific = self.rules.iter().rev().filter(|rule| !rule.applies_to_all());
        let general = self.rules.iter().rev().filter(|rule| rule.applies_to_all());

        let rules: RuleList = specific
            .chain(general)
            .filter(|rule| rule.matches_subject(subject_name) && rule.matches_any_action(&covering))
            .cloned()
            .collect();

        if let Some(cache) = &self.cache {
            cache.put(subject_name, action, generation, Arc::clone(&rules));
        }

        rules
    }

    /// Candidate rules further filtered by field relevance
    ///
    /// With no field, inverted rules limited to specific fields are left
    /// out: they restrict those fields, not the subject as a whole.
    pub fn rules_for(&self, action: &str, subject_name: &str, field: Option<&str>) -> Vec<Arc<Rule>> {
        self.possible_rules_for(action, subject_name)
            .iter()
            .filter(|rule| rule.is_relevant_for_field(field))
            .cloned()
            .collect()
    }

    /// The rule that decides the request, if any
    ///
    /// `data` is the instance view, `None` for a type-level check.
    pub fn relevant_rule_for(
        &self,
        action: &str,
        subject_name: &str,
        data: Option<&Value>,
        field: Option<&str>,
    ) -> Option<Arc<Rule>> {
        self.possible_rules_for(action, subject_name)
            .iter()
            .filter(|rule| rule.is_relevant_for_field(field))
            .find(|rule| rule.matches_conditions(data))
            .cloned()
    }

    /// Whether the request is allowed (default deny)
    pub fn can(
        &self,
        action: &str,
        subject_name: &str,
        data: Option<&Value>,
        field: Option<&str>,
    ) -> bool {
        let rule = self.relevant_rule_for(action, subject_name, data, field);
        let allowed = rule.as_ref().is_some_and(|rule| !rule.inverted());

        debug!(
            action,
            subject = subject_name,
            field = ?field,
            rule = ?rule.as_ref().map(|rule| rule.priority()),
            allowed,
            "Ability check"
        );

        allowed
    }

    /// Fields of `subject_name` the request may touch
    ///
    /// Walks the matching rules from least to most relevant: grants add
    /// their fields, denials remove them. Rules without a field list
    /// contribute `fields_from(rule)`.
    pub fn permitted_fields_of(
        &self,
        action: &str,
        subject_name: &str,
        data: Option<&Value>,
        fields_from: impl Fn(&Rule) -> Vec<String>,
    ) -> Vec<String> {
        let mut permitted: Vec<String> = Vec::new();

        for rule in self
            .possible_rules_for(action, subject_name)
            .iter()
            .rev()
            .filter(|rule| rule.matches_conditions(data))
        {
            let names = match rule.fields() {
                Some(fields) => fields.to_vec(),
                None => fields_from(rule),
            };

            for name in names {
                if rule.inverted() {
                    permitted.retain(|field| field != &name);
                } else if !permitted.contains(&name) {
                    permitted.push(name);
                }
            }
        }

        permitted
    }
}

impl std::fmt::Debug for RuleStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleStore")
            .field("rules", &self.rules.len())
            .field("cache", &self.cache.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store(rules: Vec<RawRule>) -> RuleStore {
        RuleStore::new(rules, Arc::new(AliasRegistry::new()), &AbilityConfig::default()).unwrap()
    }

    #[test]
    fn test_empty_store_denies() {
        let store = store(vec![]);
        assert!(store.is_empty());
        assert!(!store.can("read", "Post", None, None));
    }

    #[test]
    fn test_possible_rules_order() {
        let store = store(vec![
            RawRule::can("read", "all"),
            RawRule::can("read", "Post"),
            RawRule::cannot("read", "all"),
            RawRule::cannot("read", "Post"),
        ]);

        let order: Vec<usize> = store
            .possible_rules_for("read", "Post")
            .iter()
            .map(|rule| rule.priority())
            .collect();
        assert_eq!(order, vec![3, 1, 2, 0]);
    }

    #[test]
    fn test_empty_action_or_subject_denies() {
        let store = store(vec![RawRule::can("manage", "all")]);
        assert!(!store.can("", "Post", None, None));
        assert!(!store.can("read", "", None, None));
        assert!(store.can("read", "Post", None, None));
    }

    #[test]
    fn test_cache_is_used() {
        let store = store(vec![RawRule::can("read", "Post")]);
        store.can("read", "Post", None, None);
        store.can("read", "Post", None, None);

        let stats = store.cache_stats().unwrap();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
    }

    #[test]
    fn test_cache_disabled() {
        let config = AbilityConfig {
            enable_cache: false,
            ..Default::default()
        };
        let store = RuleStore::new(
            vec![RawRule::can("read", "Post")],
            Arc::new(AliasRegistry::new()),
            &config,
        )
        .unwrap();

        assert!(store.can("read", "Post", None, None));
        assert!(store.cache_stats().is_none());
    }

    #[test]
    fn test_alias_registered_after_build() {
        let registry = Arc::new(AliasRegistry::new());
        let store = RuleStore::new(
            vec![RawRule::can("modify", "Post")],
            Arc::clone(&registry),
            &AbilityConfig::default(),
        )
        .unwrap();

        assert!(!store.can("update", "Post", None, None));
        registry.register("modify", "update").unwrap();
        assert!(store.can("update", "Post", None, None));
    }

    #[test]
    fn test_permitted_fields() {
        let store = store(vec![
            RawRule::can("read", "Post").with_fields(["title", "body", "secret"]),
            RawRule::cannot("read", "Post").with_fields("secret"),
            RawRule::can("read", "Post")
                .with_fields("draftNotes")
                .with_conditions(json!({ "author": "me" })),
        ]);

        let none = |_: &Rule| Vec::new();
        assert_eq!(
            store.permitted_fields_of("read", "Post", Some(&json!({ "author": "you" })), none),
            vec!["title", "body"]
        );
        assert_eq!(
            store.permitted_fields_of("read", "Post", Some(&json!({ "author": "me" })), none),
            vec!["title", "body", "draftNotes"]
        );
    }

    #[test]
    fn test_permitted_fields_from_whole_subject_rule() {
        let store = store(vec![
            RawRule::can("read", "Post"),
            RawRule::cannot("read", "Post").with_fields("secret"),
        ]);

        let fields = store.permitted_fields_of("read", "Post", None, |_| {
            vec!["title".to_string(), "secret".to_string()]
        });
        assert_eq!(fields, vec!["title"]);
    }
}
