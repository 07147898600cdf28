//! Alias registry tests, including property checks on random alias graphs

mod common;

use common::ability_with;
use cretoai_ability::{Ability, AbilityError, AliasRegistry, RawRule};
use proptest::prelude::*;
use std::sync::Arc;

// ============================================================================
// REGISTRATION
// ============================================================================

#[test]
fn test_self_alias_rejected_and_registry_unchanged() {
    let registry = AliasRegistry::new();
    registry.register("modify", "update").unwrap();
    let generation = registry.generation();

    assert!(registry.register("modify", "modify").is_err());
    let err = registry.register("modify", ["patch", "modify"]).unwrap_err();
    assert!(matches!(err, AbilityError::InvalidAlias(_)));
    assert_eq!(err.to_string(), "Invalid alias: Attempt to alias action to itself: modify -> modify");

    assert_eq!(registry.targets_of("modify"), Some(vec!["update".to_string()]));
    assert_eq!(registry.generation(), generation);
}

// ============================================================================
// ALIASES AND STORES
// ============================================================================

#[test]
fn test_alias_registered_after_ability_is_visible() {
    let registry = Arc::new(AliasRegistry::new());
    let ability = ability_with(vec![RawRule::can("modify", "Post")], &registry);

    // Prime the lookup cache before the alias exists
    assert!(!ability.can("update", "Post"));

    registry.register("modify", "update").unwrap();
    assert!(ability.can("update", "Post"));
}

#[test]
fn test_registries_are_isolated() {
    let first = Arc::new(AliasRegistry::new());
    let second = Arc::new(AliasRegistry::new());
    first.register("modify", "update").unwrap();

    let a = ability_with(vec![RawRule::can("modify", "Post")], &first);
    let b = ability_with(vec![RawRule::can("modify", "Post")], &second);

    assert!(a.can("update", "Post"));
    assert!(!b.can("update", "Post"));
}

#[test]
fn test_default_abilities_share_global_registry() {
    let posts = Ability::new(vec![RawRule::can("curate", "Post")]).unwrap();
    AliasRegistry::global().register("curate", "feature").unwrap();
    let comments = Ability::new(vec![RawRule::can("curate", "Comment")]).unwrap();

    assert!(Arc::ptr_eq(posts.registry(), &AliasRegistry::global()));
    assert!(posts.can("feature", "Post"));
    assert!(comments.can("feature", "Comment"));

    AliasRegistry::global().reset();
    assert!(!posts.can("feature", "Post"));
}

// ============================================================================
// PROPERTY TESTS
// ============================================================================

fn action_name() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["a", "b", "c", "d", "e", "f", "g", "h"]).prop_map(str::to_string)
}

proptest! {
    #[test]
    fn test_random_registrations_never_form_cycles(
        registrations in prop::collection::vec(
            (action_name(), prop::collection::vec(action_name(), 1..4)),
            0..40,
        )
    ) {
        let registry = AliasRegistry::new();

        for (alias, targets) in registrations {
            let before = registry.targets_of(&alias);
            let generation = registry.generation();

            if registry.register(&alias, targets).is_err() {
                prop_assert_eq!(registry.targets_of(&alias), before);
                prop_assert_eq!(registry.generation(), generation);
            }
        }

        // No action reaches itself through its own targets
        for action in ["a", "b", "c", "d", "e", "f", "g", "h"] {
            if let Some(targets) = registry.targets_of(action) {
                let reachable = registry.expand_all(targets.iter().map(String::as_str));
                prop_assert!(!reachable.contains(action));
            }
        }
    }

    #[test]
    fn test_expand_contains_direct_targets(
        alias in action_name(),
        targets in prop::collection::vec(action_name(), 1..4),
    ) {
        let registry = AliasRegistry::new();
        if registry.register(&alias, targets.clone()).is_ok() {
            let expanded = registry.expand(&alias);
            prop_assert!(expanded.contains(&alias));
            for target in &targets {
                prop_assert!(expanded.contains(target));
                prop_assert!(registry.aliases_of(target).contains(&alias));
            }
        }
    }
}
