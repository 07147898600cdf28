//! Concurrent queries against an ability whose rules are being replaced

mod common;

use common::{ability, post};
use cretoai_ability::{AbilityConfig, AliasRegistry, RawRule};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

#[test]
fn test_queries_see_whole_rule_sets_during_updates() {
    let grant_all = vec![RawRule::can("read", "Post"), RawRule::can("update", "Post")];
    let deny_all = vec![RawRule::cannot("read", "Post"), RawRule::cannot("update", "Post")];

    let ability = Arc::new(ability(grant_all.clone()));
    let done = Arc::new(AtomicBool::new(false));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let ability = Arc::clone(&ability);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut checks = 0usize;
                while !done.load(Ordering::Acquire) {
                    // Both answers come from one snapshot, so they always agree
                    let store = ability.store();
                    let read = store.can("read", "Post", None, None);
                    let update = store.can("update", "Post", None, None);
                    assert_eq!(read, update);
                    checks += 1;
                }
                checks
            })
        })
        .collect();

    for round in 0..200 {
        let rules = if round % 2 == 0 { deny_all.clone() } else { grant_all.clone() };
        ability.update(rules).unwrap();
    }
    done.store(true, Ordering::Release);

    for reader in readers {
        reader.join().unwrap();
    }
    assert!(ability.can("read", "Post"));
}

#[test]
fn test_parallel_checks_share_cache() {
    let ability = Arc::new(ability(vec![
        RawRule::can("read", "Post"),
        RawRule::cannot("read", "Post").with_conditions(json!({ "private": true })),
    ]));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let ability = Arc::clone(&ability);
            thread::spawn(move || {
                for _ in 0..100 {
                    let private = i % 2 == 0;
                    let instance = post(json!({ "private": private }));
                    assert_eq!(ability.can("read", &instance), !private);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let stats = ability.cache_stats().unwrap();
    assert_eq!(stats.size, 1);
    assert!(stats.hits > 0);
}

#[test]
fn test_alias_registration_while_querying() {
    let registry = Arc::new(AliasRegistry::new());
    let ability = Arc::new(
        cretoai_ability::Ability::with_registry(
            vec![RawRule::can("modify", "Post")],
            AbilityConfig::default(),
            Arc::clone(&registry),
        )
        .unwrap(),
    );

    let reader = {
        let ability = Arc::clone(&ability);
        thread::spawn(move || {
            // Once granted, the grant never disappears
            let mut granted = false;
            for _ in 0..1_000 {
                let now = ability.can("update", "Post");
                assert!(now || !granted);
                granted = now;
            }
        })
    };

    registry.register("modify", "update").unwrap();
    reader.join().unwrap();
    assert!(ability.can("update", "Post"));
}

#[test]
fn test_ability_is_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<cretoai_ability::Ability>();
    assert_send_sync::<cretoai_ability::RuleStore>();
    assert_send_sync::<AliasRegistry>();
}
