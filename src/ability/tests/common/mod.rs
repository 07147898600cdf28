//! Shared helpers for the integration suites

#![allow(dead_code)]

use cretoai_ability::{Ability, AbilityConfig, AliasRegistry, Instance, RawRule};
use serde_json::Value;
use std::sync::{Arc, Once};

static TRACING: Once = Once::new();

/// Install a fmt subscriber honouring `RUST_LOG`, once per test binary
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Ability over an isolated alias registry
pub fn ability(rules: Vec<RawRule>) -> Ability {
    init_tracing();
    Ability::with_registry(rules, AbilityConfig::default(), Arc::new(AliasRegistry::new()))
        .expect("valid rules")
}

/// Ability sharing the given registry
pub fn ability_with(rules: Vec<RawRule>, registry: &Arc<AliasRegistry>) -> Ability {
    init_tracing();
    Ability::with_registry(rules, AbilityConfig::default(), Arc::clone(registry))
        .expect("valid rules")
}

/// A `Post` instance
pub fn post(data: Value) -> Instance {
    Instance::new("Post", data)
}
