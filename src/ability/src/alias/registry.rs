//! Alias registry with cycle rejection and transitive expansion
//!
//! The registry is a directed graph `alias -> targets`. Registrations that
//! would let an alias reach itself are rejected before anything is written,
//! so the stored graph is always acyclic and every traversal terminates.

use crate::error::{AbilityError, Result};
use crate::types::{Names, CRUD_ACTIONS, MANAGE};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

static GLOBAL_REGISTRY: Lazy<Arc<AliasRegistry>> = Lazy::new(|| Arc::new(AliasRegistry::new()));

/// Process-wide or injected table of action aliases
///
/// Writers are serialized through the lock; readers (expansion) run
/// concurrently. Every successful write bumps [`AliasRegistry::generation`]
/// so that memoized lookups built from an older graph can be discarded.
///
/// # Example
///
/// ```rust
/// use cretoai_ability::AliasRegistry;
///
/// let registry = AliasRegistry::new();
/// registry.register("sort", "increment").unwrap();
/// registry.register("modify", ["sort"]).unwrap();
///
/// let expanded = registry.expand("modify");
/// assert!(expanded.contains("increment"));
/// assert!(registry.register("increment", "modify").is_err());
/// ```
#[derive(Debug)]
pub struct AliasRegistry {
    /// alias -> directly aliased actions
    aliases: RwLock<HashMap<String, BTreeSet<String>>>,

    /// Bumped on every successful mutation
    generation: AtomicU64,
}

impl AliasRegistry {
    /// Create a registry holding only the `manage` baseline
    pub fn new() -> Self {
        Self {
            aliases: RwLock::new(Self::baseline()),
            generation: AtomicU64::new(0),
        }
    }

    /// The shared process-lifetime registry
    ///
    /// Abilities built without an explicit registry use this instance.
    /// Tests that register aliases here should call [`AliasRegistry::reset`]
    /// afterwards, or use an isolated registry instead.
    pub fn global() -> Arc<AliasRegistry> {
        Arc::clone(&GLOBAL_REGISTRY)
    }

    fn baseline() -> HashMap<String, BTreeSet<String>> {
        let mut aliases = HashMap::new();
        aliases.insert(
            MANAGE.to_string(),
            CRUD_ACTIONS.iter().map(|a| a.to_string()).collect(),
        );
        aliases
    }

    /// Add or extend the mapping `alias -> targets`
    ///
    /// # Errors
    ///
    /// Returns [`AbilityError::InvalidAlias`] if the alias or a target is
    /// empty, if no targets are given, or if the alias is reachable from any
    /// target (directly or transitively). The registry is left untouched.
    pub fn register(&self, alias: &str, targets: impl Into<Names>) -> Result<()> {
        let targets = targets.into();

        if alias.is_empty() {
            return Err(AbilityError::InvalidAlias(
                "Alias name cannot be empty".to_string(),
            ));
        }
        if targets.is_empty() {
            return Err(AbilityError::InvalidAlias(format!(
                "Alias '{}' must have at least one target",
                alias
            )));
        }
        if targets.iter().any(String::is_empty) {
            return Err(AbilityError::InvalidAlias(format!(
                "Alias '{}' has an empty target",
                alias
            )));
        }

        let mut aliases = self.aliases.write();

        for target in targets.iter() {
            if target == alias {
                warn!("Rejected alias '{}': aliases itself", alias);
                return Err(AbilityError::InvalidAlias(format!(
                    "Attempt to alias action to itself: {} -> {}",
                    alias, target
                )));
            }

            if let Some(path) = Self::find_path(&aliases, target, alias) {
                let cycle: Vec<&str> = std::iter::once(alias)
                    .chain(path.iter().map(String::as_str))
                    .collect();
                warn!("Rejected alias '{}': cycle {}", alias, cycle.join(" -> "));
                return Err(AbilityError::InvalidAlias(format!(
                    "Circular alias detected: {}",
                    cycle.join(" -> ")
                )));
            }
        }

        let entry = aliases.entry(alias.to_string()).or_default();
        entry.extend(targets.iter().cloned());
        self.generation.fetch_add(1, Ordering::Release);

        info!("Registered alias '{}' -> {:?}", alias, targets.as_slice());
        Ok(())
    }

    /// Transitive closure of `action`, including `action` itself
    pub fn expand(&self, action: &str) -> BTreeSet<String> {
        let aliases = self.aliases.read();
        let mut visited = BTreeSet::new();
        Self::expand_into(&aliases, action, &mut visited);
        visited
    }

    /// Expand several actions at once into one set
    pub fn expand_all<'a>(&self, actions: impl IntoIterator<Item = &'a str>) -> BTreeSet<String> {
        let aliases = self.aliases.read();
        let mut visited = BTreeSet::new();
        for action in actions {
            Self::expand_into(&aliases, action, &mut visited);
        }
        visited
    }

    /// Reverse closure: `action` plus every alias that expands to it
    ///
    /// A rule listing any of these names covers `action`.
    pub fn aliases_of(&self, action: &str) -> HashSet<String> {
        let aliases = self.aliases.read();

        let mut reverse: HashMap<&str, Vec<&str>> = HashMap::new();
        for (alias, targets) in aliases.iter() {
            for target in targets {
                reverse.entry(target.as_str()).or_default().push(alias.as_str());
            }
        }

        let mut found = HashSet::new();
        let mut stack = vec![action];
        while let Some(current) = stack.pop() {
            if !found.insert(current.to_string()) {
                continue;
            }
            if let Some(parents) = reverse.get(current) {
                stack.extend(parents.iter().copied());
            }
        }

        debug!("Action '{}' is covered by {:?}", action, found);
        found
    }

    /// Directly aliased actions of `alias`, if registered
    pub fn targets_of(&self, alias: &str) -> Option<Vec<String>> {
        self.aliases
            .read()
            .get(alias)
            .map(|targets| targets.iter().cloned().collect())
    }

    /// Counter bumped by every successful registration or reset
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Drop every registration except the `manage` baseline
    pub fn reset(&self) {
        *self.aliases.write() = Self::baseline();
        self.generation.fetch_add(1, Ordering::Release);
        info!("Alias registry reset to baseline");
    }

    /// Depth-first expansion guarded by the visited set
    ///
    /// Uses an explicit stack so chain length is bounded by memory, not by
    /// the thread's stack.
    fn expand_into(
        aliases: &HashMap<String, BTreeSet<String>>,
        action: &str,
        visited: &mut BTreeSet<String>,
    ) {
        let mut stack = vec![action];
        while let Some(current) = stack.pop() {
            if !visited.insert(current.to_string()) {
                continue;
            }
            if let Some(targets) = aliases.get(current) {
                stack.extend(targets.iter().map(String::as_str));
            }
        }
    }

    /// Path of alias edges from `from` to `to`, both ends included
    fn find_path(
        aliases: &HashMap<String, BTreeSet<String>>,
        from: &str,
        to: &str,
    ) -> Option<Vec<String>> {
        // node -> node it was first reached from
        let mut parents: HashMap<&str, Option<&str>> = HashMap::new();
        parents.insert(from, None);
        let mut stack = vec![from];

        while let Some(node) = stack.pop() {
            if node == to {
                let mut path = vec![node.to_string()];
                let mut current = node;
                while let Some(&Some(parent)) = parents.get(current) {
                    path.push(parent.to_string());
                    current = parent;
                }
                path.reverse();
                return Some(path);
            }

            if let Some(targets) = aliases.get(node) {
                for target in targets {
                    if !parents.contains_key(target.as_str()) {
                        parents.insert(target.as_str(), Some(node));
                        stack.push(target.as_str());
                    }
                }
            }
        }

        None
    }
}

impl Default for AliasRegistry {
    fn default() -> Self {
        Self::new()
    }
}
