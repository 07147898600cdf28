//! Ability: the public facade over one principal's rule set
//!
//! Owns exactly one [`RuleStore`] at a time. Queries run against a snapshot
//! of the current store; [`Ability::update`] compiles a fresh store and swaps
//! it in, firing `Update` before and `Updated` after the swap.

pub mod events;

pub use events::{AbilityEvent, Handler, Subscription, UpdateEvent};

use crate::alias::AliasRegistry;
use crate::config::AbilityConfig;
use crate::engine::{CacheStats, RuleStore};
use crate::error::{ForbiddenError, Result};
use crate::rule::{RawRule, Rule};
use crate::types::{default_subject_name, Names, SubjectNameResolver, SubjectRef};
use events::EventEmitter;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Authorization facade for one principal
///
/// # Example
///
/// ```rust
/// use cretoai_ability::{Ability, Instance, RawRule};
/// use serde_json::json;
///
/// let ability = Ability::new(vec![
///     RawRule::can("read", "Post"),
///     RawRule::cannot("read", "Post").with_conditions(json!({ "private": true })),
/// ])
/// .unwrap();
///
/// let public = Instance::new("Post", json!({ "private": false }));
/// let private = Instance::new("Post", json!({ "private": true }));
///
/// assert!(ability.can("read", "Post"));
/// assert!(ability.can("read", &public));
/// assert!(ability.cannot("read", &private));
/// ```
pub struct Ability {
    /// Current rule store; replaced wholesale on update
    store: RwLock<Arc<RuleStore>>,

    /// Alias graph shared with every store this ability builds
    registry: Arc<AliasRegistry>,

    /// Store construction settings
    config: AbilityConfig,

    /// Subject argument -> subject type name
    subject_name: SubjectNameResolver,

    /// update / updated observers
    events: EventEmitter,
}

impl Ability {
    /// Create an ability with the default configuration and the global
    /// alias registry
    ///
    /// # Errors
    ///
    /// Fails if any rule is malformed (see [`Rule::compile`]).
    pub fn new(rules: Vec<RawRule>) -> Result<Self> {
        Self::with_config(rules, AbilityConfig::default())
    }

    /// Create an ability with a custom configuration
    pub fn with_config(rules: Vec<RawRule>, config: AbilityConfig) -> Result<Self> {
        Self::with_registry(rules, config, AliasRegistry::global())
    }

    /// Create an ability bound to an explicit alias registry
    pub fn with_registry(
        rules: Vec<RawRule>,
        config: AbilityConfig,
        registry: Arc<AliasRegistry>,
    ) -> Result<Self> {
        let store = RuleStore::new(rules, Arc::clone(&registry), &config)?;
        info!("Ability created with {} rules", store.len());

        Ok(Self {
            store: RwLock::new(Arc::new(store)),
            registry,
            config,
            subject_name: Arc::new(default_subject_name),
            events: EventEmitter::default(),
        })
    }

    /// Replace the subject name resolver
    pub fn with_subject_name(
        mut self,
        resolver: impl Fn(&SubjectRef<'_>) -> String + Send + Sync + 'static,
    ) -> Self {
        self.subject_name = Arc::new(resolver);
        self
    }

    /// Alias registry this ability resolves actions against
    pub fn registry(&self) -> &Arc<AliasRegistry> {
        &self.registry
    }

    /// Register an alias on this ability's registry
    ///
    /// With the default constructors this is the process-wide registry, so
    /// the alias is visible to every ability sharing it.
    pub fn add_alias(&self, alias: &str, targets: impl Into<Names>) -> Result<()> {
        self.registry.register(alias, targets)
    }

    /// Snapshot of the current rule store
    pub fn store(&self) -> Arc<RuleStore> {
        Arc::clone(&self.store.read())
    }

    /// Current rule descriptors in declaration order
    pub fn rules(&self) -> Vec<RawRule> {
        self.store().raw_rules()
    }

    /// Lookup cache statistics of the current store
    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.store().cache_stats()
    }

    /// Resolve the subject type name of a query argument
    pub fn subject_name_of<'a>(&self, subject: impl Into<SubjectRef<'a>>) -> String {
        (self.subject_name)(&subject.into())
    }

    /// Install a new rule set
    ///
    /// The new rules are compiled first; if that fails nothing changes and
    /// no event fires. Otherwise `Update` handlers run, the store is swapped,
    /// then `Updated` handlers run, each with the incoming rule list.
    pub fn update(&self, rules: Vec<RawRule>) -> Result<()> {
        let store = Arc::new(RuleStore::new(
            rules.clone(),
            Arc::clone(&self.registry),
            &self.config,
        )?);

        let payload = UpdateEvent {
            ability: self,
            rules: &rules,
        };

        self.events.emit(AbilityEvent::Update, &payload);
        *self.store.write() = store;
        info!("Ability rules replaced ({} rules)", rules.len());
        self.events.emit(AbilityEvent::Updated, &payload);

        Ok(())
    }

    /// Subscribe to a lifecycle event
    pub fn on(
        &self,
        event: AbilityEvent,
        handler: impl Fn(&UpdateEvent<'_>) + Send + Sync + 'static,
    ) -> Subscription {
        debug!("Subscribed to {:?}", event);
        self.events.subscribe(event, Arc::new(handler))
    }

    /// Number of handlers registered for `event`
    pub fn handler_count(&self, event: AbilityEvent) -> usize {
        self.events.len(event)
    }

    /// Whether `action` is allowed on `subject`
    pub fn can<'a>(&self, action: &str, subject: impl Into<SubjectRef<'a>>) -> bool {
        self.check(action, subject.into(), None)
    }

    /// Whether `action` is allowed on `field` of `subject`
    pub fn can_field<'a>(
        &self,
        action: &str,
        subject: impl Into<SubjectRef<'a>>,
        field: &str,
    ) -> bool {
        self.check(action, subject.into(), Some(field))
    }

    /// Negation of [`Ability::can`]
    pub fn cannot<'a>(&self, action: &str, subject: impl Into<SubjectRef<'a>>) -> bool {
        !self.can(action, subject)
    }

    /// Negation of [`Ability::can_field`]
    pub fn cannot_field<'a>(
        &self,
        action: &str,
        subject: impl Into<SubjectRef<'a>>,
        field: &str,
    ) -> bool {
        !self.can_field(action, subject, field)
    }

    /// The rule deciding the request, if any
    pub fn relevant_rule_for<'a>(
        &self,
        action: &str,
        subject: impl Into<SubjectRef<'a>>,
        field: Option<&str>,
    ) -> Option<Arc<Rule>> {
        let subject = subject.into();
        let name = (self.subject_name)(&subject);
        let data = subject.data();
        self.store()
            .relevant_rule_for(action, &name, data.as_ref(), field)
    }

    /// Rules governing `action` on `subject`, most relevant first
    pub fn rules_for<'a>(
        &self,
        action: &str,
        subject: impl Into<SubjectRef<'a>>,
        field: Option<&str>,
    ) -> Vec<Arc<Rule>> {
        let name = self.subject_name_of(subject);
        self.store().rules_for(action, &name, field)
    }

    /// Rules matching subject and action regardless of field and conditions
    pub fn possible_rules_for<'a>(
        &self,
        action: &str,
        subject: impl Into<SubjectRef<'a>>,
    ) -> Vec<Arc<Rule>> {
        let name = self.subject_name_of(subject);
        self.store().possible_rules_for(action, &name).to_vec()
    }

    /// Fields of `subject` that `action` may touch
    ///
    /// Rules without a field list contribute `fields_from(rule)`; pass
    /// `|_| Vec::new()` to ignore them.
    pub fn permitted_fields_of<'a>(
        &self,
        action: &str,
        subject: impl Into<SubjectRef<'a>>,
        fields_from: impl Fn(&Rule) -> Vec<String>,
    ) -> Vec<String> {
        let subject = subject.into();
        let name = (self.subject_name)(&subject);
        let data = subject.data();
        self.store()
            .permitted_fields_of(action, &name, data.as_ref(), fields_from)
    }

    /// Fail with [`ForbiddenError`] unless the request is allowed
    ///
    /// The error message is the blocking rule's reason when that rule is
    /// an inverted rule carrying one.
    pub fn throw_unless_can<'a>(
        &self,
        action: &str,
        subject: impl Into<SubjectRef<'a>>,
        field: Option<&str>,
    ) -> std::result::Result<(), ForbiddenError> {
        let subject = subject.into();
        let name = (self.subject_name)(&subject);
        let data = subject.data();
        let rule = self
            .store()
            .relevant_rule_for(action, &name, data.as_ref(), field);

        match rule {
            Some(rule) if !rule.inverted() => Ok(()),
            blocking => {
                debug!(action, subject = %name, "Ability check failed, raising ForbiddenError");
                let error = ForbiddenError::new(action, subject.to_value(), name);
                Err(match blocking.as_ref().and_then(|rule| rule.reason()) {
                    Some(reason) => error.with_message(reason),
                    None => error,
                })
            }
        }
    }

    fn check(&self, action: &str, subject: SubjectRef<'_>, field: Option<&str>) -> bool {
        let name = (self.subject_name)(&subject);
        let data = subject.data();
        self.store().can(action, &name, data.as_ref(), field)
    }
}

impl fmt::Debug for Ability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ability")
            .field("store", &*self.store.read())
            .field("config", &self.config)
            .finish()
    }
}
