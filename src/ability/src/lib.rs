//! # CretoAI Ability Engine
//!
//! Rule-based authorization: declare who may perform which action on which
//! subject, optionally limited to fields and to instances matching data
//! conditions, then ask whether an action is allowed.
//!
//! ## Features
//!
//! - **Ordered rules** where later declarations override earlier ones
//! - **Subject specificity**: rules on a named subject beat rules on `all`
//! - **Action aliases** with transitive expansion and cycle rejection
//! - **Conditions** in a small query language (`$in`, `$gt`, `$regex`, ...)
//! - **Field scoping** and permitted-field listing
//! - **Atomic rule replacement** with `update` / `updated` notifications
//!
//! ## Example
//!
//! ```rust
//! use cretoai_ability::{Ability, Instance, RawRule};
//! use serde_json::json;
//!
//! let ability = Ability::new(vec![
//!     RawRule::can("delete", "Post").with_conditions(json!({ "creator": "me" })),
//!     RawRule::cannot("delete", "Post")
//!         .with_conditions(json!({ "archived": true }))
//!         .because("Archived posts are read-only"),
//! ])
//! .unwrap();
//!
//! let mine = Instance::new("Post", json!({ "creator": "me" }));
//! let archived = Instance::new("Post", json!({ "creator": "me", "archived": true }));
//!
//! assert!(ability.can("delete", &mine));
//! assert!(ability.cannot("delete", &archived));
//!
//! let err = ability.throw_unless_can("delete", &archived, None).unwrap_err();
//! assert_eq!(err.to_string(), "Archived posts are read-only");
//! ```

pub mod ability;
pub mod alias;
pub mod condition;
pub mod config;
pub mod engine;
pub mod error;
pub mod rule;
pub mod types;

// Re-export commonly used types
pub use ability::{Ability, AbilityEvent, Subscription, UpdateEvent};
pub use alias::AliasRegistry;
pub use condition::Condition;
pub use config::AbilityConfig;
pub use engine::RuleStore;
pub use error::{AbilityError, ForbiddenError, Result};
pub use rule::{RawRule, Rule};
pub use types::{
    Instance, Names, Subject, SubjectRef, SubjectValue, ALL_SUBJECTS, CRUD_ACTIONS, MANAGE,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
