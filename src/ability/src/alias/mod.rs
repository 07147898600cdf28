//! Action aliases
//!
//! An alias names a group of actions (`manage` -> create/read/update/delete,
//! `modify` -> `sort` -> `increment`). Aliases nest; registration rejects any
//! alias that would reach itself, keeping expansion finite.

pub mod registry;

pub use registry::AliasRegistry;
