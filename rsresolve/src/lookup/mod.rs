//! Implementation lookup.
//!
//! This module answers "does this type implement this trait, and through
//! which impl?" and the questions built on it:
//!
//! - [`select`](ResolveSession::select): pick the impl, where clause,
//!   trait object bound or built-in rule proving `T: Trait<Args>`
//! - [`normalize`](ResolveSession::normalize): replace `<T as Trait>::Item`
//!   by the associated type's value
//! - [`autoderef`](ResolveSession::autoderef): the chain of types a method
//!   receiver is probed at
//!
//! # Cycles
//!
//! Where clauses are evaluated by recursive selection. The session keeps
//! the set of `(type, trait)` pairs currently being selected; meeting one
//! again evaluates to "not satisfied", as does exceeding
//! [`max_selection_depth`](crate::config::ResolveConfig::max_selection_depth).
//! So `impl<T: B> A for T` plus `impl<T: A> B for T` proves neither `S: A`
//! nor `S: B`, and terminates.

mod autoderef;
mod builtins;
mod elaborate;
mod projection;
mod select;

pub use autoderef::{Adjustment, AutoderefChain, AutoderefEnd, AutoderefStep};
pub use select::{Certainty, Selection};

pub(crate) use projection::Normalized;
