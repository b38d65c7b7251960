//! # rsresolve
//!
//! Trait resolution and method lookup for a Rust type checker.
//!
//! Given a type database (ADTs, traits, impls, associated items) and an
//! inference context, the engine answers the questions a type checker asks
//! while inferring a function body:
//!
//! - **Selection**: does `T: Trait<Args>` hold, and through which impl,
//!   where clause or trait object bound?
//! - **Normalization**: what is `<T as Trait>::Item`?
//! - **Method lookup**: which item does `receiver.name(args)` call, after
//!   how many dereferences?
//! - **Paths**: `<T as Trait>::f`, `T::f`, `Trait::f`, `Enum::Variant`,
//!   associated types and fields.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     ResolveSession                           │
//! │   (unifier, config, cancellation token, in-progress set)     │
//! ├──────────────────────────────────────────────────────────────┤
//! │                                                              │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐      │
//! │  │    method    │──▶│    lookup    │──▶│    unify     │      │
//! │  │ probe, paths │   │ select, deref│   │  snapshots   │      │
//! │  └──────────────┘   └──────────────┘   └──────────────┘      │
//! │          │                  │                                │
//! │          └────────┬─────────┘                                │
//! │                   ▼                                          │
//! │        ┌────────────────────┐    ┌──────────────┐            │
//! │        │  ResolveDatabase   │    │  ty, subst   │            │
//! │        │ (MemoryDb, index)  │    │              │            │
//! │        └────────────────────┘    └──────────────┘            │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use rsresolve::{DbBuilder, ResolveDatabase, ResolveSession, Resolution, Scope, SelfKind, TraitRef, Type};
//!
//! let mut b = DbBuilder::with_core();
//! let s = b.struct_("S").finish();
//! let greet = b.trait_("Greet").method("greet", SelfKind::Ref, vec![], Type::unit()).finish();
//! b.impl_trait(TraitRef::bare(greet), Type::adt(s, vec![])).finish();
//! let db = b.finish();
//!
//! let mut session = ResolveSession::new(&db);
//! let name = db.lookup_name("greet").unwrap();
//! let receiver = Type::shared_ref(Type::adt(s, vec![]));
//! let resolution = session.resolve_method(&receiver, name, &[], &Scope::new()).unwrap();
//! assert!(matches!(resolution, Resolution::Resolved(_)));
//! ```

#![warn(rust_2018_idioms)]

pub mod cancel;
pub mod config;
pub mod db;
pub mod def;
pub mod error;
pub mod lookup;
pub mod method;
pub mod scope;
pub mod session;
pub mod subst;
pub mod ty;
pub mod unify;

// Re-exports
pub use cancel::{CancellationSource, CancellationToken};
pub use config::{LogLevel, ResolveConfig, ResolveConfigBuilder};
pub use db::{DbBuilder, MemoryDb, Predicate, ResolveDatabase, SelfKind};
pub use def::{DefId, ImplId, LangItem, Name, ParamId};
pub use error::{Cancelled, ConfigError, ResolveResult, UnifyError};
pub use lookup::{Adjustment, AutoderefChain, AutoderefEnd, Certainty, Selection};
pub use method::{
    Candidate, CandidateSource, DeferredCall, FieldName, PathQualifier, Resolution, Signature, UnresolvedReason,
};
pub use scope::Scope;
pub use session::{ResolveSession, ResolveStats};
pub use subst::{SubstMode, Substitution};
pub use ty::{InferKind, TraitRef, Type, TypeKind};
pub use unify::Unifier;
