//! Resolution sessions.
//!
//! A [`ResolveSession`] is the per-inference-pass state: the unifier holding
//! the driver's inference variables, the configuration, the cancellation
//! token and the bookkeeping that bounds recursion. Queries take `&mut self`;
//! separate sessions over the same database may run on separate threads.
//!
//! Every public query runs inside a unifier snapshot that is rolled back
//! when the query returns, so queries never bind the driver's variables.
//! Types in results are fully resolved; inference variables created by the
//! query itself come back as `Unknown`.

use std::sync::Arc;

use rustc_hash::FxHashSet;
use tracing::debug;

use crate::cancel::CancellationToken;
use crate::config::ResolveConfig;
use crate::db::{Predicate, ResolveDatabase};
use crate::error::ResolveResult;
use crate::scope::Scope;
use crate::subst::Substitution;
use crate::ty::{InferKind, TraitRef, Type, TypeFolder, TypeKind};
use crate::unify::Unifier;

/// Counters describing the work done by a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveStats {
    /// Public queries started.
    pub queries: u64,
    /// Autoderef steps taken.
    pub autoderef_steps: u64,
    /// Candidate impls tested for applicability.
    pub impls_considered: u64,
    /// Trait selections performed.
    pub selections: u64,
    /// Selections cut short by the in-progress set or the depth limit.
    pub cycles_cut: u64,
    /// Queries that ended with `Cancelled`.
    pub cancellations: u64,
}

/// State for one inference pass over a [`ResolveDatabase`].
pub struct ResolveSession<'db> {
    pub(crate) db: &'db dyn ResolveDatabase,
    pub(crate) config: ResolveConfig,
    pub(crate) cancel: CancellationToken,
    pub(crate) unifier: Unifier,
    /// Elaborated predicates of the current query's scope.
    pub(crate) env: Arc<[Predicate]>,
    pub(crate) scope: Scope,
    /// `(self type, trait)` pairs currently being selected.
    pub(crate) in_progress: FxHashSet<(Type, TraitRef)>,
    pub(crate) depth: usize,
    /// Variables at or above this index were created by the current query.
    pub(crate) query_floor: usize,
    pub(crate) allow_defer: bool,
    pub(crate) stats: ResolveStats,
}

impl<'db> ResolveSession<'db> {
    pub fn new(db: &'db dyn ResolveDatabase) -> Self {
        Self::with_config(db, ResolveConfig::default())
    }

    pub fn with_config(db: &'db dyn ResolveDatabase, config: ResolveConfig) -> Self {
        Self {
            db,
            config,
            cancel: CancellationToken::default(),
            unifier: Unifier::new(),
            env: Arc::from(Vec::new()),
            scope: Scope::new(),
            in_progress: FxHashSet::default(),
            depth: 0,
            query_floor: 0,
            allow_defer: true,
            stats: ResolveStats::default(),
        }
    }

    /// Observe `token` in every query of this session.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn set_cancellation(&mut self, token: CancellationToken) {
        self.cancel = token;
    }

    pub fn db(&self) -> &'db dyn ResolveDatabase {
        self.db
    }

    pub fn config(&self) -> &ResolveConfig {
        &self.config
    }

    pub fn stats(&self) -> ResolveStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = ResolveStats::default();
    }

    /// The driver's unifier.
    pub fn unifier(&self) -> &Unifier {
        &self.unifier
    }

    pub fn unifier_mut(&mut self) -> &mut Unifier {
        &mut self.unifier
    }

    pub fn fresh_var(&mut self) -> Type {
        self.unifier.fresh_var()
    }

    /// A variable for an unsuffixed integer literal.
    pub fn fresh_int_var(&mut self) -> Type {
        self.unifier.fresh_int_var()
    }

    pub fn fresh_float_var(&mut self) -> Type {
        self.unifier.fresh_float_var()
    }

    /// Resolve `ty` against the driver's current bindings.
    pub fn resolve_ty(&self, ty: &Type) -> Type {
        self.unifier.resolve(ty)
    }

    /// Run a public query: open a snapshot, elaborate `scope`, run `f`,
    /// then roll everything back.
    pub(crate) fn query<R>(
        &mut self,
        scope: &Scope,
        allow_defer: bool,
        f: impl FnOnce(&mut Self) -> ResolveResult<R>,
    ) -> ResolveResult<R> {
        self.stats.queries += 1;
        let snapshot = self.unifier.start_snapshot();
        self.query_floor = snapshot.var_len();
        self.allow_defer = allow_defer;
        self.scope = scope.clone();

        let result = self.cancel.check().and_then(|()| {
            self.env = self.elaborate(scope.predicates())?;
            f(self)
        });

        self.unifier.rollback_to(snapshot);
        self.in_progress.clear();
        self.depth = 0;
        self.env = Arc::from(Vec::new());
        if let Err(cancelled) = &result {
            self.stats.cancellations += 1;
            debug!(reason = ?cancelled.reason, "query cancelled");
        }
        result
    }

    /// Resolve `ty` deeply, replacing variables created by the current
    /// query with `Unknown`.
    pub(crate) fn export(&self, ty: &Type) -> Type {
        let resolved = self.unifier.resolve(ty);
        resolved.fold_with(&mut QueryVarEraser {
            floor: self.query_floor,
        })
    }

    pub(crate) fn export_trait_ref(&self, trait_ref: &TraitRef) -> TraitRef {
        TraitRef::new(
            trait_ref.trait_id,
            trait_ref.args.iter().map(|arg| self.export(arg)).collect(),
        )
    }

    pub(crate) fn export_subst(&self, subst: &Substitution) -> Substitution {
        subst.map_types(|ty| self.export(ty))
    }

    /// Whether `ty` still mentions a variable after resolution.
    pub(crate) fn has_unresolved_vars(&self, ty: &Type) -> bool {
        self.unifier.resolve(ty).has_infer_vars()
    }

    /// Whether `ty` resolves to an unbound variable of kind `Type`.
    pub(crate) fn is_unbound_type_var(&self, ty: &Type) -> bool {
        match self.unifier.shallow_resolve(ty).kind() {
            TypeKind::Infer(var) => self.unifier.var_kind(var.id) == InferKind::Type,
            _ => false,
        }
    }
}

impl std::fmt::Debug for ResolveSession<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolveSession")
            .field("config", &self.config)
            .field("vars", &self.unifier.num_vars())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

struct QueryVarEraser {
    floor: usize,
}

impl TypeFolder for QueryVarEraser {
    fn fold_ty(&mut self, ty: &Type) -> Type {
        match ty.kind() {
            TypeKind::Infer(var) if var.id.index() >= self.floor => Type::unknown(),
            _ => ty.super_fold_with(self),
        }
    }
}
