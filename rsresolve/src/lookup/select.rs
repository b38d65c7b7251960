//! Trait selection.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::db::{Generics, ImplData, Predicate};
use crate::def::{ImplId, LangItem};
use crate::error::ResolveResult;
use crate::lookup::Normalized;
use crate::scope::Scope;
use crate::session::ResolveSession;
use crate::subst::{SubstMode, Substitution};
use crate::ty::{ConstValue, InferKind, TraitRef, Type, TypeKind};

/// How `T: Trait<Args>` is proven.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// A unique applicable impl, with the values of its generics.
    Impl { impl_id: ImplId, subst: Substitution },
    /// An in-scope where clause (after elaboration).
    WhereClause(TraitRef),
    /// A bound of the trait object `dyn Trait`.
    Object(TraitRef),
    /// A built-in rule (`Sized`, `Copy`, `Clone`, `Deref` for references).
    Builtin,
    /// More than one candidate applies, or the self type is not known yet.
    Ambiguous,
    NoMatch,
}

impl Selection {
    pub fn certainty(&self) -> Certainty {
        match self {
            Selection::Impl { .. } | Selection::WhereClause(_) | Selection::Object(_) | Selection::Builtin => {
                Certainty::Yes
            }
            Selection::Ambiguous => Certainty::Maybe,
            Selection::NoMatch => Certainty::No,
        }
    }

    fn from_builtin(certainty: Certainty) -> Self {
        match certainty {
            Certainty::Yes => Selection::Builtin,
            Certainty::Maybe => Selection::Ambiguous,
            Certainty::No => Selection::NoMatch,
        }
    }
}

/// The answer to "does this predicate hold?".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Certainty {
    Yes,
    /// Depends on inference variables not yet known.
    Maybe,
    No,
}

impl Certainty {
    pub fn from_bool(holds: bool) -> Self {
        if holds {
            Certainty::Yes
        } else {
            Certainty::No
        }
    }

    /// Both hold.
    pub fn and(self, other: Certainty) -> Certainty {
        match (self, other) {
            (Certainty::No, _) | (_, Certainty::No) => Certainty::No,
            (Certainty::Maybe, _) | (_, Certainty::Maybe) => Certainty::Maybe,
            (Certainty::Yes, Certainty::Yes) => Certainty::Yes,
        }
    }

    pub fn may_hold(self) -> bool {
        self != Certainty::No
    }
}

impl ResolveSession<'_> {
    /// Select how `self_ty: trait_ref` holds in `scope`.
    pub fn select(&mut self, self_ty: &Type, trait_ref: &TraitRef, scope: &Scope) -> ResolveResult<Selection> {
        debug!(%self_ty, %trait_ref, "select");
        self.query(scope, false, |s| {
            let selection = s.select_inner(self_ty, trait_ref)?;
            Ok(match selection {
                Selection::Impl { impl_id, subst } => Selection::Impl {
                    impl_id,
                    subst: s.export_subst(&subst),
                },
                Selection::WhereClause(tr) => Selection::WhereClause(s.export_trait_ref(&tr)),
                Selection::Object(tr) => Selection::Object(s.export_trait_ref(&tr)),
                other => other,
            })
        })
    }

    /// Whether `self_ty: trait_ref` holds in `scope`.
    pub fn evaluate(&mut self, self_ty: &Type, trait_ref: &TraitRef, scope: &Scope) -> ResolveResult<Certainty> {
        self.query(scope, false, |s| Ok(s.select_inner(self_ty, trait_ref)?.certainty()))
    }

    /// Select, consulting where clauses first.
    pub(crate) fn select_inner(&mut self, self_ty: &Type, trait_ref: &TraitRef) -> ResolveResult<Selection> {
        self.select_guarded(self_ty, trait_ref, true)
    }

    /// Select with cycle and depth protection. With `use_env` false, where
    /// clauses and object bounds are skipped and only impls are considered.
    pub(crate) fn select_guarded(
        &mut self,
        self_ty: &Type,
        trait_ref: &TraitRef,
        use_env: bool,
    ) -> ResolveResult<Selection> {
        self.cancel.check()?;
        self.stats.selections += 1;

        let self_ty = self.unifier.shallow_resolve(self_ty);
        match self_ty.kind() {
            TypeKind::Unknown => return Ok(Selection::Ambiguous),
            TypeKind::Infer(var) if self.unifier.var_kind(var.id) == InferKind::Type => {
                return Ok(Selection::Ambiguous)
            }
            _ => {}
        }

        if let Some(lang) = self.lang_item_of(trait_ref.trait_id) {
            if let Some(certainty) = self.builtin_certainty(lang, &self_ty)? {
                return Ok(Selection::from_builtin(certainty));
            }
        }

        let key = (
            self.unifier.resolve(&self_ty).strip_aliases(),
            self.unifier_resolve_trait_ref(trait_ref),
        );
        if self.in_progress.contains(&key) {
            trace!(self_ty = %key.0, trait_ref = %key.1, "selection cycle");
            self.stats.cycles_cut += 1;
            return Ok(Selection::NoMatch);
        }
        if self.depth >= self.config.max_selection_depth {
            debug!(depth = self.depth, "selection depth limit reached");
            self.stats.cycles_cut += 1;
            return Ok(Selection::NoMatch);
        }

        self.in_progress.insert(key.clone());
        self.depth += 1;
        let result = self.assemble_selection(&self_ty, trait_ref, use_env);
        self.depth -= 1;
        self.in_progress.remove(&key);

        if let Ok(selection) = &result {
            trace!(%self_ty, %trait_ref, ?selection, "selected");
        }
        result
    }

    fn unifier_resolve_trait_ref(&self, trait_ref: &TraitRef) -> TraitRef {
        TraitRef::new(
            trait_ref.trait_id,
            trait_ref
                .args
                .iter()
                .map(|arg| self.unifier.resolve(arg).strip_aliases())
                .collect(),
        )
    }

    fn assemble_selection(&mut self, self_ty: &Type, trait_ref: &TraitRef, use_env: bool) -> ResolveResult<Selection> {
        if use_env {
            if let Some(selection) = self.select_where_clause(self_ty, trait_ref) {
                return Ok(selection);
            }
            if let Some(selection) = self.select_object(self_ty, trait_ref)? {
                return Ok(selection);
            }
        }
        self.select_impl(self_ty, trait_ref)
    }

    fn select_where_clause(&mut self, self_ty: &Type, trait_ref: &TraitRef) -> Option<Selection> {
        let env = Arc::clone(&self.env);
        let mut matching: Vec<(&Type, &TraitRef)> = Vec::new();
        for pred in env.iter() {
            let Predicate::Implemented {
                self_ty: bound_ty,
                trait_ref: bound,
            } = pred
            else {
                continue;
            };
            if bound.trait_id != trait_ref.trait_id {
                continue;
            }
            let applies = self
                .unifier
                .probe(|u| u.unify(bound_ty, self_ty) && u.unify_all(&bound.args, &trait_ref.args));
            if applies && !matching.iter().any(|(_, seen)| *seen == bound) {
                matching.push((bound_ty, bound));
            }
        }

        match matching.as_slice() {
            [] => None,
            [(bound_ty, bound)] => {
                self.unifier.unify(bound_ty, self_ty);
                self.unifier.unify_all(&bound.args, &trait_ref.args);
                Some(Selection::WhereClause((*bound).clone()))
            }
            _ => Some(Selection::Ambiguous),
        }
    }

    fn select_object(&mut self, self_ty: &Type, trait_ref: &TraitRef) -> ResolveResult<Option<Selection>> {
        for bound in self.object_bounds(self_ty)? {
            if bound.trait_id != trait_ref.trait_id {
                continue;
            }
            if self.unifier.commit_if(|u| u.unify_all(&bound.args, &trait_ref.args)) {
                return Ok(Some(Selection::Object(bound)));
            }
        }
        Ok(None)
    }

    /// The traits a `dyn` type implements: its listed bounds and their
    /// supertraits. Empty for other types.
    pub(crate) fn object_bounds(&self, self_ty: &Type) -> ResolveResult<Vec<TraitRef>> {
        let self_ty = self.unifier.shallow_resolve(self_ty);
        let TypeKind::DynTrait(bounds) = self_ty.kind() else {
            return Ok(Vec::new());
        };
        let listed: Vec<Predicate> = bounds
            .iter()
            .map(|b| Predicate::implemented(self_ty.clone(), b.clone()))
            .collect();
        let elaborated = self.elaborate(&listed)?;
        Ok(elaborated
            .iter()
            .filter_map(|pred| match pred {
                Predicate::Implemented {
                    self_ty: pred_ty,
                    trait_ref,
                } if *pred_ty == self_ty => Some(trait_ref.clone()),
                _ => None,
            })
            .collect())
    }

    pub(crate) fn select_impl(&mut self, self_ty: &Type, trait_ref: &TraitRef) -> ResolveResult<Selection> {
        let impls = self.db.impls_of_trait(trait_ref.trait_id);
        let self_head = self_ty.head();
        let mut matches: Vec<(Arc<ImplData>, bool)> = Vec::new();

        for impl_id in impls.iter().copied() {
            self.cancel.check()?;
            let Some(data) = self.db.impl_data(impl_id) else { continue };
            if let (Some(impl_head), Some(head)) = (data.self_ty.head(), self_head) {
                if impl_head != head {
                    continue;
                }
            }
            self.stats.impls_considered += 1;
            let snapshot = self.unifier.start_snapshot();
            let matched = self.match_impl(&data, self_ty, Some(trait_ref));
            self.unifier.rollback_to(snapshot);
            if matched?.is_some_and(|(_, certainty)| certainty.may_hold()) {
                let blanket = data.is_blanket();
                matches.push((data, blanket));
            }
        }

        // A non-blanket impl is more specific than a blanket one.
        if matches.iter().any(|(_, blanket)| !blanket) {
            matches.retain(|(_, blanket)| !blanket);
        }

        match matches.as_slice() {
            [] => Ok(Selection::NoMatch),
            [(data, _)] => {
                let data = Arc::clone(data);
                match self.match_impl(&data, self_ty, Some(trait_ref))? {
                    Some((subst, _)) => Ok(Selection::Impl {
                        impl_id: data.id,
                        subst,
                    }),
                    None => Ok(Selection::NoMatch),
                }
            }
            _ => Ok(Selection::Ambiguous),
        }
    }

    /// Test whether impl `data` applies to `self_ty` (and, for a trait impl,
    /// to `trait_ref`'s arguments), binding variables in the current
    /// snapshot. Returns the impl's instantiated generics.
    ///
    /// Callers wrap this in a snapshot when the match is speculative.
    pub(crate) fn match_impl(
        &mut self,
        data: &ImplData,
        self_ty: &Type,
        trait_ref: Option<&TraitRef>,
    ) -> ResolveResult<Option<(Substitution, Certainty)>> {
        let subst = self.fresh_subst(&data.generics);
        let impl_self = self.normalize_ty(&subst.apply(&data.self_ty, SubstMode::Keep), 0)?;
        if !self.unifier.unify(&impl_self, self_ty) {
            return Ok(None);
        }

        if let Some(wanted) = trait_ref {
            let Some(declared) = &data.trait_ref else {
                return Ok(None);
            };
            if declared.trait_id != wanted.trait_id {
                return Ok(None);
            }
            let declared = subst.apply_trait_ref(declared, SubstMode::Keep);
            let mut args = Vec::with_capacity(declared.args.len());
            for arg in &declared.args {
                args.push(self.normalize_ty(arg, 0)?);
            }
            if !self.unifier.unify_all(&args, &wanted.args) {
                return Ok(None);
            }
        }

        let mut certainty = Certainty::Yes;
        for pred in &data.predicates {
            certainty = certainty.and(self.evaluate_predicate(&pred.subst(&subst))?);
            if certainty == Certainty::No {
                return Ok(None);
            }
        }

        // Generic parameters are implicitly `Sized`.
        for param in &data.generics.params {
            let sized_required = self.db.param(*param).map_or(true, |p| p.sized);
            if !sized_required {
                continue;
            }
            if let Some(ty) = subst.get(*param) {
                if self.sized_certainty(ty)? == Certainty::No {
                    return Ok(None);
                }
            }
        }

        Ok(Some((subst, certainty)))
    }

    /// Fresh variables for `generics`; const parameters become `Unknown`.
    pub(crate) fn fresh_subst(&mut self, generics: &Generics) -> Substitution {
        let mut subst = Substitution::new();
        for param in &generics.params {
            subst.insert(*param, self.unifier.fresh_var());
        }
        for param in &generics.consts {
            subst.insert_const(*param, ConstValue::Unknown);
        }
        subst
    }

    pub(crate) fn evaluate_predicate(&mut self, pred: &Predicate) -> ResolveResult<Certainty> {
        match pred {
            Predicate::Implemented { self_ty, trait_ref } => {
                let self_ty = self.normalize_ty(self_ty, 0)?;
                let mut args = Vec::with_capacity(trait_ref.args.len());
                for arg in &trait_ref.args {
                    args.push(self.normalize_ty(arg, 0)?);
                }
                let trait_ref = TraitRef::new(trait_ref.trait_id, args);
                Ok(self.select_inner(&self_ty, &trait_ref)?.certainty())
            }
            Predicate::Projection { projection, value } => match self.normalize_projection(projection, 0)? {
                Normalized::Value(ty) | Normalized::Rigid(ty) => {
                    Ok(Certainty::from_bool(self.unifier.unify(&ty, value)))
                }
                Normalized::Ambiguous => Ok(Certainty::Maybe),
            },
        }
    }

    pub(crate) fn lang_item_of(&self, trait_id: crate::def::DefId) -> Option<LangItem> {
        LangItem::ALL
            .into_iter()
            .find(|item| self.db.lang_item(*item) == Some(trait_id))
    }
}
