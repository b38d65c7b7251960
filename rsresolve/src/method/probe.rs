//! Candidate assembly, picking and confirmation.

use std::sync::Arc;

use rustc_hash::FxHashSet;
use tracing::{debug, trace};

use crate::db::{AssocItem, FnSig, ImplData, Predicate};
use crate::def::{DefId, FloatTy, ImplId, IntTy, LangItem, Name, UintTy};
use crate::error::ResolveResult;
use crate::lookup::{Adjustment, AutoderefEnd};
use crate::method::{receiver_type, Candidate, CandidateSource, Outcome, UnresolvedReason};
use crate::session::ResolveSession;
use crate::subst::{SubstMode, Substitution};
use crate::ty::{InferKind, PrimitiveTy, TraitRef, Type, TypeHead, TypeKind};

/// What kind of item a lookup accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProbeMode {
    /// `receiver.name()`: functions taking `self`.
    Method,
    /// `Ty::name`: any function or constant. The receiver, if any, is the
    /// first argument.
    Path,
}

#[derive(Debug, Clone)]
enum AssembledKind {
    Inherent(ImplId),
    TraitImpl {
        impl_id: ImplId,
        trait_id: DefId,
        blanket: bool,
        /// The trait ref of a qualified path, checked against the impl.
        wanted: Option<TraitRef>,
    },
    Bound { self_ty: Type, trait_ref: TraitRef },
    Object(TraitRef),
    Builtin(TraitRef),
    TraitDecl(TraitRef),
}

/// An applicable item found at one autoderef step, not yet confirmed.
#[derive(Debug, Clone)]
pub(crate) struct Assembled {
    item: Arc<AssocItem>,
    kind: AssembledKind,
}

impl Assembled {
    /// The trait the candidate belongs to; `None` for inherent items.
    fn group(&self) -> Option<DefId> {
        match &self.kind {
            AssembledKind::Inherent(_) => None,
            AssembledKind::TraitImpl { trait_id, .. } => Some(*trait_id),
            AssembledKind::Bound { trait_ref, .. }
            | AssembledKind::Object(trait_ref)
            | AssembledKind::Builtin(trait_ref)
            | AssembledKind::TraitDecl(trait_ref) => Some(trait_ref.trait_id),
        }
    }

    pub(crate) fn trait_decl(item: Arc<AssocItem>, trait_ref: TraitRef) -> Self {
        Self {
            item,
            kind: AssembledKind::TraitDecl(trait_ref),
        }
    }
}

fn item_fits(item: &AssocItem, name: Name, mode: ProbeMode) -> bool {
    if item.name != name {
        return false;
    }
    match mode {
        ProbeMode::Method => item.is_method(),
        ProbeMode::Path => !item.is_type(),
    }
}

impl ResolveSession<'_> {
    pub(crate) fn probe_method(&mut self, receiver: &Type, name: Name, hints: &[Type]) -> ResolveResult<Outcome> {
        let receiver = self.unifier.resolve(receiver);
        if let Some(outcome) = self.unknown_receiver(&receiver) {
            return Ok(outcome);
        }

        let chain = self.autoderef_chain(&receiver)?;
        // A settled tie at one level gives way to a unique pick further down.
        let mut tied: Option<Vec<Candidate>> = None;
        for step in &chain.steps {
            self.cancel.check()?;
            if let Some(outcome) = self.unknown_receiver(&step.ty) {
                return Ok(outcome);
            }
            let found = self.probe_level(&step.ty, name, ProbeMode::Method, None)?;
            if found.is_empty() {
                continue;
            }
            trace!(ty = %step.ty, candidates = found.len(), "method candidates");
            match self.pick(found, &step.ty, &step.adjustments, hints, ProbeMode::Method)? {
                Outcome::Unresolved(UnresolvedReason::NoCandidates) => {}
                Outcome::Ambiguous(candidates) if !self.hints_pending(&step.ty, hints) => {
                    trace!(ty = %step.ty, "ambiguous level; trying the next one");
                    tied.get_or_insert(candidates);
                }
                outcome => return Ok(outcome),
            }
        }
        if let Some(candidates) = tied {
            debug!(%receiver, candidates = candidates.len(), "ambiguous");
            return Ok(Outcome::Ambiguous(candidates));
        }

        let reason = match chain.end {
            AutoderefEnd::Exhausted => UnresolvedReason::NoCandidates,
            AutoderefEnd::Cycle => UnresolvedReason::CyclicDeref,
            AutoderefEnd::Limit => UnresolvedReason::AutoderefLimit,
        };
        debug!(%receiver, ?reason, "no method candidates");
        Ok(Outcome::Unresolved(reason))
    }

    /// The outcome for a receiver whose type is not known yet, if it is one.
    pub(crate) fn unknown_receiver(&self, ty: &Type) -> Option<Outcome> {
        if self.unifier.shallow_resolve(ty).is_unknown() {
            return Some(Outcome::Unresolved(UnresolvedReason::UnknownReceiver));
        }
        if self.is_unbound_type_var(ty) {
            return Some(if self.allow_defer {
                Outcome::Deferred(Vec::new())
            } else {
                Outcome::Unresolved(UnresolvedReason::UnknownReceiver)
            });
        }
        None
    }

    /// Candidates named `name` for `ty` itself: inherent items, or if there
    /// are none, trait items. With `only`, just that trait's items.
    pub(crate) fn probe_level(
        &mut self,
        ty: &Type,
        name: Name,
        mode: ProbeMode,
        only: Option<&TraitRef>,
    ) -> ResolveResult<Vec<Assembled>> {
        if only.is_none() {
            let inherent = self.inherent_candidates(ty, name, mode)?;
            if !inherent.is_empty() {
                return Ok(inherent);
            }
        }
        self.trait_candidates(ty, name, mode, only)
    }

    fn inherent_candidates(&mut self, ty: &Type, name: Name, mode: ProbeMode) -> ResolveResult<Vec<Assembled>> {
        let mut found = Vec::new();
        for impl_id in self.impls_for_self(ty) {
            self.cancel.check()?;
            let Some(data) = self.db.impl_data(impl_id) else { continue };
            if !data.is_inherent() {
                continue;
            }
            let Some(item) = self.impl_item(&data, name, mode) else {
                continue;
            };
            if self.impl_applies(&data, ty, None)? {
                found.push(Assembled {
                    item,
                    kind: AssembledKind::Inherent(impl_id),
                });
            }
        }
        Ok(found)
    }

    fn trait_candidates(
        &mut self,
        ty: &Type,
        name: Name,
        mode: ProbeMode,
        only: Option<&TraitRef>,
    ) -> ResolveResult<Vec<Assembled>> {
        let mut found = Vec::new();
        let mut bound_traits: FxHashSet<DefId> = FxHashSet::default();
        let wanted_trait = only.map(|tr| tr.trait_id);

        let env = Arc::clone(&self.env);
        let mut seen_bounds: Vec<&TraitRef> = Vec::new();
        for pred in env.iter() {
            let Predicate::Implemented { self_ty, trait_ref } = pred else {
                continue;
            };
            // Bounds on concrete types (`S: Tr` inside `impl Tr for S`) are
            // answered by the impls below.
            if wanted_trait.is_some_and(|id| id != trait_ref.trait_id) || !self_ty.walk().any(|t| t.is_rigid_param()) {
                continue;
            }
            let Some(item) = self.trait_item(trait_ref.trait_id, name, mode) else {
                continue;
            };
            let applies = self.unifier.probe(|u| {
                u.unify(self_ty, ty) && only.map_or(true, |wanted| u.unify_all(&trait_ref.args, &wanted.args))
            });
            if applies && !seen_bounds.contains(&trait_ref) {
                seen_bounds.push(trait_ref);
                bound_traits.insert(trait_ref.trait_id);
                found.push(Assembled {
                    item,
                    kind: AssembledKind::Bound {
                        self_ty: self_ty.clone(),
                        trait_ref: trait_ref.clone(),
                    },
                });
            }
        }

        for bound in self.object_bounds(ty)? {
            if wanted_trait.is_some_and(|id| id != bound.trait_id) {
                continue;
            }
            let Some(item) = self.trait_item(bound.trait_id, name, mode) else {
                continue;
            };
            let applies = only.map_or(true, |wanted| self.unifier.probe(|u| u.unify_all(&bound.args, &wanted.args)));
            if applies {
                bound_traits.insert(bound.trait_id);
                found.push(Assembled {
                    item,
                    kind: AssembledKind::Object(bound),
                });
            }
        }

        let has_env_candidates = !found.is_empty();
        let declaring = self.db.traits_with_item(name);
        let mut from_impls = Vec::new();
        for impl_id in self.impls_for_self(ty) {
            self.cancel.check()?;
            let Some(data) = self.db.impl_data(impl_id) else { continue };
            let Some(trait_ref) = &data.trait_ref else { continue };
            let trait_id = trait_ref.trait_id;
            if wanted_trait.is_some_and(|id| id != trait_id) || !declaring.contains(&trait_id) {
                continue;
            }
            if only.is_none() && !self.scope.is_trait_visible(trait_id) {
                continue;
            }
            // A bound already supplies this trait's items; blanket impls
            // would only restate it.
            if bound_traits.contains(&trait_id) || (has_env_candidates && data.is_blanket()) {
                continue;
            }
            let Some(trait_item) = self.trait_item(trait_id, name, mode) else {
                continue;
            };
            let item = self.impl_item(&data, name, mode).unwrap_or(trait_item);
            if self.impl_applies(&data, ty, only)? {
                from_impls.push(Assembled {
                    item,
                    kind: AssembledKind::TraitImpl {
                        impl_id,
                        trait_id,
                        blanket: data.is_blanket(),
                        wanted: only.cloned(),
                    },
                });
            }
        }

        // `Clone` for tuples, derived `Clone`, `Deref` for references.
        for lang in LangItem::ALL {
            let Some(trait_id) = self.db.lang_item(lang) else { continue };
            if wanted_trait.is_some_and(|id| id != trait_id)
                || (only.is_none() && !self.scope.is_trait_visible(trait_id))
                || found.iter().chain(&from_impls).any(|c| c.group() == Some(trait_id))
            {
                continue;
            }
            let Some(item) = self.trait_item(trait_id, name, mode) else {
                continue;
            };
            if self.builtin_certainty(lang, ty)?.is_some_and(|c| c.may_hold()) {
                from_impls.push(Assembled {
                    item,
                    kind: AssembledKind::Builtin(TraitRef::bare(trait_id)),
                });
            }
        }

        // A concrete impl shadows blanket impls of the same trait.
        let concrete: FxHashSet<DefId> = from_impls
            .iter()
            .filter_map(|c| match &c.kind {
                AssembledKind::TraitImpl {
                    trait_id,
                    blanket: false,
                    ..
                } => Some(*trait_id),
                _ => None,
            })
            .collect();
        from_impls.retain(|c| {
            !matches!(&c.kind, AssembledKind::TraitImpl { trait_id, blanket: true, .. } if concrete.contains(trait_id))
        });

        found.extend(from_impls);
        Ok(found)
    }

    /// Impls whose self type could match `ty`, in declaration order. An
    /// integer or float literal variable is matched against every impl for
    /// a type of its kind.
    pub(crate) fn impls_for_self(&self, ty: &Type) -> Vec<ImplId> {
        let ty = self.unifier.shallow_resolve(ty);
        let heads: Vec<TypeHead> = match ty.kind() {
            TypeKind::Infer(var) => match self.unifier.var_kind(var.id) {
                InferKind::Type => Vec::new(),
                InferKind::Int => IntTy::ALL
                    .into_iter()
                    .map(|t| TypeHead::Primitive(PrimitiveTy::Int(t)))
                    .chain(UintTy::ALL.into_iter().map(|t| TypeHead::Primitive(PrimitiveTy::Uint(t))))
                    .collect(),
                InferKind::Float => [FloatTy::F32, FloatTy::F64]
                    .into_iter()
                    .map(|t| TypeHead::Primitive(PrimitiveTy::Float(t)))
                    .collect(),
            },
            _ => ty.head().into_iter().collect(),
        };

        let mut impls: Vec<ImplId> = Vec::new();
        for head in heads {
            impls.extend(self.db.impls_for_head(head).iter().copied());
        }
        impls.extend(self.db.blanket_impls().iter().copied());
        impls.sort();
        impls.dedup();
        impls
    }

    /// Whether `data` may apply to `ty`, leaving no bindings behind.
    fn impl_applies(&mut self, data: &ImplData, ty: &Type, trait_ref: Option<&TraitRef>) -> ResolveResult<bool> {
        self.stats.impls_considered += 1;
        let snapshot = self.unifier.start_snapshot();
        let matched = self.match_impl(data, ty, trait_ref);
        self.unifier.rollback_to(snapshot);
        Ok(matched?.is_some_and(|(_, certainty)| certainty.may_hold()))
    }

    /// The item called `name` declared in trait `trait_id`.
    pub(crate) fn trait_item(&self, trait_id: DefId, name: Name, mode: ProbeMode) -> Option<Arc<AssocItem>> {
        let data = self.db.trait_data(trait_id)?;
        data.items
            .iter()
            .filter_map(|item| self.db.assoc_item(*item))
            .find(|item| item_fits(item, name, mode))
    }

    fn impl_item(&self, data: &ImplData, name: Name, mode: ProbeMode) -> Option<Arc<AssocItem>> {
        data.items
            .iter()
            .filter_map(|item| self.db.assoc_item(*item))
            .find(|item| item_fits(item, name, mode))
    }

    /// Choose among the candidates found at one step.
    pub(crate) fn pick(
        &mut self,
        found: Vec<Assembled>,
        level_ty: &Type,
        adjustments: &[Adjustment],
        hints: &[Type],
        mode: ProbeMode,
    ) -> ResolveResult<Outcome> {
        let same_group = found.windows(2).all(|pair| pair[0].group() == pair[1].group());

        let mut remaining = found;
        if remaining.len() > 1 && same_group && !hints.is_empty() {
            let mut fitting = Vec::new();
            for candidate in &remaining {
                if self.matches_hints(candidate, level_ty, hints, mode)? {
                    fitting.push(candidate.clone());
                }
            }
            if !fitting.is_empty() {
                remaining = fitting;
            }
        }

        let mut confirmed = Vec::with_capacity(remaining.len());
        for candidate in &remaining {
            if let Some(candidate) = self.confirm(candidate, level_ty, adjustments)? {
                confirmed.push(candidate);
            }
        }

        if confirmed.len() <= 1 {
            return Ok(match confirmed.pop() {
                Some(candidate) => {
                    debug!(item = %candidate.item, source = ?candidate.source, "picked");
                    Outcome::Resolved(candidate)
                }
                None => Outcome::Unresolved(UnresolvedReason::NoCandidates),
            });
        }

        if same_group && self.allow_defer && self.hints_pending(level_ty, hints) {
            debug!(candidates = confirmed.len(), "deferring same-trait ambiguity");
            Ok(Outcome::Deferred(confirmed))
        } else {
            debug!(candidates = confirmed.len(), "ambiguous");
            Ok(Outcome::Ambiguous(confirmed))
        }
    }

    /// Whether inference may still tell candidates at `level_ty` apart.
    fn hints_pending(&self, level_ty: &Type, hints: &[Type]) -> bool {
        self.has_unresolved_vars(level_ty) || hints.iter().any(|hint| self.has_unresolved_vars(hint))
    }

    /// Whether the candidate's parameter types accept `hints`.
    fn matches_hints(&mut self, candidate: &Assembled, level_ty: &Type, hints: &[Type], mode: ProbeMode) -> ResolveResult<bool> {
        let Some(sig) = candidate.item.fn_sig() else {
            return Ok(true);
        };
        let snapshot = self.unifier.start_snapshot();
        let result = self.params_accept(candidate, sig, level_ty, hints, mode);
        self.unifier.rollback_to(snapshot);
        result
    }

    fn params_accept(
        &mut self,
        candidate: &Assembled,
        sig: &FnSig,
        level_ty: &Type,
        hints: &[Type],
        mode: ProbeMode,
    ) -> ResolveResult<bool> {
        let Some((mut subst, _)) = self.instantiate(candidate, level_ty)? else {
            return Ok(false);
        };
        for param in &sig.generics.params {
            subst.insert(*param, self.unifier.fresh_var());
        }

        let mut params = Vec::with_capacity(sig.params.len() + 1);
        if mode == ProbeMode::Path {
            params.extend(receiver_type(sig.self_kind, level_ty));
        }
        params.extend(sig.params.iter().map(|p| subst.apply(p, SubstMode::Keep)));

        for (param, hint) in params.iter().zip(hints) {
            let param = self.normalize_ty(param, 0)?;
            if !self.unifier.unify(&param, hint) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Bind the candidate's generics for `level_ty` in the current snapshot.
    /// Returns the combined impl and trait substitution and the trait ref.
    fn instantiate(
        &mut self,
        candidate: &Assembled,
        level_ty: &Type,
    ) -> ResolveResult<Option<(Substitution, Option<TraitRef>)>> {
        let (self_ty, trait_ref, impl_subst) = match &candidate.kind {
            AssembledKind::Inherent(impl_id) => {
                let Some(data) = self.db.impl_data(*impl_id) else {
                    return Ok(None);
                };
                return Ok(self.match_impl(&data, level_ty, None)?.map(|(subst, _)| (subst, None)));
            }
            AssembledKind::TraitImpl { impl_id, wanted, .. } => {
                let Some(data) = self.db.impl_data(*impl_id) else {
                    return Ok(None);
                };
                let Some((subst, _)) = self.match_impl(&data, level_ty, wanted.as_ref())? else {
                    return Ok(None);
                };
                let Some(declared) = &data.trait_ref else {
                    return Ok(None);
                };
                let trait_ref = subst.apply_trait_ref(declared, SubstMode::Keep);
                (level_ty.clone(), trait_ref, subst)
            }
            AssembledKind::Bound { self_ty, trait_ref } => {
                if !self.unifier.unify(self_ty, level_ty) {
                    return Ok(None);
                }
                (self_ty.clone(), trait_ref.clone(), Substitution::new())
            }
            AssembledKind::Object(trait_ref)
            | AssembledKind::Builtin(trait_ref)
            | AssembledKind::TraitDecl(trait_ref) => {
                (level_ty.clone(), trait_ref.clone(), Substitution::new())
            }
        };

        let Some(trait_data) = self.db.trait_data(trait_ref.trait_id) else {
            return Ok(None);
        };
        let mut subst = impl_subst;
        for (param, ty) in trait_data.subst_for(&self_ty, &trait_ref).iter() {
            if subst.get(param).is_none() {
                subst.insert(param, ty.clone());
            }
        }
        Ok(Some((subst, Some(trait_ref))))
    }

    /// Turn a picked candidate into an exported [`Candidate`].
    pub(crate) fn confirm(
        &mut self,
        candidate: &Assembled,
        level_ty: &Type,
        adjustments: &[Adjustment],
    ) -> ResolveResult<Option<Candidate>> {
        let snapshot = self.unifier.start_snapshot();
        let confirmed = self.confirm_in_snapshot(candidate, level_ty, adjustments);
        self.unifier.rollback_to(snapshot);
        confirmed
    }

    fn confirm_in_snapshot(
        &mut self,
        candidate: &Assembled,
        level_ty: &Type,
        adjustments: &[Adjustment],
    ) -> ResolveResult<Option<Candidate>> {
        let Some((subst, trait_ref)) = self.instantiate(candidate, level_ty)? else {
            return Ok(None);
        };
        let trait_ref = trait_ref.map(|tr| self.export_trait_ref(&tr));
        let source = match &candidate.kind {
            AssembledKind::Inherent(impl_id) => CandidateSource::Inherent(*impl_id),
            AssembledKind::TraitImpl { impl_id, .. } => CandidateSource::TraitImpl(*impl_id),
            AssembledKind::Bound { .. } => match &trait_ref {
                Some(tr) => CandidateSource::WhereClause(tr.clone()),
                None => return Ok(None),
            },
            AssembledKind::Object(tr) => CandidateSource::Object(self.export_trait_ref(tr)),
            AssembledKind::Builtin(tr) => CandidateSource::Builtin(self.export_trait_ref(tr)),
            AssembledKind::TraitDecl(tr) => CandidateSource::TraitDecl(self.export_trait_ref(tr)),
        };
        Ok(Some(Candidate {
            item: candidate.item.id,
            source,
            subst: self.export_subst(&subst),
            trait_ref,
            receiver_ty: self.export(level_ty),
            adjustments: adjustments.to_vec(),
        }))
    }
}
