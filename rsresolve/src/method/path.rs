//! Paths, associated types and fields.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::db::{AdtKind, Predicate};
use crate::def::{DefId, Name};
use crate::error::ResolveResult;
use crate::lookup::{AutoderefEnd, Normalized};
use crate::method::probe::{Assembled, ProbeMode};
use crate::method::{receiver_type, Candidate, CandidateSource, Outcome, Resolution, UnresolvedReason};
use crate::scope::Scope;
use crate::session::ResolveSession;
use crate::subst::SubstMode;
use crate::ty::{ProjectionTy, TraitRef, Type, TypeKind};

/// The part of a path before the final segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathQualifier {
    /// `Ty::name`
    Type(Type),
    /// `Trait::name`, with `Self` taken from the arguments.
    Trait(DefId),
    /// `<Ty as Trait>::name`
    Qualified { self_ty: Type, trait_ref: TraitRef },
}

/// `receiver.name` or `receiver.0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldName {
    Named(Name),
    Index(usize),
}

impl ResolveSession<'_> {
    pub(crate) fn probe_path(&mut self, qualifier: &PathQualifier, name: Name, hints: &[Type]) -> ResolveResult<Outcome> {
        match qualifier {
            PathQualifier::Type(ty) => self.probe_type_path(ty, name, hints),
            PathQualifier::Trait(trait_id) => self.probe_trait_path(*trait_id, name, hints),
            PathQualifier::Qualified { self_ty, trait_ref } => self.probe_qualified(self_ty, trait_ref, name, hints),
        }
    }

    fn probe_type_path(&mut self, ty: &Type, name: Name, hints: &[Type]) -> ResolveResult<Outcome> {
        let ty = self.unifier.resolve(ty);
        if let Some(outcome) = self.unknown_receiver(&ty) {
            return Ok(outcome);
        }
        let ty = self.normalize_ty(&ty, 0)?;

        if let Some(candidate) = self.enum_variant(&ty, name) {
            return Ok(Outcome::Resolved(candidate));
        }

        let found = self.probe_level(&ty, name, ProbeMode::Path, None)?;
        if found.is_empty() {
            return Ok(Outcome::Unresolved(UnresolvedReason::NoCandidates));
        }
        self.pick(found, &ty, &[], hints, ProbeMode::Path)
    }

    fn enum_variant(&self, ty: &Type, name: Name) -> Option<Candidate> {
        let TypeKind::Adt { def_id, args, consts } = ty.kind() else {
            return None;
        };
        let data = self.db.adt(*def_id)?;
        if data.kind != AdtKind::Enum {
            return None;
        }
        let (index, variant) = data.variant_named(name)?;
        trace!(%ty, variant = %variant.id, "enum variant");
        Some(Candidate {
            item: variant.id,
            source: CandidateSource::Variant(*def_id, index),
            subst: self.export_subst(&data.generics.subst(args, consts)),
            trait_ref: None,
            receiver_ty: self.export(ty),
            adjustments: Vec::new(),
        })
    }

    /// `Trait::name(args)`: infer `Self` (and the trait's arguments) from
    /// the argument types, then resolve as `<Self as Trait>::name`.
    fn probe_trait_path(&mut self, trait_id: DefId, name: Name, hints: &[Type]) -> ResolveResult<Outcome> {
        let Some(data) = self.db.trait_data(trait_id) else {
            return Ok(Outcome::Unresolved(UnresolvedReason::NoCandidates));
        };
        let Some(item) = self.trait_item(trait_id, name, ProbeMode::Path) else {
            return Ok(Outcome::Unresolved(UnresolvedReason::NoCandidates));
        };

        let self_ty = self.unifier.fresh_var();
        let trait_ref = TraitRef::new(trait_id, self.unifier.fresh_vars(data.generics.params.len()));
        if let Some(sig) = item.fn_sig() {
            let subst = data.subst_for(&self_ty, &trait_ref);
            let mut params = Vec::with_capacity(sig.params.len() + 1);
            params.extend(receiver_type(sig.self_kind, &self_ty));
            params.extend(sig.params.iter().map(|p| subst.apply(p, SubstMode::Unknown)));
            for (param, hint) in params.iter().zip(hints) {
                if !self.unifier.unify(param, hint) {
                    break;
                }
            }
        }
        trace!(self_ty = %self.unifier.resolve(&self_ty), "inferred Self for trait path");
        self.probe_qualified(&self_ty, &trait_ref, name, hints)
    }

    /// `<self_ty as trait_ref>::name`. Falls back to the trait's own
    /// declaration when no impl can be chosen.
    fn probe_qualified(
        &mut self,
        self_ty: &Type,
        trait_ref: &TraitRef,
        name: Name,
        hints: &[Type],
    ) -> ResolveResult<Outcome> {
        let Some(item) = self.trait_item(trait_ref.trait_id, name, ProbeMode::Path) else {
            return Ok(Outcome::Unresolved(UnresolvedReason::NoCandidates));
        };
        let self_ty = self.unifier.resolve(self_ty);
        let self_ty = self.normalize_ty(&self_ty, 0)?;
        let decl = Assembled::trait_decl(item, trait_ref.clone());

        let unknown_self = self_ty.is_unknown() || self.is_unbound_type_var(&self_ty);
        if unknown_self {
            let candidate = self.confirm(&decl, &self_ty, &[])?;
            return Ok(match candidate {
                Some(candidate) if self.allow_defer && !self_ty.is_unknown() => Outcome::Deferred(vec![candidate]),
                Some(candidate) => Outcome::Resolved(candidate),
                None => Outcome::Unresolved(UnresolvedReason::NoCandidates),
            });
        }

        let found = self.probe_level(&self_ty, name, ProbeMode::Path, Some(trait_ref))?;
        if found.is_empty() {
            debug!(%self_ty, %trait_ref, "no impl; using trait declaration");
            return Ok(match self.confirm(&decl, &self_ty, &[])? {
                Some(candidate) => Outcome::Resolved(candidate),
                None => Outcome::Unresolved(UnresolvedReason::NoCandidates),
            });
        }
        self.pick(found, &self_ty, &[], hints, ProbeMode::Path)
    }

    /// Resolve the associated type `base::name`, or `<base as trait_ref>::name`
    /// when a trait is given. Returns `None` when no unique value or rigid
    /// projection can be determined.
    ///
    /// Without a trait, in-scope bounds are consulted first. A type
    /// parameter is never resolved through a blanket `impl<T> Tr for T`,
    /// because the impl's where clauses are not known to hold for it. A
    /// concrete type is resolved through every applicable trait impl,
    /// blanket impls included once their where clauses hold.
    pub fn resolve_assoc_type(
        &mut self,
        base: &Type,
        trait_ref: Option<&TraitRef>,
        name: Name,
        scope: &Scope,
    ) -> ResolveResult<Option<Type>> {
        debug!(%base, ?name, "resolve_assoc_type");
        self.query(scope, false, |s| {
            let resolved = s.assoc_type_inner(base, trait_ref, name)?;
            Ok(resolved.map(|ty| s.export(&ty)))
        })
    }

    fn assoc_type_inner(&mut self, base: &Type, trait_ref: Option<&TraitRef>, name: Name) -> ResolveResult<Option<Type>> {
        let base = self.unifier.resolve(base);
        let base = self.normalize_ty(&base, 0)?;

        if let Some(trait_ref) = trait_ref {
            return self.project(&base, trait_ref, name);
        }

        let env = Arc::clone(&self.env);
        let mut bounds: Vec<&TraitRef> = Vec::new();
        for pred in env.iter() {
            let Predicate::Implemented { self_ty, trait_ref } = pred else {
                continue;
            };
            if self.trait_assoc_type(trait_ref.trait_id, name).is_none() {
                continue;
            }
            if self.unifier.probe(|u| u.unify(self_ty, &base)) && !bounds.contains(&trait_ref) {
                bounds.push(trait_ref);
            }
        }
        match bounds.as_slice() {
            [] => {}
            [bound] => return self.project(&base, bound, name),
            _ => {
                debug!(%base, bounds = bounds.len(), "associated type named by several bounds");
                return Ok(None);
            }
        }

        if base.is_unknown() || base.is_rigid_param() || base.as_infer().is_some() {
            return Ok(None);
        }

        let mut found: Vec<TraitRef> = Vec::new();
        for impl_id in self.impls_for_self(&base) {
            self.cancel.check()?;
            let Some(data) = self.db.impl_data(impl_id) else { continue };
            let Some(declared) = &data.trait_ref else { continue };
            if !self.scope.is_trait_visible(declared.trait_id) || self.trait_assoc_type(declared.trait_id, name).is_none() {
                continue;
            }
            self.stats.impls_considered += 1;
            let snapshot = self.unifier.start_snapshot();
            let matched = self.match_impl(&data, &base, None);
            let trait_ref = match &matched {
                Ok(Some((subst, certainty))) if certainty.may_hold() => {
                    Some(self.export_trait_ref(&subst.apply_trait_ref(declared, SubstMode::Keep)))
                }
                _ => None,
            };
            self.unifier.rollback_to(snapshot);
            matched?;
            if let Some(trait_ref) = trait_ref {
                if !found.contains(&trait_ref) {
                    found.push(trait_ref);
                }
            }
        }

        match found.as_slice() {
            [trait_ref] => {
                let trait_ref = trait_ref.clone();
                self.project(&base, &trait_ref, name)
            }
            _ => Ok(None),
        }
    }

    fn project(&mut self, base: &Type, trait_ref: &TraitRef, name: Name) -> ResolveResult<Option<Type>> {
        let Some(item) = self.trait_assoc_type(trait_ref.trait_id, name) else {
            return Ok(None);
        };
        let projection = ProjectionTy::new(base.clone(), trait_ref.clone(), item);
        match self.normalize_projection(&projection, 0)? {
            Normalized::Value(ty) | Normalized::Rigid(ty) => Ok(Some(ty)),
            Normalized::Ambiguous => Ok(None),
        }
    }

    /// Resolve `receiver.field`, dereferencing the receiver as needed.
    pub fn resolve_field(&mut self, receiver: &Type, field: FieldName, scope: &Scope) -> ResolveResult<Resolution> {
        debug!(%receiver, ?field, "resolve_field");
        self.query(scope, false, |s| {
            let receiver = s.unifier.resolve(receiver);
            if s.unknown_receiver(&receiver).is_some() {
                return Ok(Resolution::Unresolved(UnresolvedReason::UnknownReceiver));
            }
            let chain = s.autoderef_chain(&receiver)?;
            for step in &chain.steps {
                if let Some(candidate) = s.struct_field(&step.ty, field) {
                    return Ok(Resolution::Resolved(Candidate {
                        adjustments: step.adjustments.clone(),
                        ..candidate
                    }));
                }
            }
            Ok(Resolution::Unresolved(match chain.end {
                AutoderefEnd::Exhausted => UnresolvedReason::NoCandidates,
                AutoderefEnd::Cycle => UnresolvedReason::CyclicDeref,
                AutoderefEnd::Limit => UnresolvedReason::AutoderefLimit,
            }))
        })
    }

    fn struct_field(&self, ty: &Type, field: FieldName) -> Option<Candidate> {
        let ty = self.unifier.shallow_resolve(ty);
        let TypeKind::Adt { def_id, args, consts } = ty.kind() else {
            return None;
        };
        let data = self.db.adt(*def_id)?;
        if data.kind != AdtKind::Struct {
            return None;
        }
        let fields = data.struct_fields();
        let index = match field {
            FieldName::Named(name) => fields.iter().position(|f| f.name == Some(name))?,
            FieldName::Index(index) => match fields.get(index) {
                Some(f) if f.name.is_none() => index,
                _ => return None,
            },
        };
        Some(Candidate {
            item: *def_id,
            source: CandidateSource::Field(*def_id, index),
            subst: self.export_subst(&data.generics.subst(args, consts)),
            trait_ref: None,
            receiver_ty: self.export(&ty),
            adjustments: Vec::new(),
        })
    }
}
