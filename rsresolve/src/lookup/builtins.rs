//! Built-in trait rules: `Sized`, `Copy`, `Clone`, and `Deref` for
//! references.

use std::sync::Arc;

use crate::db::{AdtKind, AssocItemKind, Predicate};
use crate::def::{DefId, LangItem};
use crate::error::ResolveResult;
use crate::lookup::{Certainty, Normalized};
use crate::session::ResolveSession;
use crate::subst::SubstMode;
use crate::ty::{ConstValue, InferKind, PrimitiveTy, TraitRef, Type, TypeKind};

impl ResolveSession<'_> {
    /// The built-in answer for `self_ty: lang`, or `None` when the ordinary
    /// candidates (where clauses, impls) decide.
    pub(crate) fn builtin_certainty(&mut self, lang: LangItem, self_ty: &Type) -> ResolveResult<Option<Certainty>> {
        match lang {
            LangItem::Sized => self.sized_certainty(self_ty).map(Some),
            LangItem::Copy | LangItem::Clone => self.copy_clone_certainty(lang, self_ty),
            LangItem::Deref => Ok(self
                .unifier
                .shallow_resolve(self_ty)
                .builtin_deref()
                .map(|_| Certainty::Yes)),
        }
    }

    /// Whether `ty` is `Sized`.
    pub(crate) fn sized_certainty(&mut self, ty: &Type) -> ResolveResult<Certainty> {
        let mut visiting = Vec::new();
        self.sized_inner(ty, &mut visiting)
    }

    fn sized_inner(&mut self, ty: &Type, visiting: &mut Vec<DefId>) -> ResolveResult<Certainty> {
        self.cancel.check()?;
        let ty = self.unifier.shallow_resolve(ty);
        let certainty = match ty.kind() {
            TypeKind::Primitive(PrimitiveTy::Str) | TypeKind::Slice { .. } | TypeKind::DynTrait(_) => Certainty::No,
            TypeKind::Primitive(_)
            | TypeKind::Ref { .. }
            | TypeKind::Ptr { .. }
            | TypeKind::Array { .. }
            | TypeKind::Fn { .. }
            | TypeKind::Never => Certainty::Yes,
            TypeKind::Tuple(elements) => match elements.last() {
                Some(last) => self.sized_inner(last, visiting)?,
                None => Certainty::Yes,
            },
            TypeKind::Infer(var) => match self.unifier.var_kind(var.id) {
                InferKind::Type => Certainty::Maybe,
                InferKind::Int | InferKind::Float => Certainty::Yes,
            },
            TypeKind::Unknown => Certainty::Maybe,
            TypeKind::Adt { def_id, args, consts } => self.adt_sized(*def_id, args, consts, visiting)?,
            TypeKind::Param { id, is_self } => {
                if self.has_env_bound(&ty, LangItem::Sized) {
                    Certainty::Yes
                } else {
                    Certainty::from_bool(self.db.param(*id).map_or(!*is_self, |p| p.sized))
                }
            }
            TypeKind::Projection(projection) => match self.normalize_projection(projection, 0)? {
                Normalized::Value(value) => self.sized_inner(&value, visiting)?,
                Normalized::Ambiguous => Certainty::Maybe,
                Normalized::Rigid(_) => {
                    if self.has_env_bound(&ty, LangItem::Sized) {
                        Certainty::Yes
                    } else {
                        let declared = self.db.assoc_item(projection.item).map_or(true, |item| match &item.kind {
                            AssocItemKind::Type { sized, .. } => *sized,
                            _ => true,
                        });
                        Certainty::from_bool(declared)
                    }
                }
            },
        };
        Ok(certainty)
    }

    fn adt_sized(
        &mut self,
        def_id: DefId,
        args: &[Type],
        consts: &[ConstValue],
        visiting: &mut Vec<DefId>,
    ) -> ResolveResult<Certainty> {
        // A type reached again through its own fields is assumed sized;
        // any genuinely unsized tail is found on the first pass.
        if visiting.contains(&def_id) {
            return Ok(Certainty::Yes);
        }
        let Some(data) = self.db.adt(def_id) else {
            return Ok(Certainty::Yes);
        };
        let subst = data.generics.subst(args, consts);
        let fields: Vec<Type> = match data.kind {
            AdtKind::Struct => data
                .struct_fields()
                .last()
                .map(|field| subst.apply(&field.ty, SubstMode::Keep))
                .into_iter()
                .collect(),
            AdtKind::Enum => data
                .variants
                .iter()
                .flat_map(|variant| &variant.fields)
                .map(|field| subst.apply(&field.ty, SubstMode::Keep))
                .collect(),
        };

        visiting.push(def_id);
        let mut certainty = Certainty::Yes;
        for field in &fields {
            certainty = certainty.and(self.sized_inner(field, visiting)?);
        }
        visiting.pop();
        Ok(certainty)
    }

    fn copy_clone_certainty(&mut self, lang: LangItem, ty: &Type) -> ResolveResult<Option<Certainty>> {
        let Some(trait_id) = self.db.lang_item(lang) else {
            return Ok(None);
        };
        let trait_ref = TraitRef::bare(trait_id);
        let ty = self.unifier.shallow_resolve(ty);
        let certainty = match ty.kind() {
            TypeKind::Primitive(PrimitiveTy::Str) | TypeKind::Slice { .. } | TypeKind::DynTrait(_) => Certainty::No,
            TypeKind::Primitive(_) | TypeKind::Ptr { .. } | TypeKind::Fn { .. } | TypeKind::Never => Certainty::Yes,
            TypeKind::Ref { mutable, .. } => Certainty::from_bool(!*mutable),
            TypeKind::Infer(var) => match self.unifier.var_kind(var.id) {
                InferKind::Type => Certainty::Maybe,
                InferKind::Int | InferKind::Float => Certainty::Yes,
            },
            TypeKind::Unknown => Certainty::Maybe,
            TypeKind::Tuple(elements) => self.all_implement(elements.clone(), &trait_ref)?,
            TypeKind::Array { element, .. } => self.all_implement(vec![element.clone()], &trait_ref)?,
            TypeKind::Adt { def_id, args, .. } => {
                let derived = self.db.adt(*def_id).is_some_and(|data| data.derives(lang));
                if !derived {
                    return Ok(None);
                }
                self.all_implement(args.clone(), &trait_ref)?
            }
            TypeKind::Param { .. } | TypeKind::Projection(_) => return Ok(None),
        };
        Ok(Some(certainty))
    }

    fn all_implement(&mut self, types: Vec<Type>, trait_ref: &TraitRef) -> ResolveResult<Certainty> {
        let mut certainty = Certainty::Yes;
        for ty in &types {
            certainty = certainty.and(self.select_inner(ty, trait_ref)?.certainty());
            if certainty == Certainty::No {
                break;
            }
        }
        Ok(certainty)
    }

    /// Whether an in-scope predicate says `ty: lang`.
    fn has_env_bound(&mut self, ty: &Type, lang: LangItem) -> bool {
        let Some(trait_id) = self.db.lang_item(lang) else {
            return false;
        };
        let env = Arc::clone(&self.env);
        env.iter().any(|pred| match pred {
            Predicate::Implemented { self_ty, trait_ref } if trait_ref.trait_id == trait_id => {
                self.unifier.probe(|u| u.unify(self_ty, ty))
            }
            _ => false,
        })
    }
}
