//! Associated type projection normalization.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::db::{AssocItemKind, Container, Predicate};
use crate::def::{DefId, ImplId, LangItem};
use crate::error::{Cancelled, ResolveResult};
use crate::lookup::Selection;
use crate::scope::Scope;
use crate::session::ResolveSession;
use crate::subst::{SubstMode, Substitution};
use crate::ty::{InferKind, ProjectionTy, Type, TypeFolder, TypeKind};

/// The outcome of normalizing one projection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Normalized {
    /// The associated type's value.
    Value(Type),
    /// No value is known; the projection stands for itself (a where clause
    /// proves the trait, or nothing does).
    Rigid(Type),
    /// The base type is not known yet.
    Ambiguous,
}

impl ResolveSession<'_> {
    /// Replace every projection in `ty` whose value is known in `scope`.
    pub fn normalize(&mut self, ty: &Type, scope: &Scope) -> ResolveResult<Type> {
        self.query(scope, false, |s| {
            let normalized = s.normalize_ty(ty, 0)?;
            Ok(s.export(&normalized))
        })
    }

    pub(crate) fn normalize_ty(&mut self, ty: &Type, depth: usize) -> ResolveResult<Type> {
        if !ty.walk().any(|t| matches!(t.kind(), TypeKind::Projection(_))) {
            return Ok(ty.clone());
        }
        let mut normalizer = Normalizer {
            session: self,
            depth,
            error: None,
        };
        let normalized = ty.fold_with(&mut normalizer);
        match normalizer.error.take() {
            Some(cancelled) => Err(cancelled),
            None => Ok(normalized),
        }
    }

    pub(crate) fn normalize_projection(&mut self, projection: &ProjectionTy, depth: usize) -> ResolveResult<Normalized> {
        self.cancel.check()?;
        if depth >= self.config.max_normalize_depth {
            debug!(depth, "normalization depth limit reached");
            return Ok(Normalized::Rigid(Type::new(TypeKind::Projection(projection.clone()))));
        }

        let base = self.unifier.shallow_resolve(&projection.base);
        let base = self.normalize_ty(&base, depth + 1)?;
        match base.kind() {
            TypeKind::Unknown => return Ok(Normalized::Value(Type::unknown())),
            TypeKind::Infer(var) if self.unifier.var_kind(var.id) == InferKind::Type => {
                return Ok(Normalized::Ambiguous)
            }
            _ => {}
        }
        let projection = ProjectionTy::new(base.clone(), projection.trait_ref.clone(), projection.item);
        let rigid = Type::new(TypeKind::Projection(projection.clone()));

        if let Some(value) = self.projection_from_env(&projection) {
            trace!(%rigid, %value, "projection from where clause");
            return Ok(Normalized::Value(self.normalize_ty(&value, depth + 1)?));
        }

        if self.db.lang_item(LangItem::Deref) == Some(projection.trait_ref.trait_id) {
            if let Some(inner) = base.builtin_deref() {
                return Ok(Normalized::Value(inner.clone()));
            }
        }

        // A concrete base is decided by its impls even when a where clause
        // also names the trait (inside `impl Tr for S`, `S: Tr` is in scope).
        let mut selection = Selection::NoMatch;
        if !base.has_params() && !base.walk().any(|t| matches!(t.kind(), TypeKind::Projection(_))) {
            selection = self.select_guarded(&base, &projection.trait_ref, false)?;
        }
        if selection == Selection::NoMatch {
            selection = self.select_inner(&base, &projection.trait_ref)?;
        }

        match selection {
            Selection::Impl { impl_id, subst } => match self.assoc_type_value(impl_id, &subst, &projection) {
                Some(value) => {
                    trace!(%rigid, %value, %impl_id, "projection from impl");
                    Ok(Normalized::Value(self.normalize_ty(&value, depth + 1)?))
                }
                None => Ok(Normalized::Rigid(rigid)),
            },
            Selection::Ambiguous => Ok(Normalized::Ambiguous),
            Selection::WhereClause(_) | Selection::Object(_) | Selection::Builtin | Selection::NoMatch => {
                Ok(Normalized::Rigid(rigid))
            }
        }
    }

    fn projection_from_env(&mut self, projection: &ProjectionTy) -> Option<Type> {
        let env = Arc::clone(&self.env);
        for pred in env.iter() {
            let Predicate::Projection { projection: bound, value } = pred else {
                continue;
            };
            if bound.item != projection.item || bound.trait_ref.trait_id != projection.trait_ref.trait_id {
                continue;
            }
            let matched = self.unifier.commit_if(|u| {
                u.unify(&bound.base, &projection.base) && u.unify_all(&bound.trait_ref.args, &projection.trait_ref.args)
            });
            if matched {
                return Some(value.clone());
            }
        }
        None
    }

    /// The value of `projection.item` in the impl, falling back to the
    /// trait's default.
    fn assoc_type_value(&self, impl_id: ImplId, subst: &Substitution, projection: &ProjectionTy) -> Option<Type> {
        let trait_item = self.db.assoc_item(projection.item)?;
        let data = self.db.impl_data(impl_id)?;
        for item in &data.items {
            let Some(item) = self.db.assoc_item(*item) else { continue };
            if item.name != trait_item.name {
                continue;
            }
            if let AssocItemKind::Type { value: Some(value), .. } = &item.kind {
                return Some(subst.apply(value, SubstMode::Keep));
            }
        }

        let AssocItemKind::Type { value: Some(default), .. } = &trait_item.kind else {
            return None;
        };
        let Container::Trait(trait_id) = trait_item.container else {
            return None;
        };
        let trait_data = self.db.trait_data(trait_id)?;
        let trait_subst = trait_data.subst_for(&projection.base, &projection.trait_ref);
        Some(trait_subst.apply(default, SubstMode::Keep))
    }

    /// The associated type called `name` declared in `trait_id`.
    pub(crate) fn trait_assoc_type(&self, trait_id: DefId, name: crate::def::Name) -> Option<DefId> {
        let data = self.db.trait_data(trait_id)?;
        data.items.iter().copied().find(|item| {
            self.db
                .assoc_item(*item)
                .is_some_and(|item| item.name == name && item.is_type())
        })
    }
}

struct Normalizer<'s, 'db> {
    session: &'s mut ResolveSession<'db>,
    depth: usize,
    error: Option<Cancelled>,
}

impl TypeFolder for Normalizer<'_, '_> {
    fn fold_ty(&mut self, ty: &Type) -> Type {
        if self.error.is_some() {
            return ty.clone();
        }
        let folded = ty.super_fold_with(self);
        let TypeKind::Projection(projection) = folded.kind() else {
            return folded;
        };
        match self.session.normalize_projection(projection, self.depth) {
            Ok(Normalized::Value(value)) => value,
            Ok(Normalized::Rigid(_) | Normalized::Ambiguous) => folded,
            Err(cancelled) => {
                self.error = Some(cancelled);
                folded
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::db::DbBuilder;
    use crate::scope::Scope;
    use crate::session::ResolveSession;
    use crate::ty::{ProjectionTy, TraitRef, Type};

    #[test]
    fn test_normalize_through_impl() {
        let mut b = DbBuilder::with_core();
        let tr = b.trait_("Tr").assoc_type("Out").finish();
        let out = b.trait_assoc_type(tr, "Out").unwrap();
        let s = b.struct_("S").finish();
        b.impl_trait(TraitRef::bare(tr), Type::adt(s, vec![]))
            .assoc_type("Out", Type::bool())
            .finish();
        let db = b.finish();
        let mut session = ResolveSession::new(&db);

        let projection = Type::projection(Type::adt(s, vec![]), TraitRef::bare(tr), out);
        let wrapped = Type::tuple(vec![projection, Type::u8()]);
        let normalized = session.normalize(&wrapped, &Scope::new()).unwrap();
        assert_eq!(normalized, Type::tuple(vec![Type::bool(), Type::u8()]));
    }

    #[test]
    fn test_param_projection_stays_rigid_without_equality() {
        let mut b = DbBuilder::with_core();
        let tr = b.trait_("Tr").assoc_type("Out").finish();
        let out = b.trait_assoc_type(tr, "Out").unwrap();
        let t = Type::param(b.param("T"));
        let db = b.finish();
        let mut session = ResolveSession::new(&db);

        let projection = Type::projection(t.clone(), TraitRef::bare(tr), out);
        let scope = Scope::new().with_bound(t.clone(), TraitRef::bare(tr));
        assert_eq!(session.normalize(&projection, &scope).unwrap(), projection);

        let scope = scope.with_projection_bound(ProjectionTy::new(t, TraitRef::bare(tr), out), Type::char());
        assert_eq!(session.normalize(&projection, &scope).unwrap(), Type::char());
    }

    #[test]
    fn test_deref_target_of_reference() {
        let b = DbBuilder::with_core();
        let deref = b.lang_trait(crate::def::LangItem::Deref);
        let target = b.trait_assoc_type(deref.trait_id, "Target").unwrap();
        let db = b.finish();
        let mut session = ResolveSession::new(&db);
        let projection = Type::projection(Type::shared_ref(Type::str()), deref, target);
        assert_eq!(session.normalize(&projection, &Scope::new()).unwrap(), Type::str());
    }
}
