//! Substitutions from generic parameters to types.
//!
//! A [`Substitution`] is an ordered map from [`ParamId`]s (and const
//! parameters) to their values. Applying it rewrites every reachable
//! `Param` through [`TypeFolder`]. Parameters the substitution does not
//! mention are either kept or replaced with `Unknown`, see [`SubstMode`].

use std::collections::BTreeMap;
use std::fmt;

use crate::def::{ConstParamId, ParamId};
use crate::ty::{ConstValue, ProjectionTy, TraitRef, Type, TypeFolder, TypeKind};

/// What to do with parameters a substitution does not map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubstMode {
    /// Leave them as parameters.
    Keep,
    /// Replace them with `Unknown`.
    Unknown,
}

/// A mapping from generic parameters to types and const values.
///
/// Must not contain cycles; a parameter's value may not mention the
/// parameter itself. This is not checked.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Substitution {
    types: BTreeMap<ParamId, Type>,
    consts: BTreeMap<ConstParamId, ConstValue>,
}

impl Substitution {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pair up `params` with `args` positionally. Extra entries on either
    /// side are ignored.
    pub fn from_pairs(params: &[ParamId], args: &[Type]) -> Self {
        let mut subst = Self::new();
        for (param, arg) in params.iter().zip(args) {
            subst.insert(*param, arg.clone());
        }
        subst
    }

    pub fn insert(&mut self, param: ParamId, ty: Type) {
        self.types.insert(param, ty);
    }

    pub fn insert_const(&mut self, param: ConstParamId, value: ConstValue) {
        self.consts.insert(param, value);
    }

    pub fn get(&self, param: ParamId) -> Option<&Type> {
        self.types.get(&param)
    }

    pub fn get_const(&self, param: ConstParamId) -> Option<&ConstValue> {
        self.consts.get(&param)
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty() && self.consts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.types.len() + self.consts.len()
    }

    /// Type entries in parameter order.
    pub fn iter(&self) -> impl Iterator<Item = (ParamId, &Type)> {
        self.types.iter().map(|(param, ty)| (*param, ty))
    }

    pub fn apply(&self, ty: &Type, mode: SubstMode) -> Type {
        if self.is_empty() && mode == SubstMode::Keep {
            return ty.clone();
        }
        ty.fold_with(&mut SubstFolder { subst: self, mode })
    }

    pub fn apply_trait_ref(&self, trait_ref: &TraitRef, mode: SubstMode) -> TraitRef {
        trait_ref.fold_with(&mut SubstFolder { subst: self, mode })
    }

    pub fn apply_projection(&self, projection: &ProjectionTy, mode: SubstMode) -> ProjectionTy {
        projection.fold_with(&mut SubstFolder { subst: self, mode })
    }

    /// Apply `self`, then `next`.
    ///
    /// The result maps every parameter of `self` to its value rewritten by
    /// `next`, plus the entries of `next` that `self` does not define.
    pub fn then(&self, next: &Substitution) -> Substitution {
        let mut composed = Substitution::new();
        for (param, ty) in &self.types {
            composed.insert(*param, next.apply(ty, SubstMode::Keep));
        }
        for (param, value) in &self.consts {
            let value = match value {
                ConstValue::Param(p) => next.get_const(*p).cloned().unwrap_or_else(|| value.clone()),
                other => other.clone(),
            };
            composed.insert_const(*param, value);
        }
        for (param, ty) in &next.types {
            composed.types.entry(*param).or_insert_with(|| ty.clone());
        }
        for (param, value) in &next.consts {
            composed.consts.entry(*param).or_insert_with(|| value.clone());
        }
        composed
    }

    /// Rewrite every value with `f`, keeping the keys.
    pub fn map_types(&self, mut f: impl FnMut(&Type) -> Type) -> Substitution {
        Substitution {
            types: self.types.iter().map(|(param, ty)| (*param, f(ty))).collect(),
            consts: self.consts.clone(),
        }
    }
}

impl fmt::Debug for Substitution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (param, ty) in &self.types {
            map.entry(&format_args!("T{}", param.0), &format_args!("{ty}"));
        }
        for (param, value) in &self.consts {
            map.entry(&format_args!("const_{}", param.0), &format_args!("{value}"));
        }
        map.finish()
    }
}

struct SubstFolder<'a> {
    subst: &'a Substitution,
    mode: SubstMode,
}

impl TypeFolder for SubstFolder<'_> {
    fn fold_ty(&mut self, ty: &Type) -> Type {
        match ty.kind() {
            TypeKind::Param { id, .. } => match self.subst.get(*id) {
                Some(value) => value.clone(),
                None if self.mode == SubstMode::Unknown => Type::unknown(),
                None => ty.clone(),
            },
            _ => ty.super_fold_with(self),
        }
    }

    fn fold_const(&mut self, value: &ConstValue) -> ConstValue {
        match value {
            ConstValue::Param(id) => match self.subst.get_const(*id) {
                Some(value) => value.clone(),
                None if self.mode == SubstMode::Unknown => ConstValue::Unknown,
                None => value.clone(),
            },
            other => other.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::def::DefId;

    fn p(n: u32) -> ParamId {
        ParamId::new(n)
    }

    #[test]
    fn test_apply_replaces_nested_params() {
        let ty = Type::adt(DefId::new(0), vec![Type::shared_ref(Type::param(p(0))), Type::param(p(1))]);
        let subst = Substitution::from_pairs(&[p(0), p(1)], &[Type::i32(), Type::bool()]);
        let applied = subst.apply(&ty, SubstMode::Keep);
        assert_eq!(
            applied,
            Type::adt(DefId::new(0), vec![Type::shared_ref(Type::i32()), Type::bool()])
        );
    }

    #[test]
    fn test_apply_modes_for_unmapped_params() {
        let ty = Type::tuple(vec![Type::param(p(0)), Type::param(p(1))]);
        let subst = Substitution::from_pairs(&[p(0)], &[Type::u8()]);
        assert_eq!(
            subst.apply(&ty, SubstMode::Keep),
            Type::tuple(vec![Type::u8(), Type::param(p(1))])
        );
        assert_eq!(
            subst.apply(&ty, SubstMode::Unknown),
            Type::tuple(vec![Type::u8(), Type::unknown()])
        );
    }

    #[test]
    fn test_const_params_substituted() {
        let n = ConstParamId::new(0);
        let ty = Type::array_with_size(Type::param(p(0)), ConstValue::Param(n));
        let mut subst = Substitution::from_pairs(&[p(0)], &[Type::u8()]);
        subst.insert_const(n, ConstValue::Known(3));
        assert_eq!(subst.apply(&ty, SubstMode::Keep), Type::array(Type::u8(), 3));
    }

    #[test]
    fn test_then_matches_sequential_application() {
        let first = Substitution::from_pairs(&[p(0)], &[Type::slice(Type::param(p(1)))]);
        let second = Substitution::from_pairs(&[p(1), p(2)], &[Type::char(), Type::bool()]);
        let ty = Type::tuple(vec![Type::param(p(0)), Type::param(p(2))]);

        let sequential = second.apply(&first.apply(&ty, SubstMode::Keep), SubstMode::Keep);
        let composed = first.then(&second).apply(&ty, SubstMode::Keep);
        assert_eq!(sequential, composed);
    }
}
