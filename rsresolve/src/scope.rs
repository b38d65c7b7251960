//! What is in scope at a resolution site.
//!
//! A [`Scope`] carries the where clauses of the enclosing items (`T: Foo`,
//! `T: Iterator<Item = u8>`) and the set of traits whose methods are
//! callable by name. The resolver elaborates the predicates through
//! supertraits and associated type bounds before using them.

use rustc_hash::FxHashSet;

use crate::db::{ImplData, Predicate, TraitData};
use crate::def::DefId;
use crate::ty::{ProjectionTy, TraitRef, Type};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
    predicates: Vec<Predicate>,
    /// `None` makes every trait visible.
    visible_traits: Option<FxHashSet<DefId>>,
}

impl Scope {
    /// An empty scope in which every trait is visible.
    pub fn new() -> Self {
        Self::default()
    }

    /// A scope in which only `traits` are visible for method calls.
    ///
    /// Traits named by in-scope bounds are always usable on the bounded
    /// type, visible or not.
    pub fn with_visible_traits(traits: impl IntoIterator<Item = DefId>) -> Self {
        Self {
            predicates: Vec::new(),
            visible_traits: Some(traits.into_iter().collect()),
        }
    }

    /// The scope inside an impl block: its where clauses, plus
    /// `SelfTy: Trait` for a trait impl.
    pub fn for_impl(data: &ImplData) -> Self {
        let mut scope = Self::new();
        scope.predicates.extend(data.predicates.iter().cloned());
        if let Some(trait_ref) = &data.trait_ref {
            scope
                .predicates
                .push(Predicate::implemented(data.self_ty.clone(), trait_ref.clone()));
        }
        scope
    }

    /// The scope inside a trait declaration: `Self: Trait` and its where
    /// clauses.
    pub fn for_trait(data: &TraitData) -> Self {
        let mut scope = Self::new();
        scope
            .predicates
            .push(Predicate::implemented(data.self_ty(), data.identity_ref()));
        scope.predicates.extend(data.predicates.iter().cloned());
        scope
    }

    /// Add `ty: trait_ref`.
    pub fn with_bound(mut self, ty: Type, trait_ref: TraitRef) -> Self {
        self.predicates.push(Predicate::implemented(ty, trait_ref));
        self
    }

    /// Add `<base as Trait>::Item == value`.
    pub fn with_projection_bound(mut self, projection: ProjectionTy, value: Type) -> Self {
        self.predicates.push(Predicate::projection(projection, value));
        self
    }

    pub fn with_predicate(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn add_predicate(&mut self, predicate: Predicate) {
        self.predicates.push(predicate);
    }

    /// Make `trait_id` visible. No-op when every trait is already visible.
    pub fn import_trait(&mut self, trait_id: DefId) {
        if let Some(visible) = &mut self.visible_traits {
            visible.insert(trait_id);
        }
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn is_trait_visible(&self, trait_id: DefId) -> bool {
        self.visible_traits
            .as_ref()
            .map_or(true, |visible| visible.contains(&trait_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::def::ParamId;

    #[test]
    fn test_all_traits_visible_by_default() {
        let scope = Scope::new();
        assert!(scope.is_trait_visible(DefId::new(7)));
    }

    #[test]
    fn test_visible_traits_restrict_and_import() {
        let mut scope = Scope::with_visible_traits([DefId::new(1)]);
        assert!(scope.is_trait_visible(DefId::new(1)));
        assert!(!scope.is_trait_visible(DefId::new(2)));
        scope.import_trait(DefId::new(2));
        assert!(scope.is_trait_visible(DefId::new(2)));
    }

    #[test]
    fn test_bounds_accumulate_in_order() {
        let t = Type::param(ParamId::new(0));
        let scope = Scope::new()
            .with_bound(t.clone(), TraitRef::bare(DefId::new(1)))
            .with_bound(t, TraitRef::bare(DefId::new(2)));
        let traits: Vec<_> = scope.predicates().iter().map(Predicate::trait_id).collect();
        assert_eq!(traits, vec![DefId::new(1), DefId::new(2)]);
    }
}
