//! Predicate elaboration.
//!
//! `T: Copy` also tells us `T: Clone` and `T: Sized`; `T: Iterator` with
//! `type Item: Debug` tells us `<T as Iterator>::Item: Debug`. Elaboration
//! walks these implications depth-first in declaration order, with a
//! visited set (supertrait cycles) and a size cap (ever-growing projection
//! chains such as `type Next: Tr` inside `Tr`).

use std::sync::Arc;

use rustc_hash::FxHashSet;
use tracing::debug;

use crate::db::{AssocItemKind, Predicate};
use crate::error::ResolveResult;
use crate::session::ResolveSession;
use crate::subst::SubstMode;
use crate::ty::{ProjectionTy, Type, TypeFolder, TypeKind};

impl ResolveSession<'_> {
    pub(crate) fn elaborate(&self, predicates: &[Predicate]) -> ResolveResult<Arc<[Predicate]>> {
        let limit = self.config.max_elaborated_predicates;
        let mut out: Vec<Predicate> = Vec::new();
        let mut seen: FxHashSet<Predicate> = FxHashSet::default();
        let mut stack: Vec<Predicate> = predicates.iter().rev().cloned().collect();

        while let Some(pred) = stack.pop() {
            self.cancel.check()?;
            if !seen.insert(pred.clone()) {
                continue;
            }
            if out.len() >= limit {
                debug!(limit, "predicate elaboration capped");
                break;
            }
            let derived = self.implied_predicates(&pred);
            out.push(pred);
            stack.extend(derived.into_iter().rev());
        }

        // `A: Bar<Item = B>` with `<A as Bar>::Item: Foo` also gives `B: Foo`.
        let equalities: Vec<(ProjectionTy, Type)> = out
            .iter()
            .filter_map(|pred| match pred {
                Predicate::Projection { projection, value } => Some((projection.clone(), value.clone())),
                Predicate::Implemented { .. } => None,
            })
            .collect();
        if !equalities.is_empty() {
            let mut rewriter = EqualityRewriter { equalities: &equalities };
            let rewritten: Vec<Predicate> = out
                .iter()
                .filter(|pred| matches!(pred, Predicate::Implemented { .. }))
                .map(|pred| pred.fold_with(&mut rewriter))
                .collect();
            for pred in rewritten {
                if seen.insert(pred.clone()) {
                    out.push(pred);
                }
            }
        }

        Ok(Arc::from(out))
    }

    /// Predicates implied by one predicate: the trait's supertraits and
    /// where clauses, and the bounds on its associated types.
    fn implied_predicates(&self, pred: &Predicate) -> Vec<Predicate> {
        let Predicate::Implemented { self_ty, trait_ref } = pred else {
            return Vec::new();
        };
        let Some(data) = self.db.trait_data(trait_ref.trait_id) else {
            return Vec::new();
        };
        let subst = data.subst_for(self_ty, trait_ref);
        let mut implied: Vec<Predicate> = data.predicates.iter().map(|p| p.subst(&subst)).collect();

        for item in &data.items {
            let Some(item) = self.db.assoc_item(*item) else { continue };
            if let AssocItemKind::Type { bounds, .. } = &item.kind {
                let projection = Type::projection(self_ty.clone(), trait_ref.clone(), item.id);
                for bound in bounds {
                    implied.push(Predicate::implemented(
                        projection.clone(),
                        subst.apply_trait_ref(bound, SubstMode::Keep),
                    ));
                }
            }
        }
        implied
    }
}

struct EqualityRewriter<'a> {
    equalities: &'a [(ProjectionTy, Type)],
}

impl TypeFolder for EqualityRewriter<'_> {
    fn fold_ty(&mut self, ty: &Type) -> Type {
        let folded = ty.super_fold_with(self);
        if let TypeKind::Projection(projection) = folded.kind() {
            let found = self.equalities.iter().find(|(eq, _)| {
                eq.item == projection.item
                    && eq.trait_ref.trait_id == projection.trait_ref.trait_id
                    && eq.base.is_equivalent_to(&projection.base)
                    && eq.trait_ref.args.len() == projection.trait_ref.args.len()
                    && eq
                        .trait_ref
                        .args
                        .iter()
                        .zip(&projection.trait_ref.args)
                        .all(|(a, b)| a.is_equivalent_to(b))
            });
            if let Some((_, value)) = found {
                return value.clone();
            }
        }
        folded
    }
}
