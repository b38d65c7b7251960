//! Autoderef chains.

use rustc_hash::FxHashSet;
use tracing::debug;

use crate::def::{DefId, LangItem};
use crate::error::ResolveResult;
use crate::lookup::{Normalized, Selection};
use crate::scope::Scope;
use crate::session::ResolveSession;
use crate::ty::{ProjectionTy, TraitRef, Type, TypeKind};

/// One conversion applied to a method receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Adjustment {
    /// `*r` on a reference.
    BuiltinDeref,
    /// `*x` through `Deref::deref`.
    OverloadedDeref,
    /// `[T; N]` to `[T]`.
    Unsize,
}

/// A type in the chain, with the adjustments that reach it from the
/// receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoderefStep {
    pub ty: Type,
    pub adjustments: Vec<Adjustment>,
}

impl AutoderefStep {
    /// Number of dereferences applied.
    pub fn deref_count(&self) -> usize {
        self.adjustments
            .iter()
            .filter(|adj| !matches!(adj, Adjustment::Unsize))
            .count()
    }
}

/// Why an autoderef chain stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoderefEnd {
    /// The last type cannot be dereferenced.
    Exhausted,
    /// Dereferencing led back to a type already in the chain.
    Cycle,
    /// The chain reached `max_autoderef_steps`.
    Limit,
}

/// The types a receiver can be probed at: `T`, `*T`, `**T`, ..., plus a
/// final unsizing step for arrays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoderefChain {
    pub steps: Vec<AutoderefStep>,
    pub end: AutoderefEnd,
}

impl AutoderefChain {
    pub fn types(&self) -> impl Iterator<Item = &Type> + '_ {
        self.steps.iter().map(|step| &step.ty)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl ResolveSession<'_> {
    /// The autoderef chain of `ty` in `scope`.
    pub fn autoderef(&mut self, ty: &Type, scope: &Scope) -> ResolveResult<AutoderefChain> {
        self.query(scope, false, |s| {
            let chain = s.autoderef_chain(ty)?;
            Ok(AutoderefChain {
                steps: chain
                    .steps
                    .iter()
                    .map(|step| AutoderefStep {
                        ty: s.export(&step.ty),
                        adjustments: step.adjustments.clone(),
                    })
                    .collect(),
                end: chain.end,
            })
        })
    }

    pub(crate) fn autoderef_chain(&mut self, ty: &Type) -> ResolveResult<AutoderefChain> {
        let mut steps = Vec::new();
        let mut seen: FxHashSet<Type> = FxHashSet::default();
        let mut adjustments = Vec::new();
        let start = self.unifier.resolve(ty);
        let mut current = self.normalize_ty(&start, 0)?;

        let end = loop {
            self.cancel.check()?;
            if !seen.insert(current.strip_aliases()) {
                break AutoderefEnd::Cycle;
            }
            steps.push(AutoderefStep {
                ty: current.clone(),
                adjustments: adjustments.clone(),
            });
            let Some((next, adjustment)) = self.deref_step(&current)? else {
                break AutoderefEnd::Exhausted;
            };
            if steps.len() >= self.config.max_autoderef_steps {
                break AutoderefEnd::Limit;
            }
            self.stats.autoderef_steps += 1;
            adjustments.push(adjustment);
            current = self.unifier.resolve(&next);
        };

        if end == AutoderefEnd::Exhausted {
            if let Some(last) = steps.last() {
                if let TypeKind::Array { element, .. } = last.ty.kind() {
                    let mut unsize_adjustments = last.adjustments.clone();
                    unsize_adjustments.push(Adjustment::Unsize);
                    steps.push(AutoderefStep {
                        ty: Type::slice(element.clone()),
                        adjustments: unsize_adjustments,
                    });
                }
            }
        }

        debug!(ty = %start, steps = steps.len(), ?end, "autoderef");
        Ok(AutoderefChain { steps, end })
    }

    /// Dereference `ty` once, if possible.
    fn deref_step(&mut self, ty: &Type) -> ResolveResult<Option<(Type, Adjustment)>> {
        let ty = self.unifier.shallow_resolve(ty);
        if let Some(inner) = ty.builtin_deref() {
            return Ok(Some((inner.clone(), Adjustment::BuiltinDeref)));
        }
        match ty.kind() {
            TypeKind::Ptr { .. }
            | TypeKind::Primitive(_)
            | TypeKind::Infer(_)
            | TypeKind::Unknown
            | TypeKind::Never => return Ok(None),
            _ => {}
        }

        let Some(deref) = self.db.lang_item(LangItem::Deref) else {
            return Ok(None);
        };
        let Some(target) = self.deref_target(deref) else {
            return Ok(None);
        };
        let trait_ref = TraitRef::bare(deref);
        match self.select_inner(&ty, &trait_ref)? {
            Selection::Impl { .. } | Selection::WhereClause(_) | Selection::Object(_) => {}
            Selection::Builtin | Selection::Ambiguous | Selection::NoMatch => return Ok(None),
        }
        let projection = ProjectionTy::new(ty, trait_ref, target);
        match self.normalize_projection(&projection, 0)? {
            Normalized::Value(next) | Normalized::Rigid(next) => Ok(Some((next, Adjustment::OverloadedDeref))),
            Normalized::Ambiguous => Ok(None),
        }
    }

    fn deref_target(&self, deref: DefId) -> Option<DefId> {
        let data = self.db.trait_data(deref)?;
        data.items
            .iter()
            .copied()
            .find(|item| self.db.assoc_item(*item).is_some_and(|item| item.is_type()))
    }
}
