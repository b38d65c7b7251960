//! Type unification.
//!
//! The unifier owns the table of inference variables for one resolution
//! session and binds them while making two types equal.
//!
//! ```text
//! unify(?T, i32)          => ?T = i32
//! unify(?T, ?U)           => ?U = ?T     (larger id bound to the smaller)
//! unify({integer}, bool)  => false
//! unify(?T, Vec<?T>)      => ?T = Vec<?T> (no occurs check)
//! ```
//!
//! # Snapshots
//!
//! Speculative checks run inside a [`Snapshot`]. Every binding, kind change
//! and variable creation made while a snapshot is open goes to an undo log;
//! [`Unifier::rollback_to`] replays it backwards. Snapshots nest and must be
//! closed in LIFO order.
//!
//! # No occurs check
//!
//! Binding `?T` to a type that mentions `?T` is allowed, so a self-referential
//! binding such as `?T = S<?T>` is representable even though no value of that
//! type exists. Unification keeps a path of `(variable, other side)` pairs it
//! is currently expanding and treats a repeated pair as equal, so two cyclic
//! bindings unify in finite time. [`Unifier::resolve`] leaves the recursive
//! occurrence as the variable itself.

use tracing::trace;

use crate::def::TyVarId;
use crate::error::UnifyError;
use crate::ty::{ConstValue, InferKind, PrimitiveTy, Type, TypeFolder, TypeKind};

#[derive(Debug, Clone)]
struct VarSlot {
    kind: InferKind,
    binding: Option<Type>,
}

#[derive(Debug, Clone)]
enum UndoEntry {
    NewVar,
    Bind(TyVarId),
    SetKind(TyVarId, InferKind),
}

/// An open transaction on a [`Unifier`].
///
/// Consumed by [`Unifier::commit`] or [`Unifier::rollback_to`].
#[must_use = "a snapshot must be committed or rolled back"]
#[derive(Debug)]
pub struct Snapshot {
    undo_len: usize,
    var_len: usize,
    depth: usize,
}

impl Snapshot {
    /// Number of variables that existed when the snapshot was taken.
    ///
    /// Variables with an index at or above this were created inside it.
    pub fn var_len(&self) -> usize {
        self.var_len
    }
}

/// The unifier maintains inference variable bindings.
#[derive(Debug, Clone, Default)]
pub struct Unifier {
    vars: Vec<VarSlot>,
    undo_log: Vec<UndoEntry>,
    open_snapshots: usize,
}

impl Unifier {
    /// Create a new unifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fresh type variable.
    pub fn fresh_var(&mut self) -> Type {
        self.fresh_var_of(InferKind::Type)
    }

    /// Create a fresh variable for an unsuffixed integer literal.
    pub fn fresh_int_var(&mut self) -> Type {
        self.fresh_var_of(InferKind::Int)
    }

    /// Create a fresh variable for an unsuffixed float literal.
    pub fn fresh_float_var(&mut self) -> Type {
        self.fresh_var_of(InferKind::Float)
    }

    pub fn fresh_var_of(&mut self, kind: InferKind) -> Type {
        let id = TyVarId::new(self.vars.len() as u32);
        self.vars.push(VarSlot { kind, binding: None });
        if self.open_snapshots > 0 {
            self.undo_log.push(UndoEntry::NewVar);
        }
        Type::infer(id, kind)
    }

    /// Create multiple fresh type variables.
    pub fn fresh_vars(&mut self, count: usize) -> Vec<Type> {
        (0..count).map(|_| self.fresh_var()).collect()
    }

    pub fn num_vars(&self) -> usize {
        self.vars.len()
    }

    /// The current binding of `var`, if any.
    pub fn binding(&self, var: TyVarId) -> Option<&Type> {
        self.vars.get(var.index()).and_then(|slot| slot.binding.as_ref())
    }

    /// The current kind of `var`. Unknown ids report [`InferKind::Type`].
    pub fn var_kind(&self, var: TyVarId) -> InferKind {
        self.vars.get(var.index()).map_or(InferKind::Type, |slot| slot.kind)
    }

    // ========================================================================
    // Snapshots
    // ========================================================================

    pub fn start_snapshot(&mut self) -> Snapshot {
        self.open_snapshots += 1;
        Snapshot {
            undo_len: self.undo_log.len(),
            var_len: self.vars.len(),
            depth: self.open_snapshots,
        }
    }

    /// Undo everything recorded since `snapshot` was taken.
    pub fn rollback_to(&mut self, snapshot: Snapshot) {
        debug_assert_eq!(snapshot.depth, self.open_snapshots, "snapshots closed out of order");
        while self.undo_log.len() > snapshot.undo_len {
            match self.undo_log.pop() {
                Some(UndoEntry::NewVar) => {
                    self.vars.pop();
                }
                Some(UndoEntry::Bind(var)) => {
                    if let Some(slot) = self.vars.get_mut(var.index()) {
                        slot.binding = None;
                    }
                }
                Some(UndoEntry::SetKind(var, kind)) => {
                    if let Some(slot) = self.vars.get_mut(var.index()) {
                        slot.kind = kind;
                    }
                }
                None => break,
            }
        }
        self.close_snapshot();
    }

    /// Keep everything recorded since `snapshot` was taken.
    ///
    /// The entries stay in the undo log while an outer snapshot is open so
    /// the outer one can still roll them back.
    pub fn commit(&mut self, snapshot: Snapshot) {
        debug_assert_eq!(snapshot.depth, self.open_snapshots, "snapshots closed out of order");
        self.close_snapshot();
    }

    fn close_snapshot(&mut self) {
        self.open_snapshots = self.open_snapshots.saturating_sub(1);
        if self.open_snapshots == 0 {
            self.undo_log.clear();
        }
    }

    /// Run `f` and roll back whatever it did.
    pub fn probe<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        let snapshot = self.start_snapshot();
        let result = f(self);
        self.rollback_to(snapshot);
        result
    }

    /// Run `f`, keeping its bindings only if it returns true.
    pub fn commit_if(&mut self, f: impl FnOnce(&mut Self) -> bool) -> bool {
        let snapshot = self.start_snapshot();
        if f(self) {
            self.commit(snapshot);
            true
        } else {
            self.rollback_to(snapshot);
            false
        }
    }

    // ========================================================================
    // Unification
    // ========================================================================

    /// Try to make `a` and `b` equal by binding inference variables.
    ///
    /// On failure some bindings may already have been made; callers that
    /// need a clean failure run this inside a snapshot (see [`combine`](Self::combine)).
    pub fn unify(&mut self, a: &Type, b: &Type) -> bool {
        let mut expanding = Vec::new();
        let result = self.unify_inner(a, b, &mut expanding);
        trace!(%a, %b, result, "unify");
        result
    }

    /// Like [`unify`](Self::unify), but leaves no bindings behind on failure.
    pub fn combine(&mut self, a: &Type, b: &Type) -> Result<(), UnifyError> {
        if self.commit_if(|u| u.unify(a, b)) {
            Ok(())
        } else {
            Err(UnifyError::Mismatch {
                expected: self.resolve(a),
                found: self.resolve(b),
            })
        }
    }

    pub fn unify_all(&mut self, a: &[Type], b: &[Type]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| self.unify(x, y))
    }

    fn unify_inner(&mut self, a: &Type, b: &Type, expanding: &mut Vec<(TyVarId, Type)>) -> bool {
        if a == b {
            return true;
        }

        if let Some(var) = a.as_infer() {
            if let Some(bound) = self.binding(var.id).cloned() {
                return self.unify_through(var.id, &bound, b, expanding, false);
            }
        }
        if let Some(var) = b.as_infer() {
            if let Some(bound) = self.binding(var.id).cloned() {
                return self.unify_through(var.id, &bound, a, expanding, true);
            }
        }

        match (a.kind(), b.kind()) {
            (TypeKind::Unknown, _) | (_, TypeKind::Unknown) => true,
            (TypeKind::Infer(va), TypeKind::Infer(vb)) => self.unify_vars(va.id, vb.id),
            (TypeKind::Infer(var), _) => self.bind_checked(var.id, b),
            (_, TypeKind::Infer(var)) => self.bind_checked(var.id, a),

            (TypeKind::Primitive(p1), TypeKind::Primitive(p2)) => p1 == p2,

            (
                TypeKind::Adt { def_id: d1, args: a1, consts: c1 },
                TypeKind::Adt { def_id: d2, args: a2, consts: c2 },
            ) => {
                d1 == d2
                    && a1.len() == a2.len()
                    && c1.len() == c2.len()
                    && c1.iter().zip(c2).all(|(x, y)| unify_consts(x, y))
                    && a1.iter().zip(a2).all(|(x, y)| self.unify_inner(x, y, expanding))
            }

            (TypeKind::Param { id: p1, .. }, TypeKind::Param { id: p2, .. }) => p1 == p2,

            (
                TypeKind::Ref { inner: i1, mutable: m1 },
                TypeKind::Ref { inner: i2, mutable: m2 },
            )
            | (
                TypeKind::Ptr { inner: i1, mutable: m1 },
                TypeKind::Ptr { inner: i2, mutable: m2 },
            ) => m1 == m2 && self.unify_inner(i1, i2, expanding),

            (
                TypeKind::Array { element: e1, size: s1 },
                TypeKind::Array { element: e2, size: s2 },
            ) => unify_consts(s1, s2) && self.unify_inner(e1, e2, expanding),

            (TypeKind::Slice { element: e1 }, TypeKind::Slice { element: e2 }) => {
                self.unify_inner(e1, e2, expanding)
            }

            (TypeKind::Tuple(t1), TypeKind::Tuple(t2)) => {
                t1.len() == t2.len() && t1.iter().zip(t2).all(|(x, y)| self.unify_inner(x, y, expanding))
            }

            (TypeKind::Fn { params: p1, ret: r1 }, TypeKind::Fn { params: p2, ret: r2 }) => {
                p1.len() == p2.len()
                    && p1.iter().zip(p2).all(|(x, y)| self.unify_inner(x, y, expanding))
                    && self.unify_inner(r1, r2, expanding)
            }

            (TypeKind::DynTrait(b1), TypeKind::DynTrait(b2)) => {
                b1.len() == b2.len()
                    && b1.iter().zip(b2).all(|(x, y)| {
                        x.trait_id == y.trait_id
                            && x.args.len() == y.args.len()
                            && x.args.iter().zip(&y.args).all(|(s, t)| self.unify_inner(s, t, expanding))
                    })
            }

            (TypeKind::Projection(p1), TypeKind::Projection(p2)) => {
                p1.item == p2.item
                    && p1.trait_ref.trait_id == p2.trait_ref.trait_id
                    && p1.trait_ref.args.len() == p2.trait_ref.args.len()
                    && self.unify_inner(&p1.base, &p2.base, expanding)
                    && p1
                        .trait_ref
                        .args
                        .iter()
                        .zip(&p2.trait_ref.args)
                        .all(|(x, y)| self.unify_inner(x, y, expanding))
            }

            (TypeKind::Never, TypeKind::Never) => true,

            _ => false,
        }
    }

    /// Unify through the binding of `var`, cutting cycles of expansion.
    fn unify_through(
        &mut self,
        var: TyVarId,
        bound: &Type,
        other: &Type,
        expanding: &mut Vec<(TyVarId, Type)>,
        flipped: bool,
    ) -> bool {
        if expanding.iter().any(|(v, t)| *v == var && t == other) {
            return true;
        }
        expanding.push((var, other.clone()));
        let result = if flipped {
            self.unify_inner(other, bound, expanding)
        } else {
            self.unify_inner(bound, other, expanding)
        };
        expanding.pop();
        result
    }

    fn unify_vars(&mut self, a: TyVarId, b: TyVarId) -> bool {
        if a == b {
            return true;
        }
        let merged = match (self.var_kind(a), self.var_kind(b)) {
            (InferKind::Type, kind) | (kind, InferKind::Type) => kind,
            (InferKind::Int, InferKind::Int) => InferKind::Int,
            (InferKind::Float, InferKind::Float) => InferKind::Float,
            _ => return false,
        };
        let (root, child) = if a < b { (a, b) } else { (b, a) };
        self.set_kind(root, merged);
        self.bind(child, Type::infer(root, merged));
        true
    }

    fn bind_checked(&mut self, var: TyVarId, ty: &Type) -> bool {
        let accepts = match self.var_kind(var) {
            InferKind::Type => true,
            InferKind::Int => matches!(ty.kind(), TypeKind::Primitive(p) if p.is_integer()),
            InferKind::Float => matches!(ty.kind(), TypeKind::Primitive(PrimitiveTy::Float(_))),
        };
        if accepts {
            self.bind(var, ty.clone());
        }
        accepts
    }

    fn bind(&mut self, var: TyVarId, ty: Type) {
        if let Some(slot) = self.vars.get_mut(var.index()) {
            slot.binding = Some(ty);
            if self.open_snapshots > 0 {
                self.undo_log.push(UndoEntry::Bind(var));
            }
        }
    }

    fn set_kind(&mut self, var: TyVarId, kind: InferKind) {
        if let Some(slot) = self.vars.get_mut(var.index()) {
            if slot.kind != kind {
                if self.open_snapshots > 0 {
                    self.undo_log.push(UndoEntry::SetKind(var, slot.kind));
                }
                slot.kind = kind;
            }
        }
    }

    // ========================================================================
    // Resolution
    // ========================================================================

    /// Follow variable bindings at the top level only.
    pub fn shallow_resolve(&self, ty: &Type) -> Type {
        let mut current = ty.clone();
        while let Some(var) = current.as_infer() {
            match self.binding(var.id) {
                Some(bound) => current = bound.clone(),
                None => return Type::infer(var.id, self.var_kind(var.id)),
            }
        }
        current
    }

    /// Whether `ty` is an inference variable with no binding.
    pub fn is_unbound_var(&self, ty: &Type) -> bool {
        self.shallow_resolve(ty).as_infer().is_some()
    }

    /// Replace every bound variable in `ty` by its binding, recursively.
    ///
    /// A variable reached again through its own binding is left in place.
    pub fn resolve(&self, ty: &Type) -> Type {
        ty.fold_with(&mut Resolver {
            unifier: self,
            expanding: Vec::new(),
        })
    }

    /// Bind every unconstrained literal variable to its default type:
    /// `{integer}` to `i32` and `{float}` to `f64`.
    ///
    /// Returns the number of variables bound.
    pub fn fallback_literals(&mut self) -> usize {
        let mut bound = 0;
        for index in 0..self.vars.len() {
            let slot = &self.vars[index];
            if slot.binding.is_some() {
                continue;
            }
            let default = match slot.kind {
                InferKind::Int => Type::i32(),
                InferKind::Float => Type::f64(),
                InferKind::Type => continue,
            };
            self.bind(TyVarId::new(index as u32), default);
            bound += 1;
        }
        bound
    }
}

fn unify_consts(a: &ConstValue, b: &ConstValue) -> bool {
    match (a, b) {
        (ConstValue::Unknown, _) | (_, ConstValue::Unknown) => true,
        _ => a == b,
    }
}

struct Resolver<'a> {
    unifier: &'a Unifier,
    expanding: Vec<TyVarId>,
}

impl TypeFolder for Resolver<'_> {
    fn fold_ty(&mut self, ty: &Type) -> Type {
        let Some(var) = ty.as_infer() else {
            return ty.super_fold_with(self);
        };
        let kind = self.unifier.var_kind(var.id);
        if self.expanding.contains(&var.id) {
            return Type::infer(var.id, kind);
        }
        match self.unifier.binding(var.id) {
            Some(bound) => {
                self.expanding.push(var.id);
                let resolved = bound.fold_with(self);
                self.expanding.pop();
                resolved
            }
            None => Type::infer(var.id, kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::def::DefId;

    fn wrapper(inner: Type) -> Type {
        Type::adt(DefId::new(0), vec![inner])
    }

    #[test]
    fn test_unify_var_with_concrete() {
        let mut u = Unifier::new();
        let var = u.fresh_var();
        assert!(u.unify(&var, &Type::i32()));
        assert_eq!(u.resolve(&var), Type::i32());
        assert!(!u.unify(&var, &Type::bool()));
    }

    #[test]
    fn test_unify_two_vars_binds_larger_to_smaller() {
        let mut u = Unifier::new();
        let a = u.fresh_var();
        let b = u.fresh_var();
        assert!(u.unify(&b, &a));
        assert!(u.binding(TyVarId::new(0)).is_none());
        assert_eq!(u.binding(TyVarId::new(1)), Some(&Type::infer(TyVarId::new(0), InferKind::Type)));

        assert!(u.unify(&a, &Type::char()));
        assert_eq!(u.resolve(&b), Type::char());
    }

    #[test]
    fn test_int_var_only_accepts_integers() {
        let mut u = Unifier::new();
        let lit = u.fresh_int_var();
        assert!(!u.unify(&lit, &Type::bool()));
        assert!(!u.unify(&lit, &Type::f64()));
        assert!(u.unify(&lit, &Type::u8()));
        assert_eq!(u.resolve(&lit), Type::u8());
    }

    #[test]
    fn test_int_and_float_vars_do_not_unify() {
        let mut u = Unifier::new();
        let int = u.fresh_int_var();
        let float = u.fresh_float_var();
        assert!(!u.unify(&int, &float));
    }

    #[test]
    fn test_type_var_takes_literal_kind() {
        let mut u = Unifier::new();
        let plain = u.fresh_var();
        let lit = u.fresh_int_var();
        assert!(u.unify(&plain, &lit));
        assert_eq!(u.var_kind(TyVarId::new(0)), InferKind::Int);
        assert!(!u.unify(&plain, &Type::str()));
    }

    #[test]
    fn test_unknown_unifies_without_binding() {
        let mut u = Unifier::new();
        let var = u.fresh_var();
        assert!(u.unify(&Type::unknown(), &Type::i32()));
        assert!(u.unify(&var, &Type::unknown()));
        assert!(u.binding(TyVarId::new(0)).is_none());
    }

    #[test]
    fn test_structural_mismatch() {
        let mut u = Unifier::new();
        assert!(!u.unify(&Type::tuple(vec![Type::i32()]), &Type::tuple(vec![Type::i32(), Type::i32()])));
        assert!(!u.unify(&Type::reference(Type::i32(), true), &Type::shared_ref(Type::i32())));
        assert!(!u.unify(&Type::array(Type::u8(), 3), &Type::array(Type::u8(), 4)));
        assert!(!u.unify(&Type::never(), &Type::unit()));
    }

    #[test]
    fn test_rollback_discards_bindings_and_vars() {
        let mut u = Unifier::new();
        let outer = u.fresh_var();
        let snapshot = u.start_snapshot();
        let inner = u.fresh_var();
        assert!(u.unify(&outer, &wrapper(inner)));
        u.rollback_to(snapshot);
        assert_eq!(u.num_vars(), 1);
        assert!(u.binding(TyVarId::new(0)).is_none());
    }

    #[test]
    fn test_nested_commit_is_undone_by_outer_rollback() {
        let mut u = Unifier::new();
        let var = u.fresh_var();
        let outer = u.start_snapshot();
        let inner = u.start_snapshot();
        assert!(u.unify(&var, &Type::bool()));
        u.commit(inner);
        assert_eq!(u.resolve(&var), Type::bool());
        u.rollback_to(outer);
        assert!(u.is_unbound_var(&var));
    }

    #[test]
    fn test_combine_leaves_no_bindings_on_failure() {
        let mut u = Unifier::new();
        let var = u.fresh_var();
        let a = Type::tuple(vec![var.clone(), Type::i32()]);
        let b = Type::tuple(vec![Type::u8(), Type::bool()]);
        let err = u.combine(&a, &b).unwrap_err();
        assert!(matches!(err, UnifyError::Mismatch { .. }));
        assert!(u.is_unbound_var(&var));

        assert!(u.combine(&var, &Type::u8()).is_ok());
        assert_eq!(u.resolve(&var), Type::u8());
    }

    #[test]
    fn test_no_occurs_check() {
        let mut u = Unifier::new();
        let var = u.fresh_var();
        assert!(u.unify(&var, &wrapper(var.clone())));
        // The recursive occurrence stays a variable.
        assert_eq!(u.resolve(&var), wrapper(var.clone()));
    }

    #[test]
    fn test_cyclic_bindings_unify_in_finite_time() {
        let mut u = Unifier::new();
        let a = u.fresh_var();
        let b = u.fresh_var();
        assert!(u.unify(&a, &wrapper(a.clone())));
        assert!(u.unify(&b, &wrapper(wrapper(b.clone()))));
        assert!(u.unify(&a, &b));
        assert!(u.unify(&wrapper(a.clone()), &b));
    }

    #[test]
    fn test_fallback_literals() {
        let mut u = Unifier::new();
        let int = u.fresh_int_var();
        let float = u.fresh_float_var();
        let plain = u.fresh_var();
        let pinned = u.fresh_int_var();
        assert!(u.unify(&pinned, &Type::u8()));

        assert_eq!(u.fallback_literals(), 2);
        assert_eq!(u.resolve(&int), Type::i32());
        assert_eq!(u.resolve(&float), Type::f64());
        assert!(u.is_unbound_var(&plain));
        assert_eq!(u.resolve(&pinned), Type::u8());
    }
}
