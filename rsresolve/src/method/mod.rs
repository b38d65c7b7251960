//! Method and associated item resolution.
//!
//! [`ResolveSession::resolve_method`] resolves `receiver.name(args)`:
//!
//! 1. Build the receiver's autoderef chain.
//! 2. At each step, in order, collect applicable candidates: inherent impl
//!    items first; only if there are none, trait candidates from where
//!    clauses, trait object bounds and impls of visible traits.
//! 3. The first step with a candidate decides. One candidate resolves.
//!    Several candidates of the same trait (impls differing in trait
//!    arguments) are filtered by the argument types; if that leaves more
//!    than one while inference variables are involved, the call is
//!    [deferred](Resolution::Deferred). Candidates of different traits are
//!    [ambiguous](Resolution::Ambiguous).
//!
//! A deferred call is retried once, through [`DeferredCall::retry`], after
//! the driver has inferred more types. The retry binds unconstrained
//! integer and float literals to `i32` / `f64` first (when
//! [`integer_fallback`](crate::config::ResolveConfig::integer_fallback) is
//! on) and never defers again. `DeferredCall` is consumed by `retry`, so a
//! second retry does not type-check.
//!
//! Paths (`<T as Tr>::f`, `T::f`, `Tr::f`, `S::Variant`) go through
//! [`ResolveSession::resolve_path`], associated types through
//! [`ResolveSession::resolve_assoc_type`], and fields through
//! [`ResolveSession::resolve_field`].

mod path;
mod probe;
#[cfg(test)]
mod tests;

use tracing::debug;

use crate::db::{AssocItemKind, SelfKind};
use crate::def::{DefId, ImplId, Name};
use crate::error::ResolveResult;
use crate::lookup::Adjustment;
use crate::scope::Scope;
use crate::session::ResolveSession;
use crate::subst::{SubstMode, Substitution};
use crate::ty::{TraitRef, Type};

pub use path::{FieldName, PathQualifier};

/// Where a resolved item comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CandidateSource {
    /// An item of an inherent impl.
    Inherent(ImplId),
    /// An item of a trait impl, or the trait's default if the impl does
    /// not override it.
    TraitImpl(ImplId),
    /// A trait item usable through an in-scope bound.
    WhereClause(TraitRef),
    /// A trait item called on a trait object.
    Object(TraitRef),
    /// A lang trait item whose impl is built in (`Clone` for tuples and
    /// derived types, `Deref` for references).
    Builtin(TraitRef),
    /// The trait's declaration, when no impl could be chosen.
    TraitDecl(TraitRef),
    /// An enum variant: `(enum, variant index)`.
    Variant(DefId, usize),
    /// A struct field: `(struct, field index)`.
    Field(DefId, usize),
}

impl CandidateSource {
    pub fn impl_id(&self) -> Option<ImplId> {
        match self {
            CandidateSource::Inherent(id) | CandidateSource::TraitImpl(id) => Some(*id),
            _ => None,
        }
    }

    pub fn is_inherent(&self) -> bool {
        matches!(self, CandidateSource::Inherent(_))
    }
}

/// A resolved item, viewed from the receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// The associated item, variant, or (for fields) struct.
    pub item: DefId,
    pub source: CandidateSource,
    /// Values for the generics of the impl and trait the item lives in.
    pub subst: Substitution,
    /// The trait the item belongs to, with its arguments.
    pub trait_ref: Option<TraitRef>,
    /// The type the item was found at, after the adjustments.
    pub receiver_ty: Type,
    pub adjustments: Vec<Adjustment>,
}

impl Candidate {
    /// Shorthand for [`ResolveSession::signature`].
    pub fn signature(&self, session: &mut ResolveSession<'_>, scope: &Scope) -> ResolveResult<Option<Signature>> {
        session.signature(self, scope)
    }

    /// Number of dereferences applied to the receiver.
    pub fn deref_count(&self) -> usize {
        self.adjustments
            .iter()
            .filter(|adj| !matches!(adj, Adjustment::Unsize))
            .count()
    }
}

/// An item's type as seen from a call site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    /// The declared receiver type (`Self`, `&Self`, `&mut Self`), if any.
    pub receiver: Option<Type>,
    pub params: Vec<Type>,
    pub ret: Type,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnresolvedReason {
    /// Nothing by that name applies.
    NoCandidates,
    /// The receiver (or path qualifier) type is unknown.
    UnknownReceiver,
    /// The autoderef chain looped before anything was found.
    CyclicDeref,
    /// The autoderef chain hit its step limit before anything was found.
    AutoderefLimit,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Resolution {
    Resolved(Candidate),
    /// Undecidable until more is inferred; retry once later.
    Deferred(DeferredCall),
    Ambiguous(Vec<Candidate>),
    Unresolved(UnresolvedReason),
}

impl Resolution {
    pub fn candidate(&self) -> Option<&Candidate> {
        match self {
            Resolution::Resolved(candidate) => Some(candidate),
            _ => None,
        }
    }

    pub fn into_candidate(self) -> Option<Candidate> {
        match self {
            Resolution::Resolved(candidate) => Some(candidate),
            _ => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved(_))
    }

    pub fn is_unresolved(&self) -> bool {
        matches!(self, Resolution::Unresolved(_))
    }
}

/// What a deferred call asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
enum CallRequest {
    Method { receiver: Type, name: Name },
    Path { qualifier: PathQualifier, name: Name },
}

/// A call whose resolution waits for more inference.
#[derive(Debug, PartialEq, Eq)]
pub struct DeferredCall {
    request: CallRequest,
    scope: Scope,
    candidates: Vec<Candidate>,
}

impl DeferredCall {
    /// The candidates still in the running when the call was deferred.
    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    /// Resolve the call again with the driver's current bindings and
    /// `arg_hints`. Never returns [`Resolution::Deferred`].
    pub fn retry(self, session: &mut ResolveSession<'_>, arg_hints: &[Type]) -> ResolveResult<Resolution> {
        debug!(request = ?self.request, "retrying deferred call");
        let fallback = session.config.integer_fallback;
        session.query(&self.scope, false, |s| {
            if fallback {
                s.unifier.fallback_literals();
            }
            let outcome = match &self.request {
                CallRequest::Method { receiver, name } => s.probe_method(receiver, *name, arg_hints)?,
                CallRequest::Path { qualifier, name } => s.probe_path(qualifier, *name, arg_hints)?,
            };
            // Deferral is off here; a tie that survives the retry is final.
            Ok(outcome.into_resolution(Resolution::Ambiguous))
        })
    }
}

/// Internal result of a probe, before a deferral is packaged with its
/// request.
#[derive(Debug)]
pub(crate) enum Outcome {
    Resolved(Candidate),
    Deferred(Vec<Candidate>),
    Ambiguous(Vec<Candidate>),
    Unresolved(UnresolvedReason),
}

impl Outcome {
    fn into_resolution(self, defer: impl FnOnce(Vec<Candidate>) -> Resolution) -> Resolution {
        match self {
            Outcome::Resolved(candidate) => Resolution::Resolved(candidate),
            Outcome::Deferred(candidates) => defer(candidates),
            Outcome::Ambiguous(candidates) => Resolution::Ambiguous(candidates),
            Outcome::Unresolved(reason) => Resolution::Unresolved(reason),
        }
    }
}

impl ResolveSession<'_> {
    /// Resolve the method call `receiver.name(args)`, where `arg_hints` are
    /// the argument types known so far (receiver excluded).
    pub fn resolve_method(
        &mut self,
        receiver: &Type,
        name: Name,
        arg_hints: &[Type],
        scope: &Scope,
    ) -> ResolveResult<Resolution> {
        debug!(%receiver, ?name, "resolve_method");
        let outcome = self.query(scope, true, |s| s.probe_method(receiver, name, arg_hints))?;
        let resolution = outcome.into_resolution(|candidates| {
            Resolution::Deferred(DeferredCall {
                request: CallRequest::Method {
                    receiver: receiver.clone(),
                    name,
                },
                scope: scope.clone(),
                candidates,
            })
        });
        debug!(?resolution, "resolve_method done");
        Ok(resolution)
    }

    /// Resolve a path such as `<T as Tr>::f`, `T::f`, `Tr::f` or
    /// `Enum::Variant`. `arg_hints` include the receiver argument for
    /// methods called as functions. No autoderef is applied.
    pub fn resolve_path(
        &mut self,
        qualifier: &PathQualifier,
        name: Name,
        arg_hints: &[Type],
        scope: &Scope,
    ) -> ResolveResult<Resolution> {
        debug!(?qualifier, ?name, "resolve_path");
        let outcome = self.query(scope, true, |s| s.probe_path(qualifier, name, arg_hints))?;
        Ok(outcome.into_resolution(|candidates| {
            Resolution::Deferred(DeferredCall {
                request: CallRequest::Path {
                    qualifier: qualifier.clone(),
                    name,
                },
                scope: scope.clone(),
                candidates,
            })
        }))
    }

    /// The type of a resolved item as seen through its substitution, with
    /// projections normalized in `scope`. The item's own generic parameters
    /// are left as parameters.
    pub fn signature(&mut self, candidate: &Candidate, scope: &Scope) -> ResolveResult<Option<Signature>> {
        self.query(scope, false, |s| {
            let signature = match &candidate.source {
                CandidateSource::Variant(adt, index) => s.variant_signature(*adt, *index, &candidate.subst),
                CandidateSource::Field(adt, index) => s.field_signature(*adt, *index, &candidate.subst),
                _ => s.item_signature(candidate),
            };
            let Some(signature) = signature else {
                return Ok(None);
            };
            let receiver = match &signature.receiver {
                Some(receiver) => Some(s.normalize_ty(receiver, 0)?),
                None => None,
            };
            let mut params = Vec::with_capacity(signature.params.len());
            for param in &signature.params {
                params.push(s.normalize_ty(param, 0)?);
            }
            let ret = s.normalize_ty(&signature.ret, 0)?;
            Ok(Some(Signature {
                receiver: receiver.map(|r| s.export(&r)),
                params: params.iter().map(|p| s.export(p)).collect(),
                ret: s.export(&ret),
            }))
        })
    }

    fn item_signature(&self, candidate: &Candidate) -> Option<Signature> {
        let item = self.db.assoc_item(candidate.item)?;
        let subst = &candidate.subst;
        match &item.kind {
            AssocItemKind::Fn(sig) => Some(Signature {
                receiver: receiver_type(sig.self_kind, &candidate.receiver_ty),
                params: sig.params.iter().map(|p| subst.apply(p, SubstMode::Keep)).collect(),
                ret: subst.apply(&sig.ret, SubstMode::Keep),
            }),
            AssocItemKind::Const { ty } => Some(Signature {
                receiver: None,
                params: Vec::new(),
                ret: subst.apply(ty, SubstMode::Keep),
            }),
            AssocItemKind::Type { .. } => None,
        }
    }

    fn variant_signature(&self, adt: DefId, index: usize, subst: &Substitution) -> Option<Signature> {
        let data = self.db.adt(adt)?;
        let variant = data.variants.get(index)?;
        let args = data
            .generics
            .params
            .iter()
            .map(|p| subst.get(*p).cloned().unwrap_or_else(Type::unknown))
            .collect();
        Some(Signature {
            receiver: None,
            params: variant
                .fields
                .iter()
                .map(|field| subst.apply(&field.ty, SubstMode::Keep))
                .collect(),
            ret: Type::adt(adt, args),
        })
    }

    fn field_signature(&self, adt: DefId, index: usize, subst: &Substitution) -> Option<Signature> {
        let data = self.db.adt(adt)?;
        let field = data.struct_fields().get(index)?;
        Some(Signature {
            receiver: None,
            params: Vec::new(),
            ret: subst.apply(&field.ty, SubstMode::Keep),
        })
    }
}

/// The type of the declared receiver parameter for `self_ty`.
pub(crate) fn receiver_type(self_kind: SelfKind, self_ty: &Type) -> Option<Type> {
    match self_kind {
        SelfKind::None => None,
        SelfKind::Value => Some(self_ty.clone()),
        SelfKind::Ref => Some(Type::reference(self_ty.clone(), false)),
        SelfKind::RefMut => Some(Type::reference(self_ty.clone(), true)),
    }
}
