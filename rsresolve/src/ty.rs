//! Type representation for resolution.
//!
//! Types are immutable trees shared through `Arc`. A [`Type`] is never
//! mutated after construction; substitution, inference resolution and
//! projection normalization all produce new trees through [`TypeFolder`].
//!
//! # Type Structure
//!
//! - **Primitive types**: `i32`, `f64`, `bool`, `char`, `str`
//! - **Composite types**: tuples, arrays, slices
//! - **Nominal types**: structs, enums (referenced by DefId)
//! - **Function types**: `fn(A, B) -> C`
//! - **Reference types**: `&T`, `&mut T`, `*const T`, `*mut T`
//! - **Trait objects**: `dyn Trait<A> + Other`
//! - **Projections**: `<T as Trait<A>>::Item`
//! - **Inference variables**: `?T`, `{integer}`, `{float}`
//!
//! # Aliases
//!
//! A type reached through a `type` alias keeps an [`AliasRef`] annotation.
//! Structural equality (`==`) sees the annotation; [`Type::is_equivalent_to`]
//! does not.

use std::fmt;
use std::sync::Arc;

use crate::def::{ConstParamId, DefId, FloatTy, IntTy, ParamId, TyVarId, UintTy};

/// A const value that can appear in type positions (array sizes, const args).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConstValue {
    /// A concrete value.
    Known(u128),
    /// A const parameter (not yet substituted).
    Param(ConstParamId),
    /// A value the resolver could not compute. Unifies with anything.
    Unknown,
}

impl ConstValue {
    /// Check if this is an unsubstituted const parameter.
    pub fn is_param(&self) -> bool {
        matches!(self, ConstValue::Param(_))
    }
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstValue::Known(v) => write!(f, "{v}"),
            ConstValue::Param(id) => write!(f, "const_{}", id.0),
            ConstValue::Unknown => write!(f, "_"),
        }
    }
}

/// Primitive (built-in scalar) types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveTy {
    /// Signed integers: `i8`, `i16`, `i32`, `i64`, `i128`, `isize`
    Int(IntTy),
    /// Unsigned integers: `u8`, `u16`, `u32`, `u64`, `u128`, `usize`
    Uint(UintTy),
    /// Floating-point: `f32`, `f64`
    Float(FloatTy),
    /// Boolean: `bool`
    Bool,
    /// Character: `char`
    Char,
    /// String slice: `str`
    Str,
}

impl PrimitiveTy {
    pub fn is_integer(&self) -> bool {
        matches!(self, PrimitiveTy::Int(_) | PrimitiveTy::Uint(_))
    }

    pub fn is_float(&self) -> bool {
        matches!(self, PrimitiveTy::Float(_))
    }
}

impl fmt::Display for PrimitiveTy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrimitiveTy::Int(int_ty) => write!(f, "{int_ty}"),
            PrimitiveTy::Uint(uint_ty) => write!(f, "{uint_ty}"),
            PrimitiveTy::Float(float_ty) => write!(f, "{float_ty}"),
            PrimitiveTy::Bool => write!(f, "bool"),
            PrimitiveTy::Char => write!(f, "char"),
            PrimitiveTy::Str => write!(f, "str"),
        }
    }
}

/// What an inference variable may be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InferKind {
    /// Any type.
    Type,
    /// An integer type (from an unsuffixed integer literal).
    Int,
    /// A float type (from an unsuffixed float literal).
    Float,
}

/// An inference variable as it appears inside a type.
///
/// The kind is the one the variable was created with; the owning
/// [`Unifier`](crate::unify::Unifier) tracks the current kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InferVar {
    pub id: TyVarId,
    pub kind: InferKind,
}

/// A reference to a trait with its generic arguments.
///
/// `args` does not include `Self`; the self type is carried by whatever
/// holds the trait ref (a predicate, a projection, an impl).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TraitRef {
    pub trait_id: DefId,
    pub args: Vec<Type>,
}

impl TraitRef {
    pub fn new(trait_id: DefId, args: Vec<Type>) -> Self {
        Self { trait_id, args }
    }

    /// A trait ref with no generic arguments.
    pub fn bare(trait_id: DefId) -> Self {
        Self { trait_id, args: Vec::new() }
    }

    pub fn fold_with<F: TypeFolder + ?Sized>(&self, folder: &mut F) -> TraitRef {
        TraitRef {
            trait_id: self.trait_id,
            args: self.args.iter().map(|arg| arg.fold_with(folder)).collect(),
        }
    }
}

impl fmt::Display for TraitRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.trait_id)?;
        write_args(f, &self.args)
    }
}

/// An associated type accessed through a trait: `<base as Trait<A>>::item`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjectionTy {
    pub base: Type,
    pub trait_ref: TraitRef,
    /// The associated type declaration inside the trait.
    pub item: DefId,
}

impl ProjectionTy {
    pub fn new(base: Type, trait_ref: TraitRef, item: DefId) -> Self {
        Self { base, trait_ref, item }
    }

    pub fn fold_with<F: TypeFolder + ?Sized>(&self, folder: &mut F) -> ProjectionTy {
        ProjectionTy {
            base: self.base.fold_with(folder),
            trait_ref: self.trait_ref.fold_with(folder),
            item: self.item,
        }
    }
}

/// The alias a type was written through, e.g. `Alias<u8>` for
/// `type Alias<T> = Vec<T>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AliasRef {
    pub def_id: DefId,
    pub args: Vec<Type>,
}

/// A semantic type.
///
/// The `Arc` wrapper makes clones cheap; structurally equal types compare
/// equal regardless of sharing.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Type {
    pub kind: Arc<TypeKind>,
    pub alias: Option<Arc<AliasRef>>,
}

/// The kind of a type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// A primitive type: `i32`, `f64`, `bool`, etc.
    Primitive(PrimitiveTy),

    /// A struct or enum with its type and const arguments.
    Adt {
        def_id: DefId,
        args: Vec<Type>,
        consts: Vec<ConstValue>,
    },

    /// A generic type parameter. `is_self` marks a trait's implicit `Self`.
    Param { id: ParamId, is_self: bool },

    /// A reference type: `&T`, `&mut T`
    Ref { inner: Type, mutable: bool },

    /// A raw pointer type: `*const T`, `*mut T`
    Ptr { inner: Type, mutable: bool },

    /// An array type: `[T; N]`
    Array { element: Type, size: ConstValue },

    /// A slice type: `[T]`
    Slice { element: Type },

    /// A tuple type: `()`, `(T,)`, `(T, U)`
    Tuple(Vec<Type>),

    /// A function pointer type: `fn(A, B) -> C`
    Fn { params: Vec<Type>, ret: Type },

    /// A trait object: `dyn Trait + Other`. The first ref is the principal.
    DynTrait(Vec<TraitRef>),

    /// An associated type access: `<T as Trait>::Item`
    Projection(ProjectionTy),

    /// An inference variable.
    Infer(InferVar),

    /// A type that could not be determined. Unifies with everything.
    Unknown,

    /// The never type: `!`
    Never,
}

impl Type {
    /// Create a new type from a kind.
    pub fn new(kind: TypeKind) -> Self {
        Self {
            kind: Arc::new(kind),
            alias: None,
        }
    }

    /// Get the kind of this type.
    pub fn kind(&self) -> &TypeKind {
        &self.kind
    }

    /// The alias this type was written through, if any.
    pub fn alias(&self) -> Option<&AliasRef> {
        self.alias.as_deref()
    }

    /// Annotate this type as the expansion of `alias`.
    pub fn with_alias(mut self, alias: AliasRef) -> Self {
        self.alias = Some(Arc::new(alias));
        self
    }

    /// Drop the alias annotation from this type (not from its children).
    pub fn without_alias(mut self) -> Self {
        self.alias = None;
        self
    }

    /// Remove alias annotations at every level.
    pub fn strip_aliases(&self) -> Type {
        self.fold_with(&mut AliasStripper)
    }

    /// Equality modulo alias annotations.
    pub fn is_equivalent_to(&self, other: &Type) -> bool {
        self == other || self.strip_aliases() == other.strip_aliases()
    }

    pub fn is_unit(&self) -> bool {
        matches!(self.kind(), TypeKind::Tuple(elems) if elems.is_empty())
    }

    pub fn is_never(&self) -> bool {
        matches!(self.kind(), TypeKind::Never)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self.kind(), TypeKind::Unknown)
    }

    pub fn is_ref(&self) -> bool {
        matches!(self.kind(), TypeKind::Ref { .. })
    }

    /// A generic parameter or an unnormalized projection: types whose impls
    /// can only be known from where clauses.
    pub fn is_rigid_param(&self) -> bool {
        matches!(self.kind(), TypeKind::Param { .. } | TypeKind::Projection(_))
    }

    pub fn as_infer(&self) -> Option<InferVar> {
        match self.kind() {
            TypeKind::Infer(var) => Some(*var),
            _ => None,
        }
    }

    /// Check if this type contains generic parameters anywhere.
    pub fn has_params(&self) -> bool {
        self.walk()
            .any(|ty| matches!(ty.kind(), TypeKind::Param { .. }) || ty.has_const_params())
    }

    /// Check if this type contains inference variables anywhere.
    pub fn has_infer_vars(&self) -> bool {
        self.walk().any(|ty| matches!(ty.kind(), TypeKind::Infer(_)))
    }

    /// Check if this type contains `Unknown` anywhere.
    pub fn contains_unknown(&self) -> bool {
        self.walk().any(|ty| ty.is_unknown())
    }

    fn has_const_params(&self) -> bool {
        match self.kind() {
            TypeKind::Adt { consts, .. } => consts.iter().any(ConstValue::is_param),
            TypeKind::Array { size, .. } => size.is_param(),
            _ => false,
        }
    }

    /// The built-in dereference: `&T` and `&mut T` deref to `T`.
    ///
    /// Raw pointers are never auto-dereferenced.
    pub fn builtin_deref(&self) -> Option<&Type> {
        match self.kind() {
            TypeKind::Ref { inner, .. } => Some(inner),
            _ => None,
        }
    }

    /// Classify the outer type constructor, used to index impls.
    ///
    /// Returns `None` for types with no fixed constructor (parameters,
    /// projections, inference variables, `Unknown`).
    pub fn head(&self) -> Option<TypeHead> {
        let head = match self.kind() {
            TypeKind::Primitive(p) => TypeHead::Primitive(*p),
            TypeKind::Adt { def_id, .. } => TypeHead::Adt(*def_id),
            TypeKind::Ref { mutable, .. } => TypeHead::Ref { mutable: *mutable },
            TypeKind::Ptr { mutable, .. } => TypeHead::Ptr { mutable: *mutable },
            TypeKind::Array { .. } => TypeHead::Array,
            TypeKind::Slice { .. } => TypeHead::Slice,
            TypeKind::Tuple(elems) => TypeHead::Tuple(elems.len()),
            TypeKind::Fn { params, .. } => TypeHead::Fn(params.len()),
            TypeKind::DynTrait(bounds) => TypeHead::Dyn(bounds.first().map(|b| b.trait_id)),
            TypeKind::Never => TypeHead::Never,
            TypeKind::Param { .. } | TypeKind::Projection(_) | TypeKind::Infer(_) | TypeKind::Unknown => {
                return None
            }
        };
        Some(head)
    }

    /// Depth-first, pre-order traversal of this type and every type
    /// reachable through its immediate children.
    ///
    /// Each call starts a fresh walk.
    pub fn walk(&self) -> TypeWalker {
        TypeWalker { stack: vec![self.clone()] }
    }

    pub fn fold_with<F: TypeFolder + ?Sized>(&self, folder: &mut F) -> Type {
        folder.fold_ty(self)
    }

    /// Fold the children of this type, keeping its constructor.
    pub fn super_fold_with<F: TypeFolder + ?Sized>(&self, folder: &mut F) -> Type {
        let kind = match self.kind() {
            TypeKind::Adt { def_id, args, consts } => TypeKind::Adt {
                def_id: *def_id,
                args: args.iter().map(|arg| arg.fold_with(folder)).collect(),
                consts: consts.iter().map(|c| folder.fold_const(c)).collect(),
            },
            TypeKind::Ref { inner, mutable } => TypeKind::Ref {
                inner: inner.fold_with(folder),
                mutable: *mutable,
            },
            TypeKind::Ptr { inner, mutable } => TypeKind::Ptr {
                inner: inner.fold_with(folder),
                mutable: *mutable,
            },
            TypeKind::Array { element, size } => TypeKind::Array {
                element: element.fold_with(folder),
                size: folder.fold_const(size),
            },
            TypeKind::Slice { element } => TypeKind::Slice {
                element: element.fold_with(folder),
            },
            TypeKind::Tuple(elems) => TypeKind::Tuple(elems.iter().map(|e| e.fold_with(folder)).collect()),
            TypeKind::Fn { params, ret } => TypeKind::Fn {
                params: params.iter().map(|p| p.fold_with(folder)).collect(),
                ret: ret.fold_with(folder),
            },
            TypeKind::DynTrait(bounds) => {
                TypeKind::DynTrait(bounds.iter().map(|b| b.fold_with(folder)).collect())
            }
            TypeKind::Projection(projection) => TypeKind::Projection(projection.fold_with(folder)),
            TypeKind::Primitive(_)
            | TypeKind::Param { .. }
            | TypeKind::Infer(_)
            | TypeKind::Unknown
            | TypeKind::Never => return self.clone(),
        };
        let alias = self.alias.as_ref().map(|alias| {
            Arc::new(AliasRef {
                def_id: alias.def_id,
                args: alias.args.iter().map(|arg| arg.fold_with(folder)).collect(),
            })
        });
        Type {
            kind: Arc::new(kind),
            alias,
        }
    }

    // ========================================================================
    // Constructors
    // ========================================================================

    pub fn unit() -> Self {
        Self::new(TypeKind::Tuple(Vec::new()))
    }

    pub fn never() -> Self {
        Self::new(TypeKind::Never)
    }

    pub fn unknown() -> Self {
        Self::new(TypeKind::Unknown)
    }

    pub fn primitive(p: PrimitiveTy) -> Self {
        Self::new(TypeKind::Primitive(p))
    }

    pub fn bool() -> Self {
        Self::primitive(PrimitiveTy::Bool)
    }

    pub fn char() -> Self {
        Self::primitive(PrimitiveTy::Char)
    }

    pub fn str() -> Self {
        Self::primitive(PrimitiveTy::Str)
    }

    pub fn int(int_ty: IntTy) -> Self {
        Self::primitive(PrimitiveTy::Int(int_ty))
    }

    pub fn uint(uint_ty: UintTy) -> Self {
        Self::primitive(PrimitiveTy::Uint(uint_ty))
    }

    pub fn float(float_ty: FloatTy) -> Self {
        Self::primitive(PrimitiveTy::Float(float_ty))
    }

    pub fn i32() -> Self {
        Self::int(IntTy::I32)
    }

    pub fn u8() -> Self {
        Self::uint(UintTy::U8)
    }

    pub fn usize() -> Self {
        Self::uint(UintTy::Usize)
    }

    pub fn f64() -> Self {
        Self::float(FloatTy::F64)
    }

    pub fn adt(def_id: DefId, args: Vec<Type>) -> Self {
        Self::new(TypeKind::Adt {
            def_id,
            args,
            consts: Vec::new(),
        })
    }

    pub fn adt_with_consts(def_id: DefId, args: Vec<Type>, consts: Vec<ConstValue>) -> Self {
        Self::new(TypeKind::Adt { def_id, args, consts })
    }

    pub fn param(id: ParamId) -> Self {
        Self::new(TypeKind::Param { id, is_self: false })
    }

    pub fn self_param(id: ParamId) -> Self {
        Self::new(TypeKind::Param { id, is_self: true })
    }

    pub fn reference(inner: Type, mutable: bool) -> Self {
        Self::new(TypeKind::Ref { inner, mutable })
    }

    pub fn shared_ref(inner: Type) -> Self {
        Self::reference(inner, false)
    }

    pub fn ptr(inner: Type, mutable: bool) -> Self {
        Self::new(TypeKind::Ptr { inner, mutable })
    }

    pub fn array(element: Type, size: u128) -> Self {
        Self::new(TypeKind::Array {
            element,
            size: ConstValue::Known(size),
        })
    }

    pub fn array_with_size(element: Type, size: ConstValue) -> Self {
        Self::new(TypeKind::Array { element, size })
    }

    pub fn slice(element: Type) -> Self {
        Self::new(TypeKind::Slice { element })
    }

    pub fn tuple(elements: Vec<Type>) -> Self {
        Self::new(TypeKind::Tuple(elements))
    }

    pub fn function(params: Vec<Type>, ret: Type) -> Self {
        Self::new(TypeKind::Fn { params, ret })
    }

    pub fn dyn_trait(bounds: Vec<TraitRef>) -> Self {
        Self::new(TypeKind::DynTrait(bounds))
    }

    pub fn projection(base: Type, trait_ref: TraitRef, item: DefId) -> Self {
        Self::new(TypeKind::Projection(ProjectionTy::new(base, trait_ref, item)))
    }

    pub fn infer(id: TyVarId, kind: InferKind) -> Self {
        Self::new(TypeKind::Infer(InferVar { id, kind }))
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

fn write_args(f: &mut fmt::Formatter<'_>, args: &[Type]) -> fmt::Result {
    if args.is_empty() {
        return Ok(());
    }
    write!(f, "<")?;
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{arg}")?;
    }
    write!(f, ">")
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeKind::Primitive(p) => write!(f, "{p}"),
            TypeKind::Adt { def_id, args, consts } => {
                write!(f, "{def_id}")?;
                write_args(f, args)?;
                if !consts.is_empty() {
                    write!(f, "{{")?;
                    for (i, c) in consts.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{c}")?;
                    }
                    write!(f, "}}")?;
                }
                Ok(())
            }
            TypeKind::Param { is_self: true, .. } => write!(f, "Self"),
            TypeKind::Param { id, .. } => write!(f, "T{}", id.0),
            TypeKind::Ref { inner, mutable: false } => write!(f, "&{inner}"),
            TypeKind::Ref { inner, mutable: true } => write!(f, "&mut {inner}"),
            TypeKind::Ptr { inner, mutable: false } => write!(f, "*const {inner}"),
            TypeKind::Ptr { inner, mutable: true } => write!(f, "*mut {inner}"),
            TypeKind::Array { element, size } => write!(f, "[{element}; {size}]"),
            TypeKind::Slice { element } => write!(f, "[{element}]"),
            TypeKind::Tuple(elems) if elems.len() == 1 => write!(f, "({},)", elems[0]),
            TypeKind::Tuple(elems) => {
                write!(f, "(")?;
                for (i, ty) in elems.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{ty}")?;
                }
                write!(f, ")")
            }
            TypeKind::Fn { params, ret } => {
                write!(f, "fn(")?;
                for (i, param) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{param}")?;
                }
                write!(f, ") -> {ret}")
            }
            TypeKind::DynTrait(bounds) => {
                write!(f, "dyn ")?;
                for (i, bound) in bounds.iter().enumerate() {
                    if i > 0 {
                        write!(f, " + ")?;
                    }
                    write!(f, "{bound}")?;
                }
                Ok(())
            }
            TypeKind::Projection(p) => write!(f, "<{} as {}>::{}", p.base, p.trait_ref, p.item),
            TypeKind::Infer(InferVar { kind: InferKind::Int, .. }) => write!(f, "{{integer}}"),
            TypeKind::Infer(InferVar { kind: InferKind::Float, .. }) => write!(f, "{{float}}"),
            TypeKind::Infer(InferVar { id, .. }) => write!(f, "?{}", id.0),
            TypeKind::Unknown => write!(f, "{{unknown}}"),
            TypeKind::Never => write!(f, "!"),
        }
    }
}

/// The outer constructor of a type, used as an impl index key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeHead {
    Primitive(PrimitiveTy),
    Adt(DefId),
    Ref { mutable: bool },
    Ptr { mutable: bool },
    Array,
    Slice,
    Tuple(usize),
    Fn(usize),
    /// A trait object, keyed by its principal trait.
    Dyn(Option<DefId>),
    Never,
}

/// Iterator returned by [`Type::walk`].
pub struct TypeWalker {
    stack: Vec<Type>,
}

impl TypeWalker {
    fn push_children(&mut self, ty: &Type) {
        // Children are pushed in reverse so the first child is visited first.
        let start = self.stack.len();
        match ty.kind() {
            TypeKind::Adt { args, .. } => self.stack.extend(args.iter().cloned()),
            TypeKind::Ref { inner, .. } | TypeKind::Ptr { inner, .. } => self.stack.push(inner.clone()),
            TypeKind::Array { element, .. } | TypeKind::Slice { element } => self.stack.push(element.clone()),
            TypeKind::Tuple(elems) => self.stack.extend(elems.iter().cloned()),
            TypeKind::Fn { params, ret } => {
                self.stack.extend(params.iter().cloned());
                self.stack.push(ret.clone());
            }
            TypeKind::DynTrait(bounds) => {
                for bound in bounds {
                    self.stack.extend(bound.args.iter().cloned());
                }
            }
            TypeKind::Projection(p) => {
                self.stack.push(p.base.clone());
                self.stack.extend(p.trait_ref.args.iter().cloned());
            }
            TypeKind::Primitive(_)
            | TypeKind::Param { .. }
            | TypeKind::Infer(_)
            | TypeKind::Unknown
            | TypeKind::Never => {}
        }
        self.stack[start..].reverse();
    }
}

impl Iterator for TypeWalker {
    type Item = Type;

    fn next(&mut self) -> Option<Type> {
        let ty = self.stack.pop()?;
        self.push_children(&ty);
        Some(ty)
    }
}

/// A bottom-up rewrite over types.
///
/// Implementors override [`fold_ty`](TypeFolder::fold_ty) for the cases they
/// care about and call [`Type::super_fold_with`] to recurse.
pub trait TypeFolder {
    fn fold_ty(&mut self, ty: &Type) -> Type {
        ty.super_fold_with(self)
    }

    fn fold_const(&mut self, value: &ConstValue) -> ConstValue {
        value.clone()
    }
}

struct AliasStripper;

impl TypeFolder for AliasStripper {
    fn fold_ty(&mut self, ty: &Type) -> Type {
        ty.super_fold_with(self).without_alias()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adt(n: u32, args: Vec<Type>) -> Type {
        Type::adt(DefId::new(n), args)
    }

    #[test]
    fn test_walk_is_preorder() {
        let ty = adt(0, vec![Type::tuple(vec![Type::i32(), Type::bool()]), Type::u8()]);
        let walked: Vec<String> = ty.walk().map(|t| t.to_string()).collect();
        assert_eq!(walked, vec!["def0<(i32, bool), u8>", "(i32, bool)", "i32", "bool", "u8"]);
    }

    #[test]
    fn test_walk_visits_fn_params_before_return() {
        let ty = Type::function(vec![Type::i32(), Type::bool()], Type::u8());
        let walked: Vec<Type> = ty.walk().skip(1).collect();
        assert_eq!(walked, vec![Type::i32(), Type::bool(), Type::u8()]);
    }

    #[test]
    fn test_walk_projection_visits_base_and_trait_args() {
        let param = Type::param(ParamId::new(0));
        let tr = TraitRef::new(DefId::new(5), vec![Type::u8()]);
        let ty = Type::projection(param.clone(), tr, DefId::new(6));
        let walked: Vec<Type> = ty.walk().skip(1).collect();
        assert_eq!(walked, vec![param, Type::u8()]);
    }

    #[test]
    fn test_walk_is_restartable() {
        let ty = Type::shared_ref(Type::slice(Type::i32()));
        assert_eq!(ty.walk().count(), 3);
        assert_eq!(ty.walk().count(), 3);
    }

    #[test]
    fn test_has_params() {
        let param = Type::param(ParamId::new(1));
        assert!(adt(0, vec![param]).has_params());
        assert!(!adt(0, vec![Type::i32()]).has_params());
        let const_array = Type::array_with_size(Type::u8(), ConstValue::Param(ConstParamId::new(0)));
        assert!(const_array.has_params());
    }

    #[test]
    fn test_alias_equivalence() {
        let aliased = Type::i32().with_alias(AliasRef {
            def_id: DefId::new(9),
            args: Vec::new(),
        });
        assert_ne!(aliased, Type::i32());
        assert!(aliased.is_equivalent_to(&Type::i32()));

        let nested = Type::shared_ref(aliased);
        assert!(nested.is_equivalent_to(&Type::shared_ref(Type::i32())));
        assert!(!nested.is_equivalent_to(&Type::shared_ref(Type::u8())));
    }

    #[test]
    fn test_head() {
        assert_eq!(adt(3, vec![]).head(), Some(TypeHead::Adt(DefId::new(3))));
        assert_eq!(Type::shared_ref(Type::i32()).head(), Some(TypeHead::Ref { mutable: false }));
        assert_eq!(Type::param(ParamId::new(0)).head(), None);
        assert_eq!(Type::unknown().head(), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Type::unit().to_string(), "()");
        assert_eq!(Type::tuple(vec![Type::i32()]).to_string(), "(i32,)");
        assert_eq!(Type::array(Type::u8(), 4).to_string(), "[u8; 4]");
        assert_eq!(Type::reference(Type::str(), true).to_string(), "&mut str");
        assert_eq!(Type::infer(TyVarId::new(2), InferKind::Int).to_string(), "{integer}");
        assert_eq!(Type::infer(TyVarId::new(2), InferKind::Type).to_string(), "?2");
    }
}
