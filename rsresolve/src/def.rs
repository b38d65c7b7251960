//! Identifiers for declarations seen by the resolver.
//!
//! The resolver never owns declarations. It refers to them through small
//! copyable ids handed out by a [`ResolveDatabase`](crate::db::ResolveDatabase):
//! - [`DefId`] - structs, enums, variants, traits, aliases and associated items
//! - [`ImplId`] - impl blocks, numbered in declaration order
//! - [`ParamId`] / [`ConstParamId`] - generic parameters
//! - [`TyVarId`] - inference variables owned by a [`Unifier`](crate::unify::Unifier)

use std::fmt;

/// Interned identifier text (item names, field names).
pub type Name = string_interner::DefaultSymbol;

/// A globally unique identifier for a declaration.
///
/// DefIds are assigned by the declaration database and are stable for one
/// database generation.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DefId {
    /// Database-local index for this declaration.
    pub index: u32,
}

impl DefId {
    /// Create a new DefId with the given index.
    pub const fn new(index: u32) -> Self {
        Self { index }
    }

    /// The index of this declaration.
    pub const fn index(self) -> u32 {
        self.index
    }
}

impl fmt::Debug for DefId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DefId({})", self.index)
    }
}

impl fmt::Display for DefId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "def{}", self.index)
    }
}

/// Identifier of an impl block.
///
/// The index doubles as the declaration order, so sorting by `ImplId`
/// gives the stable candidate order used for tie-breaking.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ImplId(pub u32);

impl ImplId {
    pub const fn new(index: u32) -> Self {
        ImplId(index)
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ImplId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ImplId({})", self.0)
    }
}

impl fmt::Display for ImplId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "impl{}", self.0)
    }
}

/// Identifier of a generic type parameter, including a trait's implicit `Self`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ParamId(pub u32);

impl ParamId {
    pub const fn new(id: u32) -> Self {
        ParamId(id)
    }
}

/// Identifier of a const generic parameter (`const N: usize`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConstParamId(pub u32);

impl ConstParamId {
    pub const fn new(id: u32) -> Self {
        ConstParamId(id)
    }
}

/// The unique identifier for an inference variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TyVarId(pub u32);

impl TyVarId {
    pub const fn new(id: u32) -> Self {
        TyVarId(id)
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Signed integer types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntTy {
    I8,
    I16,
    I32,
    I64,
    I128,
    Isize,
}

impl IntTy {
    pub const ALL: [IntTy; 6] = [IntTy::I8, IntTy::I16, IntTy::I32, IntTy::I64, IntTy::I128, IntTy::Isize];
}

impl fmt::Display for IntTy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IntTy::I8 => "i8",
            IntTy::I16 => "i16",
            IntTy::I32 => "i32",
            IntTy::I64 => "i64",
            IntTy::I128 => "i128",
            IntTy::Isize => "isize",
        };
        f.write_str(s)
    }
}

/// Unsigned integer types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UintTy {
    U8,
    U16,
    U32,
    U64,
    U128,
    Usize,
}

impl UintTy {
    pub const ALL: [UintTy; 6] = [UintTy::U8, UintTy::U16, UintTy::U32, UintTy::U64, UintTy::U128, UintTy::Usize];
}

impl fmt::Display for UintTy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UintTy::U8 => "u8",
            UintTy::U16 => "u16",
            UintTy::U32 => "u32",
            UintTy::U64 => "u64",
            UintTy::U128 => "u128",
            UintTy::Usize => "usize",
        };
        f.write_str(s)
    }
}

/// Floating-point types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatTy {
    F32,
    F64,
}

impl fmt::Display for FloatTy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FloatTy::F32 => f.write_str("f32"),
            FloatTy::F64 => f.write_str("f64"),
        }
    }
}

/// Traits the resolver gives built-in meaning to.
///
/// The database maps each of these to the trait declaration carrying the
/// corresponding `#[lang = ".."]` attribute, if one exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LangItem {
    Sized,
    Copy,
    Clone,
    Deref,
}

impl LangItem {
    pub const ALL: [LangItem; 4] = [LangItem::Sized, LangItem::Copy, LangItem::Clone, LangItem::Deref];

    /// The attribute value naming this item, e.g. `"deref"`.
    pub fn attr_name(self) -> &'static str {
        match self {
            LangItem::Sized => "sized",
            LangItem::Copy => "copy",
            LangItem::Clone => "clone",
            LangItem::Deref => "deref",
        }
    }

    pub fn from_attr_name(name: &str) -> Option<Self> {
        LangItem::ALL.into_iter().find(|item| item.attr_name() == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_def_id_display() {
        let id = DefId::new(42);
        assert_eq!(format!("{id}"), "def42");
        assert_eq!(format!("{id:?}"), "DefId(42)");
    }

    #[test]
    fn test_impl_ids_order_by_declaration() {
        let mut ids = vec![ImplId::new(3), ImplId::new(0), ImplId::new(2)];
        ids.sort();
        assert_eq!(ids, vec![ImplId::new(0), ImplId::new(2), ImplId::new(3)]);
    }

    #[test]
    fn test_lang_item_attr_round_trip() {
        for item in LangItem::ALL {
            assert_eq!(LangItem::from_attr_name(item.attr_name()), Some(item));
        }
        assert_eq!(LangItem::from_attr_name("drop"), None);
    }
}
