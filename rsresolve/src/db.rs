//! The declaration database the resolver reads from.
//!
//! The resolver does not index source code itself. Everything it knows
//! about structs, traits, impls and associated items comes through the
//! [`ResolveDatabase`] trait, which an embedder implements over its own
//! item index. [`MemoryDb`] is a complete in-memory implementation, built
//! with [`DbBuilder`], used by tests, benchmarks and small embedders.
//!
//! # Ordering
//!
//! Impl lists are always returned in declaration order (ascending
//! [`ImplId`]). Candidate tie-breaking depends on it.
//!
//! # Example
//!
//! ```rust
//! use rsresolve::db::{DbBuilder, ResolveDatabase, SelfKind};
//! use rsresolve::ty::Type;
//!
//! let mut b = DbBuilder::with_core();
//! let foo = b.struct_("Foo").finish();
//! let foo_ty = Type::adt(foo, vec![]);
//! b.impl_(foo_ty).method("bar", SelfKind::Ref, vec![], Type::unit()).finish();
//! let db = b.finish();
//! assert!(db.lookup_name("bar").is_some());
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use string_interner::DefaultStringInterner;
use tracing::debug;

use crate::def::{ConstParamId, DefId, ImplId, LangItem, Name, ParamId};
use crate::subst::{SubstMode, Substitution};
use crate::ty::{AliasRef, ConstValue, ProjectionTy, TraitRef, Type, TypeFolder, TypeHead, TypeKind};

// ============================================================================
// Declaration data
// ============================================================================

/// Generic parameters declared on an item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Generics {
    pub params: Vec<ParamId>,
    pub consts: Vec<ConstParamId>,
}

impl Generics {
    pub fn new(params: Vec<ParamId>) -> Self {
        Self {
            params,
            consts: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty() && self.consts.is_empty()
    }

    /// The parameters as types, in declaration order.
    pub fn param_types(&self) -> Vec<Type> {
        self.params.iter().map(|p| Type::param(*p)).collect()
    }

    /// Substitution mapping these generics to `args` / `consts` positionally.
    pub fn subst(&self, args: &[Type], consts: &[ConstValue]) -> Substitution {
        let mut subst = Substitution::from_pairs(&self.params, args);
        for (param, value) in self.consts.iter().zip(consts) {
            subst.insert_const(*param, value.clone());
        }
        subst
    }
}

/// A generic type parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamData {
    pub id: ParamId,
    pub name: Name,
    /// False when declared `?Sized`, and for a trait's `Self`.
    pub sized: bool,
    pub is_self: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdtKind {
    Struct,
    Enum,
}

/// A struct field or enum variant field. `name` is `None` for tuple fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldData {
    pub name: Option<Name>,
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantData {
    pub id: DefId,
    pub name: Name,
    pub fields: Vec<FieldData>,
}

/// A struct or enum. A struct has exactly one variant sharing its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdtData {
    pub id: DefId,
    pub name: Name,
    pub kind: AdtKind,
    pub generics: Generics,
    pub variants: Vec<VariantData>,
    /// Built-in traits listed in `#[derive(..)]`.
    pub derives: Vec<LangItem>,
}

impl AdtData {
    pub fn derives(&self, item: LangItem) -> bool {
        self.derives.contains(&item)
    }

    /// Fields of a struct; empty for enums.
    pub fn struct_fields(&self) -> &[FieldData] {
        match (self.kind, self.variants.first()) {
            (AdtKind::Struct, Some(variant)) => &variant.fields,
            _ => &[],
        }
    }

    pub fn variant_named(&self, name: Name) -> Option<(usize, &VariantData)> {
        if self.kind != AdtKind::Enum {
            return None;
        }
        self.variants.iter().enumerate().find(|(_, v)| v.name == name)
    }
}

/// A where-clause or bound.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Predicate {
    /// `self_ty: Trait<Args>`
    Implemented { self_ty: Type, trait_ref: TraitRef },
    /// `<Base as Trait<Args>>::Item == value`, written `Base: Trait<Item = value>`.
    Projection { projection: ProjectionTy, value: Type },
}

impl Predicate {
    pub fn implemented(self_ty: Type, trait_ref: TraitRef) -> Self {
        Predicate::Implemented { self_ty, trait_ref }
    }

    pub fn projection(projection: ProjectionTy, value: Type) -> Self {
        Predicate::Projection { projection, value }
    }

    pub fn trait_id(&self) -> DefId {
        match self {
            Predicate::Implemented { trait_ref, .. } => trait_ref.trait_id,
            Predicate::Projection { projection, .. } => projection.trait_ref.trait_id,
        }
    }

    pub fn fold_with<F: TypeFolder + ?Sized>(&self, folder: &mut F) -> Predicate {
        match self {
            Predicate::Implemented { self_ty, trait_ref } => Predicate::Implemented {
                self_ty: self_ty.fold_with(folder),
                trait_ref: trait_ref.fold_with(folder),
            },
            Predicate::Projection { projection, value } => Predicate::Projection {
                projection: projection.fold_with(folder),
                value: value.fold_with(folder),
            },
        }
    }

    pub fn subst(&self, subst: &Substitution) -> Predicate {
        match self {
            Predicate::Implemented { self_ty, trait_ref } => Predicate::Implemented {
                self_ty: subst.apply(self_ty, SubstMode::Keep),
                trait_ref: subst.apply_trait_ref(trait_ref, SubstMode::Keep),
            },
            Predicate::Projection { projection, value } => Predicate::Projection {
                projection: subst.apply_projection(projection, SubstMode::Keep),
                value: subst.apply(value, SubstMode::Keep),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraitData {
    pub id: DefId,
    pub name: Name,
    /// Generic parameters, not including `Self`.
    pub generics: Generics,
    pub self_param: ParamId,
    /// Supertraits (`Self: Super`) and where clauses.
    pub predicates: Vec<Predicate>,
    pub items: Vec<DefId>,
}

impl TraitData {
    pub fn self_ty(&self) -> Type {
        Type::self_param(self.self_param)
    }

    /// `Trait<P1, .., Pn>` over the trait's own parameters.
    pub fn identity_ref(&self) -> TraitRef {
        TraitRef::new(self.id, self.generics.param_types())
    }

    /// Substitution viewing this trait's items from `self_ty: trait_ref`.
    pub fn subst_for(&self, self_ty: &Type, trait_ref: &TraitRef) -> Substitution {
        let mut subst = Substitution::from_pairs(&self.generics.params, &trait_ref.args);
        subst.insert(self.self_param, self_ty.clone());
        subst
    }

    /// Supertrait refs, still expressed over `Self`.
    pub fn supertraits(&self) -> impl Iterator<Item = &TraitRef> + '_ {
        let self_param = self.self_param;
        self.predicates.iter().filter_map(move |pred| match pred {
            Predicate::Implemented { self_ty, trait_ref } => match self_ty.kind() {
                TypeKind::Param { id, .. } if *id == self_param => Some(trait_ref),
                _ => None,
            },
            Predicate::Projection { .. } => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImplData {
    pub id: ImplId,
    pub generics: Generics,
    pub self_ty: Type,
    /// `None` for inherent impls.
    pub trait_ref: Option<TraitRef>,
    pub predicates: Vec<Predicate>,
    pub items: Vec<DefId>,
}

impl ImplData {
    pub fn is_inherent(&self) -> bool {
        self.trait_ref.is_none()
    }

    /// An impl for a bare type parameter: `impl<T> Trait for T`.
    pub fn is_blanket(&self) -> bool {
        self.self_ty.head().is_none()
    }
}

/// Where an associated item is declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Container {
    Trait(DefId),
    Impl(ImplId),
}

/// How a method takes its receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelfKind {
    /// An associated function with no receiver.
    None,
    /// `self`
    Value,
    /// `&self`
    Ref,
    /// `&mut self`
    RefMut,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FnSig {
    /// The method's own generic parameters.
    pub generics: Generics,
    pub self_kind: SelfKind,
    /// Parameters after the receiver.
    pub params: Vec<Type>,
    pub ret: Type,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssocItemKind {
    Fn(FnSig),
    Const { ty: Type },
    /// In a trait: `type Item: Bounds;` (`sized` false for `?Sized`),
    /// optionally with a default. In an impl: `type Item = value;`.
    Type {
        bounds: Vec<TraitRef>,
        sized: bool,
        value: Option<Type>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssocItem {
    pub id: DefId,
    pub name: Name,
    pub container: Container,
    pub kind: AssocItemKind,
}

impl AssocItem {
    /// A function taking `self` in some form.
    pub fn is_method(&self) -> bool {
        matches!(&self.kind, AssocItemKind::Fn(sig) if sig.self_kind != SelfKind::None)
    }

    pub fn is_type(&self) -> bool {
        matches!(self.kind, AssocItemKind::Type { .. })
    }

    pub fn fn_sig(&self) -> Option<&FnSig> {
        match &self.kind {
            AssocItemKind::Fn(sig) => Some(sig),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasData {
    pub id: DefId,
    pub name: Name,
    pub generics: Generics,
    pub aliased: Type,
}

// ============================================================================
// Database trait
// ============================================================================

/// Read-only access to declarations.
///
/// Implementations must be safe to share between threads; every method
/// takes `&self`. Missing ids return `None` or an empty list, never panic.
pub trait ResolveDatabase: Send + Sync {
    fn adt(&self, id: DefId) -> Option<Arc<AdtData>>;
    fn trait_data(&self, id: DefId) -> Option<Arc<TraitData>>;
    fn impl_data(&self, id: ImplId) -> Option<Arc<ImplData>>;
    fn assoc_item(&self, id: DefId) -> Option<Arc<AssocItem>>;
    fn alias(&self, id: DefId) -> Option<Arc<AliasData>>;
    fn param(&self, id: ParamId) -> Option<Arc<ParamData>>;

    /// Non-blanket impls (inherent and trait) whose self type has `head`.
    fn impls_for_head(&self, head: TypeHead) -> Arc<[ImplId]>;
    /// Impls whose self type is a bare parameter or projection.
    fn blanket_impls(&self) -> Arc<[ImplId]>;
    /// All impls of a trait.
    fn impls_of_trait(&self, trait_id: DefId) -> Arc<[ImplId]>;
    /// Traits declaring an associated item called `name`.
    fn traits_with_item(&self, name: Name) -> Arc<[DefId]>;

    fn lang_item(&self, item: LangItem) -> Option<DefId>;

    fn lookup_name(&self, text: &str) -> Option<Name>;
    fn name_text(&self, name: Name) -> Option<&str>;

    /// Expand `Alias<args>` to the aliased type, annotated with the alias.
    fn expand_alias(&self, id: DefId, args: Vec<Type>) -> Option<Type> {
        let alias = self.alias(id)?;
        let subst = alias.generics.subst(&args, &[]);
        let expanded = subst.apply(&alias.aliased, SubstMode::Unknown);
        Some(expanded.with_alias(AliasRef { def_id: id, args }))
    }
}

// ============================================================================
// In-memory database
// ============================================================================

/// Impl lookup tables derived from the declaration set.
#[derive(Debug)]
struct ImplIndex {
    generation: u64,
    by_head: FxHashMap<TypeHead, Arc<[ImplId]>>,
    blanket: Arc<[ImplId]>,
    by_trait: FxHashMap<DefId, Arc<[ImplId]>>,
    traits_by_item: FxHashMap<Name, Arc<[DefId]>>,
}

/// A [`ResolveDatabase`] holding every declaration in memory.
///
/// Impl indices are derived lazily on first use and cached. [`invalidate`]
/// (or any edit through [`DbBuilder::from_db`]) bumps the generation, and
/// the next query rebuilds them.
///
/// [`invalidate`]: MemoryDb::invalidate
#[derive(Debug)]
pub struct MemoryDb {
    interner: DefaultStringInterner,
    adts: FxHashMap<DefId, Arc<AdtData>>,
    traits: FxHashMap<DefId, Arc<TraitData>>,
    impls: Vec<Arc<ImplData>>,
    assoc_items: FxHashMap<DefId, Arc<AssocItem>>,
    aliases: FxHashMap<DefId, Arc<AliasData>>,
    params: FxHashMap<ParamId, Arc<ParamData>>,
    lang_items: FxHashMap<LangItem, DefId>,
    counters: Counters,
    generation: AtomicU64,
    index: RwLock<Option<Arc<ImplIndex>>>,
}

#[derive(Debug, Clone, Copy, Default)]
struct Counters {
    next_def: u32,
    next_param: u32,
    next_const: u32,
}

impl MemoryDb {
    /// The current declaration generation.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Drop cached indices; they are rebuilt on next use.
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        *self.index.write() = None;
    }

    /// Find an associated item by name in a trait or impl.
    pub fn item_named(&self, container: Container, name: &str) -> Option<DefId> {
        let name = self.interner.get(name)?;
        let items = match container {
            Container::Trait(id) => &self.traits.get(&id)?.items,
            Container::Impl(id) => &self.impls.get(id.index())?.items,
        };
        items
            .iter()
            .copied()
            .find(|item| self.assoc_items.get(item).is_some_and(|data| data.name == name))
    }

    pub fn impl_count(&self) -> usize {
        self.impls.len()
    }

    fn index(&self) -> Arc<ImplIndex> {
        let generation = self.generation();
        if let Some(index) = self.index.read().as_ref() {
            if index.generation == generation {
                return Arc::clone(index);
            }
        }
        let mut slot = self.index.write();
        if let Some(index) = slot.as_ref() {
            if index.generation == generation {
                return Arc::clone(index);
            }
        }
        let index = Arc::new(self.build_index(generation));
        *slot = Some(Arc::clone(&index));
        index
    }

    fn build_index(&self, generation: u64) -> ImplIndex {
        let mut by_head: FxHashMap<TypeHead, Vec<ImplId>> = FxHashMap::default();
        let mut blanket = Vec::new();
        let mut by_trait: FxHashMap<DefId, Vec<ImplId>> = FxHashMap::default();

        for data in &self.impls {
            match data.self_ty.head() {
                Some(head) => by_head.entry(head).or_default().push(data.id),
                None => blanket.push(data.id),
            }
            if let Some(trait_ref) = &data.trait_ref {
                by_trait.entry(trait_ref.trait_id).or_default().push(data.id);
            }
        }

        let mut traits_by_item: FxHashMap<Name, Vec<DefId>> = FxHashMap::default();
        let mut trait_ids: Vec<DefId> = self.traits.keys().copied().collect();
        trait_ids.sort();
        for trait_id in trait_ids {
            let Some(data) = self.traits.get(&trait_id) else { continue };
            for item in &data.items {
                if let Some(item) = self.assoc_items.get(item) {
                    let traits = traits_by_item.entry(item.name).or_default();
                    if !traits.contains(&trait_id) {
                        traits.push(trait_id);
                    }
                }
            }
        }

        debug!(generation, impls = self.impls.len(), "built impl index");
        ImplIndex {
            generation,
            by_head: by_head.into_iter().map(|(k, v)| (k, Arc::from(v))).collect(),
            blanket: Arc::from(blanket),
            by_trait: by_trait.into_iter().map(|(k, v)| (k, Arc::from(v))).collect(),
            traits_by_item: traits_by_item.into_iter().map(|(k, v)| (k, Arc::from(v))).collect(),
        }
    }
}

fn empty<T>() -> Arc<[T]> {
    Arc::from(Vec::new())
}

impl ResolveDatabase for MemoryDb {
    fn adt(&self, id: DefId) -> Option<Arc<AdtData>> {
        self.adts.get(&id).cloned()
    }

    fn trait_data(&self, id: DefId) -> Option<Arc<TraitData>> {
        self.traits.get(&id).cloned()
    }

    fn impl_data(&self, id: ImplId) -> Option<Arc<ImplData>> {
        self.impls.get(id.index()).cloned()
    }

    fn assoc_item(&self, id: DefId) -> Option<Arc<AssocItem>> {
        self.assoc_items.get(&id).cloned()
    }

    fn alias(&self, id: DefId) -> Option<Arc<AliasData>> {
        self.aliases.get(&id).cloned()
    }

    fn param(&self, id: ParamId) -> Option<Arc<ParamData>> {
        self.params.get(&id).cloned()
    }

    fn impls_for_head(&self, head: TypeHead) -> Arc<[ImplId]> {
        self.index().by_head.get(&head).cloned().unwrap_or_else(empty)
    }

    fn blanket_impls(&self) -> Arc<[ImplId]> {
        Arc::clone(&self.index().blanket)
    }

    fn impls_of_trait(&self, trait_id: DefId) -> Arc<[ImplId]> {
        self.index().by_trait.get(&trait_id).cloned().unwrap_or_else(empty)
    }

    fn traits_with_item(&self, name: Name) -> Arc<[DefId]> {
        self.index().traits_by_item.get(&name).cloned().unwrap_or_else(empty)
    }

    fn lang_item(&self, item: LangItem) -> Option<DefId> {
        self.lang_items.get(&item).copied()
    }

    fn lookup_name(&self, text: &str) -> Option<Name> {
        self.interner.get(text)
    }

    fn name_text(&self, name: Name) -> Option<&str> {
        self.interner.resolve(name)
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Assembles a [`MemoryDb`].
///
/// Ids are allocated as items are declared, so an item's id is known
/// before its builder finishes (see `id()` on each builder) and can be
/// used in self-referential field types.
#[derive(Debug, Default)]
pub struct DbBuilder {
    interner: DefaultStringInterner,
    adts: FxHashMap<DefId, Arc<AdtData>>,
    traits: FxHashMap<DefId, Arc<TraitData>>,
    impls: Vec<Arc<ImplData>>,
    assoc_items: FxHashMap<DefId, Arc<AssocItem>>,
    aliases: FxHashMap<DefId, Arc<AliasData>>,
    params: FxHashMap<ParamId, Arc<ParamData>>,
    lang_items: FxHashMap<LangItem, DefId>,
    forward_traits: FxHashMap<Name, DefId>,
    counters: Counters,
    generation: u64,
}

impl DbBuilder {
    /// An empty builder with no lang items.
    pub fn new() -> Self {
        Self::default()
    }

    /// A builder pre-populated with the lang traits the resolver knows:
    ///
    /// ```text
    /// #[lang = "sized"] trait Sized {}
    /// #[lang = "clone"] trait Clone: Sized { fn clone(&self) -> Self; }
    /// #[lang = "copy"]  trait Copy: Clone {}
    /// #[lang = "deref"] trait Deref { type Target: ?Sized; fn deref(&self) -> &Self::Target; }
    /// ```
    pub fn with_core() -> Self {
        let mut b = Self::new();

        let sized = b.trait_("Sized").lang(LangItem::Sized).finish();

        let clone = b.trait_("Clone").lang(LangItem::Clone);
        let clone_self = clone.self_ty();
        let clone = clone
            .supertrait(TraitRef::bare(sized))
            .method("clone", SelfKind::Ref, vec![], clone_self)
            .finish();

        b.trait_("Copy").lang(LangItem::Copy).supertrait(TraitRef::bare(clone)).finish();

        let deref = b.trait_("Deref").lang(LangItem::Deref).assoc_type_with("Target", vec![], false);
        let target = deref.projection("Target");
        deref.method("deref", SelfKind::Ref, vec![], Type::shared_ref(target)).finish();

        b
    }

    /// Reopen a database for editing. The result has a newer generation.
    pub fn from_db(db: MemoryDb) -> Self {
        let generation = db.generation() + 1;
        Self {
            interner: db.interner,
            adts: db.adts,
            traits: db.traits,
            impls: db.impls,
            assoc_items: db.assoc_items,
            aliases: db.aliases,
            params: db.params,
            lang_items: db.lang_items,
            forward_traits: FxHashMap::default(),
            counters: db.counters,
            generation,
        }
    }

    pub fn finish(self) -> MemoryDb {
        MemoryDb {
            interner: self.interner,
            adts: self.adts,
            traits: self.traits,
            impls: self.impls,
            assoc_items: self.assoc_items,
            aliases: self.aliases,
            params: self.params,
            lang_items: self.lang_items,
            counters: self.counters,
            generation: AtomicU64::new(self.generation),
            index: RwLock::new(None),
        }
    }

    pub fn intern(&mut self, text: &str) -> Name {
        self.interner.get_or_intern(text)
    }

    pub fn lang_item(&self, item: LangItem) -> Option<DefId> {
        self.lang_items.get(&item).copied()
    }

    /// The trait ref for a lang trait with no arguments.
    ///
    /// # Panics
    ///
    /// Panics if the builder was not created with [`DbBuilder::with_core`].
    pub fn lang_trait(&self, item: LangItem) -> TraitRef {
        match self.lang_item(item) {
            Some(id) => TraitRef::bare(id),
            None => panic!("lang item {item:?} not declared"),
        }
    }

    fn next_def(&mut self) -> DefId {
        let id = DefId::new(self.counters.next_def);
        self.counters.next_def += 1;
        id
    }

    /// Declare a sized generic type parameter.
    pub fn param(&mut self, name: &str) -> ParamId {
        self.new_param(name, true, false)
    }

    /// Declare a `?Sized` generic type parameter.
    pub fn unsized_param(&mut self, name: &str) -> ParamId {
        self.new_param(name, false, false)
    }

    pub fn const_param(&mut self) -> ConstParamId {
        let id = ConstParamId::new(self.counters.next_const);
        self.counters.next_const += 1;
        id
    }

    fn new_param(&mut self, name: &str, sized: bool, is_self: bool) -> ParamId {
        let id = ParamId::new(self.counters.next_param);
        self.counters.next_param += 1;
        let name = self.intern(name);
        self.params.insert(
            id,
            Arc::new(ParamData {
                id,
                name,
                sized,
                is_self,
            }),
        );
        id
    }

    pub fn struct_(&mut self, name: &str) -> AdtBuilder<'_> {
        AdtBuilder::new(self, name, AdtKind::Struct)
    }

    pub fn enum_(&mut self, name: &str) -> AdtBuilder<'_> {
        AdtBuilder::new(self, name, AdtKind::Enum)
    }

    pub fn trait_(&mut self, name: &str) -> TraitBuilder<'_> {
        TraitBuilder::new(self, name)
    }

    /// Reserve the id of a trait declared later with [`trait_`](Self::trait_),
    /// for mutually referencing traits.
    pub fn declare_trait(&mut self, name: &str) -> DefId {
        let name = self.intern(name);
        if let Some(id) = self.forward_traits.get(&name) {
            return *id;
        }
        let id = self.next_def();
        self.forward_traits.insert(name, id);
        id
    }

    /// An inherent impl: `impl SelfTy { .. }`.
    pub fn impl_(&mut self, self_ty: Type) -> ImplBuilder<'_> {
        ImplBuilder::new(self, self_ty, None)
    }

    /// A trait impl: `impl Trait<..> for SelfTy { .. }`.
    pub fn impl_trait(&mut self, trait_ref: TraitRef, self_ty: Type) -> ImplBuilder<'_> {
        ImplBuilder::new(self, self_ty, Some(trait_ref))
    }

    /// `impl Deref for SelfTy { type Target = target; }`
    ///
    /// # Panics
    ///
    /// Panics if the builder has no `Deref` lang item.
    pub fn impl_deref(&mut self, generics: &[ParamId], self_ty: Type, target: Type) -> ImplId {
        let deref = self.lang_trait(LangItem::Deref);
        let mut builder = self.impl_trait(deref, self_ty);
        for param in generics {
            builder = builder.generic(*param);
        }
        builder.assoc_type("Target", target).finish()
    }

    /// `type Name<generics> = aliased;`
    pub fn type_alias(&mut self, name: &str, generics: &[ParamId], aliased: Type) -> DefId {
        let id = self.next_def();
        let name = self.intern(name);
        self.aliases.insert(
            id,
            Arc::new(AliasData {
                id,
                name,
                generics: Generics::new(generics.to_vec()),
                aliased,
            }),
        );
        id
    }

    /// The id of the associated type `name` in trait `trait_id`.
    pub fn trait_assoc_type(&self, trait_id: DefId, name: &str) -> Option<DefId> {
        let name = self.interner.get(name)?;
        let data = self.traits.get(&trait_id)?;
        data.items
            .iter()
            .copied()
            .find(|item| self.assoc_items.get(item).is_some_and(|i| i.name == name && i.is_type()))
    }

    fn add_item(&mut self, container: Container, name: &str, kind: AssocItemKind) -> DefId {
        let id = self.next_def();
        let name = self.intern(name);
        self.assoc_items.insert(
            id,
            Arc::new(AssocItem {
                id,
                name,
                container,
                kind,
            }),
        );
        id
    }
}

/// Builder for a struct or enum.
pub struct AdtBuilder<'b> {
    db: &'b mut DbBuilder,
    id: DefId,
    name: Name,
    kind: AdtKind,
    generics: Generics,
    variants: Vec<VariantData>,
    derives: Vec<LangItem>,
}

impl<'b> AdtBuilder<'b> {
    fn new(db: &'b mut DbBuilder, name: &str, kind: AdtKind) -> Self {
        let id = db.next_def();
        let name = db.intern(name);
        let variants = match kind {
            AdtKind::Struct => vec![VariantData {
                id,
                name,
                fields: Vec::new(),
            }],
            AdtKind::Enum => Vec::new(),
        };
        Self {
            db,
            id,
            name,
            kind,
            generics: Generics::default(),
            variants,
            derives: Vec::new(),
        }
    }

    pub fn id(&self) -> DefId {
        self.id
    }

    /// `Name<P1, ..>` over the generics declared so far.
    pub fn self_ty(&self) -> Type {
        Type::adt(self.id, self.generics.param_types())
    }

    pub fn generic(mut self, param: ParamId) -> Self {
        self.generics.params.push(param);
        self
    }

    pub fn const_generic(mut self, param: ConstParamId) -> Self {
        self.generics.consts.push(param);
        self
    }

    /// A named struct field.
    pub fn field(mut self, name: &str, ty: Type) -> Self {
        let name = self.db.intern(name);
        if let Some(variant) = self.variants.first_mut() {
            variant.fields.push(FieldData { name: Some(name), ty });
        }
        self
    }

    /// A positional struct field.
    pub fn tuple_field(mut self, ty: Type) -> Self {
        if let Some(variant) = self.variants.first_mut() {
            variant.fields.push(FieldData { name: None, ty });
        }
        self
    }

    /// An enum variant with positional fields.
    pub fn variant(mut self, name: &str, fields: Vec<Type>) -> Self {
        let id = self.db.next_def();
        let name = self.db.intern(name);
        self.variants.push(VariantData {
            id,
            name,
            fields: fields.into_iter().map(|ty| FieldData { name: None, ty }).collect(),
        });
        self
    }

    pub fn derive(mut self, item: LangItem) -> Self {
        if !self.derives.contains(&item) {
            self.derives.push(item);
        }
        self
    }

    pub fn finish(self) -> DefId {
        let data = AdtData {
            id: self.id,
            name: self.name,
            kind: self.kind,
            generics: self.generics,
            variants: self.variants,
            derives: self.derives,
        };
        self.db.adts.insert(self.id, Arc::new(data));
        self.id
    }
}

/// Builder for a trait declaration.
pub struct TraitBuilder<'b> {
    db: &'b mut DbBuilder,
    id: DefId,
    name: Name,
    self_param: ParamId,
    generics: Generics,
    predicates: Vec<Predicate>,
    items: Vec<DefId>,
    lang: Option<LangItem>,
}

impl<'b> TraitBuilder<'b> {
    fn new(db: &'b mut DbBuilder, name: &str) -> Self {
        let name = db.intern(name);
        let id = match db.forward_traits.remove(&name) {
            Some(id) => id,
            None => db.next_def(),
        };
        let self_param = db.new_param("Self", false, true);
        Self {
            db,
            id,
            name,
            self_param,
            generics: Generics::default(),
            predicates: Vec::new(),
            items: Vec::new(),
            lang: None,
        }
    }

    pub fn id(&self) -> DefId {
        self.id
    }

    pub fn self_ty(&self) -> Type {
        Type::self_param(self.self_param)
    }

    /// `Trait<P1, ..>` over the generics declared so far.
    pub fn identity_ref(&self) -> TraitRef {
        TraitRef::new(self.id, self.generics.param_types())
    }

    /// `<Self as Trait<..>>::name` for an associated type declared earlier.
    ///
    /// Returns `Unknown` if no such associated type was declared.
    pub fn projection(&self, name: &str) -> Type {
        let Some(name) = self.db.interner.get(name) else {
            return Type::unknown();
        };
        let item = self.items.iter().copied().find(|item| {
            self.db
                .assoc_items
                .get(item)
                .is_some_and(|i| i.name == name && i.is_type())
        });
        match item {
            Some(item) => Type::projection(self.self_ty(), self.identity_ref(), item),
            None => Type::unknown(),
        }
    }

    pub fn lang(mut self, item: LangItem) -> Self {
        self.lang = Some(item);
        self
    }

    pub fn generic(mut self, param: ParamId) -> Self {
        self.generics.params.push(param);
        self
    }

    /// `trait Name: Super`
    pub fn supertrait(mut self, trait_ref: TraitRef) -> Self {
        let self_ty = self.self_ty();
        self.predicates.push(Predicate::implemented(self_ty, trait_ref));
        self
    }

    /// Any where clause on the trait, e.g. `where Self::Item: Foo`.
    pub fn predicate(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn method(self, name: &str, self_kind: SelfKind, params: Vec<Type>, ret: Type) -> Self {
        self.method_with(
            name,
            FnSig {
                generics: Generics::default(),
                self_kind,
                params,
                ret,
            },
        )
    }

    pub fn method_with(mut self, name: &str, sig: FnSig) -> Self {
        let id = self.db.add_item(Container::Trait(self.id), name, AssocItemKind::Fn(sig));
        self.items.push(id);
        self
    }

    /// `type Name;`
    pub fn assoc_type(self, name: &str) -> Self {
        self.assoc_type_with(name, Vec::new(), true)
    }

    /// `type Name: bounds;` with `sized` false for `?Sized`.
    pub fn assoc_type_with(mut self, name: &str, bounds: Vec<TraitRef>, sized: bool) -> Self {
        let kind = AssocItemKind::Type {
            bounds,
            sized,
            value: None,
        };
        let id = self.db.add_item(Container::Trait(self.id), name, kind);
        self.items.push(id);
        self
    }

    pub fn assoc_const(mut self, name: &str, ty: Type) -> Self {
        let id = self.db.add_item(Container::Trait(self.id), name, AssocItemKind::Const { ty });
        self.items.push(id);
        self
    }

    pub fn finish(self) -> DefId {
        let data = TraitData {
            id: self.id,
            name: self.name,
            generics: self.generics,
            self_param: self.self_param,
            predicates: self.predicates,
            items: self.items,
        };
        self.db.traits.insert(self.id, Arc::new(data));
        if let Some(lang) = self.lang {
            self.db.lang_items.insert(lang, self.id);
        }
        self.id
    }
}

/// Builder for an impl block.
pub struct ImplBuilder<'b> {
    db: &'b mut DbBuilder,
    id: ImplId,
    self_ty: Type,
    trait_ref: Option<TraitRef>,
    generics: Generics,
    predicates: Vec<Predicate>,
    items: Vec<DefId>,
}

impl<'b> ImplBuilder<'b> {
    fn new(db: &'b mut DbBuilder, self_ty: Type, trait_ref: Option<TraitRef>) -> Self {
        let id = ImplId::new(db.impls.len() as u32);
        Self {
            db,
            id,
            self_ty,
            trait_ref,
            generics: Generics::default(),
            predicates: Vec::new(),
            items: Vec::new(),
        }
    }

    pub fn id(&self) -> ImplId {
        self.id
    }

    pub fn generic(mut self, param: ParamId) -> Self {
        self.generics.params.push(param);
        self
    }

    pub fn const_generic(mut self, param: ConstParamId) -> Self {
        self.generics.consts.push(param);
        self
    }

    /// `where ty: Trait<..>`
    pub fn bound(mut self, ty: Type, trait_ref: TraitRef) -> Self {
        self.predicates.push(Predicate::implemented(ty, trait_ref));
        self
    }

    pub fn predicate(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn method(self, name: &str, self_kind: SelfKind, params: Vec<Type>, ret: Type) -> Self {
        self.method_with(
            name,
            FnSig {
                generics: Generics::default(),
                self_kind,
                params,
                ret,
            },
        )
    }

    pub fn method_with(mut self, name: &str, sig: FnSig) -> Self {
        let id = self.db.add_item(Container::Impl(self.id), name, AssocItemKind::Fn(sig));
        self.items.push(id);
        self
    }

    /// `type Name = value;`
    pub fn assoc_type(mut self, name: &str, value: Type) -> Self {
        let kind = AssocItemKind::Type {
            bounds: Vec::new(),
            sized: true,
            value: Some(value),
        };
        let id = self.db.add_item(Container::Impl(self.id), name, kind);
        self.items.push(id);
        self
    }

    pub fn assoc_const(mut self, name: &str, ty: Type) -> Self {
        let id = self.db.add_item(Container::Impl(self.id), name, AssocItemKind::Const { ty });
        self.items.push(id);
        self
    }

    pub fn finish(self) -> ImplId {
        let data = ImplData {
            id: self.id,
            generics: self.generics,
            self_ty: self.self_ty,
            trait_ref: self.trait_ref,
            predicates: self.predicates,
            items: self.items,
        };
        self.db.impls.push(Arc::new(data));
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_lang_items() {
        let db = DbBuilder::with_core().finish();
        for item in LangItem::ALL {
            assert!(db.lang_item(item).is_some(), "{item:?} missing");
        }
        let deref = db.lang_item(LangItem::Deref).unwrap();
        assert!(db.item_named(Container::Trait(deref), "Target").is_some());
        let copy = db.trait_data(db.lang_item(LangItem::Copy).unwrap()).unwrap();
        assert_eq!(copy.supertraits().count(), 1);
    }

    #[test]
    fn test_impl_index_by_head_and_trait() {
        let mut b = DbBuilder::with_core();
        let s = b.struct_("S").finish();
        let t = b.trait_("T").method("go", SelfKind::Ref, vec![], Type::unit()).finish();
        let p = b.param("U");
        let inherent = b.impl_(Type::adt(s, vec![])).finish();
        let blanket = b.impl_trait(TraitRef::bare(t), Type::param(p)).generic(p).finish();
        let concrete = b.impl_trait(TraitRef::bare(t), Type::adt(s, vec![])).finish();
        let db = b.finish();

        assert_eq!(&*db.impls_for_head(TypeHead::Adt(s)), &[inherent, concrete]);
        assert_eq!(&*db.blanket_impls(), &[blanket]);
        assert_eq!(&*db.impls_of_trait(t), &[blanket, concrete]);
        let go = db.lookup_name("go").unwrap();
        assert_eq!(&*db.traits_with_item(go), &[t]);
    }

    #[test]
    fn test_invalidate_rebuilds_index() {
        let mut b = DbBuilder::with_core();
        let s = b.struct_("S").finish();
        let db = b.finish();
        assert!(db.impls_for_head(TypeHead::Adt(s)).is_empty());

        let before = db.generation();
        let mut b = DbBuilder::from_db(db);
        let added = b.impl_(Type::adt(s, vec![])).finish();
        let db = b.finish();
        assert!(db.generation() > before);
        assert_eq!(&*db.impls_for_head(TypeHead::Adt(s)), &[added]);

        db.invalidate();
        assert_eq!(&*db.impls_for_head(TypeHead::Adt(s)), &[added]);
    }

    #[test]
    fn test_expand_alias_keeps_annotation() {
        let mut b = DbBuilder::with_core();
        let p = b.param("T");
        let w = b.struct_("W").generic(p).finish();
        let alias = b.type_alias("Alias", &[p], Type::adt(w, vec![Type::param(p)]));
        let db = b.finish();

        let expanded = db.expand_alias(alias, vec![Type::u8()]).unwrap();
        assert_eq!(expanded.alias().map(|a| a.def_id), Some(alias));
        assert!(expanded.is_equivalent_to(&Type::adt(w, vec![Type::u8()])));
    }

    #[test]
    fn test_missing_ids_return_none() {
        let db = DbBuilder::new().finish();
        assert!(db.adt(DefId::new(99)).is_none());
        assert!(db.impl_data(ImplId::new(3)).is_none());
        assert!(db.impls_of_trait(DefId::new(1)).is_empty());
    }
}
