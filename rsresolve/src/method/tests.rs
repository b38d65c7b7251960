use crate::db::{DbBuilder, MemoryDb, ResolveDatabase, SelfKind};
use crate::def::Name;
use crate::lookup::Adjustment;
use crate::method::{CandidateSource, FieldName, PathQualifier, Resolution, UnresolvedReason};
use crate::scope::Scope;
use crate::session::ResolveSession;
use crate::ty::{TraitRef, Type};

fn name(db: &MemoryDb, text: &str) -> Name {
    db.lookup_name(text).expect("name interned")
}

fn resolved(resolution: Resolution) -> crate::method::Candidate {
    match resolution {
        Resolution::Resolved(candidate) => candidate,
        other => panic!("expected a resolution, got {other:?}"),
    }
}

// ============================================================================
// Candidate order
// ============================================================================

#[test]
fn test_inherent_method_beats_trait_method() {
    let mut b = DbBuilder::with_core();
    let s = b.struct_("S").finish();
    let s_ty = Type::adt(s, vec![]);
    let foo = b.trait_("Foo").method("foo", SelfKind::Ref, vec![], Type::bool()).finish();
    let inherent = b.impl_(s_ty.clone()).method("foo", SelfKind::Ref, vec![], Type::i32()).finish();
    b.impl_trait(TraitRef::bare(foo), s_ty.clone())
        .method("foo", SelfKind::Ref, vec![], Type::bool())
        .finish();
    let db = b.finish();
    let mut session = ResolveSession::new(&db);
    let scope = Scope::new();

    let candidate = resolved(session.resolve_method(&s_ty, name(&db, "foo"), &[], &scope).unwrap());
    assert_eq!(candidate.source, CandidateSource::Inherent(inherent));
    let signature = candidate.signature(&mut session, &scope).unwrap().unwrap();
    assert_eq!(signature.ret, Type::i32());
    assert_eq!(signature.receiver, Some(Type::shared_ref(s_ty)));
}

#[test]
fn test_reference_receiver_picks_reference_impl() {
    let mut b = DbBuilder::with_core();
    let s = b.struct_("S").finish();
    let s_ty = Type::adt(s, vec![]);
    let foo = b.trait_("Foo").method("foo", SelfKind::Value, vec![], Type::unit()).finish();
    let by_value = b.impl_trait(TraitRef::bare(foo), s_ty.clone()).finish();
    let by_ref = b.impl_trait(TraitRef::bare(foo), Type::shared_ref(s_ty.clone())).finish();
    let db = b.finish();
    let mut session = ResolveSession::new(&db);
    let foo_name = name(&db, "foo");
    let scope = Scope::new();

    let on_ref = resolved(session.resolve_method(&Type::shared_ref(s_ty.clone()), foo_name, &[], &scope).unwrap());
    assert_eq!(on_ref.source, CandidateSource::TraitImpl(by_ref));
    assert_eq!(on_ref.deref_count(), 0);

    let on_value = resolved(session.resolve_method(&s_ty, foo_name, &[], &scope).unwrap());
    assert_eq!(on_value.source, CandidateSource::TraitImpl(by_value));

    let double = Type::shared_ref(Type::shared_ref(s_ty));
    let on_double = resolved(session.resolve_method(&double, foo_name, &[], &scope).unwrap());
    assert_eq!(on_double.source, CandidateSource::TraitImpl(by_ref));
    assert_eq!(on_double.adjustments, vec![Adjustment::BuiltinDeref]);
}

#[test]
fn test_methods_of_unrelated_traits_are_ambiguous() {
    let mut b = DbBuilder::with_core();
    let s = b.struct_("S").finish();
    let s_ty = Type::adt(s, vec![]);
    let a = b.trait_("A").method("go", SelfKind::Ref, vec![], Type::unit()).finish();
    let bt = b.trait_("B").method("go", SelfKind::Ref, vec![], Type::unit()).finish();
    b.impl_trait(TraitRef::bare(a), s_ty.clone()).finish();
    b.impl_trait(TraitRef::bare(bt), s_ty.clone()).finish();
    let db = b.finish();
    let mut session = ResolveSession::new(&db);

    let var = session.fresh_var();
    let resolution = session
        .resolve_method(&s_ty, name(&db, "go"), &[var], &Scope::new())
        .unwrap();
    match resolution {
        Resolution::Ambiguous(candidates) => {
            let traits: Vec<_> = candidates.iter().map(|c| c.trait_ref.clone()).collect();
            assert_eq!(traits, vec![Some(TraitRef::bare(a)), Some(TraitRef::bare(bt))]);
        }
        other => panic!("expected ambiguity, got {other:?}"),
    }
}

// ============================================================================
// Autoderef
// ============================================================================

#[test]
fn test_method_found_before_deref_cycle() {
    let mut b = DbBuilder::with_core();
    let a = b.struct_("A").finish();
    let bb = b.struct_("B").finish();
    let a_ty = Type::adt(a, vec![]);
    let b_ty = Type::adt(bb, vec![]);
    b.impl_deref(&[], a_ty.clone(), b_ty.clone());
    b.impl_deref(&[], b_ty.clone(), a_ty.clone());
    let on_b = b.impl_(b_ty.clone()).method("only_b", SelfKind::Ref, vec![], Type::unit()).finish();
    b.intern("missing");
    let db = b.finish();
    let mut session = ResolveSession::new(&db);
    let scope = Scope::new();

    let candidate = resolved(session.resolve_method(&a_ty, name(&db, "only_b"), &[], &scope).unwrap());
    assert_eq!(candidate.source, CandidateSource::Inherent(on_b));
    assert_eq!(candidate.receiver_ty, b_ty);
    assert_eq!(candidate.adjustments, vec![Adjustment::OverloadedDeref]);

    session.reset_stats();
    let missing = session.resolve_method(&a_ty, name(&db, "missing"), &[], &scope).unwrap();
    assert_eq!(missing, Resolution::Unresolved(UnresolvedReason::CyclicDeref));
    assert_eq!(session.stats().autoderef_steps, 2);
}

#[test]
fn test_ambiguous_level_gives_way_to_deref_target() {
    let mut b = DbBuilder::with_core();
    let a_ty = Type::adt(b.struct_("A").finish(), vec![]);
    let b_ty = Type::adt(b.struct_("B").finish(), vec![]);
    let x = b
        .trait_("X")
        .method("go", SelfKind::Ref, vec![], Type::unit())
        .method("stop", SelfKind::Ref, vec![], Type::unit())
        .finish();
    let y = b
        .trait_("Y")
        .method("go", SelfKind::Ref, vec![], Type::unit())
        .method("stop", SelfKind::Ref, vec![], Type::unit())
        .finish();
    b.impl_trait(TraitRef::bare(x), a_ty.clone()).finish();
    b.impl_trait(TraitRef::bare(y), a_ty.clone()).finish();
    b.impl_deref(&[], a_ty.clone(), b_ty.clone());
    let on_b = b.impl_(b_ty.clone()).method("go", SelfKind::Ref, vec![], Type::unit()).finish();
    let db = b.finish();
    let mut session = ResolveSession::new(&db);
    let scope = Scope::new();

    let candidate = resolved(session.resolve_method(&a_ty, name(&db, "go"), &[], &scope).unwrap());
    assert_eq!(candidate.source, CandidateSource::Inherent(on_b));
    assert_eq!(candidate.receiver_ty, b_ty);
    assert_eq!(candidate.adjustments, vec![Adjustment::OverloadedDeref]);

    // Nothing below `A` offers `stop`, so the tie at `A` stands.
    match session.resolve_method(&a_ty, name(&db, "stop"), &[], &scope).unwrap() {
        Resolution::Ambiguous(candidates) => {
            let traits: Vec<_> = candidates.iter().map(|c| c.trait_ref.clone()).collect();
            assert_eq!(traits, vec![Some(TraitRef::bare(x)), Some(TraitRef::bare(y))]);
        }
        other => panic!("expected ambiguity, got {other:?}"),
    }
}

#[test]
fn test_trait_object_method() {
    let mut b = DbBuilder::with_core();
    let draw = b.trait_("Draw").method("draw", SelfKind::Ref, vec![], Type::unit()).finish();
    let db = b.finish();
    let mut session = ResolveSession::new(&db);

    let object = Type::shared_ref(Type::dyn_trait(vec![TraitRef::bare(draw)]));
    let candidate = resolved(
        session
            .resolve_method(&object, name(&db, "draw"), &[], &Scope::new())
            .unwrap(),
    );
    assert_eq!(candidate.source, CandidateSource::Object(TraitRef::bare(draw)));
    assert_eq!(candidate.deref_count(), 1);
}

// ============================================================================
// Deferral
// ============================================================================

#[test]
fn test_same_trait_impls_disambiguated_by_argument() {
    let mut b = DbBuilder::with_core();
    let x = b.param("X");
    let t = b
        .trait_("T")
        .generic(x)
        .method("foo", SelfKind::Ref, vec![Type::param(x)], Type::param(x))
        .finish();
    let s = Type::adt(b.struct_("S").finish(), vec![]);
    let s1 = Type::adt(b.struct_("S1").finish(), vec![]);
    let s2 = Type::adt(b.struct_("S2").finish(), vec![]);
    let first = b.impl_trait(TraitRef::new(t, vec![s1.clone()]), s.clone()).finish();
    let second = b.impl_trait(TraitRef::new(t, vec![s2.clone()]), s.clone()).finish();
    let db = b.finish();
    let mut session = ResolveSession::new(&db);
    let foo = name(&db, "foo");
    let scope = Scope::new();

    let candidate = resolved(session.resolve_method(&s, foo, &[s1.clone()], &scope).unwrap());
    assert_eq!(candidate.source, CandidateSource::TraitImpl(first));
    let signature = session.signature(&candidate, &scope).unwrap().unwrap();
    assert_eq!(signature.ret, s1);

    // Nothing to tell the impls apart yet.
    let var = session.fresh_var();
    let call = match session.resolve_method(&s, foo, &[var.clone()], &scope).unwrap() {
        Resolution::Deferred(call) => call,
        other => panic!("expected deferral, got {other:?}"),
    };
    assert_eq!(call.candidates().len(), 2);

    assert!(session.unifier_mut().unify(&var, &s2));
    let retried = resolved(call.retry(&mut session, &[var]).unwrap());
    assert_eq!(retried.source, CandidateSource::TraitImpl(second));

    // Without an argument there is nothing left to infer.
    let bare = session.resolve_method(&s, foo, &[], &scope).unwrap();
    assert!(matches!(bare, Resolution::Ambiguous(ref c) if c.len() == 2));
}

#[test]
fn test_integer_literal_receiver_defers_then_falls_back_to_i32() {
    let mut b = DbBuilder::with_core();
    let foo = b.trait_("Foo").method("foo", SelfKind::Ref, vec![], Type::unit()).finish();
    let for_i32 = b.impl_trait(TraitRef::bare(foo), Type::i32()).finish();
    b.impl_trait(TraitRef::bare(foo), Type::u8()).finish();
    let db = b.finish();
    let mut session = ResolveSession::new(&db);
    let literal = session.fresh_int_var();

    let call = match session
        .resolve_method(&literal, name(&db, "foo"), &[], &Scope::new())
        .unwrap()
    {
        Resolution::Deferred(call) => call,
        other => panic!("expected deferral, got {other:?}"),
    };
    let candidate = resolved(call.retry(&mut session, &[]).unwrap());
    assert_eq!(candidate.source, CandidateSource::TraitImpl(for_i32));
    assert_eq!(candidate.receiver_ty, Type::i32());
    assert!(session.unifier().is_unbound_var(&literal));
}

#[test]
fn test_unbound_receiver_defers_once() {
    let mut b = DbBuilder::with_core();
    b.trait_("Foo").method("foo", SelfKind::Ref, vec![], Type::unit()).finish();
    let db = b.finish();
    let mut session = ResolveSession::new(&db);
    let var = session.fresh_var();
    let foo = name(&db, "foo");

    let call = match session.resolve_method(&var, foo, &[], &Scope::new()).unwrap() {
        Resolution::Deferred(call) => call,
        other => panic!("expected deferral, got {other:?}"),
    };
    assert!(call.candidates().is_empty());
    let retried = call.retry(&mut session, &[]).unwrap();
    assert_eq!(retried, Resolution::Unresolved(UnresolvedReason::UnknownReceiver));

    let unknown = session.resolve_method(&Type::unknown(), foo, &[], &Scope::new()).unwrap();
    assert_eq!(unknown, Resolution::Unresolved(UnresolvedReason::UnknownReceiver));
}

// ============================================================================
// Where clauses
// ============================================================================

#[test]
fn test_where_clause_gives_return_type() {
    let mut b = DbBuilder::with_core();
    let x = b.param("X");
    let i = b
        .trait_("I")
        .generic(x)
        .method("foo", SelfKind::Ref, vec![], Type::param(x))
        .finish();
    let s = Type::adt(b.struct_("S").finish(), vec![]);
    let t = Type::param(b.param("T"));
    let db = b.finish();
    let mut session = ResolveSession::new(&db);

    let bound = TraitRef::new(i, vec![s.clone()]);
    let scope = Scope::new().with_bound(t.clone(), bound.clone());
    let candidate = resolved(session.resolve_method(&t, name(&db, "foo"), &[], &scope).unwrap());
    assert_eq!(candidate.source, CandidateSource::WhereClause(bound));
    let signature = session.signature(&candidate, &scope).unwrap().unwrap();
    assert_eq!(signature.ret, s);
}

#[test]
fn test_method_through_supertrait_bound() {
    let mut b = DbBuilder::with_core();
    let base = b.trait_("Base").method("base", SelfKind::Ref, vec![], Type::unit()).finish();
    let derived = b.trait_("Derived").supertrait(TraitRef::bare(base)).finish();
    let t = Type::param(b.param("T"));
    let db = b.finish();
    let mut session = ResolveSession::new(&db);

    let scope = Scope::new().with_bound(t.clone(), TraitRef::bare(derived));
    let candidate = resolved(session.resolve_method(&t, name(&db, "base"), &[], &scope).unwrap());
    assert_eq!(candidate.source, CandidateSource::WhereClause(TraitRef::bare(base)));
}

#[test]
fn test_method_through_associated_type_bound() {
    let mut b = DbBuilder::with_core();
    let show = b.trait_("Show").method("show", SelfKind::Ref, vec![], Type::bool()).finish();
    let container = b
        .trait_("Container")
        .assoc_type_with("Elem", vec![TraitRef::bare(show)], true)
        .finish();
    let elem = b.trait_assoc_type(container, "Elem").unwrap();
    let t = Type::param(b.param("T"));
    let db = b.finish();
    let mut session = ResolveSession::new(&db);

    let scope = Scope::new().with_bound(t.clone(), TraitRef::bare(container));
    let receiver = Type::projection(t, TraitRef::bare(container), elem);
    let candidate = resolved(session.resolve_method(&receiver, name(&db, "show"), &[], &scope).unwrap());
    assert_eq!(candidate.source, CandidateSource::WhereClause(TraitRef::bare(show)));
    assert_eq!(candidate.receiver_ty, receiver);
}

#[test]
fn test_trait_visibility() {
    let mut b = DbBuilder::with_core();
    let s = Type::adt(b.struct_("S").finish(), vec![]);
    let foo = b.trait_("Foo").method("foo", SelfKind::Ref, vec![], Type::unit()).finish();
    b.impl_trait(TraitRef::bare(foo), s.clone()).finish();
    let t = Type::param(b.param("T"));
    let db = b.finish();
    let mut session = ResolveSession::new(&db);
    let foo_name = name(&db, "foo");

    let mut hidden = Scope::with_visible_traits(Vec::new());
    let resolution = session.resolve_method(&s, foo_name, &[], &hidden).unwrap();
    assert_eq!(resolution, Resolution::Unresolved(UnresolvedReason::NoCandidates));

    hidden.import_trait(foo);
    assert!(session.resolve_method(&s, foo_name, &[], &hidden).unwrap().is_resolved());

    // Bounds make their trait's methods usable even when it is not imported.
    let bounded = Scope::with_visible_traits(Vec::new()).with_bound(t.clone(), TraitRef::bare(foo));
    assert!(session.resolve_method(&t, foo_name, &[], &bounded).unwrap().is_resolved());
}

#[test]
fn test_resolution_is_repeatable_and_leaves_no_bindings() {
    let mut b = DbBuilder::with_core();
    let x = b.param("X");
    let t = b
        .trait_("T")
        .generic(x)
        .method("put", SelfKind::Ref, vec![Type::param(x)], Type::unit())
        .finish();
    let s = Type::adt(b.struct_("S").finish(), vec![]);
    b.impl_trait(TraitRef::new(t, vec![Type::bool()]), s.clone()).finish();
    let db = b.finish();
    let mut session = ResolveSession::new(&db);
    let arg = session.fresh_var();
    let put = name(&db, "put");

    let first = session.resolve_method(&s, put, &[arg.clone()], &Scope::new()).unwrap();
    let second = session.resolve_method(&s, put, &[arg.clone()], &Scope::new()).unwrap();
    assert!(first.is_resolved());
    assert_eq!(first, second);
    assert!(session.unifier().is_unbound_var(&arg));
}

// ============================================================================
// Associated types
// ============================================================================

#[test]
fn test_blanket_impl_ignored_for_param_but_used_for_qualified_path() {
    let mut b = DbBuilder::with_core();
    let tr = b.trait_("Tr").assoc_type("Item").finish();
    let u = b.param("U");
    b.impl_trait(TraitRef::bare(tr), Type::param(u))
        .generic(u)
        .assoc_type("Item", Type::u8())
        .finish();
    let t = Type::param(b.param("T"));
    let db = b.finish();
    let mut session = ResolveSession::new(&db);
    let item = name(&db, "Item");
    let scope = Scope::new();

    assert_eq!(session.resolve_assoc_type(&t, None, item, &scope).unwrap(), None);
    let qualified = session
        .resolve_assoc_type(&t, Some(&TraitRef::bare(tr)), item, &scope)
        .unwrap();
    assert_eq!(qualified, Some(Type::u8()));
}

#[test]
fn test_qualified_path_prefers_applicable_concrete_impl() {
    let mut b = DbBuilder::with_core();
    let bar = b.trait_("Bar").finish();
    let tr = b.trait_("Tr").assoc_type("Item").finish();
    let u = b.param("U");
    b.impl_trait(TraitRef::bare(tr), Type::param(u))
        .generic(u)
        .bound(Type::param(u), TraitRef::bare(bar))
        .assoc_type("Item", Type::u8())
        .finish();
    let s = Type::adt(b.struct_("S").finish(), vec![]);
    b.impl_trait(TraitRef::bare(tr), s.clone())
        .assoc_type("Item", Type::bool())
        .finish();
    let db = b.finish();
    let mut session = ResolveSession::new(&db);
    let item = name(&db, "Item");
    let scope = Scope::new();

    let qualified = session
        .resolve_assoc_type(&s, Some(&TraitRef::bare(tr)), item, &scope)
        .unwrap();
    assert_eq!(qualified, Some(Type::bool()));
    assert_eq!(session.resolve_assoc_type(&s, None, item, &scope).unwrap(), Some(Type::bool()));
}

#[test]
fn test_bounded_blanket_impl_for_param_in_scope() {
    let mut b = DbBuilder::with_core();
    let bound = b.trait_("Bound").finish();
    let tr = b.trait_("Tr").assoc_type("Item").finish();
    let a = b.param("A");
    b.impl_trait(TraitRef::bare(tr), Type::param(a))
        .generic(a)
        .bound(Type::param(a), TraitRef::bare(bound))
        .assoc_type("Item", Type::u8())
        .finish();
    let t = Type::param(b.param("T"));
    let db = b.finish();
    let mut session = ResolveSession::new(&db);
    let item = name(&db, "Item");
    let scope = Scope::new().with_bound(t.clone(), TraitRef::bare(bound));

    assert_eq!(session.resolve_assoc_type(&t, None, item, &scope).unwrap(), None);
    let qualified = session
        .resolve_assoc_type(&t, Some(&TraitRef::bare(tr)), item, &scope)
        .unwrap();
    assert_eq!(qualified, Some(Type::u8()));
}

#[test]
fn test_bounded_blanket_impl_for_concrete_type() {
    let mut b = DbBuilder::with_core();
    let bound = b.trait_("Bound").finish();
    let tr = b.trait_("Tr").assoc_type("Item").finish();
    let a = b.param("A");
    b.impl_trait(TraitRef::bare(tr), Type::param(a))
        .generic(a)
        .bound(Type::param(a), TraitRef::bare(bound))
        .assoc_type("Item", Type::u8())
        .finish();
    let s = Type::adt(b.struct_("S").finish(), vec![]);
    b.impl_trait(TraitRef::bare(bound), s.clone()).finish();
    let other = Type::adt(b.struct_("Other").finish(), vec![]);
    let db = b.finish();
    let mut session = ResolveSession::new(&db);
    let item = name(&db, "Item");
    let scope = Scope::new();

    assert_eq!(session.resolve_assoc_type(&s, None, item, &scope).unwrap(), Some(Type::u8()));
    let qualified = session
        .resolve_assoc_type(&s, Some(&TraitRef::bare(tr)), item, &scope)
        .unwrap();
    assert_eq!(qualified, Some(Type::u8()));

    // `Other: Bound` does not hold, so the blanket impl does not apply.
    assert_eq!(session.resolve_assoc_type(&other, None, item, &scope).unwrap(), None);
}

#[test]
fn test_self_item_through_supertrait() {
    let mut b = DbBuilder::with_core();
    let sup = b.trait_("Super").assoc_type("Item").finish();
    let item_id = b.trait_assoc_type(sup, "Item").unwrap();
    let sub = b.trait_("Sub").supertrait(TraitRef::bare(sup)).finish();
    let s = Type::adt(b.struct_("S").finish(), vec![]);
    b.impl_trait(TraitRef::bare(sup), s.clone())
        .assoc_type("Item", Type::char())
        .finish();
    let sub_impl = b.impl_trait(TraitRef::bare(sub), s.clone()).finish();
    let t = Type::param(b.param("T"));
    let db = b.finish();
    let mut session = ResolveSession::new(&db);
    let item = name(&db, "Item");

    // `Self::Item` inside `impl Sub for S`.
    let impl_scope = Scope::for_impl(&db.impl_data(sub_impl).unwrap());
    assert_eq!(
        session.resolve_assoc_type(&s, None, item, &impl_scope).unwrap(),
        Some(Type::char())
    );

    // `T::Item` with `T: Sub` stays a projection through `Super`.
    let param_scope = Scope::new().with_bound(t.clone(), TraitRef::bare(sub));
    assert_eq!(
        session.resolve_assoc_type(&t, None, item, &param_scope).unwrap(),
        Some(Type::projection(t, TraitRef::bare(sup), item_id))
    );
}

// ============================================================================
// Paths and fields
// ============================================================================

#[test]
fn test_enum_variant_wins_over_associated_item() {
    let mut b = DbBuilder::with_core();
    let e = b.enum_("E").variant("A", vec![Type::i32()]).finish();
    let e_ty = Type::adt(e, vec![]);
    b.impl_(e_ty.clone()).assoc_const("A", Type::u8()).finish();
    let db = b.finish();
    let mut session = ResolveSession::new(&db);
    let scope = Scope::new();

    let candidate = resolved(
        session
            .resolve_path(&PathQualifier::Type(e_ty.clone()), name(&db, "A"), &[], &scope)
            .unwrap(),
    );
    assert_eq!(candidate.source, CandidateSource::Variant(e, 0));
    let signature = session.signature(&candidate, &scope).unwrap().unwrap();
    assert_eq!(signature.params, vec![Type::i32()]);
    assert_eq!(signature.ret, e_ty);
}

#[test]
fn test_associated_const_by_type_path() {
    let mut b = DbBuilder::with_core();
    let s = Type::adt(b.struct_("S").finish(), vec![]);
    let imp = b.impl_(s.clone()).assoc_const("MAX", Type::u8()).finish();
    let db = b.finish();
    let mut session = ResolveSession::new(&db);
    let scope = Scope::new();

    let candidate = resolved(
        session
            .resolve_path(&PathQualifier::Type(s), name(&db, "MAX"), &[], &scope)
            .unwrap(),
    );
    assert_eq!(candidate.source, CandidateSource::Inherent(imp));
    assert_eq!(session.signature(&candidate, &scope).unwrap().unwrap().ret, Type::u8());
}

#[test]
fn test_trait_path_infers_self_from_receiver_argument() {
    let mut b = DbBuilder::with_core();
    let greet = b.trait_("Greet").method("greet", SelfKind::Ref, vec![], Type::u8()).finish();
    let s = Type::adt(b.struct_("S").finish(), vec![]);
    let imp = b.impl_trait(TraitRef::bare(greet), s.clone()).finish();
    let db = b.finish();
    let mut session = ResolveSession::new(&db);
    let greet_name = name(&db, "greet");
    let scope = Scope::new();

    let candidate = resolved(
        session
            .resolve_path(&PathQualifier::Trait(greet), greet_name, &[Type::shared_ref(s)], &scope)
            .unwrap(),
    );
    assert_eq!(candidate.source, CandidateSource::TraitImpl(imp));

    // No impl for `bool`: the declaration itself.
    let qualifier = PathQualifier::Qualified {
        self_ty: Type::bool(),
        trait_ref: TraitRef::bare(greet),
    };
    let decl = resolved(session.resolve_path(&qualifier, greet_name, &[], &scope).unwrap());
    assert_eq!(decl.source, CandidateSource::TraitDecl(TraitRef::bare(greet)));

    // `Greet::greet` with nothing known about `Self` waits, then settles
    // for the declaration.
    let call = match session
        .resolve_path(&PathQualifier::Trait(greet), greet_name, &[], &scope)
        .unwrap()
    {
        Resolution::Deferred(call) => call,
        other => panic!("expected deferral, got {other:?}"),
    };
    let retried = resolved(call.retry(&mut session, &[]).unwrap());
    assert_eq!(retried.source, CandidateSource::TraitDecl(TraitRef::bare(greet)));
}

#[test]
fn test_qualified_path_selects_impl_by_trait_arguments() {
    let mut b = DbBuilder::with_core();
    let x = b.param("X");
    let t = b
        .trait_("T")
        .generic(x)
        .method("make", SelfKind::None, vec![], Type::param(x))
        .finish();
    let s = Type::adt(b.struct_("S").finish(), vec![]);
    b.impl_trait(TraitRef::new(t, vec![Type::u8()]), s.clone()).finish();
    let second = b.impl_trait(TraitRef::new(t, vec![Type::char()]), s.clone()).finish();
    let db = b.finish();
    let mut session = ResolveSession::new(&db);
    let scope = Scope::new();

    let qualifier = PathQualifier::Qualified {
        self_ty: s,
        trait_ref: TraitRef::new(t, vec![Type::char()]),
    };
    let candidate = resolved(session.resolve_path(&qualifier, name(&db, "make"), &[], &scope).unwrap());
    assert_eq!(candidate.source, CandidateSource::TraitImpl(second));
    assert_eq!(session.signature(&candidate, &scope).unwrap().unwrap().ret, Type::char());
}

#[test]
fn test_field_resolution_through_references() {
    let mut b = DbBuilder::with_core();
    let point = b
        .struct_("Point")
        .field("x", Type::i32())
        .field("y", Type::bool())
        .finish();
    let pair = b.struct_("Pair").tuple_field(Type::u8()).tuple_field(Type::char()).finish();
    b.intern("z");
    let db = b.finish();
    let mut session = ResolveSession::new(&db);
    let scope = Scope::new();

    let receiver = Type::shared_ref(Type::adt(point, vec![]));
    let y = resolved(
        session
            .resolve_field(&receiver, FieldName::Named(name(&db, "y")), &scope)
            .unwrap(),
    );
    assert_eq!(y.source, CandidateSource::Field(point, 1));
    assert_eq!(y.adjustments, vec![Adjustment::BuiltinDeref]);
    assert_eq!(session.signature(&y, &scope).unwrap().unwrap().ret, Type::bool());

    let second = resolved(
        session
            .resolve_field(&Type::adt(pair, vec![]), FieldName::Index(1), &scope)
            .unwrap(),
    );
    assert_eq!(second.source, CandidateSource::Field(pair, 1));

    let missing = session
        .resolve_field(&receiver, FieldName::Named(name(&db, "z")), &scope)
        .unwrap();
    assert_eq!(missing, Resolution::Unresolved(UnresolvedReason::NoCandidates));
}

#[test]
fn test_clone_through_builtin_impls() {
    let mut b = DbBuilder::with_core();
    let clone = b.lang_trait(crate::def::LangItem::Clone);
    let derived = b.struct_("D").derive(crate::def::LangItem::Clone).finish();
    let plain = b.struct_("P").finish();
    let db = b.finish();
    let mut session = ResolveSession::new(&db);
    let clone_name = name(&db, "clone");
    let scope = Scope::new();

    for receiver in [
        Type::tuple(vec![Type::i32(), Type::bool()]),
        Type::adt(derived, vec![]),
        Type::shared_ref(Type::adt(plain, vec![])),
    ] {
        let candidate = resolved(session.resolve_method(&receiver, clone_name, &[], &scope).unwrap());
        assert_eq!(candidate.source, CandidateSource::Builtin(clone.clone()), "{receiver}");
        assert_eq!(candidate.deref_count(), 0);
        let signature = session.signature(&candidate, &scope).unwrap().unwrap();
        assert_eq!(signature.ret, receiver);
    }

    let plain = Type::adt(plain, vec![]);
    let resolution = session.resolve_method(&plain, clone_name, &[], &scope).unwrap();
    assert_eq!(resolution, Resolution::Unresolved(UnresolvedReason::NoCandidates));
}
