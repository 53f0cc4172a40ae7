//! Semantic-core tests: resolution, generics, classes, diagnostics.

use slatec_ast as ast;
use slatec_ssa::{DataLayout, Module};
use slatec_util::{DiagnosticCode, Handler, Span, Symbol};

use crate::ctx::GenCtx;
use crate::entity::Entity;
use crate::resolve::Resolved;
use crate::types::TypeKind;

fn sym(s: &str) -> Symbol {
    Symbol::intern(s)
}

fn named(name: &str) -> ast::TypeExpr {
    ast::TypeExpr::Named(ast::ScopedName::plain(sym(name), Span::DUMMY))
}

fn plain_name(name: &str) -> ast::ScopedName {
    ast::ScopedName::plain(sym(name), Span::DUMMY)
}

fn generic_name(name: &str, args: Vec<ast::GenericArg>) -> ast::ScopedName {
    ast::ScopedName {
        qualifiers: Vec::new(),
        name: sym(name),
        generic_args: args,
        span: Span::DUMMY,
    }
}

fn class_decl(name: &str, members: Vec<ast::ClassMember>) -> ast::ClassDecl {
    ast::ClassDecl {
        name: sym(name),
        generics: Vec::new(),
        parents: Vec::new(),
        members,
        span: Span::DUMMY,
    }
}

fn property(name: &str, ty: ast::TypeExpr) -> ast::ClassMember {
    ast::ClassMember::Property(ast::PropertyDecl {
        name: sym(name),
        ty,
        span: Span::DUMMY,
    })
}

fn setup() -> (Module, Handler) {
    (Module::new("test", DataLayout::default()), Handler::new())
}

#[test]
fn builtin_types_resolve() {
    let (mut module, handler) = setup();
    let mut ctx = GenCtx::new(&mut module, &handler);

    let i32t = ctx.resolve_type(&named("i32")).unwrap();
    assert!(matches!(
        ctx.arena.type_kind(i32t),
        TypeKind::Int {
            bits: 32,
            signed: true
        }
    ));

    let u8t = ctx.resolve_type(&named("u8")).unwrap();
    assert!(matches!(
        ctx.arena.type_kind(u8t),
        TypeKind::Int {
            bits: 8,
            signed: false
        }
    ));

    let b = ctx.resolve_type(&named("bool")).unwrap();
    assert_eq!(b, ctx.arena.bool_type);
    assert!(!handler.has_errors());
}

#[test]
fn unknown_name_reports_and_poisons() {
    let (mut module, handler) = setup();
    let mut ctx = GenCtx::new(&mut module, &handler);

    let ty = ctx.resolve_type(&named("NoSuchType")).unwrap();
    assert!(ctx.arena.is_error(ty));
    assert!(handler.has_errors());
    let diags = handler.diagnostics();
    assert_eq!(diags[0].code, Some(DiagnosticCode::UNKNOWN_NAME));
}

#[test]
fn class_declaration_binds_and_lays_out() {
    let (mut module, handler) = setup();
    let mut ctx = GenCtx::new(&mut module, &handler);

    let decl = class_decl(
        "Point",
        vec![property("x", named("i32")), property("y", named("i32"))],
    );
    ctx.elaborate_item(&ast::Item::Class(decl)).unwrap();
    assert!(!handler.has_errors());

    let resolved = ctx.resolve_name(&plain_name("Point")).unwrap().unwrap();
    let Resolved::Entity(Entity::Type(ty)) = resolved else {
        panic!("class should resolve to its type")
    };
    let TypeKind::Class(class) = *ctx.arena.type_kind(ty) else {
        panic!("expected a class type")
    };
    assert_eq!(ctx.arena.classes[class].properties.len(), 2);
    assert!(ctx.arena.classes[class].complete);

    // Two i32 fields, naive packing.
    let ssa = ctx.arena.classes[class].ssa;
    assert_eq!(module.layout.size_of(&module.types, ssa), 8);
}

#[test]
fn redeclaration_in_same_scope_is_reported() {
    let (mut module, handler) = setup();
    let mut ctx = GenCtx::new(&mut module, &handler);

    let a = class_decl("Dup", vec![]);
    let b = class_decl("Dup", vec![]);
    ctx.elaborate_item(&ast::Item::Class(a)).unwrap();
    ctx.elaborate_item(&ast::Item::Class(b)).unwrap();

    let diags = handler.diagnostics();
    assert!(diags
        .iter()
        .any(|d| d.code == Some(DiagnosticCode::REDECLARED_NAME)));
}

#[test]
fn alias_is_transparent_in_type_position() {
    let (mut module, handler) = setup();
    let mut ctx = GenCtx::new(&mut module, &handler);

    let alias = ast::AliasDecl {
        name: sym("Int"),
        generics: Vec::new(),
        target: ast::AliasTarget::Type(named("i32")),
        span: Span::DUMMY,
    };
    ctx.elaborate_item(&ast::Item::Alias(alias)).unwrap();

    let ty = ctx.resolve_type(&named("Int")).unwrap();
    assert!(matches!(
        ctx.arena.type_kind(ty),
        TypeKind::Int {
            bits: 32,
            signed: true
        }
    ));
    assert!(!handler.has_errors());
}

#[test]
fn qualified_lookup_through_namespace() {
    let (mut module, handler) = setup();
    let mut ctx = GenCtx::new(&mut module, &handler);

    let ns = ast::NamespaceDecl {
        name: sym("math"),
        items: vec![ast::Item::Class(class_decl(
            "Vector",
            vec![property("x", named("f64"))],
        ))],
        span: Span::DUMMY,
    };
    ctx.elaborate_item(&ast::Item::Namespace(ns)).unwrap();

    // math::Vector from the root scope.
    let name = ast::ScopedName {
        qualifiers: vec![sym("math")],
        name: sym("Vector"),
        generic_args: Vec::new(),
        span: Span::DUMMY,
    };
    let resolved = ctx.resolve_name(&name).unwrap();
    assert!(matches!(
        resolved,
        Some(Resolved::Entity(Entity::Type(_)))
    ));
    assert!(!handler.has_errors());

    // Unqualified Vector is not visible at the root.
    let missing = ctx.resolve_name(&plain_name("Vector")).unwrap();
    assert!(missing.is_none());
}

#[test]
fn namespace_reopening_merges() {
    let (mut module, handler) = setup();
    let mut ctx = GenCtx::new(&mut module, &handler);

    let first = ast::NamespaceDecl {
        name: sym("util"),
        items: vec![ast::Item::Class(class_decl("A", vec![]))],
        span: Span::DUMMY,
    };
    let second = ast::NamespaceDecl {
        name: sym("util"),
        items: vec![ast::Item::Class(class_decl("B", vec![]))],
        span: Span::DUMMY,
    };
    ctx.elaborate_item(&ast::Item::Namespace(first)).unwrap();
    ctx.elaborate_item(&ast::Item::Namespace(second)).unwrap();
    assert!(!handler.has_errors());

    for class in ["A", "B"] {
        let name = ast::ScopedName {
            qualifiers: vec![sym("util")],
            name: sym(class),
            generic_args: Vec::new(),
            span: Span::DUMMY,
        };
        assert!(ctx.resolve_name(&name).unwrap().is_some());
    }
}

#[test]
fn not_a_scope_diagnostic() {
    let (mut module, handler) = setup();
    let mut ctx = GenCtx::new(&mut module, &handler);

    // i32 is a type but not scope-bearing.
    let name = ast::ScopedName {
        qualifiers: vec![sym("i32")],
        name: sym("anything"),
        generic_args: Vec::new(),
        span: Span::DUMMY,
    };
    assert!(ctx.resolve_name(&name).unwrap().is_none());
    let diags = handler.diagnostics();
    assert_eq!(diags[0].code, Some(DiagnosticCode::NOT_A_SCOPE));
}

// ============================================================================
// Generics
// ============================================================================

fn generic_box_decl() -> ast::ClassDecl {
    // class Box<T> { value: T; }
    ast::ClassDecl {
        name: sym("Box"),
        generics: vec![ast::GenericParamDecl {
            name: sym("T"),
            kind: ast::GenericParamKind::Type,
            span: Span::DUMMY,
        }],
        parents: Vec::new(),
        members: vec![property("value", named("T"))],
        span: Span::DUMMY,
    }
}

#[test]
fn generic_instantiation_is_memoized_by_identity() {
    let (mut module, handler) = setup();
    let mut ctx = GenCtx::new(&mut module, &handler);
    ctx.elaborate_item(&ast::Item::Class(generic_box_decl()))
        .unwrap();

    let use_site = || {
        generic_name(
            "Box",
            vec![ast::GenericArg::Type(named("i32"))],
        )
    };
    let first = ctx.resolve_name(&use_site()).unwrap().unwrap();
    let second = ctx.resolve_name(&use_site()).unwrap().unwrap();

    let (Resolved::Entity(a), Resolved::Entity(b)) = (first, second) else {
        panic!("generic use should resolve to entities")
    };
    // Identity, not just equality.
    assert_eq!(a, b);

    let other = ctx
        .resolve_name(&generic_name(
            "Box",
            vec![ast::GenericArg::Type(named("i64"))],
        ))
        .unwrap()
        .unwrap();
    let Resolved::Entity(c) = other else {
        panic!()
    };
    assert_ne!(a, c);
    assert!(!handler.has_errors());
}

#[test]
fn generic_child_has_substituted_member_type() {
    let (mut module, handler) = setup();
    let mut ctx = GenCtx::new(&mut module, &handler);
    ctx.elaborate_item(&ast::Item::Class(generic_box_decl()))
        .unwrap();

    let resolved = ctx
        .resolve_name(&generic_name(
            "Box",
            vec![ast::GenericArg::Type(named("f64"))],
        ))
        .unwrap()
        .unwrap();
    let Resolved::Entity(Entity::Type(ty)) = resolved else {
        panic!()
    };
    let TypeKind::Class(class) = *ctx.arena.type_kind(ty) else {
        panic!()
    };
    let value_ty = ctx.arena.classes[class].properties[0].ty;
    assert!(matches!(
        ctx.arena.type_kind(value_ty),
        TypeKind::Float { bits: 64 }
    ));
    assert_eq!(ctx.arena.classes[class].name.as_str(), "Box<f64>");
}

#[test]
fn recursive_generic_reaches_its_own_stub() {
    // class Node<T> { value: T; next: Node<T>*; }
    let decl = ast::ClassDecl {
        name: sym("Node"),
        generics: vec![ast::GenericParamDecl {
            name: sym("T"),
            kind: ast::GenericParamKind::Type,
            span: Span::DUMMY,
        }],
        parents: Vec::new(),
        members: vec![
            property("value", named("T")),
            property(
                "next",
                ast::TypeExpr::Pointer {
                    pointee: Box::new(ast::TypeExpr::Named(generic_name(
                        "Node",
                        vec![ast::GenericArg::Type(named("T"))],
                    ))),
                    is_const: false,
                    span: Span::DUMMY,
                },
            ),
        ],
        span: Span::DUMMY,
    };

    let (mut module, handler) = setup();
    let mut ctx = GenCtx::new(&mut module, &handler);
    ctx.elaborate_item(&ast::Item::Class(decl)).unwrap();

    let resolved = ctx
        .resolve_name(&generic_name(
            "Node",
            vec![ast::GenericArg::Type(named("i32"))],
        ))
        .unwrap()
        .unwrap();
    assert!(!handler.has_errors());

    let Resolved::Entity(Entity::Type(ty)) = resolved else {
        panic!()
    };
    let TypeKind::Class(class) = *ctx.arena.type_kind(ty) else {
        panic!()
    };
    // next: Node<i32>* points back at the same child, through the stub.
    let next_ty = ctx.arena.classes[class].properties[1].ty;
    let TypeKind::Ptr { pointee } = *ctx.arena.type_kind(next_ty) else {
        panic!("next should be a pointer")
    };
    assert_eq!(pointee, ty);

    // Exactly one memoized child exists.
    let generic = &ctx.arena.generics[crate::entity::GenericId(0)];
    assert_eq!(generic.children.len(), 1);
}

#[test]
fn generic_arity_mismatch_reports() {
    let (mut module, handler) = setup();
    let mut ctx = GenCtx::new(&mut module, &handler);
    ctx.elaborate_item(&ast::Item::Class(generic_box_decl()))
        .unwrap();

    let too_many = generic_name(
        "Box",
        vec![
            ast::GenericArg::Type(named("i32")),
            ast::GenericArg::Type(named("i64")),
        ],
    );
    assert!(ctx.resolve_name(&too_many).unwrap().is_none());
    let diags = handler.diagnostics();
    assert_eq!(
        diags[0].code,
        Some(DiagnosticCode::GENERIC_ARITY_MISMATCH)
    );
}

#[test]
fn generic_arguments_on_non_generic_report() {
    let (mut module, handler) = setup();
    let mut ctx = GenCtx::new(&mut module, &handler);
    ctx.elaborate_item(&ast::Item::Class(class_decl("Plain", vec![])))
        .unwrap();

    let bad = generic_name("Plain", vec![ast::GenericArg::Type(named("i32"))]);
    assert!(ctx.resolve_name(&bad).unwrap().is_none());
    assert!(handler.has_errors());
}

#[test]
fn generic_const_parameter_binds_literal() {
    // class Buffer<N: i64> { }  plus a kind mismatch use.
    let decl = ast::ClassDecl {
        name: sym("Buffer"),
        generics: vec![ast::GenericParamDecl {
            name: sym("N"),
            kind: ast::GenericParamKind::Const(named("i64")),
            span: Span::DUMMY,
        }],
        parents: Vec::new(),
        members: vec![],
        span: Span::DUMMY,
    };
    let (mut module, handler) = setup();
    let mut ctx = GenCtx::new(&mut module, &handler);
    ctx.elaborate_item(&ast::Item::Class(decl)).unwrap();

    let lit = ast::Literal {
        kind: ast::LitKind::Int(16),
        span: Span::DUMMY,
    };
    let ok = generic_name("Buffer", vec![ast::GenericArg::Const(lit.clone())]);
    let first = ctx.resolve_name(&ok).unwrap().unwrap();
    let second = ctx.resolve_name(&ok).unwrap().unwrap();
    let (Resolved::Entity(a), Resolved::Entity(b)) = (first, second) else {
        panic!()
    };
    assert_eq!(a, b);
    assert!(!handler.has_errors());

    // Passing a type where a constant is declared is a kind mismatch.
    let bad = generic_name("Buffer", vec![ast::GenericArg::Type(named("i32"))]);
    assert!(ctx.resolve_name(&bad).unwrap().is_none());
    let diags = handler.diagnostics();
    assert!(diags
        .iter()
        .any(|d| d.code == Some(DiagnosticCode::GENERIC_ARGUMENT_KIND_MISMATCH)));
}

#[test]
fn constant_int_casts_compose() {
    // cast(cast(v, a), b) == cast(v, b) when v fits in min(a, b) bits;
    // constant-domain conversions never need an insertion point.
    let (mut module, handler) = setup();
    let mut ctx = GenCtx::new(&mut module, &handler);

    let i64t = ctx.resolve_type(&named("i64")).unwrap();
    let i16t = ctx.resolve_type(&named("i16")).unwrap();
    let i32t = ctx.resolve_type(&named("i32")).unwrap();

    let v = crate::value::Value::constant(
        sym("v"),
        i32t,
        slatec_ssa::Const::int(32, 1000),
    );

    let via_i64 = ctx.cast_value(&v, i64t);
    let composed = ctx.cast_value(&via_i64, i16t);
    let direct = ctx.cast_value(&v, i16t);

    assert_eq!(
        composed.as_const().and_then(|c| c.as_int_signed()),
        Some(1000)
    );
    assert_eq!(
        composed.as_const().and_then(|c| c.as_int_signed()),
        direct.as_const().and_then(|c| c.as_int_signed())
    );
    assert!(!handler.has_errors());
}

#[test]
fn negative_constants_sign_extend_through_casts() {
    let (mut module, handler) = setup();
    let mut ctx = GenCtx::new(&mut module, &handler);

    let i8t = ctx.resolve_type(&named("i8")).unwrap();
    let i64t = ctx.resolve_type(&named("i64")).unwrap();

    let v = crate::value::Value::constant(
        sym("v"),
        i8t,
        slatec_ssa::Const::int(8, (-5i64) as u64),
    );
    let widened = ctx.cast_value(&v, i64t);
    assert_eq!(
        widened.as_const().and_then(|c| c.as_int_signed()),
        Some(-5)
    );
    assert!(!handler.has_errors());
}

#[test]
fn inherited_layout_offsets_follow_parent_order() {
    let (mut module, handler) = setup();
    let mut ctx = GenCtx::new(&mut module, &handler);

    // class A { x: i32; }  class B { y: i64; }
    // class C extends A, B { z: i32; }
    ctx.elaborate_item(&ast::Item::Class(class_decl(
        "A",
        vec![property("x", named("i32"))],
    )))
    .unwrap();
    ctx.elaborate_item(&ast::Item::Class(class_decl(
        "B",
        vec![property("y", named("i64"))],
    )))
    .unwrap();
    let c = ast::ClassDecl {
        name: sym("C"),
        generics: Vec::new(),
        parents: vec![plain_name("A"), plain_name("B")],
        members: vec![property("z", named("i32"))],
        span: Span::DUMMY,
    };
    ctx.elaborate_item(&ast::Item::Class(c)).unwrap();
    assert!(!handler.has_errors());

    let Resolved::Entity(Entity::Type(c_ty)) =
        ctx.resolve_name(&plain_name("C")).unwrap().unwrap()
    else {
        panic!()
    };
    let TypeKind::Class(c_class) = *ctx.arena.type_kind(c_ty) else {
        panic!()
    };
    let Resolved::Entity(Entity::Type(a_ty)) =
        ctx.resolve_name(&plain_name("A")).unwrap().unwrap()
    else {
        panic!()
    };
    let TypeKind::Class(a_class) = *ctx.arena.type_kind(a_ty) else {
        panic!()
    };
    let Resolved::Entity(Entity::Type(b_ty)) =
        ctx.resolve_name(&plain_name("B")).unwrap().unwrap()
    else {
        panic!()
    };
    let TypeKind::Class(b_class) = *ctx.arena.type_kind(b_ty) else {
        panic!()
    };

    // A sits at the front, B behind A's 4 bytes, own fields after both.
    assert_eq!(
        ctx.arena.upcast_padding(ctx.module, c_class, a_class),
        Some(0)
    );
    assert_eq!(
        ctx.arena.upcast_padding(ctx.module, c_class, b_class),
        Some(4)
    );

    let c_ssa = ctx.arena.classes[c_class].ssa;
    assert_eq!(module.layout.size_of(&module.types, c_ssa), 16);
    assert_eq!(module.layout.offset_of(&module.types, c_ssa, 2), 12);
}
