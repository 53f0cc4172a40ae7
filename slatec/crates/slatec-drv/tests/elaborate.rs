//! End-to-end elaboration scenarios over hand-built syntax trees.

mod common;

use common::*;
use slatec_ast as ast;
use slatec_drv::{compile_units, CompileOptions};
use slatec_util::{DiagnosticCode, FileId, Span};

fn compile(items: Vec<ast::Item>) -> Result<slatec_ssa::Module, Vec<slatec_util::Diagnostic>> {
    compile_units(&[unit(items)], &CompileOptions::default())
}

/// The emitted text of one function, from its `define` line to the
/// closing brace.
fn function_text(module_text: &str, name: &str) -> String {
    let needle = format!("@{name}(");
    let start = module_text
        .find(&needle)
        .unwrap_or_else(|| panic!("function `{name}` not in module:\n{module_text}"));
    let head = module_text[..start]
        .rfind("define")
        .expect("define keyword before function name");
    let end = module_text[start..]
        .find("\n}")
        .map(|i| start + i)
        .unwrap_or(module_text.len());
    module_text[head..end].to_string()
}

// ============================================================================
// Scenario: generic identity function
// ============================================================================

#[test]
fn generic_identity_memoizes_and_folds_the_argument() {
    let id = generic_function(
        "id",
        vec!["T"],
        vec![("x", named("T"))],
        Some(named("T")),
        vec![ret(Some(name("x")))],
    );
    let main = function(
        "main",
        vec![],
        Some(named("i32")),
        vec![
            // Two uses of the same instantiation share one child.
            let_stmt(
                "a",
                None,
                Some(call(
                    generic_name_expr("id", vec![ast::GenericArg::Type(named("i32"))]),
                    vec![int(7)],
                )),
            ),
            ret(Some(call(
                generic_name_expr("id", vec![ast::GenericArg::Type(named("i32"))]),
                vec![int(7)],
            ))),
        ],
    );

    let module = compile(vec![
        ast::Item::Function(id),
        ast::Item::Function(main),
    ])
    .expect("compiles cleanly");

    assert!(module.find_function("id<i32>").is_some());
    // Memoization: exactly one monomorphized child.
    let instantiations = module
        .functions
        .iter()
        .filter(|f| f.name.as_str().starts_with("id<"))
        .count();
    assert_eq!(instantiations, 1);

    let text = module.emit();
    let main_text = function_text(&text, "main");
    assert!(main_text.contains("call i32 @id<i32>(i32 7)"));
}

// ============================================================================
// Scenario: pointer arithmetic
// ============================================================================

#[test]
fn pointer_plus_integer_is_a_single_gep() {
    let f = function(
        "advance",
        vec![("p", ptr_to(named("i32")))],
        Some(ptr_to(named("i32"))),
        vec![ret(Some(binary(
            ast::BinaryOp::Add,
            name("p"),
            int(3),
        )))],
    );
    let module = compile(vec![ast::Item::Function(f)]).expect("compiles cleanly");
    let text = function_text(&module.emit(), "advance");

    let geps = text.matches("getelementptr i32").count();
    assert_eq!(geps, 1, "expected one GEP in:\n{text}");
    assert!(text.contains("i32 3"));
}

// ============================================================================
// Scenario: multiple-inheritance upcast
// ============================================================================

#[test]
fn upcast_offsets_by_preceding_parent_sizes() {
    let a = class("A", vec![], vec![property("x", named("i32"))]);
    let b = class("B", vec![], vec![property("y", named("i32"))]);
    let c = class(
        "C",
        vec!["A", "B"],
        vec![property("z", named("i32"))],
    );
    let main = function(
        "main",
        vec![],
        None,
        vec![
            let_stmt("c", Some(named("C")), Some(class_init("C", vec![]))),
            let_stmt(
                "b",
                Some(ptr_to(named("B"))),
                Some(cast(
                    unary(ast::UnaryOp::AddrOf, name("c")),
                    ptr_to(named("B")),
                )),
            ),
        ],
    );

    let module = compile(vec![
        ast::Item::Class(a),
        ast::Item::Class(b),
        ast::Item::Class(c),
        ast::Item::Function(main),
    ])
    .expect("compiles cleanly");
    let text = function_text(&module.emit(), "main");

    // size_of(A) == 4: the B* view starts 4 bytes in.
    assert!(
        text.contains("getelementptr i8") && text.contains("i64 4"),
        "upcast should offset by size_of(A):\n{text}"
    );
    assert!(text.contains("%B*"));
}

#[test]
fn deep_upcast_accumulates_offsets() {
    // D extends C extends (A, B); casting D* -> B* crosses depth 2.
    let a = class("A", vec![], vec![property("x", named("i64"))]);
    let b = class("B", vec![], vec![property("y", named("i32"))]);
    let c = class("C", vec!["A", "B"], vec![]);
    let d = class("D", vec!["C"], vec![property("w", named("i32"))]);
    let main = function(
        "main",
        vec![],
        None,
        vec![
            let_stmt("d", Some(named("D")), Some(class_init("D", vec![]))),
            let_stmt(
                "b",
                Some(ptr_to(named("B"))),
                Some(cast(
                    unary(ast::UnaryOp::AddrOf, name("d")),
                    ptr_to(named("B")),
                )),
            ),
        ],
    );
    let module = compile(vec![
        ast::Item::Class(a),
        ast::Item::Class(b),
        ast::Item::Class(c),
        ast::Item::Class(d),
        ast::Item::Function(main),
    ])
    .expect("compiles cleanly");
    let text = function_text(&module.emit(), "main");

    // B sits behind A (8 bytes) inside C, and C leads D: offset 8.
    assert!(
        text.contains("i64 8"),
        "depth-2 upcast should offset by 8:\n{text}"
    );
}

// ============================================================================
// Scenario: operator overloading
// ============================================================================

#[test]
fn plus_on_a_class_dispatches_to_the_method() {
    let plus = function(
        "+",
        vec![("o", named("Vec2"))],
        Some(named("Vec2")),
        vec![ret(Some(name("o")))],
    );
    let vec2 = class(
        "Vec2",
        vec![],
        vec![
            property("x", named("f64")),
            property("y", named("f64")),
            method(plus),
        ],
    );
    let main = function(
        "main",
        vec![],
        None,
        vec![
            let_stmt("a", None, Some(class_init("Vec2", vec![]))),
            let_stmt("b", None, Some(class_init("Vec2", vec![]))),
            let_stmt(
                "d",
                None,
                Some(binary(ast::BinaryOp::Add, name("a"), name("b"))),
            ),
        ],
    );

    let module = compile(vec![
        ast::Item::Class(vec2),
        ast::Item::Function(main),
    ])
    .expect("compiles cleanly");
    let text = function_text(&module.emit(), "main");
    assert!(
        text.contains("@Vec2.+("),
        "a + b should call the overload:\n{text}"
    );
}

// ============================================================================
// Scenario: short-circuit evaluation
// ============================================================================

#[test]
fn false_and_anything_never_calls_the_right_side() {
    let crash = function("crash", vec![], Some(named("i32")), vec![ret(Some(int(1)))]);
    let main = function(
        "main",
        vec![],
        None,
        vec![let_stmt(
            "x",
            Some(named("bool")),
            Some(binary(
                ast::BinaryOp::LogicalAnd,
                boolean(false),
                call(name("crash"), vec![]),
            )),
        )],
    );

    let module = compile(vec![
        ast::Item::Function(crash),
        ast::Item::Function(main),
    ])
    .expect("compiles cleanly");
    let text = function_text(&module.emit(), "main");

    assert!(
        !text.contains("call"),
        "the right side must not be emitted:\n{text}"
    );
    assert!(text.contains("store i1 0"), "only the constant remains:\n{text}");
}

#[test]
fn non_constant_short_circuit_builds_a_phi() {
    let main = function(
        "check",
        vec![("a", named("bool")), ("b", named("bool"))],
        Some(named("bool")),
        vec![ret(Some(binary(
            ast::BinaryOp::LogicalAnd,
            name("a"),
            name("b"),
        )))],
    );
    let module = compile(vec![ast::Item::Function(main)]).expect("compiles cleanly");
    let text = function_text(&module.emit(), "check");
    assert!(text.contains("phi i1"), "expected an i1 join phi:\n{text}");
    assert!(text.contains("; and.rhs"));
}

// ============================================================================
// Scenario: destruction order
// ============================================================================

#[test]
fn destructors_run_in_reverse_declaration_order() {
    let with_dtor = |name: &str| {
        class(
            name,
            vec![],
            vec![
                property("id", named("i32")),
                method(function("@destructor", vec![], None, vec![])),
            ],
        )
    };
    let main = function(
        "main",
        vec![],
        None,
        vec![
            let_stmt("a", None, Some(class_init("Ra", vec![]))),
            let_stmt("b", None, Some(class_init("Rb", vec![]))),
            let_stmt("c", None, Some(class_init("Rc", vec![]))),
        ],
    );

    let module = compile(vec![
        ast::Item::Class(with_dtor("Ra")),
        ast::Item::Class(with_dtor("Rb")),
        ast::Item::Class(with_dtor("Rc")),
        ast::Item::Function(main),
    ])
    .expect("compiles cleanly");
    let text = function_text(&module.emit(), "main");

    let pos_a = text.find("@Ra.@destructor").expect("~a emitted");
    let pos_b = text.find("@Rb.@destructor").expect("~b emitted");
    let pos_c = text.find("@Rc.@destructor").expect("~c emitted");
    assert!(
        pos_c < pos_b && pos_b < pos_a,
        "destruction order must be ~c, ~b, ~a:\n{text}"
    );

    // No destructor runs twice.
    assert_eq!(text.matches("@Ra.@destructor").count(), 1);
    assert_eq!(text.matches("@Rb.@destructor").count(), 1);
    assert_eq!(text.matches("@Rc.@destructor").count(), 1);
}

// ============================================================================
// Struct return
// ============================================================================

#[test]
fn large_struct_returns_through_a_hidden_slot() {
    let big = class(
        "Big",
        vec![],
        vec![
            property("a", named("i64")),
            property("b", named("i64")),
            property("c", named("i64")),
        ],
    );
    let make = function(
        "make",
        vec![],
        Some(named("Big")),
        vec![ret(Some(class_init("Big", vec![])))],
    );
    let use_it = function(
        "use_it",
        vec![],
        None,
        vec![let_stmt("g", Some(named("Big")), Some(call(name("make"), vec![])))],
    );

    let module = compile(vec![
        ast::Item::Class(big),
        ast::Item::Function(make),
        ast::Item::Function(use_it),
    ])
    .expect("compiles cleanly");
    let text = module.emit();

    // 24 bytes > 2 pointer widths: sret on both ends.
    assert!(
        text.contains("define void @make(sret %Big*"),
        "declaration carries the hidden slot:\n{text}"
    );
    let use_text = function_text(&text, "use_it");
    assert!(
        use_text.contains("call void @make(sret"),
        "call site passes the slot first:\n{use_text}"
    );
}

// ============================================================================
// Methods, control flow, diagnostics
// ============================================================================

#[test]
fn instance_method_receives_this() {
    let inc = function(
        "inc",
        vec![],
        None,
        vec![assign(
            member(name("this"), "n"),
            binary(ast::BinaryOp::Add, member(name("this"), "n"), int(1)),
        )],
    );
    let counter = class(
        "Counter",
        vec![],
        vec![property("n", named("i32")), method(inc)],
    );
    let main = function(
        "main",
        vec![],
        None,
        vec![
            let_stmt("c", None, Some(class_init("Counter", vec![]))),
            expr_stmt(call(member(name("c"), "inc"), vec![])),
        ],
    );

    let module = compile(vec![
        ast::Item::Class(counter),
        ast::Item::Function(main),
    ])
    .expect("compiles cleanly");
    let text = module.emit();
    assert!(function_text(&text, "main").contains("@Counter.inc("));
    // The method body indexes through the receiver.
    assert!(function_text(&text, "Counter.inc").contains("getelementptr %Counter"));
}

#[test]
fn while_loop_with_break_lowers_to_blocks() {
    let main = function(
        "main",
        vec![],
        None,
        vec![ast::Stmt::While(ast::WhileStmt {
            cond: boolean(true),
            body: block(vec![ast::Stmt::Break(Span::DUMMY)]),
            span: Span::DUMMY,
        })],
    );
    let module = compile(vec![ast::Item::Function(main)]).expect("compiles cleanly");
    let text = function_text(&module.emit(), "main");
    assert!(text.contains("; while.cond"));
    assert!(text.contains("; while.body"));
    assert!(text.contains("; while.end"));
}

#[test]
fn overload_resolution_prefers_exact_matches() {
    let f_int = function(
        "pick",
        vec![("x", named("i32"))],
        Some(named("i32")),
        vec![ret(Some(name("x")))],
    );
    let f_float = function(
        "pick",
        vec![("x", named("f64"))],
        Some(named("f64")),
        vec![ret(Some(name("x")))],
    );
    let main = function(
        "main",
        vec![],
        Some(named("i32")),
        vec![ret(Some(call(name("pick"), vec![int(7)])))],
    );
    let module = compile(vec![
        ast::Item::Function(f_int),
        ast::Item::Function(f_float),
        ast::Item::Function(main),
    ])
    .expect("compiles cleanly");
    let text = function_text(&module.emit(), "main");
    // The i32 overload keeps the unsuffixed name; exact match wins.
    assert!(text.contains("call i32 @pick(i32 7)"), "{text}");
}

#[test]
fn literal_division_by_zero_is_diagnosed() {
    let main = function(
        "main",
        vec![],
        Some(named("i32")),
        vec![ret(Some(binary(ast::BinaryOp::Div, int(1), int(0))))],
    );
    let errors = compile(vec![ast::Item::Function(main)]).unwrap_err();
    assert!(errors
        .iter()
        .any(|d| d.code == Some(DiagnosticCode::ARITHMETIC_DOMAIN)));
}

#[test]
fn break_outside_loop_is_diagnosed() {
    let main = function("main", vec![], None, vec![ast::Stmt::Break(Span::DUMMY)]);
    let errors = compile(vec![ast::Item::Function(main)]).unwrap_err();
    assert!(errors
        .iter()
        .any(|d| d.code == Some(DiagnosticCode::BREAK_OUTSIDE_LOOP)));
}

#[test]
fn constant_folding_wraps_in_two_complement() {
    let main = function(
        "main",
        vec![],
        Some(named("i32")),
        // i32::MAX + 1 wraps to i32::MIN, not an error.
        vec![ret(Some(binary(
            ast::BinaryOp::Add,
            int(i64::from(i32::MAX)),
            int(1),
        )))],
    );
    let module = compile(vec![ast::Item::Function(main)]).expect("wrapping is not an error");
    let text = function_text(&module.emit(), "main");
    assert!(
        text.contains("store i32 -2147483648"),
        "folded constant should wrap:\n{text}"
    );
}

#[test]
fn diagnostics_sort_by_file_then_position() {
    let bad_fn = |fn_name: &str, ty_name: &str, file: u32, offset: u32| {
        let mut decl = function(fn_name, vec![], None, vec![]);
        decl.params.push(ast::ParamDecl {
            name: sym("x"),
            ty: ast::TypeExpr::Named(ast::ScopedName::plain(
                sym(ty_name),
                Span::new(FileId(file), offset, offset + 5),
            )),
            span: Span::DUMMY,
        });
        decl
    };

    let unit_late = ast::Unit {
        file: FileId(1),
        items: vec![ast::Item::Function(bad_fn("f1", "Nope1", 1, 3))],
    };
    let unit_early = ast::Unit {
        file: FileId(0),
        items: vec![
            ast::Item::Function(bad_fn("f2", "Nope2", 0, 40)),
            ast::Item::Function(bad_fn("f3", "Nope3", 0, 10)),
        ],
    };

    let errors =
        compile_units(&[unit_late, unit_early], &CompileOptions::default()).unwrap_err();
    let spans: Vec<_> = errors.iter().map(|d| (d.span.file, d.span.start)).collect();
    assert_eq!(
        spans,
        vec![(FileId(0), 10), (FileId(0), 40), (FileId(1), 3)],
        "diagnostics must sort by file then offset"
    );
}

#[test]
fn address_of_deref_is_the_original_pointer() {
    // &*p hands back p's value: one load (of the parameter slot), no
    // address arithmetic.
    let f = function(
        "roundtrip",
        vec![("p", ptr_to(named("i32")))],
        Some(ptr_to(named("i32"))),
        vec![ret(Some(unary(
            ast::UnaryOp::AddrOf,
            unary(ast::UnaryOp::Deref, name("p")),
        )))],
    );
    let module = compile(vec![ast::Item::Function(f)]).expect("compiles cleanly");
    let text = function_text(&module.emit(), "roundtrip");
    assert!(!text.contains("getelementptr"), "{text}");
    assert_eq!(text.matches("load").count(), 2, "param slot + exit slot:\n{text}");
}

#[test]
fn non_literal_division_is_deferred_to_runtime() {
    let f = function(
        "div",
        vec![("a", named("i32")), ("b", named("i32"))],
        Some(named("i32")),
        vec![ret(Some(binary(ast::BinaryOp::Div, name("a"), name("b"))))],
    );
    let module = compile(vec![ast::Item::Function(f)]).expect("no compile-time diagnostic");
    let text = function_text(&module.emit(), "div");
    assert!(text.contains("sdiv"), "{text}");
}

#[test]
fn elaboration_is_reproducible() {
    let build = || {
        vec![
            ast::Item::Class(class(
                "P",
                vec![],
                vec![property("x", named("i32"))],
            )),
            ast::Item::Function(function(
                "main",
                vec![],
                Some(named("i32")),
                vec![
                    let_stmt("p", None, Some(class_init("P", vec![("x", int(3))]))),
                    ret(Some(member(name("p"), "x"))),
                ],
            )),
        ]
    };
    let first = compile(build()).expect("compiles cleanly").emit();
    let second = compile(build()).expect("compiles cleanly").emit();
    assert_eq!(first, second, "same tree must yield identical module bytes");
}

#[test]
fn variadic_tail_passes_by_value_after_load() {
    // extern fn log(level: i32, ...);
    let mut log = function("log", vec![("level", named("i32"))], None, vec![]);
    log.variadic = true;
    log.body = None;

    let main = function(
        "main",
        vec![],
        None,
        vec![expr_stmt(call(name("log"), vec![int(1), int(2), int(3)]))],
    );

    let module = compile(vec![
        ast::Item::Function(log),
        ast::Item::Function(main),
    ])
    .expect("compiles cleanly");
    let text = module.emit();
    assert!(text.contains("declare void @log(i32 %level0, ...)"), "{text}");
    assert!(function_text(&text, "main").contains("call void @log(i32 1, i32 2, i32 3)"));
}

#[test]
fn inline_asm_passes_through_unvalidated() {
    let main = function(
        "main",
        vec![("x", named("i64"))],
        None,
        vec![expr_stmt(ast::Expr::Asm(ast::AsmExpr {
            template: "nop ; $0".to_string(),
            constraints: "r".to_string(),
            inputs: vec![name("x")],
            span: Span::DUMMY,
        }))],
    );
    let module = compile(vec![ast::Item::Function(main)]).expect("compiles cleanly");
    let text = function_text(&module.emit(), "main");
    assert!(text.contains("asm \"nop ; $0\", \"r\"("), "{text}");
}

#[test]
fn for_loop_uses_the_next_protocol() {
    // class Step { ok: bool; value: i32; }
    // class Once { done: bool; fn next(): Step { return Step{}; } }
    let step = class(
        "Step",
        vec![],
        vec![property("ok", named("bool")), property("value", named("i32"))],
    );
    let next = function(
        "next",
        vec![],
        Some(named("Step")),
        vec![ret(Some(class_init("Step", vec![])))],
    );
    let once = class(
        "Once",
        vec![],
        vec![property("done", named("bool")), method(next)],
    );
    let main = function(
        "main",
        vec![],
        None,
        vec![
            let_stmt("it", None, Some(class_init("Once", vec![]))),
            ast::Stmt::For(ast::ForStmt {
                binding: sym("x"),
                iter: name("it"),
                body: block(vec![]),
                span: Span::DUMMY,
            }),
        ],
    );

    let module = compile(vec![
        ast::Item::Class(step),
        ast::Item::Class(once),
        ast::Item::Function(main),
    ])
    .expect("compiles cleanly");
    let text = function_text(&module.emit(), "main");
    assert!(text.contains("; for.cond"));
    assert!(text.contains("@Once.next("), "header calls next():\n{text}");
}
